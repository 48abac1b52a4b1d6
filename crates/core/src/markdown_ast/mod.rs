//! Markdown parsing helpers shared by the index and the LaTeX renderer.

pub mod comrak;
pub mod types;

pub use comrak::{collect_text, find_headings, options};
pub use types::HeadingInfo;
