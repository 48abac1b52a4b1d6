#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod book;
pub mod build;
pub mod compile;
pub mod config;
pub mod engine;
pub mod index;
pub mod markdown_ast;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod scripting;
pub mod vault;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn rustc_version() -> String {
    std::env::var("RUSTC_VERSION").unwrap_or_else(|_| "unknown".into())
}

/// One-line description of this build for `doctor`.
pub fn doctor_banner() -> String {
    format!("mdpress-core v{} | rustc {} on {}", version(), rustc_version(), std::env::consts::OS)
}
