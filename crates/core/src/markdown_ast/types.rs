/// A heading located in a markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingInfo {
    /// The heading text content
    pub title: String,
    /// The heading level (1-6)
    pub level: u8,
    /// Byte offset of the start of the heading line
    pub start: usize,
    /// Byte offset where the section ends (next heading of same or higher level, or EOF)
    pub section_end: usize,
}
