//! Vault file discovery and content extraction.
//!
//! This module provides utilities for walking vault directories, extracting
//! headings and block anchors from notes, and locating referenced assets.

pub mod extractor;
pub mod frontmatter;
pub mod hasher;
pub mod locator;
pub mod slug;
pub mod walker;

pub use extractor::{extract_banner, extract_blocks, extract_headings, extract_title};
pub use hasher::{asset_file_name, hash_str};
pub use locator::AssetLocator;
pub use walker::{VaultWalker, VaultWalkerError, WalkedFile};
