//! Stable short hashes for asset names and label namespaces.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;

/// Hash a string into 16 hex digits.
/// Uses DefaultHasher with its fixed keys, so results are stable within a build
/// of the tool (non-cryptographic, fast).
pub fn hash_str(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// File name an asset is staged under: hash of its absolute path plus the
/// original extension (lowercased).
pub fn asset_file_name(source: &Path) -> String {
    let hash = hash_str(&source.to_string_lossy());
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{hash}.{}", ext.to_lowercase()),
        None => hash,
    }
}
