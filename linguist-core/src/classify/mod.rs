pub mod extension;

pub use extension::ExtensionClassifier;

use crate::types::LanguageKind;

/// How much of a file the classifier gets to see.
#[derive(Debug, Clone, Copy)]
pub struct FileSample<'a> {
    /// File content, or `None` when only the size is known.
    pub content: Option<&'a [u8]>,
    /// Full size of the file in bytes.
    pub size: u64,
}

impl<'a> FileSample<'a> {
    pub fn full(content: &'a [u8]) -> Self {
        Self {
            content: Some(content),
            size: content.len() as u64,
        }
    }

    pub fn size_only(size: u64) -> Self {
        Self {
            content: None,
            size,
        }
    }
}

/// One language attributed to (part of) a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageTag {
    pub language: String,
    pub kind: LanguageKind,
    pub bytes: u64,
}

/// Classifies a single file into zero or more languages.
///
/// Implementations must be deterministic for identical input, perform no
/// I/O, and return an empty vector for unrecognized files.
pub trait LanguageClassifier: Send + Sync + std::fmt::Debug {
    fn classify(&self, path: &str, sample: FileSample<'_>) -> Vec<LanguageTag>;
}

/// Number of leading bytes inspected when sniffing for binary content.
pub const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Heuristic binary check: a NUL byte in the first 8 KiB.
pub fn looks_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(BINARY_SNIFF_LEN)];
    head.contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_sniffing() {
        assert!(looks_binary(b"\x7fELF\0\0\0"));
        assert!(!looks_binary(b"fn main() {}\n"));
        let mut late_nul = vec![b'a'; BINARY_SNIFF_LEN + 10];
        late_nul[BINARY_SNIFF_LEN + 5] = 0;
        assert!(!looks_binary(&late_nul));
    }
}
