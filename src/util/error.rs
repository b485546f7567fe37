//! Error types for the PSK/PSA library.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of record a fixed-width name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Section,
    Bone,
    Sequence,
    Material,
    Morph,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Section => "Section",
            Self::Bone => "Bone",
            Self::Sequence => "Sequence",
            Self::Material => "Material",
            Self::Morph => "Morph target",
        };
        f.write_str(s)
    }
}

/// Main error type for PSK/PSA operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// First section header does not carry the chunk magic
    #[error("Not a PSK/PSA file: expected type flag 1999801, found {found}")]
    NotThisFormat { found: i32 },

    /// A later section header carries a wrong type flag
    #[error("Invalid type flag {found} in section '{section}'")]
    InvalidMagic { section: String, found: i32 },

    /// Stream ended before a declared header or payload was complete
    #[error("Truncated data at position {pos}: needed {needed} bytes")]
    Truncated { pos: u64, needed: u64 },

    /// Declared element size does not match the record type
    #[error("Section '{section}' declares {actual}-byte records, expected {expected}")]
    RecordSizeMismatch {
        section: String,
        expected: usize,
        actual: usize,
    },

    /// A mandatory section is absent or empty
    #[error("Missing mandatory section: {0}")]
    MissingSection(&'static str),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Name cannot be represented in the 8-bit name charset
    #[error("{kind} name \"{name}\" contains characters that cannot be encoded in the Windows-1252 codepage")]
    Encoding { kind: NameKind, name: String },

    /// Export inputs rejected before any output was produced
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Animation clip not known to the pose evaluator
    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    /// Sequence not present in the animation file
    #[error("Sequence not found: {0}")]
    SequenceNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an encoding error for the given record name.
    pub fn encoding(kind: NameKind, name: impl Into<String>) -> Self {
        Self::Encoding { kind, name: name.into() }
    }

    /// True for errors caused by malformed file contents.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::NotThisFormat { .. }
                | Self::InvalidMagic { .. }
                | Self::Truncated { .. }
                | Self::RecordSizeMismatch { .. }
                | Self::MissingSection(_)
                | Self::InvalidStructure(_)
        )
    }
}

/// Result type alias for PSK/PSA operations.
pub type Result<T> = std::result::Result<T, Error>;
