//! Error types for BXML reading, writing, and contract checking.

use std::fmt;
use std::io;

use thiserror::Error;

/// Stable codes carried by every [`DecodeError`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// B001: Invalid magic/version
    InvalidMagicOrVersion,
    /// B002: Index out of bounds
    IndexOutOfBounds,
    /// B003: Invalid text encoding
    InvalidText,
    /// B004: Unexpected end of input
    UnexpectedEof,
    /// B005: Malformed token/value/count encoding
    MalformedEncoding,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "B001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMagicOrVersion => "B001",
            ErrorCode::IndexOutOfBounds => "B002",
            ErrorCode::InvalidText => "B003",
            ErrorCode::UnexpectedEof => "B004",
            ErrorCode::MalformedEncoding => "B005",
        }
    }
}

/// Error while decoding the byte stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === B001: Invalid magic/version ===
    #[error("[B001] invalid header identifier: {found:02x?}")]
    InvalidMagic { found: Vec<u8> },

    #[error("[B001] unsupported version: {major}.{minor}.{point}")]
    UnsupportedVersion { major: u8, minor: u8, point: u8 },

    #[error("[B001] invalid trailer identifier: {found:02x?}")]
    InvalidTrailerId { found: Vec<u8> },

    // === B002: Index out of bounds ===
    #[error("[B002] string table index {index} out of bounds (size: {size})")]
    StringIndexOutOfBounds { index: u64, size: usize },

    // === B003: Invalid text ===
    #[error("[B003] invalid {charset} text in {field}")]
    InvalidText { charset: &'static str, field: &'static str },

    #[error("[B003] unsupported character encoding: {name}")]
    UnsupportedCharset { name: String },

    #[error("[B003] character U+{code:04X} is not allowed in XML strings")]
    IllegalXmlChar { code: u32 },

    // === B004: Unexpected end of input ===
    #[error("[B004] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    // === B005: Malformed encoding ===
    #[error("[B005] invalid token type code: 0x{code:02x}")]
    InvalidTokenType { code: u8 },

    #[error("[B005] invalid value type code: 0x{code:02x}")]
    InvalidValueType { code: u8 },

    #[error("[B005] invalid array element type: 0x{code:02x}")]
    InvalidArrayElementType { code: u8 },

    #[error("[B005] invalid count selector: 0x{code:02x}")]
    InvalidCount { code: u8 },

    #[error("[B005] negative count: {value}")]
    NegativeCount { value: i64 },

    #[error("[B005] invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("[B005] invalid compression code: {code}")]
    InvalidCompression { code: u8 },

    #[error("[B005] reserved bits are non-zero in {context}")]
    ReservedBitsSet { context: &'static str },

    #[error("[B005] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: u64,
        max: usize,
    },

    #[error("[B005] unexpected {found} token {context}")]
    UnexpectedToken {
        found: &'static str,
        context: &'static str,
    },

    #[error("[B005] namespace prefix {prefix:?} is not bound")]
    UnboundPrefix { prefix: String },

    #[error("[B005] end of document with {open} open element(s)")]
    UnclosedElements { open: usize },

    #[error("[B005] trailer length {len} is invalid for a stream of {size} bytes")]
    InvalidTrailerLength { len: i64, size: u64 },

    #[error("[B005] position {position} is not the start of an element")]
    NotAnElement { position: u64 },

    #[error("[B005] gzip stream is corrupt: {0}")]
    DecompressionFailed(String),
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidMagic { .. }
            | DecodeError::UnsupportedVersion { .. }
            | DecodeError::InvalidTrailerId { .. } => ErrorCode::InvalidMagicOrVersion,
            DecodeError::StringIndexOutOfBounds { .. } => ErrorCode::IndexOutOfBounds,
            DecodeError::InvalidText { .. }
            | DecodeError::UnsupportedCharset { .. }
            | DecodeError::IllegalXmlChar { .. } => ErrorCode::InvalidText,
            DecodeError::UnexpectedEof { .. } => ErrorCode::UnexpectedEof,
            _ => ErrorCode::MalformedEncoding,
        }
    }
}

/// Error while encoding caller-supplied data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("count {value} is outside the encodable range 0..=i64::MAX")]
    CountOutOfRange { value: u64 },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("character U+{code:04X} cannot be encoded as {charset}")]
    Unmappable { charset: &'static str, code: u32 },

    #[error("character U+{code:04X} is not allowed in strict XML strings")]
    IllegalXmlChar { code: u32 },

    #[error("value type {value_type} cannot be an array element")]
    InvalidArrayElementType { value_type: &'static str },

    #[error("namespace URI {uri:?} has no bound prefix")]
    UnboundNamespace { uri: String },

    #[error("string table reference {index} is not defined (size: {size})")]
    UndefinedStringReference { index: usize, size: usize },

    #[error("gzip compression failed: {0}")]
    CompressionFailed(String),
}

/// Which side of a delegated call a contract check ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checked before delegating to the wrapped implementation.
    Pre,
    /// Checked on the state left behind by the wrapped implementation.
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pre => f.write_str("precondition"),
            Phase::Post => f.write_str("postcondition"),
        }
    }
}

/// A reader/writer call outside its protocol, detected by the contract layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("contract violation: {phase} of {operation} failed: {detail}")]
pub struct ContractViolation {
    /// The operation being checked.
    pub operation: &'static str,
    /// Whether the check ran before or after delegation.
    pub phase: Phase,
    /// Human-readable description of the failed condition.
    pub detail: String,
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed stream content.
    Format,
    /// Failure of the underlying medium, including truncation.
    Io,
    /// The caller used the API outside its protocol.
    Contract,
    /// The medium does not support the requested operation.
    Capability,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error("illegal state for {operation}: {detail}")]
    IllegalState {
        operation: &'static str,
        detail: String,
    },

    #[error("{operation} is not supported by this medium")]
    Unsupported { operation: &'static str },

    #[error("{operation} called on a closed stream")]
    Closed { operation: &'static str },
}

impl Error {
    /// Classifies this error per the format/io/contract/capability taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Decode(DecodeError::UnexpectedEof { .. }) | Error::Io(_) => ErrorCategory::Io,
            Error::Decode(_) => ErrorCategory::Format,
            Error::Encode(_)
            | Error::Contract(_)
            | Error::IllegalState { .. }
            | Error::Closed { .. } => ErrorCategory::Contract,
            Error::Unsupported { .. } => ErrorCategory::Capability,
        }
    }

    /// Returns true if this is a contract-layer violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::Contract(_))
    }

    pub(crate) fn illegal_state(operation: &'static str, detail: impl Into<String>) -> Self {
        Error::IllegalState {
            operation,
            detail: detail.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
