//! Error types for container operations

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors raised while building, parsing or modifying a container
#[derive(Error, Debug)]
pub enum ContainerError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes do not describe a well-formed container
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),

    /// Unknown container image type
    #[error("Invalid image type '{0}' specified")]
    UnsupportedImageType(String),

    /// Unknown authentication type
    #[error("Unsupported authentication type '{0}'")]
    UnsupportedAuthType(String),

    /// Unknown signing hash algorithm
    #[error("Unsupported hash algorithm '{0}'")]
    UnsupportedHashAlg(String),

    /// Unknown compression algorithm name
    #[error("Unsupported compression algorithm '{0}'")]
    UnsupportedCompression(String),

    /// The compressed blob header carries an unknown signature
    #[error("Unknown compressed blob signature '{0}'")]
    UnknownBlobSignature(String),

    /// Two components share a name
    #[error("Found duplicated component name '{0}' in a container")]
    DuplicateName(String),

    /// Component payload and auth data overflow the reserved region
    #[error("Component '{name}' needs space 0x{needed:X}, but region size is 0x{size:X}")]
    RegionTooSmall {
        name: String,
        needed: usize,
        size: u32,
    },

    /// Authentication data does not have the length its type requires
    #[error("Unexpected authentication data length for {what}: expected {expected} bytes, got {actual}")]
    AuthLengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// RSA authentication requested without a usable key
    #[error("Signing key needs to be specified for {auth} authentication (got '{key}')")]
    MissingKey { auth: String, key: String },

    /// Replacement component does not match the recorded hash
    #[error("Component '{0}' hash does not match the one stored in container header")]
    HashMismatch(String),

    /// Replace was attempted on a monolithically signed container
    #[error("Could not replace component for monolithically signed container")]
    MonoSignedReplace,

    /// The monolithic signing entry is not the final layout entry
    #[error("'{0}' must be the last entry in layout for monolithic signing")]
    MonoSigningNotLast(String),

    /// A component source file does not exist
    #[error("Component file path '{0}' is invalid")]
    InvalidPath(String),

    /// No component with the requested name
    #[error("Could not locate component '{0}' in container")]
    ComponentNotFound(String),

    /// Names and signatures are four ASCII characters
    #[error("Invalid name '{0}': expected exactly 4 ASCII characters")]
    InvalidName(String),

    /// Alignment is not a power of two
    #[error("Invalid alignment 0x{0:X}: must be a power of two")]
    InvalidAlignment(u64),

    /// Header does not fit the 16-bit data offset field
    #[error("Container header needs 0x{0:X} bytes, exceeding the 16-bit data offset")]
    HeaderTooLarge(usize),

    /// Too many components for the 8-bit entry count
    #[error("Too many components: {count} (max {max})")]
    TooManyEntries { count: usize, max: usize },

    /// Malformed layout text
    #[error("Layout error at line {line}: {msg}")]
    Layout { line: usize, msg: String },

    /// External compression or signing tool failed
    #[error("External tool '{tool}' failed: {msg}")]
    Tool { tool: String, msg: String },

    /// Configuration file could not be used
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ContainerError {
    /// Create an invalid image data error
    pub fn invalid_image_data(msg: impl Into<String>) -> Self {
        Self::InvalidImageData(msg.into())
    }

    /// Create an unsupported image type error
    pub fn unsupported_image_type(kind: impl Into<String>) -> Self {
        Self::UnsupportedImageType(kind.into())
    }

    /// Create an unsupported authentication type error
    pub fn unsupported_auth_type(kind: impl Into<String>) -> Self {
        Self::UnsupportedAuthType(kind.into())
    }

    /// Create an unsupported compression error
    pub fn unsupported_compression(alg: impl Into<String>) -> Self {
        Self::UnsupportedCompression(alg.into())
    }

    /// Create a layout syntax error
    pub fn layout(line: usize, msg: impl Into<String>) -> Self {
        Self::Layout {
            line,
            msg: msg.into(),
        }
    }

    /// Create an external tool error
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            msg: msg.into(),
        }
    }
}
