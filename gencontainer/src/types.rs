//! Enumerations shared by the container records
//!
//! Every enum has exactly three representations: the serialized byte
//! (`TryFrom<u8>` / `as u8`), the human string used by layouts and the CLI
//! (`FromStr` / `Display`), and the Rust variant itself.

use crate::error::{ContainerError, Result};
use std::fmt;
use std::str::FromStr;

/// Authentication scheme of a container header or a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AuthType {
    /// No authentication
    #[default]
    None = 0,
    /// SHA-256 digest
    Sha2_256 = 1,
    /// SHA-384 digest
    Sha2_384 = 2,
    /// RSA 2048-bit signature
    Rsa2048 = 3,
    /// RSA 3072-bit signature
    Rsa3072 = 4,
}

impl AuthType {
    /// All auth types in numeric order
    pub const ALL: [AuthType; 5] = [
        Self::None,
        Self::Sha2_256,
        Self::Sha2_384,
        Self::Rsa2048,
        Self::Rsa3072,
    ];

    /// Canonical layout spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Sha2_256 => "SHA2_256",
            Self::Sha2_384 => "SHA2_384",
            Self::Rsa2048 => "RSA2048",
            Self::Rsa3072 => "RSA3072",
        }
    }

    /// RSA modulus size in bytes, `None` for non-RSA types
    pub fn key_size(&self) -> Option<usize> {
        match self {
            Self::Rsa2048 => Some(2048 / 8),
            Self::Rsa3072 => Some(3072 / 8),
            _ => None,
        }
    }

    /// Hash algorithm for hash-only types
    pub fn hash_alg(&self) -> Option<HashAlg> {
        match self {
            Self::Sha2_256 => Some(HashAlg::Sha2_256),
            Self::Sha2_384 => Some(HashAlg::Sha2_384),
            _ => None,
        }
    }

    pub fn is_rsa(&self) -> bool {
        self.key_size().is_some()
    }
}

impl TryFrom<u8> for AuthType {
    type Error = ContainerError;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| ContainerError::unsupported_auth_type(format!("{value}")))
    }
}

impl FromStr for AuthType {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "" | "NONE" => Ok(Self::None),
            "SHA2_256" | "SHA256" => Ok(Self::Sha2_256),
            "SHA2_384" | "SHA384" => Ok(Self::Sha2_384),
            "RSA2048" => Ok(Self::Rsa2048),
            "RSA3072" => Ok(Self::Rsa3072),
            _ => Err(ContainerError::unsupported_auth_type(s)),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HashAlg> for AuthType {
    fn from(alg: HashAlg) -> Self {
        match alg {
            HashAlg::Sha2_256 => Self::Sha2_256,
            HashAlg::Sha2_384 => Self::Sha2_384,
        }
    }
}

/// Hash algorithm used for digests, key hashes and RSA signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum HashAlg {
    #[default]
    Sha2_256 = 1,
    Sha2_384 = 2,
}

impl HashAlg {
    pub fn digest_size(&self) -> usize {
        match self {
            Self::Sha2_256 => 32,
            Self::Sha2_384 => 48,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha2_256 => "SHA2_256",
            Self::Sha2_384 => "SHA2_384",
        }
    }
}

impl TryFrom<u8> for HashAlg {
    type Error = ContainerError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Sha2_256),
            2 => Ok(Self::Sha2_384),
            _ => Err(ContainerError::UnsupportedHashAlg(format!("{value}"))),
        }
    }
}

impl FromStr for HashAlg {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        match AuthType::from_str(s) {
            Ok(auth) => auth
                .hash_alg()
                .ok_or_else(|| ContainerError::UnsupportedHashAlg(s.to_string())),
            Err(_) => Err(ContainerError::UnsupportedHashAlg(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container image type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ImageType {
    #[default]
    Normal = 0x00,
    Classic = 0xF3,
    Multiboot = 0xF4,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Classic => "CLASSIC",
            Self::Multiboot => "MULTIBOOT",
        }
    }
}

impl TryFrom<u8> for ImageType {
    type Error = ContainerError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Normal),
            0xF3 => Ok(Self::Classic),
            0xF4 => Ok(Self::Multiboot),
            _ => Err(ContainerError::unsupported_image_type(format!(
                "0x{value:02X}"
            ))),
        }
    }
}

impl FromStr for ImageType {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "NORMAL" => Ok(Self::Normal),
            "CLASSIC" => Ok(Self::Classic),
            "MULTIBOOT" => Ok(Self::Multiboot),
            _ => Err(ContainerError::unsupported_image_type(s)),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component compression algorithm, identified on disk by the blob signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressAlg {
    /// Stored uncompressed behind a blob header
    #[default]
    Dummy,
    Lz4,
    Lzma,
}

impl CompressAlg {
    /// Four byte signature at the start of the compressed blob
    pub fn signature(&self) -> [u8; 4] {
        match self {
            Self::Dummy => *b"LZDM",
            Self::Lz4 => *b"LZ4 ",
            Self::Lzma => *b"LZMA",
        }
    }

    pub fn from_signature(sig: &[u8; 4]) -> Result<Self> {
        match sig {
            b"LZDM" => Ok(Self::Dummy),
            b"LZ4 " => Ok(Self::Lz4),
            b"LZMA" => Ok(Self::Lzma),
            _ => Err(ContainerError::UnknownBlobSignature(
                String::from_utf8_lossy(sig).into_owned(),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dummy => "Dummy",
            Self::Lz4 => "Lz4",
            Self::Lzma => "Lzma",
        }
    }
}

impl FromStr for CompressAlg {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "dummy" | "none" => Ok(Self::Dummy),
            "lz4" => Ok(Self::Lz4),
            "lzma" => Ok(Self::Lzma),
            _ => Err(ContainerError::unsupported_compression(s)),
        }
    }
}

impl fmt::Display for CompressAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a name or signature into its 4-byte on-disk tag
pub fn tag_from_str(s: &str) -> Result<[u8; 4]> {
    let bytes = s.as_bytes();
    if bytes.len() != 4 || !s.is_ascii() {
        return Err(ContainerError::InvalidName(s.to_string()));
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(bytes);
    Ok(tag)
}

/// Render a 4-byte tag for display, replacing non-printable bytes
pub fn tag_to_string(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// A decoded record field, used for the explicit per-structure field tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Tag([u8; 4]),
    Int(u64),
    Auth(AuthType),
    Image(ImageType),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => write!(
                f,
                "0x{:X} ('{}')",
                u32::from_le_bytes(*tag),
                tag_to_string(tag)
            ),
            Self::Int(v) => write!(f, "0x{v:X}"),
            Self::Auth(auth) => write!(f, "{} : {}", *auth as u8, auth),
            Self::Image(kind) => write!(f, "0x{:X} : {}", *kind as u8, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_conversions() {
        for auth in AuthType::ALL {
            assert_eq!(AuthType::try_from(auth as u8).unwrap(), auth);
            assert_eq!(auth.as_str().parse::<AuthType>().unwrap(), auth);
        }
        assert_eq!("".parse::<AuthType>().unwrap(), AuthType::None);
        assert_eq!("sha2-384".parse::<AuthType>().unwrap(), AuthType::Sha2_384);
        assert!(AuthType::try_from(5).is_err());
        assert!("RSA4096".parse::<AuthType>().is_err());
    }

    #[test]
    fn test_hash_alg() {
        assert_eq!("SHA2_256".parse::<HashAlg>().unwrap(), HashAlg::Sha2_256);
        assert_eq!("sha2_384".parse::<HashAlg>().unwrap(), HashAlg::Sha2_384);
        assert!("RSA2048".parse::<HashAlg>().is_err());
        assert!("NONE".parse::<HashAlg>().is_err());
        assert_eq!(AuthType::from(HashAlg::Sha2_384), AuthType::Sha2_384);
    }

    #[test]
    fn test_image_type() {
        assert_eq!(ImageType::try_from(0xF3).unwrap(), ImageType::Classic);
        assert_eq!("multiboot".parse::<ImageType>().unwrap(), ImageType::Multiboot);
        assert_eq!("".parse::<ImageType>().unwrap(), ImageType::Normal);
        assert!("FANCY".parse::<ImageType>().is_err());
        assert!(ImageType::try_from(0x01).is_err());
    }

    #[test]
    fn test_compress_alg() {
        for alg in [CompressAlg::Dummy, CompressAlg::Lz4, CompressAlg::Lzma] {
            assert_eq!(CompressAlg::from_signature(&alg.signature()).unwrap(), alg);
            assert_eq!(alg.as_str().parse::<CompressAlg>().unwrap(), alg);
        }
        assert!(matches!(
            CompressAlg::from_signature(b"LZUF"),
            Err(ContainerError::UnknownBlobSignature(_))
        ));
    }

    #[test]
    fn test_tags() {
        assert_eq!(tag_from_str("BOOT").unwrap(), *b"BOOT");
        assert!(tag_from_str("BOO").is_err());
        assert!(tag_from_str("BOOTS").is_err());
        assert_eq!(tag_to_string(b"_SG_"), "_SG_");
        assert_eq!(tag_to_string(&[b'A', 0, b'B', 0xFF]), "A.B.");
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Int(0x1000).to_string(), "0x1000");
        assert_eq!(
            FieldValue::Auth(AuthType::Rsa2048).to_string(),
            "3 : RSA2048"
        );
        assert_eq!(
            FieldValue::Tag(*b"BOOT").to_string(),
            "0x544F4F42 ('BOOT')"
        );
    }
}
