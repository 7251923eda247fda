//! Authentication sizing, hashing and the RSA signature envelope
//!
//! Loaders parse authentication data by fixed offsets, so every length here
//! is a pure function of the auth type:
//!
//! | auth type  | hash-only (`signed = false`) | signed (`signed = true`)        |
//! |------------|------------------------------|---------------------------------|
//! | NONE       | 0                            | 0                               |
//! | SHA2_256   | 32                           | 0                               |
//! | SHA2_384   | 48                           | 0                               |
//! | RSA2048    | 256                          | 2*256 + 8 + 8 + 4 = 532         |
//! | RSA3072    | 384                          | 2*384 + 8 + 8 + 4 = 788         |
//!
//! A signed envelope is `SIGNATURE_HDR` + signature + `PUB_KEY_HDR` +
//! modulus + exponent.

use crate::error::{ContainerError, Result};
use crate::signing::Signer;
use crate::types::{AuthType, HashAlg};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sha2::{Digest, Sha256, Sha384};
use std::io::{Cursor, Read};
use std::path::Path;

pub const PUB_KEY_HDR_SIZE: usize = 8;
pub const SIGNATURE_HDR_SIZE: usize = 8;
pub const RSA_EXPONENT_SIZE: usize = 4;

pub const PUB_KEY_ID: [u8; 4] = *b"PUBK";
pub const SIGNATURE_ID: [u8; 4] = *b"SIGN";
pub const KEY_TYPE_RSA: u8 = 1;
pub const SIG_TYPE_RSA_PKCS1: u8 = 1;

/// Byte length authentication data of `auth` occupies
pub fn auth_size(auth: AuthType, signed: bool) -> usize {
    match auth {
        AuthType::None => 0,
        AuthType::Sha2_256 | AuthType::Sha2_384 => {
            if signed {
                0
            } else {
                auth.hash_alg().map_or(0, |alg| alg.digest_size())
            }
        }
        AuthType::Rsa2048 | AuthType::Rsa3072 => {
            let key_size = auth.key_size().unwrap_or_default();
            if signed {
                key_size * 2 + PUB_KEY_HDR_SIZE + SIGNATURE_HDR_SIZE + RSA_EXPONENT_SIZE
            } else {
                key_size
            }
        }
    }
}

pub fn digest(alg: HashAlg, data: &[u8]) -> Vec<u8> {
    match alg {
        HashAlg::Sha2_256 => Sha256::digest(data).to_vec(),
        HashAlg::Sha2_384 => Sha384::digest(data).to_vec(),
    }
}

/// Public key blob header: `"PUBK"`, key size, key type, reserved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubKeyHeader {
    pub key_size: u16,
    pub key_type: u8,
}

impl PubKeyHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(PUB_KEY_HDR_SIZE);
        buffer.extend_from_slice(&PUB_KEY_ID);
        buffer.extend_from_slice(&self.key_size.to_le_bytes());
        buffer.push(self.key_type);
        buffer.push(0);
        buffer
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let mut id = [0u8; 4];
        cursor.read_exact(&mut id)?;
        if id != PUB_KEY_ID {
            return Err(ContainerError::invalid_image_data(
                "Public key header signature is not 'PUBK'",
            ));
        }
        let key_size = cursor.read_u16::<LittleEndian>()?;
        let key_type = cursor.read_u8()?;
        Ok(Self { key_size, key_type })
    }
}

/// Signature header: `"SIGN"`, signature size, signature type, hash algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub sig_size: u16,
    pub sig_type: u8,
    pub hash_alg: HashAlg,
}

impl SignatureHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(SIGNATURE_HDR_SIZE);
        buffer.extend_from_slice(&SIGNATURE_ID);
        buffer.write_u16::<LittleEndian>(self.sig_size)?;
        buffer.write_u8(self.sig_type)?;
        buffer.write_u8(self.hash_alg as u8)?;
        Ok(buffer)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let mut id = [0u8; 4];
        cursor.read_exact(&mut id)?;
        if id != SIGNATURE_ID {
            return Err(ContainerError::invalid_image_data(
                "Signature header signature is not 'SIGN'",
            ));
        }
        Ok(Self {
            sig_size: cursor.read_u16::<LittleEndian>()?,
            sig_type: cursor.read_u8()?,
            hash_alg: HashAlg::try_from(cursor.read_u8()?)?,
        })
    }
}

/// Assemble a public key blob from a big-endian modulus and the exponent
pub fn build_public_key(modulus: &[u8], exponent: u32) -> Result<Vec<u8>> {
    let key_size = u16::try_from(modulus.len() + RSA_EXPONENT_SIZE).map_err(|_| {
        ContainerError::invalid_image_data(format!("RSA modulus too long: {}", modulus.len()))
    })?;
    let mut key = PubKeyHeader {
        key_size,
        key_type: KEY_TYPE_RSA,
    }
    .to_bytes();
    key.extend_from_slice(modulus);
    key.extend_from_slice(&exponent.to_be_bytes());
    Ok(key)
}

/// Hash of the key material, skipping the `PUB_KEY_HDR`
pub fn pub_key_hash(pub_key: &[u8], hash: HashAlg) -> Result<Vec<u8>> {
    let material = pub_key.get(PUB_KEY_HDR_SIZE..).ok_or_else(|| {
        ContainerError::invalid_image_data("Public key blob shorter than its header")
    })?;
    Ok(digest(hash, material))
}

/// Signed authentication data: signature header + signature + public key
pub fn build_envelope(signature: &[u8], hash: HashAlg, pub_key: &[u8]) -> Result<Vec<u8>> {
    let sig_size = u16::try_from(signature.len()).map_err(|_| {
        ContainerError::invalid_image_data(format!("Signature too long: {}", signature.len()))
    })?;
    let mut envelope = SignatureHeader {
        sig_size,
        sig_type: SIG_TYPE_RSA_PKCS1,
        hash_alg: hash,
    }
    .to_bytes()?;
    envelope.extend_from_slice(signature);
    envelope.extend_from_slice(pub_key);
    Ok(envelope)
}

/// Borrowed view of a signed envelope
#[derive(Debug)]
pub struct Envelope<'a> {
    pub header: SignatureHeader,
    pub signature: &'a [u8],
    pub pub_key: &'a [u8],
}

pub fn parse_envelope(auth_data: &[u8]) -> Result<Envelope<'_>> {
    let header = SignatureHeader::from_bytes(auth_data)?;
    let sig_end = SIGNATURE_HDR_SIZE + header.sig_size as usize;
    let signature = auth_data
        .get(SIGNATURE_HDR_SIZE..sig_end)
        .ok_or_else(|| ContainerError::invalid_image_data("Signature envelope truncated"))?;
    let pub_key = &auth_data[sig_end..];
    PubKeyHeader::from_bytes(pub_key)?;
    Ok(Envelope {
        header,
        signature,
        pub_key,
    })
}

/// Hash and authentication bytes computed for one blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    /// Digest for SHA types, public key hash for RSA types
    pub hash_data: Vec<u8>,
    /// Signature envelope for RSA types, empty otherwise
    pub auth_data: Vec<u8>,
}

/// Computes authentication data with a fixed signer and signing hash
pub struct Authenticator<'a> {
    signer: &'a dyn Signer,
    hash: HashAlg,
}

impl<'a> Authenticator<'a> {
    pub fn new(signer: &'a dyn Signer, hash: HashAlg) -> Self {
        Self { signer, hash }
    }

    pub fn hash_alg(&self) -> HashAlg {
        self.hash
    }

    pub fn signer(&self) -> &dyn Signer {
        self.signer
    }

    /// Compute hash and auth data of `data` for `auth`
    pub fn authenticate(&self, data: &[u8], auth: AuthType, key: Option<&Path>) -> Result<AuthInfo> {
        match auth {
            AuthType::None => Ok(AuthInfo::default()),
            AuthType::Sha2_256 | AuthType::Sha2_384 => {
                let alg = auth
                    .hash_alg()
                    .ok_or_else(|| ContainerError::unsupported_auth_type(auth.as_str()))?;
                Ok(AuthInfo {
                    hash_data: digest(alg, data),
                    auth_data: Vec::new(),
                })
            }
            AuthType::Rsa2048 | AuthType::Rsa3072 => {
                let key = require_key(auth, key)?;
                let pub_key = self.signer.public_key(key)?;
                let hash_data = pub_key_hash(&pub_key, self.hash)?;
                let signature = self.signer.sign(key, self.hash, data)?;
                let auth_data = build_envelope(&signature, self.hash, &pub_key)?;

                let expected = auth_size(auth, true);
                if auth_data.len() != expected {
                    return Err(ContainerError::AuthLengthMismatch {
                        what: format!("{} key '{}'", auth, key.display()),
                        expected,
                        actual: auth_data.len(),
                    });
                }
                Ok(AuthInfo {
                    hash_data,
                    auth_data,
                })
            }
        }
    }
}

/// The key path for RSA auth, which must name an existing file
pub fn require_key(auth: AuthType, key: Option<&Path>) -> Result<&Path> {
    match key {
        Some(path) if path.is_file() => Ok(path),
        other => Err(ContainerError::MissingKey {
            auth: auth.to_string(),
            key: other.map(|p| p.display().to_string()).unwrap_or_default(),
        }),
    }
}

/// Hash a pre-authenticated blob the way [`Authenticator::authenticate`] would have
///
/// For RSA types the public key is taken from the envelope and hashed with `hash`.
pub fn rehash(data: &[u8], auth: AuthType, auth_data: &[u8], hash: HashAlg) -> Result<Vec<u8>> {
    match auth {
        AuthType::None => Ok(Vec::new()),
        AuthType::Sha2_256 | AuthType::Sha2_384 => Ok(auth
            .hash_alg()
            .map(|alg| digest(alg, data))
            .unwrap_or_default()),
        AuthType::Rsa2048 | AuthType::Rsa3072 => {
            let envelope = parse_envelope(auth_data)?;
            pub_key_hash(envelope.pub_key, hash)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FixedSigner {
        key_size: usize,
    }

    impl Signer for FixedSigner {
        fn public_key(&self, _priv_key: &Path) -> Result<Vec<u8>> {
            build_public_key(&vec![0xC5; self.key_size], 0x10001)
        }

        fn sign(&self, _priv_key: &Path, _hash: HashAlg, data: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![data.len() as u8; self.key_size])
        }
    }

    #[test]
    fn test_auth_size_table() {
        assert_eq!(auth_size(AuthType::None, false), 0);
        assert_eq!(auth_size(AuthType::None, true), 0);
        assert_eq!(auth_size(AuthType::Sha2_256, false), 32);
        assert_eq!(auth_size(AuthType::Sha2_384, false), 48);
        assert_eq!(auth_size(AuthType::Sha2_256, true), 0);
        assert_eq!(auth_size(AuthType::Sha2_384, true), 0);
        assert_eq!(auth_size(AuthType::Rsa2048, false), 256);
        assert_eq!(auth_size(AuthType::Rsa3072, false), 384);
        assert_eq!(
            auth_size(AuthType::Rsa2048, true),
            2 * 256 + PUB_KEY_HDR_SIZE + SIGNATURE_HDR_SIZE + 4
        );
        assert_eq!(auth_size(AuthType::Rsa2048, true), 532);
        assert_eq!(auth_size(AuthType::Rsa3072, true), 788);
    }

    #[test]
    fn test_digest_sizes() {
        assert_eq!(digest(HashAlg::Sha2_256, b"abc").len(), 32);
        assert_eq!(digest(HashAlg::Sha2_384, b"abc").len(), 48);
        assert_eq!(
            hex::encode(digest(HashAlg::Sha2_256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_envelope_layout() {
        let pub_key = build_public_key(&[0x11; 256], 0x10001).unwrap();
        assert_eq!(pub_key.len(), PUB_KEY_HDR_SIZE + 256 + 4);
        assert_eq!(&pub_key[0..4], b"PUBK");
        assert_eq!(&pub_key[pub_key.len() - 4..], &[0, 1, 0, 1]);

        let envelope = build_envelope(&[0x22; 256], HashAlg::Sha2_256, &pub_key).unwrap();
        assert_eq!(envelope.len(), auth_size(AuthType::Rsa2048, true));
        assert_eq!(&envelope[0..4], b"SIGN");

        let parsed = parse_envelope(&envelope).unwrap();
        assert_eq!(parsed.header.sig_size, 256);
        assert_eq!(parsed.header.hash_alg, HashAlg::Sha2_256);
        assert_eq!(parsed.signature, &[0x22; 256][..]);
        assert_eq!(parsed.pub_key, &pub_key[..]);
    }

    #[test]
    fn test_authenticate_hash_types() {
        let signer = FixedSigner { key_size: 256 };
        let auth = Authenticator::new(&signer, HashAlg::Sha2_256);

        let info = auth.authenticate(b"payload", AuthType::None, None).unwrap();
        assert_eq!(info, AuthInfo::default());

        let info = auth.authenticate(b"payload", AuthType::Sha2_384, None).unwrap();
        assert_eq!(info.hash_data, digest(HashAlg::Sha2_384, b"payload"));
        assert!(info.auth_data.is_empty());
    }

    #[test]
    fn test_authenticate_rsa() {
        let mut key = tempfile::NamedTempFile::new().unwrap();
        key.write_all(b"key").unwrap();

        let signer = FixedSigner { key_size: 384 };
        let auth = Authenticator::new(&signer, HashAlg::Sha2_384);
        let info = auth
            .authenticate(b"payload", AuthType::Rsa3072, Some(key.path()))
            .unwrap();
        assert_eq!(info.auth_data.len(), 788);
        assert_eq!(info.hash_data.len(), 48);
        assert_eq!(
            rehash(b"other", AuthType::Rsa3072, &info.auth_data, HashAlg::Sha2_384).unwrap(),
            info.hash_data
        );

        // a 2048-bit key cannot produce an RSA3072 envelope
        let small = FixedSigner { key_size: 256 };
        let auth = Authenticator::new(&small, HashAlg::Sha2_256);
        assert!(matches!(
            auth.authenticate(b"payload", AuthType::Rsa3072, Some(key.path())),
            Err(ContainerError::AuthLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_rsa_requires_key() {
        let signer = FixedSigner { key_size: 256 };
        let auth = Authenticator::new(&signer, HashAlg::Sha2_256);
        assert!(matches!(
            auth.authenticate(b"x", AuthType::Rsa2048, None),
            Err(ContainerError::MissingKey { .. })
        ));
        assert!(matches!(
            auth.authenticate(b"x", AuthType::Rsa2048, Some(Path::new("/nonexistent/key.pem"))),
            Err(ContainerError::MissingKey { .. })
        ));
    }
}
