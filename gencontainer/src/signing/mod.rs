//! RSA signing collaborator
//!
//! Key handling and the signature itself are delegated to an external tool;
//! the container core only needs the public key blob and the raw signature.

use crate::auth::{PUB_KEY_HDR_SIZE, RSA_EXPONENT_SIZE};
use crate::error::{ContainerError, Result};
use crate::types::{AuthType, HashAlg};
use std::path::Path;

pub mod openssl;

pub use openssl::OpenSslSigner;

/// External RSA signer
pub trait Signer {
    /// Public key blob for `priv_key`: `PUB_KEY_HDR` + modulus + 4-byte exponent
    fn public_key(&self, priv_key: &Path) -> Result<Vec<u8>>;

    /// Raw RSA signature of `data`, one modulus-size long
    fn sign(&self, priv_key: &Path, hash: HashAlg, data: &[u8]) -> Result<Vec<u8>>;

    /// RSA auth type matching the key size of `priv_key`
    fn key_auth_type(&self, priv_key: &Path) -> Result<AuthType> {
        let key = self.public_key(priv_key)?;
        let modulus = key
            .len()
            .saturating_sub(PUB_KEY_HDR_SIZE + RSA_EXPONENT_SIZE);
        match modulus * 8 {
            2048 => Ok(AuthType::Rsa2048),
            3072 => Ok(AuthType::Rsa3072),
            bits => Err(ContainerError::unsupported_auth_type(format!(
                "RSA{bits} ({})",
                priv_key.display()
            ))),
        }
    }
}
