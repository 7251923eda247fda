//! RSA signing through the `openssl` command line tool

use crate::auth::build_public_key;
use crate::error::{ContainerError, Result};
use crate::shell::Shell;
use crate::signing::Signer;
use crate::types::HashAlg;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Signer backed by an `openssl` executable
#[derive(Debug, Clone)]
pub struct OpenSslSigner {
    program: PathBuf,
    echo: bool,
}

impl OpenSslSigner {
    pub fn new(program: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            program: program.into(),
            echo,
        }
    }

    fn rsa_query(&self, priv_key: &Path, what: &str) -> Result<String> {
        let out = Command::new(&self.program)
            .arg("rsa")
            .arg("-in")
            .arg(priv_key)
            .args(["-noout", what])
            .exec(self.echo)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl Default for OpenSslSigner {
    fn default() -> Self {
        Self::new("openssl", true)
    }
}

impl Signer for OpenSslSigner {
    fn public_key(&self, priv_key: &Path) -> Result<Vec<u8>> {
        let modulus = parse_modulus(&self.rsa_query(priv_key, "-modulus")?)?;
        let exponent = parse_exponent(&self.rsa_query(priv_key, "-text")?)?;
        build_public_key(&modulus, exponent)
    }

    fn sign(&self, priv_key: &Path, hash: HashAlg, data: &[u8]) -> Result<Vec<u8>> {
        let digest = match hash {
            HashAlg::Sha2_256 => "-sha256",
            HashAlg::Sha2_384 => "-sha384",
        };
        Command::new(&self.program)
            .args(["dgst", digest, "-sign"])
            .arg(priv_key)
            .exec_with_input(data, self.echo)
    }
}

/// Big-endian modulus from `openssl rsa -noout -modulus`
fn parse_modulus(output: &str) -> Result<Vec<u8>> {
    let hex_str = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Modulus="))
        .ok_or_else(|| ContainerError::tool("openssl", "no modulus in key output"))?;
    hex::decode(hex_str.trim())
        .map_err(|e| ContainerError::tool("openssl", format!("bad modulus: {e}")))
}

/// Public exponent from `openssl rsa -noout -text`
fn parse_exponent(output: &str) -> Result<u32> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("publicExponent:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| ContainerError::tool("openssl", "no public exponent in key output"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modulus() {
        let out = "Modulus=C0FFEE01\n";
        assert_eq!(parse_modulus(out).unwrap(), vec![0xC0, 0xFF, 0xEE, 0x01]);
        assert!(parse_modulus("nothing here").is_err());
        assert!(parse_modulus("Modulus=XYZ").is_err());
    }

    #[test]
    fn test_parse_exponent() {
        let out = "Private-Key: (2048 bit, 2 primes)\nmodulus:\n    00:c0:ff\npublicExponent: 65537 (0x10001)\nprivateExponent:\n";
        assert_eq!(parse_exponent(out).unwrap(), 65537);
        assert!(parse_exponent("modulus:\n").is_err());
    }
}
