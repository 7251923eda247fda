use std::path::{Path, PathBuf};

use crate::auth::Authenticator;
use crate::compression::{Compressor, create_compressor};
use crate::signing::{OpenSslSigner, Signer};
use crate::types::{CompressAlg, HashAlg};

/// Per-invocation settings shared by every lifecycle operation
///
/// Built once from the command line and configuration file; directories are
/// read-only afterwards except `out_dir`.
pub struct Context {
    /// Where containers, extracted files and staged tool files are written
    pub out_dir: PathBuf,
    /// Base for relative component file paths
    pub input_dir: PathBuf,
    /// Base for relative key file paths
    pub key_dir: PathBuf,
    /// Location of the external compression tools
    pub tool_dir: PathBuf,
    /// Hash used for RSA signing and public key hashes
    pub hash_alg: HashAlg,
    /// Echo external tool command lines
    pub echo: bool,
    signer: Box<dyn Signer>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Box::new(OpenSslSigner::default()))
    }
}

impl Context {
    pub fn new(signer: Box<dyn Signer>) -> Self {
        Self {
            out_dir: PathBuf::from("."),
            input_dir: PathBuf::from("."),
            key_dir: PathBuf::from("."),
            tool_dir: PathBuf::from("."),
            hash_alg: HashAlg::default(),
            echo: true,
            signer,
        }
    }

    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    pub fn authenticator(&self) -> Authenticator<'_> {
        Authenticator::new(self.signer.as_ref(), self.hash_alg)
    }

    pub fn compressor(&self, alg: CompressAlg) -> Box<dyn Compressor> {
        create_compressor(alg, &self.tool_dir, &self.out_dir, self.echo)
    }

    /// Resolve a component file against `input_dir`
    pub fn input_path(&self, file: &str) -> PathBuf {
        resolve(&self.input_dir, file)
    }

    /// Resolve a key file against `key_dir`; an empty name means no key
    pub fn key_path(&self, file: &str) -> Option<PathBuf> {
        if file.trim().is_empty() {
            None
        } else {
            Some(resolve(&self.key_dir, file))
        }
    }
}

fn resolve(base: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
