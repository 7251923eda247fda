//! Compression interface
//!
//! Defines the contract every compression backend implements.

use crate::compression::{DummyCompressor, ToolCompressor};
use crate::error::Result;
use crate::types::CompressAlg;
use std::path::Path;

/// Compression backend producing and consuming complete blobs
pub trait Compressor {
    /// Compress `data` into a blob: `LzHeader` followed by the compressed stream
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Recover the original bytes from a blob produced by [`Compressor::compress`]
    fn decompress(&self, blob: &[u8]) -> Result<Vec<u8>>;

    /// Algorithm this backend implements
    fn algorithm(&self) -> CompressAlg;
}

/// Create the backend for `alg`
///
/// `Dummy` is handled natively; the real codecs run `<Alg>Compress` from
/// `tool_dir`, staging their files in `work_dir`.
pub fn create_compressor(
    alg: CompressAlg,
    tool_dir: &Path,
    work_dir: &Path,
    echo: bool,
) -> Box<dyn Compressor> {
    match alg {
        CompressAlg::Dummy => Box::new(DummyCompressor),
        CompressAlg::Lz4 | CompressAlg::Lzma => {
            Box::new(ToolCompressor::new(alg, tool_dir, work_dir, echo))
        }
    }
}
