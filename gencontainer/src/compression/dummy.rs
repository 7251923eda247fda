use crate::compression::Compressor;
use crate::error::{ContainerError, Result};
use crate::lz_header::LzHeader;
use crate::types::CompressAlg;

/// Stores data as-is behind an `LZDM` blob header
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyCompressor;

impl Compressor for DummyCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let len = u32::try_from(data.len()).map_err(|_| {
            ContainerError::invalid_image_data(format!("Component too large: {} bytes", data.len()))
        })?;
        let mut blob = LzHeader::new(CompressAlg::Dummy, len, len).to_bytes()?;
        blob.extend_from_slice(data);
        Ok(blob)
    }

    fn decompress(&self, blob: &[u8]) -> Result<Vec<u8>> {
        let (header, payload) = LzHeader::split(blob)?;
        if header.alg()? != CompressAlg::Dummy {
            return Err(ContainerError::UnknownBlobSignature(
                String::from_utf8_lossy(&header.signature).into_owned(),
            ));
        }
        Ok(payload.to_vec())
    }

    fn algorithm(&self) -> CompressAlg {
        CompressAlg::Dummy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lz_header::LZ_HEADER_SIZE;

    #[test]
    fn test_dummy_blob() {
        let blob = DummyCompressor.compress(b"firmware").unwrap();
        assert_eq!(blob.len(), LZ_HEADER_SIZE + 8);
        assert_eq!(&blob[..4], b"LZDM");
        assert_eq!(&blob[LZ_HEADER_SIZE..], b"firmware");
        assert_eq!(DummyCompressor.decompress(&blob).unwrap(), b"firmware");
    }

    #[test]
    fn test_dummy_ignores_trailing_bytes() {
        let mut blob = DummyCompressor.compress(b"abc").unwrap();
        blob.extend_from_slice(&[0xFF; 5]);
        assert_eq!(DummyCompressor.decompress(&blob).unwrap(), b"abc");
    }

    #[test]
    fn test_dummy_rejects_other_signature() {
        let mut blob = DummyCompressor.compress(b"abc").unwrap();
        blob[..4].copy_from_slice(b"LZMA");
        assert!(DummyCompressor.decompress(&blob).is_err());
    }
}
