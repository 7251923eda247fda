//! Header prefixed to every compressed component blob

use crate::error::{ContainerError, Result};
use crate::types::CompressAlg;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Size of the packed blob header
pub const LZ_HEADER_SIZE: usize = 16;

/// Compressed blob header
///
/// The payload length is always taken from `compressed_len`, never from the
/// region size recorded in the component entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LzHeader {
    pub signature: [u8; 4],
    /// Length of the compressed stream following the header
    pub compressed_len: u32,
    /// Length of the original, uncompressed data
    pub length: u32,
    pub version: u16,
    pub svn: u8,
    pub attribute: u8,
}

impl LzHeader {
    pub fn new(alg: CompressAlg, compressed_len: u32, length: u32) -> Self {
        Self {
            signature: alg.signature(),
            compressed_len,
            length,
            version: 0,
            svn: 0,
            attribute: 0,
        }
    }

    pub fn alg(&self) -> Result<CompressAlg> {
        CompressAlg::from_signature(&self.signature)
    }

    /// Header plus compressed stream
    pub fn blob_len(&self) -> usize {
        LZ_HEADER_SIZE + self.compressed_len as usize
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(LZ_HEADER_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.signature)?;
        writer.write_u32::<LittleEndian>(self.compressed_len)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u8(self.svn)?;
        writer.write_u8(self.attribute)?;
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < LZ_HEADER_SIZE {
            return Err(ContainerError::invalid_image_data(format!(
                "Compressed blob too short: {} bytes (expected at least {})",
                data.len(),
                LZ_HEADER_SIZE
            )));
        }

        let mut cursor = Cursor::new(data);
        let mut signature = [0u8; 4];
        cursor.read_exact(&mut signature)?;
        Ok(Self {
            signature,
            compressed_len: cursor.read_u32::<LittleEndian>()?,
            length: cursor.read_u32::<LittleEndian>()?,
            version: cursor.read_u16::<LittleEndian>()?,
            svn: cursor.read_u8()?,
            attribute: cursor.read_u8()?,
        })
    }

    /// Split a full blob into header and compressed stream, checking bounds
    pub fn split(blob: &[u8]) -> Result<(Self, &[u8])> {
        let header = Self::from_bytes(blob)?;
        let payload = blob.get(LZ_HEADER_SIZE..header.blob_len()).ok_or_else(|| {
            ContainerError::invalid_image_data(format!(
                "Compressed blob truncated: header claims 0x{:X} bytes, have 0x{:X}",
                header.compressed_len,
                blob.len().saturating_sub(LZ_HEADER_SIZE)
            ))
        })?;
        Ok((header, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lz_header_layout() {
        let header = LzHeader::new(CompressAlg::Lz4, 0x20, 0x80);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), LZ_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"LZ4 ");
        assert_eq!(&bytes[4..8], &[0x20, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0x80, 0, 0, 0]);
        assert_eq!(LzHeader::from_bytes(&bytes).unwrap(), header);
        assert_eq!(header.blob_len(), 0x30);
    }

    #[test]
    fn test_split_checks_bounds() {
        let mut blob = LzHeader::new(CompressAlg::Dummy, 8, 8).to_bytes().unwrap();
        blob.extend_from_slice(&[1, 2, 3, 4]);
        assert!(LzHeader::split(&blob).is_err());

        blob.extend_from_slice(&[5, 6, 7, 8, 0xFF]);
        let (header, payload) = LzHeader::split(&blob).unwrap();
        assert_eq!(header.alg().unwrap(), CompressAlg::Dummy);
        assert_eq!(payload, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
