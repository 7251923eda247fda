//! Container header record and its byte codec

use crate::error::{ContainerError, Result};
use crate::types::{AuthType, FieldValue, ImageType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of the packed header record
pub const CONTAINER_HDR_SIZE: usize = 16;

/// Current header version
pub const CONTAINER_VERSION: u16 = 1;

/// Flag bit 0: the trailing `_SG_` entry authenticates the whole data area
pub const FLAG_MONO_SIGNING: u8 = 0x01;

/// Default container alignment
pub const DEFAULT_ALIGNMENT: u32 = 0x1000;

/// Container header as laid out on disk
///
/// ```text
/// 0  signature[4]
/// 4  version      u16
/// 6  data_offset  u16
/// 8  data_size    u32
/// 12 auth_type    u8
/// 13 image_type   u8
/// 14 flags        u8
/// 15 entry_count  u8
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Identifies the container, e.g. `BOOT`
    pub signature: [u8; 4],
    pub version: u16,
    /// Offset of the data area from the header start
    pub data_offset: u16,
    /// Size of the data area
    pub data_size: u32,
    pub auth_type: AuthType,
    pub image_type: ImageType,
    pub flags: u8,
    /// Number of component entries; derived when the container is finalized
    pub entry_count: u8,
}

impl ContainerHeader {
    pub fn new(signature: [u8; 4], image_type: ImageType) -> Self {
        Self {
            signature,
            version: CONTAINER_VERSION,
            data_offset: 0,
            data_size: 0,
            auth_type: AuthType::None,
            image_type,
            flags: 0,
            entry_count: 0,
        }
    }

    pub fn is_mono_signing(&self) -> bool {
        self.flags & FLAG_MONO_SIGNING != 0
    }

    /// Serialize the header to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(CONTAINER_HDR_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write the header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.signature)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u16::<LittleEndian>(self.data_offset)?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        writer.write_u8(self.auth_type as u8)?;
        writer.write_u8(self.image_type as u8)?;
        writer.write_u8(self.flags)?;
        writer.write_u8(self.entry_count)?;
        Ok(())
    }

    /// Deserialize the header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CONTAINER_HDR_SIZE {
            return Err(ContainerError::invalid_image_data(format!(
                "Header data too short: {} bytes (expected at least {})",
                data.len(),
                CONTAINER_HDR_SIZE
            )));
        }
        Self::read_from(&mut std::io::Cursor::new(data))
    }

    /// Read the header from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        let version = reader.read_u16::<LittleEndian>()?;
        let data_offset = reader.read_u16::<LittleEndian>()?;
        let data_size = reader.read_u32::<LittleEndian>()?;
        let auth_type = AuthType::try_from(reader.read_u8()?)?;
        let image_type = ImageType::try_from(reader.read_u8()?)?;
        let flags = reader.read_u8()?;
        let entry_count = reader.read_u8()?;

        Ok(Self {
            signature,
            version,
            data_offset,
            data_size,
            auth_type,
            image_type,
            flags,
            entry_count,
        })
    }

    /// Field table in serialization order
    pub fn fields(&self) -> [(&'static str, FieldValue); 8] {
        [
            ("signature", FieldValue::Tag(self.signature)),
            ("version", FieldValue::Int(self.version.into())),
            ("data_offset", FieldValue::Int(self.data_offset.into())),
            ("data_size", FieldValue::Int(self.data_size.into())),
            ("auth_type", FieldValue::Auth(self.auth_type)),
            ("image_type", FieldValue::Image(self.image_type)),
            ("flags", FieldValue::Int(self.flags.into())),
            ("entry_count", FieldValue::Int(self.entry_count.into())),
        ]
    }
}
