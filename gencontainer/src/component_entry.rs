//! Component entry record and its byte codec

use crate::error::{ContainerError, Result};
use crate::types::{AuthType, FieldValue, tag_to_string};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Size of the packed entry record, excluding the inline hash
pub const COMPONENT_ENTRY_SIZE: usize = 16;

/// Attribute bit 7: reserved placeholder entry
pub const ATTR_RESERVED: u8 = 0x80;

/// Name of the reserved entry that carries the monolithic signature
pub const MONO_SIG_NAME: &str = "_SG_";

/// Component entry as laid out on disk, followed inline by `hash_data`
///
/// ```text
/// 0  name[4]
/// 4  offset     u32   relative to the container data offset
/// 8  size       u32   reserved region size
/// 12 attribute  u8
/// 13 alignment  u8    log2 of the load alignment
/// 14 auth_type  u8
/// 15 hash_size  u8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentEntry {
    pub name: [u8; 4],
    pub offset: u32,
    pub size: u32,
    pub attribute: u8,
    pub alignment: u8,
    pub auth_type: AuthType,
    /// Image digest or public key hash; its length is the on-disk `hash_size`
    pub hash_data: Vec<u8>,
}

impl ComponentEntry {
    pub fn new(name: [u8; 4]) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn name_str(&self) -> String {
        tag_to_string(&self.name)
    }

    /// Names compare ASCII case-insensitively
    pub fn name_matches(&self, name: &[u8]) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_reserved(&self) -> bool {
        self.attribute & ATTR_RESERVED != 0
    }

    pub fn hash_size(&self) -> usize {
        self.hash_data.len()
    }

    /// Load alignment in bytes
    pub fn alignment_bytes(&self) -> u64 {
        1u64 << self.alignment
    }

    /// Serialized size including the inline hash
    pub fn encoded_len(&self) -> usize {
        COMPONENT_ENTRY_SIZE + self.hash_size()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write the entry record followed by its hash data
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let hash_size = u8::try_from(self.hash_size()).map_err(|_| {
            ContainerError::invalid_image_data(format!(
                "Hash data of '{}' is too long: {} bytes",
                self.name_str(),
                self.hash_size()
            ))
        })?;

        writer.write_all(&self.name)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_u8(self.attribute)?;
        writer.write_u8(self.alignment)?;
        writer.write_u8(self.auth_type as u8)?;
        writer.write_u8(hash_size)?;
        writer.write_all(&self.hash_data)?;
        Ok(())
    }

    /// Parse an entry and its inline hash from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < COMPONENT_ENTRY_SIZE {
            return Err(ContainerError::invalid_image_data(format!(
                "Component entry too short: {} bytes (expected at least {})",
                data.len(),
                COMPONENT_ENTRY_SIZE
            )));
        }

        let mut cursor = Cursor::new(data);
        let mut name = [0u8; 4];
        cursor.read_exact(&mut name)?;
        let offset = cursor.read_u32::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;
        let attribute = cursor.read_u8()?;
        let alignment = cursor.read_u8()?;
        let auth_type = AuthType::try_from(cursor.read_u8()?)?;
        let hash_size = cursor.read_u8()? as usize;

        if alignment >= 32 {
            return Err(ContainerError::invalid_image_data(format!(
                "Component '{}' has invalid alignment exponent {}",
                tag_to_string(&name),
                alignment
            )));
        }

        let hash_data = data
            .get(COMPONENT_ENTRY_SIZE..COMPONENT_ENTRY_SIZE + hash_size)
            .ok_or_else(|| {
                ContainerError::invalid_image_data(format!(
                    "Hash data of '{}' is truncated",
                    tag_to_string(&name)
                ))
            })?
            .to_vec();

        Ok(Self {
            name,
            offset,
            size,
            attribute,
            alignment,
            auth_type,
            hash_data,
        })
    }

    /// Field table in serialization order
    pub fn fields(&self) -> [(&'static str, FieldValue); 7] {
        [
            ("name", FieldValue::Tag(self.name)),
            ("offset", FieldValue::Int(self.offset.into())),
            ("size", FieldValue::Int(self.size.into())),
            ("attribute", FieldValue::Int(self.attribute.into())),
            ("alignment", FieldValue::Int(self.alignment.into())),
            ("auth_type", FieldValue::Auth(self.auth_type)),
            ("hash_size", FieldValue::Int(self.hash_size() as u64)),
        ]
    }
}
