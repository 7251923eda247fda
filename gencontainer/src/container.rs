//! In-memory container model: assembly, finalize, serialization and parsing

use crate::auth::{Authenticator, auth_size, digest, parse_envelope, pub_key_hash};
use crate::component_entry::{ComponentEntry, MONO_SIG_NAME};
use crate::container_header::{
    CONTAINER_HDR_SIZE, ContainerHeader, DEFAULT_ALIGNMENT, FLAG_MONO_SIGNING,
};
use crate::error::{ContainerError, Result};
use crate::lz_header::LzHeader;
use crate::planner::{self, Slot, align_up, padding_len};
use crate::types::{AuthType, FieldValue, ImageType};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

/// Fill byte used for every gap in the image
pub const FILL_BYTE: u8 = 0xFF;

/// Maximum number of entries the 8-bit entry count can describe
pub const MAX_ENTRIES: usize = u8::MAX as usize;

const FIELD_WIDTH: usize = 18;

/// One component: its entry record plus the bytes stored in its region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub entry: ComponentEntry,
    /// Compressed blob, starting with an [`LzHeader`]
    pub data: Vec<u8>,
    /// Signature envelope for RSA types, empty otherwise
    pub auth_data: Vec<u8>,
}

impl Component {
    pub fn new(entry: ComponentEntry, data: Vec<u8>, auth_data: Vec<u8>) -> Self {
        Self {
            entry,
            data,
            auth_data,
        }
    }

    pub fn name(&self) -> String {
        self.entry.name_str()
    }

    pub fn lz_header(&self) -> Result<LzHeader> {
        LzHeader::from_bytes(&self.data)
    }

    /// Blob, 0xFF padding to 4 bytes, then auth data
    pub fn region_bytes(&self) -> Vec<u8> {
        let mut region = self.data.clone();
        region.extend(std::iter::repeat_n(FILL_BYTE, padding_len(self.data.len())));
        region.extend_from_slice(&self.auth_data);
        region
    }
}

/// Result of checking the monolithic `_SG_` entry against the bytes it covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonoStatus {
    /// The stored digest equals the digest of the covered bytes
    Match,
    /// Digest or key hash differs
    Mismatch,
    /// RSA: the embedded key matches the stored key hash; the signature itself is not checked
    KeyOnly,
    /// The entry carries no authentication
    Unauthenticated,
}

impl fmt::Display for MonoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Match => "digest matches",
            Self::Mismatch => "MISMATCH",
            Self::KeyOnly => "public key hash matches, signature not checked",
            Self::Unauthenticated => "not authenticated",
        })
    }
}

/// A container being built or one parsed from an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub header: ContainerHeader,
    /// Container alignment in bytes; not serialized
    pub alignment: u32,
    /// Key for the header authentication
    pub priv_key: Option<PathBuf>,
    /// Header authentication data
    pub auth_data: Vec<u8>,
    pub components: Vec<Component>,
}

impl Container {
    /// Create an empty container. A zero alignment selects the default.
    pub fn new(signature: [u8; 4], image_type: ImageType, alignment: u32) -> Result<Self> {
        let alignment = if alignment == 0 {
            DEFAULT_ALIGNMENT
        } else {
            alignment
        };
        planner::alignment_exponent(alignment)?;
        Ok(Self {
            header: ContainerHeader::new(signature, image_type),
            alignment,
            priv_key: None,
            auth_data: Vec::new(),
            components: Vec::new(),
        })
    }

    /// Set the header auth type and reserve its authentication data
    pub fn set_header_auth(&mut self, auth: AuthType, priv_key: Option<PathBuf>) {
        self.header.auth_type = auth;
        self.priv_key = priv_key;
        self.auth_data = vec![FILL_BYTE; auth_size(auth, true)];
    }

    pub fn is_mono_signing(&self) -> bool {
        self.header.is_mono_signing()
    }

    /// Append a component, enforcing unique names and the `_SG_`-last rule
    pub fn push(&mut self, component: Component) -> Result<()> {
        if let Some(last) = self.components.last() {
            if last.entry.is_reserved() && last.entry.name_matches(MONO_SIG_NAME.as_bytes()) {
                return Err(ContainerError::MonoSigningNotLast(MONO_SIG_NAME.to_string()));
            }
        }
        if self
            .components
            .iter()
            .any(|c| c.entry.name_matches(&component.entry.name))
        {
            return Err(ContainerError::DuplicateName(component.name()));
        }
        if self.components.len() >= MAX_ENTRIES {
            return Err(ContainerError::TooManyEntries {
                count: self.components.len() + 1,
                max: MAX_ENTRIES,
            });
        }
        self.components.push(component);
        Ok(())
    }

    /// Header, entries with inline hashes: the bytes covered by header authentication
    pub fn records_bytes(&self) -> Result<Vec<u8>> {
        let mut data = self.header.to_bytes()?;
        for component in &self.components {
            component.entry.write_to(&mut data)?;
        }
        Ok(data)
    }

    /// Serialized header size: records padded to 4 bytes plus header auth data
    pub fn header_size(&self) -> usize {
        let records: usize = CONTAINER_HDR_SIZE
            + self
                .components
                .iter()
                .map(|c| c.entry.encoded_len())
                .sum::<usize>();
        align_up(records, 4) + auth_size(self.header.auth_type, true)
    }

    /// Assign component offsets in declaration order
    pub fn plan(&mut self) -> Result<()> {
        let slots: Vec<Slot> = self
            .components
            .iter()
            .map(|c| Slot {
                alignment: 1usize << c.entry.alignment,
                size: c.entry.size,
            })
            .collect();
        let offsets = planner::place(self.header_size(), &slots, self.is_mono_signing())?;
        for (component, offset) in self.components.iter_mut().zip(offsets) {
            component.entry.offset = offset;
        }
        Ok(())
    }

    /// Fix entry count, data offset and data size, then authenticate the header
    ///
    /// A provisional pass fills the header auth data with 0xFF instead of
    /// calling the signer; only the data area of a provisional image is used.
    pub fn finalize(&mut self, auth: &Authenticator, provisional: bool) -> Result<()> {
        self.header.entry_count =
            u8::try_from(self.components.len()).map_err(|_| ContainerError::TooManyEntries {
                count: self.components.len(),
                max: MAX_ENTRIES,
            })?;

        let align = self.alignment as usize;
        let data_offset = align_up(self.header_size(), align);
        self.header.data_offset =
            u16::try_from(data_offset).map_err(|_| ContainerError::HeaderTooLarge(data_offset))?;

        let data_end = self
            .components
            .last()
            .map_or(0, |c| c.entry.offset as usize + c.entry.size as usize);
        let data_size = align_up(data_end, align);
        self.header.data_size = u32::try_from(data_size).map_err(|_| {
            ContainerError::invalid_image_data(format!("Data size 0x{data_size:X} exceeds 32 bits"))
        })?;
        debug!(
            "finalize{}: data_offset 0x{:X} data_size 0x{:X}",
            if provisional { " (provisional)" } else { "" },
            data_offset,
            data_size
        );

        let expected = auth_size(self.header.auth_type, true);
        if provisional {
            self.auth_data = vec![FILL_BYTE; expected];
            return Ok(());
        }

        let records = self.records_bytes()?;
        let info = auth.authenticate(&records, self.header.auth_type, self.priv_key.as_deref())?;
        if info.auth_data.len() != expected {
            return Err(ContainerError::AuthLengthMismatch {
                what: "container header".to_string(),
                expected,
                actual: info.auth_data.len(),
            });
        }
        self.auth_data = info.auth_data;
        Ok(())
    }

    /// Plan, then finalize; in monolithic mode the trailing `_SG_` entry is
    /// authenticated over the provisional data area preceding it first
    pub fn seal(&mut self, auth: &Authenticator, sg_key: Option<&Path>) -> Result<()> {
        self.plan()?;
        if self.is_mono_signing() {
            self.finalize(auth, true)?;
            let image = self.to_bytes()?;
            let data_offset = self.header.data_offset as usize;
            let sg = self
                .components
                .last_mut()
                .ok_or_else(|| ContainerError::ComponentNotFound(MONO_SIG_NAME.to_string()))?;
            let covered = &image[data_offset..data_offset + sg.entry.offset as usize];
            debug!("monolithic signing over 0x{:X} bytes", covered.len());

            let info = auth.authenticate(covered, sg.entry.auth_type, sg_key)?;
            if info.hash_data.len() != sg.entry.hash_size() {
                return Err(ContainerError::AuthLengthMismatch {
                    what: format!("'{MONO_SIG_NAME}' hash"),
                    expected: sg.entry.hash_size(),
                    actual: info.hash_data.len(),
                });
            }
            sg.entry.hash_data = info.hash_data;
            sg.auth_data = info.auth_data;
        }
        self.finalize(auth, false)
    }

    /// Mark the container for monolithic signing
    pub fn set_mono_signing(&mut self) {
        self.header.flags |= FLAG_MONO_SIGNING;
    }

    /// Serialize the whole image
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = self.records_bytes()?;
        data.resize(align_up(data.len(), 4), FILL_BYTE);
        data.extend_from_slice(&self.auth_data);

        let data_offset = self.header.data_offset as usize;
        for component in &self.components {
            let offset = data_offset + component.entry.offset as usize;
            if offset < data.len() {
                return Err(ContainerError::invalid_image_data(format!(
                    "Component '{}' at 0x{:X} overlaps preceding data ending at 0x{:X}",
                    component.name(),
                    offset,
                    data.len()
                )));
            }
            data.resize(offset, FILL_BYTE);

            let region = component.region_bytes();
            if region.len() > component.entry.size as usize {
                return Err(ContainerError::RegionTooSmall {
                    name: component.name(),
                    needed: region.len(),
                    size: component.entry.size,
                });
            }
            data.extend_from_slice(&region);
        }

        let end = data_offset + self.header.data_size as usize;
        if end > data.len() {
            data.resize(end, FILL_BYTE);
        }
        Ok(data)
    }

    /// Parse an image
    ///
    /// Payload length comes from each blob's [`LzHeader`]; `entry.size` is
    /// only the reserved capacity. The container alignment is inferred from
    /// the first component.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = ContainerHeader::from_bytes(data)?;
        let data_offset = header.data_offset as usize;

        let mut offset = CONTAINER_HDR_SIZE;
        let mut components = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let record = data.get(offset..).ok_or_else(|| {
                ContainerError::invalid_image_data("Component entries run past end of image")
            })?;
            let entry = ComponentEntry::from_bytes(record)?;
            offset += entry.encoded_len();

            let start = data_offset + entry.offset as usize;
            let blob = data.get(start..).ok_or_else(|| {
                ContainerError::invalid_image_data(format!(
                    "Component '{}' starts past end of image",
                    entry.name_str()
                ))
            })?;
            let lz = LzHeader::from_bytes(blob)?;
            let blob = blob.get(..lz.blob_len()).ok_or_else(|| {
                ContainerError::invalid_image_data(format!(
                    "Component '{}' blob is truncated",
                    entry.name_str()
                ))
            })?;

            let auth_start = align_up(start + blob.len(), 4);
            let auth_len = auth_size(entry.auth_type, true);
            let auth_data = data.get(auth_start..auth_start + auth_len).ok_or_else(|| {
                ContainerError::invalid_image_data(format!(
                    "Component '{}' auth data is truncated",
                    entry.name_str()
                ))
            })?;

            components.push(Component::new(entry, blob.to_vec(), auth_data.to_vec()));
        }

        let auth_start = align_up(offset, 4);
        let auth_len = auth_size(header.auth_type, true);
        let auth_data = data
            .get(auth_start..auth_start + auth_len)
            .ok_or_else(|| ContainerError::invalid_image_data("Header auth data is truncated"))?
            .to_vec();

        let alignment = components
            .first()
            .map_or(DEFAULT_ALIGNMENT, |c| 1u32 << c.entry.alignment);

        Ok(Self {
            header,
            alignment,
            priv_key: None,
            auth_data,
            components,
        })
    }

    /// Find a component by name, ignoring ASCII case
    pub fn find(&self, name: &str) -> Option<&Component> {
        self.position(name).map(|idx| &self.components[idx])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.position(name).map(move |idx| &mut self.components[idx])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.entry.name_matches(name.as_bytes()))
    }

    /// Bytes of `image` the `_SG_` entry authenticates, if monolithically signed
    pub fn mono_signed_range<'a>(&self, image: &'a [u8]) -> Option<&'a [u8]> {
        if !self.is_mono_signing() {
            return None;
        }
        let sg = self.components.last()?;
        let start = self.header.data_offset as usize;
        image.get(start..start + sg.entry.offset as usize)
    }

    /// Check the `_SG_` entry against the bytes of `image` it covers
    pub fn verify_mono_signing(&self, image: &[u8]) -> Option<MonoStatus> {
        let covered = self.mono_signed_range(image)?;
        let sg = self.components.last()?;
        let status = match sg.entry.auth_type {
            AuthType::None => MonoStatus::Unauthenticated,
            AuthType::Sha2_256 | AuthType::Sha2_384 => {
                let alg = sg.entry.auth_type.hash_alg()?;
                if digest(alg, covered) == sg.entry.hash_data {
                    MonoStatus::Match
                } else {
                    MonoStatus::Mismatch
                }
            }
            AuthType::Rsa2048 | AuthType::Rsa3072 => {
                let matches = parse_envelope(&sg.auth_data)
                    .and_then(|env| pub_key_hash(env.pub_key, env.header.hash_alg))
                    .is_ok_and(|hash| hash == sg.entry.hash_data);
                if matches {
                    MonoStatus::KeyOnly
                } else {
                    MonoStatus::Mismatch
                }
            }
        };
        Some(status)
    }
}

/// Human readable structure dump: field tables and byte previews
impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<CONTAINER_HDR>:")?;
        write_fields(f, &self.header.fields())?;
        writeln!(f, "{}", hex_line("alignment", &[], Some(self.alignment)))?;
        writeln!(f, "{}", hex_line("auth_data", &self.auth_data, None))?;

        for component in &self.components {
            writeln!(f, "<COMPONENT_ENTRY>:")?;
            write_fields(f, &component.entry.fields())?;
            writeln!(f, "{}", hex_line("hash_data", &component.entry.hash_data, None))?;
            writeln!(f, "{}", hex_line("auth_data", &component.auth_data, None))?;
            let tag = component
                .data
                .get(..4)
                .map(|sig| String::from_utf8_lossy(sig).into_owned())
                .unwrap_or_default();
            writeln!(f, "{} '{}'", hex_line("data", &component.data, None), tag)?;
        }
        Ok(())
    }
}

fn write_fields(out: &mut impl fmt::Write, fields: &[(&'static str, FieldValue)]) -> fmt::Result {
    for (name, value) in fields {
        writeln!(out, "  {name:<FIELD_WIDTH$} = {value}")?;
    }
    Ok(())
}

/// Short hex preview: all bytes up to 16, otherwise the first and last 8
pub fn hex_preview(data: &[u8]) -> String {
    let join = |bytes: &[u8]| {
        bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    if data.len() <= 16 {
        join(data)
    } else {
        format!("{} .... {}", join(&data[..8]), join(&data[data.len() - 8..]))
    }
}

fn hex_line(name: &str, data: &[u8], value: Option<u32>) -> String {
    match value {
        Some(v) => format!("  {name:<FIELD_WIDTH$} = 0x{v:X}"),
        None if data.is_empty() => format!("  {name:<FIELD_WIDTH$}   []"),
        None => format!(
            "  {name:<FIELD_WIDTH$}   [{}] (len=0x{:x})",
            hex_preview(data),
            data.len()
        ),
    }
}
