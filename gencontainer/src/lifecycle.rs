//! Container lifecycle operations: create, extract, replace, sign and view
//!
//! Every operation runs to completion against one [`Context`]. Outputs are
//! assembled in memory, written to a temporary sibling and renamed into
//! place, so a failure leaves no artifact at the final output path.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::auth::{auth_size, rehash};
use crate::component_entry::{ATTR_RESERVED, ComponentEntry};
use crate::container::{Component, Container, FILL_BYTE, MonoStatus, hex_preview};
use crate::ctx::Context;
use crate::error::{ContainerError, Result};
use crate::layout::Layout;
use crate::lz_header::{LZ_HEADER_SIZE, LzHeader};
use crate::planner::{align_up, alignment_exponent, region_size};
use crate::types::{AuthType, CompressAlg, tag_to_string};

/// Size of the 0xFF placeholder used for components without a source file
pub const PLACEHOLDER_SIZE: usize = 0x10;

/// Build a container from `layout` and write it to the output directory
pub fn create(ctx: &Context, layout: &Layout) -> Result<PathBuf> {
    layout.validate()?;
    let hdr = &layout.container;
    let mono = layout.is_mono_signing();

    let mut container = Container::new(hdr.signature, hdr.image_type, hdr.alignment)?;
    container.set_header_auth(hdr.auth_type, ctx.key_path(&hdr.key_file));
    let authenticator = ctx.authenticator();

    for comp in &layout.components {
        let alignment = if comp.alignment == 0 {
            container.alignment
        } else {
            comp.alignment
        };

        let mut entry = ComponentEntry::new(comp.name);
        entry.alignment = alignment_exponent(alignment)?;
        entry.auth_type = comp.auth_type;

        let (raw, alg) = if comp.is_mono_signature() {
            entry.attribute = ATTR_RESERVED;
            let signing: AuthType = ctx.hash_alg.into();
            if entry.auth_type != AuthType::None && entry.auth_type != signing {
                warn!(
                    "'{}' declares {}, using the signing hash {}",
                    comp.name_str(),
                    entry.auth_type,
                    signing
                );
            }
            entry.auth_type = signing;
            (vec![FILL_BYTE; PLACEHOLDER_SIZE], CompressAlg::Dummy)
        } else if comp.file.is_empty() {
            (vec![FILL_BYTE; PLACEHOLDER_SIZE], comp.compress)
        } else {
            let path = ctx.input_path(&comp.file);
            if !path.is_file() {
                return Err(ContainerError::InvalidPath(path.display().to_string()));
            }
            (fs::read(&path)?, comp.compress)
        };

        let blob = ctx.compressor(alg).compress(&raw)?;
        let key = ctx.key_path(&comp.key_file);
        let auth = authenticator.authenticate(&blob, entry.auth_type, key.as_deref())?;
        entry.hash_data = auth.hash_data;

        entry.size = if comp.size == 0 {
            let align = if mono { container.alignment } else { alignment };
            region_size(blob.len(), auth.auth_data.len(), align as usize)?
        } else {
            comp.size
        };
        debug!(
            "component {}: {} 0x{:X} -> 0x{:X} bytes, region 0x{:X}",
            comp.name_str(),
            alg,
            raw.len(),
            blob.len(),
            entry.size
        );

        container.push(Component::new(entry, blob, auth.auth_data))?;
    }

    let sg_key = if mono {
        container.set_mono_signing();
        layout
            .components
            .last()
            .and_then(|sg| ctx.key_path(&sg.key_file))
    } else {
        None
    };
    container.seal(&authenticator, sg_key.as_deref())?;
    let image = container.to_bytes()?;

    let out_file = ctx.out_dir.join(hdr.output_name());
    write_output(&out_file, &image)?;
    info!(
        "Container '{}' was created successfully at: {}",
        tag_to_string(&hdr.signature),
        out_file.display()
    );
    Ok(out_file)
}

/// Extract one component, or all of them plus a rebuild layout
///
/// Each extracted component produces `<NAME>.rgn` (blob, padding and auth
/// data) and `<NAME>.bin` (decompressed payload). Reserved entries are
/// skipped but still listed in the layout.
pub fn extract(ctx: &Context, image: &Path, name: Option<&str>) -> Result<Vec<PathBuf>> {
    let data = fs::read(image)?;
    let container = Container::from_bytes(&data)?;
    let mut written = Vec::new();

    let targets: Vec<&Component> = match name {
        Some(name) => {
            let component = container
                .find(name)
                .ok_or_else(|| ContainerError::ComponentNotFound(name.to_string()))?;
            vec![component]
        }
        None => {
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| tag_to_string(&container.header.signature));
            let layout = Layout::from_container(&container, &format!("{stem}.bin"))?;
            let layout_file = ctx
                .out_dir
                .join(format!("{}.txt", tag_to_string(&container.header.signature)));
            write_output(&layout_file, layout.to_string().as_bytes())?;
            written.push(layout_file);
            container.components.iter().collect()
        }
    };

    for component in targets {
        if component.entry.is_reserved() {
            if name.is_some() {
                warn!("'{}' is a reserved entry, nothing to extract", component.name());
            }
            continue;
        }

        let rgn_file = ctx.out_dir.join(format!("{}.rgn", component.name()));
        write_output(&rgn_file, &component.region_bytes())?;

        let alg = component.lz_header()?.alg()?;
        let payload = ctx.compressor(alg).decompress(&component.data)?;
        let bin_file = ctx.out_dir.join(format!("{}.bin", component.name()));
        write_output(&bin_file, &payload)?;
        debug!("extracted {} ({alg})", component.name());

        written.push(rgn_file);
        written.push(bin_file);
    }

    info!(
        "Components were extracted successfully at: {}",
        ctx.out_dir.display()
    );
    Ok(written)
}

/// Parameters of [`replace`]
#[derive(Debug, Clone, Default)]
pub struct ReplaceRequest {
    pub image: PathBuf,
    /// Component name, matched case-insensitively
    pub name: String,
    /// Raw component file, or a blob produced by [`sign`]
    pub file: PathBuf,
    /// Compression for a raw file; `None` reuses the component's algorithm
    pub compress: Option<CompressAlg>,
    pub key_file: Option<PathBuf>,
    /// Output file name; `None` selects `<signature>.bin`
    pub output: Option<String>,
}

/// Swap one component's payload and auth data, keeping its recorded hash
pub fn replace(ctx: &Context, req: &ReplaceRequest) -> Result<PathBuf> {
    let data = fs::read(&req.image)?;
    let mut container = Container::from_bytes(&data)?;
    if container.is_mono_signing() {
        return Err(ContainerError::MonoSignedReplace);
    }

    let component = container
        .find_mut(&req.name)
        .ok_or_else(|| ContainerError::ComponentNotFound(req.name.clone()))?;
    let auth_type = component.entry.auth_type;
    let raw = fs::read(&req.file)?;

    let (blob, hash_data, auth_data) = match presigned(&raw, auth_type) {
        Some((blob, auth_data)) => {
            debug!("using pre-signed blob {}", req.file.display());
            let hash = rehash(blob, auth_type, auth_data, ctx.hash_alg)?;
            (blob.to_vec(), hash, auth_data.to_vec())
        }
        None => {
            let alg = match req.compress {
                Some(alg) => alg,
                None => component.lz_header()?.alg()?,
            };
            let blob = ctx.compressor(alg).compress(&raw)?;
            let auth = ctx
                .authenticator()
                .authenticate(&blob, auth_type, req.key_file.as_deref())?;
            (blob, auth.hash_data, auth.auth_data)
        }
    };

    if hash_data != component.entry.hash_data {
        return Err(ContainerError::HashMismatch(component.name()));
    }
    component.data = blob;
    component.auth_data = auth_data;
    let name = component.name();

    let image = container.to_bytes()?;
    let out_name = req.output.clone().unwrap_or_else(|| {
        format!("{}.bin", tag_to_string(&container.header.signature))
    });
    let out_file = ctx.out_dir.join(out_name);
    write_output(&out_file, &image)?;
    info!(
        "Component '{name}' was replaced successfully at: {}",
        out_file.display()
    );
    Ok(out_file)
}

/// Split a file produced by [`sign`] into blob and auth data
///
/// Recognized only when the file is exactly blob, padding and the auth data
/// `auth` requires.
fn presigned(raw: &[u8], auth: AuthType) -> Option<(&[u8], &[u8])> {
    let lz = LzHeader::from_bytes(raw).ok()?;
    lz.alg().ok()?;
    let auth_start = LZ_HEADER_SIZE + align_up(lz.compressed_len as usize, 4);
    if raw.len() != auth_start + auth_size(auth, true) {
        return None;
    }
    Some((&raw[..lz.blob_len()], &raw[auth_start..]))
}

/// Parameters of [`sign`]
#[derive(Debug, Clone, Default)]
pub struct SignRequest {
    pub file: PathBuf,
    pub compress: CompressAlg,
    pub auth_type: AuthType,
    pub key_file: Option<PathBuf>,
    /// Output file name; `None` selects `<file stem>.signed`
    pub output: Option<String>,
}

/// Compress and authenticate a standalone component file
pub fn sign(ctx: &Context, req: &SignRequest) -> Result<PathBuf> {
    let raw = fs::read(&req.file)?;
    let mut blob = ctx.compressor(req.compress).compress(&raw)?;
    let auth = ctx
        .authenticator()
        .authenticate(&blob, req.auth_type, req.key_file.as_deref())?;

    blob.resize(align_up(blob.len(), 4), FILL_BYTE);
    blob.extend_from_slice(&auth.auth_data);

    let out_name = req.output.clone().unwrap_or_else(|| {
        let stem = req
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "component".to_string());
        format!("{stem}.signed")
    });
    let out_file = ctx.out_dir.join(out_name);
    write_output(&out_file, &blob)?;
    info!(
        "Component file was signed successfully at: {}",
        out_file.display()
    );
    Ok(out_file)
}

/// Write `data` next to `path` as `<name>.tmp`, then rename it into place
fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    if let Err(err) = fs::write(&tmp, data).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    debug!("wrote 0x{:X} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Structure dump of an image, with the monolithic signing check when present
pub fn view(image: &Path) -> Result<String> {
    let data = fs::read(image)?;
    let container = Container::from_bytes(&data)?;
    let mut out = container.to_string();
    if let Some(status) = container.verify_mono_signing(&data) {
        out.push_str(&format!("monolithic signing: {status}\n"));
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HeaderReport {
    pub signature: String,
    pub version: u16,
    pub data_offset: u16,
    pub data_size: u32,
    pub auth_type: String,
    pub image_type: String,
    pub flags: u8,
    pub entry_count: u8,
    pub alignment: u32,
    pub auth_data: String,
    pub auth_len: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentReport {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub attribute: u8,
    /// Alignment in bytes
    pub alignment: u64,
    pub auth_type: String,
    pub hash_data: String,
    pub auth_len: usize,
    /// Blob signature, e.g. `LZDM`
    pub compression: String,
    pub compressed_len: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ViewReport {
    pub header: HeaderReport,
    pub components: Vec<ComponentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mono_signing: Option<String>,
}

impl ViewReport {
    pub fn new(container: &Container, image: &[u8]) -> Result<Self> {
        let h = &container.header;
        let header = HeaderReport {
            signature: tag_to_string(&h.signature),
            version: h.version,
            data_offset: h.data_offset,
            data_size: h.data_size,
            auth_type: h.auth_type.to_string(),
            image_type: h.image_type.to_string(),
            flags: h.flags,
            entry_count: h.entry_count,
            alignment: container.alignment,
            auth_data: hex_preview(&container.auth_data),
            auth_len: container.auth_data.len(),
        };

        let components = container
            .components
            .iter()
            .map(|c| {
                let lz = c.lz_header()?;
                Ok(ComponentReport {
                    name: c.name(),
                    offset: c.entry.offset,
                    size: c.entry.size,
                    attribute: c.entry.attribute,
                    alignment: c.entry.alignment_bytes(),
                    auth_type: c.entry.auth_type.to_string(),
                    hash_data: hex::encode(&c.entry.hash_data),
                    auth_len: c.auth_data.len(),
                    compression: tag_to_string(&lz.signature),
                    compressed_len: lz.compressed_len,
                    length: lz.length,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            components,
            mono_signing: container
                .verify_mono_signing(image)
                .map(|status: MonoStatus| status.to_string()),
        })
    }
}

/// [`view`] as pretty-printed JSON
pub fn view_json(image: &Path) -> Result<String> {
    let data = fs::read(image)?;
    let container = Container::from_bytes(&data)?;
    let report = ViewReport::new(&container, &data)?;
    serde_json::to_string_pretty(&report)
        .map_err(|e| ContainerError::invalid_image_data(format!("JSON encoding failed: {e}")))
}
