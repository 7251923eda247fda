use crate::compression::Compressor;
use crate::error::{ContainerError, Result};
use crate::lz_header::LzHeader;
use crate::shell::Shell;
use crate::types::CompressAlg;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs the external `Lz4Compress` / `LzmaCompress` tools
///
/// The tools read and write plain files, so input and output are staged as
/// `gencontainer.<alg>.in` / `.out` inside the work directory.
#[derive(Debug, Clone)]
pub struct ToolCompressor {
    alg: CompressAlg,
    tool_dir: PathBuf,
    work_dir: PathBuf,
    echo: bool,
}

impl ToolCompressor {
    pub fn new(alg: CompressAlg, tool_dir: &Path, work_dir: &Path, echo: bool) -> Self {
        Self {
            alg,
            tool_dir: tool_dir.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            echo,
        }
    }

    pub fn tool_path(&self) -> PathBuf {
        self.tool_dir.join(format!("{}Compress", self.alg))
    }

    fn stage_paths(&self) -> (PathBuf, PathBuf) {
        let stem = format!("gencontainer.{}", self.alg.as_str().to_lowercase());
        (
            self.work_dir.join(format!("{stem}.in")),
            self.work_dir.join(format!("{stem}.out")),
        )
    }

    fn run(&self, mode: &str, input: &[u8]) -> Result<Vec<u8>> {
        let (in_file, out_file) = self.stage_paths();
        fs::write(&in_file, input)?;
        let result = Command::new(self.tool_path())
            .arg(mode)
            .arg("-o")
            .arg(&out_file)
            .arg(&in_file)
            .exec(self.echo)
            .and_then(|_| Ok(fs::read(&out_file)?));
        let _ = fs::remove_file(&in_file);
        let _ = fs::remove_file(&out_file);
        result
    }
}

impl Compressor for ToolCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let stream = if data.is_empty() {
            Vec::new()
        } else {
            self.run("-e", data)?
        };
        debug!(
            "{} compressed 0x{:X} -> 0x{:X} bytes",
            self.alg,
            data.len(),
            stream.len()
        );

        let too_large = |len: usize| {
            ContainerError::invalid_image_data(format!("Component too large: {len} bytes"))
        };
        let compressed_len = u32::try_from(stream.len()).map_err(|_| too_large(stream.len()))?;
        let length = u32::try_from(data.len()).map_err(|_| too_large(data.len()))?;

        let mut blob = LzHeader::new(self.alg, compressed_len, length).to_bytes()?;
        blob.extend_from_slice(&stream);
        Ok(blob)
    }

    fn decompress(&self, blob: &[u8]) -> Result<Vec<u8>> {
        let (header, payload) = LzHeader::split(blob)?;
        if header.alg()? != self.alg {
            return Err(ContainerError::UnknownBlobSignature(
                String::from_utf8_lossy(&header.signature).into_owned(),
            ));
        }
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        self.run("-d", payload)
    }

    fn algorithm(&self) -> CompressAlg {
        self.alg
    }
}
