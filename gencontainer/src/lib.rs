//! # gencontainer
//!
//! Builds, inspects and modifies firmware container images: a header, a
//! table of named component entries and a data area holding individually
//! compressed and optionally authenticated component regions.
//!
//! ## Example
//!
//! ```no_run
//! use gencontainer::{Context, Layout, lifecycle};
//!
//! let layout = Layout::parse(
//!     "('BOOT', 'boot.bin', 'NORMAL', 'NONE', '', 0x1000, 0),
//!      ('PLD0', 'payload.bin', 'Dummy', 'SHA2_256', '', 0, 0),",
//! )?;
//! let ctx = Context::default();
//! let image = lifecycle::create(&ctx, &layout)?;
//! println!("{}", lifecycle::view(&image)?);
//! # Ok::<(), gencontainer::ContainerError>(())
//! ```

pub mod auth;
pub mod cli;
pub mod component_entry;
pub mod compression;
pub mod config;
pub mod container;
pub mod container_header;
pub mod ctx;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod lz_header;
pub mod planner;
pub mod shell;
pub mod signing;
pub mod types;

// Re-export main types for convenience
pub use auth::{AuthInfo, Authenticator, auth_size};
pub use component_entry::ComponentEntry;
pub use compression::{Compressor, create_compressor};
pub use container::{Component, Container, MonoStatus};
pub use container_header::ContainerHeader;
pub use ctx::Context;
pub use error::{ContainerError, Result};
pub use layout::Layout;
pub use lz_header::LzHeader;
pub use signing::{OpenSslSigner, Signer};
pub use types::{AuthType, CompressAlg, HashAlg, ImageType};

/// Current version of gencontainer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
