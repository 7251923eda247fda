//! Component compression
//!
//! Every compressed blob starts with an [`LzHeader`](crate::lz_header::LzHeader).
//! The container core treats the stream behind it as opaque bytes.

pub mod dummy;
pub mod tool;
pub mod traits;

pub use dummy::DummyCompressor;
pub use tool::ToolCompressor;
pub use traits::{Compressor, create_compressor};
