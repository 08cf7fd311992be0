//! scanline-export: Pure format serializers (sans-IO)
//!
//! Converts filtered frames into output files held in memory.
//! Supports PGM (ASCII `P2` and binary `P5`) and PNG.

pub mod pgm;
pub mod png;

pub use pgm::{PgmEncoding, PgmMetadata, to_pgm};
pub use png::{ExportError, to_png};
