//! PGM (portable graymap) serializer.
//!
//! Writes a grayscale frame as either the ASCII `P2` variant, one image
//! row per text line, or the binary `P5` variant with raw samples after
//! the header. Both use a maximum value of 255.
//!
//! Lines beginning with `#` directly after the magic number carry
//! metadata. Every PNM reader skips them.
//!
//! This is a pure function with no I/O -- it returns the file bytes.

use std::fmt::Write;

use scanline_pipeline::GrayImage;

/// Which PGM variant to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PgmEncoding {
    /// `P2`: decimal sample values, space separated, one row per line.
    #[default]
    Ascii,
    /// `P5`: one byte per sample.
    Binary,
}

impl PgmEncoding {
    const fn magic(self) -> &'static str {
        match self {
            Self::Ascii => "P2",
            Self::Binary => "P5",
        }
    }
}

/// Metadata to embed as `#` comment lines in the PGM header.
///
/// All fields are optional. When present, the corresponding comment
/// line is emitted.
#[derive(Debug, Clone, Default)]
pub struct PgmMetadata<'a> {
    /// Input filename, emitted as `# Source: <filename>`.
    pub source: Option<&'a str>,

    /// Human-readable run summary, emitted as a plain `#` comment.
    pub description: Option<&'a str>,

    /// Full `PipelineConfig` JSON, emitted as `# Config: <json>`.
    pub config_json: Option<&'a str>,
}

/// Serialize a grayscale frame into PGM bytes.
///
/// # Examples
///
/// ```
/// use scanline_export::pgm::{PgmEncoding, PgmMetadata, to_pgm};
/// use scanline_pipeline::GrayImage;
///
/// let frame = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
/// let pgm = to_pgm(&frame, PgmEncoding::Ascii, &PgmMetadata::default());
/// assert_eq!(pgm, b"P2\n2 1\n255\n0 255 \n");
/// ```
#[must_use]
pub fn to_pgm(frame: &GrayImage, encoding: PgmEncoding, metadata: &PgmMetadata<'_>) -> Vec<u8> {
    let mut header = String::new();
    let _ = writeln!(header, "{}", encoding.magic());
    if let Some(source) = metadata.source {
        for line in source.lines() {
            let _ = writeln!(header, "# Source: {line}");
        }
    }
    if let Some(description) = metadata.description {
        for line in description.lines() {
            let _ = writeln!(header, "# {line}");
        }
    }
    if let Some(config_json) = metadata.config_json {
        for line in config_json.lines() {
            let _ = writeln!(header, "# Config: {line}");
        }
    }
    let _ = writeln!(header, "{} {}", frame.width(), frame.height());
    let _ = writeln!(header, "255");

    match encoding {
        PgmEncoding::Ascii => {
            let mut out = header;
            if frame.width() > 0 {
                let row_len = frame.width() as usize;
                for row in frame.as_raw().chunks(row_len) {
                    for sample in row {
                        let _ = write!(out, "{sample} ");
                    }
                    out.push('\n');
                }
            }
            out.into_bytes()
        }
        PgmEncoding::Binary => {
            let mut out = header.into_bytes();
            out.extend_from_slice(frame.as_raw());
            out
        }
    }
}
