//! Output compression
//!
//! The serialized export document is either passed through unchanged or
//! gzip-compressed. Gzip support lives behind the default-on `gzip` cargo
//! feature; requesting it from a build without the feature is an explicit
//! error, never a silent pass-through.

use crate::error::Result;

/// Compression applied to the serialized document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// Emit the serialized document unchanged
    #[default]
    None,
    /// Gzip-compress the serialized document
    Gzip,
}

impl Compression {
    /// Filename suffix for artifacts using this compression
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Compression::None => ".json",
            Compression::Gzip => ".json.gz",
        }
    }

    /// Label embedded in the artifact filename
    pub fn label(&self) -> &'static str {
        match self {
            Compression::None => "plain",
            Compression::Gzip => "gzip",
        }
    }
}

/// Compress serialized document bytes
///
/// Deterministic for fixed input. [`Compression::None`] is an identity
/// pass-through.
///
/// # Errors
///
/// Returns [`Error::CompressionUnavailable`](crate::Error::CompressionUnavailable)
/// when gzip is requested but the `gzip` feature is compiled out.
pub fn compress(bytes: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Gzip => gzip(bytes),
    }
}

#[cfg(feature = "gzip")]
fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    use flate2::Compression as Level;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Level::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(not(feature = "gzip"))]
fn gzip(_bytes: &[u8]) -> Result<Vec<u8>> {
    Err(crate::error::Error::CompressionUnavailable)
}
