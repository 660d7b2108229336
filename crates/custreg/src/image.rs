//! Customer photo loading.
//!
//! Images are stored as opaque blobs. Before a file is accepted it must have
//! an allowed extension, fit under the size limit, and start with a JPEG or
//! PNG signature.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::config::ImageConfig;
use crate::error::{Error, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Number of leading bytes needed to recognize a format.
const SIGNATURE_LEN: usize = 8;

/// Recognized image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG / JFIF.
    Jpeg,
    /// Portable Network Graphics.
    Png,
}

impl ImageFormat {
    /// Identify the format from the first bytes of a file.
    #[must_use]
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else if header.starts_with(JPEG_SIGNATURE) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
        }
    }
}

/// What a selected image file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    /// Detected encoding.
    pub format: ImageFormat,
    /// File size in bytes.
    pub size: u64,
}

/// Check that a file is an acceptable image without reading all of it.
///
/// # Errors
///
/// Returns an image error if the file is unreadable, has a disallowed
/// extension, is too large, or is not a JPEG or PNG.
pub fn probe(path: &Path, config: &ImageConfig) -> Result<ImageInfo> {
    check_extension(path, config)?;

    let mut file = File::open(path).map_err(|source| Error::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file
        .metadata()
        .map_err(|source| Error::ImageRead {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    check_size(path, size, config)?;

    let mut header = Vec::with_capacity(SIGNATURE_LEN);
    file.by_ref()
        .take(SIGNATURE_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|source| Error::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;
    let format = sniff_or_reject(path, &header)?;

    Ok(ImageInfo { format, size })
}

/// Read an image file fully into memory after checking it.
///
/// # Errors
///
/// Returns the same errors as [`probe`].
pub fn read_image(path: &Path, config: &ImageConfig) -> Result<Vec<u8>> {
    check_extension(path, config)?;

    let bytes = std::fs::read(path).map_err(|source| Error::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    check_size(path, bytes.len() as u64, config)?;
    let format = sniff_or_reject(path, &bytes)?;

    debug!("Read {} byte {} image from {}", bytes.len(), format, path.display());
    Ok(bytes)
}

fn check_extension(path: &Path, config: &ImageConfig) -> Result<()> {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return Err(Error::unsupported_image(path, "file has no extension"));
    };
    if !config.allows_extension(extension) {
        return Err(Error::unsupported_image(
            path,
            format!(
                "extension {extension} is not one of {}",
                config.allowed_extensions.join(", ")
            ),
        ));
    }
    Ok(())
}

fn check_size(path: &Path, size: u64, config: &ImageConfig) -> Result<()> {
    if size > config.max_bytes {
        return Err(Error::ImageTooLarge {
            path: path.to_path_buf(),
            size,
            limit: config.max_bytes,
        });
    }
    Ok(())
}

fn sniff_or_reject(path: &Path, header: &[u8]) -> Result<ImageFormat> {
    ImageFormat::sniff(header)
        .ok_or_else(|| Error::unsupported_image(path, "contents are not a JPEG or PNG image"))
}
