//! Embedded image artifacts (`data:<mime>;base64,...`) for signatures and photos.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("not a recognised image")]
    UnknownFormat,
    #[error("not a base64 data URI")]
    NotDataUri,
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// An encoded image carried as a data URI. The empty artifact means "absent".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageArtifact(String);

impl ImageArtifact {
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Wrap an existing data URI (or remote URL) as served by the data service.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Sniff the format of raw image bytes and embed them unchanged.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let format = image::guess_format(bytes).map_err(|_| CodecError::UnknownFormat)?;
        Ok(Self::embed(format.to_mime_type(), bytes))
    }

    pub fn embed(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type of a data URI artifact.
    pub fn mime_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let (mime, _) = rest.split_once(';')?;
        Some(mime)
    }

    /// Decoded payload of a base64 data URI.
    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        let (_, payload) = self
            .0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or(CodecError::NotDataUri)?;
        Ok(STANDARD.decode(payload)?)
    }
}

/// Encode an RGBA raster as a PNG data URI.
pub fn encode_png(raster: &RgbaImage) -> Result<ImageArtifact, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    raster.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(ImageArtifact::embed("image/png", buffer.get_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_round_trip_preserves_pixels() {
        let mut raster = RgbaImage::new(4, 3);
        raster.put_pixel(1, 2, Rgba([15, 23, 42, 255]));

        let artifact = encode_png(&raster).unwrap();
        assert_eq!(artifact.mime_type(), Some("image/png"));
        assert!(artifact.as_str().starts_with("data:image/png;base64,"));

        let bytes = artifact.decode().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(1, 2), &Rgba([15, 23, 42, 255]));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn sniffs_photo_bytes() {
        let raster = RgbaImage::new(2, 2);
        let png = encode_png(&raster).unwrap().decode().unwrap();
        let photo = ImageArtifact::from_image_bytes(&png).unwrap();
        assert_eq!(photo.mime_type(), Some("image/png"));
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(matches!(
            ImageArtifact::from_image_bytes(b"definitely not an image"),
            Err(CodecError::UnknownFormat)
        ));
    }

    #[test]
    fn empty_artifact_is_absent() {
        assert!(ImageArtifact::empty().is_empty());
        assert!(ImageArtifact::default().decode().is_err());
    }
}
