use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use uuid::Uuid;

use crate::error::{Error, HttpError};

/// Decodes a `data:image/…;base64,` payload into raw bytes and a file
/// extension. A bare base64 string is treated as PNG.
pub fn decode_base64_image(data: &str) -> Result<(Vec<u8>, &'static str), Error> {
    let (meta, payload) = match data.split_once(',') {
        Some((meta, payload)) => (meta, payload),
        None => ("", data),
    };

    let ext = if meta.is_empty() || meta.contains("image/png") {
        "png"
    } else if meta.contains("image/jpeg") || meta.contains("image/jpg") {
        "jpg"
    } else if meta.contains("image/gif") {
        "gif"
    } else if meta.contains("image/webp") {
        "webp"
    } else {
        return Err(HttpError::InvalidRequest.new("Unsupported image type"));
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| HttpError::InvalidRequest.new("Invalid base64 image payload"))?;

    if bytes.is_empty() {
        return Err(HttpError::InvalidRequest.new("Image must not be empty"));
    }

    Ok((bytes, ext))
}

/// Writes the image under `<media_root>/images/` and returns the URL
/// path it is served from.
pub async fn store_image(media_root: &Path, bytes: &[u8], ext: &str) -> Result<String, Error> {
    let dir = media_root.join("images");

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| HttpError::InternalServerError.new(&format!("{e}")))?;

    let filename = format!("{}.{ext}", Uuid::new_v4());

    tokio::fs::write(dir.join(&filename), bytes)
        .await
        .map_err(|e| HttpError::InternalServerError.new(&format!("{e}")))?;

    Ok(format!("/media/images/{filename}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_png_decodes() {
        let (bytes, ext) = decode_base64_image("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, "png");
    }

    #[test]
    fn jpeg_extension_is_detected() {
        let (_, ext) = decode_base64_image("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(ext, "jpg");
    }

    #[test]
    fn bare_base64_defaults_to_png() {
        let (bytes, ext) = decode_base64_image("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, "png");
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(decode_base64_image("data:image/png;base64,???").is_err());
        assert!(decode_base64_image("data:image/png;base64,").is_err());
        assert!(decode_base64_image("data:image/tiff;base64,aGVsbG8=").is_err());
    }
}
