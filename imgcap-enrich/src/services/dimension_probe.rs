//! Pixel dimension probe
//!
//! Reads only the image header. The decoder is chosen from the file content,
//! not the cache filename's extension, since the extension is a guess taken
//! from the URL. Unreadable or unsupported files (SVG included) yield unknown
//! dimensions instead of failing the row.

use crate::models::Dimensions;
use image::ImageReader;
use std::path::Path;

/// Probe width/height of a local image
pub async fn probe_dimensions(path: &Path) -> Dimensions {
    let owned = path.to_path_buf();
    let probed = tokio::task::spawn_blocking(move || read_dimensions(&owned)).await;

    match probed {
        Ok(Ok((width, height))) => Dimensions::new(width, height),
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read image dimensions");
            Dimensions::unknown()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Dimension probe task failed");
            Dimensions::unknown()
        }
    }
}

fn read_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}
