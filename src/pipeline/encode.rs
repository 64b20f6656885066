//! Thumbnail encoding: `DynamicImage` → PNG bytes, displayable as a data URI.
//!
//! PNG keeps rendered text crisp at the reduced preview scale, where JPEG
//! artefacts make small print unreadable.

use crate::error::PreviewError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use tracing::debug;

/// A rendered preview page.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    /// 1-indexed page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded bitmap.
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl Thumbnail {
    /// `data:image/png;base64,…`, ready for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }

    /// Caption shown above the thumbnail.
    pub fn caption(&self) -> String {
        format!("Page {}", self.page_num)
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("page_num", &self.page_num)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png", &format_args!("<{} bytes>", self.png.len()))
            .finish()
    }
}

/// Encode a rendered page as a PNG thumbnail.
pub fn encode_thumbnail(page_num: usize, img: &DynamicImage) -> Result<Thumbnail, PreviewError> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| PreviewError::EncodeFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

    debug!("Encoded page {} thumbnail → {} bytes PNG", page_num, png.len());

    Ok(Thumbnail {
        page_num,
        width: img.width(),
        height: img.height(),
        png,
    })
}
