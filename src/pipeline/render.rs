//! Page rasterisation: the capability "render page N of a byte buffer at a
//! given scale", and its pdfium-backed implementation.
//!
//! ## Why a trait?
//!
//! The preview renderer only needs two operations, and pdfium needs a native
//! library at runtime. Keeping the capability behind [`PageRasterizer`] lets
//! the preview logic (slot placement, page cap, isolated failures) run in
//! tests with an in-memory fake.
//!
//! ## Blocking
//!
//! Every method is synchronous and CPU-bound. Callers run a whole preview
//! inside one `tokio::task::spawn_blocking` job through
//! [`PageRasterizer::render_pages`], which lets pdfium bind and parse the
//! document once for all capped pages.

use crate::error::PreviewError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Rasterises pages of an in-memory document.
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in `document`.
    fn page_count(&self, document: &[u8]) -> Result<usize, PreviewError>;

    /// Render the 0-based `page_index` of `document`, scaled by `scale`.
    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<DynamicImage, PreviewError>;

    /// Render each of `page_indices` in turn, handing every result to
    /// `on_page` as soon as it is ready. Stops early when `on_page` returns
    /// `false`. A failed page is reported and the remaining pages still run.
    fn render_pages(
        &self,
        document: &[u8],
        page_indices: &[usize],
        scale: f32,
        on_page: &mut dyn FnMut(usize, Result<DynamicImage, PreviewError>) -> bool,
    ) {
        for &idx in page_indices {
            if !on_page(idx, self.render_page(document, idx, scale)) {
                return;
            }
        }
    }
}

/// [`PageRasterizer`] backed by the pdfium library.
///
/// The library is located in this order: `PDFIUM_LIB_PATH`, the current
/// working directory, then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a pdfium library at an explicit path.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, PreviewError> {
        let unavailable = |e: PdfiumError| PreviewError::EngineUnavailable {
            detail: format!("{e:?}"),
        };

        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(&path).map_err(unavailable)?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(unavailable)?,
        };

        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, document: &[u8]) -> Result<usize, PreviewError> {
        let pdfium = self.bind()?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| PreviewError::DocumentUnreadable {
                detail: format!("{e:?}"),
            })?;
        Ok(doc.pages().len() as usize)
    }

    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<DynamicImage, PreviewError> {
        let mut rendered = None;
        self.render_pages(document, &[page_index], scale, &mut |_, result| {
            rendered = Some(result);
            false
        });
        rendered.unwrap_or_else(|| {
            Err(PreviewError::RenderFailed {
                page: page_index + 1,
                detail: "page was not rendered".to_string(),
            })
        })
    }

    fn render_pages(
        &self,
        document: &[u8],
        page_indices: &[usize],
        scale: f32,
        on_page: &mut dyn FnMut(usize, Result<DynamicImage, PreviewError>) -> bool,
    ) {
        let pdfium = self.bind();
        let doc = pdfium.as_ref().map_err(Clone::clone).and_then(|pdfium| {
            pdfium
                .load_pdf_from_byte_slice(document, None)
                .map_err(|e| PreviewError::DocumentUnreadable {
                    detail: format!("{e:?}"),
                })
        });
        let doc = match doc {
            Ok(doc) => doc,
            Err(e) => {
                for &idx in page_indices {
                    if !on_page(idx, Err(e.clone())) {
                        return;
                    }
                }
                return;
            }
        };
        let pages = doc.pages();
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);

        for &idx in page_indices {
            let result = render_one(&pages, idx, &config);
            if !on_page(idx, result) {
                return;
            }
        }
    }
}

fn render_one(
    pages: &PdfPages<'_>,
    page_index: usize,
    config: &PdfRenderConfig,
) -> Result<DynamicImage, PreviewError> {
    let page_num = page_index + 1;
    let render_failed = |e: PdfiumError| PreviewError::RenderFailed {
        page: page_num,
        detail: format!("{e:?}"),
    };

    let index = u16::try_from(page_index).map_err(|_| PreviewError::RenderFailed {
        page: page_num,
        detail: "page index exceeds pdfium's range".to_string(),
    })?;
    let page = pages.get(index).map_err(render_failed)?;
    let bitmap = page.render_with_config(config).map_err(render_failed)?;

    let image = bitmap.as_image();
    debug!(
        "Rendered preview page {} → {}x{} px",
        page_num,
        image.width(),
        image.height()
    );
    Ok(image)
}
