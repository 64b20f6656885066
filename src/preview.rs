//! Preview rendering: rasterise the first few pages of a document as a lazy
//! stream of events, and collect them into page-indexed slots.
//!
//! The capped pages are rendered by one blocking job that opens the document
//! once, and each page is streamed out the moment it is encoded. Consumers
//! must not rely on arrival order: every event carries its page number, so
//! [`PreviewSlots::apply`] places each thumbnail by page rather than by
//! arrival. A page that fails to render leaves its slot empty without
//! affecting the others.

use crate::error::PreviewError;
use crate::pipeline::encode::{encode_thumbnail, Thumbnail};
use crate::pipeline::render::PageRasterizer;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A boxed stream of preview events.
pub type PreviewStream = Pin<Box<dyn Stream<Item = PreviewEvent> + Send>>;

/// Preview page cap and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOptions {
    pub max_pages: usize,
    pub scale: f32,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            max_pages: 3,
            scale: 0.5,
        }
    }
}

/// One step of a preview rendering.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    /// Always first. `slots` is the number of pages that will be rendered.
    Started { total_pages: usize, slots: usize },
    /// One rendered (or failed) page, 1-indexed.
    Page {
        page_num: usize,
        result: Result<Thumbnail, PreviewError>,
    },
    /// Pages beyond the cap that were not rendered. Emitted last, and only
    /// when non-zero.
    Remaining(usize),
}

/// Start rendering a preview of `document`.
///
/// The page count is read eagerly; if the document cannot be opened the
/// error is returned here and no stream exists. Page rendering starts only
/// when the returned stream is polled, and the stream cannot be restarted.
pub async fn render_preview(
    document: Bytes,
    rasterizer: Arc<dyn PageRasterizer>,
    options: PreviewOptions,
) -> Result<PreviewStream, PreviewError> {
    let total_pages = {
        let rasterizer = Arc::clone(&rasterizer);
        let document = document.clone();
        tokio::task::spawn_blocking(move || rasterizer.page_count(&document))
            .await
            .map_err(|e| PreviewError::DocumentUnreadable {
                detail: format!("page-count task panicked: {e}"),
            })??
    };

    let slots = total_pages.min(options.max_pages);
    let remaining = total_pages - slots;
    info!(
        "Preview: rendering {} of {} pages at {}x",
        slots, total_pages, options.scale
    );

    let started = stream::once(async move { PreviewEvent::Started { total_pages, slots } });

    let pages = stream::once(async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let scale = options.scale;
        tokio::task::spawn_blocking(move || {
            let indices: Vec<usize> = (0..slots).collect();
            rasterizer.render_pages(&document, &indices, scale, &mut |idx, image| {
                let page_num = idx + 1;
                let result = image.and_then(|image| encode_thumbnail(page_num, &image));
                if let Err(ref e) = result {
                    warn!("Preview page {} failed: {}", page_num, e);
                }
                tx.send(PreviewEvent::Page { page_num, result }).is_ok()
            });
        });
        UnboundedReceiverStream::new(rx)
    })
    .flatten();

    let tail = stream::iter((remaining > 0).then_some(PreviewEvent::Remaining(remaining)));

    Ok(Box::pin(started.chain(pages).chain(tail)))
}

/// Page-indexed preview state for one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreviewSlots {
    pub total_pages: usize,
    /// `slots[i]` holds page `i + 1` once it has rendered.
    pub slots: Vec<Option<Thumbnail>>,
    /// Pages whose rendering failed, in arrival order.
    pub failed: Vec<usize>,
    /// Pages beyond the cap.
    pub remaining: usize,
    /// Set when the whole document could not be opened.
    pub unavailable: Option<PreviewError>,
}

impl PreviewSlots {
    /// Fold one event into the slots. Returns the page number placed, if any.
    pub fn apply(&mut self, event: PreviewEvent) -> Option<usize> {
        match event {
            PreviewEvent::Started { total_pages, slots } => {
                self.total_pages = total_pages;
                self.slots = vec![None; slots];
                None
            }
            PreviewEvent::Page { page_num, result } => {
                let Some(slot) = page_num
                    .checked_sub(1)
                    .and_then(|i| self.slots.get_mut(i))
                else {
                    debug!("Preview page {} has no slot; dropped", page_num);
                    return None;
                };
                match result {
                    Ok(thumb) => {
                        *slot = Some(thumb);
                        Some(page_num)
                    }
                    Err(_) => {
                        self.failed.push(page_num);
                        None
                    }
                }
            }
            PreviewEvent::Remaining(n) => {
                self.remaining = n;
                None
            }
        }
    }

    /// Rendered thumbnails in page order, skipping empty slots.
    pub fn thumbnails(&self) -> impl Iterator<Item = &Thumbnail> {
        self.slots.iter().flatten()
    }

    /// `"+ N more pages..."`, when the document exceeds the cap.
    pub fn overflow_label(&self) -> Option<String> {
        (self.remaining > 0).then(|| format!("+ {} more pages...", self.remaining))
    }

    /// All capped pages have either rendered or failed.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().filter(|s| s.is_some()).count() + self.failed.len() >= self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::time::Duration;

    /// Renders solid images; page 2 renders slowest, `fail_page` fails.
    struct FakeRasterizer {
        pages: usize,
        fail_page: Option<usize>,
    }

    impl PageRasterizer for FakeRasterizer {
        fn page_count(&self, document: &[u8]) -> Result<usize, PreviewError> {
            if document.starts_with(b"%PDF") {
                Ok(self.pages)
            } else {
                Err(PreviewError::DocumentUnreadable {
                    detail: "no header".into(),
                })
            }
        }

        fn render_page(
            &self,
            _document: &[u8],
            page_index: usize,
            scale: f32,
        ) -> Result<DynamicImage, PreviewError> {
            if page_index == 1 {
                std::thread::sleep(Duration::from_millis(30));
            }
            if self.fail_page == Some(page_index + 1) {
                return Err(PreviewError::RenderFailed {
                    page: page_index + 1,
                    detail: "boom".into(),
                });
            }
            let side = (20.0 * scale) as u32;
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                side,
                side,
                Rgba([0, 0, 0, 255]),
            )))
        }
    }

    async fn collect(pages: usize, fail_page: Option<usize>) -> Vec<PreviewEvent> {
        let stream = render_preview(
            Bytes::from_static(b"%PDF-1.7"),
            Arc::new(FakeRasterizer { pages, fail_page }),
            PreviewOptions::default(),
        )
        .await
        .expect("document opens");
        stream.collect().await
    }

    #[tokio::test]
    async fn caps_at_three_pages_and_reports_remainder() {
        let events = collect(7, None).await;
        assert!(matches!(
            events.first(),
            Some(PreviewEvent::Started {
                total_pages: 7,
                slots: 3
            })
        ));
        assert!(matches!(events.last(), Some(PreviewEvent::Remaining(4))));
        let pages = events
            .iter()
            .filter(|e| matches!(e, PreviewEvent::Page { .. }))
            .count();
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn short_document_has_no_remainder() {
        let events = collect(2, None).await;
        assert!(!events
            .iter()
            .any(|e| matches!(e, PreviewEvent::Remaining(_))));
    }

    #[tokio::test]
    async fn slots_are_filled_by_page_number() {
        let mut slots = PreviewSlots::default();
        for event in collect(5, None).await {
            slots.apply(event);
        }
        let order: Vec<usize> = slots.thumbnails().map(|t| t.page_num).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(slots.overflow_label().as_deref(), Some("+ 2 more pages..."));
        assert!(slots.is_complete());
    }

    #[tokio::test]
    async fn one_failed_page_does_not_abort_the_others() {
        let mut slots = PreviewSlots::default();
        for event in collect(3, Some(2)).await {
            slots.apply(event);
        }
        assert!(slots.slots[0].is_some());
        assert!(slots.slots[1].is_none());
        assert!(slots.slots[2].is_some());
        assert_eq!(slots.failed, vec![2]);
        assert!(slots.is_complete());
    }

    #[tokio::test]
    async fn unreadable_document_fails_before_streaming() {
        let result = render_preview(
            Bytes::from_static(b"not a pdf"),
            Arc::new(FakeRasterizer {
                pages: 1,
                fail_page: None,
            }),
            PreviewOptions::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(PreviewError::DocumentUnreadable { .. })
        ));
    }

    /// Counts how often the document is opened for rendering.
    #[derive(Default)]
    struct CountingRasterizer {
        opens: std::sync::atomic::AtomicUsize,
    }

    impl PageRasterizer for CountingRasterizer {
        fn page_count(&self, _document: &[u8]) -> Result<usize, PreviewError> {
            Ok(6)
        }

        fn render_page(
            &self,
            _document: &[u8],
            _page_index: usize,
            _scale: f32,
        ) -> Result<DynamicImage, PreviewError> {
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)))
        }

        fn render_pages(
            &self,
            document: &[u8],
            page_indices: &[usize],
            scale: f32,
            on_page: &mut dyn FnMut(usize, Result<DynamicImage, PreviewError>) -> bool,
        ) {
            self.opens
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            for &idx in page_indices {
                if !on_page(idx, self.render_page(document, idx, scale)) {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn capped_pages_share_one_document_open() {
        let rasterizer = Arc::new(CountingRasterizer::default());
        let stream = render_preview(
            Bytes::from_static(b"%PDF-1.7"),
            Arc::clone(&rasterizer) as Arc<dyn PageRasterizer>,
            PreviewOptions::default(),
        )
        .await
        .unwrap();
        let events: Vec<PreviewEvent> = stream.collect().await;

        let pages = events
            .iter()
            .filter(|e| matches!(e, PreviewEvent::Page { result: Ok(_), .. }))
            .count();
        assert_eq!(pages, 3);
        assert_eq!(
            rasterizer.opens.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn render_pages_stops_when_the_consumer_goes_away() {
        let rasterizer = FakeRasterizer {
            pages: 5,
            fail_page: Some(1),
        };
        let mut seen = Vec::new();
        rasterizer.render_pages(b"%PDF-1.7", &[0, 1, 2, 3], 0.5, &mut |idx, result| {
            seen.push((idx, result.is_ok()));
            seen.len() < 2
        });
        assert_eq!(seen, vec![(0, false), (1, true)]);
    }

    #[test]
    fn out_of_order_events_land_in_their_slot() {
        let thumb = |n: usize| Thumbnail {
            page_num: n,
            width: 1,
            height: 1,
            png: vec![],
        };
        let mut slots = PreviewSlots::default();
        slots.apply(PreviewEvent::Started {
            total_pages: 3,
            slots: 3,
        });
        assert_eq!(
            slots.apply(PreviewEvent::Page {
                page_num: 3,
                result: Ok(thumb(3))
            }),
            Some(3)
        );
        slots.apply(PreviewEvent::Page {
            page_num: 1,
            result: Ok(thumb(1)),
        });
        assert!(!slots.is_complete());
        assert_eq!(slots.slots[2].as_ref().map(|t| t.page_num), Some(3));
        assert!(slots.slots[1].is_none());
        assert_eq!(
            slots.apply(PreviewEvent::Page {
                page_num: 9,
                result: Ok(thumb(9))
            }),
            None
        );
    }
}
