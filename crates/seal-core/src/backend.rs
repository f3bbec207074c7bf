//! Interfaces of the external collaborators
//!
//! The page rasterizer supplies page sizes and background bitmaps; the
//! output writer embeds stamp rasters into the final document. The
//! engine only talks to them through these traits.

use crate::error::SealError;
use image::RgbaImage;
use seal_types::{DocumentUnits, Extent, PageId, Point};
use serde::{Deserialize, Serialize};

/// Source document as seen by the display side
pub trait PageRasterizer {
    fn page_count(&self) -> u32;

    /// Scale-invariant page size
    fn document_extent(&self, page: PageId) -> Result<Extent<DocumentUnits>, SealError>;

    /// Render a page at `scale` pixels per document unit
    fn render_to_bitmap(&self, page: PageId, scale: f64) -> Result<RgbaImage, SealError>;
}

/// Where an image lands on an output page
///
/// `position` is the bottom-left corner in document units with the Y axis
/// pointing up, as output documents expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Point<DocumentUnits>,
    pub size: Extent<DocumentUnits>,
    pub rotation_degrees: f64,
}

impl Placement {
    /// Map a placement computed for a page of size `from` onto a page of size `to`
    pub fn rescaled(&self, from: Extent<DocumentUnits>, to: Extent<DocumentUnits>) -> Self {
        let sx = to.width / from.width;
        let sy = to.height / from.height;
        Self {
            position: Point::new(self.position.x * sx, self.position.y * sy),
            size: Extent::new(self.size.width * sx, self.size.height * sy),
            rotation_degrees: self.rotation_degrees,
        }
    }
}

/// Document being written out with stamps on it
pub trait OutputWriter {
    type ImageRef;

    fn page_size(&self, page: PageId) -> Result<Extent<DocumentUnits>, SealError>;

    /// Embed a PNG-encoded image for later drawing
    fn embed_image(&mut self, png: &[u8]) -> Result<Self::ImageRef, SealError>;

    fn draw_image(
        &mut self,
        page: PageId,
        image: &Self::ImageRef,
        placement: &Placement,
    ) -> Result<(), SealError>;

    fn save(self) -> Result<Vec<u8>, SealError>
    where
        Self: Sized;
}
