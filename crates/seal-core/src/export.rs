//! Export compositing
//!
//! Turns the objects placed on each page into draw instructions for an
//! [`OutputWriter`]: a PNG raster of the object and its placement in
//! document units, bottom-left origin. Projection always goes through the
//! unzoomed coordinate space, so the current zoom never affects output.

use crate::backend::{OutputWriter, Placement};
use crate::coords::CoordinateSpace;
use crate::error::SealError;
use crate::store::{AnnotationObject, AnnotationStore};
use image::{imageops, RgbaImage};
use seal_types::{DocumentUnits, Extent, ObjectId, PageId, Point};
use tracing::{debug, instrument};

/// One stamp to draw on an output page
#[derive(Debug, Clone)]
pub struct DrawInstruction {
    pub page: PageId,
    pub object: ObjectId,
    /// PNG-encoded raster
    pub png: Vec<u8>,
    pub placement: Placement,
}

/// Everything to draw on one page
#[derive(Debug, Clone)]
pub struct PageExport {
    pub page: PageId,
    /// Page size the placements were computed against
    pub page_extent: Extent<DocumentUnits>,
    pub instructions: Vec<DrawInstruction>,
}

/// A finished export, tied to the document it was computed from
#[derive(Debug, Clone)]
pub struct ExportBatch {
    pub generation: u64,
    pub pages: Vec<PageExport>,
}

impl ExportBatch {
    pub fn instruction_count(&self) -> usize {
        self.pages.iter().map(|p| p.instructions.len()).sum()
    }
}

/// Where `object` lands on the output page
///
/// With `top` and `h` in document units, the bottom edge sits at
/// `H - (top + h)` in the Y-up output space. Rotation is always zero.
pub fn project(object: &AnnotationObject, space: &CoordinateSpace) -> Placement {
    let base = space.unzoomed();
    let top_left = base.to_document(object.top_left());
    let size = base.extent_to_document(object.scaled_extent());
    let page_height = base.document_extent().height;

    Placement {
        position: Point::new(top_left.x, page_height - (top_left.y + size.height)),
        size,
        rotation_degrees: object.angle(),
    }
}

/// Largest raster `rasterize` will allocate, in pixels
pub const MAX_RASTER_PIXELS: f64 = 64_000_000.0;

/// Rasterize an object at `supersample` times its displayed size and
/// encode it as PNG
pub fn rasterize(object: &AnnotationObject, supersample: f64) -> Result<Vec<u8>, String> {
    let extent = object.scaled_extent();
    let width = (extent.width * supersample).round();
    let height = (extent.height * supersample).round();
    if !(width >= 1.0 && height >= 1.0) || !width.is_finite() || !height.is_finite() {
        return Err(format!(
            "raster size {}x{} is not drawable",
            width, height
        ));
    }
    if width * height > MAX_RASTER_PIXELS {
        return Err(format!(
            "raster size {}x{} exceeds {} pixels",
            width, height, MAX_RASTER_PIXELS
        ));
    }

    let raster = imageops::resize(
        object.bitmap(),
        width as u32,
        height as u32,
        imageops::FilterType::Lanczos3,
    );
    encode_png(&raster)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
        writer
            .write_image_data(image.as_raw())
            .map_err(|e| e.to_string())?;
        writer.finish().map_err(|e| e.to_string())?;
    }
    Ok(out)
}

/// Build the draw instructions for one page, in the store's order
///
/// The first object that cannot be rasterized fails the whole page.
#[instrument(skip(space, store), fields(objects = store.len()))]
pub fn composite(
    page: PageId,
    space: &CoordinateSpace,
    store: &AnnotationStore,
    supersample: f64,
) -> Result<PageExport, SealError> {
    let instructions = store
        .all()
        .iter()
        .map(|object| {
            let png = rasterize(object, supersample).map_err(|reason| {
                SealError::ExportRasterizationFailure {
                    page,
                    object: object.id(),
                    reason,
                }
            })?;
            Ok(DrawInstruction {
                page,
                object: object.id(),
                png,
                placement: project(object, space),
            })
        })
        .collect::<Result<Vec<_>, SealError>>()?;

    debug!(count = instructions.len(), "Composited page");
    Ok(PageExport {
        page,
        page_extent: space.document_extent(),
        instructions,
    })
}

/// Draw a batch into `writer`
///
/// Placements are mapped onto the writer's page size when it differs
/// from the size they were computed against. Returns the number of
/// images drawn.
pub fn render<W: OutputWriter>(batch: &ExportBatch, writer: &mut W) -> Result<usize, SealError> {
    let mut drawn = 0;
    for page in &batch.pages {
        if page.instructions.is_empty() {
            continue;
        }
        let target = writer.page_size(page.page)?;
        for instruction in &page.instructions {
            let placement = if target == page.page_extent {
                instruction.placement
            } else {
                instruction.placement.rescaled(page.page_extent, target)
            };
            let image = writer.embed_image(&instruction.png).map_err(|e| {
                SealError::ExportRasterizationFailure {
                    page: page.page,
                    object: instruction.object,
                    reason: e.to_string(),
                }
            })?;
            writer.draw_image(page.page, &image, &placement)?;
            drawn += 1;
        }
    }
    Ok(drawn)
}
