//! PDF collaborators built on lopdf
//!
//! [`PdfWriter`] embeds stamp rasters as image XObjects (RGB plus a
//! DeviceGray soft mask) and appends a content stream that draws them.
//! A page's original content is wrapped in `q … Q` before the first
//! stamp is drawn, so whatever graphics state it leaves behind does not
//! reach the stamps.
//! [`PdfPageSource`] reads page sizes from the same kind of document and
//! stands in for a renderer with plain paper-colored backgrounds.

use crate::backend::{OutputWriter, PageRasterizer, Placement};
use crate::error::SealError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use seal_types::{DocumentUnits, Extent, PageId};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tracing::{debug, warn};

/// US Letter, used when a page tree carries no MediaBox at all
const FALLBACK_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

fn pdf_err(e: lopdf::Error) -> SealError {
    SealError::Pdf(e.to_string())
}

fn load(bytes: &[u8]) -> Result<(Document, BTreeMap<u32, ObjectId>), SealError> {
    let doc = Document::load_mem(bytes).map_err(pdf_err)?;
    let pages = doc.get_pages();
    Ok((doc, pages))
}

fn page_object(pages: &BTreeMap<u32, ObjectId>, page: PageId) -> Result<ObjectId, SealError> {
    pages
        .get(&page.number())
        .copied()
        .ok_or(SealError::PageOutOfRange {
            page: page.number(),
            page_count: pages.len() as u32,
        })
}

/// MediaBox size, inherited through `Parent` when the page has none
fn page_dimensions(doc: &Document, page_id: ObjectId) -> Result<Extent<DocumentUnits>, SealError> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).map_err(pdf_err)?;
        if let Some((w, h)) = media_box(doc, dict) {
            return Ok(Extent::new(w, h));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    warn!(?page_id, "Page has no MediaBox, assuming US Letter");
    Ok(Extent::new(FALLBACK_PAGE_SIZE.0, FALLBACK_PAGE_SIZE.1))
}

fn media_box(doc: &Document, dict: &Dictionary) -> Option<(f64, f64)> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = number(&arr[0])?;
    let lly = number(&arr[1])?;
    let urx = number(&arr[2])?;
    let ury = number(&arr[3])?;
    Some(((urx - llx).abs(), (ury - lly).abs()))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

/// Resolve a dictionary that may be stored inline or by reference
fn resolve_dict(doc: &Document, obj: &Object) -> Result<Dictionary, SealError> {
    match obj {
        Object::Dictionary(dict) => Ok(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).cloned().map_err(pdf_err),
        _ => Err(SealError::Pdf("expected a dictionary".to_string())),
    }
}

/// The page's effective Resources, inherited through `Parent`
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, SealError> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).map_err(pdf_err)?;
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(Dictionary::new())
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SealError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SealError::Pdf(e.to_string()))?;
    encoder.finish().map_err(|e| SealError::Pdf(e.to_string()))
}

/// Handle to an embedded image XObject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfImage {
    id: ObjectId,
}

/// Writes stamps into an existing PDF
pub struct PdfWriter {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    /// Pages whose original content is already wrapped in `q … Q`
    isolated: BTreeSet<ObjectId>,
    next_name: u32,
}

impl PdfWriter {
    pub fn load(bytes: &[u8]) -> Result<Self, SealError> {
        let (doc, pages) = load(bytes)?;
        Ok(Self {
            doc,
            pages,
            isolated: BTreeSet::new(),
            next_name: 0,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// A resource name not yet used in `xobjects`
    fn fresh_name(&mut self, xobjects: &Dictionary) -> String {
        loop {
            self.next_name += 1;
            let name = format!("SealIm{}", self.next_name);
            if !xobjects.has(name.as_bytes()) {
                return name;
            }
        }
    }

    /// Wrap the page's existing content streams between a `q` and a `Q`
    /// stream. Runs once per page.
    fn isolate_contents(&mut self, page_id: ObjectId) -> Result<(), SealError> {
        if !self.isolated.insert(page_id) {
            return Ok(());
        }
        let existing = self.doc.get_page_contents(page_id);
        let save = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore = self.doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(save));
        contents.extend(existing.into_iter().map(Object::Reference));
        contents.push(Object::Reference(restore));
        self.doc
            .get_dictionary_mut(page_id)
            .map_err(pdf_err)?
            .set("Contents", contents);
        Ok(())
    }
}

impl OutputWriter for PdfWriter {
    type ImageRef = PdfImage;

    fn page_size(&self, page: PageId) -> Result<Extent<DocumentUnits>, SealError> {
        page_dimensions(&self.doc, page_object(&self.pages, page)?)
    }

    fn embed_image(&mut self, png: &[u8]) -> Result<PdfImage, SealError> {
        let img = image::load_from_memory_with_format(png, ImageFormat::Png)
            .map_err(|e| SealError::InvalidImage(e.to_string()))?
            .to_rgba8();
        let (w, h) = img.dimensions();

        let pixels = w as usize * h as usize;
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for pixel in img.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel[3]);
        }

        let smask_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        ));
        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
                "SMask" => smask_id,
            },
            deflate(&rgb)?,
        ));

        debug!(width = w, height = h, ?image_id, "Embedded stamp image");
        Ok(PdfImage { id: image_id })
    }

    fn draw_image(
        &mut self,
        page: PageId,
        image: &PdfImage,
        placement: &Placement,
    ) -> Result<(), SealError> {
        if placement.rotation_degrees != 0.0 {
            return Err(SealError::Pdf(format!(
                "stamps are drawn unrotated, got {} degrees",
                placement.rotation_degrees
            )));
        }
        let page_id = page_object(&self.pages, page)?;
        self.isolate_contents(page_id)?;

        // inherited resources are copied onto the page before extending them
        let mut resources = page_resources(&self.doc, page_id)?;
        let mut xobjects = match resources.get(b"XObject") {
            Ok(obj) => resolve_dict(&self.doc, obj)?,
            Err(_) => Dictionary::new(),
        };
        let name = self.fresh_name(&xobjects);
        xobjects.set(name.as_bytes().to_vec(), image.id);
        resources.set("XObject", xobjects);
        self.doc
            .get_dictionary_mut(page_id)
            .map_err(pdf_err)?
            .set("Resources", resources);

        let content = draw_operators(&name, placement);
        self.doc
            .add_page_contents(page_id, content.into_bytes())
            .map_err(pdf_err)
    }

    fn save(mut self) -> Result<Vec<u8>, SealError> {
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| SealError::Pdf(e.to_string()))?;
        Ok(output)
    }
}

/// Content stream operators that paint XObject `name` at `placement`
fn draw_operators(name: &str, placement: &Placement) -> String {
    let Placement { position, size, .. } = *placement;
    format!(
        "\nq {:.4} 0 0 {:.4} {:.4} {:.4} cm /{} Do Q\n",
        size.width, size.height, position.x, position.y, name
    )
}

/// Page sizes from a PDF, with blank paper for backgrounds
///
/// Stands in for a real renderer: the bitmap has the right pixel size
/// for the requested scale, filled with the paper color.
#[derive(Debug, Clone)]
pub struct PdfPageSource {
    extents: Vec<Extent<DocumentUnits>>,
    paper: Rgba<u8>,
}

impl PdfPageSource {
    pub fn from_bytes(bytes: &[u8], paper: [u8; 4]) -> Result<Self, SealError> {
        let (doc, pages) = load(bytes)?;
        if pages.is_empty() {
            return Err(SealError::Pdf("document has no pages".to_string()));
        }
        let extents = pages
            .values()
            .map(|&id| page_dimensions(&doc, id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            extents,
            paper: Rgba(paper),
        })
    }

    fn extent(&self, page: PageId) -> Result<Extent<DocumentUnits>, SealError> {
        self.extents
            .get(page.index())
            .copied()
            .ok_or(SealError::PageOutOfRange {
                page: page.number(),
                page_count: self.extents.len() as u32,
            })
    }
}

impl PageRasterizer for PdfPageSource {
    fn page_count(&self) -> u32 {
        self.extents.len() as u32
    }

    fn document_extent(&self, page: PageId) -> Result<Extent<DocumentUnits>, SealError> {
        self.extent(page)
    }

    fn render_to_bitmap(&self, page: PageId, scale: f64) -> Result<RgbaImage, SealError> {
        let extent = self.extent(page)?;
        let w = (extent.width * scale).round();
        let h = (extent.height * scale).round();
        if !(w >= 1.0 && h >= 1.0) || !w.is_finite() || !h.is_finite() {
            return Err(SealError::Rasterizer(format!(
                "cannot render {} at scale {}",
                page, scale
            )));
        }
        Ok(RgbaImage::from_pixel(w as u32, h as u32, self.paper))
    }
}
