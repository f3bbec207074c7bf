//! Shared fixtures for the seal-core integration tests

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use lopdf::{dictionary, Document, Object, Stream};
use seal_core::{SealConfig, SealSession};
use seal_types::{Extent, PageId};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A PDF with `pages` pages of 600x800 points, each with a line of text
pub fn create_test_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let kids: Vec<Object> = (1..=pages)
        .map(|n| {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                format!("BT /F1 12 Tf 50 700 Td (Page {}) Tj ET", n).into_bytes(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Session over a fresh `pages`-page PDF with a 900px usable viewport,
/// so every page has a fit scale of 1.5
pub fn session_with_pages(pages: u32) -> SealSession {
    init_tracing();
    let mut session = SealSession::new(SealConfig::new().with_exact_viewport()).unwrap();
    session.resize_viewport(Extent::new(900.0, 700.0)).unwrap();
    session.load_pdf(create_test_pdf(pages)).unwrap();
    session
}

/// Opaque stamp with a distinct top-left marker pixel
pub fn stamp(w: u32, h: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(w, h, Rgba([190, 20, 30, 255]));
    img.put_pixel(0, 0, Rgba([0, 0, 255, 255]));
    img
}

pub fn page(n: u32) -> PageId {
    PageId::new(n).unwrap()
}
