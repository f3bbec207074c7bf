//! End-to-end stamping flows through `SealSession`

mod common;

use common::{create_test_pdf, page, session_with_pages, stamp};
use lopdf::Document;
use pretty_assertions::assert_eq;
use seal_core::{
    dispatch, Geometry, GeometryChanged, OutputWriter, PdfWriter, Placement, SealError, StampKind,
};
use seal_types::{DocumentUnits, Extent, Length, ObjectId, PageId, Point};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.05
}

#[test]
fn normal_stamp_projects_to_document_space() {
    // 600x800 pages in a 900px viewport: fit scale 1.5
    let mut session = session_with_pages(3);
    let baked = session.bake_seal_image(&stamp(200, 100), 0.0).unwrap();
    let id = session.place_normal_stamp(page(2), &baked, None).unwrap();

    // the user drags it to display (675, 600) and resets it to natural size
    let edit = GeometryChanged::to_geometry(id, Geometry::new(675.0, 600.0, 1.0, 1.0));
    assert!(session.apply_edit(edit).unwrap().is_empty());

    let batch = session.export_all().unwrap();
    assert_eq!(batch.pages.len(), 1);
    assert_eq!(batch.pages[0].page, page(2));

    let placement = batch.pages[0].instructions[0].placement;
    assert!(close(placement.size.width, 133.3), "{:?}", placement);
    assert!(close(placement.size.height, 66.7), "{:?}", placement);
    // center 450 in document units, minus half the width
    assert!(close(placement.position.x, 383.3), "{:?}", placement);
    // top 366.7 + height 66.7, flipped against the 800pt page
    assert!(close(placement.position.y, 366.7), "{:?}", placement);
    assert_eq!(placement.rotation_degrees, 0.0);
}

#[test]
fn straddle_fragments_hug_the_right_edge() {
    let mut session = session_with_pages(4);
    let baked = session.bake_seal_image(&stamp(400, 200), 0.0).unwrap();
    let group = session.place_straddle_stamp(&baked).unwrap();

    let fragments = session.group(group).unwrap().fragments().to_vec();
    assert_eq!(fragments.len(), 4);

    // whole stamp spans a fifth of the 900px page
    let scale = 900.0 * 0.2 / 400.0;
    for (i, fragment) in fragments.iter().enumerate() {
        assert_eq!(fragment.page, page(i as u32 + 1));
        let object = session.object(fragment.object).unwrap();
        assert_eq!(object.bitmap().width(), 100);
        assert_eq!(
            object.kind(),
            StampKind::StraddleFragment {
                group,
                index: i as u32
            }
        );
        let g = object.geometry();
        assert_eq!(g.scale_x, scale);
        assert_eq!(g.left.get(), 900.0 - 100.0 * scale);
        // default top: 200 document units through the 1.5 fit scale
        assert_eq!(g.top.get(), 300.0);
    }
}

#[test]
fn rotated_stamp_is_baked_once_for_every_page() {
    let mut session = session_with_pages(2);
    let baked = session.bake_seal_image(&stamp(120, 80), 30.0).unwrap();
    assert_eq!((baked.width(), baked.height()), (120, 80));

    let a = session.place_normal_stamp(page(1), &baked, None).unwrap();
    let b = session.place_normal_stamp(page(2), &baked, None).unwrap();
    let (a, b) = (session.object(a).unwrap(), session.object(b).unwrap());
    assert_eq!(a.bitmap(), b.bitmap());
    assert_eq!(a.angle(), 0.0);
    assert_eq!(b.angle(), 0.0);
}

#[test]
fn scaling_one_fragment_moves_the_rest() {
    let mut session = session_with_pages(3);
    let baked = session.bake_seal_image(&stamp(300, 150), 0.0).unwrap();
    let group = session.place_straddle_stamp(&baked).unwrap();
    let fragments = session.group(group).unwrap().fragments().to_vec();

    let target = fragments[2].object;
    let mut g = session.object(target).unwrap().geometry();
    g.top = Length::new(420.0);
    g.scale_x = 0.8;
    g.scale_y = 0.8;
    let commands = session
        .apply_edit(GeometryChanged::to_geometry(target, g))
        .unwrap();
    assert_eq!(commands.len(), 2);

    let mut rendered = Vec::new();
    let failures = dispatch(&commands, |c| {
        rendered.push(c.object);
        Ok::<(), SealError>(())
    });
    assert_eq!(failures, 0);
    assert_eq!(rendered, vec![fragments[0].object, fragments[1].object]);

    for fragment in &fragments {
        let g = session.object(fragment.object).unwrap().geometry();
        assert_eq!(g.top.get(), 420.0);
        assert_eq!((g.scale_x, g.scale_y), (0.8, 0.8));
    }
}

#[test]
fn resize_keeps_groups_in_lock_step() {
    let mut session = session_with_pages(3);
    let baked = session.bake_seal_image(&stamp(300, 150), 0.0).unwrap();
    let group = session.place_straddle_stamp(&baked).unwrap();

    session.resize_viewport(Extent::new(450.0, 700.0)).unwrap();

    let fragments = session.group(group).unwrap().fragments().to_vec();
    let first = session.object(fragments[0].object).unwrap().geometry();
    assert_eq!(first.top.get(), 150.0);
    for fragment in &fragments[1..] {
        let g = session.object(fragment.object).unwrap().geometry();
        assert_eq!((g.top, g.scale_x, g.scale_y), (first.top, first.scale_x, first.scale_y));
    }
}

#[test]
fn export_pdf_draws_every_stamp() {
    let mut session = session_with_pages(3);
    let baked = session.bake_seal_image(&stamp(300, 150), 15.0).unwrap();
    session
        .place_normal_stamp(page(1), &baked, Some(Point::new(300.0, 200.0)))
        .unwrap();
    session.place_straddle_stamp(&baked).unwrap();

    let bytes = session.export_pdf().unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 3);

    let first = String::from_utf8(doc.get_page_content(pages[&1]).unwrap()).unwrap();
    assert!(first.contains("(Page 1) Tj"));
    assert!(first.contains("/SealIm1 Do"));
    assert!(first.contains("/SealIm2 Do"));

    for n in 2..=3 {
        let content = String::from_utf8(doc.get_page_content(pages[&n]).unwrap()).unwrap();
        assert!(content.starts_with("q\n"), "page {}", n);
        assert_eq!(content.matches(" Do Q").count(), 1, "page {}", n);
    }
}

#[test]
fn export_is_independent_of_zoom() {
    let mut session = session_with_pages(2);
    let baked = session.bake_seal_image(&stamp(200, 100), 0.0).unwrap();
    session.place_normal_stamp(page(1), &baked, None).unwrap();
    session.place_straddle_stamp(&baked).unwrap();

    let at_one = session.export_all().unwrap();
    session.set_zoom(2.5).unwrap();
    session.show_page(page(2)).unwrap();
    let zoomed = session.export_all().unwrap();

    let placements = |b: &seal_core::ExportBatch| {
        b.pages
            .iter()
            .flat_map(|p| p.instructions.iter().map(|i| i.placement))
            .collect::<Vec<_>>()
    };
    assert_eq!(placements(&at_one), placements(&zoomed));
}

/// Wraps a real writer and refuses to embed image number `fail_at`
struct FlakyWriter {
    inner: PdfWriter,
    fail_at: usize,
    embedded: usize,
    drawn: usize,
}

impl OutputWriter for FlakyWriter {
    type ImageRef = <PdfWriter as OutputWriter>::ImageRef;

    fn page_size(&self, page: PageId) -> Result<Extent<DocumentUnits>, SealError> {
        self.inner.page_size(page)
    }

    fn embed_image(&mut self, png: &[u8]) -> Result<Self::ImageRef, SealError> {
        self.embedded += 1;
        if self.embedded == self.fail_at {
            return Err(SealError::Pdf("image stream rejected".to_string()));
        }
        self.inner.embed_image(png)
    }

    fn draw_image(
        &mut self,
        page: PageId,
        image: &Self::ImageRef,
        placement: &Placement,
    ) -> Result<(), SealError> {
        self.drawn += 1;
        self.inner.draw_image(page, image, placement)
    }

    fn save(self) -> Result<Vec<u8>, SealError> {
        self.inner.save()
    }
}

#[test]
fn failed_embed_aborts_the_export() {
    let mut session = session_with_pages(2);
    let baked = session.bake_seal_image(&stamp(200, 100), 0.0).unwrap();
    session.place_normal_stamp(page(1), &baked, None).unwrap();
    let broken = session.place_normal_stamp(page(2), &baked, None).unwrap();

    let batch = session.export_all().unwrap();
    let mut writer = FlakyWriter {
        inner: PdfWriter::load(&create_test_pdf(2)).unwrap(),
        fail_at: 2,
        embedded: 0,
        drawn: 0,
    };

    match session.render_export(&batch, &mut writer) {
        Err(SealError::ExportRasterizationFailure { page: p, object, reason }) => {
            assert_eq!(p, page(2));
            assert_eq!(object, broken);
            assert!(reason.contains("image stream rejected"), "{}", reason);
        }
        other => panic!("expected rasterization failure, got {:?}", other),
    }
    // nothing is drawn after the failure
    assert_eq!(writer.drawn, 1);
}

#[test]
fn oversized_stamp_is_an_export_error() {
    let mut session = session_with_pages(1);
    let baked = session.bake_seal_image(&stamp(200, 100), 0.0).unwrap();
    let id = session.place_normal_stamp(page(1), &baked, None).unwrap();
    session
        .apply_edit(GeometryChanged::to_geometry(
            id,
            Geometry::new(0.0, 0.0, 1e8, 1e8),
        ))
        .unwrap();

    match session.export_pdf() {
        Err(SealError::ExportRasterizationFailure { page: p, object, .. }) => {
            assert_eq!(p, page(1));
            assert_eq!(object, id);
        }
        other => panic!("expected rasterization failure, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn invalid_scales_never_reach_the_group() {
    let mut session = session_with_pages(3);
    let baked = session.bake_seal_image(&stamp(300, 150), 0.0).unwrap();
    let group = session.place_straddle_stamp(&baked).unwrap();
    let fragments = session.group(group).unwrap().fragments().to_vec();
    let target = fragments[0].object;
    let before = session.object(target).unwrap().geometry();

    let kept = before.scale_y;
    for (sx, sy) in [(f64::NAN, kept), (-3.0, 0.0), (f64::INFINITY, f64::NAN)] {
        let mut g = before;
        g.scale_x = sx;
        g.scale_y = sy;
        let commands = session
            .apply_edit(GeometryChanged::to_geometry(target, g))
            .unwrap();
        // only the correction for the edited fragment
        assert_eq!(commands.len(), 1, "scale ({}, {})", sx, sy);
        assert_eq!(commands[0].object, target);
    }

    for fragment in &fragments {
        let g = session.object(fragment.object).unwrap().geometry();
        assert_eq!((g.scale_x, g.scale_y), (before.scale_x, before.scale_y));
    }
}

#[test]
fn reloading_discards_everything() {
    let mut session = session_with_pages(2);
    let baked = session.bake_seal_image(&stamp(200, 100), 0.0).unwrap();
    let id = session.place_normal_stamp(page(1), &baked, None).unwrap();
    let batch = session.export_all().unwrap();
    let generation = session.generation();

    session.load_pdf(create_test_pdf(1)).unwrap();
    assert_eq!(session.generation(), generation + 1);
    assert_eq!(session.page_count(), 1);
    assert!(session.object(id).is_none());
    assert_eq!(session.selection(), None);

    let mut writer = PdfWriter::load(&create_test_pdf(2)).unwrap();
    assert_eq!(
        session.render_export(&batch, &mut writer),
        Err(SealError::StaleDocument)
    );
}

#[test]
fn stamp_bytes_are_decoded_and_validated() {
    let session = session_with_pages(1);
    let mut png = std::io::Cursor::new(Vec::new());
    stamp(40, 20)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let baked = session.bake_seal(png.get_ref(), -45.0).unwrap();
    assert_eq!((baked.width(), baked.height()), (40, 20));
    assert!(matches!(
        session.bake_seal(b"not an image", 0.0),
        Err(SealError::InvalidImage(_))
    ));
    assert_eq!(
        session.bake_seal(png.get_ref(), 270.0).unwrap_err(),
        SealError::InvalidAngle(270.0)
    );
}

#[test]
fn unknown_ids_are_reported() {
    let mut session = session_with_pages(1);
    let edit = GeometryChanged::to_geometry(ObjectId(404), Geometry::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(
        session.apply_edit(edit),
        Err(SealError::UnknownObject(ObjectId(404)))
    );
    assert_eq!(
        session.show_page(PageId::new(9).unwrap()).unwrap_err(),
        SealError::PageOutOfRange {
            page: 9,
            page_count: 1
        }
    );
}
