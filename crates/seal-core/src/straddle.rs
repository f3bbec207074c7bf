//! Straddle stamps
//!
//! A straddle stamp is cut into one vertical slice per page; slice `i`
//! sits flush against the right edge of page `i`, so the stamp reads
//! whole across the fanned edges of the printed stack. The slices of a
//! group always share `top`, `scale_x` and `scale_y`. Each keeps its own
//! `left`, pinned to its page's right edge.

use crate::bake::BakedSeal;
use crate::coords::CoordinateSpace;
use crate::error::SealError;
use crate::store::Geometry;
use crate::surface::{GeometryChanged, SetGeometry};
use image::{imageops, RgbaImage};
use seal_types::{DocumentUnits, GroupId, Length, ObjectId, PageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Fragments are being registered; edits are not synchronized yet
    Creating,
    Active,
    /// Terminal
    Deleted,
}

/// Where one fragment lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentRef {
    pub page: PageId,
    pub object: ObjectId,
}

/// Bookkeeping and sync rules for one straddle stamp
#[derive(Debug, Clone)]
pub struct StraddleGroup {
    id: GroupId,
    state: GroupState,
    fragments: Vec<FragmentRef>,
}

impl StraddleGroup {
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            state: GroupState::Creating,
            fragments: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Fragments in page order
    pub fn fragments(&self) -> &[FragmentRef] {
        &self.fragments
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.fragments.iter().any(|f| f.object == object)
    }

    /// Register a fragment. Only allowed while the group is being created.
    pub fn register(&mut self, page: PageId, object: ObjectId) -> Result<(), SealError> {
        if self.state != GroupState::Creating {
            return Err(SealError::UnknownGroup(self.id));
        }
        self.fragments.push(FragmentRef { page, object });
        Ok(())
    }

    /// Enable synchronization once every fragment is registered
    pub fn activate(&mut self) {
        if self.state == GroupState::Creating {
            self.state = GroupState::Active;
        }
    }

    pub fn mark_deleted(&mut self) {
        self.state = GroupState::Deleted;
        self.fragments.clear();
    }

    /// Commands that bring every other fragment in line with an edit
    ///
    /// `current` reports a fragment's present geometry. Fragments that
    /// already match get no command, so replaying the same edit is
    /// silent. `left` is carried over from each target unchanged, and the
    /// edited fragment itself is never part of the result.
    pub fn handle<F>(&self, event: &GeometryChanged, current: F) -> Vec<SetGeometry>
    where
        F: Fn(FragmentRef) -> Option<Geometry>,
    {
        if self.state != GroupState::Active || !self.contains(event.object) {
            return Vec::new();
        }

        self.fragments
            .iter()
            .filter(|f| f.object != event.object)
            .filter_map(|&f| {
                let geometry = current(f)?;
                let synced = Geometry {
                    left: geometry.left,
                    top: event.top,
                    scale_x: event.scale_x,
                    scale_y: event.scale_y,
                };
                (synced != geometry).then(|| SetGeometry::new(f.page, f.object, synced))
            })
            .collect()
    }
}

/// Cut `image` into `pages` vertical slices that tile it exactly
///
/// Slice `i` covers columns `[i·w/n, (i+1)·w/n)`.
pub fn slice_fragments(image: &RgbaImage, pages: u32) -> Result<Vec<RgbaImage>, SealError> {
    let (w, h) = image.dimensions();
    if pages == 0 {
        return Err(SealError::DocumentNotLoaded);
    }
    if w < pages {
        return Err(SealError::StampTooNarrow { width: w, pages });
    }

    Ok((0..pages)
        .map(|i| {
            let x0 = (i as u64 * w as u64 / pages as u64) as u32;
            let x1 = ((i as u64 + 1) * w as u64 / pages as u64) as u32;
            imageops::crop_imm(image, x0, 0, x1 - x0, h).to_image()
        })
        .collect())
}

/// One fragment ready to be placed
#[derive(Debug, Clone)]
pub struct FragmentPlan {
    pub page: PageId,
    pub index: u32,
    pub bitmap: RgbaImage,
    pub geometry: Geometry,
}

/// Slice a baked stamp and lay out one fragment per page
///
/// `pages` must list every page of the document in order, each with its
/// coordinate space. The shared scale makes the whole stamp
/// `width_fraction` of the first page's width; the shared top is
/// `top` converted through the first page. Geometry is in unzoomed
/// display pixels.
pub fn plan_fragments(
    baked: &BakedSeal,
    pages: &[(PageId, CoordinateSpace)],
    width_fraction: f64,
    top: Length<DocumentUnits>,
) -> Result<Vec<FragmentPlan>, SealError> {
    let (_, first_space) = pages.first().ok_or(SealError::DocumentNotLoaded)?;
    let first = first_space.unzoomed();

    let slices = slice_fragments(baked.image(), pages.len() as u32)?;
    let scale = first.display_extent().width * width_fraction / baked.width() as f64;
    let shared_top = first.length_to_display(top);

    Ok(pages
        .iter()
        .zip(slices)
        .enumerate()
        .map(|(index, ((page, space), bitmap))| {
            let page_width = space.unzoomed().display_extent().width;
            let left = page_width - bitmap.width() as f64 * scale;
            FragmentPlan {
                page: *page,
                index: index as u32,
                bitmap,
                geometry: Geometry {
                    left: Length::new(left),
                    top: shared_top,
                    scale_x: scale,
                    scale_y: scale,
                },
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::bake;
    use image::Rgba;
    use pretty_assertions::assert_eq;
    use seal_types::Extent;
    use std::collections::HashMap;

    fn page(n: u32) -> PageId {
        PageId::new(n).unwrap()
    }

    /// Columns colored by x so slices can be told apart
    fn striped(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| Rgba([(x % 256) as u8, 0, 0, 255]))
    }

    fn active_group(n: u64) -> StraddleGroup {
        let mut group = StraddleGroup::new(GroupId(1));
        for i in 1..=n {
            group.register(page(i as u32), ObjectId(i)).unwrap();
        }
        group.activate();
        group
    }

    fn edit(object: u64, top: f64, scale: f64) -> GeometryChanged {
        GeometryChanged {
            object: ObjectId(object),
            left: Length::new(0.0),
            top: Length::new(top),
            scale_x: scale,
            scale_y: scale,
            angle: 0.0,
        }
    }

    #[test]
    fn test_slices_tile_the_image() {
        let img = striped(10, 4);
        let slices = slice_fragments(&img, 3).unwrap();
        let widths: Vec<u32> = slices.iter().map(|s| s.width()).collect();
        assert_eq!(widths, vec![3, 3, 4]);
        assert_eq!(slices[1].get_pixel(0, 0)[0], 3);
        assert_eq!(slices[2].get_pixel(3, 0)[0], 9);
    }

    #[test]
    fn test_slices_of_even_width_are_equal() {
        let slices = slice_fragments(&striped(400, 10), 4).unwrap();
        assert!(slices.iter().all(|s| s.dimensions() == (100, 10)));
    }

    #[test]
    fn test_stamp_narrower_than_page_count() {
        let err = slice_fragments(&striped(2, 2), 3).unwrap_err();
        assert_eq!(err, SealError::StampTooNarrow { width: 2, pages: 3 });
    }

    #[test]
    fn test_plan_pins_fragments_to_right_edge() {
        let baked = bake(&striped(400, 200), 0.0).unwrap();
        let space = CoordinateSpace::new(Extent::new(600.0, 800.0), 1.5);
        let pages: Vec<(PageId, CoordinateSpace)> = (1..=4).map(|n| (page(n), space)).collect();

        let plans = plan_fragments(&baked, &pages, 0.2, Length::new(200.0)).unwrap();
        assert_eq!(plans.len(), 4);

        // page is 900px wide; the whole stamp spans a fifth of it
        let scale = 900.0 * 0.2 / 400.0;
        for plan in &plans {
            assert_eq!(plan.bitmap.width(), 100);
            assert_eq!(plan.geometry.scale_x, scale);
            assert_eq!(plan.geometry.scale_y, scale);
            assert_eq!(plan.geometry.top.get(), 300.0);
            assert_eq!(plan.geometry.left.get(), 900.0 - 100.0 * scale);
        }
        assert_eq!(plans[2].index, 2);
        assert_eq!(plans[2].bitmap.get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn test_plan_ignores_zoom() {
        let baked = bake(&striped(400, 200), 0.0).unwrap();
        let mut zoomed = CoordinateSpace::new(Extent::new(600.0, 800.0), 1.5);
        zoomed.set_zoom(3.0);
        let plain = CoordinateSpace::new(Extent::new(600.0, 800.0), 1.5);

        let a = plan_fragments(&baked, &[(page(1), zoomed)], 0.2, Length::new(200.0)).unwrap();
        let b = plan_fragments(&baked, &[(page(1), plain)], 0.2, Length::new(200.0)).unwrap();
        assert_eq!(a[0].geometry, b[0].geometry);
    }

    #[test]
    fn test_handle_broadcasts_to_other_fragments() {
        let group = active_group(3);
        let geometry: HashMap<ObjectId, Geometry> = (1..=3)
            .map(|i| (ObjectId(i), Geometry::new(800.0 + i as f64, 300.0, 0.45, 0.45)))
            .collect();

        let commands = group.handle(&edit(2, 120.0, 0.6), |f| geometry.get(&f.object).copied());
        let targets: Vec<ObjectId> = commands.iter().map(|c| c.object).collect();
        assert_eq!(targets, vec![ObjectId(1), ObjectId(3)]);
        for c in &commands {
            assert_eq!(c.geometry.top.get(), 120.0);
            assert_eq!(c.geometry.scale_x, 0.6);
            assert_eq!(c.geometry.scale_y, 0.6);
            // left is the target's own
            assert_eq!(c.geometry.left, geometry[&c.object].left);
            assert_eq!(c.angle, 0.0);
        }
    }

    #[test]
    fn test_handle_is_silent_when_already_in_sync() {
        let group = active_group(3);
        let current = |_: FragmentRef| Some(Geometry::new(800.0, 120.0, 0.6, 0.6));
        assert!(group.handle(&edit(1, 120.0, 0.6), current).is_empty());
    }

    #[test]
    fn test_handle_requires_active_group() {
        let mut group = StraddleGroup::new(GroupId(1));
        group.register(page(1), ObjectId(1)).unwrap();
        group.register(page(2), ObjectId(2)).unwrap();
        let current = |_: FragmentRef| Some(Geometry::new(0.0, 0.0, 1.0, 1.0));
        assert!(group.handle(&edit(1, 5.0, 2.0), current).is_empty());

        group.activate();
        assert_eq!(group.handle(&edit(1, 5.0, 2.0), current).len(), 1);

        group.mark_deleted();
        assert!(group.handle(&edit(1, 5.0, 2.0), current).is_empty());
        assert_eq!(group.state(), GroupState::Deleted);
    }

    #[test]
    fn test_handle_ignores_foreign_objects() {
        let group = active_group(2);
        let current = |_: FragmentRef| Some(Geometry::new(0.0, 0.0, 1.0, 1.0));
        assert!(group.handle(&edit(42, 5.0, 2.0), current).is_empty());
    }

    #[test]
    fn test_register_after_activation_fails() {
        let mut group = active_group(1);
        assert_eq!(
            group.register(page(2), ObjectId(9)),
            Err(SealError::UnknownGroup(GroupId(1)))
        );
    }
}
