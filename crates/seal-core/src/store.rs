//! Per-page annotation store
//!
//! Placed stamps live here in insertion order. The store hands out
//! geometry for reading and accepts geometry writes, but never changes
//! an object's geometry by itself.

use image::RgbaImage;
use seal_types::{DisplayPixels, Extent, GroupId, Length, ObjectId, PageId, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which point of the object `left`/`top` refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Center,
    TopLeft,
}

/// What kind of stamp an object is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StampKind {
    Normal,
    /// One page's slice of a straddle stamp
    StraddleFragment { group: GroupId, index: u32 },
}

/// Placement of an object on its page, in unzoomed display pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub left: Length<DisplayPixels>,
    pub top: Length<DisplayPixels>,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Geometry {
    pub fn new(left: f64, top: f64, scale_x: f64, scale_y: f64) -> Self {
        Self {
            left: Length::new(left),
            top: Length::new(top),
            scale_x,
            scale_y,
        }
    }

    /// Multiply position and scale, keeping the object's place on the
    /// page when the page's fit scale changes by `ratio`
    pub fn rescaled(self, ratio: f64) -> Self {
        Self {
            left: self.left * ratio,
            top: self.top * ratio,
            scale_x: self.scale_x * ratio,
            scale_y: self.scale_y * ratio,
        }
    }
}

/// One placed stamp
///
/// Its rotation is always zero: the angle is baked into the bitmap.
#[derive(Clone)]
pub struct AnnotationObject {
    id: ObjectId,
    page: PageId,
    kind: StampKind,
    anchor: Anchor,
    bitmap: Arc<RgbaImage>,
    geometry: Geometry,
}

impl AnnotationObject {
    pub fn new(
        id: ObjectId,
        page: PageId,
        kind: StampKind,
        anchor: Anchor,
        bitmap: Arc<RgbaImage>,
        geometry: Geometry,
    ) -> Self {
        Self {
            id,
            page,
            kind,
            anchor,
            bitmap,
            geometry,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn kind(&self) -> StampKind {
        self.kind
    }

    pub fn group(&self) -> Option<GroupId> {
        match self.kind {
            StampKind::Normal => None,
            StampKind::StraddleFragment { group, .. } => Some(group),
        }
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    /// Always zero
    pub fn angle(&self) -> f64 {
        0.0
    }

    /// Bitmap size after scaling
    pub fn scaled_extent(&self) -> Extent<DisplayPixels> {
        Extent::new(
            self.bitmap.width() as f64 * self.geometry.scale_x,
            self.bitmap.height() as f64 * self.geometry.scale_y,
        )
    }

    /// Top-left corner regardless of anchor
    pub fn top_left(&self) -> Point<DisplayPixels> {
        let anchor_point = Point::from_lengths(self.geometry.left, self.geometry.top);
        match self.anchor {
            Anchor::TopLeft => anchor_point,
            Anchor::Center => anchor_point.center_to_top_left(self.scaled_extent()),
        }
    }
}

impl fmt::Debug for AnnotationObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationObject")
            .field("id", &self.id)
            .field("page", &self.page)
            .field("kind", &self.kind)
            .field("anchor", &self.anchor)
            .field("bitmap", &self.bitmap.dimensions())
            .field("geometry", &self.geometry)
            .finish()
    }
}

/// Stamps placed on one page
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    objects: Vec<AnnotationObject>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object. Returns `false` (and changes nothing) if an object
    /// with the same id is already present.
    pub fn add(&mut self, object: AnnotationObject) -> bool {
        if self.contains(object.id()) {
            return false;
        }
        self.objects.push(object);
        true
    }

    /// Remove an object; removing a non-member is a no-op
    pub fn remove(&mut self, id: ObjectId) -> Option<AnnotationObject> {
        let pos = self.objects.iter().position(|o| o.id() == id)?;
        Some(self.objects.remove(pos))
    }

    /// Remove every fragment of `group`, returning their ids
    pub fn remove_group(&mut self, group: GroupId) -> Vec<ObjectId> {
        let mut removed = Vec::new();
        self.objects.retain(|o| {
            if o.group() == Some(group) {
                removed.push(o.id());
                false
            } else {
                true
            }
        });
        removed
    }

    /// All objects in insertion order
    pub fn all(&self) -> &[AnnotationObject] {
        &self.objects
    }

    pub fn by_group(&self, group: GroupId) -> Vec<&AnnotationObject> {
        self.objects
            .iter()
            .filter(|o| o.group() == Some(group))
            .collect()
    }

    pub fn get(&self, id: ObjectId) -> Option<&AnnotationObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut AnnotationObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnnotationObject> {
        self.objects.iter_mut()
    }
}
