//! Messages exchanged with the interactive editing surface
//!
//! The surface reports user edits as [`GeometryChanged`]; the session
//! answers with [`SetGeometry`] commands the surface applies and
//! re-renders. Applying a command is not an edit, so it never produces
//! another `GeometryChanged`.

use crate::store::Geometry;
use seal_types::{DisplayPixels, Length, ObjectId, PageId};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::warn;

/// A move, scale or rotate edit made on the surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryChanged {
    pub object: ObjectId,
    pub left: Length<DisplayPixels>,
    pub top: Length<DisplayPixels>,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
}

impl GeometryChanged {
    /// An edit that moves/scales an object to `geometry` without rotating it
    pub fn to_geometry(object: ObjectId, geometry: Geometry) -> Self {
        Self {
            object,
            left: geometry.left,
            top: geometry.top,
            scale_x: geometry.scale_x,
            scale_y: geometry.scale_y,
            angle: 0.0,
        }
    }
}

/// Geometry the surface must show for an object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetGeometry {
    pub page: PageId,
    pub object: ObjectId,
    pub geometry: Geometry,
    /// Always zero: placed stamps do not rotate
    pub angle: f64,
}

impl SetGeometry {
    pub fn new(page: PageId, object: ObjectId, geometry: Geometry) -> Self {
        Self {
            page,
            object,
            geometry,
            angle: 0.0,
        }
    }
}

/// Forward commands to the surface
///
/// A failure to re-render one object is logged and does not stop the
/// remaining commands. Returns how many commands failed.
pub fn dispatch<F, E>(commands: &[SetGeometry], mut render: F) -> usize
where
    F: FnMut(&SetGeometry) -> Result<(), E>,
    E: Display,
{
    let mut failures = 0;
    for command in commands {
        if let Err(e) = render(command) {
            failures += 1;
            warn!(
                page = command.page.number(),
                object = command.object.0,
                "Re-render failed: {}",
                e
            );
        }
    }
    failures
}
