//! Shared types for the seal stamping workspace
//!
//! Geometry tagged with the coordinate space it lives in, plus the
//! stable identifiers used to address pages, placed stamps and
//! straddle groups.

pub mod geometry;
pub mod ids;

pub use geometry::{DisplayPixels, DocumentUnits, Extent, Length, Point, Space};
pub use ids::{GroupId, ObjectId, PageId};
