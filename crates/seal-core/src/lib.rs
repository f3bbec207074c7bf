//! Seal stamping engine
//!
//! Places raster seal stamps on the pages of a displayed document and
//! projects them back into document space for export.
//!
//! - `bake`: rotate a stamp once into the bitmap every placement shares
//! - `coords`: per-page mapping between document units and display pixels
//! - `store` / `straddle`: placed stamps, and stamps split across all pages
//! - `export` / `pdf`: draw instructions and a lopdf-backed writer
//! - `session`: the mutable state tying it together

pub mod backend;
pub mod bake;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod pdf;
pub mod session;
pub mod store;
pub mod straddle;
pub mod surface;

pub use backend::{OutputWriter, PageRasterizer, Placement};
pub use bake::{bake, bake_bytes, BakedSeal};
pub use config::SealConfig;
pub use coords::{compute_fit_scale, CoordinateSpace, FitPolicy};
pub use error::SealError;
pub use export::{DrawInstruction, ExportBatch, PageExport};
pub use pdf::{PdfPageSource, PdfWriter};
pub use session::{Page, SealSession, StraddlePlan};
pub use store::{Anchor, AnnotationObject, AnnotationStore, Geometry, StampKind};
pub use straddle::{GroupState, StraddleGroup};
pub use surface::{dispatch, GeometryChanged, SetGeometry};
