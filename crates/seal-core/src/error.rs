use seal_types::{GroupId, ObjectId, PageId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SealError {
    #[error("Invalid stamp image: {0}")]
    InvalidImage(String),

    #[error("Rotation angle {0} is outside [-180, 180]")]
    InvalidAngle(f64),

    #[error("Zoom multiplier {0} is outside the allowed range")]
    InvalidZoom(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No document is loaded")]
    DocumentNotLoaded,

    #[error("{0} is not ready: viewport has not been measured")]
    PageNotReady(PageId),

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Unknown {0}")]
    UnknownObject(ObjectId),

    #[error("Unknown or deleted group {0}")]
    UnknownGroup(GroupId),

    #[error("Stamp is {width}px wide and cannot be split across {pages} pages")]
    StampTooNarrow { width: u32, pages: u32 },

    #[error("Result belongs to a document that has since been replaced")]
    StaleDocument,

    #[error("Page rasterizer failed: {0}")]
    Rasterizer(String),

    #[error("Failed to rasterize {object} on {page}: {reason}")]
    ExportRasterizationFailure {
        page: PageId,
        object: ObjectId,
        reason: String,
    },

    #[error("PDF operation failed: {0}")]
    Pdf(String),
}
