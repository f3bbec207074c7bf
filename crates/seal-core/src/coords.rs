//! Coordinate transformation between document units and display pixels
//!
//! Each page has a fit scale (display pixels per document unit at 100%
//! zoom, derived from the viewport) and shares the global zoom
//! multiplier. The effective scale is their product.

use seal_types::{DisplayPixels, DocumentUnits, Extent, Length, Point};
use serde::{Deserialize, Serialize};

/// How a page is fitted into the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Page width fills the viewport width; height scrolls
    #[default]
    FitWidth,
    /// Whole page is visible
    FitPage,
}

/// Viewport area left after removing the margin and applying the fill ratio
pub fn usable_viewport(
    viewport: Extent<DisplayPixels>,
    margin: f64,
    fill: f64,
) -> Extent<DisplayPixels> {
    Extent::new(
        (viewport.width - margin) * fill,
        (viewport.height - margin) * fill,
    )
}

/// Display pixels per document unit at 100% zoom
///
/// Always derived from the page's document extent, so repeated resizes
/// never compound rounding. Returns `None` while the viewport has no
/// usable size.
pub fn compute_fit_scale(
    document: Extent<DocumentUnits>,
    viewport: Extent<DisplayPixels>,
    policy: FitPolicy,
) -> Option<f64> {
    if document.is_degenerate() || !(viewport.width > 0.0) {
        return None;
    }
    let width_scale = viewport.width / document.width;
    match policy {
        FitPolicy::FitWidth => Some(width_scale),
        FitPolicy::FitPage => {
            if !(viewport.height > 0.0) {
                return None;
            }
            Some(width_scale.min(viewport.height / document.height))
        }
    }
}

/// Per-page mapping between document units and display pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSpace {
    document_extent: Extent<DocumentUnits>,
    fit_scale: f64,
    zoom: f64,
}

impl CoordinateSpace {
    pub fn new(document_extent: Extent<DocumentUnits>, fit_scale: f64) -> Self {
        Self {
            document_extent,
            fit_scale,
            zoom: 1.0,
        }
    }

    pub fn fit(
        document_extent: Extent<DocumentUnits>,
        viewport: Extent<DisplayPixels>,
        policy: FitPolicy,
    ) -> Option<Self> {
        compute_fit_scale(document_extent, viewport, policy)
            .map(|fit_scale| Self::new(document_extent, fit_scale))
    }

    pub fn document_extent(&self) -> Extent<DocumentUnits> {
        self.document_extent
    }

    pub fn fit_scale(&self) -> f64 {
        self.fit_scale
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn effective_scale(&self) -> f64 {
        self.fit_scale * self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Recompute the fit scale for a new viewport
    ///
    /// Returns the ratio `new / old` so callers can rescale geometry
    /// stored at the old fit scale, or `None` (leaving the space
    /// untouched) when the viewport is not usable.
    pub fn refit(&mut self, viewport: Extent<DisplayPixels>, policy: FitPolicy) -> Option<f64> {
        let fit_scale = compute_fit_scale(self.document_extent, viewport, policy)?;
        let ratio = fit_scale / self.fit_scale;
        self.fit_scale = fit_scale;
        Some(ratio)
    }

    /// The same page at 100% zoom
    pub fn unzoomed(&self) -> Self {
        Self {
            zoom: 1.0,
            ..*self
        }
    }

    pub fn to_display(&self, p: Point<DocumentUnits>) -> Point<DisplayPixels> {
        let s = self.effective_scale();
        Point::new(p.x * s, p.y * s)
    }

    pub fn to_document(&self, p: Point<DisplayPixels>) -> Point<DocumentUnits> {
        let s = self.effective_scale();
        Point::new(p.x / s, p.y / s)
    }

    pub fn length_to_display(&self, l: Length<DocumentUnits>) -> Length<DisplayPixels> {
        Length::new(l.get() * self.effective_scale())
    }

    pub fn length_to_document(&self, l: Length<DisplayPixels>) -> Length<DocumentUnits> {
        Length::new(l.get() / self.effective_scale())
    }

    pub fn extent_to_display(&self, e: Extent<DocumentUnits>) -> Extent<DisplayPixels> {
        let s = self.effective_scale();
        Extent::new(e.width * s, e.height * s)
    }

    pub fn extent_to_document(&self, e: Extent<DisplayPixels>) -> Extent<DocumentUnits> {
        let s = self.effective_scale();
        Extent::new(e.width / s, e.height / s)
    }

    /// Size of the page as currently displayed
    pub fn display_extent(&self) -> Extent<DisplayPixels> {
        self.extent_to_display(self.document_extent)
    }
}
