//! Engine configuration
//!
//! Layout policy and raster settings for a deployment. Values come from
//! code (builder methods), a JSON document, or `SEAL_*` environment
//! variables.

use crate::coords::FitPolicy;
use crate::error::SealError;
use serde::{Deserialize, Serialize};

/// Layout and export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    /// How a page is fitted into the viewport
    pub fit_policy: FitPolicy,
    /// Pixels reserved around the page before fitting
    pub viewport_margin: f64,
    /// Share of the remaining viewport the page may occupy (0, 1]
    pub viewport_fill: f64,
    /// Scale (pixels per document unit) for page background rasters
    pub background_scale: f64,
    /// Width of a freshly placed stamp as a fraction of the page width
    pub stamp_width_fraction: f64,
    /// Default top edge of straddle fragments, in document units
    pub straddle_top: f64,
    /// Super-sampling multiplier for exported stamp rasters
    pub export_supersample: f64,
    /// Smallest user zoom `set_zoom` accepts; at most 1.0
    pub min_zoom: f64,
    /// Largest user zoom; at least 1.0
    pub max_zoom: f64,
    /// RGBA fill for backgrounds produced without a real renderer
    pub paper_color: [u8; 4],
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            fit_policy: FitPolicy::FitWidth,
            viewport_margin: 40.0,
            viewport_fill: 0.9,
            background_scale: 2.0,
            stamp_width_fraction: 0.2,
            straddle_top: 200.0,
            export_supersample: 2.0,
            min_zoom: 0.25,
            max_zoom: 4.0,
            paper_color: [255, 255, 255, 255],
        }
    }
}

impl SealConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fit_policy(mut self, policy: FitPolicy) -> Self {
        self.fit_policy = policy;
        self
    }

    /// Use the whole viewport: no margin, full fill
    pub fn with_exact_viewport(mut self) -> Self {
        self.viewport_margin = 0.0;
        self.viewport_fill = 1.0;
        self
    }

    pub fn with_supersample(mut self, multiplier: f64) -> Self {
        self.export_supersample = multiplier;
        self
    }

    pub fn with_stamp_width_fraction(mut self, fraction: f64) -> Self {
        self.stamp_width_fraction = fraction;
        self
    }

    pub fn with_straddle_top(mut self, top: f64) -> Self {
        self.straddle_top = top;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, SealError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SealError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults:
    /// - SEAL_FIT_POLICY: "fit_width" or "fit_page"
    /// - SEAL_VIEWPORT_MARGIN, SEAL_VIEWPORT_FILL
    /// - SEAL_BACKGROUND_SCALE
    /// - SEAL_STAMP_FRACTION
    /// - SEAL_STRADDLE_TOP
    /// - SEAL_SUPERSAMPLE
    /// - SEAL_MIN_ZOOM, SEAL_MAX_ZOOM
    pub fn from_env() -> Result<Self, SealError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SealError> {
        let mut config = Self::default();

        if let Some(policy) = lookup("SEAL_FIT_POLICY") {
            config.fit_policy = match policy.to_lowercase().as_str() {
                "fit_width" | "width" => FitPolicy::FitWidth,
                "fit_page" | "page" => FitPolicy::FitPage,
                _ => {
                    return Err(SealError::InvalidConfig(format!(
                        "Unknown fit policy: {}",
                        policy
                    )))
                }
            };
        }

        let number = |key: &str, slot: &mut f64| -> Result<(), SealError> {
            if let Some(raw) = lookup(key) {
                *slot = raw
                    .trim()
                    .parse()
                    .map_err(|_| SealError::InvalidConfig(format!("{}={} is not a number", key, raw)))?;
            }
            Ok(())
        };
        number("SEAL_VIEWPORT_MARGIN", &mut config.viewport_margin)?;
        number("SEAL_VIEWPORT_FILL", &mut config.viewport_fill)?;
        number("SEAL_BACKGROUND_SCALE", &mut config.background_scale)?;
        number("SEAL_STAMP_FRACTION", &mut config.stamp_width_fraction)?;
        number("SEAL_STRADDLE_TOP", &mut config.straddle_top)?;
        number("SEAL_SUPERSAMPLE", &mut config.export_supersample)?;
        number("SEAL_MIN_ZOOM", &mut config.min_zoom)?;
        number("SEAL_MAX_ZOOM", &mut config.max_zoom)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SealError> {
        let invalid = |msg: &str| Err(SealError::InvalidConfig(msg.to_string()));

        if !(self.viewport_margin >= 0.0) {
            return invalid("viewport_margin must be >= 0");
        }
        if !(self.viewport_fill > 0.0 && self.viewport_fill <= 1.0) {
            return invalid("viewport_fill must be in (0, 1]");
        }
        if !(self.background_scale > 0.0) {
            return invalid("background_scale must be > 0");
        }
        if !(self.stamp_width_fraction > 0.0 && self.stamp_width_fraction <= 1.0) {
            return invalid("stamp_width_fraction must be in (0, 1]");
        }
        if !self.straddle_top.is_finite() {
            return invalid("straddle_top must be finite");
        }
        if !(self.export_supersample >= 1.0) {
            return invalid("export_supersample must be >= 1");
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= 1.0 && self.max_zoom >= 1.0)
            || !self.max_zoom.is_finite()
        {
            return invalid("zoom range must contain 1.0 and be positive");
        }
        Ok(())
    }
}
