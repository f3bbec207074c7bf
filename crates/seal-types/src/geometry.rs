//! Coordinate-space tagged geometry
//!
//! Values in document units and values in display pixels are different
//! types. Moving between them goes through a coordinate space (see
//! `seal_core::coords`), never through a plain field copy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Marker trait for a coordinate space.
pub trait Space: Copy + fmt::Debug + PartialEq + PartialOrd + 'static {
    const NAME: &'static str;
}

/// Fixed, resolution-independent page coordinates (PDF points).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocumentUnits {}

/// Coordinates of the rendered view; depend on viewport size and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisplayPixels {}

impl Space for DocumentUnits {
    const NAME: &'static str = "doc";
}

impl Space for DisplayPixels {
    const NAME: &'static str = "px";
}

/// A scalar distance or offset in space `S`.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Length<S: Space> {
    value: f64,
    #[serde(skip)]
    _space: PhantomData<S>,
}

impl<S: Space> Length<S> {
    pub const ZERO: Self = Self::new(0.0);

    pub const fn new(value: f64) -> Self {
        Self {
            value,
            _space: PhantomData,
        }
    }

    pub fn get(self) -> f64 {
        self.value
    }
}

impl<S: Space> fmt::Debug for Length<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, S::NAME)
    }
}

impl<S: Space> Add for Length<S> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.value + rhs.value)
    }
}

impl<S: Space> Sub for Length<S> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.value - rhs.value)
    }
}

impl<S: Space> Neg for Length<S> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.value)
    }
}

impl<S: Space> Mul<f64> for Length<S> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.value * rhs)
    }
}

impl<S: Space> Div<f64> for Length<S> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::new(self.value / rhs)
    }
}

/// A position in space `S`. Y grows downward in display space and is
/// top-down in document space too until the export step flips it.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S: Space> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    _space: PhantomData<S>,
}

impl<S: Space> Point<S> {
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    pub fn from_lengths(x: Length<S>, y: Length<S>) -> Self {
        Self::new(x.get(), y.get())
    }

    pub fn x_len(self) -> Length<S> {
        Length::new(self.x)
    }

    pub fn y_len(self) -> Length<S> {
        Length::new(self.y)
    }

    /// Shift by `-extent / 2`, turning a center into a top-left corner.
    pub fn center_to_top_left(self, extent: Extent<S>) -> Self {
        Self::new(self.x - extent.width / 2.0, self.y - extent.height / 2.0)
    }
}

impl<S: Space> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}){}", self.x, self.y, S::NAME)
    }
}

/// A width/height pair in space `S`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Extent<S: Space> {
    pub width: f64,
    pub height: f64,
    #[serde(skip)]
    _space: PhantomData<S>,
}

impl<S: Space> Extent<S> {
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            _space: PhantomData,
        }
    }

    /// True when either side is zero, negative or not a finite number.
    pub fn is_degenerate(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn width_len(self) -> Length<S> {
        Length::new(self.width)
    }

    pub fn height_len(self) -> Length<S> {
        Length::new(self.height)
    }
}

impl<S: Space> fmt::Debug for Extent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{}", self.width, self.height, S::NAME)
    }
}
