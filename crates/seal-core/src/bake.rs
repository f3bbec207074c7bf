//! Stamp baking
//!
//! A raw stamp image is rotated once into a canonical bitmap with the
//! same pixel size as the source. Every placement (normal or straddle
//! fragment) draws from that bitmap, so placed objects never carry a
//! rotation of their own.

use crate::error::SealError;
use image::{imageops, Rgba, RgbaImage};
use std::fmt;
use std::sync::Arc;

/// Canonical rotated-and-cropped stamp bitmap
///
/// Immutable once produced; clones share the pixel buffer.
#[derive(Clone, PartialEq)]
pub struct BakedSeal {
    image: Arc<RgbaImage>,
    angle: f64,
}

impl BakedSeal {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Shared handle to the pixels, for objects that reference the bitmap
    pub fn shared(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Rotation (degrees) that was baked in
    pub fn angle(&self) -> f64 {
        self.angle
    }
}

impl fmt::Debug for BakedSeal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BakedSeal")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("angle", &self.angle)
            .finish()
    }
}

/// Decode an encoded stamp (PNG) and bake it
pub fn bake_bytes(bytes: &[u8], angle_degrees: f64) -> Result<BakedSeal, SealError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| SealError::InvalidImage(e.to_string()))?
        .to_rgba8();
    bake(&decoded, angle_degrees)
}

/// Rotate `source` about its center and crop back to its own size
///
/// The source is first drawn into a buffer large enough for its rotated
/// bounding box, so the rotation itself never clips; the centered
/// `w x h` window of that buffer is the result. Corners exposed by the
/// rotation are transparent.
pub fn bake(source: &RgbaImage, angle_degrees: f64) -> Result<BakedSeal, SealError> {
    let (w, h) = source.dimensions();
    if w == 0 || h == 0 {
        return Err(SealError::InvalidImage(format!(
            "stamp has zero size ({}x{})",
            w, h
        )));
    }
    if !angle_degrees.is_finite() || !(-180.0..=180.0).contains(&angle_degrees) {
        return Err(SealError::InvalidAngle(angle_degrees));
    }

    if angle_degrees == 0.0 {
        return Ok(BakedSeal {
            image: Arc::new(source.clone()),
            angle: angle_degrees,
        });
    }

    let (buf_w, buf_h) = rotated_bounds(w, h, angle_degrees);
    let buffer = rotate_into(source, angle_degrees, buf_w, buf_h);
    let cropped = imageops::crop_imm(&buffer, (buf_w - w) / 2, (buf_h - h) / 2, w, h).to_image();

    Ok(BakedSeal {
        image: Arc::new(cropped),
        angle: angle_degrees,
    })
}

/// Buffer size for a `w x h` image rotated by `angle_degrees`
///
/// `w·|cos θ| + h·|sin θ|` by `w·|sin θ| + h·|cos θ|`, never smaller than
/// the source on either axis, and padded so the margin around the
/// source splits evenly on both sides.
pub fn rotated_bounds(w: u32, h: u32, angle_degrees: f64) -> (u32, u32) {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let (wf, hf) = (w as f64, h as f64);
    let snap = |v: f64| (v - 1e-6).ceil().max(0.0) as u32;

    let even_pad = |size: u32, base: u32| {
        let size = size.max(base);
        if (size - base) % 2 == 1 {
            size + 1
        } else {
            size
        }
    };

    (
        even_pad(snap(wf * cos.abs() + hf * sin.abs()), w),
        even_pad(snap(wf * sin.abs() + hf * cos.abs()), h),
    )
}

/// Draw `source` rotated about its center into a `buf_w x buf_h` buffer
fn rotate_into(source: &RgbaImage, angle_degrees: f64, buf_w: u32, buf_h: u32) -> RgbaImage {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let src_cx = source.width() as f64 / 2.0;
    let src_cy = source.height() as f64 / 2.0;
    let buf_cx = buf_w as f64 / 2.0;
    let buf_cy = buf_h as f64 / 2.0;

    RgbaImage::from_fn(buf_w, buf_h, |bx, by| {
        // inverse rotation: buffer pixel center -> source position
        let dx = bx as f64 + 0.5 - buf_cx;
        let dy = by as f64 + 0.5 - buf_cy;
        let sx = cos * dx + sin * dy + src_cx;
        let sy = -sin * dx + cos * dy + src_cy;
        sample_bilinear(source, sx, sy)
    })
}

/// Bilinear sample at a continuous position, interpolating premultiplied
/// color. Outside the source counts as transparent.
fn sample_bilinear(source: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let (w, h) = (source.width() as i64, source.height() as i64);
    let mut acc = [0.0f64; 4];

    for (ox, wx) in [(0i64, 1.0 - tx), (1, tx)] {
        for (oy, wy) in [(0i64, 1.0 - ty), (1, ty)] {
            let weight = wx * wy;
            if weight <= 0.0 {
                continue;
            }
            let px = x0 as i64 + ox;
            let py = y0 as i64 + oy;
            if px < 0 || py < 0 || px >= w || py >= h {
                continue;
            }
            let p = source.get_pixel(px as u32, py as u32);
            let alpha = p[3] as f64 / 255.0;
            acc[0] += p[0] as f64 * alpha * weight;
            acc[1] += p[1] as f64 * alpha * weight;
            acc[2] += p[2] as f64 * alpha * weight;
            acc[3] += p[3] as f64 * weight;
        }
    }

    if acc[3] < 0.5 {
        return Rgba([0, 0, 0, 0]);
    }
    let alpha = acc[3] / 255.0;
    let channel = |v: f64| (v / alpha).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(acc[0]),
        channel(acc[1]),
        channel(acc[2]),
        acc[3].round().clamp(0.0, 255.0) as u8,
    ])
}
