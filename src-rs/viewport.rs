use serde::Serialize;

use crate::error::{Result, SnapshotError};
use crate::model::{Point, Rect, ViewNode};

pub const DEFAULT_OUTPUT_SIZE: u32 = 512;

/// Canvas size and the uniform scale from snapshot units to canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub scale: f64,
    pub output_width: u32,
    pub output_height: u32,
}

impl Viewport {
    pub fn new(scale: f64, output_width: u32, output_height: u32) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) || output_width == 0 || output_height == 0 {
            return Err(SnapshotError::InvalidViewportSize);
        }
        Ok(Self {
            scale,
            output_width,
            output_height,
        })
    }

    /// Fits the root bounds so that the long edge spans `size` pixels.
    pub fn fit(root: Rect, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(SnapshotError::InvalidViewportSize);
        }
        if root.w == 0 || root.h == 0 {
            return Err(SnapshotError::ZeroSizedRoot {
                w: root.w,
                h: root.h,
            });
        }
        let (w, h, size64) = (u64::from(root.w), u64::from(root.h), u64::from(size));
        let (scale, out_w, out_h) = if root.w < root.h {
            (f64::from(size) / f64::from(root.h), w * size64 / h, size64)
        } else {
            (f64::from(size) / f64::from(root.w), size64, h * size64 / w)
        };
        // a sliver root can round its short edge down to nothing
        let out_w = u32::try_from(out_w.max(1)).unwrap_or(size);
        let out_h = u32::try_from(out_h.max(1)).unwrap_or(size);
        Self::new(scale, out_w, out_h)
    }

    /// Converts a page-space click into the root's frame: remove the canvas
    /// origin, undo the scale, then re-add the root's own offset.
    pub fn to_root_point(&self, page: Point, origin: Point, root: &ViewNode) -> Point {
        Point::new(
            (page.x - origin.x) / self.scale + f64::from(root.x),
            (page.y - origin.y) / self.scale + f64::from(root.y),
        )
    }

    /// Text size in snapshot units that stays `pixels` tall on the canvas.
    pub fn font_size(&self, pixels: f64) -> f64 {
        pixels / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_portrait_uses_height() {
        let vp = Viewport::fit(Rect::new(0, 0, 720, 1280), 512).unwrap();
        assert_eq!(vp.output_height, 512);
        assert_eq!(vp.output_width, 288);
        assert!((vp.scale - 0.4).abs() < 1e-9);
    }

    #[test]
    fn fit_landscape_and_square_use_width() {
        let vp = Viewport::fit(Rect::new(0, 0, 1000, 250), 500).unwrap();
        assert_eq!((vp.output_width, vp.output_height), (500, 125));
        let square = Viewport::fit(Rect::new(0, 0, 100, 100), 512).unwrap();
        assert_eq!((square.output_width, square.output_height), (512, 512));
    }

    #[test]
    fn fit_rejects_zero_sized_root() {
        assert!(matches!(
            Viewport::fit(Rect::new(0, 0, 0, 10), 512),
            Err(SnapshotError::ZeroSizedRoot { w: 0, h: 10 })
        ));
    }

    #[test]
    fn page_point_maps_into_root_frame() {
        let vp = Viewport::new(0.5, 100, 100).unwrap();
        let root = ViewNode {
            uid: 1,
            display_name: "Root".to_string(),
            resource_id: None,
            flags0: "V".to_string(),
            flags1: String::new(),
            x: 10,
            y: 20,
            w: 200,
            h: 200,
            children: Vec::new(),
        };
        let p = vp.to_root_point(Point::new(60.0, 45.0), Point::new(10.0, 5.0), &root);
        assert_eq!(p, Point::new(110.0, 100.0));
    }

    #[test]
    fn font_size_compensates_scale() {
        let vp = Viewport::new(0.25, 10, 10).unwrap();
        assert_eq!(vp.font_size(10.0), 40.0);
    }
}
