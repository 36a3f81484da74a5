//! Painting a view tree onto a 2D surface.
//!
//! Every render starts from scratch: the surface is cleared, the viewport scale
//! is applied, and the tree is walked with absolute offsets accumulated on the
//! way down. Selection annotations live in a side map computed per render.

use std::collections::HashMap;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::model::{Uid, ViewNode};
use crate::viewport::Viewport;

pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 179]);
/// On-canvas height of a label line, independent of zoom.
pub const LABEL_PIXELS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectStyle {
    pub fill: Rgba<u8>,
    pub stroke: Rgba<u8>,
}

pub const SELECTED_STYLE: RectStyle = RectStyle {
    fill: Rgba([255, 0, 0, 77]),
    stroke: Rgba([255, 0, 0, 255]),
};

/// Selected, but not actually visible on the device.
pub const SELECTED_HIDDEN_STYLE: RectStyle = RectStyle {
    fill: Rgba([255, 0, 255, 77]),
    stroke: Rgba([255, 0, 255, 255]),
};

pub const ANCESTOR_STYLE: RectStyle = RectStyle {
    fill: Rgba([255, 0, 255, 13]),
    stroke: Rgba([255, 0, 255, 102]),
};

pub const PLAIN_STYLE: RectStyle = RectStyle {
    fill: Rgba([0, 255, 0, 13]),
    stroke: Rgba([0, 255, 0, 102]),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRelation {
    Selected,
    Ancestor,
    Unrelated,
}

/// A native-style 2D drawing context. Coordinates passed after
/// [`Surface::set_scale`] are in snapshot units.
pub trait Surface {
    fn clear(&mut self, color: Rgba<u8>);
    fn set_scale(&mut self, scale: f64);
    fn paint_rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: RectStyle);
    /// Draws one line of text whose top-left corner is at `(x, y)`.
    fn fill_text(&mut self, x: f64, y: f64, text: &str, font_size: f64, color: Rgba<u8>);
}

/// Style for a node, or `None` when it must not be painted.
pub fn paint_style(relation: SelectionRelation, visible: bool) -> Option<RectStyle> {
    match (relation, visible) {
        (SelectionRelation::Selected, true) => Some(SELECTED_STYLE),
        (SelectionRelation::Selected, false) => Some(SELECTED_HIDDEN_STYLE),
        (SelectionRelation::Ancestor, _) => Some(ANCESTOR_STYLE),
        (SelectionRelation::Unrelated, true) => Some(PLAIN_STYLE),
        (SelectionRelation::Unrelated, false) => None,
    }
}

/// Relations of the selected node and its strict ancestors. Nodes absent from
/// the map are [`SelectionRelation::Unrelated`].
pub fn selection_relations(root: &ViewNode, selected: Option<Uid>) -> HashMap<Uid, SelectionRelation> {
    let mut out = HashMap::new();
    if let Some(selected) = selected {
        annotate(root, selected, &mut out);
    }
    out
}

fn annotate(
    node: &ViewNode,
    selected: Uid,
    out: &mut HashMap<Uid, SelectionRelation>,
) -> SelectionRelation {
    if node.uid == selected {
        out.insert(node.uid, SelectionRelation::Selected);
        return SelectionRelation::Selected;
    }
    let mut relation = SelectionRelation::Unrelated;
    for child in &node.children {
        if annotate(child, selected, out) != SelectionRelation::Unrelated {
            relation = SelectionRelation::Ancestor;
        }
    }
    if relation == SelectionRelation::Ancestor {
        out.insert(node.uid, relation);
    }
    relation
}

pub fn render<S: Surface>(
    root: Option<&ViewNode>,
    selected: Option<Uid>,
    surface: &mut S,
    viewport: &Viewport,
) {
    surface.clear(BACKGROUND);
    let Some(root) = root else {
        return;
    };
    surface.set_scale(viewport.scale);

    let relations = selection_relations(root, selected);
    let mut ctx = RenderContext {
        relations: &relations,
        font_size: viewport.font_size(LABEL_PIXELS),
        painted: 0,
    };
    // the root is drawn at the canvas origin regardless of its own position
    ctx.render_view(surface, root, true, -f64::from(root.x), -f64::from(root.y));
    debug!(?selected, painted = ctx.painted, "rendered view tree");
}

struct RenderContext<'a> {
    relations: &'a HashMap<Uid, SelectionRelation>,
    font_size: f64,
    painted: usize,
}

impl RenderContext<'_> {
    fn render_view<S: Surface>(&mut self, surface: &mut S, view: &ViewNode, is_root: bool, dx: f64, dy: f64) {
        let relation = self
            .relations
            .get(&view.uid)
            .copied()
            .unwrap_or(SelectionRelation::Unrelated);
        let visible = is_root || view.visibility().is_visible();
        let Some(style) = paint_style(relation, visible) else {
            return;
        };

        let x = dx + f64::from(view.x);
        let y = dy + f64::from(view.y);
        surface.paint_rect(x, y, f64::from(view.w), f64::from(view.h), style);
        self.painted += 1;

        if relation == SelectionRelation::Selected {
            surface.fill_text(x, y, &view.display_name, self.font_size, LABEL_COLOR);
            if let Some(resource_id) = &view.resource_id {
                surface.fill_text(x, y + self.font_size, resource_id, self.font_size, LABEL_COLOR);
            }
        }

        // a hidden node hides its subtree unless the selection lies below it
        if !visible && relation != SelectionRelation::Ancestor {
            return;
        }
        for child in &view.children {
            self.render_view(surface, child, false, x, y);
        }
    }
}

/// Surface backed by an RGBA image, one pixel per canvas pixel.
pub struct ImageSurface {
    image: RgbaImage,
    scale: f64,
}

impl ImageSurface {
    pub fn new(viewport: &Viewport) -> Self {
        Self {
            image: RgbaImage::new(viewport.output_width, viewport.output_height),
            scale: 1.0,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn to_px(&self, v: f64) -> i32 {
        (v * self.scale)
            .round()
            .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    }
}

impl Surface for ImageSurface {
    fn clear(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    fn paint_rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: RectStyle) {
        let (x0, y0) = (self.to_px(x), self.to_px(y));
        let (x1, y1) = (self.to_px(x + w), self.to_px(y + h));
        fill_rect_alpha(&mut self.image, x0, y0, x1, y1, style.fill);
        stroke_rect_alpha(&mut self.image, x0, y0, x1, y1, style.stroke);
    }

    fn fill_text(&mut self, x: f64, y: f64, text: &str, font_size: f64, color: Rgba<u8>) {
        let glyph_scale = ((font_size * self.scale) / 8.0).round().max(1.0) as i32;
        let (px, py) = (self.to_px(x), self.to_px(y));
        draw_bitmap_text(&mut self.image, px, py, text, color, glyph_scale);
    }
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn blend_at(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let dst = *img.get_pixel(x as u32, y as u32);
    img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
}

/// Blends `color` over the half-open pixel span `[x0, x1) x [y0, y1)`.
fn fill_rect_alpha(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let min_x = x0.max(0);
    let min_y = y0.max(0);
    let max_x = x1.min(img.width() as i32);
    let max_y = y1.min(img.height() as i32);
    for y in min_y..max_y {
        for x in min_x..max_x {
            blend_at(img, x, y, color);
        }
    }
}

/// One-pixel border on the inside of the span; every border pixel is blended once.
fn stroke_rect_alpha(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let last_x = (x1 - 1).max(x0);
    let last_y = (y1 - 1).max(y0);
    fill_rect_alpha(img, x0, y0, last_x + 1, y0 + 1, color);
    if last_y > y0 {
        fill_rect_alpha(img, x0, last_y, last_x + 1, last_y + 1, color);
    }
    if last_y > y0 + 1 {
        fill_rect_alpha(img, x0, y0 + 1, x0 + 1, last_y, color);
        if last_x > x0 {
            fill_rect_alpha(img, last_x, y0 + 1, last_x + 1, last_y, color);
        }
    }
}

fn draw_bitmap_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>, scale: i32) {
    let scale = scale.max(1);
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8 * scale;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (*row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale;
                let py = y + row_idx as i32 * scale;
                for sy in 0..scale {
                    for sx in 0..scale {
                        blend_at(img, px + sx, py + sy, color);
                    }
                }
            }
        }
        cursor_x += 8 * scale;
    }
}
