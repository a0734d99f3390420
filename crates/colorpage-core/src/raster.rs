//! Offline placeholder page.
//!
//! When no generation credential is configured each page is drawn locally:
//! a white 600x800 canvas with a page border, a head circle and a body
//! ellipse, all in 3px black strokes.

use crate::types::SynthesizedImage;
use crate::{Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use vello_cpu::kurbo::{Affine, BezPath, Ellipse, Rect, Shape, Stroke};
use vello_cpu::peniko::Color;

const WIDTH: u16 = 600;
const HEIGHT: u16 = 800;
const STROKE_WIDTH: f64 = 3.0;
const TOLERANCE: f64 = 0.1;

fn outline_path(shape: &impl Shape) -> BezPath {
    let mut path = BezPath::new();
    for el in shape.path_elements(TOLERANCE) {
        path.push(el);
    }
    path
}

/// Draw the placeholder page.
pub fn placeholder_page() -> Result<RgbImage> {
    let mut ctx = vello_cpu::RenderContext::new(WIDTH, HEIGHT);
    ctx.set_transform(Affine::IDENTITY);

    ctx.set_paint(Color::from_rgba8(255, 255, 255, 255));
    ctx.fill_rect(&Rect::new(0.0, 0.0, f64::from(WIDTH), f64::from(HEIGHT)));

    ctx.set_paint(Color::from_rgba8(0, 0, 0, 255));
    ctx.set_stroke(Stroke::new(STROKE_WIDTH));
    ctx.stroke_path(&outline_path(&Rect::new(50.0, 50.0, 550.0, 750.0)));
    // head
    ctx.stroke_path(&outline_path(&Ellipse::new((300.0, 200.0), (80.0, 80.0), 0.0)));
    // body
    ctx.stroke_path(&outline_path(&Ellipse::new((300.0, 400.0), (100.0, 150.0), 0.0)));

    let mut pixmap = vello_cpu::Pixmap::new(WIDTH, HEIGHT);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);

    // Everything drawn is opaque, so the premultiplied bytes are plain RGBA.
    let rgba = RgbaImage::from_raw(
        u32::from(WIDTH),
        u32::from(HEIGHT),
        pixmap.data_as_u8_slice().to_vec(),
    )
    .ok_or_else(|| Error::Other("rendered pixmap does not match the page size".to_string()))?;
    Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
}

/// The placeholder page as a base64 PNG.
pub fn placeholder_png() -> Result<SynthesizedImage> {
    let mut bytes = Vec::new();
    placeholder_page()?.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(SynthesizedImage {
        mime_type: "image/png".to_string(),
        data_base64: STANDARD.encode(bytes),
    })
}
