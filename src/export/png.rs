use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{Rgb, RgbImage};

use super::ExportCurve;
use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Plot image export
// ---------------------------------------------------------------------------

/// Canvas size and x range of a rendered plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    /// Upper end of the logarithmic frequency axis.
    pub x_max: f64,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            width: 1200,
            height: 700,
            x_max: 10_000.0,
        }
    }
}

const MARGIN_LEFT: u32 = 60;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 20;
const MARGIN_BOTTOM: u32 = 40;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

/// Pixel mapping of the plot area.
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    log_lo: f64,
    log_hi: f64,
    y_lo: f64,
    y_hi: f64,
}

impl Frame {
    fn px(&self, x: f64) -> f64 {
        self.left + (x.log10() - self.log_lo) / (self.log_hi - self.log_lo) * self.width
    }

    fn py(&self, y: f64) -> f64 {
        self.top + (self.y_hi - y) / (self.y_hi - self.y_lo) * self.height
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, silently clipped to the canvas.
fn draw_line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Lower x bound: smallest positive `x_min` (or first positive x) of any curve.
fn x_lower_bound(curves: &[ExportCurve]) -> Option<f64> {
    curves
        .iter()
        .filter_map(|c| {
            if c.x_min > 0.0 {
                Some(c.x_min)
            } else {
                c.x.iter().copied().find(|&x| x > 0.0)
            }
        })
        .min_by(|a, b| a.total_cmp(b))
}

/// Render curves on a log-frequency axis.
///
/// Non-finite samples break the line instead of failing the plot.
pub fn render(curves: &[ExportCurve], options: &PlotOptions) -> Result<RgbImage> {
    if options.width <= MARGIN_LEFT + MARGIN_RIGHT || options.height <= MARGIN_TOP + MARGIN_BOTTOM {
        bail!("canvas {}x{} is too small", options.width, options.height);
    }
    let Some(x_lo) = x_lower_bound(curves) else {
        bail!("no positive frequencies to plot");
    };
    let x_hi = if options.x_max > x_lo { options.x_max } else { x_lo * 10.0 };

    let visible = |x: f64, y: f64| x >= x_lo && x <= x_hi && y.is_finite();
    let ys: Vec<f64> = curves
        .iter()
        .flat_map(|c| c.x.iter().zip(&c.y))
        .filter(|&(&x, &y)| visible(x, y))
        .map(|(_, &y)| y)
        .collect();
    if ys.is_empty() {
        bail!("no finite samples between {x_lo} and {x_hi} Hz");
    }
    let (mut y_lo, mut y_hi) = ys
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| (lo.min(y), hi.max(y)));
    if y_hi - y_lo < f64::EPSILON {
        y_lo -= 1.0;
        y_hi += 1.0;
    }
    let pad = (y_hi - y_lo) * 0.05;

    let frame = Frame {
        left: MARGIN_LEFT as f64,
        top: MARGIN_TOP as f64,
        width: (options.width - MARGIN_LEFT - MARGIN_RIGHT) as f64,
        height: (options.height - MARGIN_TOP - MARGIN_BOTTOM) as f64,
        log_lo: x_lo.log10(),
        log_hi: x_hi.log10(),
        y_lo: y_lo - pad,
        y_hi: y_hi + pad,
    };

    let mut img = RgbImage::from_pixel(options.width, options.height, WHITE);
    let (left, top) = (frame.left, frame.top);
    let (right, bottom) = (left + frame.width, top + frame.height);

    // decade grid
    let mut decade = 10f64.powf(frame.log_lo.ceil());
    while decade <= x_hi {
        let px = frame.px(decade);
        draw_line(&mut img, (px, top), (px, bottom), GRID);
        decade *= 10.0;
    }

    let colors = ColorMap::new(&curves.iter().map(|c| c.plot_title.as_str()).collect::<Vec<_>>());
    for curve in curves {
        let color = Rgb(colors.color_for(&curve.plot_title));
        let mut previous: Option<(f64, f64)> = None;
        for (&x, &y) in curve.x.iter().zip(&curve.y) {
            if !visible(x, y) {
                previous = None;
                continue;
            }
            let point = (frame.px(x), frame.py(y));
            if let Some(prev) = previous {
                draw_line(&mut img, prev, point, color);
            } else {
                put(&mut img, point.0.round() as i64, point.1.round() as i64, color);
            }
            previous = Some(point);
        }
    }

    draw_line(&mut img, (left, top), (right, top), BLACK);
    draw_line(&mut img, (right, top), (right, bottom), BLACK);
    draw_line(&mut img, (right, bottom), (left, bottom), BLACK);
    draw_line(&mut img, (left, bottom), (left, top), BLACK);
    Ok(img)
}

/// Render and save as PNG.
pub fn write_png(path: &Path, curves: &[ExportCurve], options: &PlotOptions) -> Result<()> {
    let img = render(curves, options)?;
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing PNG {}", path.display()))?;
    log::info!("wrote plot of {} curve(s) to {}", curves.len(), path.display());
    Ok(())
}
