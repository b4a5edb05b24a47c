use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use wallpaperd_common::{WallpaperKind, WallpaperMode, WallpaperSpec};

use crate::backend::{Geometry, RenderError};

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Where a source image lands inside an output, after scaling. Offsets can
/// be negative when the scaled image overflows the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Compute the scaled size and offset of a `src`-sized image displayed on
/// a `dst`-sized output. Tiling has no single placement and is handled by
/// the caller.
pub fn layout(mode: WallpaperMode, src: (u32, u32), dst: (u32, u32)) -> Placement {
    let (src_w, src_h) = src;
    let (dst_w, dst_h) = dst;

    let (width, height) = match mode {
        WallpaperMode::Centered | WallpaperMode::Tiled => (src_w, src_h),
        WallpaperMode::Filled => (dst_w, dst_h),
        WallpaperMode::Zoomed => {
            // Cover the output, cropping whichever axis overflows.
            let aspect = f64::from(src_w) / f64::from(src_h);
            if aspect > f64::from(dst_w) / f64::from(dst_h) {
                (scaled(f64::from(dst_h) * aspect), dst_h)
            } else {
                (dst_w, scaled(f64::from(dst_w) / aspect))
            }
        }
        WallpaperMode::Scaled => {
            // Fit inside the output, leaving bars on whichever axis is short.
            let aspect = f64::from(src_w) / f64::from(src_h);
            if aspect > f64::from(dst_w) / f64::from(dst_h) {
                (dst_w, scaled(f64::from(dst_w) / aspect))
            } else {
                (scaled(f64::from(dst_h) * aspect), dst_h)
            }
        }
    };

    Placement {
        x: (i64::from(dst_w) - i64::from(width)) / 2,
        y: (i64::from(dst_h) - i64::from(height)) / 2,
        width,
        height,
    }
}

fn scaled(value: f64) -> u32 {
    let rounded = value.round();
    if rounded < 1.0 {
        1
    } else {
        rounded as u32
    }
}

/// Parse a `#rrggbb` or `rrggbb` color specification.
pub fn parse_color(spec: &str) -> Result<Rgb<u8>, RenderError> {
    let hex = spec.strip_prefix('#').unwrap_or(spec);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RenderError::InvalidColor {
            spec: spec.to_string(),
        });
    }

    let channel = |range| u8::from_str_radix(&hex[range], 16);
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => Ok(Rgb([r, g, b])),
        _ => Err(RenderError::InvalidColor {
            spec: spec.to_string(),
        }),
    }
}

/// Draw `src` onto `out` according to the display mode. `out` keeps its
/// background wherever the placed image does not reach.
pub fn place_image(out: &mut RgbImage, src: &RgbImage, mode: WallpaperMode) {
    let (out_w, out_h) = out.dimensions();
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 {
        return;
    }

    if mode == WallpaperMode::Tiled {
        let mut y = 0u32;
        while y < out_h {
            let mut x = 0u32;
            while x < out_w {
                imageops::overlay(out, src, i64::from(x), i64::from(y));
                x += src_w;
            }
            y += src_h;
        }
        return;
    }

    let placement = layout(mode, (src_w, src_h), (out_w, out_h));
    if (placement.width, placement.height) == (src_w, src_h) {
        imageops::overlay(out, src, placement.x, placement.y);
    } else {
        let resized = imageops::resize(src, placement.width, placement.height, FilterType::Lanczos3);
        imageops::overlay(out, &resized, placement.x, placement.y);
    }
}

fn render_output(size: (u32, u32), spec: &WallpaperSpec) -> Result<RgbImage, RenderError> {
    let (width, height) = size;
    match spec.kind {
        WallpaperKind::Color => {
            let color = parse_color(&spec.spec)?;
            Ok(RgbImage::from_pixel(width, height, color))
        }
        WallpaperKind::Image => {
            let src = image::open(&spec.spec)
                .map_err(|e| RenderError::ImageLoad {
                    path: spec.spec.clone().into(),
                    source: e,
                })?
                .into_rgb8();

            let mut out = RgbImage::from_pixel(width, height, BLACK);
            place_image(&mut out, &src, spec.mode);
            Ok(out)
        }
    }
}

/// Compose the full root image: a black canvas spanning all outputs, with
/// each resolved output rendered into its own rectangle. Outputs without a
/// spec stay black.
pub fn compose_outputs(
    outputs: &[(Geometry, Option<WallpaperSpec>)],
) -> Result<RgbImage, RenderError> {
    let width = outputs
        .iter()
        .map(|(g, _)| g.x.max(0) as u32 + g.width)
        .max()
        .unwrap_or(0);
    let height = outputs
        .iter()
        .map(|(g, _)| g.y.max(0) as u32 + g.height)
        .max()
        .unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(RenderError::NoOutputs);
    }

    let mut root = RgbImage::from_pixel(width, height, BLACK);
    for (geometry, spec) in outputs {
        let Some(spec) = spec else { continue };
        let rendered = render_output((geometry.width, geometry.height), spec)?;
        imageops::overlay(
            &mut root,
            &rendered,
            i64::from(geometry.x),
            i64::from(geometry.y),
        );
    }

    Ok(root)
}
