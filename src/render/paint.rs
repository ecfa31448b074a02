use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{Rgba, RgbaImage};
use resvg::render;
use std::io::Cursor;
use tiny_skia::Pixmap;
use usvg::{Options, Tree};

use super::font::FontBook;

const TEXT_COLOR: &str = "#000000";
const ASCENT_RATIO: f32 = 0.8;

/// One line of text at its final position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Top of the line box; the baseline sits below it.
    pub top: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBlock {
    pub font_size: u32,
    pub lines: Vec<PlacedLine>,
}

/// Draws every block on top of `page` in one rasterization pass.
pub fn paint_blocks(
    page: &RgbaImage,
    blocks: &[PlacedBlock],
    fonts: &FontBook,
) -> Result<RgbaImage> {
    if blocks.iter().all(|block| block.lines.is_empty()) {
        return Ok(page.clone());
    }
    let svg = build_svg(page, blocks, fonts.family())?;
    rasterize(&svg, fonts)
}

fn build_svg(page: &RgbaImage, blocks: &[PlacedBlock], family: &str) -> Result<String> {
    let mut png = Vec::new();
    page.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| "failed to encode page for text overlay")?;
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&png));
    let (width, height) = page.dimensions();

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none" image-rendering="optimizeSpeed"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    let family = escape_xml(family);
    for block in blocks {
        let size = block.font_size as f32;
        for line in &block.lines {
            if line.text.trim().is_empty() {
                continue;
            }
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" xml:space="preserve">{text}</text>"#,
                x = line.x,
                y = line.top + size * ASCENT_RATIO,
                size = block.font_size,
                color = TEXT_COLOR,
                family = family,
                text = escape_xml(&line.text)
            ));
        }
    }

    svg.push_str("</svg>");
    Ok(svg)
}

fn rasterize(svg: &str, fonts: &FontBook) -> Result<RgbaImage> {
    let options = Options {
        fontdb: fonts.database(),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let mut image = RgbaImage::new(size.width(), size.height());
    for (out, pixel) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = pixel.demultiply();
        *out = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(image)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
