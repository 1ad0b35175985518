//! Output encoders: one strategy per [`OutputFormat`].
//!
//! Raster formats draw into an RGB buffer through the bitmap backend. SVG
//! draws through the SVG backend. PDF places the raster on a printpdf page;
//! PostScript wraps a JPEG of it in a single-page level 2 document.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::prelude::*;
use printpdf::{ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject, Mm, PdfDocument, Px};
use std::fmt::Write as _;
use std::io::Write as _;

use crate::graph::draw_chart;
use crate::ir::{ChartSpec, Figure};
use crate::{OutputFormat, RenderOptions};

const JPEG_QUALITY: u8 = 90;
const POINTS_PER_INCH: f64 = 72.0;
const MM_PER_INCH: f64 = 25.4;
const HEX_LINE: usize = 78;

/// Encoded chart bytes with their media type
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

type Encoder = fn(&ChartSpec, &RenderOptions) -> Result<Vec<u8>>;

fn encoder(format: OutputFormat) -> Encoder {
    match format {
        OutputFormat::Png => encode_png,
        OutputFormat::Jpg => encode_jpeg,
        OutputFormat::Pdf => encode_pdf,
        OutputFormat::Ps => encode_ps,
        OutputFormat::Svg => encode_svg,
    }
}

/// Draw `spec` on a fresh backend and encode it as `format`
pub fn render(spec: &ChartSpec, format: OutputFormat, opts: &RenderOptions) -> Result<Rendered> {
    let bytes = encoder(format)(spec, opts)
        .with_context(|| format!("Failed to render {} chart as {}", spec.kind(), format))?;
    tracing::debug!(kind = spec.kind(), %format, bytes = bytes.len(), "Rendered chart");
    Ok(Rendered {
        bytes,
        mime_type: format.mime_type(),
    })
}

/// RGB pixel buffer of the drawn chart
struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

fn rasterize(spec: &ChartSpec, opts: &RenderOptions) -> Result<Raster> {
    let (width, height) = spec.figure().pixels(opts.dpi);
    let mut pixels = vec![0u8; (width as usize) * (height as usize) * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        draw_chart(&root, spec, opts)?;
    }
    Ok(Raster { width, height, pixels })
}

fn jpeg_bytes(raster: &Raster) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(&raster.pixels, raster.width, raster.height, ColorType::Rgb8)
        .context("Failed to encode JPEG")?;
    Ok(out)
}

fn encode_png(spec: &ChartSpec, opts: &RenderOptions) -> Result<Vec<u8>> {
    let raster = rasterize(spec, opts)?;
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&raster.pixels, raster.width, raster.height, ColorType::Rgb8)
        .context("Failed to encode PNG")?;
    Ok(out)
}

fn encode_jpeg(spec: &ChartSpec, opts: &RenderOptions) -> Result<Vec<u8>> {
    jpeg_bytes(&rasterize(spec, opts)?)
}

fn encode_svg(spec: &ChartSpec, opts: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = spec.figure().pixels(opts.dpi);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw_chart(&root, spec, opts)?;
    }
    Ok(svg.into_bytes())
}

fn page_size(figure: Figure) -> (f64, f64) {
    (figure.width * POINTS_PER_INCH, figure.height * POINTS_PER_INCH)
}

// =============================================================================
// PDF
// =============================================================================

fn encode_pdf(spec: &ChartSpec, opts: &RenderOptions) -> Result<Vec<u8>> {
    let raster = rasterize(spec, opts)?;
    let figure = spec.figure();

    let (doc, page, layer) = PdfDocument::new(
        "plotdash",
        Mm(figure.width * MM_PER_INCH),
        Mm(figure.height * MM_PER_INCH),
        "chart",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let xobject = ImageXObject {
        width: Px(raster.width as usize),
        height: Px(raster.height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg_bytes(&raster)?,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
    };
    // At the render DPI the image fills the page exactly
    Image::from(xobject).add_to_layer(
        layer,
        ImageTransform {
            dpi: Some(opts.dpi),
            ..Default::default()
        },
    );

    doc.save_to_bytes()
        .map_err(|err| anyhow!("{:?}", err))
        .context("Failed to write PDF")
}

// =============================================================================
// PostScript
// =============================================================================

fn encode_ps(spec: &ChartSpec, opts: &RenderOptions) -> Result<Vec<u8>> {
    let raster = rasterize(spec, opts)?;
    let jpeg = jpeg_bytes(&raster)?;
    let (pw, ph) = page_size(spec.figure());
    let (w, h) = (raster.width, raster.height);

    let mut out = Vec::with_capacity(jpeg.len() * 2 + 1024);
    write!(
        out,
        "%!PS-Adobe-3.0\n\
         %%Creator: plotdash\n\
         %%BoundingBox: 0 0 {bw} {bh}\n\
         %%LanguageLevel: 2\n\
         %%Pages: 1\n\
         %%EndComments\n\
         %%Page: 1 1\n\
         gsave\n\
         {pw:.2} {ph:.2} scale\n\
         /DeviceRGB setcolorspace\n\
         << /ImageType 1 /Width {w} /Height {h} /BitsPerComponent 8\n   \
         /Decode [0 1 0 1 0 1] /ImageMatrix [{w} 0 0 -{h} 0 {h}]\n   \
         /DataSource currentfile /ASCIIHexDecode filter /DCTDecode filter >> image\n",
        bw = pw.ceil() as u32,
        bh = ph.ceil() as u32,
    )
    .context("Failed to write PostScript header")?;

    out.extend_from_slice(hex_lines(&jpeg).as_bytes());
    out.extend_from_slice(b">\ngrestore\nshowpage\n%%Trailer\n%%EOF\n");
    Ok(out)
}

/// Upper-case hex, wrapped so no line exceeds [`HEX_LINE`] characters
fn hex_lines(data: &[u8]) -> String {
    let per_line = HEX_LINE / 2;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / per_line + 1);
    for chunk in data.chunks(per_line) {
        for byte in chunk {
            let _ = write!(out, "{:02X}", byte);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BarChart, TickLabel, ValueAxis};

    fn sample() -> ChartSpec {
        ChartSpec::Bar(BarChart {
            title: "Sample".into(),
            categories: vec![
                TickLabel { text: "No".into(), font_size: 12 },
                TickLabel { text: "Yes".into(), font_size: 12 },
            ],
            values: vec![0.4, 0.6],
            axis: ValueAxis::Percent,
            figure: Figure::for_categories(2),
        })
    }

    fn opts() -> RenderOptions {
        RenderOptions { dpi: 50.0 }
    }

    #[test]
    fn test_png_magic() {
        let out = render(&sample(), OutputFormat::Png, &opts()).unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(&out.bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[test]
    fn test_jpeg_magic() {
        let out = render(&sample(), OutputFormat::Jpg, &opts()).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(&out.bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_svg_document() {
        let out = render(&sample(), OutputFormat::Svg, &opts()).unwrap();
        let text = String::from_utf8(out.bytes).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("Sample"));
    }

    #[test]
    fn test_pdf_document() {
        let out = render(&sample(), OutputFormat::Pdf, &opts()).unwrap();
        assert_eq!(out.mime_type, "application/pdf");
        let bytes = out.bytes;
        assert!(bytes.starts_with(b"%PDF-"));
        let tail = String::from_utf8_lossy(&bytes[bytes.len().saturating_sub(32)..]).to_string();
        assert!(tail.contains("%%EOF"));

        let text: String = String::from_utf8_lossy(&bytes).split_whitespace().collect();
        assert!(text.contains("/Type/Catalog"));
        assert!(text.contains("/Subtype/Image"));
        assert!(text.contains("/Width300"));
        assert!(text.contains("/DCTDecode"));
        assert!(text.contains("startxref"));
    }

    #[test]
    fn test_postscript_document() {
        let out = render(&sample(), OutputFormat::Ps, &opts()).unwrap();
        assert_eq!(out.mime_type, "application/postscript");
        let text = String::from_utf8(out.bytes).unwrap();
        assert!(text.starts_with("%!PS-Adobe-3.0"));
        assert!(text.contains("%%BoundingBox: 0 0 432 432"));
        assert!(text.contains("/DCTDecode filter"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.lines().all(|l| l.len() <= 80));
    }

    #[test]
    fn test_hex_lines_wrap() {
        let data = vec![0xABu8; 100];
        let hex = hex_lines(&data);
        let lines: Vec<&str> = hex.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 78);
        assert!(lines[0].starts_with("ABAB"));
        assert_eq!(lines[2].len(), 200 - 2 * 78);
    }
}
