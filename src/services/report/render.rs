//! PDF rendering of a [`ReportLayout`] with lopdf.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use image::ImageReader;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::fonts::{Font, encode_win_ansi};
use super::layout::{
    Element, MM_PER_PT, PAGE_HEIGHT, PAGE_WIDTH, Rect, ReportLayout, Rgb, TextCell,
};
use crate::error::{AppError, AppResult};

/// Largest pixel size embedded for a photo (90x60 mm at 300 dpi).
pub const MAX_IMAGE_PIXELS: (u32, u32) = (1063, 709);

/// Line width in millimetres for frames and rules.
const LINE_WIDTH_MM: f32 = 0.2;

/// Output of a render pass.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub embedded_images: usize,
    pub skipped_images: usize,
}

/// Decoded photo ready to embed as an RGB XObject.
struct DecodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

/// Render the layout to PDF bytes.
///
/// Photos that cannot be decoded leave their cell empty.
pub fn render(
    layout: &ReportLayout,
    images: &[Bytes],
    staging_dir: Option<&Path>,
) -> AppResult<RenderedReport> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font_resources = Dictionary::new();
    for font in Font::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        font_resources.set(font.resource_name(), font_id);
    }
    let font_resources_id = doc.add_object(font_resources);

    // Decode every referenced photo once, in index order
    let mut xobjects: BTreeMap<usize, ObjectId> = BTreeMap::new();
    let mut skipped = 0;
    for index in referenced_images(layout) {
        let Some(data) = images.get(index) else {
            warn!("Layout references missing evidence image: index={}", index);
            skipped += 1;
            continue;
        };
        match stage_and_decode(data, staging_dir) {
            Ok(decoded) => {
                let id = doc.add_object(image_stream(decoded));
                xobjects.insert(index, id);
            }
            Err(e) => {
                warn!(
                    "Evidence image could not be embedded, leaving cell empty: index={}, error={}",
                    index, e
                );
                skipped += 1;
            }
        }
    }

    let mut page_ids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let mut ops = Vec::new();
        let mut page_xobjects = Dictionary::new();

        ops.push(Operation::new("w", vec![pt(LINE_WIDTH_MM).into()]));
        for element in &page.elements {
            match element {
                Element::Text(cell) => text_ops(cell, &mut ops),
                Element::Band { rect, fill } => {
                    ops.push(Operation::new("q", vec![]));
                    ops.extend(fill_color(*fill));
                    ops.push(rect_op(rect));
                    ops.push(Operation::new("B", vec![]));
                    ops.push(Operation::new("Q", vec![]));
                }
                Element::Rule { x1, x2, y } => {
                    ops.push(Operation::new("m", vec![pt(*x1).into(), pt_y(*y).into()]));
                    ops.push(Operation::new("l", vec![pt(*x2).into(), pt_y(*y).into()]));
                    ops.push(Operation::new("S", vec![]));
                }
                Element::Image { index, rect } => {
                    let Some(&xobject_id) = xobjects.get(index) else {
                        continue;
                    };
                    let name = format!("Im{}", index);
                    page_xobjects.set(name.as_bytes().to_vec(), xobject_id);

                    ops.push(Operation::new("q", vec![]));
                    ops.push(Operation::new(
                        "cm",
                        vec![
                            pt(rect.width).into(),
                            Object::Integer(0),
                            Object::Integer(0),
                            pt(rect.height).into(),
                            pt(rect.x).into(),
                            pt_y(rect.y + rect.height).into(),
                        ],
                    ));
                    ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                    ops.push(Operation::new("Q", vec![]));
                    ops.push(rect_op(rect));
                    ops.push(Operation::new("S", vec![]));
                }
            }
        }

        let content = Content { operations: ops }
            .encode()
            .map_err(|e| AppError::Document(format!("Failed to encode page content: {}", e)))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut resources = dictionary! {
            "Font" => font_resources_id,
        };
        if !page_xobjects.is_empty() {
            resources.set("XObject", page_xobjects);
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        page_ids.push(page_id.into());
    }

    let page_count = page_ids.len();
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids,
        "Count" => page_count as i64,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(pt(PAGE_WIDTH)),
            Object::Real(pt(PAGE_HEIGHT)),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::Document(format!("Failed to write PDF: {}", e)))?;

    debug!(
        "Report rendered: pages={}, images={}, skipped={}, bytes={}",
        page_count,
        xobjects.len(),
        skipped,
        bytes.len()
    );

    Ok(RenderedReport {
        bytes,
        page_count,
        embedded_images: xobjects.len(),
        skipped_images: skipped,
    })
}

/// Stage raw bytes to a temporary file and decode from its path.
///
/// The file is removed when the guard drops, on success and on failure.
fn stage_and_decode(data: &[u8], staging_dir: Option<&Path>) -> AppResult<DecodedImage> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("evidence_").suffix(".img");
    let mut staged: NamedTempFile = match staging_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| AppError::Document(format!("Failed to create staging file: {}", e)))?;

    staged
        .write_all(data)
        .and_then(|_| staged.flush())
        .map_err(|e| AppError::Document(format!("Failed to write staging file: {}", e)))?;

    let decoded = ImageReader::open(staged.path())
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| AppError::Document(format!("Failed to open staged image: {}", e)))?
        .decode()
        .map_err(|e| AppError::Document(format!("Failed to decode image: {}", e)))?;

    let (max_w, max_h) = MAX_IMAGE_PIXELS;
    let decoded = if decoded.width() > max_w || decoded.height() > max_h {
        decoded.thumbnail(max_w, max_h)
    } else {
        decoded
    };

    let rgb = decoded.to_rgb8();
    Ok(DecodedImage {
        width: rgb.width(),
        height: rgb.height(),
        rgb: rgb.into_raw(),
    })
}

fn image_stream(image: DecodedImage) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        },
        image.rgb,
    )
}

fn referenced_images(layout: &ReportLayout) -> Vec<usize> {
    let mut indices: Vec<usize> = layout
        .pages
        .iter()
        .flat_map(|p| p.images().map(|(i, _)| i))
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

fn text_ops(cell: &TextCell, ops: &mut Vec<Operation>) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![
            Object::Name(cell.font.resource_name().as_bytes().to_vec()),
            cell.size.into(),
        ],
    ));
    ops.extend(fill_color(cell.color));
    ops.push(Operation::new(
        "Td",
        vec![pt(cell.text_x()).into(), pt_y(cell.baseline_y()).into()],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::string_literal(encode_win_ansi(&cell.text))],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn fill_color(color: Rgb) -> Vec<Operation> {
    let Rgb(r, g, b) = color;
    vec![Operation::new(
        "rg",
        vec![
            (r as f32 / 255.0).into(),
            (g as f32 / 255.0).into(),
            (b as f32 / 255.0).into(),
        ],
    )]
}

fn rect_op(rect: &Rect) -> Operation {
    Operation::new(
        "re",
        vec![
            pt(rect.x).into(),
            pt_y(rect.y + rect.height).into(),
            pt(rect.width).into(),
            pt(rect.height).into(),
        ],
    )
}

/// Millimetres to points.
fn pt(mm: f32) -> f32 {
    mm / MM_PER_PT
}

/// Top-left millimetre ordinate to PDF user space.
fn pt_y(mm: f32) -> f32 {
    pt(PAGE_HEIGHT - mm)
}
