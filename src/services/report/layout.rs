//! Page layout of the service report.
//!
//! Positions every element in millimetres on A4 with the origin at the top-left
//! corner. Nothing here touches PDF objects or image data, so the layout can be
//! inspected directly in tests.

use super::ReportContent;
use super::fonts::{Font, text_width_mm};

pub const MM_PER_PT: f32 = 25.4 / 72.0;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 10.0;
/// Text reaching this line continues on a new page.
pub const PAGE_BREAK_Y: f32 = PAGE_HEIGHT - 20.0;
/// Where body content starts below the page header.
pub const BODY_TOP: f32 = 25.0;
/// Horizontal padding inside a text cell.
pub const CELL_MARGIN: f32 = 1.0;

pub const BRAND_RED: Rgb = Rgb(235, 10, 30);
pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const FOOTER_GREY: Rgb = Rgb(128, 128, 128);
pub const BAND_FILL: Rgb = Rgb(240, 240, 240);

pub const REPORT_TITLE: &str = "REPORTE TÉCNICO DE SERVICIO";
pub const DIAGNOSIS_HEADING: &str = "DIAGNÓSTICO Y REFACCIONES";
pub const COMMENTS_HEADING: &str = "Observaciones Adicionales:";
pub const EVIDENCE_HEADING: &str = "EVIDENCIA FOTOGRÁFICA";

const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const COLUMN_WIDTH: f32 = 95.0;
const TEXT_LINE_HEIGHT: f32 = 6.0;

// Evidence grid
pub const GRID_TOP: f32 = 30.0;
pub const GRID_ROW_STEP: f32 = 90.0;
pub const GRID_LAST_ROW_Y: f32 = 220.0;
pub const IMAGE_WIDTH: f32 = 90.0;
pub const IMAGE_HEIGHT: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// One line of text inside a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub cell: Rect,
    pub text: String,
    pub font: Font,
    pub size: f32,
    pub color: Rgb,
    pub align: Align,
}

impl TextCell {
    /// Left edge of the rendered text.
    pub fn text_x(&self) -> f32 {
        match self.align {
            Align::Left => self.cell.x + CELL_MARGIN,
            Align::Center => {
                self.cell.x + (self.cell.width - text_width_mm(self.font, self.size, &self.text)) / 2.0
            }
        }
    }

    /// Baseline of the rendered text, vertically centred in the cell.
    pub fn baseline_y(&self) -> f32 {
        self.cell.y + 0.5 * self.cell.height + 0.3 * self.size * MM_PER_PT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextCell),
    /// Filled rectangle with a black frame.
    Band { rect: Rect, fill: Rgb },
    /// Horizontal rule.
    Rule { x1: f32, x2: f32, y: f32 },
    /// Evidence photo `index`, stretched to `rect` and framed.
    Image { index: usize, rect: Rect },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 1-based page number.
    pub number: usize,
    pub elements: Vec<Element>,
}

impl PageLayout {
    pub fn texts(&self) -> impl Iterator<Item = &TextCell> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text(t) => Some(t),
            _ => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = (usize, &Rect)> {
        self.elements.iter().filter_map(|e| match e {
            Element::Image { index, rect } => Some((*index, rect)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportLayout {
    pub pages: Vec<PageLayout>,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every text line in page order.
    pub fn text_lines(&self) -> Vec<&str> {
        self.pages
            .iter()
            .flat_map(|p| p.texts().map(|t| t.text.as_str()))
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images().count()).sum()
    }
}

/// Lay out the report for `content` with `image_count` evidence photos.
pub fn layout_report(content: &ReportContent, image_count: usize) -> ReportLayout {
    let mut writer = PageWriter::default();
    writer.add_page();

    // Metadata band
    let stamp = content.issued_at.format("%d/%m/%Y %H:%M");
    writer.filled_cell(
        8.0,
        format!(" ORDEN: {}  |  FECHA: {}", content.order_id, stamp),
        Font::HelveticaBold,
        10.0,
    );
    writer.ln(5.0);

    // Identification
    writer.cell_at(
        MARGIN,
        COLUMN_WIDTH,
        7.0,
        format!("Técnico: {}", content.technician),
        Font::Helvetica,
        11.0,
        BLACK,
    );
    writer.cell_at(
        MARGIN + COLUMN_WIDTH,
        COLUMN_WIDTH,
        7.0,
        format!("Vehículo: {} ({})", content.vehicle_model, content.vehicle_year),
        Font::Helvetica,
        11.0,
        BLACK,
    );
    writer.ln(7.0);
    if let Some(advisor) = &content.advisor {
        writer.cell_at(
            MARGIN,
            COLUMN_WIDTH,
            7.0,
            format!("Asesor: {}", advisor),
            Font::Helvetica,
            11.0,
            BLACK,
        );
        writer.ln(7.0);
    }
    writer.rule();

    // Diagnosis
    writer.ln(8.0);
    writer.line(8.0, DIAGNOSIS_HEADING, Font::HelveticaBold, 12.0, BRAND_RED);
    writer.paragraph(&content.failures, Font::Helvetica, 11.0);

    if let Some(comments) = &content.comments {
        writer.ln(5.0);
        writer.line(8.0, COMMENTS_HEADING, Font::HelveticaBold, 11.0, BLACK);
        writer.paragraph(comments, Font::Helvetica, 10.0);
    }

    if image_count > 0 {
        writer.add_page();
        writer.line(10.0, EVIDENCE_HEADING, Font::HelveticaBold, 12.0, BRAND_RED);

        let mut y = GRID_TOP;
        for index in 0..image_count {
            if index > 0 && index % 2 == 0 {
                y += GRID_ROW_STEP;
                if y > GRID_LAST_ROW_Y {
                    writer.add_page();
                    y = GRID_TOP;
                }
            }
            let column = (index % 2) as f32;
            writer.push(Element::Image {
                index,
                rect: Rect {
                    x: MARGIN + COLUMN_WIDTH * column,
                    y,
                    width: IMAGE_WIDTH,
                    height: IMAGE_HEIGHT,
                },
            });
        }
    }

    writer.finish()
}

/// Greedy word wrap to `max_width` millimetres.
///
/// Breaks at the last space that fits, hard-breaks words longer than a line
/// and starts a new line at every `\n`. Spaces consumed by a break are the only
/// characters dropped.
pub fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let normalized = text.replace('\r', "");
    let normalized = normalized.strip_suffix('\n').unwrap_or(&normalized);
    let mut lines = Vec::new();

    for paragraph in normalized.split('\n') {
        let chars: Vec<char> = paragraph.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut start = 0;
        let mut last_space: Option<usize> = None;
        let mut width = 0.0;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == ' ' {
                last_space = Some(i);
            }
            width += text_width_mm(font, size, c.encode_utf8(&mut [0; 4]));

            if width > max_width {
                match last_space {
                    Some(space) if space > start => {
                        lines.push(chars[start..space].iter().collect());
                        start = space + 1;
                    }
                    _ => {
                        // Word longer than a line: break before this character
                        let end = if i == start { i + 1 } else { i };
                        lines.push(chars[start..end].iter().collect());
                        start = end;
                    }
                }
                last_space = None;
                width = 0.0;
                i = start;
                continue;
            }
            i += 1;
        }
        if start < chars.len() {
            lines.push(chars[start..].iter().collect());
        }
    }

    lines
}

#[derive(Default)]
struct PageWriter {
    pages: Vec<PageLayout>,
    y: f32,
}

impl PageWriter {
    fn add_page(&mut self) {
        let number = self.pages.len() + 1;
        let mut page = PageLayout {
            number,
            elements: Vec::new(),
        };
        page.elements.push(Element::Text(TextCell {
            cell: Rect {
                x: MARGIN,
                y: MARGIN,
                width: CONTENT_WIDTH,
                height: 10.0,
            },
            text: REPORT_TITLE.to_string(),
            font: Font::HelveticaBold,
            size: 15.0,
            color: BRAND_RED,
            align: Align::Center,
        }));
        page.elements.push(Element::Text(TextCell {
            cell: Rect {
                x: MARGIN,
                y: PAGE_HEIGHT - 15.0,
                width: CONTENT_WIDTH,
                height: 10.0,
            },
            text: format!("Página {}", number),
            font: Font::HelveticaOblique,
            size: 8.0,
            color: FOOTER_GREY,
            align: Align::Center,
        }));
        self.pages.push(page);
        self.y = BODY_TOP;
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn ln(&mut self, height: f32) {
        self.y += height;
    }

    fn break_if_needed(&mut self, height: f32) {
        if self.y + height > PAGE_BREAK_Y {
            self.add_page();
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn cell_at(
        &mut self,
        x: f32,
        width: f32,
        height: f32,
        text: String,
        font: Font,
        size: f32,
        color: Rgb,
    ) {
        let y = self.y;
        self.push(Element::Text(TextCell {
            cell: Rect {
                x,
                y,
                width,
                height,
            },
            text,
            font,
            size,
            color,
            align: Align::Left,
        }));
    }

    /// Full-width single line, then move down.
    fn line(&mut self, height: f32, text: &str, font: Font, size: f32, color: Rgb) {
        self.break_if_needed(height);
        self.cell_at(MARGIN, CONTENT_WIDTH, height, text.to_string(), font, size, color);
        self.ln(height);
    }

    fn filled_cell(&mut self, height: f32, text: String, font: Font, size: f32) {
        self.break_if_needed(height);
        self.push(Element::Band {
            rect: Rect {
                x: MARGIN,
                y: self.y,
                width: CONTENT_WIDTH,
                height,
            },
            fill: BAND_FILL,
        });
        self.cell_at(MARGIN, CONTENT_WIDTH, height, text, font, size, BLACK);
        self.ln(height);
    }

    fn rule(&mut self) {
        let y = self.y;
        self.push(Element::Rule {
            x1: MARGIN,
            x2: PAGE_WIDTH - MARGIN,
            y,
        });
    }

    /// Wrapped text, continuing on new pages as needed.
    fn paragraph(&mut self, text: &str, font: Font, size: f32) {
        let max_width = CONTENT_WIDTH - 2.0 * CELL_MARGIN;
        for line in wrap_text(text, font, size, max_width) {
            self.line(TEXT_LINE_HEIGHT, &line, font, size, BLACK);
        }
    }

    fn finish(self) -> ReportLayout {
        ReportLayout { pages: self.pages }
    }
}
