//! Standard Type 1 font metrics used to measure report text.
//!
//! Widths are in thousandths of the font size, as published in the Adobe
//! core-font AFM files.

/// Fonts used by the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
}

impl Font {
    /// PostScript name written into the PDF font dictionary.
    pub fn base_font(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
            Font::HelveticaOblique => "Helvetica-Oblique",
        }
    }

    /// Resource name used in page content streams.
    pub fn resource_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
            Font::HelveticaOblique => "F3",
        }
    }

    pub const ALL: [Font; 3] = [Font::Helvetica, Font::HelveticaBold, Font::HelveticaOblique];
}

// Printable ASCII 0x20..=0x7E
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70
];

/// Width of a character in thousandths of the font size.
///
/// Characters that cannot be encoded are measured as the `?` they render as.
pub fn char_width(font: Font, c: char) -> u16 {
    let table = match font {
        Font::HelveticaBold => &HELVETICA_BOLD_ASCII,
        Font::Helvetica | Font::HelveticaOblique => &HELVETICA_ASCII,
    };
    let bold = font == Font::HelveticaBold;

    match c {
        ' '..='~' => table[c as usize - 0x20],
        // Accented i has no dot to narrow it
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 278,
        '¡' => 333,
        '¿' => 611,
        '°' => 400,
        '·' => 278,
        '«' | '»' => 556,
        '\u{a0}' => 278,
        _ => match latin1_base(c) {
            Some(base) => table[base as usize - 0x20],
            None if encodable(c) => {
                if bold {
                    611
                } else {
                    556
                }
            }
            None => table['?' as usize - 0x20],
        },
    }
}

/// Width of a string in millimetres at the given size in points.
pub fn text_width_mm(font: Font, size_pt: f32, text: &str) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(font, c) as u32).sum();
    units as f32 * size_pt / 1000.0 * super::layout::MM_PER_PT
}

/// Whether a character has a single-byte WinAnsi encoding identical to its
/// Latin-1 code point.
pub fn encodable(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF)
}

/// Encode text for a WinAnsi-encoded Type 1 font; anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if encodable(c) { c as u32 as u8 } else { b'?' })
        .collect()
}

fn latin1_base(c: char) -> Option<char> {
    let base = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'Ç' => 'C',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'Ñ' => 'N',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'Ý' => 'Y',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(base)
}
