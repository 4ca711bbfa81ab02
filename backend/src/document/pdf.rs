//! Minimal PDF 1.4 writer for composed documents.
//!
//! Object layout:
//!
//! ```text
//! 1        Catalog
//! 2        Pages
//! 3, 4     Helvetica, Helvetica-Bold (standard Type1, WinAnsiEncoding)
//! 5..      image XObjects (Flate compressed)
//! then     one Page + one content stream per page
//! ```
//!
//! Output carries no timestamps or ids, so equal documents serialize to
//! equal bytes.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fmt::Write as _;
use std::io::{self, Write};

use super::layout::{ColorSpace, ComposedDocument, Element, FontFace, PAGE_HEIGHT, PAGE_WIDTH};

const FIRST_IMAGE_OBJECT: usize = 5;

/// Serialize a composed document.
pub fn write_pdf(document: &ComposedDocument) -> io::Result<Vec<u8>> {
    let image_count = document.images.len();
    let first_page_object = FIRST_IMAGE_OBJECT + image_count;
    let page_object = |index: usize| first_page_object + index * 2;
    let object_count = first_page_object - 1 + document.pages.len() * 2;

    let mut writer = ObjectWriter::new();

    writer.object(1, b"<< /Type /Catalog /Pages 2 0 R >>")?;

    let kids: Vec<String> = (0..document.pages.len())
        .map(|i| format!("{} 0 R", page_object(i)))
        .collect();
    writer.object(
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            document.pages.len()
        )
        .as_bytes(),
    )?;

    writer.object(3, font_dict("Helvetica").as_bytes())?;
    writer.object(4, font_dict("Helvetica-Bold").as_bytes())?;

    for (index, image) in document.images.iter().enumerate() {
        let data = deflate(&image.data)?;
        let color_space = match image.color {
            ColorSpace::Gray => "/DeviceGray",
            ColorSpace::Rgb => "/DeviceRGB",
        };
        let dict = format!(
            "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} \
             /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>",
            image.width,
            image.height,
            color_space,
            data.len()
        );
        writer.stream(FIRST_IMAGE_OBJECT + index, &dict, &data)?;
    }

    for (index, page) in document.pages.iter().enumerate() {
        let id = page_object(index);
        let mut xobjects = page
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Image { image, .. } => Some(image.0),
                Element::Text { .. } => None,
            })
            .collect::<Vec<_>>();
        xobjects.sort_unstable();
        xobjects.dedup();
        let xobject_dict: String = xobjects
            .iter()
            .map(|i| format!(" /Im{} {} 0 R", i, FIRST_IMAGE_OBJECT + i))
            .collect();

        let page_dict = format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> /XObject <<{} >> >> /Contents {} 0 R >>",
            num(PAGE_WIDTH),
            num(PAGE_HEIGHT),
            xobject_dict,
            id + 1
        );
        writer.object(id, page_dict.as_bytes())?;

        let content = content_stream(&page.elements);
        writer.stream(id + 1, &format!("<< /Length {} >>", content.len()), content.as_bytes())?;
    }

    writer.finish(object_count)
}

fn font_dict(base_font: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base_font
    )
}

/// Drawing operators for one page. Layout coordinates are measured from
/// the top-left corner; PDF space starts bottom-left.
fn content_stream(elements: &[Element]) -> String {
    let mut out = String::new();
    for element in elements {
        match element {
            Element::Text { x, baseline, size, face, text } => {
                let font = match face {
                    FontFace::Regular => "F1",
                    FontFace::Bold => "F2",
                };
                let _ = writeln!(
                    out,
                    "BT /{} {} Tf {} {} Td ({}) Tj ET",
                    font,
                    num(*size),
                    num(*x),
                    num(PAGE_HEIGHT - baseline),
                    escape_text(text)
                );
            }
            Element::Image { image, x, y, width, height } => {
                let _ = writeln!(
                    out,
                    "q {} 0 0 {} {} {} cm /Im{} Do Q",
                    num(*width),
                    num(*height),
                    num(*x),
                    num(PAGE_HEIGHT - y - height),
                    image.0
                );
            }
        }
    }
    out
}

/// Escape text for a PDF literal string in WinAnsiEncoding.
///
/// Latin-1 characters are written as octal escapes; anything outside
/// Latin-1 becomes `?`.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let c = if c.is_whitespace() { ' ' } else { c };
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => match win_ansi(c) {
                Some(code) => {
                    let _ = write!(out, "\\{:03o}", code);
                }
                None => out.push('?'),
            },
        }
    }
    out
}

/// WinAnsiEncoding code of a non-ASCII character, if the base fonts have it.
fn win_ansi(c: char) -> Option<u8> {
    let code = match c {
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// Fixed two-decimal number formatting.
fn num(value: f32) -> String {
    format!("{:.2}", value)
}

fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Appends numbered objects and tracks their offsets for the xref table.
struct ObjectWriter {
    out: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl ObjectWriter {
    fn new() -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, id: usize, body: &[u8]) -> io::Result<()> {
        self.offsets.push((id, self.out.len()));
        write!(self.out, "{} 0 obj\n", id)?;
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
        Ok(())
    }

    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) -> io::Result<()> {
        let mut body = Vec::with_capacity(dict.len() + data.len() + 32);
        body.extend_from_slice(dict.as_bytes());
        body.extend_from_slice(b"\nstream\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(id, &body)
    }

    fn finish(mut self, object_count: usize) -> io::Result<Vec<u8>> {
        self.offsets.sort_unstable();
        if self.offsets.len() != object_count
            || self.offsets.iter().enumerate().any(|(i, (id, _))| *id != i + 1)
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "PDF objects are not numbered contiguously",
            ));
        }

        let xref_offset = self.out.len();
        write!(self.out, "xref\n0 {}\n", object_count + 1)?;
        self.out.extend_from_slice(b"0000000000 65535 f \n");
        for (_, offset) in &self.offsets {
            write!(self.out, "{:010} 00000 n \n", offset)?;
        }
        write!(
            self.out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            object_count + 1,
            xref_offset
        )?;
        Ok(self.out)
    }
}

// =============================================================================
// Text metrics
// =============================================================================

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Width of `text` in points.
pub fn text_width(text: &str, size: f32, face: FontFace) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' '..='~' => HELVETICA_WIDTHS[c as usize - 32] as u32,
            _ => 556,
        })
        .sum();
    let bold = match face {
        FontFace::Regular => 1.0,
        FontFace::Bold => 1.06,
    };
    units as f32 * size / 1000.0 * bold
}

/// Greedy word wrap; words wider than a line are broken by character.
///
/// Whitespace inside a line is kept as written. A line break replaces the
/// whitespace run it falls on.
pub fn wrap_text(text: &str, max_width: f32, size: f32, face: FontFace) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for (gap, word) in words(text) {
        let mut candidate = current.clone();
        if !current.is_empty() {
            candidate.push_str(gap);
        }
        candidate.push_str(word);
        if text_width(&candidate, size, face) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if text_width(&current, size, face) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Words of `text`, each paired with the whitespace run before it.
fn words(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    loop {
        let start = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        let (gap, tail) = rest.split_at(start);
        if tail.is_empty() {
            return out;
        }
        let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let (word, next) = tail.split_at(end);
        out.push((gap, word));
        rest = next;
    }
}
