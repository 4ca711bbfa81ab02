//! Page-descriptor builder.
//!
//! [`DocumentBuilder`] lays cards out on A4 pages and accumulates finished
//! [`PageDescriptor`]s. A page is sealed when the next one opens; nothing on
//! a sealed page changes afterwards. [`DocumentBuilder::finish`] seals the
//! last page and yields the immutable [`ComposedDocument`].

use std::fs;
use std::path::Path;

use image::DynamicImage;
use serde::Serialize;

use super::pdf::{text_width, wrap_text, write_pdf};
use crate::error::{ComposeError, ComposeResult};

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

/// 10 mm.
pub const MARGIN: f32 = 28.35;

/// Printed code edge, 50 mm.
pub const CODE_SIZE: f32 = 141.73;

/// Header of a group whose key is empty.
pub const IMPLICIT_GROUP_TITLE: &str = "Crypto Wallets";

const CONTINUED_SUFFIX: &str = " (continued)";

const HEADER_SIZE: f32 = 16.0;
const HEADER_LEADING: f32 = 20.0;
const HEADER_GAP: f32 = 12.0;
const HEADING_SIZE: f32 = 12.0;
const HEADING_LEADING: f32 = 15.0;
const HEADING_ROW: f32 = 18.0;
const LOGO_SIZE: f32 = 24.0;
const LOGO_GAP: f32 = 6.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING: f32 = 14.0;
const BLOCK_GAP: f32 = 4.0;
const CARD_GAP: f32 = 28.35;

/// Index of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
}

/// A positioned drawing primitive. `y` and `baseline` are measured from
/// the top edge of the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        face: FontFace,
        text: String,
    },
    Image {
        image: ImageId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// The text content of one card, as placed on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardRef {
    pub heading: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageDescriptor {
    pub group_key: String,
    /// The page carries on a group started on the previous page.
    pub continued: bool,
    pub elements: Vec<Element>,
    pub cards: Vec<CardRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
}

/// Raw 8-bit samples of an embedded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub color: ColorSpace,
    pub data: Vec<u8>,
}

/// Content of one card handed to the builder.
#[derive(Debug, Clone)]
pub struct Card {
    pub heading: String,
    pub address: String,
    pub code: Option<ImageId>,
    pub logo: Option<ImageId>,
}

/// Finished, immutable document.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedDocument {
    pub(crate) pages: Vec<PageDescriptor>,
    pub(crate) images: Vec<EmbeddedImage>,
}

impl ComposedDocument {
    pub fn pages(&self) -> &[PageDescriptor] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Every card in page order.
    pub fn cards(&self) -> impl Iterator<Item = &CardRef> {
        self.pages.iter().flat_map(|p| p.cards.iter())
    }

    /// Serialize to PDF bytes.
    pub fn to_pdf(&self) -> ComposeResult<Vec<u8>> {
        write_pdf(self).map_err(ComposeError::Output)
    }
}

struct PageDraft {
    group_key: String,
    continued: bool,
    elements: Vec<Element>,
    cards: Vec<CardRef>,
    cursor: f32,
}

impl PageDraft {
    fn open(group_key: &str, continued: bool) -> Self {
        let mut title = if group_key.is_empty() {
            IMPLICIT_GROUP_TITLE.to_string()
        } else {
            group_key.to_string()
        };
        if continued {
            title.push_str(CONTINUED_SUFFIX);
        }

        let lines = wrap_text(&title, PAGE_WIDTH - 2.0 * MARGIN, HEADER_SIZE, FontFace::Bold);
        let last_baseline = MARGIN + HEADER_SIZE + (lines.len() - 1) as f32 * HEADER_LEADING;
        let elements = lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let width = text_width(&line, HEADER_SIZE, FontFace::Bold);
                Element::Text {
                    x: ((PAGE_WIDTH - width) / 2.0).max(MARGIN),
                    baseline: MARGIN + HEADER_SIZE + i as f32 * HEADER_LEADING,
                    size: HEADER_SIZE,
                    face: FontFace::Bold,
                    text: line,
                }
            })
            .collect();

        Self {
            group_key: group_key.to_string(),
            continued,
            elements,
            cards: Vec::new(),
            cursor: last_baseline + HEADER_GAP,
        }
    }

    fn seal(self) -> PageDescriptor {
        PageDescriptor {
            group_key: self.group_key,
            continued: self.continued,
            elements: self.elements,
            cards: self.cards,
        }
    }
}

/// Accumulates pages and embedded images.
#[derive(Default)]
pub struct DocumentBuilder {
    pages: Vec<PageDescriptor>,
    images: Vec<EmbeddedImage>,
    current: Option<PageDraft>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a group on a fresh page.
    pub fn begin_group(&mut self, key: &str) {
        self.seal_current();
        self.current = Some(PageDraft::open(key, false));
    }

    /// Read an image file and register it for embedding.
    pub fn embed_image_file(&mut self, path: &Path) -> ComposeResult<ImageId> {
        let bytes = fs::read(path).map_err(|source| ComposeError::ImageFile {
            path: path.display().to_string(),
            source,
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| ComposeError::ImageDecode {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let id = ImageId(self.images.len());
        self.images.push(flatten(decoded));
        Ok(id)
    }

    /// Place a card below the previous one, continuing on a new page when
    /// it does not fit.
    pub fn add_card(&mut self, card: Card) {
        let address_text = format!("Address: {}", card.address);
        let text_left = match card.logo {
            Some(_) => MARGIN + LOGO_SIZE + LOGO_GAP,
            None => MARGIN,
        };
        let column = PAGE_WIDTH - MARGIN - text_left;
        let heading_lines = wrap_text(&card.heading, column, HEADING_SIZE, FontFace::Bold);
        let lines = wrap_text(&address_text, column, BODY_SIZE, FontFace::Regular);
        let min_row = if card.logo.is_some() { LOGO_SIZE } else { HEADING_ROW };
        let row = min_row.max(heading_lines.len() as f32 * HEADING_LEADING);
        let text_height = lines.len() as f32 * BODY_LEADING;
        let code_height = if card.code.is_some() {
            BLOCK_GAP + CODE_SIZE
        } else {
            0.0
        };
        let height = row + BLOCK_GAP + text_height + code_height;

        let draft = self.page_for(height);
        let top = draft.cursor;

        if let Some(logo) = card.logo {
            draft.elements.push(Element::Image {
                image: logo,
                x: MARGIN,
                y: top,
                width: LOGO_SIZE,
                height: LOGO_SIZE,
            });
        }
        // The heading block is centred vertically in the row.
        let heading_block = (heading_lines.len() - 1) as f32 * HEADING_LEADING;
        let first_baseline = top + (row - heading_block) / 2.0 + HEADING_SIZE / 3.0;
        for (i, line) in heading_lines.into_iter().enumerate() {
            draft.elements.push(Element::Text {
                x: text_left,
                baseline: first_baseline + i as f32 * HEADING_LEADING,
                size: HEADING_SIZE,
                face: FontFace::Bold,
                text: line,
            });
        }

        let text_top = top + row + BLOCK_GAP;
        for (i, line) in lines.into_iter().enumerate() {
            draft.elements.push(Element::Text {
                x: text_left,
                baseline: text_top + (i as f32 + 1.0) * BODY_LEADING - BLOCK_GAP,
                size: BODY_SIZE,
                face: FontFace::Regular,
                text: line,
            });
        }

        if let Some(code) = card.code {
            draft.elements.push(Element::Image {
                image: code,
                x: MARGIN,
                y: text_top + text_height + BLOCK_GAP,
                width: CODE_SIZE,
                height: CODE_SIZE,
            });
        }

        draft.cards.push(CardRef {
            heading: card.heading,
            address: card.address,
        });
        draft.cursor = top + height + CARD_GAP;
    }

    pub fn finish(mut self) -> ComposedDocument {
        self.seal_current();
        ComposedDocument {
            pages: self.pages,
            images: self.images,
        }
    }

    fn seal_current(&mut self) {
        if let Some(draft) = self.current.take() {
            self.pages.push(draft.seal());
        }
    }

    /// The page to draw a card of `height` on.
    fn page_for(&mut self, height: f32) -> &mut PageDraft {
        let overflow = match &self.current {
            Some(draft) => {
                !draft.cards.is_empty() && draft.cursor + height > PAGE_HEIGHT - MARGIN
            }
            None => false,
        };

        if overflow {
            if let Some(draft) = self.current.take() {
                let key = draft.group_key.clone();
                self.pages.push(draft.seal());
                self.current = Some(PageDraft::open(&key, true));
            }
        }

        self.current.get_or_insert_with(|| PageDraft::open("", false))
    }
}

/// Gray images stay gray; everything else is composited over white.
fn flatten(image: DynamicImage) -> EmbeddedImage {
    match image {
        DynamicImage::ImageLuma8(gray) => EmbeddedImage {
            width: gray.width(),
            height: gray.height(),
            color: ColorSpace::Gray,
            data: gray.into_raw(),
        },
        other => {
            let rgba = other.to_rgba8();
            let mut data = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
            for pixel in rgba.pixels() {
                let [r, g, b, a] = pixel.0;
                let a = a as u16;
                for c in [r, g, b] {
                    data.push(((c as u16 * a + 255 * (255 - a)) / 255) as u8);
                }
            }
            EmbeddedImage {
                width: rgba.width(),
                height: rgba.height(),
                color: ColorSpace::Rgb,
                data,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn card(heading: &str, code: Option<ImageId>) -> Card {
        Card {
            heading: heading.to_string(),
            address: format!("0x{}", heading.len()),
            code,
            logo: None,
        }
    }

    fn write_png(dir: &Path, name: &str, image: DynamicImage) -> std::path::PathBuf {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn header_text(page: &PageDescriptor) -> &str {
        match &page.elements[0] {
            Element::Text { text, .. } => text,
            other => panic!("expected header text, got {:?}", other),
        }
    }

    #[test]
    fn test_each_group_starts_a_page() {
        let mut builder = DocumentBuilder::new();
        builder.begin_group("Hardware");
        builder.add_card(card("Cold A", None));
        builder.begin_group("Software");
        builder.add_card(card("Hot B", None));
        let doc = builder.finish();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(header_text(&doc.pages()[0]), "Hardware");
        assert_eq!(header_text(&doc.pages()[1]), "Software");
        let headings: Vec<_> = doc.cards().map(|c| c.heading.as_str()).collect();
        assert_eq!(headings, vec!["Cold A", "Hot B"]);
    }

    #[test]
    fn test_implicit_group_title() {
        let mut builder = DocumentBuilder::new();
        builder.begin_group("");
        builder.add_card(card("Only", None));
        let doc = builder.finish();

        assert_eq!(header_text(&doc.pages()[0]), IMPLICIT_GROUP_TITLE);
    }

    #[test]
    fn test_overflow_continues_group() {
        let dir = tempdir().unwrap();
        let path = write_png(
            dir.path(),
            "code.png",
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0]))),
        );

        let mut builder = DocumentBuilder::new();
        let code = builder.embed_image_file(&path).unwrap();
        builder.begin_group("Hardware");
        for name in ["A", "B", "C", "D"] {
            builder.add_card(card(name, Some(code)));
        }
        let doc = builder.finish();

        assert_eq!(doc.page_count(), 2);
        assert!(!doc.pages()[0].continued);
        assert!(doc.pages()[1].continued);
        assert_eq!(doc.pages()[1].group_key, "Hardware");
        assert_eq!(header_text(&doc.pages()[1]), "Hardware (continued)");
        assert_eq!(doc.cards().count(), 4);

        for page in doc.pages() {
            for element in &page.elements {
                if let Element::Image { y, height, .. } = element {
                    assert!(y + height <= PAGE_HEIGHT - MARGIN);
                }
            }
        }
    }

    #[test]
    fn test_long_headings_wrap_inside_the_page() {
        let long_key = "Institutional custody ".repeat(6);
        let long_name = "Treasury reserve wallet for the operations team ".repeat(3);
        let mut builder = DocumentBuilder::new();
        builder.begin_group(long_key.trim());
        builder.add_card(card(long_name.trim(), None));
        let doc = builder.finish();
        let page = &doc.pages()[0];

        let texts: Vec<(&str, f32, f32)> = page
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, x, size, .. } => Some((text.as_str(), *x, *size)),
                _ => None,
            })
            .collect();
        let headers = texts.iter().filter(|(_, _, size)| *size == HEADER_SIZE).count();
        let headings = texts.iter().filter(|(_, _, size)| *size == HEADING_SIZE).count();
        assert!(headers > 1);
        assert!(headings > 1);
        for (text, x, size) in &texts {
            assert!(x + text_width(text, *size, FontFace::Bold) <= PAGE_WIDTH - MARGIN + 0.01);
        }

        let heading_text: Vec<&str> = texts
            .iter()
            .filter(|(_, _, size)| *size == HEADING_SIZE)
            .map(|(text, _, _)| *text)
            .collect();
        assert_eq!(heading_text.join(" "), long_name.trim());
        assert_eq!(doc.cards().next().unwrap().heading, long_name.trim());
    }

    #[test]
    fn test_card_without_code_has_no_image() {
        let mut builder = DocumentBuilder::new();
        builder.begin_group("Hardware");
        builder.add_card(card("Blank", None));
        let doc = builder.finish();

        assert!(!doc.pages()[0]
            .elements
            .iter()
            .any(|e| matches!(e, Element::Image { .. })));
    }

    #[test]
    fn test_embed_gray_and_rgba() {
        let dir = tempdir().unwrap();
        let gray = write_png(
            dir.path(),
            "gray.png",
            DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 3, Luma([0]))),
        );
        let rgba = write_png(
            dir.path(),
            "logo.png",
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 0]))),
        );

        let mut builder = DocumentBuilder::new();
        assert_eq!(builder.embed_image_file(&gray).unwrap(), ImageId(0));
        assert_eq!(builder.embed_image_file(&rgba).unwrap(), ImageId(1));
        let doc = builder.finish();

        assert_eq!(doc.images[0].color, ColorSpace::Gray);
        assert_eq!(doc.images[0].data.len(), 6);
        assert_eq!(doc.images[1].color, ColorSpace::Rgb);
        // Fully transparent pixels become white.
        assert!(doc.images[1].data.iter().all(|&b| b == 255));
    }

    #[test]
    fn test_embed_errors() {
        let dir = tempdir().unwrap();
        let corrupt = dir.path().join("corrupt.png");
        fs::write(&corrupt, b"not an image").unwrap();

        let mut builder = DocumentBuilder::new();
        assert!(matches!(
            builder.embed_image_file(&corrupt),
            Err(ComposeError::ImageDecode { .. })
        ));
        assert!(matches!(
            builder.embed_image_file(&dir.path().join("missing.png")),
            Err(ComposeError::ImageFile { .. })
        ));
        assert_eq!(builder.finish().image_count(), 0);
    }

    #[test]
    fn test_pdf_structure_and_determinism() {
        let build = || {
            let mut builder = DocumentBuilder::new();
            builder.begin_group("Hardware");
            builder.add_card(card("Cold (A)", None));
            builder.begin_group("Software");
            builder.add_card(card("Hot B", None));
            builder.finish()
        };

        let first = build().to_pdf().unwrap();
        let second = build().to_pdf().unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8_lossy(&first);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert_eq!(text.matches("/Type /Page /Parent").count(), 2);
        assert!(text.contains("/Count 2"));
        assert!(text.contains("(Cold \\(A\\)) Tj"));
    }
}
