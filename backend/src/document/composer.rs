//! Dual-output composition.
//!
//! [`compose`] walks groups and members once. Every record that survives
//! code generation yields one [`ViewCard`] and one document card in the same
//! position, so the view and the PDF always list the same records in the
//! same order.

use serde::Serialize;

use super::layout::{Card, ComposedDocument, DocumentBuilder, ImageId, IMPLICIT_GROUP_TITLE};
use super::scratch::ScratchSpace;
use crate::api::logs::log_warning;
use crate::error::{ComposeResult, EncodeError};
use crate::logo::{logo_for, LogoBook, LogoOutcome, LogoSource, LogoUnavailable};
use crate::models::RecordGroup;
use crate::qr::CodeCache;

/// Logo state of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LogoView {
    #[serde(rename_all = "camelCase")]
    Available {
        coin: String,
        data_uri: String,
        source: LogoSource,
    },
    Unavailable { reason: LogoUnavailable },
}

impl LogoView {
    pub fn is_available(&self) -> bool {
        matches!(self, LogoView::Available { .. })
    }
}

/// One card of the on-screen view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewCard {
    pub heading: String,
    pub address: String,
    /// PNG data URI; `None` for a blank address.
    pub code: Option<String>,
    pub logo: LogoView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSection {
    pub key: String,
    pub title: String,
    pub cards: Vec<ViewCard>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedView {
    pub sections: Vec<ViewSection>,
}

impl RenderedView {
    pub fn cards(&self) -> impl Iterator<Item = &ViewCard> {
        self.sections.iter().flat_map(|s| s.cards.iter())
    }

    pub fn card_count(&self) -> usize {
        self.sections.iter().map(|s| s.cards.len()).sum()
    }
}

/// A record left out of both outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub group: String,
    pub name: String,
    pub address: String,
    pub reason: String,
}

/// Both outputs of one traversal.
#[derive(Debug, Clone)]
pub struct Composition {
    pub view: RenderedView,
    pub document: ComposedDocument,
    pub skipped: Vec<SkippedRecord>,
}

/// Compose the view and the document from grouped records.
///
/// Fails only when the document backend rejects an image; the partially
/// built document is dropped with the error.
pub fn compose(
    groups: &[RecordGroup],
    logos: &LogoBook,
    scratch: &ScratchSpace,
) -> ComposeResult<Composition> {
    let mut codes = CodeCache::new();
    let mut builder = DocumentBuilder::new();
    let mut view = RenderedView::default();
    let mut skipped = Vec::new();

    for group in groups {
        let mut section: Option<ViewSection> = None;

        for record in &group.members {
            let code_png = match code_for(&mut codes, &record.address) {
                Ok(png) => png,
                Err(e) => {
                    log_warning(format!(
                        "Skipping wallet '{}' ({}): {}",
                        record.name, record.address, e
                    ));
                    skipped.push(SkippedRecord {
                        group: group.key.clone(),
                        name: record.name.clone(),
                        address: record.address.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let logo = logo_for(record, logos);

            let section = section.get_or_insert_with(|| {
                builder.begin_group(&group.key);
                ViewSection {
                    key: group.key.clone(),
                    title: section_title(&group.key),
                    cards: Vec::new(),
                }
            });

            let code = match &code_png {
                Some(png) => Some(embed_png(&mut builder, scratch, png)?),
                None => None,
            };
            let logo_image = match logo.asset() {
                Some(asset) => Some(embed_png(&mut builder, scratch, &asset.png)?),
                None => None,
            };

            builder.add_card(Card {
                heading: record.name.clone(),
                address: record.address.clone(),
                code,
                logo: logo_image,
            });
            section.cards.push(ViewCard {
                heading: record.name.clone(),
                address: record.address.clone(),
                code: code_png.as_deref().map(crate::qr::png_data_uri),
                logo: logo_view(logo),
            });
        }

        if let Some(section) = section {
            view.sections.push(section);
        }
    }

    Ok(Composition {
        view,
        document: builder.finish(),
        skipped,
    })
}

fn section_title(key: &str) -> String {
    if key.is_empty() {
        IMPLICIT_GROUP_TITLE.to_string()
    } else {
        key.to_string()
    }
}

/// PNG of the address code, `None` for a blank address.
fn code_for(codes: &mut CodeCache, address: &str) -> Result<Option<Vec<u8>>, EncodeError> {
    if address.is_empty() {
        return Ok(None);
    }
    Ok(Some(codes.get_or_generate(address)?.png.clone()))
}

fn logo_view(outcome: LogoOutcome) -> LogoView {
    match outcome {
        LogoOutcome::Available(asset) => LogoView::Available {
            data_uri: asset.data_uri(),
            coin: asset.coin_id,
            source: asset.source,
        },
        LogoOutcome::Unavailable(reason) => LogoView::Unavailable { reason },
    }
}

/// Hand one image to the backend through a scratch file that is removed
/// before this returns.
fn embed_png(
    builder: &mut DocumentBuilder,
    scratch: &ScratchSpace,
    png: &[u8],
) -> ComposeResult<ImageId> {
    let file = scratch.write_png(png)?;
    builder.embed_image_file(file.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::scratch::SCRATCH_PREFIX;
    use crate::error::ComposeError;
    use crate::logo::LogoAsset;
    use crate::models::WalletRecord;
    use image::{DynamicImage, Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn record(name: &str, address: &str, wallet_type: &str, coin: &str) -> WalletRecord {
        WalletRecord {
            name: name.into(),
            address: address.into(),
            wallet_type: wallet_type.into(),
            coin_name: coin.into(),
            ..Default::default()
        }
    }

    fn group(key: &str, members: Vec<WalletRecord>) -> RecordGroup {
        RecordGroup {
            key: key.into(),
            members,
        }
    }

    fn scratch_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
            .count()
    }

    fn logo_png() -> Vec<u8> {
        crate::qr::encode_png(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            8,
            8,
            Rgba([247, 147, 26, 255]),
        )))
        .unwrap()
    }

    fn assert_outputs_agree(composition: &Composition) {
        let view: Vec<(&str, &str)> = composition
            .view
            .cards()
            .map(|c| (c.heading.as_str(), c.address.as_str()))
            .collect();
        let document: Vec<(&str, &str)> = composition
            .document
            .cards()
            .map(|c| (c.heading.as_str(), c.address.as_str()))
            .collect();
        assert_eq!(view, document);
    }

    #[test]
    fn test_two_groups_two_pages() {
        let dir = tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path()).unwrap();
        let groups = vec![
            group("Hardware", vec![record("Cold A", "0xAAA", "Hardware", "")]),
            group("Software", vec![record("Hot B", "0xBBB", "Software", "")]),
        ];

        let composition = compose(&groups, &LogoBook::new(), &scratch).unwrap();

        assert_eq!(composition.document.page_count(), 2);
        let keys: Vec<_> = composition.view.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["Hardware", "Software"]);
        assert_eq!(composition.view.card_count(), 2);
        assert_outputs_agree(&composition);

        let card = &composition.view.sections[0].cards[0];
        assert!(card.code.as_deref().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(
            card.logo,
            LogoView::Unavailable {
                reason: LogoUnavailable::NoCoin
            }
        );
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[test]
    fn test_blank_address_renders_without_code() {
        let dir = tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path()).unwrap();
        let groups = vec![group("", vec![record("Unfunded", "", "", "")])];

        let composition = compose(&groups, &LogoBook::new(), &scratch).unwrap();

        assert_eq!(composition.view.sections[0].title, IMPLICIT_GROUP_TITLE);
        assert_eq!(composition.view.sections[0].cards[0].code, None);
        assert_eq!(composition.document.image_count(), 0);
        assert_outputs_agree(&composition);
    }

    #[test]
    fn test_unencodable_record_skipped_in_both_outputs() {
        let dir = tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path()).unwrap();
        let huge = "x".repeat(3000);
        let groups = vec![
            group(
                "Hardware",
                vec![
                    record("Cold A", "0xAAA", "Hardware", ""),
                    record("Oversized", &huge, "Hardware", ""),
                ],
            ),
            group("Paper", vec![record("Only huge", &huge, "Paper", "")]),
        ];

        let composition = compose(&groups, &LogoBook::new(), &scratch).unwrap();

        assert_eq!(composition.skipped.len(), 2);
        assert_eq!(composition.skipped[0].name, "Oversized");
        // A group whose members were all skipped leaves no trace.
        assert_eq!(composition.view.sections.len(), 1);
        assert_eq!(composition.document.page_count(), 1);
        assert_outputs_agree(&composition);
    }

    #[test]
    fn test_available_logo_is_embedded() {
        let dir = tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path()).unwrap();
        let mut logos = LogoBook::new();
        logos.insert(
            "bitcoin".into(),
            LogoOutcome::Available(LogoAsset {
                coin_id: "bitcoin".into(),
                png: logo_png(),
                source: LogoSource::Cache,
            }),
        );
        let groups = vec![group("", vec![record("Cold A", "0xAAA", "", "bitcoin")])];

        let composition = compose(&groups, &logos, &scratch).unwrap();

        assert_eq!(composition.document.image_count(), 2);
        assert!(composition.view.sections[0].cards[0].logo.is_available());
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[test]
    fn test_corrupt_logo_fails_run_and_cleans_up() {
        let dir = tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path()).unwrap();
        let mut logos = LogoBook::new();
        logos.insert(
            "bitcoin".into(),
            LogoOutcome::Available(LogoAsset {
                coin_id: "bitcoin".into(),
                png: b"definitely not a png".to_vec(),
                source: LogoSource::Remote,
            }),
        );
        let groups = vec![group("", vec![record("Cold A", "0xAAA", "", "bitcoin")])];

        let err = compose(&groups, &logos, &scratch).unwrap_err();

        assert!(matches!(err, ComposeError::ImageDecode { .. }));
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let dir = tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path()).unwrap();
        let mut logos = LogoBook::new();
        logos.insert(
            "dogecoin".into(),
            LogoOutcome::Unavailable(LogoUnavailable::Status(404)),
        );
        let groups = vec![group("", vec![record("Tip jar", "D8abc", "", "dogecoin")])];

        let composition = compose(&groups, &logos, &scratch).unwrap();
        let json = serde_json::to_value(&composition.view).unwrap();

        let logo = &json["sections"][0]["cards"][0]["logo"];
        assert_eq!(logo["status"], "unavailable");
        assert_eq!(logo["reason"]["kind"], "status");
        assert_eq!(logo["reason"]["detail"], 404);
    }

    fn arb_groups() -> impl Strategy<Value = Vec<RecordGroup>> {
        let member = (
            "[A-Z][a-z]{0,10}( [A-Z][a-z]{0,10})?",
            prop_oneof![3 => "0x[0-9a-f]{4,40}", 1 => Just(String::new())],
        );
        prop::collection::btree_map("[A-Z][a-z]{0,6}", prop::collection::vec(member, 1..8), 1..4).prop_map(
            |groups| {
                groups
                    .into_iter()
                    .map(|(key, members)| {
                        let members = members
                            .into_iter()
                            .map(|(name, address)| record(&name, &address, &key, ""))
                            .collect();
                        group(&key, members)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_view_and_document_agree_for_any_groups(groups in arb_groups()) {
            let dir = tempdir().unwrap();
            let scratch = ScratchSpace::new(dir.path()).unwrap();

            let composition = compose(&groups, &LogoBook::new(), &scratch).unwrap();

            let view: Vec<(String, String)> = composition
                .view
                .cards()
                .map(|c| (c.heading.clone(), c.address.clone()))
                .collect();
            let document: Vec<(String, String)> = composition
                .document
                .cards()
                .map(|c| (c.heading.clone(), c.address.clone()))
                .collect();
            let input: Vec<(String, String)> = groups
                .iter()
                .flat_map(|g| g.members.iter().map(|m| (m.name.clone(), m.address.clone())))
                .collect();
            prop_assert_eq!(&view, &document);
            prop_assert_eq!(&view, &input);

            let section_keys: Vec<&str> = composition.view.sections.iter().map(|s| s.key.as_str()).collect();
            let mut page_keys: Vec<&str> = composition
                .document
                .pages()
                .iter()
                .filter(|p| !p.continued)
                .map(|p| p.group_key.as_str())
                .collect();
            page_keys.dedup();
            prop_assert_eq!(section_keys, page_keys);

            for card in composition.view.cards() {
                prop_assert_eq!(card.code.is_some(), !card.address.is_empty());
            }
            prop_assert_eq!(scratch_files(dir.path()), 0);
        }
    }
}
