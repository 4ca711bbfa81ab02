//! High-level pipeline API: CSV bytes to wallet cards.
//!
//! Combines every step of a run:
//! parse, normalize, group/filter, resolve logos, compose, serialize.
//!
//! # Example
//!
//! ```rust,ignore
//! use walletcards::config::AppConfig;
//! use walletcards::transform::pipeline::{render_file, RenderContext, RenderOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = RenderContext::from_config(&AppConfig::from_env()?)?;
//!     let output = render_file(&ctx, Path::new("wallets.csv"), RenderOptions::default()).await?;
//!
//!     std::fs::write("crypto_wallets.pdf", &output.document)?;
//!     println!("Rendered {} cards on {} pages", output.rendered_count, output.page_count);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::io;
use std::path::Path;

use super::grouper::{distinct_values, group_records, Selection};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::AppConfig;
use crate::document::{compose, RenderedView, ScratchSpace, SkippedRecord};
use crate::error::{CsvError, RenderResult};
use crate::logo::{LogoBook, LogoRequest, LogoResolver, LogoSource};
use crate::models::{Field, RecordGroup, RecordSet};
use crate::normalize::normalize;
use crate::parser::{parse_bytes_auto, ParsedTable};

/// Long-lived collaborators of the pipeline, shared across runs.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub resolver: LogoResolver,
    pub scratch: ScratchSpace,
}

impl RenderContext {
    pub fn new(resolver: LogoResolver, scratch: ScratchSpace) -> Self {
        Self { resolver, scratch }
    }

    /// Build the context and create its directories.
    pub fn from_config(config: &AppConfig) -> io::Result<Self> {
        Ok(Self {
            resolver: LogoResolver::from_config(config),
            scratch: ScratchSpace::new(&config.scratch_dir)?,
        })
    }
}

/// Per-run options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub selection: Selection,
    /// `false` skips logo resolution for this run only.
    pub logos: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            selection: Selection::default(),
            logos: true,
        }
    }
}

impl RenderOptions {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            ..Self::default()
        }
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParsedTable> for TableInfo {
    fn from(table: &ParsedTable) -> Self {
        Self {
            encoding: table.encoding.clone(),
            delimiter: table.delimiter,
            headers: table.headers.clone(),
            row_count: table.rows.len(),
        }
    }
}

/// Values offered by the filter pickers, one list per present column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub wallet_types: Vec<String>,
    pub wallet_names: Vec<String>,
    pub coin_names: Vec<String>,
    pub coin_symbols: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(set: &RecordSet) -> Self {
        let values = |field: Field| {
            if set.has_column(field) {
                distinct_values(set, field)
            } else {
                Vec::new()
            }
        };
        Self {
            wallet_types: values(Field::WalletType),
            wallet_names: values(Field::WalletName),
            coin_names: values(Field::CoinName),
            coin_symbols: values(Field::CoinSymbol),
        }
    }
}

/// Logo resolution summary of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoStats {
    /// Distinct logos looked up.
    pub requested: usize,
    pub from_cache: usize,
    pub fetched: usize,
    pub unavailable: usize,
}

impl LogoStats {
    fn from_book(book: &LogoBook) -> Self {
        let mut stats = Self {
            requested: book.len(),
            ..Self::default()
        };
        for outcome in book.values() {
            match outcome.asset().map(|a| a.source) {
                Some(LogoSource::Cache) => stats.from_cache += 1,
                Some(LogoSource::Remote) => stats.fetched += 1,
                None => stats.unavailable += 1,
            }
        }
        stats
    }
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub view: RenderedView,
    /// PDF bytes.
    pub document: Vec<u8>,
    pub page_count: usize,
    pub table: TableInfo,
    /// Records after normalization, before filtering.
    pub record_count: usize,
    /// Cards present in both outputs.
    pub rendered_count: usize,
    pub skipped: Vec<SkippedRecord>,
    pub logos: LogoStats,
    pub filter_options: FilterOptions,
}

/// Render a CSV file.
pub async fn render_file(
    ctx: &RenderContext,
    path: &Path,
    options: RenderOptions,
) -> RenderResult<RenderOutput> {
    let bytes = tokio::fs::read(path).await.map_err(CsvError::from)?;
    render_bytes(ctx, &bytes, options).await
}

/// Render CSV bytes into the view and the PDF document.
///
/// Run-level failures (unreadable table, missing column, empty selection)
/// are reported before any logo or document work starts.
pub async fn render_bytes(
    ctx: &RenderContext,
    bytes: &[u8],
    options: RenderOptions,
) -> RenderResult<RenderOutput> {
    // Step 1: Parse
    log_info("📖 Reading CSV file...");
    let table = parse_bytes_auto(bytes)?;
    log_success(format!("Detected encoding: {}", table.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(table.delimiter)));
    log_success(format!("Read {} rows", table.rows.len()));

    // Step 2-3: Normalize, filter and group
    let (set, groups) = prepare(&table, &options.selection)?;

    // Step 4: Logos
    let requests = logo_requests(&groups);
    let book = if options.logos {
        ctx.resolver.resolve_many(requests).await
    } else {
        ctx.resolver.clone().with_enabled(false).resolve_many(requests).await
    };

    // Step 5: Compose both outputs
    log_info("🧾 Composing cards...");
    let composition = compose(&groups, &book, &ctx.scratch)?;
    if !composition.skipped.is_empty() {
        log_warning(format!("{} wallet(s) skipped", composition.skipped.len()));
    }

    // Step 6: Serialize
    let document = composition.document.to_pdf()?;
    let page_count = composition.document.page_count();
    let rendered_count = composition.view.card_count();
    log_success(format!(
        "📄 PDF ready: {} card(s) on {} page(s), {} bytes",
        rendered_count,
        page_count,
        document.len()
    ));

    Ok(RenderOutput {
        view: composition.view,
        document,
        page_count,
        table: TableInfo::from(&table),
        record_count: set.len(),
        rendered_count,
        skipped: composition.skipped,
        logos: LogoStats::from_book(&book),
        filter_options: FilterOptions::from_records(&set),
    })
}

/// Normalize a parsed table and apply the selection.
pub fn prepare(
    table: &ParsedTable,
    selection: &Selection,
) -> RenderResult<(RecordSet, Vec<RecordGroup>)> {
    log_info("🧹 Normalizing records...");
    let set = normalize(table)?;
    log_success(format!("{} wallet record(s)", set.len()));

    log_info("📦 Grouping wallets...");
    let groups = group_records(&set, selection)?;
    for group in &groups {
        let label = if group.key.is_empty() { "(all)" } else { group.key.as_str() };
        log_info_indent(format!("{}: {} wallet(s)", label, group.members.len()), 1);
    }

    Ok((set, groups))
}

/// One logo request per record with a coin or a logo URL, in traversal order.
pub fn logo_requests(groups: &[RecordGroup]) -> Vec<LogoRequest> {
    groups
        .iter()
        .flat_map(|g| g.members.iter())
        .filter_map(LogoRequest::for_record)
        .collect()
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
