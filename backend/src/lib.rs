//! # walletcards - Wallet CSV to QR code cards and PDF
//!
//! walletcards reads a spreadsheet export of crypto wallets, renders every
//! wallet as a card with a QR code of its address (and the coin logo when
//! one can be found), and produces a printable A4 PDF with the same cards
//! in the same order.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌─────────────┐   ┌──────────────┐
//! │ CSV File │──▶│  Parser   │──▶│ Normalize │──▶│ Group/Filter│──▶│   Composer   │──▶ view + PDF
//! │(ISO/UTF8)│   │(auto-enc) │   │ (records) │   │  (sorted)   │   │ (QR + logos) │
//! └──────────┘   └───────────┘   └───────────┘   └─────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use walletcards::{render_file, AppConfig, RenderContext, RenderOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = RenderContext::from_config(&AppConfig::default()).unwrap();
//!     let output = render_file(&ctx, "wallets.csv".as_ref(), RenderOptions::default()).await.unwrap();
//!     println!("Rendered {} wallets on {} pages", output.rendered_count, output.page_count);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment configuration
//! - [`models`] - Wallet records, fields and groups
//! - [`parser`] - CSV parsing with auto-detection
//! - [`normalize`] - Column resolution and field cleanup
//! - [`transform`] - Grouping, filtering and the render pipeline
//! - [`qr`] - QR code generation
//! - [`cache`] - On-disk logo cache
//! - [`logo`] - Best-effort logo resolution
//! - [`document`] - View and PDF composition
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod normalize;
pub mod parser;

// Transformation
pub mod transform;

// Rendering
pub mod document;
pub mod qr;

// Logos
pub mod cache;
pub mod logo;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ComposeError, ConfigError, CsvError, EmptyResultError, EncodeError, RenderError, SchemaError,
    ServerError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::AppConfig;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Field, RecordGroup, RecordSet, WalletRecord};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use normalize::normalize;
pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    ParsedTable,
};

// =============================================================================
// Re-exports - Grouping
// =============================================================================

pub use transform::grouper::{distinct_values, group_records, Filter, Selection, ALL};

// =============================================================================
// Re-exports - Codes, logos, documents
// =============================================================================

pub use cache::{CachedLogo, LogoCache};
pub use document::{
    compose, ComposedDocument, Composition, RenderedView, ScratchSpace, DOCUMENT_FILE_NAME,
    DOCUMENT_MIME,
};
pub use logo::{LogoAsset, LogoOutcome, LogoResolver, LogoUnavailable};
pub use qr::{generate as generate_code, ScannableCode};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    prepare, render_bytes, render_file, RenderContext, RenderOptions, RenderOutput, TableInfo,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, RenderResponse, ResponseMetadata};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
