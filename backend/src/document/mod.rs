//! View and PDF composition.
//!
//! - [`composer`]: one traversal producing both outputs
//! - [`layout`]: page-descriptor builder
//! - [`pdf`]: PDF serialization and text metrics
//! - [`scratch`]: ephemeral image files

pub mod composer;
pub mod layout;
pub mod pdf;
pub mod scratch;

pub use composer::{compose, Composition, LogoView, RenderedView, SkippedRecord, ViewCard, ViewSection};
pub use layout::{CardRef, ComposedDocument, DocumentBuilder, PageDescriptor};
pub use scratch::{ScratchFile, ScratchSpace};

/// File name offered for download.
pub const DOCUMENT_FILE_NAME: &str = "crypto_wallets.pdf";

/// MIME type of the document.
pub const DOCUMENT_MIME: &str = "application/pdf";
