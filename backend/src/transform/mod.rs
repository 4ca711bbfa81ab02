//! Record selection and the render pipeline.
//!
//! - Grouper: filters and partitions normalized records
//! - Pipeline: CSV bytes to view and PDF

pub mod grouper;
pub mod pipeline;

pub use grouper::{distinct_values, group_records, Filter, Selection, ALL};
pub use pipeline::*;
