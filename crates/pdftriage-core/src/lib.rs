//! Threat triage for untrusted PDF documents.
//!
//! Bytes go through [`load`] into an owned [`DocumentGraph`], [`scan`]
//! extracts action-bearing constructs page by page, [`classify`] checks each
//! hyperlink, and [`aggregate`] folds everything into a bounded score.
//! [`analyze`] runs the whole pipeline and never fails or panics. Nothing
//! found in a document is ever executed.

mod actions;
pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod loader;
pub mod model;
mod names;
mod page_tree;
pub mod runner;
pub mod scan;
pub mod security_log;
pub mod url_heuristics;

pub use crate::aggregate::{aggregate, score};
pub use crate::cancel::{CancelToken, TimeoutChecker};
pub use crate::config::Config;
pub use crate::context::{ParseLimits, ParserContext};
pub use crate::document::{DocumentGraph, LoadNote, OpenAction, Page};
pub use crate::error::{Cancelled, ConfigError, LoadError, PageError};
pub use crate::loader::{load, LoadOptions};
pub use crate::model::{
    Action, ActionKind, AnalysisFindings, AnalysisResult, Annotation, ExtractedLink, RawDocument, RiskLevel,
    SuspicionReason,
};
pub use crate::runner::{analyze, AnalysisOptions, AnalysisOutcome};
pub use crate::scan::{scan, scan_pages, PageFindings, ScanOptions, ScanOutput};
pub use crate::url_heuristics::{classify, UrlVerdict};
