use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, error, info_span};

use crate::aggregate::aggregate;
use crate::cancel::CancelToken;
use crate::context::ParserContext;
use crate::error::LoadError;
use crate::loader::{load, LoadOptions};
use crate::model::{AnalysisResult, RawDocument};
use crate::scan::{scan, ScanOptions};

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub password: Option<Vec<u8>>,
    pub max_pages: usize,
    pub max_annotations: usize,
    pub time_budget_ms: Option<u64>,
    pub parallel: bool,
    pub cancel: CancelToken,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        let load = LoadOptions::default();
        Self {
            password: None,
            max_pages: load.max_pages,
            max_annotations: load.max_annotations,
            time_budget_ms: None,
            parallel: false,
            cancel: CancelToken::new(),
        }
    }
}

impl AnalysisOptions {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            password: self.password.clone(),
            max_pages: self.max_pages,
            max_annotations: self.max_annotations,
            time_budget_ms: self.time_budget_ms,
            cancel: self.cancel.clone(),
        }
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions { parallel: self.parallel, cancel: self.cancel.clone() }
    }
}

/// Result of one run. Only `Scored` carries a risk score; the other
/// outcomes say why none could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Scored(AnalysisResult),
    Encrypted,
    Unsupported { reason: String },
    Corrupt { reason: String },
    Cancelled,
}

impl AnalysisOutcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisOutcome::Scored(result) => Some(result),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<LoadError> for AnalysisOutcome {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Corrupt { reason } => AnalysisOutcome::Corrupt { reason },
            LoadError::Encrypted => AnalysisOutcome::Encrypted,
            LoadError::UnsupportedStructure { reason } => AnalysisOutcome::Unsupported { reason },
            LoadError::Cancelled(_) => AnalysisOutcome::Cancelled,
        }
    }
}

/// Runs the whole pipeline on one document. Never panics and never returns
/// an error: every failure is one of the [`AnalysisOutcome`] variants.
pub fn analyze(ctx: &ParserContext, raw: RawDocument<'_>, options: &AnalysisOptions) -> AnalysisOutcome {
    let analyze_span = info_span!("analyze", bytes_len = raw.bytes.len(), parallel = options.parallel);
    let _analyze_guard = analyze_span.enter();
    match catch_unwind(AssertUnwindSafe(|| run(ctx, raw, options))) {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(
                security = true,
                domain = "pdf.structure",
                kind = "analysis_panic",
                "Analysis panicked; reporting document as corrupt"
            );
            AnalysisOutcome::Corrupt { reason: "internal fault while reading document".into() }
        }
    }
}

fn run(ctx: &ParserContext, raw: RawDocument<'_>, options: &AnalysisOptions) -> AnalysisOutcome {
    let document = match load(ctx, raw, &options.load_options()) {
        Ok(document) => document,
        Err(err) => {
            debug!(error = %err, "Document not scored");
            return err.into();
        }
    };
    match scan(&document, &options.scan_options()) {
        Ok(output) => AnalysisOutcome::Scored(aggregate(output)),
        Err(_) => AnalysisOutcome::Cancelled,
    }
}
