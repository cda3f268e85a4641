use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy)]
pub enum SecurityDomain {
    PdfStructure,
    Xref,
    Encryption,
    PageTree,
    Annotations,
    NameTree,
    Budget,
    Config,
}

impl SecurityDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityDomain::PdfStructure => "pdf.structure",
            SecurityDomain::Xref => "pdf.xref",
            SecurityDomain::Encryption => "pdf.encryption",
            SecurityDomain::PageTree => "pdf.page_tree",
            SecurityDomain::Annotations => "pdf.annotations",
            SecurityDomain::NameTree => "pdf.name_tree",
            SecurityDomain::Budget => "runtime.budget",
            SecurityDomain::Config => "runtime.config",
        }
    }
}

impl fmt::Display for SecurityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A security-relevant observation, emitted as a `tracing` event carrying
/// `security = true` so subscribers can route it separately.
#[derive(Debug, Clone, Copy)]
pub struct SecurityEvent<'a> {
    pub level: Level,
    pub domain: SecurityDomain,
    pub severity: Severity,
    pub kind: &'a str,
    pub page: Option<usize>,
    pub message: &'a str,
}

impl<'a> SecurityEvent<'a> {
    pub fn warn(domain: SecurityDomain, kind: &'a str, message: &'a str) -> Self {
        Self { level: Level::WARN, domain, severity: Severity::Low, kind, page: None, message }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn emit(self) {
        // `event!` needs a constant level, hence one arm per level.
        match self.level {
            Level::TRACE => tracing::event!(
                Level::TRACE,
                security = true,
                domain = %self.domain,
                severity = ?self.severity,
                kind = self.kind,
                page = self.page,
                "{}",
                self.message
            ),
            Level::DEBUG => tracing::event!(
                Level::DEBUG,
                security = true,
                domain = %self.domain,
                severity = ?self.severity,
                kind = self.kind,
                page = self.page,
                "{}",
                self.message
            ),
            Level::INFO => tracing::event!(
                Level::INFO,
                security = true,
                domain = %self.domain,
                severity = ?self.severity,
                kind = self.kind,
                page = self.page,
                "{}",
                self.message
            ),
            Level::WARN => tracing::event!(
                Level::WARN,
                security = true,
                domain = %self.domain,
                severity = ?self.severity,
                kind = self.kind,
                page = self.page,
                "{}",
                self.message
            ),
            Level::ERROR => tracing::event!(
                Level::ERROR,
                security = true,
                domain = %self.domain,
                severity = ?self.severity,
                kind = self.kind,
                page = self.page,
                "{}",
                self.message
            ),
        }
    }
}
