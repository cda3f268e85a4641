use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Input buffer plus the length the uploader declared for it.
#[derive(Debug, Clone, Copy)]
pub struct RawDocument<'a> {
    pub bytes: &'a [u8],
    pub declared_len: usize,
}

impl<'a> RawDocument<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, declared_len: bytes.len() }
    }

    pub fn with_declared_len(bytes: &'a [u8], declared_len: usize) -> Self {
        Self { bytes, declared_len }
    }
}

/// An action reference, resolved from `/A` or `/Dest`. Nothing here is ever
/// evaluated; the variants only name what the document would do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Uri(String),
    Script,
    Launch,
    SubmitForm,
    /// `/GoTo`, `/Named`, or a bare `/Dest`.
    InternalNavigation,
    /// Any other `/S` type, or an action dictionary that could not be read.
    Unknown(String),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Uri(_) => ActionKind::Uri,
            Action::Script => ActionKind::Script,
            Action::Launch => ActionKind::Launch,
            Action::SubmitForm => ActionKind::SubmitForm,
            Action::InternalNavigation => ActionKind::InternalNavigation,
            Action::Unknown(_) => ActionKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Uri,
    Script,
    Launch,
    SubmitForm,
    InternalNavigation,
    Unknown,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Uri => "uri",
            ActionKind::Script => "script",
            ActionKind::Launch => "launch",
            ActionKind::SubmitForm => "submit_form",
            ActionKind::InternalNavigation => "internal_navigation",
            ActionKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Link carries at most one action by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Link { action: Option<Action> },
    Widget { action: Option<Action> },
    Other { subtype: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuspicionReason {
    #[serde(rename = "raw IP address host")]
    RawIpHost,
    #[serde(rename = "suspicious top-level domain")]
    SuspiciousTld,
    #[serde(rename = "link targets an executable file type")]
    ExecutableTarget,
}

impl SuspicionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuspicionReason::RawIpHost => "raw IP address host",
            SuspicionReason::SuspiciousTld => "suspicious top-level domain",
            SuspicionReason::ExecutableTarget => "link targets an executable file type",
        }
    }
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    /// 1-based.
    pub page_index: usize,
    pub suspicious: bool,
    pub reason: Option<SuspicionReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFindings {
    pub has_script_action: bool,
    pub has_open_action: bool,
    pub has_launch_action: bool,
    pub has_submit_form_action: bool,
    /// Insertion-ordered, duplicates collapsed.
    pub embedded_file_names: IndexSet<String>,
    pub links: Vec<ExtractedLink>,
    /// Best-effort kind of the catalog open action. Informational only.
    pub open_action_kind: Option<ActionKind>,
}

impl AnalysisFindings {
    pub fn suspicious_links(&self) -> impl Iterator<Item = &ExtractedLink> {
        self.links.iter().filter(|l| l.suspicious)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

pub const LOW_THRESHOLD: u8 = 1;
pub const MEDIUM_THRESHOLD: u8 = 30;
pub const HIGH_THRESHOLD: u8 = 70;
pub const CRITICAL_THRESHOLD: u8 = 90;

impl RiskLevel {
    /// Total over `u8`; anything above 100 lands in `Critical`.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= CRITICAL_THRESHOLD => RiskLevel::Critical,
            s if s >= HIGH_THRESHOLD => RiskLevel::High,
            s if s >= MEDIUM_THRESHOLD => RiskLevel::Medium,
            s if s >= LOW_THRESHOLD => RiskLevel::Low,
            _ => RiskLevel::Safe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub risk_level: RiskLevel,
    pub score: u8,
    pub findings: AnalysisFindings,
    pub logs: Vec<String>,
    /// Some page failed, a budget ran out, or the structure had to be recovered.
    pub partial: bool,
    pub pages_scanned: usize,
}

impl AnalysisResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
