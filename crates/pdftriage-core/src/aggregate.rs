use tracing::{debug, info};

use crate::model::{AnalysisFindings, AnalysisResult, RiskLevel, SuspicionReason};
use crate::scan::ScanOutput;

pub const SCRIPT_WEIGHT: u32 = 50;
pub const LAUNCH_WEIGHT: u32 = 100;
pub const OPEN_ACTION_WEIGHT: u32 = 20;
pub const EMBEDDED_FILE_WEIGHT: u32 = 30;
/// Charged once per suspicious link.
pub const SUSPICIOUS_LINK_WEIGHT: u32 = 20;
/// Charged once if any suspicious link points at a raw IP host.
pub const RAW_IP_BONUS: u32 = 40;
pub const MAX_SCORE: u8 = 100;

/// Deterministic, bounded score for a set of findings. Every term is
/// non-negative, so adding a signal never lowers the result.
pub fn score(findings: &AnalysisFindings) -> u8 {
    let mut total: u32 = 0;
    if findings.has_script_action {
        total += SCRIPT_WEIGHT;
    }
    if findings.has_launch_action {
        total += LAUNCH_WEIGHT;
    }
    if findings.has_open_action {
        total += OPEN_ACTION_WEIGHT;
    }
    if !findings.embedded_file_names.is_empty() {
        total += EMBEDDED_FILE_WEIGHT;
    }
    let suspicious = findings.suspicious_links().count();
    total = total.saturating_add(SUSPICIOUS_LINK_WEIGHT.saturating_mul(u32::try_from(suspicious).unwrap_or(u32::MAX)));
    if findings.suspicious_links().any(|l| l.reason == Some(SuspicionReason::RawIpHost)) {
        total = total.saturating_add(RAW_IP_BONUS);
    }
    total.min(u32::from(MAX_SCORE)) as u8
}

/// Folds scanner output into the final result. Log order: catalog, script
/// table, pages, embedded files, partial-scan notes, summary.
pub fn aggregate(output: ScanOutput) -> AnalysisResult {
    let mut findings = AnalysisFindings::default();
    let mut logs = Vec::new();
    let mut partial = false;

    if let Some(open) = output.open_action {
        findings.has_open_action = true;
        findings.open_action_kind = Some(open.kind);
        logs.push(format!("catalog: automatic open action ({})", open.kind));
    }
    if output.script_count > 0 {
        findings.has_script_action = true;
        logs.push(format!("document: {} embedded script(s)", output.script_count));
    }

    let mut pages_scanned = 0;
    for page in output.pages {
        match page {
            Ok(page) => {
                pages_scanned += 1;
                findings.has_script_action |= page.has_script_action;
                findings.has_launch_action |= page.has_launch_action;
                findings.has_submit_form_action |= page.has_submit_form_action;
                findings.links.extend(page.links);
                logs.extend(page.logs);
            }
            Err(err) => {
                partial = true;
                logs.push(format!("{err}; page skipped"));
            }
        }
    }

    for name in output.embedded_files {
        if findings.embedded_file_names.insert(name.clone()) {
            logs.push(format!("embedded file: {name}"));
        }
    }
    for note in &output.notes {
        partial = true;
        logs.push(format!("partial scan: {note}"));
    }

    let score = score(&findings);
    let risk_level = RiskLevel::from_score(score);
    logs.push(format!("risk: {risk_level} (score {score})"));
    debug!(links = findings.links.len(), log_lines = logs.len(), "Aggregated findings");
    info!(score, risk = %risk_level, partial, "Analysis complete");

    AnalysisResult { risk_level, score, findings, logs, partial, pages_scanned }
}
