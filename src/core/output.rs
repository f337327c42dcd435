//! Compact output rendering helpers for CLI surfaces.
//!
//! Keeps command result output bounded and readable while preserving signal.

use crate::core::consensus::{ConsensusReport, HealthBand};
use crate::core::drift::ReportDrift;
use crate::core::gate::ComplianceDecision;
use crate::core::probe::ProbeStatus;
use crate::core::store::HistoryEntry;
use crate::core::time;
use colored::Colorize;
use std::fmt::Write;

const VALUE_WIDTH: usize = 72;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Render up to `max_items` messages with compact formatting.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let shown = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    if messages.len() > max_items {
        format!("{} (+{} more)", shown, messages.len() - max_items)
    } else {
        shown
    }
}

fn band(score: f64) -> colored::ColoredString {
    let text = format!("{:.2} ({})", score, HealthBand::from_score(score));
    match HealthBand::from_score(score) {
        HealthBand::Excellent => text.bright_green().bold(),
        HealthBand::Good => text.green(),
        HealthBand::Warning => text.bright_yellow(),
        HealthBand::Critical => text.bright_red().bold(),
    }
}

fn status(status: ProbeStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        ProbeStatus::Ok => text.bright_green(),
        ProbeStatus::Timeout | ProbeStatus::Skipped => text.bright_yellow(),
        ProbeStatus::Unavailable | ProbeStatus::Invalid => text.bright_red(),
    }
}

pub fn render_report(report: &ConsensusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} {}",
        "▸".bright_cyan(),
        "report".bright_white().bold(),
        report.report_id().bright_black()
    );
    let _ = writeln!(out, "  created   {}", time::epoch_z(report.created_at()));
    let _ = writeln!(out, "  score     {}", band(report.score()));
    let _ = writeln!(
        out,
        "  facts     {}/{} agree",
        report.agreeing_facts(),
        report.resolved().len()
    );
    if report.partial() {
        let _ = writeln!(out, "  {}", "partial: some probes did not finish".bright_yellow());
    }
    if report.condition().is_some() {
        let _ = writeln!(out, "  {}", "no data available".bright_red().bold());
    }

    let _ = writeln!(out, "\n{}", "sources".bright_white().bold());
    for source in report.sources() {
        let confidence = source
            .confidence
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<14} {:<11} {:<12} conf {:<5} {}ms",
            source.source,
            source.kind.bright_black(),
            status(source.status),
            confidence,
            source.elapsed_ms
        );
        if let Some(err) = &source.error {
            let _ = writeln!(out, "    {}", compact_line(err, VALUE_WIDTH).bright_black());
        }
        if !source.limitations.is_empty() {
            let _ = writeln!(
                out,
                "    {} {}",
                "limits:".bright_black(),
                preview_messages(&source.limitations, 3, 40).bright_black()
            );
        }
    }

    if !report.resolved().is_empty() {
        let _ = writeln!(out, "\n{}", "facts".bright_white().bold());
        for (name, fact) in report.resolved() {
            let marker = if fact.agreed {
                "✓".bright_green()
            } else {
                "≠".bright_yellow()
            };
            let _ = writeln!(
                out,
                "  {} {:<28} {} {}",
                marker,
                name,
                compact_line(&fact.value.to_string(), VALUE_WIDTH),
                format!("[{}]", fact.source).bright_black()
            );
        }
    }

    if !report.conflicts().is_empty() {
        let _ = writeln!(out, "\n{}", "conflicts".bright_yellow().bold());
        for conflict in report.conflicts() {
            let values = conflict
                .values
                .iter()
                .map(|v| format!("{}={}", v.source, compact_line(&v.value.to_string(), 32)))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "  {} {} (resolved from {})",
                conflict.fact.bright_white(),
                values,
                conflict.resolved_source.bright_cyan()
            );
        }
    }
    out
}

pub fn render_decision(decision: &ComplianceDecision) -> String {
    let mut out = String::new();
    if decision.allowed {
        let _ = writeln!(out, "{} {}", "✓".bright_green(), "ALLOW".bright_green().bold());
        return out;
    }
    let _ = writeln!(out, "{} {}", "✗".bright_red(), "DENY".bright_red().bold());
    for violation in &decision.violations {
        let _ = writeln!(out, "  {} {}", "▸".bright_red(), violation);
        let _ = writeln!(out, "    {}", violation.remediation.bright_black());
    }
    out
}

pub fn render_drift(drift: &ReportDrift) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} → {}",
        "▸".bright_cyan(),
        drift.from.bright_black(),
        drift.to.bright_black()
    );
    let _ = writeln!(
        out,
        "  score {:+.2}  conflicts {:+}",
        drift.score_delta, drift.conflict_delta
    );
    if drift.is_empty() {
        let _ = writeln!(out, "  {}", "no fact drift".bright_green());
        return out;
    }
    for fact in &drift.added {
        let _ = writeln!(out, "  {} {}", "+".bright_green(), fact);
    }
    for fact in &drift.removed {
        let _ = writeln!(out, "  {} {}", "-".bright_red(), fact);
    }
    for change in &drift.changed {
        let _ = writeln!(
            out,
            "  {} {}: {} → {}",
            "~".bright_yellow(),
            change.fact,
            compact_line(&change.before.to_string(), 32),
            compact_line(&change.after.to_string(), 32)
        );
    }
    out
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        let _ = writeln!(out, "{}", "no runs recorded".bright_black());
        return out;
    }
    for entry in entries {
        let _ = writeln!(
            out,
            "  {}  {}  {}  facts {:<4} conflicts {:<3} failed {}{}",
            entry.report_id.bright_black(),
            time::epoch_z(entry.created_at),
            band(entry.score),
            entry.fact_count,
            entry.conflict_count,
            entry.failed_sources,
            if entry.partial { "  partial".bright_yellow() } else { "".normal() }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consensus::{Aggregator, ScoringMode};
    use crate::core::gate::{GateThresholds, evaluate};
    use crate::core::observation::Observation;
    use crate::core::trust::TrustHierarchy;
    use crate::facts;

    #[test]
    fn compact_line_bounds_output() {
        assert_eq!(compact_line("a\n  b   c", 10), "a b c");
        assert_eq!(compact_line("abcdef", 3), "abc...");
        assert_eq!(
            preview_messages(&["x".into(), "y".into(), "z".into()], 2, 5),
            "x | y (+1 more)"
        );
    }

    #[test]
    fn report_and_decision_render_key_lines() {
        colored::control::set_override(false);
        let trust = TrustHierarchy::new(["a", "b"]).unwrap();
        let report = Aggregator::new(trust, ScoringMode::Unweighted).aggregate(
            "r1",
            &[
                Observation::new("a", facts! { "branch" => "main" }, 1.0, 0).unwrap(),
                Observation::new("b", facts! { "branch" => "dev" }, 1.0, 0).unwrap(),
            ],
            vec![],
            false,
            0,
        );
        let text = render_report(&report);
        assert!(text.contains("0.00 (critical)"));
        assert!(text.contains("resolved from a"));
        assert!(text.contains("0/1 agree"));

        let decision = evaluate(Some(&report), &GateThresholds::default(), 10);
        let text = render_decision(&decision);
        assert!(text.contains("DENY"));
        assert!(text.contains("Score below threshold"));
    }
}
