//! Output formatting for mission reports and verdicts

use anyhow::Result;
use hive_common::{Finding, MissionReport, MissionReporter};
use hive_threat::ThreatVerdict;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    /// Unknown names fall back to text with a warning.
    pub fn parse(format: &str) -> Self {
        let format = format.trim().to_lowercase();
        match format.as_str() {
            "json" | "j" => OutputFormat::Json,
            "csv" | "c" => OutputFormat::Csv,
            "table" | "text" | "t" | "" => OutputFormat::Text,
            _ => {
                eprintln!("Warning: Unknown format '{}', using default text format", format);
                OutputFormat::Text
            }
        }
    }
}

/// Prints the mission report on stdout when the mission ends.
pub struct ConsoleReporter {
    format: OutputFormat,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl MissionReporter for ConsoleReporter {
    fn report(&self, report: &MissionReport) -> Result<()> {
        let rendered = match self.format {
            OutputFormat::Text => render_text(report),
            OutputFormat::Json => render_json(report)?,
            OutputFormat::Csv => render_csv(report),
        };
        print!("{}", rendered);
        Ok(())
    }
}

pub fn print_verdict(verdict: &ThreatVerdict) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(verdict)?);
    Ok(())
}

/// Findings by severity (most severe first), then by URL.
fn sorted_findings(report: &MissionReport) -> Vec<&Finding> {
    let mut findings: Vec<&Finding> = report.findings.iter().collect();
    findings.sort_by(|a, b| {
        a.vulnerability
            .severity
            .cmp(&b.vulnerability.severity)
            .then_with(|| a.url.cmp(&b.url))
    });
    findings
}

fn render_text(report: &MissionReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{:-<96}\n", ""));
    out.push_str(&format!(
        "{:<10} {:<12} {:<22} {:<50}\n",
        "SEVERITY", "WORKER", "FINDING", "URL"
    ));
    out.push_str(&format!("{:-<96}\n", ""));

    let findings = sorted_findings(report);
    if findings.is_empty() {
        out.push_str("No confirmed findings.\n");
    }
    for finding in findings {
        out.push_str(&format!(
            "{:<10} {:<12} {:<22} {:<50}\n",
            finding.vulnerability.severity.as_str(),
            finding.worker.as_str(),
            truncate(&finding.vulnerability.name, 22),
            truncate(&finding.url, 50)
        ));
    }

    out.push_str(&format!("{:-<96}\n", ""));
    out.push_str("\nSummary:\n");
    out.push_str(&format!("  Target: {}\n", report.target_url));
    out.push_str(&format!("  Mission: {}\n", report.mission_id));
    out.push_str(&format!(
        "  Jobs: {} assigned, {} completed, {} failed, {} throttled\n",
        report.jobs.assigned, report.jobs.completed, report.jobs.failed, report.jobs.throttled
    ));
    for (severity, count) in &report.severity_counts {
        out.push_str(&format!("  {}: {}\n", severity, count));
    }
    out.push_str(&format!("  Events: {}\n", report.events.len()));
    out.push_str(&format!("  Duration: {}\n\n", format_duration(report.duration)));
    out
}

fn render_json(report: &MissionReport) -> Result<String> {
    let output = json!({
        "mission_info": {
            "mission_id": report.mission_id,
            "target": report.target_url,
            "started_at": report.started_at,
            "duration_seconds": report.duration.as_secs_f64(),
            "duration_formatted": format_duration(report.duration),
            "events": report.events.len(),
        },
        "jobs": report.jobs,
        "severity_counts": report.severity_counts,
        "findings": sorted_findings(report),
    });
    Ok(format!("{}\n", serde_json::to_string_pretty(&output)?))
}

fn render_csv(report: &MissionReport) -> String {
    let mut out = String::from("severity,finding,worker,url,risk_score,evidence\n");
    for finding in sorted_findings(report) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            finding.vulnerability.severity,
            csv_field(&finding.vulnerability.name),
            finding.worker,
            csv_field(&finding.url),
            finding.risk_score.map(|s| s.to_string()).unwrap_or_default(),
            csv_field(&finding.vulnerability.evidence)
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    let escaped = value.replace('"', "\"\"").replace('\n', " ").replace('\r', "");
    format!("\"{}\"", escaped)
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let head: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}
