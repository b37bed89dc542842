// runner.rs
use anyhow::{anyhow, Context, Result};
use hive_common::MissionConfig;
use hive_orchestrator::SwarmOrchestrator;
use hive_threat::{ThreatInput, ThreatScoringEngine};
use hive_workers::Arsenal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::output::{print_verdict, ConsoleReporter, OutputFormat};

pub async fn run_mission(
    target: String,
    timeout: Option<u64>,
    preset: String,
    config: Option<PathBuf>,
    output_format: String,
) -> Result<()> {
    let target = normalize_target(&target)?;
    let format = OutputFormat::parse(&output_format);

    let source = config
        .as_ref()
        .map_or_else(|| format!("preset {}", preset), |p| p.display().to_string());
    let mut config = match &config {
        Some(path) => MissionConfig::load(path)
            .with_context(|| format!("Failed to load mission config {}", path.display()))?,
        None => MissionConfig::preset(&preset)?,
    };
    if let Some(secs) = timeout {
        config.mission_timeout_secs = secs;
    }

    info!("Starting mission...");
    info!("Target: {}", target);
    info!("Config: {}", source);
    info!("Timeout: {}s", config.mission_timeout_secs);

    let orchestrator = SwarmOrchestrator::new(config)
        .with_arsenal(Arsenal::dry_run())
        .with_reporter(Arc::new(ConsoleReporter::new(format)));

    orchestrator
        .run_until(&target, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Mission failed to start")?;
    Ok(())
}

pub fn run_analyze(
    text: Option<String>,
    domain: Option<String>,
    hidden: bool,
    element: Option<String>,
) -> Result<()> {
    let input = analyze_input(text, domain, hidden, element)?;
    let verdict = ThreatScoringEngine::new().analyze(&input);
    print_verdict(&verdict)
}

fn analyze_input(
    text: Option<String>,
    domain: Option<String>,
    hidden: bool,
    element: Option<String>,
) -> Result<ThreatInput> {
    let element = element
        .map(|raw| serde_json::from_str(&raw).context("--element is not valid JSON"))
        .transpose()?;
    if text.is_none() && domain.is_none() && element.is_none() && !hidden {
        return Err(anyhow!("Nothing to analyze: pass --text, --domain, --hidden or --element"));
    }
    Ok(ThreatInput {
        text,
        domain,
        hidden,
        element,
    })
}

/// Trims `raw` and adds `https://` when no scheme is given.
fn normalize_target(raw: &str) -> Result<String> {
    let target = raw.trim();
    if target.is_empty() {
        return Err(anyhow!("Empty target"));
    }
    if target.chars().any(char::is_whitespace) {
        return Err(anyhow!("Invalid target '{}': contains whitespace", target));
    }
    if target.contains("://") {
        Ok(target.to_string())
    } else {
        Ok(format!("https://{}", target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("shop.example/cart").unwrap(), "https://shop.example/cart");
        assert_eq!(normalize_target(" http://x.example ").unwrap(), "http://x.example");
        assert!(normalize_target("   ").is_err());
        assert!(normalize_target("a b.example").is_err());
    }

    #[test]
    fn test_analyze_input() {
        let input = analyze_input(None, Some("g00gle.com".into()), false, None).unwrap();
        assert_eq!(input.domain.as_deref(), Some("g00gle.com"));

        let input = analyze_input(None, None, false, Some(r#"{"style":{"opacity":"0"}}"#.into())).unwrap();
        assert!(input.element.is_some());

        assert!(analyze_input(None, None, false, None).is_err());
        assert!(analyze_input(None, None, false, Some("{not json".into())).is_err());
    }

    #[test]
    fn test_analyze_runs() {
        assert!(run_analyze(Some("hello world".into()), None, false, None).is_ok());
    }
}
