//! Command-line interface for the detachment demonstration.

use std::io::Write;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::DemoConfig;
use crate::demo::{self, Scenario, ScenarioReport};

/// How reports are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Banner, outcome and elapsed time per scenario.
    Text,
    /// One JSON object per scenario.
    Json,
}

/// Shows how a detached context outlives its caller's deadline.
#[derive(Parser, Debug)]
#[command(name = "detached-context", version, about)]
pub struct Cli {
    /// Run a single scenario instead of all four
    #[arg(long, value_enum)]
    pub scenario: Option<Scenario>,

    /// Output format
    #[arg(long, value_enum, default_value = "text", env = "DETACH_OUTPUT_FORMAT")]
    pub format: OutputFormat,

    /// Caller scope deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Simulated API latency in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Insufficient extended deadline in milliseconds
    #[arg(long)]
    pub short_ms: Option<u64>,

    /// Sufficient extended deadline in milliseconds
    #[arg(long)]
    pub long_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Applies command-line overrides on top of `config`.
    pub fn apply(&self, mut config: DemoConfig) -> DemoConfig {
        if let Some(ms) = self.timeout_ms {
            config = config.default_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.latency_ms {
            config = config.api_latency(Duration::from_millis(ms));
        }
        if let Some(ms) = self.short_ms {
            config = config.short_extension(Duration::from_millis(ms));
        }
        if let Some(ms) = self.long_ms {
            config = config.long_extension(Duration::from_millis(ms));
        }
        config
    }

    /// The scenarios selected on the command line.
    pub fn scenarios(&self) -> Vec<Scenario> {
        match self.scenario {
            Some(scenario) => vec![scenario],
            None => Scenario::ALL.to_vec(),
        }
    }

    /// Loads configuration, runs the selected scenarios and prints the reports.
    pub async fn run(&self) -> anyhow::Result<()> {
        let config = self.apply(DemoConfig::from_env()?);
        config.validate()?;

        let mut out = std::io::stdout();
        if self.format == OutputFormat::Text {
            writeln!(out, "{}", demo::setup_line(&config))?;
        }

        for scenario in self.scenarios() {
            if self.format == OutputFormat::Text {
                writeln!(out, "\n{}", scenario.description(&config))?;
                out.flush()?;
            }
            let report = demo::run_scenario(&config, scenario).await?;
            write_report(&mut out, &report, self.format)?;
        }
        Ok(())
    }
}

/// Writes one report in the chosen format.
pub fn write_report(
    out: &mut impl Write,
    report: &ScenarioReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", report.render_text())?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(report)?)?,
    }
    Ok(())
}
