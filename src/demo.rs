//! The four timing scenarios.
//!
//! Each scenario opens a caller scope with the default timeout and a fresh
//! [`TraceId`], then runs the simulated API call against:
//!
//! | Scenario | Context passed to the call |
//! |---|---|
//! | `default` | the caller scope itself |
//! | `detached` | `detach(scope)` |
//! | `detached-short` | `with_timeout(detach(scope), short_extension)` |
//! | `detached-long` | `with_timeout(detach(scope), long_extension)` |

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time::Instant;
use tracing::Instrument;

use crate::api::SimulatedApi;
use crate::config::DemoConfig;
use crate::context::{ContextRef, background, detach, with_timeout, with_value};
use crate::error::{Error, Result};
use crate::trace::TraceId;

/// Which context the simulated call runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// The caller's deadline-bound context.
    Default,
    /// The caller's context, detached.
    Detached,
    /// Detached, with an extended deadline shorter than the call.
    DetachedShort,
    /// Detached, with an extended deadline longer than the call.
    DetachedLong,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Default,
        Scenario::Detached,
        Scenario::DetachedShort,
        Scenario::DetachedLong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Default => "default",
            Scenario::Detached => "detached",
            Scenario::DetachedShort => "detached-short",
            Scenario::DetachedLong => "detached-long",
        }
    }

    /// The extended deadline layered on the detached context, if any.
    pub fn extension(&self, config: &DemoConfig) -> Option<Duration> {
        match self {
            Scenario::Default | Scenario::Detached => None,
            Scenario::DetachedShort => Some(config.short_extension),
            Scenario::DetachedLong => Some(config.long_extension),
        }
    }

    /// The banner printed before the scenario runs.
    pub fn description(&self, config: &DemoConfig) -> String {
        match self {
            Scenario::Default => format!(
                "...executing API call with default timeout ({:?}) context...",
                config.default_timeout
            ),
            Scenario::Detached => format!(
                "...executing API call with default timeout ({:?}) but detached context...",
                config.default_timeout
            ),
            Scenario::DetachedShort | Scenario::DetachedLong => format!(
                "...executing API call with extended timeout ({:?}) and detached context...",
                self.extension(config).unwrap_or_default()
            ),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one scenario produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub description: String,
    /// The API response, or the context error text.
    pub outcome: String,
    pub succeeded: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub trace_id: TraceId,
}

impl ScenarioReport {
    /// Two-line text form: outcome, then elapsed time.
    pub fn render_text(&self) -> String {
        format!("{}\ntook {:?}", self.outcome, self.elapsed)
    }
}

fn serialize_millis<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// The line printed once before all scenarios.
pub fn setup_line(config: &DemoConfig) -> String {
    format!("Setup: API call takes {:?} to execute", config.api_latency)
}

/// Runs one scenario to completion.
///
/// Context errors are part of the report, not failures; only an invalid
/// configuration or a lost worker is returned as `Err`.
pub async fn run_scenario(config: &DemoConfig, scenario: Scenario) -> Result<ScenarioReport> {
    config.validate()?;

    let trace_id = TraceId::new();
    let span = tracing::info_span!("scenario", scenario = %scenario, trace_id = %trace_id);
    execute(config, scenario, trace_id).instrument(span).await
}

async fn execute(
    config: &DemoConfig,
    scenario: Scenario,
    trace_id: TraceId,
) -> Result<ScenarioReport> {
    let root = with_value(&background(), trace_id.clone());
    let (scope, _scope_guard) = with_timeout(&root, config.default_timeout);
    let api = SimulatedApi::new(config.api_latency);

    let start = Instant::now();
    let result = match scenario {
        Scenario::Default => api.call(&scope).await,
        Scenario::Detached => api.call(&detach(&scope)).await,
        Scenario::DetachedShort => call_with_extension(&api, &scope, config.short_extension).await,
        Scenario::DetachedLong => call_with_extension(&api, &scope, config.long_extension).await,
    };
    let elapsed = start.elapsed();

    let (outcome, succeeded) = match result {
        Ok(response) => (response, true),
        Err(Error::Context(e)) => (e.to_string(), false),
        Err(e) => return Err(e),
    };

    tracing::info!(
        succeeded,
        elapsed_ms = elapsed.as_millis() as u64,
        outcome = %outcome,
        "scenario finished"
    );

    Ok(ScenarioReport {
        scenario,
        description: scenario.description(config),
        outcome,
        succeeded,
        elapsed,
        trace_id,
    })
}

/// Detaches `scope` and bounds the call by a fresh `extension` deadline.
async fn call_with_extension(
    api: &SimulatedApi,
    scope: &ContextRef,
    extension: Duration,
) -> Result<String> {
    let (extended, _guard) = with_timeout(&detach(scope), extension);
    api.call(&extended).await
}

/// Runs `scenarios` one after another.
pub async fn run_all(config: &DemoConfig, scenarios: &[Scenario]) -> Result<Vec<ScenarioReport>> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        reports.push(run_scenario(config, *scenario).await?);
    }
    Ok(reports)
}
