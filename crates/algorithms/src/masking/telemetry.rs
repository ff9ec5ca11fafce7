//! Progress and warning reporting
//!
//! The classifier never logs directly. Every stage boundary and every
//! recoverable problem goes through a [`Telemetry`] handed in by the caller.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Pipeline stage, as reported to [`Telemetry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prepare,
    Spectral,
    PotentialCloud,
    Probability,
    Commission,
    SnowWater,
    Shadow,
    Assemble,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Spectral => "spectral",
            Stage::PotentialCloud => "potential_cloud",
            Stage::Probability => "probability",
            Stage::Commission => "commission",
            Stage::SnowWater => "snow_water",
            Stage::Shadow => "shadow",
            Stage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recoverable problem; the run continues with reduced information.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An auxiliary layer was requested but is absent, misaligned or empty, and is ignored
    DegradedAuxiliary { layer: &'static str, reason: String },
    /// The sun is at or below the horizon; no shadow can be projected
    Geometry { sun_elevation: f64 },
    /// Too few clear-sky pixels to calibrate the probability model
    TooFewClearPixels { clear: usize, required: usize },
    /// Cloud covers nearly the whole scene; shadow matching was skipped
    HighCloudCover { cloud_fraction: f64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DegradedAuxiliary { layer, reason } => {
                write!(f, "{} layer ignored: {}", layer, reason)
            }
            Warning::Geometry { sun_elevation } => {
                write!(f, "sun elevation {:.2} deg is not above the horizon; shadows not matched", sun_elevation)
            }
            Warning::TooFewClearPixels { clear, required } => write!(
                f,
                "only {} clear-sky pixels (more than {} needed); scene treated as cloudy",
                clear, required
            ),
            Warning::HighCloudCover { cloud_fraction } => write!(
                f,
                "cloud cover {:.1}% of valid pixels; shadows not matched",
                cloud_fraction * 100.0
            ),
        }
    }
}

/// Observer for a classification run.
pub trait Telemetry: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}

    /// Free-form diagnostic such as a derived threshold
    fn detail(&self, _stage: Stage, _message: &str) {}

    fn warning(&self, warning: &Warning);
}

/// Forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn stage_started(&self, stage: Stage) {
        tracing::debug!(stage = stage.name(), "stage started");
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        tracing::debug!(
            stage = stage.name(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "stage finished"
        );
    }

    fn detail(&self, stage: Stage, message: &str) {
        tracing::debug!(stage = stage.name(), "{}", message);
    }

    fn warning(&self, warning: &Warning) {
        tracing::warn!("{}", warning);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn warning(&self, _warning: &Warning) {}
}
