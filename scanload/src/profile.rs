//! The ramp profile and pass/fail thresholds of a load test.
//!
//! Neither is enforced here. They describe how the external harness should schedule virtual
//! users and judge the run, and can be exported in its options format with
//! [`harness_options`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One segment of the virtual-user ramp.
///
/// The harness moves linearly from the previous stage's target to this `target` over
/// `duration`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Stage {
    /// How long this stage lasts.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Number of concurrent virtual users at the end of the stage.
    pub target: u32,
}

impl Stage {
    /// Creates a stage.
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Ramp up to 30 users over a minute, hold for five minutes, ramp down over a minute.
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(60), 30),
        Stage::new(Duration::from_secs(5 * 60), 30),
        Stage::new(Duration::from_secs(60), 0),
    ]
}

/// Total run time of a ramp profile.
pub fn total_duration(stages: &[Stage]) -> Duration {
    stages.iter().map(|s| s.duration).sum()
}

/// Pass/fail conditions evaluated by the harness over the whole run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    /// Maximum share of failed HTTP requests.
    pub http_req_failed_rate: f64,

    /// Maximum 95th percentile request duration.
    #[serde(with = "humantime_serde")]
    pub http_req_duration_p95: Duration,

    /// Maximum share of iterations ending in an exception.
    pub exception_rate: f64,

    /// Whether the harness aborts the run as soon as the exception threshold is crossed.
    pub abort_on_exception: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            http_req_failed_rate: 0.01,
            http_req_duration_p95: Duration::from_millis(7000),
            exception_rate: 0.1,
            abort_on_exception: true,
        }
    }
}

/// Renders stages and thresholds as a harness options object.
///
/// ```json
/// {
///   "stages": [{ "duration": "1m", "target": 30 }],
///   "thresholds": {
///     "http_req_failed": ["rate<0.01"],
///     "http_req_duration": ["p(95)<7000"],
///     "exception": [{ "threshold": "rate<0.1", "abortOnFail": true }]
///   }
/// }
/// ```
pub fn harness_options(stages: &[Stage], thresholds: &Thresholds) -> Value {
    let stages: Vec<Value> = stages
        .iter()
        .map(|stage| {
            json!({
                "duration": humantime_serde::re::humantime::format_duration(stage.duration).to_string(),
                "target": stage.target,
            })
        })
        .collect();

    json!({
        "stages": stages,
        "thresholds": {
            "http_req_failed": [format!("rate<{}", thresholds.http_req_failed_rate)],
            "http_req_duration": [
                format!("p(95)<{}", thresholds.http_req_duration_p95.as_millis())
            ],
            "exception": [{
                "threshold": format!("rate<{}", thresholds.exception_rate),
                "abortOnFail": thresholds.abort_on_exception,
            }],
        },
    })
}
