//! A single load-test iteration and the virtual users that repeat it.
//!
//! Every iteration walks the same steps:
//!
//! 1. *Setup*: draw an address and an endpoint and assemble the request.
//! 2. *Dispatch*: `POST` the JSON payload to `{host}{endpoint}`.
//! 3. *Validate*: check the status code and that the response lists at least one entry.
//! 4. *Record*: count and log errors that prevented validation.
//! 5. *Idle*: pause, then hand control back to whoever drives the virtual user.
//!
//! Failed checks and errors never abort an iteration or the virtual user. They only show up in
//! the [`MetricsSink`] and in the logs; judging the run is up to the harness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::http::{HttpResponse, Transport, TransportError};
use crate::metrics::{EXCEPTION, ITERATIONS, MetricsSink};
use crate::target::{Endpoint, PoolError, TargetSelector};

/// The JSON payload of a list request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestParameters {
    /// Page size.
    pub row: u32,
    /// Page offset.
    pub page: u32,
    /// The account to list entries for.
    pub address: String,
}

impl RequestParameters {
    /// The request body.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "row": self.row,
            "page": self.page,
            "address": self.address,
        })
    }
}

/// Everything needed to dispatch one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Setup {
    /// Full request URL.
    pub url: String,
    /// The selected endpoint.
    pub endpoint: Endpoint,
    /// The request payload.
    pub params: RequestParameters,
}

impl Setup {
    fn status_check_name(&self) -> String {
        format!(
            "[{}: {}] http code == OK",
            self.endpoint.path, self.params.address
        )
    }

    fn shape_check_name(&self) -> String {
        format!(
            "[{}: {}] {} length > 0",
            self.endpoint.path, self.params.address, self.endpoint.field
        )
    }
}

/// Why a response did not contain a non-empty list.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ShapeFailure {
    /// The response has no `data` object.
    #[error("response has no `data` object")]
    MissingData,

    /// `data` lacks the expected list field.
    #[error("`data.{0}` is missing")]
    MissingField(String),

    /// The expected field is present but not a list.
    #[error("`data.{0}` is not a list")]
    NotAList(String),

    /// The list is empty.
    #[error("`data.{0}` is empty")]
    Empty(String),
}

/// Checks that `data.{field}` of a response body is a non-empty list.
///
/// Returns the number of entries in the list.
pub fn check_shape(body: &Value, field: &str) -> Result<usize, ShapeFailure> {
    let data = body
        .get("data")
        .filter(|data| data.is_object())
        .ok_or(ShapeFailure::MissingData)?;
    let list = data
        .get(field)
        .ok_or_else(|| ShapeFailure::MissingField(field.to_owned()))?
        .as_array()
        .ok_or_else(|| ShapeFailure::NotAList(field.to_owned()))?;

    match list.len() {
        0 => Err(ShapeFailure::Empty(field.to_owned())),
        len => Ok(len),
    }
}

/// An error that prevented an iteration from validating its response.
///
/// Unlike failed checks, these are counted as exceptions.
#[derive(Debug, Error)]
pub enum IterationError {
    /// No response was received.
    #[error(transparent)]
    Network(#[from] TransportError),

    /// The response body is not valid JSON.
    #[error("invalid JSON response: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// The outcome of a single named check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckResult {
    /// The check name, including endpoint and address.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
}

/// Everything that happened during one iteration.
#[derive(Debug)]
pub struct IterationReport {
    /// The request that was sent.
    pub setup: Setup,
    /// All evaluated checks, in evaluation order.
    pub checks: Vec<CheckResult>,
    /// The error that was counted as an exception, if any.
    pub error: Option<IterationError>,
    /// Time until the response was fully read, if one was received.
    pub duration: Option<Duration>,
}

impl IterationReport {
    /// Whether all checks were evaluated and passed without error.
    pub fn passed(&self) -> bool {
        self.error.is_none() && !self.checks.is_empty() && self.checks.iter().all(|c| c.passed)
    }
}

/// One simulated client repeating the scenario.
///
/// A virtual user owns its RNG, so two users created with the same seed draw the same targets.
#[derive(Debug)]
pub struct VirtualUser {
    id: u64,
    iteration: u64,
    rng: SmallRng,
}

impl VirtualUser {
    /// Creates a virtual user with a seeded RNG.
    pub fn new(id: u64, seed: u64) -> Self {
        Self {
            id,
            iteration: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// The virtual user's identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The number of iterations this user has completed.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }
}

/// A builder for creating a [`Scenario`].
#[derive(Debug)]
pub struct ScenarioBuilder {
    host: String,
    hard_mode: bool,
    row: u32,
    page: u32,
    think_time: Duration,
    selector: TargetSelector,
}

impl ScenarioBuilder {
    /// Draw addresses from the high-volume pool.
    pub fn hard_mode(mut self, hard_mode: bool) -> Self {
        self.hard_mode = hard_mode;
        self
    }

    /// Page size and offset sent with every request.
    pub fn page(mut self, row: u32, page: u32) -> Self {
        self.row = row;
        self.page = page;
        self
    }

    /// Pause at the end of every iteration.
    pub fn think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    /// Pools to draw targets from.
    pub fn selector(mut self, selector: TargetSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Creates the scenario, sending through `transport` and reporting to `sink`.
    pub fn build(self, transport: Arc<dyn Transport>, sink: Arc<dyn MetricsSink>) -> Scenario {
        Scenario {
            host: self.host.trim_end_matches('/').to_owned(),
            hard_mode: self.hard_mode,
            row: self.row,
            page: self.page,
            think_time: self.think_time,
            selector: self.selector,
            transport,
            sink,
        }
    }
}

/// The iteration body shared by all virtual users.
#[derive(Debug)]
pub struct Scenario {
    host: String,
    hard_mode: bool,
    row: u32,
    page: u32,
    think_time: Duration,
    selector: TargetSelector,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn MetricsSink>,
}

impl Scenario {
    /// Constructs a new scenario builder targeting `host`.
    pub fn builder(host: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder {
            host: host.into(),
            hard_mode: false,
            row: 10,
            page: 0,
            think_time: Duration::ZERO,
            selector: TargetSelector::default(),
        }
    }

    /// Creates a scenario from configuration.
    ///
    /// Fails if the configured pools are empty.
    pub fn from_config(
        config: &Config,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self, PoolError> {
        let selector = TargetSelector::new(
            config.addresses.standard.clone(),
            config.addresses.high_volume.clone(),
            config.endpoints.clone(),
        )?;

        Ok(Self::builder(config.host.as_str())
            .hard_mode(config.hard_mode)
            .page(config.scenario.row, config.scenario.page)
            .think_time(config.scenario.think_time)
            .selector(selector)
            .build(transport, sink))
    }

    /// Draws the targets for the next request.
    pub fn setup<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Setup {
        let address = self.selector.select_address(rng, self.hard_mode).to_owned();
        let endpoint = self.selector.select_endpoint(rng).clone();

        Setup {
            url: format!("{}{}", self.host, endpoint.path),
            endpoint,
            params: RequestParameters {
                row: self.row,
                page: self.page,
                address,
            },
        }
    }

    /// Runs one full iteration for `user`.
    ///
    /// This never fails: errors are counted as [`EXCEPTION`]s, logged, and returned as part of
    /// the report.
    pub async fn iterate(&self, user: &mut VirtualUser) -> IterationReport {
        let setup = self.setup(&mut user.rng);
        let mut checks = Vec::with_capacity(2);

        let start = Instant::now();
        let (duration, result) = match self
            .transport
            .post_json(&setup.url, &setup.params.to_json())
            .await
        {
            Ok(response) => {
                let duration = start.elapsed();
                let result = self.validate(&setup, &response, &mut checks);
                (Some(duration), result)
            }
            Err(err) => (None, Err(err.into())),
        };

        let error = result.err();
        if let Some(ref err) = error {
            self.sink.increment(EXCEPTION);
            tracing::error!(
                user = user.id,
                iteration = user.iteration,
                address = %setup.params.address,
                endpoint = %setup.endpoint.path,
                error = err as &dyn std::error::Error,
                "iteration failed"
            );
        }

        self.sink.increment(ITERATIONS);
        user.iteration += 1;

        self.idle().await;

        IterationReport {
            setup,
            checks,
            error,
            duration,
        }
    }

    fn validate(
        &self,
        setup: &Setup,
        response: &HttpResponse,
        checks: &mut Vec<CheckResult>,
    ) -> Result<(), IterationError> {
        self.record_check(
            checks,
            setup.status_check_name(),
            response.status == StatusCode::OK,
        );

        let body = match serde_json::from_slice::<Value>(&response.body) {
            Ok(body) => body,
            Err(err) => {
                self.record_check(checks, setup.shape_check_name(), false);
                return Err(err.into());
            }
        };

        let shape = check_shape(&body, &setup.endpoint.field);
        if let Err(ref reason) = shape {
            tracing::warn!(
                status = response.status.as_u16(),
                address = %setup.params.address,
                endpoint = %setup.endpoint.path,
                %reason,
                "unexpected response shape"
            );
        }
        self.record_check(checks, setup.shape_check_name(), shape.is_ok());

        Ok(())
    }

    fn record_check(&self, checks: &mut Vec<CheckResult>, name: String, passed: bool) {
        self.sink.check(&name, passed);
        checks.push(CheckResult { name, passed });
    }

    async fn idle(&self) {
        if self.think_time.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.think_time).await;
        }
    }
}
