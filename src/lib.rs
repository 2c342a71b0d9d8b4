//! # Stampede
//!
//! Stampede is a staged HTTP load generator. It ramps a population of virtual users
//! up and down through a list of stages, measures every request they make, and
//! checks the results against pass/fail thresholds.
//!
//! Stampede uses [`reqwest`](https://docs.rs/reqwest/) to provide a convenient HTTP
//! client, and [`tokio`](https://docs.rs/tokio/) to run each virtual user as its own
//! task.
//!
//! ## Running the built-in scenario
//!
//! The `stampede` binary runs the `http-get` scenario: every virtual user GETs the
//! target URL, checks the status code and the `X-App-Version` header, then pauses
//! for a second.
//!
//! ```bash
//! $ stampede run http-get --stages="30s:20,1m:20,30s:0" --url=http://localhost:8081
//! ```
//!
//! The process exits 0 when every threshold passes, and 1 otherwise. Configuration
//! errors also exit 1, before any traffic is generated. When the `SERVICE_URL`
//! environment variable is set and not empty it replaces `--url`.
//!
//! ### Stages
//!
//! Stages are a comma separated list of `{timespan}:{target}`. The number of active
//! virtual users is interpolated linearly from the previous stage's target (or from
//! 0 for the first stage) to the stage's target over the stage's duration. For
//! example, `30s:20,1m:20,30s:0` ramps up to 20 users over 30 seconds, holds 20
//! users for a minute, then ramps back down to 0 over 30 seconds.
//!
//! ### Thresholds
//!
//! Thresholds are `{metric}:{aggregation}{comparator}{bound}` and may be set more than
//! once:
//!
//! ```bash
//! $ stampede run http-get --stages=1m:50 \
//!     --threshold "http_req_duration:p(95)<500" \
//!     --threshold "http_req_failed:rate<0.01" \
//!     --threshold "checks:rate>0.99"
//! ```
//!
//! Without `--threshold` the scenario's own thresholds are used.
//!
//! ## Writing a scenario
//!
//! A scenario is an async function taking a [`VirtualUser`](./user/struct.VirtualUser.html),
//! each call being one iteration:
//!
//! ```rust,no_run
//! use stampede::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LoadTestError> {
//!     let result = LoadTest::initialize()?
//!         .register_scenario(
//!             scenario!("about", loadtest_about)
//!                 .set_threshold("http_req_failed:rate<0.05")?,
//!         )
//!         .set_default(LoadTestDefault::Url, "http://localhost:8081")?
//!         .set_default(LoadTestDefault::Stages, "10s:10,30s:10,10s:0")?
//!         .execute()
//!         .await?;
//!
//!     std::process::exit(if result.passed { 0 } else { 1 });
//! }
//!
//! async fn loadtest_about(user: &mut VirtualUser) -> IterationResult {
//!     let response = user.get("/about").await?;
//!     user.check(&response, "status is 200", |response| response.status.as_u16() == 200);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## License
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod client;
pub mod config;
pub mod metrics;
mod pool;
pub mod prelude;
pub mod report;
pub mod scenario;
pub mod stage;
pub mod threshold;
pub mod user;
pub mod util;

use chrono::prelude::*;
use gumdrop::Options;
use itertools::Itertools;
use lazy_static::lazy_static;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use std::{fmt, io};

use crate::config::{Configuration, LoadTestDefaults};
use crate::metrics::LoadTestMetrics;
use crate::pool::{UserPool, UserTemplate};
use crate::scenario::Scenario;
use crate::stage::StageHistory;
use crate::threshold::{RunResult, Threshold};

/// How often the scheduler recomputes the concurrency target.
const SCHEDULER_TICK: Duration = Duration::from_millis(100);

/// Pause between iterations when neither `--pause` nor the scenario set one.
const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

lazy_static! {
    /// Set by the ctrl-c handler.
    static ref CANCELED: AtomicBool = AtomicBool::new(false);
}

/// An enumeration of all errors a [`LoadTest`] can return.
#[derive(Debug)]
pub enum LoadTestError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://tokio-rs.github.io/tokio/doc/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    SerdeJson(serde_json::Error),
    /// Failed to parse the target URL.
    InvalidHost {
        /// The invalid URL that caused this error.
        host: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html), if
        /// the URL couldn't be parsed at all.
        parse_error: Option<url::ParseError>,
    },
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Failed to parse a stage.
    InvalidStage {
        /// The stage definition that caused this error.
        stage: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Failed to parse a threshold.
    InvalidThreshold {
        /// The threshold expression that caused this error.
        expression: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// [`LoadTest`] has no [`Scenario`] registered.
    NoScenarios {
        /// An optional explanation of the error.
        detail: String,
    },
    /// No registered [`Scenario`] has the requested name.
    UnknownScenario {
        /// The requested name.
        name: String,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl LoadTestError {
    fn describe(&self) -> &str {
        match *self {
            LoadTestError::Io(_) => "io::Error",
            LoadTestError::Reqwest(_) => "reqwest::Error",
            LoadTestError::TokioJoin(_) => "tokio::task::JoinError",
            LoadTestError::SerdeJson(_) => "serde_json::Error",
            LoadTestError::InvalidHost { .. } => "failed to parse target url",
            LoadTestError::InvalidOption { .. } => "invalid option or value specified",
            LoadTestError::InvalidStage { .. } => "invalid stage specified",
            LoadTestError::InvalidThreshold { .. } => "invalid threshold specified",
            LoadTestError::NoScenarios { .. } => "no scenarios defined",
            LoadTestError::UnknownScenario { .. } => "unknown scenario",
        }
    }

    /// True if the error was detected while validating the configuration, before
    /// any traffic was generated.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LoadTestError::InvalidHost { .. }
                | LoadTestError::InvalidOption { .. }
                | LoadTestError::InvalidStage { .. }
                | LoadTestError::InvalidThreshold { .. }
                | LoadTestError::NoScenarios { .. }
                | LoadTestError::UnknownScenario { .. }
        )
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for LoadTestError {
    // Implement display of error with `{}` marker.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LoadTestError::Io(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::Reqwest(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::TokioJoin(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::SerdeJson(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::InvalidHost {
                ref host,
                ref detail,
                ..
            } => write!(
                f,
                "LoadTestError: {} `{}`: {}",
                self.describe(),
                host,
                detail
            ),
            LoadTestError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "LoadTestError: {} {} = `{}`: {}",
                self.describe(),
                option,
                value,
                detail
            ),
            LoadTestError::InvalidStage {
                ref stage,
                ref detail,
            } => write!(
                f,
                "LoadTestError: {} `{}`: {}",
                self.describe(),
                stage,
                detail
            ),
            LoadTestError::InvalidThreshold {
                ref expression,
                ref detail,
            } => write!(
                f,
                "LoadTestError: {} `{}`: {}",
                self.describe(),
                expression,
                detail
            ),
            LoadTestError::NoScenarios { ref detail } => {
                write!(f, "LoadTestError: {}: {}", self.describe(), detail)
            }
            LoadTestError::UnknownScenario { ref name } => {
                write!(f, "LoadTestError: {} `{}`", self.describe(), name)
            }
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for LoadTestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadTestError::Io(ref source) => Some(source),
            LoadTestError::Reqwest(ref source) => Some(source),
            LoadTestError::TokioJoin(ref source) => Some(source),
            LoadTestError::SerdeJson(ref source) => Some(source),
            LoadTestError::InvalidHost {
                parse_error: Some(ref parse_error),
                ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for LoadTestError {
    fn from(err: reqwest::Error) -> LoadTestError {
        LoadTestError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for LoadTestError {
    fn from(err: io::Error) -> LoadTestError {
        LoadTestError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for LoadTestError {
    fn from(err: tokio::task::JoinError) -> LoadTestError {
        LoadTestError::TokioJoin(err)
    }
}

/// Auto-convert serde_json errors.
impl From<serde_json::Error> for LoadTestError {
    fn from(err: serde_json::Error) -> LoadTestError {
        LoadTestError::SerdeJson(err)
    }
}

/// Stops a running [`LoadTest`] at the next scheduler tick, as if ctrl-c was pressed.
///
/// Metrics collected so far are still aggregated and the thresholds evaluated.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);
impl CancelHandle {
    pub fn cancel(&self) {
        info!("load test canceled");
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst) || CANCELED.load(Ordering::SeqCst)
    }
}

/// Global internal state for the load test.
#[derive(Debug)]
pub struct LoadTest {
    /// All registered scenarios, one of which runs.
    scenarios: Vec<Scenario>,
    /// Optional default values for run-time options.
    defaults: LoadTestDefaults,
    /// Configuration object holding options set when launching the load test.
    configuration: Configuration,
    canceled: CancelHandle,
}
/// A load test where scenarios are executed by virtual users following a stage plan.
impl LoadTest {
    /// Load configuration from the command line and initialize a [`LoadTest`].
    ///
    /// # Example
    /// ```rust,no_run
    /// use stampede::prelude::*;
    ///
    /// let load_test = LoadTest::initialize();
    /// ```
    pub fn initialize() -> Result<LoadTest, LoadTestError> {
        Ok(LoadTest::initialize_with_config(
            Configuration::parse_args_default_or_exit(),
        ))
    }

    /// Initialize a [`LoadTest`] with an already loaded configuration.
    ///
    /// This is generally used by the `stampede` binary and by tests.
    ///
    /// # Example
    /// ```rust
    /// use stampede::LoadTest;
    /// use stampede::config::Configuration;
    /// use gumdrop::Options;
    ///
    /// let configuration = Configuration::parse_args_default(&["--stages", "10s:5"]).unwrap();
    /// let load_test = LoadTest::initialize_with_config(configuration);
    /// ```
    pub fn initialize_with_config(configuration: Configuration) -> LoadTest {
        LoadTest {
            scenarios: Vec::new(),
            defaults: LoadTestDefaults::default(),
            configuration,
            canceled: CancelHandle::default(),
        }
    }

    /// Register a [`Scenario`]. When more than one is registered, the one to run is
    /// chosen by name on the command line.
    pub fn register_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// A handle that can stop the load test from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.canceled.clone()
    }

    // Pick the scenario to run: by name (case insensitive), or the only one registered.
    fn select_scenario(&self) -> Result<Scenario, LoadTestError> {
        if self.scenarios.is_empty() {
            return Err(LoadTestError::NoScenarios {
                detail: "No scenarios are registered.".to_string(),
            });
        }

        let name = &self.configuration.scenario;
        if name.is_empty() {
            return match self.scenarios.len() {
                1 => Ok(self.scenarios[0].clone()),
                _ => Err(LoadTestError::InvalidOption {
                    option: "scenario".to_string(),
                    value: String::new(),
                    detail: format!(
                        "Choose which scenario to run: {}",
                        self.scenarios.iter().map(|s| &s.name).join(", ")
                    ),
                }),
            };
        }

        self.scenarios
            .iter()
            .find(|scenario| scenario.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| LoadTestError::UnknownScenario {
                name: name.to_string(),
            })
    }

    /// Run the load test, returning the final metrics and the outcome of every
    /// threshold.
    ///
    /// Returns an error if the configuration is invalid, in which case no traffic
    /// is generated.
    ///
    /// # Example
    /// ```rust,no_run
    /// use stampede::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), LoadTestError> {
    ///     let result = LoadTest::initialize()?
    ///         .register_scenario(scenario::http_get()?)
    ///         .execute()
    ///         .await?;
    ///     println!("passed: {}", result.passed);
    ///
    ///     Ok(())
    /// }
    /// ```
    pub async fn execute(mut self) -> Result<RunResult, LoadTestError> {
        // If version flag is set, display package name and version and return without
        // running a load test.
        if self.configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(threshold::evaluate(&LoadTestMetrics::default(), &[]));
        }

        self.configuration.configure(&self.defaults);
        self.configuration.initialize_logger();

        // Display scenarios and exit.
        if self.configuration.list {
            println!("Available scenarios:");
            for scenario in &self.scenarios {
                println!(" - {}", scenario.name);
            }
            return Ok(threshold::evaluate(&LoadTestMetrics::default(), &[]));
        }

        self.configuration.validate()?;
        let scenario = self.select_scenario()?;

        // Thresholds on the command line replace the scenario's.
        let thresholds: Vec<Threshold> = if self.configuration.threshold.is_empty() {
            scenario.thresholds.clone()
        } else {
            self.configuration.threshold.clone()
        };
        if thresholds.is_empty() {
            warn!("no thresholds configured, the load test will always pass");
        }

        let pause = self
            .configuration
            .pause()
            .or(scenario.pause)
            .unwrap_or((DEFAULT_PAUSE, DEFAULT_PAUSE));
        let base_url = util::parse_target_url(&self.configuration.url)?;
        let plan = match self.configuration.stages.clone() {
            Some(plan) => plan,
            None => {
                return Err(LoadTestError::InvalidStage {
                    stage: String::new(),
                    detail: "--stages is required".to_string(),
                })
            }
        };

        util::setup_ctrlc_handler();

        info!(
            "running {} against {} for {:?}, up to {} users",
            scenario.name,
            base_url,
            plan.total_duration(),
            plan.max_target()
        );

        let (metrics_tx, metrics_rx) = flume::unbounded();
        let started = tokio::time::Instant::now();
        let mut pool = UserPool::new(UserTemplate {
            scenario,
            pause,
            base_url,
            configuration: Arc::new(self.configuration.clone()),
            metrics_tx,
            started,
        });
        let mut metrics = LoadTestMetrics {
            started: Some(Local::now()),
            ..Default::default()
        };

        let running_metrics = self.configuration.running_metrics.unwrap_or(0);
        let mut running_metrics_timer = std::time::Instant::now();
        let mut next_stage = 0;
        let mut launch_error = None;

        for checkpoint in plan.checkpoints(SCHEDULER_TICK) {
            tokio::time::sleep_until(started + checkpoint.elapsed).await;
            if self.canceled.is_canceled() {
                warn!("stopping after {:?}", started.elapsed());
                break;
            }

            // Zero-duration stages are recorded even though no checkpoint runs in them.
            while next_stage <= checkpoint.stage {
                if let Some(history) = plan.describe(next_stage) {
                    info!(
                        "stage {}: {:?} from {} to {} users over {:?}",
                        next_stage + 1,
                        history.action,
                        history.from,
                        history.to,
                        history.duration
                    );
                    metrics.history.push(history);
                }
                next_stage += 1;
            }

            if let Err(e) = pool.resize(checkpoint.target) {
                launch_error = Some(e);
                break;
            }
            metrics.record_users(pool.active());
            for metric in metrics_rx.try_iter() {
                metrics.ingest(metric);
            }

            if util::timer_expired(running_metrics_timer, running_metrics) {
                running_metrics_timer = std::time::Instant::now();
                metrics.duration = started.elapsed();
                metrics.print_running();
            }
        }

        metrics
            .history
            .push(StageHistory::finished(pool.active()));
        let aborted = pool.shutdown(self.configuration.grace_period()).await;
        if aborted > 0 {
            warn!(
                "{} users didn't finish their iteration within the grace period",
                aborted
            );
        }

        // The pool is gone, so every sender is dropped and this drains everything.
        for metric in metrics_rx.drain() {
            metrics.ingest(metric);
        }
        metrics.duration = started.elapsed();
        metrics.final_metrics = true;

        if let Some(e) = launch_error {
            return Err(e);
        }

        let result = threshold::evaluate(&metrics, &thresholds);
        info!(
            "load test finished after {:?}: {} of {} thresholds passed",
            metrics.duration,
            thresholds.len() - result.failures(),
            thresholds.len()
        );

        if !self.configuration.no_print_metrics {
            println!("{}", result);
        }
        if !self.configuration.summary_export.is_empty() {
            report::write_summary(&self.configuration.summary_export, &result).await?;
        }

        Ok(result)
    }
}
