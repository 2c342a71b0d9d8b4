//! Functions and structures related to configuring a load test.
//!
//! A load test can be configured at run time by passing in the options and flags
//! defined by the [`Configuration`] structure, and programmatically with
//! [`LoadTestDefaultType::set_default`].
//!
//! Values are resolved in this order, the first one set wins:
//!  1. the `SERVICE_URL` environment variable (target URL only),
//!  2. command line options,
//!  3. defaults set with [`LoadTestDefaultType::set_default`],
//!  4. built-in defaults.

use gumdrop::Options;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::stage::StagePlan;
use crate::threshold::Threshold;
use crate::util;
use crate::{LoadTest, LoadTestError};

/// Overrides the target URL when set and not empty.
pub const SERVICE_URL_ENV: &str = "SERVICE_URL";
/// The target URL if nothing else is configured.
pub const DEFAULT_URL: &str = "http://localhost:8081";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
const DEFAULT_STATUS: u16 = 200;
const DEFAULT_HEADER: &str = "X-App-Version";

/// The `stampede` command line.
#[derive(Options, Debug)]
#[options(
    help = r#"Stampede is a staged HTTP load generator: it ramps virtual users up and down
through a list of stages, measures every request, and checks the results
against pass/fail thresholds.

Exits 0 when every threshold passes, and 1 otherwise.

Usage: stampede run <scenario> --stages=<stages> --url=<url>"#
)]
pub struct Cli {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V")]
    pub version: bool,
    /// Command to run
    #[options(command)]
    pub command: Option<Command>,
}

#[derive(Options, Debug)]
pub enum Command {
    /// Runs a load test
    #[options(help = "Runs a scenario through the configured stages")]
    Run(Configuration),
}

/// Runtime options available when launching a load test.
///
/// Custom defaults can be programmatically set for most of these options using
/// [`LoadTestDefaultType::set_default`].
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(help = r#"The following runtime options are available when running a scenario:"#)]
pub struct Configuration {
    /// Name of the scenario to run
    #[options(free)]
    pub scenario: String,

    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V")]
    pub version: bool,
    /// Lists all scenarios and exits
    // Add a blank line after this option
    #[options(short = "l", help = "Lists all scenarios and exits\n")]
    pub list: bool,

    /// Defines the URL to load test (default: http://localhost:8081)
    #[options(short = "u", meta = "URL")]
    pub url: String,
    /// Sets stages, ie "30s:20,1m:20,30s:0"
    #[options(short = "s", meta = "STAGES")]
    pub stages: Option<StagePlan>,
    /// Adds a pass/fail threshold, ie "http_req_duration:p(95)<500"
    #[options(no_short, meta = "EXPR")]
    pub threshold: Vec<Threshold>,
    /// Sets pause between iterations, ie "1s" or "500ms-2s"
    #[options(no_short, meta = "TIME")]
    pub pause: String,
    /// Sets per-request timeout (default: 60s)
    #[options(no_short, meta = "TIME")]
    pub timeout: String,
    /// Sets how long to wait for running iterations at shutdown (default: 30s)
    // Add a blank line and then a 'Checks:' header after this option
    #[options(
        no_short,
        meta = "TIME",
        help = "Sets how long to wait for running iterations at shutdown (default: 30s)\n\nChecks:"
    )]
    pub grace_period: String,

    /// Sets expected status code (default: 200)
    #[options(no_short, meta = "CODE")]
    pub expect_status: Option<u16>,
    /// Adds an expected response header (default: X-App-Version)
    // Add a blank line and then a 'Metrics:' header after this option
    #[options(
        no_short,
        meta = "NAME",
        help = "Adds an expected response header (default: X-App-Version)\n\nMetrics:"
    )]
    pub expect_header: Vec<String>,

    /// How often to optionally print running metrics, in seconds
    #[options(no_short, meta = "SECONDS")]
    pub running_metrics: Option<usize>,
    /// Doesn't display metrics at end of load test
    #[options(no_short)]
    pub no_print_metrics: bool,
    /// Writes a JSON summary to this file at end of load test
    // Add a blank line and then a 'Logging:' header after this option
    #[options(
        no_short,
        meta = "NAME",
        help = "Writes a JSON summary to this file at end of load test\n\nLogging:"
    )]
    pub summary_export: String,

    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q", help = "Decreases verbosity (-q, -qq, etc)")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(
        count,
        short = "v",
        // Add a blank line and then an 'Advanced:' header after this option
        help = "Increases verbosity (-v, -vv, etc)\n\nAdvanced:"
    )]
    pub verbose: u8,

    /// Doesn't set the gzip Accept-Encoding header
    #[options(no_short)]
    pub no_gzip: bool,
    /// Disables validation of https certificates
    #[options(no_short)]
    pub accept_invalid_certs: bool,
}

/// Optional default values for load test options.
#[derive(Clone, Debug, Default)]
pub(crate) struct LoadTestDefaults {
    pub(crate) scenario: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) stages: Option<StagePlan>,
    pub(crate) thresholds: Vec<Threshold>,
    pub(crate) pause: Option<String>,
    pub(crate) timeout: Option<String>,
    pub(crate) grace_period: Option<String>,
    pub(crate) expect_status: Option<u16>,
    pub(crate) expect_headers: Vec<String>,
    pub(crate) running_metrics: Option<usize>,
    pub(crate) no_print_metrics: Option<bool>,
    pub(crate) summary_export: Option<String>,
    pub(crate) log_file: Option<String>,
    pub(crate) log_level: Option<u8>,
    pub(crate) quiet: Option<u8>,
    pub(crate) verbose: Option<u8>,
    pub(crate) no_gzip: Option<bool>,
    pub(crate) accept_invalid_certs: Option<bool>,
}

/// Allows the optional configuration of defaults.
///
/// Each option requires a specific type, see [`LoadTestDefaultType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadTestDefault {
    /// An optional default scenario name. &str
    Scenario,
    /// An optional default target URL. &str
    Url,
    /// An optional default stage plan, ie "30s:20,1m:20,30s:0". &str
    Stages,
    /// An optional default threshold, may be set more than once. &str
    Threshold,
    /// An optional default pause between iterations. &str
    Pause,
    /// An optional default per-request timeout. &str
    Timeout,
    /// An optional default shutdown grace period. &str
    GracePeriod,
    /// An optional default expected status code. usize
    ExpectStatus,
    /// An optional default expected header, may be set more than once. &str
    ExpectHeader,
    /// An optional default for printing running metrics. usize
    RunningMetrics,
    /// An optional default for not printing metrics at the end. bool
    NoPrintMetrics,
    /// An optional default summary export file. &str
    SummaryExport,
    /// An optional default log file name. &str
    LogFile,
    /// An optional default log file level. usize
    LogLevel,
    /// An optional default quiet level. usize
    Quiet,
    /// An optional default verbosity level. usize
    Verbose,
    /// An optional default for not setting the gzip Accept-Encoding header. bool
    NoGzip,
    /// An optional default for accepting invalid certificates. bool
    AcceptInvalidCerts,
}

/// Most run-time options can be programmatically configured with custom defaults.
///
/// The following options take a `&str`: [`LoadTestDefault::Scenario`],
/// [`LoadTestDefault::Url`], [`LoadTestDefault::Stages`], [`LoadTestDefault::Threshold`],
/// [`LoadTestDefault::Pause`], [`LoadTestDefault::Timeout`],
/// [`LoadTestDefault::GracePeriod`], [`LoadTestDefault::ExpectHeader`],
/// [`LoadTestDefault::SummaryExport`] and [`LoadTestDefault::LogFile`].
///
/// The following options take a `usize`: [`LoadTestDefault::ExpectStatus`],
/// [`LoadTestDefault::RunningMetrics`], [`LoadTestDefault::LogLevel`],
/// [`LoadTestDefault::Quiet`] and [`LoadTestDefault::Verbose`].
///
/// The following options take a `bool`: [`LoadTestDefault::NoPrintMetrics`],
/// [`LoadTestDefault::NoGzip`] and [`LoadTestDefault::AcceptInvalidCerts`].
pub trait LoadTestDefaultType<T> {
    /// Sets a [`LoadTestDefault`] to the provided value.
    ///
    /// # Example
    /// ```rust
    /// use stampede::prelude::*;
    ///
    /// fn main() -> Result<(), LoadTestError> {
    ///     LoadTest::initialize_with_config(Configuration::default())
    ///         .set_default(LoadTestDefault::Stages, "10s:5,30s:5,10s:0")?
    ///         .set_default(LoadTestDefault::Threshold, "http_req_failed:rate<0.05")?
    ///         .set_default(LoadTestDefault::Quiet, 1)?
    ///         .set_default(LoadTestDefault::NoGzip, true)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    fn set_default(self, key: LoadTestDefault, value: T) -> Result<Self, LoadTestError>
    where
        Self: Sized;
}

fn wrong_type(key: LoadTestDefault, value: &dyn fmt::Display, expected: &str) -> LoadTestError {
    LoadTestError::InvalidOption {
        option: format!("LoadTestDefault::{:?}", key),
        value: value.to_string(),
        detail: format!(
            "set_default(LoadTestDefault::{:?}, {}) expected {} value",
            key, value, expected
        ),
    }
}

impl LoadTestDefaultType<&str> for LoadTest {
    fn set_default(mut self, key: LoadTestDefault, value: &str) -> Result<Self, LoadTestError> {
        let defaults = &mut self.defaults;
        match key {
            LoadTestDefault::Scenario => defaults.scenario = Some(value.to_string()),
            LoadTestDefault::Url => {
                defaults.url = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            LoadTestDefault::Stages => defaults.stages = Some(value.parse()?),
            LoadTestDefault::Threshold => defaults.thresholds.push(value.parse()?),
            LoadTestDefault::Pause => defaults.pause = Some(value.to_string()),
            LoadTestDefault::Timeout => defaults.timeout = Some(value.to_string()),
            LoadTestDefault::GracePeriod => defaults.grace_period = Some(value.to_string()),
            LoadTestDefault::ExpectHeader => defaults.expect_headers.push(value.to_string()),
            LoadTestDefault::SummaryExport => defaults.summary_export = Some(value.to_string()),
            LoadTestDefault::LogFile => defaults.log_file = Some(value.to_string()),
            LoadTestDefault::ExpectStatus
            | LoadTestDefault::RunningMetrics
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose => return Err(wrong_type(key, &value, "usize")),
            LoadTestDefault::NoPrintMetrics
            | LoadTestDefault::NoGzip
            | LoadTestDefault::AcceptInvalidCerts => return Err(wrong_type(key, &value, "bool")),
        }
        Ok(self)
    }
}
impl LoadTestDefaultType<usize> for LoadTest {
    fn set_default(mut self, key: LoadTestDefault, value: usize) -> Result<Self, LoadTestError> {
        let defaults = &mut self.defaults;
        let as_u8 = || {
            u8::try_from(value).map_err(|_| LoadTestError::InvalidOption {
                option: format!("LoadTestDefault::{:?}", key),
                value: value.to_string(),
                detail: "value must be at most 255".to_string(),
            })
        };
        match key {
            LoadTestDefault::ExpectStatus => {
                defaults.expect_status =
                    Some(
                        u16::try_from(value).map_err(|_| LoadTestError::InvalidOption {
                            option: "LoadTestDefault::ExpectStatus".to_string(),
                            value: value.to_string(),
                            detail: "status code must be between 100 and 599".to_string(),
                        })?,
                    )
            }
            LoadTestDefault::RunningMetrics => defaults.running_metrics = Some(value),
            LoadTestDefault::LogLevel => defaults.log_level = Some(as_u8()?),
            LoadTestDefault::Quiet => defaults.quiet = Some(as_u8()?),
            LoadTestDefault::Verbose => defaults.verbose = Some(as_u8()?),
            LoadTestDefault::Scenario
            | LoadTestDefault::Url
            | LoadTestDefault::Stages
            | LoadTestDefault::Threshold
            | LoadTestDefault::Pause
            | LoadTestDefault::Timeout
            | LoadTestDefault::GracePeriod
            | LoadTestDefault::ExpectHeader
            | LoadTestDefault::SummaryExport
            | LoadTestDefault::LogFile => return Err(wrong_type(key, &value, "&str")),
            LoadTestDefault::NoPrintMetrics
            | LoadTestDefault::NoGzip
            | LoadTestDefault::AcceptInvalidCerts => return Err(wrong_type(key, &value, "bool")),
        }
        Ok(self)
    }
}
impl LoadTestDefaultType<bool> for LoadTest {
    fn set_default(mut self, key: LoadTestDefault, value: bool) -> Result<Self, LoadTestError> {
        let defaults = &mut self.defaults;
        match key {
            LoadTestDefault::NoPrintMetrics => defaults.no_print_metrics = Some(value),
            LoadTestDefault::NoGzip => defaults.no_gzip = Some(value),
            LoadTestDefault::AcceptInvalidCerts => defaults.accept_invalid_certs = Some(value),
            LoadTestDefault::Scenario
            | LoadTestDefault::Url
            | LoadTestDefault::Stages
            | LoadTestDefault::Threshold
            | LoadTestDefault::Pause
            | LoadTestDefault::Timeout
            | LoadTestDefault::GracePeriod
            | LoadTestDefault::ExpectHeader
            | LoadTestDefault::SummaryExport
            | LoadTestDefault::LogFile => return Err(wrong_type(key, &value, "&str")),
            LoadTestDefault::ExpectStatus
            | LoadTestDefault::RunningMetrics
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose => return Err(wrong_type(key, &value, "usize")),
        }
        Ok(self)
    }
}

/// Used internally to configure [`Configuration`] values based on precedence rules.
#[derive(Debug, Clone)]
pub(crate) struct ConfigValue<'a, T> {
    /// The optional value to set.
    pub(crate) value: Option<T>,
    /// Skip this value if true.
    pub(crate) filter: bool,
    /// An optional INFO level log message.
    pub(crate) message: &'a str,
}

pub(crate) trait Configure<T> {
    /// Return the first value that is set and not filtered.
    fn get_value(&self, values: Vec<ConfigValue<T>>) -> Option<T>;
}
impl<T: fmt::Debug> Configure<T> for Configuration {
    fn get_value(&self, values: Vec<ConfigValue<T>>) -> Option<T> {
        for value in values {
            if let Some(v) = value.value {
                if value.filter {
                    continue;
                }
                if !value.message.is_empty() {
                    info!("{} = {:?}", value.message, v)
                }
                return Some(v);
            }
        }
        None
    }
}

impl Configuration {
    /// Resolve every option from the environment, the command line, the provided
    /// defaults and the built-in defaults.
    pub(crate) fn configure(&mut self, defaults: &LoadTestDefaults) {
        let service_url = std::env::var(SERVICE_URL_ENV).ok();

        // Configure `url`.
        self.url = self
            .get_value(vec![
                // Use SERVICE_URL if set.
                ConfigValue {
                    filter: service_url.as_deref().map_or(true, str::is_empty),
                    value: service_url,
                    message: "url (from SERVICE_URL)",
                },
                // Otherwise use --url if set.
                ConfigValue {
                    value: Some(self.url.to_string()),
                    filter: self.url.is_empty(),
                    message: "url",
                },
                // Otherwise use LoadTestDefault if set.
                ConfigValue {
                    value: defaults.url.clone(),
                    filter: defaults.url.is_none(),
                    message: "url",
                },
            ])
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        // Configure `scenario`.
        self.scenario = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.scenario.to_string()),
                    filter: self.scenario.is_empty(),
                    message: "scenario",
                },
                ConfigValue {
                    value: defaults.scenario.clone(),
                    filter: defaults.scenario.is_none(),
                    message: "scenario",
                },
            ])
            .unwrap_or_default();

        // Configure `stages`.
        self.stages = self.get_value(vec![
            ConfigValue {
                value: self.stages.clone(),
                filter: self.stages.is_none(),
                message: "",
            },
            ConfigValue {
                value: defaults.stages.clone(),
                filter: defaults.stages.is_none(),
                message: "",
            },
        ]);
        if let Some(stages) = self.stages.as_ref() {
            info!("stages = {}", stages);
        }

        // Configure `threshold`, thresholds on the command line replace the defaults.
        if self.threshold.is_empty() {
            self.threshold = defaults.thresholds.clone();
        }

        // Configure `pause`, left empty to use the scenario's pause.
        self.pause = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.pause.to_string()),
                    filter: self.pause.is_empty(),
                    message: "pause",
                },
                ConfigValue {
                    value: defaults.pause.clone(),
                    filter: defaults.pause.is_none(),
                    message: "pause",
                },
            ])
            .unwrap_or_default();

        // Configure `timeout`.
        self.timeout = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.timeout.to_string()),
                    filter: self.timeout.is_empty(),
                    message: "timeout",
                },
                ConfigValue {
                    value: defaults.timeout.clone(),
                    filter: defaults.timeout.is_none(),
                    message: "timeout",
                },
            ])
            .unwrap_or_default();

        // Configure `grace_period`.
        self.grace_period = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.grace_period.to_string()),
                    filter: self.grace_period.is_empty(),
                    message: "grace_period",
                },
                ConfigValue {
                    value: defaults.grace_period.clone(),
                    filter: defaults.grace_period.is_none(),
                    message: "grace_period",
                },
            ])
            .unwrap_or_default();

        // Configure `expect_status`.
        self.expect_status = self.get_value(vec![
            ConfigValue {
                value: self.expect_status,
                filter: self.expect_status.is_none(),
                message: "expect_status",
            },
            ConfigValue {
                value: defaults.expect_status,
                filter: defaults.expect_status.is_none(),
                message: "expect_status",
            },
        ]);

        // Configure `expect_header`, headers on the command line replace the defaults.
        if self.expect_header.is_empty() {
            self.expect_header = defaults.expect_headers.clone();
        }

        // Configure `running_metrics`.
        self.running_metrics = self.get_value(vec![
            ConfigValue {
                value: self.running_metrics,
                filter: self.running_metrics.is_none(),
                message: "running_metrics",
            },
            ConfigValue {
                value: defaults.running_metrics,
                filter: defaults.running_metrics.is_none(),
                message: "running_metrics",
            },
        ]);

        // Configure `no_print_metrics`.
        self.no_print_metrics = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.no_print_metrics),
                    filter: !self.no_print_metrics,
                    message: "no_print_metrics",
                },
                ConfigValue {
                    value: defaults.no_print_metrics,
                    filter: defaults.no_print_metrics.is_none(),
                    message: "no_print_metrics",
                },
            ])
            .unwrap_or(false);

        // Configure `summary_export`.
        self.summary_export = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.summary_export.to_string()),
                    filter: self.summary_export.is_empty(),
                    message: "summary_export",
                },
                ConfigValue {
                    value: defaults.summary_export.clone(),
                    filter: defaults.summary_export.is_none(),
                    message: "summary_export",
                },
            ])
            .unwrap_or_default();

        // Configure `log_file`.
        self.log_file = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.log_file.to_string()),
                    filter: self.log_file.is_empty(),
                    message: "",
                },
                ConfigValue {
                    value: defaults.log_file.clone(),
                    filter: defaults.log_file.is_none(),
                    message: "",
                },
            ])
            .unwrap_or_default();

        // Configure `log_level`, `quiet` and `verbose`. The logger isn't initialized
        // yet, so there's nothing to log.
        self.log_level = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.log_level),
                    filter: self.log_level == 0,
                    message: "",
                },
                ConfigValue {
                    value: defaults.log_level,
                    filter: defaults.log_level.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);
        self.quiet = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.quiet),
                    filter: self.quiet == 0,
                    message: "",
                },
                ConfigValue {
                    value: defaults.quiet,
                    filter: defaults.quiet.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);
        self.verbose = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.verbose),
                    filter: self.verbose == 0,
                    message: "",
                },
                ConfigValue {
                    value: defaults.verbose,
                    filter: defaults.verbose.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `no_gzip`.
        self.no_gzip = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.no_gzip),
                    filter: !self.no_gzip,
                    message: "no_gzip",
                },
                ConfigValue {
                    value: defaults.no_gzip,
                    filter: defaults.no_gzip.is_none(),
                    message: "no_gzip",
                },
            ])
            .unwrap_or(false);

        // Configure `accept_invalid_certs`.
        self.accept_invalid_certs = self
            .get_value(vec![
                ConfigValue {
                    value: Some(self.accept_invalid_certs),
                    filter: !self.accept_invalid_certs,
                    message: "accept_invalid_certs",
                },
                ConfigValue {
                    value: defaults.accept_invalid_certs,
                    filter: defaults.accept_invalid_certs.is_none(),
                    message: "accept_invalid_certs",
                },
            ])
            .unwrap_or(false);
    }

    /// Validate the configuration, before any traffic is generated.
    pub(crate) fn validate(&self) -> Result<(), LoadTestError> {
        // Can't set both --verbose and --quiet.
        if self.verbose > 0 && self.quiet > 0 {
            return Err(LoadTestError::InvalidOption {
                option: "`configuration.verbose`".to_string(),
                value: self.verbose.to_string(),
                detail: "`configuration.verbose` can not be set with `configuration.quiet`."
                    .to_string(),
            });
        }

        // Stages are required.
        if self.stages.is_none() {
            return Err(LoadTestError::InvalidStage {
                stage: String::new(),
                detail: "--stages is required, ie --stages \"30s:20,1m:20,30s:0\"".to_string(),
            });
        }

        util::parse_target_url(&self.url)?;

        if !self.pause.is_empty() {
            util::parse_pause(&self.pause)?;
        }

        if !self.timeout.is_empty() {
            match util::parse_timespan(&self.timeout) {
                Some(timeout) if !timeout.is_zero() => (),
                _ => {
                    return Err(LoadTestError::InvalidOption {
                        option: "`configuration.timeout`".to_string(),
                        value: self.timeout.to_string(),
                        detail: "`configuration.timeout` must be a time span greater than 0."
                            .to_string(),
                    })
                }
            }
        }

        if !self.grace_period.is_empty() && util::parse_timespan(&self.grace_period).is_none() {
            return Err(LoadTestError::InvalidOption {
                option: "`configuration.grace_period`".to_string(),
                value: self.grace_period.to_string(),
                detail: "`configuration.grace_period` must be a time span, ie \"30s\"."
                    .to_string(),
            });
        }

        if let Some(status) = self.expect_status {
            if !(100..=599).contains(&status) {
                return Err(LoadTestError::InvalidOption {
                    option: "`configuration.expect_status`".to_string(),
                    value: status.to_string(),
                    detail: "`configuration.expect_status` must be between 100 and 599."
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        util::parse_timespan(&self.timeout)
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// How long to wait for running iterations when shutting down.
    pub fn grace_period(&self) -> Duration {
        util::parse_timespan(&self.grace_period).unwrap_or(DEFAULT_GRACE_PERIOD)
    }

    /// The configured pause, `None` if the scenario decides.
    pub fn pause(&self) -> Option<(Duration, Duration)> {
        match self.pause.is_empty() {
            true => None,
            false => util::parse_pause(&self.pause).ok(),
        }
    }

    /// The status code the built-in scenario expects.
    pub fn expected_status(&self) -> u16 {
        self.expect_status.unwrap_or(DEFAULT_STATUS)
    }

    /// The headers the built-in scenario expects. An empty `--expect-header ""`
    /// disables the header check.
    pub fn expected_headers(&self) -> Vec<String> {
        if self.expect_header.is_empty() {
            return vec![DEFAULT_HEADER.to_string()];
        }
        self.expect_header
            .iter()
            .filter(|header| !header.is_empty())
            .cloned()
            .collect()
    }

    /// Optionally initialize the logger which writes to standard out and/or to
    /// a configurable log file.
    pub(crate) fn initialize_logger(&self) {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                1 => LevelFilter::Warn,
                _ => LevelFilter::Error,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Open the log file if configured.
        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        // Otherwise disable the log.
        } else {
            None
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];
        if let Some(log_to_file) = log_file.as_ref() {
            match std::fs::File::create(log_to_file) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!("failed to create log file {}: {}", log_to_file.display(), e),
            }
        }
        if let Err(e) = CombinedLogger::init(loggers) {
            info!("failed to initialize CombinedLogger: {}", e);
        }
        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }

        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}
