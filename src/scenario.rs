//! Scenarios: the function each virtual user runs over and over.
//!
//! A scenario is a named async function taking a [`VirtualUser`]. Each call is one
//! iteration; between iterations the user pauses. Wrap the function with the
//! [`scenario!`](crate::scenario!) macro to register it:
//!
//! ```rust
//! use stampede::prelude::*;
//!
//! let scenario = scenario!("health", check_health)
//!     .set_pause(std::time::Duration::from_millis(500), std::time::Duration::from_secs(2))
//!     .unwrap();
//!
//! async fn check_health(user: &mut VirtualUser) -> IterationResult {
//!     let response = user.get("/health").await?;
//!     user.check(&response, "status is 200", |response| response.status.as_u16() == 200);
//!     Ok(())
//! }
//! ```

use std::time::Duration;
use std::{fmt, future::Future, pin::Pin};

use crate::client::RequestError;
use crate::threshold::Threshold;
use crate::user::VirtualUser;
use crate::LoadTestError;

/// `scenario!("name", foo)` expands to `Scenario::new("name", foo)`, boxing the
/// returned future to work around a limitation in the compiler.
#[macro_export]
macro_rules! scenario {
    ($name:expr, $iteration_func:ident) => {
        $crate::scenario::Scenario::new($name, move |s| {
            std::boxed::Box::pin($iteration_func(s))
        })
    };
}

/// Why an iteration did not complete successfully.
///
/// Failed iterations are counted and logged, they never stop the load test.
#[derive(Debug)]
pub enum IterationError {
    /// A request could not be completed.
    Request(RequestError),
    /// A named check did not pass.
    CheckFailed { name: String },
    /// Anything else the scenario wants to report.
    Custom(String),
}

impl fmt::Display for IterationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IterationError::Request(error) => write!(f, "request failed: {}", error),
            IterationError::CheckFailed { name } => write!(f, "check failed: {}", name),
            IterationError::Custom(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for IterationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IterationError::Request(error) => Some(error),
            _ => None,
        }
    }
}

/// Auto-convert request errors so scenarios can use `?`.
impl From<RequestError> for Box<IterationError> {
    fn from(err: RequestError) -> Box<IterationError> {
        Box::new(IterationError::Request(err))
    }
}

/// The result of one iteration.
pub type IterationResult = Result<(), Box<IterationError>>;

/// The function run by each iteration.
pub type IterationFunction =
    for<'r> fn(&'r mut VirtualUser) -> Pin<Box<dyn Future<Output = IterationResult> + Send + 'r>>;

/// A named iteration function, with an optional pause and default thresholds.
#[derive(Clone)]
pub struct Scenario {
    pub name: String,
    pub function: IterationFunction,
    /// Minimum and maximum pause between iterations, overridden by `--pause`.
    pub pause: Option<(Duration, Duration)>,
    /// Used when no `--threshold` is configured.
    pub thresholds: Vec<Threshold>,
}
impl Scenario {
    pub fn new(name: &str, function: IterationFunction) -> Self {
        trace!("new scenario: {}", name);
        Scenario {
            name: name.to_string(),
            function,
            pause: None,
            thresholds: Vec::new(),
        }
    }

    /// Pause a random time between `min` and `max` after each iteration. Set both
    /// to the same value for a fixed pause.
    pub fn set_pause(mut self, min: Duration, max: Duration) -> Result<Self, LoadTestError> {
        if min > max {
            return Err(LoadTestError::InvalidOption {
                option: format!("Scenario::{}::set_pause", self.name),
                value: format!("{:?}-{:?}", min, max),
                detail: "minimum pause is larger than maximum pause".to_string(),
            });
        }
        self.pause = Some((min, max));
        Ok(self)
    }

    /// Add a default threshold, ie `"http_req_duration:p(95)<500"`.
    pub fn set_threshold(mut self, threshold: &str) -> Result<Self, LoadTestError> {
        self.thresholds.push(threshold.parse()?);
        Ok(self)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("pause", &self.pause)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

/// The scenario run by the `stampede` binary.
///
/// GETs the target URL, checks the status code and the expected headers, then
/// pauses for one second. Passes when 95% of requests finish within 500ms and fewer
/// than 1% fail.
pub fn http_get() -> Result<Scenario, LoadTestError> {
    scenario!("http-get", get_target)
        .set_pause(Duration::from_secs(1), Duration::from_secs(1))?
        .set_threshold("http_req_duration:p(95)<500")?
        .set_threshold("http_req_failed:rate<0.01")
}

async fn get_target(user: &mut VirtualUser) -> IterationResult {
    let status = user.configuration().expected_status();
    let headers = user.configuration().expected_headers();
    let status_check = format!("status is {}", status);

    let response = match user.get("").await {
        Ok(response) => response,
        Err(error) => {
            // Without a response every check fails.
            user.record_check(&status_check, false);
            for header in &headers {
                user.record_check(&format!("{} present", header), false);
            }
            return Err(error.into());
        }
    };

    let mut failed = Vec::new();
    if !user.check(&response, &status_check, |response| {
        response.status.as_u16() == status
    }) {
        failed.push(status_check);
    }
    for header in headers {
        let header_check = format!("{} present", header);
        if !user.check(&response, &header_check, |response| {
            response.has_header(&header)
        }) {
            failed.push(header_check);
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Box::new(IterationError::CheckFailed {
            name: failed.join(", "),
        }))
    }
}
