//! Pass/fail thresholds evaluated against the metrics of a finished load test.
//!
//! A threshold names a metric and an expression, for example
//! `http_req_duration:p(95)<500` requires that 95% of requests finish within 500
//! milliseconds, and `http_req_failed:rate<0.01` requires that fewer than 1% of
//! requests fail.
//!
//! | Metric               | Aggregations                        |
//! |----------------------|-------------------------------------|
//! | `http_req_duration`  | `avg`, `min`, `max`, `med`, `p(N)`  |
//! | `http_req_failed`    | `rate`                              |
//! | `http_reqs`          | `count`, `rate` (per second)        |
//! | `checks`             | `rate` (fraction passed)            |
//! | `iterations`         | `count`, `rate` (per second)        |
//! | `iteration_duration` | `avg`, `min`, `max`, `med`, `p(N)`  |
//!
//! Comparators are `<`, `<=`, `>`, `>=`, `==` and `!=`. A threshold on a metric
//! without any data fails, except for `count`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::metrics::{LoadTestMetrics, ResponseTimeHistogram};
use crate::LoadTestError;

lazy_static! {
    static ref EXPRESSION: Regex = Regex::new(
        r"^\s*(?P<aggregation>avg|min|max|med|rate|count|p\(\s*(?P<percent>\d+(?:\.\d+)?)\s*\))\s*(?P<comparator><=|>=|==|!=|<|>)\s*(?P<bound>-?\d+(?:\.\d+)?)\s*$"
    )
    .expect("threshold regex is valid");
}

/// The metrics thresholds can be defined on.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMetric {
    /// Request latency in milliseconds.
    HttpReqDuration,
    /// Fraction of failed requests.
    HttpReqFailed,
    /// Number of requests.
    HttpReqs,
    /// Fraction of passed checks.
    Checks,
    /// Number of completed iterations.
    Iterations,
    /// Iteration latency in milliseconds.
    IterationDuration,
}
impl ThresholdMetric {
    fn supports(&self, aggregation: &Aggregation) -> bool {
        use Aggregation::*;
        match self {
            ThresholdMetric::HttpReqDuration | ThresholdMetric::IterationDuration => {
                matches!(aggregation, Avg | Min | Max | Med | Percentile(_))
            }
            ThresholdMetric::HttpReqFailed | ThresholdMetric::Checks => {
                matches!(aggregation, Rate)
            }
            ThresholdMetric::HttpReqs | ThresholdMetric::Iterations => {
                matches!(aggregation, Count | Rate)
            }
        }
    }
}

/// How a metric is reduced to a single value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    /// `p(95)` is stored as `Percentile(95.0)`.
    Percentile(f64),
    Rate,
    Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Equal,
    NotEqual,
}
impl Comparator {
    pub fn compare(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparator::LessThan => observed < bound,
            Comparator::LessOrEqual => observed <= bound,
            Comparator::GreaterThan => observed > bound,
            Comparator::GreaterOrEqual => observed >= bound,
            Comparator::Equal => (observed - bound).abs() < f64::EPSILON,
            Comparator::NotEqual => (observed - bound).abs() >= f64::EPSILON,
        }
    }
}
impl FromStr for Comparator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Comparator::LessThan),
            "<=" => Ok(Comparator::LessOrEqual),
            ">" => Ok(Comparator::GreaterThan),
            ">=" => Ok(Comparator::GreaterOrEqual),
            "==" => Ok(Comparator::Equal),
            "!=" => Ok(Comparator::NotEqual),
            _ => Err(()),
        }
    }
}

/// A pass/fail condition on one metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: ThresholdMetric,
    pub aggregation: Aggregation,
    pub comparator: Comparator,
    pub bound: f64,
    /// The expression as written, ie `p(95)<500`.
    pub expression: String,
}
impl Threshold {
    /// Build a threshold from a metric and an expression.
    ///
    /// # Example
    /// ```rust
    /// use stampede::threshold::{Aggregation, Threshold, ThresholdMetric};
    ///
    /// let threshold = Threshold::new(ThresholdMetric::HttpReqDuration, "p(95)<500").unwrap();
    /// assert_eq!(threshold.aggregation, Aggregation::Percentile(95.0));
    /// assert_eq!(threshold.bound, 500.0);
    ///
    /// // Failures are a rate, not a latency.
    /// assert!(Threshold::new(ThresholdMetric::HttpReqFailed, "p(95)<500").is_err());
    /// ```
    pub fn new(metric: ThresholdMetric, expression: &str) -> Result<Self, LoadTestError> {
        let expression = expression.trim();
        let invalid = |detail: String| LoadTestError::InvalidThreshold {
            expression: format!("{}:{}", metric, expression),
            detail,
        };

        let captures = EXPRESSION.captures(expression).ok_or_else(|| {
            invalid(
                "expected {aggregation}{comparator}{number}, ie \"p(95)<500\" or \"rate<0.01\""
                    .to_string(),
            )
        })?;

        let aggregation = match &captures["aggregation"] {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "rate" => Aggregation::Rate,
            "count" => Aggregation::Count,
            _ => {
                let percent = captures
                    .name("percent")
                    .and_then(|percent| percent.as_str().parse::<f64>().ok())
                    .ok_or_else(|| invalid("invalid percentile".to_string()))?;
                if percent <= 0.0 || percent > 100.0 {
                    return Err(invalid(format!(
                        "percentile must be greater than 0 and at most 100, not {}",
                        percent
                    )));
                }
                Aggregation::Percentile(percent)
            }
        };
        if !metric.supports(&aggregation) {
            return Err(invalid(format!(
                "{} does not support {:?}",
                metric, aggregation
            )));
        }

        let comparator = Comparator::from_str(&captures["comparator"])
            .map_err(|_| invalid("invalid comparator".to_string()))?;
        let bound = captures["bound"]
            .parse::<f64>()
            .map_err(|_| invalid("invalid bound".to_string()))?;

        Ok(Threshold {
            metric,
            aggregation,
            comparator,
            bound,
            expression: expression.to_string(),
        })
    }

    /// The aggregated value of this threshold's metric, `None` if there is no data.
    pub fn observe(&self, metrics: &LoadTestMetrics) -> Option<f64> {
        match self.metric {
            ThresholdMetric::HttpReqDuration => {
                self.observe_times(&metrics.aggregated().response_times)
            }
            ThresholdMetric::IterationDuration => self.observe_times(&metrics.iteration_times),
            ThresholdMetric::HttpReqFailed => metrics.error_rate(),
            ThresholdMetric::Checks => metrics.check_pass_rate(),
            ThresholdMetric::HttpReqs => self.observe_count(metrics, metrics.aggregated().total()),
            ThresholdMetric::Iterations => self.observe_count(metrics, metrics.iterations),
        }
    }

    fn observe_times(&self, times: &ResponseTimeHistogram) -> Option<f64> {
        match self.aggregation {
            Aggregation::Avg => times.mean(),
            Aggregation::Min if !times.is_empty() => Some(times.min as f64),
            Aggregation::Max if !times.is_empty() => Some(times.max as f64),
            Aggregation::Med => times.median().map(|median| median as f64),
            Aggregation::Percentile(percent) => times
                .percentile(percent / 100.0)
                .map(|percentile| percentile as f64),
            _ => None,
        }
    }

    fn observe_count(&self, metrics: &LoadTestMetrics, count: usize) -> Option<f64> {
        match self.aggregation {
            Aggregation::Count => Some(count as f64),
            Aggregation::Rate if count > 0 => metrics.per_second(count),
            _ => None,
        }
    }

    /// Evaluate this threshold against `metrics`.
    pub fn evaluate(&self, metrics: &LoadTestMetrics) -> ThresholdOutcome {
        let observed = self.observe(metrics);
        let passed = observed
            .map(|value| self.comparator.compare(value, self.bound))
            .unwrap_or(false);
        ThresholdOutcome {
            threshold: self.clone(),
            observed,
            passed,
        }
    }
}

/// Parse `"{metric}:{expression}"`, ie `"http_req_duration:p(95)<500"`.
impl FromStr for Threshold {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, expression) =
            s.split_once(':')
                .ok_or_else(|| LoadTestError::InvalidThreshold {
                    expression: s.to_string(),
                    detail: "expected format \"{metric}:{expression}\", ie \"http_req_failed:rate<0.01\""
                        .to_string(),
                })?;
        let metric = ThresholdMetric::from_str(metric.trim()).map_err(|_| {
            LoadTestError::InvalidThreshold {
                expression: s.to_string(),
                detail: format!(
                    "unknown metric `{}`, expected one of: {}",
                    metric.trim(),
                    ThresholdMetric::iter()
                        .map(|metric| metric.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }
        })?;
        Threshold::new(metric, expression)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.expression)
    }
}

/// The result of evaluating one [`Threshold`].
#[derive(Clone, Debug, Serialize)]
pub struct ThresholdOutcome {
    pub threshold: Threshold,
    /// The aggregated value, `None` if the metric had no data.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// The final verdict of a load test.
#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub metrics: LoadTestMetrics,
    pub thresholds: Vec<ThresholdOutcome>,
    /// True if every threshold passed.
    pub passed: bool,
}
impl RunResult {
    /// How many thresholds failed.
    pub fn failures(&self) -> usize {
        self.thresholds
            .iter()
            .filter(|outcome| !outcome.passed)
            .count()
    }
}

/// Evaluate every threshold against the final metrics.
///
/// # Example
/// ```rust
/// use stampede::metrics::LoadTestMetrics;
/// use stampede::threshold::{self, Threshold};
///
/// let thresholds: Vec<Threshold> = vec![
///     "http_reqs:count==0".parse().unwrap(),
///     "http_req_failed:rate<0.01".parse().unwrap(),
/// ];
/// let result = threshold::evaluate(&LoadTestMetrics::default(), &thresholds);
/// // There were no requests: the count is 0, but the failure rate is unknown.
/// assert!(result.thresholds[0].passed);
/// assert!(!result.thresholds[1].passed);
/// assert!(!result.passed);
/// ```
pub fn evaluate(metrics: &LoadTestMetrics, thresholds: &[Threshold]) -> RunResult {
    let thresholds: Vec<ThresholdOutcome> = thresholds
        .iter()
        .map(|threshold| threshold.evaluate(metrics))
        .collect();
    let passed = thresholds.iter().all(|outcome| outcome.passed);
    RunResult {
        metrics: metrics.clone(),
        thresholds,
        passed,
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.metrics)?;

        if self.thresholds.is_empty() {
            return Ok(());
        }
        writeln!(
            fmt,
            "\n === THRESHOLDS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<48} | {:>14} | {:>8}", "Threshold", "Observed", "Result")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for outcome in &self.thresholds {
            let observed = match outcome.observed {
                Some(value) => format!("{:.2}", value),
                None => "no data".to_string(),
            };
            writeln!(
                fmt,
                " {:<48} | {:>14} | {:>8}",
                crate::util::truncate_string(&outcome.threshold.to_string(), 48),
                observed,
                if outcome.passed { "PASS" } else { "FAIL" },
            )?;
        }
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        if self.passed {
            writeln!(fmt, " All {} thresholds passed.", self.thresholds.len())
        } else {
            writeln!(
                fmt,
                " {} of {} thresholds failed.",
                self.failures(),
                self.thresholds.len()
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::{CheckSample, Metric, RequestSample};
    use std::time::Duration;

    fn metrics(latencies: &[u64], failures: usize) -> LoadTestMetrics {
        let mut metrics = LoadTestMetrics::default();
        for (index, latency) in latencies.iter().enumerate() {
            let success = index >= failures;
            metrics.ingest(Metric::Request(RequestSample {
                elapsed: Duration::ZERO,
                user: 0,
                name: "/".to_string(),
                url: "http://127.0.0.1/".to_string(),
                latency: Duration::from_millis(*latency),
                status_code: Some(if success { 200 } else { 500 }),
                error: None,
                success,
                update: false,
            }));
        }
        metrics.duration = Duration::from_secs(2);
        metrics
    }

    #[test]
    fn parse() {
        let threshold: Threshold = "http_req_duration:p(95)<500".parse().unwrap();
        assert_eq!(threshold.metric, ThresholdMetric::HttpReqDuration);
        assert_eq!(threshold.aggregation, Aggregation::Percentile(95.0));
        assert_eq!(threshold.comparator, Comparator::LessThan);
        assert_eq!(threshold.bound, 500.0);
        assert_eq!(threshold.to_string(), "http_req_duration: p(95)<500");

        let threshold: Threshold = " http_req_failed : rate <= 0.01 ".parse().unwrap();
        assert_eq!(threshold.aggregation, Aggregation::Rate);
        assert_eq!(threshold.comparator, Comparator::LessOrEqual);
        assert_eq!(threshold.bound, 0.01);

        let threshold: Threshold = "iteration_duration:p(99.9)>=1000".parse().unwrap();
        assert_eq!(threshold.aggregation, Aggregation::Percentile(99.9));
        assert_eq!(threshold.comparator, Comparator::GreaterOrEqual);

        for (text, comparator) in [
            ("http_reqs:count>10", Comparator::GreaterThan),
            ("http_reqs:count==10", Comparator::Equal),
            ("http_reqs:count!=10", Comparator::NotEqual),
        ] {
            let threshold: Threshold = text.parse().unwrap();
            assert_eq!(threshold.comparator, comparator);
        }
    }

    #[test]
    fn invalid() {
        for invalid in [
            "",
            "http_req_duration",
            "http_req_latency:p(95)<500",
            "http_req_duration:p95<500",
            "http_req_duration:p(0)<500",
            "http_req_duration:p(101)<500",
            "http_req_duration:p(95)~500",
            "http_req_duration:p(95)<",
            "http_req_duration:rate<0.01",
            "http_req_failed:avg<1",
            "checks:count>1",
            "iterations:med>1",
        ] {
            assert!(
                matches!(
                    invalid.parse::<Threshold>(),
                    Err(LoadTestError::InvalidThreshold { .. })
                ),
                "{:?} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn comparators() {
        assert!(Comparator::LessThan.compare(1.0, 2.0));
        assert!(!Comparator::LessThan.compare(2.0, 2.0));
        assert!(Comparator::LessOrEqual.compare(2.0, 2.0));
        assert!(Comparator::GreaterThan.compare(3.0, 2.0));
        assert!(Comparator::GreaterOrEqual.compare(2.0, 2.0));
        assert!(Comparator::Equal.compare(2.0, 2.0));
        assert!(Comparator::NotEqual.compare(2.0, 2.5));
    }

    #[test]
    fn evaluate_latency_and_failures() {
        let latencies: Vec<u64> = (1..=100).collect();
        let metrics = metrics(&latencies, 0);
        let thresholds: Vec<Threshold> = [
            "http_req_duration:p(95)<500",
            "http_req_duration:p(95)<=95",
            "http_req_duration:max<100",
            "http_req_duration:avg<50",
            "http_req_failed:rate<0.01",
            "http_reqs:count==100",
            "http_reqs:rate==50",
        ]
        .iter()
        .map(|text| text.parse().unwrap())
        .collect();

        let result = evaluate(&metrics, &thresholds);
        let passed: Vec<bool> = result.thresholds.iter().map(|o| o.passed).collect();
        assert_eq!(passed, vec![true, true, false, false, true, true, true]);
        assert_eq!(result.thresholds[3].observed, Some(50.5));
        assert!(!result.passed);
        assert_eq!(result.failures(), 2);
    }

    #[test]
    fn failures_fail_the_rate() {
        let metrics = metrics(&[10, 10, 10, 10], 1);
        let threshold: Threshold = "http_req_failed:rate<0.01".parse().unwrap();
        let outcome = threshold.evaluate(&metrics);
        assert_eq!(outcome.observed, Some(0.25));
        assert!(!outcome.passed);
    }

    #[test]
    fn no_data_fails_except_count() {
        let metrics = LoadTestMetrics::default();
        for (text, passes) in [
            ("http_req_duration:p(95)<500", false),
            ("http_req_duration:min>=0", false),
            ("http_req_failed:rate<0.01", false),
            ("checks:rate>0.9", false),
            ("iterations:rate>=0", false),
            ("iterations:count==0", true),
            ("http_reqs:count<1", true),
        ] {
            let threshold: Threshold = text.parse().unwrap();
            assert_eq!(threshold.evaluate(&metrics).passed, passes, "{}", text);
        }
        // Without thresholds nothing can fail.
        assert!(evaluate(&metrics, &[]).passed);
    }

    #[test]
    fn checks_rate() {
        let mut metrics = LoadTestMetrics::default();
        for success in [true, true, false, true] {
            metrics.ingest(Metric::Check(CheckSample {
                elapsed: Duration::ZERO,
                user: 0,
                name: "X-App-Version present".to_string(),
                success,
            }));
        }
        let passing: Threshold = "checks:rate>=0.75".parse().unwrap();
        let failing: Threshold = "checks:rate>0.9".parse().unwrap();
        assert!(passing.evaluate(&metrics).passed);
        assert!(!failing.evaluate(&metrics).passed);
    }

    #[test]
    fn display() {
        let metrics = metrics(&[10, 20], 0);
        let thresholds: Vec<Threshold> = vec![
            "http_req_duration:p(95)<500".parse().unwrap(),
            "http_req_failed:rate>0.5".parse().unwrap(),
        ];
        let report = evaluate(&metrics, &thresholds).to_string();
        assert!(report.contains("THRESHOLDS"));
        assert!(report.contains("PASS"));
        assert!(report.contains("FAIL"));
        assert!(report.contains("1 of 2 thresholds failed."));
    }
}
