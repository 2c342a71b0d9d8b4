//! Optional metrics collected and aggregated during load tests.
//!
//! Virtual users send a [`Metric`] for every request, check and iteration over an
//! unbounded channel. The load test driver is the only consumer and folds them into
//! [`LoadTestMetrics`] with [`LoadTestMetrics::ingest`], so users never wait on a lock.
//!
//! Response times are stored in a [`ResponseTimeHistogram`] rather than as raw
//! samples: values under 100 milliseconds are kept exactly, larger values are rounded
//! to two significant digits. This bounds the error of any percentile to 5% no matter
//! how long the load test runs.

use chrono::prelude::*;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::stage::{StageAction, StageHistory};
use crate::util;

/// A single measurement sent from a virtual user to the driver.
#[derive(Debug, Clone)]
pub enum Metric {
    Request(RequestSample),
    Check(CheckSample),
    Iteration(IterationSample),
}

/// The outcome of one HTTP request.
#[derive(Debug, Clone)]
pub struct RequestSample {
    /// Time since the load test started.
    pub elapsed: Duration,
    /// The virtual user that made the request.
    pub user: usize,
    /// The name the request is aggregated under, the URL path unless renamed.
    pub name: String,
    pub url: String,
    /// How long the request took, including reading the body.
    pub latency: Duration,
    /// `None` if no response was received.
    pub status_code: Option<u16>,
    /// Why the request failed, if it did.
    pub error: Option<String>,
    pub success: bool,
    /// This corrects the success of a previously recorded sample.
    pub update: bool,
}
impl RequestSample {
    /// A correction marking a previously recorded request as failed.
    pub(crate) fn failure_update(original: &RequestSample) -> Self {
        RequestSample {
            success: false,
            update: true,
            error: None,
            ..original.clone()
        }
    }
}

/// The outcome of one named check.
#[derive(Debug, Clone)]
pub struct CheckSample {
    pub elapsed: Duration,
    pub user: usize,
    pub name: String,
    pub success: bool,
}

/// The outcome of one scenario iteration.
#[derive(Debug, Clone)]
pub struct IterationSample {
    pub elapsed: Duration,
    pub user: usize,
    pub duration: Duration,
    pub success: bool,
}

// Values under 100ms are exact, larger values are rounded to 2 significant digits.
fn round_response_time(response_time: usize) -> usize {
    if response_time < 100 {
        return response_time;
    }
    let mut magnitude = 1;
    let mut value = response_time;
    while value >= 100 {
        value /= 10;
        magnitude *= 10;
    }
    ((response_time + magnitude / 2) / magnitude) * magnitude
}

/// Counts of millisecond response times, in rounded buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseTimeHistogram {
    /// Rounded response time in milliseconds, and how many times it was seen.
    pub buckets: BTreeMap<usize, usize>,
    pub count: usize,
    /// Sum of all exact response times, for calculating the mean.
    pub total: usize,
    pub min: usize,
    pub max: usize,
}
impl ResponseTimeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response time, in milliseconds.
    pub fn record(&mut self, response_time: usize) {
        if self.count == 0 || response_time < self.min {
            self.min = response_time;
        }
        if response_time > self.max {
            self.max = response_time;
        }
        self.count += 1;
        self.total += response_time;
        *self
            .buckets
            .entry(round_response_time(response_time))
            .or_insert(0) += 1;
    }

    /// Record a [`Duration`], truncated to whole milliseconds.
    pub fn record_duration(&mut self, duration: Duration) {
        self.record(duration.as_millis() as usize);
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: &ResponseTimeHistogram) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 || other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
        self.count += other.count;
        self.total += other.total;
        for (response_time, count) in &other.buckets {
            *self.buckets.entry(*response_time).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> Option<f64> {
        match self.count {
            0 => None,
            _ => Some(self.total as f64 / self.count as f64),
        }
    }

    pub fn median(&self) -> Option<usize> {
        self.percentile(0.5)
    }

    /// The response time that `percent` (0.0 to 1.0) of requests finished within.
    ///
    /// # Example
    /// ```rust
    /// use stampede::metrics::ResponseTimeHistogram;
    ///
    /// let mut histogram = ResponseTimeHistogram::new();
    /// for response_time in 1..=100 {
    ///     histogram.record(response_time);
    /// }
    /// assert_eq!(histogram.percentile(0.5), Some(50));
    /// assert_eq!(histogram.percentile(0.95), Some(95));
    /// assert_eq!(histogram.percentile(1.0), Some(100));
    /// ```
    pub fn percentile(&self, percent: f64) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let percentile_request = (self.count as f64 * percent).round() as usize;
        trace!(
            "percentile: {}, request {} of total {}",
            percent,
            percentile_request,
            self.count
        );

        // The extremes are known exactly.
        if percentile_request <= 1 {
            return Some(self.min);
        } else if percentile_request >= self.count {
            return Some(self.max);
        }

        let mut total_count: usize = 0;
        for (value, counter) in &self.buckets {
            total_count += counter;
            if total_count >= percentile_request {
                // Rounding can move a bucket past the exact extremes.
                return Some((*value).clamp(self.min, self.max));
            }
        }
        Some(self.max)
    }
}

/// Everything known about requests sharing one name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestMetricAggregate {
    pub name: String,
    pub response_times: ResponseTimeHistogram,
    /// Responses per status code, 0 counts requests that received no response.
    pub status_code_counts: BTreeMap<u16, usize>,
    pub success_count: usize,
    pub fail_count: usize,
}
impl RequestMetricAggregate {
    pub(crate) fn new(name: &str) -> Self {
        RequestMetricAggregate {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.fail_count
    }

    fn record(&mut self, sample: &RequestSample) {
        self.response_times.record_duration(sample.latency);
        *self
            .status_code_counts
            .entry(sample.status_code.unwrap_or(0))
            .or_insert(0) += 1;
        if sample.success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
    }

    // Flip one previously recorded request between success and failure.
    fn update(&mut self, success: bool) {
        if success {
            if self.fail_count > 0 {
                self.fail_count -= 1;
                self.success_count += 1;
            }
        } else if self.success_count > 0 {
            self.success_count -= 1;
            self.fail_count += 1;
        }
    }

    fn merge(&mut self, other: &RequestMetricAggregate) {
        self.response_times.merge(&other.response_times);
        for (status_code, count) in &other.status_code_counts {
            *self.status_code_counts.entry(*status_code).or_insert(0) += count;
        }
        self.success_count += other.success_count;
        self.fail_count += other.fail_count;
    }
}

/// Passes and failures of one named check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckMetricAggregate {
    pub name: String,
    pub passes: usize,
    pub fails: usize,
}
impl CheckMetricAggregate {
    pub fn total(&self) -> usize {
        self.passes + self.fails
    }
}

/// For tracking and counting errors detected during a load test.
///
/// Errors with the same request name and the same error text are counted together.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMetric {
    pub name: String,
    pub error: String,
    pub occurrences: usize,
}

/// All metrics collected during a load test.
#[derive(Debug, Clone, Default)]
pub struct LoadTestMetrics {
    /// When the first stage started.
    pub started: Option<DateTime<Local>>,
    /// How long the load test ran.
    pub duration: Duration,
    /// The most virtual users running at the same time.
    pub max_users: usize,
    /// Per request name.
    pub requests: BTreeMap<String, RequestMetricAggregate>,
    /// Per check name.
    pub checks: BTreeMap<String, CheckMetricAggregate>,
    /// Keyed by request name and error text.
    pub errors: BTreeMap<String, ErrorMetric>,
    pub iterations: usize,
    pub iteration_failures: usize,
    pub iteration_times: ResponseTimeHistogram,
    /// Each stage as it started.
    pub history: Vec<StageHistory>,
    /// Set once the load test is finished, to display the complete report.
    pub final_metrics: bool,
}
impl LoadTestMetrics {
    /// Fold one [`Metric`] into the aggregate.
    pub fn ingest(&mut self, metric: Metric) {
        match metric {
            Metric::Request(sample) => self.ingest_request(sample),
            Metric::Check(sample) => {
                trace!("user {} check {}: {}", sample.user, sample.name, sample.success);
                let check = self
                    .checks
                    .entry(sample.name.clone())
                    .or_insert_with(|| CheckMetricAggregate {
                        name: sample.name,
                        ..Default::default()
                    });
                if sample.success {
                    check.passes += 1;
                } else {
                    check.fails += 1;
                }
            }
            Metric::Iteration(sample) => {
                self.iterations += 1;
                self.iteration_times.record_duration(sample.duration);
                if !sample.success {
                    self.iteration_failures += 1;
                }
            }
        }
    }

    fn ingest_request(&mut self, sample: RequestSample) {
        let request = self
            .requests
            .entry(sample.name.clone())
            .or_insert_with(|| RequestMetricAggregate::new(&sample.name));

        if sample.update {
            request.update(sample.success);
            return;
        }
        request.record(&sample);

        if let Some(error) = sample.error {
            let key = format!("{} {}", sample.name, error);
            self.errors
                .entry(key)
                .or_insert_with(|| ErrorMetric {
                    name: sample.name,
                    error,
                    occurrences: 0,
                })
                .occurrences += 1;
        }
    }

    /// Track the most virtual users seen running at once.
    pub(crate) fn record_users(&mut self, users: usize) {
        self.max_users = self.max_users.max(users);
    }

    /// All requests merged into one aggregate.
    pub fn aggregated(&self) -> RequestMetricAggregate {
        let mut aggregated = RequestMetricAggregate::new("Aggregated");
        for request in self.requests.values() {
            aggregated.merge(request);
        }
        aggregated
    }

    /// The fraction of requests that failed, `None` if there were no requests.
    pub fn error_rate(&self) -> Option<f64> {
        let aggregated = self.aggregated();
        match aggregated.total() {
            0 => None,
            total => Some(aggregated.fail_count as f64 / total as f64),
        }
    }

    /// The fraction of checks that passed, `None` if nothing was checked.
    pub fn check_pass_rate(&self) -> Option<f64> {
        let (passes, total) = self
            .checks
            .values()
            .fold((0, 0), |(passes, total), check| {
                (passes + check.passes, total + check.total())
            });
        match total {
            0 => None,
            _ => Some(passes as f64 / total as f64),
        }
    }

    /// How many `count` happened per second of load test.
    pub fn per_second(&self, count: usize) -> Option<f64> {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            Some(count as f64 / seconds)
        } else {
            None
        }
    }

    /// Display running metrics.
    pub(crate) fn print_running(&self) {
        info!(
            "printing running metrics after {} seconds...",
            self.duration.as_secs()
        );
        println!("{}", self);
    }

    /// Optionally prepares a table of the load test stages.
    pub(crate) fn fmt_overview(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.final_metrics || self.history.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === OVERVIEW ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<12} | {:<20} | {:>16} | {:>17}",
            "Action", "Started", "Users", "Planned duration"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for step in &self.history {
            let users = match step.action {
                StageAction::Finished => format_number(step.from),
                _ => format!("{} -> {}", format_number(step.from), format_number(step.to)),
            };
            writeln!(
                fmt,
                " {:<12} | {:<20} | {:>16} | {:>17}",
                format!("{:?}", step.action),
                step.timestamp
                    .with_timezone(&Local)
                    .format("%y-%m-%d %H:%M:%S")
                    .to_string(),
                users,
                format!("{:?}", step.duration),
            )?;
        }
        if let Some(started) = self.started {
            writeln!(
                fmt,
                " ------------------------------------------------------------------------------"
            )?;
            writeln!(
                fmt,
                " Target: {} users max, started {}, ran {:.1}s",
                format_number(self.max_users),
                started.format("%y-%m-%d %H:%M:%S"),
                self.duration.as_secs_f64()
            )?;
        }

        Ok(())
    }

    /// Optionally prepares a table of requests and fails.
    pub(crate) fn fmt_requests(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === PER REQUEST METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "Name", "# reqs", "# fails", "req/s", "fail/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter() {
            self.fmt_request_row(fmt, &util::truncate_string(request_key, 24), request)?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+---------------+----------------+----------+--------"
            )?;
            self.fmt_request_row(fmt, "Aggregated", &self.aggregated())?;
        }

        Ok(())
    }

    fn fmt_request_row(
        &self,
        fmt: &mut fmt::Formatter<'_>,
        name: &str,
        request: &RequestMetricAggregate,
    ) -> fmt::Result {
        let total_count = request.total();
        let fail_percent = match request.fail_count {
            0 => 0.0,
            _ => request.fail_count as f32 / total_count as f32 * 100.0,
        };
        let reqs = self.per_second(total_count).unwrap_or(0.0) as f32;
        let fails = self.per_second(request.fail_count).unwrap_or(0.0) as f32;

        // Compress 100.0 and 0.0 to 100 and 0 respectively to save width.
        let fail_column = if fail_percent as usize == 100 || fail_percent as usize == 0 {
            format!(
                "{} ({}%)",
                format_number(request.fail_count),
                fail_percent as usize
            )
        } else {
            format!(
                "{} ({:.1}%)",
                format_number(request.fail_count),
                fail_percent
            )
        };
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8.reqs_p$} | {:>7.fails_p$}",
            name,
            format_number(total_count),
            fail_column,
            reqs,
            fails,
            reqs_p = determine_precision(reqs),
            fails_p = determine_precision(fails),
        )
    }

    /// Optionally prepares a table of response times.
    pub(crate) fn fmt_response_times(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>11} | {:>10} | {:>10} | {:>11}",
            "Name", "Avg (ms)", "Min", "Max", "Median"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter() {
            fmt_times_row(
                fmt,
                &util::truncate_string(request_key, 24),
                &request.response_times,
            )?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+-------------+------------+------------+-------------"
            )?;
            fmt_times_row(fmt, "Aggregated", &self.aggregated().response_times)?;
        }

        Ok(())
    }

    /// Optionally prepares a table of slowest response times within several percentiles.
    pub(crate) fn fmt_percentiles(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only include percentiles when displaying the final metrics report.
        if !self.final_metrics || self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " Slowest page load within specified percentile of requests (in ms):"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
            "Name", "50%", "75%", "90%", "95%", "99%", "99.9%"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter() {
            fmt_percentiles_row(
                fmt,
                &util::truncate_string(request_key, 24),
                &request.response_times,
            )?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+--------+--------+--------+--------+--------+-------"
            )?;
            fmt_percentiles_row(fmt, "Aggregated", &self.aggregated().response_times)?;
        }

        Ok(())
    }

    /// Optionally prepares a table of response status codes.
    pub(crate) fn fmt_status_codes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<24} | {:>51} ", "Name", "Status codes")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter() {
            writeln!(
                fmt,
                " {:<24} | {:>51}",
                util::truncate_string(request_key, 24),
                prepare_status_codes(&request.status_code_counts),
            )?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+----------------------------------------------------"
            )?;
            writeln!(
                fmt,
                " {:<24} | {:>51} ",
                "Aggregated",
                prepare_status_codes(&self.aggregated().status_code_counts)
            )?;
        }

        Ok(())
    }

    /// Optionally prepares a table of checks and iterations.
    pub(crate) fn fmt_checks(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.checks.is_empty() && self.iterations == 0 {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === CHECKS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>19}",
            "Name", "# passes", "# fails", "pass rate"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (check_key, check) in self.checks.iter() {
            let rate = match check.total() {
                0 => 0.0,
                total => check.passes as f64 / total as f64 * 100.0,
            };
            writeln!(
                fmt,
                " {:<24} | {:>13} | {:>14} | {:>18.2}%",
                util::truncate_string(check_key, 24),
                format_number(check.passes),
                format_number(check.fails),
                rate,
            )?;
        }
        if self.iterations > 0 {
            writeln!(
                fmt,
                " -------------------------+---------------+----------------+--------------------"
            )?;
            writeln!(
                fmt,
                " {:<24} | {:>13} | {:>14} | {:>19}",
                "Iterations",
                format_number(self.iterations - self.iteration_failures),
                format_number(self.iteration_failures),
                format!(
                    "{:.2}/s",
                    self.per_second(self.iterations).unwrap_or(0.0)
                ),
            )?;
            fmt_times_row(fmt, "Iteration time (ms)", &self.iteration_times)?;
        }

        Ok(())
    }

    /// Optionally prepares a table of errors.
    pub(crate) fn fmt_errors(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only include errors when displaying the final metrics report, and if there are
        // errors to display.
        if !self.final_metrics || self.errors.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === ERRORS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<11} | Error", "Count")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;

        // Reverse sort errors to display the error occurring the most first.
        for (occurrences, error) in self
            .errors
            .values()
            .map(|error| (error.occurrences, format!("{}: {}", error.name, error.error)))
            .sorted()
            .rev()
        {
            writeln!(fmt, " {:<12}  {}", format_number(occurrences), error)?;
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;

        Ok(())
    }
}

impl Serialize for LoadTestMetrics {
    // Serialization can't be derived because of the started and history fields.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct HistoryRecord {
            action: StageAction,
            timestamp: String,
            from: usize,
            to: usize,
            duration_ms: u128,
        }
        let history: Vec<HistoryRecord> = self
            .history
            .iter()
            .map(|step| HistoryRecord {
                action: step.action,
                timestamp: step.timestamp.to_rfc3339(),
                from: step.from,
                to: step.to,
                duration_ms: step.duration.as_millis(),
            })
            .collect();

        let mut s = serializer.serialize_struct("LoadTestMetrics", 11)?;
        s.serialize_field("started", &self.started.map(|started| started.to_rfc3339()))?;
        s.serialize_field("duration", &self.duration.as_secs_f64())?;
        s.serialize_field("max_users", &self.max_users)?;
        s.serialize_field("requests", &self.requests)?;
        s.serialize_field("aggregated", &self.aggregated())?;
        s.serialize_field("checks", &self.checks)?;
        s.serialize_field("errors", &self.errors.values().collect::<Vec<_>>())?;
        s.serialize_field("iterations", &self.iterations)?;
        s.serialize_field("iteration_failures", &self.iteration_failures)?;
        s.serialize_field("iteration_times", &self.iteration_times)?;
        s.serialize_field("history", &history)?;
        s.end()
    }
}

/// Implement format trait to allow displaying metrics.
impl fmt::Display for LoadTestMetrics {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_overview(fmt)?;
        self.fmt_requests(fmt)?;
        self.fmt_response_times(fmt)?;
        self.fmt_percentiles(fmt)?;
        self.fmt_status_codes(fmt)?;
        self.fmt_checks(fmt)?;
        self.fmt_errors(fmt)
    }
}

fn fmt_times_row(
    fmt: &mut fmt::Formatter<'_>,
    name: &str,
    times: &ResponseTimeHistogram,
) -> fmt::Result {
    let average = times.mean().unwrap_or(0.0) as f32;
    writeln!(
        fmt,
        " {:<24} | {:>11.avg_precision$} | {:>10} | {:>10} | {:>11}",
        name,
        average,
        format_number(times.min),
        format_number(times.max),
        format_number(times.median().unwrap_or(0)),
        avg_precision = determine_precision(average),
    )
}

fn fmt_percentiles_row(
    fmt: &mut fmt::Formatter<'_>,
    name: &str,
    times: &ResponseTimeHistogram,
) -> fmt::Result {
    let p = |percent| format_number(times.percentile(percent).unwrap_or(0));
    writeln!(
        fmt,
        " {:<24} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
        name,
        p(0.5),
        p(0.75),
        p(0.9),
        p(0.95),
        p(0.99),
        p(0.999),
    )
}

/// Status codes as `"count [code], count [code]"`, 0 shown as `none`.
fn prepare_status_codes(status_code_counts: &BTreeMap<u16, usize>) -> String {
    status_code_counts
        .iter()
        .map(|(status_code, count)| match status_code {
            0 => format!("{} [none]", format_number(*count)),
            _ => format!("{} [{}]", format_number(*count), status_code),
        })
        .join(", ")
}

fn determine_precision(value: f32) -> usize {
    if value < 1000.0 {
        2
    } else {
        0
    }
}

/// Format large number in locale appropriate style.
pub(crate) fn format_number(number: usize) -> String {
    (number).to_formatted_string(&Locale::en)
}
