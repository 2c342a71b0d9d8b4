//! Utility functions used by Stampede, and available when writing load tests.

use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::time::Duration;
use url::Url;

use crate::{LoadTestError, CANCELED};

lazy_static! {
    static ref TIMESPAN: Regex = Regex::new(
        r"^(?:(?P<hours>\d+)h)?(?:(?P<minutes>\d+)m)?(?:(?P<seconds>\d+)s)?(?:(?P<millis>\d+)ms)?$"
    )
    .expect("timespan regex is valid");
}

/// Parse a string representing a time span.
///
/// Can be specified as an integer, indicating seconds. Or can use integers
/// together with one or more of "h", "m", "s" and "ms", in that order, indicating
/// "hours", "minutes", "seconds" and "milliseconds".
///
/// Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, 500ms, 1s250ms, etc.
/// Returns `None` for anything else, including negative values.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use stampede::util;
///
/// // 1 hour 2 minutes and 3 seconds.
/// assert_eq!(util::parse_timespan("1h2m3s"), Some(Duration::from_secs(3_723)));
///
/// // A bare integer is seconds.
/// assert_eq!(util::parse_timespan("45"), Some(Duration::from_secs(45)));
///
/// // Sub-second precision.
/// assert_eq!(util::parse_timespan("250ms"), Some(Duration::from_millis(250)));
///
/// // Invalid values are rejected.
/// assert_eq!(util::parse_timespan("foo"), None);
/// assert_eq!(util::parse_timespan("-5s"), None);
/// ```
pub fn parse_timespan(time_str: &str) -> Option<Duration> {
    let time_str = time_str.trim();
    if time_str.is_empty() {
        return None;
    }

    // If an integer is passed in, assume it's seconds.
    if let Ok(seconds) = u64::from_str(time_str) {
        trace!("{} is integer: {} seconds", time_str, seconds);
        return Some(Duration::from_secs(seconds));
    }

    let captures = TIMESPAN.captures(time_str)?;
    let field = |name: &str| -> Option<u64> {
        match captures.name(name) {
            Some(m) => u64::from_str(m.as_str()).ok(),
            None => Some(0),
        }
    };
    let hours = field("hours")?;
    let minutes = field("minutes")?;
    let seconds = field("seconds")?;
    let millis = field("millis")?;

    // Values too large for a Duration are invalid.
    let total_seconds = hours
        .checked_mul(60 * 60)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    let total = Duration::from_secs(total_seconds).checked_add(Duration::from_millis(millis))?;
    trace!(
        "{}: {} hours {} minutes {} seconds {} milliseconds",
        time_str,
        hours,
        minutes,
        seconds,
        millis
    );
    Some(total)
}

/// Parse the inter-iteration pause.
///
/// Either a single time span (`"1s"`) for a fixed pause, or two time spans joined
/// with a dash (`"500ms-2s"`) for a pause chosen randomly within that range. The
/// minimum must not exceed the maximum.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use stampede::util;
///
/// assert_eq!(
///     util::parse_pause("1s").unwrap(),
///     (Duration::from_secs(1), Duration::from_secs(1))
/// );
/// assert_eq!(
///     util::parse_pause("500ms-2s").unwrap(),
///     (Duration::from_millis(500), Duration::from_secs(2))
/// );
/// assert!(util::parse_pause("2s-1s").is_err());
/// ```
pub fn parse_pause(pause: &str) -> Result<(Duration, Duration), LoadTestError> {
    let invalid = |detail: &str| LoadTestError::InvalidOption {
        option: "--pause".to_string(),
        value: pause.to_string(),
        detail: detail.to_string(),
    };

    let (min, max) = match pause.split_once('-') {
        Some((min, max)) => (
            parse_timespan(min).ok_or_else(|| invalid("invalid minimum pause"))?,
            parse_timespan(max).ok_or_else(|| invalid("invalid maximum pause"))?,
        ),
        None => {
            let fixed = parse_timespan(pause)
                .ok_or_else(|| invalid("expected a time span like \"1s\" or \"500ms-2s\""))?;
            (fixed, fixed)
        }
    };

    if min > max {
        return Err(invalid("minimum pause is larger than maximum pause"));
    }
    Ok((min, max))
}

/// Truncate strings when they're too long to display.
///
/// If a string is longer than the specified max length, this function removes extra
/// the characters and replaces the last two with a double-period ellipsis.
///
/// # Example
/// ```rust
/// use stampede::util;
///
/// assert_eq!(util::truncate_string("this is a long string", 9), "this is..");
/// assert_eq!(util::truncate_string("shorter string", 15), "shorter string");
/// ```
pub fn truncate_string(str_to_truncate: &str, max_length: usize) -> String {
    if str_to_truncate.char_indices().count() > max_length {
        match str_to_truncate.char_indices().nth(max_length.saturating_sub(2)) {
            None => str_to_truncate.to_string(),
            Some((idx, _)) => format!("{}..", &str_to_truncate[..idx]),
        }
    } else {
        str_to_truncate.to_string()
    }
}

/// Determine if a timer expired, with second granularity.
///
/// A `run_time` of 0 disables the timer.
pub fn timer_expired(started: std::time::Instant, run_time: usize) -> bool {
    run_time > 0 && started.elapsed().as_secs() >= run_time as u64
}

/// Helper function to determine if a target URL can be parsed, returning it.
///
/// Only `http` and `https` are accepted.
///
/// # Example
/// ```rust
/// use stampede::util;
///
/// assert!(util::parse_target_url("http://localhost:8081").is_ok());
/// assert!(util::parse_target_url("https://example.com/health").is_ok());
///
/// // Protocol is required.
/// assert!(util::parse_target_url("example.com/").is_err());
/// // Only HTTP is load tested.
/// assert!(util::parse_target_url("ftp://example.com/").is_err());
/// ```
pub fn parse_target_url(url: &str) -> Result<Url, LoadTestError> {
    let parsed = Url::parse(url).map_err(|parse_error| LoadTestError::InvalidHost {
        host: url.to_string(),
        detail: "Invalid target url.".to_string(),
        parse_error: Some(parse_error),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(LoadTestError::InvalidHost {
            host: url.to_string(),
            detail: format!("Unsupported scheme `{}`, expected http or https.", scheme),
            parse_error: None,
        }),
    }
}

// Internal helper to configure the control-c handler. Shutdown cleanly on the first
// ctrl-c. Exit abruptly on the second ctrl-c.
pub(crate) fn setup_ctrlc_handler() {
    // A new load test always starts out not canceled.
    CANCELED.store(false, Ordering::SeqCst);

    if let Err(e) = ctrlc::set_handler(move || {
        // We've caught a ctrl-c, determine if it's the first time or an additional time.
        if CANCELED.swap(true, Ordering::SeqCst) {
            warn!("caught another ctrl-c, exiting immediately...");
            std::process::exit(1);
        } else {
            warn!("caught ctrl-c, stopping...");
        }
    }) {
        // The handler can only be installed once per process, which happens when
        // running multiple load tests (or tests) in the same process.
        debug!("ctrl-c handler already installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespan() {
        assert_eq!(parse_timespan("0"), Some(Duration::ZERO));
        assert_eq!(parse_timespan("foo"), None);
        assert_eq!(parse_timespan(""), None);
        assert_eq!(parse_timespan("1"), Some(Duration::from_secs(1)));
        assert_eq!(parse_timespan("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_timespan("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_timespan("61"), Some(Duration::from_secs(61)));
        assert_eq!(parse_timespan("1m1s"), Some(Duration::from_secs(61)));
        assert_eq!(parse_timespan("10m5s"), Some(Duration::from_secs(605)));
        assert_eq!(parse_timespan("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_timespan("1h15s"), Some(Duration::from_secs(3615)));
        assert_eq!(parse_timespan("3h3m5s"), Some(Duration::from_secs(10985)));
        assert_eq!(parse_timespan("88h88m88s"), Some(Duration::from_secs(322168)));
        assert_eq!(parse_timespan("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_timespan("1m500ms"), Some(Duration::from_millis(60_500)));
        assert_eq!(parse_timespan("1s250ms"), Some(Duration::from_millis(1_250)));
        assert_eq!(parse_timespan(" 30s "), Some(Duration::from_secs(30)));
        // Anything that isn't entirely a time span is rejected.
        assert_eq!(parse_timespan("15mins"), None);
        assert_eq!(parse_timespan("-10s"), None);
        assert_eq!(parse_timespan("1s1h"), None);
        // Too large for a Duration.
        assert_eq!(parse_timespan("9999999999999999h"), None);
        assert_eq!(parse_timespan("307445734561825861m"), None);
        assert_eq!(parse_timespan("18446744073709551615s1000ms"), None);
        assert_eq!(
            parse_timespan("18446744073709551615"),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn pause() {
        assert_eq!(
            parse_pause("0").unwrap(),
            (Duration::ZERO, Duration::ZERO)
        );
        assert_eq!(
            parse_pause("1s-1s").unwrap(),
            (Duration::from_secs(1), Duration::from_secs(1))
        );
        assert!(parse_pause("").is_err());
        assert!(parse_pause("1s-").is_err());
        assert!(parse_pause("fast").is_err());
    }

    #[test]
    fn truncate() {
        assert_eq!(
            truncate_string("the quick brown fox", 25),
            "the quick brown fox"
        );
        assert_eq!(truncate_string("the quick brown fox", 10), "the quic..");
        assert_eq!(truncate_string("abcde", 5), "abcde");
        assert_eq!(truncate_string("abcde", 4), "ab..");
        assert_eq!(truncate_string("abcde", 2), "..");
        assert_eq!(truncate_string("これはテストだ", 3), "こ..");
    }

    #[test]
    fn timer() {
        let started = std::time::Instant::now();

        // 60 second timer has not expired.
        assert!(!timer_expired(started, 60));

        // Timer is disabled.
        assert!(!timer_expired(started, 0));
    }

    #[test]
    fn target_url() {
        assert!(parse_target_url("http://example.com").is_ok());
        assert!(parse_target_url("http://127.0.0.1:8081/").is_ok());
        assert!(parse_target_url("https://www.example.com/and/with/path").is_ok());
        assert!(parse_target_url("example.com").is_err());
        assert!(parse_target_url("file:///path/to/file").is_err());
        assert!(parse_target_url("http://").is_err());
        assert!(parse_target_url("http:// example.com").is_err());
    }
}
