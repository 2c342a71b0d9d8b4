//! Virtual users: independent clients that repeatedly run one scenario.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::client::{HttpResponse, RequestError, RequestExecutor};
use crate::config::Configuration;
use crate::metrics::{CheckSample, IterationSample, Metric, RequestSample};
use crate::scenario::Scenario;
use crate::LoadTestError;

/// Commands sent from the pool to a running virtual user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserCommand {
    /// Stop at the next iteration boundary.
    Exit,
}

/// One virtual user, passed to every iteration of its scenario.
#[derive(Debug)]
pub struct VirtualUser {
    /// Unique per load test, starting at 1.
    pub number: usize,
    /// How many iterations this user completed so far.
    pub iteration: usize,
    base_url: Url,
    executor: RequestExecutor,
    configuration: Arc<Configuration>,
    metrics_tx: flume::Sender<Metric>,
    // When the load test started, for timestamping samples.
    started: Instant,
    // The most recent request, so a failed check can mark it as failed.
    last_request: Option<RequestSample>,
}
impl VirtualUser {
    pub(crate) fn new(
        number: usize,
        base_url: Url,
        configuration: Arc<Configuration>,
        metrics_tx: flume::Sender<Metric>,
        started: Instant,
    ) -> Result<Self, LoadTestError> {
        trace!("new user {}", number);
        Ok(VirtualUser {
            number,
            iteration: 0,
            base_url,
            executor: RequestExecutor::new(&configuration)?,
            configuration,
            metrics_tx,
            started,
            last_request: None,
        })
    }

    /// The configuration of the running load test.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Build a URL from a path relative to the target URL, or from an absolute URL.
    ///
    /// An empty path is the target URL itself.
    pub fn build_url(&self, path: &str) -> Result<Url, RequestError> {
        // Absolute URLs are used as is.
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        self.base_url
            .join(path)
            .map_err(|parse_error| RequestError::InvalidUrl {
                url: path.to_string(),
                parse_error,
            })
    }

    /// GET `path`, recording the request under its URL path.
    pub async fn get(&mut self, path: &str) -> Result<HttpResponse, RequestError> {
        self.get_named(path, None).await
    }

    /// GET `path`, recording the request under `name` if set.
    ///
    /// Responses without a 2xx status code are recorded as failures, but are still
    /// returned. Errors are recorded and returned.
    pub async fn get_named(
        &mut self,
        path: &str,
        name: Option<&str>,
    ) -> Result<HttpResponse, RequestError> {
        let started = std::time::Instant::now();
        let result = match self.build_url(path) {
            Ok(url) => self.executor.get(url.as_str()).await,
            Err(error) => Err(error),
        };

        let request_name = match (name, &result) {
            (Some(name), _) => name.to_string(),
            (None, Ok(response)) => response.url.path().to_string(),
            (None, Err(_)) => match self.build_url(path) {
                Ok(url) => url.path().to_string(),
                Err(_) => path.to_string(),
            },
        };

        let sample = match &result {
            Ok(response) => {
                let success = response.status.is_success();
                if !success {
                    debug!("{}: status_code {}", request_name, response.status);
                }
                RequestSample {
                    elapsed: self.started.elapsed(),
                    user: self.number,
                    name: request_name,
                    url: response.url.to_string(),
                    latency: response.latency,
                    status_code: Some(response.status.as_u16()),
                    error: match success {
                        true => None,
                        false => Some(response.status.to_string()),
                    },
                    success,
                    update: false,
                }
            }
            Err(error) => {
                warn!("{}: {}", request_name, error);
                RequestSample {
                    elapsed: self.started.elapsed(),
                    user: self.number,
                    name: request_name,
                    url: path.to_string(),
                    latency: started.elapsed(),
                    status_code: None,
                    error: Some(error.to_string()),
                    success: false,
                    update: false,
                }
            }
        };

        self.send_to_parent(Metric::Request(sample.clone()));
        self.last_request = Some(sample);
        result
    }

    /// Run a named check against a response and record whether it passed.
    ///
    /// A failed check also marks the most recent request as failed.
    ///
    /// # Example
    /// ```rust
    /// use stampede::prelude::*;
    ///
    /// async fn loadtest_index(user: &mut VirtualUser) -> IterationResult {
    ///     let response = user.get("/").await?;
    ///     user.check(&response, "has a body", |response| !response.body.is_empty());
    ///     Ok(())
    /// }
    /// ```
    pub fn check<F>(&mut self, response: &HttpResponse, name: &str, condition: F) -> bool
    where
        F: FnOnce(&HttpResponse) -> bool,
    {
        let success = condition(response);
        self.record_check(name, success);
        if !success {
            self.set_failure();
        }
        success
    }

    /// Record the outcome of a named check without a response.
    pub fn record_check(&mut self, name: &str, success: bool) {
        self.send_to_parent(Metric::Check(CheckSample {
            elapsed: self.started.elapsed(),
            user: self.number,
            name: name.to_string(),
            success,
        }));
    }

    /// Manually mark the most recent request as a failure.
    pub fn set_failure(&mut self) {
        let update = match self.last_request.as_mut() {
            // Already counted as a failure.
            Some(request) if request.success => {
                request.success = false;
                RequestSample::failure_update(request)
            }
            _ => return,
        };
        self.send_to_parent(Metric::Request(update));
    }

    fn send_to_parent(&self, metric: Metric) {
        // The receiver only goes away once the load test is over.
        if let Err(e) = self.metrics_tx.send(metric) {
            debug!("user {} failed to send metric: {}", self.number, e);
        }
    }
}

// Returns true if an Exit command was received, or the pool went away.
fn received_exit(receiver: &flume::Receiver<UserCommand>) -> bool {
    match receiver.try_recv() {
        Ok(UserCommand::Exit) | Err(flume::TryRecvError::Disconnected) => true,
        Err(flume::TryRecvError::Empty) => false,
    }
}

fn pause_duration(pause: (Duration, Duration)) -> Duration {
    let (min, max) = pause;
    if min >= max {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Run one virtual user until it is told to exit.
///
/// The exit command is only checked between iterations, so an iteration in
/// progress always completes.
pub(crate) async fn user_main(
    mut user: VirtualUser,
    scenario: Scenario,
    pause: (Duration, Duration),
    receiver: flume::Receiver<UserCommand>,
) {
    debug!("launching user {} running {}", user.number, scenario.name);

    loop {
        if received_exit(&receiver) {
            break;
        }

        let iteration_started = std::time::Instant::now();
        let result = (scenario.function)(&mut user).await;
        if let Err(e) = &result {
            debug!(
                "user {} iteration {} failed: {}",
                user.number, user.iteration, e
            );
        }
        user.send_to_parent(Metric::Iteration(IterationSample {
            elapsed: user.started.elapsed(),
            user: user.number,
            duration: iteration_started.elapsed(),
            success: result.is_ok(),
        }));
        user.iteration += 1;

        let pause = pause_duration(pause);
        if pause.is_zero() {
            // Let other users and the driver run.
            tokio::task::yield_now().await;
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(pause) => {},
            // An exit command, or the pool went away.
            _ = receiver.recv_async() => break,
        }
    }

    debug!(
        "exiting user {} after {} iterations",
        user.number, user.iteration
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn user(server: &MockServer) -> (VirtualUser, flume::Receiver<Metric>) {
        let (metrics_tx, metrics_rx) = flume::unbounded();
        let user = VirtualUser::new(
            1,
            Url::parse(&server.base_url()).unwrap(),
            Arc::new(Configuration::default()),
            metrics_tx,
            Instant::now(),
        )
        .unwrap();
        (user, metrics_rx)
    }

    #[tokio::test]
    async fn build_url() {
        let server = MockServer::start();
        let (user, _metrics_rx) = user(&server);
        assert_eq!(user.build_url("").unwrap().as_str(), server.url("/"));
        assert_eq!(user.build_url("/about").unwrap().as_str(), server.url("/about"));
        assert_eq!(
            user.build_url("https://example.com/elsewhere").unwrap().as_str(),
            "https://example.com/elsewhere"
        );
    }

    #[tokio::test]
    async fn records_requests() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        });
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });
        let (mut user, metrics_rx) = user(&server);

        let response = user.get("/").await.unwrap();
        assert_eq!(response.status.as_u16(), 200);
        let response = user.get_named("/missing", Some("not found")).await.unwrap();
        assert_eq!(response.status.as_u16(), 404);

        let samples: Vec<RequestSample> = metrics_rx
            .drain()
            .filter_map(|metric| match metric {
                Metric::Request(sample) => Some(sample),
                _ => None,
            })
            .collect();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name, "/");
        assert!(samples[0].success);
        assert_eq!(samples[1].name, "not found");
        assert_eq!(samples[1].status_code, Some(404));
        assert!(!samples[1].success);
        assert!(samples[1].error.is_some());
    }

    #[tokio::test]
    async fn failed_check_marks_request_failed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        });
        let (mut user, metrics_rx) = user(&server);

        let response = user.get("/").await.unwrap();
        assert!(user.check(&response, "status is 200", |r| r.status.as_u16() == 200));
        assert!(!user.check(&response, "X-App-Version present", |r| r.has_header("X-App-Version")));
        // A second failed check doesn't count the request twice.
        assert!(!user.check(&response, "has body", |r| !r.body.is_empty()));

        let metrics: Vec<Metric> = metrics_rx.drain().collect();
        let updates = metrics
            .iter()
            .filter(|metric| matches!(metric, Metric::Request(sample) if sample.update))
            .count();
        let checks = metrics
            .iter()
            .filter(|metric| matches!(metric, Metric::Check(_)))
            .count();
        assert_eq!(updates, 1);
        assert_eq!(checks, 3);
    }

    #[tokio::test]
    async fn unreachable_host_is_recorded() {
        let (metrics_tx, metrics_rx) = flume::unbounded();
        let mut user = VirtualUser::new(
            1,
            Url::parse("http://127.0.0.1:1").unwrap(),
            Arc::new(Configuration::default()),
            metrics_tx,
            Instant::now(),
        )
        .unwrap();

        let error = user.get("/").await.unwrap_err();
        assert!(error.is_network());
        match metrics_rx.try_recv().unwrap() {
            Metric::Request(sample) => {
                assert_eq!(sample.name, "/");
                assert_eq!(sample.status_code, None);
                assert!(!sample.success);
                assert!(sample.error.is_some());
            }
            other => panic!("unexpected metric: {:?}", other),
        }
    }

    #[test]
    fn pause_range() {
        let fixed = Duration::from_millis(250);
        assert_eq!(pause_duration((fixed, fixed)), fixed);
        for _ in 0..100 {
            let pause = pause_duration((Duration::from_millis(10), Duration::from_millis(20)));
            assert!(pause >= Duration::from_millis(10));
            assert!(pause <= Duration::from_millis(20));
        }
    }
}
