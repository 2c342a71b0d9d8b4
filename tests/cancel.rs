/// Validate that a load test stops early when canceled, and still reports.
use httpmock::{Method::GET, Mock, MockServer};
use serial_test::serial;
use tokio::time::{sleep, Duration};

mod common;

use stampede::config::SERVICE_URL_ENV;
use stampede::prelude::*;
use stampede::stage::StageAction;

// Paths used in load tests performed during these tests.
const INDEX_PATH: &str = "/";

// All tests in this file run against a common endpoint.
fn setup_mock_server_endpoints(server: &MockServer) -> Vec<Mock> {
    vec![server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(200).header("X-App-Version", "1.0");
    })]
}

// Cancel the load test after a delay.
async fn cancel_load_test(cancel_handle: CancelHandle, duration: Duration) {
    sleep(duration).await;
    cancel_handle.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// Cancel a load test configured to run for a minute.
async fn test_cancel() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let configuration =
        common::build_configuration(&server, vec!["--stages", "0s:3,1m:3", "--pause", "50ms"]);
    let load_test = LoadTest::initialize_with_config(configuration)
        .register_scenario(scenario::http_get().unwrap());

    // Start a task that will cancel the running load test.
    let _ = tokio::spawn(cancel_load_test(
        load_test.cancel_handle(),
        Duration::from_millis(1_500),
    ));

    let started = std::time::Instant::now();
    let result = load_test.execute().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(30));

    // Requests made before canceling are still counted and evaluated.
    let hits = mock_endpoints[0].hits();
    assert!(hits > 0);
    assert_eq!(common::total_requests(&result), hits);
    assert_eq!(result.metrics.max_users, 3);
    assert!(result.passed, "{}", result);
    assert_eq!(
        result.metrics.history.last().map(|history| history.action),
        Some(StageAction::Finished)
    );
}
