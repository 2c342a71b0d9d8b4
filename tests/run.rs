/// Run the built-in scenario against a mock service and validate the verdict.
use gumdrop::Options;
use httpmock::{Method::GET, Mock, MockServer};
use serial_test::serial;

mod common;

use stampede::config::SERVICE_URL_ENV;
use stampede::prelude::*;
use stampede::stage::StageAction;

// Paths used in load tests performed during these tests.
const INDEX_PATH: &str = "/";

// Header the built-in scenario expects by default.
const VERSION_HEADER: &str = "X-App-Version";

// There are multiple test variations in this file.
enum TestType {
    // Every response is a 200 with the expected header.
    Healthy,
    // Every response is a 200 without the expected header.
    MissingHeader,
    // Every response is a 503.
    Unavailable,
}

// All tests in this file run against a single endpoint.
fn setup_mock_server_endpoints<'a>(server: &'a MockServer, test_type: &TestType) -> Vec<Mock<'a>> {
    vec![server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        match test_type {
            TestType::Healthy => {
                then.status(200).header(VERSION_HEADER, "1.2.3").body("ok");
            }
            TestType::MissingHeader => {
                then.status(200).body("ok");
            }
            TestType::Unavailable => {
                then.status(503);
            }
        }
    })]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// All requests succeed with the expected header: every default threshold passes.
async fn test_healthy_target_passes() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::Healthy);

    let configuration = common::build_configuration(&server, vec![]);
    let result = common::run_http_get(configuration).await;

    assert!(result.passed, "{}", result);
    assert_eq!(result.failures(), 0);
    // The built-in scenario's own thresholds were evaluated.
    assert_eq!(result.thresholds.len(), 2);

    let requests = common::total_requests(&result);
    assert!(requests > 0);
    assert_eq!(mock_endpoints[0].hits(), requests);
    assert_eq!(result.metrics.error_rate(), Some(0.0));
    assert_eq!(result.metrics.check_pass_rate(), Some(1.0));
    assert!(result.metrics.errors.is_empty());

    // Ramped up to 2 users, held, then ramped down.
    assert_eq!(result.metrics.max_users, 2);
    let actions: Vec<StageAction> = result
        .metrics
        .history
        .iter()
        .map(|history| history.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            StageAction::Increasing,
            StageAction::Maintaining,
            StageAction::Decreasing,
            StageAction::Finished
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// The expected header is missing: checks fail and so do the thresholds.
async fn test_missing_header_fails() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::MissingHeader);

    let configuration = common::build_configuration(&server, vec![]);
    let result = common::run_http_get(configuration).await;

    assert!(mock_endpoints[0].hits() > 0);
    assert!(!result.passed);

    let status_check = &result.metrics.checks["status is 200"];
    assert!(status_check.passes > 0);
    assert_eq!(status_check.fails, 0);
    let header_check = &result.metrics.checks["X-App-Version present"];
    assert_eq!(header_check.passes, 0);
    assert_eq!(header_check.fails, mock_endpoints[0].hits());

    // A failed check marks its request as failed.
    assert_eq!(result.metrics.error_rate(), Some(1.0));
    assert_eq!(result.metrics.iteration_failures, result.metrics.iterations);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// Thresholds on the command line replace the scenario's thresholds.
async fn test_command_line_thresholds() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::MissingHeader);

    let configuration = common::build_configuration(
        &server,
        vec!["--threshold", "http_reqs:count>0", "--expect-header", ""],
    );
    let result = common::run_http_get(configuration).await;

    assert!(mock_endpoints[0].hits() > 0);
    assert!(result.passed, "{}", result);
    assert_eq!(result.thresholds.len(), 1);
    // The header check was disabled.
    assert!(!result.metrics.checks.contains_key("X-App-Version present"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// The service is unavailable: status codes are recorded, thresholds fail.
async fn test_unavailable_target_fails() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::Unavailable);

    let configuration = common::build_configuration(
        &server,
        vec!["--threshold", "http_req_failed:rate<0.5", "--threshold", "checks:rate>0.9"],
    );
    let result = common::run_http_get(configuration).await;

    let hits = mock_endpoints[0].hits();
    assert!(hits > 0);
    assert!(!result.passed);
    assert_eq!(result.failures(), 2);
    assert_eq!(result.metrics.aggregated().status_code_counts.get(&503), Some(&hits));
    assert_eq!(result.metrics.errors.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// SERVICE_URL replaces --url.
async fn test_service_url_overrides_url() {
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::Healthy);

    std::env::set_var(SERVICE_URL_ENV, server.base_url());
    let configuration =
        common::build_configuration(&server, vec!["--url", "http://127.0.0.1:1"]);
    let result = common::run_http_get(configuration).await;
    std::env::remove_var(SERVICE_URL_ENV);

    assert!(mock_endpoints[0].hits() > 0);
    assert!(result.passed, "{}", result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// Configuration errors are reported before any traffic is generated.
async fn test_invalid_configuration() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::Healthy);

    for custom in [
        vec!["--stages", "10s:abc"],
        vec!["--url", "localhost:8081"],
        vec!["--pause", "2s-1s"],
        vec!["unknown-scenario"],
    ] {
        let configuration = match Configuration::parse_args_default(&custom) {
            // Rejected while parsing the command line.
            Err(_) => continue,
            Ok(_) => common::build_configuration(&server, custom),
        };
        let error = LoadTest::initialize_with_config(configuration)
            .register_scenario(scenario::http_get().unwrap())
            .execute()
            .await
            .unwrap_err();
        match error {
            LoadTestError::InvalidHost { .. }
            | LoadTestError::InvalidOption { .. }
            | LoadTestError::UnknownScenario { .. } => (),
            other => panic!("unexpected error: {}", other),
        }
    }

    // Stages are required.
    let server_url = server.base_url();
    let configuration = Configuration::parse_args_default(&["--url", server_url.as_str()]).unwrap();
    let error = LoadTest::initialize_with_config(configuration)
        .register_scenario(scenario::http_get().unwrap())
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(error, LoadTestError::InvalidStage { .. }));

    mock_endpoints[0].assert_hits(0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// Asking for the version doesn't start a load test.
async fn test_version() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::Healthy);

    let configuration = common::build_configuration(&server, vec!["http-get", "-V"]);
    assert!(configuration.version);
    let result = common::run_http_get(configuration).await;
    assert!(result.passed);
    assert!(result.thresholds.is_empty());
    assert_eq!(common::total_requests(&result), 0);

    mock_endpoints[0].assert_hits(0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
// The summary is exported as JSON.
async fn test_summary_export() {
    std::env::remove_var(SERVICE_URL_ENV);
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server, &TestType::Healthy);

    let summary_file = "run-summary-export.json";
    let configuration = common::build_configuration(
        &server,
        vec!["--stages", "1s:1", "--summary-export", summary_file],
    );
    let result = common::run_http_get(configuration).await;
    assert!(mock_endpoints[0].hits() > 0);

    let contents = std::fs::read_to_string(summary_file).unwrap();
    std::fs::remove_file(summary_file).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(summary["passed"], result.passed);
    assert_eq!(
        summary["thresholds"].as_array().map(|thresholds| thresholds.len()),
        Some(2)
    );
}
