use gumdrop::Options;
use httpmock::MockServer;

use stampede::config::Configuration;
use stampede::threshold::RunResult;
use stampede::{scenario, LoadTest};

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --url <mock-server>
///  --stages 500ms:2,1s:2,500ms:0
///  --pause 100ms
///  --quiet
///  --no-print-metrics
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> Configuration {
    // Start with an empty configuration.
    let mut configuration: Vec<&str> = vec![];
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.base_url();

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    // Default to using mock server if not otherwise configured.
    if !configuration.contains(&"--url") {
        configuration.extend_from_slice(&["--url", &server_url]);
    }

    // Default to a short ramp up, hold and ramp down if not otherwise configured.
    if !configuration.contains(&"--stages") {
        configuration.extend_from_slice(&["--stages", "500ms:2,1s:2,500ms:0"]);
    }

    // Default to a short pause so tests make plenty of requests.
    if !configuration.contains(&"--pause") {
        configuration.extend_from_slice(&["--pause", "100ms"]);
    }

    if !configuration.contains(&"-v") {
        configuration.push("-q");
    }
    configuration.push("--no-print-metrics");

    // Parse these options to generate a Configuration.
    Configuration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Run the built-in scenario with the provided configuration.
#[allow(dead_code)]
pub async fn run_http_get(configuration: Configuration) -> RunResult {
    LoadTest::initialize_with_config(configuration)
        .register_scenario(scenario::http_get().unwrap())
        .execute()
        .await
        .unwrap()
}

/// Total requests made to all endpoints.
#[allow(dead_code)]
pub fn total_requests(result: &RunResult) -> usize {
    result.metrics.aggregated().total()
}
