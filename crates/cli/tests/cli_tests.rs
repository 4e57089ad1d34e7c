//! CLI integration tests

use std::process::Command;

fn run_qosctl(args: &[&str]) -> std::process::Output {
    let mut all_args = vec!["run", "-p", "qos-cli", "--quiet", "--"];
    all_args.extend_from_slice(args);
    Command::new("cargo")
        .args(&all_args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_qosctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("QoS ensurance agent"),
        "Should show app description"
    );
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("health"), "Should show health command");
    assert!(stdout.contains("actions"), "Should show actions command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_qosctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("qosctl"), "Should show binary name");
}

/// Test status against a mocked agent API
#[test]
fn test_status_json_output() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"policy":"node-cpu","objective":"cpu-usage","phase":"triggered",
                 "raisingCount":0,"loweringCount":1,"pendingAction":false,
                 "lastEnactment":"2023-11-14T22:13:20+00:00"}]"#,
        )
        .create();

    let output = run_qosctl(&["--api-url", &server.url(), "--format", "json", "status"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    mock.assert();
    assert!(output.status.success(), "status should succeed: {stdout}");
    assert!(stdout.contains("\"phase\": \"triggered\""));
    assert!(stdout.contains("node-cpu"));
}

/// Test health against a mocked agent API
#[test]
fn test_health_table_output() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/healthz")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"status":"degraded","components":{
                 "engine":{"status":"healthy","last_check_timestamp":1700000000},
                 "probe":{"status":"degraded","message":"Metric endpoint timing out",
                          "last_check_timestamp":1700000000}}}"#,
        )
        .create();

    let output = run_qosctl(&["--api-url", &server.url(), "health"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    mock.assert();
    assert!(output.status.success(), "health should succeed: {stdout}");
    assert!(stdout.contains("engine"));
    assert!(stdout.contains("Metric endpoint timing out"));
}

/// Test actions against a mocked agent API
#[test]
fn test_actions_table_output() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/actions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"name":"throttle-low-prio","coolDownSeconds":300,
                 "throttle":{"cpuThrottle":{"minCPURatio":10,"stepCPURatio":15},
                             "memoryThrottle":{"forceGC":false}},
                 "description":"Throttle batch pods"}]"#,
        )
        .create();

    let output = run_qosctl(&["--api-url", &server.url(), "actions"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    mock.assert();
    assert!(output.status.success(), "actions should succeed: {stdout}");
    assert!(stdout.contains("throttle-low-prio"));
    assert!(stdout.contains("5m"));
}

/// The CLI reports API errors instead of panicking
#[test]
fn test_unreachable_agent_is_an_error() {
    let output = run_qosctl(&["--api-url", "http://127.0.0.1:1", "status"]);
    assert!(!output.status.success());
}
