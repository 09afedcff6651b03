use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "anthropic:claude-haiku-4-5";

/// Builds an Anthropic-style SSE body that streams `deltas` one text delta
/// at a time.
fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();

    body.push_str("event: message_start\n");
    body.push_str(
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-haiku-4-5\",\"usage\":{\"input_tokens\":10,\"output_tokens\":1}}}\n\n",
    );
    body.push_str("event: content_block_start\n");
    body.push_str(
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    );

    for delta in deltas {
        let data = serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": delta}
        });
        body.push_str("event: content_block_delta\n");
        body.push_str(&format!("data: {data}\n\n"));
    }

    body.push_str("event: content_block_stop\n");
    body.push_str("data: {\"type\":\"content_block_stop\",\"index\":0}\n\n");
    body.push_str("event: message_delta\n");
    body.push_str(
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":20}}\n\n",
    );
    body.push_str("event: message_stop\n");
    body.push_str("data: {\"type\":\"message_stop\"}\n\n");

    body
}

fn sse_response(deltas: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(deltas))
}

/// Deltas for a chart answer, split so one chunk boundary lands inside the
/// markup (the balancer has to repair the prefix mid-stream).
const CHART_DELTAS: &[&str] = &[
    "Here is your spending trend.\n",
    "```jsx\n<BarChart data={[{m:\"Jan\",v:1}]}>\n",
    "  <Bar dataKey=\"v\" />\n",
    "</BarChart>\n```",
];

#[tokio::test]
async fn test_ask_renders_chart_response() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(sse_response(CHART_DELTAS))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["ask", "-p", "show my spending trend", "-m", MODEL])
        .assert()
        .success()
        .stdout(predicate::str::contains("Here is your spending trend."))
        .stdout(predicate::str::contains("[building chart...]"))
        .stdout(predicate::str::contains("```jsx"))
        .stdout(predicate::str::contains("</BarChart>"));
}

#[tokio::test]
async fn test_ask_renders_text_response() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse_response(&["Total spend: ", "$452.10"]))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["ask", "-p", "what did I spend?", "-m", MODEL])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total spend: $452.10"));
}

#[tokio::test]
async fn test_ask_frames_balances_markup_midstream() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse_response(CHART_DELTAS))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["ask", "-p", "show my spending trend", "-m", MODEL, "--frames"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let frames: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one frame"))
        .collect();
    assert!(frames.len() >= 3, "expected several frames: {stdout}");

    // The first chunk is prose only.
    assert_eq!(frames[0]["mode"], "text");

    // Mid-stream chart frames are balanced even though the payload was
    // truncated at a chunk boundary.
    let midstream: Vec<&serde_json::Value> = frames
        .iter()
        .filter(|f| f["mode"] == "chart" && f["streaming"] == true)
        .collect();
    assert!(!midstream.is_empty(), "no streaming chart frames: {stdout}");
    for frame in &midstream {
        let markup = frame["markup"].as_str().unwrap();
        assert!(
            markup.ends_with("</BarChart>"),
            "unbalanced mid-stream markup: {markup}"
        );
    }

    // The final frame carries the payload untouched.
    let last = frames.last().unwrap();
    assert_eq!(last["mode"], "chart");
    assert_eq!(last["streaming"], false);
    assert_eq!(
        last["markup"].as_str().unwrap(),
        "<BarChart data={[{m:\"Jan\",v:1}]}>\n  <Bar dataKey=\"v\" />\n</BarChart>"
    );
    assert_eq!(
        last["explanation"].as_str().unwrap(),
        "Here is your spending trend."
    );
}

#[tokio::test]
async fn test_chat_responds_and_exits_on_quit() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse_response(&["Hello there!"]))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["chat", "-m", MODEL])
        .write_stdin("hi\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello there!"))
        .stdout(predicate::str::contains("Goodbye!"));
}

#[tokio::test]
async fn test_chat_skips_empty_input() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse_response(&["Got it!"]))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Empty lines are skipped; only "test" triggers an API call.
    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["chat", "-m", MODEL])
        .write_stdin("\n\ntest\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Got it!"));
}

#[tokio::test]
async fn test_chat_shows_welcome_only_on_first_run() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse_response(&["Hi!"]))
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["chat", "-m", MODEL])
        .write_stdin(":q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome to finchat"));

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["chat", "-m", MODEL])
        .write_stdin(":q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome to finchat").not());
}

#[tokio::test]
async fn test_ask_reports_api_error() {
    let mock_server = MockServer::start().await;
    let home = tempdir().unwrap();

    let error_body = serde_json::json!({
        "type": "error",
        "error": {"type": "overloaded_error", "message": "Overloaded"}
    });

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(error_body))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["ask", "-p", "anything", "-m", MODEL])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP 529"));
}
