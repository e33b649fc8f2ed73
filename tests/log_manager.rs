mod common;

use common::{app_with, numbered_lines, small_chunk_config, FakeRemote};
use logview::app::App;
use logview::errors::ToolError;
use logview::mcp::protocol::JsonRpcRequest;
use logview::mcp::server::McpServer;
use serde_json::{json, Value};
use std::sync::Arc;

async fn call(app: &App, tool: &str, args: Value) -> Value {
    app.log_manager
        .handle_tool(tool, args)
        .await
        .unwrap_or_else(|err| panic!("{} failed: {} {}", tool, err.code, err.message))
}

async fn reject(app: &App, tool: &str, args: Value) -> ToolError {
    app.log_manager
        .handle_tool(tool, args)
        .await
        .expect_err("request should be rejected")
}

fn hello_fixture() -> Vec<u8> {
    let mut data = b"abcde".to_vec();
    data.extend_from_slice(b"HELLO");
    data.resize(30, b'.');
    data.extend_from_slice(b"HELLO!!");
    data
}

#[tokio::test]
async fn list_sorts_newest_first_and_counts_filtered() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file_at("/var/log/old.log", "a", 100);
    remote.add_file_at("/var/log/new.log", "bbb", 300);
    remote.add_file_at("/var/log/notes.txt", "cc", 200);
    remote.add_file_at("/var/log/archive.gz", [0x1Fu8, 0x8B], 50);
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "list_log_files", json!({"file_pattern": "*.log"})).await;
    let names: Vec<&str> = result["file_list"]
        .as_array()
        .expect("file_list")
        .iter()
        .map(|f| f["name"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["new.log", "old.log"]);
    assert_eq!(result["total_files"], 4);
    assert_eq!(result["filtered_files"], 2);
    assert_eq!(result["total_size"], 4);
    assert_eq!(result["file_list"][0]["human_size"], "3.00 B");
    assert_eq!(result["file_list"][0]["permissions"], "644");
    assert_eq!(result["is_truncated"], false);
    assert!(result["error"].is_null());

    let all = call(&app, "list_log_files", json!({})).await;
    let archive = all["file_list"]
        .as_array()
        .expect("file_list")
        .iter()
        .find(|f| f["name"] == "archive.gz")
        .expect("archive listed");
    assert_eq!(archive["is_binary"], true);
}

#[tokio::test]
async fn list_walks_subdirectories_when_recursive() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app/api.log", "x");
    remote.add_file("/var/log/app/worker/jobs.log", "y");
    let app = app_with(remote, small_chunk_config(16));

    let flat = call(&app, "list_log_files", json!({"log_path": "app"})).await;
    assert_eq!(flat["log_path"], "/var/log/app");
    assert_eq!(flat["file_list"].as_array().map(Vec::len), Some(1));

    let deep = call(
        &app,
        "list_log_files",
        json!({"log_path": "/var/log/app", "recursive": true, "max_depth": "2"}),
    )
    .await;
    assert_eq!(deep["file_list"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn list_reports_missing_directory_on_result() {
    let remote = Arc::new(FakeRemote::new());
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "list_log_files", json!({"log_path": "/var/log/nope"})).await;
    assert_eq!(result["error_code"], "NOT_FOUND");
    assert_eq!(result["file_list"], json!([]));

    let err = reject(&app, "list_log_files", json!({"log_path": "/etc"})).await;
    assert_eq!(err.code, "PATH_VIOLATION");
}

#[tokio::test]
async fn read_returns_preview_and_quick_matches() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file(
        "/var/log/app.log",
        "boot ok\nERROR disk full\nretrying\nERROR disk still full\ndone\n",
    );
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "read_log_file",
        json!({"file_path": "app.log", "search_pattern": "ERROR", "max_preview_lines": 2}),
    )
    .await;
    assert_eq!(result["file_path"], "/var/log/app.log");
    assert_eq!(result["total_lines"], 5);
    assert_eq!(result["preview"], "boot ok\nERROR disk full");
    assert_eq!(result["matches"][0]["line_number"], 2);
    assert_eq!(result["matches"][1]["line_number"], 4);
    assert_eq!(result["matches"][1]["content"], "ERROR disk still full");
    assert_eq!(result["encoding"], "utf-8");
    assert_eq!(result["mime_type"], "text/plain");
    assert_eq!(result["is_binary"], false);
    assert_eq!(result["is_truncated"], false);
    assert!(result["content"]
        .as_str()
        .unwrap_or_default()
        .ends_with("done\n"));
}

#[tokio::test]
async fn read_over_limit_returns_prefix() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", numbered_lines(10));
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "read_log_file",
        json!({"file_path": "/var/log/app.log", "max_file_size": 20}),
    )
    .await;
    assert_eq!(result["too_large"], true);
    assert_eq!(result["is_truncated"], true);
    assert_eq!(result["file_size"], 80);
    assert_eq!(result["content"], "line-01\nline-02\nline");
    assert!(result["error"].is_null());
}

#[tokio::test]
async fn read_skips_binary_content_unless_binary_parser_requested() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/core.bin", [0x7Fu8, b'E', b'L', b'F', 0, 1, 2, 3, 4, 5]);
    remote.set_mime_for("/var/log/core.bin", "application/x-executable");
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "read_log_file", json!({"file_path": "core.bin"})).await;
    assert_eq!(result["is_binary"], true);
    assert_eq!(result["encoding"], "binary");
    assert_eq!(result["mime_type"], "application/x-executable");
    assert_eq!(result["content"], "");
    assert!(result["error"].is_null());

    let parsed = call(
        &app,
        "read_log_file",
        json!({"file_path": "core.bin", "parser": "binary"}),
    )
    .await;
    assert_eq!(parsed["parser"], "binary");
    assert_eq!(parsed["records"][0]["format"], "elf");
    assert_eq!(parsed["records"][0]["fields"]["size"], 10);
    assert_eq!(parsed["records"][0]["fields"]["header"]["raw"], "7f454c4600010203");
}

#[tokio::test]
async fn read_extracts_dotted_json_fields() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file(
        "/var/log/events.jsonl",
        "{\"user\":{\"name\":\"alice\"},\"level\":\"info\"}\n{\"user\":{\"name\":\"bob\"},\"level\":\"warn\"}\nnot json\n",
    );
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "read_log_file",
        json!({"file_path": "events.jsonl", "fields": "user.name, level"}),
    )
    .await;
    assert_eq!(result["parser"], "json");
    assert_eq!(result["records"][0]["fields"]["user.name"], "alice");
    assert_eq!(result["records"][1]["fields"]["level"], "warn");
    assert_eq!(result["records"][2]["line_number"], 3);
    assert!(result["records"][2]["error"].is_string());
    assert_eq!(result["parse_errors"], 1);
}

#[tokio::test]
async fn read_parses_key_value_lines_with_text_parser() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file(
        "/var/log/app.log",
        "2024-03-01 10:00:00 ERROR disk full\nuser=bob action=login\n",
    );
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "read_log_file",
        json!({"file_path": "app.log", "parser": "text"}),
    )
    .await;
    assert_eq!(result["records"][0]["format"], "standard");
    assert_eq!(result["records"][0]["fields"]["level"], "ERROR");
    assert_eq!(result["records"][1]["format"], "key_value");
    assert_eq!(result["records"][1]["fields"]["user"], "bob");
}

#[tokio::test]
async fn read_failure_keeps_metadata_on_result() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "some text\n");
    remote.fail_reads("/var/log/app.log", ToolError::connection_lost("channel closed"));
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "read_log_file", json!({"file_path": "app.log"})).await;
    assert_eq!(result["error_code"], "CONNECTION_LOST");
    assert_eq!(result["file_size"], 10);
    assert_eq!(result["content"], "");
}

#[tokio::test]
async fn chunk_reports_continuation_offsets() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "0123456789abcdefWXYZ");
    let app = app_with(remote, small_chunk_config(16));

    let first = call(&app, "read_log_chunk", json!({"file_path": "app.log"})).await;
    assert_eq!(first["content"], "0123456789abcdef");
    assert_eq!(first["content_encoding"], "text");
    assert_eq!(first["has_more"], true);
    assert_eq!(first["next_offset"], 16);

    let last = call(
        &app,
        "read_log_chunk",
        json!({"file_path": "app.log", "offset": 16, "length": 100}),
    )
    .await;
    assert_eq!(last["content"], "WXYZ");
    assert_eq!(last["length"], 4);
    assert_eq!(last["has_more"], false);
    assert!(last["next_offset"].is_null());

    let past = call(
        &app,
        "read_log_chunk",
        json!({"file_path": "app.log", "offset": 20}),
    )
    .await;
    assert_eq!(past["error_code"], "OUT_OF_RANGE");
    assert_eq!(past["file_size"], 20);
}

#[tokio::test]
async fn binary_chunks_come_back_as_hex() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/blob.bin", [0u8, 1, 0xAB, 0xFF]);
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "read_log_chunk", json!({"file_path": "blob.bin"})).await;
    assert_eq!(result["is_binary"], true);
    assert_eq!(result["content_encoding"], "hex");
    assert_eq!(result["content"], "0001abff");
}

#[tokio::test]
async fn search_collects_context_across_chunks() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file(
        "/var/log/app.log",
        "info start\nERROR one\ninfo middle\nERROR two\ninfo end\n",
    );
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "ERROR \\w+", "context_lines": 1}),
    )
    .await;
    assert_eq!(result["match_count"], 2);
    assert_eq!(result["matches"][0]["line_number"], 2);
    assert_eq!(result["matches"][0]["matched_text"], "ERROR one");
    assert_eq!(result["matches"][0]["context_before"], json!(["info start"]));
    assert_eq!(result["matches"][0]["context_after"], json!(["info middle"]));
    assert_eq!(result["matches"][1]["line"], "ERROR two");
    assert_eq!(result["matches"][1]["context_after"], json!(["info end"]));
    assert_eq!(result["lines_scanned"], 5);
    assert_eq!(result["is_truncated"], false);
}

#[tokio::test]
async fn search_counts_a_long_line_once() {
    let remote = Arc::new(FakeRemote::new());
    let mut body = String::from("first\n");
    body.push_str(&"z".repeat(100));
    body.push_str("\nERROR here\n");
    remote.add_file("/var/log/app.log", body);
    let app = app_with(remote, small_chunk_config(8));

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "ERROR", "context_lines": 1}),
    )
    .await;
    assert_eq!(result["lines_scanned"], 3);
    assert_eq!(result["match_count"], 1);
    assert_eq!(result["matches"][0]["line_number"], 3);
    assert_eq!(result["matches"][0]["line"], "ERROR here");
    assert_eq!(result["matches"][0]["context_before"], json!(["z".repeat(100)]));
}

#[tokio::test]
async fn search_matches_across_a_flushed_line() {
    let remote = Arc::new(FakeRemote::new());
    let mut body = String::from("first\n");
    body.push_str(&"z".repeat(31));
    body.push_str("NEEDLE\ntail\n");
    remote.add_file("/var/log/app.log", body);
    let app = app_with(remote, small_chunk_config(8));

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "NEEDLE"}),
    )
    .await;
    assert_eq!(result["match_count"], 1);
    assert_eq!(result["matches"][0]["line_number"], 2);
    assert_eq!(result["matches"][0]["matched_text"], "NEEDLE");
    assert_eq!(result["matches"][0]["line"], format!("{}NEEDLE", "z".repeat(31)));
    assert_eq!(result["lines_scanned"], 3);
    assert_eq!(result["is_truncated"], false);
}

#[tokio::test]
async fn search_stops_at_max_matches() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "hit 1\nhit 2\nhit 3\nhit 4\nhit 5\n");
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "HIT", "case_insensitive": true, "max_matches": 2}),
    )
    .await;
    assert_eq!(result["match_count"], 2);
    assert_eq!(result["matches"].as_array().map(Vec::len), Some(2));
    assert_eq!(result["is_truncated"], true);
}

#[tokio::test]
async fn search_reports_pattern_timeout_on_result() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "a\nb\n");
    let mut config = small_chunk_config(16);
    config.pattern_time_budget_ms = 0;
    let app = app_with(remote, config);

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "a"}),
    )
    .await;
    assert_eq!(result["error_code"], "PATTERN_TIMEOUT");
    assert_eq!(result["file_size"], 4);
}

#[tokio::test]
async fn search_time_budget_truncates() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", numbered_lines(20));
    let mut config = small_chunk_config(16);
    config.search_time_budget_ms = 0;
    let app = app_with(remote, config);

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "line"}),
    )
    .await;
    assert_eq!(result["error_code"], "PATTERN_TIMEOUT");
    assert_eq!(result["is_truncated"], true);
    assert_eq!(result["bytes_scanned"], 16);
    assert_eq!(result["match_count"], 2);
}

#[tokio::test]
async fn search_rejects_unsafe_patterns_and_paths() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "aaaa\n");
    let app = app_with(remote, small_chunk_config(16));

    let err = reject(
        &app,
        "search_log_file",
        json!({"file_path": "app.log", "pattern": "(a+)+$"}),
    )
    .await;
    assert_eq!(err.code, "PATTERN_REJECTED");

    for path in ["/etc/passwd", "../../etc/shadow", "/var/log/app.log;rm -rf /"] {
        let err = reject(
            &app,
            "search_log_file",
            json!({"file_path": path, "pattern": "a"}),
        )
        .await;
        assert_eq!(err.code, "PATH_VIOLATION", "{}", path);
    }
}

#[tokio::test]
async fn search_skips_binary_files() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/blob.bin", [0u8, b'a', 0, b'a']);
    let app = app_with(remote, small_chunk_config(16));

    let result = call(
        &app,
        "search_log_file",
        json!({"file_path": "blob.bin", "pattern": "a"}),
    )
    .await;
    assert_eq!(result["is_binary"], true);
    assert_eq!(result["match_count"], 0);
    assert_eq!(result["lines_scanned"], 0);
    assert!(result["error"].is_null());
}

#[tokio::test]
async fn tail_defaults_to_ten_lines() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", numbered_lines(30));
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "tail_log_file", json!({"file_path": "app.log"})).await;
    assert_eq!(result["line_count"], 10);
    assert_eq!(result["lines"][0], "line-21");
    assert_eq!(result["lines"][9], "line-30");

    let three = call(
        &app,
        "tail_log_file",
        json!({"file_path": "app.log", "lines": "3"}),
    )
    .await;
    assert_eq!(three["lines"], json!(["line-28", "line-29", "line-30"]));
    assert_eq!(three["is_truncated"], false);
}

#[tokio::test]
async fn tail_of_missing_file_reports_not_found() {
    let remote = Arc::new(FakeRemote::new());
    let app = app_with(remote, small_chunk_config(16));

    let result = call(&app, "tail_log_file", json!({"file_path": "gone.log"})).await;
    assert_eq!(result["error_code"], "NOT_FOUND");
    assert_eq!(result["lines"], json!([]));

    let err = reject(&app, "tail_log_file", json!({"file_path": "app.log", "lines": -1})).await;
    assert_eq!(err.code, "INVALID_PARAMS");
}

#[tokio::test]
async fn extract_finds_pattern_across_chunk_boundaries() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/frames.dat", hello_fixture());
    let app = app_with(remote, small_chunk_config(8));

    let result = call(
        &app,
        "extract_binary_message",
        json!({"file_path": "frames.dat", "hex_pattern": "48 45 4c 4c 4f", "message_length": 8}),
    )
    .await;
    assert_eq!(result["hex_pattern"], "48454C4C4F");
    assert_eq!(result["message_count"], 2);
    assert_eq!(result["messages"][0]["offset"], 5);
    assert_eq!(result["messages"][0]["length"], 8);
    assert_eq!(result["messages"][0]["hex"], hex::encode(b"HELLO..."));
    assert_eq!(result["messages"][1]["offset"], 30);
    assert_eq!(result["messages"][1]["length"], 7);
    assert_eq!(result["messages"][1]["hex"], hex::encode(b"HELLO!!"));
    assert_eq!(result["bytes_scanned"], 37);
    assert_eq!(result["is_truncated"], false);
}

#[tokio::test]
async fn extract_caps_messages() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/frames.dat", hello_fixture());
    let app = app_with(remote, small_chunk_config(8));

    let result = call(
        &app,
        "extract_binary_message",
        json!({"file_path": "frames.dat", "hex_pattern": "0x48454C4C4F", "max_messages": 1}),
    )
    .await;
    assert_eq!(result["message_count"], 1);
    assert_eq!(result["is_truncated"], true);

    let err = reject(
        &app,
        "extract_binary_message",
        json!({"file_path": "frames.dat", "hex_pattern": "XYZ"}),
    )
    .await;
    assert_eq!(err.code, "PATTERN_REJECTED");
}

#[tokio::test]
async fn extract_cap_without_later_occurrence_is_not_truncation() {
    let remote = Arc::new(FakeRemote::new());
    let mut data = b"..HELLO".to_vec();
    data.resize(27, b'.');
    remote.add_file("/var/log/frames.dat", data);
    let app = app_with(remote, small_chunk_config(8));

    let result = call(
        &app,
        "extract_binary_message",
        json!({"file_path": "frames.dat", "hex_pattern": "48454C4C4F", "max_messages": 1, "message_length": 5}),
    )
    .await;
    assert_eq!(result["message_count"], 1);
    assert_eq!(result["messages"][0]["offset"], 2);
    assert_eq!(result["bytes_scanned"], 27);
    assert_eq!(result["is_truncated"], false);
}

#[tokio::test]
async fn download_encodes_base64_within_limit() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "hello\n");
    let app = app_with(remote, small_chunk_config(4));

    let result = call(&app, "download_file", json!({"file_path": "app.log"})).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["file_name"], "app.log");
    assert_eq!(result["file_size"], 6);
    assert_eq!(result["file_content_base64"], "aGVsbG8K");

    let small = call(
        &app,
        "download_file",
        json!({"file_path": "app.log", "max_download_size": 3}),
    )
    .await;
    assert_eq!(small["success"], false);
    assert_eq!(small["too_large"], true);
    assert!(small["file_content_base64"].is_null());
    assert!(small["error"].is_null());

    let missing = call(&app, "download_file", json!({"file_path": "nope.log"})).await;
    assert_eq!(missing["success"], false);
    assert_eq!(missing["error_code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_tool_suggests_close_names() {
    let remote = Arc::new(FakeRemote::new());
    let app = app_with(remote, small_chunk_config(16));

    let err = reject(&app, "tail_log", json!({})).await;
    assert_eq!(err.code, "INVALID_PARAMS");
    assert!(err
        .hint
        .as_deref()
        .unwrap_or_default()
        .contains("tail_log_file"));
}

#[tokio::test]
async fn executor_wraps_results_with_trace_meta() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "x\n");
    let app = app_with(remote, small_chunk_config(16));

    let payload = app
        .tool_executor
        .execute(
            "tail_log_file",
            json!({"file_path": "app.log", "trace_id": "trace-42"}),
        )
        .await
        .expect("execute");
    assert_eq!(payload["meta"]["tool"], "tail_log_file");
    assert_eq!(payload["meta"]["trace_id"], "trace-42");
    assert_eq!(payload["result"]["lines"], json!(["x"]));

    let generated = app
        .tool_executor
        .execute("tail_log_file", json!({"file_path": "app.log"}))
        .await
        .expect("execute");
    let trace = generated["meta"]["trace_id"].as_str().unwrap_or_default();
    assert!(uuid::Uuid::parse_str(trace).is_ok());
}

fn request(value: Value) -> JsonRpcRequest {
    serde_json::from_value(value).expect("request")
}

#[tokio::test]
async fn server_answers_tools_list_and_calls() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_file("/var/log/app.log", "hello\n");
    let server = McpServer::new(app_with(remote, small_chunk_config(16)));

    let listed = server
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})))
        .await
        .expect("response");
    let listed = serde_json::to_value(&listed).expect("serialize");
    assert_eq!(listed["result"]["tools"].as_array().map(Vec::len), Some(7));

    let missing = server
        .handle_request(request(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "tail_log_file", "arguments": {"file_path": "gone.log"}},
        })))
        .await
        .expect("response");
    let missing = serde_json::to_value(&missing).expect("serialize");
    assert_eq!(missing["result"]["isError"], true);
    assert_eq!(
        missing["result"]["structuredContent"]["result"]["error_code"],
        "NOT_FOUND"
    );

    let rejected = server
        .handle_request(request(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "read_log_file", "arguments": {"file_path": "/etc/shadow"}},
        })))
        .await
        .expect("response");
    let rejected = serde_json::to_value(&rejected).expect("serialize");
    assert_eq!(rejected["error"]["code"], -32602);

    let bad_args = server
        .handle_request(request(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "tail_log_file", "arguments": {"file_path": "app.log", "line": 2}},
        })))
        .await
        .expect("response");
    let bad_args = serde_json::to_value(&bad_args).expect("serialize");
    assert!(bad_args["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("did you mean lines"));

    let note = server
        .handle_request(request(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ))
        .await;
    assert!(note.is_none());
}
