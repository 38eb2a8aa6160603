use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use wikigraph::commands::command_argument_builder;
use wikigraph::handlers::*;
use wikigraph_core::{DepthFilter, ReportFormat, SessionState, Settings};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn sub_matches(argv: &[&str]) -> clap::ArgMatches {
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

fn settings_for(server: &MockServer) -> Settings {
    Settings {
        api_url: server.uri(),
        retry_delay_ms: 20,
        ..Settings::default()
    }
}

// ============================================================================
// Argument Tests
// ============================================================================

#[test]
fn test_view_defaults() {
    let args = sub_matches(&["wikigraph", "view", "Fergana_(moth)"]);
    let request = crawl_request(&args).unwrap();
    assert_eq!(request.page(), "Fergana_(moth)");
    assert_eq!(request.depth(), 2);
    assert_eq!(request.max_pages(), 50);

    let params = filter_params(&args, &Settings::default()).unwrap();
    assert_eq!(params.node_cap, 150);
    assert_eq!(params.depth, DepthFilter::All);
}

#[test]
fn test_view_filter_flags() {
    let args = sub_matches(&[
        "wikigraph",
        "view",
        "Moth",
        "--node-cap",
        "300",
        "--depth-filter",
        "1",
    ]);
    let params = filter_params(&args, &Settings::default()).unwrap();
    assert_eq!(params.node_cap, 300);
    assert_eq!(params.depth, DepthFilter::Max(1));
}

#[test]
fn test_view_rejects_out_of_range_cap() {
    let args = sub_matches(&["wikigraph", "view", "Moth", "--node-cap", "5"]);
    assert!(filter_params(&args, &Settings::default()).is_err());
}

#[test]
fn test_depth_out_of_range_rejected_by_parser() {
    let result =
        command_argument_builder().try_get_matches_from(["wikigraph", "crawl", "Moth", "-d", "4"]);
    assert!(result.is_err());

    let result =
        command_argument_builder().try_get_matches_from(["wikigraph", "crawl", "Moth", "-m", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_crawl_format_restricted() {
    let result = command_argument_builder()
        .try_get_matches_from(["wikigraph", "crawl", "Moth", "-f", "html"]);
    assert!(result.is_err());

    let args = sub_matches(&["wikigraph", "crawl", "Moth", "-d", "3", "-m", "10", "-f", "json"]);
    assert_eq!(args.get_one::<String>("format").map(String::as_str), Some("json"));
    let request = crawl_request(&args).unwrap();
    assert_eq!((request.depth(), request.max_pages()), (3, 10));
}

#[test]
fn test_blank_page_rejected() {
    let args = sub_matches(&["wikigraph", "crawl", "   "]);
    assert!(crawl_request(&args).is_err());
}

// ============================================================================
// Settings Tests
// ============================================================================

#[test]
fn test_load_settings_flag_beats_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, r#"{{"api_url": "http://crawler.internal:5000", "node_cap": 200}}"#)?;

    let settings = load_settings(Some(file.path()), Some("http://localhost:6000"))?;
    assert_eq!(settings.api_url, "http://localhost:6000");
    assert_eq!(settings.node_cap, 200);
    Ok(())
}

#[test]
fn test_load_settings_bad_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"colour": "blue"}}"#).unwrap();
    assert!(load_settings(Some(file.path()), Some("http://localhost:5000")).is_err());
}

#[test]
fn test_load_settings_invalid_flag() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "{}").unwrap();
    assert!(load_settings(Some(file.path()), Some("not a url")).is_err());
}

// ============================================================================
// Network Handler Tests
// ============================================================================

#[tokio::test]
async fn test_handle_suggest() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("q", "Fergana"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"suggestions":[{"title":"Fergana_(moth)"},{"title":"Fergana_Valley"}]}"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let args = sub_matches(&["wikigraph", "suggest", "Fergana"]);
    let titles = handle_suggest(&args, &settings_for(&mock_server)).await.unwrap();
    assert_eq!(titles, vec!["Fergana_(moth)", "Fergana_Valley"]);
}

#[tokio::test]
async fn test_handle_stop() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scrape/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    handle_stop(&settings_for(&mock_server), true).await.unwrap();
}

#[tokio::test]
async fn test_handle_stop_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scrape/stop"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    assert!(handle_stop(&settings_for(&mock_server), true).await.is_err());
}

fn sse(payloads: &[&str]) -> ResponseTemplate {
    let body: String = payloads.iter().map(|p| format!("data: {}\n\n", p)).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn test_run_crawl_writes_json_report() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scrape"))
        .respond_with(sse(&[
            r#"{"type":"node","node":{"id":"Moth","label":"Moth","depth":0},"edges":[],"progress":1,"total":2}"#,
            r#"{"type":"node","node":{"id":"Wing","label":"Wing","depth":1},"edges":[{"source":"Moth","target":"Wing"}],"progress":2,"total":2}"#,
            r#"{"type":"complete"}"#,
        ]))
        .mount(&mock_server)
        .await;

    let settings = settings_for(&mock_server);
    let output_file = NamedTempFile::new().unwrap();
    let client = Arc::new(build_client(&settings).unwrap());
    let args = sub_matches(&["wikigraph", "crawl", "Moth", "-d", "1", "-m", "2"]);

    let outcome = run_crawl(
        client,
        crawl_request(&args).unwrap(),
        &settings,
        CrawlOutput {
            format: ReportFormat::Json,
            path: Some(output_file.path().to_path_buf()),
            quiet: true,
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(outcome.state, SessionState::Completed);

    let saved = std::fs::read_to_string(output_file.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(value["report"]["summary"]["total_pages"], 2);
    assert_eq!(value["report"]["summary"]["total_links"], 1);
}

#[tokio::test]
async fn test_run_crawl_failure_still_reports() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scrape"))
        .respond_with(sse(&[
            r#"{"type":"node","node":{"id":"Moth","label":"Moth","depth":0},"edges":[],"progress":1,"total":5}"#,
            r#"{"type":"error","message":"Page does not exist"}"#,
        ]))
        .mount(&mock_server)
        .await;

    let settings = settings_for(&mock_server);
    let output_file = NamedTempFile::new().unwrap();
    let client = Arc::new(build_client(&settings).unwrap());
    let args = sub_matches(&["wikigraph", "crawl", "Moth"]);

    let err = run_crawl(
        client,
        crawl_request(&args).unwrap(),
        &settings,
        CrawlOutput {
            format: ReportFormat::Text,
            path: Some(output_file.path().to_path_buf()),
            quiet: true,
        },
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Page does not exist"));

    let saved = std::fs::read_to_string(output_file.path()).unwrap();
    assert!(saved.contains("Status:       failed"));
    assert!(saved.contains("Pages Found:  1"));
}
