//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small Big5-encoded consultation site
//! and drive the full discover, crawl and store cycle over real HTTP.

use consult_harvest::config::{
    Config, CrawlerConfig, OutputConfig, RetryConfig, RetryPolicyConfig, SiteConfig,
};
use consult_harvest::crawler::{run_harvest, Coordinator, Fetcher, HttpFetcher};
use consult_harvest::storage::{open_storage, RunStatus, Storage};
use consult_harvest::{HarvestError, Record};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATEGORY: &str = "內科";
const LISTING_PATH: &str = "/doctor/All/history.php";

/// Creates a test configuration pointing at the mock server, with
/// millisecond pauses and three-attempt retry policies
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    let quick = RetryPolicyConfig {
        max_attempts: 3,
        base_delay_ms: 5,
        step_ms: 5,
    };
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            user_agent: "Mozilla/5.0 (TestHarvest)".to_string(),
            origin: Some("https://sp1.hso.mohw.gov.tw".to_string()),
            encoding: "big5".to_string(),
            strict_decoding: false,
            request_timeout_secs: 5,
            index_path: "/doctor/Index1.php".to_string(),
            listing_template: "/doctor/All/history.php?UrlClass={name}&SortBy=q_no".to_string(),
            page_suffix: "&PageNo={page}".to_string(),
            detail_prefix: "/doctor/All/".to_string(),
        },
        crawler: CrawlerConfig {
            max_concurrent_pages: 4,
            jitter_min_ms: 0,
            jitter_max_ms: 2,
            categories: vec![],
        },
        retry: RetryConfig {
            article: quick.clone(),
            page: RetryPolicyConfig { step_ms: 0, ..quick },
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            catalog_collection: "categories".to_string(),
            log_path: None,
        },
    }
}

fn big5(html: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::BIG5.encode(html);
    bytes.into_owned()
}

fn big5_page(html: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_bytes(big5(html))
        .insert_header("content-type", "text/html; charset=big5")
}

fn index_page(names: &[&str]) -> String {
    let tiles: String = names
        .iter()
        .map(|name| format!(r#"<div class="w3-col l4 m6 s6"><a href="cat.php">{}</a></div>"#, name))
        .collect();
    format!("<html><body>{}</body></html>", tiles)
}

fn pagination(pages: u32) -> String {
    let options: String = (1..=pages)
        .map(|p| format!("<option value=\"{}\">{}</option>", p, p))
        .collect();
    format!("<select name=\"PageNo\">{}</select>", options)
}

fn row(q_no: u32) -> String {
    format!(
        r#"<tr><td>2023-05-0{q}</td><td>王小明</td><td>李醫師</td><td>5</td><td>4.5</td><td>1{q}</td><td><a href="question.php?q_no={q}">請問 {q}</a></td></tr>"#,
        q = q_no
    )
}

fn listing_page(rows: &[String]) -> String {
    format!(
        r#"<html><body>{}<table class="table1"><tr><th>日期</th></tr>{}</table></body></html>"#,
        pagination(2),
        rows.join("")
    )
}

fn detail_page(q_no: u32) -> String {
    format!(
        r#"<html><body>
        <div class="w3-bar-item w3-padding-0">#{q}</div>
        <div class="w3-bar-item w3-padding-0">分類</div>
        <div class="w3-bar-item w3-padding-0">標題</div>
        <div class="w3-bar-item w3-padding-0">王小明, 2023/05/0{q}&nbsp;10:00</div>
        <div class="w3-bar-item w3-padding-0">回覆</div>
        <div class="w3-bar-item w3-padding-0">李醫師, 2023/05/1{q}</div>
        <div class="msg">問題內容 {q}</div>
        <div class="msg">回覆內容 {q}</div>
        </body></html>"#,
        q = q_no
    )
}

async fn mount_index(server: &MockServer, names: &[&str], expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/doctor/Index1.php"))
        .respond_with(big5_page(&index_page(names)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, q_no: u32) {
    Mock::given(method("GET"))
        .and(path("/doctor/All/question.php"))
        .and(query_param("q_no", q_no.to_string().as_str()))
        .respond_with(big5_page(&detail_page(q_no)))
        .mount(server)
        .await;
}

/// Serves page 1 with three valid rows and one malformed row
async fn mount_first_page(server: &MockServer) {
    let mut rows: Vec<String> = (1..=3).map(row).collect();
    rows.insert(2, "<tr><td>只有一格</td></tr>".to_string());

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("UrlClass", CATEGORY))
        .and(query_param("PageNo", "1"))
        .respond_with(big5_page(&listing_page(&rows)))
        .mount(server)
        .await;
}

/// Answers listing requests without a page number; mounted last so the
/// page-specific mocks take precedence
async fn mount_listing_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("UrlClass", CATEGORY))
        .respond_with(big5_page(&listing_page(&[])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_with_failed_page() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_index(&mock_server, &[CATEGORY], 1).await;
    mount_first_page(&mock_server).await;

    // Page 2 fails on every attempt of the page policy
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("PageNo", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    for q_no in 1..=3 {
        mount_detail(&mock_server, q_no).await;
    }
    mount_listing_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let summary = run_harvest(config, "test-hash".to_string())
        .await
        .expect("Harvest should complete despite the failed page");

    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.categories[0].pages, 2);
    assert_eq!(summary.categories[0].pages_failed, 1);
    assert_eq!(summary.totals.records_written, 3);
    assert_eq!(summary.totals.page_errors, 1);
    assert_eq!(summary.totals.article_errors, 0);
    assert_eq!(summary.rows_rejected, 1);

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count("categories").unwrap(), 1);
    assert_eq!(storage.count(CATEGORY).unwrap(), 3);

    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.totals, summary.totals);

    let records: Vec<Record> = storage
        .find_all(CATEGORY)
        .unwrap()
        .into_iter()
        .map(|doc| serde_json::from_value(doc).unwrap())
        .collect();
    let first = records.iter().find(|r| r.detail.id == 1).unwrap();
    assert_eq!(first.listing.patient_name, "王小明");
    assert_eq!(first.listing.title, "請問 1");
    assert_eq!(first.listing.satisfactory, Some(5.0));
    assert_eq!(first.listing.rating, Some(4.5));
    assert_eq!(first.listing.views, 11);
    assert_eq!(first.listing.detail_path, "/doctor/All/question.php?q_no=1");
    assert_eq!(first.detail.question_author, "王小明");
    assert_eq!(first.detail.question_date, "2023/05/01");
    assert_eq!(first.detail.answer_author, "李醫師");
    assert_eq!(first.detail.answer_date, "2023/05/11");
    assert_eq!(first.detail.question_body, "問題內容 1");
    assert_eq!(first.detail.answer_body, "回覆內容 1");
}

#[tokio::test]
async fn test_article_recovers_after_transient_failures() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_index(&mock_server, &[CATEGORY], 1).await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("PageNo", "1"))
        .respond_with(big5_page(&listing_page(&[row(1)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("PageNo", "2"))
        .respond_with(big5_page(&listing_page(&[])))
        .mount(&mock_server)
        .await;

    // Two failures, then the real page
    Mock::given(method("GET"))
        .and(path("/doctor/All/question.php"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doctor/All/question.php"))
        .respond_with(big5_page(&detail_page(1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_listing_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.totals.records_written, 1);
    assert_eq!(summary.totals.article_errors, 0);
    assert_eq!(coordinator.storage().count(CATEGORY).unwrap(), 1);
}

#[tokio::test]
async fn test_second_run_reuses_catalog() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    // The index is fetched by the first run only
    mount_index(&mock_server, &[CATEGORY, CATEGORY], 1).await;
    mount_first_page(&mock_server).await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("PageNo", "2"))
        .respond_with(big5_page(&listing_page(&[])))
        .mount(&mock_server)
        .await;
    for q_no in 1..=3 {
        mount_detail(&mock_server, q_no).await;
    }
    mount_listing_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let first = run_harvest(config.clone(), "hash".to_string()).await.unwrap();
    let second = run_harvest(config, "hash".to_string()).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.totals.records_written, 3);

    let storage = open_storage(&db_path).unwrap();
    // Duplicate tiles collapse into one catalog entry
    assert_eq!(storage.count("categories").unwrap(), 1);
    // Records are appended on every run
    assert_eq!(storage.count(CATEGORY).unwrap(), 6);
}

#[tokio::test]
async fn test_discovery_failure_aborts_run() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    Mock::given(method("GET"))
        .and(path("/doctor/Index1.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let result = run_harvest(config, "hash".to_string()).await;

    assert!(matches!(result, Err(HarvestError::Transport { .. })));

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count("categories").unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_fetcher_sends_identification_headers() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &temp_dir.path().join("unused.db"));

    Mock::given(method("GET"))
        .and(path("/doctor/Index1.php"))
        .and(header("user-agent", "Mozilla/5.0 (TestHarvest)"))
        .and(header("origin", "https://sp1.hso.mohw.gov.tw"))
        .respond_with(big5_page("<p>家醫科</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(&config.site).unwrap();
    let body = fetcher.fetch("/doctor/Index1.php").await.unwrap();
    assert_eq!(body, "<p>家醫科</p>");
}

#[tokio::test]
async fn test_fetcher_replaces_invalid_bytes_by_default() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &temp_dir.path().join("unused.db"));

    Mock::given(method("GET"))
        .and(path("/broken.php"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'o', b'k', 0xFF]))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(&config.site).unwrap();
    let body = fetcher.fetch("/broken.php").await.unwrap();
    assert_eq!(body, "ok\u{FFFD}");

    config.site.strict_decoding = true;
    let strict = HttpFetcher::new(&config.site).unwrap();
    let result = strict.fetch("/broken.php").await;
    assert!(matches!(result, Err(HarvestError::Decode { encoding: "Big5", .. })));

    let missing = fetcher.fetch("/missing.php").await;
    match missing {
        Err(HarvestError::Transport { reason, .. }) => assert_eq!(reason, "HTTP 404"),
        other => panic!("expected a transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stray_byte_in_article_still_harvested() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_index(&mock_server, &[CATEGORY], 1).await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("PageNo", "1"))
        .respond_with(big5_page(&listing_page(&[row(1)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("PageNo", "2"))
        .respond_with(big5_page(&listing_page(&[])))
        .mount(&mock_server)
        .await;

    // A lone 0x80 right after the question text
    let mut body = big5(&detail_page(1));
    let marker = big5("問題內容 1");
    let at = body
        .windows(marker.len())
        .position(|w| w == marker.as_slice())
        .unwrap()
        + marker.len();
    body.insert(at, 0x80);

    Mock::given(method("GET"))
        .and(path("/doctor/All/question.php"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_listing_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let summary = run_harvest(config, "hash".to_string()).await.unwrap();

    assert_eq!(summary.totals.records_written, 1);
    assert_eq!(summary.totals.article_errors, 0);

    let storage = open_storage(&db_path).unwrap();
    let record: Record = serde_json::from_value(storage.find_all(CATEGORY).unwrap()[0].clone()).unwrap();
    assert_eq!(record.detail.question_body, "問題內容 1\u{FFFD}");
    assert_eq!(record.detail.answer_body, "回覆內容 1");
}
