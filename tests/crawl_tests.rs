//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, from seed URL to the saved record store.

use site_indexer::config::Config;
use site_indexer::crawler::{Coordinator, StopReason};
use site_indexer::storage::{self, PageRecord, RecordStore};
use site_indexer::{crawl, CrawlError};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration that crawls the mock server into `data_path`
fn create_test_config(server: &MockServer, data_path: &Path, max_pages: usize) -> Config {
    let mut config = Config::default();
    config.crawler.start_url = format!("{}/", server.uri());
    config.crawler.max_pages = max_pages;
    config.crawler.workers = 3;
    config.crawler.max_retries = 0;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.data_path = data_path.display().to_string();
    config
}

/// Name the store uses for the server's root page, e.g. `127.0.0.1:41234`
fn root_name(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

async fn mount_page(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
        .mount(server)
        .await;
}

/// Paths requested from the server, robots.txt excluded
async fn page_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p != "/robots.txt")
        .collect()
}

#[tokio::test]
async fn test_single_page_crawl() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>Example Domain</title></head><body>Hi</body></html>"#.to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let config = create_test_config(&server, &data_path, 1);

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.new_records, 1);
    assert_eq!(summary.status_line(), "1 pages fetched, 0 errors.");

    let store = storage::load(&data_path).unwrap();
    assert_eq!(store.len(), 1);
    let record = store.get(&root_name(&server)).expect("Root page missing");
    assert_eq!(record.title, "Example Domain");
    assert_eq!(record.first_crawled, record.last_crawled);
}

#[tokio::test]
async fn test_full_crawl_follows_links() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="https://elsewhere.example/">Away</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_page(&server, "/page1", "<title>Page 1</title>".to_string()).await;
    mount_page(&server, "/page2", "<title>Page 2</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let config = create_test_config(&server, &data_path, 10);

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.stop_reason, StopReason::FrontierExhausted);

    let store = storage::load(&data_path).unwrap();
    let name = root_name(&server);
    assert_eq!(store.len(), 3);
    assert_eq!(store.get(&format!("{}/page1", name)).unwrap().title, "Page 1");
    assert_eq!(store.get(&format!("{}/page2", name)).unwrap().title, "Page 2");
}

#[tokio::test]
async fn test_robots_disallow_all() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>Secret</title>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let config = create_test_config(&server, &data_path, 10);

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.status_line(), "0 pages fetched, 0 errors.");
    assert_eq!(summary.skipped_by_robots, 1);

    let contents = std::fs::read_to_string(&data_path).unwrap();
    assert_eq!(contents.trim(), "{}");
}

#[tokio::test]
async fn test_robots_disallow_path() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /admin").await;
    mount_page(
        &server,
        "/",
        r#"<title>Home</title><a href="/allowed">A</a><a href="/admin">B</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/allowed", "<title>Allowed</title>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let summary = crawl(create_test_config(&server, &data_path, 10))
        .await
        .expect("Crawl failed");

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.skipped_by_robots, 1);
    assert_eq!(storage::load(&data_path).unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_links_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<title>Home</title>
        <a href="/dup">1</a><a href="/dup#section">2</a><a href="/dup">3</a>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dup"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>Dup</title><a href=\"/\">home</a>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let summary = crawl(create_test_config(&server, &data_path, 10))
        .await
        .expect("Crawl failed");

    assert_eq!(summary.fetched, 2);
}

#[tokio::test]
async fn test_page_budget_respected() {
    let server = MockServer::start().await;
    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", format!("<title>Home</title>{}", links)).await;
    for i in 0..10 {
        mount_page(&server, &format!("/p{}", i), format!("<title>P{}</title>", i)).await;
    }

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let summary = crawl(create_test_config(&server, &data_path, 4))
        .await
        .expect("Crawl failed");

    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.stop_reason, StopReason::BudgetReached);
    assert_eq!(storage::load(&data_path).unwrap().len(), 4);

    assert_eq!(page_requests(&server).await.len(), 4);
}

#[tokio::test]
async fn test_failed_pages_counted_not_recorded() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<title>Home</title><a href="/gone">x</a><a href="/broken">y</a>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let summary = crawl(create_test_config(&server, &data_path, 10))
        .await
        .expect("Crawl failed");

    assert_eq!(summary.status_line(), "1 pages fetched, 2 errors.");
    assert_eq!(storage::load(&data_path).unwrap().len(), 1);
}

#[tokio::test]
async fn test_recrawl_preserves_first_crawled() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Version 1</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");

    crawl(create_test_config(&server, &data_path, 1))
        .await
        .expect("First crawl failed");
    let first = storage::load(&data_path).unwrap();
    let first = first.get(&root_name(&server)).unwrap().clone();

    server.reset().await;
    mount_page(&server, "/", "<title>Version 2</title>".to_string()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let summary = crawl(create_test_config(&server, &data_path, 1))
        .await
        .expect("Second crawl failed");
    assert_eq!(summary.new_records, 0);
    assert_eq!(summary.updated_records, 1);

    let store = storage::load(&data_path).unwrap();
    let second = store.get(&root_name(&server)).unwrap();
    assert_eq!(second.title, "Version 2");
    assert_eq!(second.first_crawled, first.first_crawled);
    assert!(second.last_crawled > first.last_crawled);
}

#[tokio::test]
async fn test_existing_records_survive_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Home</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let existing: RecordStore = vec![PageRecord::new(
        "other.example",
        "Other",
        chrono::Utc::now(),
    )]
    .into_iter()
    .collect();
    storage::save(&data_path, &existing).unwrap();

    let summary = crawl(create_test_config(&server, &data_path, 1))
        .await
        .expect("Crawl failed");
    assert_eq!(summary.total_records, 2);

    let store = storage::load(&data_path).unwrap();
    assert_eq!(store.get("other.example").unwrap().title, "Other");
}

#[tokio::test]
async fn test_legacy_store_upgraded_on_save() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Home</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    std::fs::write(&data_path, r#"[["legacy.example", "Legacy Title"]]"#).unwrap();

    crawl(create_test_config(&server, &data_path, 1))
        .await
        .expect("Crawl failed");

    let contents = std::fs::read_to_string(&data_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert!(value.is_object());
    assert_eq!(value["legacy.example"]["title"], "Legacy Title");
    assert!(value[root_name(&server).as_str()].is_object());
}

#[tokio::test]
async fn test_unwritable_output_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("no/such/dir/data.json");

    let result = crawl(create_test_config(&server, &data_path, 1)).await;
    assert!(matches!(result, Err(CrawlError::UnwritableOutput(_))));
}

#[tokio::test]
async fn test_cancelled_crawl_still_saves() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Home</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let config = create_test_config(&server, &data_path, 10);

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let summary = Coordinator::new(config, rx)
        .unwrap()
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert!(summary.fetched <= 1);
    assert!(data_path.exists());
}

#[tokio::test]
async fn test_run_timeout_stops_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<title>Slow</title><a href="/next">next</a>"#, "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let mut config = create_test_config(&server, &data_path, 10);
    config.crawler.run_timeout_secs = Some(1);

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.stop_reason, StopReason::TimedOut);
    assert_eq!(summary.fetched, 1);
}

#[tokio::test]
async fn test_directory_seed_resolves_relative_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/docs/",
        r#"<title>Docs</title><a href="intro">Intro</a><a href="../about">About</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/docs/intro", "<title>Intro</title>".to_string()).await;
    mount_page(&server, "/about", "<title>About</title>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let mut config = create_test_config(&server, &data_path, 10);
    config.crawler.start_url = format!("{}/docs/", server.uri());

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.status_line(), "3 pages fetched, 0 errors.");

    let store = storage::load(&data_path).unwrap();
    let name = root_name(&server);
    assert_eq!(store.get(&format!("{}/docs", name)).unwrap().title, "Docs");
    assert_eq!(store.get(&format!("{}/docs/intro", name)).unwrap().title, "Intro");
    assert_eq!(store.get(&format!("{}/about", name)).unwrap().title, "About");
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_skipped() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_page(&server, "/", r#"<title>Home</title><a href="/go">Go</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/private/secret"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>Secret</title>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let summary = crawl(create_test_config(&server, &data_path, 10))
        .await
        .expect("Crawl failed");

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.skipped_by_robots, 1);
    assert_eq!(storage::load(&data_path).unwrap().len(), 1);
    assert!(!page_requests(&server)
        .await
        .contains(&"/private/secret".to_string()));
}

#[tokio::test]
async fn test_cancel_while_waiting_on_crawl_delay() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1").await;
    let links: String = (0..5)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", format!("<title>Home</title>{}", links)).await;
    for i in 0..5 {
        mount_page(&server, &format!("/p{}", i), format!("<title>P{}</title>", i)).await;
    }

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let config = create_test_config(&server, &data_path, 10);

    let (tx, rx) = watch::channel(false);
    let started = std::time::Instant::now();
    let crawl = tokio::spawn(Coordinator::new(config, rx).unwrap().run());

    // robots.txt goes out at once and the seed a second later; the next
    // page would be due a second after that
    tokio::time::sleep(Duration::from_millis(1300)).await;
    tx.send(true).unwrap();
    let summary = crawl.await.unwrap().expect("Crawl failed");

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(1900));
    assert_eq!(page_requests(&server).await, vec!["/".to_string()]);
    assert_eq!(summary.fetched, 1);
    assert!(data_path.exists());
}

#[tokio::test]
async fn test_run_timeout_interrupts_crawl_delay() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 5").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>Home</title>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data.json");
    let mut config = create_test_config(&server, &data_path, 10);
    config.crawler.run_timeout_secs = Some(1);

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.stop_reason, StopReason::TimedOut);
    assert_eq!(summary.fetched, 0);
    assert!(summary.elapsed < Duration::from_secs(3));
}

