//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small catalog and run discovery,
//! extraction and checkpointing end-to-end over HTTP.

use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{
    run_harvest, HarvestMode, HarvestOptions, Harvester, HttpSessionFactory, SessionFactory,
};
use catalog_harvest::output::{
    load_ledger_summary, read_records, read_url_column, COMBINED_URLS_FILE, FINAL_CSV_FILE,
    FINAL_XLSX_FILE, URL_COLUMN,
};
use catalog_harvest::storage::{open_ledger, Ledger, RunStatus};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a configuration for a single category served by `server` and loads it
fn create_test_config(server: &MockServer, dir: &Path) -> (Config, String) {
    let content = format!(
        r#"
[harvest]
quota = 10
batch-size = 1000
worker-count = 4

[discovery]
max-pages = 3
sort-modes = []
search-terms = []
search-url = "{base}/search"

[politeness.item-delay]
min-ms = 0
max-ms = 0

[politeness.page-delay]
min-ms = 0
max-ms = 0

[politeness.category-delay]
min-ms = 0
max-ms = 0

[fetcher]
user-agent = "HarvestTest/1.0"
page-load-timeout-secs = 5
ready-timeout-secs = 1

[output]
directory = "{out}"
database-path = "{db}"

[[category]]
url = "{base}/shelf/show/fantasy"
"#,
        base = server.uri(),
        out = dir.join("out").display(),
        db = dir.join("harvest.db").display(),
    );

    let config_path = dir.join("harvest.toml");
    std::fs::write(&config_path, content).unwrap();
    load_config_with_hash(&config_path).unwrap()
}

fn book_page(id: usize) -> String {
    format!(
        r#"<html><body>
             <h1 data-testid="bookTitle">Book {id}</h1>
             <span data-testid="name">Author {id}</span>
             <div data-testid="reviewHeader"><div>4.25</div></div>
             <meta itemprop="ratingCount" content="1,204">
             <div data-testid="description"><span>{description}</span></div>
             <div data-testid="genresList"><a>Fantasy</a><a>Fiction</a></div>
           </body></html>"#,
        id = id,
        description = "x".repeat(200)
    )
}

/// Mounts a listing with ten books; the books in `broken` answer with a server error
async fn mount_catalog(server: &MockServer, broken: &[usize]) {
    let links: String = (1..=10)
        .map(|i| format!(r#"<a class="bookTitle" href="/book/show/{}">Book</a>"#, i))
        .collect();

    Mock::given(method("GET"))
        .and(path("/shelf/show/fantasy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body>{}</body></html>", links))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;

    for i in 1..=10 {
        let response = if broken.contains(&i) {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200)
                .set_body_string(book_page(i))
                .insert_header("content-type", "text/html")
        };
        Mock::given(method("GET"))
            .and(path(format!("/book/show/{}", i)))
            .respond_with(response)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_full_harvest_over_http() {
    let server = MockServer::start().await;
    mount_catalog(&server, &[9, 10]).await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&server, dir.path());

    let summary = run_harvest(config, &hash, HarvestOptions::default())
        .await
        .expect("harvest failed");

    assert_eq!(summary.discovery.len(), 1);
    assert_eq!(summary.discovery[0].category, "fantasy");
    assert!(summary.discovery[0].quota_met());
    assert_eq!(summary.url_count, 10);

    let extraction = summary.extraction.expect("extraction did not run");
    assert_eq!(extraction.records, 8);
    assert_eq!(extraction.failures, 2);
    assert_eq!(extraction.fatal_workers, 0);

    let export = summary.export.expect("no final export");
    assert_eq!(export.statistics.records, 8);
    assert_eq!(export.statistics.with_rating, 8);
    assert_eq!(export.statistics.avg_description_len, 200.0);

    let out = dir.path().join("out");
    let batch = read_records(&out.join("books_batch_1.csv")).unwrap();
    assert_eq!(batch.len(), 8);
    assert!(out.join("books_progress_total_8.csv").exists());
    assert!(out.join(FINAL_XLSX_FILE).exists());

    let record = batch
        .iter()
        .find(|r| r.title == "Book 3")
        .expect("book 3 missing");
    assert_eq!(record.author, "Author 3");
    assert_eq!(record.rating, Some(4.25));
    assert_eq!(record.rating_count, Some(1204));
    assert_eq!(record.genres, vec!["Fantasy", "Fiction"]);

    let urls = read_url_column(&out.join(COMBINED_URLS_FILE), URL_COLUMN).unwrap();
    assert_eq!(urls.len(), 10);
    assert!(urls.iter().all(|u| u.contains("/book/show/") && !u.contains('?')));

    let ledger = open_ledger(&dir.path().join("harvest.db")).unwrap();
    let ledger_summary = load_ledger_summary(&ledger).unwrap();
    let run = ledger_summary.latest_run().expect("no run recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, hash);
    assert!(ledger_summary.shortfalls().is_empty());
    assert_eq!(ledger_summary.records_checkpointed(), 8);
}

#[tokio::test]
async fn test_resumed_harvest_matches_uninterrupted() {
    let server = MockServer::start().await;
    mount_catalog(&server, &[]).await;

    let full_dir = TempDir::new().unwrap();
    let (mut full_config, hash) = create_test_config(&server, full_dir.path());
    full_config.harvest.batch_size = 4;
    full_config.harvest.worker_count = 1;
    run_harvest(full_config, &hash, HarvestOptions::default())
        .await
        .unwrap();
    let expected = read_records(&full_dir.path().join("out").join(FINAL_CSV_FILE)).unwrap();
    assert_eq!(expected.len(), 10);

    let resumed_dir = TempDir::new().unwrap();
    let (mut config, hash) = create_test_config(&server, resumed_dir.path());
    config.harvest.batch_size = 4;
    config.harvest.worker_count = 1;

    // First attempt stops after one checkpointed batch without completing the run
    let mut limited = config.clone();
    limited.harvest.max_batches = Some(1);
    let factory: Arc<dyn SessionFactory> =
        Arc::new(HttpSessionFactory::new(limited.fetcher.clone()));
    let mut first = Harvester::new(limited, &hash, false, factory).unwrap();
    let (_, urls) = first.discover_all().await.unwrap();
    let partial = first.extract(&urls).await.unwrap();
    assert_eq!(partial.batches_run, 1);
    drop(first);

    let ledger = open_ledger(&resumed_dir.path().join("harvest.db")).unwrap();
    let unfinished = ledger.get_latest_run().unwrap().unwrap();
    assert_eq!(unfinished.status, RunStatus::Running);
    drop(ledger);

    let summary = run_harvest(config, &hash, HarvestOptions::default())
        .await
        .unwrap();

    assert!(summary.resumed);
    assert_eq!(summary.run_id, unfinished.id);
    // Discovery results were reused from the first attempt
    assert!(summary.discovery.is_empty());
    let extraction = summary.extraction.unwrap();
    assert_eq!(extraction.batches_skipped, 1);
    assert_eq!(extraction.batches_run, 2);

    let resumed = read_records(&resumed_dir.path().join("out").join(FINAL_CSV_FILE)).unwrap();
    assert_eq!(resumed, expected);
}

#[tokio::test]
async fn test_discover_then_extract_only() {
    let server = MockServer::start().await;
    mount_catalog(&server, &[]).await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&server, dir.path());

    let discovered = run_harvest(
        config.clone(),
        &hash,
        HarvestOptions {
            mode: HarvestMode::DiscoverOnly,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(discovered.url_count, 10);
    assert!(discovered.export.is_none());
    assert!(!dir.path().join("out").join(FINAL_CSV_FILE).exists());

    let extracted = run_harvest(
        config,
        &hash,
        HarvestOptions {
            mode: HarvestMode::ExtractOnly,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(!extracted.resumed);
    assert_ne!(extracted.run_id, discovered.run_id);
    assert_eq!(extracted.url_count, 10);
    assert_eq!(extracted.export.unwrap().statistics.records, 10);
}
