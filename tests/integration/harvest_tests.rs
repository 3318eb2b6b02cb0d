//! Integration tests for the harvester
//!
//! These tests serve a small paginated site from wiremock and drive full
//! add/update cycles through the public `Harvester` API.

use scraper::{Html, Selector};
use serial_harvest::config::{parse_config, Config, SiteProfile};
use serial_harvest::harvester::HarvestStatus;
use serial_harvest::loader::{fixed_jitter, RecordingSleeper};
use serial_harvest::model::NovelRecord;
use serial_harvest::scrape::{FieldExtractors, ProfileStrategy};
use serial_harvest::storage::{open_repository, InMemoryRepository, NovelRepository};
use serial_harvest::{ConfigError, HarvestError, Harvester};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// A fake serial site whose table of contents can change between runs
#[derive(Clone)]
struct Site {
    total: Arc<AtomicUsize>,
    per_page: Arc<AtomicUsize>,
    prefix: Arc<Mutex<String>>,
    status: Arc<Mutex<String>>,
}

impl Site {
    fn new(total: usize, per_page: usize) -> Self {
        Self {
            total: Arc::new(AtomicUsize::new(total)),
            per_page: Arc::new(AtomicUsize::new(per_page)),
            prefix: Arc::new(Mutex::new("c".to_string())),
            status: Arc::new(Mutex::new("Ongoing".to_string())),
        }
    }

    fn publish(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    fn repaginate(&self, per_page: usize) {
        self.per_page.store(per_page, Ordering::SeqCst);
    }

    /// Landing page without a `page` parameter, table-of-contents page otherwise
    fn novel(&self, request: &Request) -> ResponseTemplate {
        let total = self.total.load(Ordering::SeqCst);
        let per_page = self.per_page.load(Ordering::SeqCst);
        let pages = total.div_ceil(per_page).max(1);
        let page: Option<usize> = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok());

        let body = match page {
            None => format!(
                r#"<html><body>
                <h1>The Long Road</h1>
                <div class="status">{}</div>
                <a class="last" href="/novel?page={}">Last</a>
                </body></html>"#,
                self.status.lock().unwrap(),
                pages
            ),
            Some(page) => {
                let prefix = self.prefix.lock().unwrap().clone();
                let first = (page - 1) * per_page + 1;
                let last = (page * per_page).min(total);
                let links: String = (first..=last)
                    .map(|n| format!(r#"<li><a href="/{}/{}">Chapter {}</a></li>"#, prefix, n, n))
                    .collect();
                format!(r#"<html><body><ul class="chapters">{}</ul></body></html>"#, links)
            }
        };

        ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("content-type", "text/html")
    }

    async fn mount(&self, server: &MockServer) {
        let site = self.clone();
        Mock::given(method("GET"))
            .and(path("/novel"))
            .respond_with(move |request: &Request| site.novel(request))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/[a-z]+/\d+$"))
            .respond_with(chapter_page)
            .mount(server)
            .await;
    }
}

fn chapter_page(request: &Request) -> ResponseTemplate {
    let number = request.url.path().rsplit('/').next().unwrap_or_default().to_string();
    let paragraphs: String = (1..=5)
        .map(|p| format!("<p>Chapter {} paragraph {}.</p>", number, p))
        .collect();
    ResponseTemplate::new(200)
        .set_body_string(format!(
            r#"<html><body><h2>Chapter {}</h2><div class="text">{}</div></body></html>"#,
            number, paragraphs
        ))
        .insert_header("content-type", "text/html")
}

/// Creates a test configuration for a site served at `authority`
fn create_test_config(authority: &str, output_dir: &Path) -> Config {
    parse_config(&format!(
        r#"
[harvester]
concurrency = 2
loader-max-attempts = 1
chapter-max-attempts = 2
retry-base-delay-ms = 10

[output]
database-path = "unused.db"
output-dir = "{}"

[[site]]
authority = "{}"
pagination = "{{url}}?page={{page}}"
last-page-attribute = "href"
last-page-query-param = "page"

[site.selectors]
title = "h1"
status = ".status"
chapter-links = "ul.chapters a"
chapter-title = "h2"
content = "div.text p"
last-page = "a.last"
"#,
        output_dir.display(),
        authority
    ))
    .expect("Failed to parse test config")
}

fn create_harvester<R>(config: Config, repository: R) -> (Harvester, Arc<RecordingSleeper>)
where
    R: NovelRepository + 'static,
{
    let sleeper = Arc::new(RecordingSleeper::default());
    let harvester = Harvester::with_sleeper(config, repository, sleeper.clone())
        .expect("Failed to create harvester")
        .with_jitter(fixed_jitter(1.0));
    (harvester, sleeper)
}

fn stored(harvester: &Harvester, url: &str) -> NovelRecord {
    harvester
        .repository()
        .lock()
        .unwrap()
        .get_by_url(url)
        .unwrap()
        .expect("record should exist")
}

/// Paths of chapter requests received after the first `skip` requests
async fn chapter_paths(server: &MockServer, skip: usize) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .skip(skip)
        .filter(|r| r.url.path() != "/novel")
        .map(|r| r.url.path().to_string())
        .collect()
}

/// `page` values of table-of-contents requests after the first `skip` requests
async fn toc_pages(server: &MockServer, skip: usize) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .skip(skip)
        .filter(|r| r.url.path() == "/novel")
        .filter_map(|r| r.url.query_pairs().find(|(k, _)| k == "page").map(|(_, v)| v.to_string()))
        .collect()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn test_new_source_fetches_every_chapter() {
    let server = MockServer::start().await;
    let site = Site::new(5, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    let outcome = harvester.harvest(&url).await.expect("Harvest failed");

    assert_eq!(outcome.status, HarvestStatus::Added);
    assert_eq!(outcome.title, "The Long Road");
    assert_eq!(outcome.chapters_fetched, 5);
    assert!(outcome.failed_chapters.is_empty());
    assert_eq!(toc_pages(&server, 0).await, vec!["1", "2", "3"]);

    let document = std::fs::read_to_string(outcome.document.expect("document path")).unwrap();
    let first = document.find("## Chapter 1").expect("chapter 1 rendered");
    let last = document.find("## Chapter 5").expect("chapter 5 rendered");
    assert!(first < last);
    assert!(document.contains("Chapter 3 paragraph 5."));

    let record = stored(&harvester, &url);
    assert_eq!(record.chapters.len(), 5);
    assert_eq!(record.last_toc_page, 3);
    assert_eq!(
        record.current_chapter_url.as_deref(),
        Some(format!("{}/c/5", server.uri()).as_str())
    );
    assert!(!record.completed);
}

#[tokio::test]
async fn test_unchanged_source_is_up_to_date() {
    let server = MockServer::start().await;
    let site = Site::new(5, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    harvester.harvest(&url).await.expect("First harvest failed");
    let before = stored(&harvester, &url);
    let seen = request_count(&server).await;

    let outcome = harvester.harvest(&url).await.expect("Second harvest failed");

    assert_eq!(outcome.status, HarvestStatus::UpToDate);
    assert_eq!(outcome.chapters_fetched, 0);
    assert!(outcome.document.is_none());
    assert!(chapter_paths(&server, seen).await.is_empty());
    // Resumes at the last recorded table-of-contents page
    assert_eq!(toc_pages(&server, seen).await, vec!["3"]);

    let after = stored(&harvester, &url);
    assert_eq!(after.chapters, before.chapters);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.last_modified >= before.last_modified);
}

#[tokio::test]
async fn test_update_fetches_only_new_chapters() {
    let server = MockServer::start().await;
    let site = Site::new(5, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    harvester.harvest(&url).await.expect("First harvest failed");
    let seen = request_count(&server).await;

    site.publish(8);
    *site.status.lock().unwrap() = "Completed".to_string();
    let outcome = harvester.harvest(&url).await.expect("Update failed");

    assert_eq!(outcome.status, HarvestStatus::Updated);
    assert_eq!(outcome.chapters_fetched, 3);

    let mut fetched = chapter_paths(&server, seen).await;
    fetched.sort();
    assert_eq!(fetched, vec!["/c/6", "/c/7", "/c/8"]);
    assert_eq!(toc_pages(&server, seen).await, vec!["3", "4"]);

    let document = std::fs::read_to_string(outcome.document.expect("document path")).unwrap();
    assert_eq!(document.matches("# The Long Road").count(), 1);
    assert!(document.find("## Chapter 5").unwrap() < document.find("## Chapter 6").unwrap());
    assert!(document.contains("## Chapter 8"));

    let record = stored(&harvester, &url);
    let urls: Vec<_> = record.chapters.iter().map(|c| c.url.clone()).collect();
    assert_eq!(urls.len(), 8);
    assert_eq!(urls[7], format!("{}/c/8", server.uri()));
    assert_eq!(record.last_toc_page, 4);
    assert!(record.completed);
    assert_eq!(record.status.as_deref(), Some("Completed"));
}

#[tokio::test]
async fn test_source_added_without_chapters_updates_later() {
    let server = MockServer::start().await;
    let site = Site::new(0, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    let outcome = harvester.harvest(&url).await.expect("First harvest failed");
    assert_eq!(outcome.status, HarvestStatus::Added);
    assert_eq!(outcome.chapters_fetched, 0);
    assert!(stored(&harvester, &url).current_chapter_url.is_none());
    let seen = request_count(&server).await;

    site.publish(3);
    let outcome = harvester.harvest(&url).await.expect("Update failed");

    assert_eq!(outcome.status, HarvestStatus::Updated);
    assert_eq!(outcome.chapters_fetched, 3);
    assert_eq!(toc_pages(&server, seen).await, vec!["1", "2"]);

    let mut fetched = chapter_paths(&server, seen).await;
    fetched.sort();
    assert_eq!(fetched, vec!["/c/1", "/c/2", "/c/3"]);

    let document = std::fs::read_to_string(outcome.document.expect("document path")).unwrap();
    assert!(document.find("## Chapter 1").unwrap() < document.find("## Chapter 3").unwrap());

    let record = stored(&harvester, &url);
    assert_eq!(record.chapters.len(), 3);
    assert_eq!(
        record.current_chapter_url.as_deref(),
        Some(format!("{}/c/3", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_resume_rewalks_when_checkpoint_moved() {
    let server = MockServer::start().await;
    let site = Site::new(5, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    harvester.harvest(&url).await.expect("First harvest failed");
    let seen = request_count(&server).await;

    // Page 2 now starts at chapter 7, so the recorded page no longer lists chapter 5
    site.publish(8);
    site.repaginate(6);
    let outcome = harvester.harvest(&url).await.expect("Update failed");

    assert_eq!(outcome.status, HarvestStatus::Updated);
    assert_eq!(toc_pages(&server, seen).await, vec!["2", "1", "2"]);

    let mut fetched = chapter_paths(&server, seen).await;
    fetched.sort();
    assert_eq!(fetched, vec!["/c/6", "/c/7", "/c/8"]);
}

#[tokio::test]
async fn test_restructured_site_reports_inconsistency() {
    let server = MockServer::start().await;
    let site = Site::new(5, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    harvester.harvest(&url).await.expect("First harvest failed");
    let before = stored(&harvester, &url);
    let seen = request_count(&server).await;

    *site.prefix.lock().unwrap() = "r".to_string();
    let result = harvester.harvest(&url).await;

    assert!(matches!(
        result,
        Err(HarvestError::CheckpointInconsistency { .. })
    ));
    assert!(chapter_paths(&server, seen).await.is_empty());

    let after = stored(&harvester, &url);
    assert_eq!(after.chapters, before.chapters);
    assert_eq!(after.last_modified, before.last_modified);
}

#[tokio::test]
async fn test_unknown_site_does_not_stop_batch() {
    let server = MockServer::start().await;
    let site = Site::new(3, 5);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, _) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let unknown = "https://unknown.example/novel".to_string();
    let url = format!("{}/novel", server.uri());

    let summary = harvester.harvest_all(&[unknown.clone(), url.clone()]).await;

    assert!(summary.has_failures());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].url, unknown);
    assert!(summary.failures[0].message.contains("No site profile"));
    assert_eq!(summary.added(), 1);
    assert_eq!(summary.outcomes[0].url, url);
    assert!(summary.finished_at.is_some());
}

#[tokio::test]
async fn test_failing_chapter_becomes_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let site = Site::new(5, 5);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let (harvester, sleeper) = create_harvester(
        create_test_config(&server.uri(), out.path()),
        InMemoryRepository::new(),
    );
    let url = format!("{}/novel", server.uri());

    let summary = harvester.harvest_all(&[url.clone()]).await;

    assert!(!summary.has_failures());
    assert_eq!(summary.chapters_fetched(), 5);
    let failed = format!("{}/c/3", server.uri());
    assert_eq!(summary.failed_chapters(), vec![failed.as_str()]);
    assert_eq!(chapter_paths(&server, 0).await.iter().filter(|p| *p == "/c/3").count(), 2);
    assert_eq!(sleeper.recorded(), vec![Duration::from_millis(10)]);

    let document = std::fs::read_to_string(summary.outcomes[0].document.clone().unwrap()).unwrap();
    assert!(document.contains("## Failed to retrieve content"));
    assert!(document.contains("## Chapter 4"));
}

#[tokio::test]
async fn test_state_survives_restart_with_sqlite() {
    let server = MockServer::start().await;
    let site = Site::new(4, 2);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let db_path = out.path().join("state").join("harvest.db");
    let url = format!("{}/novel", server.uri());

    {
        let repository = open_repository(&db_path).expect("Failed to open DB");
        let (harvester, _) =
            create_harvester(create_test_config(&server.uri(), out.path()), repository);
        let outcome = harvester.harvest(&url).await.expect("First harvest failed");
        assert_eq!(outcome.status, HarvestStatus::Added);
    }

    site.publish(5);
    let seen = request_count(&server).await;

    let repository = open_repository(&db_path).expect("Failed to reopen DB");
    let (harvester, _) = create_harvester(create_test_config(&server.uri(), out.path()), repository);
    let outcome = harvester.harvest(&url).await.expect("Update failed");

    assert_eq!(outcome.status, HarvestStatus::Updated);
    assert_eq!(chapter_paths(&server, seen).await, vec!["/c/5"]);
    assert_eq!(stored(&harvester, &url).chapters.len(), 5);
}

fn shouted_title(document: &Html, _profile: &SiteProfile) -> Result<Option<String>, ConfigError> {
    let selector = Selector::parse("h1").unwrap();
    Ok(document
        .select(&selector)
        .next()
        .map(|e| e.text().collect::<String>().to_uppercase()))
}

#[tokio::test]
async fn test_registered_strategy_replaces_profile_default() {
    let server = MockServer::start().await;
    let site = Site::new(2, 5);
    site.mount(&server).await;

    let out = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), out.path());
    let profile = config.sites[0].clone();
    let (mut harvester, _) = create_harvester(config, InMemoryRepository::new());

    let strategy = ProfileStrategy::new(&profile).with_extractors(FieldExtractors {
        title: shouted_title,
        ..FieldExtractors::default()
    });
    harvester
        .registry_mut()
        .register(profile, Arc::new(strategy))
        .unwrap();
    assert_eq!(harvester.registry().len(), 1);

    let url = format!("{}/novel", server.uri());
    let outcome = harvester.harvest(&url).await.expect("Harvest failed");

    assert_eq!(outcome.title, "THE LONG ROAD");
    assert_eq!(outcome.chapters_fetched, 2);
}
