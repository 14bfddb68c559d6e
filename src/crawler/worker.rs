//! Fetcher pool: workers that drain the frontier
//!
//! Each worker loops: dequeue → robots check → reserve budget → per-host
//! pacing → GET with bounded retries → extract → enqueue children. A
//! redirect target goes through the scope, robots, dedup and pacing checks
//! again before it is requested. Failures stay local to the URL being
//! processed.

use crate::crawler::{
    fetch_step, Extractor, FetchError, FetchStep, FetchedPage, Frontier, FrontierEntry,
    Politeness,
};
use crate::state::{CrawlState, PageOutcome};
use crate::storage::PageRecord;
use crate::url::{host_with_port, normalize_url, NormalizedUrl};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// Retry and redirect limits for page fetches
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry
    pub backoff: Duration,
    /// Redirect hops followed per page
    pub max_redirects: usize,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Everything a worker needs, shared by the whole pool
pub struct CrawlContext {
    pub state: Arc<CrawlState>,
    pub politeness: Politeness,
    pub extractor: Extractor,
    pub client: Client,
    pub retry: RetryPolicy,
    /// Turns `true` when no new request may start
    pub shutdown: watch::Receiver<bool>,
}

impl CrawlContext {
    fn frontier(&self) -> &Frontier {
        &self.state.frontier
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs `fut` unless the run stops first
    async fn until_stopped<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            _ = wait_for_stop(&mut shutdown) => None,
            out = fut => Some(out),
        }
    }
}

/// Resolves once the receiver reads `true`; never if the sender is gone
pub(crate) async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) {
    let stopped = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !stopped {
        std::future::pending::<()>().await;
    }
}

/// Marks a dequeued entry complete when dropped, even if processing panics
struct InFlight<'a>(&'a Frontier);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Spawns `count` workers on the current runtime
pub fn spawn_workers(count: usize, ctx: Arc<CrawlContext>) -> JoinSet<()> {
    let mut workers = JoinSet::new();
    for id in 0..count {
        workers.spawn(run_worker(id, Arc::clone(&ctx)));
    }
    workers
}

/// Processes frontier entries until the frontier is closed or drained
pub async fn run_worker(id: usize, ctx: Arc<CrawlContext>) {
    tracing::trace!("Worker {} started", id);

    while let Some(entry) = ctx.frontier().dequeue().await {
        let _in_flight = InFlight(ctx.frontier());

        let outcome = process_entry(&ctx, &entry).await;
        ctx.state.counters.record(outcome);
        tracing::debug!("[worker {}] {} -> {}", id, entry.url, outcome);

        if outcome.is_fetched() {
            let fetched = ctx.state.counters.snapshot().fetched;
            if fetched % 10 == 0 {
                let elapsed = ctx.state.elapsed();
                tracing::info!(
                    "Progress: {} pages fetched, {} in frontier, {:.2} pages/sec",
                    fetched,
                    ctx.frontier().pending_len(),
                    fetched as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                );
            }
        }
    }

    tracing::trace!("Worker {} finished", id);
}

/// How following a page's redirects ended
enum Resolved {
    Page(NormalizedUrl, FetchedPage),
    Skipped(PageOutcome),
}

/// Handles one dequeued URL from robots check to enqueued children
async fn process_entry(ctx: &CrawlContext, entry: &FrontierEntry) -> PageOutcome {
    let url = &entry.url;

    match ctx.until_stopped(ctx.politeness.allows(url)).await {
        None => return PageOutcome::Cancelled,
        Some(false) => {
            tracing::info!("URL {} disallowed by robots.txt", url);
            return PageOutcome::DisallowedByRobots;
        }
        Some(true) => {}
    }

    if ctx.is_shutting_down() {
        return PageOutcome::Cancelled;
    }
    if !ctx.frontier().try_reserve() {
        return PageOutcome::BudgetExhausted;
    }

    let (final_url, page) = match follow_redirects(ctx, entry).await {
        Ok(Resolved::Page(final_url, page)) => (final_url, page),
        Ok(Resolved::Skipped(outcome)) => return outcome,
        Err(e) => {
            tracing::warn!("Giving up on {}: {}", url, e);
            return PageOutcome::Failed;
        }
    };

    if !page.is_html() {
        tracing::debug!(
            "Skipping extraction for {} ({})",
            final_url,
            page.content_type.as_deref().unwrap_or("no content type")
        );
        return PageOutcome::NonHtml;
    }

    let extracted = ctx.extractor.extract(&page.body, &final_url, entry.depth);
    for _ in 0..extracted.rejected {
        ctx.state.counters.record_rejected();
    }

    let child_depth = entry.depth.saturating_add(1);
    let mut queued = 0;
    for link in extracted.links {
        if ctx.frontier().enqueue(link, child_depth) {
            queued += 1;
        }
    }
    tracing::trace!("{}: {} new links queued", final_url, queued);

    ctx.state
        .push_record(PageRecord::new(extracted.name, extracted.title, Utc::now()));
    PageOutcome::Recorded
}

/// Requests an entry and each redirect target in turn
///
/// Every target must be in scope, allowed by robots.txt and not yet visited
/// before it is requested, and each request waits for its host's turn.
async fn follow_redirects(
    ctx: &CrawlContext,
    entry: &FrontierEntry,
) -> Result<Resolved, FetchError> {
    let mut current = entry.url.clone();
    let mut claimed: HashSet<NormalizedUrl> = HashSet::from([entry.url.clone()]);
    let mut requested: HashSet<Url> = HashSet::new();

    for hop in 0..=ctx.retry.max_redirects {
        if hop > 0 {
            if !ctx.extractor.follows(&current, entry.depth) {
                tracing::debug!("{} redirected out of scope to {}", entry.url, current);
                return Ok(Resolved::Skipped(PageOutcome::RedirectOutOfScope));
            }
            match ctx.until_stopped(ctx.politeness.allows(&current)).await {
                None => return Ok(Resolved::Skipped(PageOutcome::Cancelled)),
                Some(false) => {
                    tracing::info!(
                        "{} redirected to {}, disallowed by robots.txt",
                        entry.url,
                        current
                    );
                    return Ok(Resolved::Skipped(PageOutcome::DisallowedByRobots));
                }
                Some(true) => {}
            }
            if claimed.insert(current.clone()) && !ctx.frontier().mark_visited(&current) {
                tracing::debug!("{} redirected to already visited {}", entry.url, current);
                return Ok(Resolved::Skipped(PageOutcome::DuplicateRedirect));
            }
        }

        let target = current.request_url().clone();
        if !requested.insert(target.clone()) {
            return Err(FetchError::RedirectLoop {
                url: target.to_string(),
            });
        }

        let next = match fetch_with_retries(ctx, &current).await? {
            None => return Ok(Resolved::Skipped(PageOutcome::Cancelled)),
            Some(FetchStep::Page(page)) => return Ok(Resolved::Page(current, page)),
            Some(FetchStep::Redirect(next)) => next,
        };

        tracing::trace!("Redirect {} -> {}", target, next);
        current = normalize_url(next.as_str()).map_err(|e| FetchError::BadRedirect {
            url: target.to_string(),
            message: e.to_string(),
        })?;
    }

    Err(FetchError::RedirectLimit {
        url: entry.url.to_string(),
    })
}

/// Requests one URL, retrying retryable failures with exponential backoff
///
/// Every attempt waits for the host's politeness slot first. Returns
/// `Ok(None)` when the run stops before an attempt can start.
async fn fetch_with_retries(
    ctx: &CrawlContext,
    url: &NormalizedUrl,
) -> Result<Option<FetchStep>, FetchError> {
    let target = url.request_url();
    let host = host_with_port(target).unwrap_or_else(|| url.host().to_string());
    let mut attempt = 0;

    loop {
        if ctx.until_stopped(ctx.politeness.acquire(&host)).await.is_none()
            || ctx.is_shutting_down()
        {
            return Ok(None);
        }

        match fetch_step(&ctx.client, target).await {
            Ok(step) => return Ok(Some(step)),
            Err(e) if e.is_retryable() && attempt < ctx.retry.max_retries => {
                let backoff = ctx.retry.backoff_for(attempt);
                tracing::debug!(
                    "Attempt {} for {} failed: {}; retrying in {:?}",
                    attempt + 1,
                    url,
                    e,
                    backoff
                );
                if ctx.until_stopped(tokio::time::sleep(backoff)).await.is_none() {
                    return Err(e);
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlerConfig, UserAgentConfig};
    use crate::crawler::build_http_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(
        server: &MockServer,
        max_pages: usize,
        max_retries: u32,
    ) -> (Arc<CrawlContext>, watch::Sender<bool>) {
        context_with_backoff(server, max_pages, max_retries, Duration::from_millis(10))
    }

    fn context_with_backoff(
        server: &MockServer,
        max_pages: usize,
        max_retries: u32,
        backoff: Duration,
    ) -> (Arc<CrawlContext>, watch::Sender<bool>) {
        let config = CrawlerConfig::default();
        let client = build_http_client(&UserAgentConfig::default(), &config).unwrap();
        let seed = normalize_url(&format!("{}/", server.uri())).unwrap();
        let (tx, rx) = watch::channel(false);

        let ctx = CrawlContext {
            state: Arc::new(CrawlState::new(Frontier::new(max_pages))),
            politeness: Politeness::new(client.clone(), "SiteIndexer", Duration::ZERO, 5),
            extractor: Extractor::new(seed.clone(), &config),
            client,
            retry: RetryPolicy {
                max_retries,
                backoff,
                max_redirects: 5,
            },
            shutdown: rx,
        };
        ctx.state.frontier.enqueue(seed, 0);
        (Arc::new(ctx), tx)
    }

    async fn mount_html(server: &MockServer, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(server)
            .await;
    }

    async fn mount_redirect(server: &MockServer, at: &str, location: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(302).insert_header("location", location))
            .mount(server)
            .await;
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(500),
            max_redirects: 5,
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_worker_follows_links() {
        let server = MockServer::start().await;
        mount_html(&server, "/", r#"<title>Home</title><a href="/a">A</a><a href="/b">B</a>"#).await;
        mount_html(&server, "/a", "<title>A</title>").await;
        mount_html(&server, "/b", "<title>B</title>").await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.fetched, 3);
        assert_eq!(counters.failed, 0);
        assert_eq!(ctx.state.take_records().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (ctx, _tx) = context(&server, 10, 2);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.fetched, 0);
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, _tx) = context(&server, 10, 2);
        run_worker(0, Arc::clone(&ctx)).await;

        assert_eq!(ctx.state.counters.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_non_html_counted_not_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .mount(&server)
            .await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.fetched, 1);
        assert_eq!(counters.non_html, 1);
        assert!(ctx.state.take_records().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_to_visited_page_not_recorded_twice() {
        let server = MockServer::start().await;
        mount_html(&server, "/", r#"<title>Home</title><a href="/alias">Alias</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/alias"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/"))
            .mount(&server)
            .await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.fetched, 2);
        assert_eq!(counters.duplicate_redirects, 1);
        assert_eq!(ctx.state.take_records().len(), 1);
    }

    #[tokio::test]
    async fn test_budget_limits_fetches() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="/1">1</a><a href="/2">2</a><a href="/3">3</a><a href="/4">4</a>"#,
        )
        .await;
        for i in 1..=4 {
            mount_html(&server, &format!("/{}", i), "<title>Child</title>").await;
        }

        let (ctx, _tx) = context(&server, 2, 0);
        let mut workers = spawn_workers(3, Arc::clone(&ctx));
        while workers.join_next().await.is_some() {}

        assert_eq!(ctx.state.counters.snapshot().fetched, 2);
        assert_eq!(ctx.state.frontier.budget().reserved(), 2);
    }

    #[tokio::test]
    async fn test_directory_redirect_resolves_links_against_slash() {
        let server = MockServer::start().await;
        mount_html(&server, "/", r#"<title>Home</title><a href="/docs">Docs</a>"#).await;
        mount_redirect(&server, "/docs", "/docs/").await;
        mount_html(&server, "/docs/", r#"<title>Docs</title><a href="intro">Intro</a>"#).await;
        mount_html(&server, "/docs/intro", "<title>Intro</title>").await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.fetched, 3);
        assert_eq!(counters.failed, 0);
        let mut titles: Vec<_> = ctx
            .state
            .take_records()
            .into_iter()
            .map(|r| r.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["Docs", "Home", "Intro"]);
    }

    #[tokio::test]
    async fn test_redirect_into_disallowed_path_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "User-agent: *\nDisallow: /private",
                "text/plain",
            ))
            .mount(&server)
            .await;
        mount_redirect(&server, "/", "/private/secret").await;
        Mock::given(method("GET"))
            .and(path("/private/secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<title>Secret</title>", "text/html"),
            )
            .expect(0)
            .mount(&server)
            .await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.skipped_by_robots, 1);
        assert_eq!(counters.fetched, 0);
        assert!(ctx.state.take_records().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_out_of_scope_not_followed() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/", "http://elsewhere.invalid/landing").await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.out_of_scope, 1);
        assert_eq!(counters.failed, 0);
        assert!(ctx.state.take_records().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_cycle_fails() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/", "/a").await;
        mount_redirect(&server, "/a", "/").await;

        let (ctx, _tx) = context(&server, 10, 0);
        run_worker(0, Arc::clone(&ctx)).await;

        assert_eq!(ctx.state.counters.snapshot().failed, 1);
        assert!(ctx.state.take_records().is_empty());
    }

    #[tokio::test]
    async fn test_no_request_after_stop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<title>Home</title>", "text/html"),
            )
            .expect(0)
            .mount(&server)
            .await;

        let (ctx, tx) = context(&server, 10, 0);
        tx.send(true).unwrap();
        run_worker(0, Arc::clone(&ctx)).await;

        let counters = ctx.state.counters.snapshot();
        assert_eq!(counters.fetched, 0);
        assert_eq!(counters.abandoned, 1);
    }

    #[tokio::test]
    async fn test_stop_interrupts_retry_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, tx) = context_with_backoff(&server, 10, 3, Duration::from_secs(30));
        let worker = tokio::spawn(run_worker(0, Arc::clone(&ctx)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .expect("worker kept sleeping after stop")
            .unwrap();
        assert_eq!(ctx.state.counters.snapshot().failed, 1);
    }
}
