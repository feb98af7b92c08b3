use cdxurls::pipeline::{CancelToken, NoProgress, OutputSinks, ProgressSink};
use cdxurls::{Opts, OutputMode, PipelineConfig, RunSummary};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CDX_PATH: &str = "/cdx/search/cdx";

/// Mock CDX server driven from plain (non-async) tests; the pipeline's blocking client must not
/// run inside a tokio context.
struct MockCdx {
    server: Option<MockServer>,
    rt: Runtime,
}

impl MockCdx {
    fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self {
            server: Some(server),
            rt,
        }
    }

    fn server(&self) -> &MockServer {
        self.server.as_ref().unwrap()
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.server().uri(), CDX_PATH)
    }

    fn page_count(&self, body: &str) {
        let mock = Mock::given(method("GET"))
            .and(path(CDX_PATH))
            .and(query_param("showNumPages", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body));
        self.rt.block_on(mock.mount(self.server()));
    }

    fn page(&self, page: usize, template: ResponseTemplate) {
        let mock = Mock::given(method("GET"))
            .and(path(CDX_PATH))
            .and(query_param("page", page.to_string()))
            .and(query_param("fl", "original"))
            .and(query_param("collapse", "urlkey"))
            .respond_with(template);
        self.rt.block_on(mock.mount(self.server()));
    }

    fn page_once(&self, page: usize, template: ResponseTemplate) {
        let mock = Mock::given(method("GET"))
            .and(path(CDX_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(template)
            .up_to_n_times(1);
        self.rt.block_on(mock.mount(self.server()));
    }

    /// Number of requests received for `page`.
    fn requests_for_page(&self, page: usize) -> usize {
        let requests = self
            .rt
            .block_on(self.server().received_requests())
            .unwrap_or_default();
        let page = page.to_string();
        requests
            .iter()
            .filter(|r| r.url.query_pairs().any(|(k, v)| k == "page" && v == page))
            .count()
    }

    /// The `url=` parameter of every request received.
    fn url_params(&self) -> Vec<String> {
        let requests = self
            .rt
            .block_on(self.server().received_requests())
            .unwrap_or_default();
        requests
            .iter()
            .filter_map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "url")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }
}

impl Drop for MockCdx {
    fn drop(&mut self) {
        let _guard = self.rt.enter();
        self.server.take();
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingProgress {
    total: Mutex<Option<usize>>,
    done: Mutex<Vec<usize>>,
}

impl ProgressSink for RecordingProgress {
    fn start(&self, total_pages: usize) {
        *self.total.lock().unwrap() = Some(total_pages);
    }
    fn page_done(&self, completed: usize) {
        self.done.lock().unwrap().push(completed);
    }
}

fn opts(endpoint: &str, pattern: &str, mode: OutputMode) -> Opts {
    Opts {
        url_pattern: pattern.to_string(),
        mode,
        endpoint: endpoint.to_string(),
        workers: 4,
        page_workers: 4,
        timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(1),
        progress: false,
        ..Opts::default()
    }
}

fn run_with(opts: &Opts) -> (anyhow::Result<RunSummary>, Vec<String>) {
    let config = PipelineConfig::from_opts(opts).unwrap();
    let buf = SharedBuf::default();
    let sinks = OutputSinks::new(Box::new(buf.clone()));
    let res = cdxurls::run(&config, sinks, Arc::new(NoProgress), &CancelToken::new());
    (res, buf.lines())
}

fn assert_unique(lines: &[String]) {
    let set: HashSet<&String> = lines.iter().collect();
    assert_eq!(set.len(), lines.len(), "duplicate output: {lines:?}");
}

#[test]
fn full_mode_streams_filtered_unique_urls() {
    let cdx = MockCdx::start();
    cdx.page_count("2\n");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string(
            "http://example.com/a\nhttp://example.com/logo.png\n\n  http://example.com/a  \n",
        ),
    );
    cdx.page(
        1,
        ResponseTemplate::new(200)
            .set_body_string("http://example.com/b?q=1\nhttp://example.com/a\n"),
    );

    let mut o = opts(&cdx.endpoint(), "example.com", OutputMode::Full);
    o.exclude_ext = Some("png".to_string());
    let (res, lines) = run_with(&o);
    let summary = res.unwrap();

    assert_unique(&lines);
    let got: HashSet<String> = lines.into_iter().collect();
    let want: HashSet<String> = ["http://example.com/a", "http://example.com/b?q=1"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(got, want);
    assert_eq!(summary.pages_total, 2);
    assert_eq!(summary.pages_completed, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.lines_fetched, 5);
    assert_eq!(summary.values_written, 2);
    assert!(!summary.cancelled);
    assert!(cdx.url_params().iter().all(|u| u == "example.com*"));
}

#[test]
fn zero_pages_is_a_clean_noop() {
    let cdx = MockCdx::start();
    cdx.page_count("\n  \n");
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let mut o = opts(&cdx.endpoint(), "example.com", OutputMode::Full);
    o.output = Some(out.clone());
    let config = PipelineConfig::from_opts(&o).unwrap();
    let buf = SharedBuf::default();
    let sinks = OutputSinks::new(Box::new(buf.clone()))
        .with_file(&out)
        .unwrap();
    let summary = cdxurls::run(&config, sinks, Arc::new(NoProgress), &CancelToken::new()).unwrap();

    assert_eq!(summary, RunSummary::default());
    assert!(buf.lines().is_empty());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "");
    assert_eq!(cdx.requests_for_page(0), 0);
}

#[test]
fn unparsable_page_count_falls_back_to_one_page() {
    let cdx = MockCdx::start();
    cdx.page_count("<html>busy</html>\n");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string("http://example.com/only\n"),
    );

    let (res, lines) = run_with(&opts(&cdx.endpoint(), "example.com", OutputMode::Full));
    assert_eq!(res.unwrap().pages_total, 1);
    assert_eq!(lines, vec!["http://example.com/only"]);
}

#[test]
fn failing_page_is_abandoned_after_three_attempts() {
    let cdx = MockCdx::start();
    cdx.page_count("3");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string("http://example.com/zero\n"),
    );
    cdx.page(1, ResponseTemplate::new(503));
    cdx.page(
        2,
        ResponseTemplate::new(200).set_body_string("http://example.com/two\n"),
    );

    let config =
        PipelineConfig::from_opts(&opts(&cdx.endpoint(), "example.com", OutputMode::Full))
            .unwrap();
    let buf = SharedBuf::default();
    let progress = Arc::new(RecordingProgress::default());
    let summary = cdxurls::run(
        &config,
        OutputSinks::new(Box::new(buf.clone())),
        progress.clone(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(summary.pages_completed, 3);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(cdx.requests_for_page(1), 3);
    assert_eq!(*progress.total.lock().unwrap(), Some(3));
    let mut done = progress.done.lock().unwrap().clone();
    done.sort_unstable();
    assert_eq!(done, vec![1, 2, 3]);

    let got: HashSet<String> = buf.lines().into_iter().collect();
    assert!(got.contains("http://example.com/zero"));
    assert!(got.contains("http://example.com/two"));
    assert_eq!(got.len(), 2);
}

#[test]
fn transient_failure_is_retried() {
    let cdx = MockCdx::start();
    cdx.page_count("1");
    cdx.page_once(0, ResponseTemplate::new(500));
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string("http://example.com/retried\n"),
    );

    let (res, lines) = run_with(&opts(&cdx.endpoint(), "example.com", OutputMode::Full));
    let summary = res.unwrap();
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(cdx.requests_for_page(0), 2);
    assert_eq!(lines, vec!["http://example.com/retried"]);
}

#[test]
fn subdomain_mode_lists_each_subdomain_once() {
    let cdx = MockCdx::start();
    cdx.page_count("1");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string(
            "http://a.example.com/x\n\
             http://example.com/x\n\
             http://notexample.com/x\n\
             https://A.example.com:8443/y\n\
             http://b.a.example.com/\n",
        ),
    );

    let (res, lines) = run_with(&opts(&cdx.endpoint(), "example.com", OutputMode::Subdomains));
    res.unwrap();
    assert_unique(&lines);
    let got: HashSet<String> = lines.into_iter().collect();
    let want: HashSet<String> = ["a.example.com", "b.a.example.com"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(got, want);
    assert!(cdx.url_params().iter().all(|u| u == "*.example.com"));
}

#[test]
fn subdomain_mode_without_base_domain_does_nothing() {
    // Port 1 refuses connections: any request would make the run fail.
    let (res, lines) = run_with(&opts(
        "http://127.0.0.1:1/cdx/search/cdx",
        "*",
        OutputMode::Subdomains,
    ));
    assert_eq!(res.unwrap(), RunSummary::default());
    assert!(lines.is_empty());
}

#[test]
fn only_query_keys_are_deduplicated_in_first_seen_order() {
    let cdx = MockCdx::start();
    cdx.page_count("1");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string("http://h/p?a=1&b=2&a=3\n"),
    );

    let (res, lines) = run_with(&opts(&cdx.endpoint(), "h", OutputMode::OnlyQueryKeys));
    res.unwrap();
    assert_eq!(lines, vec!["a", "b"]);
}

#[test]
fn extract_paths_dedups_segments() {
    let cdx = MockCdx::start();
    cdx.page_count("1");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string("http://h/a/b/a/\n"),
    );

    let (res, lines) = run_with(&opts(&cdx.endpoint(), "h", OutputMode::ExtractPaths));
    res.unwrap();
    assert_eq!(lines, vec!["a", "b"]);
}

#[test]
fn no_query_mode_strips_queries_and_dedups() {
    let cdx = MockCdx::start();
    cdx.page_count("1");
    cdx.page(
        0,
        ResponseTemplate::new(200).set_body_string("http://h/p?x=1\nhttp://h/p?x=2\nhttp://h/%zz?x=3\n"),
    );

    let (res, lines) = run_with(&opts(&cdx.endpoint(), "h", OutputMode::NoQuery));
    res.unwrap();
    assert_eq!(lines, vec!["http://h/p"]);
}

#[test]
fn unreachable_page_count_is_fatal() {
    let (res, lines) = run_with(&opts(
        "http://127.0.0.1:1/cdx/search/cdx",
        "example.com",
        OutputMode::Full,
    ));
    assert!(res.is_err());
    assert!(lines.is_empty());
}

#[test]
fn cancelled_run_fetches_no_pages() {
    let cdx = MockCdx::start();
    cdx.page_count("5");
    for p in 0..5 {
        cdx.page(
            p,
            ResponseTemplate::new(200).set_body_string(format!("http://example.com/{p}\n")),
        );
    }

    let config =
        PipelineConfig::from_opts(&opts(&cdx.endpoint(), "example.com", OutputMode::Full))
            .unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let buf = SharedBuf::default();
    let summary = cdxurls::run(
        &config,
        OutputSinks::new(Box::new(buf.clone())),
        Arc::new(NoProgress),
        &cancel,
    )
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.pages_total, 5);
    assert_eq!(summary.pages_completed, 0);
    assert!(buf.lines().is_empty());
    assert_eq!((0..5).map(|p| cdx.requests_for_page(p)).sum::<usize>(), 0);
}

#[test]
fn cancel_during_backoff_stops_retries() {
    let cdx = MockCdx::start();
    cdx.page_count("1");
    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    // Cancel shortly after the first failure is served, while the fetcher sleeps before attempt 2.
    let failing = Mock::given(method("GET"))
        .and(path(CDX_PATH))
        .and(query_param("page", "0"))
        .respond_with(move |_: &Request| {
            let canceller = canceller.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                canceller.cancel();
            });
            ResponseTemplate::new(503)
        });
    cdx.rt.block_on(failing.mount(cdx.server()));

    let mut o = opts(&cdx.endpoint(), "example.com", OutputMode::Full);
    o.retry_backoff = Duration::from_secs(10);
    let config = PipelineConfig::from_opts(&o).unwrap();
    let buf = SharedBuf::default();
    let start = Instant::now();
    let summary = cdxurls::run(
        &config,
        OutputSinks::new(Box::new(buf.clone())),
        Arc::new(NoProgress),
        &cancel,
    )
    .unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(summary.cancelled);
    assert_eq!(summary.pages_completed, 0);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(cdx.requests_for_page(0), 1);
    assert!(buf.lines().is_empty());
}
