use std::sync::Mutex;

use popbox_core::cache::{cache_key, CachedHttpClient, FetchError, HttpClient};

#[derive(Default)]
struct FakeClient {
    routes: Vec<(String, Result<String, u16>)>,
    calls: Mutex<Vec<String>>,
}

impl FakeClient {
    fn with(mut self, pattern: &str, response: Result<&str, u16>) -> Self {
        self.routes
            .push((pattern.to_string(), response.map(str::to_string)));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpClient for FakeClient {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let route = self.routes.iter().find(|(pattern, _)| url.contains(pattern.as_str()));
        match route {
            Some((_, Ok(body))) => Ok(body.clone()),
            Some((_, Err(status))) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[test]
fn miss_fetches_and_persists_then_hit_skips_network() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::default().with("lid=41772", Ok("<div id=\"41772\">liv</div>"));
    let cache = CachedHttpClient::new(client, dir.path());
    let url = "https://ordbok.uib.no/perl/bob_hente_paradigme.cgi?lid=41772";

    let first = cache.get(url).unwrap();
    let second = cache.get(url).unwrap();

    assert_eq!(first, "<div id=\"41772\">liv</div>");
    assert_eq!(second, first);
    assert_eq!(cache.inner().calls().len(), 1);
    assert!(dir.path().join("lid41772").exists());
}

#[test]
fn stored_entry_is_served_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CachedHttpClient::new(FakeClient::default(), dir.path());
    let url = "https://ordbok.uib.no/perl/ordbok.cgi?OPP=liv";

    cache.store(&cache_key(url), "blåbær og liv").unwrap();

    assert_eq!(cache.get(url).unwrap(), "blåbær og liv");
    assert!(cache.inner().calls().is_empty());
}

#[test]
fn entries_are_bzip2_compressed() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CachedHttpClient::new(FakeClient::default(), dir.path());

    cache.store("lid1", "inflection").unwrap();

    let raw = std::fs::read(dir.path().join("lid1")).unwrap();
    assert!(raw.starts_with(b"BZh"));
    assert_eq!(cache.load("lid1").as_deref(), Some("inflection"));
}

#[test]
fn same_query_on_different_endpoints_shares_an_entry() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::default().with("first.test", Ok("from first"));
    let cache = CachedHttpClient::new(client, dir.path());

    let first = cache.get("https://first.test/a/path?id=7").unwrap();
    let second = cache.get("https://second.test/another?id=7").unwrap();

    assert_eq!(cache_key("https://first.test/a/path?id=7"), "id7");
    assert_eq!(first, "from first");
    assert_eq!(second, "from first");
    assert_eq!(cache.inner().calls().len(), 1);
}

#[test]
fn corrupt_entry_counts_as_miss_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lid9"), b"not bzip2 at all").unwrap();
    let client = FakeClient::default().with("lid=9", Ok("fresh"));
    let cache = CachedHttpClient::new(client, dir.path());

    let body = cache.get("https://x.test/p?lid=9").unwrap();

    assert_eq!(body, "fresh");
    assert_eq!(cache.load("lid9").as_deref(), Some("fresh"));
}

#[test]
fn upstream_error_propagates_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::default().with("lid=5", Err(503));
    let cache = CachedHttpClient::new(client, dir.path());

    let error = cache.get("https://x.test/p?lid=5").unwrap_err();

    assert!(matches!(error, FetchError::Status { status: 503, .. }));
    assert!(!dir.path().join("lid5").exists());
}

#[test]
fn url_without_query_is_fetched_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::default().with("x.test", Ok("root"));
    let cache = CachedHttpClient::new(client, dir.path());

    cache.get("https://x.test/").unwrap();
    cache.get("https://x.test/").unwrap();

    assert_eq!(cache.inner().calls().len(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn stats_count_entries_and_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CachedHttpClient::new(FakeClient::default(), dir.path().join("cache"));
    assert_eq!(cache.stats().unwrap().entries, 0);

    cache.store("a", "alpha").unwrap();
    cache.store("b", "beta").unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.entries, 2);
    assert!(stats.bytes > 0);
}
