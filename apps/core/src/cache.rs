use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {status} for '{url}'")]
    Status { url: String, status: u16 },
    #[error("http request for '{url}' failed: {message}")]
    Transport { url: String, message: String },
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking client. Non-2xx responses are errors; no timeouts are applied.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl Default for UreqClient {
    fn default() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        tracing::info!(url, "http get");
        let mut response = self.agent.get(url).call().map_err(|error| match error {
            ureq::Error::StatusCode(status) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            other => FetchError::Transport {
                url: url.to_string(),
                message: other.to_string(),
            },
        })?;

        response
            .body_mut()
            .read_to_string()
            .map_err(|error| FetchError::Transport {
                url: url.to_string(),
                message: error.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// Write-through disk cache in front of another client. Entries are keyed by
/// the sanitized query string of the URL and never expire.
pub struct CachedHttpClient<C> {
    client: C,
    dir: PathBuf,
}

impl<C: HttpClient> CachedHttpClient<C> {
    pub fn new(client: C, dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inner(&self) -> &C {
        &self.client
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Any failure to read or decode an entry counts as a miss.
    pub fn load(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        read_compressed(&self.path_for_key(key)).ok()
    }

    pub fn store(&self, key: &str, body: &str) -> Result<(), std::io::Error> {
        if key.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty cache key",
            ));
        }
        write_compressed(&self.path_for_key(key), body)
    }

    pub fn stats(&self) -> Result<CacheStats, std::io::Error> {
        let mut stats = CacheStats::default();
        if !self.dir.exists() {
            return Ok(stats);
        }

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            stats.entries += 1;
            stats.bytes += entry.metadata().map_err(std::io::Error::other)?.len();
        }
        Ok(stats)
    }
}

impl<C: HttpClient> HttpClient for CachedHttpClient<C> {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        let key = cache_key(url);
        if let Some(content) = self.load(&key) {
            return Ok(content);
        }

        tracing::info!(url, key = %key, "cache miss");
        let content = self.client.get(url)?;
        if key.is_empty() {
            tracing::debug!(url, "url has no query; response not cached");
            return Ok(content);
        }
        if let Err(error) = self.store(&key, &content) {
            tracing::warn!(url, %error, "failed to persist cache entry");
        }
        Ok(content)
    }
}

/// Cache key for `url`: its query component with everything outside
/// `[A-Za-z0-9_-]` removed. Host and path do not take part, so two endpoints
/// sharing a query string share an entry.
///
/// Words reach the URL percent-encoded, so a non-ASCII word keeps its escaped
/// bytes here (`gå` gives `OPPgC3A5...`) where a key built from the raw word
/// would drop them.
pub fn cache_key(url: &str) -> String {
    let query = match url::Url::parse(url) {
        Ok(parsed) => parsed.query().unwrap_or_default().to_string(),
        Err(_) => raw_query(url).to_string(),
    };
    sanitize_key(&query)
}

fn raw_query(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or_default();
    without_fragment
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default()
}

pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

fn read_compressed(path: &Path) -> Result<String, std::io::Error> {
    let file = File::open(path)?;
    let mut decoder = BzDecoder::new(file);
    let mut content = String::new();
    decoder.read_to_string(&mut content)?;
    Ok(content)
}

fn write_compressed(path: &Path, content: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut encoder = BzEncoder::new(file, Compression::default());
    encoder.write_all(content.as_bytes())?;
    encoder.finish()?.flush()
}
