use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::cache::HttpClient;
use crate::lookup::{Article, Dictionary, LookupError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub word: String,
    pub article: Article,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("lookup worker has stopped")]
    WorkerStopped,
}

pub trait WordLookup: Send + 'static {
    fn lookup(&self, word: &str) -> Result<Article, LookupError>;
}

impl<C: HttpClient + 'static> WordLookup for Dictionary<C> {
    fn lookup(&self, word: &str) -> Result<Article, LookupError> {
        Dictionary::lookup(self, word)
    }
}

/// One background thread draining word requests in FIFO order. Each
/// successful lookup is handed to `notify`; failures are logged and dropped.
pub struct LookupWorker {
    sender: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
}

impl LookupWorker {
    pub fn spawn<L, F>(lookup: L, mut notify: F) -> Self
    where
        L: WordLookup,
        F: FnMut(FetchResult) + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<String>();
        let handle = thread::Builder::new()
            .name("popbox-lookup".to_string())
            .spawn(move || {
                for word in receiver {
                    tracing::info!(word = %word, "fetch");
                    match lookup.lookup(&word) {
                        Ok(article) => notify(FetchResult { word, article }),
                        Err(error) => tracing::warn!(word = %word, %error, "lookup failed"),
                    }
                }
                tracing::debug!("lookup worker stopped");
            });

        match handle {
            Ok(handle) => Self {
                sender: Some(sender),
                handle: Some(handle),
            },
            Err(error) => {
                tracing::error!(%error, "failed to spawn lookup worker");
                Self {
                    sender: None,
                    handle: None,
                }
            }
        }
    }

    pub fn request(&self, word: &str) -> Result<(), PipelineError> {
        let sender = self.sender.as_ref().ok_or(PipelineError::WorkerStopped)?;
        sender
            .send(word.to_string())
            .map_err(|_| PipelineError::WorkerStopped)
    }

    /// Closes the queue and waits for requests already queued to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LookupWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
