//! Word lookups against the ordbok.uib.no endpoints.
//!
//! A lookup page lists one `span.oppsgramordklasse` marker per part of speech,
//! e.g. `<span class="oppsgramordklasse" onclick="vise_fullformer(&quot;8225&quot;,'bob')">adj.</span>`.
//! The number inside the handler identifies an inflection table, fetched from a
//! second endpoint as an HTML fragment.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{FetchError, HttpClient};
use crate::config::Config;

const PART_OF_SPEECH_SELECTOR: &str = "span.oppsgramordklasse";
const NORMALIZED_MARGIN: &str = "margin: 0px";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed suggestion payload: {0}")]
    Suggestions(#[from] json5::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inflection {
    pub lid: u64,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartOfSpeech {
    pub name: String,
    pub lid: Option<u64>,
    pub inflection: Option<Inflection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub word: String,
    pub parts: Vec<PartOfSpeech>,
}

impl Article {
    pub fn empty(word: &str) -> Self {
        Self {
            word: word.to_string(),
            parts: Vec::new(),
        }
    }

    /// Inflection fragments in discovery order, skipping any whose plain text
    /// repeats an earlier one. `None` when there is nothing to show.
    pub fn render(&self) -> Option<String> {
        let fragments = self
            .parts
            .iter()
            .filter_map(|part| part.inflection.as_ref())
            .map(|inflection| inflection.html.as_str());
        let unique = unique_fragments(fragments);
        if unique.is_empty() {
            None
        } else {
            Some(unique.concat())
        }
    }
}

/// Keeps the first fragment of every distinct plain-text rendering.
pub fn unique_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    fragments
        .into_iter()
        .filter(|fragment| seen.insert(plain_text(fragment)))
        .collect()
}

pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn sanitize_fragment(html: &str) -> String {
    margin_regex()
        .replace_all(html, NORMALIZED_MARGIN)
        .into_owned()
}

/// Part-of-speech labels and inflection ids found on a lookup page.
pub fn parse_parts(html: &str) -> Vec<(String, Option<u64>)> {
    let Ok(selector) = Selector::parse(PART_OF_SPEECH_SELECTOR) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .map(|element| {
            let name = element.text().collect::<String>().trim().to_string();
            let lid = element.value().attr("onclick").and_then(first_integer);
            (name, lid)
        })
        .collect()
}

fn first_integer(text: &str) -> Option<u64> {
    integer_regex()
        .find(text)
        .and_then(|found| found.as_str().parse().ok())
}

fn integer_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"\d+").expect("integer regex is valid"))
}

fn margin_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"margin:\s*\d+px").expect("margin regex is valid"))
}

#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    #[serde(default)]
    suggestions: Vec<String>,
}

pub fn parse_suggestions(raw: &str) -> Result<Vec<String>, LookupError> {
    let payload: SuggestionPayload = json5::from_str(raw.trim())?;
    let mut seen = HashSet::new();
    Ok(payload
        .suggestions
        .into_iter()
        .filter(|word| seen.insert(word.clone()))
        .collect())
}

pub struct Dictionary<C> {
    client: C,
    lookup_url_template: String,
    inflection_url_template: String,
    suggest_url_template: String,
}

impl<C: HttpClient> Dictionary<C> {
    pub fn new(client: C, cfg: &Config) -> Self {
        Self {
            client,
            lookup_url_template: cfg.lookup_url_template.clone(),
            inflection_url_template: cfg.inflection_url_template.clone(),
            suggest_url_template: cfg.suggest_url_template.clone(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn lookup_url(&self, word: &str) -> String {
        self.lookup_url_template.replace("{word}", &encode(word))
    }

    pub fn inflection_url(&self, lid: u64) -> String {
        self.inflection_url_template.replace("{lid}", &lid.to_string())
    }

    pub fn suggest_url(&self, prefix: &str) -> String {
        self.suggest_url_template.replace("{prefix}", &encode(prefix))
    }

    pub fn lookup(&self, word: &str) -> Result<Article, LookupError> {
        let page = self.client.get(&self.lookup_url(word))?;

        let mut parts = Vec::new();
        for (name, lid) in parse_parts(&page) {
            let inflection = match lid {
                Some(lid) => Some(self.inflection(lid)?),
                None => None,
            };
            parts.push(PartOfSpeech {
                name,
                lid,
                inflection,
            });
        }

        tracing::info!(word, parts = parts.len(), "article parsed");
        Ok(Article {
            word: word.to_string(),
            parts,
        })
    }

    pub fn inflection(&self, lid: u64) -> Result<Inflection, LookupError> {
        let html = self.client.get(&self.inflection_url(lid))?;
        Ok(Inflection {
            lid,
            html: sanitize_fragment(&html),
        })
    }

    pub fn suggest(&self, prefix: &str) -> Result<Vec<String>, LookupError> {
        let raw = self.client.get(&self.suggest_url(prefix))?;
        parse_suggestions(&raw)
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
