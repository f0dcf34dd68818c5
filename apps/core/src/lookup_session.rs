//! Event contract for the lookup popup.
//!
//! The session owns the query text and turns UI-independent events into a
//! list of effects for whatever shell hosts it. Lookups are debounced: each
//! text change arms a quiet timer tagged with a generation, and only the timer
//! matching the latest generation issues a request. Results are tagged with
//! the word they were fetched for and dropped once the text has moved on.

use std::time::Duration;

use crate::overlay_state::{ActivationAction, OverlayState};
use crate::pipeline::FetchResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupEvent {
    TextChanged(String),
    QuietPeriodElapsed { generation: u64 },
    Submit,
    LookupFinished(FetchResult),
    Escape,
    ActivationRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupEffect {
    ScheduleQuietTimer { generation: u64, after: Duration },
    RequestLookup(String),
    Render { word: String, html: String },
    Hide,
    ShowAndSelectAll,
}

#[derive(Debug, Clone)]
pub struct LookupSession {
    text: String,
    generation: u64,
    quiet_period: Duration,
    overlay: OverlayState,
    rendered_word: Option<String>,
}

impl LookupSession {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            text: String::new(),
            generation: 0,
            quiet_period,
            overlay: OverlayState::default(),
            rendered_word: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The word a lookup for the current text would be issued for.
    pub fn current_word(&self) -> &str {
        self.text.trim()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rendered_word(&self) -> Option<&str> {
        self.rendered_word.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.overlay.is_visible()
    }

    pub fn handle(&mut self, event: LookupEvent) -> Vec<LookupEffect> {
        match event {
            LookupEvent::TextChanged(text) => {
                self.text = text;
                self.generation += 1;
                vec![LookupEffect::ScheduleQuietTimer {
                    generation: self.generation,
                    after: self.quiet_period,
                }]
            }
            LookupEvent::QuietPeriodElapsed { generation } => {
                if generation != self.generation {
                    return Vec::new();
                }
                self.request_current()
            }
            LookupEvent::Submit => self.request_current(),
            LookupEvent::LookupFinished(result) => {
                if result.word != self.current_word() {
                    tracing::debug!(word = %result.word, current = %self.current_word(), "dropping stale result");
                    return Vec::new();
                }
                // An article without inflections leaves the previous content in place.
                let Some(html) = result.article.render() else {
                    return Vec::new();
                };
                self.rendered_word = Some(result.word.clone());
                vec![LookupEffect::Render {
                    word: result.word,
                    html,
                }]
            }
            LookupEvent::Escape => {
                if self.overlay.on_escape() {
                    vec![LookupEffect::Hide]
                } else {
                    Vec::new()
                }
            }
            LookupEvent::ActivationRequested => match self.overlay.on_activation() {
                ActivationAction::ShowAndFocus | ActivationAction::FocusExisting => {
                    vec![LookupEffect::ShowAndSelectAll]
                }
            },
        }
    }

    fn request_current(&self) -> Vec<LookupEffect> {
        let word = self.current_word();
        if word.is_empty() {
            return Vec::new();
        }
        vec![LookupEffect::RequestLookup(word.to_string())]
    }
}
