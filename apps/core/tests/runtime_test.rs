use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use popbox_core::lookup::{Article, Inflection, PartOfSpeech};
use popbox_core::lookup_session::{LookupEvent, LookupSession};
use popbox_core::pipeline::{FetchResult, PipelineError};
use popbox_core::runtime::{drive_lookup, ShellEvent};

const QUIET: Duration = Duration::from_millis(20);

fn send(events: &Sender<ShellEvent>, event: LookupEvent) {
    events.send(ShellEvent::Session(event)).unwrap();
}

fn close_after(events: Sender<ShellEvent>, delay: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = events.send(ShellEvent::InputClosed);
    })
}

fn finished(word: &str, html: &str) -> LookupEvent {
    LookupEvent::LookupFinished(FetchResult {
        word: word.to_string(),
        article: Article {
            word: word.to_string(),
            parts: vec![PartOfSpeech {
                name: "subst.".to_string(),
                lid: Some(7),
                inflection: Some(Inflection {
                    lid: 7,
                    html: html.to_string(),
                }),
            }],
        },
    })
}

#[test]
fn burst_of_edits_issues_one_request_for_the_final_text() {
    let (events, receiver) = mpsc::channel();
    send(&events, LookupEvent::TextChanged("f".into()));
    send(&events, LookupEvent::TextChanged("fo".into()));
    send(&events, LookupEvent::TextChanged("foo".into()));
    let last_edit = Instant::now();
    let closer = close_after(events, Duration::from_millis(200));

    let mut requested = Vec::new();
    let mut out = Vec::new();
    drive_lookup(
        LookupSession::new(QUIET),
        &receiver,
        |word: &str| -> Result<(), PipelineError> {
            requested.push((word.to_string(), Instant::now()));
            Ok(())
        },
        &mut out,
    )
    .unwrap();
    closer.join().unwrap();

    assert_eq!(requested.len(), 1);
    let (word, fired_at) = &requested[0];
    assert_eq!(word, "foo");
    assert!(fired_at.duration_since(last_edit) >= QUIET);
}

#[test]
fn submit_requests_immediately_and_blank_text_never_requests() {
    let (events, receiver) = mpsc::channel();
    send(&events, LookupEvent::TextChanged("   ".into()));
    send(&events, LookupEvent::Submit);
    send(&events, LookupEvent::TextChanged(" hus ".into()));
    send(&events, LookupEvent::Submit);
    let closer = close_after(events, Duration::from_millis(200));

    let mut requested = Vec::new();
    let mut out = Vec::new();
    drive_lookup(
        LookupSession::new(QUIET),
        &receiver,
        |word: &str| -> Result<(), PipelineError> {
            requested.push(word.to_string());
            Ok(())
        },
        &mut out,
    )
    .unwrap();
    closer.join().unwrap();

    // Submit plus the quiet timer for the last edit.
    assert_eq!(requested, vec!["hus", "hus"]);
}

#[test]
fn stale_results_are_not_rendered() {
    let (events, receiver) = mpsc::channel();
    send(&events, LookupEvent::TextChanged("hus".into()));
    send(
        &events,
        finished("hu", "<table><tr><td>stale</td></tr></table>"),
    );
    send(
        &events,
        finished(
            "hus",
            "<table><tr><th>Entall</th><td>et hus</td></tr></table>",
        ),
    );
    events.send(ShellEvent::InputClosed).unwrap();

    let mut out = Vec::new();
    drive_lookup(
        LookupSession::new(Duration::from_secs(60)),
        &receiver,
        |_word: &str| -> Result<(), PipelineError> { Ok(()) },
        &mut out,
    )
    .unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed, "== hus ==\nEntall | et hus\n");
}

#[test]
fn escape_and_activation_toggle_visibility() {
    let (events, receiver) = mpsc::channel();
    send(&events, LookupEvent::TextChanged("liv".into()));
    send(&events, LookupEvent::Escape);
    send(&events, LookupEvent::Escape);
    send(&events, LookupEvent::ActivationRequested);
    drop(events);

    let mut out = Vec::new();
    drive_lookup(
        LookupSession::new(Duration::from_secs(60)),
        &receiver,
        |_word: &str| -> Result<(), PipelineError> { Ok(()) },
        &mut out,
    )
    .unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed, "(hidden)\n(shown) query: liv\n");
}

#[test]
fn request_failure_stops_the_loop() {
    let (events, receiver) = mpsc::channel();
    send(&events, LookupEvent::TextChanged("liv".into()));
    send(&events, LookupEvent::Submit);

    let mut out = Vec::new();
    let result = drive_lookup(
        LookupSession::new(Duration::from_secs(60)),
        &receiver,
        |_word: &str| -> Result<(), PipelineError> { Err(PipelineError::WorkerStopped) },
        &mut out,
    );

    assert!(result.is_err());
    drop(events);
}
