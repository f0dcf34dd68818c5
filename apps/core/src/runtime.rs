use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::action_executor::{DeliveryError, TextSink, XdoTool};
use crate::cache::{CachedHttpClient, UreqClient};
use crate::config::{self, Config, ConfigError};
use crate::instance_guard::{GuardError, GuardOutcome, InstanceGuard};
use crate::logging;
use crate::lookup::{Dictionary, LookupError};
use crate::lookup_session::{LookupEffect, LookupEvent, LookupSession};
use crate::model::load_candidates;
use crate::pipeline::{LookupWorker, PipelineError};
use crate::text_render::render_text;
use crate::ticket_session::{TicketEffect, TicketEvent, TicketSession};

/// Typed in the lookup shell, hides the popup.
const ESCAPE_LINE: &str = "\u{1b}";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read candidates '{path}': {source}")]
    Candidates {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("instance guard error: {0}")]
    Guard(#[from] GuardError),
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Parser)]
#[command(name = "popbox", version, about = "Ticket autocomplete and dictionary lookup popups")]
pub struct CliOptions {
    /// Config file to use instead of the per-user default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Filter the candidate list and type the chosen ticket into the active window.
    Ticket {
        /// Print the ticket instead of typing it.
        #[arg(long)]
        print: bool,
        /// Candidate file overriding `candidates_path`.
        #[arg(long)]
        candidates: Option<PathBuf>,
        /// Pick the first match for this query instead of reading stdin.
        query: Vec<String>,
    },
    /// Look up a word, or run the single-instance lookup shell without one.
    Lookup {
        #[arg(long)]
        json: bool,
        word: Option<String>,
    },
    /// List completion suggestions for a prefix.
    Suggest { prefix: String },
    /// Inspect the response cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Write the default config if missing and print its path.
    Config,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Stats,
}

pub fn parse_cli_args<I, T>(args: I) -> Result<CliOptions, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    CliOptions::try_parse_from(args)
}

pub fn run_with_options(options: CliOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config.as_deref())?;
    let _logging = match logging::init(&logging::logs_dir()) {
        Ok(guard) => Some(guard),
        Err(error) => {
            eprintln!("[popbox] file logging disabled: {error}");
            None
        }
    };
    tracing::info!(
        config_path = %config.config_path.display(),
        cache_dir = %config.cache_dir.display(),
        "startup"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match options.command {
        CliCommand::Config => {
            if !config.config_path.exists() {
                config::save(&config)?;
                tracing::info!(path = %config.config_path.display(), "wrote default config");
            }
            writeln!(out, "{}", config.config_path.display())?;
            Ok(())
        }
        CliCommand::Cache {
            command: CacheCommand::Stats,
        } => {
            let cache = CachedHttpClient::new(UreqClient::default(), &config.cache_dir);
            let stats = cache.stats()?;
            writeln!(
                out,
                "{} entries, {} bytes in {}",
                stats.entries,
                stats.bytes,
                cache.dir().display()
            )?;
            Ok(())
        }
        CliCommand::Suggest { prefix } => {
            for word in dictionary(&config).suggest(&prefix)? {
                writeln!(out, "{word}")?;
            }
            Ok(())
        }
        CliCommand::Lookup {
            json,
            word: Some(word),
        } => {
            let article = dictionary(&config).lookup(word.trim())?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&article)?)?;
            } else {
                match article.render() {
                    Some(html) => writeln!(out, "{}", render_text(&html))?,
                    None => writeln!(out, "no inflections found for '{}'", article.word)?,
                }
            }
            Ok(())
        }
        CliCommand::Lookup { word: None, .. } => run_lookup_shell(&config, &mut out),
        CliCommand::Ticket {
            print,
            candidates,
            query,
        } => {
            let path = candidates.unwrap_or_else(|| config.candidates_path.clone());
            let rows = load_candidates(&path)
                .map_err(|source| RuntimeError::Candidates { path, source })?;
            let session = TicketSession::new(
                rows,
                config.max_ticket_len,
                config.max_results as usize,
            );

            let sink = XdoTool;
            // The window is captured before anything else grabs focus.
            let window = if print {
                None
            } else {
                let window = sink.active_window()?;
                tracing::info!(%window, "active window");
                Some(window)
            };

            let ticket = if query.is_empty() {
                let stdin = std::io::stdin();
                drive_ticket(session, stdin.lock(), &mut out, &sink, window.as_deref())?
            } else {
                pick_first_match(session, &query.join(" "), &mut out, &sink, window.as_deref())?
            };
            tracing::info!(ticket = ?ticket, "done");
            Ok(())
        }
    }
}

fn dictionary(config: &Config) -> Dictionary<CachedHttpClient<UreqClient>> {
    let client = CachedHttpClient::new(UreqClient::default(), &config.cache_dir);
    Dictionary::new(client, config)
}

/// Runs the ticket box over line input: a line edits the query, `:N` picks
/// the N-th listed row, an empty line submits and end of input cancels.
/// Returns the delivered ticket, if any.
pub fn drive_ticket<R: BufRead, W: Write, S: TextSink>(
    mut session: TicketSession,
    input: R,
    out: &mut W,
    sink: &S,
    window: Option<&str>,
) -> Result<Option<String>, RuntimeError> {
    for line in input.lines() {
        let line = line?;
        let event = ticket_event_for_line(&line);
        if let Some(delivered) = apply_ticket_effects(session.handle(event), out, sink, window)? {
            return Ok(delivered);
        }
    }
    apply_ticket_effects(session.handle(TicketEvent::Escape), out, sink, window)?;
    Ok(None)
}

/// Non-interactive ticket pick: the first row matching `query`, or the query
/// itself when nothing matches.
pub fn pick_first_match<W: Write, S: TextSink>(
    mut session: TicketSession,
    query: &str,
    out: &mut W,
    sink: &S,
    window: Option<&str>,
) -> Result<Option<String>, RuntimeError> {
    for event in [
        TicketEvent::TextEdited(query.to_string()),
        TicketEvent::Select(0),
        TicketEvent::Submit,
    ] {
        if let Some(delivered) = apply_ticket_effects(session.handle(event), out, sink, window)? {
            return Ok(delivered);
        }
    }
    Ok(None)
}

fn ticket_event_for_line(line: &str) -> TicketEvent {
    if line.is_empty() {
        return TicketEvent::Submit;
    }
    if let Some(position) = line
        .strip_prefix(':')
        .and_then(|number| number.trim().parse::<usize>().ok())
        .filter(|number| *number > 0)
    {
        return TicketEvent::Select(position - 1);
    }
    TicketEvent::TextEdited(line.to_string())
}

/// Returns `Some` once the session closed, carrying the delivered ticket.
fn apply_ticket_effects<W: Write, S: TextSink>(
    effects: Vec<TicketEffect>,
    out: &mut W,
    sink: &S,
    window: Option<&str>,
) -> Result<Option<Option<String>>, RuntimeError> {
    let mut delivered = None;
    for effect in effects {
        match effect {
            TicketEffect::ShowRows(rows) => {
                for (index, row) in rows.iter().enumerate() {
                    writeln!(out, "{:>3}  {row}", index + 1)?;
                }
            }
            TicketEffect::SetText(text) => writeln!(out, "> {text}")?,
            TicketEffect::Deliver(ticket) => {
                match window {
                    Some(window) => {
                        tracing::info!(%window, ticket = %ticket, "sending ticket");
                        sink.send_text(window, &ticket)?;
                    }
                    None => writeln!(out, "{ticket}")?,
                }
                delivered = Some(ticket);
            }
            TicketEffect::Close => return Ok(Some(delivered)),
        }
    }
    Ok(None)
}

#[derive(Debug)]
pub enum ShellEvent {
    Session(LookupEvent),
    InputClosed,
}

fn run_lookup_shell<W: Write>(config: &Config, out: &mut W) -> Result<(), RuntimeError> {
    let listener = match InstanceGuard::acquire(&config.guard_host, config.guard_port)? {
        GuardOutcome::Delegated => {
            tracing::info!("runtime already active; exiting duplicate process");
            return Ok(());
        }
        GuardOutcome::Primary(listener) => listener,
    };

    let (events, receiver) = mpsc::channel::<ShellEvent>();

    let activation = events.clone();
    listener.serve(move || {
        let _ = activation.send(ShellEvent::Session(LookupEvent::ActivationRequested));
    })?;

    let results = events.clone();
    let worker = LookupWorker::spawn(dictionary(config), move |result| {
        let _ = results.send(ShellEvent::Session(LookupEvent::LookupFinished(result)));
    });

    spawn_stdin_reader(events)?;

    let session = LookupSession::new(config.quiet_period());
    drive_lookup(session, &receiver, |word| worker.request(word), out)?;
    worker.shutdown();
    Ok(())
}

/// Each stdin line replaces the query text; an empty line submits and a lone
/// ESC hides the popup.
fn spawn_stdin_reader(events: Sender<ShellEvent>) -> Result<(), RuntimeError> {
    std::thread::Builder::new()
        .name("popbox-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let event = match line.as_str() {
                    "" => LookupEvent::Submit,
                    ESCAPE_LINE => LookupEvent::Escape,
                    _ => LookupEvent::TextChanged(line),
                };
                if events.send(ShellEvent::Session(event)).is_err() {
                    return;
                }
            }
            let _ = events.send(ShellEvent::InputClosed);
        })?;
    Ok(())
}

/// Pumps shell events and quiet timers through the session until input
/// closes or every sender is gone.
pub fn drive_lookup<F, W>(
    mut session: LookupSession,
    receiver: &Receiver<ShellEvent>,
    mut request: F,
    out: &mut W,
) -> Result<(), RuntimeError>
where
    F: FnMut(&str) -> Result<(), PipelineError>,
    W: Write,
{
    let mut timers = QuietTimers::default();
    loop {
        let received = match timers.next_deadline() {
            Some(deadline) => {
                match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            },
        };

        let mut pending = Vec::new();
        match received {
            Some(ShellEvent::InputClosed) => break,
            Some(ShellEvent::Session(event)) => pending.push(event),
            None => {}
        }
        pending.extend(
            timers
                .take_due(Instant::now())
                .into_iter()
                .map(|generation| LookupEvent::QuietPeriodElapsed { generation }),
        );

        for event in pending {
            for effect in session.handle(event) {
                match effect {
                    LookupEffect::ScheduleQuietTimer { generation, after } => {
                        timers.arm(Instant::now(), after, generation);
                    }
                    LookupEffect::RequestLookup(word) => request(&word)?,
                    LookupEffect::Render { word, html } => {
                        writeln!(out, "== {word} ==")?;
                        writeln!(out, "{}", render_text(&html))?;
                    }
                    LookupEffect::Hide => writeln!(out, "(hidden)")?,
                    LookupEffect::ShowAndSelectAll => {
                        writeln!(out, "(shown) query: {}", session.text())?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Pending single-shot quiet timers, each tagged with the session generation
/// it was armed for.
#[derive(Debug, Default)]
pub struct QuietTimers {
    pending: Vec<(Instant, u64)>,
}

impl QuietTimers {
    pub fn arm(&mut self, now: Instant, after: Duration, generation: u64) {
        self.pending.push((now + after, generation));
        self.pending.sort_by_key(|(deadline, _)| *deadline);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.first().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Generations whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<u64> {
        let split = self
            .pending
            .iter()
            .position(|(deadline, _)| *deadline > now)
            .unwrap_or(self.pending.len());
        self.pending
            .drain(..split)
            .map(|(_, generation)| generation)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_cli_args, ticket_event_for_line, CacheCommand, CliCommand, QuietTimers};
    use crate::ticket_session::TicketEvent;
    use std::time::{Duration, Instant};

    #[test]
    fn timers_fire_in_deadline_order() {
        let start = Instant::now();
        let mut timers = QuietTimers::default();
        timers.arm(start, Duration::from_millis(30), 2);
        timers.arm(start, Duration::from_millis(10), 1);
        timers.arm(start, Duration::from_millis(50), 3);

        assert_eq!(timers.next_deadline(), Some(start + Duration::from_millis(10)));
        assert_eq!(timers.take_due(start + Duration::from_millis(30)), vec![1, 2]);
        assert_eq!(timers.len(), 1);
        assert!(timers.take_due(start + Duration::from_millis(40)).is_empty());
        assert_eq!(timers.take_due(start + Duration::from_millis(60)), vec![3]);
        assert!(timers.is_empty());
    }

    #[test]
    fn ticket_lines_map_to_events() {
        assert_eq!(ticket_event_for_line(""), TicketEvent::Submit);
        assert_eq!(ticket_event_for_line(":2"), TicketEvent::Select(1));
        assert_eq!(
            ticket_event_for_line(":0"),
            TicketEvent::TextEdited(":0".to_string())
        );
        assert_eq!(
            ticket_event_for_line("printer fire"),
            TicketEvent::TextEdited("printer fire".to_string())
        );
    }

    #[test]
    fn cli_parses_subcommands() {
        let options = parse_cli_args(["popbox", "--config", "/tmp/p.toml", "cache", "stats"]).unwrap();
        assert_eq!(options.config.as_deref(), Some(std::path::Path::new("/tmp/p.toml")));
        assert!(matches!(
            options.command,
            CliCommand::Cache {
                command: CacheCommand::Stats
            }
        ));

        let options = parse_cli_args(["popbox", "ticket", "--print", "printer", "fire"]).unwrap();
        match options.command {
            CliCommand::Ticket { print, query, .. } => {
                assert!(print);
                assert_eq!(query, vec!["printer".to_string(), "fire".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(parse_cli_args(["popbox", "launch"]).is_err());
    }
}
