use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use recall_core::PhaseTag;
use recall_experiment::{
    AdminGate, ControlError, ExperimentStateMachine, ImageResolver, Input, Outcome, Participant,
    Screen, Session, StimulusTable, Tick, TrialBuilder,
};
use recall_render::TextRenderer;
use recall_sink::{CsvSink, FallbackSink, JsonlSink, ResultSink};
use recall_timing::{MonotonicTimer, Timer, saturating_nanos};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::input::{self, Command, HELP};

pub struct App {
    cli: Cli,
}

enum Flow {
    Continue,
    Quit,
}

enum Wake {
    Line(Line),
    Tick,
    Closed,
}

/// A console line, stamped with the step of the screen that was up when it
/// was entered.
struct Line {
    step: u64,
    text: String,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    pub fn run(self) -> Result<()> {
        let config = self.cli.experiment_config();
        if self.cli.print_config {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        config.validate().context("invalid experiment settings")?;

        let mut rng = match self.cli.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let table = StimulusTable::from_csv_path(&self.cli.stimuli)
            .with_context(|| format!("loading stimuli from {}", self.cli.stimuli.display()))?;
        let group = self.cli.group.assign(&mut rng);
        let trials = TrialBuilder::new(
            config.max_trials,
            config.shuffle,
            ImageResolver::new(&config.images_dir),
        )
        .build(&table, &mut rng)
        .context("building the trial sequence")?;

        let results = self.cli.results_file();
        let primary = CsvSink::open(&results)
            .with_context(|| format!("opening {}", results.display()))?;
        let fallback_path = self.cli.fallback_file();
        let secondary = JsonlSink::open(&fallback_path)
            .with_context(|| format!("opening {}", fallback_path.display()))?;

        let mut participant = Participant::new(group);
        if let Some(name) = &self.cli.name {
            participant = participant.with_name(name.as_str());
        }
        let tick_interval = config.tick_interval();
        let admin = AdminGate::new(config.admin_code.clone());
        let machine = ExperimentStateMachine::new(config, trials, MonotonicTimer::new());
        let mut session = Session::new(
            machine,
            participant,
            FallbackSink::new(primary, secondary),
            admin,
        );
        info!(
            participant_id = %session.state().participant().id,
            group = group.number(),
            results = %results.display(),
            "participant ready"
        );

        let renderer = TextRenderer::new().with_clear(!self.cli.no_clear);
        let mut console = Console::new(renderer, io::stdout());
        console.draw(&session.screen())?;
        let lines = spawn_line_reader(|| io::stdin().lock(), console.shown());
        drive(&mut session, &mut console, Some(lines), tick_interval)?;

        session
            .flush()
            .context("results could not be written; see the fallback file")?;
        let ledger = session.state().ledger();
        println!();
        println!("answers recorded:     {}", ledger.responses());
        if session.state().group().rates_confidence() {
            println!("confidence ratings:   {}", ledger.confidences());
        }
        println!("results:              {}", results.display());
        if session.sink().fallbacks() > 0 {
            println!("fallback records:     {}", fallback_path.display());
        }
        Ok(())
    }
}

/// Reads lines on a background thread, stamping each with the step last drawn.
fn spawn_line_reader<F, R>(open: F, shown: Arc<AtomicU64>) -> Receiver<Line>
where
    F: FnOnce() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for text in open().lines() {
            let Ok(text) = text else { break };
            let step = shown.load(Ordering::Acquire);
            if tx.send(Line { step, text }).is_err() {
                break;
            }
        }
    });
    rx
}

/// Runs the session to `Summary` or `/quit`.
///
/// Ticks fire every `tick_interval` of session time. Once `lines` closes the
/// loop sleeps on the session's timer, so the remaining phases run out.
fn drive<T: Timer, K: ResultSink, W: Write>(
    session: &mut Session<T, K>,
    console: &mut Console<W>,
    mut lines: Option<Receiver<Line>>,
    tick_interval: Duration,
) -> Result<()> {
    let interval = saturating_nanos(tick_interval);
    let mut next_tick = session.machine().now().saturating_add(interval);
    while !session.is_finished() {
        let wait = Duration::from_nanos(next_tick.saturating_sub(session.machine().now()));
        let wake = match &lines {
            Some(rx) => match rx.recv_timeout(wait) {
                Ok(line) => Wake::Line(line),
                Err(RecvTimeoutError::Timeout) => Wake::Tick,
                Err(RecvTimeoutError::Disconnected) => Wake::Closed,
            },
            None => {
                session.machine().timer().sleep(wait);
                Wake::Tick
            }
        };

        match wake {
            Wake::Closed => {
                info!("input closed; running remaining phases on their timers");
                lines = None;
                continue;
            }
            Wake::Line(line) => {
                if let Flow::Quit = handle_line(session, console, line) {
                    warn!(phase = %session.state().phase(), "session stopped before the end");
                    break;
                }
            }
            Wake::Tick => {
                let tick = session.tick();
                note_outcome(console, &tick);
                next_tick = next_tick.saturating_add(interval);
            }
        }
        console.draw(&session.screen())?;
    }
    Ok(())
}

fn handle_line<T: Timer, K: ResultSink, W: Write>(
    session: &mut Session<T, K>,
    console: &mut Console<W>,
    line: Line,
) -> Flow {
    let screen = session.screen();
    let command = match input::parse(&line.text, &screen) {
        Ok(command) => command,
        Err(message) => {
            console.notice(message);
            return Flow::Continue;
        }
    };

    match command {
        Command::Act(action) => {
            let tick = session.act(Input::new(line.step, action));
            note_outcome(console, &tick);
        }
        Command::Unlock(code) => {
            if session.admin_unlock(&code) {
                console.notice("admin unlocked");
            } else {
                console.notice("admin code rejected");
            }
        }
        Command::Jump(name) => {
            let result = name
                .parse::<PhaseTag>()
                .map_err(ControlError::from)
                .and_then(|phase| session.admin_jump(phase));
            match result {
                Ok(screen) => console.notice(format!("jumped to {}", screen.phase)),
                Err(error) => console.notice(error.to_string()),
            }
        }
        Command::Reset => match session.admin_reset() {
            Ok(_) => console.notice("session reset for a new participant"),
            Err(error) => console.notice(error.to_string()),
        },
        Command::Status => match session.admin_status() {
            Ok(status) => console.notice(status.to_string()),
            Err(error) => console.notice(error.to_string()),
        },
        Command::Help => console.notice(HELP),
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

fn note_outcome<W: Write>(console: &mut Console<W>, tick: &Tick) {
    match &tick.outcome {
        Outcome::Rejected(rejection) => console.notice(rejection.to_string()),
        Outcome::Reset { .. } => console.notice("the session was restarted"),
        Outcome::Stale { .. } => console.notice("not recorded: the screen had already changed"),
        Outcome::Idle | Outcome::Advanced(_) => {}
    }
}

/// Participant-facing terminal output.
struct Console<W: Write> {
    renderer: TextRenderer,
    out: W,
    notice: Option<String>,
    frame_timer: MonotonicTimer,
    shown: Arc<AtomicU64>,
}

impl<W: Write> Console<W> {
    fn new(renderer: TextRenderer, out: W) -> Self {
        Self {
            renderer,
            out,
            notice: None,
            frame_timer: MonotonicTimer::new(),
            shown: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Step of the last screen drawn, shared with the line reader.
    fn shown(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.shown)
    }

    fn notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    fn draw(&mut self, screen: &Screen) -> Result<()> {
        let stats = self
            .renderer
            .render_frame(screen, &mut self.out, &self.frame_timer)?;
        if let Some(notice) = self.notice.take() {
            writeln!(self.out, "\n{notice}")?;
        }
        write!(self.out, "> ")?;
        self.out.flush()?;
        self.shown.store(screen.step, Ordering::Release);
        tracing::trace!(
            render_us = stats.render.as_micros() as u64,
            present_us = stats.present.as_micros() as u64,
            bytes = stats.bytes,
            "frame"
        );
        Ok(())
    }
}
