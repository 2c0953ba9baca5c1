use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use recall_core::{PhaseTag, QuestionType};
use recall_experiment::{Screen, ScreenContent};
use recall_timing::Timer;

const BAR_WIDTH: usize = 30;
/// Seconds left at which the timer pill turns urgent.
const URGENT_SECS: u64 = 10;
const RULE: &str = "────────────────────────────────────────";
const OPTION_KEYS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Fixed per-phase strings, built once per renderer.
#[derive(Debug, Clone)]
struct Labels {
    titles: Vec<(PhaseTag, &'static str)>,
    hints: Vec<(PhaseTag, &'static str)>,
}

impl Labels {
    fn new() -> Self {
        use PhaseTag::*;
        let titles = vec![
            (Intro, "Welcome"),
            (ContextPre, "Context"),
            (Stimulus, "Graph"),
            (ContextPost, "Context (again)"),
            (Confidence, "How sure are you?"),
            (BlackoutTrial, ""),
            (Questions, "Question"),
            (BlackoutAll, ""),
            (ConsolidatedQuestions, "Question"),
            (Summary, "Thank you"),
        ];
        let hints = vec![
            (Intro, "Press Enter to begin."),
            (ContextPre, "Press Enter to continue."),
            (Stimulus, "Press Enter when done looking."),
            (ContextPost, "Press Enter to continue."),
            (Confidence, "Type a number from 0 to 100, or /skip."),
            (BlackoutTrial, "Press Enter to continue."),
            (Questions, "Type your answer (1-4 or A-D picks an option), or /skip."),
            (BlackoutAll, "Press Enter to continue."),
            (
                ConsolidatedQuestions,
                "Type your answer (1-4 or A-D picks an option), or /skip.",
            ),
            (Summary, ""),
        ];
        Self { titles, hints }
    }

    fn lookup(table: &[(PhaseTag, &'static str)], phase: PhaseTag) -> &'static str {
        table
            .iter()
            .find(|(p, _)| *p == phase)
            .map_or("", |(_, s)| *s)
    }

    fn title(&self, phase: PhaseTag) -> &'static str {
        Self::lookup(&self.titles, phase)
    }

    fn hint(&self, phase: PhaseTag) -> &'static str {
        Self::lookup(&self.hints, phase)
    }
}

/// Timings of one presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub render: Duration,
    pub present: Duration,
    pub bytes: usize,
}

pub trait ScreenRenderer {
    /// Writes `screen` into `out`, replacing nothing already there.
    fn render_screen(&mut self, screen: &Screen, out: &mut String);
}

/// Plain-text renderer for a terminal participant console.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    labels: Labels,
    buffer: String,
    clear: bool,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            labels: Labels::new(),
            buffer: String::with_capacity(1024),
            clear: false,
        }
    }

    /// Emit an ANSI clear-screen before every frame.
    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// Renders and writes one frame, reusing the internal buffer.
    pub fn render_frame<T: Timer, W: Write>(
        &mut self,
        screen: &Screen,
        out: &mut W,
        timer: &T,
    ) -> Result<FrameStats> {
        let t = timer.now();
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.clear();
        if self.clear {
            buffer.push_str("\x1b[2J\x1b[H");
        }
        self.render_screen(screen, &mut buffer);
        let render = timer.elapsed(t);

        let t = timer.now();
        out.write_all(buffer.as_bytes())?;
        out.flush()?;
        let present = timer.elapsed(t);

        let bytes = buffer.len();
        self.buffer = buffer;
        Ok(FrameStats {
            render,
            present,
            bytes,
        })
    }

    fn header(&self, screen: &Screen, out: &mut String) {
        let mut line = String::new();
        if let Some(secs) = screen.remaining_secs {
            let urgent = if secs <= URGENT_SECS { "!" } else { " " };
            let _ = write!(line, "[{urgent}{}{urgent}]  ", timer_pill(secs));
        }
        line.push_str(self.labels.title(screen.phase));
        if let Some((n, total)) = screen.trial_label() {
            let _ = write!(line, "  ·  graph {n}/{total}");
        }
        if let Some((n, total)) = screen.question_label() {
            let _ = write!(line, "  ·  question {n}/{total}");
        }
        out.push_str(line.trim_end());
        out.push('\n');
        out.push_str(&progress_bar(screen.progress));
        out.push('\n');
        out.push_str(RULE);
        out.push('\n');
    }

    fn body(&self, screen: &Screen, out: &mut String) {
        match &screen.content {
            ScreenContent::Intro => {
                let _ = writeln!(
                    out,
                    "You will see {} graphs. Each screen has a time limit shown at the top left.",
                    screen.total_trials
                );
            }
            ScreenContent::Context { text, .. } => {
                let _ = writeln!(out, "{}", or_placeholder(text, "(no context for this graph)"));
            }
            ScreenContent::Stimulus { image_ref } => {
                let _ = writeln!(out, "{}", image_line(image_ref.as_deref()));
            }
            ScreenContent::Blackout { .. } => out.push('\n'),
            ScreenContent::Question {
                text,
                options,
                kind,
                image_ref,
            } => {
                if let Some(image) = image_ref {
                    let _ = writeln!(out, "{}", image_line(Some(image)));
                }
                let marker = match kind {
                    QuestionType::Color => " (colour)",
                    QuestionType::Content => "",
                };
                let _ = writeln!(out, "{text}{marker}");
                for (key, option) in OPTION_KEYS.iter().zip(options) {
                    let _ = writeln!(out, "  {key}) {option}");
                }
            }
            ScreenContent::Confidence => {
                out.push_str("How confident are you that you will remember this graph? (0-100%)\n");
            }
            ScreenContent::Summary {
                responses,
                confidences,
            } => {
                let _ = writeln!(out, "Session complete: {responses} answers recorded.");
                if *confidences > 0 {
                    let _ = writeln!(out, "{confidences} confidence ratings recorded.");
                }
            }
        }
    }
}

impl ScreenRenderer for TextRenderer {
    fn render_screen(&mut self, screen: &Screen, out: &mut String) {
        self.header(screen, out);
        self.body(screen, out);
        let hint = self.labels.hint(screen.phase);
        if !hint.is_empty() {
            out.push_str(RULE);
            out.push('\n');
            out.push_str(hint);
            out.push('\n');
        }
    }
}

/// `mm:ss`
pub fn timer_pill(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn progress_bar(progress: f32) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * BAR_WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        (progress * 100.0).round() as u32
    )
}

fn image_line(image: Option<&str>) -> String {
    match image {
        Some(image) => format!("[graph: {image}]"),
        None => "[graph unavailable]".to_string(),
    }
}

fn or_placeholder<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.trim().is_empty() { placeholder } else { text }
}
