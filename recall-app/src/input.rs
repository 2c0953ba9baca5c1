use recall_core::PhaseTag;
use recall_experiment::{Action, Screen, ScreenContent};

const OPTION_KEYS: [[&str; 3]; 4] = [["1", "a", "א"], ["2", "b", "ב"], ["3", "c", "ג"], ["4", "d", "ד"]];

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(Action),
    Unlock(String),
    Jump(String),
    Reset,
    Status,
    Quit,
    Help,
}

pub const HELP: &str = "\
Enter           continue
<text>          answer the question (1-4 or A-D picks an option)
<0-100>         confidence rating
/skip           leave the question or rating unanswered
/admin <code>   unlock admin commands
/jump <phase>   (admin) jump to a phase
/reset          (admin) restart with a new participant
/status         (admin) show session status
/quit           stop the session";

/// Interprets `line` against what is on screen.
pub fn parse(line: &str, screen: &Screen) -> Result<Command, String> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('/') {
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        return match name {
            "skip" => Ok(Command::Act(Action::Skip)),
            "admin" => Ok(Command::Unlock(arg.to_string())),
            "jump" if !arg.is_empty() => Ok(Command::Jump(arg.to_string())),
            "jump" => Err("usage: /jump <phase>".to_string()),
            "reset" => Ok(Command::Reset),
            "status" => Ok(Command::Status),
            "quit" | "exit" => Ok(Command::Quit),
            "help" | "?" => Ok(Command::Help),
            other => Err(format!("unknown command /{other}; try /help")),
        };
    }

    match screen.phase {
        PhaseTag::Summary => Err("the session is over".to_string()),
        p if p.allows_continue() => Ok(Command::Act(Action::Continue)),
        p if p.is_confidence() => line
            .trim_end_matches('%')
            .trim()
            .parse::<u8>()
            .map(|n| Command::Act(Action::Rate(n)))
            .map_err(|_| "enter a number from 0 to 100".to_string()),
        _ => Ok(Command::Act(Action::Submit(pick_option(line, screen)))),
    }
}

/// Maps an option key to its text when the question has four options.
fn pick_option(line: &str, screen: &Screen) -> String {
    if let ScreenContent::Question { options, .. } = &screen.content {
        if options.len() == OPTION_KEYS.len() {
            let key = line.to_lowercase();
            if let Some(pos) = OPTION_KEYS.iter().position(|keys| keys.contains(&key.as_str())) {
                return options[pos].clone();
            }
        }
    }
    line.to_string()
}
