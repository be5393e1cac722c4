//! Slash-command parsing for the terminal front end.

use fdi_store::ThemePreference;

pub const HELP: &str = "\
Commands:
  /new             start a new conversation
  /history         show or hide saved conversations
  /load <n>        open conversation n from the history list
  /delete <n>      delete conversation n
  /clear           delete every conversation
  /go <n>          follow navigation action n of the last reply
  /theme [mode]    show or set the theme (light, dark, system)
  /help            show this help
  /quit            exit
Anything else is sent to the assistant. Ctrl-C cancels a reply in progress;
at the prompt it exits, as do /quit and end of input.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New,
    History,
    /// One-based index into the history list.
    Load(usize),
    Delete(usize),
    Clear,
    Go(usize),
    Theme(Option<ThemePreference>),
    Help,
    Quit,
    Invalid(String),
}

/// `None` for a blank line.
#[must_use]
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Send(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "new" => Command::New,
        "history" | "h" => Command::History,
        "load" => index_arg(arg, Command::Load),
        "delete" | "del" => index_arg(arg, Command::Delete),
        "clear" => Command::Clear,
        "go" => index_arg(arg, Command::Go),
        "theme" if arg.is_empty() => Command::Theme(None),
        "theme" => match arg.parse() {
            Ok(theme) => Command::Theme(Some(theme)),
            Err(e) => Command::Invalid(e.to_string()),
        },
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Invalid(format!("unknown command /{other} (try /help)")),
    };
    Some(command)
}

fn index_arg(arg: &str, make: fn(usize) -> Command) -> Command {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => make(n),
        _ => Command::Invalid(format!("expected a number from the list, got {arg:?}")),
    }
}
