use std::path::PathBuf;

/// A line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send (with any staged files).
    Say(String),
    /// Stage a file for the next submission.
    Attach(PathBuf),
    /// Unstage a file, or drop it from the upload queue.
    Detach(String),
    /// Submit staged files without text.
    Send,
    Cancel,
    Retry,
    Dismiss,
    Approve(String),
    Reject(String),
    /// Scroll the transcript up/down by this many lines.
    Up(u32),
    Down(u32),
    /// Jump to the newest content and follow again.
    Latest,
    Save(PathBuf),
    Help,
    Quit,
    /// A `/command` we don't know, or one missing its argument.
    Invalid(String),
}

const DEFAULT_SCROLL_LINES: u32 = 10;

fn scroll_amount(arg: &str) -> Option<u32> {
    if arg.is_empty() {
        return Some(DEFAULT_SCROLL_LINES);
    }
    arg.parse().ok()
}

/// Parses one input line. Blank lines yield `None`.
///
/// Lines starting with `//` are sent as text with one slash removed, so a
/// message can begin with a slash.
pub fn parse(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Some(Command::Say(format!("/{escaped}")));
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Say(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let needs_arg = |make: fn(String) -> Command| {
        if arg.is_empty() {
            Command::Invalid(format!("/{name} needs an argument"))
        } else {
            make(arg.to_string())
        }
    };

    Some(match name {
        "attach" => needs_arg(|a| Command::Attach(PathBuf::from(a))),
        "detach" => needs_arg(Command::Detach),
        "send" => Command::Send,
        "cancel" | "stop" => Command::Cancel,
        "retry" => Command::Retry,
        "dismiss" => Command::Dismiss,
        "approve" => needs_arg(Command::Approve),
        "reject" => needs_arg(Command::Reject),
        "up" => match scroll_amount(arg) {
            Some(n) => Command::Up(n),
            None => Command::Invalid(format!("not a line count: {arg}")),
        },
        "down" => match scroll_amount(arg) {
            Some(n) => Command::Down(n),
            None => Command::Invalid(format!("not a line count: {arg}")),
        },
        "latest" => Command::Latest,
        "save" => needs_arg(|a| Command::Save(PathBuf::from(a))),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command: /{other}")),
    })
}
