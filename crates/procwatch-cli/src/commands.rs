use procwatch_core::{ExportFormat, SortKey};

/// Line command typed while watching
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    Sort(SortKey),
    Kill(u32),
    Export(ExportFormat),
    /// `None` clears the active filter
    Filter(Option<String>),
    Help,
    Quit,
}

impl Command {
    /// Parse one input line, e.g. `s cpu` or `k 1234`
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb {
            "" => Err("Empty command".to_string()),
            "r" | "refresh" => no_argument(Command::Refresh, arg),
            "q" | "quit" => no_argument(Command::Quit, arg),
            "h" | "help" | "?" => no_argument(Command::Help, arg),
            "s" | "sort" => {
                let key = require(verb, arg, "<key>")?;
                key.parse::<SortKey>()
                    .map(Command::Sort)
                    .map_err(|e| e.to_string())
            }
            "k" | "kill" => {
                let pid = require(verb, arg, "<pid>")?;
                pid.parse::<u32>()
                    .map(Command::Kill)
                    .map_err(|_| format!("Invalid PID: {}", pid))
            }
            "e" | "export" => {
                let format = require(verb, arg, "<json|csv>")?;
                format
                    .parse::<ExportFormat>()
                    .map(Command::Export)
                    .map_err(|e| e.to_string())
            }
            "f" | "filter" if arg.is_empty() => Ok(Command::Filter(None)),
            "f" | "filter" => Ok(Command::Filter(Some(arg.to_string()))),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

fn no_argument(command: Command, arg: &str) -> Result<Command, String> {
    if arg.is_empty() {
        Ok(command)
    } else {
        Err(format!("Unexpected argument: {}", arg))
    }
}

fn require<'a>(verb: &str, arg: &'a str, usage: &str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!("Usage: {} {}", verb, usage))
    } else {
        Ok(arg)
    }
}
