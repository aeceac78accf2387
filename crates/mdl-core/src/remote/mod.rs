//! Worker daemon: a `JobSupervisor` behind a Unix socket.
//!
//! Line protocol, one command per line:
//!
//! ```text
//! start <location_key>   ->  ok started | ok already-running | err <message>
//! stop <job_id>          ->  ok stopped            (after the job has stopped)
//! stop-all               ->  ok stopped
//! watch                  ->  ok watching, then one JSON JobStatusUpdate per line
//! ```
//!
//! Job records travel through the shared metadata store; only the key crosses
//! the socket.

mod client;
mod server;

pub use client::DaemonClient;
pub use server::serve;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(String),
    Stop(String),
    StopAll,
    Watch,
}

impl Command {
    /// Parse one request line. Malformed lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };
        match (verb, arg) {
            ("start", key) if !key.is_empty() => Some(Command::Start(key.to_string())),
            ("stop", id) if !id.is_empty() => Some(Command::Stop(id.to_string())),
            ("stop-all", "") => Some(Command::StopAll),
            ("watch", "") => Some(Command::Watch),
            _ => None,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Command::Start(key) => format!("start {key}\n"),
            Command::Stop(id) => format!("stop {id}\n"),
            Command::StopAll => "stop-all\n".to_string(),
            Command::Watch => "watch\n".to_string(),
        }
    }
}

/// Split a reply line into `Ok(detail)` or `Err(message)`.
pub(crate) fn parse_reply(line: &str) -> Result<String, String> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("ok") {
        Ok(rest.trim().to_string())
    } else if let Some(rest) = line.strip_prefix("err") {
        Err(rest.trim().to_string())
    } else {
        Err(format!("unexpected reply: {line}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_rejects_garbage() {
        assert_eq!(
            Command::parse("start abc123\n"),
            Some(Command::Start("abc123".into()))
        );
        assert_eq!(Command::parse(" stop  job-1 "), Some(Command::Stop("job-1".into())));
        assert_eq!(Command::parse("stop-all"), Some(Command::StopAll));
        assert_eq!(Command::parse("watch"), Some(Command::Watch));
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse("stop-all now"), None);
        assert_eq!(Command::parse("pause 3"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn command_lines_parse_back() {
        for cmd in [
            Command::Start("k".into()),
            Command::Stop("j".into()),
            Command::StopAll,
            Command::Watch,
        ] {
            assert_eq!(Command::parse(&cmd.to_line()), Some(cmd));
        }
    }

    #[test]
    fn reply_lines() {
        assert_eq!(parse_reply("ok started\n"), Ok("started".to_string()));
        assert_eq!(parse_reply("err unknown job k"), Err("unknown job k".to_string()));
        assert!(parse_reply("hello").is_err());
    }
}
