//! Terminal status relay: shows the coordinator's run state and forwards
//! start/stop/scrape commands typed on stdin.

use std::time::Duration;

use leadscout_core::{Request, Response, StatusSnapshot};
use leadscout_engine::CoordinatorHandle;
use scout_logging::{scout_error, scout_warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &str = "commands: start | stop | status | scrape | quit | <json request>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send(Request),
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('{') {
        return Request::decode(line)
            .map(|request| Some(ConsoleCommand::Send(request)))
            .map_err(|err| format!("invalid request: {err}"));
    }
    let command = match line.to_ascii_lowercase().as_str() {
        "start" => ConsoleCommand::Send(Request::StartPolling),
        "stop" => ConsoleCommand::Send(Request::StopPolling),
        "status" => ConsoleCommand::Send(Request::GetStatus),
        "scrape" => ConsoleCommand::Send(Request::TriggerScrape),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command `{other}`; {HELP}")),
    };
    Ok(Some(command))
}

pub fn render_status(snapshot: &StatusSnapshot) -> String {
    if !snapshot.is_running {
        return "Status: Stopped\n  Type \"start\" to begin".to_string();
    }
    match &snapshot.current_task {
        Some(task) => match task.job_title.as_deref().filter(|title| !title.is_empty()) {
            Some(title) => format!("Status: Running\n  Current: {} ({})", task.company, title),
            None => format!("Status: Running\n  Current: {}", task.company),
        },
        None => "Status: Running\n  Polling for tasks...".to_string(),
    }
}

pub fn render_response(response: &Response) -> String {
    match response {
        Response::Status(snapshot) => render_status(snapshot),
        Response::Ack(_) => response.encode(),
    }
}

pub struct StatusRelay {
    handle: CoordinatorHandle,
    refresh: Duration,
}

impl StatusRelay {
    pub fn new(handle: CoordinatorHandle, refresh: Duration) -> Self {
        Self { handle, refresh }
    }

    /// Runs until `quit` or until the coordinator goes away. A closed input
    /// stream leaves the periodic status display running.
    pub async fn run<R>(&self, input: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        let mut ticker = tokio::time::interval(self.refresh);
        let mut last_shown: Option<String> = None;

        println!("{HELP}");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.show_status(&mut last_shown, false).await {
                        break;
                    }
                }
                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Ok(None) => {}
                        Ok(Some(ConsoleCommand::Quit)) => break,
                        Ok(Some(ConsoleCommand::Help)) => println!("{HELP}"),
                        Ok(Some(ConsoleCommand::Send(request))) => {
                            let changes_state =
                                matches!(request, Request::StartPolling | Request::StopPolling);
                            match self.handle.request(request).await {
                                Ok(response) => println!("{}", render_response(&response)),
                                Err(err) => {
                                    scout_error!("Coordinator unavailable: {}", err);
                                    break;
                                }
                            }
                            if changes_state && !self.show_status(&mut last_shown, true).await {
                                break;
                            }
                        }
                        Err(message) => println!("{message}"),
                    },
                    Ok(None) => input_open = false,
                    Err(err) => {
                        scout_warn!("Failed to read console input: {}", err);
                        input_open = false;
                    }
                },
            }
        }
    }

    /// Prints the status when it changed (or always, when `force`). Returns
    /// false once the coordinator is unreachable.
    async fn show_status(&self, last_shown: &mut Option<String>, force: bool) -> bool {
        let snapshot = match self.handle.status().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                scout_error!("Coordinator unavailable: {}", err);
                return false;
            }
        };
        let rendered = render_status(&snapshot);
        if force || last_shown.as_deref() != Some(rendered.as_str()) {
            println!("{rendered}");
            *last_shown = Some(rendered);
        }
        true
    }
}
