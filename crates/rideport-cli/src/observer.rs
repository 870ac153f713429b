//! Terminal implementation of the download observer
//!
//! Status lines go through the output formatter, progress is redrawn in
//! place on stderr, and conflict / selection questions are asked on stdin
//! when stdin is a terminal. Without a terminal, conflicts keep the existing
//! file and every ride is selected.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use rideport_core::{
    domain::RideItem,
    ports::{IDownloadObserver, OverwriteDecision},
};
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Observer that talks to the user on the terminal
pub struct ConsoleObserver {
    formatter: Box<dyn OutputFormatter>,
    format: OutputFormat,
    interactive: bool,
    progress_shown: AtomicBool,
}

impl ConsoleObserver {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            formatter: get_formatter(format),
            format,
            interactive: std::io::stdin().is_terminal() && !format.is_json(),
            progress_shown: AtomicBool::new(false),
        }
    }

    fn clear_progress(&self) {
        if self.progress_shown.swap(false, Ordering::SeqCst) {
            eprint!("\r\x1b[K");
        }
    }
}

#[async_trait::async_trait]
impl IDownloadObserver for ConsoleObserver {
    async fn report_status(&self, text: &str) {
        self.clear_progress();
        self.formatter.status(text);
    }

    async fn report_progress(&self, text: &str) {
        if self.format.is_json() {
            return;
        }
        if text.is_empty() {
            self.clear_progress();
        } else {
            eprint!("\r\x1b[K  {text}");
            let _ = std::io::stderr().flush();
            self.progress_shown.store(true, Ordering::SeqCst);
        }
    }

    async fn resolve_overwrite_conflict(&self, existing: &str) -> OverwriteDecision {
        self.clear_progress();
        if !self.interactive {
            self.formatter.warn(&format!(
                "{existing} Keeping the existing file (pass --overwrite to replace it)."
            ));
            return OverwriteDecision::Skip;
        }

        let answer = prompt(format!("{existing}\nOverwrite the existing file? [y/N] ")).await;
        let decision = if answer.as_deref().is_some_and(parse_yes) {
            OverwriteDecision::Overwrite
        } else {
            OverwriteDecision::Skip
        };
        debug!(decision = %decision, "Overwrite conflict answered");
        decision
    }

    async fn select_rides(&self, rides: &mut [RideItem]) {
        if !self.interactive {
            for ride in rides.iter_mut() {
                ride.wanted = true;
            }
            return;
        }

        self.formatter.info("Rides on the device:");
        for (i, ride) in rides.iter().enumerate() {
            let size = ride
                .size_bytes()
                .map(|b| format!(" ({} KB)", b / 1024))
                .unwrap_or_default();
            self.formatter.info(&format!(
                "{:>3}. {}{}",
                i + 1,
                ride.start_time().format("%Y-%m-%d %H:%M:%S"),
                size
            ));
        }

        loop {
            let Some(answer) =
                prompt("Rides to download (e.g. 1,3-5; empty for all): ".to_string()).await
            else {
                // stdin closed: keep the default of everything
                for ride in rides.iter_mut() {
                    ride.wanted = true;
                }
                return;
            };
            match parse_selection(&answer, rides.len()) {
                Ok(chosen) => {
                    for (i, ride) in rides.iter_mut().enumerate() {
                        ride.wanted = chosen[i];
                    }
                    return;
                }
                Err(message) => self.formatter.warn(&message),
            }
        }
    }
}

/// Prints `question` and reads one line from stdin
///
/// Returns `None` when stdin is closed.
async fn prompt(question: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        print!("{question}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Parses a 1-based selection such as `1,3-5` into per-ride flags
///
/// An empty answer or `all` selects everything.
fn parse_selection(answer: &str, count: usize) -> Result<Vec<bool>, String> {
    let answer = answer.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
        return Ok(vec![true; count]);
    }

    let mut chosen = vec![false; count];
    for part in answer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (first, last) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, count)?, parse_index(b, count)?),
            None => {
                let n = parse_index(part, count)?;
                (n, n)
            }
        };
        if first > last {
            return Err(format!("'{part}' is not an ascending range"));
        }
        for flag in &mut chosen[first..=last] {
            *flag = true;
        }
    }
    Ok(chosen)
}

fn parse_index(text: &str, count: usize) -> Result<usize, String> {
    let n: usize = text
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a ride number", text.trim()))?;
    if n == 0 || n > count {
        return Err(format!("ride {n} does not exist (1-{count})"));
    }
    Ok(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yes() {
        assert!(parse_yes("y"));
        assert!(parse_yes(" YES "));
        assert!(!parse_yes(""));
        assert!(!parse_yes("n"));
    }

    #[test]
    fn test_parse_selection_all() {
        assert_eq!(parse_selection("", 3).unwrap(), vec![true, true, true]);
        assert_eq!(parse_selection("All", 2).unwrap(), vec![true, true]);
    }

    #[test]
    fn test_parse_selection_ranges() {
        assert_eq!(
            parse_selection("1, 3-4", 5).unwrap(),
            vec![true, false, true, true, false]
        );
    }

    #[test]
    fn test_parse_selection_errors() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("3-1", 3).is_err());
        assert!(parse_selection("two", 3).is_err());
    }
}
