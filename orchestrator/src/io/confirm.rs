//! Yes/no decision point before archiving.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::cancel::CancelFlag;

const POLL_SLICE: Duration = Duration::from_millis(100);

/// Source of operator confirmation.
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Asks on stdout and reads one line from stdin.
///
/// The read happens on a helper thread so Ctrl+C at the question is noticed
/// without waiting for Enter.
pub struct StdinConfirm {
    cancel: CancelFlag,
}

impl StdinConfirm {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        {
            let mut stdout = io::stdout().lock();
            write!(stdout, "\n{question} (y/n, Ctrl+C to stop): ").context("write prompt")?;
            stdout.flush().context("flush prompt")?;
        }
        await_answer(|| read_answer(&mut io::stdin().lock()), &self.cancel)
    }
}

/// Run `read` on a helper thread and wait for it, giving up with "no" once
/// `cancel` is set. An abandoned reader stays blocked until the process exits.
pub fn await_answer<F>(read: F, cancel: &CancelFlag) -> Result<bool>
where
    F: FnOnce() -> Result<bool> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone once the question was abandoned.
        let _ = tx.send(read());
    });
    loop {
        if cancel.is_cancelled() {
            debug!("confirmation abandoned after cancellation");
            return Ok(false);
        }
        match rx.recv_timeout(POLL_SLICE) {
            Ok(answer) => return answer,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("answer reader stopped without a reply"));
            }
        }
    }
}

/// Read one answer line; EOF counts as "no".
pub fn read_answer<R: BufRead>(reader: &mut R) -> Result<bool> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).context("read answer")?;
    Ok(n > 0 && is_yes(&line))
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn only_y_or_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn eof_is_no() {
        let mut empty: &[u8] = b"";
        assert!(!read_answer(&mut empty).expect("read"));
        let mut yes: &[u8] = b"y\nignored\n";
        assert!(read_answer(&mut yes).expect("read"));
    }

    #[test]
    fn await_answer_returns_reader_result() {
        let cancel = CancelFlag::new();
        assert!(await_answer(|| Ok(true), &cancel).expect("answer"));
        let err = await_answer(|| Err(anyhow!("stdin closed")), &cancel).unwrap_err();
        assert!(err.to_string().contains("stdin closed"));
    }

    #[test]
    fn cancel_abandons_a_blocked_read() {
        let cancel = CancelFlag::new();
        let remote = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });

        let started = Instant::now();
        let answer = await_answer(
            || {
                thread::sleep(Duration::from_secs(30));
                Ok(true)
            },
            &cancel,
        )
        .expect("answer");

        assert!(!answer);
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().expect("join");
    }
}
