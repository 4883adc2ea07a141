//! Input reading
//!
//! A line thread does the blocking reads. The reader thread collects its
//! lines into the scrollback and hands the joined text to the display loop
//! through a [`Mailbox`] that holds at most one update.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::scrollback::Scrollback;

/// A line made of a single BEL refreshes the display without adding text
const BELL: &str = "\u{7}";

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Text(String),
    Closed,
}

/// Single-slot rendezvous between the reader and the display loop
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_while_full<'a>(&self, mut slot: MutexGuard<'a, Slot>) -> MutexGuard<'a, Slot> {
        while matches!(*slot, Slot::Text(_)) {
            slot = self.cond.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
        slot
    }

    /// Block until the previous update was taken, then post `text`.
    /// Returns false once the mailbox is closed.
    pub fn put(&self, text: String) -> bool {
        let mut slot = self.wait_while_full(self.lock());
        if matches!(*slot, Slot::Closed) {
            return false;
        }
        *slot = Slot::Text(text);
        self.cond.notify_all();
        true
    }

    /// No more updates; pending text is still delivered first
    pub fn close(&self) {
        let mut slot = self.wait_while_full(self.lock());
        *slot = Slot::Closed;
        self.cond.notify_all();
    }

    /// Wait for the next update, `None` after close
    pub fn take(&self) -> Option<String> {
        let mut slot = self.lock();
        loop {
            match std::mem::take(&mut *slot) {
                Slot::Text(text) => {
                    self.cond.notify_all();
                    return Some(text);
                }
                Slot::Closed => {
                    *slot = Slot::Closed;
                    return None;
                }
                Slot::Empty => {
                    slot = self.cond.wait(slot).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    /// An update is waiting to be taken
    pub fn has_pending(&self) -> bool {
        matches!(*self.lock(), Slot::Text(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// `None` reads stdin
    pub path: Option<PathBuf>,
    pub keep_reading: bool,
    pub timeout: Option<Duration>,
    pub max_lines: usize,
    pub max_age: Option<Duration>,
}

fn open(path: Option<&PathBuf>) -> io::Result<Box<dyn BufRead + Send>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Blocking line reads, reopening the file on EOF when asked to
fn read_lines(mut source: Box<dyn BufRead + Send>, options: &ReaderOptions, tx: Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match source.read_until(b'\n', &mut buf) {
            Ok(0) => {
                let Some(path) = options.path.as_ref().filter(|_| options.keep_reading) else {
                    debug!("end of input");
                    return;
                };
                match open(Some(path)) {
                    Ok(reopened) => {
                        debug!(path = %path.display(), "input reopened");
                        source = reopened;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to reopen input");
                        return;
                    }
                }
            }
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read input");
                return;
            }
        }
    }
}

fn collect(rx: Receiver<String>, options: &ReaderOptions, mailbox: &Mailbox) {
    let mut scrollback = Scrollback::new(options.max_lines, options.max_age);
    loop {
        let line = match options.timeout {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    info!(?timeout, "input timed out");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(line) => line,
                Err(_) => break,
            },
        };

        let now = Instant::now();
        if line != BELL {
            scrollback.push(line, now);
        }
        scrollback.prune(now);
        if !mailbox.put(scrollback.joined()) {
            break;
        }
    }
    mailbox.close();
}

/// Open the input and start reading. Fails if the input cannot be opened.
pub fn spawn_reader(options: ReaderOptions, mailbox: Arc<Mailbox>) -> io::Result<JoinHandle<()>> {
    let source = open(options.path.as_ref())?;
    let (tx, rx) = mpsc::channel();

    let line_options = options.clone();
    thread::Builder::new()
        .name("aosd-cat-lines".into())
        .spawn(move || read_lines(source, &line_options, tx))?;

    thread::Builder::new()
        .name("aosd-cat-reader".into())
        .spawn(move || collect(rx, &options, &mailbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_collect(lines: &[&str], options: ReaderOptions) -> Vec<String> {
        let (tx, rx) = mpsc::channel();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        drop(tx);

        let mailbox = Arc::new(Mailbox::new());
        let reader = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || collect(rx, &options, &mailbox))
        };

        let mut seen = Vec::new();
        while let Some(text) = mailbox.take() {
            seen.push(text);
        }
        reader.join().unwrap();
        seen
    }

    #[test]
    fn test_updates_accumulate_scrollback() {
        let seen = run_collect(
            &["a", "b", "c"],
            ReaderOptions {
                max_lines: 2,
                ..ReaderOptions::default()
            },
        );
        assert_eq!(seen, vec!["a", "a\nb", "b\nc"]);
    }

    #[test]
    fn test_bell_refreshes_without_adding() {
        let seen = run_collect(&["hello", BELL], ReaderOptions::default());
        assert_eq!(seen, vec!["hello", "hello"]);
    }

    #[test]
    fn test_timeout_closes_mailbox() {
        let (_tx, rx) = mpsc::channel::<String>();
        let mailbox = Mailbox::new();
        let options = ReaderOptions {
            timeout: Some(Duration::from_millis(20)),
            ..ReaderOptions::default()
        };
        collect(rx, &options, &mailbox);
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_pending_visible_until_taken() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.has_pending());
        assert!(mailbox.put("x".into()));
        assert!(mailbox.has_pending());
        assert_eq!(mailbox.take().as_deref(), Some("x"));
        assert!(!mailbox.has_pending());

        mailbox.close();
        assert!(!mailbox.put("y".into()));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_read_lines_strips_newlines() {
        let source: Box<dyn BufRead + Send> =
            Box::new(Cursor::new(b"one\ntwo\n\xffthree".to_vec()));
        let (tx, rx) = mpsc::channel();
        read_lines(source, &ReaderOptions::default(), tx);
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["one", "two", "\u{fffd}three"]);
    }
}
