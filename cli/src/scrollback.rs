//! Recent input lines shown together in the OSD

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Line {
    text: String,
    stamp: Instant,
}

/// Lines kept for display, bounded by count and by age.
/// A limit of zero disables it.
#[derive(Debug, Clone, Default)]
pub struct Scrollback {
    lines: VecDeque<Line>,
    max_lines: usize,
    max_age: Option<Duration>,
}

impl Scrollback {
    pub fn new(max_lines: usize, max_age: Option<Duration>) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines,
            max_age: max_age.filter(|age| !age.is_zero()),
        }
    }

    pub fn push(&mut self, text: impl Into<String>, now: Instant) {
        self.lines.push_back(Line {
            text: text.into(),
            stamp: now,
        });
    }

    /// Drop the oldest lines beyond the count limit, then every line that
    /// has reached the age limit
    pub fn prune(&mut self, now: Instant) {
        if self.max_lines > 0 {
            while self.lines.len() > self.max_lines {
                self.lines.pop_front();
            }
        }
        if let Some(age) = self.max_age {
            while self
                .lines
                .front()
                .is_some_and(|line| line.stamp + age <= now)
            {
                self.lines.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines joined with newlines, oldest first
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&line.text);
        }
        out
    }
}
