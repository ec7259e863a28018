/*! Progress reporting

[ProgressLogger] periodically logs how many lines and bytes went through a processing step.
It is owned by the caller and has an explicit `start`/`stop` lifecycle: nothing is global and nothing runs
in the background, logging happens on the caller's thread when [ProgressLogger::tick] crosses an interval.
!*/
use std::time::{Duration, Instant};

use log::info;

/// Default amount of lines between two progress logs.
pub const DEFAULT_INTERVAL: u64 = 1_000_000;

const SIZE_NAMES: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Convert bytes into a human readable string (powers of 1000, one decimal).
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut index = 0;
    while size >= 1000.0 && index < SIZE_NAMES.len() - 1 {
        size /= 1000.0;
        index += 1;
    }
    format!("{:.1} {}", size, SIZE_NAMES[index])
}

/// Format a count with thousands separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub struct ProgressLogger {
    name: String,
    interval: u64,
    lines: u64,
    bytes: u64,
    started: Option<Instant>,
}

impl ProgressLogger {
    pub fn new(name: &str) -> Self {
        Self::with_interval(name, DEFAULT_INTERVAL)
    }

    pub fn with_interval(name: &str, interval: u64) -> Self {
        Self {
            name: name.to_string(),
            interval: interval.max(1),
            lines: 0,
            bytes: 0,
            started: None,
        }
    }

    /// Resets the counters and starts the clock.
    pub fn start(&mut self) {
        self.lines = 0;
        self.bytes = 0;
        self.started = Some(Instant::now());
    }

    /// Accounts for one line of `bytes` bytes.
    pub fn tick(&mut self, bytes: usize) {
        if self.started.is_none() {
            self.start();
        }
        self.lines += 1;
        self.bytes += bytes as u64;
        if self.lines % self.interval == 0 {
            info!(
                "[{}] {} lines ({})",
                self.name,
                format_count(self.lines),
                format_bytes(self.bytes)
            );
        }
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Logs a summary and returns the elapsed time since [ProgressLogger::start].
    pub fn stop(&mut self) -> Duration {
        let elapsed = self
            .started
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            (self.bytes as f64 / elapsed.as_secs_f64()) as u64
        } else {
            0
        };
        info!(
            "[{}] done: {} lines ({}) in {:.1}s, {}/s",
            self.name,
            format_count(self.lines),
            format_bytes(self.bytes),
            elapsed.as_secs_f64(),
            format_bytes(rate)
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(999), "999.0 B");
        assert_eq!(format_bytes(1_000), "1.0 KB");
        assert_eq!(format_bytes(1_560_000), "1.6 MB");
        assert_eq!(format_bytes(2_000_000_000), "2.0 GB");
    }

    #[test]
    fn counts() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(12_345_678), "12,345,678");
    }

    #[test_log::test]
    fn lifecycle() {
        let mut progress = ProgressLogger::with_interval("test", 2);
        progress.start();
        for line in ["a\n", "bb\n", "ccc\n"] {
            progress.tick(line.len());
        }
        assert_eq!(progress.lines(), 3);
        assert_eq!(progress.bytes(), 9);
        progress.stop();

        // a restart resets the counters
        progress.start();
        assert_eq!(progress.lines(), 0);
    }
}
