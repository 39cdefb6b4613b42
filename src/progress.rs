// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rate-limited download progress display.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Minimum time between two renders.
pub const RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// Number of cells in the bar.
pub const BAR_WIDTH: usize = 30;

const FILLED: char = '█';
const EMPTY: char = '░';

/// Format a byte count in MB with one decimal.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / 1_048_576.0)
}

/// Byte-count progress indicator.
///
/// `total == 0` means the size is unknown: the bar stays empty at 0% until
/// [`finish`](Self::finish).
pub struct ProgressReporter {
    total: u64,
    current: u64,
    last_render: Option<Instant>,
    renders: usize,
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Reporter drawing to stderr.
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar().template("  {msg}") {
            bar.set_style(style);
        }
        Self::with_bar(total, bar)
    }

    /// Reporter that tracks state without drawing anything.
    pub fn hidden(total: u64) -> Self {
        Self::with_bar(total, ProgressBar::hidden())
    }

    fn with_bar(total: u64, bar: ProgressBar) -> Self {
        Self {
            total,
            current: 0,
            last_render: None,
            renders: 0,
            bar,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// How many times the line has been drawn.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// Completion in whole percent, clamped to 100.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        (self.current.saturating_mul(100) / self.total).min(100)
    }

    /// Record the cumulative byte count.
    ///
    /// Returns true if this call redrew the line; calls inside the render
    /// window only update the count.
    pub fn update(&mut self, bytes: u64) -> bool {
        self.current = bytes;
        let due = self
            .last_render
            .map_or(true, |at| at.elapsed() >= RENDER_INTERVAL);
        if due {
            self.render(self.render_line());
        }
        due
    }

    /// Force a final 100% render with the actual byte count.
    pub fn finish(&mut self) {
        let line = format!(
            "{} 100% ({})",
            bar_cells(BAR_WIDTH),
            format_mb(self.current)
        );
        self.render(line.clone());
        self.bar.finish_with_message(line);
    }

    /// Current line: bar, percent, and bytes so far.
    pub fn render_line(&self) -> String {
        let percent = self.percent();
        let filled = (percent as usize * BAR_WIDTH) / 100;
        let size = if self.total == 0 {
            format_mb(self.current)
        } else {
            format!("{}/{}", format_mb(self.current), format_mb(self.total))
        };
        format!("{} {:>3}% ({})", bar_cells(filled), percent, size)
    }

    fn render(&mut self, line: String) {
        self.bar.set_position(self.percent());
        self.bar.set_message(line);
        self.last_render = Some(Instant::now());
        self.renders += 1;
    }
}

fn bar_cells(filled: usize) -> String {
    let filled = filled.min(BAR_WIDTH);
    let mut cells = String::with_capacity(BAR_WIDTH * 3);
    cells.extend(std::iter::repeat(FILLED).take(filled));
    cells.extend(std::iter::repeat(EMPTY).take(BAR_WIDTH - filled));
    cells
}
