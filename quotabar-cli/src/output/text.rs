//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Local, Utc};
use quotabar_core::{QuotaKind, QuotaReading, StatusLine, TrackerState, UsageSnapshot, describe_reset, format_reset_time};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats the live status line with a local timestamp.
    pub fn format_status(&self, status: &StatusLine, at: DateTime<Local>) -> String {
        let time = self.dim(&format!("[{}]", at.format("%H:%M:%S")));
        let mut line = format!("{time} {}", status.text());
        if status.auth_expired {
            line.push(' ');
            line.push_str(&self.red("(auth expired)"));
        }
        line
    }

    /// Formats the time of the next automatic update.
    pub fn format_next_update(&self, at: DateTime<Local>) -> String {
        self.dim(&format!("(next update {})", at.format("%H:%M:%S")))
    }

    /// Formats a full snapshot: one block per quota with bar and reset time.
    pub fn format_snapshot(&self, snapshot: &UsageSnapshot, now: DateTime<Utc>) -> String {
        let mut lines = vec![self.bold(&StatusLine::from_readings(
            Some(snapshot.reading(QuotaKind::Session)),
            Some(snapshot.reading(QuotaKind::Weekly)),
        )
        .text())];

        for quota in QuotaKind::ALL {
            lines.push(self.format_reading(quota, snapshot.reading(quota), now));
        }

        lines.join("\n")
    }

    /// Formats one quota with progress bar and reset countdown.
    fn format_reading(&self, quota: QuotaKind, reading: &QuotaReading, now: DateTime<Utc>) -> String {
        let bar = self.progress_bar(reading.percent);
        let pct = self.color_for_percent(reading.percent, &format!("{:>3}% used", reading.rounded_percent()));

        // Within a day the clock time is enough; otherwise name the weekday.
        let with_day = reading.resets_at - now > chrono::Duration::hours(24);
        let reset = format!(
            "{} ({})",
            describe_reset(reading.resets_at, now),
            format_reset_time(reading.resets_at, with_day)
        );

        format!(
            "{:<16} {} {}\n{:<16} {}",
            quota.display_name(),
            bar,
            pct,
            "",
            self.dim(&reset)
        )
    }

    /// Formats persisted threshold state.
    pub fn format_state(&self, state: &TrackerState) -> String {
        let mut lines = Vec::new();
        for quota in QuotaKind::ALL {
            let quota_state = state.get(quota);
            let fired: Vec<String> = quota_state.fired().iter().map(|t| format!("{t}%")).collect();
            let fired = if fired.is_empty() {
                self.dim("none")
            } else {
                fired.join(", ")
            };
            let reset = quota_state
                .resets_at()
                .map_or_else(|| self.dim("unknown"), |r| format_reset_time(r, true));

            lines.push(self.bold(quota.display_name()));
            lines.push(format!("  Fired:  {fired}"));
            lines.push(format!("  Resets: {reset}"));
        }
        lines.join("\n")
    }

    /// Formats one row of the `check` table.
    pub fn format_check(&self, label: &str, ok: bool, detail: &str) -> String {
        let mark = if ok { self.green("✓") } else { self.red("✗") };
        format!("{mark} {label:<12} {detail}")
    }

    /// Formats a progress bar; `percent_used` fills from the left.
    pub fn progress_bar(&self, percent_used: f64) -> String {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let filled = (((percent_used / 100.0) * self.bar_width as f64).round() as usize).min(self.bar_width);
        let empty = self.bar_width - filled;

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_used, &bar)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent_used: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent_used >= 80.0 {
            self.red(text)
        } else if percent_used >= 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}
