//! Terminal status output and desktop notifications.

use chrono::{DateTime, Local};
use std::time::Duration;
use quotabar_core::{Notification, Presenter, StatusLine};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::output::TextFormatter;

// ============================================================================
// Desktop Notifier
// ============================================================================

/// Sends system notifications without waiting for them.
///
/// macOS uses `osascript`, Linux uses `notify-send`. Elsewhere notifications
/// only reach the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    /// Sends a notification in the background, logging failures.
    pub fn send(self, notification: &Notification) {
        match self.try_send(notification) {
            Ok(true) => {}
            Ok(false) => debug!("No desktop notifier on this platform"),
            Err(e) => debug!(error = %e, "Cannot spawn notifier"),
        }
    }

    /// Spawns the platform notifier without waiting for it.
    ///
    /// Returns `false` when the platform has no notifier.
    ///
    /// # Errors
    ///
    /// Returns the spawn error, e.g. when `notify-send` is not installed.
    pub fn try_send(self, notification: &Notification) -> std::io::Result<bool> {
        let Some((program, args)) = notification_command(notification) else {
            return Ok(false);
        };

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Reap off the caller's thread.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(true)
    }
}

/// Builds the notifier command for this platform.
#[cfg(target_os = "macos")]
fn notification_command(notification: &Notification) -> Option<(&'static str, Vec<String>)> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(&notification.body),
        escape_applescript(&notification.title)
    );
    Some(("osascript", vec!["-e".to_string(), script]))
}

/// Builds the notifier command for this platform.
#[cfg(all(unix, not(target_os = "macos")))]
fn notification_command(notification: &Notification) -> Option<(&'static str, Vec<String>)> {
    Some((
        "notify-send",
        vec![
            "--app-name=QuotaBar".to_string(),
            notification.title.clone(),
            notification.body.clone(),
        ],
    ))
}

/// Builds the notifier command for this platform.
#[cfg(not(unix))]
fn notification_command(_notification: &Notification) -> Option<(&'static str, Vec<String>)> {
    None
}

/// Escapes text for a double-quoted AppleScript string.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " ")
}

// ============================================================================
// Terminal Presenter
// ============================================================================

/// Prints the status line to stdout and forwards notifications.
pub struct TerminalPresenter {
    formatter: TextFormatter,
    notifier: Option<DesktopNotifier>,
    refresh_interval: Option<Duration>,
}

impl TerminalPresenter {
    /// Creates a presenter; `desktop` enables system notifications.
    pub fn new(use_colors: bool, desktop: bool) -> Self {
        Self {
            formatter: TextFormatter::new(use_colors),
            notifier: desktop.then_some(DesktopNotifier),
            refresh_interval: None,
        }
    }

    /// Shows when the next automatic update is due after each status line.
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// The line printed for `status` at `now`.
    fn status_text(&self, status: &StatusLine, now: DateTime<Local>) -> String {
        let line = self.formatter.format_status(status, now);
        match self
            .refresh_interval
            .and_then(|interval| chrono::Duration::from_std(interval).ok())
        {
            Some(interval) => format!("{line} {}", self.formatter.format_next_update(now + interval)),
            None => line,
        }
    }
}

impl Presenter for TerminalPresenter {
    fn show_status(&self, status: &StatusLine) {
        println!("{}", self.status_text(status, Local::now()));
    }

    fn notify(&self, notification: &Notification) {
        info!(title = %notification.title, body = %notification.body, "Sending notification");
        println!("  >> {}: {}", notification.title, notification.body);
        if let Some(notifier) = self.notifier {
            notifier.send(notification);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_text_shows_next_update() {
        let now = Local.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap();
        let status = StatusLine::unavailable();

        let plain = TerminalPresenter::new(false, false);
        assert_eq!(plain.status_text(&status, now), "[09:05:00] 5h: N/A | 7d: N/A");

        let timed = TerminalPresenter::new(false, false).with_refresh_interval(Duration::from_secs(180));
        assert_eq!(
            timed.status_text(&status, now),
            "[09:05:00] 5h: N/A | 7d: N/A (next update 09:08:00)"
        );
    }

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_applescript("a\\b\nc"), "a\\\\b c");
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn test_linux_command() {
        let (program, args) = notification_command(&Notification::new("T", "B")).unwrap();
        assert_eq!(program, "notify-send");
        assert_eq!(&args[1..], &["T", "B"]);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn test_alert_command() {
        let alert = Notification::test_alert();
        let (program, args) = notification_command(&alert).unwrap();
        assert_eq!(program, "notify-send");
        assert_eq!(args, vec!["--app-name=QuotaBar".to_string(), alert.title, alert.body]);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_alert_command() {
        let (program, args) = notification_command(&Notification::test_alert()).unwrap();
        assert_eq!(program, "osascript");
        assert_eq!(
            args[1],
            "display notification \"Test Notification: if you see this, notifications are working!\" \
             with title \"Claude Usage Monitor\""
        );
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_macos_command() {
        let (program, args) = notification_command(&Notification::new("T \"x\"", "B")).unwrap();
        assert_eq!(program, "osascript");
        assert_eq!(args[1], r#"display notification "B" with title "T \"x\"""#);
    }
}
