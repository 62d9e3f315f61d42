//! Notify-test command - check that desktop notifications arrive.

use anyhow::{Context, Result};
use quotabar_core::Notification;
use tracing::info;

use crate::presenter::DesktopNotifier;

/// Sends a fixed test notification.
pub fn run() -> Result<()> {
    let alert = Notification::test_alert();
    let sent = DesktopNotifier
        .try_send(&alert)
        .context("Cannot start the desktop notifier")?;

    if sent {
        info!(title = %alert.title, "Sent test notification");
        println!("Sent \"{}\". If nothing appears, check the system notification settings.", alert.title);
    } else {
        println!("Desktop notifications are not supported on this platform.");
    }
    Ok(())
}
