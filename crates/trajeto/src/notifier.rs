//! Terminal side effects for `listen`.
//!
//! Notifications themselves are printed by the listen loop; this only
//! handles the attention-grabbing extras: a banner for critical
//! notifications and the terminal bell for urgent ones.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use trajeto_core::{Capabilities, Notification, Notifier, NotifierError, Permission, Priority};

#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier {
    color: bool,
    bell: bool,
}

impl TerminalNotifier {
    pub fn new(color: bool, bell: bool) -> Self {
        Self { color, bell }
    }
}

impl Notifier for TerminalNotifier {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            notifications: true,
            audio: self.bell,
            vibration: false,
        }
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn show_platform_notification(
        &self,
        notification: &Notification,
        require_interaction: bool,
    ) -> Result<(), NotifierError> {
        if !require_interaction {
            return Ok(());
        }
        let banner = format!("!! {} !!", notification.display_text());
        let mut stderr = io::stderr().lock();
        let written = if self.color {
            writeln!(stderr, "{}", banner.on_red().white().bold())
        } else {
            writeln!(stderr, "{banner}")
        };
        written.map_err(|e| NotifierError(e.to_string()))
    }

    fn play_sound(&self, priority: Priority) -> Result<(), NotifierError> {
        if !self.bell || priority < Priority::Alta {
            return Ok(());
        }
        let mut stderr = io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|e| NotifierError(e.to_string()))
    }
}
