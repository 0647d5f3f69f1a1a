//! Output ports: status display, lists, toasts, bell and desktop notifications.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::render::Section;
use crate::reporter::{self, MonitorEvent};
use crate::settings::Settings;
use crate::toast::Toast;
use crate::types::{AlertKind, KeyStatus, StatusLight, StatusLine};

/// Everything the monitor shows to the user.
pub trait Presenter {
    fn status(&mut self, status: &StatusLine);
    fn lists(&mut self, sections: &[Section]);
    /// A toast was just created.
    fn toast(&mut self, toast: &Toast);
    /// Age labels changed; `toasts` is the whole board, newest first.
    fn toasts(&mut self, toasts: &[Toast]);
    fn key_status(&mut self, status: KeyStatus);
    fn settings(&mut self, settings: &Settings);
    /// Free-form feedback for a user command.
    fn message(&mut self, text: &str);
}

pub trait Bell {
    fn ring(&self, volume: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

pub trait DesktopNotifier {
    fn permission(&self) -> Permission;
    /// Ask for permission; returns the resulting state.
    fn request_permission(&self) -> Permission;
    fn notify(&self, title: &str, body: &str);
}

impl<T: Bell + ?Sized> Bell for Box<T> {
    fn ring(&self, volume: f64) {
        (**self).ring(volume)
    }
}

impl<T: DesktopNotifier + ?Sized> DesktopNotifier for Box<T> {
    fn permission(&self) -> Permission {
        (**self).permission()
    }

    fn request_permission(&self) -> Permission {
        (**self).request_permission()
    }

    fn notify(&self, title: &str, body: &str) {
        (**self).notify(title, body)
    }
}

// ── Terminal ───────────────────────────────────────────────────────

fn light_glyph(light: StatusLight) -> &'static str {
    match light {
        StatusLight::Green => "🟢",
        StatusLight::Gold => "🟡",
        StatusLight::Orange => "🟠",
        StatusLight::Red => "🔴",
    }
}

fn kind_glyph(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Bull => "▲",
        AlertKind::Bear => "▼",
        AlertKind::Mixed => "◆",
    }
}

/// Human-readable output on stdout.
#[derive(Debug, Default)]
pub struct TerminalPresenter;

impl TerminalPresenter {
    fn print_toast(toast: &Toast) {
        println!(
            "{} #{} {} ({})",
            kind_glyph(toast.alert.kind),
            toast.id,
            toast.alert.title,
            toast.label
        );
        for line in &toast.alert.lines {
            println!("    {}", line.text);
        }
    }
}

impl Presenter for TerminalPresenter {
    fn status(&mut self, status: &StatusLine) {
        println!("{} {}", light_glyph(status.light), status.text);
    }

    fn lists(&mut self, sections: &[Section]) {
        for section in sections {
            println!();
            println!("{}", section.heading());
            if section.entries.is_empty() {
                println!("  None");
            }
            for entry in &section.entries {
                println!("  {}", entry.line());
            }
        }
        println!();
    }

    fn toast(&mut self, toast: &Toast) {
        Self::print_toast(toast);
    }

    fn toasts(&mut self, toasts: &[Toast]) {
        if toasts.is_empty() {
            return;
        }
        println!("── alerts ──");
        for toast in toasts {
            Self::print_toast(toast);
        }
    }

    fn key_status(&mut self, status: KeyStatus) {
        println!("🔑 {}", status.message());
    }

    fn settings(&mut self, s: &Settings) {
        println!(
            "notifications={} sound={} volume={}% direction={} key={}",
            if s.notifications { "on" } else { "off" },
            if s.sound { "on" } else { "off" },
            s.volume_percent(),
            s.direction,
            if s.has_api_key() { "set" } else { "none" },
        );
    }

    fn message(&mut self, text: &str) {
        println!("{text}");
    }
}

/// One JSON object per line on stdout, for piping into other tools.
#[derive(Debug, Default)]
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn status(&mut self, status: &StatusLine) {
        reporter::report_event(&MonitorEvent::status(status));
    }

    fn lists(&mut self, sections: &[Section]) {
        reporter::report_event(&MonitorEvent::lists(sections));
    }

    fn toast(&mut self, toast: &Toast) {
        reporter::report_event(&MonitorEvent::toast(toast));
    }

    fn toasts(&mut self, _toasts: &[Toast]) {}

    fn key_status(&mut self, status: KeyStatus) {
        reporter::report_event(&MonitorEvent::key_status(status));
    }

    fn settings(&mut self, settings: &Settings) {
        reporter::report_event(&MonitorEvent::settings(settings));
    }

    fn message(&mut self, text: &str) {
        reporter::report_event(&MonitorEvent::message(text));
    }
}

/// Rings the terminal bell. Volume zero stays silent.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Bell for TerminalBell {
    fn ring(&self, volume: f64) {
        if volume <= 0.0 {
            return;
        }
        let mut err = std::io::stderr();
        if let Err(e) = err.write_all(b"\x07").and_then(|_| err.flush()) {
            debug!("Failed to ring bell: {e}");
        }
    }
}

/// Desktop notifications through an external command (`notify-send` by default).
///
/// Permission is granted when the command is found on `PATH`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn locate(&self) -> Option<PathBuf> {
        let candidate = PathBuf::from(&self.program);
        if candidate.components().count() > 1 {
            return candidate.is_file().then_some(candidate);
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.program))
            .find(|p| p.is_file())
    }

    /// Spawn the notify command and wait for it on a background thread so
    /// the child is reaped.
    fn spawn_reaped(&self, title: &str, body: &str) -> std::io::Result<JoinHandle<()>> {
        let mut child = Command::new(&self.program)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let program = self.program.clone();
        thread::Builder::new()
            .name("notify-reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) if !status.success() => {
                    warn!("Desktop notification command {program} exited with {status}");
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to wait for {program}: {e}"),
            })
    }
}

impl DesktopNotifier for CommandNotifier {
    fn permission(&self) -> Permission {
        if self.locate().is_some() {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn request_permission(&self) -> Permission {
        let permission = self.permission();
        if permission == Permission::Denied {
            warn!(
                "Desktop notifications unavailable: {:?} not found on PATH",
                self.program
            );
        }
        permission
    }

    fn notify(&self, title: &str, body: &str) {
        if let Err(e) = self.spawn_reaped(title, body) {
            warn!("Failed to send desktop notification via {}: {e}", self.program);
        }
    }
}

/// Desktop notifier that never has permission.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDesktop;

impl DesktopNotifier for NoDesktop {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn notify(&self, _title: &str, _body: &str) {}
}
