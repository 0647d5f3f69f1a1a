use serde::Serialize;
use tracing::{debug, info};

use crate::DESKTOP_TITLE;
use crate::diff::ChangeSet;
use crate::presentation::{Bell, DesktopNotifier, Permission};
use crate::settings::Settings;
use crate::toast::ToastBoard;
use crate::types::{AlertKind, Category};

pub const CHANGE_TITLE: &str = "Market list changed";
pub const TEST_TITLE: &str = "Test notification";
pub const CONFLICT_TITLE: &str = "Connection refused";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineClass {
    Added,
    Removed,
}

impl LineClass {
    fn css(self) -> &'static str {
        match self {
            LineClass::Added => "added",
            LineClass::Removed => "removed",
        }
    }
}

/// One human-readable line of an alert body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertLine {
    pub class: LineClass,
    pub text: String,
}

impl AlertLine {
    fn new(class: LineClass, text: impl Into<String>) -> Self {
        Self {
            class,
            text: text.into(),
        }
    }

    pub fn markup(&self) -> String {
        format!("<span class=\"{}\">{}</span>", self.class.css(), self.text)
    }
}

/// A toast-worthy alert: title, body lines and style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub lines: Vec<AlertLine>,
    pub kind: AlertKind,
}

impl Alert {
    pub fn body_markup(&self) -> String {
        self.lines
            .iter()
            .map(AlertLine::markup)
            .collect::<Vec<_>>()
            .join("<br>")
    }

    /// Plain-text body for desktop notifications: every markup line with its
    /// tags stripped, one per line.
    pub fn plain_summary(&self) -> String {
        self.lines
            .iter()
            .map(|l| strip_markup(&l.markup()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Remove every `<...>` tag. An unterminated `<` is kept verbatim.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Alert style for a change set, or `None` when nothing watched changed.
pub fn classify(changes: &ChangeSet) -> Option<AlertKind> {
    match (changes.changed(Category::Bull), changes.changed(Category::Bear)) {
        (true, true) => Some(AlertKind::Mixed),
        (true, false) => Some(AlertKind::Bull),
        (false, true) => Some(AlertKind::Bear),
        (false, false) => None,
    }
}

/// Build the alert for a change set.
///
/// Returns `None` unless some watched category changed. Lines follow the
/// order bull-added, bull-removed, bear-added, bear-removed, one per
/// non-empty group.
pub fn build_alert(changes: &ChangeSet) -> Option<Alert> {
    let kind = classify(changes)?;
    let mut lines = Vec::new();

    if let Some(d) = changes.delta(Category::Bull) {
        if !d.added.is_empty() {
            lines.push(AlertLine::new(
                LineClass::Added,
                format!("🚀 Bull added: {}", d.added.join(", ")),
            ));
        }
        if !d.removed.is_empty() {
            lines.push(AlertLine::new(
                LineClass::Removed,
                format!("💨 Bull removed: {}", d.removed.join(", ")),
            ));
        }
    }
    if let Some(d) = changes.delta(Category::Bear) {
        if !d.added.is_empty() {
            lines.push(AlertLine::new(
                LineClass::Added,
                format!("📉 Bear added: {}", d.added.join(", ")),
            ));
        }
        if !d.removed.is_empty() {
            lines.push(AlertLine::new(
                LineClass::Removed,
                format!("💨 Bear removed: {}", d.removed.join(", ")),
            ));
        }
    }

    Some(Alert {
        title: CHANGE_TITLE.to_string(),
        lines,
        kind,
    })
}

/// Sample alert shown by the `test` command.
pub fn test_alert() -> Alert {
    Alert {
        title: TEST_TITLE.to_string(),
        lines: vec![
            AlertLine::new(LineClass::Added, "🚀 Bull added: BTC"),
            AlertLine::new(LineClass::Removed, "💨 Bear removed: ETH"),
        ],
        kind: AlertKind::Mixed,
    }
}

/// Alert shown when the server refuses the key because another device holds it.
pub fn conflict_alert(detail: &str) -> Alert {
    Alert {
        title: CONFLICT_TITLE.to_string(),
        lines: vec![AlertLine::new(LineClass::Removed, detail)],
        kind: AlertKind::Bear,
    }
}

/// What a call to [`Notifier::fire`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    pub toast_id: u64,
    pub rang: bool,
    pub desktop: bool,
}

/// Delivers alerts to the bell, the toast board and the desktop.
pub struct Notifier<B, D> {
    bell: B,
    desktop: D,
}

impl<B: Bell, D: DesktopNotifier> Notifier<B, D> {
    pub fn new(bell: B, desktop: D) -> Self {
        Self { bell, desktop }
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    /// Full change alert: bell, toast and, if allowed, a desktop notification.
    pub fn fire(&self, alert: &Alert, settings: &Settings, toasts: &mut ToastBoard) -> Dispatch {
        let rang = self.ring(settings);
        let toast_id = toasts.push(alert.clone());

        let desktop = settings.notifications && self.desktop.permission() == Permission::Granted;
        if desktop {
            self.desktop.notify(DESKTOP_TITLE, &alert.plain_summary());
        } else if settings.notifications {
            debug!("Desktop notifications enabled but permission not granted");
        }

        info!(
            "Alert ({:?}): {}",
            alert.kind,
            alert.plain_summary().replace('\n', " | ")
        );
        Dispatch {
            toast_id,
            rang,
            desktop,
        }
    }

    /// Bell and toast only; used for the sample alert.
    pub fn fire_test(&self, alert: &Alert, settings: &Settings, toasts: &mut ToastBoard) -> Dispatch {
        let rang = self.ring(settings);
        let toast_id = toasts.push(alert.clone());
        Dispatch {
            toast_id,
            rang,
            desktop: false,
        }
    }

    fn ring(&self, settings: &Settings) -> bool {
        if !settings.sound {
            return false;
        }
        self.bell.ring(settings.volume);
        true
    }
}
