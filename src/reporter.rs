use serde::Serialize;

use crate::notifier::Alert;
use crate::render::Section;
use crate::settings::Settings;
use crate::toast::Toast;
use crate::types::{KeyStatus, StatusLine};

/// One line of `--json` output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Status {
        timestamp: String,
        #[serde(flatten)]
        status: StatusLine,
    },
    Lists {
        timestamp: String,
        sections: Vec<Section>,
    },
    Toast {
        timestamp: String,
        id: u64,
        #[serde(flatten)]
        alert: Alert,
    },
    KeyStatus {
        timestamp: String,
        status: KeyStatus,
        message: &'static str,
    },
    Settings {
        timestamp: String,
        settings: Settings,
    },
    Message {
        timestamp: String,
        text: String,
    },
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl MonitorEvent {
    pub fn status(status: &StatusLine) -> Self {
        MonitorEvent::Status {
            timestamp: now(),
            status: status.clone(),
        }
    }

    pub fn lists(sections: &[Section]) -> Self {
        MonitorEvent::Lists {
            timestamp: now(),
            sections: sections.to_vec(),
        }
    }

    pub fn toast(toast: &Toast) -> Self {
        MonitorEvent::Toast {
            timestamp: now(),
            id: toast.id,
            alert: toast.alert.clone(),
        }
    }

    pub fn key_status(status: KeyStatus) -> Self {
        MonitorEvent::KeyStatus {
            timestamp: now(),
            status,
            message: status.message(),
        }
    }

    pub fn settings(settings: &Settings) -> Self {
        let mut settings = settings.clone();
        if settings.has_api_key() {
            settings.api_key = "***".to_string();
        }
        MonitorEvent::Settings {
            timestamp: now(),
            settings,
        }
    }

    pub fn message(text: &str) -> Self {
        MonitorEvent::Message {
            timestamp: now(),
            text: text.to_string(),
        }
    }
}

/// Emit a monitor event as a single JSON line to stdout.
pub fn report_event(event: &MonitorEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}
