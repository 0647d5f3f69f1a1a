pub mod api;
pub mod command;
pub mod config;
pub mod diff;
pub mod monitor;
pub mod notifier;
pub mod poller;
pub mod presentation;
pub mod render;
pub mod reporter;
pub mod settings;
pub mod state;
pub mod toast;
pub mod types;

/// Market-signal results endpoint (served through an ngrok tunnel).
pub const DEFAULT_API_URL: &str = "https://tunefully-abstemious-shu.ngrok-free.dev/api/results";

/// Header that makes ngrok skip its browser interstitial page.
pub const SKIP_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

/// Environment variable overriding the configured endpoint.
pub const API_URL_ENV: &str = "KYNETIC_API_URL";

/// Key under which the serialized settings live in the key-value store.
pub const SETTINGS_KEY: &str = "cryptoMonitorSettings";

/// Title of desktop notifications.
pub const DESKTOP_TITLE: &str = "Kynetic Alert";
