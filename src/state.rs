use tracing::{info, warn};

use crate::diff::{Baseline, compute_changes};
use crate::notifier::{Alert, build_alert, conflict_alert};
use crate::settings::Settings;
use crate::types::{
    AccountTier, KeyStatus, PollFailure, PollOutcome, Snapshot, StatusLight, StatusLine,
    SuccessPayload,
};

/// What the runtime must do after applying a poll outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub status: Option<StatusLine>,
    /// Snapshot to redraw.
    pub render: Option<Snapshot>,
    /// Membership change alert: bell, toast and desktop.
    pub alert: Option<Alert>,
    /// Informational toast only.
    pub notice: Option<Alert>,
    pub key_status: Option<KeyStatus>,
    /// Stop scheduling polls until the key is reconfigured.
    pub halt: bool,
}

/// Session state owned by the monitor loop.
///
/// Mutated only through `apply` and the settings methods; the baseline is
/// replaced as a whole after a success, never patched.
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    baseline: Option<Baseline>,
    key_status: KeyStatus,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let key_status = key_status_for(&settings);
        Self {
            settings,
            baseline: None,
            key_status,
        }
    }

    /// True until the first success of the session establishes a baseline.
    pub fn is_first_load(&self) -> bool {
        self.baseline.is_none()
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn key_status(&self) -> KeyStatus {
        self.key_status
    }

    /// Apply one accepted poll outcome.
    pub fn apply(&mut self, outcome: PollOutcome) -> Update {
        let status = Some(status_for(&outcome));
        match outcome {
            PollOutcome::Success(payload) => self.apply_success(payload, status),
            PollOutcome::Waiting => Update {
                status,
                ..Update::default()
            },
            PollOutcome::Error(failure) => {
                match &failure {
                    PollFailure::Network(e) => warn!("Poll failed: {e}"),
                    PollFailure::Server(e) => warn!("Server error: {e}"),
                }
                Update {
                    status,
                    ..Update::default()
                }
            }
            PollOutcome::Conflict { detail } => {
                warn!("Key conflict: {detail}");
                let notice = (!self.is_first_load()).then(|| conflict_alert(&detail));
                Update {
                    status,
                    notice,
                    halt: true,
                    ..Update::default()
                }
            }
        }
    }

    fn apply_success(&mut self, payload: SuccessPayload, status: Option<StatusLine>) -> Update {
        let alert = match &self.baseline {
            None => {
                info!("Baseline established, notifications armed");
                None
            }
            Some(baseline) => {
                let changes = compute_changes(baseline, &payload.data, self.settings.direction);
                build_alert(&changes)
            }
        };
        self.baseline = Some(Baseline::from_snapshot(&payload.data));

        let key_status = if payload.error.is_some() {
            warn!(
                "Server rejected the access key: {}",
                payload.error.as_deref().unwrap_or_default()
            );
            self.key_status = KeyStatus::Invalid;
            Some(KeyStatus::Invalid)
        } else {
            None
        };

        Update {
            status,
            render: Some(payload.data),
            alert,
            key_status,
            ..Update::default()
        }
    }

    /// Store an access key; the caller must start a new polling session.
    /// Returns whether the stored key changed.
    pub fn reconfigure_key(&mut self, raw: &str) -> bool {
        let changed = self.settings.set_api_key(raw);
        self.key_status = key_status_for(&self.settings);
        changed
    }
}

fn key_status_for(settings: &Settings) -> KeyStatus {
    if settings.has_api_key() {
        KeyStatus::Verifying
    } else {
        KeyStatus::Free
    }
}

/// Status display for an outcome.
pub fn status_for(outcome: &PollOutcome) -> StatusLine {
    let (text, light) = match outcome {
        PollOutcome::Success(p) => match p.tier {
            AccountTier::Premium => (
                format!(
                    "👑 VIP ({}) | updated: {}",
                    p.user.as_deref().unwrap_or("-"),
                    p.timestamp
                ),
                StatusLight::Gold,
            ),
            AccountTier::Free => (
                format!("Guest (30m delay) | updated: {}", p.timestamp),
                StatusLight::Green,
            ),
        },
        PollOutcome::Waiting => ("Server is computing...".to_string(), StatusLight::Orange),
        PollOutcome::Error(PollFailure::Server(_)) => {
            ("Server error".to_string(), StatusLight::Red)
        }
        PollOutcome::Error(PollFailure::Network(_)) => {
            ("Unable to connect".to_string(), StatusLight::Red)
        }
        PollOutcome::Conflict { .. } => {
            ("Key conflict across devices".to_string(), StatusLight::Red)
        }
    };
    StatusLine { text, light }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertKind, Direction, Item};

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
            msg: String::new(),
            score: 1.0,
            time_on_board: None,
        }
    }

    fn success(bull: &[&str], bear: &[&str], neut: &[&str]) -> PollOutcome {
        PollOutcome::Success(SuccessPayload {
            user: Some("u".to_string()),
            tier: AccountTier::Free,
            timestamp: "now".to_string(),
            data: Snapshot {
                bull: bull.iter().map(|n| item(n)).collect(),
                bear: bear.iter().map(|n| item(n)).collect(),
                neut: neut.iter().map(|n| item(n)).collect(),
            },
            error: None,
        })
    }

    fn state(direction: Direction) -> AppState {
        AppState::new(Settings {
            direction,
            ..Settings::default()
        })
    }

    fn conflict() -> PollOutcome {
        PollOutcome::Conflict {
            detail: "busy".to_string(),
        }
    }

    // ── first load ─────────────────────────────────────────────────

    #[test]
    fn first_success_never_alerts() {
        let mut s = state(Direction::All);
        assert!(s.is_first_load());
        let u = s.apply(success(&["BTC", "ETH"], &["XRP"], &[]));
        assert!(u.alert.is_none());
        assert!(u.render.is_some());
        assert!(!s.is_first_load());
        assert_eq!(s.baseline().unwrap().bull, vec!["BTC", "ETH"]);
    }

    #[test]
    fn second_success_alerts_on_change() {
        let mut s = state(Direction::All);
        s.apply(success(&["BTC", "ETH"], &[], &[]));
        let u = s.apply(success(&["BTC", "SOL"], &[], &[]));
        let alert = u.alert.unwrap();
        assert_eq!(alert.kind, AlertKind::Bull);
        assert_eq!(alert.lines[0].text, "🚀 Bull added: SOL");
        assert_eq!(alert.lines[1].text, "💨 Bull removed: ETH");
    }

    #[test]
    fn unchanged_lists_do_not_alert() {
        let mut s = state(Direction::All);
        s.apply(success(&["A"], &["B"], &["C"]));
        let u = s.apply(success(&["A"], &["B"], &["D"]));
        assert!(u.alert.is_none());
    }

    #[test]
    fn no_duplicate_alert_for_same_change() {
        let mut s = state(Direction::All);
        s.apply(success(&["A"], &[], &[]));
        assert!(s.apply(success(&["A", "B"], &[], &[])).alert.is_some());
        assert!(s.apply(success(&["A", "B"], &[], &[])).alert.is_none());
    }

    // ── direction filter ───────────────────────────────────────────

    #[test]
    fn bull_filter_ignores_bear_and_neut() {
        let mut s = state(Direction::Bull);
        s.apply(success(&["A"], &["B"], &["C"]));
        let u = s.apply(success(&["A"], &["Z"], &["Y"]));
        assert!(u.alert.is_none());
    }

    #[test]
    fn unwatched_category_still_rebaselined() {
        let mut s = state(Direction::Bull);
        s.apply(success(&["A"], &["B"], &[]));
        s.apply(success(&["A"], &["Z"], &[]));
        assert_eq!(s.baseline().unwrap().bear, vec!["Z"]);

        s.settings.direction = Direction::All;
        let u = s.apply(success(&["A"], &["Z"], &[]));
        assert!(u.alert.is_none());
    }

    #[test]
    fn mixed_when_both_watched_change() {
        let mut s = state(Direction::All);
        s.apply(success(&["A"], &["B"], &[]));
        let u = s.apply(success(&["C"], &["D"], &[]));
        assert_eq!(u.alert.unwrap().kind, AlertKind::Mixed);
    }

    // ── non-success outcomes ───────────────────────────────────────

    #[test]
    fn failures_leave_baseline_untouched() {
        let mut s = state(Direction::All);
        s.apply(success(&["BTC"], &[], &[]));
        let before = s.baseline().cloned();
        for outcome in [
            PollOutcome::Waiting,
            PollOutcome::Error(PollFailure::Network("down".to_string())),
            PollOutcome::Error(PollFailure::Server("bad".to_string())),
        ] {
            let u = s.apply(outcome);
            assert!(u.render.is_none());
            assert!(u.alert.is_none());
            assert!(!u.halt);
        }
        assert_eq!(s.baseline().cloned(), before);
    }

    #[test]
    fn failure_before_first_success_keeps_first_load() {
        let mut s = state(Direction::All);
        s.apply(PollOutcome::Waiting);
        assert!(s.is_first_load());
        let u = s.apply(success(&["A"], &[], &[]));
        assert!(u.alert.is_none());
    }

    #[test]
    fn conflict_halts_and_keeps_baseline() {
        let mut s = state(Direction::All);
        s.apply(success(&["BTC", "ETH"], &[], &[]));
        let u = s.apply(conflict());
        assert!(u.halt);
        assert!(u.render.is_none());
        assert_eq!(u.notice.unwrap().kind, AlertKind::Bear);
        assert_eq!(s.baseline().unwrap().bull, vec!["BTC", "ETH"]);

        assert!(s.reconfigure_key("other-key"));
        let u = s.apply(success(&["BTC", "SOL"], &[], &[]));
        let alert = u.alert.unwrap();
        assert_eq!(alert.lines.len(), 2);
        assert_eq!(alert.lines[0].text, "🚀 Bull added: SOL");
        assert_eq!(alert.lines[1].text, "💨 Bull removed: ETH");
    }

    #[test]
    fn conflict_on_first_load_has_no_toast() {
        let mut s = state(Direction::All);
        let u = s.apply(conflict());
        assert!(u.halt);
        assert!(u.notice.is_none());
        assert_eq!(u.status.unwrap().text, "Key conflict across devices");
    }

    #[test]
    fn invalid_key_flags_degraded_mode() {
        let mut s = AppState::new(Settings::default());
        s.reconfigure_key("bad");
        assert_eq!(s.key_status(), KeyStatus::Verifying);
        let PollOutcome::Success(mut p) = success(&[], &[], &[]) else {
            unreachable!()
        };
        p.error = Some("invalid key".to_string());
        let u = s.apply(PollOutcome::Success(p));
        assert_eq!(u.key_status, Some(KeyStatus::Invalid));
        assert_eq!(s.key_status(), KeyStatus::Invalid);
        assert!(u.render.is_some());
    }

    #[test]
    fn reconfigure_same_key_is_noop() {
        let mut s = AppState::new(Settings::default());
        assert!(!s.reconfigure_key("  "));
        assert_eq!(s.key_status(), KeyStatus::Free);
        assert!(s.reconfigure_key(" k "));
        assert_eq!(s.settings.api_key, "k");
        assert!(!s.reconfigure_key("k"));
    }

    // ── status_for ─────────────────────────────────────────────────

    #[test]
    fn status_texts() {
        let PollOutcome::Success(mut p) = success(&[], &[], &[]) else {
            unreachable!()
        };
        assert_eq!(
            status_for(&PollOutcome::Success(p.clone())),
            StatusLine {
                text: "Guest (30m delay) | updated: now".to_string(),
                light: StatusLight::Green,
            }
        );
        p.tier = AccountTier::Premium;
        let vip = status_for(&PollOutcome::Success(p));
        assert_eq!(vip.text, "👑 VIP (u) | updated: now");
        assert_eq!(vip.light, StatusLight::Gold);
        assert_eq!(status_for(&PollOutcome::Waiting).light, StatusLight::Orange);
        assert_eq!(
            status_for(&PollOutcome::Error(PollFailure::Network(String::new()))).text,
            "Unable to connect"
        );
        assert_eq!(
            status_for(&PollOutcome::Error(PollFailure::Server(String::new()))).text,
            "Server error"
        );
    }
}
