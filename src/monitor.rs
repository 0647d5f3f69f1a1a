use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::command::{Command, HELP};
use crate::notifier::{Dispatch, Notifier, test_alert};
use crate::poller::{Poller, Response, ResultsSource};
use crate::presentation::{Bell, DesktopNotifier, Permission, Presenter};
use crate::render::render;
use crate::settings::{KeyValueStore, SettingsStore};
use crate::state::{AppState, Update};
use crate::toast::ToastBoard;

pub type BoxedNotifier = Notifier<Box<dyn Bell>, Box<dyn DesktopNotifier>>;

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    pub toast_refresh: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Everything the loop mutates, kept apart from the response channel so the
/// select loop can borrow both.
struct Core<S, K> {
    state: AppState,
    poller: Poller<S>,
    toasts: ToastBoard,
    notifier: BoxedNotifier,
    presenter: Box<dyn Presenter>,
    store: SettingsStore<K>,
}

/// The dashboard loop: polls, applies outcomes, raises alerts and handles
/// user commands on a single task.
pub struct Monitor<S, K> {
    core: Core<S, K>,
    responses: mpsc::UnboundedReceiver<Response>,
    options: MonitorOptions,
}

impl<S: ResultsSource, K: KeyValueStore> Monitor<S, K> {
    pub fn new(
        state: AppState,
        poller: (Poller<S>, mpsc::UnboundedReceiver<Response>),
        notifier: BoxedNotifier,
        presenter: Box<dyn Presenter>,
        store: SettingsStore<K>,
        options: MonitorOptions,
    ) -> Self {
        let (poller, responses) = poller;
        Self {
            core: Core {
                state,
                poller,
                toasts: ToastBoard::new(),
                notifier,
                presenter,
                store,
            },
            responses,
            options,
        }
    }

    /// Run until Ctrl+C or a `quit` command.
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<()> {
        let Monitor {
            mut core,
            mut responses,
            options,
        } = self;

        info!(
            "Entering polling loop (interval: {}s). Press Ctrl+C to stop.",
            options.poll_interval.as_secs()
        );
        core.start();

        let start = Instant::now();
        let mut poll = time::interval_at(start + options.poll_interval, options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = time::interval_at(start + options.toast_refresh, options.toast_refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                Some(response) = responses.recv() => {
                    core.handle_response(response);
                }
                _ = poll.tick() => {
                    core.tick();
                }
                _ = refresh.tick() => {
                    core.refresh_toasts();
                }
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => {
                        if core.handle_command(cmd) == Flow::Quit {
                            info!("Quit requested");
                            break;
                        }
                    }
                    None => {
                        debug!("Command input closed");
                        commands_open = false;
                    }
                },
            }
        }

        core.poller.stop();
        Ok(())
    }
}

impl<S: ResultsSource, K: KeyValueStore> Core<S, K> {
    fn start(&mut self) {
        self.presenter.key_status(self.state.key_status());
        let key = self.state.settings.api_key.clone();
        self.poller.start_session(&key);
    }

    fn tick(&mut self) {
        let key = self.state.settings.api_key.clone();
        self.poller.tick(&key);
    }

    fn handle_response(&mut self, response: Response) {
        if !self.poller.accept(&response) {
            return;
        }
        debug!(
            "Applying {} response (seq {})",
            response.outcome.label(),
            response.ticket.seq
        );
        let update = self.state.apply(response.outcome);
        self.apply_update(update);
    }

    fn apply_update(&mut self, update: Update) {
        if let Some(status) = &update.status {
            self.presenter.status(status);
        }
        if let Some(snapshot) = &update.render {
            self.presenter.lists(&render(snapshot));
        }
        if let Some(alert) = &update.alert {
            let dispatch = self
                .notifier
                .fire(alert, &self.state.settings, &mut self.toasts);
            self.show_dispatched(dispatch);
        }
        if let Some(notice) = update.notice {
            self.toasts.push(notice);
            self.show_latest_toast();
        }
        if let Some(key_status) = update.key_status {
            self.presenter.key_status(key_status);
        }
        if update.halt {
            self.poller.halt();
            self.presenter
                .message("Polling stopped: the key is in use elsewhere. Set the key again to reconnect.");
        }
    }

    fn show_dispatched(&mut self, dispatch: Dispatch) {
        debug!(
            "Alert #{} dispatched (bell: {}, desktop: {})",
            dispatch.toast_id, dispatch.rang, dispatch.desktop
        );
        if let Some(toast) = self.toasts.get(dispatch.toast_id) {
            self.presenter.toast(toast);
        }
    }

    fn show_latest_toast(&mut self) {
        if let Some(toast) = self.toasts.latest() {
            self.presenter.toast(toast);
        }
    }

    fn refresh_toasts(&mut self) {
        if self.toasts.refresh(std::time::Instant::now()) {
            self.presenter.toasts(self.toasts.toasts());
        }
    }

    fn save_settings(&mut self) {
        if let Err(e) = self.store.save(&self.state.settings) {
            warn!("Failed to save settings: {e:#}");
        }
    }

    fn handle_command(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Notifications(on) => {
                self.state.settings.notifications = on;
                let desktop = self.notifier.desktop();
                if on
                    && desktop.permission() != Permission::Granted
                    && desktop.request_permission() != Permission::Granted
                {
                    self.presenter
                        .message("Desktop notifications are not available on this system");
                }
                self.settings_changed();
            }
            Command::Sound(on) => {
                self.state.settings.sound = on;
                self.settings_changed();
            }
            Command::Volume(volume) => {
                self.state.settings.set_volume(volume);
                self.settings_changed();
            }
            Command::Direction(direction) => {
                self.state.settings.direction = direction;
                self.settings_changed();
            }
            Command::Key(raw) => {
                let changed = self.state.reconfigure_key(&raw);
                self.save_settings();
                info!(
                    "Access key {}, restarting polling",
                    if changed { "changed" } else { "re-saved" }
                );
                self.presenter.key_status(self.state.key_status());
                let key = self.state.settings.api_key.clone();
                self.poller.start_session(&key);
            }
            Command::Test => {
                let alert = test_alert();
                let dispatch = self
                    .notifier
                    .fire_test(&alert, &self.state.settings, &mut self.toasts);
                self.show_dispatched(dispatch);
            }
            Command::Dismiss(id) => {
                if self.toasts.dismiss(id) {
                    self.presenter.message(&format!("Dismissed alert #{id}"));
                } else {
                    self.presenter.message(&format!("No alert #{id}"));
                }
            }
            Command::Clear => {
                self.toasts.clear();
                self.presenter.message("Alerts cleared");
            }
            Command::Alerts => {
                if self.toasts.is_empty() {
                    self.presenter.message("No alerts");
                } else {
                    self.toasts.refresh(std::time::Instant::now());
                    self.presenter.toasts(self.toasts.toasts());
                }
            }
            Command::Settings => {
                self.presenter.settings(&self.state.settings);
                self.presenter.key_status(self.state.key_status());
            }
            Command::Help => self.presenter.message(HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn settings_changed(&mut self) {
        self.save_settings();
        self.presenter.settings(&self.state.settings);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::api::interpret;
    use crate::presentation::NoDesktop;
    use crate::render::Section;
    use crate::settings::{MemoryStore, Settings};
    use crate::toast::Toast;
    use crate::types::{KeyStatus, PollOutcome, StatusLine};

    #[derive(Clone, Default)]
    struct QueueSource {
        outcomes: Arc<Mutex<VecDeque<PollOutcome>>>,
        urls: Arc<Mutex<Vec<Url>>>,
    }

    impl QueueSource {
        fn push(&self, outcome: PollOutcome) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }
    }

    impl ResultsSource for QueueSource {
        fn fetch(&self, url: Url) -> impl Future<Output = PollOutcome> + Send {
            self.urls.lock().unwrap().push(url);
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PollOutcome::Waiting);
            async move { outcome }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Status(String),
        Lists(usize),
        Toast(String, Vec<String>),
        KeyStatus(KeyStatus),
        Settings,
        Message(String),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Shown>>>);

    impl Recorder {
        fn take(&self) -> Vec<Shown> {
            std::mem::take(&mut *self.0.borrow_mut())
        }

        fn toasts(&self) -> Vec<(String, Vec<String>)> {
            self.0
                .borrow()
                .iter()
                .filter_map(|s| match s {
                    Shown::Toast(t, l) => Some((t.clone(), l.clone())),
                    _ => None,
                })
                .collect()
        }
    }

    impl Presenter for Recorder {
        fn status(&mut self, status: &StatusLine) {
            self.0.borrow_mut().push(Shown::Status(status.text.clone()));
        }
        fn lists(&mut self, sections: &[Section]) {
            self.0.borrow_mut().push(Shown::Lists(sections.len()));
        }
        fn toast(&mut self, toast: &Toast) {
            self.0.borrow_mut().push(Shown::Toast(
                toast.alert.title.clone(),
                toast.alert.lines.iter().map(|l| l.text.clone()).collect(),
            ));
        }
        fn toasts(&mut self, _toasts: &[Toast]) {}
        fn key_status(&mut self, status: KeyStatus) {
            self.0.borrow_mut().push(Shown::KeyStatus(status));
        }
        fn settings(&mut self, _settings: &Settings) {
            self.0.borrow_mut().push(Shown::Settings);
        }
        fn message(&mut self, text: &str) {
            self.0.borrow_mut().push(Shown::Message(text.to_string()));
        }
    }

    struct SilentBell;

    impl Bell for SilentBell {
        fn ring(&self, _volume: f64) {}
    }

    fn success(bull: &[&str]) -> PollOutcome {
        let items: Vec<_> = bull
            .iter()
            .map(|n| json!({"name": n, "msg": "", "score": 1}))
            .collect();
        let body = json!({
            "status": "success",
            "type": "Free",
            "timestamp": "t",
            "data": {"bull": items, "bear": [], "neut": []}
        });
        interpret(reqwest::StatusCode::OK, &body.to_string())
    }

    fn conflict() -> PollOutcome {
        interpret(reqwest::StatusCode::CONFLICT, r#"{"detail": "taken"}"#)
    }

    fn monitor(source: QueueSource, recorder: Recorder) -> Monitor<QueueSource, MemoryStore> {
        let endpoint = Url::parse("https://example.test/api/results").unwrap();
        Monitor::new(
            AppState::new(Settings::default()),
            Poller::new(source, endpoint),
            Notifier::new(
                Box::new(SilentBell) as Box<dyn Bell>,
                Box::new(NoDesktop) as Box<dyn DesktopNotifier>,
            ),
            Box::new(recorder),
            SettingsStore::new(MemoryStore::default()),
            MonitorOptions {
                poll_interval: Duration::from_secs(10),
                toast_refresh: Duration::from_secs(60),
            },
        )
    }

    async fn next(m: &mut Monitor<QueueSource, MemoryStore>) {
        let response = m.responses.recv().await.unwrap();
        m.core.handle_response(response);
    }

    #[tokio::test]
    async fn first_poll_renders_without_alert() {
        let source = QueueSource::default();
        source.push(success(&["BTC", "ETH"]));
        let rec = Recorder::default();
        let mut m = monitor(source, rec.clone());

        m.core.start();
        next(&mut m).await;

        let shown = rec.take();
        assert!(shown.contains(&Shown::Lists(3)));
        assert!(shown.contains(&Shown::Status("Guest (30m delay) | updated: t".to_string())));
        assert!(!shown.iter().any(|s| matches!(s, Shown::Toast(..))));
    }

    #[tokio::test]
    async fn change_between_polls_raises_toast() {
        let source = QueueSource::default();
        source.push(success(&["BTC", "ETH"]));
        source.push(success(&["BTC", "SOL"]));
        let rec = Recorder::default();
        let mut m = monitor(source, rec.clone());

        m.core.start();
        next(&mut m).await;
        m.core.tick();
        next(&mut m).await;

        assert_eq!(
            rec.toasts(),
            vec![(
                "Market list changed".to_string(),
                vec![
                    "🚀 Bull added: SOL".to_string(),
                    "💨 Bull removed: ETH".to_string()
                ]
            )]
        );
        assert_eq!(m.core.toasts.len(), 1);
    }

    #[tokio::test]
    async fn conflict_halts_until_key_set() {
        let source = QueueSource::default();
        source.push(success(&["BTC", "ETH"]));
        source.push(conflict());
        source.push(success(&["BTC", "SOL"]));
        let rec = Recorder::default();
        let mut m = monitor(source.clone(), rec.clone());

        m.core.start();
        next(&mut m).await;
        m.core.tick();
        next(&mut m).await;

        assert!(m.core.poller.is_halted());
        assert_eq!(
            rec.toasts(),
            vec![("Connection refused".to_string(), vec!["taken".to_string()])]
        );
        m.core.tick();
        assert!(m.core.poller.in_flight().is_none());

        assert_eq!(m.core.handle_command(Command::Key("fresh".to_string())), Flow::Continue);
        next(&mut m).await;
        let toasts = rec.toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(
            toasts[1].1,
            vec![
                "🚀 Bull added: SOL".to_string(),
                "💨 Bull removed: ETH".to_string()
            ]
        );

        let urls = source.urls.lock().unwrap().clone();
        assert_eq!(urls.len(), 3);
        assert!(urls[2].query_pairs().any(|(k, v)| k == "claim" && v == "true"));
        assert!(urls[2].query_pairs().any(|(k, v)| k == "key" && v == "fresh"));
    }

    #[tokio::test]
    async fn settings_commands_persist() {
        let rec = Recorder::default();
        let mut m = monitor(QueueSource::default(), rec.clone());

        m.core.handle_command(Command::Sound(true));
        m.core.handle_command(Command::Volume(0.3));
        m.core.handle_command(Command::Direction(crate::types::Direction::Bear));

        let saved = m.core.store.load().unwrap();
        assert!(saved.sound);
        assert_eq!(saved.volume, 0.3);
        assert_eq!(saved.direction, crate::types::Direction::Bear);
        assert_eq!(
            rec.take().iter().filter(|s| **s == Shown::Settings).count(),
            3
        );
    }

    #[tokio::test]
    async fn notifications_without_permission_reports() {
        let rec = Recorder::default();
        let mut m = monitor(QueueSource::default(), rec.clone());
        m.core.handle_command(Command::Notifications(true));
        assert!(m.core.state.settings.notifications);
        assert!(
            rec.take()
                .contains(&Shown::Message("Desktop notifications are not available on this system".to_string()))
        );
    }

    #[tokio::test]
    async fn test_command_and_dismiss() {
        let rec = Recorder::default();
        let mut m = monitor(QueueSource::default(), rec.clone());
        m.core.handle_command(Command::Test);
        assert_eq!(rec.toasts()[0].0, "Test notification");

        let id = m.core.toasts.latest().unwrap().id;
        m.core.handle_command(Command::Dismiss(id));
        assert!(m.core.toasts.is_empty());
        assert_eq!(m.core.handle_command(Command::Quit), Flow::Quit);
    }
}
