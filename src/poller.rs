use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

use crate::api;
use crate::types::PollOutcome;

/// Something that can answer a results request.
pub trait ResultsSource: Clone + Send + Sync + 'static {
    fn fetch(&self, url: Url) -> impl Future<Output = PollOutcome> + Send;
}

/// The real endpoint, over HTTP.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ResultsSource for HttpSource {
    fn fetch(&self, url: Url) -> impl Future<Output = PollOutcome> + Send {
        let client = self.client.clone();
        async move { api::fetch_results(&client, url).await }
    }
}

/// Identifies one request: the session it belongs to and its order within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
}

/// Accepts a response only if it belongs to the current session and is newer
/// than every response applied so far.
#[derive(Debug, Default)]
pub struct SequenceGate {
    epoch: u64,
    next_seq: u64,
    last_applied: Option<u64>,
}

impl SequenceGate {
    pub fn issue(&mut self) -> Ticket {
        self.next_seq += 1;
        Ticket {
            epoch: self.epoch,
            seq: self.next_seq,
        }
    }

    /// Begin a new session; tickets from earlier sessions become stale.
    pub fn new_epoch(&mut self) {
        self.epoch += 1;
        self.last_applied = None;
    }

    pub fn accept(&mut self, ticket: Ticket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        if self.last_applied.is_some_and(|last| ticket.seq <= last) {
            return false;
        }
        self.last_applied = Some(ticket.seq);
        true
    }
}

/// A finished request.
#[derive(Debug)]
pub struct Response {
    pub ticket: Ticket,
    pub outcome: PollOutcome,
}

struct InFlight {
    ticket: Ticket,
    handle: JoinHandle<()>,
}

/// Single-flight scheduler for results requests.
///
/// The owner drives it: `start_session` on startup and whenever the key is
/// reconfigured, `tick` on every interval, `accept` for each [`Response`]
/// read from the channel returned by [`Poller::new`].
pub struct Poller<S> {
    source: S,
    endpoint: Url,
    gate: SequenceGate,
    claim_pending: bool,
    halted: bool,
    in_flight: Option<InFlight>,
    tx: mpsc::UnboundedSender<Response>,
}

impl<S: ResultsSource> Poller<S> {
    pub fn new(source: S, endpoint: Url) -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = Self {
            source,
            endpoint,
            gate: SequenceGate::default(),
            claim_pending: false,
            halted: true,
            in_flight: None,
            tx,
        };
        (poller, rx)
    }

    /// Start a fresh session: cancel any outstanding request, arm the claim
    /// flag, resume scheduling and poll immediately.
    pub fn start_session(&mut self, api_key: &str) -> Option<Ticket> {
        self.cancel_in_flight();
        self.gate.new_epoch();
        self.claim_pending = true;
        self.halted = false;
        info!("Polling session started (claim armed)");
        self.poll(api_key)
    }

    /// Scheduled poll. Skipped while halted or while a request is outstanding.
    pub fn tick(&mut self, api_key: &str) -> Option<Ticket> {
        if self.halted {
            debug!("Polling halted, skipping tick");
            return None;
        }
        if let Some(f) = &self.in_flight {
            debug!("Request {} still in flight, skipping tick", f.ticket.seq);
            return None;
        }
        self.poll(api_key)
    }

    /// Stop scheduling until the next `start_session`.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Halt and cancel any outstanding request.
    pub fn stop(&mut self) {
        self.halted = true;
        self.cancel_in_flight();
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight.as_ref().map(|f| f.ticket)
    }

    /// Record that `response` arrived and decide whether it may be applied.
    pub fn accept(&mut self, response: &Response) -> bool {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.ticket == response.ticket)
        {
            self.in_flight = None;
        }
        let fresh = self.gate.accept(response.ticket);
        if !fresh {
            debug!(
                "Discarding stale response (epoch {}, seq {})",
                response.ticket.epoch, response.ticket.seq
            );
        }
        fresh
    }

    fn poll(&mut self, api_key: &str) -> Option<Ticket> {
        let ticket = self.gate.issue();
        let claim = std::mem::take(&mut self.claim_pending);
        let url = api::build_url(
            &self.endpoint,
            api_key,
            claim,
            chrono::Utc::now().timestamp_millis(),
        );

        let source = self.source.clone();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = source.fetch(url).await;
            let _ = tx.send(Response { ticket, outcome });
        });
        self.in_flight = Some(InFlight { ticket, handle });
        Some(ticket)
    }

    fn cancel_in_flight(&mut self) {
        if let Some(f) = self.in_flight.take() {
            debug!("Cancelling in-flight request {}", f.ticket.seq);
            f.handle.abort();
        }
    }
}

impl<S> Drop for Poller<S> {
    fn drop(&mut self) {
        if let Some(f) = self.in_flight.take() {
            f.handle.abort();
        }
    }
}
