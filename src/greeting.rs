use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const GREETING_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingRequest {
    pub name: String,
}

impl GreetingRequest {
    pub fn new(name: impl Into<String>) -> GreetingRequest {
        GreetingRequest { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingResponse {
    pub message: String,
}

impl GreetingResponse {
    pub fn compose(name: &str, at: DateTime<Utc>) -> GreetingResponse {
        GreetingResponse {
            message: format!(
                "Hello, {} @ {}",
                name,
                at.to_rfc3339_opts(SecondsFormat::Micros, true)
            ),
        }
    }
}

/// Produces never-ending greeting sequences, one message per interval, until the sequence is
/// cancelled or its consumer goes away.
#[derive(Clone)]
pub struct GreetingService {
    interval: Duration,
    active: Arc<AtomicUsize>,
}

impl GreetingService {
    pub fn new(interval: Duration) -> GreetingService {
        GreetingService {
            interval,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of greeting producers currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts a producer for `request` and returns its output as a stream.
    pub fn greet(
        &self,
        request: GreetingRequest,
        token: CancellationToken,
    ) -> ReceiverStream<GreetingResponse> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(self.clone().produce(request, tx, token));
        ReceiverStream::new(rx)
    }

    /// Sends a greeting to `tx` after every interval. The first greeting goes out one interval
    /// after the call. Returns once `token` is cancelled or the receiving side is dropped.
    pub async fn produce(
        self,
        request: GreetingRequest,
        tx: mpsc::Sender<GreetingResponse>,
        token: CancellationToken,
    ) {
        let _active = ActiveGuard::new(self.active.clone());

        let mut ticks = time::interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(name = %request.name, "Greeting stream cancelled");
                    return;
                }
                _ = ticks.tick() => {}
            }

            let response = GreetingResponse::compose(&request.name, Utc::now());

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(name = %request.name, "Greeting stream cancelled");
                    return;
                }
                sent = tx.send(response) => {
                    if sent.is_err() {
                        debug!(name = %request.name, "Greeting receiver dropped");
                        return;
                    }
                }
            }
        }
    }
}

impl Default for GreetingService {
    fn default() -> Self {
        Self::new(GREETING_INTERVAL)
    }
}

struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> ActiveGuard {
        active.fetch_add(1, Ordering::SeqCst);
        ActiveGuard { active }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
