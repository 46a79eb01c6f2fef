//! Timer-driven refresh of the latest reading and the recent history.
//!
//! Results travel back over an mpsc channel. The poller keeps running
//! regardless of session state; a 401 surfaces as
//! `PollUpdate::SessionExpired` while the session context flips through
//! its own event subscription.

use std::time::Duration;

use futures::future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::AuthError;

use super::models::{History, LatestReading, Trend};
use super::ReadingsClient;

/// Default refresh period in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Updates sent from the polling task.
#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    Latest { reading: LatestReading, trend: Trend },
    History(History),
    /// An authorized fetch came back 401
    SessionExpired,
    Failed(String),
}

/// Handle to a running poller. Dropping it leaves the task running.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct Poller {
    client: ReadingsClient,
    interval: Duration,
}

impl Poller {
    /// A zero interval falls back to `DEFAULT_POLL_INTERVAL_SECS`.
    pub fn new(client: ReadingsClient, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        } else {
            interval
        };
        Self { client, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. The first round runs immediately.
    pub fn spawn(self, tx: mpsc::Sender<PollUpdate>) -> PollerHandle {
        let task = tokio::spawn(self.run(tx));
        PollerHandle { task }
    }

    async fn run(self, tx: mpsc::Sender<PollUpdate>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut previous: Option<f64> = None;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            let (latest, history) =
                future::join(self.client.latest(), self.client.history()).await;

            let mut updates = Vec::with_capacity(2);
            match latest {
                Ok(reading) => {
                    let trend = Trend::between(previous, reading.temperature);
                    previous = Some(reading.temperature);
                    updates.push(PollUpdate::Latest { reading, trend });
                }
                Err(e) => updates.push(Self::failure(e)),
            }
            match history {
                Ok(history) => updates.push(PollUpdate::History(history)),
                Err(e) => {
                    let update = Self::failure(e);
                    // One expiry notice per round is enough
                    if !(update == PollUpdate::SessionExpired
                        && updates.contains(&PollUpdate::SessionExpired))
                    {
                        updates.push(update);
                    }
                }
            }

            for update in updates {
                if tx.send(update).await.is_err() {
                    debug!("Poll receiver dropped, stopping");
                    return;
                }
            }
        }
        debug!("Poller stopped");
    }

    fn failure(e: AuthError) -> PollUpdate {
        match e {
            AuthError::SessionExpired => PollUpdate::SessionExpired,
            other => {
                warn!(error = %other, "Poll fetch failed");
                PollUpdate::Failed(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::service_for;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WAIT: Duration = Duration::from_secs(5);

    async fn next(rx: &mut mpsc::Receiver<PollUpdate>) -> PollUpdate {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for poll update")
            .expect("poller hung up")
    }

    #[tokio::test]
    async fn test_poller_reports_readings_with_trend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "temperature": 22.5,
                "time": "2024-06-01T12:00"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timestamps": ["11:00", "12:00"],
                "temperatures": [21.0, 22.5]
            })))
            .mount(&server)
            .await;

        let client = ReadingsClient::new(Arc::new(service_for(&server)));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = Poller::new(client, Duration::from_millis(50)).spawn(tx);

        let mut trends = Vec::new();
        let mut saw_history = false;
        while trends.len() < 2 {
            match next(&mut rx).await {
                PollUpdate::Latest { trend, reading } => {
                    assert_eq!(reading.temperature, 22.5);
                    trends.push(trend);
                }
                PollUpdate::History(history) => {
                    assert_eq!(history.count(), 2);
                    saw_history = true;
                }
                other => panic!("unexpected update {:?}", other),
            }
        }

        assert!(saw_history);
        assert_eq!(trends, vec![Trend::Up, Trend::Stable]);
        handle.stop();
    }

    #[tokio::test]
    async fn test_poller_reports_session_expiry_once_per_round() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = service_for(&server);
        auth.token_store().set_token("a.b.c").unwrap();
        let client = ReadingsClient::new(Arc::new(auth));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = Poller::new(client.clone(), Duration::from_secs(3600)).spawn(tx);

        assert_eq!(next(&mut rx).await, PollUpdate::SessionExpired);
        // Next round is an hour away, so nothing else arrives
        assert!(
            tokio::time::timeout(Duration::from_millis(200), rx.recv())
                .await
                .is_err()
        );
        assert_eq!(client.auth().token_store().get_token(), None);
        handle.stop();
    }

    #[tokio::test]
    async fn test_zero_interval_uses_default_and_still_polls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temperature": 18.0 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = ReadingsClient::new(Arc::new(service_for(&server)));
        let poller = Poller::new(client, Duration::ZERO);
        assert_eq!(
            poller.interval(),
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );

        let (tx, mut rx) = mpsc::channel(8);
        let handle = poller.spawn(tx);
        assert!(matches!(
            next(&mut rx).await,
            PollUpdate::Latest { .. } | PollUpdate::History(_)
        ));
        assert!(!handle.is_finished());
        handle.stop();
    }

    #[tokio::test]
    async fn test_poller_stops_when_receiver_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ReadingsClient::new(Arc::new(service_for(&server)));
        let (tx, mut rx) = mpsc::channel(1);
        let handle = Poller::new(client, Duration::from_millis(20)).spawn(tx);

        assert!(matches!(next(&mut rx).await, PollUpdate::Failed(_)));
        drop(rx);

        tokio::time::timeout(WAIT, async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("poller should stop after the receiver is dropped");
    }
}
