//! Sensor readings served by the dashboard backend.
//!
//! Every fetch goes through `AuthService::get_json`, so a revoked session
//! discovered here ends the local session like any other authorized call.

pub mod models;
pub mod poller;

use std::sync::Arc;

use tracing::debug;

use crate::api::{AuthError, AuthService};

pub use models::{History, LatestReading, Trend, HISTORY_WINDOW};
pub use poller::{PollUpdate, Poller, PollerHandle, DEFAULT_POLL_INTERVAL_SECS};

const LATEST_PATH: &str = "/api/latest";
const HISTORY_PATH: &str = "/api/history";

#[derive(Debug, Clone)]
pub struct ReadingsClient {
    auth: Arc<AuthService>,
}

impl ReadingsClient {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub async fn latest(&self) -> Result<LatestReading, AuthError> {
        let reading: LatestReading = self.auth.get_json(LATEST_PATH).await?;
        debug!(temperature = reading.temperature, "Fetched latest reading");
        Ok(reading)
    }

    /// Recent history, trimmed to the last `HISTORY_WINDOW` points
    pub async fn history(&self) -> Result<History, AuthError> {
        let history: History = self.auth.get_json(HISTORY_PATH).await?;
        debug!(points = history.count(), "Fetched reading history");
        Ok(history.last(HISTORY_WINDOW))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::service_for;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_history_is_windowed() {
        let server = MockServer::start().await;
        let timestamps: Vec<String> = (0..24).map(|h| format!("2024-06-01T{:02}:00", h)).collect();
        let temperatures: Vec<f64> = (0..24_i32).map(|h| 15.0 + f64::from(h) / 2.0).collect();
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .and(header("authorization", "Bearer a.b.c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timestamps": timestamps,
                "temperatures": temperatures,
                "count": 24
            })))
            .mount(&server)
            .await;

        let auth = service_for(&server);
        auth.token_store().set_token("a.b.c").unwrap();
        let history = ReadingsClient::new(Arc::new(auth)).history().await.unwrap();

        assert_eq!(history.count(), HISTORY_WINDOW);
        assert_eq!(history.timestamps[0], "2024-06-01T14:00");
    }

    #[tokio::test]
    async fn test_latest_surfaces_session_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LATEST_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = service_for(&server);
        auth.token_store().set_token("a.b.c").unwrap();
        let client = ReadingsClient::new(Arc::new(auth));

        assert!(matches!(client.latest().await, Err(AuthError::SessionExpired)));
        assert_eq!(client.auth().token_store().get_token(), None);
    }
}
