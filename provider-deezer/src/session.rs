//! # Session Manager
//!
//! Holds the gateway session (session id, license token, API token) and
//! performs the `deezer.ping` → `deezer.getUserData` handshake on first use.
//!
//! ## Lifecycle
//!
//! - Empty at construction
//! - Populated lazily by [`SessionManager::ensure_session`]
//! - Reused until [`SessionManager::clear`] is called; nothing expires on a
//!   timer, a rejected downstream call is the only expiry signal
//!
//! The handshake runs while the state lock is held, so concurrent first-use
//! callers wait for one handshake instead of each performing their own.

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{DeezerError, Result};
use crate::types::{GatewayEnvelope, GatewayMethod, PingResults, UserDataResults};

/// Private gateway endpoint
pub const GATEWAY_URL: &str = "https://www.deezer.com/ajax/gw-light.php";

/// Default timeout for gateway calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Cached gateway credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: String,
    pub license_token: String,
    pub api_token: String,
    /// Whether the account may request 320 kbps encodings
    pub high_quality_eligible: bool,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("session_id", &"[REDACTED]")
            .field("license_token", &"[REDACTED]")
            .field("api_token", &"[REDACTED]")
            .field("high_quality_eligible", &self.high_quality_eligible)
            .finish()
    }
}

/// Lazily negotiated, single-flight gateway session.
pub struct SessionManager {
    http_client: Arc<dyn HttpClient>,
    /// ARL cookie, sent on `getUserData` only
    elevated_credential: Option<String>,
    state: Mutex<Option<SessionState>>,
    event_bus: Option<EventBus>,
    request_timeout: Duration,
}

impl SessionManager {
    pub fn new(http_client: Arc<dyn HttpClient>, elevated_credential: Option<String>) -> Self {
        Self {
            http_client,
            elevated_credential,
            state: Mutex::new(None),
            event_bus: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Publish session lifecycle events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Return the cached session, performing the handshake if there is none.
    ///
    /// # Errors
    ///
    /// [`DeezerError::Handshake`] if either handshake call fails. Nothing is
    /// cached in that case and the next call starts over.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self) -> Result<SessionState> {
        let mut guard = self.state.lock().await;

        if let Some(state) = guard.as_ref() {
            debug!("Reusing cached session");
            return Ok(state.clone());
        }

        self.emit(SessionEvent::Establishing);

        match self.handshake().await {
            Ok(state) => {
                info!(
                    high_quality_eligible = state.high_quality_eligible,
                    elevated = self.elevated_credential.is_some(),
                    "Session established"
                );
                self.emit(SessionEvent::Established {
                    high_quality_eligible: state.high_quality_eligible,
                });
                *guard = Some(state.clone());
                Ok(state)
            }
            Err(e) => {
                warn!(error = %e, "Session handshake failed");
                if let DeezerError::Handshake { step, message } = &e {
                    self.emit(SessionEvent::HandshakeFailed {
                        step: step.clone(),
                        message: message.clone(),
                    });
                }
                Err(e)
            }
        }
    }

    /// Whether a session is currently cached.
    pub async fn is_established(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Drop the cached session. Returns `true` if one was cached.
    pub async fn clear(&self) -> bool {
        self.invalidate("cleared by caller").await
    }

    /// Drop the cached session after a downstream rejection.
    pub(crate) async fn invalidate(&self, reason: &str) -> bool {
        let dropped = self.state.lock().await.take().is_some();
        if dropped {
            info!(reason, "Session invalidated");
            self.emit(SessionEvent::Invalidated {
                reason: reason.to_string(),
            });
        }
        dropped
    }

    /// Build a gateway request authenticated with `state`.
    pub fn build_authenticated_request(
        &self,
        method: GatewayMethod,
        state: &SessionState,
    ) -> HttpRequest {
        self.gateway_request(method, &state.api_token, Some(&state.session_id))
    }

    fn gateway_request(
        &self,
        method: GatewayMethod,
        api_token: &str,
        session_id: Option<&str>,
    ) -> HttpRequest {
        let mut url = format!(
            "{}?method={}&input=3&api_version=1.0&api_token={}",
            GATEWAY_URL,
            method.as_str(),
            api_token
        );
        if let Some(sid) = session_id {
            url.push_str("&sid=");
            url.push_str(sid);
        }

        HttpRequest::post(url)
            .header("Content-Type", "application/json; charset=UTF-8")
            .timeout(self.request_timeout)
    }

    async fn handshake(&self) -> Result<SessionState> {
        let ping: PingResults = self
            .handshake_call(GatewayMethod::Ping, self.gateway_request(GatewayMethod::Ping, "", None))
            .await?;
        debug!("Gateway ping succeeded");

        let mut request = self.gateway_request(GatewayMethod::GetUserData, "", Some(&ping.session));
        if let Some(arl) = &self.elevated_credential {
            request = request.cookie("arl", arl);
        }

        let user: UserDataResults = self
            .handshake_call(GatewayMethod::GetUserData, request)
            .await?;

        Ok(SessionState {
            session_id: ping.session,
            high_quality_eligible: user.user.options.high_quality_eligible(),
            license_token: user.user.options.license_token,
            api_token: user.check_form,
        })
    }

    async fn handshake_call<T: DeserializeOwned>(
        &self,
        method: GatewayMethod,
        request: HttpRequest,
    ) -> Result<T> {
        let handshake_error = |message: String| DeezerError::Handshake {
            step: method.as_str().to_string(),
            message,
        };

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| handshake_error(e.to_string()))?;

        gateway_results(&response).map_err(handshake_error)
    }

    pub(crate) fn http_client(&self) -> &Arc<dyn HttpClient> {
        &self.http_client
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Session(event));
        }
    }
}

/// Unwrap a gateway envelope, turning error payloads and bad statuses into a
/// message.
pub(crate) fn gateway_results<T: DeserializeOwned>(
    response: &HttpResponse,
) -> std::result::Result<T, String> {
    if !response.is_success() {
        return Err(format!("HTTP {}", response.status));
    }

    let envelope: GatewayEnvelope<T> = response.json().map_err(|e| e.to_string())?;
    if let Some(message) = envelope.error_message() {
        return Err(message);
    }
    envelope
        .results
        .ok_or_else(|| "response carried no results".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::ByteSource;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, url: String) -> BridgeResult<ByteSource>;
        }
    }

    fn json_response(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    const PING: &str = r#"{"error":[],"results":{"SESSION":"sid-1"}}"#;
    const USER_DATA: &str = r#"{"error":[],"results":{"USER":{"OPTIONS":{"license_token":"lic-1","web_hq":true}},"checkForm":"api-1"}}"#;

    fn handshake_mock() -> MockHttpClient {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("method=deezer.ping"))
            .times(1)
            .returning(|_| Ok(json_response(PING)));
        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("method=deezer.getUserData"))
            .times(1)
            .returning(|req| {
                assert!(req.url.contains("sid=sid-1"));
                assert_eq!(req.headers.get("Cookie").map(String::as_str), Some("arl=secret"));
                Ok(json_response(USER_DATA))
            });
        mock_http
    }

    #[tokio::test]
    async fn test_handshake_populates_state() {
        let manager = SessionManager::new(Arc::new(handshake_mock()), Some("secret".to_string()));

        let state = manager.ensure_session().await.unwrap();

        assert_eq!(state.session_id, "sid-1");
        assert_eq!(state.license_token, "lic-1");
        assert_eq!(state.api_token, "api-1");
        assert!(state.high_quality_eligible);
    }

    #[tokio::test]
    async fn test_cached_session_skips_handshake() {
        let manager = SessionManager::new(Arc::new(handshake_mock()), Some("secret".to_string()));

        let first = manager.ensure_session().await.unwrap();
        let second = manager.ensure_session().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ping_failure_is_handshake_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection refused".to_string())));

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let manager = SessionManager::new(Arc::new(mock_http), None).with_event_bus(bus);

        let err = manager.ensure_session().await.unwrap_err();
        match err {
            DeezerError::Handshake { step, .. } => assert_eq!(step, "deezer.ping"),
            other => panic!("expected handshake error, got {:?}", other),
        }
        assert!(!manager.is_established().await);

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::Establishing)
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::HandshakeFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_gateway_error_payload_fails_handshake() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("method=deezer.ping"))
            .times(1)
            .returning(|_| Ok(json_response(PING)));
        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("method=deezer.getUserData"))
            .times(1)
            .returning(|_| {
            Ok(json_response(
                r#"{"error":{"GATEWAY_ERROR":"invalid session"},"results":{}}"#,
            ))
        });

        let manager = SessionManager::new(Arc::new(mock_http), None);
        let err = manager.ensure_session().await.unwrap_err();

        assert!(err.is_licensing());
        assert!(err.to_string().contains("GATEWAY_ERROR: invalid session"));
    }

    #[tokio::test]
    async fn test_clear_forces_new_handshake() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("method=deezer.ping"))
            .times(2)
            .returning(|_| Ok(json_response(PING)));
        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("method=deezer.getUserData"))
            .times(2)
            .returning(|req| {
                assert!(!req.headers.contains_key("Cookie"));
                Ok(json_response(USER_DATA))
            });

        let manager = SessionManager::new(Arc::new(mock_http), None);
        manager.ensure_session().await.unwrap();

        assert!(manager.clear().await);
        assert!(!manager.clear().await);
        manager.ensure_session().await.unwrap();
    }

    #[test]
    fn test_authenticated_request_carries_tokens() {
        let manager = SessionManager::new(Arc::new(MockHttpClient::new()), None);
        let state = SessionState {
            session_id: "sid-9".to_string(),
            license_token: "lic".to_string(),
            api_token: "api-9".to_string(),
            high_quality_eligible: false,
        };

        let request = manager.build_authenticated_request(GatewayMethod::SongGetData, &state);

        assert_eq!(
            request.url,
            "https://www.deezer.com/ajax/gw-light.php?method=song.getData&input=3&api_version=1.0&api_token=api-9&sid=sid-9"
        );
        assert_eq!(request.timeout, Some(DEFAULT_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let state = SessionState {
            session_id: "sid".to_string(),
            license_token: "license-secret".to_string(),
            api_token: "api-secret".to_string(),
            high_quality_eligible: true,
        };
        let debug = format!("{:?}", state);
        assert!(!debug.contains("license-secret"));
        assert!(!debug.contains("api-secret"));
    }
}
