//! Every outbound call goes through [`Gateway::send`].
//!
//! Before dispatch the stored credential is checked locally: an expired or
//! malformed one ends the session and the call is never sent. After dispatch a
//! 401 on an authenticated call ends the session the same way.

use std::fmt;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::options::AuthHeader;
use crate::session::Session;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub struct Gateway {
    transport: Box<dyn Transport>,
    auth_header: AuthHeader,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("auth_header", &self.auth_header)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(transport: Box<dyn Transport>, auth_header: AuthHeader) -> Self {
        Self {
            transport,
            auth_header,
        }
    }

    /// Sends `request` on behalf of `session`.
    ///
    /// Returns the response for 2xx statuses only. Transport failures come back as
    /// `Network` and leave the session alone.
    pub fn send(
        &self,
        session: &mut Session,
        mut request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        if !request.public {
            if let Some(token) = session.preflight()? {
                request.headers.push(self.auth_header.render(&token));
            }
        }

        debug!(method = %request.method, path = %request.path, "dispatch");

        let response = self.transport.send(&request).map_err(|err| {
            warn!(path = %request.path, error = %err, "request failed");
            err
        })?;

        if response.status == StatusCode::UNAUTHORIZED && !request.public {
            session.reject();
            return Err(ClientError::Unauthorized);
        }

        if !response.status.is_success() {
            debug!(path = %request.path, status = %response.status, "request refused");
            return Err(ClientError::from_status(response.status));
        }

        Ok(response)
    }

    /// Sends `request` and decodes the JSON body.
    pub fn send_json<T: DeserializeOwned>(
        &self,
        session: &mut Session,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        self.send(session, request)?.json()
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        session: &mut Session,
        path: &str,
    ) -> Result<T, ClientError> {
        self.send_json(session, ApiRequest::get(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::forge_token;
    use crate::options::ClientOptions;
    use crate::router::History;
    use crate::session::EndReason;
    use crate::storage::{CredentialStore, MemoryStore};
    use crate::timer::ManualClock;
    use crate::transport::MockTransport;
    use serde_json::{json, Value};

    const NOW: u64 = 1_700_000_000;

    fn session(stored: Option<String>, clock: &ManualClock) -> Session {
        let store = stored.map_or_else(MemoryStore::new, MemoryStore::with_token);

        match Session::new(
            &ClientOptions::new("https://api.example.com"),
            Box::new(store),
            Box::new(clock.clone()),
            Box::new(History::new()),
        ) {
            Ok(session) => session,
            Err(err) => panic!("session should build: {err}"),
        }
    }

    #[test]
    fn attaches_bearer_header() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 60 }));
        let mut session = session(Some(token.clone()), &clock);

        let expected = format!("Bearer {token}");
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(move |r| r.header("Authorization") == Some(expected.as_str()))
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(r#"{"ok":true}"#)));

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);
        let body: Result<Value, _> = gateway.get_json(&mut session, "/api/basket");

        assert_eq!(body, Ok(json!({ "ok": true })));
    }

    #[test]
    fn raw_header_for_legacy_backends() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 60 }));
        let mut session = session(Some(token.clone()), &clock);

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(move |r| {
                r.header("x-auth-token") == Some(token.as_str()) && r.header("Authorization").is_none()
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::ok("{}")));

        let gateway = Gateway::new(
            Box::new(transport),
            AuthHeader::Raw("x-auth-token".to_string()),
        );

        assert!(gateway.send(&mut session, ApiRequest::get("/api/recipes")).is_ok());
    }

    #[test]
    fn expired_credential_is_never_dispatched() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 10 }));
        let mut session = session(Some(token), &clock);

        // Expire without letting the timer run
        clock.advance_secs(11);

        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);
        let result = gateway.send(&mut session, ApiRequest::get("/api/basket"));

        assert_eq!(result, Err(ClientError::CredentialExpired));
        assert!(!session.is_authenticated());
        assert_eq!(session.stored_credential(), Ok(None));
        assert_eq!(session.location(), Some("/login"));
        assert_eq!(session.end_reason(), Some(EndReason::Expired));
        assert_eq!(session.pending_timers(), 0);
        assert!(!session.take_notices().is_empty());
    }

    #[test]
    fn unauthorized_response_ends_the_session() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 3600 }));
        let mut session = session(Some(token), &clock);

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "")));

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);
        let result = gateway.send(&mut session, ApiRequest::delete("/api/ingredients/4"));

        assert_eq!(result, Err(ClientError::Unauthorized));
        assert!(!session.is_authenticated());
        assert_eq!(session.stored_credential(), Ok(None));
        assert_eq!(session.location(), Some("/login"));
        assert_eq!(session.end_reason(), Some(EndReason::Rejected));
    }

    #[test]
    fn network_failure_leaves_the_session_alone() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 3600 }));
        let mut session = session(Some(token), &clock);

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(ClientError::Network("connection refused".to_string())));

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);
        let result = gateway.send(&mut session, ApiRequest::get("/api/basket"));

        assert_eq!(result, Err(ClientError::Network("connection refused".to_string())));
        assert!(session.is_authenticated());
        assert_eq!(session.location(), None);
    }

    #[test]
    fn domain_errors_keep_the_session() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 3600 }));
        let mut session = session(Some(token), &clock);

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(ApiResponse::new(StatusCode::CONFLICT, "duplicate")));

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);
        let result = gateway.send(&mut session, ApiRequest::post("/api/users"));

        assert!(matches!(result, Err(ClientError::Rejected { status: 409, .. })));
        assert!(session.is_authenticated());
    }

    /// A store whose credential cannot be removed, like a read-only token file.
    #[derive(Debug)]
    struct StuckStore(String);

    impl CredentialStore for StuckStore {
        fn load(&self) -> Result<Option<String>, ClientError> {
            Ok(Some(self.0.clone()))
        }

        fn save(&mut self, token: &str) -> Result<(), ClientError> {
            self.0 = token.to_string();
            Ok(())
        }

        fn clear(&mut self) -> Result<(), ClientError> {
            Err(ClientError::Storage("read-only".to_string()))
        }
    }

    #[test]
    fn stale_stored_credential_is_not_sent_after_logout() {
        let clock = ManualClock::at_secs(NOW);
        let token = forge_token(&json!({ "exp": NOW + 3600 }));
        let mut session = match Session::new(
            &ClientOptions::new("https://api.example.com"),
            Box::new(StuckStore(token)),
            Box::new(clock.clone()),
            Box::new(History::new()),
        ) {
            Ok(session) => session,
            Err(err) => panic!("session should build: {err}"),
        };

        session.logout();
        assert!(!session.is_authenticated());

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.header("Authorization").is_none())
            .times(1)
            .returning(|_| Ok(ApiResponse::ok("[]")));

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);

        assert!(gateway.send(&mut session, ApiRequest::get("/api/cocktails")).is_ok());
    }

    #[test]
    fn anonymous_calls_go_out_without_header() {
        let clock = ManualClock::at_secs(NOW);
        let mut session = session(None, &clock);

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|r| r.headers.is_empty())
            .times(1)
            .returning(|_| Ok(ApiResponse::ok("[]")));

        let gateway = Gateway::new(Box::new(transport), AuthHeader::Bearer);

        assert!(gateway.send(&mut session, ApiRequest::get("/api/cocktails")).is_ok());
    }
}
