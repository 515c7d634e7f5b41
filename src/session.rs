//! The authenticated session: credential, decoded claims, auto-logout timer
//! and the return path replayed after login.
//!
//! Lifecycle: Anonymous → Authenticating → Authenticated → Anonymous. Every way
//! out of Authenticated (logout, timer, 401, expired or malformed credential)
//! goes through the same teardown, so the paths converge on one cleared state.

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::claims::{strip_bearer, ClaimMapping};
use crate::errors::ClientError;
use crate::gateway::Gateway;
use crate::notices::{echo, Notice, NoticeLevel};
use crate::options::{ClientOptions, Landing};
use crate::router::Navigator;
use crate::storage::CredentialStore;
use crate::structs::user::{Claims, ROLE_ADMIN, ROLE_SUPER_ADMIN};
use crate::timer::{Clock, TimerId, TimerQueue};
use crate::transport::ApiRequest;

/// Fields of a JSON login response that may hold the token.
const TOKEN_FIELDS: &[&str] = &["token", "access_token", "accessToken", "jwt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    /// A login request is in flight.
    Authenticating,
    Authenticated,
}

/// Why the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    LoggedOut,
    /// Expiry reached, either by the timer or by a local check.
    Expired,
    /// The server answered 401.
    Rejected,
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    AutoLogout,
}

/// Auth endpoint settings taken from the client options.
#[derive(Debug, Clone)]
struct AuthSettings {
    path: String,
    login_field: String,
    password_field: String,
    login_path: String,
    landing: Landing,
}

#[derive(Debug)]
pub struct Session {
    mapping: ClaimMapping,
    auth: AuthSettings,
    debug: bool,

    store: Box<dyn CredentialStore>,
    clock: Box<dyn Clock>,
    navigator: Box<dyn Navigator>,

    token: Option<String>,
    claims: Option<Claims>,
    return_url: Option<String>,
    logout_timer: Option<TimerId>,
    timers: TimerQueue<TimerAction>,
    state: SessionState,
    end_reason: Option<EndReason>,
    notices: Vec<Notice>,
}

impl Session {
    /// Restores the session from `store` and arms the auto-logout timer.
    /// An expired or malformed stored credential is removed and the session starts anonymous.
    pub fn new(
        options: &ClientOptions,
        store: Box<dyn CredentialStore>,
        clock: Box<dyn Clock>,
        navigator: Box<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let mut session = Self {
            mapping: options.claims.clone(),
            auth: AuthSettings {
                path: options.auth_path.clone(),
                login_field: options.login_field.clone(),
                password_field: options.password_field.clone(),
                login_path: options.login_path.clone(),
                landing: options.landing.clone(),
            },
            debug: options.debug,
            store,
            clock,
            navigator,
            token: None,
            claims: None,
            return_url: None,
            logout_timer: None,
            timers: TimerQueue::new(),
            state: SessionState::Anonymous,
            end_reason: None,
            notices: Vec::new(),
        };

        session.restore()?;
        session.init_auto_logout();

        Ok(session)
    }

    fn restore(&mut self) -> Result<(), ClientError> {
        let Some(raw) = self.store.load()? else {
            return Ok(());
        };

        let token = strip_bearer(&raw).to_string();

        match self.mapping.decode(&token) {
            Ok(claims) if !claims.is_expired_at(self.now()) => {
                debug!(user_id = ?claims.user_id, expires = claims.expires, "restored session");
                self.token = Some(token);
                self.claims = Some(claims);
                self.state = SessionState::Authenticated;
            }
            Ok(claims) => {
                info!(expires = claims.expires, "stored credential expired, clearing");
                self.store.clear()?;
                self.end_reason = Some(EndReason::Expired);
            }
            Err(_) => {
                warn!("stored credential is malformed, clearing");
                self.store.clear()?;
                self.end_reason = Some(EndReason::Malformed);
            }
        }

        Ok(())
    }

    /// Logs in against the auth endpoint.
    ///
    /// On success the credential is persisted, the auto-logout timer is re-armed and
    /// the user is sent to the recorded return path, or to the landing path of their role.
    /// A failure leaves an existing session untouched, except when the server hands
    /// out a token that cannot be used.
    pub fn login(
        &mut self,
        gateway: &Gateway,
        identifier: &str,
        secret: &str,
    ) -> Result<&Claims, ClientError> {
        let previous = self.state;
        self.state = SessionState::Authenticating;

        let mut body = Map::new();
        body.insert(self.auth.login_field.clone(), json!(identifier));
        body.insert(self.auth.password_field.clone(), json!(secret));

        let request = ApiRequest::post(self.auth.path.clone())
            .json(Value::Object(body))
            .public();

        let response = match gateway.send(self, request) {
            Ok(response) => response,
            Err(err) => {
                self.state = previous;
                let err = classify_login_error(err);
                warn!(error = %err, "login failed");
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err);
            }
        };

        let token = match extract_token(&response.body) {
            Some(token) => token,
            None => {
                self.state = previous;
                warn!("login response carries no token");
                self.notify(NoticeLevel::Error, ClientError::FailedToDecode.to_string());
                return Err(ClientError::FailedToDecode);
            }
        };

        let claims = match self.mapping.decode(&token) {
            Ok(claims) if !claims.is_expired_at(self.now()) => claims,
            Ok(_) => {
                warn!("login returned an already expired token");
                return Err(self.refuse_token(EndReason::Expired, ClientError::CredentialExpired));
            }
            Err(err) => {
                warn!("login returned a malformed token");
                return Err(self.refuse_token(EndReason::Malformed, err));
            }
        };

        if let Err(err) = self.store.save(&token) {
            self.state = previous;
            warn!(error = %err, "failed to persist credential");
            self.notify(NoticeLevel::Error, err.to_string());
            return Err(err);
        }

        info!(user_id = ?claims.user_id, expires = claims.expires, "logged in");

        let welcome = match claims.username.as_deref().or(claims.email.as_deref()) {
            Some(name) => format!("Login successful! Welcome, {}.", name),
            None => "Login successful!".to_string(),
        };

        let destination = match self.return_url.take() {
            Some(path) => path,
            None => self.auth.landing.for_roles(&claims.roles).to_string(),
        };

        self.token = Some(token);
        self.claims = Some(claims);
        self.state = SessionState::Authenticated;
        self.end_reason = None;

        self.notify(NoticeLevel::Success, welcome);
        self.init_auto_logout();
        self.navigate(&destination);

        self.claims.as_ref().ok_or(ClientError::MalformedCredential)
    }

    /// Ends the session and goes to the login view. Safe to call without a session.
    pub fn logout(&mut self) {
        self.end(EndReason::LoggedOut);
    }

    /// Arms the one-shot auto-logout timer for the current claims, replacing any
    /// previous one. Logs out right away if the claims already expired.
    pub fn init_auto_logout(&mut self) {
        let Some(claims) = &self.claims else {
            return;
        };

        if claims.is_expired_at(self.now()) {
            self.end(EndReason::Expired);
            return;
        }

        let deadline = claims.expires_at_millis();

        self.cancel_logout_timer();
        self.logout_timer = Some(self.timers.schedule_at(deadline, TimerAction::AutoLogout));

        debug!(
            in_secs = (deadline.saturating_sub(self.now())) / 1000,
            "auto-logout armed"
        );
    }

    /// Runs the timers that are due. Returns how many fired.
    pub fn poll_timers(&mut self) -> usize {
        let due = self.timers.take_due(self.now());
        let fired = due.len();

        for (id, action) in due {
            match action {
                TimerAction::AutoLogout if self.logout_timer == Some(id) => {
                    self.logout_timer = None;
                    info!("credential expired, logging out");
                    self.end(EndReason::Expired);
                }
                TimerAction::AutoLogout => debug!("stale auto-logout timer ignored"),
            }
        }

        fired
    }

    /// When the next timer is due, in milliseconds since the unix epoch.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Milliseconds until the auto-logout fires, if one is armed.
    pub fn time_until_logout(&self) -> Option<u64> {
        let deadline = self.timers.deadline(self.logout_timer?)?;
        Some(deadline.saturating_sub(self.now()))
    }

    /// Number of armed timers. At most one while a session is live.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn set_return_url(&mut self, path: impl Into<String>) {
        self.return_url = Some(path.into());
    }

    pub fn return_url(&self) -> Option<&str> {
        self.return_url.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.current_claims().is_some()
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Authenticated if !self.is_authenticated() => SessionState::Anonymous,
            state => state,
        }
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Claims of the live session, `None` once expired even if the timer has not fired yet.
    pub fn claims(&self) -> Option<&Claims> {
        self.current_claims()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.current_claims().map_or(false, |c| c.has_role(role))
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.current_claims().map_or(false, |c| c.has_any_role(roles))
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(&[ROLE_ADMIN, ROLE_SUPER_ADMIN])
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(ROLE_SUPER_ADMIN)
    }

    pub fn user_roles(&self) -> &[String] {
        self.current_claims()
            .map(|c| c.roles.as_slice())
            .unwrap_or(&[])
    }

    pub fn user_email(&self) -> Option<&str> {
        self.current_claims()?.email.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.current_claims()?.username.as_deref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.current_claims()?.user_id
    }

    pub fn client_id(&self) -> Option<i64> {
        self.current_claims()?.client_id
    }

    pub fn store_id(&self) -> Option<i64> {
        self.current_claims()?.store_id
    }

    pub fn language(&self) -> Option<&str> {
        self.current_claims()?.language.as_deref()
    }

    /// Expiry of the live session, in seconds since the unix epoch.
    pub fn expires_at(&self) -> Option<u64> {
        Some(self.current_claims()?.expires)
    }

    pub fn login_path(&self) -> &str {
        &self.auth.login_path
    }

    /// Current location of the navigator.
    pub fn location(&self) -> Option<&str> {
        self.navigator.current()
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub fn navigate(&mut self, path: &str) {
        debug!(path, "navigate");
        self.navigator.push(path);
    }

    /// Drains the notices queued for the user.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn stored_credential(&self) -> Result<Option<String>, ClientError> {
        self.store.load()
    }

    /// Returns the credential to attach to an outbound call.
    ///
    /// An expired or malformed stored credential ends the session before anything
    /// is sent, and the call fails.
    pub(crate) fn preflight(&mut self) -> Result<Option<String>, ClientError> {
        // Anonymous sessions never send what might still linger in the store
        if self.token.is_none() {
            return Ok(None);
        }

        let raw = match self.store.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(error = %err, "failed to read credential");
                return Err(err);
            }
        };

        let token = strip_bearer(&raw).to_string();

        match self.mapping.decode(&token) {
            Ok(claims) if !claims.is_expired_at(self.now()) => Ok(Some(token)),
            Ok(_) => {
                info!("credential expired, request not sent");
                self.end(EndReason::Expired);
                Err(ClientError::CredentialExpired)
            }
            Err(err) => {
                warn!("credential is malformed, request not sent");
                self.end(EndReason::Malformed);
                Err(err)
            }
        }
    }

    /// The server refused the credential.
    pub(crate) fn reject(&mut self) {
        warn!("server rejected the credential");
        self.end(EndReason::Rejected);
    }

    /// A token handed out by login that cannot be used. Any live session ends, and
    /// the failure is reported even when there was none.
    fn refuse_token(&mut self, reason: EndReason, err: ClientError) -> ClientError {
        if !self.end(reason) {
            self.end_reason = Some(reason);
            self.notify(NoticeLevel::Error, err.to_string());
        }
        err
    }

    /// Tears the session down. Returns whether there was one. Without a session only
    /// the store is cleared and the login view shown.
    fn end(&mut self, reason: EndReason) -> bool {
        let had_session = self.token.is_some() || self.claims.is_some();

        if had_session {
            self.return_url = None;
        }

        self.token = None;
        self.claims = None;
        self.cancel_logout_timer();
        self.state = SessionState::Anonymous;

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear credential");
        }

        match reason {
            _ if !had_session => {}
            EndReason::LoggedOut => {
                info!("logged out");
                self.notify(NoticeLevel::Info, "Logged out.");
            }
            EndReason::Expired => {
                self.notify(NoticeLevel::Error, ClientError::CredentialExpired.to_string())
            }
            EndReason::Rejected => {
                self.notify(NoticeLevel::Error, ClientError::Unauthorized.to_string())
            }
            EndReason::Malformed => {
                self.notify(NoticeLevel::Error, ClientError::MalformedCredential.to_string())
            }
        }

        if had_session {
            self.end_reason = Some(reason);
        }

        let login = self.auth.login_path.clone();
        self.navigate(&login);

        had_session
    }

    fn cancel_logout_timer(&mut self) {
        if let Some(id) = self.logout_timer.take() {
            self.timers.cancel(id);
        }
    }

    fn current_claims(&self) -> Option<&Claims> {
        self.claims
            .as_ref()
            .filter(|c| !c.is_expired_at(self.now()))
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    pub(crate) fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice::new(level, message);

        if self.debug {
            echo("AUTH", &notice);
        }

        self.notices.push(notice);
    }
}

/// Maps a failed auth call onto the login taxonomy.
fn classify_login_error(err: ClientError) -> ClientError {
    match err {
        ClientError::Rejected { status: 401, .. } => ClientError::InvalidCredentials,
        ClientError::Rejected { status: 403, .. } => ClientError::AccountForbidden,
        other => other,
    }
}

/// Reads the token out of a login response: a JSON object, a JSON string or raw text.
fn extract_token(body: &str) -> Option<String> {
    let token = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => TOKEN_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::to_string),
        Ok(Value::String(token)) => Some(token),
        Ok(_) => None,
        Err(_) => Some(body.to_string()),
    }?;

    let token = strip_bearer(&token);
    (!token.is_empty() && token.contains('.')).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::forge_token;
    use crate::router::History;
    use crate::storage::MemoryStore;
    use crate::timer::ManualClock;

    const NOW: u64 = 1_700_000_000;

    fn session_with(stored: Option<String>, clock: &ManualClock) -> Session {
        let store = match stored {
            Some(token) => MemoryStore::with_token(token),
            None => MemoryStore::new(),
        };

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

    fn token(exp: u64, roles: &[&str]) -> String {
        forge_token(&json!({ "exp": exp, "roles": roles, "username": "marie", "id": 9 }))
    }

    #[test]
    fn extracts_tokens_from_every_response_shape() {
        let jwt = token(NOW, &[]);

        assert_eq!(extract_token(&format!(r#"{{"token":"{jwt}"}}"#)), Some(jwt.clone()));
        assert_eq!(extract_token(&format!(r#"{{"access_token":"{jwt}"}}"#)), Some(jwt.clone()));
        assert_eq!(extract_token(&format!(r#""{jwt}""#)), Some(jwt.clone()));
        assert_eq!(extract_token(&format!("Bearer {jwt}\n")), Some(jwt.clone()));
        assert_eq!(extract_token(r#"{"message":"ok"}"#), None);
        assert_eq!(extract_token(""), None);
    }

    #[test]
    fn login_errors_are_classified_by_status() {
        let rejected = |status| ClientError::Rejected {
            status,
            message: String::new(),
        };

        assert_eq!(classify_login_error(rejected(401)), ClientError::InvalidCredentials);
        assert_eq!(classify_login_error(rejected(403)), ClientError::AccountForbidden);
        assert_eq!(classify_login_error(rejected(500)), rejected(500));
        assert_eq!(
            classify_login_error(ClientError::Network("refused".into())),
            ClientError::Network("refused".into())
        );
    }

    #[test]
    fn restores_a_valid_stored_session() {
        let clock = ManualClock::at_secs(NOW);
        let session = session_with(Some(token(NOW + 600, &["ROLE_ADMIN"])), &clock);

        assert!(session.is_authenticated());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.is_admin());
        assert!(!session.is_super_admin());
        assert_eq!(session.username(), Some("marie"));
        assert_eq!(session.user_id(), Some(9));
        assert_eq!(session.pending_timers(), 1);
        assert_eq!(session.time_until_logout(), Some(600_000));
    }

    #[test]
    fn malformed_stored_credential_is_cleared() {
        let clock = ManualClock::at_secs(NOW);
        let session = session_with(Some("garbage".to_string()), &clock);

        assert!(!session.is_authenticated());
        assert_eq!(session.stored_credential(), Ok(None));
        assert_eq!(session.end_reason(), Some(EndReason::Malformed));
        assert_eq!(session.pending_timers(), 0);
    }

    #[test]
    fn timer_logs_out_at_expiry() {
        let clock = ManualClock::at_secs(NOW);
        let mut session = session_with(Some(token(NOW + 60, &[])), &clock);

        clock.advance_secs(59);
        assert_eq!(session.poll_timers(), 0);
        assert!(session.is_authenticated());

        clock.advance_secs(1);
        assert!(!session.is_authenticated());
        assert_eq!(session.poll_timers(), 1);

        assert_eq!(session.end_reason(), Some(EndReason::Expired));
        assert_eq!(session.location(), Some("/login"));
        assert_eq!(session.stored_credential(), Ok(None));
        assert_eq!(session.pending_timers(), 0);
    }

    #[test]
    fn logout_is_idempotent() {
        let clock = ManualClock::at_secs(NOW);
        let mut session = session_with(Some(token(NOW + 60, &[])), &clock);
        session.set_return_url("/profile");

        session.logout();
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);

        session.logout();
        assert!(session.take_notices().is_empty());
        assert_eq!(session.end_reason(), Some(EndReason::LoggedOut));
        assert_eq!(session.return_url(), None);
        assert_eq!(session.pending_timers(), 0);
        assert_eq!(session.location(), Some("/login"));
    }

    #[test]
    fn logout_without_session_keeps_the_return_path() {
        let clock = ManualClock::at_secs(NOW);
        let mut session = session_with(None, &clock);
        session.set_return_url("/basket");

        session.logout();

        assert_eq!(session.return_url(), Some("/basket"));
        assert_eq!(session.end_reason(), None);
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn rejection_without_session_reports_nothing() {
        let clock = ManualClock::at_secs(NOW);
        let mut session = session_with(None, &clock);

        session.reject();

        assert_eq!(session.end_reason(), None);
        assert!(session.take_notices().is_empty());
        assert_eq!(session.location(), Some("/login"));
    }

    #[test]
    fn role_queries_without_session() {
        let clock = ManualClock::at_secs(NOW);
        let session = session_with(None, &clock);

        assert!(!session.has_role("ROLE_USER"));
        assert!(!session.has_any_role(&["ROLE_USER", ROLE_ADMIN]));
        assert!(!session.is_admin());
        assert!(session.user_roles().is_empty());
        assert_eq!(session.user_email(), None);
        assert_eq!(session.expires_at(), None);
    }

    #[test]
    fn init_auto_logout_rearms_once() {
        let clock = ManualClock::at_secs(NOW);
        let mut session = session_with(Some(token(NOW + 60, &[])), &clock);

        session.init_auto_logout();
        session.init_auto_logout();

        assert_eq!(session.pending_timers(), 1);
    }
}
