// Session context: who is logged in, per access token.
// Read-mostly; entries are refreshed from GET /user/me when stale or on demand.

use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use cached::{Cached, TimedSizedCache};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    backend::{BackendClient, BackendError},
    error::AppError,
    models::User,
};

// The only claim read from a backend-issued token without its signing key.
#[derive(Debug, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub exp: Option<u64>,
}

/// Reads the token's claims and rejects it when already expired.
///
/// The backend owns signature verification; this only saves a round trip
/// for tokens that cannot succeed. Tokens that are not JWTs pass through
/// as `Ok(None)` and are left to the backend.
pub fn inspect_token(token: &str) -> Result<Option<TokenClaims>, AppError> {
    let raw = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    let header = match decode_header(raw) {
        Ok(header) => header,
        Err(_) => return Ok(None),
    };

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match decode::<TokenClaims>(raw, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Ok(Some(data.claims)),
        Err(e) => match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                warn!("Rejecting expired session token.");
                Err(AppError::Unauthorized("Token expired".into()))
            }
            _ => {
                warn!("Session token claims unreadable: {}", e);
                Err(AppError::Unauthorized("Invalid token".into()))
            }
        },
    }
}

// Upper bound on cached sessions; the oldest entry goes first when full
const MAX_SESSIONS: usize = 10_000;

pub struct SessionStore {
    backend: Arc<BackendClient>,
    entries: Mutex<TimedSizedCache<String, User>>,
}

impl SessionStore {
    pub fn new(backend: Arc<BackendClient>, max_age: Duration) -> Self {
        SessionStore {
            backend,
            entries: Mutex::new(TimedSizedCache::with_size_and_lifespan(
                MAX_SESSIONS,
                max_age.as_secs().max(1),
            )),
        }
    }

    /// The user behind `token`, from cache while fresh.
    pub async fn current_user(&self, token: &str) -> Result<User, AppError> {
        let cached = self.entries.lock().await.cache_get(token).cloned();
        if let Some(user) = cached {
            debug!("Using cached session for {}", user.email);
            return Ok(user);
        }

        self.refresh(token).await
    }

    /// Re-reads the user from the backend and replaces the cached entry.
    pub async fn refresh(&self, token: &str) -> Result<User, AppError> {
        if let Err(e) = inspect_token(token) {
            self.forget(token).await;
            return Err(e);
        }

        let user = self.backend.current_user(token).await.map_err(|e| match e.status() {
            Some(status) if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN => {
                AppError::Unauthorized(e.user_message())
            }
            _ => AppError::Backend(e),
        });

        let user = match user {
            Ok(user) => user,
            Err(e) => {
                self.forget(token).await;
                return Err(e);
            }
        };

        let mut entries = self.entries.lock().await;
        // Expired sessions of other tokens go on every write
        entries.flush();
        entries.cache_set(token.to_string(), user.clone());
        info!(
            "Session refreshed for {} ({}); {} cached",
            user.email,
            user.role.as_str(),
            entries.cache_size()
        );
        Ok(user)
    }

    pub async fn forget(&self, token: &str) {
        if self.entries.lock().await.cache_remove(token).is_some() {
            debug!("Session entry dropped.");
        }
    }
}

// Treat an unauthorized backend answer as "not logged in" for page requests.
pub fn is_session_error(error: &AppError) -> bool {
    match error {
        AppError::Unauthorized(_) | AppError::LoginRequired => true,
        AppError::Backend(BackendError::Status { status, .. }) => *status == reqwest::StatusCode::UNAUTHORIZED,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_with_exp(exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({"email": "a@example.com", "role": "admin", "exp": exp}),
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap()
    }

    fn user_body() -> serde_json::Value {
        json!({
            "success": true, "message": "ok",
            "data": {"_id": "u1", "name": "Rahim", "email": "rahim@example.com", "role": "user"}
        })
    }

    #[test]
    fn inspect_reads_claims_of_foreign_signed_token() {
        let token = token_with_exp(chrono::Utc::now().timestamp() + 3600);
        let claims = inspect_token(&token).unwrap().unwrap();
        assert!(claims.exp.is_some());

        let bearer = format!("Bearer {}", token);
        assert!(inspect_token(&bearer).unwrap().is_some());
    }

    #[test]
    fn inspect_rejects_expired_and_passes_opaque() {
        let expired = token_with_exp(chrono::Utc::now().timestamp() - 3600);
        assert!(matches!(inspect_token(&expired), Err(AppError::Unauthorized(_))));
        assert!(inspect_token("opaque-session-id").unwrap().is_none());
    }

    #[tokio::test]
    async fn current_user_is_cached_until_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/me"))
            .and(header("authorization", "opaque"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .expect(2)
            .mount(&server)
            .await;

        let backend = Arc::new(BackendClient::new(Arc::new(Client::new()), server.uri()));
        let store = SessionStore::new(backend, Duration::from_secs(60));

        let first = store.current_user("opaque").await.unwrap();
        let second = store.current_user("opaque").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::User);

        store.refresh("opaque").await.unwrap();
        // MockServer verifies the expected call count on drop
    }

    #[tokio::test]
    async fn unauthorized_backend_answer_becomes_session_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false, "message": "You are not authorized", "data": null
            })))
            .mount(&server)
            .await;

        let backend = Arc::new(BackendClient::new(Arc::new(Client::new()), server.uri()));
        let store = SessionStore::new(backend, Duration::from_secs(60));

        let err = store.current_user("stale").await.unwrap_err();
        assert!(is_session_error(&err));
    }

    #[tokio::test]
    async fn expired_sessions_are_evicted_on_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .mount(&server)
            .await;

        let backend = Arc::new(BackendClient::new(Arc::new(Client::new()), server.uri()));
        let store = SessionStore::new(backend, Duration::from_secs(1));

        store.refresh("abandoned").await.unwrap();
        assert_eq!(store.entries.lock().await.cache_size(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        store.refresh("fresh").await.unwrap();

        let mut entries = store.entries.lock().await;
        assert_eq!(entries.cache_size(), 1);
        assert!(entries.cache_get("abandoned").is_none());
        assert!(entries.cache_get("fresh").is_some());
    }
}
