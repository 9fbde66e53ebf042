//! The auth gate. An [`AuthStore`] is constructed explicitly and handed to
//! whoever needs it; its state only changes through the methods below.

use std::sync::Arc;

use tokio::sync::watch;

use super::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::api::Backend;
use crate::error::ApiError;
use crate::log::*;
use crate::model::{Credentials, Registration, User};

#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    /// True until the first status check has finished.
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
            error: None,
        }
    }

    fn anonymous(error: Option<String>) -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: false,
            error,
        }
    }

    fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct AuthStore {
    backend: Arc<dyn Backend>,
    tokens: Arc<dyn TokenStore>,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    /// A new store starts out loading; call [`AuthStore::check_auth_status`]
    /// to settle it.
    pub fn new(backend: Arc<dyn Backend>, tokens: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        Self {
            backend,
            tokens,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Validate the stored access token against the backend. A rejected
    /// token is removed along with its refresh token.
    #[tracing::instrument(skip(self))]
    pub async fn check_auth_status(&self) -> AuthState {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let next = match self.tokens.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(_)) => match self.backend.current_user().await {
                Ok(user) => {
                    info!("session restored for {}", user.username);
                    AuthState::authenticated(user)
                }
                Err(e) => {
                    warn!("stored token rejected: {e}");
                    self.clear_tokens().await;
                    AuthState::anonymous(None)
                }
            },
            Ok(None) => AuthState::anonymous(None),
            Err(e) => {
                error!("auth check failed: {e}");
                AuthState::anonymous(Some(e.to_string()))
            }
        };

        self.state.send_replace(next.clone());
        next
    }

    /// Exchange credentials for tokens, persist them and load the user.
    #[tracing::instrument(skip(self))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        let tokens = match self.backend.login(credentials).await {
            Ok(tokens) => tokens,
            Err(e) => {
                self.state.send_replace(AuthState::anonymous(Some(e.to_string())));
                return Err(e);
            }
        };
        self.tokens.set(ACCESS_TOKEN_KEY, &tokens.access).await?;
        self.tokens.set(REFRESH_TOKEN_KEY, &tokens.refresh).await?;

        match self.backend.current_user().await {
            Ok(user) => {
                info!("logged in as {}", user.username);
                self.state.send_replace(AuthState::authenticated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                self.clear_tokens().await;
                self.state.send_replace(AuthState::anonymous(Some(e.to_string())));
                Err(e)
            }
        }
    }

    /// Create an account. Does not log in.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, registration: &Registration) -> Result<User, ApiError> {
        registration.validate()?;
        self.backend.register(registration).await
    }

    /// Tell the backend (best effort), then always forget the local session.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        match self.tokens.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(refresh)) => {
                if let Err(e) = self.backend.logout(&refresh).await {
                    warn!("logout failed on backend, clearing local session anyway: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("couldn't read refresh token: {e}"),
        }
        self.clear_tokens().await;
        self.state.send_replace(AuthState::anonymous(None));
    }

    /// Wait for any in-flight status check, then hand back the user or
    /// refuse.
    pub async fn require_user(&self) -> Result<User, ApiError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| !s.is_loading)
            .await
            .map_err(|_| ApiError::NotAuthenticated)?
            .clone();
        match state {
            AuthState {
                is_authenticated: true,
                user: Some(user),
                ..
            } => Ok(user),
            _ => Err(ApiError::NotAuthenticated),
        }
    }

    async fn clear_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.tokens.remove(key).await {
                error!("failed clearing {key}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::MemoryTokenStore;
    use crate::testing::{user, FakeBackend};

    fn store(
        backend: FakeBackend,
        tokens: MemoryTokenStore,
    ) -> (Arc<FakeBackend>, Arc<MemoryTokenStore>, AuthStore) {
        let backend = Arc::new(backend);
        let tokens = Arc::new(tokens);
        let store = AuthStore::new(backend.clone(), tokens.clone());
        (backend, tokens, store)
    }

    #[tokio::test]
    async fn test_that_rejected_tokens_are_cleared() -> Result<(), ApiError> {
        let backend = FakeBackend::default();
        backend.fail(
            "current_user",
            ApiError::from_response(
                401,
                r#"{"detail": "Given token not valid for any token type"}"#,
            ),
        );
        let (_, tokens, store) = store(
            backend,
            MemoryTokenStore::with_tokens("stale", "stale-refresh"),
        );

        let state = store.check_auth_status().await;
        assert!(!state.is_authenticated);
        assert_eq!(None, state.user);
        assert!(!state.is_loading);
        assert_eq!(None, tokens.get(ACCESS_TOKEN_KEY).await?);
        assert_eq!(None, tokens.get(REFRESH_TOKEN_KEY).await?);
        assert_eq!(Err(ApiError::NotAuthenticated), store.require_user().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_that_valid_tokens_restore_the_session() {
        let (backend, _, store) = store(
            FakeBackend::default(),
            MemoryTokenStore::with_tokens("a", "r"),
        );
        let state = store.check_auth_status().await;
        assert!(state.is_authenticated);
        assert_eq!(Some(user()), state.user);
        assert_eq!(1, backend.count("current_user"));
    }

    #[tokio::test]
    async fn test_that_missing_tokens_skip_the_backend() {
        let (backend, _, store) = store(FakeBackend::default(), MemoryTokenStore::new());
        let state = store.check_auth_status().await;
        assert!(!state.is_authenticated);
        assert_eq!(0, backend.count("current_user"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_that_the_gate_waits_for_the_check() {
        let backend = FakeBackend::default();
        backend.set_delay(Duration::from_secs(2));
        let (_, _, store) = store(backend, MemoryTokenStore::with_tokens("a", "r"));
        let store = Arc::new(store);
        assert!(store.state().is_loading);

        let gate = {
            let store = store.clone();
            tokio::spawn(async move { store.require_user().await })
        };
        tokio::task::yield_now().await;
        assert!(!gate.is_finished());

        store.check_auth_status().await;
        assert_eq!(Ok(user()), gate.await.unwrap());
    }

    #[tokio::test]
    async fn test_that_login_persists_tokens() -> Result<(), ApiError> {
        let (_, tokens, store) = store(FakeBackend::default(), MemoryTokenStore::new());
        let credentials = Credentials {
            username: "admin".into(),
            password: "secret".into(),
        };
        assert_eq!(user(), store.login(&credentials).await?);
        assert_eq!(Some("access-token".to_string()), tokens.get(ACCESS_TOKEN_KEY).await?);
        assert_eq!(Some("refresh-token".to_string()), tokens.get(REFRESH_TOKEN_KEY).await?);
        assert!(store.state().is_authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn test_that_logout_survives_backend_failure() -> Result<(), ApiError> {
        let backend = FakeBackend::default();
        backend.fail("logout", ApiError::Transport("connection refused".into()));
        let (backend, tokens, store) = store(backend, MemoryTokenStore::with_tokens("a", "r"));
        store.check_auth_status().await;
        assert!(store.state().is_authenticated);

        store.logout().await;
        assert_eq!(1, backend.count("logout"));
        assert_eq!(None, tokens.get(ACCESS_TOKEN_KEY).await?);
        assert_eq!(None, tokens.get(REFRESH_TOKEN_KEY).await?);
        assert!(!store.state().is_authenticated);
        assert_eq!(None, store.state().user);
        Ok(())
    }

    #[tokio::test]
    async fn test_that_mismatched_passwords_never_reach_the_backend() {
        let (backend, _, store) = store(FakeBackend::default(), MemoryTokenStore::new());
        let registration = Registration {
            username: "ops".into(),
            password: "a".into(),
            password2: "b".into(),
            ..Default::default()
        };
        assert!(matches!(
            store.register(&registration).await,
            Err(ApiError::Validation(_))
        ));
        assert_eq!(0, backend.count("register"));
    }
}
