//! Credential Resolution
//!
//! Produces the authentication header for each request. A client is built with
//! exactly one of two modes, fixed for its lifetime:
//!
//! - **Static key**: `api-key: <key>`; no network, no expiry.
//! - **Federated token**: `Authorization: Bearer <token>` obtained from a
//!   [`TokenProvider`] for the service audience. Tokens are cached and
//!   re-requested shortly before they expire.
//!
//! Misconfiguration (neither mode available) is rejected at construction.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::transport::HeaderSet;
use crate::core::{CoreError, CoreResult};

mod providers;

pub use providers::{AzureCliCredential, ChainedTokenProvider, ClientSecretCredential};

/// Audience scope of the cognitive services data plane
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Tokens expiring within this window are refreshed before use
const TOKEN_REFRESH_SKEW_SECS: i64 = 300;

// =============================================================================
// Tokens
// =============================================================================

/// A time-limited bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Whether the token is expired or about to be at `now`
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - now <= ChronoDuration::seconds(TOKEN_REFRESH_SKEW_SECS)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &redact(&self.token))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of bearer tokens (federated identity)
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Provider name for logs and error messages
    fn name(&self) -> &str;

    /// Requests a token for `scope`
    async fn get_token(&self, scope: &str) -> CoreResult<AccessToken>;

    /// Whether the provider has any source it could get a token from
    fn is_configured(&self) -> bool {
        true
    }
}

/// Returns a redacted preview of a secret for logging
pub fn redact(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 12 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

// =============================================================================
// Credential
// =============================================================================

/// The credential attached to one request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static API key
    ApiKey(String),
    /// Bearer token from an identity provider
    Bearer(AccessToken),
}

impl Credential {
    /// Header for the data-plane APIs
    pub fn header(&self) -> (String, String) {
        match self {
            Credential::ApiKey(key) => ("api-key".to_string(), key.clone()),
            Credential::Bearer(token) => (
                "Authorization".to_string(),
                format!("Bearer {}", token.token),
            ),
        }
    }

    /// Header in bearer form regardless of mode (routes that take keys as bearer tokens)
    pub fn bearer_header(&self) -> (String, String) {
        let secret = match self {
            Credential::ApiKey(key) => key,
            Credential::Bearer(token) => &token.token,
        };
        ("Authorization".to_string(), format!("Bearer {}", secret))
    }

    /// Header set for a request
    pub fn headers(&self) -> HeaderSet {
        vec![self.header()]
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey(key) => f.debug_tuple("ApiKey").field(&redact(key)).finish(),
            Credential::Bearer(token) => f.debug_tuple("Bearer").field(token).finish(),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

enum AuthMode {
    ApiKey(String),
    Federated {
        provider: Arc<dyn TokenProvider>,
        cached: Mutex<Option<AccessToken>>,
    },
}

/// Resolves the credential for each request
pub struct CredentialResolver {
    mode: AuthMode,
    scope: String,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            AuthMode::ApiKey(_) => "api_key".to_string(),
            AuthMode::Federated { provider, .. } => format!("federated({})", provider.name()),
        };
        f.debug_struct("CredentialResolver")
            .field("mode", &mode)
            .field("scope", &self.scope)
            .finish()
    }
}

impl CredentialResolver {
    /// Selects the authentication mode.
    ///
    /// A non-blank `api_key` wins; otherwise `token_provider` is used. Having
    /// neither, or only a provider with nothing configured, is a configuration
    /// error.
    pub fn new(
        api_key: Option<String>,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> CoreResult<Self> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let mode = match (api_key, token_provider) {
            (Some(key), _) => AuthMode::ApiKey(key),
            (None, Some(provider)) if !provider.is_configured() => {
                return Err(CoreError::Configuration(format!(
                    "Identity provider '{}' has no credential sources configured",
                    provider.name()
                )))
            }
            (None, Some(provider)) => {
                info!("Using federated credentials via {}", provider.name());
                AuthMode::Federated {
                    provider,
                    cached: Mutex::new(None),
                }
            }
            (None, None) => {
                return Err(CoreError::Configuration(
                    "Either an API key or an identity provider must be configured".to_string(),
                ))
            }
        };

        Ok(Self {
            mode,
            scope: COGNITIVE_SERVICES_SCOPE.to_string(),
        })
    }

    /// Static key mode
    pub fn from_api_key(api_key: impl Into<String>) -> CoreResult<Self> {
        Self::new(Some(api_key.into()), None)
    }

    /// Federated token mode
    pub fn from_provider(provider: Arc<dyn TokenProvider>) -> CoreResult<Self> {
        Self::new(None, Some(provider))
    }

    /// Overrides the token audience scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_api_key(&self) -> bool {
        matches!(self.mode, AuthMode::ApiKey(_))
    }

    /// Resolves the credential for one request.
    ///
    /// May call the identity provider; its failures surface as
    /// [`CoreError::Auth`].
    pub async fn resolve(&self) -> CoreResult<Credential> {
        match &self.mode {
            AuthMode::ApiKey(key) => Ok(Credential::ApiKey(key.clone())),
            AuthMode::Federated { provider, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if !token.needs_refresh(Utc::now()) {
                        return Ok(Credential::Bearer(token.clone()));
                    }
                    debug!("Cached token from {} is near expiry", provider.name());
                }

                let token = provider.get_token(&self.scope).await.map_err(|e| match e {
                    CoreError::Auth(msg) => CoreError::Auth(msg),
                    other => CoreError::Auth(format!("{}: {}", provider.name(), other)),
                })?;
                debug!(
                    "Obtained token from {} (expires {})",
                    provider.name(),
                    token.expires_on
                );
                *cached = Some(token.clone());
                Ok(Credential::Bearer(token))
            }
        }
    }

    /// Resolves the credential and returns it as a header set
    pub async fn headers(&self) -> CoreResult<HeaderSet> {
        Ok(self.resolve().await?.headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        lifetime_secs: i64,
        fail: bool,
    }

    impl CountingProvider {
        fn new(lifetime_secs: i64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                lifetime_secs,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn get_token(&self, scope: &str) -> CoreResult<AccessToken> {
            assert_eq!(scope, COGNITIVE_SERVICES_SCOPE);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::Network("no identity endpoint".to_string()));
            }
            Ok(AccessToken::new(
                format!("token-{}", n),
                Utc::now() + ChronoDuration::seconds(self.lifetime_secs),
            ))
        }
    }

    #[test]
    fn test_neither_mode_is_configuration_error() {
        let err = CredentialResolver::new(None, None).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));

        let err = CredentialResolver::new(Some("   ".to_string()), None).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_empty_provider_chain_is_configuration_error() {
        let empty: Arc<dyn TokenProvider> = Arc::new(ChainedTokenProvider::new(vec![]));

        let err = CredentialResolver::new(None, Some(empty.clone())).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));

        let err = CredentialResolver::from_provider(empty.clone()).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));

        // An API key still wins over the empty chain.
        let resolver = CredentialResolver::new(Some("key".to_string()), Some(empty)).unwrap();
        assert!(resolver.is_api_key());
    }

    #[tokio::test]
    async fn test_api_key_header() {
        let resolver = CredentialResolver::from_api_key("secret-key").unwrap();
        assert!(resolver.is_api_key());
        let headers = resolver.headers().await.unwrap();
        assert_eq!(
            headers,
            vec![("api-key".to_string(), "secret-key".to_string())]
        );
    }

    #[tokio::test]
    async fn test_api_key_wins_over_provider() {
        let provider = Arc::new(CountingProvider::new(3600));
        let resolver =
            CredentialResolver::new(Some("key".to_string()), Some(provider.clone())).unwrap();
        resolver.resolve().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bearer_token_is_cached() {
        let provider = Arc::new(CountingProvider::new(3600));
        let resolver = CredentialResolver::from_provider(provider.clone()).unwrap();

        let first = resolver.headers().await.unwrap();
        let second = resolver.headers().await.unwrap();
        assert_eq!(
            first,
            vec![("Authorization".to_string(), "Bearer token-0".to_string())]
        );
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_near_expiry_token_is_refreshed() {
        let provider = Arc::new(CountingProvider::new(60));
        let resolver = CredentialResolver::from_provider(provider.clone()).unwrap();

        resolver.resolve().await.unwrap();
        let second = resolver.resolve().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.header().1, "Bearer token-1");
    }

    #[tokio::test]
    async fn test_provider_failure_is_auth_error() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..CountingProvider::new(3600)
        });
        let resolver = CredentialResolver::from_provider(provider).unwrap();
        let err = resolver.resolve().await.unwrap_err();
        match err {
            CoreError::Auth(msg) => assert!(msg.contains("no identity endpoint")),
            other => panic!("Expected Auth, got {:?}", other),
        }
    }

    #[test]
    fn test_bearer_header_from_api_key() {
        let credential = Credential::ApiKey("k".to_string());
        assert_eq!(
            credential.bearer_header(),
            ("Authorization".to_string(), "Bearer k".to_string())
        );
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let credential = Credential::ApiKey("abcd-super-secret-wxyz".to_string());
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("abcd...wxyz"));
    }

    #[test]
    fn test_redact_short_value() {
        assert_eq!(redact("short"), "*****");
    }
}
