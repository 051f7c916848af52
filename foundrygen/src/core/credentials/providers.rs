//! Token Providers
//!
//! Federated identity sources for [`CredentialResolver`](super::CredentialResolver):
//! a service principal secret, the Azure CLI login, and an ordered chain.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AccessToken, TokenProvider};
use crate::core::transport::{HttpRequest, RequestBody, Transport};
use crate::core::{CoreError, CoreResult};

/// Default Microsoft identity platform authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Bound on a token request to the identity platform
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Client Secret
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth2 client-credentials grant for a service principal
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority_host: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            transport,
        }
    }

    /// Sets a custom authority host (sovereign clouds, tests)
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into().trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        )
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    fn name(&self) -> &str {
        "client_secret"
    }

    async fn get_token(&self, scope: &str) -> CoreResult<AccessToken> {
        let form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("scope".to_string(), scope.to_string()),
        ];
        let request = HttpRequest::post(self.token_url(), RequestBody::Form(form))
            .with_timeout(Some(TOKEN_REQUEST_TIMEOUT));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| CoreError::Auth(format!("Token request failed: {}", e)))?;

        let parsed: TokenResponse = response
            .json()
            .map_err(|e| CoreError::Auth(format!("Invalid token response: {}", e)))?;

        let expires_on = Utc::now() + ChronoDuration::seconds(parsed.expires_in.unwrap_or(3600));
        Ok(AccessToken::new(parsed.access_token, expires_on))
    }
}

// =============================================================================
// Azure CLI
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenOutput {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

/// Tokens from the signed-in Azure CLI (`az account get-access-token`)
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliCredential {
    pub fn new() -> Self {
        let program = if cfg!(target_os = "windows") {
            "az.cmd"
        } else {
            "az"
        };
        Self {
            program: program.to_string(),
        }
    }

    /// Uses a different executable (e.g. a wrapper script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Parses the JSON printed by `az account get-access-token`.
    ///
    /// Prefers the epoch `expires_on` field; older CLIs only print the local
    /// timestamp `expiresOn`.
    fn parse_output(stdout: &str) -> CoreResult<AccessToken> {
        let output: CliTokenOutput = serde_json::from_str(stdout)
            .map_err(|e| CoreError::Auth(format!("Unexpected Azure CLI output: {}", e)))?;

        let expires_on = match (output.expires_on_epoch, output.expires_on.as_deref()) {
            (Some(epoch), _) => Utc
                .timestamp_opt(epoch, 0)
                .single()
                .ok_or_else(|| CoreError::Auth(format!("Invalid expires_on: {}", epoch)))?,
            (None, Some(local)) => parse_local_timestamp(local)?,
            (None, None) => {
                warn!("Azure CLI token has no expiry; assuming five minutes");
                Utc::now() + ChronoDuration::minutes(5)
            }
        };

        Ok(AccessToken::new(output.access_token, expires_on))
    }
}

fn parse_local_timestamp(value: &str) -> CoreResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| CoreError::Auth(format!("Invalid expiresOn '{}': {}", value, e)))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CoreError::Auth(format!("Ambiguous expiresOn '{}'", value)))
}

#[async_trait]
impl TokenProvider for AzureCliCredential {
    fn name(&self) -> &str {
        "azure_cli"
    }

    async fn get_token(&self, scope: &str) -> CoreResult<AccessToken> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args([
            "account",
            "get-access-token",
            "--scope",
            scope,
            "--output",
            "json",
        ])
        .kill_on_drop(true);

        let output = tokio::time::timeout(TOKEN_REQUEST_TIMEOUT, cmd.output())
            .await
            .map_err(|_| CoreError::Auth("Azure CLI timed out".to_string()))?
            .map_err(|e| CoreError::Auth(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::Auth(format!(
                "Azure CLI exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Self::parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Tries each provider in order; the first token wins
pub struct ChainedTokenProvider {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainedTokenProvider {
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl TokenProvider for ChainedTokenProvider {
    fn name(&self) -> &str {
        "chained"
    }

    fn is_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    async fn get_token(&self, scope: &str) -> CoreResult<AccessToken> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.get_token(scope).await {
                Ok(token) => {
                    debug!("Token obtained from {}", provider.name());
                    return Ok(token);
                }
                Err(e) => {
                    debug!("Token provider {} unavailable: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(CoreError::Auth(
                "No identity providers configured".to_string(),
            ));
        }
        Err(CoreError::Auth(format!(
            "No identity provider returned a token ({})",
            failures.join("; ")
        )))
    }
}
