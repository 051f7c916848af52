//! Credential flags shared by all commands

use clap::Args;
use std::sync::Arc;

use foundrygen_lib::core::credentials::{
    AzureCliCredential, ChainedTokenProvider, ClientSecretCredential,
};
use foundrygen_lib::{CoreResult, CredentialResolver, TokenProvider, Transport};

/// Federated identity used when no API key is configured
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Directory (tenant) id of a service principal
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Application (client) id of a service principal
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret of a service principal
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Fall back to the signed-in Azure CLI account
    #[arg(long)]
    pub azure_cli: bool,
}

impl IdentityArgs {
    /// Token providers configured by the flags, in the order they are tried
    fn providers(&self, transport: &Arc<dyn Transport>) -> Vec<Arc<dyn TokenProvider>> {
        let mut providers: Vec<Arc<dyn TokenProvider>> = Vec::new();

        if let (Some(tenant), Some(client), Some(secret)) =
            (&self.tenant_id, &self.client_id, &self.client_secret)
        {
            providers.push(Arc::new(ClientSecretCredential::new(
                tenant.clone(),
                client.clone(),
                secret.clone(),
                Arc::clone(transport),
            )));
        }
        if self.azure_cli {
            providers.push(Arc::new(AzureCliCredential::new()));
        }

        providers
    }

    /// Builds the resolver; an API key wins over any identity provider
    pub fn resolver(
        &self,
        api_key: Option<String>,
        transport: &Arc<dyn Transport>,
    ) -> CoreResult<CredentialResolver> {
        let chain: Arc<dyn TokenProvider> =
            Arc::new(ChainedTokenProvider::new(self.providers(transport)));
        CredentialResolver::new(api_key, Some(chain))
    }
}
