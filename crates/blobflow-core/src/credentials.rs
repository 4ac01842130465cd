//! Credential strategy selection.
//!
//! A session authenticates with exactly one [`Credential`]. It is chosen once,
//! from a fully-populated [`AzureBlobStorageConfig`], and never swapped.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{build_connection_string, AzureBlobStorageConfig, ConnectionString};
use crate::error::{BlobError, BlobResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    SharedKey,
    ServicePrincipal,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::SharedKey => f.write_str("shared_key"),
            CredentialKind::ServicePrincipal => f.write_str("service_principal"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Credential {
    SharedKey {
        account: String,
        key: SecretString,
        suffix: String,
    },
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
        authority_host: Option<String>,
    },
}

impl Credential {
    /// Pick the strategy: a service principal wins when configured, otherwise
    /// the account key is used via a connection string.
    pub fn from_config(config: &AzureBlobStorageConfig) -> BlobResult<Self> {
        if config.storage_account_name.trim().is_empty() {
            return Err(BlobError::InvalidConfiguration(
                "storage account name is empty".to_string(),
            ));
        }

        if let Some(sp) = &config.service_principal_config {
            if sp.client_id.trim().is_empty()
                || sp.tenant_id.trim().is_empty()
                || sp.client_secret.expose_secret().is_empty()
            {
                return Err(BlobError::InvalidConfiguration(
                    "service principal requires client id, client secret and tenant id".to_string(),
                ));
            }
            return Ok(Credential::ServicePrincipal {
                tenant_id: sp.tenant_id.clone(),
                client_id: sp.client_id.clone(),
                client_secret: sp.client_secret.clone(),
                authority_host: sp.authority_host.clone(),
            });
        }

        let key = config
            .storage_account_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                BlobError::InvalidConfiguration(
                    "neither an account key nor a service principal is configured".to_string(),
                )
            })?;

        let connection_string =
            build_connection_string(&config.storage_account_name, key, &config.storage_account_suffix);
        let parsed = ConnectionString::parse(&connection_string)?;

        Ok(Credential::SharedKey {
            account: parsed.account_name,
            key: parsed.account_key,
            suffix: parsed.endpoint_suffix,
        })
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::SharedKey { .. } => CredentialKind::SharedKey,
            Credential::ServicePrincipal { .. } => CredentialKind::ServicePrincipal,
        }
    }
}
