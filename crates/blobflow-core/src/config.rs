//! Configuration module
//!
//! Storage account and extraction pipeline settings. Values are read from the
//! environment (optionally via a `.env` file) by the binary and handed to the
//! storage client factory fully populated; library code never reads env vars.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{BlobError, BlobResult};

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Service principal (client credentials) identity.
#[derive(Clone)]
pub struct ServicePrincipalConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub tenant_id: String,
    pub authority_host: Option<String>,
}

impl fmt::Debug for ServicePrincipalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipalConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

/// Everything the storage client factory needs to open a session.
#[derive(Clone)]
pub struct AzureBlobStorageConfig {
    pub storage_account_name: String,
    pub storage_account_key: Option<SecretString>,
    pub storage_account_suffix: String,
    pub service_principal_config: Option<ServicePrincipalConfig>,
    /// Custom blob endpoint (e.g. a local emulator). `http://` is allowed here.
    pub endpoint: Option<String>,
    pub request_timeout: Duration,
}

impl fmt::Debug for AzureBlobStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobStorageConfig")
            .field("storage_account_name", &self.storage_account_name)
            .field(
                "storage_account_key",
                &self.storage_account_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("storage_account_suffix", &self.storage_account_suffix)
            .field("service_principal_config", &self.service_principal_config)
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AzureBlobStorageConfig {
    /// Shared-key configuration with default suffix and timeout.
    pub fn with_shared_key(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            storage_account_name: account_name.into(),
            storage_account_key: Some(SecretString::from(account_key.into())),
            storage_account_suffix: DEFAULT_ENDPOINT_SUFFIX.to_string(),
            service_principal_config: None,
            endpoint: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Service principal configuration with default suffix and timeout.
    pub fn with_service_principal(
        account_name: impl Into<String>,
        service_principal: ServicePrincipalConfig,
    ) -> Self {
        Self {
            storage_account_name: account_name.into(),
            storage_account_key: None,
            storage_account_suffix: DEFAULT_ENDPOINT_SUFFIX.to_string(),
            service_principal_config: Some(service_principal),
            endpoint: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` is this over `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_account_name =
            non_empty("STORAGE_ACCOUNT_NAME").context("STORAGE_ACCOUNT_NAME must be set")?;

        let request_timeout = match non_empty("BLOB_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("BLOB_REQUEST_TIMEOUT_SECS must be a positive integer")?,
            ),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        // The triple is only used when all three parts are present; a partial
        // triple falls through to the shared key and is reported by the factory
        // if that is missing too.
        let service_principal_config = match (
            non_empty("APPLICATION_ID"),
            non_empty("CLIENT_SECRET"),
            non_empty("AZURE_TENANT_ID"),
        ) {
            (Some(client_id), Some(client_secret), Some(tenant_id)) => Some(ServicePrincipalConfig {
                client_id,
                client_secret: SecretString::from(client_secret),
                tenant_id,
                authority_host: non_empty("AZURE_AUTHORITY_HOST"),
            }),
            _ => None,
        };

        Ok(Self {
            storage_account_name,
            storage_account_key: non_empty("STORAGE_ACCOUNT_KEY").map(SecretString::from),
            storage_account_suffix: non_empty("AZURE_ENDPOINT_SUFFIX")
                .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            service_principal_config,
            endpoint: non_empty("AZURE_STORAGE_ENDPOINT"),
            request_timeout,
        })
    }

    /// `https://{account}.blob.{suffix}`, or the custom endpoint when one is set.
    pub fn account_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.blob.{}",
                self.storage_account_name, self.storage_account_suffix
            ),
        }
    }
}

/// Extraction pipeline settings.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    /// Where slide-deck payloads are spilled; the OS temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            temp_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let max_concurrency = match env::var("EXTRACTION_MAX_CONCURRENCY") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("EXTRACTION_MAX_CONCURRENCY must be a positive integer")?,
            Err(_) => DEFAULT_MAX_CONCURRENCY,
        };
        if max_concurrency == 0 {
            anyhow::bail!("EXTRACTION_MAX_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            max_concurrency,
            temp_dir: env::var("EXTRACTION_TEMP_DIR").ok().map(PathBuf::from),
        })
    }
}

/// Assemble a shared-key connection string. The result is secret material.
pub fn build_connection_string(account_name: &str, account_key: &SecretString, suffix: &str) -> SecretString {
    SecretString::from(format!(
        "DefaultEndpointsProtocol=https;AccountName={};AccountKey={};EndpointSuffix={}",
        account_name,
        account_key.expose_secret(),
        suffix
    ))
}

/// Parsed shared-key connection string.
pub struct ConnectionString {
    pub protocol: String,
    pub account_name: String,
    pub account_key: SecretString,
    pub endpoint_suffix: String,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("protocol", &self.protocol)
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .field("endpoint_suffix", &self.endpoint_suffix)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &SecretString) -> BlobResult<Self> {
        let mut protocol = None;
        let mut account_name = None;
        let mut account_key = None;
        let mut endpoint_suffix = None;

        for part in raw.expose_secret().split(';').filter(|p| !p.is_empty()) {
            // Keys are base64 and may themselves end in '='; split on the first one only.
            let Some((key, value)) = part.split_once('=') else {
                return Err(BlobError::InvalidConfiguration(
                    "connection string segment without '='".to_string(),
                ));
            };
            match key {
                "DefaultEndpointsProtocol" => protocol = Some(value.to_string()),
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(SecretString::from(value.to_string())),
                "EndpointSuffix" => endpoint_suffix = Some(value.to_string()),
                _ => {}
            }
        }

        let account_name = account_name
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BlobError::InvalidConfiguration("connection string has no AccountName".to_string()))?;
        let account_key = account_key
            .filter(|v| !v.expose_secret().is_empty())
            .ok_or_else(|| BlobError::InvalidConfiguration("connection string has no AccountKey".to_string()))?;

        Ok(Self {
            protocol: protocol.unwrap_or_else(|| "https".to_string()),
            account_name,
            account_key,
            endpoint_suffix: endpoint_suffix.unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
        })
    }
}
