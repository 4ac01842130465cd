use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use blobflow_core::{AzureBlobStorageConfig, BlobError, BlobResult, Credential, CredentialKind};
use chrono::Utc;
use hmac::{Hmac, Mac};
use object_store::azure::{AzureCredential, MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::{ClientOptions, ObjectStore};
use quick_xml::events::Event;
use quick_xml::Reader;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::service::BlobService;

type HmacSha256 = Hmac<Sha256>;

/// REST version sent with account-level requests.
const STORAGE_API_VERSION: &str = "2021-08-06";
/// Azure's reserved root container; only used to hold the token provider.
const ROOT_CONTAINER: &str = "$root";
const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Azure Blob Storage session
///
/// Blob I/O uses one `MicrosoftAzure` store per container. Container
/// enumeration is not part of the object store API, so it is a signed
/// List Containers call made directly over HTTP.
pub struct AzureBlobService {
    account: String,
    account_url: String,
    credential: Credential,
    timeout: Duration,
    http: reqwest::Client,
    /// Holds the cached OAuth token for service principal sessions.
    root: MicrosoftAzure,
}

impl AzureBlobService {
    /// Build the session. Nothing is sent over the network here; bad
    /// endpoints or credentials surface on the first request.
    pub fn new(config: &AzureBlobStorageConfig, credential: Credential) -> BlobResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BlobError::InvalidConfiguration(format!("HTTP client: {}", e)))?;

        let account = match &credential {
            Credential::SharedKey { account, .. } => account.clone(),
            Credential::ServicePrincipal { .. } => config.storage_account_name.clone(),
        };

        let account_url = config.account_url();
        let root = store_builder(&account, &account_url, &credential, config.request_timeout, ROOT_CONTAINER)
            .build()
            .map_err(config_error)?;

        let service = AzureBlobService {
            account,
            account_url,
            credential,
            timeout: config.request_timeout,
            http,
            root,
        };

        tracing::debug!(
            account = %service.account,
            account_url = %service.account_url,
            credential_kind = %service.credential.kind(),
            "Created Azure blob service"
        );
        Ok(service)
    }

    fn build_store(&self, container: &str) -> BlobResult<MicrosoftAzure> {
        store_builder(&self.account, &self.account_url, &self.credential, self.timeout, container)
            .build()
            .map_err(config_error)
    }

    async fn bearer_token(&self) -> BlobResult<String> {
        let credential = self
            .root
            .credentials()
            .get_credential()
            .await
            .map_err(|e| BlobError::Backend(format!("acquiring service principal token: {}", e)))?;

        match credential.as_ref() {
            AzureCredential::BearerToken(token) => Ok(token.clone()),
            _ => Err(BlobError::InvalidConfiguration(
                "service principal did not yield a bearer token".to_string(),
            )),
        }
    }

    async fn list_containers_page(&self, marker: Option<&str>) -> BlobResult<ContainerPage> {
        let mut url = reqwest::Url::parse(&format!("{}/", self.account_url)).map_err(|e| {
            BlobError::InvalidConfiguration(format!("invalid account url {}: {}", self.account_url, e))
        })?;
        url.query_pairs_mut().append_pair("comp", "list");
        if let Some(marker) = marker {
            url.query_pairs_mut().append_pair("marker", marker);
        }

        let date = Utc::now().format(RFC1123).to_string();
        let canonical_path = url.path().to_string();
        let request = self
            .http
            .get(url)
            .header("x-ms-date", &date)
            .header("x-ms-version", STORAGE_API_VERSION);

        let request = match &self.credential {
            Credential::SharedKey { account, key, .. } => {
                let string_to_sign = list_containers_string_to_sign(account, &canonical_path, &date, marker);
                let signature = sign(key, &string_to_sign)?;
                request.header("Authorization", format!("SharedKey {}:{}", account, signature))
            }
            Credential::ServicePrincipal { .. } => request.bearer_auth(self.bearer_token().await?),
        };

        let response = request
            .send()
            .await
            .map_err(|e| BlobError::Backend(format!("list containers request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let code = response
                .headers()
                .get("x-ms-error-code")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(BlobError::Backend(format!(
                "list containers returned {} ({})",
                status, code
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BlobError::Backend(format!("reading list containers response: {}", e)))?;
        parse_container_page(&body)
    }
}

#[async_trait]
impl BlobService for AzureBlobService {
    fn credential_kind(&self) -> CredentialKind {
        self.credential.kind()
    }

    fn account_url(&self) -> String {
        self.account_url.clone()
    }

    async fn list_containers(&self) -> BlobResult<Vec<String>> {
        let start = Instant::now();
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .list_containers_page(marker.as_deref())
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        account = %self.account,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Azure list containers failed"
                    );
                    e
                })?;
            names.extend(page.names);
            match page.next_marker {
                Some(next) if !next.is_empty() => marker = Some(next),
                _ => break,
            }
        }

        tracing::info!(
            account = %self.account,
            container_count = names.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure list containers successful"
        );
        Ok(names)
    }

    fn container_store(&self, container: &str) -> BlobResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(self.build_store(container)?))
    }
}

fn store_builder(
    account: &str,
    account_url: &str,
    credential: &Credential,
    timeout: Duration,
    container: &str,
) -> MicrosoftAzureBuilder {
    let builder = MicrosoftAzureBuilder::new()
        .with_account(account)
        .with_container_name(container)
        .with_endpoint(account_url.to_string())
        .with_allow_http(account_url.starts_with("http://"))
        .with_client_options(ClientOptions::new().with_timeout(timeout));

    match credential {
        Credential::SharedKey { key, .. } => builder.with_access_key(key.expose_secret()),
        Credential::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
            authority_host,
        } => {
            let builder = builder.with_client_secret_authorization(
                client_id.as_str(),
                client_secret.expose_secret(),
                tenant_id.as_str(),
            );
            match authority_host {
                Some(host) => builder.with_authority_host(host.as_str()),
                None => builder,
            }
        }
    }
}

fn config_error(e: object_store::Error) -> BlobError {
    BlobError::InvalidConfiguration(e.to_string())
}

/// SharedKey string-to-sign for `GET /?comp=list`. All eleven standard
/// headers are empty for this request.
fn list_containers_string_to_sign(account: &str, path: &str, date: &str, marker: Option<&str>) -> String {
    let mut out = String::from("GET\n");
    out.push_str(&"\n".repeat(11));
    out.push_str(&format!("x-ms-date:{}\nx-ms-version:{}\n", date, STORAGE_API_VERSION));
    out.push_str(&format!("/{}{}\ncomp:list", account, path));
    if let Some(marker) = marker {
        out.push_str(&format!("\nmarker:{}", marker));
    }
    out
}

fn sign(key: &SecretString, string_to_sign: &str) -> BlobResult<String> {
    let decoded = STANDARD.decode(key.expose_secret()).map_err(|_| {
        BlobError::InvalidConfiguration("storage account key is not valid base64".to_string())
    })?;
    let mut mac = HmacSha256::new_from_slice(&decoded)
        .map_err(|_| BlobError::InvalidConfiguration("storage account key is empty".to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Default, PartialEq)]
struct ContainerPage {
    names: Vec<String>,
    next_marker: Option<String>,
}

fn ends_with(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

/// `EnumerationResults/Containers/Container/Name` plus `NextMarker`.
fn parse_container_page(xml: &str) -> BlobResult<ContainerPage> {
    let xml_error = |e: quick_xml::Error| BlobError::Backend(format!("invalid list containers XML: {}", e));

    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut page = ContainerPage::default();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned()),
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?.into_owned();
                if ends_with(&path, &["Containers", "Container", "Name"]) {
                    page.names.push(text);
                } else if ends_with(&path, &["EnumerationResults", "NextMarker"]) {
                    page.next_marker = Some(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(page)
}
