//! Control-plane and data-plane client for the deployment flow

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use reelstack_common::{Error as DeployError, Resource, ResourceDescriptor};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether a retry may succeed: request timeouts, throttling, server
    /// errors and transport failures are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => !e.is_builder() && !e.is_decode(),
            ClientError::Api { status, .. } => {
                matches!(status, 408 | 429) || *status >= 500
            }
            _ => false,
        }
    }
}

impl From<ClientError> for DeployError {
    fn from(err: ClientError) -> Self {
        if err.is_transient() {
            DeployError::Transient(err.to_string())
        } else {
            DeployError::System(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Client for the provider's management and data endpoints
#[derive(Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ControlPlaneClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Build headers for requests
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// POST request
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// PUT request with a raw body, for blob uploads
    async fn put_bytes(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let mut headers = self.headers();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }

        let response = self
            .client
            .put(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from(response).await)
        }
    }

    /// Handle API response
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(self.error_from(response).await)
        }
    }

    async fn error_from(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();

        match status {
            401 => ClientError::AuthFailed,
            404 => ClientError::NotFound(message),
            409 => ClientError::AlreadyExists(message),
            _ => ClientError::Api { status, message },
        }
    }
}

// ============================================================================
// API Data Types
// ============================================================================

/// Create resource request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceRequest {
    pub name: String,
    pub kind: reelstack_common::ResourceKind,
    pub region: String,
}

impl From<&ResourceDescriptor> for CreateResourceRequest {
    fn from(desc: &ResourceDescriptor) -> Self {
        Self {
            name: desc.name.clone(),
            kind: desc.kind,
            region: desc.region.clone(),
        }
    }
}

/// Create document collection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
}

/// Static website configuration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSiteRequest {
    pub index_document: String,
    pub error_document: String,
}

/// Static website configuration as reported by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSiteInfo {
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
}

// ============================================================================
// API Methods
// ============================================================================

impl ControlPlaneClient {
    // Control plane: resource lifecycle

    pub async fn create_resource(
        &self,
        group: &str,
        request: &CreateResourceRequest,
    ) -> Result<Resource> {
        self.post(
            &format!("/api/groups/{}/resources", urlencoding::encode(group)),
            request,
        )
        .await
    }

    pub async fn get_resource(&self, group: &str, name: &str) -> Result<Resource> {
        self.get(&format!(
            "/api/groups/{}/resources/{}",
            urlencoding::encode(group),
            urlencoding::encode(name)
        ))
        .await
    }

    // Control plane: dependent sub-resources

    pub async fn create_collection(
        &self,
        group: &str,
        database: &str,
        request: &CreateCollectionRequest,
    ) -> Result<serde_json::Value> {
        self.post(
            &format!(
                "/api/groups/{}/resources/{}/collections",
                urlencoding::encode(group),
                urlencoding::encode(database)
            ),
            request,
        )
        .await
    }

    pub async fn enable_static_site(
        &self,
        group: &str,
        storage: &str,
        request: &StaticSiteRequest,
    ) -> Result<StaticSiteInfo> {
        self.post(
            &format!(
                "/api/groups/{}/resources/{}/static-site",
                urlencoding::encode(group),
                urlencoding::encode(storage)
            ),
            request,
        )
        .await
    }

    // Data plane

    pub async fn insert_document(
        &self,
        group: &str,
        database: &str,
        collection: &str,
        document: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.post(
            &format!(
                "/api/groups/{}/resources/{}/collections/{}/docs",
                urlencoding::encode(group),
                urlencoding::encode(database),
                urlencoding::encode(collection)
            ),
            document,
        )
        .await
    }

    pub async fn upload_blob(
        &self,
        group: &str,
        storage: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        // Blob paths keep their '/' separators; encode each segment alone.
        let encoded: Vec<String> = path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect();

        self.put_bytes(
            &format!(
                "/api/groups/{}/resources/{}/blobs/{}",
                urlencoding::encode(group),
                urlencoding::encode(storage),
                encoded.join("/")
            ),
            bytes,
            content_type,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ControlPlaneClient::new("http://localhost:8006");
        assert!(client.token.is_none());
    }

    #[test]
    fn test_client_with_token() {
        let client = ControlPlaneClient::new("http://localhost:8006/").with_token("test-token");
        assert_eq!(client.token, Some("test-token".to_string()));
        assert_eq!(client.base_url, "http://localhost:8006");
    }

    #[test]
    fn test_transient_classification() {
        let throttled = ClientError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(throttled.is_transient());

        let server_err = ClientError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(server_err.is_transient());

        let bad_request = ClientError::Api {
            status: 400,
            message: "nope".to_string(),
        };
        assert!(!bad_request.is_transient());

        assert!(!ClientError::AuthFailed.is_transient());
        assert!(!ClientError::AlreadyExists("demo-site".to_string()).is_transient());
    }

    #[test]
    fn test_error_mapping_into_taxonomy() {
        let transient: DeployError = ClientError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(transient.is_transient());

        let permanent: DeployError = ClientError::AuthFailed.into();
        assert!(!permanent.is_transient());
    }

    #[test]
    fn test_create_request_from_descriptor() {
        let desc = ResourceDescriptor::new(
            "demo-catalog",
            reelstack_common::ResourceKind::Database,
            "us-east",
        );
        let request = CreateResourceRequest::from(&desc);
        assert_eq!(request.name, "demo-catalog");
        assert_eq!(request.region, "us-east");
    }
}
