//! HTTP client of the OpenVeo web service.
//!
//! Requests are authenticated with an OAuth2 client credentials token. The
//! token is requested on first use and renewed once when the service
//! rejects it.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use veo_core::{ClientError, ClientResult, PublishingClient, RemoteState, UploadRequest};

use crate::config::ClientConfig;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ServiceError,
}

#[derive(Deserialize)]
struct ServiceError {
    code: i64,
    #[serde(default)]
    module: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: Vec<IdEntity>,
}

#[derive(Deserialize)]
struct IdEntity {
    id: Value,
}

#[derive(Deserialize)]
struct VideoResponse {
    entity: VideoEntity,
}

#[derive(Deserialize)]
struct VideoEntity {
    state: i64,
}

#[derive(Deserialize)]
struct TotalResponse {
    total: u64,
}

/// Identifiers may come as strings or numbers.
fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn transport(error: reqwest::Error) -> ClientError {
    ClientError::Transport(error.to_string())
}

/// Publishing client talking to an OpenVeo server.
pub struct HttpPublisher {
    client: reqwest::Client,
    config: ClientConfig,
    token: RwLock<Option<String>>,
}

impl HttpPublisher {
    /// Create a client, loading the trusted certificate if one is set.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());

        if let Some(path) = &config.certificate {
            let pem = std::fs::read(path).map_err(|e| {
                ClientError::InvalidRequest(format!(
                    "Cannot read certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClientError::InvalidRequest(format!("Invalid certificate: {}", e)))?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::InvalidRequest(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn token(&self) -> ClientResult<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> ClientResult<String> {
        debug!("Requesting access token from {}", self.config.url);
        let response = self
            .client
            .post(self.config.endpoint("/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .json(&json!({ "grant_type": "client_credentials" }))
            .send()
            .await
            .map_err(transport)?;

        let body: TokenResponse = Self::decode(response).await?;
        *self.token.write().await = Some(body.access_token.clone());
        Ok(body.access_token)
    }

    /// Send an authenticated request, renewing the token once if rejected.
    async fn call<T, F>(&self, build: F) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> ClientResult<RequestBuilder>,
    {
        let token = self.token().await?;
        let response = build(&token)?.send().await.map_err(transport)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::decode(response).await;
        }

        debug!("Access token rejected, requesting a new one");
        let token = self.refresh_token().await?;
        let response = build(&token)?.send().await.map_err(transport)?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if let Ok(ErrorEnvelope { error }) = serde_json::from_str::<ErrorEnvelope>(&text) {
            return Err(ClientError::Service {
                code: error.code,
                message: error.message.unwrap_or_else(|| format!("{} error", error.module)),
                module: error.module,
            });
        }
        if !status.is_success() {
            return Err(ClientError::Service {
                code: i64::from(status.as_u16()),
                module: "http".to_string(),
                message: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            ClientError::UnexpectedResponse(format!("{} (body: {})", e, text))
        })
    }
}

#[async_trait]
impl PublishingClient for HttpPublisher {
    async fn find_user(&self, email: &str) -> ClientResult<Option<String>> {
        let url = self.config.endpoint("/users");
        let response: EntitiesResponse = self
            .call(|token| {
                Ok(self
                    .client
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("email", email)]))
            })
            .await?;
        Ok(response.entities.first().map(|entity| id_string(&entity.id)))
    }

    async fn upload(&self, request: UploadRequest) -> ClientResult<String> {
        let url = self.config.endpoint("/publish/videos");
        let info = serde_json::to_string(&request.metadata)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        debug!("Uploading {} to {}", request.filename, url);
        let response: IdEntity = self
            .call(|token| {
                let file = Part::bytes(request.bytes.clone())
                    .file_name(request.filename.clone())
                    .mime_str(&request.mime_type)
                    .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
                let form = Form::new().part("file", file).text("info", info.clone());
                Ok(self
                    .client
                    .post(&url)
                    .bearer_auth(token)
                    .timeout(request.timeout)
                    .multipart(form))
            })
            .await?;
        Ok(id_string(&response.id))
    }

    async fn status(&self, destination_id: &str) -> ClientResult<RemoteState> {
        let url = self.config.endpoint(&format!("/publish/videos/{}", destination_id));
        let response: VideoResponse = self
            .call(|token| Ok(self.client.get(&url).bearer_auth(token)))
            .await?;
        Ok(RemoteState::from_code(response.entity.state))
    }

    async fn publish(&self, destination_id: &str) -> ClientResult<()> {
        let url = self
            .config
            .endpoint(&format!("/publish/videos/{}/publish", destination_id));
        let response: TotalResponse = self
            .call(|token| Ok(self.client.post(&url).bearer_auth(token)))
            .await?;
        debug!("Published {} item(s)", response.total);
        Ok(())
    }

    async fn delete(&self, destination_id: &str) -> ClientResult<()> {
        let url = self.config.endpoint(&format!("/publish/videos/{}", destination_id));
        let response: TotalResponse = self
            .call(|token| Ok(self.client.delete(&url).bearer_auth(token)))
            .await?;
        debug!("Deleted {} item(s)", response.total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_string() {
        assert_eq!(id_string(&json!("abc")), "abc");
        assert_eq!(id_string(&json!(42)), "42");
    }

    #[test]
    fn test_missing_certificate() {
        let config = ClientConfig::new("https://veo.example.org", "id", "secret")
            .certificate("/nonexistent/certificate.pem");
        assert!(matches!(
            HttpPublisher::new(config),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
