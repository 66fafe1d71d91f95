use crate::api::error::UploadError;
use crate::api::result::ApiEnvelope;
use serde::Serialize;

/// Thin JSON client for the material backend. Every call sends the bearer
/// token and returns the raw envelope; classification is left to callers.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post_json<B>(&self, path: &str, token: &str, body: &B) -> Result<ApiEnvelope, UploadError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        Self::decode(response).await
    }

    pub async fn get_json(&self, path: &str, token: &str) -> Result<ApiEnvelope, UploadError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        Self::decode(response).await
    }

    // The backend reports failures in the envelope, so the HTTP status is
    // only used to enrich decode errors.
    async fn decode(response: reqwest::Response) -> Result<ApiEnvelope, UploadError> {
        let status = response.status();
        response.json::<ApiEnvelope>().await.map_err(|e| {
            tracing::warn!("Undecodable backend response (status {}): {}", status, e);
            UploadError::Transport(format!("invalid response (HTTP {}): {}", status, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = BackendClient::new("http://127.0.0.1:8080/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(
            client.url("/material/save"),
            "http://127.0.0.1:8080/material/save"
        );
        assert_eq!(
            client.url("material/list"),
            "http://127.0.0.1:8080/material/list"
        );
    }
}
