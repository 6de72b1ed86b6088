use serde::Deserialize;
use tracing::warn;

use crate::ClientError;

/// Optional course-title lookup used when a course has to be created.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    http: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
}

impl CourseCatalog {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub async fn lookup(&self, code: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[("code", code)])
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("catalog lookup: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: Some(status.as_u16()),
                message: format!("catalog has no entry for {code}"),
            });
        }
        let entry: CatalogEntry = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("catalog entry: {e}")))?;
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(ClientError::NotFound {
                what: format!("catalog title for {code}"),
            });
        }
        Ok(name.to_string())
    }

    /// Title for `code`, falling back to the code itself.
    pub async fn title_or_code(&self, code: &str) -> String {
        match self.lookup(code).await {
            Ok(name) => name,
            Err(e) => {
                warn!(course = code, error = %e, "catalog lookup failed; using course code as title");
                code.to_string()
            }
        }
    }
}
