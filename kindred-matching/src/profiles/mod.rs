//! Profile identity lookups against the user service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Active,
    /// Reported as a 404, never parsed from a body.
    #[serde(skip)]
    Missing,
    /// Suspended, banned or deactivated. Any status the user service reports
    /// that we do not know lands here.
    #[serde(other)]
    Inactive,
}

#[derive(Debug, thiserror::Error)]
#[error("profile lookup failed: {0}")]
pub struct ResolverError(pub String);

#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn status(&self, profile_id: Uuid) -> Result<ProfileStatus, ResolverError>;
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: ProfileStatus,
}

/// Resolver backed by `GET {user_service_url}/internal/profiles/:id/status`.
pub struct HttpProfileResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProfileResolver {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn status_url(&self, profile_id: Uuid) -> String {
        format!("{}/internal/profiles/{profile_id}/status", self.base_url)
    }
}

#[async_trait]
impl ProfileResolver for HttpProfileResolver {
    async fn status(&self, profile_id: Uuid) -> Result<ProfileStatus, ResolverError> {
        let resp = self
            .client
            .get(self.status_url(profile_id))
            .send()
            .await
            .map_err(|e| ResolverError(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(ProfileStatus::Missing),
            s if s.is_success() => {
                let body: StatusBody = resp
                    .json()
                    .await
                    .map_err(|e| ResolverError(format!("bad status body: {e}")))?;
                Ok(body.status)
            }
            s => Err(ResolverError(format!("user service returned {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_url_is_normalized() {
        let resolver = HttpProfileResolver::new(reqwest::Client::new(), "http://user:3002/");
        let id = Uuid::from_u128(7);
        assert_eq!(
            resolver.status_url(id),
            format!("http://user:3002/internal/profiles/{id}/status")
        );
    }

    #[test]
    fn unknown_statuses_are_inactive() {
        let parse = |raw: &str| serde_json::from_str::<StatusBody>(raw).unwrap().status;

        assert_eq!(parse(r#"{"status":"active"}"#), ProfileStatus::Active);
        assert_eq!(parse(r#"{"status":"inactive"}"#), ProfileStatus::Inactive);
        assert_eq!(parse(r#"{"status":"banned"}"#), ProfileStatus::Inactive);
        // only a 404 means missing
        assert_eq!(parse(r#"{"status":"missing"}"#), ProfileStatus::Inactive);
    }
}
