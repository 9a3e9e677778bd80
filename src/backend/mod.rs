pub mod admin;
pub mod validation;

use crate::models::backend::{
    Contact,
    ContactSubmission,
    Report,
    ReportReceipt,
    ReportStatus,
    ReportSubmission,
    Stats,
};
use async_trait::async_trait;
use log::{ debug, info, warn };
use reqwest::header::{ ACCEPT, AUTHORIZATION, CONTENT_TYPE };
use reqwest::{ Method, RequestBuilder, Response, StatusCode };
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use validation::{ Validate, ValidationError };

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not reach the EcoVoice backend at {url}. Make sure the backend is running. ({source})")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("EcoVoice backend returned {status} for {endpoint}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("Unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Validation problems are the user's to fix; everything else means the
    /// request did not go through.
    pub fn is_validation(&self) -> bool {
        matches!(self, BackendError::Validation(_))
    }
}

/// The external EcoVoice REST service behind the report/contact forms and the
/// admin console.
#[async_trait]
pub trait ReportingBackend: Send + Sync {
    async fn submit_report(&self, report: &ReportSubmission) -> Result<ReportReceipt, BackendError>;

    async fn submit_contact(&self, contact: &ContactSubmission) -> Result<(), BackendError>;

    async fn list_reports(&self) -> Result<Vec<Report>, BackendError>;

    async fn list_contacts(&self) -> Result<Vec<Contact>, BackendError>;

    async fn stats(&self) -> Result<Stats, BackendError>;

    async fn update_report_status(
        &self,
        report_id: &str,
        status: ReportStatus
    ) -> Result<(), BackendError>;

    async fn populate_demo(&self) -> Result<(), BackendError>;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let parsed = Url::parse(&config.base_url).map_err(|e|
            BackendError::Config(format!("bad backend URL '{}': {}", config.base_url, e))
        )?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(
                BackendError::Config(format!("backend URL must be http(s): {}", config.base_url))
            );
        }
        let client = reqwest::Client
            ::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base: parsed,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `/api/reports/{id}/status` with the id percent-encoded as one segment.
    fn report_status_url(&self, report_id: &str) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Config(format!("backend URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "reports", report_id, "status"]);
        Ok(url)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.request_url(method, format!("{}{}", self.base_url, endpoint))
    }

    fn request_url(&self, method: Method, url: impl reqwest::IntoUrl + std::fmt::Display) -> RequestBuilder {
        debug!("{} {}", method, url);
        let mut req = self.client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        req
    }

    async fn send(&self, endpoint: &str, req: RequestBuilder) -> Result<Response, BackendError> {
        let resp = req.send().await.map_err(|source| {
            warn!("Request to {} failed: {}", endpoint, source);
            BackendError::Unreachable {
                url: source
                    .url()
                    .map(Url::to_string)
                    .unwrap_or_else(|| format!("{}{}", self.base_url, endpoint)),
                source,
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Backend returned {} for {}: {}", status, endpoint, body);
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, BackendError> {
        let resp = self.send(endpoint, self.request(Method::GET, endpoint)).await?;
        resp.json::<T>().await.map_err(|source| BackendError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ReportingBackend for HttpBackend {
    async fn submit_report(&self, report: &ReportSubmission) -> Result<ReportReceipt, BackendError> {
        report.validate()?;
        let endpoint = "/api/reports";
        let resp = self.send(endpoint, self.request(Method::POST, endpoint).json(report)).await?;
        let receipt = resp.json::<ReportReceipt>().await.map_err(|source| BackendError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;
        info!(
            "Report {} submitted ({}, trust score {})",
            receipt.short_id(),
            report.incident_type,
            receipt.trust_score
        );
        Ok(receipt)
    }

    async fn submit_contact(&self, contact: &ContactSubmission) -> Result<(), BackendError> {
        contact.validate()?;
        let endpoint = "/api/contact";
        self.send(endpoint, self.request(Method::POST, endpoint).json(contact)).await?;
        info!("Contact message from {} sent", contact.email);
        Ok(())
    }

    async fn list_reports(&self) -> Result<Vec<Report>, BackendError> {
        self.get_json("/api/reports").await
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, BackendError> {
        self.get_json("/api/contacts").await
    }

    async fn stats(&self) -> Result<Stats, BackendError> {
        self.get_json("/api/stats").await
    }

    async fn update_report_status(
        &self,
        report_id: &str,
        status: ReportStatus
    ) -> Result<(), BackendError> {
        let url = self.report_status_url(report_id)?;
        let endpoint = url.path().to_string();
        let req = self
            .request_url(Method::PATCH, url)
            .query(&[("status", status.as_str())]);
        self.send(&endpoint, req).await?;
        info!("Report {} moved to {}", report_id, status);
        Ok(())
    }

    async fn populate_demo(&self) -> Result<(), BackendError> {
        let endpoint = "/api/demo/populate";
        self.send(endpoint, self.request(Method::POST, endpoint)).await?;
        info!("Demo data populated");
        Ok(())
    }
}
