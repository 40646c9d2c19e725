//! HTTP client for the Buildium reporting API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::config::{Config, Credentials};
use crate::common::{Error, Result};
use crate::runlog::LogEntry;

use super::Reporter;

const LOGIN_PATH: &str = "/functions/v1/login";
const CREATE_RUN_PATH: &str = "/functions/v1/create-project-run";
const TOKEN_HEADER: &str = "x-buildium-token";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRun<'a> {
    project_id: &'a str,
    stage: i64,
    logs_json: &'a [LogEntry],
    token: &'a str,
}

/// Client for the reporting API
#[derive(Debug)]
pub struct BuildiumClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    credentials: Option<Credentials>,
    token: Option<String>,
}

impl BuildiumClient {
    pub fn new(config: &Config) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Build a client around a preconfigured `reqwest::Client`
    pub fn with_http_client(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.api_base_url(),
            anon_key: config.anon_key.clone(),
            credentials: config.credentials.clone(),
            token: None,
        }
    }

    /// Session token from the last successful login
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Reporter for BuildiumClient {
    async fn authenticate(&mut self) -> Result<()> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            Error::Authentication("BUILDIUM_EMAIL and BUILDIUM_PASSWORD must be set".to_string())
        })?;

        debug!(email = %credentials.email, "logging in");
        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .bearer_auth(&self.anon_key)
            .json(&LoginRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Authentication(format!(
                "failed to login: {}",
                status.as_u16()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("invalid login response: {}", e)))?;
        self.token = Some(body.token);

        info!("logged in to reporting API");
        Ok(())
    }

    async fn report_run(
        &self,
        project_id: &str,
        completed_stage: i64,
        logs: &[LogEntry],
    ) -> Result<()> {
        let token = self.token.as_deref().unwrap_or_default();

        let response = self
            .http
            .post(self.url(CREATE_RUN_PATH))
            .header(TOKEN_HEADER, token)
            .bearer_auth(&self.anon_key)
            .json(&ProjectRun {
                project_id,
                stage: completed_stage,
                logs_json: logs,
                token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Reporting(format!("{}: {}", status.as_u16(), body)));
        }

        info!(project_id, completed_stage, entries = logs.len(), "reported run");
        Ok(())
    }
}
