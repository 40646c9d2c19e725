//! Harness configuration
//!
//! Everything here comes from environment variables; the harness is launched
//! by graders and CI jobs that set those rather than writing config files.

use std::env;

/// Base URL of the production reporting API
const PROD_API_URL: &str = "https://dpwumtpjesedslulexqz.supabase.co";
/// Base URL of a locally running reporting API
const LOCAL_API_URL: &str = "http://127.0.0.1:54321";

const PROD_FRONTEND_URL: &str = "https://buildium-frontend-amd.onrender.com";
const LOCAL_FRONTEND_URL: &str = "http://localhost:5173";

/// Deployment the harness reports to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Hosted backend and frontend
    Production,
    /// Backend and frontend on localhost
    #[default]
    Local,
}

impl Environment {
    /// Parse the `ENVIRONMENT` variable; only `PROD` selects production
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("PROD") => Self::Production,
            _ => Self::Local,
        }
    }

    /// Default reporting API base URL for this environment
    pub fn api_base_url(self) -> &'static str {
        match self {
            Self::Production => PROD_API_URL,
            Self::Local => LOCAL_API_URL,
        }
    }

    /// Link to the project's page in the web frontend
    pub fn project_url(self, project_id: &str) -> String {
        let base = match self {
            Self::Production => PROD_FRONTEND_URL,
            Self::Local => LOCAL_FRONTEND_URL,
        };
        format!("{}/projects/{}", base, project_id)
    }
}

/// Login credentials for the reporting API
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Target deployment
    pub environment: Environment,

    /// Explicit reporting API base URL, overrides the environment default
    pub api_url: Option<String>,

    /// Bearer key sent with every reporting API request
    pub anon_key: String,

    /// Login credentials, `None` unless both email and password are set
    pub credentials: Option<Credentials>,

    /// Raw settle delay override in milliseconds, validated when a step runs
    pub settle_delay: Option<String>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let credentials = match (get("BUILDIUM_EMAIL"), get("BUILDIUM_PASSWORD")) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        Self {
            environment: Environment::from_value(get("ENVIRONMENT").as_deref()),
            api_url: get("BUILDIUM_API_URL"),
            anon_key: get("BUILDIUM_ANON_KEY").unwrap_or_default(),
            credentials,
            settle_delay: get("SERVER_STARTUP_TIME"),
        }
    }

    /// Reporting API base URL, without a trailing slash
    pub fn api_base_url(&self) -> String {
        self.api_url
            .as_deref()
            .unwrap_or(self.environment.api_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}
