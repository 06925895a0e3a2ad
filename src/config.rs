use serde::Deserialize;
use std::path::Path;
use std::env;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Where drafts live: the repository and the endpoints used to reach it.
#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    pub raw_base: String,
    pub owner: String,
    pub repo: String,
    pub per_page: u8,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub github: GitHubConfig,
    pub site_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub use_secure_cookies: bool,
    // Secrets stay optional here; each one is required at its point of use.
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

/// Reads an environment variable, treating blank values as unset.
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        Self::from_process_env()
    }

    /// Builds the configuration from whatever is already in the process environment.
    pub fn from_process_env() -> Result<Self, config::ConfigError> {
        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let owner = optional_env("GITHUB_OWNER");
        if let Some(owner) = &owner {
            if !owner.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.') {
                return Err(config::ConfigError::Message(format!(
                    "FATAL: 'GITHUB_OWNER' contains invalid characters ('{}').", owner
                )));
            }
        }

        let builder = config::Config::builder()
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override_option("github.owner", owner)?
            .set_override_option("github.repo", optional_env("GITHUB_REPO"))?
            .set_override_option("github.token", optional_env("GITHUB_PAT"))?
            .set_override_option("site_url", optional_env("SITE_URL"))?
            .set_override_option("session_secret", optional_env("DRAFT_ADMIN_SECRET"))?
            .set_override_option("admin_username", optional_env("DRAFT_ADMIN_USER"))?
            .set_override_option("admin_password", optional_env("DRAFT_ADMIN_PASS"))?
            .build()?;

        let config: Config = builder.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        for (key, value) in [
            ("github.api_base", &self.github.api_base),
            ("github.raw_base", &self.github.raw_base),
            ("site_url", &self.site_url),
        ] {
            if Url::parse(value).is_err() {
                return Err(config::ConfigError::Message(format!(
                    "FATAL: '{}' is not a valid absolute URL ('{}').", key, value
                )));
            }
        }

        if self.github.per_page == 0 || self.github.per_page > 100 {
            return Err(config::ConfigError::Message(
                "FATAL: 'github.per_page' must be between 1 and 100.".to_string()
            ));
        }

        Ok(())
    }

    /// Names of the settings that are unset and will fail the operations that need them.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.session_secret.is_none() {
            missing.push("DRAFT_ADMIN_SECRET");
        }
        if self.admin_username.is_none() {
            missing.push("DRAFT_ADMIN_USER");
        }
        if self.admin_password.is_none() {
            missing.push("DRAFT_ADMIN_PASS");
        }
        if self.github.token.is_none() {
            missing.push("GITHUB_PAT");
        }
        missing
    }

    /// Public URL of a published insight.
    pub fn live_url(&self, slug: &str) -> String {
        format!("{}/insights/{}", self.site_url.trim_end_matches('/'), slug)
    }
}

/// Fully populated configuration pointing at an unreachable host.
#[cfg(any(test, feature = "test-support"))]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
            github: GitHubConfig {
                api_base: "https://api.example.com".to_string(),
                raw_base: "https://raw.example.com".to_string(),
                owner: "acme".to_string(),
                repo: "site".to_string(),
                per_page: 50,
                token: Some("test-token".to_string()),
            },
            site_url: "https://example.com".to_string(),
            allowed_origins: String::new(),
            log_level: "info".to_string(),
            use_secure_cookies: true,
            session_secret: Some("test-secret".to_string()),
            admin_username: Some("editor".to_string()),
            admin_password: Some("hunter2".to_string()),
        }
    }
}
