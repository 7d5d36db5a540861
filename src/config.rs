//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_HOST: &str = "127.0.0.1";
    pub const DEV_PORT: u16 = 8080;
    pub const DEV_CRAWLER_URL: &str = "http://127.0.0.1:9000";
    pub const DEV_LLM_API_URL: &str = "http://127.0.0.1:11434/v1";

    pub const LLM_MODEL: &str = "gpt-4o-mini";
    pub const STEP_TIMEOUT_SECS: u64 = 300; // Per crawl / per element
    pub const ANALYZE_CONCURRENCY: usize = 10; // Concurrent writer calls per job
    pub const POLL_INTERVAL_MS: u64 = 2000;
    pub const JOB_RETENTION_HOURS: u64 = 24;
    pub const CLEANUP_INTERVAL_SECS: u64 = 3600;
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Language model endpoint used to write test cases.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_url: String,
    /// Bearer key, if the endpoint needs one
    pub api_key: Option<SecretString>,
    pub model: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory for static frontend assets (production only)
    pub static_dir: Option<PathBuf>,
    /// Maximum pipelines running at once (default: CPU count)
    pub max_concurrent_jobs: usize,
    /// Timeout for each collaborator call in seconds (default: 300)
    pub step_timeout_secs: u64,
    /// Concurrent test case writer calls within one job (default: 10)
    pub analyze_concurrency: usize,
    /// Poll interval for job watchers in milliseconds (default: 2000)
    pub poll_interval_ms: u64,
    /// How long finished jobs stay in memory, in hours (default: 24)
    pub job_retention_hours: u64,
    /// How often finished jobs are evicted, in seconds (default: 3600)
    pub cleanup_interval_secs: u64,
    /// Crawler service base URL
    pub crawler_url: Option<String>,
    /// Test case writer endpoint
    pub llm: LlmConfig,
    /// PDF renderer base URL; PDF export is disabled without it
    pub pdf_renderer_url: Option<String>,
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    error: &'static str,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(error)),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development):
    /// - All variables have sensible defaults
    /// - Only RUST_ENV is required
    ///
    /// In production mode (RUST_ENV=production):
    /// - QADOC_CRAWLER_URL and QADOC_LLM_API_URL are required
    /// - QADOC_LLM_API_KEY is required
    /// - Server will NOT start if using development defaults
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `QADOC_HOST`: Server host (default: 127.0.0.1)
    /// - `QADOC_PORT`: Server port (default: 8080)
    /// - `QADOC_STATIC_DIR`: Static assets directory for production
    /// - `QADOC_MAX_CONCURRENT_JOBS`: Max concurrently running jobs (default: CPU count)
    /// - `QADOC_STEP_TIMEOUT_SECS`: Timeout per crawl or writer call (default: 300)
    /// - `QADOC_ANALYZE_CONCURRENCY`: Concurrent writer calls per job (default: 10)
    /// - `QADOC_POLL_INTERVAL_MS`: Job watcher poll interval (default: 2000)
    /// - `QADOC_JOB_RETENTION_HOURS`: Hours finished jobs are kept (default: 24)
    /// - `QADOC_CLEANUP_INTERVAL_SECS`: Seconds between evictions (default: 3600)
    /// - `QADOC_CRAWLER_URL`: Crawler service base URL
    /// - `QADOC_LLM_API_URL`: OpenAI-compatible API base URL
    /// - `QADOC_LLM_API_KEY`: API key for the LLM endpoint
    /// - `QADOC_LLM_MODEL`: Model name (default: gpt-4o-mini)
    /// - `QADOC_PDF_RENDERER_URL`: PDF renderer base URL (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Parse environment - required
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let dev_default = |value: &str| environment.is_development().then(|| value.to_string());

        let host = env::var("QADOC_HOST").unwrap_or_else(|_| defaults::DEV_HOST.to_string());

        let port = parse_var(
            "QADOC_PORT",
            defaults::DEV_PORT,
            "QADOC_PORT must be a valid port number",
        )?;

        let static_dir = env::var("QADOC_STATIC_DIR").ok().map(PathBuf::from);

        let max_concurrent_jobs = parse_var(
            "QADOC_MAX_CONCURRENT_JOBS",
            num_cpus::get(),
            "QADOC_MAX_CONCURRENT_JOBS must be a valid number",
        )?;

        let step_timeout_secs = parse_var(
            "QADOC_STEP_TIMEOUT_SECS",
            defaults::STEP_TIMEOUT_SECS,
            "QADOC_STEP_TIMEOUT_SECS must be a valid number",
        )?;

        let analyze_concurrency = parse_var(
            "QADOC_ANALYZE_CONCURRENCY",
            defaults::ANALYZE_CONCURRENCY,
            "QADOC_ANALYZE_CONCURRENCY must be a valid number",
        )?;

        let poll_interval_ms = parse_var(
            "QADOC_POLL_INTERVAL_MS",
            defaults::POLL_INTERVAL_MS,
            "QADOC_POLL_INTERVAL_MS must be a valid number",
        )?;

        let job_retention_hours = parse_var(
            "QADOC_JOB_RETENTION_HOURS",
            defaults::JOB_RETENTION_HOURS,
            "QADOC_JOB_RETENTION_HOURS must be a valid number",
        )?;

        let cleanup_interval_secs = parse_var(
            "QADOC_CLEANUP_INTERVAL_SECS",
            defaults::CLEANUP_INTERVAL_SECS,
            "QADOC_CLEANUP_INTERVAL_SECS must be a valid number",
        )?;

        let crawler_url =
            non_empty_var("QADOC_CRAWLER_URL").or_else(|| dev_default(defaults::DEV_CRAWLER_URL));

        let llm = LlmConfig {
            api_url: non_empty_var("QADOC_LLM_API_URL")
                .or_else(|| dev_default(defaults::DEV_LLM_API_URL))
                .ok_or(ConfigError::MissingEnvVar("QADOC_LLM_API_URL"))?,
            api_key: non_empty_var("QADOC_LLM_API_KEY").map(SecretString::from),
            model: non_empty_var("QADOC_LLM_MODEL")
                .unwrap_or_else(|| defaults::LLM_MODEL.to_string()),
        };

        let pdf_renderer_url = non_empty_var("QADOC_PDF_RENDERER_URL");

        let config = Config {
            environment,
            host,
            port,
            static_dir,
            max_concurrent_jobs,
            step_timeout_secs,
            analyze_concurrency,
            poll_interval_ms,
            job_retention_hours,
            cleanup_interval_secs,
            crawler_url,
            llm,
            pdf_renderer_url,
        };

        config.validate()?;

        // Validate production configuration
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Reject values that cannot work in any environment.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue(
                "QADOC_MAX_CONCURRENT_JOBS must be at least 1",
            ));
        }
        if self.analyze_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "QADOC_ANALYZE_CONCURRENCY must be at least 1",
            ));
        }
        if self.step_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "QADOC_STEP_TIMEOUT_SECS must be at least 1",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "QADOC_POLL_INTERVAL_MS must be at least 1",
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "QADOC_CLEANUP_INTERVAL_SECS must be at least 1",
            ));
        }
        Ok(())
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        match self.crawler_url.as_deref() {
            None => errors.push("QADOC_CRAWLER_URL is not set.".to_string()),
            Some(url) if url == defaults::DEV_CRAWLER_URL => errors.push(format!(
                "QADOC_CRAWLER_URL is using development default '{}'. Set the crawler service URL.",
                defaults::DEV_CRAWLER_URL
            )),
            Some(_) => {}
        }

        if self.llm.api_url == defaults::DEV_LLM_API_URL {
            errors.push(format!(
                "QADOC_LLM_API_URL is using development default '{}'. Set the LLM API URL.",
                defaults::DEV_LLM_API_URL
            ));
        }

        if self.llm.api_key.is_none() {
            errors.push("QADOC_LLM_API_KEY is not set.".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
