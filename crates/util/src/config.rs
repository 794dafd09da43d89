use std::{env, fmt, net::SocketAddr};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://contact.db?mode=rwc";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_SUBJECT: &str = "New message from the contact form";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Transport security for the outgoing mail relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    Tls,
    StartTls,
    None,
}

impl SmtpSecurity {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "none" | "plain" => Ok(Self::None),
            other => Err(ConfigError::InvalidSmtpSecurity(other.to_string())),
        }
    }

    /// Port 465 speaks TLS from the first byte; anything else is upgraded.
    fn default_for_port(port: u16) -> Self {
        if port == 465 {
            Self::Tls
        } else {
            Self::StartTls
        }
    }
}

/// SMTP relay settings. Present only when `SMTP_HOST` is set.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub recipient: String,
    pub subject: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .finish()
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = non_empty_var("SMTP_HOST") else {
            return Ok(None);
        };

        let port = match non_empty_var("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidSmtpPort(raw))?,
            None => DEFAULT_SMTP_PORT,
        };
        let security = match non_empty_var("SMTP_SECURITY") {
            Some(raw) => SmtpSecurity::parse(&raw)?,
            None => SmtpSecurity::default_for_port(port),
        };
        let username = non_empty_var("SMTP_USER");
        let password = non_empty_var("SMTP_PASSWORD");
        let from = non_empty_var("SMTP_FROM")
            .or_else(|| username.clone())
            .ok_or(ConfigError::MissingVar("SMTP_FROM"))?;
        let recipient = non_empty_var("ADMIN_EMAIL").ok_or(ConfigError::MissingVar("ADMIN_EMAIL"))?;
        let subject =
            non_empty_var("SMTP_SUBJECT").unwrap_or_else(|| DEFAULT_SMTP_SUBJECT.to_string());

        Ok(Some(Self {
            host,
            port,
            security,
            username,
            password,
            from,
            recipient,
            subject,
        }))
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    /// Reads `.env` when present, then resolves the configuration.
    ///
    /// A missing dotenv file is not an error; production deployments set the
    /// variables directly.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = env::var("APP_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(ConfigError::BindAddress)?;
        let database_url =
            non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let cors_origins = parse_origins(
            &env::var("APP_CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
        );
        let smtp = SmtpConfig::from_env()?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            cors_origins,
            smtp,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidSmtpPort(String),
    InvalidSmtpSecurity(String),
    MissingVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidSmtpPort(value) => {
                write!(f, "SMTP_PORT must be a port number (got {value})")
            }
            Self::InvalidSmtpSecurity(value) => write!(
                f,
                "SMTP_SECURITY must be one of 'tls', 'starttls', or 'none' (got {value})"
            ),
            Self::MissingVar(name) => write!(f, "{name} must be set when SMTP_HOST is set"),
        }
    }
}

impl std::error::Error for ConfigError {}
