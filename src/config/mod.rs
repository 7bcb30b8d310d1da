use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix for environment variables that become init parameters
pub const INIT_PARAMETER_PREFIX: &str = "BESPIN_INIT_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
    /// Server-wide named values handed to every request context
    pub init_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure_cookie: bool,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Any username is accepted without a password
    None,
    /// Redirect to an external identity provider and verify on callback
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub provider: AuthProvider,
    pub login_url: Option<String>,
    pub verify_url: Option<String>,
    pub return_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_cors: bool,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to read init parameter file {path}: {source}")]
    InitFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse init parameter file {path}: {source}")]
    InitFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("BESPIN_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("BESPIN_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(v));
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Ok(v) = env::var("SESSION_SECURE_COOKIE") {
            self.session.secure_cookie = v.parse().unwrap_or(self.session.secure_cookie);
        }
        if let Ok(v) = env::var("SESSION_IDLE_TIMEOUT_SECS") {
            self.session.idle_timeout_secs = v.parse().unwrap_or(self.session.idle_timeout_secs);
        }

        // Auth overrides
        match env::var("AUTH_PROVIDER").as_deref() {
            Ok("external") => self.auth.provider = AuthProvider::External,
            Ok("none") => self.auth.provider = AuthProvider::None,
            Ok(other) => tracing::warn!("Ignoring unknown AUTH_PROVIDER '{}'", other),
            Err(_) => {}
        }
        if let Ok(v) = env::var("AUTH_LOGIN_URL") {
            self.auth.login_url = Some(v);
        }
        if let Ok(v) = env::var("AUTH_VERIFY_URL") {
            self.auth.verify_url = Some(v);
        }
        if let Ok(v) = env::var("AUTH_RETURN_URL") {
            self.auth.return_url = Some(v);
        }
        if let Ok(v) = env::var("AUTH_TIMEOUT_SECS") {
            self.auth.timeout_secs = v.parse().unwrap_or(self.auth.timeout_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Init parameters: file first, then individual env vars win
        if let Ok(path) = env::var("BESPIN_PARAMETERS_FILE") {
            match load_init_file(Path::new(&path)) {
                Ok(params) => self.init_parameters.extend(params),
                Err(e) => tracing::warn!("{}", e),
            }
        }
        self.init_parameters.extend(init_parameters_from_vars(env::vars()));

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                static_dir: None,
            },
            session: SessionConfig {
                cookie_name: "BESPIN_SESSION".to_string(),
                secure_cookie: false,
                idle_timeout_secs: 60 * 60 * 24, // 1 day
            },
            auth: AuthConfig::pass_through(),
            api: ApiConfig {
                enable_cors: true,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            init_parameters: HashMap::new(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                static_dir: None,
            },
            session: SessionConfig {
                cookie_name: "BESPIN_SESSION".to_string(),
                secure_cookie: true,
                idle_timeout_secs: 60 * 60 * 2,
            },
            auth: AuthConfig::pass_through(),
            api: ApiConfig {
                enable_cors: false,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            init_parameters: HashMap::new(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                static_dir: None,
            },
            session: SessionConfig {
                cookie_name: "BESPIN_SESSION".to_string(),
                secure_cookie: true,
                idle_timeout_secs: 60 * 30, // 30 minutes
            },
            auth: AuthConfig::pass_through(),
            api: ApiConfig {
                enable_cors: false,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            init_parameters: HashMap::new(),
        }
    }
}

impl AuthConfig {
    fn pass_through() -> Self {
        Self {
            provider: AuthProvider::None,
            login_url: None,
            verify_url: None,
            return_url: None,
            timeout_secs: 10,
        }
    }
}

/// Read a YAML map of init parameters (`key: value` pairs)
pub fn load_init_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::InitFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::InitFileParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect `BESPIN_INIT_<KEY>=value` pairs as lower-cased `key -> value`
pub fn init_parameters_from_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(INIT_PARAMETER_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_lowercase(), value))
        })
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
