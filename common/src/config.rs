// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use config::{Config as ConfigFile, ConfigError, File, Environment};

/// Secret used when nothing is configured. Fine for local runs only.
pub const DEV_JWT_SECRET: &str = "dev_secret";

/// Central configuration for the verification server and the session client
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    pub log_level: String,

    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub client: ClientConfig,
}

/// How the endpoint produces the token it hands back after a successful verification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Echo the submitted signature back as the token
    Signature,
    /// Mint a short-lived HS256 session token
    Jwt,
}

/// How embedded-host (SIWF) assertions are checked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostVerificationMode {
    /// Only the message shape is validated
    ShapeOnly,
    /// Recover the signer and check it is authorized for the claimed FID
    Signature,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Domain the app is served from; used as token audience and SIWF domain
    pub domain: String,
    pub token_mode: TokenMode,
    pub jwt_secret: String,
    pub token_ttl_seconds: u64,
    pub host_verification: HostVerificationMode,
    /// FID -> addresses allowed to sign on its behalf (custody or auth addresses)
    pub fid_signers: HashMap<String, Vec<String>>,
    /// Ed25519 public key (PEM) for host-issued quick auth tokens
    pub quick_auth_public_key_pem: Option<String>,
    pub quick_auth_issuer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: usize,
    pub window_seconds: u64,
    pub paths: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin of the verification endpoint, e.g. https://app.example.com
    pub backend_origin: String,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    /// Directory backing the session slot; in-memory when unset
    pub storage_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            log_level: "info".to_string(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: "devroyale.xyz".to_string(),
            token_mode: TokenMode::Jwt,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_seconds: 86400,
            host_verification: HostVerificationMode::Signature,
            fid_signers: HashMap::new(),
            quick_auth_public_key_pem: None,
            quick_auth_issuer: "https://auth.farcaster.xyz".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_seconds: 60,
            paths: vec!["/api/auth".to_string()],
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_origin: "http://127.0.0.1:8081".to_string(),
            poll_interval_ms: 100,
            poll_attempts: 100,
            storage_dir: None,
        }
    }
}

impl AuthConfig {
    /// Addresses registered for a FID, lowercased
    pub fn signers_for(&self, fid: u64) -> Vec<String> {
        self.fid_signers
            .get(&fid.to_string())
            .map(|addrs| addrs.iter().map(|a| a.trim().to_lowercase()).collect())
            .unwrap_or_default()
    }

    /// Signature mode with an empty signer registry: every SIWF assertion
    /// is refused and embedded users always fall back to the wallet
    pub fn rejects_all_host_sign_ins(&self) -> bool {
        self.host_verification == HostVerificationMode::Signature
            && self.fid_signers.values().all(|signers| signers.is_empty())
    }
}

impl Config {
    /// `RUN_MODE`, defaulting to "development"
    pub fn run_mode() -> String {
        env::var("RUN_MODE").unwrap_or_else(|_| "development".into())
    }

    /// `CONFIG_DIR`, else `./config` from the project root or `../config` from a subcrate
    pub fn config_dir() -> PathBuf {
        env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            })
    }

    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_dir(), &Self::run_mode())
    }

    /// default.toml, `<run_mode>`.toml and local.toml from `dir`, then `APP__` variables
    pub fn load_from(dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        ConfigFile::builder()
            .add_source(File::from(dir.join("default.toml")).required(false))
            .add_source(File::from(dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(dir.join("local.toml")).required(false))
            // APP__AUTH__JWT_SECRET=... style overrides
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Plain environment variables over the defaults, for when the files can't be loaded
    pub fn from_env_vars() -> Self {
        let defaults = Self::default();

        let web_server_addr = env::var("WEB_SERVER_ADDR")
            .unwrap_or(defaults.web_server_addr);

        let log_level = env::var("LOG_LEVEL")
            .unwrap_or(defaults.log_level);

        let domain = env::var("QUICK_AUTH_DOMAIN")
            .unwrap_or(defaults.auth.domain);

        let token_mode = match env::var("AUTH_TOKEN_MODE").map(|v| v.to_lowercase()) {
            Ok(v) if v == "signature" => TokenMode::Signature,
            _ => defaults.auth.token_mode,
        };

        let host_verification = match env::var("AUTH_HOST_VERIFICATION").map(|v| v.to_lowercase()) {
            Ok(v) if v == "shape_only" => HostVerificationMode::ShapeOnly,
            _ => defaults.auth.host_verification,
        };

        let jwt_secret = env::var("AUTH_JWT_SECRET")
            .unwrap_or(defaults.auth.jwt_secret);

        let token_ttl_seconds = env::var("AUTH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.auth.token_ttl_seconds);

        let rate_limit_enabled = env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(defaults.rate_limit.enabled);

        let backend_origin = env::var("BACKEND_ORIGIN")
            .unwrap_or(defaults.client.backend_origin);

        let storage_dir = env::var("SESSION_STORAGE_DIR").ok();

        Self {
            web_server_addr,
            log_level,
            auth: AuthConfig {
                domain,
                token_mode,
                jwt_secret,
                token_ttl_seconds,
                host_verification,
                quick_auth_public_key_pem: env::var("QUICK_AUTH_PUBLIC_KEY_PEM").ok(),
                ..defaults.auth
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                ..defaults.rate_limit
            },
            client: ClientConfig {
                backend_origin,
                storage_dir,
                ..defaults.client
            },
        }
    }

    /// Log settings that are only acceptable for local development
    pub fn warn_on_dev_defaults(&self) {
        let run_mode = Self::run_mode();
        if run_mode != "development" && self.auth.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("auth.jwt_secret is the development default in run mode {}", run_mode);
        }
        if self.auth.host_verification == HostVerificationMode::ShapeOnly {
            tracing::warn!("SIWF assertions are checked for shape only; signatures are not verified");
        }
        if self.auth.rejects_all_host_sign_ins() {
            tracing::warn!(
                "auth.fid_signers is empty: every embedded host sign-in will be rejected and fall back to the wallet"
            );
        }
    }
}
