use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use reqwest::Url;
use serde::Deserialize;
use std::{env, fmt, path::PathBuf, time::Duration};

/// Centralized application configuration.
///
/// Built once at startup from the config file, `GATEWAY__*` environment
/// variables, `API_TOKEN` and CLI arguments (in increasing precedence), then
/// handed to every component by reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub control_plane: ControlPlaneConfig,
    pub object_store: ObjectStoreConfig,
}

/// Inbound listeners.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub https_port: u16,
    /// Plain HTTP port; only issues permanent redirects to the HTTPS listener.
    pub http_port: u16,
    /// Host name used in redirect `Location` headers.
    pub public_host: String,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
    /// Serve the API over plain HTTP on `http_port` with no TLS listener.
    pub plain_http: bool,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            https_port: 8443,
            http_port: 8442,
            public_host: "127.0.0.1".into(),
            tls_cert: PathBuf::from("certificate/server.crt"),
            tls_key: PathBuf::from("certificate/server.key"),
            plain_http: false,
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Base of every redirect target, e.g. `https://127.0.0.1:8443`.
    pub fn https_origin(&self) -> String {
        format!("https://{}:{}", self.public_host, self.https_port)
    }
}

/// Identity store connection parameters.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".into(),
            port: 5432,
            username: "postgres".into(),
            password: String::new(),
            dbname: "postgres".into(),
            sslmode: "disable".into(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DbConfig {
    /// Connection URL for the sqlx `Any` driver.
    pub fn connect_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let mut url = Url::parse("postgres://localhost").context("building identity store URL")?;
        url.set_host(Some(&self.host))
            .with_context(|| format!("invalid db.host `{}`", self.host))?;
        url.set_port(Some(self.port))
            .map_err(|_| anyhow!("invalid db.port `{}`", self.port))?;
        url.set_username(&self.username)
            .map_err(|_| anyhow!("invalid db.username"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| anyhow!("invalid db.password"))?;
        }
        url.set_path(&self.dbname);
        url.query_pairs_mut().append_pair("sslmode", &self.sslmode);

        Ok(url.to_string())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Quotas attached to every account created through the control plane.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub max_buckets: u32,
    pub max_objects: u64,
    /// Units as defined by the control plane.
    pub max_size: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_buckets: 10,
            max_objects: 10,
            max_size: 1000,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub base_url: String,
    /// Service-account bearer token; `API_TOKEN` overrides the file value.
    pub api_token: String,
    /// Tenant to operate in. When unset, the first tenant listed is used.
    pub tenant: Option<String>,
    pub timeout_secs: u64,
    pub quotas: QuotaConfig,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.clo.ru/v2".into(),
            api_token: String::new(),
            tenant: None,
            timeout_secs: 30,
            quotas: QuotaConfig::default(),
        }
    }
}

impl fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlaneConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("tenant", &self.tenant)
            .field("timeout_secs", &self.timeout_secs)
            .field("quotas", &self.quotas)
            .finish()
    }
}

impl ControlPlaneConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreBackend {
    #[default]
    S3,
    /// In-process store for local development.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub backend: ObjectStoreBackend,
    pub endpoint: String,
    /// Cosmetic for the target store, but required by the SDK signer.
    pub region: String,
    /// Upper bound on waiting for a deleted object to disappear.
    pub delete_wait_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: ObjectStoreBackend::S3,
            endpoint: "https://storage.clo.ru".into(),
            region: "us-west-2".into(),
            delete_wait_secs: 30,
        }
    }
}

impl ObjectStoreConfig {
    pub fn delete_wait(&self) -> Duration {
        Duration::from_secs(self.delete_wait_secs)
    }
}

/// Command-line configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Per-user bucket gateway for an S3-compatible store")]
pub struct Args {
    /// Config file path without extension (format detected from the file found)
    #[arg(long, default_value = "configs/config")]
    pub config: String,

    /// Host to bind to (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// HTTPS port (overrides server.https_port)
    #[arg(long)]
    pub https_port: Option<u16>,

    /// HTTP redirect port (overrides server.http_port)
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Serve the API over plain HTTP, without TLS or redirects
    #[arg(long)]
    pub plain_http: bool,
}

impl AppConfig {
    /// Parse config file + environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::load(Args::parse())
    }

    pub fn load(args: Args) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(&args.config).required(false))
            .add_source(
                ::config::Environment::with_prefix("GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("reading configuration from `{}`", args.config))?;

        let mut cfg: AppConfig = settings
            .try_deserialize()
            .context("deserializing configuration")?;

        match env::var("API_TOKEN") {
            Ok(token) if !token.is_empty() => cfg.control_plane.api_token = token,
            Ok(_) | Err(env::VarError::NotPresent) => {}
            Err(err) => return Err(err).context("reading API_TOKEN"),
        }

        // --- Merge CLI ---
        if let Some(host) = args.host {
            cfg.server.host = host;
        }
        if let Some(port) = args.https_port {
            cfg.server.https_port = port;
        }
        if let Some(port) = args.http_port {
            cfg.server.http_port = port;
        }
        cfg.server.plain_http |= args.plain_http;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.control_plane.api_token.is_empty() {
            bail!("control plane token missing: set API_TOKEN or control_plane.api_token");
        }
        if self.control_plane.base_url.is_empty() {
            bail!("control_plane.base_url must not be empty");
        }
        if self.object_store.backend == ObjectStoreBackend::S3 && self.object_store.endpoint.is_empty()
        {
            bail!("object_store.endpoint must not be empty");
        }
        Ok(())
    }
}
