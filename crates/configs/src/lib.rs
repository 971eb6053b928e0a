use std::time::Duration;

use anyhow::{anyhow, Result};
use common::env::{parse_flag, parse_or};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub rest_port: u16,
    pub grpc_port: u16,
    pub worker_threads: Option<usize>,
    pub request_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub seed_sample_notes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            rest_port: 8080,
            grpc_port: 8081,
            worker_threads: None,
            request_timeout_ms: 30_000,
            shutdown_timeout_ms: 5_000,
            seed_sample_notes: true,
        }
    }
}

/// Which backend to use plus the connection settings of every backend.
/// `backend` stays a plain string here; the service layer parses it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: String,
    pub couchdb: CouchDbConfig,
    pub mongodb: MongoDbConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: "memory".into(), couchdb: CouchDbConfig::default(), mongodb: MongoDbConfig::default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CouchDbConfig {
    pub url: String,
    pub database: String,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for CouchDbConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5984".into(),
            database: "notes".into(),
            connect_attempts: 10,
            connect_backoff_ms: 2_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl CouchDbConfig {
    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub connect_timeout_ms: u64,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".into(),
            database: "notes".into(),
            collection: "notes".into(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl MongoDbConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// File (if present) -> environment overrides -> validation.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_missing_file(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.apply_overrides(common::env::var);
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Apply environment-style overrides. `lookup` returns `None` for unset keys.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = &mut self.server;
        if let Some(host) = lookup("SERVER_HOST") {
            s.host = host;
        }
        s.rest_port = parse_or("REST_PORT", lookup("REST_PORT"), s.rest_port);
        s.grpc_port = parse_or("GRPC_PORT", lookup("GRPC_PORT"), s.grpc_port);
        if let Some(raw) = lookup("TOKIO_WORKER_THREADS") {
            s.worker_threads = raw.trim().parse::<usize>().ok().or(s.worker_threads);
        }
        s.request_timeout_ms = parse_or("REQUEST_TIMEOUT_MS", lookup("REQUEST_TIMEOUT_MS"), s.request_timeout_ms);
        s.shutdown_timeout_ms = parse_or("SHUTDOWN_TIMEOUT_MS", lookup("SHUTDOWN_TIMEOUT_MS"), s.shutdown_timeout_ms);
        if let Some(flag) = lookup("SEED_SAMPLE_NOTES").as_deref().and_then(parse_flag) {
            s.seed_sample_notes = flag;
        }

        let st = &mut self.storage;
        if let Some(backend) = lookup("STORAGE_TYPE") {
            st.backend = backend;
        }
        if let Some(url) = lookup("COUCHDB_URL") {
            st.couchdb.url = url;
        }
        if let Some(db) = lookup("COUCHDB_DB") {
            st.couchdb.database = db;
        }
        st.couchdb.connect_attempts =
            parse_or("COUCHDB_CONNECT_ATTEMPTS", lookup("COUCHDB_CONNECT_ATTEMPTS"), st.couchdb.connect_attempts);
        st.couchdb.connect_backoff_ms =
            parse_or("COUCHDB_CONNECT_BACKOFF_MS", lookup("COUCHDB_CONNECT_BACKOFF_MS"), st.couchdb.connect_backoff_ms);
        st.couchdb.connect_timeout_ms =
            parse_or("COUCHDB_CONNECT_TIMEOUT_MS", lookup("COUCHDB_CONNECT_TIMEOUT_MS"), st.couchdb.connect_timeout_ms);
        if let Some(uri) = lookup("MONGODB_URI") {
            st.mongodb.uri = uri;
        }
        if let Some(db) = lookup("MONGODB_DB") {
            st.mongodb.database = db;
        }
        if let Some(collection) = lookup("MONGODB_COLLECTION") {
            st.mongodb.collection = collection;
        }
        st.mongodb.connect_timeout_ms =
            parse_or("MONGODB_CONNECT_TIMEOUT_MS", lookup("MONGODB_CONNECT_TIMEOUT_MS"), st.mongodb.connect_timeout_ms);
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.normalize()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "0.0.0.0".to_string();
        }
        if self.rest_port == 0 || self.grpc_port == 0 {
            return Err(anyhow!("server ports must be in 1..=65535"));
        }
        if self.worker_threads == Some(0) {
            self.worker_threads = None;
        }
        if self.request_timeout_ms == 0 || self.shutdown_timeout_ms == 0 {
            return Err(anyhow!("server timeouts must be positive milliseconds"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn rest_addr(&self) -> String {
        format!("{}:{}", self.host, self.rest_port)
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }
}

impl StorageConfig {
    fn normalize(&mut self) -> Result<()> {
        self.backend = self.backend.trim().to_ascii_lowercase();
        if self.backend.is_empty() {
            self.backend = "memory".into();
        }
        if self.couchdb.connect_attempts == 0 {
            return Err(anyhow!("storage.couchdb.connect_attempts must be >= 1"));
        }
        if self.couchdb.connect_timeout_ms == 0 || self.mongodb.connect_timeout_ms == 0 {
            return Err(anyhow!("storage connect timeouts must be positive milliseconds"));
        }
        if self.couchdb.database.trim().is_empty() || self.mongodb.database.trim().is_empty() {
            return Err(anyhow!("storage database names must not be empty"));
        }
        if self.mongodb.collection.trim().is_empty() {
            return Err(anyhow!("storage.mongodb.collection must not be empty"));
        }
        Ok(())
    }
}

fn is_missing_file(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}
