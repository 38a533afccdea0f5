use clap::ValueEnum;

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:8080",
    "http://localhost:8081",
    "http://localhost:3000",
    "http://localhost:5173",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub environment: Environment,
    pub storage: StorageConfig,
    pub places: PlacesConfig,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Sheets(SheetsConfig),
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub sheet_id: String,
    pub credentials: CredentialsSource,
    pub api_base: String,
    pub token_url: String,
}

#[derive(Clone)]
pub enum CredentialsSource {
    Inline {
        client_email: String,
        private_key: String,
    },
    File(PathBuf),
    Missing,
}

impl fmt::Debug for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsSource::Inline { client_email, .. } => f
                .debug_struct("Inline")
                .field("client_email", client_email)
                .field("private_key", &"<redacted>")
                .finish(),
            CredentialsSource::File(path) => f.debug_tuple("File").field(path).finish(),
            CredentialsSource::Missing => f.write_str("Missing"),
        }
    }
}

#[derive(Clone)]
pub struct PlacesConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl AppConfig {
    pub fn storage_name(&self) -> &'static str {
        match self.storage {
            StorageConfig::Memory => "memory",
            StorageConfig::Sheets(_) => "sheets",
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: crate::places::DEFAULT_SEARCH_TEXT_URL.to_string(),
        }
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            environment: Environment::Development,
            storage: StorageConfig::Memory,
            places: PlacesConfig::default(),
        }
    }
}
