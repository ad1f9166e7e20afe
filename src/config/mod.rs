use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite,
            other => {
                tracing::warn!("Unknown STORE_BACKEND '{}', using sqlite", other);
                StoreBackend::Sqlite
            }
        }
    }
}

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub batch_concurrency: usize,
    pub generator: GeneratorSettings,
}

/// Names of the shared objects every generation run resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub tenant_name: String,
    pub internal_asn_name: String,
    pub backbone_vrf: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            tenant_name: "Duff".to_string(),
            internal_asn_name: "AS65000".to_string(),
            backbone_vrf: "Backbone".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            store_backend: StoreBackend::parse(&get_env("STORE_BACKEND", "sqlite")),
            db_path: get_env("DB_PATH", "/data/fabric.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            batch_concurrency: get_env("BATCH_CONCURRENCY", "5")
                .parse()
                .unwrap_or(5),
            generator: GeneratorSettings {
                tenant_name: get_env("TENANT_NAME", "Duff"),
                internal_asn_name: get_env("INTERNAL_ASN_NAME", "AS65000"),
                backbone_vrf: get_env("BACKBONE_VRF", "Backbone"),
            },
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
