use std::{
    fmt,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::layer::layer_name::{InvalidLayerName, LayerCatalog, LayerName};

/// Where the layers live. Rendered into a GDAL connection string.
#[derive(Deserialize, Clone)]
pub enum Datasource {
    Postgres {
        host: String,
        dbname: String,
        user: String,
        #[serde(default)]
        password: String,
        #[serde(default = "default_port")]
        port: u16,
    },
    GeoPackage {
        filepath: PathBuf,
    },
}

fn default_port() -> u16 {
    5432
}

impl Datasource {
    pub fn connection_string(&self) -> String {
        match self {
            Datasource::Postgres {
                host,
                dbname,
                user,
                password,
                port,
            } => {
                let mut parts = vec![
                    format!("host={}", quote_conninfo_value(host)),
                    format!("dbname={}", quote_conninfo_value(dbname)),
                    format!("user={}", quote_conninfo_value(user)),
                ];
                if !password.is_empty() {
                    parts.push(format!("password={}", quote_conninfo_value(password)));
                }
                parts.push(format!("port={}", port));
                format!("PG:{}", parts.join(" "))
            }
            Datasource::GeoPackage { filepath } => filepath.to_string_lossy().into_owned(),
        }
    }

    /// Human readable description, safe to log.
    pub fn describe(&self) -> String {
        match self {
            Datasource::Postgres {
                host, dbname, port, ..
            } => format!("PostgreSQL database {} on {}:{}", dbname, host, port),
            Datasource::GeoPackage { filepath } => format!("GeoPackage {:?}", filepath),
        }
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Quote a libpq connection parameter when it is empty or contains spaces, quotes or
/// backslashes.
fn quote_conninfo_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub datasource: Datasource,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Tables that may be served by `GET /api/{layer}`.
    pub layers: Vec<String>,
    #[serde(default = "default_business_table")]
    pub business_table: String,
    pub static_dir: Option<PathBuf>,
}

fn default_listen_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_business_table() -> String {
    "business".to_string()
}

impl Config {
    pub fn from_file(filepath: &Path) -> anyhow::Result<Self> {
        if !filepath.exists() {
            return Err(anyhow!("Config file {:?} not found", filepath));
        }
        let contents = read_to_string(filepath)
            .with_context(|| format!("Reading config file {:?}", filepath))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.layer_catalog()?;
        config.business_table()?;
        Ok(config)
    }

    pub fn layer_catalog(&self) -> Result<LayerCatalog, InvalidLayerName> {
        LayerCatalog::new(&self.layers)
    }

    pub fn business_table(&self) -> Result<LayerName, InvalidLayerName> {
        LayerName::parse(&self.business_table)
    }
}
