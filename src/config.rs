//! Configuration file support
//!
//! Settings are read from TOML. Every section and key is optional:
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//! accept_invalid_certs = false
//!
//! [endpoints]
//! ecb_url = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist.xml"
//!
//! [declaration]
//! currency = "SEK"
//!
//! [storage]
//! root = "/data/buckets"
//! ```

use crate::commodity::TARIFF_API_URL;
use crate::country::COUNTRIES_API_URL;
use crate::error::{IntrastatError, Result};
use crate::fx::ecb::ECB_HIST_URL;
use crate::population::POPULATION_API_URL;
use crate::vatr::VAT_RATES_URL;
use crate::vies::{B2C_VAT_PLACEHOLDER, VIES_API_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-client HTTP settings. TLS verification is decided here, per client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    /// Skip certificate verification for this client only
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            accept_invalid_certs: false,
            user_agent: concat!("rusty-intrastat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Remote services used by the collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub ecb_url: String,
    pub tariff_url: String,
    pub vies_url: String,
    pub countries_url: String,
    pub population_url: String,
    pub vat_rates_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ecb_url: ECB_HIST_URL.to_string(),
            tariff_url: TARIFF_API_URL.to_string(),
            vies_url: VIES_API_URL.to_string(),
            countries_url: COUNTRIES_API_URL.to_string(),
            population_url: POPULATION_API_URL.to_string(),
            vat_rates_url: VAT_RATES_URL.to_string(),
        }
    }
}

/// Declaration output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclarationSettings {
    /// Currency the EUR net amounts are converted into
    pub currency: String,
    /// Partner VAT reported for business-to-consumer transactions
    pub b2c_vat_placeholder: String,
}

impl Default for DeclarationSettings {
    fn default() -> Self {
        Self {
            currency: "SEK".to_string(),
            b2c_vat_placeholder: B2C_VAT_PLACEHOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding one sub-directory per bucket
    pub root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_home().join("buckets"),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpSettings,
    pub endpoints: Endpoints,
    pub declaration: DeclarationSettings,
    pub storage: StorageSettings,
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rusty-intrastat")
}

/// Location of the configuration file used when none is given
pub fn default_config_path() -> PathBuf {
    default_home().join("config.toml")
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| IntrastatError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load an explicit config file, or the default one if it exists, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    IntrastatError::ConfigError(format!(
                        "Failed to read config {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&contents)
            }
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    log::debug!("Loading config from {}", default_path.display());
                    let contents = fs::read_to_string(&default_path)?;
                    Self::from_toml_str(&contents)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
