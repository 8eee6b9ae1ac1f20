use crate::types::{City, CityCatalog};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub map: MapConfig,
    pub cities: Vec<City>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    /// Base URL of the listings API, e.g. `http://localhost:8080/api`.
    pub api_base: String,
    /// Either an `http(s)://` base URL or a local directory holding the `.geojson` assets.
    pub geo_base: String,
    pub default_city: String,
    pub fallback_city: String,
    #[serde(default = "default_resize_delay_ms")]
    pub resize_delay_ms: u64,
    #[serde(default = "default_listing_route")]
    pub listing_route: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Served under `/geo` when set.
    pub geo_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            geo_dir: None,
        }
    }
}

fn default_resize_delay_ms() -> u64 {
    500
}

fn default_listing_route() -> String {
    "/properties".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cities.is_empty() {
            bail!("At least one [[cities]] entry is required");
        }
        let mut seen = HashSet::new();
        for city in &self.cities {
            if !seen.insert(city.name.as_str()) {
                bail!("City '{}' is declared twice", city.name);
            }
        }
        for (key, name) in [
            ("default_city", &self.map.default_city),
            ("fallback_city", &self.map.fallback_city),
        ] {
            if !seen.contains(name.as_str()) {
                bail!("map.{key} '{name}' is not one of the configured cities");
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<CityCatalog> {
        CityCatalog::new(self.cities.clone(), &self.map.fallback_city)
            .ok_or_else(|| anyhow!("Unknown fallback city '{}'", self.map.fallback_city))
    }

    pub fn default_city(&self) -> Result<City> {
        self.city(&self.map.default_city)
    }

    pub fn city(&self, name: &str) -> Result<City> {
        self.cities
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown city '{}'", name))
    }
}
