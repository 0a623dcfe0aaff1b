use crate::types::LngLat;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub map: MapConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AssetsConfig {
    pub boundary_dir: PathBuf, // served under /boundaries
    pub static_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        AssetsConfig {
            boundary_dir: PathBuf::from("assets/boundaries"),
            static_dir: PathBuf::from("assets/static"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub style_url: String,
    pub center: [f64; 2], // [lng, lat]
    pub zoom: f64,
    pub max_zoom: f64,
    pub viewport: [u32; 2], // [width, height] in pixels, used when fitting bounds
    pub fit_padding: f64,
}

impl MapConfig {
    pub fn default_center(&self) -> LngLat {
        LngLat::from(self.center)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            style_url: "https://demotiles.maplibre.org/style.json".to_string(),
            // Center of Nepal
            center: [84.1240, 28.3949],
            zoom: 6.0,
            max_zoom: 14.0,
            viewport: [1280, 800],
            fit_padding: 40.0,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml("[server]\nport = 9000\n").expect("parse");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.assets.boundary_dir, PathBuf::from("assets/boundaries"));
        assert_eq!(config.map.zoom, 6.0);
        assert_eq!(config.map.default_center(), LngLat::new(84.1240, 28.3949));
    }

    #[test]
    fn map_section_overrides() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 8080

            [assets]
            boundary_dir = "/srv/boundaries"

            [map]
            center = [85.3, 27.7]
            zoom = 9.5
            viewport = [800, 600]
            "#,
        )
        .expect("parse");
        assert_eq!(config.assets.boundary_dir, PathBuf::from("/srv/boundaries"));
        assert_eq!(config.assets.static_dir, PathBuf::from("assets/static"));
        assert_eq!(config.map.zoom, 9.5);
        assert_eq!(config.map.viewport, [800, 600]);
        assert_eq!(config.map.max_zoom, 14.0);
    }

    #[test]
    fn missing_server_section_is_an_error() {
        assert!(AppConfig::from_toml("[map]\nzoom = 3.0\n").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load_from_file(Path::new("/definitely/not/here.toml"))
            .expect_err("missing file");
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }
}
