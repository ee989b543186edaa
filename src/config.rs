use directories::ProjectDirs;
use iced::Size;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,
    /// App scope passed along with every addon lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    /// Overrides the default geometry file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_path: Option<PathBuf>,
}

/// Node box and spacing used by the auto-layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Horizontal gap between boxes in one rank.
    pub node_sep: f32,
    /// Vertical gap between ranks.
    pub rank_sep: f32,
    pub margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        const NODE_WIDTH: f32 = 180.0;
        const NODE_HEIGHT: f32 = 60.0;
        Self {
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            node_sep: NODE_WIDTH,
            rank_sep: NODE_HEIGHT * 2.0,
            margin: 50.0,
        }
    }
}

impl LayoutConfig {
    pub fn node_size(&self) -> Size {
        Size::new(self.node_width, self.node_height)
    }
}

impl Config {
    pub fn load() -> Option<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("ignoring invalid config {}: {err}", path.display());
                None
            }
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoLocation)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(write_err)
    }

    /// Where node geometry is persisted, unless overridden.
    pub fn geometry_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.geometry_path {
            return Some(path.clone());
        }
        Some(project_dirs()?.data_dir().join("geometry.json"))
    }

    fn config_path() -> Option<PathBuf> {
        Some(project_dirs()?.config_dir().join("config.json"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "splice")
}
