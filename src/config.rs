use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flowchart::{NodeShape, Size};

const NODE_SPACING: f32 = 48.0;
const RANK_SPACING: f32 = 72.0;
const MARGIN: f32 = 30.0;
const NODE_WIDTH: f32 = 140.0;
const NODE_HEIGHT: f32 = 60.0;
const DIAMOND_WIDTH: f32 = 150.0;
const DIAMOND_HEIGHT: f32 = 90.0;
const ORDERING_SWEEPS: usize = 6;

const ANIMATION_MS: u64 = 800;
const FONT_SIZE: f32 = 14.0;
const CASCADE_OFFSET: f32 = 24.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    /// Built-in theme name or path to an Alacritty theme file.
    #[serde(default)]
    pub theme: Option<String>,
}

/// Spacing and geometry used by the layout engine and for new nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_node_spacing")]
    pub node_spacing: f32,
    #[serde(default = "default_rank_spacing")]
    pub rank_spacing: f32,
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default = "default_node_width")]
    pub node_width: f32,
    #[serde(default = "default_node_height")]
    pub node_height: f32,
    #[serde(default = "default_diamond_width")]
    pub diamond_width: f32,
    #[serde(default = "default_diamond_height")]
    pub diamond_height: f32,
    #[serde(default = "default_ordering_sweeps")]
    pub ordering_sweeps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// How long edges stay flagged as animated after a relayout.
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Offset between consecutively added nodes so they do not stack.
    #[serde(default = "default_cascade_offset")]
    pub cascade_offset: f32,
}

fn default_node_spacing() -> f32 {
    NODE_SPACING
}
fn default_rank_spacing() -> f32 {
    RANK_SPACING
}
fn default_margin() -> f32 {
    MARGIN
}
fn default_node_width() -> f32 {
    NODE_WIDTH
}
fn default_node_height() -> f32 {
    NODE_HEIGHT
}
fn default_diamond_width() -> f32 {
    DIAMOND_WIDTH
}
fn default_diamond_height() -> f32 {
    DIAMOND_HEIGHT
}
fn default_ordering_sweeps() -> usize {
    ORDERING_SWEEPS
}
fn default_animation_ms() -> u64 {
    ANIMATION_MS
}
fn default_font_size() -> f32 {
    FONT_SIZE
}
fn default_cascade_offset() -> f32 {
    CASCADE_OFFSET
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: NODE_SPACING,
            rank_spacing: RANK_SPACING,
            margin: MARGIN,
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            diamond_width: DIAMOND_WIDTH,
            diamond_height: DIAMOND_HEIGHT,
            ordering_sweeps: ORDERING_SWEEPS,
        }
    }
}

impl LayoutConfig {
    pub fn size_for(&self, shape: NodeShape) -> Size {
        match shape {
            NodeShape::Rectangle => Size::new(self.node_width, self.node_height),
            NodeShape::Diamond => Size::new(self.diamond_width, self.diamond_height),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            animation_ms: ANIMATION_MS,
            font_size: FONT_SIZE,
            cascade_offset: CASCADE_OFFSET,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            message: format!("failed to parse TOML: {}", e),
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Config {
            message: format!("failed to parse YAML: {}", e),
        })
    }

    /// Loads a config file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_toml(&content),
        }
    }
}
