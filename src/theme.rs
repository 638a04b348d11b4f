use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const GITHUB_LIGHT_BACKGROUND: &str = "#ffffff";
const GITHUB_LIGHT_TEXT: &str = "#24292f";
const GITHUB_LIGHT_NODE_FILL: &str = "#f6f8fa";
const GITHUB_LIGHT_SELECTION: &str = "#0969da";

const BUILTIN_THEMES: &[(&str, &str)] = &[
    ("dracula", include_str!("../themes/dracula.toml")),
    ("github_dark", include_str!("../themes/github_dark.toml")),
    ("github_light", include_str!("../themes/github_light.toml")),
    ("nord", include_str!("../themes/nord.toml")),
    ("solarized_dark", include_str!("../themes/solarized_dark.toml")),
    ("solarized_light", include_str!("../themes/solarized_light.toml")),
];

const FONT_FAMILY: &str = "sans-serif";
/// Share of the accent color mixed into the background for node fills.
const NODE_TINT: f32 = 0.12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default = "default_text")]
    pub text_color: String,
    #[serde(default = "default_node_fill")]
    pub node_fill_color: String,
    #[serde(default = "default_selection")]
    pub selection_color: String,

    #[serde(default = "default_font_family")]
    pub font_family: String,
}

fn default_background() -> String {
    GITHUB_LIGHT_BACKGROUND.to_string()
}
fn default_text() -> String {
    GITHUB_LIGHT_TEXT.to_string()
}
fn default_node_fill() -> String {
    GITHUB_LIGHT_NODE_FILL.to_string()
}
fn default_selection() -> String {
    GITHUB_LIGHT_SELECTION.to_string()
}
fn default_font_family() -> String {
    FONT_FAMILY.to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self::github_light()
    }
}

#[derive(Debug, Deserialize)]
struct AlacrittyColors {
    primary: AlacrittyPrimary,
    normal: AlacrittyNormal,
}

#[derive(Debug, Deserialize)]
struct AlacrittyPrimary {
    background: String,
    foreground: String,
}

#[derive(Debug, Deserialize)]
struct AlacrittyNormal {
    blue: String,
}

#[derive(Debug, Deserialize)]
struct AlacrittyTheme {
    colors: AlacrittyColors,
}

impl Theme {
    pub fn github_light() -> Self {
        Theme {
            background_color: GITHUB_LIGHT_BACKGROUND.to_string(),
            text_color: GITHUB_LIGHT_TEXT.to_string(),
            node_fill_color: GITHUB_LIGHT_NODE_FILL.to_string(),
            selection_color: GITHUB_LIGHT_SELECTION.to_string(),
            font_family: FONT_FAMILY.to_string(),
        }
    }

    pub fn from_builtin(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let content = BUILTIN_THEMES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, c)| *c)
            .ok_or_else(|| Error::Theme {
                message: format!(
                    "Unknown built-in theme '{}'. Available: {}",
                    name,
                    Self::list_builtins().join(", ")
                ),
            })?;
        Self::from_alacritty_toml(content)
    }

    pub fn list_builtins() -> Vec<&'static str> {
        BUILTIN_THEMES.iter().map(|(n, _)| *n).collect()
    }

    /// Resolves a theme argument: an existing file path is read as an
    /// Alacritty theme (YAML for `.yml`/`.yaml`, TOML otherwise), anything
    /// else is looked up among the built-ins.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        let path = Path::new(name_or_path);
        if !path.is_file() {
            return Self::from_builtin(name_or_path);
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::Theme {
            message: format!("Failed to read theme file '{}': {}", path.display(), e),
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => Self::from_alacritty_yaml(&content),
            _ => Self::from_alacritty_toml(&content),
        }
    }

    pub fn from_alacritty_yaml(content: &str) -> Result<Self> {
        let alacritty: AlacrittyTheme = serde_yaml::from_str(content).map_err(|e| Error::Theme {
            message: format!("Failed to parse Alacritty YAML: {}", e),
        })?;

        Ok(Self::from_alacritty_theme(alacritty))
    }

    pub fn from_alacritty_toml(content: &str) -> Result<Self> {
        let alacritty: AlacrittyTheme = toml::from_str(content).map_err(|e| Error::Theme {
            message: format!("Failed to parse Alacritty TOML: {}", e),
        })?;

        Ok(Self::from_alacritty_theme(alacritty))
    }

    fn from_alacritty_theme(alacritty: AlacrittyTheme) -> Self {
        let colors = alacritty.colors;
        let node_fill = blend_hex(&colors.primary.background, &colors.normal.blue, NODE_TINT)
            .unwrap_or_else(|| colors.primary.background.clone());

        Theme {
            background_color: colors.primary.background,
            text_color: colors.primary.foreground,
            node_fill_color: node_fill,
            selection_color: colors.normal.blue,
            font_family: FONT_FAMILY.to_string(),
        }
    }
}

/// Parses `#rgb` or `#rrggbb` into channels in `0.0..=1.0`.
pub(crate) fn parse_hex_rgb(value: &str) -> Option<(f32, f32, f32)> {
    let hex = value.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };

    let channel = |i: usize| {
        u8::from_str_radix(expanded.get(i..i + 2)?, 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn blend_hex(base: &str, accent: &str, amount: f32) -> Option<String> {
    let (r1, g1, b1) = parse_hex_rgb(base)?;
    let (r2, g2, b2) = parse_hex_rgb(accent)?;
    let mix = |a: f32, b: f32| ((a + (b - a) * amount) * 255.0).round() as u8;
    Some(format!(
        "#{:02x}{:02x}{:02x}",
        mix(r1, r2),
        mix(g1, g2),
        mix(b1, b2)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_builtin_accepts_hyphenated_and_case_insensitive_names() {
        let underscore = Theme::from_builtin("solarized_light").expect("underscore variant");
        let hyphen = Theme::from_builtin("Solarized-Light").expect("hyphen variant");

        assert_eq!(underscore.background_color, hyphen.background_color);
        assert_eq!(underscore.text_color, hyphen.text_color);
    }

    #[test]
    fn every_builtin_parses() {
        for name in Theme::list_builtins() {
            let theme = Theme::from_builtin(name).unwrap();
            assert!(parse_hex_rgb(&theme.node_fill_color).is_some(), "{}", name);
        }
    }

    #[test]
    fn unknown_builtin_lists_the_alternatives() {
        let err = Theme::from_builtin("neon").unwrap_err();
        assert!(err.to_string().contains("github_dark"));
    }

    #[test]
    fn alacritty_yaml_is_accepted() {
        let yaml = "colors:\n  primary:\n    background: '#000000'\n    foreground: '#ffffff'\n  normal:\n    blue: '#0000ff'\n";
        let theme = Theme::from_alacritty_yaml(yaml).unwrap();
        assert_eq!(theme.background_color, "#000000");
        assert_eq!(theme.selection_color, "#0000ff");
        assert_eq!(theme.node_fill_color, "#00001f");
    }

    #[test]
    fn resolve_falls_back_to_builtins() {
        let theme = Theme::resolve("nord").unwrap();
        assert_eq!(theme, Theme::from_builtin("nord").unwrap());
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex_rgb("#fff"), Some((1.0, 1.0, 1.0)));
        assert_eq!(parse_hex_rgb("#000000"), Some((0.0, 0.0, 0.0)));
        assert_eq!(parse_hex_rgb("#12345"), None);
        assert_eq!(parse_hex_rgb("nothex"), None);
    }
}
