//! Style preset definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Visual style preset chosen when the job is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StylePreset {
    /// Pan/zoom photos with cross-fades
    #[default]
    Classic,
    /// Depth effect (rendered as classic for now)
    Parallax,
    /// Classic with an accent clip spliced in after the second photo
    Hybrid,
    /// Map/destination effect (rendered as classic for now)
    Destination,
}

impl StylePreset {
    /// All available presets.
    pub const ALL: &'static [StylePreset] = &[
        StylePreset::Classic,
        StylePreset::Parallax,
        StylePreset::Hybrid,
        StylePreset::Destination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StylePreset::Classic => "classic",
            StylePreset::Parallax => "parallax",
            StylePreset::Hybrid => "hybrid",
            StylePreset::Destination => "destination",
        }
    }

    /// Whether an accent clip may be spliced into this style.
    pub fn allows_accent(&self) -> bool {
        matches!(self, StylePreset::Hybrid)
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StylePreset {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(StylePreset::Classic),
            "parallax" => Ok(StylePreset::Parallax),
            "hybrid" => Ok(StylePreset::Hybrid),
            "destination" => Ok(StylePreset::Destination),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown style: {0}")]
pub struct StyleParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parse() {
        assert_eq!("classic".parse::<StylePreset>().unwrap(), StylePreset::Classic);
        assert_eq!("Hybrid".parse::<StylePreset>().unwrap(), StylePreset::Hybrid);
        assert_eq!(" destination ".parse::<StylePreset>().unwrap(), StylePreset::Destination);
        assert!("cinematic".parse::<StylePreset>().is_err());
    }

    #[test]
    fn test_style_display_matches_serde() {
        for style in StylePreset::ALL {
            let json = serde_json::to_string(style).unwrap();
            assert_eq!(json, format!("\"{}\"", style));
        }
    }

    #[test]
    fn test_only_hybrid_allows_accent() {
        let allowed: Vec<_> = StylePreset::ALL.iter().filter(|s| s.allows_accent()).collect();
        assert_eq!(allowed, vec![&StylePreset::Hybrid]);
    }
}
