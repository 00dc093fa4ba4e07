//! Inspection photo categories
//!
//! 点検写真の区分。表記ゆれは組み込みエイリアスとカスタムエイリアスで正規化する。

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionCategory {
    Overview,
    Shingles,
    Flashing,
    Gutters,
    Vents,
    Chimney,
    Skylights,
    Decking,
    Interior,
    Other,
}

impl InspectionCategory {
    pub const ALL: [InspectionCategory; 10] = [
        InspectionCategory::Overview,
        InspectionCategory::Shingles,
        InspectionCategory::Flashing,
        InspectionCategory::Gutters,
        InspectionCategory::Vents,
        InspectionCategory::Chimney,
        InspectionCategory::Skylights,
        InspectionCategory::Decking,
        InspectionCategory::Interior,
        InspectionCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionCategory::Overview => "overview",
            InspectionCategory::Shingles => "shingles",
            InspectionCategory::Flashing => "flashing",
            InspectionCategory::Gutters => "gutters",
            InspectionCategory::Vents => "vents",
            InspectionCategory::Chimney => "chimney",
            InspectionCategory::Skylights => "skylights",
            InspectionCategory::Decking => "decking",
            InspectionCategory::Interior => "interior",
            InspectionCategory::Other => "other",
        }
    }

    /// Heading used in reports
    pub fn label(&self) -> &'static str {
        match self {
            InspectionCategory::Overview => "Roof Overview",
            InspectionCategory::Shingles => "Shingles / Field",
            InspectionCategory::Flashing => "Flashing",
            InspectionCategory::Gutters => "Gutters & Drainage",
            InspectionCategory::Vents => "Vents & Penetrations",
            InspectionCategory::Chimney => "Chimney",
            InspectionCategory::Skylights => "Skylights",
            InspectionCategory::Decking => "Decking / Structure",
            InspectionCategory::Interior => "Interior Damage",
            InspectionCategory::Other => "Other",
        }
    }

    fn from_canonical(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Parse with the built-in aliases only; unknown text maps to `Other`
    pub fn parse(text: &str) -> Self {
        AliasConfig::default().resolve(text)
    }
}

impl fmt::Display for InspectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InspectionCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// 組み込みエイリアス (小文字)
const BUILTIN_ALIASES: &[(&str, InspectionCategory)] = &[
    ("roof", InspectionCategory::Overview),
    ("overall", InspectionCategory::Overview),
    ("aerial", InspectionCategory::Overview),
    ("elevation", InspectionCategory::Overview),
    ("shingle", InspectionCategory::Shingles),
    ("field", InspectionCategory::Shingles),
    ("ridge", InspectionCategory::Shingles),
    ("hip", InspectionCategory::Shingles),
    ("hail", InspectionCategory::Shingles),
    ("granule loss", InspectionCategory::Shingles),
    ("drip edge", InspectionCategory::Flashing),
    ("step flashing", InspectionCategory::Flashing),
    ("valley", InspectionCategory::Flashing),
    ("counter flashing", InspectionCategory::Flashing),
    ("gutter", InspectionCategory::Gutters),
    ("downspout", InspectionCategory::Gutters),
    ("fascia", InspectionCategory::Gutters),
    ("drainage", InspectionCategory::Gutters),
    ("vent", InspectionCategory::Vents),
    ("pipe boot", InspectionCategory::Vents),
    ("exhaust", InspectionCategory::Vents),
    ("penetration", InspectionCategory::Vents),
    ("ridge vent", InspectionCategory::Vents),
    ("chimney cap", InspectionCategory::Chimney),
    ("crown", InspectionCategory::Chimney),
    ("skylight", InspectionCategory::Skylights),
    ("deck", InspectionCategory::Decking),
    ("sheathing", InspectionCategory::Decking),
    ("plywood", InspectionCategory::Decking),
    ("rafter", InspectionCategory::Decking),
    ("attic", InspectionCategory::Interior),
    ("ceiling", InspectionCategory::Interior),
    ("leak", InspectionCategory::Interior),
    ("water stain", InspectionCategory::Interior),
];

/// Category alias table
///
/// カスタムエイリアスを優先し、次に正式名、最後に組み込みエイリアスを参照する。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasConfig {
    #[serde(default)]
    pub aliases: HashMap<String, InspectionCategory>,
}

impl AliasConfig {
    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(json)?;
        // キーは小文字で比較する
        let aliases = parsed
            .aliases
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Ok(Self { aliases })
    }

    pub fn insert(&mut self, alias: &str, category: InspectionCategory) {
        self.aliases.insert(alias.trim().to_lowercase(), category);
    }

    pub fn resolve(&self, text: &str) -> InspectionCategory {
        let key = text.trim().to_lowercase();
        let singular = key.strip_suffix('s').unwrap_or(&key);

        if let Some(category) = self.aliases.get(&key).or_else(|| self.aliases.get(singular)) {
            return *category;
        }
        if let Some(category) = InspectionCategory::from_canonical(&key)
            .or_else(|| InspectionCategory::from_canonical(singular))
        {
            return category;
        }

        // 完全一致を優先し、次に単数形
        BUILTIN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .or_else(|| BUILTIN_ALIASES.iter().find(|(alias, _)| *alias == singular))
            .map(|(_, category)| *category)
            .unwrap_or(InspectionCategory::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        for category in InspectionCategory::ALL {
            assert_eq!(InspectionCategory::parse(category.as_str()), category);
        }
    }

    #[test]
    fn test_builtin_aliases_case_insensitive() {
        assert_eq!(InspectionCategory::parse("Drip Edge"), InspectionCategory::Flashing);
        assert_eq!(InspectionCategory::parse("ATTIC"), InspectionCategory::Interior);
        assert_eq!(InspectionCategory::parse("ridge vent"), InspectionCategory::Vents);
        assert_eq!(InspectionCategory::parse("ridge"), InspectionCategory::Shingles);
    }

    #[test]
    fn test_plural_falls_back_to_singular() {
        assert_eq!(InspectionCategory::parse("downspouts"), InspectionCategory::Gutters);
        assert_eq!(InspectionCategory::parse("skylights"), InspectionCategory::Skylights);
        assert_eq!(InspectionCategory::parse("chimneys"), InspectionCategory::Chimney);
        assert_eq!(InspectionCategory::parse("Flashings"), InspectionCategory::Flashing);
        assert_eq!(InspectionCategory::parse("interiors"), InspectionCategory::Interior);
        assert_eq!(InspectionCategory::parse("overviews"), InspectionCategory::Overview);
    }

    #[test]
    fn test_unknown_is_other() {
        assert_eq!(InspectionCategory::parse("solar panel"), InspectionCategory::Other);
        assert_eq!(InspectionCategory::parse(""), InspectionCategory::Other);
    }

    #[test]
    fn test_custom_alias_overrides_builtin() {
        let config = AliasConfig::from_json(r#"{"aliases": {"Ridge": "vents", "soffit": "gutters"}}"#)
            .unwrap();
        assert_eq!(config.resolve("ridge"), InspectionCategory::Vents);
        assert_eq!(config.resolve("soffits"), InspectionCategory::Gutters);
        assert_eq!(config.resolve("valley"), InspectionCategory::Flashing);
    }

    #[test]
    fn test_invalid_alias_json() {
        assert!(AliasConfig::from_json(r#"{"aliases": {"x": "roofline"}}"#).is_err());
    }
}
