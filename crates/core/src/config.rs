//! Configuration for the editing passes.
//!
//! Every field has a default matching a Ukrainian thesis layout, so an empty
//! TOML file (or none at all) is a valid configuration.

use crate::dashes::DashSet;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub outline: OutlineConfig,
    pub captions: CaptionConfig,
    pub bibliography: BibliographyConfig,
    pub dashes: DashConfig,
    pub conclusions: Vec<ConclusionConfig>,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Regex for unstyled top-level headings such as "РОЗДІЛ 2" or "ДОДАТОК А".
    ///
    /// Matched against the whole paragraph, so it must reject sentences that
    /// merely start with a chapter reference.
    pub chapter_pattern: String,

    /// Treat unstyled paragraphs like "3.6 Огляд" as headings of depth 2.
    pub numbered_headings: bool,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            chapter_pattern: concat!(
                r"^(?:РОЗДІЛ|CHAPTER)\s+\d+\.?(?:\s+\p{Lu}[\p{Lu}\d\s\p{P}\x{2BC}]*)?$",
                r"|^(?:ДОДАТОК|APPENDIX)(?:\s+\p{Lu}\b.*)?$",
                r"|^(?:ДОДАТКИ|APPENDICES)$",
            )
            .to_string(),
            numbered_headings: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Label written for figure captions.
    pub figure_label: String,

    /// Label written for table captions.
    pub table_label: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            figure_label: "Рисунок".to_string(),
            table_label: "Таблиця".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BibliographyConfig {
    /// Regex matching the reference list heading.
    pub heading: String,

    /// Label of the access-date annotation.
    pub access_label: String,

    /// Access date for entries with a URL and no date. Today when unset.
    pub access_date: Option<NaiveDate>,
}

impl Default for BibliographyConfig {
    fn default() -> Self {
        Self {
            heading: r"(?i)^\s*(?:список\s+використаних\s+(?:джерел|літератури)|references|bibliography)\s*$".to_string(),
            access_label: "дата звернення".to_string(),
            access_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub set: DashSet,
}

/// One chapter conclusion to insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConclusionConfig {
    /// Regex matching the chapter heading.
    pub chapter: String,

    /// Title paragraph, e.g. "Висновки до розділу 1".
    pub title: String,

    pub paragraphs: Vec<String>,
    pub heading_style: String,
    pub body_style: String,

    /// Fail the run when the chapter is missing.
    pub required: bool,
}

impl Default for ConclusionConfig {
    fn default() -> Self {
        Self {
            chapter: String::new(),
            title: String::new(),
            paragraphs: Vec::new(),
            heading_style: "Heading 3".to_string(),
            body_style: crate::types::DEFAULT_STYLE.to_string(),
            required: false,
        }
    }
}
