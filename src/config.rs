//! Browser presentation settings, loadable from TOML.

use std::path::Path;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of filtered rows shown before "show more".
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RenderStyle {
    List,
    #[default]
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// Show only files, flat.
    None,
    #[default]
    Folder,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Sorting {
    None,
    #[default]
    Natural,
    LastModified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    pub render_style: RenderStyle,
    pub grouping: Grouping,
    pub sorting: Sorting,
    /// Open folders render their children nested inside the folder row
    /// instead of as following rows.
    pub nest_children: bool,
    pub can_filter: bool,
    pub page_size: usize,
    pub week_start: Weekday,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            render_style: RenderStyle::default(),
            grouping: Grouping::default(),
            sorting: Sorting::default(),
            nest_children: false,
            can_filter: true,
            page_size: DEFAULT_PAGE_SIZE,
            week_start: Weekday::Sun,
        }
    }
}

impl BrowserConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.page_size = config.page_size.max(1);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.render_style, RenderStyle::Table);
        assert_eq!(config.grouping, Grouping::Folder);
        assert_eq!(config.sorting, Sorting::Natural);
        assert_eq!(config.page_size, 20);
        assert!(config.can_filter);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = BrowserConfig::from_toml(
            r#"
            render-style = "list"
            sorting = "last-modified"
            page-size = 0
            week-start = "Mon"
            "#,
        )
        .unwrap();

        assert_eq!(config.render_style, RenderStyle::List);
        assert_eq!(config.sorting, Sorting::LastModified);
        assert_eq!(config.grouping, Grouping::Folder);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.week_start, Weekday::Mon);
    }

    #[test]
    fn test_from_toml_rejects_unknown_style() {
        assert!(BrowserConfig::from_toml(r#"render-style = "grid""#).is_err());
    }
}
