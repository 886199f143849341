//! Runtime configuration for a crawl.
//!
//! [`CrawlConfig`] is built once from the command line and passed explicitly
//! into the pipeline; nothing here reads the environment on its own.
//! [`SiteProfile`] holds the structural selectors for the source site and can
//! be overridden from a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cli::Cli;
use crate::error::ProfileError;
use crate::models::Element;

/// Selects one field from a matched element: its text, or a named attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub css: String,
    #[serde(default)]
    pub attr: Option<String>,
}

impl FieldSelector {
    pub fn text(css: &str) -> Self {
        Self {
            css: css.to_string(),
            attr: None,
        }
    }

    pub fn attr(css: &str, attr: &str) -> Self {
        Self {
            css: css.to_string(),
            attr: Some(attr.to_string()),
        }
    }

    /// Read the selected value from an element. A missing attribute is `None`.
    pub fn read(&self, element: &Element) -> Option<String> {
        match &self.attr {
            Some(name) => element.attr(name).map(str::to_string),
            None => Some(element.text.clone()),
        }
    }
}

/// Structural selectors for one listing site.
///
/// The defaults target the O Eco news listing. A YAML profile may override
/// any subset of the fields:
///
/// ```yaml
/// listing_links: "article h2 > a"
/// author:
///   css: 'meta[name="byl"]'
///   attr: content
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Article anchors on a listing page.
    pub listing_links: String,
    /// The "next page" control. Clicking a node inside a link follows that link.
    pub next_page: String,
    pub title: FieldSelector,
    pub subtitle: FieldSelector,
    pub author: FieldSelector,
    pub publish_date: FieldSelector,
    /// Body paragraphs inside the article's content container.
    pub paragraphs: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            listing_links: "h2.h4.mb-3 > a".to_string(),
            next_page: "a.btn.text-secondary > i.fa-long-arrow-alt-right".to_string(),
            title: FieldSelector::text("h1"),
            subtitle: FieldSelector::text("p.lead.font-italic.mb-5"),
            author: FieldSelector::attr(r#"meta[name="author"]"#, "content"),
            publish_date: FieldSelector::attr(
                r#"meta[property="article:published_time"]"#,
                "content",
            ),
            paragraphs: "div.article p".to_string(),
        }
    }
}

impl SiteProfile {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Self = serde_yaml::from_str(&raw).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some((field, selector)) = profile.first_invalid_selector() {
            return Err(ProfileError::InvalidSelector {
                path: path.to_path_buf(),
                field,
                selector: selector.to_string(),
            });
        }
        info!("Loaded site profile");
        Ok(profile)
    }

    /// Every selector in the profile, keyed by field name.
    fn selectors(&self) -> [(&'static str, &str); 7] {
        [
            ("listing_links", self.listing_links.as_str()),
            ("next_page", self.next_page.as_str()),
            ("title", self.title.css.as_str()),
            ("subtitle", self.subtitle.css.as_str()),
            ("author", self.author.css.as_str()),
            ("publish_date", self.publish_date.css.as_str()),
            ("paragraphs", self.paragraphs.as_str()),
        ]
    }

    fn first_invalid_selector(&self) -> Option<(&'static str, &str)> {
        self.selectors()
            .into_iter()
            .find(|(_, css)| Selector::parse(css).is_err())
    }
}

/// Everything a crawl run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed_url: String,
    pub max_pages: usize,
    pub inner_workers: usize,
    pub outer_chunks: usize,
    /// Cap on article extractions in flight across all chunks.
    pub max_in_flight: usize,
    pub page_delay: Duration,
    pub request_timeout: Duration,
    pub extract_timeout: Duration,
    pub user_agent: String,
    pub output: PathBuf,
    pub profile: SiteProfile,
}

impl CrawlConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ProfileError> {
        let profile = match &cli.profile {
            Some(path) => SiteProfile::load(path)?,
            None => SiteProfile::default(),
        };

        Ok(Self {
            seed_url: cli.seed_url.clone(),
            max_pages: cli.pages.max(1),
            inner_workers: cli.workers.max(1),
            outer_chunks: cli.chunks.max(1),
            max_in_flight: cli.max_in_flight.max(1),
            page_delay: Duration::from_millis(cli.page_delay_ms),
            request_timeout: Duration::from_secs(cli.timeout_secs),
            extract_timeout: Duration::from_secs(cli.extract_timeout_secs),
            user_agent: cli.user_agent.clone(),
            output: cli.output.clone(),
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_field_selector_reads_text_or_attribute() {
        let mut element = Element {
            text: "Fulano de Tal".to_string(),
            ..Default::default()
        };
        element
            .attributes
            .insert("content".to_string(), "Beltrano".to_string());

        assert_eq!(
            FieldSelector::text("span").read(&element).as_deref(),
            Some("Fulano de Tal")
        );
        assert_eq!(
            FieldSelector::attr("meta", "content").read(&element).as_deref(),
            Some("Beltrano")
        );
        assert_eq!(FieldSelector::attr("meta", "value").read(&element), None);
    }

    #[test]
    fn test_partial_profile_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "listing_links: \"article h2 > a\"\nauthor:\n  css: 'meta[name=\"byl\"]'\n  attr: content"
        )
        .unwrap();

        let profile = SiteProfile::load(file.path()).unwrap();
        let defaults = SiteProfile::default();

        assert_eq!(profile.listing_links, "article h2 > a");
        assert_eq!(profile.author, FieldSelector::attr(r#"meta[name="byl"]"#, "content"));
        assert_eq!(profile.title, defaults.title);
        assert_eq!(profile.paragraphs, defaults.paragraphs);
    }

    #[test]
    fn test_invalid_profile_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title: 42").unwrap();

        let err = SiteProfile::load(file.path()).unwrap_err();
        assert!(matches!(err, ProfileError::Parse { .. }));
    }

    #[test]
    fn test_malformed_selector_is_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "subtitle:\n  css: \"p.lead[[\"").unwrap();

        let err = SiteProfile::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::InvalidSelector { field: "subtitle", ref selector, .. } if selector == "p.lead[["
        ));
    }

    #[test]
    fn test_default_selectors_all_parse() {
        assert_eq!(SiteProfile::default().first_invalid_selector(), None);
    }

    #[test]
    fn test_config_clamps_zero_counts() {
        let cli = Cli::parse_from([
            "eco_news_scraper",
            "--pages",
            "0",
            "--workers",
            "0",
            "--chunks",
            "0",
        ]);
        let config = CrawlConfig::from_cli(&cli).unwrap();

        assert_eq!(config.max_pages, 1);
        assert_eq!(config.inner_workers, 1);
        assert_eq!(config.outer_chunks, 1);
        assert_eq!(config.profile, SiteProfile::default());
    }
}
