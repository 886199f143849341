//! Data models shared across the crawl pipeline.
//!
//! - [`ArticleLink`]: an article URL discovered on a listing page
//! - [`ArticleRecord`]: the structured fields extracted from one article
//! - [`Element`]: an owned snapshot of a node matched by a structural selector

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An article URL. Identity is the string itself; repeats are kept.
pub type ArticleLink = String;

/// One article's extracted fields, in the column order of the output table.
///
/// Optional fields are `None` when the page lacks the corresponding element
/// and serialize to an empty CSV field. `content` is always present and is
/// empty when the article has no body paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// The article headline.
    pub title: String,
    /// The lead paragraph shown under the headline.
    pub subtitle: Option<String>,
    /// Author as published in the page metadata.
    pub author: Option<String>,
    /// Publication timestamp exactly as the source provides it.
    #[serde(rename = "publishDate")]
    pub publish_date: Option<String>,
    /// Body paragraphs joined in document order without a separator.
    pub content: String,
}

impl ArticleRecord {
    /// Column names of the persisted table, in order.
    pub const COLUMNS: [&'static str; 5] = ["title", "subtitle", "author", "publishDate", "content"];
}

/// A matched element, detached from its document.
///
/// `text` is the visible text of the element with whitespace runs collapsed,
/// the way a browser reports rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub text: String,
    pub attributes: HashMap<String, String>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_attr_lookup() {
        let mut element = Element {
            text: "Read more".to_string(),
            ..Default::default()
        };
        element
            .attributes
            .insert("href".to_string(), "/noticias/a".to_string());

        assert_eq!(element.attr("href"), Some("/noticias/a"));
        assert_eq!(element.attr("class"), None);
    }

    #[test]
    fn test_columns_match_serialized_field_names() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer
            .serialize(ArticleRecord {
                title: "t".to_string(),
                subtitle: None,
                author: None,
                publish_date: None,
                content: String::new(),
            })
            .unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();

        assert_eq!(header, ArticleRecord::COLUMNS.join(","));
    }
}
