//! Per-article field extraction.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::{FieldSelector, SiteProfile};
use crate::error::{ExtractError, FetchError};
use crate::models::ArticleRecord;
use crate::session::{PageSession, SessionOpener};
use crate::utils::truncate_for_log;

/// Turns one article URL into an [`ArticleRecord`].
///
/// Every call opens its own session, so one extractor can be shared by any
/// number of concurrent workers.
pub struct ArticleExtractor {
    opener: Arc<dyn SessionOpener>,
    profile: SiteProfile,
}

impl ArticleExtractor {
    pub fn new(opener: Arc<dyn SessionOpener>, profile: SiteProfile) -> Self {
        Self { opener, profile }
    }

    /// Extract the record at `url`.
    ///
    /// A missing title fails the record. Subtitle, author and publish date
    /// are looked up independently and become `None` when absent.
    #[instrument(level = "debug", skip(self))]
    pub async fn extract(&self, url: &str) -> Result<ArticleRecord, ExtractError> {
        let session = self.opener.open(url).await?;
        let record = self.read_record(&*session, url);
        session.close();
        record
    }

    fn read_record(&self, session: &dyn PageSession, url: &str) -> Result<ArticleRecord, ExtractError> {
        let title = read_field(session, &self.profile.title)?.ok_or_else(|| {
            ExtractError::RequiredField {
                field: "title",
                url: url.to_string(),
            }
        })?;

        let subtitle = read_field(session, &self.profile.subtitle)?;
        let author = read_field(session, &self.profile.author)?;
        let publish_date = read_field(session, &self.profile.publish_date)?;

        let content: String = session
            .find_all(&self.profile.paragraphs)?
            .into_iter()
            .map(|paragraph| paragraph.text)
            .collect();

        debug!(
            %title,
            has_subtitle = subtitle.is_some(),
            has_author = author.is_some(),
            has_publish_date = publish_date.is_some(),
            content_preview = %truncate_for_log(&content, 80),
            "Extracted article"
        );

        Ok(ArticleRecord {
            title,
            subtitle,
            author,
            publish_date,
            content,
        })
    }
}

/// The selected value of the first match, or `None` if nothing matches.
fn read_field(session: &dyn PageSession, field: &FieldSelector) -> Result<Option<String>, FetchError> {
    Ok(session
        .find_one(&field.css)?
        .and_then(|element| field.read(&element)))
}
