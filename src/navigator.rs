//! Paginated link discovery.
//!
//! Pagination is sequential: each "next" control only exists on the page
//! before it, so a single session walks the listing page by page.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::SiteProfile;
use crate::error::FetchError;
use crate::models::ArticleLink;
use crate::session::{PageSession, SessionOpener};

/// Walks a paginated listing and collects article links.
pub struct PageNavigator {
    opener: Arc<dyn SessionOpener>,
    listing_links: String,
    next_page: String,
    page_delay: Duration,
}

/// Progress of one traversal. Lives only for the duration of [`PageNavigator::traverse`].
#[derive(Debug, Default)]
struct PageTraversalState {
    page: usize,
    urls: Vec<ArticleLink>,
    done: bool,
}

impl PageNavigator {
    pub fn new(opener: Arc<dyn SessionOpener>, profile: &SiteProfile, page_delay: Duration) -> Self {
        Self {
            opener,
            listing_links: profile.listing_links.clone(),
            next_page: profile.next_page.clone(),
            page_delay,
        }
    }

    /// Collect article links from up to `max_pages` listing pages.
    ///
    /// Links keep page order, then in-page document order. A missing next
    /// control, a failed click, or a failed query ends the walk early and
    /// returns what was gathered so far. Only failing to open `seed_url`
    /// is an error.
    #[instrument(level = "info", skip(self))]
    pub async fn traverse(
        &self,
        seed_url: &str,
        max_pages: usize,
    ) -> Result<Vec<ArticleLink>, FetchError> {
        let mut session = self.opener.open(seed_url).await?;
        let mut state = PageTraversalState::default();

        while !state.done && state.page < max_pages {
            state.page += 1;

            match self.collect_links(&*session) {
                Ok(links) => {
                    debug!(page = state.page, count = links.len(), "Collected listing links");
                    state.urls.extend(links);
                }
                Err(e) => {
                    warn!(page = state.page, error = %e, "Listing query failed; stopping");
                    state.done = true;
                    continue;
                }
            }

            if state.page == max_pages {
                break;
            }

            match session.click(&self.next_page).await {
                Ok(()) => tokio::time::sleep(self.page_delay).await,
                Err(e) => {
                    info!(page = state.page, reason = %e, "No more pages");
                    state.done = true;
                }
            }
        }

        session.close();
        info!(
            pages = state.page,
            count = state.urls.len(),
            "Listing traversal finished"
        );
        Ok(state.urls)
    }

    /// Resolved hrefs of the listing anchors on the current page.
    fn collect_links(&self, session: &dyn PageSession) -> Result<Vec<ArticleLink>, FetchError> {
        let base = session.current_url();
        let links = session
            .find_all(&self.listing_links)?
            .into_iter()
            .filter_map(|anchor| {
                let href = anchor.attr("href")?;
                match base.join(href) {
                    Ok(url) => Some(url.to_string()),
                    Err(e) => {
                        debug!(%href, error = %e, "Skipping unresolvable link");
                        None
                    }
                }
            })
            .collect();
        Ok(links)
    }
}
