//! Page sessions: load a document, query it, follow its links.
//!
//! The crawl logic only talks to the [`PageSession`] and [`SessionOpener`]
//! traits. [`HttpFetcher`] is the production backend: it downloads pages
//! with `reqwest` and answers structural queries with `scraper`. Tests use
//! the in-memory [`testing::StaticSite`].
//!
//! Sessions are handed out inside a [`SessionGuard`], which closes the
//! session when dropped. Early returns, `?`, panics and cancelled futures all
//! release the session without extra bookkeeping at the call site.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{FetchError, NavigationFault};
use crate::models::Element;
use crate::utils::normalize_text;

/// An open document with structural queries and click navigation.
#[async_trait]
pub trait PageSession: Send {
    /// URL of the currently loaded document, after redirects.
    fn current_url(&self) -> &Url;

    /// Every element matching `selector`, in document order.
    fn find_all(&self, selector: &str) -> Result<Vec<Element>, FetchError>;

    /// The first element matching `selector`. Absence is `Ok(None)`.
    fn find_one(&self, selector: &str) -> Result<Option<Element>, FetchError>;

    /// Click the first element matching `selector` and load its target.
    async fn click(&mut self, selector: &str) -> Result<(), NavigationFault>;

    /// Release the session. Called exactly once, by [`SessionGuard`].
    fn close(&mut self);
}

/// Opens sessions. Shared across workers, so it must be `Sync`.
#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<SessionGuard, FetchError>;
}

/// Owns a session and closes it on drop unless closed explicitly first.
pub struct SessionGuard {
    session: Box<dyn PageSession>,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn PageSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub fn close(mut self) {
        self.session.close();
        self.closed = true;
    }
}

impl Deref for SessionGuard {
    type Target = dyn PageSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            self.session.close();
        }
    }
}

/// A fetched document and the URL it was served from.
///
/// `scraper::Html` is not `Send`, so the source is kept as text and parsed
/// per query. No parsed tree is ever held across an `.await`.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    url: Url,
    html: String,
}

impl LoadedPage {
    pub fn new(url: Url, html: String) -> Self {
        Self { url, html }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn find_all(&self, selector: &str) -> Result<Vec<Element>, FetchError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        Ok(document.select(&selector).map(snapshot).collect())
    }

    pub fn find_one(&self, selector: &str) -> Result<Option<Element>, FetchError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        Ok(document.select(&selector).next().map(snapshot))
    }

    /// Where clicking the first match of `selector` would navigate.
    ///
    /// A click lands on the matched element or bubbles to its nearest
    /// enclosing link, so an icon inside an anchor follows that anchor.
    pub fn click_target(&self, selector: &str) -> Result<Url, NavigationFault> {
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        let element =
            document
                .select(&parsed)
                .next()
                .ok_or_else(|| NavigationFault::ControlAbsent {
                    selector: selector.to_string(),
                })?;

        let href = std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .find(|el| el.value().name() == "a" && el.value().attr("href").is_some())
            .and_then(|el| el.value().attr("href"))
            .ok_or_else(|| NavigationFault::NotClickable {
                selector: selector.to_string(),
            })?;

        self.url
            .join(href)
            .map_err(|_| NavigationFault::NotClickable {
                selector: selector.to_string(),
            })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|_| FetchError::InvalidSelector {
        selector: selector.to_string(),
    })
}

/// Elements that start on a new line when rendered.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Collect the text a reader would see, with a break at every `<br>` and
/// around every block element. Script and style bodies are skipped.
fn rendered_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        match child.value().name() {
            "br" => out.push(' '),
            "script" | "style" | "template" => {}
            name if BLOCK_ELEMENTS.contains(&name) => {
                out.push(' ');
                rendered_text(child, out);
                out.push(' ');
            }
            _ => rendered_text(child, out),
        }
    }
}

fn snapshot(element: ElementRef<'_>) -> Element {
    let mut text = String::new();
    rendered_text(element, &mut text);
    Element {
        text: normalize_text(&text),
        attributes: element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    }
}

/// Opens sessions over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn load(&self, url: Url) -> Result<LoadedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        debug!(url = %final_url, bytes = html.len(), "Loaded page");
        Ok(LoadedPage::new(final_url, html))
    }
}

#[async_trait]
impl SessionOpener for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn open(&self, url: &str) -> Result<SessionGuard, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let page = self.load(parsed).await?;
        Ok(SessionGuard::new(Box::new(HttpSession {
            fetcher: self.clone(),
            page,
        })))
    }
}

struct HttpSession {
    fetcher: HttpFetcher,
    page: LoadedPage,
}

#[async_trait]
impl PageSession for HttpSession {
    fn current_url(&self) -> &Url {
        self.page.url()
    }

    fn find_all(&self, selector: &str) -> Result<Vec<Element>, FetchError> {
        self.page.find_all(selector)
    }

    fn find_one(&self, selector: &str) -> Result<Option<Element>, FetchError> {
        self.page.find_one(selector)
    }

    async fn click(&mut self, selector: &str) -> Result<(), NavigationFault> {
        let target = self.page.click_target(selector)?;
        self.page = self.fetcher.load(target).await?;
        Ok(())
    }

    fn close(&mut self) {
        debug!(url = %self.page.url(), "Closed session");
        self.page.html.clear();
    }
}
