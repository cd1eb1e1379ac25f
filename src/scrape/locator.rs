//! Work-unit discovery from a work's landing page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use super::chain::SelectorChain;
use crate::download::{FetchError, Transport};
use crate::work::{WorkDescriptor, WorkUnitRef, sanitize_title};

/// Chapter-list layouts, most common first.
pub const UNIT_LIST_SELECTORS: [&str; 6] = [
    "div.listmain dd a",
    ".chapter-list a",
    "#list dd a",
    "div.book-list a",
    "ul.chapter a",
    "div.volume a",
];

/// Title used when the page has neither a heading nor a `<title>`.
const UNTITLED_PREFIX: &str = "untitled";

#[allow(clippy::expect_used)]
static UNIT_LIST_CHAIN: LazyLock<SelectorChain> = LazyLock::new(|| {
    SelectorChain::parse(&UNIT_LIST_SELECTORS).expect("unit list selectors are valid CSS")
});

#[allow(clippy::expect_used)]
static TITLE_CHAIN: LazyLock<SelectorChain> =
    LazyLock::new(|| SelectorChain::parse(&["h1", "title"]).expect("title selectors are valid CSS"));

#[allow(clippy::expect_used)]
static ANY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector is valid CSS"));

/// Hrefs that look like a chapter page: trailing digits before `.htm`/`.html`.
#[allow(clippy::expect_used)]
static UNIT_PAGE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.html?$").expect("unit page pattern is valid"));

/// Errors that abort a whole work before any unit is fetched.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The work identifier cannot form a landing page address.
    #[error("invalid work id `{work_id}`")]
    InvalidWorkId {
        /// The rejected identifier.
        work_id: String,
    },

    /// The landing page could not be fetched.
    #[error("landing page for work {work_id} unreachable: {source}")]
    Unreachable {
        /// The work being located.
        work_id: String,
        /// Transport failure after retries.
        #[source]
        source: FetchError,
    },

    /// The landing page lists no units.
    #[error("no units found for work {work_id} at {url}")]
    NoUnits {
        /// The work being located.
        work_id: String,
        /// The landing page address.
        url: String,
    },
}

/// Derives a [`WorkDescriptor`] from a work's landing page.
#[derive(Debug, Clone)]
pub struct Locator {
    transport: Transport,
    base_url: Url,
}

impl Locator {
    /// Creates a locator for works hosted under `base_url`.
    #[must_use]
    pub fn new(transport: Transport, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// Landing page address: `{base_url}/book/{work_id}/`.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::InvalidWorkId`] for empty ids or ids containing
    /// path separators.
    pub fn landing_url(&self, work_id: &str) -> Result<Url, LocateError> {
        let id = work_id.trim();
        if id.is_empty() || id.contains(['/', '\\', '?', '#']) {
            return Err(LocateError::InvalidWorkId {
                work_id: work_id.to_string(),
            });
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/book/{id}/")).map_err(|_| LocateError::InvalidWorkId {
            work_id: work_id.to_string(),
        })
    }

    /// Fetches the landing page and lists the work's units.
    ///
    /// # Errors
    ///
    /// - [`LocateError::InvalidWorkId`] when no address can be built
    /// - [`LocateError::Unreachable`] when the transport gives up
    /// - [`LocateError::NoUnits`] when no unit links are found
    #[instrument(skip(self))]
    pub async fn locate(&self, work_id: &str) -> Result<WorkDescriptor, LocateError> {
        let url = self.landing_url(work_id)?;
        info!(url = %url, "fetching landing page");

        let markup = self
            .transport
            .fetch(url.as_str())
            .await
            .map_err(|source| LocateError::Unreachable {
                work_id: work_id.to_string(),
                source,
            })?;

        let descriptor = parse_landing_page(&markup, work_id.trim(), &url)?;
        info!(
            title = %descriptor.title,
            units = descriptor.units.len(),
            "work located"
        );
        Ok(descriptor)
    }
}

/// Builds a [`WorkDescriptor`] from landing page markup.
///
/// Unit indices are 1-based positions in the list that remains after links
/// without a usable href or without text are dropped.
///
/// # Errors
///
/// Returns [`LocateError::NoUnits`] when nothing survives filtering.
pub fn parse_landing_page(
    markup: &str,
    work_id: &str,
    page_url: &Url,
) -> Result<WorkDescriptor, LocateError> {
    let document = Html::parse_document(markup);
    let title = sanitize_title(&work_title(&document, work_id));

    let links = match UNIT_LIST_CHAIN.select_all(&document) {
        Some(hit) => {
            debug!(pattern = %hit.pattern, links = hit.value.len(), "unit list matched");
            hit.value
        }
        None => {
            debug!("no unit list layout matched, scanning all links");
            document
                .select(&ANY_LINK)
                .filter(|link| {
                    link.value()
                        .attr("href")
                        .is_some_and(|href| UNIT_PAGE_HREF.is_match(href))
                })
                .collect()
        }
    };

    let units: Vec<WorkUnitRef> = links
        .into_iter()
        .filter_map(|link| unit_candidate(link, page_url))
        .zip(1u32..)
        .map(|((title, source_url), index)| WorkUnitRef {
            index,
            title,
            source_url,
        })
        .collect();

    if units.is_empty() {
        return Err(LocateError::NoUnits {
            work_id: work_id.to_string(),
            url: page_url.to_string(),
        });
    }

    Ok(WorkDescriptor {
        id: work_id.to_string(),
        title,
        units,
    })
}

/// `(title, absolute url)` for a link, or `None` if it cannot become a unit.
fn unit_candidate(link: ElementRef<'_>, page_url: &Url) -> Option<(String, String)> {
    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let source_url = page_url.join(href).ok()?;
    let title = link.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some((title, source_url.to_string()))
}

fn work_title(document: &Html, work_id: &str) -> String {
    TITLE_CHAIN
        .select_all(document)
        .and_then(|hit| {
            hit.value
                .iter()
                .map(|element| element.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
        })
        .or_else(|| {
            // h1 present but blank: fall through to <title>.
            document
                .select(&Selector::parse("title").ok()?)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
        })
        .unwrap_or_else(|| format!("{UNTITLED_PREFIX}_{work_id}"))
}
