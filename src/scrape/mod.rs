//! HTML scraping: unit discovery and chapter body extraction.
//!
//! Both halves use ordered [`SelectorChain`]s: the first layout that matches
//! decides the result. Parsed documents are not `Send`, so parsing happens in
//! synchronous helpers and never spans an `.await`.

mod chain;
pub mod extractor;
mod locator;

pub use chain::{ChainMatch, InvalidSelector, SelectorChain};
pub use extractor::{CONTENT_SELECTORS, extract};
pub use locator::{LocateError, Locator, UNIT_LIST_SELECTORS, parse_landing_page};
