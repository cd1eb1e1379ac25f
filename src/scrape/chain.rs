//! Ordered CSS selector chains with first-match-wins semantics.
//!
//! Sites in the same family lay out chapter lists and chapter bodies in a
//! handful of ways. A chain tries each known layout in order and stops at the
//! first one that matches; results from different patterns are never merged.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// A CSS pattern in a chain failed to parse.
#[derive(Debug, Error)]
#[error("invalid CSS selector `{pattern}`: {message}")]
pub struct InvalidSelector {
    /// The offending pattern.
    pub pattern: String,
    /// Parser message.
    pub message: String,
}

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    selector: Selector,
}

/// Ordered list of selectors; the first one with a match wins.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    patterns: Vec<Pattern>,
}

impl SelectorChain {
    /// Compiles `patterns`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSelector`] for the first pattern that does not parse.
    pub fn parse<S: AsRef<str>>(patterns: &[S]) -> Result<Self, InvalidSelector> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Selector::parse(pattern)
                    .map(|selector| Pattern {
                        source: pattern.to_string(),
                        selector,
                    })
                    .map_err(|e| InvalidSelector {
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Number of patterns in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true when the chain has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// All matches of the first pattern that matches anything, in document order.
    #[must_use]
    pub fn select_all<'a>(&self, document: &'a Html) -> Option<ChainMatch<Vec<ElementRef<'a>>>> {
        self.patterns.iter().find_map(|pattern| {
            let matches: Vec<_> = document.select(&pattern.selector).collect();
            (!matches.is_empty()).then(|| ChainMatch {
                pattern: pattern.source.clone(),
                value: matches,
            })
        })
    }

    /// First element matched by the first pattern that matches anything.
    #[must_use]
    pub fn select_first<'a>(&self, document: &'a Html) -> Option<ChainMatch<ElementRef<'a>>> {
        self.patterns.iter().find_map(|pattern| {
            document
                .select(&pattern.selector)
                .next()
                .map(|element| ChainMatch {
                    pattern: pattern.source.clone(),
                    value: element,
                })
        })
    }
}

/// A chain hit together with the pattern that produced it.
#[derive(Debug, Clone)]
pub struct ChainMatch<T> {
    /// Source text of the winning pattern.
    pub pattern: String,
    /// Matched element(s).
    pub value: T,
}
