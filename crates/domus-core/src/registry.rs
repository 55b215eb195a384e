//! Maps source identifiers to extraction strategies.
//!
//! Matching is prefix-based against an ordered table: the first registered
//! prefix the identifier starts with wins. Order is the insertion order and
//! is never re-sorted.

use std::fmt;

use crate::models::RawBag;
use crate::traits::PageExtractor;

/// Source families with a dedicated extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFamily {
    Olx,
    Publi24,
}

impl SourceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFamily::Olx => "olx",
            SourceFamily::Publi24 => "publi24",
        }
    }
}

impl fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The extraction strategy resolved for an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Family(SourceFamily),
    /// No registered prefix matched. Always yields an error bag.
    Unhandled,
}

impl Strategy {
    /// Run this strategy for `url`.
    ///
    /// `Unhandled` never touches the extractor.
    pub async fn extract<E: PageExtractor>(&self, extractor: &E, url: &str) -> RawBag {
        match self {
            Strategy::Family(family) => extractor.extract(*family, url).await,
            Strategy::Unhandled => RawBag::error(url, format!("No handler for {url}")),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Family(family) => write!(f, "{family}"),
            Strategy::Unhandled => write!(f, "unhandled"),
        }
    }
}

/// Ordered prefix → family table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyRegistry {
    entries: Vec<(String, SourceFamily)>,
}

impl StrategyRegistry {
    /// Registry with no entries: every identifier resolves to `Unhandled`.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a prefix. Earlier registrations take precedence.
    pub fn register(mut self, prefix: impl Into<String>, family: SourceFamily) -> Self {
        self.entries.push((prefix.into(), family));
        self
    }

    pub fn resolve(&self, identifier: &str) -> Strategy {
        self.entries
            .iter()
            .find(|(prefix, _)| identifier.starts_with(prefix.as_str()))
            .map(|(_, family)| Strategy::Family(*family))
            .unwrap_or(Strategy::Unhandled)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, SourceFamily)> {
        self.entries.iter().map(|(p, f)| (p.as_str(), *f))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::empty()
            .register("https://www.olx.ro/", SourceFamily::Olx)
            .register("https://www.publi24.ro/", SourceFamily::Publi24)
    }
}
