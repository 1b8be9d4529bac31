// src/ingest/parsers/dispatch.rs
use std::sync::Arc;

use super::channel::{is_channel_reference, ChannelParser};
use super::descriptors::{FEEDS, SITES};
use super::feed::FeedParser;
use super::site::SiteParser;
use super::universal::UniversalParser;
use super::ExtractionParser;
use crate::ingest::fetch::ResilientFetcher;

struct ParserMapping {
    triggers: Vec<String>,
    /// Checked against the source URL alone, before the triggers.
    url_matcher: Option<fn(&str) -> bool>,
    parser: Arc<dyn ExtractionParser>,
}

impl ParserMapping {
    fn matches(&self, haystack: &str, url: &str) -> bool {
        self.url_matcher.is_some_and(|m| m(url))
            || self.triggers.iter().any(|t| haystack.contains(t.as_str()))
    }
}

/// Picks an extraction parser from a source's name and URL. First registered
/// mapping with a URL-matcher or trigger hit wins; otherwise a universal parser is returned.
pub struct ParserDispatcher {
    mappings: Vec<ParserMapping>,
    fetcher: Arc<ResilientFetcher>,
}

impl ParserDispatcher {
    /// Empty dispatcher: everything resolves to the universal parser.
    pub fn new(fetcher: Arc<ResilientFetcher>) -> Self {
        Self {
            mappings: Vec::new(),
            fetcher,
        }
    }

    /// Built-in families in dispatch order: channels, then sites, then feeds.
    /// A channel URL wins over an agency name, so "ФНС в Telegram" stays a channel.
    pub fn with_builtin(fetcher: Arc<ResilientFetcher>) -> Self {
        let mut d = Self::new(fetcher.clone());
        d.register_url_matcher(
            is_channel_reference,
            Arc::new(ChannelParser::new(fetcher.clone())),
        );
        for site in SITES.iter().copied() {
            d.register(site.triggers, Arc::new(SiteParser::new(site, fetcher.clone())));
        }
        for feed in FEEDS.iter().copied() {
            d.register(feed.triggers, Arc::new(FeedParser::new(feed, fetcher.clone())));
        }
        d
    }

    pub fn register<S: AsRef<str>>(&mut self, triggers: &[S], parser: Arc<dyn ExtractionParser>) {
        let triggers = triggers
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.mappings.push(ParserMapping {
            triggers,
            url_matcher: None,
            parser,
        });
    }

    /// Mapping decided by the source URL only; the name is not consulted.
    pub fn register_url_matcher(&mut self, matcher: fn(&str) -> bool, parser: Arc<dyn ExtractionParser>) {
        self.mappings.push(ParserMapping {
            triggers: Vec::new(),
            url_matcher: Some(matcher),
            parser,
        });
    }

    pub fn select_parser(&self, name: &str, url: &str) -> Arc<dyn ExtractionParser> {
        let haystack = format!("{name} {url}").to_lowercase();
        self.mappings
            .iter()
            .find(|m| m.matches(&haystack, url))
            .map(|m| m.parser.clone())
            .unwrap_or_else(|| Arc::new(UniversalParser::new(name, self.fetcher.clone())))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
