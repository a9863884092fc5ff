//! Frontier discovery for one category
//!
//! Discovery walks three strategies in order and stops as soon as the
//! category quota is met:
//! - plain listing pagination
//! - the listing under each alternative sort order
//! - keyword searches scoped to the category
//!
//! Every fetch failure skips one page. Discovery itself never fails; a
//! category that runs out of strategies below quota is reported, not raised.

use crate::config::{CategoryEntry, Config, DelayRange, DiscoveryConfig};
use crate::crawler::fetcher::{load_page, FetchSession};
use crate::crawler::parser::extract_links_simple;
use crate::state::DiscoveryPhase;
use crate::url::{
    canonicalize, category_name, is_item_link, listing_page_url, search_page_url, sorted_page_url,
};
use crate::{ConfigError, HarvestError};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// A category being harvested and the item URLs found for it so far
#[derive(Debug, Clone)]
pub struct CategoryTarget {
    pub name: String,
    pub listing_url: Url,
    pub quota: usize,
    discovered: HashSet<String>,
    order: Vec<String>,
}

impl CategoryTarget {
    pub fn new(name: impl Into<String>, listing_url: Url, quota: usize) -> Self {
        Self {
            name: name.into(),
            listing_url,
            quota,
            discovered: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Builds a target from a configured category
    pub fn from_entry(entry: &CategoryEntry, default_quota: usize) -> Result<Self, HarvestError> {
        let listing_url = Url::parse(&entry.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", entry.url, e)))?;
        let name = match &entry.name {
            Some(name) => name.clone(),
            None => category_name(&listing_url).ok_or_else(|| {
                ConfigError::InvalidUrl(format!("cannot derive a category name from {}", entry.url))
            })?,
        };

        Ok(Self::new(
            name,
            listing_url,
            entry.quota.unwrap_or(default_quota),
        ))
    }

    /// Inserts a canonical URL, returning true if it was new
    pub fn insert(&mut self, canonical: String) -> bool {
        if self.discovered.contains(&canonical) {
            return false;
        }
        self.discovered.insert(canonical.clone());
        self.order.push(canonical);
        true
    }

    /// Discovered URLs in the order they were found
    pub fn urls(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_quota_met(&self) -> bool {
        self.order.len() >= self.quota
    }

    /// Canonicalizes raw links and inserts the new ones, stopping at quota
    ///
    /// Returns the number of URLs added.
    pub fn absorb(&mut self, links: &[String], item_marker: &str) -> usize {
        let mut added = 0;

        for link in links {
            if self.is_quota_met() {
                break;
            }
            if !is_item_link(link, item_marker) {
                continue;
            }

            match canonicalize(link, item_marker) {
                Ok(canonical) => {
                    if self.insert(canonical) {
                        added += 1;
                    }
                }
                Err(e) => tracing::trace!("Skipping link {}: {}", link, e),
            }
        }

        added
    }
}

/// Outcome of one category's discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub category: String,
    pub quota: usize,
    pub discovered: usize,

    /// URLs added while paginating
    pub paginated: usize,

    /// URLs added while varying the sort order
    pub sorted: usize,

    /// URLs added by keyword searches
    pub searched: usize,

    pub pages_visited: usize,
    pub pages_failed: usize,
}

impl DiscoveryReport {
    pub fn quota_met(&self) -> bool {
        self.discovered >= self.quota
    }

    pub fn shortfall(&self) -> usize {
        self.quota.saturating_sub(self.discovered)
    }

    /// URLs added during `phase`
    pub fn yield_for(&self, phase: DiscoveryPhase) -> usize {
        match phase {
            DiscoveryPhase::Paginating => self.paginated,
            DiscoveryPhase::SortVarying => self.sorted,
            DiscoveryPhase::Searching => self.searched,
            DiscoveryPhase::Done => 0,
        }
    }

    fn record(&mut self, phase: DiscoveryPhase, added: usize) {
        match phase {
            DiscoveryPhase::Paginating => self.paginated += added,
            DiscoveryPhase::SortVarying => self.sorted += added,
            DiscoveryPhase::Searching => self.searched += added,
            DiscoveryPhase::Done => {}
        }
    }
}

/// What happened when one discovery page was visited
enum PageVisit {
    Added(usize),
    Failed,
}

/// Runs the discovery state machine against a fetch session
pub struct Frontier {
    discovery: DiscoveryConfig,
    search_url: Url,
    item_marker: String,
    page_delay: DelayRange,
    ready_timeout: Duration,
}

impl Frontier {
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        let search_url = Url::parse(&config.discovery.search_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("{}: {}", config.discovery.search_url, e))
        })?;

        Ok(Self {
            discovery: config.discovery.clone(),
            search_url,
            item_marker: config.harvest.item_marker.clone(),
            page_delay: config.politeness.page_delay,
            ready_timeout: config.fetcher.ready_timeout(),
        })
    }

    /// Discovers item URLs for `target` until its quota is met or every
    /// strategy is exhausted
    pub async fn discover(
        &self,
        session: &mut dyn FetchSession,
        target: &mut CategoryTarget,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport {
            category: target.name.clone(),
            quota: target.quota,
            ..Default::default()
        };

        tracing::info!(
            "Discovering {} (target: {} URLs)",
            target.name,
            target.quota
        );

        let mut phase = DiscoveryPhase::Paginating;
        while !phase.is_terminal() {
            if target.is_quota_met() {
                break;
            }

            tracing::info!(
                "{}: entering {} with {}/{} URLs",
                target.name,
                phase,
                target.len(),
                target.quota
            );

            let added = match phase {
                DiscoveryPhase::Paginating => self.paginate(session, target, &mut report).await,
                DiscoveryPhase::SortVarying => self.vary_sort(session, target, &mut report).await,
                DiscoveryPhase::Searching => self.search(session, target, &mut report).await,
                DiscoveryPhase::Done => 0,
            };
            report.record(phase, added);

            phase = phase.next();
        }

        report.discovered = target.len();

        if report.quota_met() {
            tracing::info!("{}: quota of {} reached", target.name, target.quota);
        } else {
            tracing::warn!(
                "{}: only {}/{} URLs found, short by {}",
                target.name,
                report.discovered,
                report.quota,
                report.shortfall()
            );
        }

        report
    }

    async fn paginate(
        &self,
        session: &mut dyn FetchSession,
        target: &mut CategoryTarget,
        report: &mut DiscoveryReport,
    ) -> usize {
        let mut added = 0;

        for page in 1..=self.discovery.max_pages {
            if target.is_quota_met() {
                break;
            }

            let url = listing_page_url(&target.listing_url, page);
            match self.visit(session, &url, target, report).await {
                PageVisit::Added(0) => {
                    tracing::info!("{}: no new URLs on listing page {}", target.name, page);
                    break;
                }
                PageVisit::Added(n) => {
                    tracing::info!(
                        "{}: added {} from listing page {} ({}/{})",
                        target.name,
                        n,
                        page,
                        target.len(),
                        target.quota
                    );
                    added += n;
                }
                PageVisit::Failed => continue,
            }
        }

        added
    }

    async fn vary_sort(
        &self,
        session: &mut dyn FetchSession,
        target: &mut CategoryTarget,
        report: &mut DiscoveryReport,
    ) -> usize {
        let mut added = 0;

        for mode in &self.discovery.sort_modes {
            if target.is_quota_met() {
                break;
            }
            tracing::debug!("{}: trying sort order {}", target.name, mode);

            for page in 1..=self.discovery.sort_pages {
                if target.is_quota_met() {
                    break;
                }

                let url = sorted_page_url(&target.listing_url, mode, page);
                match self.visit(session, &url, target, report).await {
                    PageVisit::Added(0) => break,
                    PageVisit::Added(n) => added += n,
                    PageVisit::Failed => continue,
                }
            }
        }

        added
    }

    async fn search(
        &self,
        session: &mut dyn FetchSession,
        target: &mut CategoryTarget,
        report: &mut DiscoveryReport,
    ) -> usize {
        let mut added = 0;

        for term in &self.discovery.search_terms {
            if target.is_quota_met() {
                break;
            }
            tracing::debug!("{}: searching for {}", target.name, term);

            for page in 1..=self.discovery.search_pages {
                if target.is_quota_met() {
                    break;
                }

                let url = search_page_url(&self.search_url, term, &target.name, page);
                match self.visit(session, &url, target, report).await {
                    PageVisit::Added(0) => break,
                    PageVisit::Added(n) => added += n,
                    PageVisit::Failed => continue,
                }
            }
        }

        added
    }

    /// Loads one discovery page and absorbs its item links
    async fn visit(
        &self,
        session: &mut dyn FetchSession,
        url: &Url,
        target: &mut CategoryTarget,
        report: &mut DiscoveryReport,
    ) -> PageVisit {
        if report.pages_visited > 0 {
            self.page_delay.pause().await;
        }
        report.pages_visited += 1;

        match load_page(session, url.as_str(), self.ready_timeout, false).await {
            Ok(content) => {
                let links = extract_links_simple(&content, url, &self.discovery.link_selectors);
                tracing::trace!("{} candidate links on {}", links.len(), url);
                PageVisit::Added(target.absorb(&links, &self.item_marker))
            }
            Err(e) => {
                tracing::warn!("Skipping discovery page {}: {}", url, e);
                report.pages_failed += 1;
                PageVisit::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, PolitenessConfig};
    use crate::crawler::testing::{listing_page, ScriptedSite};

    const LISTING: &str = "https://example.com/shelf/show/fantasy";

    fn test_config(quota: usize) -> Config {
        let mut config = Config {
            harvest: Default::default(),
            discovery: Default::default(),
            politeness: PolitenessConfig {
                item_delay: DelayRange::none(),
                page_delay: DelayRange::none(),
                category_delay: DelayRange::none(),
            },
            fetcher: Default::default(),
            output: OutputConfig {
                directory: "./out".to_string(),
                database_path: "./harvest.db".to_string(),
            },
            categories: vec![],
        };
        config.harvest.quota = quota;
        config.discovery.max_pages = 5;
        config.discovery.sort_pages = 2;
        config.discovery.search_pages = 2;
        config.discovery.sort_modes = vec!["rating".to_string()];
        config.discovery.search_terms = vec!["award".to_string()];
        config.discovery.search_url = "https://example.com/search".to_string();
        config
    }

    fn target(quota: usize) -> CategoryTarget {
        CategoryTarget::new("fantasy", Url::parse(LISTING).unwrap(), quota)
    }

    fn items(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("/book/show/{}.Title", i)).collect()
    }

    #[test]
    fn test_absorb_deduplicates_canonical_forms() {
        let mut target = target(10);
        let links = vec![
            "https://example.com/book/show/1?from_search=true".to_string(),
            "https://example.com/book/show/1#reviews".to_string(),
            "https://example.com/book/show/1".to_string(),
            "https://example.com/author/show/7".to_string(),
        ];
        assert_eq!(target.absorb(&links, "/book/show/"), 1);
        assert_eq!(target.urls(), ["https://example.com/book/show/1"]);
    }

    #[test]
    fn test_absorb_ignores_non_item_links() {
        let mut target = target(10);
        let links = vec![
            "https://example.com/shelf/show/fantasy?page=2".to_string(),
            "https://example.com/search?q=/book/show/5".to_string(),
            "https://example.com/book/show/5.Dune".to_string(),
        ];
        assert_eq!(target.absorb(&links, "/book/show/"), 1);
        assert_eq!(target.urls(), ["https://example.com/book/show/5.Dune"]);
    }

    #[test]
    fn test_absorb_cuts_off_at_quota() {
        let mut target = target(3);
        let links: Vec<String> = (0..10)
            .map(|i| format!("https://example.com/book/show/{}", i))
            .collect();
        assert_eq!(target.absorb(&links, "/book/show/"), 3);
        assert!(target.is_quota_met());
        assert_eq!(target.absorb(&links, "/book/show/"), 0);
    }

    #[test]
    fn test_target_from_entry_derives_name() {
        let entry = CategoryEntry {
            url: "https://example.com/shelf/show/science-fiction".to_string(),
            name: None,
            quota: None,
        };
        let target = CategoryTarget::from_entry(&entry, 600).unwrap();
        assert_eq!(target.name, "science-fiction");
        assert_eq!(target.quota, 600);
    }

    #[tokio::test]
    async fn test_quota_met_during_pagination() {
        let factory = ScriptedSite::new()
            .page(LISTING, listing_page(&items(0..4)))
            .page(format!("{}?page=2", LISTING), listing_page(&items(4..8)))
            .into_factory();
        let mut session = factory.session();
        let frontier = Frontier::new(&test_config(6)).unwrap();
        let mut target = target(6);

        let report = frontier.discover(&mut session, &mut target).await;

        assert_eq!(target.len(), 6);
        assert!(report.quota_met());
        assert_eq!(report.paginated, 6);
        assert_eq!(report.sorted, 0);
        // No page after the one that crossed the quota
        assert_eq!(factory.visited().len(), 2);
    }

    #[tokio::test]
    async fn test_phases_advance_on_zero_yield() {
        let factory = ScriptedSite::new()
            .page(LISTING, listing_page(&items(0..3)))
            .page(format!("{}?page=2", LISTING), listing_page(&items(0..3)))
            .page(
                format!("{}?sort=rating&page=1", LISTING),
                listing_page(&items(2..5)),
            )
            .page(
                "https://example.com/search?q=award+fantasy&page=1",
                listing_page(&items(5..7)),
            )
            .into_factory();
        let mut session = factory.session();
        let frontier = Frontier::new(&test_config(100)).unwrap();
        let mut target = target(100);

        let report = frontier.discover(&mut session, &mut target).await;

        assert_eq!(report.paginated, 3);
        assert_eq!(report.sorted, 2);
        assert_eq!(report.searched, 2);
        assert_eq!(report.yield_for(DiscoveryPhase::Done), 0);
        assert_eq!(target.len(), 7);
        assert!(!report.quota_met());
        assert_eq!(report.shortfall(), 93);

        let visited = factory.visited();
        // Pagination stopped on the duplicate-only page 2
        assert!(!visited.contains(&format!("{}?page=3", LISTING)));
        // Sort page 2 and search page 2 are missing from the site and skipped
        assert_eq!(report.pages_failed, 2);
    }

    #[tokio::test]
    async fn test_fetch_failures_are_skipped() {
        let factory = ScriptedSite::new()
            .page(LISTING, listing_page(&items(0..2)))
            .failing(format!("{}?page=2", LISTING))
            .page(format!("{}?page=3", LISTING), listing_page(&items(2..4)))
            .into_factory();
        let mut session = factory.session();
        let frontier = Frontier::new(&test_config(4)).unwrap();
        let mut target = target(4);

        let report = frontier.discover(&mut session, &mut target).await;

        assert!(report.quota_met());
        assert_eq!(report.pages_failed, 1);
        assert_eq!(target.len(), 4);
    }

    #[tokio::test]
    async fn test_discovered_urls_are_unique() {
        let mut links = items(0..5);
        links.extend(items(0..5));
        let factory = ScriptedSite::new()
            .page(LISTING, listing_page(&links))
            .into_factory();
        let mut session = factory.session();
        let frontier = Frontier::new(&test_config(50)).unwrap();
        let mut target = target(50);

        frontier.discover(&mut session, &mut target).await;

        let unique: HashSet<&String> = target.urls().iter().collect();
        assert_eq!(unique.len(), target.len());
        assert_eq!(target.len(), 5);
    }
}
