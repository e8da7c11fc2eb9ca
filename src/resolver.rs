use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::info;

use crate::db::RouteStore;
use crate::extract::{ContentExtractor, Extracted};
use crate::fetch::PageFetcher;
use crate::model::{Envelope, RouteData, RouteRecord, RouteSummary};

pub const ROUTE_NOT_FOUND: &str = "Route not found =(";
pub const ROUTES_FETCHED: &str = "Route(-s) fetched.";
pub const STORE_EMPTY: &str = "Nothing found";
pub const ALL_ROUTES_FETCHED: &str = "All routes fetched.";

/// Resolves route queries against the store and fills in scraped page content.
pub struct Resolver {
    store: Arc<RouteStore>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: ContentExtractor,
    concurrency: usize,
}

impl Resolver {
    /// `concurrency` bounds how many pages are fetched at once for one query.
    pub fn new(
        store: Arc<RouteStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: ContentExtractor,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            concurrency: concurrency.max(1),
        }
    }

    /// Look up `query` by name fragment or id. The payload is always a list,
    /// in store order; a page that cannot be fetched leaves that route with
    /// an empty description and no images.
    pub async fn resolve(&self, query: &str) -> Result<Envelope<Vec<RouteData>>> {
        let store = Arc::clone(&self.store);
        let owned = query.to_string();
        let records = tokio::task::spawn_blocking(move || store.find_by_query(&owned))
            .await
            .context("Route lookup task failed")??;
        if records.is_empty() {
            info!(query, "No route matched");
            return Ok(Envelope::not_found(ROUTE_NOT_FOUND));
        }

        info!(query, matched = records.len(), "Resolving routes");
        let data: Vec<RouteData> = stream::iter(records)
            .map(|record| self.route_data(record))
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(Envelope::found(ROUTES_FETCHED, data))
    }

    pub async fn list_all(&self) -> Result<Envelope<Vec<RouteSummary>>> {
        let store = Arc::clone(&self.store);
        let records = tokio::task::spawn_blocking(move || store.list_all())
            .await
            .context("Route listing task failed")??;
        if records.is_empty() {
            return Ok(Envelope::not_found(STORE_EMPTY));
        }
        let summaries = records.into_iter().map(RouteSummary::from).collect();
        Ok(Envelope::found(ALL_ROUTES_FETCHED, summaries))
    }

    /// An empty body counts as a failed fetch, not as a page without content.
    async fn route_data(&self, record: RouteRecord) -> RouteData {
        let fetched = self.fetcher.fetch(&record.route_link).await;
        let Some(markup) = fetched.filter(|body| !body.is_empty()) else {
            return RouteData::unfetched(record);
        };
        let Extracted {
            description,
            images,
        } = self.extractor.extract(&markup);
        RouteData {
            id: record.id,
            route_name: record.route_name,
            link: record.route_link,
            description,
            images,
        }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::fetch::PageFetcher;

    /// Serves canned markup per URL; unknown URLs are unreachable.
    #[derive(Default)]
    pub struct StubFetcher {
        pages: HashMap<String, (String, Duration)>,
    }

    impl StubFetcher {
        pub fn with_page(mut self, url: &str, markup: &str) -> Self {
            self.pages.insert(url.to_string(), (markup.to_string(), Duration::ZERO));
            self
        }

        pub fn with_slow_page(mut self, url: &str, markup: &str, delay: Duration) -> Self {
            self.pages.insert(url.to_string(), (markup.to_string(), delay));
            self
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Option<String> {
            let (markup, delay) = self.pages.get(url)?;
            tokio::time::sleep(*delay).await;
            Some(markup.clone())
        }
    }
}
