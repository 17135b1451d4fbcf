use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::MigrateError;
use crate::source::{ContentSource, ShowCover, SourceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AggregateOptions {
    pub(crate) min_results: usize,
    pub(crate) max_pages: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            min_results: 3,
            max_pages: 8,
        }
    }
}

/// Searches every known source in `priority` concurrently and flattens the
/// covers in priority order. Repeated ids are searched once.
///
/// Each source pages sequentially until it has `min_results` covers, runs
/// out of pages, fails, or hits `max_pages`. A failing source only ends its
/// own search. Cancelling `cancel` drops all outstanding searches and
/// returns [`MigrateError::Cancelled`].
pub(crate) async fn aggregate(
    registry: &SourceRegistry,
    priority: &[String],
    query: &str,
    options: AggregateOptions,
    cancel: &CancellationToken,
) -> Result<Vec<ShowCover>, MigrateError> {
    let mut seen = HashSet::new();
    let searches = priority
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| {
            let source = registry.get(id);
            if source.is_none() {
                warn!(source = %id, "skipping unknown source");
            }
            source
        })
        .map(|source| search_source(source, query, options))
        .collect::<Vec<_>>();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MigrateError::Cancelled),
        per_source = join_all(searches) => Ok(per_source.into_iter().flatten().collect()),
    }
}

async fn search_source(
    source: Arc<dyn ContentSource>,
    query: &str,
    options: AggregateOptions,
) -> Vec<ShowCover> {
    let mut covers = Vec::new();
    let mut next_page = Some(source.first_page(query));
    let mut fetched = 0;

    while covers.len() < options.min_results && fetched < options.max_pages.max(1) {
        let Some(page) = next_page.take() else {
            break;
        };
        fetched += 1;

        match source.search_page(page.clone(), query).await {
            Ok(result) => {
                debug!(
                    source = source.id(),
                    page = %page,
                    covers = result.covers.len(),
                    more = result.next_page.is_some(),
                    "search page loaded"
                );
                covers.extend(result.covers);
                next_page = result.next_page;
            }
            Err(err) => {
                let err = MigrateError::SourceUnavailable {
                    source_id: source.id().to_string(),
                    message: err.to_string(),
                };
                warn!(page = %page, kept = covers.len(), "{err}");
                break;
            }
        }
    }

    covers
}
