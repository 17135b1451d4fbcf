mod allanime;
mod catalog;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, SourceConfig};
use crate::http::HttpError;

pub(crate) use allanime::AllAnimeSource;
pub(crate) use catalog::CatalogSource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ShowSummary {
    pub(crate) id: String,
    pub(crate) source_id: String,
    pub(crate) url: String,
}

impl ShowSummary {
    pub(crate) fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for ShowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.source_id, self.id, self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ShowCover {
    pub(crate) id: String,
    pub(crate) source_id: String,
    pub(crate) url: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) cover_url: Option<String>,
    #[serde(default)]
    pub(crate) intro: Option<String>,
}

impl ShowCover {
    pub(crate) fn summary(&self) -> ShowSummary {
        ShowSummary::new(&self.id, &self.source_id, &self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Episode {
    pub(crate) label: String,
    pub(crate) order: i64,
    pub(crate) url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PlayLine {
    pub(crate) name: String,
    pub(crate) episodes: Vec<Episode>,
}

impl PlayLine {
    pub(crate) fn contains(&self, episode: &Episode) -> bool {
        self.episodes.iter().any(|candidate| candidate == episode)
    }

    // "5/12" style position used as the watch-process display.
    pub(crate) fn progress_label(&self, episode: &Episode) -> String {
        let total = self.episodes.len();
        match self.episodes.iter().position(|candidate| candidate == episode) {
            Some(idx) => format!("{}/{total}", idx + 1),
            None => format!("{}/{total}", episode.label),
        }
    }
}

/// Opaque continuation handed back by a source between search pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageToken(pub(crate) String);

impl PageToken {
    pub(crate) fn page_number(&self) -> Option<u32> {
        self.0.trim().parse::<u32>().ok()
    }
}

impl From<u32> for PageToken {
    fn from(page: u32) -> Self {
        Self(page.to_string())
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SearchPage {
    pub(crate) covers: Vec<ShowCover>,
    pub(crate) next_page: Option<PageToken>,
}

#[derive(Debug, Error)]
pub(crate) enum SourceError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("unexpected response from {source_id}: {message}")]
    Parse { source_id: String, message: String },
    #[error("{source_id} does not understand page token '{token}'")]
    BadPageToken { source_id: String, token: String },
}

#[async_trait]
pub(crate) trait ContentSource: Send + Sync {
    fn id(&self) -> &str;

    fn first_page(&self, _query: &str) -> PageToken {
        PageToken::from(1)
    }

    async fn search_page(&self, page: PageToken, query: &str) -> Result<SearchPage, SourceError>;

    async fn play_lines(&self, show: &ShowSummary) -> Result<Vec<PlayLine>, SourceError>;
}

#[derive(Default, Clone)]
pub(crate) struct SourceRegistry {
    order: Vec<String>,
    sources: HashMap<String, Arc<dyn ContentSource>>,
}

impl SourceRegistry {
    pub(crate) fn register(&mut self, source: Arc<dyn ContentSource>) {
        let id = source.id().to_string();
        if self.sources.insert(id.clone(), source).is_none() {
            self.order.push(id);
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<dyn ContentSource>> {
        self.sources.get(id).cloned()
    }

    pub(crate) fn ids(&self) -> &[String] {
        &self.order
    }

    pub(crate) fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for source in &config.sources {
            let built: Arc<dyn ContentSource> = match source {
                SourceConfig::Allanime { id, mode } => {
                    Arc::new(AllAnimeSource::new(id, mode, config.http.clone()))
                }
                SourceConfig::Catalog { id, base_url } => {
                    Arc::new(CatalogSource::new(id, base_url, config.http.clone()))
                }
            };
            registry.register(built);
        }
        registry
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("order", &self.order)
            .finish()
    }
}

pub(crate) const SORT_DEFAULT_KEY: &str = "default";
pub(crate) const SORT_LABEL_KEY: &str = "label";

pub(crate) fn sort_episodes(sort_key: &str, episodes: &mut [Episode]) {
    match sort_key {
        SORT_LABEL_KEY => episodes.sort_by(|a, b| compare_episode_labels(&a.label, &b.label)),
        _ => episodes.sort_by_key(|episode| episode.order),
    }
}

pub(crate) fn episode_order_from_label(label: &str, position: usize) -> i64 {
    match label.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && (value - value.round()).abs() < 0.000_001 => {
            value.round() as i64
        }
        _ => position as i64 + 1,
    }
}

pub(crate) fn compare_episode_labels(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(left), Ok(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSource;

    #[test]
    fn registry_keeps_registration_order_and_ignores_duplicates() {
        let mut registry = SourceRegistry::default();
        registry.register(Arc::new(FakeSource::new("b")));
        registry.register(Arc::new(FakeSource::new("a")));
        registry.register(Arc::new(FakeSource::new("b")));

        assert_eq!(registry.ids(), &["b".to_string(), "a".to_string()]);
        assert!(registry.get("a").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn episode_order_uses_integer_labels_and_falls_back_to_position() {
        assert_eq!(episode_order_from_label("12", 0), 12);
        assert_eq!(episode_order_from_label(" 3 ", 7), 3);
        assert_eq!(episode_order_from_label("13.5", 13), 14);
        assert_eq!(episode_order_from_label("OVA", 4), 5);
    }

    #[test]
    fn label_comparison_is_numeric_aware() {
        assert_eq!(compare_episode_labels("2", "10"), Ordering::Less);
        assert_eq!(compare_episode_labels("13.5", "13"), Ordering::Greater);
        assert_eq!(compare_episode_labels("1", "Special"), Ordering::Less);
        assert_eq!(compare_episode_labels("OVA", "Movie"), Ordering::Greater);
    }

    #[test]
    fn sort_keys_order_by_order_field_or_label() {
        let mut episodes = vec![
            Episode {
                label: "10".to_string(),
                order: 1,
                url: "a".to_string(),
            },
            Episode {
                label: "9".to_string(),
                order: 2,
                url: "b".to_string(),
            },
        ];

        sort_episodes(SORT_LABEL_KEY, &mut episodes);
        assert_eq!(episodes[0].label, "9");

        sort_episodes(SORT_DEFAULT_KEY, &mut episodes);
        assert_eq!(episodes[0].label, "10");

        sort_episodes("unknown", &mut episodes);
        assert_eq!(episodes[0].order, 1);
    }

    #[test]
    fn page_token_round_trips_page_numbers() {
        let token = PageToken::from(4);
        assert_eq!(token.page_number(), Some(4));
        assert_eq!(PageToken("cursor-x".to_string()).page_number(), None);
    }

    #[test]
    fn play_line_contains_checks_full_episode_identity() {
        let line = PlayLine {
            name: "sub".to_string(),
            episodes: vec![Episode {
                label: "1".to_string(),
                order: 1,
                url: "u1".to_string(),
            }],
        };
        assert!(line.contains(&line.episodes[0].clone()));
        assert_eq!(line.progress_label(&line.episodes[0]), "1/1");
        assert!(!line.contains(&Episode {
            label: "1".to_string(),
            order: 1,
            url: "other".to_string(),
        }));
    }
}
