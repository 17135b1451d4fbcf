use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    ContentSource, Episode, PageToken, PlayLine, SearchPage, ShowCover, ShowSummary, SourceError,
};
use crate::http::{HttpOptions, TextRequest, fetch_text};

// Self-hosted catalog speaking a small JSON protocol:
//   GET {base}/search?q=..&page=..     -> {"covers": [..], "next_page": "2" | null}
//   GET {base}/play-lines?id=..&url=.. -> [{"name": .., "episodes": [..]}]
pub(crate) struct CatalogSource {
    id: String,
    base_url: String,
    http: HttpOptions,
}

#[derive(Debug, Deserialize)]
struct CatalogCover {
    id: String,
    url: String,
    title: String,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    intro: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogSearch {
    #[serde(default)]
    covers: Vec<CatalogCover>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogEpisode {
    label: String,
    #[serde(default)]
    order: Option<i64>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CatalogPlayLine {
    name: String,
    #[serde(default)]
    episodes: Vec<CatalogEpisode>,
}

impl CatalogSource {
    pub(crate) fn new(id: &str, base_url: &str, http: HttpOptions) -> Self {
        Self {
            id: id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn parse_error(&self, err: serde_json::Error) -> SourceError {
        SourceError::Parse {
            source_id: self.id.clone(),
            message: err.to_string(),
        }
    }

    pub(super) fn parse_search(&self, raw: &str) -> Result<SearchPage, SourceError> {
        let parsed: CatalogSearch = serde_json::from_str(raw).map_err(|err| self.parse_error(err))?;
        let covers = parsed
            .covers
            .into_iter()
            .map(|cover| ShowCover {
                id: cover.id,
                source_id: self.id.clone(),
                url: cover.url,
                title: cover.title,
                cover_url: cover.cover_url,
                intro: cover.intro,
            })
            .collect();
        let next_page = parsed
            .next_page
            .filter(|token| !token.trim().is_empty())
            .map(PageToken);
        Ok(SearchPage { covers, next_page })
    }

    pub(super) fn parse_play_lines(&self, raw: &str) -> Result<Vec<PlayLine>, SourceError> {
        let parsed: Vec<CatalogPlayLine> =
            serde_json::from_str(raw).map_err(|err| self.parse_error(err))?;
        Ok(parsed
            .into_iter()
            .map(|line| PlayLine {
                name: line.name,
                episodes: line
                    .episodes
                    .into_iter()
                    .enumerate()
                    .map(|(position, episode)| Episode {
                        order: episode.order.unwrap_or_else(|| {
                            super::episode_order_from_label(&episode.label, position)
                        }),
                        label: episode.label,
                        url: episode.url,
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl ContentSource for CatalogSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search_page(&self, page: PageToken, query: &str) -> Result<SearchPage, SourceError> {
        debug!(source = %self.id, page = %page, query, "searching catalog");
        let request = TextRequest::get(format!("{}/search", self.base_url))
            .query("q", query)
            .query("page", page.0);
        let raw = fetch_text(request, self.http.clone()).await?;
        self.parse_search(&raw)
    }

    async fn play_lines(&self, show: &ShowSummary) -> Result<Vec<PlayLine>, SourceError> {
        let request = TextRequest::get(format!("{}/play-lines", self.base_url))
            .query("id", show.id.as_str())
            .query("url", show.url.as_str());
        let raw = fetch_text(request, self.http.clone()).await?;
        self.parse_play_lines(&raw)
    }
}
