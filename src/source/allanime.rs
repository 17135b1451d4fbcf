use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    ContentSource, Episode, PageToken, PlayLine, SearchPage, ShowCover, ShowSummary, SourceError,
    compare_episode_labels, episode_order_from_label,
};
use crate::http::{HttpOptions, TextRequest, fetch_text};

const API_URL: &str = "https://api.allanime.day/api";
const REFERER: &str = "https://allmanga.to";
const PAGE_SIZE: usize = 40;
const MODES: [&str; 3] = ["sub", "dub", "raw"];

const SEARCH_GQL: &str = "query( $search: SearchInput $limit: Int $page: Int $translationType: VaildTranslationTypeEnumType $countryOrigin: VaildCountryOriginEnumType ) { shows( search: $search limit: $limit page: $page translationType: $translationType countryOrigin: $countryOrigin ) { edges { _id name thumbnail availableEpisodes __typename } }}";
const DETAIL_GQL: &str = "query ($showId: String!) { show( _id: $showId ) { _id availableEpisodesDetail }}";

pub(crate) struct AllAnimeSource {
    id: String,
    mode: String,
    http: HttpOptions,
}

impl AllAnimeSource {
    pub(crate) fn new(id: &str, mode: &str, http: HttpOptions) -> Self {
        Self {
            id: id.to_string(),
            mode: mode.to_string(),
            http,
        }
    }

    fn request(&self, gql: &str, variables: Value) -> TextRequest {
        TextRequest::get(API_URL)
            .referer(REFERER)
            .query("variables", variables.to_string())
            .query("query", gql)
    }

    fn parse_error(&self, message: impl Into<String>) -> SourceError {
        SourceError::Parse {
            source_id: self.id.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ContentSource for AllAnimeSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search_page(&self, page: PageToken, query: &str) -> Result<SearchPage, SourceError> {
        let Some(page_number) = page.page_number().filter(|page| *page > 0) else {
            return Err(SourceError::BadPageToken {
                source_id: self.id.clone(),
                token: page.0,
            });
        };
        let variables = json!({
            "search": {"allowAdult": false, "allowUnknown": false, "query": query},
            "limit": PAGE_SIZE,
            "page": page_number,
            "translationType": self.mode,
            "countryOrigin": "ALL",
        });
        debug!(source = %self.id, page = page_number, query, "searching allanime");
        let raw = fetch_text(self.request(SEARCH_GQL, variables), self.http.clone()).await?;
        let parsed: Value =
            serde_json::from_str(&raw).map_err(|err| self.parse_error(err.to_string()))?;
        let covers = parse_search_covers(&parsed, &self.id)
            .ok_or_else(|| self.parse_error("missing /data/shows/edges"))?;

        let next_page = (covers.len() >= PAGE_SIZE).then(|| PageToken::from(page_number + 1));
        Ok(SearchPage { covers, next_page })
    }

    async fn play_lines(&self, show: &ShowSummary) -> Result<Vec<PlayLine>, SourceError> {
        let variables = json!({ "showId": show.id });
        let raw = fetch_text(self.request(DETAIL_GQL, variables), self.http.clone()).await?;
        let parsed: Value =
            serde_json::from_str(&raw).map_err(|err| self.parse_error(err.to_string()))?;
        let detail = parsed
            .pointer("/data/show/availableEpisodesDetail")
            .ok_or_else(|| self.parse_error("missing /data/show/availableEpisodesDetail"))?;

        Ok(play_lines_from_detail(detail, &show.id, &self.mode))
    }
}

pub(super) fn parse_search_covers(parsed: &Value, source_id: &str) -> Option<Vec<ShowCover>> {
    let edges = parsed.pointer("/data/shows/edges")?.as_array()?;

    Some(
        edges
            .iter()
            .filter_map(|edge| {
                let id = edge.get("_id")?.as_str()?.trim();
                let title = edge.get("name")?.as_str()?.trim();
                if id.is_empty() || title.is_empty() {
                    return None;
                }
                let cover_url = edge
                    .get("thumbnail")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string);
                Some(ShowCover {
                    id: id.to_string(),
                    source_id: source_id.to_string(),
                    url: id.to_string(),
                    title: title.to_string(),
                    cover_url,
                    intro: None,
                })
            })
            .collect(),
    )
}

fn mode_labels(detail: &Value, mode: &str) -> Vec<String> {
    let Some(items) = detail.get(mode).and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut labels = items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .filter(|label| !label.is_empty() && label != "null")
        .collect::<Vec<_>>();
    labels.sort_by(|left, right| compare_episode_labels(left, right));
    labels
}

// The configured mode leads so it becomes the default play-line.
pub(super) fn play_lines_from_detail(
    detail: &Value,
    show_id: &str,
    preferred: &str,
) -> Vec<PlayLine> {
    let mut modes = vec![preferred];
    modes.extend(MODES.iter().copied().filter(|mode| *mode != preferred));

    modes
        .into_iter()
        .filter_map(|mode| {
            let labels = mode_labels(detail, mode);
            if labels.is_empty() {
                return None;
            }
            let episodes = labels
                .into_iter()
                .enumerate()
                .map(|(position, label)| Episode {
                    order: episode_order_from_label(&label, position),
                    url: format!("{show_id}/{mode}/{label}"),
                    label,
                })
                .collect();
            Some(PlayLine {
                name: mode.to_string(),
                episodes,
            })
        })
        .collect()
}
