use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::db::{StarredShowRecord, StarredStore};
use crate::http::HttpError;
use crate::source::{
    ContentSource, Episode, PageToken, PlayLine, SearchPage, ShowCover, ShowSummary, SourceError,
};

pub(crate) fn cover(source_id: &str, id: &str, title: &str) -> ShowCover {
    ShowCover {
        id: id.to_string(),
        source_id: source_id.to_string(),
        url: format!("/{source_id}/{id}"),
        title: title.to_string(),
        cover_url: None,
        intro: None,
    }
}

pub(crate) fn line(name: &str, episodes: i64) -> PlayLine {
    PlayLine {
        name: name.to_string(),
        episodes: (1..=episodes)
            .map(|order| Episode {
                label: order.to_string(),
                order,
                url: format!("{name}/{order}"),
            })
            .collect(),
    }
}

fn scripted_failure(message: &str) -> SourceError {
    SourceError::Http(HttpError::Transport {
        message: message.to_string(),
        attempts: 1,
    })
}

pub(crate) struct FakeSource {
    id: String,
    pages: Vec<Result<Vec<ShowCover>, String>>,
    endless: bool,
    play_lines: Result<Vec<PlayLine>, String>,
    search_gate: Option<Arc<Semaphore>>,
    play_gate: Option<Arc<Semaphore>>,
    search_calls: AtomicUsize,
    play_line_calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            pages: Vec::new(),
            endless: false,
            play_lines: Ok(Vec::new()),
            search_gate: None,
            play_gate: None,
            search_calls: AtomicUsize::new(0),
            play_line_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn page(mut self, titles: &[&str]) -> Self {
        let page_no = self.pages.len() + 1;
        let covers = titles
            .iter()
            .enumerate()
            .map(|(idx, title)| cover(&self.id, &format!("p{page_no}-{idx}"), title))
            .collect();
        self.pages.push(Ok(covers));
        self
    }

    pub(crate) fn failing_page(mut self, message: &str) -> Self {
        self.pages.push(Err(message.to_string()));
        self
    }

    // Every page is empty but always advertises another one.
    pub(crate) fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    pub(crate) fn play_lines(mut self, lines: Vec<PlayLine>) -> Self {
        self.play_lines = Ok(lines);
        self
    }

    pub(crate) fn play_line_error(mut self, message: &str) -> Self {
        self.play_lines = Err(message.to_string());
        self
    }

    pub(crate) fn search_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.search_gate = Some(gate);
        self
    }

    pub(crate) fn play_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.play_gate = Some(gate);
        self
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn play_line_calls(&self) -> usize {
        self.play_line_calls.load(Ordering::SeqCst)
    }
}

async fn pass_gate(gate: Option<&Arc<Semaphore>>) {
    if let Some(gate) = gate {
        let _permit = gate.acquire().await;
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search_page(&self, page: PageToken, _query: &str) -> Result<SearchPage, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(self.search_gate.as_ref()).await;

        let page_no = page.page_number().unwrap_or(1);
        if self.endless {
            return Ok(SearchPage {
                covers: Vec::new(),
                next_page: Some(PageToken::from(page_no + 1)),
            });
        }
        let idx = page_no.saturating_sub(1) as usize;
        match self.pages.get(idx) {
            None => Ok(SearchPage::default()),
            Some(Err(message)) => Err(scripted_failure(message)),
            Some(Ok(covers)) => Ok(SearchPage {
                covers: covers.clone(),
                next_page: (idx + 1 < self.pages.len()).then(|| PageToken::from(page_no + 1)),
            }),
        }
    }

    async fn play_lines(&self, _show: &ShowSummary) -> Result<Vec<PlayLine>, SourceError> {
        self.play_line_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(self.play_gate.as_ref()).await;

        self.play_lines
            .clone()
            .map_err(|message| scripted_failure(&message))
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    records: Mutex<Vec<StarredShowRecord>>,
}

impl MemoryStore {
    pub(crate) fn with(records: Vec<StarredShowRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl StarredStore for MemoryStore {
    fn get_starred(&self, show: &ShowSummary) -> Result<Option<StarredShowRecord>> {
        let records = self.records.lock().expect("store lock");
        Ok(records.iter().find(|record| record.summary() == *show).cloned())
    }

    fn upsert_starred(&self, record: &StarredShowRecord) -> Result<()> {
        let mut records = self.records.lock().expect("store lock");
        match records
            .iter_mut()
            .find(|existing| existing.summary() == record.summary())
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn delete_starred(&self, show: &ShowSummary) -> Result<bool> {
        let mut records = self.records.lock().expect("store lock");
        let before = records.len();
        records.retain(|record| record.summary() != *show);
        Ok(records.len() != before)
    }

    fn list_starred(&self) -> Result<Vec<StarredShowRecord>> {
        Ok(self.records.lock().expect("store lock").clone())
    }
}
