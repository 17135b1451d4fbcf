use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    AggregateOptions, MigrateError, MigrationCandidate, aggregate, rank_candidates, reconcile,
    select_best,
};
use crate::db::{StarredShowRecord, StarredStore};
use crate::source::{Episode, PlayLine, SORT_DEFAULT_KEY, ShowCover, SourceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MigrationPhase {
    Idle,
    ResolvingCover,
    CoverResolved,
    ResolvingPlayLines,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MigrationState {
    pub(crate) phase: MigrationPhase,
    pub(crate) loading_cover: bool,
    pub(crate) loading_play_lines: bool,
    pub(crate) chosen_cover: Option<ShowCover>,
    pub(crate) candidates: Vec<MigrationCandidate>,
    pub(crate) play_lines: Vec<PlayLine>,
    pub(crate) sort_key: String,
    pub(crate) chosen_play_line: Option<PlayLine>,
    pub(crate) chosen_episode: Option<Episode>,
    pub(crate) last_error: Option<MigrateError>,
}

impl Default for MigrationState {
    fn default() -> Self {
        Self {
            phase: MigrationPhase::Idle,
            loading_cover: false,
            loading_play_lines: false,
            chosen_cover: None,
            candidates: Vec::new(),
            play_lines: Vec::new(),
            sort_key: SORT_DEFAULT_KEY.to_string(),
            chosen_play_line: None,
            chosen_episode: None,
            last_error: None,
        }
    }
}

impl MigrationState {
    /// True once the current pass has nothing left to do.
    pub(crate) fn is_settled(&self) -> bool {
        match self.phase {
            MigrationPhase::Idle | MigrationPhase::Ready => true,
            MigrationPhase::CoverResolved => self.chosen_cover.is_none(),
            MigrationPhase::ResolvingCover | MigrationPhase::ResolvingPlayLines => false,
        }
    }
}

// Identifies the live pass. Updates from any other generation are dropped.
#[derive(Default)]
struct PassSlot {
    generation: u64,
    cancel: CancellationToken,
    episode_pinned: bool,
}

#[derive(Clone)]
struct Pass {
    generation: u64,
    cancel: CancellationToken,
}

struct SessionInner {
    record: StarredShowRecord,
    priority: Vec<String>,
    options: AggregateOptions,
    sources: Arc<SourceRegistry>,
    store: Arc<dyn StarredStore>,
    state: watch::Sender<MigrationState>,
    slot: Mutex<PassSlot>,
}

/// Migration of one starred show to another source.
///
/// At most one resolution pass is live at a time: starting a pass cancels
/// the previous one, and state updates from a superseded pass are dropped
/// under the same lock that performs the cancellation.
#[derive(Clone)]
pub(crate) struct MigrationSession {
    inner: Arc<SessionInner>,
}

impl MigrationSession {
    pub(crate) fn new(
        record: StarredShowRecord,
        sources: Arc<SourceRegistry>,
        store: Arc<dyn StarredStore>,
    ) -> Self {
        let (state, _) = watch::channel(MigrationState::default());
        Self {
            inner: Arc::new(SessionInner {
                record,
                priority: sources.ids().to_vec(),
                options: AggregateOptions::default(),
                sources,
                store,
                state,
                slot: Mutex::new(PassSlot::default()),
            }),
        }
    }

    // Only valid before the session is shared; later calls would fork state.
    pub(crate) fn with_priority(self, priority: Vec<String>) -> Self {
        self.rebuild(|inner| inner.priority = priority)
    }

    pub(crate) fn with_options(self, options: AggregateOptions) -> Self {
        self.rebuild(|inner| inner.options = options)
    }

    fn rebuild(self, apply: impl FnOnce(&mut SessionInner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                apply(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(shared) => {
                warn!("session already shared; ignoring configuration change");
                Self { inner: shared }
            }
        }
    }

    pub(crate) fn record(&self) -> &StarredShowRecord {
        &self.inner.record
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<MigrationState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn state(&self) -> MigrationState {
        self.inner.state.borrow().clone()
    }

    fn slot(&self) -> MutexGuard<'_, PassSlot> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_pass(&self, reset: impl FnOnce(&mut MigrationState)) -> Pass {
        let mut slot = self.slot();
        slot.cancel.cancel();
        slot.generation += 1;
        slot.cancel = CancellationToken::new();
        slot.episode_pinned = false;
        self.inner.state.send_modify(reset);
        Pass {
            generation: slot.generation,
            cancel: slot.cancel.clone(),
        }
    }

    // Returns false when the pass has been superseded.
    fn apply(&self, pass: &Pass, update: impl FnOnce(&mut MigrationState, bool)) -> bool {
        let slot = self.slot();
        if slot.generation != pass.generation || pass.cancel.is_cancelled() {
            debug!(
                generation = pass.generation,
                "dropping update from superseded pass"
            );
            return false;
        }
        let pinned = slot.episode_pinned;
        self.inner
            .state
            .send_modify(|state| update(state, pinned));
        true
    }

    /// Searches for the show on the candidate sources and resolves where to
    /// resume. Shows without recorded progress are left idle.
    pub(crate) fn start_migration(&self) -> Option<JoinHandle<()>> {
        if self.inner.record.progress().is_none() {
            info!(
                show = %self.inner.record.summary(),
                "no watch history, skipping automatic migration"
            );
            return None;
        }

        let pass = self.begin_pass(|state| {
            *state = MigrationState {
                phase: MigrationPhase::ResolvingCover,
                loading_cover: true,
                loading_play_lines: true,
                ..MigrationState::default()
            };
        });
        let session = self.clone();
        Some(tokio::spawn(async move { session.run_cover_pass(pass).await }))
    }

    /// Replaces the target show and re-resolves only its play-lines.
    pub(crate) fn choose_target_show(&self, cover: ShowCover) -> JoinHandle<()> {
        let pass = self.begin_pass(|state| {
            state.phase = MigrationPhase::ResolvingPlayLines;
            state.loading_cover = false;
            state.loading_play_lines = true;
            state.chosen_cover = Some(cover.clone());
            state.play_lines.clear();
            state.chosen_play_line = None;
            state.chosen_episode = None;
            state.last_error = None;
        });
        let session = self.clone();
        tokio::spawn(async move { session.run_play_line_stage(&pass, cover).await })
    }

    /// Pins the resume position. An episode outside `play_line` (or none)
    /// falls back to the line's first episode.
    pub(crate) fn choose_episode(
        &self,
        sort_key: &str,
        play_line: PlayLine,
        episode: Option<Episode>,
    ) {
        let episode = match episode {
            Some(episode) if play_line.contains(&episode) => Some(episode),
            Some(episode) => {
                warn!(
                    episode = %episode.label,
                    play_line = %play_line.name,
                    "episode is not part of the chosen play line, using its first episode"
                );
                play_line.episodes.first().cloned()
            }
            None => play_line.episodes.first().cloned(),
        };

        let mut slot = self.slot();
        slot.episode_pinned = true;
        self.inner.state.send_modify(|state| {
            state.sort_key = sort_key.to_string();
            state.chosen_play_line = Some(play_line);
            state.chosen_episode = episode;
        });
    }

    /// Stores the chosen show with the old record's bookkeeping and the
    /// chosen position, then drops the old record if the identity changed.
    pub(crate) fn confirm_migration(&self) -> Result<StarredShowRecord, MigrateError> {
        let state = self.state();
        let cover = state.chosen_cover.ok_or(MigrateError::NothingToConfirm)?;
        let storage = |err: anyhow::Error| MigrateError::Storage(format!("{err:#}"));

        let old_summary = self.inner.record.summary();
        let old = self
            .inner
            .store
            .get_starred(&old_summary)
            .map_err(storage)?
            .unwrap_or_else(|| self.inner.record.clone());

        let watch_process = match (&state.chosen_play_line, &state.chosen_episode) {
            (Some(line), Some(episode)) => line.progress_label(episode),
            _ => String::new(),
        };
        let migrated = StarredShowRecord {
            id: cover.id,
            source_id: cover.source_id,
            url: cover.url,
            title: cover.title,
            star_time: old.star_time,
            watch_process,
            sort_key: old.sort_key,
            reversal: old.reversal,
            tags: old.tags,
            last_play_line: state.chosen_play_line,
            last_episode: state.chosen_episode,
        };

        self.inner.store.upsert_starred(&migrated).map_err(storage)?;
        if migrated.summary() != old_summary {
            self.inner
                .store
                .delete_starred(&old_summary)
                .map_err(storage)?;
        }
        info!(
            from = %old_summary,
            to = %migrated.summary(),
            progress = %migrated.watch_process,
            "migration confirmed"
        );
        Ok(migrated)
    }

    async fn run_cover_pass(&self, pass: Pass) {
        let inner = &self.inner;
        let query = inner.record.title.as_str();

        let covers = match aggregate(
            &inner.sources,
            &inner.priority,
            query,
            inner.options,
            &pass.cancel,
        )
        .await
        {
            Ok(covers) => covers,
            Err(err) => {
                debug!(generation = pass.generation, "{err}");
                return;
            }
        };

        let best = select_best(&covers, query, &inner.priority);
        let candidates = rank_candidates(covers, query, &inner.priority);
        let Some(cover) = best else {
            info!(query, "no migration target found");
            self.apply(&pass, |state, _| {
                state.phase = MigrationPhase::CoverResolved;
                state.loading_cover = false;
                state.loading_play_lines = false;
                state.chosen_cover = None;
                state.candidates = candidates;
                state.last_error = Some(MigrateError::NoMatchFound {
                    query: query.to_string(),
                });
            });
            return;
        };

        info!(
            query,
            show = %cover.summary(),
            title = %cover.title,
            candidates = candidates.len(),
            "migration target resolved"
        );
        let resolved = self.apply(&pass, |state, _| {
            state.phase = MigrationPhase::CoverResolved;
            state.loading_cover = false;
            state.chosen_cover = Some(cover.clone());
            state.candidates = candidates;
        });
        if resolved {
            self.run_play_line_stage(&pass, cover).await;
        }
    }

    async fn run_play_line_stage(&self, pass: &Pass, cover: ShowCover) {
        let entered = self.apply(pass, |state, _| {
            state.phase = MigrationPhase::ResolvingPlayLines;
        });
        if !entered {
            return;
        }

        let target = cover.summary();
        let outcome = match self.inner.sources.get(&target.source_id) {
            Some(source) => {
                let prior = self.inner.record.progress();
                tokio::select! {
                    biased;
                    _ = pass.cancel.cancelled() => return,
                    outcome = reconcile(source.as_ref(), &target, prior) => outcome,
                }
            }
            None => Err(MigrateError::PlayLineRetrievalFailed {
                source_id: target.source_id.clone(),
                message: "source is not registered".to_string(),
            }),
        };

        match outcome {
            Ok(reconciled) => {
                self.apply(pass, |state, pinned| {
                    state.phase = MigrationPhase::Ready;
                    state.loading_play_lines = false;
                    state.play_lines = reconciled.play_lines;
                    state.last_error = None;
                    if !pinned {
                        state.sort_key = SORT_DEFAULT_KEY.to_string();
                        state.chosen_play_line = reconciled.play_line;
                        state.chosen_episode = reconciled.episode;
                    }
                });
            }
            Err(err) => {
                warn!(show = %target, "{err}");
                self.apply(pass, |state, pinned| {
                    state.phase = MigrationPhase::Ready;
                    state.loading_play_lines = false;
                    state.play_lines.clear();
                    if !pinned {
                        state.chosen_play_line = None;
                        state.chosen_episode = None;
                    }
                    state.last_error = Some(err);
                });
            }
        }
    }
}
