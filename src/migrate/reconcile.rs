use super::MigrateError;
use crate::source::{ContentSource, Episode, PlayLine, ShowSummary};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Reconciled {
    pub(crate) play_lines: Vec<PlayLine>,
    pub(crate) play_line: Option<PlayLine>,
    pub(crate) episode: Option<Episode>,
}

/// Loads the target's play-lines and picks where to resume.
///
/// With prior progress the play-line with the same episode count is
/// preferred (else the first one), and within it the episode with the same
/// `order` (else the one at the old positional index, if it exists). Without
/// prior progress the first episode of the first play-line is used.
pub(crate) async fn reconcile(
    source: &dyn ContentSource,
    target: &ShowSummary,
    prior: Option<(&PlayLine, &Episode)>,
) -> Result<Reconciled, MigrateError> {
    let failed = |message: String| MigrateError::PlayLineRetrievalFailed {
        source_id: target.source_id.clone(),
        message,
    };

    let play_lines = source
        .play_lines(target)
        .await
        .map_err(|err| failed(err.to_string()))?;
    if play_lines.is_empty() {
        return Err(failed("source returned no play lines".to_string()));
    }

    let (play_line, episode) = match resume_point(&play_lines, prior) {
        Some((line, episode)) => (Some(line.clone()), episode.cloned()),
        None => (None, None),
    };
    Ok(Reconciled {
        play_lines,
        play_line,
        episode,
    })
}

pub(crate) fn resume_point<'a>(
    play_lines: &'a [PlayLine],
    prior: Option<(&PlayLine, &Episode)>,
) -> Option<(&'a PlayLine, Option<&'a Episode>)> {
    let Some((old_line, old_episode)) = prior else {
        let first = play_lines.first()?;
        return Some((first, first.episodes.first()));
    };

    let line = play_lines
        .iter()
        .find(|line| line.episodes.len() == old_line.episodes.len())
        .or_else(|| play_lines.first())?;

    let episode = line
        .episodes
        .iter()
        .find(|episode| episode.order == old_episode.order)
        .or_else(|| {
            let old_index = old_line
                .episodes
                .iter()
                .position(|episode| episode == old_episode)?;
            line.episodes.get(old_index)
        });

    Some((line, episode))
}
