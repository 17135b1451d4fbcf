use chrono::{DateTime, Local};

use crate::db::StarredShowRecord;
use crate::source::{Episode, PlayLine, sort_episodes};

const PREVIEW_EDGE: usize = 3;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_star_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

pub(crate) fn describe_position(line: Option<&PlayLine>, episode: Option<&Episode>) -> String {
    match (line, episode) {
        (Some(line), Some(episode)) => format!(
            "{} ep {} ({})",
            line.name,
            episode.label,
            line.progress_label(episode)
        ),
        (Some(line), None) => format!("{} (no episode)", line.name),
        _ => "-".to_string(),
    }
}

pub(crate) fn describe_progress(record: &StarredShowRecord) -> String {
    match record.progress() {
        Some((line, episode)) => describe_position(Some(line), Some(episode)),
        None if !record.watch_process.is_empty() => record.watch_process.clone(),
        None => "-".to_string(),
    }
}

// Labels in display order, eliding the middle of long lines.
pub(crate) fn preview_labels(line: &PlayLine, sort_key: &str, reversal: bool) -> String {
    let mut episodes = line.episodes.clone();
    sort_episodes(sort_key, &mut episodes);
    if reversal {
        episodes.reverse();
    }

    let labels = episodes
        .iter()
        .map(|episode| episode.label.as_str())
        .collect::<Vec<_>>();
    if labels.len() <= PREVIEW_EDGE * 2 + 1 {
        return labels.join(", ");
    }
    format!(
        "{}, ..., {}",
        labels[..PREVIEW_EDGE].join(", "),
        labels[labels.len() - PREVIEW_EDGE..].join(", ")
    )
}

pub(crate) fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
