use super::distance;
use crate::source::ShowCover;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MigrationCandidate {
    pub(crate) cover: ShowCover,
    pub(crate) edit_distance: usize,
    pub(crate) source_rank: usize,
}

// Sources missing from the priority list rank after every listed one.
fn source_rank(priority: &[String], source_id: &str) -> usize {
    priority
        .iter()
        .position(|id| id == source_id)
        .unwrap_or(priority.len())
}

fn sort_key(cover: &ShowCover, query: &str, priority: &[String]) -> (usize, usize) {
    (
        distance(&cover.title, query),
        source_rank(priority, &cover.source_id),
    )
}

/// Closest title wins; equal distances go to the earlier source in
/// `priority`, and full ties keep the first cover seen.
pub(crate) fn select_best(
    candidates: &[ShowCover],
    query: &str,
    priority: &[String],
) -> Option<ShowCover> {
    let mut best: Option<((usize, usize), &ShowCover)> = None;
    for cover in candidates {
        let key = sort_key(cover, query, priority);
        if best.is_none_or(|(best_key, _)| key < best_key) {
            best = Some((key, cover));
        }
    }
    best.map(|(_, cover)| cover.clone())
}

/// Every candidate scored, in the same order `select_best` prefers them.
pub(crate) fn rank_candidates(
    candidates: Vec<ShowCover>,
    query: &str,
    priority: &[String],
) -> Vec<MigrationCandidate> {
    let mut ranked = candidates
        .into_iter()
        .map(|cover| {
            let (edit_distance, source_rank) = sort_key(&cover, query, priority);
            MigrationCandidate {
                cover,
                edit_distance,
                source_rank,
            }
        })
        .collect::<Vec<_>>();
    ranked.sort_by_key(|candidate| (candidate.edit_distance, candidate.source_rank));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cover;

    fn priority(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn empty_candidates_select_nothing() {
        assert_eq!(select_best(&[], "Naruto", &priority(&["a"])), None);
    }

    #[test]
    fn smallest_distance_wins_regardless_of_priority() {
        let candidates = vec![
            cover("a", "1", "Naruto Shippuden"),
            cover("b", "2", "Narufo"),
        ];
        let best = select_best(&candidates, "Naruto", &priority(&["a", "b"])).expect("best");
        assert_eq!(best.id, "2");
    }

    #[test]
    fn equal_distance_prefers_higher_priority_source() {
        let candidates = vec![cover("B", "from-b", "Naruto"), cover("A", "from-a", "Naruto")];
        let best = select_best(&candidates, "Naruto", &priority(&["A", "B"])).expect("best");
        assert_eq!(best.source_id, "A");
    }

    #[test]
    fn unlisted_sources_lose_ties_to_listed_ones() {
        let candidates = vec![cover("x", "stray", "Bleach"), cover("b", "listed", "Bleach")];
        let best = select_best(&candidates, "Bleach", &priority(&["a", "b"])).expect("best");
        assert_eq!(best.id, "listed");
    }

    #[test]
    fn full_ties_keep_first_seen() {
        let candidates = vec![cover("a", "first", "Mob"), cover("a", "second", "Mob")];
        let best = select_best(&candidates, "Mob", &priority(&["a"])).expect("best");
        assert_eq!(best.id, "first");
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = vec![
            cover("b", "1", "One Piece Film"),
            cover("a", "2", "One Piece"),
            cover("c", "3", "One Pace"),
            cover("a", "4", "One Piece"),
        ];
        let order = priority(&["a", "b", "c"]);
        let first = select_best(&candidates, "One Piece", &order);
        for _ in 0..10 {
            assert_eq!(select_best(&candidates, "One Piece", &order), first);
        }
        assert_eq!(first.map(|cover| cover.id), Some("2".to_string()));
    }

    #[test]
    fn ranking_head_matches_selection() {
        let candidates = vec![
            cover("b", "1", "Naruto"),
            cover("c", "2", "Naruto Shippuden"),
            cover("a", "3", "Naruto"),
            cover("x", "4", "Naruto"),
        ];
        let order = priority(&["a", "b", "c"]);

        let best = select_best(&candidates, "Naruto", &order).expect("best");
        let ranked = rank_candidates(candidates, "Naruto", &order);

        assert_eq!(ranked[0].cover, best);
        let summary = ranked
            .iter()
            .map(|candidate| {
                (
                    candidate.cover.id.as_str(),
                    candidate.edit_distance,
                    candidate.source_rank,
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![("3", 0, 0), ("1", 0, 1), ("4", 0, 3), ("2", 10, 2)]
        );
    }
}
