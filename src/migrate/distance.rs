/// Levenshtein distance between two titles, counted in `char`s.
///
/// Insertions, deletions and substitutions each cost one. Only used to rank
/// candidates against each other, so there is no cutoff.
pub(crate) fn distance(a: &str, b: &str) -> usize {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev_row = (0..=b.len()).collect::<Vec<_>>();
    let mut curr_row = vec![0; b.len() + 1];

    for (i, left) in a.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, right) in b.iter().enumerate() {
            let substitution = prev_row[j] + usize::from(left != right);
            curr_row[j + 1] = substitution
                .min(prev_row[j + 1] + 1)
                .min(curr_row[j] + 1);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}
