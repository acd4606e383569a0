//! Fuzzy scoring for workspace-relative paths.
//!
//! The formula is frozen and locked by the golden tests below; changing any
//! weight reorders user-visible results. Scoring lowercases query and
//! candidate, then greedily aligns the query as a leftmost ordered
//! subsequence, twice: against the full relative path and against the
//! basename alone. The better alignment wins, minus a length penalty, so a
//! clean basename hit is never drowned out by a noisy early alignment in the
//! directory part.

const CHAR_BASE: i32 = 10;
const CONTIGUOUS_BONUS: i32 = 25;
const BOUNDARY_BONUS: i32 = 40;
const BASENAME_BONUS: i32 = 60;
const LENGTH_PENALTY_DIV: i32 = 4;

fn is_boundary(c: char) -> bool {
    matches!(c, '/' | '.' | '_' | '-' | ' ')
}

/// Greedy leftmost alignment of `query` as an ordered subsequence of
/// `candidate`. Returns the alignment score and the index of the first
/// aligned character, or `None` when the query does not fit.
///
/// Per aligned character: +10; +25 when adjacent to the previously aligned
/// character; +40 when at offset 0 or preceded by a segment boundary
/// (`/`, `.`, `_`, `-`, space).
fn align(query: &[char], candidate: &[char]) -> Option<(i32, usize)> {
    let mut score = 0i32;
    let mut qi = 0usize;
    let mut first = 0usize;
    let mut prev: Option<usize> = None;

    for (ci, &c) in candidate.iter().enumerate() {
        if qi == query.len() {
            break;
        }
        if c != query[qi] {
            continue;
        }
        score += CHAR_BASE;
        if ci > 0 && prev == Some(ci - 1) {
            score += CONTIGUOUS_BONUS;
        }
        if ci == 0 || is_boundary(candidate[ci - 1]) {
            score += BOUNDARY_BONUS;
        }
        if prev.is_none() {
            first = ci;
        }
        prev = Some(ci);
        qi += 1;
    }

    (qi == query.len()).then_some((score, first))
}

/// Scores `relative_path` against `query`. `None` when the query is empty or
/// is not an ordered subsequence of the path.
///
/// An alignment starting at or after the basename earns +60; the final score
/// is the better of the full-path and basename alignments minus
/// `path_bytes / 4`. Scores can go negative for long weak matches; ordering
/// is what matters.
pub fn score_path(query: &str, relative_path: &str) -> Option<i32> {
    if query.is_empty() {
        return None;
    }
    let query: Vec<char> = query.to_lowercase().chars().collect();
    let candidate: Vec<char> = relative_path.to_lowercase().chars().collect();
    if query.len() > candidate.len() {
        return None;
    }

    let name_start = candidate
        .iter()
        .rposition(|&c| c == '/')
        .map(|i| i + 1)
        .unwrap_or(0);

    let full = align(&query, &candidate)
        .map(|(score, first)| score + if first >= name_start { BASENAME_BONUS } else { 0 });
    let name = align(&query, &candidate[name_start..]).map(|(score, _)| score + BASENAME_BONUS);

    let best = full.max(name)?;
    Some(best - relative_path.len() as i32 / LENGTH_PENALTY_DIV)
}
