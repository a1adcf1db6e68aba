//! File-name relevance scoring within one province folder.

use common::storage::{index::normalize_name, types::document::DocumentMeta};

/// Weight of one overlapping file-name token.
const TOKEN_WEIGHT: u32 = 2;
/// Bonus when the folder's own name appears in the query, reinforcing an
/// intentional province selection.
const FOLDER_BONUS: u32 = 3;

/// Filename markers that identify the folder's "main" document when keyword
/// overlap finds nothing.
const GENERIC_MARKERS: &[&str] = &["report", "summary", "profile", "รายงาน", "สรุป", "ข้อมูล"];

/// Splits a file name (without extension) into lowercase tokens on the
/// usual separators.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn file_stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Scores one file name against the query.
///
/// Each file-name token of length >= 2 that occurs in the query contributes
/// a fixed weight; containment is plain substring matching, which keeps Thai
/// queries (no word boundaries) workable.
pub fn score_file(file_name: &str, query: &str, folder_name: &str) -> u32 {
    let query = normalize_name(query);

    let mut score = tokenize(file_stem(file_name))
        .iter()
        .filter(|token| token.chars().count() >= 2 && query.contains(token.as_str()))
        .count() as u32
        * TOKEN_WEIGHT;

    if query.contains(&normalize_name(folder_name)) {
        score += FOLDER_BONUS;
    }

    score
}

/// Picks the single best file of a folder for the query.
///
/// Priority: highest keyword-overlap score above zero, then the first file
/// carrying a generic marker, then the folder's only file when there is
/// exactly one. Returns `None` when the folder offers no plausible match.
pub fn pick_best_file(
    files: &[DocumentMeta],
    query: &str,
    folder_name: &str,
) -> Option<DocumentMeta> {
    let mut best: Option<(&DocumentMeta, u32)> = None;
    for file in files {
        let score = score_file(&file.name, query, folder_name);
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((file, score));
        }
    }
    if let Some((file, _)) = best {
        return Some(file.clone());
    }

    if let Some(file) = files.iter().find(|file| {
        let name = file.name.to_lowercase();
        GENERIC_MARKERS.iter().any(|marker| name.contains(marker))
    }) {
        return Some(file.clone());
    }

    if let [only] = files {
        return Some(only.clone());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(name: &str) -> DocumentMeta {
        DocumentMeta {
            location: format!("Tak/{name}"),
            name: name.to_string(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_tokenize_splits_on_separators() {
        assert_eq!(tokenize("rice_area-2024 report"), vec!["rice", "area", "2024", "report"]);
        assert_eq!(tokenize(""), Vec::<String>::new());
    }

    #[test]
    fn test_score_counts_overlapping_tokens() {
        let score = score_file("rice_area.txt", "rice growing area in Tak", "Tak");
        // "rice" and "area" overlap, plus the folder bonus.
        assert_eq!(score, 2 * TOKEN_WEIGHT + FOLDER_BONUS);
    }

    #[test]
    fn test_score_ignores_single_character_tokens() {
        let score = score_file("a_b_rice.txt", "rice data", "Nan");
        assert_eq!(score, TOKEN_WEIGHT);
    }

    #[test]
    fn test_pick_best_prefers_highest_score() {
        let files = vec![meta("misc.txt"), meta("rice_report.txt"), meta("cows.txt")];

        let best = pick_best_file(&files, "ข้อมูล rice ของ Tak", "Tak");

        assert_eq!(best.map(|f| f.name), Some("rice_report.txt".to_string()));
    }

    #[test]
    fn test_pick_best_falls_back_to_generic_marker() {
        let files = vec![meta("cows.txt"), meta("summary.txt")];

        // No token overlap and no folder name in the query: scores are zero
        // and the marker file wins.
        let best = pick_best_file(&files, "figures please", "Tak");

        assert_eq!(best.map(|f| f.name), Some("summary.txt".to_string()));
    }

    #[test]
    fn test_pick_best_single_file_fallback() {
        let files = vec![meta("q3_figures.txt")];

        let best = pick_best_file(&files, "unrelated question", "Tak");

        assert_eq!(best.map(|f| f.name), Some("q3_figures.txt".to_string()));
    }

    #[test]
    fn test_pick_best_empty_folder_yields_none() {
        assert!(pick_best_file(&[], "anything", "Tak").is_none());
    }

    #[test]
    fn test_pick_best_multiple_unrelated_files_yields_none() {
        let files = vec![meta("alpha.txt"), meta("beta.txt")];
        assert!(pick_best_file(&files, "unrelated question", "Tak").is_none());
    }
}
