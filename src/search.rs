//! Client-side search over an in-memory note list.
//!
//! Everything here is pure and recomputed per keystroke; there is no index.

use std::collections::HashSet;

use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use log::{debug, trace};

use crate::{strip_html, Note};

/// Score bonus for a plain substring hit, so exact matches always outrank
/// loose fuzzy ones.
const SUBSTRING_BONUS: i64 = 1_000;

/// Words never suggested as keywords.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "can", "this", "that", "these", "those",
];

const MAX_KEYWORDS: usize = 5;
const MAX_SUGGESTIONS: usize = 5;

/// Filters `notes` by `query` and returns the matches ranked by relevance.
///
/// A blank query returns the list untouched. A note matches when the query
/// is a case-insensitive substring of its title or body text, or when the
/// title fuzzy-matches it. Title hits weigh twice as much as body hits.
pub fn filter_notes(notes: &[Note], query: &str) -> Vec<Note> {
    let query = query.trim();
    if query.is_empty() {
        return notes.to_vec();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let needle = query.to_lowercase();

    let mut scored: Vec<(i64, usize)> = notes
        .iter()
        .enumerate()
        .filter_map(|(index, note)| {
            let body = strip_html(&note.body);

            let title_hit = note.title.to_lowercase().contains(&needle);
            let body_hit = body.to_lowercase().contains(&needle);
            let title_score = matcher.fuzzy_match(&note.title, query).unwrap_or(0);
            let body_score = matcher.fuzzy_match(&body, query).unwrap_or(0);

            // fuzzy body matches alone are too loose to count
            if !(title_hit || body_hit || title_score > 0) {
                return None;
            }

            let mut score = title_score * 2 + body_score;
            if title_hit {
                score += SUBSTRING_BONUS * 2;
            }
            if body_hit {
                score += SUBSTRING_BONUS;
            }

            trace!("Note {} matched with score {}", note.id, score);
            Some((score, index))
        })
        .collect();

    // stable sort keeps list order for equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    debug!("Search for '{}' matched {} notes", query, scored.len());

    scored
        .into_iter()
        .map(|(_, index)| notes[index].clone())
        .collect()
}

/// The first five content words of `text`: lowercase, punctuation removed,
/// longer than three characters and not a stop word. A repeated word takes
/// up a slot each time it appears.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = strip_html(text)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(word))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Keywords of a note, drawn from its title and body together.
pub fn note_keywords(note: &Note) -> Vec<String> {
    extract_keywords(&format!("{} {}", note.title, note.body))
}

/// Keyword suggestions containing `term` that are not already selected.
pub fn suggest_tags(notes: &[Note], term: &str, selected: &[String]) -> Vec<String> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }

    let selected: HashSet<String> = selected.iter().map(|t| t.to_lowercase()).collect();
    let mut seen = HashSet::new();

    notes
        .iter()
        .flat_map(note_keywords)
        .filter(|tag| tag.contains(&term) && !selected.contains(tag))
        .filter(|tag| seen.insert(tag.clone()))
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Notes whose keywords include any of `tags`. No tags means no filtering.
pub fn filter_by_tags(notes: &[Note], tags: &[String]) -> Vec<Note> {
    if tags.is_empty() {
        return notes.to_vec();
    }

    let wanted: HashSet<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
    notes
        .iter()
        .filter(|note| note_keywords(note).iter().any(|k| wanted.contains(k)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str, body: &str) -> Note {
        Note::new(title.into(), body.into(), "u1".into())
    }

    fn titles(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|n| n.title.as_str()).collect()
    }

    #[test]
    fn blank_query_returns_everything_in_order() {
        let notes = vec![note("b", "x"), note("a", "y")];
        assert_eq!(filter_notes(&notes, "   "), notes);
        assert_eq!(filter_notes(&notes, ""), notes);
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let notes = vec![
            note("Groceries", "Milk, eggs"),
            note("Work", "Quarterly report"),
        ];

        assert_eq!(titles(&filter_notes(&notes, "MILK")), vec!["Groceries"]);
        assert_eq!(titles(&filter_notes(&notes, "report")), vec!["Work"]);
    }

    #[test]
    fn markup_does_not_match() {
        let notes = vec![note("Styled", "<strong>bold</strong> words")];
        assert!(filter_notes(&notes, "strong").is_empty());
        assert_eq!(filter_notes(&notes, "bold words").len(), 1);
    }

    #[test]
    fn title_hits_rank_above_body_hits() {
        let notes = vec![
            note("Shopping list", "bread"),
            note("Bread recipe", "flour, water"),
        ];
        assert_eq!(
            titles(&filter_notes(&notes, "bread")),
            vec!["Bread recipe", "Shopping list"]
        );
    }

    #[test]
    fn fuzzy_title_match_is_included() {
        let notes = vec![note("Groceries", "stuff"), note("Taxes", "forms")];
        assert_eq!(titles(&filter_notes(&notes, "grcr")), vec!["Groceries"]);
    }

    #[test]
    fn keywords_skip_short_and_stop_words() {
        assert_eq!(
            extract_keywords("The <b>quick</b> brown fox, would jump; over these lazy dogs quickly"),
            vec!["quick", "brown", "jump", "over", "lazy"]
        );
    }

    #[test]
    fn suggestions_exclude_selected_and_duplicates() {
        let notes = vec![
            note("Garden plans", "tomatoes"),
            note("Garden tools", "shovel"),
            note("Hidden path", "behind the garden"),
        ];
        let selected = vec!["Hidden".to_string()];

        assert_eq!(
            suggest_tags(&notes, "den", &selected),
            vec!["garden".to_string()]
        );
        assert_eq!(
            suggest_tags(&notes, "DEN", &[]),
            vec!["garden".to_string(), "hidden".to_string()]
        );
        assert!(suggest_tags(&notes, " ", &[]).is_empty());
    }

    #[test]
    fn repeated_words_use_up_keyword_slots() {
        let text = "apple apple apple banana banana cherry";
        assert_eq!(
            extract_keywords(text),
            vec!["apple", "apple", "apple", "banana", "banana"]
        );

        let notes = vec![note("Fruit", text)];
        assert_eq!(filter_by_tags(&notes, &["fruit".to_string()]).len(), 1);
        assert!(filter_by_tags(&notes, &["cherry".to_string()]).is_empty());
    }

    #[test]
    fn tag_filter() {
        let notes = vec![note("Garden plans", "tomatoes"), note("Taxes", "forms")];
        assert_eq!(
            titles(&filter_by_tags(&notes, &["TOMATOES".to_string()])),
            vec!["Garden plans"]
        );
        assert_eq!(filter_by_tags(&notes, &[]).len(), 2);
    }
}
