//! Surname + initial name similarity.
//!
//! Bank narratives carry names as `SMITH J PAYMENT`, Beacon payees as
//! `J Smith` or `Mrs Jane Smith`. Both sides are reduced to a [`NameKey`]
//! (longest alphabetic token as surname, first letter of the first other
//! token as initial) and compared with a small edit-distance allowance.

use std::collections::HashSet;

use crate::config::NameConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    pub surname: String,
    pub initial: Option<char>,
}

#[derive(Debug, Clone)]
pub struct NameScorer {
    ignored: HashSet<String>,
    max_edit_distance: usize,
    min_fuzzy_len: usize,
    surname_only_score: f64,
    fuzzy_penalty: f64,
}

impl Default for NameScorer {
    fn default() -> Self {
        Self::new(&NameConfig::default())
    }
}

impl NameScorer {
    pub fn new(config: &NameConfig) -> Self {
        Self {
            ignored: config.ignored_words.iter().map(|w| w.to_uppercase()).collect(),
            max_edit_distance: config.max_edit_distance,
            min_fuzzy_len: config.min_fuzzy_len,
            surname_only_score: config.surname_only_score,
            fuzzy_penalty: config.fuzzy_penalty,
        }
    }

    /// Upper-cased alphabetic tokens with ignored words removed.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let cleaned: String = text
            .chars()
            .filter(|c| *c != '\'')
            .map(|c| if c.is_alphabetic() { c } else { ' ' })
            .collect::<String>()
            .to_uppercase();

        cleaned
            .split_whitespace()
            .filter(|t| !self.ignored.contains(*t))
            .map(str::to_string)
            .collect()
    }

    pub fn key(&self, text: &str) -> Option<NameKey> {
        let tokens = self.tokens(text);

        // Longest token wins; first one on ties. Single letters are never surnames.
        let (pos, surname) = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.chars().count() > 1)
            .fold(None::<(usize, &String)>, |best, (i, t)| match best {
                Some((_, b)) if b.chars().count() >= t.chars().count() => best,
                _ => Some((i, t)),
            })?;

        let initial = tokens
            .iter()
            .enumerate()
            .find(|(i, _)| *i != pos)
            .and_then(|(_, t)| t.chars().next());

        Some(NameKey { surname: surname.clone(), initial })
    }

    /// Similarity in [0, 1]. Never fails: anything without a usable surname
    /// scores 0.
    pub fn score(&self, left: &str, right: &str) -> f64 {
        let (Some(a), Some(b)) = (self.key(left), self.key(right)) else {
            return 0.0;
        };

        let surname_score = if a.surname == b.surname {
            1.0
        } else if a.surname.chars().count().min(b.surname.chars().count()) >= self.min_fuzzy_len
            && strsim::levenshtein(&a.surname, &b.surname) <= self.max_edit_distance
        {
            1.0 - self.fuzzy_penalty
        } else {
            return 0.0;
        };

        let initials_agree = matches!((a.initial, b.initial), (Some(x), Some(y)) if x == y);
        let score = if initials_agree {
            surname_score
        } else {
            self.surname_only_score - (1.0 - surname_score)
        };

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> NameScorer {
        NameScorer::default()
    }

    #[test]
    fn key_from_bank_narrative() {
        let key = scorer().key("SMITH J PAYMENT").unwrap();
        assert_eq!(key, NameKey { surname: "SMITH".into(), initial: Some('J') });
    }

    #[test]
    fn key_from_payee_with_title() {
        let key = scorer().key("Mrs. Jane Smith").unwrap();
        assert_eq!(key, NameKey { surname: "SMITH".into(), initial: Some('J') });
    }

    #[test]
    fn key_strips_apostrophes_and_hyphens() {
        let key = scorer().key("P O'Brien-Kelly").unwrap();
        assert_eq!(key.surname, "OBRIEN");
        assert_eq!(key.initial, Some('P'));
    }

    #[test]
    fn exact_surname_and_initial() {
        assert_eq!(scorer().score("SMITH J PAYMENT", "J Smith"), 1.0);
    }

    #[test]
    fn surname_only_gets_partial_credit() {
        assert_eq!(scorer().score("SMITH J PAYMENT", "K Smith"), 0.5);
        assert_eq!(scorer().score("SMITH", "K Smith"), 0.5);
    }

    #[test]
    fn fuzzy_surname_within_one_edit() {
        let s = scorer().score("SMYTH J", "J Smith");
        assert!((s - 0.9).abs() < 1e-9, "{s}");
        let s = scorer().score("SMYTH K", "J Smith");
        assert!((s - 0.4).abs() < 1e-9, "{s}");
    }

    #[test]
    fn short_surnames_must_match_exactly() {
        assert_eq!(scorer().score("LEE J", "J Lea"), 0.0);
    }

    #[test]
    fn different_names_score_zero() {
        assert_eq!(scorer().score("JONES A", "B Taylor"), 0.0);
    }

    #[test]
    fn unparseable_degrades_to_zero() {
        assert_eq!(scorer().score("", "J Smith"), 0.0);
        assert_eq!(scorer().score("12345 //", "J Smith"), 0.0);
        assert_eq!(scorer().score("J", "J"), 0.0);
        assert_eq!(scorer().score("PAYMENT", "PAYMENT"), 0.0);
    }

    #[test]
    fn two_edits_apart_is_no_match() {
        assert_eq!(scorer().score("SMYTHE J", "J Smith"), 0.0);
        assert_eq!(scorer().score("JONES A", "A Jomes"), 0.9);
    }
}
