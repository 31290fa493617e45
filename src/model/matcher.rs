// Logic for matching free text against the caller's categories and courses.
//
// Matching order for a span of text:
//   1. Exact      -> the span equals a candidate name (case, spacing and
//                    punctuation ignored: "cs 101" == "CS-101")
//   2. Synonym    -> the span equals one of the candidate's own synonyms or an
//                    abbreviation from the configured table
//   3. Fuzzy      -> the span is a word-aligned substring or prefix of a
//                    candidate name ("comp sci" does not fuzzy match, "computer
//                    science" does)
//
// Ties inside a tier go to the longest matched text, then to the candidate
// whose name the span covers most, then to list order.

use crate::model::item::NamedEntity;
use crate::model::tokenizer::TokenStream;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Lowercase entity name -> lowercase synonyms/abbreviations.
pub type SynonymTable = HashMap<String, Vec<String>>;

/// Ordered weakest to strongest so `max` picks the best tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchConfidence {
    Fuzzy,
    Synonym,
    Exact,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityMatch {
    pub id: String,
    pub name: String,
    pub confidence: MatchConfidence,
    /// Length of the compared text; longer means more specific.
    pub matched_len: usize,
}

const FUZZY_MIN_LEN: usize = 3;
const FUZZY_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "was", "got", "had", "has", "have",
    "are", "but", "not", "you", "our", "your", "its", "into", "onto", "out",
];

/// Lowercase alphanumerics only.
fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Lowercase words separated by single spaces.
fn word_form(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Panics on a structurally invalid candidate list: duplicate ids or empty names.
/// These come from the host application, never from user text.
pub fn assert_valid_entities(kind: &str, entities: &[NamedEntity]) {
    let mut seen = HashSet::with_capacity(entities.len());
    for e in entities {
        assert!(
            !e.name.trim().is_empty(),
            "{} '{}' has an empty name",
            kind,
            e.id
        );
        assert!(
            seen.insert(e.id.as_str()),
            "duplicate {} id '{}' in candidate list",
            kind,
            e.id
        );
    }
}

pub fn match_entity(
    span: &str,
    candidates: &[NamedEntity],
    synonyms: &SynonymTable,
) -> Option<EntityMatch> {
    let key = compact(span);
    if key.is_empty() {
        return None;
    }

    if let Some(c) = candidates.iter().find(|c| compact(&c.name) == key) {
        return Some(EntityMatch {
            id: c.id.clone(),
            name: c.name.clone(),
            confidence: MatchConfidence::Exact,
            matched_len: key.len(),
        });
    }

    let mut best: Option<(usize, &NamedEntity)> = None;
    for c in candidates {
        let configured = synonyms
            .get(&c.name.trim().to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        for syn in c.synonyms.iter().chain(configured) {
            let syn_key = compact(syn);
            if syn_key == key && best.is_none_or(|(len, _)| syn_key.len() > len) {
                best = Some((syn_key.len(), c));
            }
        }
    }
    if let Some((len, c)) = best {
        return Some(EntityMatch {
            id: c.id.clone(),
            name: c.name.clone(),
            confidence: MatchConfidence::Synonym,
            matched_len: len,
        });
    }

    let span_words = word_form(span);
    if span_words.len() < FUZZY_MIN_LEN || FUZZY_STOPWORDS.contains(&span_words.as_str()) {
        return None;
    }
    let mut best_fuzzy: Option<(f64, &NamedEntity)> = None;
    for c in candidates {
        let name_words = word_form(&c.name);
        let aligned = name_words.starts_with(&span_words)
            || name_words.contains(&format!(" {}", span_words));
        if !aligned {
            continue;
        }
        let coverage = span_words.len() as f64 / name_words.len().max(1) as f64;
        if best_fuzzy.is_none_or(|(cov, _)| coverage > cov) {
            best_fuzzy = Some((coverage, c));
        }
    }
    best_fuzzy.map(|(_, c)| EntityMatch {
        id: c.id.clone(),
        name: c.name.clone(),
        confidence: MatchConfidence::Fuzzy,
        matched_len: span_words.len(),
    })
}

/// Best match over every contiguous run of up to `max_ngram` tokens where
/// `eligible` is true. Returns the match and the token range it came from.
pub fn find_in_tokens(
    tokens: &TokenStream,
    eligible: &[bool],
    candidates: &[NamedEntity],
    synonyms: &SynonymTable,
    max_ngram: usize,
) -> Option<(EntityMatch, Range<usize>)> {
    if candidates.is_empty() {
        return None;
    }
    let mut best: Option<(EntityMatch, Range<usize>)> = None;
    for start in 0..tokens.len() {
        for len in 1..=max_ngram {
            let end = start + len;
            if end > tokens.len() || !eligible[start..end].iter().all(|e| *e) {
                break;
            }
            let span = tokens.joined(start..end);
            let Some(m) = match_entity(&span, candidates, synonyms) else {
                continue;
            };
            log::trace!("span '{}' matched '{}' ({:?})", span, m.name, m.confidence);
            let better = match &best {
                None => true,
                Some((b, _)) => (m.confidence, m.matched_len) > (b.confidence, b.matched_len),
            };
            if better {
                best = Some((m, start..end));
            }
        }
    }
    best
}
