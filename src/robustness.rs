// File: ./src/robustness.rs
// Seeded input perturbations and the consistency check over their parses.

use crate::config::EngineConfig;
use crate::model::item::{Category, Course, ParseResult};
use crate::model::parser::{parse, parse_at};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const TRAILING_PUNCTUATION: &[&str] = &[".", "!", "?", "!!", "..."];
const PERCENT_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationResult {
    pub original_input: String,
    pub perturbed_input: String,
    pub is_consistent: bool,
    /// Share of compared fields (variant included) that agree, 0.0 to 1.0.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    pub calls: usize,
    pub total: Duration,
    pub mean: Duration,
    pub max: Duration,
}

impl LatencyReport {
    pub fn mean_micros(&self) -> f64 {
        self.mean.as_secs_f64() * 1_000_000.0
    }
}

/// Replace whole words (case-insensitive) that have configured equivalents.
fn synonym_variants(input: &str, config: &EngineConfig, rng: &mut fastrand::Rng) -> Vec<String> {
    let mut out = Vec::new();
    let words: Vec<&str> = input.split(' ').collect();
    for (idx, word) in words.iter().enumerate() {
        let core = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '%' && c != '+');
        let options = config.equivalents(&core.to_lowercase());
        if options.is_empty() {
            continue;
        }
        let pick = &options[rng.usize(..options.len())];
        let swapped = format!("{}{}", pick, &word[core.len()..]);
        let replaced: Vec<&str> = words
            .iter()
            .enumerate()
            .map(|(j, w)| if j == idx { swapped.as_str() } else { *w })
            .collect();
        out.push(replaced.join(" "));
    }

    // Multi-word course names to their abbreviations.
    let lower = input.to_lowercase();
    let mut courses: Vec<(&String, &Vec<String>)> = config.course_abbreviations().iter().collect();
    courses.sort();
    for (name, abbrs) in courses {
        if abbrs.is_empty() || !name.contains(' ') {
            continue;
        }
        if lower.len() == input.len()
            && let Some(pos) = lower.find(name.as_str())
            && input.is_char_boundary(pos)
            && input.is_char_boundary(pos + name.len())
        {
            let abbr = &abbrs[rng.usize(..abbrs.len())];
            out.push(format!(
                "{}{}{}",
                &input[..pos],
                abbr.to_uppercase(),
                &input[pos + name.len()..]
            ));
        }
    }
    out
}

/// Deterministic, bounded list of perturbations of `input`. Case and
/// whitespace variants come first.
pub fn perturbations(input: &str, config: &EngineConfig) -> Vec<String> {
    let mut rng = fastrand::Rng::with_seed(config.perturbation_seed());
    let mut variants = vec![
        input.to_lowercase(),
        input.to_uppercase(),
        input.replace(' ', "  "),
        format!("  {} ", input.trim()),
        format!(
            "{}{}",
            input.trim_end(),
            TRAILING_PUNCTUATION[rng.usize(..TRAILING_PUNCTUATION.len())]
        ),
    ];
    let mut synonyms = synonym_variants(input, config, &mut rng);
    rng.shuffle(&mut synonyms);
    variants.extend(synonyms);

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| v != input && seen.insert(v.clone()));
    variants.truncate(config.max_perturbations());
    variants
}

/// Word by word, ignoring case and punctuation, with configured equivalents
/// ("mid-term" / "midterm", "hw" / "homework") counted as equal.
fn same_assignment(a: &str, b: &str, config: &EngineConfig) -> bool {
    let key = |w: &str| -> String {
        w.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect()
    };
    let wa: Vec<&str> = a.split_whitespace().collect();
    let wb: Vec<&str> = b.split_whitespace().collect();
    wa.len() == wb.len()
        && wa.iter().zip(&wb).all(|(x, y)| {
            key(x) == key(y)
                || config
                    .equivalents(&x.to_lowercase())
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(y))
        })
}

/// (agreeing fields, compared fields), the variant itself included.
fn agreement(a: &ParseResult, b: &ParseResult, config: &EngineConfig) -> (usize, usize) {
    let checks: Vec<bool> = match (a, b) {
        (ParseResult::Event { date: d1, .. }, ParseResult::Event { date: d2, .. }) => {
            vec![d1 == d2]
        }
        (
            ParseResult::ScheduleItem {
                days: days1,
                start: s1,
                end: e1,
                duration: dur1,
                ..
            },
            ParseResult::ScheduleItem {
                days: days2,
                start: s2,
                end: e2,
                duration: dur2,
                ..
            },
        ) => vec![days1 == days2, s1 == s2, e1 == e2, dur1 == dur2],
        (
            ParseResult::Grade {
                course_name: c1,
                assignment_name: a1,
                grade: g1,
                weight: w1,
            },
            ParseResult::Grade {
                course_name: c2,
                assignment_name: a2,
                grade: g2,
                weight: w2,
            },
        ) => vec![
            c1 == c2,
            same_assignment(a1, a2, config),
            g1.equivalent(g2, config, PERCENT_TOLERANCE),
            match (w1, w2) {
                (Some(x), Some(y)) => (x - y).abs() <= PERCENT_TOLERANCE,
                (None, None) => true,
                _ => false,
            },
        ],
        (
            ParseResult::NeedsMoreInfo { missing: m1, .. },
            ParseResult::NeedsMoreInfo { missing: m2, .. },
        ) => vec![m1 == m2],
        (ParseResult::Unrecognized { .. }, ParseResult::Unrecognized { .. })
        | (ParseResult::NotAttempted, ParseResult::NotAttempted) => vec![],
        _ => return (0, 1),
    };
    let agreeing = checks.iter().filter(|ok| **ok).count();
    (agreeing + 1, checks.len() + 1)
}

/// Perturbs `input` and compares every variant's result with the original,
/// all resolved against the current time.
pub fn perturb_and_check(
    input: &str,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
) -> Vec<PerturbationResult> {
    perturb_and_check_at(input, categories, courses, config, Local::now().naive_local())
}

pub fn perturb_and_check_at(
    input: &str,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
    now: NaiveDateTime,
) -> Vec<PerturbationResult> {
    let baseline = parse_at(input, categories, courses, config, now);
    perturbations(input, config)
        .into_iter()
        .map(|perturbed| {
            let result = parse_at(&perturbed, categories, courses, config, now);
            let (agreeing, compared) = agreement(&baseline, &result, config);
            let is_consistent = agreeing == compared;
            if !is_consistent {
                log::debug!(
                    "perturbation '{}' changed {} into {}",
                    perturbed,
                    baseline.kind(),
                    result.kind()
                );
            }
            PerturbationResult {
                original_input: input.to_string(),
                perturbed_input: perturbed,
                is_consistent,
                confidence: agreeing as f64 / compared as f64,
            }
        })
        .collect()
}

/// Share of consistent perturbations; an empty set scores 1.0.
pub fn consistency_score(results: &[PerturbationResult]) -> f64 {
    if results.is_empty() {
        return 1.0;
    }
    results.iter().filter(|r| r.is_consistent).count() as f64 / results.len() as f64
}

/// Parses every input `rounds` times through [`parse`] and times each call.
pub fn measure_latency(
    inputs: &[&str],
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
    rounds: usize,
) -> LatencyReport {
    let mut total = Duration::ZERO;
    let mut max = Duration::ZERO;
    let mut calls = 0usize;
    for _ in 0..rounds {
        for input in inputs {
            let started = Instant::now();
            let result = parse(input, categories, courses, config);
            let elapsed = started.elapsed();
            std::hint::black_box(result);
            total += elapsed;
            max = max.max(elapsed);
            calls += 1;
        }
    }
    let mean = if calls == 0 {
        Duration::ZERO
    } else {
        total / u32::try_from(calls).unwrap_or(u32::MAX)
    };
    log::debug!("{} parse calls, mean {:?}, max {:?}", calls, mean, max);
    LatencyReport {
        calls,
        total,
        mean,
        max,
    }
}
