// File: src/model/parser.rs
// NotAttempted -> Classifying -> ResolvedComplete | ResolvedPartial | Unrecognized

use crate::config::EngineConfig;
use crate::model::grade::{missing_grade_slot, resolve_grade_masked};
use crate::model::item::{
    Category, Course, Intent, MissingSlot, ParseResult, PartialParse, ReminderSpec, Weekday,
};
use crate::model::matcher::{MatchConfidence, assert_valid_entities, find_in_tokens, match_entity};
use crate::model::reminder::resolve_reminder;
use crate::model::temporal::{TemporalMatch, resolve_temporal_masked};
use crate::model::tokenizer::{TokenStream, normalize_with_limit};
use chrono::{Local, NaiveDateTime};
use std::collections::{BTreeSet, HashSet};

pub const UNTITLED: &str = "Untitled";

const LEADING_FILLER: &[&str] = &[
    "remind", "me", "to", "please", "i", "need", "have", "gotta", "must", "should", "add", "set",
    "new",
];
const TRAILING_FILLER: &[&str] = &[
    "at", "on", "by", "for", "from", "to", "in", "the", "a", "an", "and", "with", "every", "each",
    "until", "till", "due", "of",
];
const MAX_CATEGORY_WORDS: usize = 3;

enum State {
    NotAttempted,
    Classifying(TokenStream),
    ResolvedComplete(ParseResult),
    ResolvedPartial {
        partial: PartialParse,
        missing: MissingSlot,
    },
    Unrecognized,
}

/// Parses `input` against the wall clock.
pub fn parse(
    input: &str,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
) -> ParseResult {
    parse_at(input, categories, courses, config, Local::now().naive_local())
}

/// Parses `input`, resolving relative dates against `now`.
///
/// Panics if `categories` or `courses` contain duplicate ids or empty names.
pub fn parse_at(
    input: &str,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
    now: NaiveDateTime,
) -> ParseResult {
    assert_valid_entities("category", categories);
    assert_valid_entities("course", courses);

    let mut state = State::NotAttempted;
    loop {
        state = match state {
            State::NotAttempted => {
                let tokens = normalize_with_limit(input, config.max_input_chars());
                if tokens.is_empty() {
                    log::debug!("no tokens in input, not attempting");
                    return ParseResult::NotAttempted;
                }
                State::Classifying(tokens)
            }
            State::Classifying(tokens) => {
                match extract(&tokens, categories, courses, config, now) {
                    None => State::Unrecognized,
                    Some(partial) => match first_missing(&partial, config) {
                        Some(missing) => State::ResolvedPartial { partial, missing },
                        None => State::ResolvedComplete(complete(partial, input, config)),
                    },
                }
            }
            State::ResolvedComplete(result) => return result,
            State::ResolvedPartial { partial, missing } => {
                return needs_more_info(partial, missing, input);
            }
            State::Unrecognized => {
                log::debug!("no temporal, grade or keyword signal in '{}'", input);
                return ParseResult::Unrecognized {
                    original_input: input.to_string(),
                };
            }
        };
    }
}

fn mask_of(len: usize, consumed: &BTreeSet<usize>) -> Vec<bool> {
    (0..len).map(|i| consumed.contains(&i)).collect()
}

/// Runs every resolver over `tokens` and decides the intent. `None` means
/// there was no signal at all.
pub(crate) fn extract(
    tokens: &TokenStream,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
    now: NaiveDateTime,
) -> Option<PartialParse> {
    let mut consumed: BTreeSet<usize> = BTreeSet::new();

    let reminder = resolve_reminder(tokens, config);
    if let Some(r) = &reminder {
        consumed.extend(r.consumed.iter().copied());
    }

    let temporal = resolve_temporal_masked(tokens, &mask_of(tokens.len(), &consumed), now, config);
    if let Some(t) = &temporal {
        consumed.extend(t.consumed.iter().copied());
    }

    let skip = mask_of(tokens.len(), &consumed);
    let dated = temporal.as_ref().is_some_and(|t| {
        t.date.is_some() || t.start.is_some() || t.recurring || !t.days.is_empty()
    });
    // A bare letter beside a resolved date is a room or an initial, not a grade.
    let grade = resolve_grade_masked(tokens, &skip, courses, categories, config)
        .filter(|g| g.explicit || !dated);
    if let Some(g) = grade {
        log::debug!("classified as grade");
        let mut partial = PartialParse::new(Intent::Grade);
        partial.grade = Some(g.grade);
        partial.weight = g.weight;
        partial.assignment_name = g.assignment_name;
        if let Some(course) = g.course {
            partial.course_name = Some(course.name);
            partial.course_confidence = Some(course.confidence);
        }
        return Some(partial);
    }

    let free = |i: usize| !consumed.contains(&i);
    let schedule_kw = (0..tokens.len()).any(|i| free(i) && config.is_schedule_keyword(tokens.text(i)));
    let event_kw = (0..tokens.len()).any(|i| free(i) && config.is_event_keyword(tokens.text(i)));

    let intent = classify(temporal.as_ref(), schedule_kw, event_kw || reminder.is_some())?;
    log::debug!("classified as {}", intent);

    let mut partial = PartialParse::new(intent);
    partial.reminder = reminder.map(|r| r.reminder);

    let tags: HashSet<usize> = (0..tokens.len())
        .filter(|&i| free(i) && tokens.text(i).starts_with('#'))
        .collect();
    partial.category_name = find_category(tokens, &consumed, &tags, categories, config);
    partial.title = Some(build_title(tokens, &consumed, &tags));

    if let Some(t) = temporal {
        match intent {
            Intent::Schedule => {
                partial.days = if t.days.is_empty() {
                    t.bare_weekday.into_iter().collect()
                } else {
                    t.days.clone()
                };
                partial.start = t.start;
                partial.end = t.end;
                partial.duration = t.duration;
            }
            Intent::Event => {
                partial.date = t.instant(now.date());
                partial.start = t.start;
                partial.end = t.end;
                partial.duration = t.duration;
            }
            Intent::Grade => {}
        }
    }
    Some(partial)
}

fn classify(temporal: Option<&TemporalMatch>, schedule_kw: bool, event_kw: bool) -> Option<Intent> {
    if let Some(t) = temporal {
        if t.recurring || !t.days.is_empty() {
            return Some(Intent::Schedule);
        }
        if t.bare_weekday.is_some() && schedule_kw {
            return Some(Intent::Schedule);
        }
        if t.date.is_some() {
            return Some(Intent::Event);
        }
        if schedule_kw {
            return Some(Intent::Schedule);
        }
        return Some(Intent::Event);
    }
    if schedule_kw {
        Some(Intent::Schedule)
    } else if event_kw {
        Some(Intent::Event)
    } else {
        None
    }
}

/// `#tag` tokens first (any confidence), then exact or synonym matches in the free text.
fn find_category(
    tokens: &TokenStream,
    consumed: &BTreeSet<usize>,
    tags: &HashSet<usize>,
    categories: &[Category],
    config: &EngineConfig,
) -> Option<String> {
    if categories.is_empty() {
        return None;
    }
    let mut ordered: Vec<usize> = tags.iter().copied().collect();
    ordered.sort_unstable();
    for i in ordered {
        let tag = tokens.text(i).trim_start_matches('#');
        if let Some(m) = match_entity(tag, categories, config.category_synonyms()) {
            return Some(m.name);
        }
    }
    let eligible: Vec<bool> = (0..tokens.len())
        .map(|i| !consumed.contains(&i) && !tags.contains(&i))
        .collect();
    find_in_tokens(
        tokens,
        &eligible,
        categories,
        config.category_synonyms(),
        MAX_CATEGORY_WORDS,
    )
    .filter(|(m, _)| m.confidence >= MatchConfidence::Synonym)
    .map(|(m, _)| m.name)
}

/// Unconsumed words in their original casing, filler trimmed from both ends.
fn build_title(tokens: &TokenStream, consumed: &BTreeSet<usize>, tags: &HashSet<usize>) -> String {
    let kept: Vec<usize> = (0..tokens.len())
        .filter(|i| !consumed.contains(i) && !tags.contains(i))
        .collect();
    let mut lo = 0;
    let mut hi = kept.len();
    while lo < hi && LEADING_FILLER.contains(&tokens.text(kept[lo])) {
        lo += 1;
    }
    while hi > lo && TRAILING_FILLER.contains(&tokens.text(kept[hi - 1])) {
        hi -= 1;
    }
    let title = kept[lo..hi]
        .iter()
        .map(|&i| tokens.original(i))
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

/// First required slot absent from `partial`, in asking order.
pub fn first_missing(partial: &PartialParse, config: &EngineConfig) -> Option<MissingSlot> {
    match partial.intent {
        Intent::Event => partial.date.is_none().then_some(MissingSlot::EventNeedsDate),
        Intent::Schedule => {
            if partial.days.is_empty() {
                Some(MissingSlot::ScheduleNeedsDays)
            } else if partial.start.is_none()
                && partial.duration.is_none()
                && config.schedule_requires_time()
            {
                Some(MissingSlot::ScheduleNeedsTime)
            } else {
                None
            }
        }
        Intent::Grade => missing_grade_slot(
            partial.assignment_name.is_some(),
            partial.weight.is_some(),
            partial
                .course_name
                .as_ref()
                .map(|_| partial.course_confidence.unwrap_or(MatchConfidence::Exact)),
            config,
        ),
    }
}

fn days_phrase(days: &BTreeSet<Weekday>) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn prompt_for(missing: MissingSlot, partial: &PartialParse) -> String {
    let title = partial.title.as_deref().unwrap_or(UNTITLED);
    let assignment = partial.assignment_name.as_deref().unwrap_or("this");
    match missing {
        MissingSlot::GradeNeedsWeight => {
            format!("How much is {} worth toward the final grade?", assignment)
        }
        MissingSlot::GradeNeedsAssignmentName => {
            "Which assignment was this grade for?".to_string()
        }
        MissingSlot::GradeNeedsCourse => match &partial.course_name {
            Some(suggestion) => format!(
                "Which course is {} for? Did you mean {}?",
                assignment, suggestion
            ),
            None => format!("Which course is {} for?", assignment),
        },
        MissingSlot::ScheduleNeedsDays => format!("Which days does {} happen?", title),
        MissingSlot::ScheduleNeedsTime => format!(
            "What time does {} start on {}?",
            title,
            days_phrase(&partial.days)
        ),
        MissingSlot::EventNeedsDate => format!("When is {}?", title),
    }
}

pub(crate) fn needs_more_info(
    partial: PartialParse,
    missing: MissingSlot,
    original_input: &str,
) -> ParseResult {
    log::debug!("missing slot {}", missing);
    ParseResult::NeedsMoreInfo {
        prompt: prompt_for(missing, &partial),
        partial,
        missing,
        original_input: original_input.to_string(),
    }
}

/// Builds the final result for a partial with every required slot present,
/// applying reminder defaults. Falls back to `NeedsMoreInfo` if a slot is
/// still absent.
pub(crate) fn complete(
    mut partial: PartialParse,
    original_input: &str,
    config: &EngineConfig,
) -> ParseResult {
    if let Some(missing) = first_missing(&partial, config) {
        return needs_more_info(partial, missing, original_input);
    }
    if let (Some(s), Some(e)) = (partial.start, partial.end)
        && e < s
    {
        partial.end = None;
    }
    let title = partial.title.unwrap_or_else(|| UNTITLED.to_string());
    match partial.intent {
        Intent::Event => ParseResult::Event {
            title,
            date: partial.date,
            category_name: partial.category_name,
            reminder: partial.reminder.or_else(|| {
                config
                    .default_event_reminder()
                    .map(ReminderSpec::new_relative)
            }),
        },
        Intent::Schedule => ParseResult::ScheduleItem {
            title,
            days: partial.days,
            start: partial.start,
            end: partial.end,
            duration: partial.duration,
            reminder: partial.reminder.or_else(|| {
                config
                    .default_schedule_reminder()
                    .map(ReminderSpec::new_relative)
            }),
        },
        Intent::Grade => match (partial.course_name, partial.assignment_name, partial.grade) {
            (Some(course_name), Some(assignment_name), Some(grade)) => ParseResult::Grade {
                course_name,
                assignment_name,
                grade,
                weight: partial.weight,
            },
            _ => ParseResult::Unrecognized {
                original_input: original_input.to_string(),
            },
        },
    }
}
