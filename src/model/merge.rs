// File: ./src/model/merge.rs

use crate::config::EngineConfig;
use crate::model::grade::{find_assignment, find_course};
use crate::model::item::{Category, Course, Intent, MissingSlot, ParseResult, PartialParse};
use crate::model::matcher::{MatchConfidence, assert_valid_entities};
use crate::model::parser::{complete, extract, first_missing};
use crate::model::temporal::resolve_temporal;
use crate::model::tokenizer::{TokenStream, normalize_with_limit};
use chrono::NaiveDateTime;

const AFFIRMATIVE: &[&str] = &["yes", "y", "yeah", "yep", "yup", "correct", "right", "sure", "ok"];

impl PartialParse {
    /// Fills every slot that is still empty from `other`. Slots already
    /// resolved here are kept.
    pub fn absorb(&mut self, other: PartialParse) {
        macro_rules! fill_field {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = other.$field.clone();
                }
            };
        }

        fill_field!(title);
        fill_field!(date);
        fill_field!(start);
        fill_field!(end);
        fill_field!(duration);
        fill_field!(reminder);
        fill_field!(category_name);
        fill_field!(assignment_name);
        fill_field!(grade);
        fill_field!(weight);

        if self.days.is_empty() {
            self.days = other.days.clone();
        }
        // Course name and its confidence travel together.
        if self.course_name.is_none() {
            self.course_name = other.course_name.clone();
            self.course_confidence = other.course_confidence;
        }
    }

    /// Overwrites the slot that was asked for with the answer's value, if it has one.
    fn take_slot(&mut self, slot: MissingSlot, answer: &PartialParse) {
        match slot {
            MissingSlot::GradeNeedsCourse => {
                if answer.course_name.is_some() {
                    self.course_name = answer.course_name.clone();
                    self.course_confidence = answer.course_confidence;
                }
            }
            MissingSlot::GradeNeedsAssignmentName => {
                if answer.assignment_name.is_some() {
                    self.assignment_name = answer.assignment_name.clone();
                }
            }
            MissingSlot::GradeNeedsWeight => {
                if answer.weight.is_some() {
                    self.weight = answer.weight;
                }
            }
            MissingSlot::ScheduleNeedsDays => {
                if !answer.days.is_empty() {
                    self.days = answer.days.clone();
                }
            }
            MissingSlot::ScheduleNeedsTime => {
                if answer.start.is_some() || answer.duration.is_some() {
                    self.start = answer.start;
                    self.end = answer.end;
                    self.duration = answer.duration;
                }
            }
            MissingSlot::EventNeedsDate => {
                if answer.date.is_some() {
                    self.date = answer.date;
                }
            }
        }
    }
}

/// Reads `answer` as a value for `slot`, falling back to the full pipeline for
/// any other slots it happens to mention.
fn read_answer(
    previous: &PartialParse,
    slot: MissingSlot,
    tokens: &TokenStream,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
    now: NaiveDateTime,
) -> PartialParse {
    let mut answer = PartialParse::new(previous.intent);
    let everything = vec![true; tokens.len()];
    let nothing = vec![false; tokens.len()];

    match slot {
        MissingSlot::GradeNeedsCourse => {
            let confirms = previous.course_name.is_some()
                && tokens.len() <= 2
                && AFFIRMATIVE.contains(&tokens.text(0));
            if confirms {
                answer.course_name = previous.course_name.clone();
                answer.course_confidence = Some(MatchConfidence::Exact);
            } else if let Some((m, _)) = find_course(tokens, &everything, courses, categories, config)
            {
                answer.course_name = Some(m.name);
                answer.course_confidence = Some(m.confidence);
            }
        }
        MissingSlot::GradeNeedsAssignmentName => {
            answer.assignment_name = find_assignment(tokens, &nothing, config)
                .map(|(name, _)| name)
                .or_else(|| {
                    let whole = tokens.original_span(0..tokens.len()).trim();
                    (!whole.is_empty()).then(|| whole.to_string())
                });
        }
        MissingSlot::GradeNeedsWeight => {
            answer.weight = (0..tokens.len()).find_map(|i| {
                let t = tokens.text(i);
                t.strip_suffix('%')
                    .unwrap_or(t)
                    .parse::<f64>()
                    .ok()
                    .filter(|w| w.is_finite() && (0.0..=100.0).contains(w))
            });
        }
        MissingSlot::ScheduleNeedsDays
        | MissingSlot::ScheduleNeedsTime
        | MissingSlot::EventNeedsDate => {
            let mut temporal = resolve_temporal(tokens, now, config);
            // A bare "10" answers a time question.
            if slot == MissingSlot::ScheduleNeedsTime
                && temporal.as_ref().is_none_or(|t| t.start.is_none())
            {
                let anchored = normalize_with_limit(
                    &format!("at {}", tokens.source()),
                    config.max_input_chars(),
                );
                temporal = resolve_temporal(&anchored, now, config).or(temporal);
            }
            if let Some(t) = temporal {
                answer.days = if t.days.is_empty() {
                    t.bare_weekday.into_iter().collect()
                } else {
                    t.days.clone()
                };
                answer.start = t.start;
                answer.end = t.end;
                answer.duration = t.duration;
                answer.date = t.instant(now.date());
            }
        }
    }

    if previous.intent == Intent::Grade
        && answer.course_name.is_none()
        && let Some((m, _)) = find_course(tokens, &everything, courses, categories, config)
    {
        answer.course_name = Some(m.name);
        answer.course_confidence = Some(m.confidence);
    }

    // Anything else the answer carries fills remaining gaps, never the title.
    if let Some(mut extra) = extract(tokens, categories, courses, config, now)
        && extra.intent == previous.intent
    {
        extra.title = None;
        answer.absorb(extra);
    }
    answer
}

/// Merges `answer` into `previous` and runs the completion check again.
///
/// The slot that was missing from `previous` takes the answer's value; every
/// other slot keeps what `previous` already had and only fills gaps.
pub fn resume(
    previous: &PartialParse,
    answer: &str,
    categories: &[Category],
    courses: &[Course],
    config: &EngineConfig,
    now: NaiveDateTime,
) -> ParseResult {
    assert_valid_entities("category", categories);
    assert_valid_entities("course", courses);

    let Some(slot) = first_missing(previous, config) else {
        return complete(previous.clone(), answer, config);
    };
    let tokens = normalize_with_limit(answer, config.max_input_chars());
    let mut merged = previous.clone();
    if !tokens.is_empty() {
        let reply = read_answer(previous, slot, &tokens, categories, courses, config, now);
        merged.take_slot(slot, &reply);
        merged.absorb(reply);
    }
    log::debug!("resumed {} after {}", merged.intent, slot);
    complete(merged, answer, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::GradeValue;

    #[test]
    fn absorb_keeps_resolved_slots() {
        let mut base = PartialParse::new(Intent::Grade);
        base.assignment_name = Some("midterm".to_string());
        base.grade = Some(GradeValue::Percentage(90.0));

        let mut other = PartialParse::new(Intent::Grade);
        other.assignment_name = Some("quiz".to_string());
        other.course_name = Some("Mathematics 201".to_string());
        other.course_confidence = Some(MatchConfidence::Exact);
        other.weight = Some(20.0);

        base.absorb(other);
        assert_eq!(base.assignment_name.as_deref(), Some("midterm"));
        assert_eq!(base.course_name.as_deref(), Some("Mathematics 201"));
        assert_eq!(base.course_confidence, Some(MatchConfidence::Exact));
        assert_eq!(base.weight, Some(20.0));
    }

    #[test]
    fn asked_slot_is_overwritten() {
        let mut base = PartialParse::new(Intent::Grade);
        base.course_name = Some("Computer Networks".to_string());
        base.course_confidence = Some(MatchConfidence::Fuzzy);

        let mut answer = PartialParse::new(Intent::Grade);
        answer.course_name = Some("Computer Science 101".to_string());
        answer.course_confidence = Some(MatchConfidence::Synonym);

        base.take_slot(MissingSlot::GradeNeedsCourse, &answer);
        assert_eq!(base.course_name.as_deref(), Some("Computer Science 101"));
        assert_eq!(base.course_confidence, Some(MatchConfidence::Synonym));
    }
}
