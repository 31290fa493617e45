// File: ./src/model/grade.rs
use crate::config::EngineConfig;
use crate::model::item::{Category, Course, GradeValue, MissingSlot};
use crate::model::matcher::{EntityMatch, MatchConfidence, find_in_tokens, match_entity};
use crate::model::tokenizer::TokenStream;
use std::collections::BTreeSet;
use std::ops::Range;

const MAX_COURSE_WORDS: usize = 4;
const PREPOSITIONS: &[&str] = &["on", "in", "for", "at", "from", "with", "overall"];
const GRADE_NOUNS: &[&str] = &["grade", "mark", "score", "total", "result"];
/// Words allowed between a grade verb and the value: "got a solid B".
const VALUE_LEADS: &[&str] = &["a", "an", "solid", "straight", "another", "perfect"];
/// How far past "on|in|for" an assignment keyword may sit: "C in Mathematics 201 final".
const ASSIGNMENT_REACH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct GradeAttempt {
    pub grade: GradeValue,
    pub weight: Option<f64>,
    pub course: Option<EntityMatch>,
    pub assignment_name: Option<String>,
    /// First required slot still absent, in asking order.
    pub missing: Option<MissingSlot>,
    /// Numeric notation, a modified letter, or a value stated with a grade verb.
    /// A bare letter that only sits next to an assignment word is not explicit.
    pub explicit: bool,
}

enum Notation {
    Percent(f64),
    Fraction(f64, f64),
    Letter(String),
    International(String),
    PassFail(bool),
}

struct Found {
    notation: Notation,
    tokens: Range<usize>,
    explicit: bool,
}

struct Reader<'a> {
    ts: &'a TokenStream,
    skip: &'a [bool],
    used: BTreeSet<usize>,
}

impl<'a> Reader<'a> {
    fn word(&self, i: usize) -> &'a str {
        if self.skip.get(i).copied().unwrap_or(false) || self.used.contains(&i) {
            return "";
        }
        let ts: &'a TokenStream = self.ts;
        ts.text(i)
    }

    /// "25%", "25 %", "25 percent"
    fn percent_at(&self, i: usize) -> Option<(f64, usize)> {
        let w = self.word(i);
        if let Some(num) = w.strip_suffix('%') {
            return parse_amount(num).map(|p| (p, 1));
        }
        let p = parse_amount(w)?;
        matches!(self.word(i + 1), "%" | "percent" | "pct").then_some((p, 2))
    }

    /// "18/20", "18 / 20", "18 out of 20"
    fn fraction_at(&self, i: usize) -> Option<(f64, f64, usize)> {
        let w = self.word(i);
        if let Some((n, d)) = w.split_once('/') {
            let (n, d) = (parse_amount(n)?, parse_amount(d)?);
            return (d > 0.0).then_some((n, d, 1));
        }
        let n = parse_amount(w)?;
        let (d, used) = match (self.word(i + 1), self.word(i + 2)) {
            ("/", d) => (parse_amount(d)?, 3),
            ("out", "of") => (parse_amount(self.word(i + 3))?, 4),
            _ => return None,
        };
        (d > 0.0).then_some((n, d, used))
    }

    fn mark(&mut self, range: Range<usize>) {
        self.used.extend(range);
    }

    /// "worth 25%", "weighted at 25%", "weight of 25%", "25% weight", "25% of the grade"
    fn weight(&mut self) -> Option<f64> {
        for i in 0..self.ts.len() {
            let lead = match (self.word(i), self.word(i + 1)) {
                ("worth", _) | ("weighing", _) => 1,
                ("weighted", "at") | ("weight", "of") | ("weighting", "of") => 2,
                ("weighted", _) | ("weight", _) | ("weighting", _) => 1,
                _ => 0,
            };
            if lead > 0
                && let Some((p, len)) = self.percent_at(i + lead)
                && is_weight(p)
            {
                self.mark(i..i + lead + len);
                return Some(p);
            }
            let Some((p, len)) = self.percent_at(i).filter(|(p, _)| is_weight(*p)) else {
                continue;
            };
            let after = i + len;
            // "70% weighted at 20%" names the weight after "at".
            if matches!(self.word(after), "weight" | "weighting" | "weighted")
                && !matches!(self.word(after + 1), "at" | "of")
            {
                self.mark(i..after + 1);
                return Some(p);
            }
            if self.word(after) == "of" {
                let mut j = after + 1;
                while matches!(self.word(j), "the" | "my" | "final" | "overall" | "course" | "total")
                {
                    j += 1;
                }
                if GRADE_NOUNS.contains(&self.word(j)) {
                    self.mark(i..j + 1);
                    return Some(p);
                }
            }
        }
        None
    }

    /// A grade verb right before `i`, past any article: "got a B", "earned an HD".
    fn after_grade_verb(&self, i: usize, config: &EngineConfig) -> bool {
        let mut j = i;
        while j > 0 {
            j -= 1;
            let w = self.word(j);
            if !VALUE_LEADS.contains(&w) {
                return config.is_grade_verb(w);
            }
        }
        false
    }

    /// An assignment keyword shortly after `i`, optionally behind "on|in|for":
    /// "C on the quiz", "passed the CS101 lab". Masked tokens break the run.
    fn before_assignment(&self, i: usize, via_preposition: bool, config: &EngineConfig) -> bool {
        let mut j = i + 1;
        if via_preposition {
            if !matches!(self.word(j), "on" | "in" | "for") {
                return false;
            }
            j += 1;
        }
        for k in j..j + ASSIGNMENT_REACH {
            let w = self.word(k);
            if w.is_empty() {
                return false;
            }
            if config.is_assignment_keyword(w) {
                return true;
            }
        }
        false
    }

    fn bracketed(&self, i: usize) -> bool {
        self.ts.get(i).is_some_and(|t| t.bracketed)
    }
}

fn is_weight(p: f64) -> bool {
    p > 0.0 && p <= 100.0
}

fn parse_amount(s: &str) -> Option<f64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn is_modified_letter(token: &str) -> bool {
    token.chars().count() > 1 && (token.ends_with('+') || token.ends_with('-'))
}

/// Course spans may not overlap grade values, keywords or verbs.
fn course_eligibility(
    ts: &TokenStream,
    skip: &[bool],
    used: &BTreeSet<usize>,
    config: &EngineConfig,
) -> Vec<bool> {
    (0..ts.len())
        .map(|i| {
            let w = ts.text(i);
            !skip.get(i).copied().unwrap_or(false)
                && !used.contains(&i)
                && !config.is_grade_verb(w)
                && !config.is_assignment_keyword(w)
                && !w.starts_with('#')
        })
        .collect()
}

/// Best course in the eligible tokens. A fuzzy hit that is really a category
/// name is dropped.
pub fn find_course(
    ts: &TokenStream,
    eligible: &[bool],
    courses: &[Course],
    categories: &[Category],
    config: &EngineConfig,
) -> Option<(EntityMatch, Range<usize>)> {
    let (m, range) = find_in_tokens(
        ts,
        eligible,
        courses,
        config.course_abbreviations(),
        MAX_COURSE_WORDS,
    )?;
    if m.confidence == MatchConfidence::Fuzzy
        && match_entity(&ts.joined(range.clone()), categories, config.category_synonyms())
            .is_some_and(|c| c.confidence > MatchConfidence::Fuzzy)
    {
        log::debug!("'{}' is a category, not a course", ts.joined(range));
        return None;
    }
    Some((m, range))
}

/// Assignment keyword run plus an optional trailing number: "midterm", "final exam", "quiz 2".
/// Returned verbatim from the source text.
pub fn find_assignment(
    ts: &TokenStream,
    skip: &[bool],
    config: &EngineConfig,
) -> Option<(String, Range<usize>)> {
    let free = |i: usize| !skip.get(i).copied().unwrap_or(false);
    let start = (0..ts.len()).find(|&i| free(i) && config.is_assignment_keyword(ts.text(i)))?;
    let mut end = start + 1;
    while end < ts.len() && free(end) && config.is_assignment_keyword(ts.text(end)) {
        end += 1;
    }
    let next = ts.text(end);
    if free(end)
        && !next.is_empty()
        && next.trim_start_matches('#').chars().all(|c| c.is_ascii_digit())
        && next.trim_start_matches('#').len() <= 3
    {
        end += 1;
    }
    Some((ts.original_span(start..end).to_string(), start..end))
}

pub fn resolve_grade(
    tokens: &TokenStream,
    courses: &[Course],
    categories: &[Category],
    config: &EngineConfig,
) -> Option<GradeAttempt> {
    resolve_grade_masked(tokens, &[], courses, categories, config)
}

/// Like [`resolve_grade`], ignoring tokens flagged in `skip`.
pub fn resolve_grade_masked(
    tokens: &TokenStream,
    skip: &[bool],
    courses: &[Course],
    categories: &[Category],
    config: &EngineConfig,
) -> Option<GradeAttempt> {
    let mut r = Reader {
        ts: tokens,
        skip,
        used: BTreeSet::new(),
    };
    let weight = r.weight();

    let mut found: Vec<Found> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let w = r.word(i);
        if w.is_empty() {
            i += 1;
            continue;
        }
        if let Some((p, len)) = r.percent_at(i) {
            if p <= 100.0 {
                found.push(Found {
                    notation: Notation::Percent(p),
                    tokens: i..i + len,
                    explicit: true,
                });
            }
            i += len;
            continue;
        }
        if let Some((n, d, len)) = r.fraction_at(i) {
            found.push(Found {
                notation: Notation::Fraction(n, d),
                tokens: i..i + len,
                explicit: true,
            });
            i += len;
            continue;
        }
        let by_verb = r.after_grade_verb(i, config);
        let by_assignment = r.before_assignment(i, true, config);
        let notation = if config.letter_band(w).is_some() {
            let counts = if is_modified_letter(w) {
                true
            } else if w == "a" {
                // "a" is usually the article.
                (by_verb || by_assignment)
                    && (r.word(i + 1).is_empty()
                        || PREPOSITIONS.contains(&r.word(i + 1))
                        || (i > 0 && r.word(i - 1) == "an"))
            } else {
                by_verb || by_assignment
            };
            counts.then(|| Notation::Letter(tokens.original(i).to_string()))
        } else if config.international_band(w).is_some() {
            let counts = if matches!(w, "first" | "third") {
                by_verb && i > 0 && r.word(i - 1) == "a"
            } else {
                by_verb || by_assignment
            };
            counts.then(|| Notation::International(tokens.original(i).to_string()))
        } else if let Some(passed) = config.pass_fail(w) {
            // Spelled-out results ("passed the lab") need no preposition.
            let spelled = w.chars().count() > 1;
            let counts =
                by_verb || by_assignment || (spelled && r.before_assignment(i, false, config));
            counts.then_some(Notation::PassFail(passed))
        } else {
            None
        };
        if let Some(notation) = notation {
            let explicit = by_verb || is_modified_letter(w) || matches!(w, "passed" | "failed");
            found.push(Found {
                notation,
                tokens: i..i + 1,
                explicit,
            });
        }
        i += 1;
    }

    let first = found.first()?;
    let mut chosen = &first.notation;
    // "18/20 (90%)", "B+ (87%)": the bracketed percentage is authoritative.
    if let Some(next) = found.get(1)
        && let Notation::Percent(p) = next.notation
        && next.tokens.start == first.tokens.end
        && r.bracketed(next.tokens.start)
        && !r.bracketed(first.tokens.start)
    {
        match &first.notation {
            Notation::Fraction(n, d) => {
                let from_fraction = n / d * 100.0;
                if (from_fraction - p).abs() > config.fraction_tolerance() {
                    log::warn!(
                        "fraction {}/{} ({:.1}%) disagrees with {}%, keeping the percentage",
                        n,
                        d,
                        from_fraction,
                        p
                    );
                }
                chosen = &next.notation;
            }
            Notation::Letter(l) => {
                if let Some(band) = config.letter_band(l)
                    && (p < band.min || p > band.max)
                {
                    log::warn!("letter {} disagrees with {}%, keeping the percentage", l, p);
                }
                chosen = &next.notation;
            }
            _ => {}
        }
    }
    let grade = match chosen {
        Notation::Percent(p) => GradeValue::Percentage(*p),
        Notation::Fraction(numerator, denominator) => GradeValue::Fraction {
            numerator: *numerator,
            denominator: *denominator,
        },
        Notation::Letter(l) | Notation::International(l) => GradeValue::Letter(l.clone()),
        Notation::PassFail(passed) => GradeValue::PassFail(*passed),
    };
    let explicit = found.iter().any(|f| f.explicit);
    let value_tokens: Vec<Range<usize>> = found.iter().map(|f| f.tokens.clone()).collect();

    for range in value_tokens {
        r.mark(range);
    }
    let mut consumed = r.used;

    let assignment_skip: Vec<bool> = (0..tokens.len())
        .map(|i| skip.get(i).copied().unwrap_or(false) || consumed.contains(&i))
        .collect();
    let assignment = find_assignment(tokens, &assignment_skip, config);
    if let Some((_, range)) = &assignment {
        consumed.extend(range.clone());
    }

    let eligible = course_eligibility(tokens, skip, &consumed, config);
    let course = find_course(tokens, &eligible, courses, categories, config).map(|(m, range)| {
        consumed.extend(range);
        m
    });

    let assignment_name = assignment.map(|(name, _)| name);
    let missing = missing_grade_slot(
        assignment_name.is_some(),
        weight.is_some(),
        course.as_ref().map(|c| c.confidence),
        config,
    );

    log::debug!(
        "grade: {:?} weight={:?} course={:?} assignment={:?} missing={:?} explicit={}",
        grade,
        weight,
        course.as_ref().map(|c| &c.name),
        assignment_name,
        missing,
        explicit
    );
    Some(GradeAttempt {
        grade,
        weight,
        course,
        assignment_name,
        missing,
        explicit,
    })
}

/// Asking order for grades: assignment, weight (when required), then course.
/// A fuzzy course still counts as missing unless fuzzy matches are accepted.
pub fn missing_grade_slot(
    has_assignment: bool,
    has_weight: bool,
    course: Option<MatchConfidence>,
    config: &EngineConfig,
) -> Option<MissingSlot> {
    if !has_assignment {
        Some(MissingSlot::GradeNeedsAssignmentName)
    } else if !has_weight && config.require_weight() {
        Some(MissingSlot::GradeNeedsWeight)
    } else if course
        .is_none_or(|c| c == MatchConfidence::Fuzzy && !config.accept_fuzzy_matches())
    {
        Some(MissingSlot::GradeNeedsCourse)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::NamedEntity;
    use crate::model::tokenizer::normalize;

    fn courses() -> Vec<Course> {
        vec![
            NamedEntity::new("c1", "Computer Science 101", &["CS101", "CS"]),
            NamedEntity::new("c2", "Mathematics 201", &["MATH201"]),
        ]
    }

    fn resolve(input: &str) -> Option<GradeAttempt> {
        resolve_grade(&normalize(input), &courses(), &[], &EngineConfig::default())
    }

    #[test]
    fn bracketed_fraction_keeps_percentage() {
        let g = resolve("Got 18/20 (90%) on CS101 midterm").unwrap();
        assert_eq!(g.grade, GradeValue::Percentage(90.0));
        assert_eq!(g.assignment_name.as_deref(), Some("midterm"));
        assert_eq!(g.course.unwrap().name, "Computer Science 101");
        assert_eq!(g.missing, None);
    }

    #[test]
    fn weight_phrases() {
        assert_eq!(resolve("85% on the final worth 30%").unwrap().weight, Some(30.0));
        assert_eq!(resolve("85% on quiz 2, 10% of the grade").unwrap().weight, Some(10.0));
        assert_eq!(resolve("Midterm 70% weighted at 20%").unwrap().weight, Some(20.0));
        let g = resolve("quiz 92% 15% weight").unwrap();
        assert_eq!(g.grade, GradeValue::Percentage(92.0));
        assert_eq!(g.weight, Some(15.0));
    }

    #[test]
    fn letters_need_context_unless_modified() {
        let g = resolve("got an A on the quiz").unwrap();
        assert_eq!(g.grade, GradeValue::Letter("A".to_string()));
        assert!(resolve("buy a new charger").is_none());
        let g = resolve("B+ in Mathematics 201").unwrap();
        assert_eq!(g.grade, GradeValue::Letter("B+".to_string()));
        assert_eq!(g.missing, Some(MissingSlot::GradeNeedsAssignmentName));
    }

    #[test]
    fn international_and_pass_fail() {
        let g = resolve("Got a 2:1 on my essay").unwrap();
        assert_eq!(g.grade, GradeValue::Letter("2:1".to_string()));
        let g = resolve("Got HD for the CS project").unwrap();
        assert_eq!(g.grade, GradeValue::Letter("HD".to_string()));
        let g = resolve("Passed the lab practical").unwrap();
        assert_eq!(g.grade, GradeValue::PassFail(true));
        assert!(resolve("first thing tomorrow").is_none());
    }

    #[test]
    fn out_of_and_missing_course() {
        let g = resolve("scored 45 out of 50 on quiz 3").unwrap();
        assert_eq!(
            g.grade,
            GradeValue::Fraction {
                numerator: 45.0,
                denominator: 50.0
            }
        );
        assert_eq!(g.assignment_name.as_deref(), Some("quiz 3"));
        assert_eq!(g.missing, Some(MissingSlot::GradeNeedsCourse));
    }

    #[test]
    fn zero_denominator_is_not_a_fraction() {
        assert!(resolve("0/0").is_none());
    }

    #[test]
    fn bare_letters_need_an_anchor() {
        assert!(resolve("Quiz in room C").is_none());
        assert!(resolve("Meet P about the project").is_none());
        assert!(resolve("Midterm in Hall B").is_none());

        let g = resolve("C on the quiz").unwrap();
        assert_eq!(g.grade, GradeValue::Letter("C".to_string()));
        assert!(!g.explicit);
        let g = resolve("got a C on the quiz").unwrap();
        assert!(g.explicit);
        let g = resolve("Passed the lab practical").unwrap();
        assert!(g.explicit);
    }

    #[test]
    fn unbracketed_percentage_does_not_override_fraction() {
        let g = resolve("Got 18/20 on the CS101 midterm, class average was 75%").unwrap();
        assert_eq!(
            g.grade,
            GradeValue::Fraction {
                numerator: 18.0,
                denominator: 20.0
            }
        );
        let g = resolve("Got a B+ on the quiz, 87% of the class passed").unwrap();
        assert_eq!(g.grade, GradeValue::Letter("B+".to_string()));
        let g = resolve("Got B+ (87%) on the quiz").unwrap();
        assert_eq!(g.grade, GradeValue::Percentage(87.0));
    }

    #[test]
    fn out_of_range_percentages_are_ignored() {
        assert!(resolve("Got 150% on the midterm").is_none());
        let g = resolve("Got 80% on the final worth 300%").unwrap();
        assert_eq!(g.grade, GradeValue::Percentage(80.0));
        assert_eq!(g.weight, None);
        let g = resolve("Got 80% on the final worth 30%").unwrap();
        assert_eq!(g.weight, Some(30.0));
    }

    #[test]
    fn slot_order() {
        let config = EngineConfig::default();
        assert_eq!(
            missing_grade_slot(false, false, None, &config),
            Some(MissingSlot::GradeNeedsAssignmentName)
        );
        assert_eq!(
            missing_grade_slot(true, false, Some(MatchConfidence::Fuzzy), &config),
            Some(MissingSlot::GradeNeedsCourse)
        );
        assert_eq!(
            missing_grade_slot(true, false, Some(MatchConfidence::Synonym), &config),
            None
        );
    }
}
