// End-to-end parses of typical student notes.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use gradecal::{
    Category, Course, DateType, EngineConfig, GradeValue, MissingSlot, ParseResult, Weekday,
    parse_at,
};
use std::collections::BTreeSet;

// Monday 2026-10-19 09:00
fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateType {
    DateType::Specific(
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap(),
    )
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn courses() -> Vec<Course> {
    vec![
        Course::new("cs101", "Computer Science 101", &["CS101", "CS"]),
        Course::new("math201", "Mathematics 201", &["MATH201"]),
    ]
}

fn categories() -> Vec<Category> {
    vec![
        Category::new("health", "Health", &[]),
        Category::new("fitness", "Fitness", &[]),
    ]
}

fn run(input: &str) -> ParseResult {
    parse_at(input, &categories(), &courses(), &EngineConfig::default(), now())
}

// ==================================================================================
// EVENTS
// ==================================================================================

#[test]
fn test_meeting_next_friday() {
    let result = parse_at(
        "Meeting next Friday at 2pm",
        &[],
        &[],
        &EngineConfig::default(),
        now(),
    );
    assert_eq!(
        result,
        ParseResult::Event {
            title: "Meeting".to_string(),
            date: Some(at(2026, 10, 23, 14, 0)),
            category_name: None,
            reminder: None,
        }
    );
}

#[test]
fn test_event_with_reminder_and_category() {
    match run("Dentist tomorrow at 3pm remind me 30 minutes before") {
        ParseResult::Event {
            title,
            date,
            category_name,
            reminder,
        } => {
            assert_eq!(title, "Dentist");
            assert_eq!(date, Some(at(2026, 10, 20, 15, 0)));
            assert_eq!(category_name.as_deref(), Some("Health"));
            let reminder = reminder.expect("reminder");
            assert_eq!(reminder.minutes_before, 30);
            assert_eq!(reminder.preset, None);
        }
        other => panic!("Expected event, got {:?}", other),
    }
}

#[test]
fn test_hashtag_category() {
    match run("Leg day tomorrow #fitness") {
        ParseResult::Event {
            title,
            date,
            category_name,
            ..
        } => {
            assert_eq!(title, "Leg day");
            assert_eq!(
                date,
                Some(DateType::AllDay(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()))
            );
            assert_eq!(category_name.as_deref(), Some("Fitness"));
        }
        other => panic!("Expected event, got {:?}", other),
    }
}

#[test]
fn test_time_without_date_is_today() {
    match run("Call the bank at 4pm") {
        ParseResult::Event { title, date, .. } => {
            assert_eq!(title, "Call the bank");
            assert_eq!(date, Some(at(2026, 10, 19, 16, 0)));
        }
        other => panic!("Expected event, got {:?}", other),
    }
}

#[test]
fn test_bare_weekday_event_is_next_occurrence() {
    // Monday itself is excluded.
    match run("Submit essay Monday") {
        ParseResult::Event { date, .. } => {
            assert_eq!(
                date,
                Some(DateType::AllDay(NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()))
            );
        }
        other => panic!("Expected event, got {:?}", other),
    }
}

// ==================================================================================
// GRADES
// ==================================================================================

#[test]
fn test_bracketed_fraction_grade() {
    assert_eq!(
        run("Got 18/20 (90%) on CS101 midterm"),
        ParseResult::Grade {
            course_name: "Computer Science 101".to_string(),
            assignment_name: "midterm".to_string(),
            grade: GradeValue::Percentage(90.0),
            weight: None,
        }
    );
}

#[test]
fn test_letter_percentage_and_weight() {
    assert_eq!(
        run("I got a solid B+ (87%) worth 25% on the CS midterm"),
        ParseResult::Grade {
            course_name: "Computer Science 101".to_string(),
            assignment_name: "midterm".to_string(),
            grade: GradeValue::Percentage(87.0),
            weight: Some(25.0),
        }
    );
}

#[test]
fn test_fraction_grade_keeps_fraction() {
    match run("Scored 45 out of 50 on MATH201 quiz 3") {
        ParseResult::Grade {
            course_name,
            assignment_name,
            grade,
            ..
        } => {
            assert_eq!(course_name, "Mathematics 201");
            assert_eq!(assignment_name, "quiz 3");
            assert_eq!(
                grade,
                GradeValue::Fraction {
                    numerator: 45.0,
                    denominator: 50.0
                }
            );
        }
        other => panic!("Expected grade, got {:?}", other),
    }
}

#[test]
fn test_fraction_is_not_overridden_by_unrelated_percentage() {
    match run("Got 18/20 on the CS101 midterm, class average was 75%") {
        ParseResult::Grade {
            course_name,
            assignment_name,
            grade,
            weight,
        } => {
            assert_eq!(course_name, "Computer Science 101");
            assert_eq!(assignment_name, "midterm");
            assert_eq!(
                grade,
                GradeValue::Fraction {
                    numerator: 18.0,
                    denominator: 20.0
                }
            );
            assert_eq!(weight, None);
        }
        other => panic!("Expected grade, got {:?}", other),
    }
}

#[test]
fn test_weight_over_100_is_ignored() {
    match run("Got 80% on the CS101 final worth 300%") {
        ParseResult::Grade { grade, weight, .. } => {
            assert_eq!(grade, GradeValue::Percentage(80.0));
            assert_eq!(weight, None);
        }
        other => panic!("Expected grade, got {:?}", other),
    }
}

#[test]
fn test_room_letters_and_initials_stay_events() {
    let cases = [
        (
            "Quiz in room C tomorrow at 2pm",
            "Quiz in room C",
            at(2026, 10, 20, 14, 0),
        ),
        (
            "Midterm in Hall B on Friday at 10am",
            "Midterm in Hall B",
            at(2026, 10, 23, 10, 0),
        ),
        (
            "Meet P about the project tomorrow at 3pm",
            "Meet P about the project",
            at(2026, 10, 20, 15, 0),
        ),
    ];
    for (input, expected_title, expected_date) in cases {
        match run(input) {
            ParseResult::Event { title, date, .. } => {
                assert_eq!(title, expected_title, "input {:?}", input);
                assert_eq!(date, Some(expected_date), "input {:?}", input);
            }
            other => panic!("Expected event for {:?}, got {:?}", input, other),
        }
    }
}

#[test]
fn test_grade_without_course_asks_for_it() {
    let result = run("Got 45 out of 50 on quiz 3");
    assert_eq!(result.missing_slot(), Some(MissingSlot::GradeNeedsCourse));
    match result {
        ParseResult::NeedsMoreInfo { prompt, .. } => {
            assert_eq!(prompt, "Which course is quiz 3 for?");
        }
        other => panic!("Expected follow-up, got {:?}", other),
    }
}

// ==================================================================================
// SCHEDULE ITEMS
// ==================================================================================

#[test]
fn test_weekly_class_with_duration_only() {
    let result = parse_at(
        "Math class every Monday PT1H30M",
        &[],
        &[],
        &EngineConfig::default(),
        now(),
    );
    assert_eq!(
        result,
        ParseResult::ScheduleItem {
            title: "Math class".to_string(),
            days: BTreeSet::from([Weekday::Monday]),
            start: None,
            end: None,
            duration: Some(90),
            reminder: None,
        }
    );
}

#[test]
fn test_lecture_with_time_range() {
    match run("CS lecture on Tuesdays and Thursdays from 10 to 11:30") {
        ParseResult::ScheduleItem {
            title,
            days,
            start,
            end,
            duration,
            ..
        } => {
            assert_eq!(title, "CS lecture");
            assert_eq!(days, BTreeSet::from([Weekday::Tuesday, Weekday::Thursday]));
            assert_eq!(start, Some(t(10, 0)));
            assert_eq!(end, Some(t(11, 30)));
            assert_eq!(duration, Some(90));
        }
        other => panic!("Expected schedule item, got {:?}", other),
    }
}

#[test]
fn test_class_without_time_asks_for_it() {
    let result = run("Yoga class every Saturday");
    assert_eq!(result.missing_slot(), Some(MissingSlot::ScheduleNeedsTime));
    match result {
        ParseResult::NeedsMoreInfo { prompt, partial, .. } => {
            assert_eq!(prompt, "What time does Yoga class start on Saturday?");
            assert_eq!(partial.days, BTreeSet::from([Weekday::Saturday]));
        }
        other => panic!("Expected follow-up, got {:?}", other),
    }
}

#[test]
fn test_class_without_days_asks_for_them() {
    let result = run("Chemistry lab at 2pm");
    assert_eq!(result.missing_slot(), Some(MissingSlot::ScheduleNeedsDays));
    let partial = result.partial().expect("partial");
    assert_eq!(partial.start, Some(t(14, 0)));
    assert_eq!(partial.title.as_deref(), Some("Chemistry lab"));
}

// ==================================================================================
// NOTHING TO DO
// ==================================================================================

#[test]
fn test_empty_input_is_not_attempted() {
    assert_eq!(run(""), ParseResult::NotAttempted);
    assert_eq!(run("   \t\n"), ParseResult::NotAttempted);
}

#[test]
fn test_plain_chatter_is_unrecognized() {
    assert_eq!(
        run("hello there"),
        ParseResult::Unrecognized {
            original_input: "hello there".to_string()
        }
    );
}
