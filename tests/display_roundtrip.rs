// Rendered results parse back to the same result.
use chrono::{NaiveDate, NaiveDateTime};
use gradecal::{Category, Course, EngineConfig, ParseResult, ResultDisplay, parse_at};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn courses() -> Vec<Course> {
    vec![Course::new("cs101", "Computer Science 101", &["CS101"])]
}

fn categories() -> Vec<Category> {
    vec![Category::new("health", "Health", &[])]
}

fn run(input: &str) -> ParseResult {
    parse_at(input, &categories(), &courses(), &EngineConfig::default(), now())
}

fn assert_roundtrip(input: &str) {
    let first = run(input);
    assert!(first.is_complete(), "'{}' gave {:?}", input, first);
    let rendered = first.to_smart_string();
    let second = run(&rendered);
    assert_eq!(first, second, "'{}' rendered as '{}'", input, rendered);
}

#[test]
fn test_event_roundtrip() {
    assert_roundtrip("Meeting next Friday at 2pm");
    assert_roundtrip("Dentist tomorrow at 3pm remind me 30 minutes before");
    assert_roundtrip("Checkup Oct 30 #health with a reminder the day before");
    assert_roundtrip("Pay rent tomorrow");
}

#[test]
fn test_schedule_roundtrip() {
    assert_roundtrip("Math class every Monday PT1H30M");
    assert_roundtrip("CS lecture on Tuesdays and Thursdays from 10 to 11:30");
    assert_roundtrip("Gym every weekday at 7am for 45 minutes");
}

#[test]
fn test_grade_roundtrip() {
    assert_roundtrip("Got 18/20 (90%) on CS101 midterm");
    assert_roundtrip("Got 18/20 on CS101 quiz 2");
    assert_roundtrip("Got a B+ on the CS101 essay worth 10%");
    assert_roundtrip("Passed the CS101 lab");
    assert_roundtrip("Failed the CS101 exam");
}

#[test]
fn test_rendered_forms() {
    assert_eq!(
        run("Meeting next Friday at 2pm").to_smart_string(),
        "Meeting 2026-10-23 14:00"
    );
    assert_eq!(
        run("Math class every Monday PT1H30M").to_smart_string(),
        "Math class every Monday PT1H30M"
    );
    assert_eq!(
        run("Got 18/20 (90%) on CS101 midterm").to_smart_string(),
        "Got 90% on Computer Science 101 midterm"
    );
}
