// Perturbation harness and latency gate.
use chrono::{NaiveDate, NaiveDateTime};
use gradecal::robustness::perturbations;
use gradecal::{
    Course, EngineConfig, EngineSettings, consistency_score, measure_latency,
    perturb_and_check_at,
};
use std::collections::BTreeMap;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn courses() -> Vec<Course> {
    vec![Course::new("cs101", "Computer Science 101", &["CS101"])]
}

const SAMPLES: &[&str] = &[
    "Meeting next Friday at 2pm",
    "Got 18/20 (90%) on CS101 midterm",
    "Math class every Monday PT1H30M",
    "Dentist tomorrow at 3pm remind me 30 minutes before",
    "CS lecture on Tuesdays and Thursdays from 10 to 11:30",
    "I got a solid B+ (87%) worth 25% on the CS101 midterm",
];

#[test]
fn test_case_and_whitespace_variants_are_consistent() {
    let config = EngineConfig::default();
    for input in SAMPLES {
        let results = perturb_and_check_at(input, &[], &courses(), &config, now());
        assert!(!results.is_empty());
        let lower = input.to_lowercase();
        let upper = input.to_uppercase();
        let doubled = input.replace(' ', "  ");
        for r in &results {
            let neutral = r.perturbed_input == lower
                || r.perturbed_input == upper
                || r.perturbed_input == doubled;
            if neutral {
                assert!(
                    r.is_consistent,
                    "'{}' drifted from '{}'",
                    r.perturbed_input,
                    input
                );
                assert_eq!(r.confidence, 1.0);
            }
            assert_eq!(r.original_input, *input);
        }
    }
}

#[test]
fn test_weekday_abbreviation_keeps_date() {
    let config = EngineConfig::default();
    let results = perturb_and_check_at(
        "Meeting next Friday at 2pm",
        &[],
        &[],
        &config,
        now(),
    );
    let abbreviated = results
        .iter()
        .find(|r| r.perturbed_input == "Meeting next fri at 2pm")
        .expect("abbreviated variant");
    assert!(abbreviated.is_consistent);
}

#[test]
fn test_course_abbreviation_variant() {
    let mut table = BTreeMap::new();
    table.insert(
        "computer science 101".to_string(),
        vec!["cs101".to_string()],
    );
    let settings = EngineSettings {
        course_abbreviations: table,
        ..EngineSettings::default()
    };
    let config = EngineConfig::new(settings).unwrap();
    let variants = perturbations("Got 90% on the computer science 101 midterm", &config);
    assert!(
        variants.contains(&"Got 90% on the CS101 midterm".to_string()),
        "{:?}",
        variants
    );

    let results = perturb_and_check_at(
        "Got 90% on the computer science 101 midterm",
        &[],
        &[Course::new("cs101", "Computer Science 101", &[])],
        &config,
        now(),
    );
    assert_eq!(consistency_score(&results), 1.0, "{:?}", results);
}

#[test]
fn test_seed_changes_variants_deterministically() {
    let a = EngineConfig::default();
    let b = EngineConfig::new(EngineSettings {
        perturbation_seed: 7,
        ..EngineSettings::default()
    })
    .unwrap();
    let input = "Quiz tomorrow at 9";
    assert_eq!(perturbations(input, &a), perturbations(input, &a));
    assert_eq!(perturbations(input, &b), perturbations(input, &b));
}

#[test]
fn test_variant_count_is_bounded() {
    let config = EngineConfig::new(EngineSettings {
        max_perturbations: 3,
        ..EngineSettings::default()
    })
    .unwrap();
    let results = perturb_and_check_at(
        "Homework due Monday tomorrow at 5pm for 2 hours",
        &[],
        &[],
        &config,
        now(),
    );
    assert!(results.len() <= 3);
}

#[test]
fn test_latency_budget() {
    let config = EngineConfig::default();
    let report = measure_latency(SAMPLES, &[], &courses(), &config, 100);
    assert_eq!(report.calls, SAMPLES.len() * 100);
    assert!(report.max >= report.mean);

    // Unoptimized builds get a wider budget.
    let budget_micros = if cfg!(debug_assertions) { 20_000.0 } else { 2_000.0 };
    assert!(
        report.mean_micros() < budget_micros,
        "mean parse took {:.1}us",
        report.mean_micros()
    );
}
