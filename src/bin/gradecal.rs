use anyhow::{Context, Result};
use gradecal::cli::print_help;
use gradecal::model::item::PartialParse;
use gradecal::paths::AppPaths;
use gradecal::{
    Category, Course, EngineConfig, EngineSettings, ParseResult, ResultDisplay, consistency_score,
    measure_latency, parse, perturb_and_check, resume,
};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::env;
use std::path::PathBuf;

const BENCH_ROUNDS: usize = 100;

struct Options {
    config_path: Option<PathBuf>,
    courses: Vec<Course>,
    categories: Vec<Category>,
    json: bool,
    verbosity: u8,
    rest: Vec<String>,
}

fn slug(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// `Computer Science 101:CS101,CS` becomes a course with two abbreviations.
fn parse_course_flag(value: &str) -> Course {
    let (name, abbrs) = match value.split_once(':') {
        Some((n, a)) => (n.trim(), a),
        None => (value.trim(), ""),
    };
    let synonyms: Vec<&str> = abbrs
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    Course::new(&slug(name), name, &synonyms)
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut opts = Options {
        config_path: None,
        courses: Vec::new(),
        categories: Vec::new(),
        json: false,
        verbosity: 0,
        rest: Vec::new(),
    };
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        // Everything after the command word belongs to the input text.
        if !opts.rest.is_empty() {
            opts.rest.push(args[i].clone());
            i += 1;
            continue;
        }
        match arg {
            "-c" | "--config" => {
                let value = args.get(i + 1).context("--config needs a path")?;
                opts.config_path = Some(PathBuf::from(value));
                i += 1;
            }
            "--course" => {
                let value = args.get(i + 1).context("--course needs a value")?;
                let course = parse_course_flag(value);
                if opts.courses.iter().any(|c| c.id == course.id) {
                    anyhow::bail!("Course '{}' given twice", course.name);
                }
                opts.courses.push(course);
                i += 1;
            }
            "--category" => {
                let value = args.get(i + 1).context("--category needs a value")?;
                let name = value.trim();
                let id = slug(name);
                if opts.categories.iter().any(|c| c.id == id) {
                    anyhow::bail!("Category '{}' given twice", name);
                }
                opts.categories.push(Category::new(&id, name, &[]));
                i += 1;
            }
            "--json" => opts.json = true,
            "-v" | "--verbose" => opts.verbosity += 1,
            "-vv" => opts.verbosity += 2,
            _ => opts.rest.push(args[i].clone()),
        }
        i += 1;
    }
    Ok(opts)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("gradecal")
        .build();
    // A second init only happens in tests; ignore it.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn load_settings(path: Option<&PathBuf>) -> Result<EngineSettings> {
    let settings = match path {
        Some(p) => EngineSettings::load(p)?,
        None => EngineSettings::load_or_default()?,
    };
    settings.validate()?;
    Ok(settings)
}

fn print_result(result: &ParseResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("[{}] {}", result.kind(), result.to_smart_string());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || args[0] == "--help" || args[0] == "-h" || args[0] == "help" {
        print_help("gradecal");
        return Ok(());
    }

    let opts = parse_options(&args)?;
    init_logging(opts.verbosity);

    let Some((command, text_args)) = opts.rest.split_first() else {
        print_help("gradecal");
        return Ok(());
    };
    let text = text_args.join(" ");

    if command == "config" {
        if text_args.first().is_some_and(|a| a == "--path") {
            let path = match &opts.config_path {
                Some(p) => p.clone(),
                None => AppPaths::get_settings_file_path()?,
            };
            println!("{}", path.display());
        } else {
            let settings = load_settings(opts.config_path.as_ref())?;
            println!("{}", toml::to_string_pretty(&settings)?);
        }
        return Ok(());
    }

    let settings = load_settings(opts.config_path.as_ref())?;
    let config = EngineConfig::new(settings)?;

    match command.as_str() {
        "parse" => {
            let result = parse(&text, &opts.categories, &opts.courses, &config);
            print_result(&result, opts.json)?;
        }
        "answer" => {
            let (state, answer) = text_args
                .split_first()
                .context("answer needs the JSON partial and the reply text")?;
            let partial = read_partial(state)?;
            let now = chrono::Local::now().naive_local();
            let result = resume(
                &partial,
                &answer.join(" "),
                &opts.categories,
                &opts.courses,
                &config,
                now,
            );
            print_result(&result, opts.json)?;
        }
        "check" => {
            let results = perturb_and_check(&text, &opts.categories, &opts.courses, &config);
            let score = consistency_score(&results);
            if opts.json {
                let report = serde_json::json!({ "score": score, "results": results });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for r in &results {
                    let mark = if r.is_consistent { "ok  " } else { "DIFF" };
                    println!("{} {:.2}  {}", mark, r.confidence, r.perturbed_input);
                }
                println!("consistency: {:.2}", score);
            }
        }
        "bench" => {
            let report = measure_latency(
                &[text.as_str()],
                &opts.categories,
                &opts.courses,
                &config,
                BENCH_ROUNDS,
            );
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} calls, mean {:.1}us, max {:?}",
                    report.calls,
                    report.mean_micros(),
                    report.max
                );
            }
        }
        other => {
            eprintln!("Unknown command '{}'", other);
            print_help("gradecal");
            std::process::exit(2);
        }
    }
    Ok(())
}

/// Accepts either a bare partial or a whole `needs_more_info` result.
fn read_partial(state: &str) -> Result<PartialParse> {
    if let Ok(ParseResult::NeedsMoreInfo { partial, .. }) = serde_json::from_str(state) {
        return Ok(partial);
    }
    serde_json::from_str(state).context("Could not read the partial parse JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_flag_with_abbreviations() {
        let c = parse_course_flag("Computer Science 101:CS101, CS");
        assert_eq!(c.id, "computer-science-101");
        assert_eq!(c.name, "Computer Science 101");
        assert_eq!(c.synonyms, vec!["CS101".to_string(), "CS".to_string()]);
    }

    #[test]
    fn text_after_command_is_kept_verbatim() {
        let args: Vec<String> = ["--json", "parse", "Meeting", "--json", "at", "2pm"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let opts = parse_options(&args).unwrap();
        assert!(opts.json);
        assert_eq!(opts.rest, vec!["parse", "Meeting", "--json", "at", "2pm"]);
    }
}
