// File: ./src/cli.rs
//! Shared command-line interface logic, like printing help.

pub fn print_help(binary_name: &str) {
    println!(
        "Gradecal v{} - Turn quick student notes into events, class schedules and grades",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [OPTIONS] parse <text...>", binary_name);
    println!("    {} [OPTIONS] check <text...>", binary_name);
    println!("    {} [OPTIONS] bench <text...>", binary_name);
    println!("    {} [OPTIONS] answer <json-partial> <text...>", binary_name);
    println!("    {} config [--path]", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <path>   Read engine settings from this TOML file.");
    println!("    --course <name[:abbr,abbr]>");
    println!("                          Add a known course (repeatable).");
    println!("    --category <name>     Add a known category (repeatable).");
    println!("    --json                Print results as JSON.");
    println!("    -v, --verbose         More logging on stderr (-vv for trace).");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("COMMANDS:");
    println!("    parse     Classify the text and print the result.");
    println!("    check     Run the perturbation harness and print the consistency score.");
    println!("    bench     Time 100 rounds of parsing the text.");
    println!("    answer    Merge an answer into a partial printed by 'parse --json'.");
    println!("    config    Print the active settings as TOML (or the file path).");
    println!();
    println!("RECOGNIZED INPUT:");
    println!("    Dates:      today, tomorrow, tonight, next friday, last monday, this sat,");
    println!("                Oct 12, 2026-10-12, in 3 days, 2 weeks from now, 3 days ago");
    println!("    Times:      2pm, 14:00, at 2, noon, 10-11:30, from 2 to 4pm");
    println!("    Durations:  PT1H30M, for 2 hours, for an hour, ~90m, est:1h30m");
    println!("    Schedules:  every monday and wednesday, on tuesdays, daily, weekdays");
    println!("    Grades:     18/20, 90%, 45 out of 50, B+, HD, 2:1, pass, worth 25%");
    println!("    Reminders:  30 min before, the day before, remind me 1 hour early, rem:10m");
    println!("    Categories: #fitness, or any configured synonym (gym, workout...)");
    println!();
    println!("EXAMPLES:");
    println!("    {} parse Meeting next Friday at 2pm", binary_name);
    println!(
        "    {} --course 'Computer Science 101:CS101,CS' parse Got 18/20 (90%) on CS101 midterm",
        binary_name
    );
    println!("    {} parse Math class every Monday PT1H30M", binary_name);
    println!("    {} --json check Dentist tomorrow at 3pm", binary_name);
    println!();
    println!("FILES:");
    println!("    Settings are read from <config dir>/engine.toml unless --config is given.");
    println!("    Set GRADECAL_CONFIG_DIR to use a different config directory.");
}
