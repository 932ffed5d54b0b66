use std::io::{BufWriter, Write};

use anyhow::{Context, anyhow};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing::{debug, info};

use xi_packet_paths::analyzer::packet_dump::PacketDump;
use xi_packet_paths::analyzer::process_log;
use xi_packet_paths::analyzer::survey::Survey;
use xi_packet_paths::types::EntityKey;
use xi_packet_paths::{Histogram, ParsedLog, PathStats, parse_log_with, parse_path_with};

mod config;

use config::PathsharkConfig;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

fn read_log(path: &str) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {path}"))?;
    let content = String::from_utf8(bytes).with_context(|| format!("{path} is not a text log"))?;
    debug!("read {} bytes from {path}", content.len());
    Ok(content)
}

fn parse_file(path: &str, config: &PathsharkConfig) -> anyhow::Result<ParsedLog> {
    let content = read_log(path)?;
    let parsed = parse_log_with(&content, &config.tracker);
    info!(
        "{path}: {} packets, {} skipped, {} invalid",
        parsed.stats.packets, parsed.stats.skipped, parsed.stats.invalid
    );
    Ok(parsed)
}

fn print_summary(parsed: &ParsedLog) {
    let stats = &parsed.stats;
    println!(
        "{} packets ({} skipped, {} invalid, {} ignored, {} dropped)",
        stats.packets, stats.skipped, stats.invalid, stats.ignored, stats.dropped
    );
    println!("{} client positions", parsed.client_updates.len());
    for (zone, entities) in &parsed.zone_entity_updates {
        println!("zone {zone}: {} entities", entities.len());
    }
    println!();
    println!("{:>6} {:<20} {:<16} {:>9}", "zone", "entity", "name", "positions");
    for entity in parsed.entities() {
        println!(
            "{:>6} {:<20} {:<16} {:>9}",
            entity.zone_id,
            entity.key,
            entity.name.as_deref().unwrap_or("-"),
            entity.position_count
        );
    }
}

fn print_histogram(histogram: &Histogram) {
    println!("{}", histogram.label);
    let widest = histogram.counts.iter().copied().max().unwrap_or_default().max(1);
    for (bucket, count) in histogram.buckets.iter().zip(&histogram.counts) {
        let bar = "#".repeat(count * 40 / widest);
        println!("{bucket:>12} | {bar} {count}");
    }
    println!();
}

fn print_path(
    parsed: &ParsedLog,
    entity: Option<&str>,
    config: &PathsharkConfig,
    json: bool,
) -> anyhow::Result<()> {
    let key = match entity {
        Some(key) => EntityKey::from(key),
        None => parsed
            .entities()
            .into_iter()
            .next()
            .map(|entity| entity.key)
            .ok_or_else(|| anyhow!("the log contains no entities"))?,
    };
    let updates = parsed
        .updates(&key)
        .ok_or_else(|| anyhow!("no entity {key} in the log"))?;
    let path = parse_path_with(updates, &config.path);

    if json {
        println!("{}", serde_json::to_string_pretty(&path)?);
        return Ok(());
    }

    println!("Path of {key} ({} updates)", updates.len());
    for part in &path {
        println!("{part}");
    }
    println!();

    let stats = PathStats::from_path(&path);
    for histogram in [
        &stats.turns_per_movement,
        &stats.pause_seconds,
        &stats.distance_per_turn,
        &stats.rot_diff_per_turn,
    ] {
        print_histogram(histogram);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let input = Arg::with_name("LOG")
        .help("The packet log to process")
        .required(true)
        .index(1);

    let matches = App::new("Pathshark")
        .about("Inspects packet capture logs and the movement of the entities in them")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("CONFIG")
                .help("Path to a TOML config file (defaults to pathshark.toml if present)")
                .short("c")
                .long("config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("RANGE")
                .help("Distance from the client beyond which entities are out of range")
                .long("range")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MOVE_THRESHOLD")
                .help("Ground distance between samples that counts as movement")
                .long("move-threshold")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PAUSE_MS")
                .help("Milliseconds without movement that count as a stop")
                .long("pause-ms")
                .takes_value(true),
        )
        .subcommand(
            SubCommand::with_name("summary")
                .about("Lists the zones and entities found in a log")
                .arg(input.clone()),
        )
        .subcommand(
            SubCommand::with_name("path")
                .about("Prints the reconstructed path of one entity")
                .arg(
                    Arg::with_name("ENTITY")
                        .help("Entity key, e.g. 0x01A-1193046 (defaults to the most observed entity)")
                        .short("e")
                        .long("entity")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("JSON")
                        .help("Print the path as JSON instead of text")
                        .long("json"),
                )
                .arg(input.clone()),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Prints every decoded packet as a line of JSON")
                .arg(input.clone()),
        )
        .subcommand(
            SubCommand::with_name("survey")
                .about("Counts the packet kinds in a log")
                .arg(input),
        )
        .subcommand(SubCommand::with_name("config").about("Prints the default configuration"))
        .get_matches();

    let mut config = PathsharkConfig::discover(matches.value_of("CONFIG"))?;
    config.apply_cli_overrides(&matches)?;
    debug!("using {config:?}");

    match matches.subcommand() {
        ("summary", Some(sub)) => {
            let parsed = parse_file(log_arg(sub)?, &config)?;
            print_summary(&parsed);
        }
        ("path", Some(sub)) => {
            let parsed = parse_file(log_arg(sub)?, &config)?;
            print_path(&parsed, sub.value_of("ENTITY"), &config, sub.is_present("JSON"))?;
        }
        ("dump", Some(sub)) => {
            let content = read_log(log_arg(sub)?)?;
            let stdout = std::io::stdout();
            let mut dump = PacketDump::new(BufWriter::new(stdout.lock()));
            process_log(&content, &mut dump);
            debug!("dumped {} packets", dump.written());
            dump.into_inner().flush()?;
        }
        ("survey", Some(sub)) => {
            let content = read_log(log_arg(sub)?)?;
            let mut survey = Survey::new();
            process_log(&content, &mut survey);
            println!("{}", serde_json::to_string_pretty(survey.stats())?);
        }
        ("config", _) => print!("{}", PathsharkConfig::generate_default_toml()),
        (name, _) => return Err(anyhow!("unknown command {name:?}")),
    }

    Ok(())
}

fn log_arg<'a>(matches: &'a ArgMatches<'_>) -> anyhow::Result<&'a str> {
    matches
        .value_of("LOG")
        .ok_or_else(|| anyhow!("missing packet log argument"))
}
