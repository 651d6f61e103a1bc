mod config;

use anyhow::{Context, anyhow};
use clap::{App, Arg, ArgMatches, SubCommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bg_replays::ReplayFile;
use bg_replays::analyzer::debug_log::DebugLoggerBuilder;
use bg_replays::analyzer::event_dump::EventDumpBuilder;
use bg_replays::analyzer::{analyze, run};
use bg_replays::blueprint::BlueprintDatabase;
use bg_replays::chunky::{ChunkBody, ChunkNode};
use bg_replays::company::Company;
use bg_replays::decoder::DecodePolicy;
use bg_replays::finalizer::ResultFinalizer;
use bg_replays::stream::EventStream;

use crate::config::ToolConfig;

fn replay_arg() -> Arg<'static, 'static> {
    Arg::with_name("REPLAY")
        .help("The replay file to process")
        .required(true)
        .index(1)
}

fn blueprints_arg() -> Arg<'static, 'static> {
    Arg::with_name("BLUEPRINTS")
        .help("JSON blueprint database")
        .long("blueprints")
        .takes_value(true)
}

fn init_tracing(config: &ToolConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_replay(matches: &ArgMatches) -> anyhow::Result<ReplayFile> {
    let path = matches
        .value_of("REPLAY")
        .ok_or_else(|| anyhow!("no replay given"))?;
    ReplayFile::from_file(Path::new(path)).with_context(|| format!("failed to read {path}"))
}

fn load_stream(matches: &ArgMatches, config: &ToolConfig) -> anyhow::Result<EventStream> {
    let replay = load_replay(matches)?;
    let policy = if config.lenient {
        DecodePolicy::Lenient
    } else {
        DecodePolicy::Strict
    };
    let stream = replay
        .event_stream(policy)
        .context("failed to decode replay events")?;
    if stream.rejected() > 0 {
        warn!("{} events could not be decoded", stream.rejected());
    }
    Ok(stream)
}

fn load_blueprints(config: &ToolConfig) -> anyhow::Result<BlueprintDatabase> {
    match &config.blueprints {
        Some(path) => {
            let db = BlueprintDatabase::from_file(path)
                .with_context(|| format!("failed to load blueprints from {}", path.display()))?;
            info!("loaded {} blueprints", db.len());
            Ok(db)
        }
        None => {
            warn!("no blueprint database configured, captures will not resolve");
            Ok(BlueprintDatabase::default())
        }
    }
}

fn print_chunk(node: &ChunkNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.body() {
        ChunkBody::Folder(children) => {
            println!(
                "{indent}FOLD {} v{} {:?} ({} children)",
                node.tag(),
                node.version(),
                node.descriptor(),
                children.len()
            );
            for child in children {
                print_chunk(child, depth + 1);
            }
        }
        ChunkBody::Data(data) => println!(
            "{indent}DATA {} v{} {:?} ({} bytes)",
            node.tag(),
            node.version(),
            node.descriptor(),
            data.len()
        ),
    }
}

fn print_chunks(matches: &ArgMatches) -> anyhow::Result<()> {
    let replay = load_replay(matches)?;
    let container = replay
        .container()
        .context("failed to read container")?
        .ok_or_else(|| anyhow!("not a Chunky replay"))?;
    println!("Chunky v{}", container.format_version());
    for root in container.roots() {
        print_chunk(root, 0);
    }
    if !container.trailing().is_empty() {
        println!("{} bytes of trailing data", container.trailing().len());
    }
    Ok(())
}

fn print_frames(matches: &ArgMatches) -> anyhow::Result<()> {
    let replay = load_replay(matches)?;
    for frame in replay.frames() {
        println!(
            "type {:>4} length {:>6} offset {:#x}",
            frame.frame_type, frame.byte_length, frame.offset
        );
    }
    Ok(())
}

fn save_company(company: &Company, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(company)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn finalize(matches: &ArgMatches, config: &ToolConfig) -> anyhow::Result<()> {
    let stream = load_stream(matches, config)?;
    let analysis = analyze(&stream, &load_blueprints(config)?);
    if !analysis.is_valid {
        warn!("finalizing an analysis that is not valid");
    }

    let company_path = PathBuf::from(
        matches
            .value_of("COMPANY")
            .ok_or_else(|| anyhow!("no company given"))?,
    );
    let output = matches
        .value_of("OUTPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|| company_path.clone());

    let company = Company::from_file(&company_path)
        .with_context(|| format!("failed to load company {}", company_path.display()))?;
    let finalizer = ResultFinalizer::stage(&analysis, &company).context("failed to finalize")?;

    let mut written = Ok(());
    let outcome = finalizer.synchronize(|company| written = save_company(&company, &output));
    written?;
    info!("wrote company to {}", output.display());
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let matches = App::new("Replay Tool")
        .about("Inspects, analyzes and finalizes Company of Heroes replays")
        .arg(
            Arg::with_name("CONFIG")
                .help("Path to a TOML config file")
                .long("config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PRINT_CONFIG")
                .help("Print a commented default config and exit")
                .long("print-config"),
        )
        .arg(
            Arg::with_name("LENIENT")
                .help("Skip events that cannot be decoded")
                .long("lenient"),
        )
        .subcommand(
            SubCommand::with_name("chunks")
                .about("Prints the Chunky container tree")
                .arg(replay_arg()),
        )
        .subcommand(
            SubCommand::with_name("frames")
                .about("Prints every telemetry frame found in a flat replay")
                .arg(replay_arg()),
        )
        .subcommand(
            SubCommand::with_name("events")
                .about("Prints every decoded event as a JSON line")
                .arg(replay_arg()),
        )
        .subcommand(
            SubCommand::with_name("debug-log")
                .about("Prints debug and verification messages")
                .arg(replay_arg()),
        )
        .subcommand(
            SubCommand::with_name("analyze")
                .about("Prints the unit lifecycle analysis as JSON")
                .arg(replay_arg())
                .arg(blueprints_arg()),
        )
        .subcommand(
            SubCommand::with_name("finalize")
                .about("Applies the match outcome to a company file")
                .arg(replay_arg())
                .arg(blueprints_arg())
                .arg(
                    Arg::with_name("COMPANY")
                        .help("Company JSON file")
                        .long("company")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("OUTPUT")
                        .help("Where to write the updated company (default: overwrite the input)")
                        .short("o")
                        .long("output")
                        .takes_value(true),
                ),
        )
        .get_matches();

    if matches.is_present("PRINT_CONFIG") {
        print!("{}", ToolConfig::generate_default_toml());
        return Ok(());
    }

    let mut config = ToolConfig::discover(matches.value_of("CONFIG").map(Path::new))?;
    config.apply_cli_overrides(&matches);
    if let (_, Some(sub)) = matches.subcommand() {
        config.apply_cli_overrides(sub);
    }
    init_tracing(&config);

    match matches.subcommand() {
        ("chunks", Some(sub)) => print_chunks(sub)?,
        ("frames", Some(sub)) => print_frames(sub)?,
        ("events", Some(sub)) => {
            let stream = load_stream(sub, &config)?;
            run(&stream, &mut EventDumpBuilder::new().build());
        }
        ("debug-log", Some(sub)) => {
            let stream = load_stream(sub, &config)?;
            run(&stream, &mut DebugLoggerBuilder::new().build());
        }
        ("analyze", Some(sub)) => {
            let stream = load_stream(sub, &config)?;
            let analysis = analyze(&stream, &load_blueprints(&config)?);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        ("finalize", Some(sub)) => finalize(sub, &config)?,
        _ => return Err(anyhow!("no command given\n\n{}", matches.usage())),
    }

    Ok(())
}
