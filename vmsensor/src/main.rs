use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use std::{path::PathBuf, process, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;
use vmsensor_core::{
    CliConfig, Config, CoreError, InMemorySession, InventoryFixture, RenderMode, SensorReport,
    Session, Summarizer, Summary, TagResolver, Target,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn target_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("id")
            .long("id")
            .value_name("MOID")
            .help("Managed object id, e.g. vm-16"),
    )
    .arg(
        Arg::new("name")
            .long("name")
            .short('n')
            .value_name("NAME")
            .help("Exact object name"),
    )
    .group(ArgGroup::new("target").args(["id", "name"]).required(true))
}

fn tag_arg() -> Arg {
    Arg::new("tags")
        .long("tags")
        .short('t')
        .value_name("TAG")
        .help("Tag names, comma separated or repeated")
        .value_delimiter(',')
        .action(ArgAction::Append)
}

fn cli() -> Command {
    Command::new("vmsensor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("PRTG sensors for vSphere inventory, capacity and performance")
        .subcommand_required(true)
        .arg(
            Arg::new("inventory")
                .long("inventory")
                .short('i')
                .value_name("PATH")
                .env("VMSENSOR_INVENTORY")
                .help("Inventory fixture served as the vSphere session")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .short('j')
                .help("Readable JSON output prefixed with the subject")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Debug logging on stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("json-config")
                .long("json-config")
                .value_name("PATH")
                .help("Path to JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("snapshot-age")
                .long("snapshot-age")
                .value_name("DURATION")
                .help("Count snapshots older than this, e.g. 7d or 36h")
                .value_parser(humantime::parse_duration)
                .global(true),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .value_name("N")
                .help("Parallel inventory calls")
                .value_parser(clap::value_parser!(usize))
                .global(true),
        )
        .arg(
            Arg::new("max-warn")
                .long("max-warn")
                .value_name("N")
                .help("Snapshot count warning threshold")
                .value_parser(clap::value_parser!(f64))
                .global(true),
        )
        .arg(
            Arg::new("max-err")
                .long("max-err")
                .value_name("N")
                .help("Snapshot count error threshold")
                .value_parser(clap::value_parser!(f64))
                .global(true),
        )
        .arg(
            Arg::new("warn-msg")
                .long("warn-msg")
                .value_name("TEXT")
                .global(true),
        )
        .arg(
            Arg::new("err-msg")
                .long("err-msg")
                .value_name("TEXT")
                .global(true),
        )
        .subcommand(
            target_args(Command::new("summary").about("Virtual machine summary")).arg(
                Arg::new("sensors")
                    .long("sensors")
                    .value_name("COUNTER")
                    .help("Extra performance counters, comma separated")
                    .value_delimiter(',')
                    .action(ArgAction::Append),
            ),
        )
        .subcommand(target_args(Command::new("hs-summary").about("Host summary")))
        .subcommand(target_args(Command::new("ds-summary").about("Datastore summary")))
        .subcommand(target_args(Command::new("vds-summary").about("Distributed switch summary")))
        .subcommand(
            Command::new("snapshots")
                .about("Old snapshots per virtual machine, optionally filtered by tag")
                .arg(tag_arg()),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the leaf objects covered by tags")
                .arg(tag_arg().required(true)),
        )
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose { "vmsensor=debug" } else { "vmsensor=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.filter(|v| !v.is_empty()).cloned().collect())
        .unwrap_or_default()
}

fn target(matches: &ArgMatches) -> Target {
    match matches.get_one::<String>("id") {
        Some(id) => Target::Id(id.clone()),
        None => Target::Name(matches.get_one::<String>("name").cloned().unwrap_or_default()),
    }
}

async fn run() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"))?;

    let (command, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("no command given"))?;

    // Build CLI configuration
    let cli_config = CliConfig {
        snapshot_age: matches.get_one::<Duration>("snapshot-age").copied(),
        concurrency: matches.get_one::<usize>("concurrency").copied(),
        extra_counters: if command == "summary" {
            strings(sub, "sensors")
        } else {
            Vec::new()
        },
        max_warn: matches.get_one::<f64>("max-warn").copied(),
        max_err: matches.get_one::<f64>("max-err").copied(),
        warn_msg: matches.get_one::<String>("warn-msg").cloned(),
        err_msg: matches.get_one::<String>("err-msg").cloned(),
        json_output: matches.get_flag("json"),
    };

    let json_config_path = matches.get_one::<PathBuf>("json-config");
    let config = Config::load(Some(&cli_config), json_config_path)?;
    let mode = RenderMode::from_json_flag(config.json_output);

    let inventory = matches
        .get_one::<PathBuf>("inventory")
        .ok_or_else(|| anyhow!("--inventory is required"))?;
    let session: Arc<dyn Session> =
        Arc::new(InMemorySession::new(InventoryFixture::load_from_file(inventory)?));

    if command == "resolve" {
        return resolve(session, &config, &strings(sub, "tags")).await;
    }

    let summarizer = Summarizer::new(session, config);
    let result = match command {
        "summary" => summarizer.vm_summary(&target(sub)).await,
        "hs-summary" => summarizer.host_summary(&target(sub)).await,
        "ds-summary" => summarizer.datastore_summary(&target(sub)).await,
        "vds-summary" => summarizer.switch_summary(&target(sub)).await,
        "snapshots" => summarizer.snapshot_scan(&strings(sub, "tags")).await,
        other => return Err(anyhow!("unknown command {}", other)),
    };

    emit(command, result, mode)
}

/// Print the sensor payload. A failed summary still prints an error
/// payload so PRTG shows the message, then exits non-zero.
fn emit(
    command: &str,
    result: vmsensor_core::Result<Summary>,
    mode: RenderMode,
) -> anyhow::Result<()> {
    let rendered = match result {
        Ok(summary) => summary.render(mode),
        Err(e) => {
            let report = SensorReport::new(command);
            report.set_error(e.to_string());
            report.render(Duration::ZERO, mode)
        }
    };

    match rendered {
        Ok(payload) => {
            println!("{}", payload);
            Ok(())
        }
        Err(CoreError::ErrorState { message, payload }) => {
            println!("{}", payload);
            Err(anyhow!(message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn resolve(
    session: Arc<dyn Session>,
    config: &Config,
    tags: &[String],
) -> anyhow::Result<()> {
    let index = TagResolver::new(session, config.resolver_options())
        .resolve(tags)
        .await?;

    for (tag, object, error) in index.failures() {
        eprintln!("{}: {} not expanded: {}", tag, object, error);
    }
    println!("{}", serde_json::to_string_pretty(&index.snapshot())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_tags_are_split() {
        let matches = cli()
            .try_get_matches_from([
                "vmsensor",
                "--inventory",
                "inv.json",
                "snapshots",
                "--tags",
                "prod,web",
                "-t",
                "db",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(strings(sub, "tags"), vec!["prod", "web", "db"]);
    }

    #[test]
    fn test_summary_needs_a_target() {
        assert!(cli()
            .try_get_matches_from(["vmsensor", "--inventory", "inv.json", "summary"])
            .is_err());

        let matches = cli()
            .try_get_matches_from(["vmsensor", "-i", "inv.json", "summary", "--name", "web01"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(target(sub), Target::Name("web01".to_string()));
    }

    #[test]
    fn test_error_payload_fails_the_run() {
        let err = emit(
            "summary",
            Err(CoreError::not_found("no VirtualMachine named web09")),
            RenderMode::Compact,
        )
        .unwrap_err();
        assert!(err.to_string().contains("web09"));
    }
}
