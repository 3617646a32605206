//! `infragraph` command line

use anyhow::{bail, Context as _, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use infragraph_kernel::config::{Config, WalkerConfig};
use infragraph_kernel::diagnostics::Diagnostics;
use infragraph_kernel::logging::{self, LogFormat};
use infragraph_kernel::plan::Plan;
use infragraph_kernel::plugin::{EchoProvider, PluginRegistry};
use infragraph_kernel::state::State;
use infragraph_kernel::Context;
use infragraph_addrs::Target;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Configuration file (.toml or .json)");

    Command::new("infragraph")
        .version(infragraph_kernel::VERSION)
        .about("Resource graph expansion and concurrent evaluation engine")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("plan")
                .about("Compute the changes needed to reach the configuration")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("state")
                        .long("state")
                        .value_parser(value_parser!(PathBuf))
                        .help("Prior state file (JSON)"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the plan to this file (JSON)"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(Target))
                        .help("Restrict planning to an address and its dependencies"),
                )
                .arg(
                    Arg::new("parallelism")
                        .long("parallelism")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of nodes evaluated at once"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Carry out a saved plan")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Plan file written by `plan --out`"),
                )
                .arg(
                    Arg::new("state-out")
                        .long("state-out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the resulting state to this file (JSON)"),
                )
                .arg(
                    Arg::new("parallelism")
                        .long("parallelism")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of nodes evaluated at once"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a configuration without planning")
                .arg(config_arg),
        )
        .subcommand(
            Command::new("providers")
                .about("List provider packages in a local mirror directory")
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Mirror directory"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    logging::init(if matches.get_flag("log-json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    match matches.subcommand() {
        Some(("plan", args)) => plan(args).await,
        Some(("apply", args)) => apply(args).await,
        Some(("validate", args)) => validate(args).await,
        Some(("providers", args)) => providers(args),
        _ => unreachable!("subcommand_required"),
    }
}

fn load_config(args: &ArgMatches) -> Result<Config> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    Config::from_path(path).with_context(|| format!("loading {}", path.display()))
}

/// Every provider maps to a pass-through provider that accepts the
/// configuration's resource types.
fn echo_context(config: &Config, walker: WalkerConfig) -> Context {
    let types: Vec<String> = config.resources().into_iter().map(|(_, r)| r.kind.clone()).collect();
    let registry = PluginRegistry::new().with_fallback(Arc::new(EchoProvider::accepting(types)));
    Context::new(Arc::new(registry)).with_config(walker)
}

fn print_diagnostics(diags: &Diagnostics) {
    for diag in diags.iter() {
        eprintln!("{diag}");
    }
}

fn write_json(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

async fn plan(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let state = match args.get_one::<PathBuf>("state") {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            State::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => State::new(),
    };

    let mut walker = WalkerConfig::default().with_parallelism(*args.get_one::<usize>("parallelism").unwrap_or(&10));
    for target in args.get_many::<Target>("target").into_iter().flatten() {
        walker = walker.with_target(target.clone());
    }

    let outcome = echo_context(&config, walker).plan(&config, state).await?;
    print_diagnostics(&outcome.diagnostics);
    for change in outcome.plan.actionable() {
        let object = if change.deposed { " (deposed object)" } else { "" };
        println!("  {}{object} will be {}", change.addr, change.action);
    }
    println!("Plan: {}", outcome.plan.summary());

    if let Some(out) = args.get_one::<PathBuf>("out") {
        write_json(out, &serde_json::to_string_pretty(&outcome.plan)?)?;
    }
    if outcome.diagnostics.has_errors() {
        bail!("planning failed with {} error(s)", outcome.diagnostics.error_count());
    }
    Ok(())
}

async fn apply(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let plan_path = args.get_one::<PathBuf>("plan").context("missing --plan")?;
    let text = std::fs::read_to_string(plan_path).with_context(|| format!("reading {}", plan_path.display()))?;
    let plan: Plan = serde_json::from_str(&text).with_context(|| format!("parsing {}", plan_path.display()))?;

    let walker = WalkerConfig::default().with_parallelism(*args.get_one::<usize>("parallelism").unwrap_or(&10));
    let outcome = echo_context(&config, walker).apply(&config, &plan).await?;
    print_diagnostics(&outcome.diagnostics);
    println!(
        "Apply complete: {} node(s) done, {} failed, {} skipped",
        outcome.summary.done, outcome.summary.failed, outcome.summary.skipped
    );

    if let Some(out) = args.get_one::<PathBuf>("state-out") {
        write_json(out, &outcome.state.to_json()?)?;
    }
    if outcome.diagnostics.has_errors() {
        bail!("apply failed with {} error(s)", outcome.diagnostics.error_count());
    }
    Ok(())
}

async fn validate(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let diags = echo_context(&config, WalkerConfig::default()).validate(&config).await;
    print_diagnostics(&diags);
    if diags.has_errors() {
        bail!("configuration is invalid");
    }
    println!("Configuration is valid.");
    Ok(())
}

fn providers(args: &ArgMatches) -> Result<()> {
    let dir = args.get_one::<PathBuf>("dir").context("missing --dir")?;
    let found = infragraph_providers::search_local_directory(dir)?;
    if found.is_empty() {
        println!("No provider packages found in {}", dir.display());
    }
    for (provider, packages) in found {
        println!("{provider}");
        for package in packages {
            match &package.checksum {
                Some(sum) => println!("  {} {} sha256:{sum}", package.version, package.target_platform),
                None => println!("  {} {} (unpacked)", package.version, package.target_platform),
            }
        }
    }
    Ok(())
}
