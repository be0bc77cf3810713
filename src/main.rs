//! keymgr - a cli for managing per-host ssh key pairs

#![deny(missing_docs)]

use anyhow::{bail, Context, Result};
use clap::Parser;
use keymgr::config::ConfigFile;
use keymgr::signature::{fmt_location, load_function};
use keymgr::{logging, Config, Host, KeyState, SshKeygen};
use log::LevelFilter;
use std::collections::BTreeMap;
use std::path::PathBuf;
use toml_example::traits::TomlExample;

#[derive(clap::Args, PartialEq, Debug, Clone)]
struct GenerateKeysArgs {
    /// Comma-separated lists of hosts to generate key pairs for
    #[clap(long, default_value = "")]
    hosts: String,

    /// Directory to store the key pairs in, overrides global.key_directory
    #[clap(long)]
    out: Option<PathBuf>,
}

#[derive(clap::Args, PartialEq, Debug, Clone)]
struct ListKeysArgs {
    /// Comma-separated lists of hosts to show
    #[clap(long, default_value = "")]
    hosts: String,

    /// Directory the key pairs are stored in, overrides global.key_directory
    #[clap(long)]
    out: Option<PathBuf>,
}

#[derive(clap::Args, PartialEq, Debug, Clone)]
struct MatchFunctionsArgs {
    /// Json descriptor of the function as expected
    expected: PathBuf,

    /// Json descriptor of the function as found
    actual: PathBuf,
}

/// Subcommand to run
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(clap::Subcommand, PartialEq, Debug, Clone)]
enum Command {
    /// Generate keymgr.toml example
    GenerateExample,
    /// Generate missing ssh key pairs for all hosts that are not remote only
    GenerateKeys(GenerateKeysArgs),
    /// Show which hosts have a key pair
    ListKeys(ListKeysArgs),
    /// Check that the signature of two functions match, ignoring where they are defined
    MatchFunctions(MatchFunctionsArgs),
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// configuration file to load
    #[clap(long, default_value = "keymgr.toml", env = "KEYMGR_CONFIG")]
    config: PathBuf,

    /// only print log messages of this level or above
    #[clap(long, default_value = "info", env = "KEYMGR_LOG_LEVEL")]
    log_level: LevelFilter,

    #[clap(subcommand)]
    action: Command,
}

fn filter_hosts(host_spec: &str, hosts: &BTreeMap<String, Host>) -> Result<Vec<Host>> {
    if host_spec.is_empty() {
        return Ok(hosts.values().map(Clone::clone).collect::<Vec<_>>());
    }
    let mut filtered = vec![];
    for name in host_spec.split(',') {
        match hosts.get(name) {
            Some(v) => {
                filtered.push(v.clone());
            }
            None => {
                bail!("no host named '{}' found in configuration", name)
            }
        }
    }
    Ok(filtered)
}

fn load_configuration(args: &Args) -> Result<Config> {
    keymgr::load_configuration(&args.config).with_context(|| {
        format!(
            "failed to parse configuration file: {}",
            &args.config.display()
        )
    })
}

fn generate_keys(args: &Args, keygen_args: &GenerateKeysArgs) -> Result<()> {
    let config = load_configuration(args)?;
    let hosts = filter_hosts(&keygen_args.hosts, &config.hosts)?;
    let out = keygen_args
        .out
        .as_ref()
        .unwrap_or(&config.global.key_directory);
    let report = keymgr::generate_keys(&hosts, out, &SshKeygen::default())?;
    println!(
        "{} generated, {} already present, {} remote only",
        report.generated.len(),
        report.existing.len(),
        report.remote_only.len()
    );
    Ok(())
}

fn list_keys(args: &Args, list_args: &ListKeysArgs) -> Result<()> {
    let config = load_configuration(args)?;
    let hosts = filter_hosts(&list_args.hosts, &config.hosts)?;
    let out = list_args.out.as_ref().unwrap_or(&config.global.key_directory);
    for (name, state) in keymgr::key_status(&hosts, out) {
        let state = match state {
            KeyState::Present => "present",
            KeyState::PublicKeyMissing => "public key missing",
            KeyState::Missing => "missing",
            KeyState::RemoteOnly => "remote only",
        };
        println!("{name}: {state}");
    }
    Ok(())
}

fn match_functions(match_args: &MatchFunctionsArgs) -> Result<()> {
    let expected = load_function(&match_args.expected)?;
    let actual = load_function(&match_args.actual)?;
    if !keymgr::functions_match(&expected, &actual) {
        bail!(
            "{} does not match {}",
            fmt_location(&actual.ident.location),
            fmt_location(&expected.ident.location)
        );
    }
    println!("{} matches", expected.ident.name);
    Ok(())
}

/// The keymgr program entry point
pub fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level).context("failed to initialize logging")?;

    let res = match args.action {
        Command::GenerateExample => Ok(println!("{}", ConfigFile::toml_example())),
        Command::GenerateKeys(ref keygen_args) => generate_keys(&args, keygen_args),
        Command::ListKeys(ref list_args) => list_keys(&args, list_args),
        Command::MatchFunctions(ref match_args) => match_functions(match_args),
    };
    res.with_context(|| format!("keymgr failed doing: {:?}", args.action))
}
