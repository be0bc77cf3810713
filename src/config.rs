use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use toml_example::TomlExample;

use super::keygen::KeyPaths;

lazy_static! {
    static ref HOSTNAME_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9\-]{0,62}$")
        .expect("hostname regex is valid");
}

#[derive(TomlExample, Debug, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    #[toml_example(nesting)]
    global: Global,

    /// The default values of host will use if any corresponding value is not provided in following hosts
    #[serde(default)]
    #[toml_example(nesting)]
    host_defaults: HostDefaultConfig,

    /// The hosts a key pair is managed for, keyed by host name.
    /// If any field is not provided the value from host_defaults is used
    #[serde(default)]
    #[toml_example(nesting)]
    hosts: HashMap<String, HostConfig>,
}

fn default_key_directory() -> PathBuf {
    PathBuf::from("keys")
}

#[derive(Debug, Default, Deserialize, TomlExample)]
struct HostDefaultConfig {
    /// Hosts managed remotely get no local key pair
    #[serde(default)]
    #[toml_example(default = false)]
    remote_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize, TomlExample)]
struct HostConfig {
    /// The host's keys are managed remotely, so no local key pair is generated
    #[serde(default)]
    #[toml_example(default = false)]
    remote_only: Option<bool>,

    #[serde(flatten)]
    #[toml_example(skip)]
    others: BTreeMap<String, toml::Value>,
}

/// A host from the inventory
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Host {
    /// Name identifying the host, also used as the key comment
    pub name: String,

    /// Keys of this host are not generated locally
    pub remote_only: bool,
}

impl Host {
    /// Host that gets a local key pair
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_only: false,
        }
    }

    /// Host whose keys live elsewhere
    pub fn remote(name: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_only: true,
        }
    }

    /// Where the key pair of this host lives below `out`
    pub fn key_paths(&self, out: &Path) -> KeyPaths {
        KeyPaths::new(out, &self.name)
    }
}

/// Global configuration affecting all hosts
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, TomlExample)]
pub struct Global {
    /// Directory where the per-host key pairs are stored.
    /// Relative paths are resolved against the directory of this file
    #[serde(default = "default_key_directory")]
    #[toml_example(default = "keys")]
    pub key_directory: PathBuf,
}

impl Default for Global {
    fn default() -> Self {
        Self {
            key_directory: default_key_directory(),
        }
    }
}

fn validate_global(global: &Global, working_directory: &Path) -> Global {
    let mut global = global.clone();
    if global.key_directory.is_relative() {
        global.key_directory = working_directory.join(global.key_directory);
    };
    global
}

/// Check a host name is usable as a directory name and a key comment.
pub fn validate_host_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 {
        bail!(
            "a host's name must be between 1 and 63 characters long, got: '{}'",
            name
        );
    }
    if !HOSTNAME_REGEX.is_match(name) {
        bail!("a host's name must only contain letters from a to z, the digits from 0 to 9, and the hyphen (-). But not starting with a hyphen. got: '{}'", name);
    }
    Ok(())
}

fn validate_host(name: &str, host: &HostConfig, default: &HostDefaultConfig) -> Result<Host> {
    if !host.others.is_empty() {
        bail!(
            "{} are not allowed fields in hosts.{name}",
            host.others
                .clone()
                .into_keys()
                .collect::<Vec<String>>()
                .join(", ")
        );
    }

    validate_host_name(name)?;

    let remote_only = host
        .remote_only
        .or(default.remote_only)
        .unwrap_or_default();

    Ok(Host {
        name: name.to_string(),
        remote_only,
    })
}

/// Validated configuration
pub struct Config {
    /// Hosts as defined in the configuration
    pub hosts: BTreeMap<String, Host>,
    /// Configuration affecting all hosts
    pub global: Global,
}

/// Parse toml configuration
pub fn parse_config(content: &str, working_directory: &Path) -> Result<Config> {
    let config: ConfigFile = toml::from_str(content)?;

    let hosts = config
        .hosts
        .iter()
        .map(|(name, host)| {
            Ok((
                name.to_string(),
                validate_host(name, host, &config.host_defaults)?,
            ))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    let global = validate_global(&config.global, working_directory);

    Ok(Config { hosts, global })
}

/// Load configuration from path
pub fn load_configuration(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).context("Cannot read file")?;
    let working_directory = path.parent().with_context(|| {
        format!(
            "Cannot determine working directory from path: {}",
            path.display()
        )
    })?;
    parse_config(&content, working_directory)
}

#[cfg(test)]
pub(crate) const TEST_CONFIG: &str = r#"
[global]
key_directory = "secrets/ssh"

[host_defaults]
remote_only = false

[hosts]
[hosts.alpha]

[hosts.beta]
remote_only = true

[hosts.gamma-01]
remote_only = false
"#;

#[test]
pub fn test_parse_config() -> Result<()> {
    let config = parse_config(TEST_CONFIG, Path::new("/etc/keymgr"))?;
    assert_eq!(
        config.global.key_directory,
        PathBuf::from("/etc/keymgr/secrets/ssh")
    );

    let hosts = &config.hosts;
    assert_eq!(hosts.len(), 3);
    assert_eq!(hosts["alpha"], Host::new("alpha"));
    assert_eq!(hosts["beta"], Host::remote("beta"));
    assert_eq!(hosts["gamma-01"], Host::new("gamma-01"));

    // BTreeMap keeps hosts sorted by name
    let names = hosts.keys().map(String::as_str).collect::<Vec<_>>();
    assert_eq!(names, ["alpha", "beta", "gamma-01"]);
    Ok(())
}

#[test]
pub fn test_parse_config_with_redundant_fields() {
    let parse_result = parse_config(
        &format!("{}\nredundant = 111", TEST_CONFIG),
        Path::new("/"),
    );
    assert!(parse_result.is_err());
}

#[test]
fn test_defaults() -> Result<()> {
    let config = parse_config("", Path::new("/srv"))?;
    assert!(config.hosts.is_empty());
    assert_eq!(config.global.key_directory, PathBuf::from("/srv/keys"));

    let config = parse_config(
        r#"
[global]
key_directory = "/var/lib/keys"

[host_defaults]
remote_only = true

[hosts.alpha]
[hosts.beta]
remote_only = false
"#,
        Path::new("/srv"),
    )?;
    assert_eq!(config.global.key_directory, PathBuf::from("/var/lib/keys"));
    assert!(config.hosts["alpha"].remote_only);
    assert!(!config.hosts["beta"].remote_only);
    Ok(())
}

#[test]
fn test_validate_host_name() {
    assert!(validate_host_name("kld-00").is_ok());
    assert!(validate_host_name("").is_err());
    assert!(validate_host_name("-alpha").is_err());
    assert!(validate_host_name("Alpha").is_err());
    assert!(validate_host_name("../alpha").is_err());
    assert!(validate_host_name(&"a".repeat(64)).is_err());
}

#[test]
fn test_load_configuration() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("keymgr.toml");
    fs::write(&path, TEST_CONFIG)?;

    let config = load_configuration(&path)?;
    assert_eq!(
        config.global.key_directory,
        dir.path().join("secrets").join("ssh")
    );
    assert!(load_configuration(&dir.path().join("missing.toml")).is_err());
    Ok(())
}

#[test]
fn test_example_parses() -> Result<()> {
    use toml_example::traits::TomlExample as _;

    let example = ConfigFile::toml_example();
    let config = parse_config(&example, Path::new("/"))?;
    assert_eq!(config.global.key_directory, PathBuf::from("/keys"));
    Ok(())
}
