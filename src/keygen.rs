//! Per-host ssh key pairs below a key directory.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::run;
use crate::config::validate_host_name;
use crate::Host;

/// File name of the private key inside a host's key directory
pub const PRIVATE_KEY_FILE: &str = "id_rsa";
/// File name ssh-keygen gives the public half of [`PRIVATE_KEY_FILE`]
pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";

/// Layout of a single host's key pair
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct KeyPaths {
    /// `<out>/<host>`
    pub directory: PathBuf,
    /// `<out>/<host>/id_rsa`
    pub private_key: PathBuf,
    /// `<out>/<host>/id_rsa.pub`
    pub public_key: PathBuf,
}

impl KeyPaths {
    /// Paths of the key pair of host `name` below `out`
    pub fn new(out: &Path, name: &str) -> Self {
        let directory = out.join(name);
        Self {
            private_key: directory.join(PRIVATE_KEY_FILE),
            public_key: directory.join(PUBLIC_KEY_FILE),
            directory,
        }
    }
}

/// Something that can create a key pair at a given path.
pub trait KeyGenerator {
    /// Create a private key at `key` (and its public half next to it), labelled with `comment`.
    fn generate(&self, comment: &str, key: &Path) -> Result<()>;
}

/// Arguments for `ssh-keygen`: RSA, 2048 bits and an empty passphrase.
pub fn ssh_keygen_args<'a>(comment: &'a str, key: &'a str) -> [&'a str; 10] {
    ["-t", "rsa", "-b", "2048", "-C", comment, "-f", key, "-N", ""]
}

/// Runs the `ssh-keygen` binary found in `PATH`.
#[derive(Debug, Clone)]
pub struct SshKeygen {
    program: String,
}

impl SshKeygen {
    /// Use a different binary, i.e. an absolute path to ssh-keygen
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::with_program("ssh-keygen")
    }
}

impl KeyGenerator for SshKeygen {
    fn generate(&self, comment: &str, key: &Path) -> Result<()> {
        let key = key
            .to_str()
            .with_context(|| format!("key path is not valid utf-8: {}", key.display()))?;
        run(&self.program, &ssh_keygen_args(comment, key))
    }
}

/// What happened to each host during [`generate_keys`], in iteration order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KeygenReport {
    /// Hosts that got a new key pair
    pub generated: Vec<String>,
    /// Hosts that already had a private key
    pub existing: Vec<String>,
    /// Hosts skipped because their keys are managed remotely
    pub remote_only: Vec<String>,
}

/// Make sure every host that is not remote-only has a key pair below `out`.
///
/// Existing private keys are never regenerated. Stops at the first failure.
pub fn generate_keys(
    hosts: &[Host],
    out: &Path,
    generator: &dyn KeyGenerator,
) -> Result<KeygenReport> {
    let mut report = KeygenReport::default();
    for host in hosts {
        validate_host_name(&host.name)?;
        if host.remote_only {
            debug!("{} is remote only, skipping", host.name);
            report.remote_only.push(host.name.clone());
            continue;
        }
        let paths = host.key_paths(out);
        fs::create_dir_all(&paths.directory)
            .with_context(|| format!("cannot create {}", paths.directory.display()))?;

        if paths.private_key.is_file() {
            debug!(
                "{} already has a key at {}",
                host.name,
                paths.private_key.display()
            );
            report.existing.push(host.name.clone());
            continue;
        }

        generator
            .generate(&host.name, &paths.private_key)
            .with_context(|| format!("failed to generate key pair for {}", host.name))?;
        if !paths.private_key.is_file() {
            bail!(
                "key generation for {} finished but {} was not created",
                host.name,
                paths.private_key.display()
            );
        }
        info!(
            "Generated key pair for {}: {}",
            host.name,
            paths.private_key.display()
        );
        report.generated.push(host.name.clone());
    }
    Ok(report)
}

/// Key state of a host below a key directory
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KeyState {
    Present,
    /// The private key exists but `id_rsa.pub` next to it does not
    PublicKeyMissing,
    Missing,
    RemoteOnly,
}

/// Inspect which hosts have a key pair below `out` without touching anything.
pub fn key_status(hosts: &[Host], out: &Path) -> Vec<(String, KeyState)> {
    hosts
        .iter()
        .map(|host| {
            let paths = host.key_paths(out);
            let state = if host.remote_only {
                KeyState::RemoteOnly
            } else if !paths.private_key.is_file() {
                KeyState::Missing
            } else if !paths.public_key.is_file() {
                KeyState::PublicKeyMissing
            } else {
                KeyState::Present
            };
            (host.name.clone(), state)
        })
        .collect()
}
