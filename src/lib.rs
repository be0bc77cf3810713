//! A module for managing the local ssh key pairs of an inventory of hosts
//! and comparing function signatures.

pub use config::{load_configuration, parse_config, Config, Host};
pub use keygen::{generate_keys, key_status, KeyGenerator, KeyState, KeygenReport, SshKeygen};
pub use signature::{functions_match, DependencyFunction};

mod command;
pub mod config;
pub mod keygen;
pub mod logging;
pub mod signature;
