//! CLI interface for cdmctl
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for inspecting and changing the
//! state of content decryption and codec modules.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CDM provider control tool
///
/// Lists media plugin modules, shows their effective activation state, and
/// changes the preferences that drive it.
#[derive(Parser, Debug)]
#[command(name = "cdmctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// On/off argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Toggle::On
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List visible modules with their state and actions
    List,

    /// Show a single module
    Show {
        /// Module id (e.g. gmp-gmpopenh264)
        id: String,
    },

    /// Enable a module
    Enable {
        /// Module id
        id: String,
    },

    /// Disable a module
    Disable {
        /// Module id
        id: String,
    },

    /// Turn automatic updates for a module on or off
    AutoUpdate {
        /// Module id
        id: String,
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Hide a module (takes effect on next start)
    Hide {
        /// Module id
        id: String,
    },

    /// Unhide a module (takes effect on next start)
    Unhide {
        /// Module id
        id: String,
    },

    /// Turn the EME global switch on or off
    Eme {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Check the update manifest and install updates
    Update {
        /// Only update this module; otherwise every module with auto-update on
        id: Option<String>,

        /// Run the provider-wide check even if the check interval has not passed
        #[arg(long)]
        force: bool,
    },

    /// Clear all provider preferences
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auto_update() {
        let cli = Cli::try_parse_from(["cdmctl", "auto-update", "gmp-gmpopenh264", "off"]).unwrap();
        match cli.command {
            Command::AutoUpdate { id, state } => {
                assert_eq!(id, "gmp-gmpopenh264");
                assert!(!state.is_on());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cdmctl", "list", "--json", "--log", "debug"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.log.as_deref(), Some("debug"));
    }

    #[test]
    fn test_update_id_optional() {
        let cli = Cli::try_parse_from(["cdmctl", "update"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Update {
                id: None,
                force: false
            }
        ));
    }

    #[test]
    fn test_rejects_bad_toggle() {
        assert!(Cli::try_parse_from(["cdmctl", "eme", "maybe"]).is_err());
    }
}
