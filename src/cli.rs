use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use declarative::ResourceKind;

#[derive(Parser)]
#[command(name = "rani")]
#[command(version)]
#[command(about = "Declarative system settings assistant", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show observed state, overrides and settings
    Status {
        /// Only list entries of this kind (package, aur-package, service,
        /// user-service, group, locale)
        kind: Option<ResourceKind>,
    },

    /// Flip the wanted state of one resource
    Toggle {
        kind: ResourceKind,
        name: String,

        /// Install or remove the package through the AUR helper
        #[arg(long)]
        aur: bool,
    },

    /// Drop overrides (all, one kind, or one resource)
    Reset {
        kind: Option<ResourceKind>,
        #[arg(requires = "kind")]
        name: Option<String>,
    },

    /// Change a system setting
    #[command(subcommand)]
    Set(SetCommand),

    /// Print the scripts that apply would run
    Tasks,

    /// Run every queued task
    Apply(ApplyArgs),

    /// Install a package right away if it is missing
    Ensure {
        package: String,
    },

    /// Run a one-off script through a session
    Run {
        script: String,

        /// Run in the elevated session
        #[arg(long)]
        privileged: bool,

        /// Name shown while the script runs
        #[arg(long, default_value = "Custom command")]
        name: String,
    },

    /// Rescan the system and drop overrides that are already satisfied
    Scan,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Subcommand)]
pub enum SetCommand {
    /// DNS provider (Google, Cloudflare, Quad9, Default)
    Dns {
        #[arg(required_unless_present = "clear")]
        provider: Option<String>,

        /// Forget the override
        #[arg(long, conflicts_with = "provider")]
        clear: bool,
    },

    /// Login shell (bash, zsh, fish, sh)
    Shell {
        #[arg(required_unless_present = "clear")]
        shell: Option<String>,

        /// Forget the override
        #[arg(long, conflicts_with = "shell")]
        clear: bool,

        /// Also install the shell's default settings package
        #[arg(long, conflicts_with = "clear")]
        with_config: bool,
    },

    /// Hosts-file ad blocking (also installs or removes hblock)
    Hblock {
        #[arg(value_enum)]
        state: Switch,
    },

    /// iwd as the NetworkManager Wi-Fi backend
    Iwd {
        #[arg(value_enum)]
        state: Switch,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
    /// Flip the effective value
    Toggle,
    /// Forget the override
    Clear,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the scripts instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_toggle_with_kind_alias() {
        let cli = Cli::try_parse_from(["rani", "toggle", "aur", "yay-bin"]).unwrap();
        match cli.command {
            Command::Toggle { kind, name, aur } => {
                assert_eq!(kind, ResourceKind::AurPackage);
                assert_eq!(name, "yay-bin");
                assert!(!aur);
            }
            _ => panic!("expected toggle"),
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["rani", "toggle", "kernel", "x"]).is_err());
    }

    #[test]
    fn test_reset_name_requires_kind() {
        assert!(Cli::try_parse_from(["rani", "reset"]).is_ok());
        assert!(Cli::try_parse_from(["rani", "reset", "group", "docker"]).is_ok());
    }

    #[test]
    fn test_set_dns_needs_provider_or_clear() {
        assert!(Cli::try_parse_from(["rani", "set", "dns"]).is_err());
        assert!(Cli::try_parse_from(["rani", "set", "dns", "--clear"]).is_ok());
        assert!(Cli::try_parse_from(["rani", "set", "dns", "quad9", "--clear"]).is_err());
    }

    #[test]
    fn test_switch_values() {
        let cli = Cli::try_parse_from(["rani", "set", "iwd", "off"]).unwrap();
        match cli.command {
            Command::Set(SetCommand::Iwd { state }) => assert_eq!(state, Switch::Off),
            _ => panic!("expected set iwd"),
        }
        let cli = Cli::try_parse_from(["rani", "set", "hblock", "toggle"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Set(SetCommand::Hblock {
                state: Switch::Toggle
            })
        ));
    }

    #[test]
    fn test_shell_config_conflicts_with_clear() {
        assert!(Cli::try_parse_from(["rani", "set", "shell", "zsh", "--with-config"]).is_ok());
        assert!(Cli::try_parse_from(["rani", "set", "shell", "--clear", "--with-config"]).is_err());
    }
}
