use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pxc",
    version,
    about = "Create and manage Proxmox VMs and containers"
)]
pub struct Cli {
    /// Run against a built-in simulated cluster instead of this host
    #[arg(long, global = true, env = "PXC_SIMULATE")]
    pub simulate: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Commands that change the cluster or the settings file get an
    /// operation log.
    pub fn mutates(&self) -> bool {
        match &self.command {
            Command::Create { .. }
            | Command::Start { .. }
            | Command::Stop { .. }
            | Command::Delete { .. } => true,
            Command::List => false,
            Command::Iso { action } => !matches!(action, IsoCommand::List),
            Command::Config { action } => matches!(
                action,
                ConfigCommand::Set { .. } | ConfigCommand::SetNode { .. }
            ),
            Command::Packages { action } => matches!(
                action,
                PackagesCommand::Add { .. } | PackagesCommand::Delete { .. }
            ),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a VM with an interactive wizard
    Create {
        /// Package (preset) to take defaults from
        #[arg(long, visible_alias = "package")]
        preset: Option<String>,
    },

    /// List VMs and containers across the cluster
    #[command(visible_alias = "ls")]
    List,

    /// Start a VM or container
    Start {
        /// VM or container ID
        id: u32,
    },

    /// Stop a VM or container
    Stop {
        /// VM or container ID
        id: u32,

        /// Stop even if the VM is locked
        #[arg(short, long)]
        force: bool,
    },

    /// Delete a VM or container after confirmation
    #[command(visible_alias = "rm")]
    Delete {
        /// VM or container ID
        id: u32,

        /// Go through every check and confirmation without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage ISO images
    Iso {
        #[command(subcommand)]
        action: IsoCommand,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Manage packages (named presets of VM defaults)
    #[command(visible_alias = "presets")]
    Packages {
        #[command(subcommand)]
        action: PackagesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum IsoCommand {
    /// List ISOs on every ISO-capable storage
    #[command(visible_alias = "ls")]
    List,

    /// Download an ISO from a URL onto cluster storage
    Download {
        url: String,

        /// Target storage (default: saved ISO storage)
        #[arg(short, long)]
        storage: Option<String>,

        /// File name on the storage (default: last URL segment)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Upload a local ISO file
    Upload {
        file: PathBuf,

        /// Target storage (default: saved ISO storage)
        #[arg(short, long)]
        storage: Option<String>,
    },

    /// Delete an ISO by list number, file name or volume ID
    #[command(visible_alias = "rm")]
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the settings file
    Show,

    /// Print the settings file location
    Path,

    /// Set a global default (cores, memory_mb, disk_gb, bridge,
    /// iso_storage, vm_storage, node, package)
    Set { key: String, value: String },

    /// Set a per-node default (cores, memory_mb, disk_gb, bridge,
    /// iso_storage, vm_storage)
    SetNode {
        node: String,
        key: String,
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PackagesCommand {
    /// List packages
    #[command(visible_alias = "ls")]
    List,

    /// Show one package
    Show { name: String },

    /// Add or replace a package; prompts for values not given
    Add {
        name: String,

        /// CPU cores
        #[arg(long)]
        cores: Option<String>,

        /// Memory in MB, or with a suffix (4G)
        #[arg(long)]
        memory: Option<String>,

        /// Disk in GB, or with a suffix (1T)
        #[arg(long)]
        disk: Option<String>,

        /// Network bridge
        #[arg(long)]
        bridge: Option<String>,
    },

    /// Delete a package
    #[command(visible_alias = "rm")]
    Delete { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_delete_flags() {
        let cli = Cli::try_parse_from(["pxc", "--simulate", "delete", "100", "--dry-run"]).unwrap();
        assert!(cli.simulate);
        assert!(matches!(
            cli.command,
            Command::Delete {
                id: 100,
                dry_run: true
            }
        ));
        assert!(cli.mutates());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pxc", "iso", "list", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.mutates());
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["pxc", "start", "web"]).is_err());
    }
}
