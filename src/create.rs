//! `pxc create`: the interactive creation wizard.
//!
//! [`Wizard`] decides the stage order; the runners here prompt for each
//! stage, validate locally and hand back a [`Draft`] patch.

use std::fmt;
use std::io::IsTerminal;

use console::style;
use inquire::validator::Validation;
use inquire::{Confirm, Select, Text};

use crate::backend::{Backend, ClusterNode, Storage, StorageContent};
use crate::error::PxcError;
use crate::flow::wizard::{Draft, Stage, Wizard};
use crate::progress::{OutputMode, StepProgress};
use crate::resolver::{FALLBACK_BRIDGE, FALLBACK_CORES, FALLBACK_DISK_GB, FALLBACK_MEMORY_MB};
use crate::settings::{Fields, SettingsStore};
use crate::topology::ClusterTopology;
use crate::util::{parse_disk_gb, parse_memory_mb};

pub const MIN_VMID: u32 = 100;
pub const MAX_VMID: u32 = 999_999_999;
const MAX_CORES: u32 = 128;
const MIN_MEMORY_MB: u64 = 16;
const MAX_DISK_GB: u64 = 65_536;
const NO_ISO: &str = "(No ISO)";

// ── validators ───────────────────────────────────────────

pub fn validate_vmid(input: &str) -> Result<u32, String> {
    let id: u32 = input
        .trim()
        .parse()
        .map_err(|_| "VM ID must be a number".to_string())?;
    if !(MIN_VMID..=MAX_VMID).contains(&id) {
        return Err(format!("VM ID must be between {MIN_VMID} and {MAX_VMID}"));
    }
    Ok(id)
}

pub fn validate_name(input: &str) -> Result<(), String> {
    let name = input.trim();
    if name.is_empty() || name.len() > 63 {
        return Err("Name must be 1-63 characters".into());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err("Name may only contain letters, digits and hyphens".into());
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("Name cannot start or end with a hyphen".into());
    }
    Ok(())
}

pub fn validate_cores(input: &str) -> Result<u32, String> {
    let cores: u32 = input
        .trim()
        .parse()
        .map_err(|_| "Cores must be a number".to_string())?;
    if !(1..=MAX_CORES).contains(&cores) {
        return Err(format!("Cores must be between 1 and {MAX_CORES}"));
    }
    Ok(cores)
}

pub fn validate_memory(input: &str) -> Result<u64, String> {
    let mb = parse_memory_mb(input).map_err(|e| e.to_string())?;
    if mb < MIN_MEMORY_MB {
        return Err(format!("Memory must be at least {MIN_MEMORY_MB} MB"));
    }
    Ok(mb)
}

pub fn validate_disk(input: &str) -> Result<u64, String> {
    let gb = parse_disk_gb(input).map_err(|e| e.to_string())?;
    if !(1..=MAX_DISK_GB).contains(&gb) {
        return Err(format!("Disk must be between 1 and {MAX_DISK_GB} GB"));
    }
    Ok(gb)
}

/// Adapt a parsing validator to inquire.
fn check<T>(
    f: fn(&str) -> Result<T, String>,
) -> impl Fn(&str) -> Result<Validation, inquire::CustomUserError> + Clone {
    move |input: &str| {
        Ok(match f(input) {
            Ok(_) => Validation::Valid,
            Err(msg) => Validation::Invalid(msg.into()),
        })
    }
}

// ── ISO storage choice ───────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum IsoStorageChoice {
    /// The resolved preference exists on the node.
    Resolved(String),
    /// Exactly one candidate; taken without asking.
    Only(String),
    /// The operator must pick.
    Ask,
    /// Nothing on this node accepts ISOs.
    Unavailable,
}

pub fn pick_iso_storage(resolved: Option<&str>, available: &[Storage]) -> IsoStorageChoice {
    if let Some(name) = resolved
        && available.iter().any(|s| s.name == name)
    {
        return IsoStorageChoice::Resolved(name.to_string());
    }
    match available {
        [] => IsoStorageChoice::Unavailable,
        [only] => IsoStorageChoice::Only(only.name.clone()),
        _ => IsoStorageChoice::Ask,
    }
}

/// Node the selection starts on: the configured node when it is online,
/// else the local node.
pub fn initial_node<'a>(
    seeded: Option<&'a str>,
    online: &[&ClusterNode],
    local: &'a str,
) -> &'a str {
    seeded
        .filter(|n| online.iter().any(|m| m.name == *n))
        .unwrap_or(local)
}

/// A labelled option in a select prompt.
#[derive(Clone)]
struct Choice<T> {
    label: String,
    value: T,
}

impl<T> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn storage_label(s: &Storage) -> String {
    let scope = if s.is_shared() { "shared" } else { "local" };
    format!("{} ({scope}, {})", s.name, s.kind)
}

// ── public entry point ───────────────────────────────────

pub async fn run<B: Backend>(
    backend: &B,
    store: &SettingsStore,
    preset: Option<String>,
) -> Result<(), PxcError> {
    if !std::io::stdin().is_terminal() {
        return Err(PxcError::NotInteractive {
            command: "pxc create".into(),
        });
    }

    let preset = preset.filter(|name| {
        let exists = store.get_preset(name).is_some();
        if !exists {
            println!(
                "{} preset '{name}' not found, using defaults",
                style("warning:").yellow()
            );
        }
        exists
    });

    let topology = ClusterTopology::probe(backend).await;
    let mut wizard = Wizard::for_topology(&topology);
    let runner = Runner {
        backend,
        store,
        topology: &topology,
        preset: preset.as_deref(),
    };

    loop {
        let result = match wizard.stage().clone() {
            Stage::Welcome => runner.welcome().await,
            Stage::Identity => runner.identity().await,
            Stage::NodeSelection => runner.node_selection(),
            Stage::Compute => runner.compute(wizard.draft()),
            Stage::Storage => runner.storage(wizard.draft()).await,
            Stage::Network => runner.network(wizard.draft()).await,
            Stage::Iso => runner.iso(wizard.draft()).await,
            Stage::Summary => runner.summary(wizard.draft()),
            Stage::Execute => {
                match runner.execute(&wizard).await {
                    Ok(()) => wizard.complete(),
                    Err(e) => wizard.fail(e.to_string()),
                }
                continue;
            }
            Stage::Success | Stage::Error(_) | Stage::Cancelled => break,
        };

        match result {
            Ok(patch) => {
                wizard.advance(patch);
            }
            Err(PxcError::Cancelled) => wizard.cancel(),
            Err(e) => wizard.fail(e.to_string()),
        }
    }

    match wizard.stage() {
        Stage::Success => {
            let d = wizard.draft();
            println!();
            println!(
                "{} VM {} ({}) created on {}",
                style("\u{2713}").green(),
                d.vmid.unwrap_or_default(),
                d.name.as_deref().unwrap_or_default(),
                d.node.as_deref().unwrap_or_default(),
            );
            println!("  Start it with `pxc start {}`", d.vmid.unwrap_or_default());
            Ok(())
        }
        Stage::Cancelled => {
            println!("Cancelled.");
            Ok(())
        }
        Stage::Error(message) => Err(PxcError::backend(message.clone())),
        other => Err(PxcError::backend(format!("wizard stopped at {other:?}"))),
    }
}

// ── stage runners ────────────────────────────────────────

struct Runner<'a, B> {
    backend: &'a B,
    store: &'a SettingsStore,
    topology: &'a ClusterTopology,
    preset: Option<&'a str>,
}

impl<B: Backend> Runner<'_, B> {
    /// Effective defaults for the settled node.
    fn defaults(&self, draft: &Draft) -> Fields {
        self.store.resolve(draft.node.as_deref(), self.preset)
    }

    async fn welcome(&self) -> Result<Draft, PxcError> {
        println!("{}", style("pxc create").bold().cyan());
        println!("Create a new virtual machine. Press Esc at any prompt to cancel.");
        println!();
        if !self.backend.is_available().await {
            return Err(PxcError::backend(
                "Proxmox tools not found (qm is not installed on this host)",
            ));
        }
        Ok(Draft::default())
    }

    async fn identity(&self) -> Result<Draft, PxcError> {
        let suggested = match self.backend.next_vmid().await {
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read next free VM ID");
                None
            }
        };

        let vmid = loop {
            let mut prompt = Text::new("VM ID:").with_validator(check(validate_vmid));
            if let Some(ref id) = suggested {
                prompt = prompt.with_default(id);
            }
            let input = prompt.prompt().map_err(map_inquire_err)?;
            let id = validate_vmid(&input).map_err(|message| PxcError::Validation { message })?;
            if self.backend.vmid_available(id).await? {
                break id;
            }
            println!("{} VM ID {id} is already in use", style("\u{2717}").red());
        };

        let name = Text::new("Name:")
            .with_help_message("letters, digits and hyphens")
            .with_validator(check(validate_name))
            .prompt()
            .map_err(map_inquire_err)?;

        Ok(Draft {
            vmid: Some(vmid),
            name: Some(name.trim().to_string()),
            ..Draft::default()
        })
    }

    fn node_selection(&self) -> Result<Draft, PxcError> {
        let online = self.topology.online_members();
        if online.is_empty() {
            return Err(PxcError::backend("No online cluster nodes available"));
        }

        let seeded = self.store.resolve(None, self.preset).node;
        let initial = initial_node(seeded.as_deref(), &online, &self.topology.local);

        let choices: Vec<Choice<String>> = online
            .iter()
            .map(|m| {
                let mut label = m.name.clone();
                if let Some(addr) = &m.address {
                    label.push_str(&format!(" ({addr})"));
                }
                if m.name == self.topology.local {
                    label.push_str(" [current]");
                }
                Choice {
                    label,
                    value: m.name.clone(),
                }
            })
            .collect();
        let cursor = choices.iter().position(|c| c.value == initial).unwrap_or(0);

        let node = Select::new("Node:", choices)
            .with_starting_cursor(cursor)
            .prompt()
            .map_err(map_inquire_err)?;
        Ok(Draft {
            node: Some(node.value),
            ..Draft::default()
        })
    }

    fn compute(&self, draft: &Draft) -> Result<Draft, PxcError> {
        let defaults = self.defaults(draft);

        let cores = Text::new("CPU cores:")
            .with_default(&defaults.cores.unwrap_or(FALLBACK_CORES).to_string())
            .with_validator(check(validate_cores))
            .prompt()
            .map_err(map_inquire_err)?;
        let memory = Text::new("Memory (MB):")
            .with_default(&defaults.memory_mb.unwrap_or(FALLBACK_MEMORY_MB).to_string())
            .with_help_message("e.g. '2048' or '4G'")
            .with_validator(check(validate_memory))
            .prompt()
            .map_err(map_inquire_err)?;
        let disk = Text::new("Disk (GB):")
            .with_default(&defaults.disk_gb.unwrap_or(FALLBACK_DISK_GB).to_string())
            .with_help_message("e.g. '32' or '1T'")
            .with_validator(check(validate_disk))
            .prompt()
            .map_err(map_inquire_err)?;

        let invalid = |message| PxcError::Validation { message };
        Ok(Draft {
            cores: Some(validate_cores(&cores).map_err(invalid)?),
            memory_mb: Some(validate_memory(&memory).map_err(invalid)?),
            disk_gb: Some(validate_disk(&disk).map_err(invalid)?),
            ..Draft::default()
        })
    }

    async fn storage(&self, draft: &Draft) -> Result<Draft, PxcError> {
        let node = settled_node(draft)?;
        let storages = self.backend.storages(node, StorageContent::Images).await?;
        if storages.is_empty() {
            return Err(PxcError::backend(format!(
                "No storage for VM disks found on {node}"
            )));
        }

        let preferred = self.defaults(draft).vm_storage;
        let cursor = preferred
            .as_deref()
            .and_then(|p| storages.iter().position(|s| s.name == p))
            .unwrap_or(0);
        let choices: Vec<Choice<String>> = storages
            .iter()
            .map(|s| Choice {
                label: storage_label(s),
                value: s.name.clone(),
            })
            .collect();

        let picked = Select::new("Disk storage:", choices)
            .with_starting_cursor(cursor)
            .prompt()
            .map_err(map_inquire_err)?;
        Ok(Draft {
            storage: Some(picked.value),
            ..Draft::default()
        })
    }

    async fn network(&self, draft: &Draft) -> Result<Draft, PxcError> {
        let node = settled_node(draft)?;
        let preferred = self
            .defaults(draft)
            .bridge
            .unwrap_or_else(|| FALLBACK_BRIDGE.to_string());

        let bridges = match self.backend.bridges(node).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(node, error = %e, "cannot list bridges");
                Vec::new()
            }
        };

        let bridge = if bridges.is_empty() {
            Text::new("Network bridge:")
                .with_default(&preferred)
                .with_help_message("no bridges found on this node; enter one manually")
                .with_validator(|input: &str| {
                    Ok(if input.trim().is_empty() {
                        Validation::Invalid("Bridge cannot be empty".into())
                    } else {
                        Validation::Valid
                    })
                })
                .prompt()
                .map_err(map_inquire_err)?
                .trim()
                .to_string()
        } else {
            let cursor = bridges.iter().position(|b| b.name == preferred).unwrap_or(0);
            let choices: Vec<Choice<String>> = bridges
                .iter()
                .map(|b| Choice {
                    label: if b.active {
                        b.name.clone()
                    } else {
                        format!("{} (inactive)", b.name)
                    },
                    value: b.name.clone(),
                })
                .collect();
            Select::new("Network bridge:", choices)
                .with_starting_cursor(cursor)
                .prompt()
                .map_err(map_inquire_err)?
                .value
        };

        Ok(Draft {
            bridge: Some(bridge),
            ..Draft::default()
        })
    }

    async fn iso(&self, draft: &Draft) -> Result<Draft, PxcError> {
        let node = settled_node(draft)?;
        let storages = self.backend.storages(node, StorageContent::Iso).await?;
        let resolved = self.defaults(draft).iso_storage;

        let storage = match pick_iso_storage(resolved.as_deref(), &storages) {
            IsoStorageChoice::Resolved(name) => name,
            IsoStorageChoice::Only(name) => {
                self.remember_iso_storage(&name);
                name
            }
            IsoStorageChoice::Ask => {
                let choices: Vec<Choice<String>> = storages
                    .iter()
                    .map(|s| Choice {
                        label: storage_label(s),
                        value: s.name.clone(),
                    })
                    .collect();
                let name = Select::new("ISO storage:", choices)
                    .prompt()
                    .map_err(map_inquire_err)?
                    .value;
                self.remember_iso_storage(&name);
                name
            }
            IsoStorageChoice::Unavailable => {
                println!("No ISO storage on {node}; continuing without an ISO.");
                return Ok(Draft::default());
            }
        };

        let files = self.backend.iso_files(&storage).await?;
        let mut choices = vec![Choice {
            label: NO_ISO.to_string(),
            value: None,
        }];
        choices.extend(files.into_iter().map(|f| Choice {
            label: f.filename,
            value: Some(f.volid),
        }));

        let picked = Select::new("Boot ISO:", choices)
            .prompt()
            .map_err(map_inquire_err)?;
        Ok(Draft {
            iso_volid: picked.value,
            ..Draft::default()
        })
    }

    fn remember_iso_storage(&self, name: &str) {
        if !self.store.save_preferences() {
            return;
        }
        match self.store.set_default("iso_storage", name) {
            Ok(()) => tracing::info!(storage = name, "saved ISO storage preference"),
            Err(e) => tracing::warn!(error = %e, "cannot save ISO storage preference"),
        }
    }

    fn summary(&self, draft: &Draft) -> Result<Draft, PxcError> {
        let row = |label: &str, value: String| println!("  {:<10} {value}", style(label).dim());
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());

        println!();
        println!("{}", style("Summary").bold());
        row("VM ID", draft.vmid.map(|v| v.to_string()).unwrap_or_default());
        row("Name", or_dash(&draft.name));
        row("Node", or_dash(&draft.node));
        row("Cores", draft.cores.map(|v| v.to_string()).unwrap_or_default());
        row(
            "Memory",
            draft.memory_mb.map(|v| format!("{v} MB")).unwrap_or_default(),
        );
        row(
            "Disk",
            draft.disk_gb.map(|v| format!("{v} GB")).unwrap_or_default(),
        );
        row("Storage", or_dash(&draft.storage));
        row("Bridge", or_dash(&draft.bridge));
        row(
            "ISO",
            draft.iso_volid.clone().unwrap_or_else(|| NO_ISO.into()),
        );
        println!();

        let confirmed = Confirm::new("Create this VM?")
            .with_default(true)
            .prompt()
            .map_err(map_inquire_err)?;
        if !confirmed {
            return Err(PxcError::Cancelled);
        }
        Ok(Draft::default())
    }

    async fn execute(&self, wizard: &Wizard) -> Result<(), PxcError> {
        let spec = wizard
            .submit()
            .ok_or_else(|| PxcError::backend("creation request is incomplete"))?;
        tracing::info!(vmid = spec.vmid, node = %spec.node, "creating VM");

        let mut progress = StepProgress::new(1, OutputMode::detect());
        progress
            .run(
                &format!("Creating VM {} on {}", spec.vmid, spec.node),
                |_| self.backend.create_entity(&spec),
            )
            .await
            .map_err(|e| PxcError::backend(format!("VM creation failed on {}: {e}", spec.node)))
    }
}

fn settled_node(draft: &Draft) -> Result<&str, PxcError> {
    draft
        .node
        .as_deref()
        .ok_or_else(|| PxcError::backend("no target node selected"))
}

// ── error mapping ────────────────────────────────────────

pub(crate) fn map_inquire_err(e: inquire::InquireError) -> PxcError {
    match e {
        inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted => {
            PxcError::Cancelled
        }
        inquire::InquireError::NotTTY => PxcError::NotInteractive {
            command: "this prompt".into(),
        },
        other => PxcError::Validation {
            message: format!("prompt error: {other}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NodeStatus;

    fn storage(name: &str) -> Storage {
        Storage {
            name: name.into(),
            kind: "dir".into(),
            content: vec!["iso".into()],
        }
    }

    #[test]
    fn vmid_bounds() {
        assert_eq!(validate_vmid("100"), Ok(100));
        assert_eq!(validate_vmid(" 999999999 "), Ok(999_999_999));
        assert!(validate_vmid("99").is_err());
        assert!(validate_vmid("1000000000").is_err());
        assert!(validate_vmid("abc").is_err());
    }

    #[test]
    fn names() {
        assert!(validate_name("web-01").is_ok());
        assert!(validate_name("a").is_ok());
        assert!(validate_name(&"a".repeat(63)).is_ok());
        assert!(validate_name(&"a".repeat(64)).is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("-web").is_err());
        assert!(validate_name("web-").is_err());
        assert!(validate_name("web_01").is_err());
        assert!(validate_name("web.example").is_err());
    }

    #[test]
    fn compute_limits() {
        assert_eq!(validate_cores("1"), Ok(1));
        assert_eq!(validate_cores("128"), Ok(128));
        assert!(validate_cores("0").is_err());
        assert!(validate_cores("129").is_err());

        assert_eq!(validate_memory("2048"), Ok(2048));
        assert_eq!(validate_memory("4G"), Ok(4096));
        assert_eq!(validate_memory("16"), Ok(16));
        assert!(validate_memory("15").is_err());
        assert!(validate_memory("lots").is_err());

        assert_eq!(validate_disk("32"), Ok(32));
        assert_eq!(validate_disk("1T"), Ok(1024));
        assert!(validate_disk("0").is_err());
        assert!(validate_disk("65537").is_err());
    }

    #[test]
    fn iso_storage_prefers_resolved_then_single() {
        let two = [storage("local"), storage("cephfs-iso")];
        assert_eq!(
            pick_iso_storage(Some("cephfs-iso"), &two),
            IsoStorageChoice::Resolved("cephfs-iso".into())
        );
        assert_eq!(pick_iso_storage(Some("gone"), &two), IsoStorageChoice::Ask);
        assert_eq!(pick_iso_storage(None, &two), IsoStorageChoice::Ask);

        let one = [storage("local")];
        assert_eq!(
            pick_iso_storage(Some("gone"), &one),
            IsoStorageChoice::Only("local".into())
        );
        assert_eq!(pick_iso_storage(None, &[]), IsoStorageChoice::Unavailable);
    }

    #[test]
    fn node_selection_starts_on_online_seed() {
        let node1 = ClusterNode::new("node1", NodeStatus::Online);
        let node2 = ClusterNode::new("node2", NodeStatus::Online);
        let online = [&node1, &node2];

        assert_eq!(initial_node(Some("node2"), &online, "node1"), "node2");
        // An offline or unknown seed falls back to the local node.
        assert_eq!(initial_node(Some("node3"), &online, "node1"), "node1");
        assert_eq!(initial_node(None, &online, "node1"), "node1");
        // The local node is returned even when it is not listed online.
        assert_eq!(initial_node(None, &[&node2], "node1"), "node1");
        assert_eq!(initial_node(Some("node2"), &[&node2], "node1"), "node2");
    }

    #[test]
    fn cancel_keys_map_to_cancelled() {
        assert!(matches!(
            map_inquire_err(inquire::InquireError::OperationCanceled),
            PxcError::Cancelled
        ));
        assert!(matches!(
            map_inquire_err(inquire::InquireError::OperationInterrupted),
            PxcError::Cancelled
        ));
        assert!(matches!(
            map_inquire_err(inquire::InquireError::NotTTY),
            PxcError::NotInteractive { .. }
        ));
    }
}
