pub mod proxmox;
pub mod simulated;

use std::fmt;
use std::path::Path;

use crate::error::PxcError;

pub use proxmox::ProxmoxBackend;
pub use simulated::SimulatedBackend;

// ── Entities ─────────────────────────────────────────────

/// Whether an id names a full VM (`qm`) or a container (`pct`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Vm,
    Container,
}

impl EntityKind {
    /// Toolkit command that manages this kind.
    pub fn tool(self) -> &'static str {
        match self {
            EntityKind::Vm => "qm",
            EntityKind::Container => "pct",
        }
    }

    /// Resource type name used by the cluster API.
    pub fn resource_type(self) -> &'static str {
        match self {
            EntityKind::Vm => "qemu",
            EntityKind::Container => "lxc",
        }
    }

    pub fn from_resource_type(s: &str) -> Option<Self> {
        match s {
            "qemu" => Some(EntityKind::Vm),
            "lxc" => Some(EntityKind::Container),
            _ => None,
        }
    }

    /// Two-letter tag for tables.
    pub fn short(self) -> &'static str {
        match self {
            EntityKind::Vm => "VM",
            EntityKind::Container => "CT",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Vm => "VM",
            EntityKind::Container => "Container",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    Running,
    Stopped,
    Paused,
}

impl EntityStatus {
    /// Anything the API reports that is not running or paused counts as
    /// stopped.
    pub fn parse(s: &str) -> Self {
        match s {
            "running" => EntityStatus::Running,
            "paused" | "suspended" => EntityStatus::Paused,
            _ => EntityStatus::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Running => "running",
            EntityStatus::Stopped => "stopped",
            EntityStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A VM or container somewhere in the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub id: u32,
    pub name: String,
    pub kind: EntityKind,
    pub node: String,
    pub status: EntityStatus,
    pub cpus: u32,
    pub memory_used: u64,
    pub memory_max: u64,
    pub uptime: u64,
}

impl EntityInfo {
    pub fn is_running(&self) -> bool {
        self.status == EntityStatus::Running
    }
}

/// One disk attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    /// Config slot, e.g. `scsi0` or `rootfs`.
    pub slot: String,
    pub storage: String,
    /// Size as the toolkit prints it (`32G`).
    pub size: String,
    pub used: Option<String>,
}

// ── Cluster ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub name: String,
    pub status: NodeStatus,
    pub address: Option<String>,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            name: name.into(),
            status,
            address: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }
}

/// Content type a storage must accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageContent {
    /// VM disk images.
    Images,
    Iso,
}

impl StorageContent {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageContent::Images => "images",
            StorageContent::Iso => "iso",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub name: String,
    /// Backend type (`lvmthin`, `rbd`, `nfs`, `dir`, ...).
    pub kind: String,
    pub content: Vec<String>,
}

impl Storage {
    /// Network-backed storages visible from every member.
    pub fn is_shared(&self) -> bool {
        matches!(self.kind.as_str(), "nfs" | "rbd" | "cephfs" | "glusterfs")
    }

    pub fn accepts(&self, content: StorageContent) -> bool {
        self.content.iter().any(|c| c == content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoFile {
    pub volid: String,
    pub filename: String,
    pub size: u64,
    pub storage: String,
}

// ── Requests ─────────────────────────────────────────────

/// A fully validated creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    pub vmid: u32,
    pub name: String,
    pub node: String,
    pub cores: u32,
    pub memory_mb: u64,
    pub disk_gb: u64,
    pub storage: String,
    pub bridge: String,
    pub iso_volid: Option<String>,
}

/// Progress of an ISO download as reported by the toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferProgress {
    pub percent: u8,
    pub speed: String,
    pub eta: String,
    pub downloaded_bytes: u64,
    /// Zero when the server did not announce a length.
    pub total_bytes: u64,
}

/// `https://host/path/debian-12.iso?x=1` → `debian-12.iso`
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("download.iso")
        .to_string()
}

/// Volume id an ISO gets on `storage`.
pub fn iso_volid(storage: &str, filename: &str) -> String {
    format!("{storage}:iso/{filename}")
}

// ── Backend trait ────────────────────────────────────────

/// Everything pxc asks of the hypervisor toolkit.
///
/// Failures carry the toolkit's own message; callers pass it through.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait Backend {
    /// Whether the toolkit is installed on this host.
    async fn is_available(&self) -> bool;
    /// Host name of this machine; `localhost` if it cannot be determined.
    async fn local_node(&self) -> String;
    async fn cluster_nodes(&self) -> Result<Vec<ClusterNode>, PxcError>;
    async fn next_vmid(&self) -> Result<u32, PxcError>;
    async fn vmid_available(&self, vmid: u32) -> Result<bool, PxcError>;

    async fn storages(&self, node: &str, content: StorageContent)
    -> Result<Vec<Storage>, PxcError>;
    async fn bridges(&self, node: &str) -> Result<Vec<Bridge>, PxcError>;
    async fn iso_files(&self, storage: &str) -> Result<Vec<IsoFile>, PxcError>;
    /// ISOs on every ISO-capable storage.
    async fn list_isos(&self) -> Result<Vec<IsoFile>, PxcError>;

    async fn create_entity(&self, spec: &CreateSpec) -> Result<(), PxcError>;
    async fn start_entity(&self, id: u32) -> Result<(), PxcError>;
    async fn stop_entity(&self, id: u32, force: bool) -> Result<(), PxcError>;
    async fn destroy_entity(&self, id: u32, kind: EntityKind, purge: bool)
    -> Result<(), PxcError>;

    async fn entity_info(&self, id: u32) -> Result<Option<EntityInfo>, PxcError>;
    async fn entity_disks(&self, id: u32) -> Result<Vec<DiskUsage>, PxcError>;
    async fn list_entities(&self) -> Result<Vec<EntityInfo>, PxcError>;

    /// Fetch `url` onto `storage` on `node`; returns the new volume id.
    async fn download_iso(
        &self,
        node: &str,
        storage: &str,
        url: &str,
        filename: &str,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<String, PxcError>;
    /// Upload a local file; returns the new volume id.
    async fn upload_iso(&self, node: &str, storage: &str, file: &Path)
    -> Result<String, PxcError>;
    async fn delete_iso(&self, volid: &str) -> Result<(), PxcError>;
}
