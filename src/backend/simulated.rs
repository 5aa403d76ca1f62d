//! In-memory stand-in for a three-member cluster.
//!
//! Selected by `--simulate`. Every query is deterministic and every
//! mutating call is recorded so tests can assert what would have been run.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{
    Backend, Bridge, ClusterNode, CreateSpec, DiskUsage, EntityInfo, EntityKind, EntityStatus,
    IsoFile, NodeStatus, Storage, StorageContent, TransferProgress, iso_volid,
};
use crate::error::PxcError;

const GIB: u64 = 1024 * 1024 * 1024;

/// A mutating call issued against the simulated cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(CreateSpec),
    Start(u32),
    Stop { id: u32, force: bool },
    Destroy { id: u32, kind: EntityKind, purge: bool },
    DownloadIso { storage: String, url: String, filename: String },
    UploadIso { storage: String, filename: String },
    DeleteIso(String),
}

#[derive(Debug)]
struct State {
    entities: Vec<EntityInfo>,
    calls: Vec<Call>,
}

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    local: String,
    /// `None` simulates a failing membership query.
    members: Option<Vec<ClusterNode>>,
    fail_destroy: Option<String>,
    step_delay: Duration,
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    pub fn new() -> Self {
        let member = |name: &str, status, ip: &str| ClusterNode {
            name: name.into(),
            status,
            address: Some(ip.into()),
        };
        Self {
            local: "node1".into(),
            members: Some(vec![
                member("node1", NodeStatus::Online, "192.168.1.101"),
                member("node2", NodeStatus::Online, "192.168.1.102"),
                member("node3", NodeStatus::Offline, "192.168.1.103"),
            ]),
            fail_destroy: None,
            step_delay: Duration::ZERO,
            state: Arc::new(Mutex::new(State {
                entities: seed_entities(),
                calls: Vec::new(),
            })),
        }
    }

    /// Replace the cluster membership and local host name.
    pub fn with_topology(mut self, local: &str, members: Vec<ClusterNode>) -> Self {
        self.local = local.into();
        self.members = Some(members);
        self
    }

    /// Make the membership query fail.
    pub fn with_failing_membership(mut self) -> Self {
        self.members = None;
        self
    }

    /// Make `destroy_entity` fail with `message`.
    pub fn with_failing_destroy(mut self, message: &str) -> Self {
        self.fail_destroy = Some(message.into());
        self
    }

    /// Pause between simulated download steps so progress is visible.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Every mutating call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, call: Call) {
        tracing::debug!(?call, "simulated call");
        self.lock().calls.push(call);
    }

    fn find(&self, id: u32) -> Option<EntityInfo> {
        self.lock().entities.iter().find(|e| e.id == id).cloned()
    }

    fn set_status(&self, id: u32, status: EntityStatus) -> Result<EntityInfo, PxcError> {
        let mut state = self.lock();
        let entity = state
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PxcError::backend(format!("VM/container {id} not found")))?;
        entity.status = status;
        if status == EntityStatus::Stopped {
            entity.memory_used = 0;
            entity.uptime = 0;
        }
        Ok(entity.clone())
    }
}

fn seed_entities() -> Vec<EntityInfo> {
    let entity = |id, name: &str, kind, node: &str, status, cpus, used, max, uptime| EntityInfo {
        id,
        name: name.into(),
        kind,
        node: node.into(),
        status,
        cpus,
        memory_used: used,
        memory_max: max,
        uptime,
    };
    use EntityKind::*;
    use EntityStatus::*;
    vec![
        entity(100, "web-server", Vm, "node1", Running, 2, 2 * GIB, 4 * GIB, 86_400),
        entity(101, "db-server", Vm, "node2", Running, 4, 4 * GIB, 8 * GIB, 172_800),
        entity(102, "container-1", Container, "node1", Running, 2, GIB, 2 * GIB, 259_200),
        entity(103, "dev-box", Vm, "node3", Stopped, 2, 0, 2 * GIB, 0),
    ]
}

fn storage(name: &str, kind: &str, content: &[&str]) -> Storage {
    Storage {
        name: name.into(),
        kind: kind.into(),
        content: content.iter().map(|c| c.to_string()).collect(),
    }
}

impl Backend for SimulatedBackend {
    async fn is_available(&self) -> bool {
        true
    }

    async fn local_node(&self) -> String {
        self.local.clone()
    }

    async fn cluster_nodes(&self) -> Result<Vec<ClusterNode>, PxcError> {
        self.members
            .clone()
            .ok_or_else(|| PxcError::backend("Failed to get cluster nodes: connection refused"))
    }

    async fn next_vmid(&self) -> Result<u32, PxcError> {
        let state = self.lock();
        Ok((100..)
            .find(|id| !state.entities.iter().any(|e| e.id == *id))
            .unwrap_or(100))
    }

    async fn vmid_available(&self, vmid: u32) -> Result<bool, PxcError> {
        Ok(self.find(vmid).is_none())
    }

    async fn storages(
        &self,
        node: &str,
        content: StorageContent,
    ) -> Result<Vec<Storage>, PxcError> {
        let all = match (content, node) {
            (StorageContent::Images, "node2") => vec![
                storage("local-lvm", "lvmthin", &["images"]),
                storage("ceph-pool", "rbd", &["images"]),
                storage("shared-storage", "nfs", &["images", "iso"]),
            ],
            (StorageContent::Images, _) => vec![
                storage("local-lvm", "lvmthin", &["images"]),
                storage("ceph-pool", "rbd", &["images"]),
                storage("nfs-storage", "nfs", &["images", "iso"]),
            ],
            (StorageContent::Iso, "node2") => vec![
                storage("local", "dir", &["iso", "images"]),
                storage("shared-iso", "nfs", &["iso"]),
            ],
            (StorageContent::Iso, _) => vec![
                storage("local", "dir", &["iso", "images"]),
                storage("nfs-iso", "nfs", &["iso"]),
            ],
        };
        Ok(all)
    }

    async fn bridges(&self, node: &str) -> Result<Vec<Bridge>, PxcError> {
        let second = if node == "node2" { "vmbr2" } else { "vmbr1" };
        Ok(vec![
            Bridge {
                name: "vmbr0".into(),
                active: true,
            },
            Bridge {
                name: second.into(),
                active: true,
            },
        ])
    }

    async fn iso_files(&self, storage: &str) -> Result<Vec<IsoFile>, PxcError> {
        Ok([
            ("alpine-3.18.iso", 157_286_400),
            ("debian-12.iso", 629_145_600),
            ("ubuntu-24.04.iso", 5_771_362_304),
        ]
        .into_iter()
        .map(|(filename, size)| IsoFile {
            volid: iso_volid(storage, filename),
            filename: filename.into(),
            size,
            storage: storage.into(),
        })
        .collect())
    }

    async fn list_isos(&self) -> Result<Vec<IsoFile>, PxcError> {
        let iso = |storage: &str, filename: &str, size| IsoFile {
            volid: iso_volid(storage, filename),
            filename: filename.into(),
            size,
            storage: storage.into(),
        };
        Ok(vec![
            iso("local", "debian-12.iso", 629_145_600),
            iso("cephfs-iso", "ubuntu-24.04.iso", 5_771_362_304),
            iso("local", "alpine-3.18.iso", 157_286_400),
        ])
    }

    async fn create_entity(&self, spec: &CreateSpec) -> Result<(), PxcError> {
        let online = self
            .members
            .iter()
            .flatten()
            .any(|m| m.name == spec.node && m.is_online())
            || spec.node == self.local;
        if !online {
            return Err(PxcError::backend(format!(
                "node '{}' is offline",
                spec.node
            )));
        }
        if self.find(spec.vmid).is_some() {
            return Err(PxcError::backend(format!(
                "VM {} already exists",
                spec.vmid
            )));
        }

        self.record(Call::Create(spec.clone()));
        self.lock().entities.push(EntityInfo {
            id: spec.vmid,
            name: spec.name.clone(),
            kind: EntityKind::Vm,
            node: spec.node.clone(),
            status: EntityStatus::Stopped,
            cpus: spec.cores,
            memory_used: 0,
            memory_max: spec.memory_mb * 1024 * 1024,
            uptime: 0,
        });
        Ok(())
    }

    async fn start_entity(&self, id: u32) -> Result<(), PxcError> {
        self.set_status(id, EntityStatus::Running)?;
        self.record(Call::Start(id));
        Ok(())
    }

    async fn stop_entity(&self, id: u32, force: bool) -> Result<(), PxcError> {
        self.set_status(id, EntityStatus::Stopped)?;
        self.record(Call::Stop { id, force });
        Ok(())
    }

    async fn destroy_entity(
        &self,
        id: u32,
        kind: EntityKind,
        purge: bool,
    ) -> Result<(), PxcError> {
        self.record(Call::Destroy { id, kind, purge });
        if let Some(message) = &self.fail_destroy {
            return Err(PxcError::backend(format!(
                "Failed to delete {kind} {id}: {message}"
            )));
        }
        let mut state = self.lock();
        let before = state.entities.len();
        state.entities.retain(|e| e.id != id);
        if state.entities.len() == before {
            return Err(PxcError::backend(format!("{kind} {id} not found")));
        }
        Ok(())
    }

    async fn entity_info(&self, id: u32) -> Result<Option<EntityInfo>, PxcError> {
        Ok(self.find(id))
    }

    async fn entity_disks(&self, id: u32) -> Result<Vec<DiskUsage>, PxcError> {
        let disk = |slot: &str, storage: &str, size: &str, used: &str| DiskUsage {
            slot: slot.into(),
            storage: storage.into(),
            size: size.into(),
            used: Some(used.into()),
        };
        Ok(match id {
            100 => vec![disk("scsi0", "local-lvm", "32G", "18G")],
            101 => vec![
                disk("scsi0", "ceph-pool", "64G", "41G"),
                disk("scsi1", "ceph-pool", "200G", "120G"),
            ],
            102 => vec![disk("rootfs", "local-lvm", "8G", "3G")],
            103 => vec![disk("scsi0", "local-lvm", "20G", "6G")],
            _ => Vec::new(),
        })
    }

    async fn list_entities(&self) -> Result<Vec<EntityInfo>, PxcError> {
        Ok(self.lock().entities.clone())
    }

    async fn download_iso(
        &self,
        _node: &str,
        storage: &str,
        url: &str,
        filename: &str,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<String, PxcError> {
        self.record(Call::DownloadIso {
            storage: storage.into(),
            url: url.into(),
            filename: filename.into(),
        });

        let total = 256 * 1024 * 1024;
        for percent in (0..=100u8).step_by(5) {
            on_progress(TransferProgress {
                percent,
                speed: "15.2M".into(),
                eta: format!("{}s", (100 - u32::from(percent)).div_ceil(10)),
                downloaded_bytes: total * u64::from(percent) / 100,
                total_bytes: total,
            });
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
        }

        Ok(iso_volid(storage, filename))
    }

    async fn upload_iso(
        &self,
        _node: &str,
        storage: &str,
        file: &Path,
    ) -> Result<String, PxcError> {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.iso".into());
        self.record(Call::UploadIso {
            storage: storage.into(),
            filename: filename.clone(),
        });
        Ok(iso_volid(storage, &filename))
    }

    async fn delete_iso(&self, volid: &str) -> Result<(), PxcError> {
        self.record(Call::DeleteIso(volid.into()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_cluster() {
        let backend = SimulatedBackend::new();
        assert_eq!(backend.local_node().await, "node1");
        assert_eq!(backend.cluster_nodes().await.unwrap().len(), 3);
        assert_eq!(backend.list_entities().await.unwrap().len(), 4);
        assert_eq!(backend.next_vmid().await.unwrap(), 104);
        assert!(!backend.vmid_available(100).await.unwrap());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn stop_then_destroy_is_recorded() {
        let backend = SimulatedBackend::new();
        backend.stop_entity(100, false).await.unwrap();
        assert!(!backend.entity_info(100).await.unwrap().unwrap().is_running());

        backend.destroy_entity(100, EntityKind::Vm, true).await.unwrap();
        assert!(backend.entity_info(100).await.unwrap().is_none());
        assert_eq!(
            backend.calls(),
            vec![
                Call::Stop { id: 100, force: false },
                Call::Destroy {
                    id: 100,
                    kind: EntityKind::Vm,
                    purge: true
                },
            ]
        );
    }

    #[tokio::test]
    async fn clones_share_state() {
        let backend = SimulatedBackend::new();
        let other = backend.clone();
        other.start_entity(103).await.unwrap();
        assert!(backend.entity_info(103).await.unwrap().unwrap().is_running());
        assert_eq!(backend.calls(), vec![Call::Start(103)]);
    }

    #[tokio::test]
    async fn create_on_offline_node_fails() {
        let backend = SimulatedBackend::new();
        let spec = CreateSpec {
            vmid: 200,
            name: "test".into(),
            node: "node3".into(),
            cores: 2,
            memory_mb: 2048,
            disk_gb: 20,
            storage: "local-lvm".into(),
            bridge: "vmbr0".into(),
            iso_volid: None,
        };
        let err = backend.create_entity(&spec).await.unwrap_err();
        assert!(err.to_string().contains("offline"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn download_reports_progress_to_completion() {
        let backend = SimulatedBackend::new();
        let mut seen = Vec::new();
        let volid = backend
            .download_iso("node1", "local", "https://x/y.iso", "y.iso", &mut |p| {
                seen.push(p.percent)
            })
            .await
            .unwrap();
        assert_eq!(volid, "local:iso/y.iso");
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
    }
}
