//! Backend that shells out to the Proxmox toolkit (`pvesh`, `qm`, `pct`,
//! `pvesm`) on the local host.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::{
    Backend, Bridge, ClusterNode, CreateSpec, DiskUsage, EntityInfo, EntityKind, EntityStatus,
    IsoFile, NodeStatus, Storage, StorageContent, TransferProgress, iso_volid,
};
use crate::error::PxcError;

pub struct ProxmoxBackend;

// ── Command helpers ──────────────────────────────────────

/// Run a toolkit command to completion and return its stdout.
async fn run(program: &str, args: &[&str]) -> Result<String, PxcError> {
    tracing::debug!(program, ?args, "running toolkit command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| PxcError::Io {
            context: format!("running {program}"),
            source: e,
        })?;

    if !output.status.success() {
        return Err(PxcError::ExternalCommand {
            command: command_label(program, args),
            message: failure_message(&output.stderr, &output.stdout),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `pvesh get <path> ... --output-format json`, decoded.
async fn pvesh_get<T: DeserializeOwned>(path: &str, extra: &[&str]) -> Result<T, PxcError> {
    let mut args = vec!["get", path];
    args.extend_from_slice(extra);
    args.extend_from_slice(&["--output-format", "json"]);
    let stdout = run("pvesh", &args).await?;
    serde_json::from_str(&stdout).map_err(|e| {
        PxcError::backend(format!("unexpected output from pvesh get {path}: {e}"))
    })
}

fn command_label(program: &str, args: &[&str]) -> String {
    match args.first() {
        Some(sub) => format!("{program} {sub}"),
        None => program.to_string(),
    }
}

fn failure_message(stderr: &[u8], stdout: &[u8]) -> String {
    let err = String::from_utf8_lossy(stderr).trim().to_string();
    if !err.is_empty() {
        return err;
    }
    let out = String::from_utf8_lossy(stdout).trim().to_string();
    if out.is_empty() {
        "exited with an error".into()
    } else {
        out
    }
}

// ── API records ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NodeRecord {
    node: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    ip: Option<String>,
}

impl From<NodeRecord> for ClusterNode {
    fn from(r: NodeRecord) -> Self {
        ClusterNode {
            name: r.node,
            status: match r.status.as_deref() {
                Some("online") => NodeStatus::Online,
                _ => NodeStatus::Offline,
            },
            address: r.ip,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResourceRecord {
    vmid: u32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    node: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    mem: Option<u64>,
    #[serde(default)]
    maxmem: Option<u64>,
    #[serde(default)]
    maxcpu: Option<f64>,
    #[serde(default)]
    uptime: Option<u64>,
}

impl ResourceRecord {
    fn into_entity(self) -> Option<EntityInfo> {
        let kind = EntityKind::from_resource_type(&self.kind)?;
        Some(EntityInfo {
            id: self.vmid,
            name: self.name.unwrap_or_else(|| format!("VM {}", self.vmid)),
            kind,
            node: self.node,
            status: EntityStatus::parse(&self.status),
            cpus: self.maxcpu.unwrap_or(0.0) as u32,
            memory_used: self.mem.unwrap_or(0),
            memory_max: self.maxmem.unwrap_or(0),
            uptime: self.uptime.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StorageRecord {
    storage: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: String,
}

impl From<StorageRecord> for Storage {
    fn from(r: StorageRecord) -> Self {
        Storage {
            name: r.storage,
            kind: r.kind,
            content: r
                .content
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InterfaceRecord {
    iface: String,
    #[serde(default)]
    active: Option<serde_json::Value>,
}

impl From<InterfaceRecord> for Bridge {
    fn from(r: InterfaceRecord) -> Self {
        let active = match r.active {
            Some(serde_json::Value::Bool(b)) => b,
            Some(serde_json::Value::Number(n)) => n.as_u64() == Some(1),
            _ => false,
        };
        Bridge {
            name: r.iface,
            active,
        }
    }
}

// ── Output parsers ───────────────────────────────────────

/// Parse `pvesm list <storage>` output (`Volid Format Type Size [VMID]`).
fn parse_pvesm_list(storage: &str, stdout: &str) -> Vec<IsoFile> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let volid = cols.next()?;
            if !volid.ends_with(".iso") {
                return None;
            }
            let size = cols.nth(2).and_then(|s| s.parse().ok()).unwrap_or(0);
            Some(IsoFile {
                volid: volid.to_string(),
                filename: volid.rsplit('/').next().unwrap_or(volid).to_string(),
                size,
                storage: storage.to_string(),
            })
        })
        .collect()
}

/// Disk lines from `qm config` / `pct config`, e.g.
/// `scsi0: local-lvm:vm-100-disk-0,size=32G`. CD-ROM drives are skipped.
fn parse_disk_config(stdout: &str) -> Vec<DiskUsage> {
    stdout
        .lines()
        .filter_map(|line| {
            let (slot, value) = line.trim().split_once(':')?;
            let is_disk_slot = slot == "rootfs"
                || slot.starts_with("mp")
                || ["scsi", "virtio", "sata", "ide"]
                    .iter()
                    .any(|p| slot.strip_prefix(p).is_some_and(|n| n.parse::<u32>().is_ok()));
            if !is_disk_slot || value.contains("media=cdrom") {
                return None;
            }
            let value = value.trim();
            let storage = value.split([':', ',']).next()?.to_string();
            let size = value
                .split(',')
                .find_map(|opt| opt.strip_prefix("size="))
                .unwrap_or("unknown")
                .to_string();
            Some(DiskUsage {
                slot: slot.to_string(),
                storage,
                size,
                used: None,
            })
        })
        .collect()
}

/// Extract progress from a wget-style line such as
/// `32768K ........ ........ 26% 22.2M 8s`.
pub fn parse_wget_progress(line: &str, total_bytes: u64) -> Option<TransferProgress> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let pos = tokens.iter().position(|t| {
        t.strip_suffix('%')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    })?;
    let percent: u8 = tokens[pos].trim_end_matches('%').parse().ok()?;
    let speed = tokens.get(pos + 1)?;
    let eta = tokens.get(pos + 2).copied().unwrap_or("");

    let looks_like_speed = speed
        .trim_end_matches("/s")
        .trim_end_matches(['K', 'M', 'G'])
        .parse::<f64>()
        .is_ok();
    if !looks_like_speed {
        return None;
    }

    Some(TransferProgress {
        percent: percent.min(100),
        speed: speed.to_string(),
        eta: eta.to_string(),
        downloaded_bytes: total_bytes * u64::from(percent.min(100)) / 100,
        total_bytes,
    })
}

/// `Length: 657457152 (627M) [application/x-iso9660-image]` → `657457152`
fn parse_wget_length(line: &str) -> Option<u64> {
    let rest = line.trim().strip_prefix("Length:")?;
    rest.split_whitespace().next()?.parse().ok()
}

// ── Backend impl ─────────────────────────────────────────

impl ProxmoxBackend {
    async fn require_entity(&self, id: u32) -> Result<EntityInfo, PxcError> {
        self.entity_info(id)
            .await?
            .ok_or_else(|| PxcError::backend(format!("VM/container {id} not found")))
    }
}

impl Backend for ProxmoxBackend {
    async fn is_available(&self) -> bool {
        Command::new("which")
            .arg("qm")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn local_node(&self) -> String {
        match run("hostname", &[]).await {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            Ok(_) => "localhost".into(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot determine host name");
                "localhost".into()
            }
        }
    }

    async fn cluster_nodes(&self) -> Result<Vec<ClusterNode>, PxcError> {
        let records: Vec<NodeRecord> = pvesh_get("/nodes", &[]).await?;
        Ok(records.into_iter().map(ClusterNode::from).collect())
    }

    async fn next_vmid(&self) -> Result<u32, PxcError> {
        let out = run("pvesh", &["get", "/cluster/nextid"]).await?;
        out.trim()
            .trim_matches('"')
            .parse()
            .map_err(|_| PxcError::backend(format!("unexpected next id: '{}'", out.trim())))
    }

    async fn vmid_available(&self, vmid: u32) -> Result<bool, PxcError> {
        Ok(self.entity_info(vmid).await?.is_none())
    }

    async fn storages(
        &self,
        node: &str,
        content: StorageContent,
    ) -> Result<Vec<Storage>, PxcError> {
        let path = format!("/nodes/{node}/storage");
        let records: Vec<StorageRecord> =
            pvesh_get(&path, &["--content", content.as_str()]).await?;
        Ok(records
            .into_iter()
            .map(Storage::from)
            .filter(|s| s.accepts(content))
            .collect())
    }

    async fn bridges(&self, node: &str) -> Result<Vec<Bridge>, PxcError> {
        let path = format!("/nodes/{node}/network");
        let records: Vec<InterfaceRecord> = pvesh_get(&path, &["--type", "bridge"]).await?;
        Ok(records.into_iter().map(Bridge::from).collect())
    }

    async fn iso_files(&self, storage: &str) -> Result<Vec<IsoFile>, PxcError> {
        let out = run("pvesm", &["list", storage, "--content", "iso"]).await?;
        Ok(parse_pvesm_list(storage, &out))
    }

    async fn list_isos(&self) -> Result<Vec<IsoFile>, PxcError> {
        let node = self.local_node().await;
        let mut all = Vec::new();
        for storage in self.storages(&node, StorageContent::Iso).await? {
            match self.iso_files(&storage.name).await {
                Ok(isos) => all.extend(isos),
                Err(e) => tracing::warn!(storage = %storage.name, error = %e, "skipping storage"),
            }
        }
        Ok(all)
    }

    async fn create_entity(&self, spec: &CreateSpec) -> Result<(), PxcError> {
        // Created through the node's API path so the VM lands on the
        // selected member, not necessarily this host.
        let path = format!("/nodes/{}/qemu", spec.node);
        let vmid = spec.vmid.to_string();
        let cores = spec.cores.to_string();
        let memory = spec.memory_mb.to_string();
        let net0 = format!("virtio,bridge={}", spec.bridge);
        let scsi0 = format!("{}:{}", spec.storage, spec.disk_gb);
        let mut args: Vec<&str> = vec![
            "create", &path, "--vmid", &vmid, "--name", &spec.name, "--cores", &cores,
            "--memory", &memory, "--net0", &net0, "--scsi0", &scsi0, "--boot", "order=scsi0",
        ];
        let ide2;
        if let Some(iso) = &spec.iso_volid {
            ide2 = format!("{iso},media=cdrom");
            args.extend_from_slice(&["--ide2", &ide2]);
        }

        run("pvesh", &args).await?;
        tracing::info!(vmid = spec.vmid, node = %spec.node, name = %spec.name, "created VM");
        Ok(())
    }

    async fn start_entity(&self, id: u32) -> Result<(), PxcError> {
        let info = self.require_entity(id).await?;
        let vmid = id.to_string();
        run(info.kind.tool(), &["start", &vmid])
            .await
            .map_err(|e| PxcError::backend(format!("Failed to start {} {id}: {e}", info.kind)))?;
        tracing::info!(id, kind = %info.kind, "started");
        Ok(())
    }

    async fn stop_entity(&self, id: u32, force: bool) -> Result<(), PxcError> {
        let info = self.require_entity(id).await?;
        let vmid = id.to_string();
        let mut args = vec!["stop", vmid.as_str()];
        if force && info.kind == EntityKind::Vm {
            args.push("--skiplock");
        }
        run(info.kind.tool(), &args)
            .await
            .map_err(|e| PxcError::backend(format!("Failed to stop {} {id}: {e}", info.kind)))?;
        tracing::info!(id, kind = %info.kind, force, "stopped");
        Ok(())
    }

    async fn destroy_entity(
        &self,
        id: u32,
        kind: EntityKind,
        purge: bool,
    ) -> Result<(), PxcError> {
        let vmid = id.to_string();
        let mut args = vec!["destroy", vmid.as_str()];
        if purge {
            args.push("--purge");
        }
        run(kind.tool(), &args)
            .await
            .map_err(|e| PxcError::backend(format!("Failed to delete {kind} {id}: {e}")))?;
        tracing::info!(id, %kind, purge, "destroyed");
        Ok(())
    }

    async fn entity_info(&self, id: u32) -> Result<Option<EntityInfo>, PxcError> {
        Ok(self.list_entities().await?.into_iter().find(|e| e.id == id))
    }

    async fn entity_disks(&self, id: u32) -> Result<Vec<DiskUsage>, PxcError> {
        let info = self.require_entity(id).await?;
        let vmid = id.to_string();
        let out = run(info.kind.tool(), &["config", &vmid]).await?;
        Ok(parse_disk_config(&out))
    }

    async fn list_entities(&self) -> Result<Vec<EntityInfo>, PxcError> {
        let records: Vec<ResourceRecord> =
            pvesh_get("/cluster/resources", &["--type", "vm"]).await?;
        Ok(records
            .into_iter()
            .filter_map(ResourceRecord::into_entity)
            .collect())
    }

    async fn download_iso(
        &self,
        node: &str,
        storage: &str,
        url: &str,
        filename: &str,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<String, PxcError> {
        let path = format!("/nodes/{node}/storage/{storage}/download-url");
        tracing::info!(url, node, storage, filename, "downloading ISO");

        let mut child = Command::new("pvesh")
            .args(["create", path.as_str(), "--url", url, "--content", "iso"])
            .args(["--filename", filename])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PxcError::Io {
                context: "running pvesh".into(),
                source: e,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let read_progress = async {
            let Some(stdout) = stdout else { return };
            let mut lines = BufReader::new(stdout).lines();
            let mut total = 0;
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(len) = parse_wget_length(&line) {
                    total = len;
                } else if let Some(progress) = parse_wget_progress(&line, total) {
                    on_progress(progress);
                }
            }
        };
        let read_errors = async {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        };
        let ((), err_text) = tokio::join!(read_progress, read_errors);

        let status = child.wait().await.map_err(|e| PxcError::Io {
            context: "waiting for pvesh".into(),
            source: e,
        })?;
        if !status.success() {
            return Err(PxcError::backend(format!(
                "Failed to download ISO: {}",
                failure_message(err_text.as_bytes(), &[])
            )));
        }

        Ok(iso_volid(storage, filename))
    }

    async fn upload_iso(
        &self,
        node: &str,
        storage: &str,
        file: &Path,
    ) -> Result<String, PxcError> {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.iso".into());
        let path = format!("/nodes/{node}/storage/{storage}/upload");
        let local = file.to_string_lossy();

        run(
            "pvesh",
            &["create", &path, "--content", "iso", "--filename", &local],
        )
        .await
        .map_err(|e| PxcError::backend(format!("Failed to upload ISO: {e}")))?;

        tracing::info!(file = %file.display(), storage, "uploaded ISO");
        Ok(iso_volid(storage, &filename))
    }

    async fn delete_iso(&self, volid: &str) -> Result<(), PxcError> {
        run("pvesm", &["free", volid])
            .await
            .map_err(|e| PxcError::backend(format!("Failed to delete ISO: {e}")))?;
        tracing::info!(volid, "deleted ISO");
        Ok(())
    }
}
