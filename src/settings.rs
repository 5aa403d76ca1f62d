//! Layered settings document and its on-disk store.
//!
//! The document has three parameter layers (global `defaults`, named
//! `presets`, per-node `nodes` overrides) plus UI and delete-safety flags.
//! Every parameter is optional: an absent field inherits from the layer
//! below it (see [`crate::resolver`]).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PxcError;
use crate::paths;

/// Grace period applied when the document does not set one.
pub const DEFAULT_GRACE_SECONDS: u32 = 5;

// ── Document model ────────────────────────────────────────

/// One layer of creation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl Fields {
    pub fn is_empty(&self) -> bool {
        *self == Fields::default()
    }

    /// Copy every field that `upper` defines over this layer.
    pub fn overlay(&mut self, upper: &Fields) {
        if let Some(v) = upper.cores {
            self.cores = Some(v);
        }
        if let Some(v) = upper.memory_mb {
            self.memory_mb = Some(v);
        }
        if let Some(v) = upper.disk_gb {
            self.disk_gb = Some(v);
        }
        if let Some(v) = &upper.bridge {
            self.bridge = Some(v.clone());
        }
        if let Some(v) = &upper.iso_storage {
            self.iso_storage = Some(v.clone());
        }
        if let Some(v) = &upper.vm_storage {
            self.vm_storage = Some(v.clone());
        }
        if let Some(v) = &upper.node {
            self.node = Some(v.clone());
        }
    }

    pub fn get(&self, key: FieldKey) -> Option<String> {
        match key {
            FieldKey::Cores => self.cores.map(|v| v.to_string()),
            FieldKey::MemoryMb => self.memory_mb.map(|v| v.to_string()),
            FieldKey::DiskGb => self.disk_gb.map(|v| v.to_string()),
            FieldKey::Bridge => self.bridge.clone(),
            FieldKey::IsoStorage => self.iso_storage.clone(),
            FieldKey::VmStorage => self.vm_storage.clone(),
            FieldKey::Node => self.node.clone(),
        }
    }

    /// Set one field from its textual form. Numeric fields must parse as
    /// positive integers.
    pub fn set(&mut self, key: FieldKey, value: &str) -> Result<(), PxcError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PxcError::InvalidValue {
                key: key.to_string(),
                message: "value cannot be empty".into(),
            });
        }
        match key {
            FieldKey::Cores => self.cores = Some(parse_positive(key, value)?),
            FieldKey::MemoryMb => self.memory_mb = Some(parse_positive(key, value)?),
            FieldKey::DiskGb => self.disk_gb = Some(parse_positive(key, value)?),
            FieldKey::Bridge => self.bridge = Some(value.to_string()),
            FieldKey::IsoStorage => self.iso_storage = Some(value.to_string()),
            FieldKey::VmStorage => self.vm_storage = Some(value.to_string()),
            FieldKey::Node => self.node = Some(value.to_string()),
        }
        Ok(())
    }
}

fn parse_positive<T>(key: FieldKey, value: &str) -> Result<T, PxcError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(PxcError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a positive integer (got '{value}')"),
        }),
    }
}

/// Global defaults: a parameter layer plus the name of the default preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl Defaults {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.package.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_preferences: Option<bool>,
}

impl UiSettings {
    pub fn is_empty(&self) -> bool {
        self.save_preferences.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_enabled: Option<bool>,
}

impl DeleteSettings {
    pub fn is_empty(&self) -> bool {
        *self == DeleteSettings::default()
    }
}

/// The whole settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDocument {
    #[serde(skip_serializing_if = "Defaults::is_empty")]
    pub defaults: Defaults,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub presets: BTreeMap<String, Fields>,
    #[serde(rename = "nodes", skip_serializing_if = "BTreeMap::is_empty")]
    pub node_overrides: BTreeMap<String, Fields>,
    #[serde(skip_serializing_if = "UiSettings::is_empty")]
    pub ui: UiSettings,
    #[serde(skip_serializing_if = "DeleteSettings::is_empty")]
    pub delete: DeleteSettings,
}

impl SettingsDocument {
    pub fn is_empty(&self) -> bool {
        *self == SettingsDocument::default()
    }

    pub fn to_toml(&self) -> Result<String, PxcError> {
        toml::to_string_pretty(self).map_err(|e| PxcError::Validation {
            message: format!("cannot encode settings: {e}"),
        })
    }
}

/// How long the delete flow waits before destroying, and whether it waits
/// at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    pub seconds: u32,
    pub enabled: bool,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_GRACE_SECONDS,
            enabled: true,
        }
    }
}

// ── Field keys ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Cores,
    MemoryMb,
    DiskGb,
    Bridge,
    IsoStorage,
    VmStorage,
    Node,
}

impl FieldKey {
    pub const ALL: [FieldKey; 7] = [
        FieldKey::Cores,
        FieldKey::MemoryMb,
        FieldKey::DiskGb,
        FieldKey::Bridge,
        FieldKey::IsoStorage,
        FieldKey::VmStorage,
        FieldKey::Node,
    ];

    /// Keys a node override may set. `node` is meaningless inside a node's
    /// own override.
    pub const NODE_OVERRIDE: [FieldKey; 6] = [
        FieldKey::Cores,
        FieldKey::MemoryMb,
        FieldKey::DiskGb,
        FieldKey::Bridge,
        FieldKey::IsoStorage,
        FieldKey::VmStorage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Cores => "cores",
            FieldKey::MemoryMb => "memory_mb",
            FieldKey::DiskGb => "disk_gb",
            FieldKey::Bridge => "bridge",
            FieldKey::IsoStorage => "iso_storage",
            FieldKey::VmStorage => "vm_storage",
            FieldKey::Node => "node",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = ();

    /// Accepts the TOML key plus the short and camelCase spellings the old
    /// tool used (`memory`, `isoStorage`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cores" => Ok(FieldKey::Cores),
            "memory_mb" | "memory" | "memoryMb" => Ok(FieldKey::MemoryMb),
            "disk_gb" | "disk" | "diskGb" => Ok(FieldKey::DiskGb),
            "bridge" => Ok(FieldKey::Bridge),
            "iso_storage" | "isoStorage" => Ok(FieldKey::IsoStorage),
            "vm_storage" | "vmStorage" => Ok(FieldKey::VmStorage),
            "node" => Ok(FieldKey::Node),
            _ => Err(()),
        }
    }
}

fn key_list(keys: &[FieldKey]) -> String {
    keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

// ── Legacy format ─────────────────────────────────────────

/// The JSON file written by the old `pve-cli` tool. Only the ISO storage
/// preference carried over.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacySettings {
    #[serde(rename = "isoStorage")]
    iso_storage: Option<String>,
}

impl From<LegacySettings> for SettingsDocument {
    fn from(legacy: LegacySettings) -> Self {
        let mut doc = SettingsDocument::default();
        doc.defaults.fields.iso_storage = legacy.iso_storage;
        doc.ui.save_preferences = Some(true);
        doc
    }
}

// ── Store ─────────────────────────────────────────────────

/// Handle to the on-disk settings document.
///
/// The document is re-read on every access and rewritten whole on every
/// change. There is no locking: two concurrent writers race and the last
/// rename wins. Readers never see a torn file because writes go through a
/// temporary sibling that is renamed into place.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    legacy_path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, legacy_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path: legacy_path.into(),
        }
    }

    /// Store at the per-user location (honours `PXC_CONFIG_DIR`).
    pub fn open_default() -> Self {
        Self::new(paths::settings_path(), paths::legacy_settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, treating a missing or unreadable file as empty.
    pub fn load(&self) -> SettingsDocument {
        match self.load_strict() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable settings");
                SettingsDocument::default()
            }
        }
    }

    /// Read the document, reporting a malformed file instead of hiding it.
    /// Writers go through this so a hand-edited typo is not silently wiped.
    pub fn load_strict(&self) -> Result<SettingsDocument, PxcError> {
        if !self.path.exists() {
            return Ok(self.migrate_legacy().unwrap_or_default());
        }

        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| PxcError::SettingsRead {
                path: self.path.display().to_string(),
                source,
            })?;

        toml::from_str(&contents).map_err(|e| PxcError::SettingsParse {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Rewrite the whole document.
    pub fn save(&self, doc: &SettingsDocument) -> Result<(), PxcError> {
        let write_err = |source| PxcError::SettingsWrite {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let contents = doc.to_toml()?;
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, contents).map_err(write_err)?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_err(e));
        }

        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Translate the legacy JSON file into a fresh document and persist it.
    /// Only called while the current-format file is absent, so it runs at
    /// most once. Failures are logged and ignored.
    fn migrate_legacy(&self) -> Option<SettingsDocument> {
        if !self.legacy_path.exists() {
            return None;
        }

        let contents = match std::fs::read_to_string(&self.legacy_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %self.legacy_path.display(), error = %e, "cannot read legacy settings");
                return None;
            }
        };
        let legacy: LegacySettings = match serde_json::from_str(&contents) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %self.legacy_path.display(), error = %e, "cannot parse legacy settings");
                return None;
            }
        };

        let doc = SettingsDocument::from(legacy);
        match self.save(&doc) {
            Ok(()) => tracing::info!(
                from = %self.legacy_path.display(),
                to = %self.path.display(),
                "migrated legacy settings"
            ),
            Err(e) => tracing::warn!(error = %e, "failed to persist migrated settings"),
        }
        Some(doc)
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut SettingsDocument) -> Result<T, PxcError>,
    ) -> Result<T, PxcError> {
        let mut doc = self.load_strict()?;
        let out = f(&mut doc)?;
        self.save(&doc)?;
        Ok(out)
    }

    // ── defaults ──

    /// Read one global default. `package` names the default preset.
    pub fn get_default(&self, key: &str) -> Result<Option<String>, PxcError> {
        let doc = self.load();
        if key == "package" {
            return Ok(doc.defaults.package);
        }
        let key = parse_default_key(key)?;
        Ok(doc.defaults.fields.get(key))
    }

    pub fn set_default(&self, key: &str, value: &str) -> Result<(), PxcError> {
        if key == "package" {
            let value = value.trim().to_string();
            return self.update(|doc| {
                doc.defaults.package = Some(value);
                Ok(())
            });
        }
        let key = parse_default_key(key)?;
        self.update(|doc| doc.defaults.fields.set(key, value))
    }

    // ── presets ──

    pub fn presets(&self) -> BTreeMap<String, Fields> {
        self.load().presets
    }

    pub fn get_preset(&self, name: &str) -> Option<Fields> {
        self.load().presets.remove(name)
    }

    pub fn set_preset(&self, name: &str, fields: Fields) -> Result<(), PxcError> {
        if name.trim().is_empty() {
            return Err(PxcError::Validation {
                message: "preset name cannot be empty".into(),
            });
        }
        self.update(|doc| {
            doc.presets.insert(name.to_string(), fields);
            Ok(())
        })
    }

    /// Remove a preset. Returns `false` (and writes nothing) if it did not exist.
    pub fn delete_preset(&self, name: &str) -> Result<bool, PxcError> {
        let mut doc = self.load_strict()?;
        if doc.presets.remove(name).is_none() {
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }

    // ── node overrides ──

    pub fn set_node_override(&self, node: &str, key: &str, value: &str) -> Result<(), PxcError> {
        let field = key
            .parse::<FieldKey>()
            .ok()
            .filter(|k| FieldKey::NODE_OVERRIDE.contains(k))
            .ok_or_else(|| PxcError::InvalidKey {
                key: key.to_string(),
                valid: key_list(&FieldKey::NODE_OVERRIDE),
            })?;

        self.update(|doc| {
            doc.node_overrides
                .entry(node.to_string())
                .or_default()
                .set(field, value)
        })
    }

    // ── flags ──

    /// Whether interactive choices (e.g. ISO storage) are remembered.
    /// On unless explicitly disabled.
    pub fn save_preferences(&self) -> bool {
        self.load().ui.save_preferences != Some(false)
    }

    pub fn grace_policy(&self) -> GracePolicy {
        let delete = self.load().delete;
        let seconds = delete.grace_period_seconds.unwrap_or(DEFAULT_GRACE_SECONDS);
        GracePolicy {
            seconds,
            enabled: delete.grace_period_enabled != Some(false) && seconds > 0,
        }
    }
}

fn parse_default_key(key: &str) -> Result<FieldKey, PxcError> {
    key.parse::<FieldKey>().map_err(|_| PxcError::InvalidKey {
        key: key.to_string(),
        valid: format!("{}, package", key_list(&FieldKey::ALL)),
    })
}
