//! Cascading merge of the settings layers.
//!
//! Precedence, lowest to highest: global defaults, node override, preset.
//! Each layer only overwrites the fields it defines.

use crate::settings::{Fields, SettingsDocument, SettingsStore};

/// Fallbacks applied by callers when no layer defines a field.
pub const FALLBACK_CORES: u32 = 2;
pub const FALLBACK_MEMORY_MB: u64 = 2048;
pub const FALLBACK_DISK_GB: u64 = 20;
pub const FALLBACK_BRIDGE: &str = "vmbr0";

/// Merge `doc` into one effective parameter set.
///
/// When `node` is given it becomes the effective node before overrides are
/// applied; a preset that names a node still wins. The preset is the
/// explicit argument, else `defaults.package`. Unknown nodes and presets
/// contribute nothing.
pub fn resolve(doc: &SettingsDocument, node: Option<&str>, preset: Option<&str>) -> Fields {
    let mut out = doc.defaults.fields.clone();

    if let Some(node) = node {
        if let Some(overrides) = doc.node_overrides.get(node) {
            out.overlay(overrides);
        }
        // A node override never re-targets the node it belongs to.
        out.node = Some(node.to_string());
    }

    let preset = preset.or(doc.defaults.package.as_deref());
    if let Some(fields) = preset.and_then(|name| doc.presets.get(name)) {
        out.overlay(fields);
    }

    out
}

impl SettingsStore {
    /// Load the document and resolve it. Never fails: an unreadable store
    /// resolves to an empty set.
    pub fn resolve(&self, node: Option<&str>, preset: Option<&str>) -> Fields {
        resolve(&self.load(), node, preset)
    }
}
