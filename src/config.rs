//! `pxc config`: inspect and edit the settings document.

use console::style;

use crate::error::PxcError;
use crate::settings::SettingsStore;

pub fn path(store: &SettingsStore) {
    println!("{}", store.path().display());
}

/// Strict read so a broken file is reported, not shown as empty.
pub fn render(store: &SettingsStore) -> Result<String, PxcError> {
    let doc = store.load_strict()?;
    if doc.is_empty() {
        return Ok("No configuration set\n".into());
    }
    doc.to_toml()
}

pub fn show(store: &SettingsStore) -> Result<(), PxcError> {
    println!("{}", style(store.path().display()).dim());
    println!();
    print!("{}", render(store)?);
    Ok(())
}

pub fn set(store: &SettingsStore, key: &str, value: &str) -> Result<(), PxcError> {
    store.set_default(key, value)?;
    if key == "package" && store.get_preset(value.trim()).is_none() {
        println!(
            "{} no package named '{}' exists yet",
            style("warning:").yellow(),
            value.trim()
        );
    }
    tracing::info!(key, value, "set default");
    println!("{} defaults.{key} = {}", style("\u{2713}").green(), value.trim());
    Ok(())
}

pub fn set_node(store: &SettingsStore, node: &str, key: &str, value: &str) -> Result<(), PxcError> {
    store.set_node_override(node, key, value)?;
    tracing::info!(node, key, value, "set node override");
    println!(
        "{} nodes.{node}.{key} = {}",
        style("\u{2713}").green(),
        value.trim()
    );
    Ok(())
}
