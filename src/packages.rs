//! `pxc packages`: named presets of VM defaults.

use std::collections::BTreeMap;
use std::io::IsTerminal;

use console::style;
use inquire::Text;
use inquire::validator::Validation;

use crate::create::{map_inquire_err, validate_cores, validate_disk, validate_memory};
use crate::error::PxcError;
use crate::settings::{FieldKey, Fields, SettingsStore};

/// Hints shown when prompting for a missing value.
const HINT_CORES: &str = "2";
const HINT_MEMORY: &str = "2048";
const HINT_DISK: &str = "32";
const HINT_BRIDGE: &str = "vmbr0";

/// Values given on the command line for `packages add`.
#[derive(Debug, Default, Clone)]
pub struct PresetArgs {
    pub cores: Option<String>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    pub bridge: Option<String>,
}

impl PresetArgs {
    /// Parse whatever was given. Missing values stay unset.
    pub fn to_fields(&self) -> Result<Fields, PxcError> {
        fn parsed<T>(
            key: FieldKey,
            raw: &Option<String>,
            f: fn(&str) -> Result<T, String>,
        ) -> Result<Option<T>, PxcError> {
            raw.as_deref()
                .map(|v| {
                    f(v).map_err(|message| PxcError::InvalidValue {
                        key: key.to_string(),
                        message,
                    })
                })
                .transpose()
        }

        Ok(Fields {
            cores: parsed(FieldKey::Cores, &self.cores, validate_cores)?,
            memory_mb: parsed(FieldKey::MemoryMb, &self.memory, validate_memory)?,
            disk_gb: parsed(FieldKey::DiskGb, &self.disk, validate_disk)?,
            bridge: self.bridge.clone().filter(|b| !b.trim().is_empty()),
            ..Fields::default()
        })
    }

    /// Cores, memory and disk were all given; nothing to ask.
    pub fn is_complete(&self) -> bool {
        self.cores.is_some() && self.memory.is_some() && self.disk.is_some()
    }
}

pub fn render_table(presets: &BTreeMap<String, Fields>) -> String {
    if presets.is_empty() {
        return "No packages defined\n".into();
    }
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".into());

    let mut out = format!(
        "{:<15}{:<8}{:<10}{:<8}{}\n",
        "NAME", "CORES", "MEMORY", "DISK", "BRIDGE"
    );
    for (name, p) in presets {
        out.push_str(&format!(
            "{:<15}{:<8}{:<10}{:<8}{}\n",
            name,
            or_dash(p.cores.map(|v| v.to_string())),
            or_dash(p.memory_mb.map(|v| format!("{v}MB"))),
            or_dash(p.disk_gb.map(|v| format!("{v}GB"))),
            or_dash(p.bridge.clone()),
        ));
    }
    out.push_str("\nUse with: pxc create --preset <name>\n");
    out
}

/// `key: value` lines for every set field.
pub fn render_fields(fields: &Fields) -> String {
    FieldKey::ALL
        .iter()
        .filter_map(|k| fields.get(*k).map(|v| format!("  {k}: {v}\n")))
        .collect()
}

pub fn list(store: &SettingsStore) {
    print!("{}", render_table(&store.presets()));
}

pub fn show(store: &SettingsStore, name: &str) {
    match store.get_preset(name) {
        Some(fields) => {
            println!("{}", style(name).bold().cyan());
            print!("{}", render_fields(&fields));
        }
        None => println!("{} Package not found: {name}", style("\u{2717}").red()),
    }
}

pub fn add(store: &SettingsStore, name: &str, args: PresetArgs) -> Result<(), PxcError> {
    let mut fields = args.to_fields()?;

    if !args.is_complete() {
        if !std::io::stdin().is_terminal() {
            return Err(PxcError::NotInteractive {
                command: "pxc packages add (without --cores, --memory and --disk)".into(),
            });
        }
        prompt_missing(&mut fields)?;
    }

    store.set_preset(name, fields.clone())?;
    tracing::info!(preset = name, "saved preset");
    println!("{} Saved package {name}", style("\u{2713}").green());
    print!("{}", render_fields(&fields));
    Ok(())
}

pub fn delete(store: &SettingsStore, name: &str) -> Result<(), PxcError> {
    if store.delete_preset(name)? {
        tracing::info!(preset = name, "deleted preset");
        println!("{} Deleted package {name}", style("\u{2713}").green());
    } else {
        println!("{} Package not found: {name}", style("\u{2717}").red());
    }
    Ok(())
}

/// Ask for each missing value. A blank answer leaves the field unset.
fn prompt_missing(fields: &mut Fields) -> Result<(), PxcError> {
    fn ask<T: 'static>(
        label: &str,
        hint: &str,
        f: fn(&str) -> Result<T, String>,
    ) -> Result<Option<T>, PxcError> {
        let input = Text::new(label)
            .with_placeholder(hint)
            .with_help_message("leave blank to inherit from defaults")
            .with_validator(move |input: &str| {
                Ok(if input.trim().is_empty() {
                    Validation::Valid
                } else {
                    match f(input) {
                        Ok(_) => Validation::Valid,
                        Err(msg) => Validation::Invalid(msg.into()),
                    }
                })
            })
            .prompt()
            .map_err(map_inquire_err)?;
        if input.trim().is_empty() {
            return Ok(None);
        }
        f(&input).map(Some).map_err(|message| PxcError::Validation { message })
    }

    if fields.cores.is_none() {
        fields.cores = ask("CPU cores:", HINT_CORES, validate_cores)?;
    }
    if fields.memory_mb.is_none() {
        fields.memory_mb = ask("Memory (MB):", HINT_MEMORY, validate_memory)?;
    }
    if fields.disk_gb.is_none() {
        fields.disk_gb = ask("Disk (GB):", HINT_DISK, validate_disk)?;
    }
    if fields.bridge.is_none() {
        let bridge = Text::new("Network bridge:")
            .with_placeholder(HINT_BRIDGE)
            .prompt()
            .map_err(map_inquire_err)?;
        let bridge = bridge.trim();
        if !bridge.is_empty() {
            fields.bridge = Some(bridge.to_string());
        }
    }
    Ok(())
}
