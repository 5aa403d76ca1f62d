//! `list`, `start`, `stop` and `delete`.

use crate::backend::{Backend, EntityInfo, EntityKind};
use crate::error::PxcError;
use crate::flow::{DeleteSession, DeleteState, GRACE_TICK, run_delete};
use crate::progress::{OutputMode, StepProgress};
use crate::screen::{KeyReader, Screen};
use crate::settings::SettingsStore;
use crate::util::{format_bytes, format_uptime};

// ── list ─────────────────────────────────────────────────

pub async fn list<B: Backend>(backend: &B) -> Result<(), PxcError> {
    let mut entities = backend.list_entities().await?;
    entities.sort_by_key(|e| e.id);
    print!("{}", render_table(&entities));
    Ok(())
}

pub fn render_table(entities: &[EntityInfo]) -> String {
    if entities.is_empty() {
        return "No VMs or containers found\n".into();
    }

    let header = ["ID", "TYPE", "NAME", "NODE", "STATUS", "CPUS", "MEMORY", "UPTIME"];
    let rows: Vec<[String; 8]> = entities
        .iter()
        .map(|e| {
            [
                e.id.to_string(),
                e.kind.short().to_string(),
                e.name.clone(),
                e.node.clone(),
                e.status.to_string(),
                e.cpus.to_string(),
                format!(
                    "{}/{}",
                    format_bytes(e.memory_used),
                    format_bytes(e.memory_max)
                ),
                format_uptime(e.uptime),
            ]
        })
        .collect();

    let mut widths = header.map(|h| h.len());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&header));
    out.push('\n');
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells));
        out.push('\n');
    }

    let vms = entities.iter().filter(|e| e.kind == EntityKind::Vm).count();
    let running = entities.iter().filter(|e| e.is_running()).count();
    out.push_str(&format!(
        "\n{} total ({vms} VMs, {} containers) - {running} running\n",
        entities.len(),
        entities.len() - vms,
    ));
    out
}

// ── start / stop ─────────────────────────────────────────

pub async fn start<B: Backend>(backend: &B, id: u32) -> Result<(), PxcError> {
    let Some(info) = backend.entity_info(id).await? else {
        println!("VM/Container {id} not found");
        return Ok(());
    };
    if info.is_running() {
        println!("{} {id} is already running", info.kind);
        return Ok(());
    }

    let mut progress = StepProgress::new(1, OutputMode::detect());
    progress
        .run(&format!("Starting {} {id} ({})", info.kind, info.name), |step| async move {
            backend.start_entity(id).await?;
            step.set_done_label(format!("Started {} {id} on {}", info.kind, info.node));
            Ok::<_, PxcError>(())
        })
        .await
}

pub async fn stop<B: Backend>(backend: &B, id: u32, force: bool) -> Result<(), PxcError> {
    let Some(info) = backend.entity_info(id).await? else {
        println!("VM/Container {id} not found");
        return Ok(());
    };
    if !info.is_running() {
        println!("{} {id} is already stopped", info.kind);
        return Ok(());
    }

    let verb = if force { "Force-stopping" } else { "Stopping" };
    let mut progress = StepProgress::new(1, OutputMode::detect());
    progress
        .run(&format!("{verb} {} {id} ({})", info.kind, info.name), |step| async move {
            backend.stop_entity(id, force).await?;
            step.set_done_label(format!("Stopped {} {id}", info.kind));
            Ok::<_, PxcError>(())
        })
        .await
}

// ── delete ───────────────────────────────────────────────

/// Run the interactive delete flow. Returns whether the session asked for
/// the process to end.
pub async fn delete<B: Backend>(
    backend: &B,
    store: &SettingsStore,
    id: u32,
    dry_run: bool,
) -> Result<bool, PxcError> {
    let session = DeleteSession::new(id, dry_run, store.grace_policy());
    let (reader, keys) = KeyReader::spawn();
    let mut screen = Screen::new();

    let outcome = run_delete(backend, session, keys, GRACE_TICK, |s| {
        screen.draw(&s.view());
    })
    .await;
    // Put the terminal back before the caller can end the process.
    drop(reader);

    match &outcome.session.state {
        DeleteState::Success if dry_run => tracing::info!(id, "dry run finished"),
        DeleteState::Success => tracing::info!(id, "deleted"),
        DeleteState::Error(message) => tracing::error!(id, %message, "delete failed"),
        other => tracing::info!(id, state = ?other, "delete ended"),
    }
    Ok(outcome.exit_requested)
}
