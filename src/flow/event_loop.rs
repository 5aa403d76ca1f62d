//! Drives a [`DeleteSession`] to a terminal state.
//!
//! The loop multiplexes key presses, grace-timer ticks, Ctrl-C and the
//! completion of in-flight workers (async blocks in `FuturesUnordered`),
//! feeds each into the reducer, and dispatches the resulting effects.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::screen::Key;

use super::delete::{DeleteEffect, DeleteEvent, DeletePlan, DeleteSession, Lookup, Target};

/// Period of a grace-countdown tick in production.
pub const GRACE_TICK: Duration = Duration::from_secs(1);

type Worker<'a> = Pin<Box<dyn Future<Output = DeleteEvent> + 'a>>;

// ── GraceTimer ─────────────────────────────────────────────────────

/// Repeating tick task for the grace countdown.
///
/// Dropping the handle cancels the token and aborts the task, so leaving
/// the grace state by any path stops the ticks.
pub struct GraceTimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl GraceTimer {
    pub fn start(period: Duration, ticks: mpsc::UnboundedSender<()>) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if ticks.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        tracing::debug!(?period, "grace timer started");
        Self { token, task }
    }
}

impl Drop for GraceTimer {
    fn drop(&mut self) {
        self.token.cancel();
        self.task.abort();
        tracing::debug!("grace timer stopped");
    }
}

// ── Event loop ─────────────────────────────────────────────────────

/// Final state of a delete session.
pub struct DeleteOutcome {
    pub session: DeleteSession,
    /// The session asked for the process to end after rendering.
    pub exit_requested: bool,
}

/// Run `session` until it is terminal, calling `render` after every
/// event. `tick` is the grace countdown period.
pub async fn run_delete<B: Backend>(
    backend: &B,
    mut session: DeleteSession,
    mut keys: mpsc::UnboundedReceiver<Key>,
    tick: Duration,
    mut render: impl FnMut(&DeleteSession),
) -> DeleteOutcome {
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let mut workers: FuturesUnordered<Worker<'_>> = FuturesUnordered::new();
    let mut timer: Option<GraceTimer> = None;
    let mut keys_open = true;
    let mut exit_requested = false;

    let mut event = DeleteEvent::Started;
    loop {
        let mut effects = session.handle(event);
        if !keys_open && session.state.awaits_input() {
            effects.extend(session.handle(DeleteEvent::InputClosed));
        }

        for effect in effects {
            match effect {
                DeleteEffect::LookupTarget(id) => workers.push(lookup_worker(backend, id)),
                DeleteEffect::StartGraceTimer => {
                    timer = Some(GraceTimer::start(tick, tick_tx.clone()));
                }
                DeleteEffect::StopGraceTimer => timer = None,
                DeleteEffect::Execute(plan) => workers.push(execute_worker(backend, plan)),
                DeleteEffect::Exit => exit_requested = true,
            }
        }

        render(&session);

        if session.state.is_terminal() {
            break;
        }

        let want_keys = keys_open && session.state.accepts_keys();
        event = tokio::select! {
            key = keys.recv(), if want_keys => match key {
                Some(key) => DeleteEvent::Key(key),
                None => {
                    keys_open = false;
                    DeleteEvent::InputClosed
                }
            },
            Some(()) = tick_rx.recv() => DeleteEvent::Tick,
            Some(evt) = workers.next() => evt,
            _ = tokio::signal::ctrl_c() => DeleteEvent::Key(Key::Escape),
        };
    }

    drop(timer);
    DeleteOutcome {
        session,
        exit_requested,
    }
}

// ── Workers ────────────────────────────────────────────────────────

fn lookup_worker<B: Backend>(backend: &B, id: u32) -> Worker<'_> {
    Box::pin(async move {
        let lookup = match backend.entity_info(id).await {
            Ok(Some(info)) => {
                let disks = backend.entity_disks(id).await.unwrap_or_else(|e| {
                    tracing::warn!(id, error = %e, "cannot read disk layout");
                    Vec::new()
                });
                Lookup::Found(Target { info, disks })
            }
            Ok(None) => Lookup::Missing,
            Err(e) => Lookup::Failed(e.to_string()),
        };
        DeleteEvent::Lookup(lookup)
    })
}

fn execute_worker<B: Backend>(backend: &B, plan: DeletePlan) -> Worker<'_> {
    Box::pin(async move {
        if plan.dry_run {
            tracing::info!(id = plan.id, "dry run: nothing stopped or destroyed");
            return DeleteEvent::Finished(Ok(()));
        }

        if plan.stop_first {
            tracing::info!(id = plan.id, "stopping before delete");
            if let Err(e) = backend.stop_entity(plan.id, false).await {
                return DeleteEvent::Finished(Err(e.to_string()));
            }
        }

        let result = backend
            .destroy_entity(plan.id, plan.kind, true)
            .await
            .map_err(|e| e.to_string());
        DeleteEvent::Finished(result)
    })
}

// ── Tests ──────────────────────────────────────────────────────────
