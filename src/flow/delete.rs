//! Staged confirmation for `pxc delete`.
//!
//! ```text
//! checking ─┬─ not-found
//!           ├─ error
//!           └─ confirm-info ⇄ blocked
//!                  │
//!            confirm-verify ── grace-period ──┐
//!                  │ (dry run / no grace)     │
//!                  └──────────────────────► deleting ─┬─ success
//!                                                     └─ error
//! ```
//!
//! Every interactive state and the grace period can be abandoned with
//! Escape. Nothing is stopped or destroyed before `deleting`.

use crate::backend::{DiskUsage, EntityInfo, EntityKind};
use crate::screen::{Key, Tone, View};
use crate::settings::GracePolicy;
use crate::util::{format_bytes, format_uptime};

/// Longest verification text accepted.
pub const MAX_TYPED: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteState {
    Checking,
    NotFound,
    ConfirmInfo,
    /// A precondition failed; the operator can go back and fix it.
    Blocked(String),
    ConfirmVerify,
    GracePeriod,
    Deleting,
    Success,
    Error(String),
    Cancelled,
}

impl DeleteState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeleteState::NotFound
                | DeleteState::Success
                | DeleteState::Error(_)
                | DeleteState::Cancelled
        )
    }

    /// States that only move on a key press.
    pub fn awaits_input(&self) -> bool {
        matches!(
            self,
            DeleteState::ConfirmInfo | DeleteState::Blocked(_) | DeleteState::ConfirmVerify
        )
    }

    /// States that react to keys at all. Keys pressed in other states stay
    /// queued for the next one that does.
    pub fn accepts_keys(&self) -> bool {
        self.awaits_input() || *self == DeleteState::GracePeriod
    }
}

/// What the lookup found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub info: EntityInfo,
    pub disks: Vec<DiskUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Target),
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteEvent {
    /// Session just started.
    Started,
    Key(Key),
    Lookup(Lookup),
    /// One second of grace elapsed.
    Tick,
    /// The executor finished.
    Finished(Result<(), String>),
    /// The key source ended (stdin closed).
    InputClosed,
}

/// The destructive work, fixed at the moment `deleting` is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    pub id: u32,
    pub kind: EntityKind,
    pub stop_first: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteEffect {
    LookupTarget(u32),
    StartGraceTimer,
    StopGraceTimer,
    Execute(DeletePlan),
    /// End the process once the final view is rendered.
    Exit,
}

#[derive(Debug, Clone)]
pub struct DeleteSession {
    pub target_id: u32,
    pub target: Option<Target>,
    pub state: DeleteState,
    pub typed: String,
    pub grace_remaining: u32,
    pub stop_before_delete: bool,
    pub dry_run: bool,
    grace: GracePolicy,
}

impl DeleteSession {
    pub fn new(target_id: u32, dry_run: bool, grace: GracePolicy) -> Self {
        Self {
            target_id,
            target: None,
            state: DeleteState::Checking,
            typed: String::new(),
            grace_remaining: grace.seconds,
            stop_before_delete: false,
            dry_run,
            grace,
        }
    }

    pub fn expected_text(&self) -> String {
        format!("{} DELETE", self.target_id)
    }

    pub fn is_verified(&self) -> bool {
        self.typed.trim().to_uppercase() == self.expected_text()
    }

    fn kind_label(&self) -> String {
        match &self.target {
            Some(t) => t.info.kind.to_string(),
            None => "VM/container".into(),
        }
    }

    fn is_running(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.info.is_running())
    }

    fn plan(&self) -> Option<DeletePlan> {
        let target = self.target.as_ref()?;
        Some(DeletePlan {
            id: self.target_id,
            kind: target.info.kind,
            stop_first: self.stop_before_delete && target.info.is_running(),
            dry_run: self.dry_run,
        })
    }

    fn enter_deleting(&mut self) -> Vec<DeleteEffect> {
        match self.plan() {
            Some(plan) => {
                self.state = DeleteState::Deleting;
                vec![DeleteEffect::Execute(plan)]
            }
            None => {
                self.state = DeleteState::Error("target disappeared before deletion".into());
                Vec::new()
            }
        }
    }

    /// Apply one event; returns the effects the driver must run.
    pub fn handle(&mut self, event: DeleteEvent) -> Vec<DeleteEffect> {
        use DeleteEffect as Fx;
        use DeleteState as S;

        let before = self.state.clone();
        let effects = match (self.state.clone(), event) {
            (S::Checking, DeleteEvent::Started) => vec![Fx::LookupTarget(self.target_id)],

            (S::Checking, DeleteEvent::Lookup(lookup)) => {
                match lookup {
                    Lookup::Found(target) => {
                        self.target = Some(target);
                        self.state = S::ConfirmInfo;
                    }
                    Lookup::Missing => self.state = S::NotFound,
                    Lookup::Failed(message) => self.state = S::Error(message),
                }
                Vec::new()
            }

            (S::ConfirmInfo, DeleteEvent::Key(key)) => {
                match key {
                    Key::Char('s' | 'S') => self.stop_before_delete = !self.stop_before_delete,
                    Key::Enter if self.is_running() && !self.stop_before_delete => {
                        self.state = S::Blocked(format!(
                            "{} {} is running. Stop it first, or press S to stop it before deleting.",
                            self.kind_label(),
                            self.target_id
                        ));
                    }
                    Key::Enter => {
                        self.typed.clear();
                        self.state = S::ConfirmVerify;
                    }
                    Key::Escape => self.state = S::Cancelled,
                    _ => {}
                }
                Vec::new()
            }

            (S::Blocked(_), DeleteEvent::Key(key)) => {
                match key {
                    Key::Enter => self.state = S::ConfirmInfo,
                    Key::Char('s' | 'S') => {
                        self.stop_before_delete = true;
                        self.state = S::ConfirmInfo;
                    }
                    Key::Escape => self.state = S::Cancelled,
                    _ => {}
                }
                Vec::new()
            }

            (S::ConfirmVerify, DeleteEvent::Key(key)) => match key {
                Key::Escape => {
                    self.state = S::Cancelled;
                    Vec::new()
                }
                Key::Backspace => {
                    self.typed.pop();
                    Vec::new()
                }
                Key::Char(c) => {
                    if self.typed.chars().count() < MAX_TYPED {
                        self.typed.push(c);
                    }
                    Vec::new()
                }
                Key::Enter if !self.is_verified() => Vec::new(),
                Key::Enter if self.dry_run || !self.grace.enabled => self.enter_deleting(),
                Key::Enter => {
                    self.grace_remaining = self.grace.seconds;
                    self.state = S::GracePeriod;
                    vec![Fx::StartGraceTimer]
                }
            },

            (S::GracePeriod, DeleteEvent::Tick) => {
                self.grace_remaining = self.grace_remaining.saturating_sub(1);
                if self.grace_remaining == 0 {
                    let mut effects = vec![Fx::StopGraceTimer];
                    effects.extend(self.enter_deleting());
                    effects
                } else {
                    Vec::new()
                }
            }

            (S::GracePeriod, DeleteEvent::Key(Key::Escape)) => {
                self.state = S::Cancelled;
                vec![Fx::StopGraceTimer]
            }

            (S::Deleting, DeleteEvent::Finished(result)) => match result {
                Ok(()) => {
                    self.state = S::Success;
                    vec![Fx::Exit]
                }
                Err(message) => {
                    self.state = S::Error(message);
                    Vec::new()
                }
            },

            (state, DeleteEvent::InputClosed) if state.awaits_input() => {
                self.state = S::Cancelled;
                Vec::new()
            }

            (state, event) => {
                tracing::trace!(?state, ?event, "event ignored");
                Vec::new()
            }
        };

        if self.state != before {
            tracing::debug!(id = self.target_id, from = ?before, to = ?self.state, "delete transition");
        }
        effects
    }

    // ── rendering ──

    pub fn view(&self) -> View {
        let title = format!(
            "\u{25b2} pxc delete {}{}",
            self.target_id,
            if self.dry_run { " --dry-run" } else { "" }
        );
        let kind = self.kind_label();
        let id = self.target_id;
        let name = self
            .target
            .as_ref()
            .map(|t| t.info.name.as_str())
            .unwrap_or("");

        match &self.state {
            DeleteState::Checking => View::new(Tone::Info, title)
                .line(Tone::Muted, format!("Checking VM/container {id}...")),

            DeleteState::NotFound => View::new(Tone::Danger, title)
                .line(Tone::Danger, format!("\u{2717} VM/container {id} not found in cluster")),

            DeleteState::ConfirmInfo => self.info_view(title),

            DeleteState::Blocked(message) => View::new(Tone::Warning, title)
                .line(Tone::Warning, format!("\u{26a0} {message}"))
                .blank()
                .line(
                    Tone::Plain,
                    "Press Enter to go back, S to stop it before deleting, or Escape to cancel",
                ),

            DeleteState::ConfirmVerify => {
                let expected = self.expected_text();
                let tone = if self.is_verified() {
                    Tone::Success
                } else {
                    Tone::Plain
                };
                View::new(Tone::Warning, title)
                    .line(Tone::Warning, "\u{26a0} Final confirmation required")
                    .blank()
                    .line(
                        Tone::Plain,
                        format!("To confirm deletion, type exactly: {expected}"),
                    )
                    .line(tone, format!("> {}_", self.typed))
                    .blank()
                    .line(
                        Tone::Plain,
                        format!(
                            "Press Enter to {}, or Escape to cancel",
                            if self.dry_run { "preview" } else { "delete" }
                        ),
                    )
            }

            DeleteState::GracePeriod => View::new(Tone::Warning, title)
                .line(
                    Tone::Warning,
                    format!(
                        "\u{26a0} Deleting {kind} {id} ({name}) in {} seconds...",
                        self.grace_remaining
                    ),
                )
                .blank()
                .line(Tone::Plain, "This is your last chance to cancel!")
                .line(Tone::Plain, "The deletion will proceed automatically.")
                .blank()
                .line(
                    Tone::Plain,
                    format!(
                        "Press Escape to cancel now ({}s remaining)",
                        self.grace_remaining
                    ),
                ),

            DeleteState::Deleting => {
                let stopping = self.plan().is_some_and(|p| p.stop_first);
                let verb = match (self.dry_run, stopping) {
                    (true, _) => "Checking (dry run)",
                    (false, true) => "Stopping and deleting",
                    (false, false) => "Deleting",
                };
                View::new(Tone::Info, title).line(Tone::Muted, format!("{verb} {kind} {id}..."))
            }

            DeleteState::Success => {
                let view = View::new(Tone::Success, title);
                if self.dry_run {
                    view.line(
                        Tone::Success,
                        format!("\u{2713} Dry run completed for {kind} {id} ({name})"),
                    )
                    .line(Tone::Info, "In dry run mode: No actual deletion occurred.")
                } else {
                    view.line(
                        Tone::Success,
                        format!("\u{2713} Successfully deleted {kind} {id} ({name})"),
                    )
                }
            }

            DeleteState::Error(message) => View::new(Tone::Danger, title).line(
                Tone::Danger,
                format!("\u{2717} Failed to delete {kind} {id}: {message}"),
            ),

            DeleteState::Cancelled => View::new(Tone::Info, title)
                .line(Tone::Info, "Deletion cancelled by user")
                .line(Tone::Muted, "No changes were made."),
        }
    }

    fn info_view(&self, title: String) -> View {
        let Some(target) = &self.target else {
            return View::new(Tone::Warning, title);
        };
        let info = &target.info;
        let kind = info.kind.to_string();

        let mut view = View::new(Tone::Warning, title)
            .line(
                Tone::Warning,
                format!(
                    "\u{26a0} This will permanently delete the following {}:",
                    kind.to_lowercase()
                ),
            )
            .blank()
            .line(Tone::Plain, format!("  ID:      {}", info.id))
            .line(Tone::Plain, format!("  Name:    {}", info.name))
            .line(Tone::Plain, format!("  Type:    {}", info.kind.short()))
            .line(Tone::Plain, format!("  Node:    {}", info.node))
            .line(Tone::Plain, format!("  Status:  {}", info.status))
            .line(Tone::Plain, format!("  CPU:     {} cores", info.cpus))
            .line(Tone::Plain, format!("  Memory:  {}", format_bytes(info.memory_max)))
            .line(Tone::Plain, format!("  Uptime:  {}", format_uptime(info.uptime)));

        if !target.disks.is_empty() {
            view = view.blank().line(Tone::Muted, "  Disks to be deleted:");
            for disk in &target.disks {
                let used = disk
                    .used
                    .as_deref()
                    .map(|u| format!(" - {u} used"))
                    .unwrap_or_default();
                view = view.line(
                    Tone::Muted,
                    format!("    \u{2022} {}: {} ({}){used}", disk.slot, disk.storage, disk.size),
                );
            }
        }
        view = view.blank();

        if info.is_running() {
            let (note, action) = if self.stop_before_delete {
                ("Will be stopped before deletion.", "skip")
            } else {
                ("Must be stopped first.", "enable")
            };
            view = view
                .line(
                    Tone::Warning,
                    format!("\u{26a0} {kind} is currently running! {note}"),
                )
                .line(Tone::Plain, format!("Press [S] to {action} stopping first"))
                .blank();
        }

        view = if self.dry_run {
            view.line(Tone::Info, "Dry run mode: No actual deletion will occur.")
        } else {
            view.line(Tone::Info, "This action cannot be undone!")
                .line(Tone::Info, "Consider creating a backup before deletion.")
        };

        view.blank()
            .line(Tone::Plain, "Press Enter to continue, or Escape to cancel")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EntityStatus;

    fn target(id: u32, status: EntityStatus) -> Target {
        Target {
            info: EntityInfo {
                id,
                name: "web-server".into(),
                kind: EntityKind::Vm,
                node: "node1".into(),
                status,
                cpus: 2,
                memory_used: 0,
                memory_max: 4 << 30,
                uptime: 0,
            },
            disks: vec![DiskUsage {
                slot: "scsi0".into(),
                storage: "local-lvm".into(),
                size: "32G".into(),
                used: None,
            }],
        }
    }

    fn grace(seconds: u32) -> GracePolicy {
        GracePolicy {
            seconds,
            enabled: true,
        }
    }

    /// Session already at confirm-info for a stopped VM 100.
    fn at_info(status: EntityStatus, dry_run: bool, policy: GracePolicy) -> DeleteSession {
        let mut s = DeleteSession::new(100, dry_run, policy);
        assert_eq!(
            s.handle(DeleteEvent::Started),
            vec![DeleteEffect::LookupTarget(100)]
        );
        s.handle(DeleteEvent::Lookup(Lookup::Found(target(100, status))));
        assert_eq!(s.state, DeleteState::ConfirmInfo);
        s
    }

    fn type_text(s: &mut DeleteSession, text: &str) {
        for c in text.chars() {
            assert!(s.handle(DeleteEvent::Key(Key::Char(c))).is_empty());
        }
    }

    fn at_verify(dry_run: bool, policy: GracePolicy) -> DeleteSession {
        let mut s = at_info(EntityStatus::Stopped, dry_run, policy);
        s.handle(DeleteEvent::Key(Key::Enter));
        assert_eq!(s.state, DeleteState::ConfirmVerify);
        s
    }

    #[test]
    fn missing_target_is_not_found() {
        let mut s = DeleteSession::new(999, false, grace(5));
        s.handle(DeleteEvent::Started);
        s.handle(DeleteEvent::Lookup(Lookup::Missing));
        assert_eq!(s.state, DeleteState::NotFound);
        assert!(s.state.is_terminal());
        assert!(s.view().text().contains("VM/container 999 not found in cluster"));
    }

    #[test]
    fn lookup_failure_is_error() {
        let mut s = DeleteSession::new(100, false, grace(5));
        s.handle(DeleteEvent::Lookup(Lookup::Failed("pvesh: timeout".into())));
        assert_eq!(s.state, DeleteState::Error("pvesh: timeout".into()));
    }

    #[test]
    fn running_without_stop_toggle_is_blocked() {
        let mut s = at_info(EntityStatus::Running, false, grace(5));
        let effects = s.handle(DeleteEvent::Key(Key::Enter));
        assert!(effects.is_empty());
        assert!(matches!(s.state, DeleteState::Blocked(_)));
        assert!(s.view().text().contains("is running"));

        // Enter goes back; the toggle is still off.
        s.handle(DeleteEvent::Key(Key::Enter));
        assert_eq!(s.state, DeleteState::ConfirmInfo);
        assert!(!s.stop_before_delete);
    }

    #[test]
    fn blocked_s_enables_stop_and_returns() {
        let mut s = at_info(EntityStatus::Running, false, grace(5));
        s.handle(DeleteEvent::Key(Key::Enter));
        s.handle(DeleteEvent::Key(Key::Char('s')));
        assert_eq!(s.state, DeleteState::ConfirmInfo);
        assert!(s.stop_before_delete);

        s.handle(DeleteEvent::Key(Key::Enter));
        assert_eq!(s.state, DeleteState::ConfirmVerify);
    }

    #[test]
    fn s_toggles_stop_first() {
        let mut s = at_info(EntityStatus::Running, false, grace(5));
        s.handle(DeleteEvent::Key(Key::Char('S')));
        assert!(s.stop_before_delete);
        assert!(s.view().text().contains("Will be stopped before deletion."));
        s.handle(DeleteEvent::Key(Key::Char('s')));
        assert!(!s.stop_before_delete);
    }

    #[test]
    fn escape_cancels_from_every_interactive_state() {
        let mut info = at_info(EntityStatus::Stopped, false, grace(5));
        info.handle(DeleteEvent::Key(Key::Escape));
        assert_eq!(info.state, DeleteState::Cancelled);

        let mut blocked = at_info(EntityStatus::Running, false, grace(5));
        blocked.handle(DeleteEvent::Key(Key::Enter));
        blocked.handle(DeleteEvent::Key(Key::Escape));
        assert_eq!(blocked.state, DeleteState::Cancelled);

        let mut verify = at_verify(false, grace(5));
        verify.handle(DeleteEvent::Key(Key::Escape));
        assert_eq!(verify.state, DeleteState::Cancelled);
    }

    #[test]
    fn verification_accepts_case_and_whitespace() {
        for text in ["100 DELETE", "100 delete", "  100 Delete "] {
            let mut s = at_verify(false, grace(5));
            type_text(&mut s, text);
            assert_eq!(
                s.handle(DeleteEvent::Key(Key::Enter)),
                vec![DeleteEffect::StartGraceTimer],
                "{text:?}"
            );
            assert_eq!(s.state, DeleteState::GracePeriod);
            assert_eq!(s.grace_remaining, 5);
        }
    }

    #[test]
    fn verification_rejects_near_misses() {
        for text in ["100 DELET", "100 DELETEE", "100DELETE", "101 DELETE", "DELETE 100", ""] {
            let mut s = at_verify(false, grace(5));
            type_text(&mut s, text);
            assert!(s.handle(DeleteEvent::Key(Key::Enter)).is_empty(), "{text:?}");
            assert_eq!(s.state, DeleteState::ConfirmVerify, "{text:?}");
        }
    }

    #[test]
    fn typed_text_is_capped_and_editable() {
        let mut s = at_verify(false, grace(5));
        type_text(&mut s, &"x".repeat(30));
        assert_eq!(s.typed.len(), MAX_TYPED);

        for _ in 0..MAX_TYPED {
            s.handle(DeleteEvent::Key(Key::Backspace));
        }
        assert!(s.typed.is_empty());
        s.handle(DeleteEvent::Key(Key::Backspace));
        assert!(s.typed.is_empty());

        type_text(&mut s, "100 DELETX");
        s.handle(DeleteEvent::Key(Key::Backspace));
        type_text(&mut s, "E");
        assert!(s.is_verified());
    }

    #[test]
    fn grace_countdown_reaches_deleting() {
        let mut s = at_verify(false, grace(3));
        type_text(&mut s, "100 DELETE");
        s.handle(DeleteEvent::Key(Key::Enter));

        assert!(s.handle(DeleteEvent::Tick).is_empty());
        assert!(s.handle(DeleteEvent::Tick).is_empty());
        assert_eq!(s.grace_remaining, 1);
        assert!(s.view().text().contains("in 1 seconds"));

        let effects = s.handle(DeleteEvent::Tick);
        assert_eq!(
            effects,
            vec![
                DeleteEffect::StopGraceTimer,
                DeleteEffect::Execute(DeletePlan {
                    id: 100,
                    kind: EntityKind::Vm,
                    stop_first: false,
                    dry_run: false,
                }),
            ]
        );
        assert_eq!(s.state, DeleteState::Deleting);
    }

    #[test]
    fn grace_cancel_at_any_remaining_count_never_deletes() {
        let seconds = 5;
        for elapsed in 0..seconds {
            let mut s = at_verify(false, grace(seconds));
            type_text(&mut s, "100 DELETE");
            s.handle(DeleteEvent::Key(Key::Enter));
            for _ in 0..elapsed {
                s.handle(DeleteEvent::Tick);
            }
            assert_eq!(s.grace_remaining, seconds - elapsed);

            let effects = s.handle(DeleteEvent::Key(Key::Escape));
            assert_eq!(effects, vec![DeleteEffect::StopGraceTimer]);
            assert_eq!(s.state, DeleteState::Cancelled);

            // A late tick from a timer that had not stopped yet changes nothing.
            assert!(s.handle(DeleteEvent::Tick).is_empty());
            assert_eq!(s.state, DeleteState::Cancelled);
        }
    }

    #[test]
    fn disabled_grace_goes_straight_to_deleting() {
        let policy = GracePolicy {
            seconds: 5,
            enabled: false,
        };
        let mut s = at_verify(false, policy);
        type_text(&mut s, "100 DELETE");
        let effects = s.handle(DeleteEvent::Key(Key::Enter));
        assert!(matches!(effects.as_slice(), [DeleteEffect::Execute(_)]));
        assert_eq!(s.state, DeleteState::Deleting);
    }

    #[test]
    fn dry_run_skips_grace_and_plans_no_op() {
        let mut s = at_verify(true, grace(5));
        type_text(&mut s, "100 delete");
        let effects = s.handle(DeleteEvent::Key(Key::Enter));
        assert_eq!(
            effects,
            vec![DeleteEffect::Execute(DeletePlan {
                id: 100,
                kind: EntityKind::Vm,
                stop_first: false,
                dry_run: true,
            })]
        );

        assert_eq!(
            s.handle(DeleteEvent::Finished(Ok(()))),
            vec![DeleteEffect::Exit]
        );
        assert_eq!(s.state, DeleteState::Success);
        assert!(s.view().text().contains("Dry run completed for VM 100"));
    }

    #[test]
    fn stop_first_only_planned_for_running_targets() {
        let mut s = at_info(EntityStatus::Running, false, GracePolicy {
            seconds: 0,
            enabled: false,
        });
        s.handle(DeleteEvent::Key(Key::Char('s')));
        s.handle(DeleteEvent::Key(Key::Enter));
        type_text(&mut s, "100 DELETE");
        let effects = s.handle(DeleteEvent::Key(Key::Enter));
        assert!(matches!(
            effects.as_slice(),
            [DeleteEffect::Execute(DeletePlan { stop_first: true, .. })]
        ));
        assert!(s.view().text().contains("Stopping and deleting VM 100"));
    }

    #[test]
    fn executor_failure_is_terminal_error() {
        let mut s = at_verify(false, GracePolicy {
            seconds: 0,
            enabled: false,
        });
        type_text(&mut s, "100 DELETE");
        s.handle(DeleteEvent::Key(Key::Enter));
        s.handle(DeleteEvent::Finished(Err("storage locked".into())));
        assert_eq!(s.state, DeleteState::Error("storage locked".into()));
        assert!(s.view().text().contains("Failed to delete VM 100: storage locked"));
    }

    #[test]
    fn closed_input_cancels_only_while_waiting_for_keys() {
        let mut s = at_info(EntityStatus::Stopped, false, grace(5));
        s.handle(DeleteEvent::InputClosed);
        assert_eq!(s.state, DeleteState::Cancelled);

        let mut s = at_verify(false, grace(2));
        type_text(&mut s, "100 DELETE");
        s.handle(DeleteEvent::Key(Key::Enter));
        s.handle(DeleteEvent::InputClosed);
        assert_eq!(s.state, DeleteState::GracePeriod);
    }

    #[test]
    fn keys_before_lookup_are_ignored() {
        let mut s = DeleteSession::new(100, false, grace(5));
        s.handle(DeleteEvent::Key(Key::Enter));
        s.handle(DeleteEvent::Key(Key::Escape));
        assert_eq!(s.state, DeleteState::Checking);
    }

    #[test]
    fn info_view_lists_disks() {
        let s = at_info(EntityStatus::Stopped, false, grace(5));
        let text = s.view().text();
        assert!(text.contains("scsi0: local-lvm (32G)"));
        assert!(text.contains("This action cannot be undone!"));
    }
}
