//! Stage routing for the `create` wizard.
//!
//! The wizard only decides which stage comes next and accumulates the
//! draft. Each stage validates its own input before calling [`Wizard::advance`].

use crate::backend::CreateSpec;
use crate::topology::ClusterTopology;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Welcome,
    Identity,
    NodeSelection,
    Compute,
    Storage,
    Network,
    Iso,
    Summary,
    Execute,
    Success,
    Error(String),
    Cancelled,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Success | Stage::Error(_) | Stage::Cancelled)
    }
}

/// Fields collected so far. Also used as the patch a stage hands back:
/// only the fields it sets are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub vmid: Option<u32>,
    pub name: Option<String>,
    pub node: Option<String>,
    pub cores: Option<u32>,
    pub memory_mb: Option<u64>,
    pub disk_gb: Option<u64>,
    pub storage: Option<String>,
    pub bridge: Option<String>,
    pub iso_volid: Option<String>,
}

impl Draft {
    fn merge(&mut self, patch: Draft) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field; })*
            };
        }
        take!(vmid, name, node, cores, memory_mb, disk_gb, storage, bridge, iso_volid);
    }

    /// The immutable request, once every required field is present.
    pub fn to_spec(&self) -> Option<CreateSpec> {
        Some(CreateSpec {
            vmid: self.vmid?,
            name: self.name.clone()?,
            node: self.node.clone()?,
            cores: self.cores?,
            memory_mb: self.memory_mb?,
            disk_gb: self.disk_gb?,
            storage: self.storage.clone()?,
            bridge: self.bridge.clone()?,
            iso_volid: self.iso_volid.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Wizard {
    stage: Stage,
    draft: Draft,
    single_node: bool,
    preferred_node: String,
}

impl Wizard {
    pub fn new(single_node: bool, preferred_node: impl Into<String>) -> Self {
        Self {
            stage: Stage::Welcome,
            draft: Draft::default(),
            single_node,
            preferred_node: preferred_node.into(),
        }
    }

    pub fn for_topology(topology: &ClusterTopology) -> Self {
        Self::new(topology.is_single_node(), topology.preferred_node())
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Transition table. Node selection is skipped on a single-node host.
    fn next_stage(&self) -> Stage {
        match self.stage {
            Stage::Welcome => Stage::Identity,
            Stage::Identity if self.single_node => Stage::Compute,
            Stage::Identity => Stage::NodeSelection,
            Stage::NodeSelection => Stage::Compute,
            Stage::Compute => Stage::Storage,
            Stage::Storage => Stage::Network,
            Stage::Network => Stage::Iso,
            Stage::Iso => Stage::Summary,
            Stage::Summary => Stage::Execute,
            // Leaving execute goes through complete()/fail().
            ref other => other.clone(),
        }
    }

    fn set_stage(&mut self, next: Stage) {
        if next != self.stage {
            tracing::debug!(from = ?self.stage, to = ?next, "wizard transition");
        }
        self.stage = next;
    }

    /// Merge the current stage's result and move to the next applicable
    /// stage. Ignored once executing or finished.
    pub fn advance(&mut self, patch: Draft) -> &Stage {
        if self.stage == Stage::Execute || self.stage.is_terminal() {
            tracing::warn!(stage = ?self.stage, "advance ignored");
            return &self.stage;
        }

        self.draft.merge(patch);
        let next = self.next_stage();
        if self.stage == Stage::Identity && next == Stage::Compute && self.draft.node.is_none() {
            self.draft.node = Some(self.preferred_node.clone());
        }
        self.set_stage(next);
        &self.stage
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.stage.is_terminal() {
            self.set_stage(Stage::Error(message.into()));
        }
    }

    pub fn cancel(&mut self) {
        if !self.stage.is_terminal() {
            self.set_stage(Stage::Cancelled);
        }
    }

    /// The request to execute. Only available in the execute stage.
    pub fn submit(&self) -> Option<CreateSpec> {
        if self.stage != Stage::Execute {
            return None;
        }
        self.draft.to_spec()
    }

    /// Record a successful execution.
    pub fn complete(&mut self) {
        if self.stage == Stage::Execute {
            self.set_stage(Stage::Success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Draft {
        Draft {
            vmid: Some(104),
            name: Some("web-2".into()),
            ..Draft::default()
        }
    }

    fn compute() -> Draft {
        Draft {
            cores: Some(4),
            memory_mb: Some(4096),
            disk_gb: Some(32),
            ..Draft::default()
        }
    }

    fn walk_to_execute(w: &mut Wizard) {
        w.advance(Draft::default());
        w.advance(identity());
        if *w.stage() == Stage::NodeSelection {
            w.advance(Draft {
                node: Some("node2".into()),
                ..Draft::default()
            });
        }
        w.advance(compute());
        w.advance(Draft {
            storage: Some("local-lvm".into()),
            ..Draft::default()
        });
        w.advance(Draft {
            bridge: Some("vmbr0".into()),
            ..Draft::default()
        });
        w.advance(Draft::default()); // no ISO
        assert_eq!(*w.stage(), Stage::Summary);
        w.advance(Draft::default());
        assert_eq!(*w.stage(), Stage::Execute);
    }

    #[test]
    fn cluster_run_visits_node_selection() {
        let mut w = Wizard::new(false, "node1");
        w.advance(Draft::default());
        assert_eq!(*w.stage(), Stage::Identity);
        w.advance(identity());
        assert_eq!(*w.stage(), Stage::NodeSelection);
        assert_eq!(w.draft().node, None);

        walk_to_execute(&mut Wizard::new(false, "node1"));
    }

    #[test]
    fn single_node_skips_selection_and_fills_node() {
        let mut w = Wizard::new(true, "pve");
        w.advance(Draft::default());
        w.advance(identity());
        assert_eq!(*w.stage(), Stage::Compute);
        assert_eq!(w.draft().node.as_deref(), Some("pve"));
    }

    #[test]
    fn submit_yields_spec_only_when_executing() {
        let mut w = Wizard::new(false, "node1");
        assert!(w.submit().is_none());
        walk_to_execute(&mut w);

        let spec = w.submit().unwrap();
        assert_eq!(spec.vmid, 104);
        assert_eq!(spec.node, "node2");
        assert_eq!(spec.cores, 4);
        assert_eq!(spec.iso_volid, None);

        w.complete();
        assert_eq!(*w.stage(), Stage::Success);
        assert!(w.submit().is_none());
    }

    #[test]
    fn complete_outside_execute_does_nothing() {
        let mut w = Wizard::new(true, "pve");
        w.advance(Draft::default());
        w.complete();
        assert_eq!(*w.stage(), Stage::Identity);
    }

    #[test]
    fn execute_waits_for_outcome() {
        let mut w = Wizard::new(true, "pve");
        walk_to_execute(&mut w);
        w.advance(Draft::default());
        assert_eq!(*w.stage(), Stage::Execute);

        w.fail("VM creation failed on pve: no space left");
        assert_eq!(
            *w.stage(),
            Stage::Error("VM creation failed on pve: no space left".into())
        );
    }

    #[test]
    fn cancel_from_any_stage_is_terminal() {
        let mut w = Wizard::new(false, "node1");
        w.advance(Draft::default());
        w.advance(identity());
        w.cancel();
        assert_eq!(*w.stage(), Stage::Cancelled);

        // Terminal stages stay put.
        w.advance(compute());
        w.fail("late");
        assert_eq!(*w.stage(), Stage::Cancelled);
        assert_eq!(w.draft().cores, None);
    }

    #[test]
    fn patch_only_overwrites_given_fields() {
        let mut d = Draft {
            cores: Some(2),
            bridge: Some("vmbr0".into()),
            ..Draft::default()
        };
        d.merge(Draft {
            cores: Some(8),
            ..Draft::default()
        });
        assert_eq!(d.cores, Some(8));
        assert_eq!(d.bridge.as_deref(), Some("vmbr0"));
    }

    #[test]
    fn incomplete_draft_builds_no_request() {
        let d = Draft {
            vmid: Some(100),
            ..Draft::default()
        };
        assert!(d.to_spec().is_none());
    }
}
