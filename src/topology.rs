//! Which cluster member to target when the operator names none.

use crate::backend::{Backend, ClusterNode};

/// Snapshot of the membership as seen from this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    pub local: String,
    /// Listing order as reported by the toolkit. Empty when the host is
    /// not clustered or the query failed.
    pub members: Vec<ClusterNode>,
}

impl ClusterTopology {
    /// Query the local host name and the membership once. A failed
    /// membership query is treated as a standalone host.
    pub async fn probe(backend: &impl Backend) -> Self {
        let local = backend.local_node().await;
        let members = match backend.cluster_nodes().await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(error = %e, "membership query failed; assuming single node");
                Vec::new()
            }
        };
        tracing::debug!(local = %local, members = members.len(), "probed cluster topology");
        Self { local, members }
    }

    pub fn is_single_node(&self) -> bool {
        self.members.len() <= 1
    }

    /// Local host if it is an online member, else the first online member,
    /// else the first member. A standalone host always gets itself.
    pub fn preferred_node(&self) -> String {
        if self.is_single_node() {
            return self.local.clone();
        }
        if self
            .members
            .iter()
            .any(|m| m.name == self.local && m.is_online())
        {
            return self.local.clone();
        }
        self.members
            .iter()
            .find(|m| m.is_online())
            .or(self.members.first())
            .map(|m| m.name.clone())
            .unwrap_or_else(|| self.local.clone())
    }

    pub fn online_members(&self) -> Vec<&ClusterNode> {
        self.members.iter().filter(|m| m.is_online()).collect()
    }
}

/// One-shot convenience for commands that only need the answer.
pub async fn preferred_node(backend: &impl Backend) -> String {
    ClusterTopology::probe(backend).await.preferred_node()
}
