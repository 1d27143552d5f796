//! Lifecycle of generation nodes.
//!
//! Every node moves `Constructed -> Prepared -> Written`. A node that is not
//! referenced stays `Constructed` and is skipped by both phases. All
//! transitions go through [`NodeStatus::step`] and [`NodeStatus::complete`].

use crate::error::GenError;

/// Phase reached by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NodeState {
    /// Created from its parse definition.
    #[default]
    Constructed,
    /// Prepared successfully.
    Prepared,
    /// Output emitted.
    Written,
}

/// Phase requested for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Prepare,
    Write,
}

/// What a phase has to do with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Run the phase.
    Run,
    /// Nothing to do: unreferenced or already done.
    Skip,
}

/// Lifecycle state and reachability of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStatus {
    state: NodeState,
    referenced: bool,
}

impl NodeStatus {
    /// Status of a node that is reachable from creation.
    pub(crate) fn referenced() -> Self {
        Self {
            state: NodeState::Constructed,
            referenced: true,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Returns true if the node is reachable from a generated element.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    /// Returns true once the node is prepared, written or not.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.state >= NodeState::Prepared
    }

    /// Marks the node reachable. Returns true if it was not before.
    pub(crate) fn set_referenced(&mut self) -> bool {
        !std::mem::replace(&mut self.referenced, true)
    }

    /// Decides what `phase` does with the node.
    pub(crate) fn step(&self, phase: Phase) -> Result<Step, GenError> {
        match (phase, self.referenced, self.state) {
            (_, false, _) => Ok(Step::Skip),
            (Phase::Prepare, true, NodeState::Constructed) => Ok(Step::Run),
            (Phase::Prepare, true, _) => Ok(Step::Skip),
            (Phase::Write, true, NodeState::Prepared) => Ok(Step::Run),
            (Phase::Write, true, NodeState::Written) => Ok(Step::Skip),
            (Phase::Write, true, NodeState::Constructed) => {
                Err(GenError::invalid_state("node written before being prepared"))
            }
        }
    }

    /// Records a successfully run phase.
    pub(crate) fn complete(&mut self, phase: Phase) {
        self.state = match phase {
            Phase::Prepare => NodeState::Prepared,
            Phase::Write => NodeState::Written,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreferenced_is_inert() {
        let status = NodeStatus::default();
        assert_eq!(status.step(Phase::Prepare).ok(), Some(Step::Skip));
        assert_eq!(status.step(Phase::Write).ok(), Some(Step::Skip));
        assert_eq!(status.state(), NodeState::Constructed);
    }

    #[test]
    fn test_transitions() {
        let mut status = NodeStatus::default();
        assert!(status.set_referenced());
        assert!(!status.set_referenced());
        assert!(status.is_referenced());

        assert!(status.step(Phase::Write).is_err());
        assert_eq!(status.step(Phase::Prepare).ok(), Some(Step::Run));
        status.complete(Phase::Prepare);
        assert!(status.is_prepared());
        assert_eq!(status.step(Phase::Prepare).ok(), Some(Step::Skip));

        assert_eq!(status.step(Phase::Write).ok(), Some(Step::Run));
        status.complete(Phase::Write);
        assert_eq!(status.state(), NodeState::Written);
        assert_eq!(status.step(Phase::Write).ok(), Some(Step::Skip));
        assert!(status.is_prepared());
    }
}
