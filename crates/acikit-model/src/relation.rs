//! Typed links between nodes that are not parent/child ownership.
//!
//! An EPG's bridge-domain assignment, its provided and consumed
//! contracts, and its interface attachments are all relations. A
//! removed relation is not forgotten: it flips to `Detached` and stays
//! visible to the serializer, which renders some detachments as
//! explicit `status: "deleted"` documents so the controller tears the
//! old state down.

use crate::tree::NodeId;

/// Whether the relation is live or has been removed but not yet pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationStatus {
    Attached,
    Detached,
}

/// Contract relations carry a direction; everything else has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRole {
    Provided,
    Consumed,
}

/// A directed link from the owning node to `target`.
///
/// Equality is (target, status, role); two relations to the same
/// target in different states are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub target: NodeId,
    pub status: RelationStatus,
    pub role: Option<RelationRole>,
}

impl Relation {
    pub fn attached(target: NodeId) -> Self {
        Self {
            target,
            status: RelationStatus::Attached,
            role: None,
        }
    }

    pub fn with_role(target: NodeId, role: RelationRole) -> Self {
        Self {
            target,
            status: RelationStatus::Attached,
            role: Some(role),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.status == RelationStatus::Attached
    }
}
