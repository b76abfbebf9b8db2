//! Arena-backed object tree.
//!
//! All entities live in one [`Tree`]; handles are copyable [`NodeId`]
//! indexes into the arena. Ownership (tenant → app profile → EPG) is
//! parent/child; everything else (bridge-domain assignment, contracts,
//! interface attachments) is a [`Relation`].
//!
//! Nodes are never freed while the tree lives. Construction dedup and
//! detached relations both rely on stale ids staying valid: a replaced
//! child is unlinked from its parent but keeps its slot.

use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::relation::{Relation, RelationRole, RelationStatus};

/// Copyable handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A user-assigned label, serialized as a `tagInst` child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub deleted: bool,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) data: EntityData,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) relations: Vec<Relation>,
    pub(crate) deleted: bool,
    pub(crate) tags: Vec<Tag>,
}

/// Arena of entity nodes.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ─────────────────────────────────────────────────

    /// Create a parentless node (tenants, interfaces, port channels).
    pub(crate) fn create_root(
        &mut self,
        data: EntityData,
        name: &str,
    ) -> Result<NodeId, ModelError> {
        self.insert(data, name, None)
    }

    /// Create a node under `parent`.
    ///
    /// If the parent already owns an equal child (same kind and name),
    /// that child is unlinked first and the new node takes its place.
    pub(crate) fn create_child(
        &mut self,
        parent: NodeId,
        data: EntityData,
        name: &str,
    ) -> Result<NodeId, ModelError> {
        if let Some(existing) = self.find_child(parent, data.kind(), name) {
            self.unlink_child(parent, existing);
        }
        self.insert(data, name, Some(parent))
    }

    fn insert(
        &mut self,
        data: EntityData,
        name: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId, ModelError> {
        if name.is_empty() {
            return Err(ModelError::validation("name must not be empty"));
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            name: name.to_owned(),
            parent,
            children: Vec::new(),
            relations: Vec::new(),
            deleted: false,
            tags: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        Ok(id)
    }

    fn unlink_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parent = None;
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn kind(&self, id: NodeId) -> Kind {
        self.nodes[id.0].data.kind()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn children_of_kind(&self, id: NodeId, kind: Kind) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|&c| self.kind(c) == kind)
            .collect()
    }

    pub fn find_child(&self, parent: NodeId, kind: Kind, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.kind(c) == kind && self.name(c) == name)
    }

    pub(crate) fn data(&self, id: NodeId) -> &EntityData {
        &self.nodes[id.0].data
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut EntityData {
        &mut self.nodes[id.0].data
    }

    // ── Deletion flag ────────────────────────────────────────────────

    /// Flag a node for deletion. The flag is monotone: once set it
    /// cannot be cleared, and the serializer emits `status: "deleted"`.
    pub fn mark_deleted(&mut self, id: NodeId) {
        self.nodes[id.0].deleted = true;
    }

    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.nodes[id.0].deleted
    }

    // ── Equality ─────────────────────────────────────────────────────

    /// Structural equality: same kind, same name, recursively equal
    /// parent chains. Children, relations, and flags do not count.
    pub fn nodes_equal(&self, a: NodeId, b: NodeId) -> bool {
        if self.kind(a) != self.kind(b) || self.name(a) != self.name(b) {
            return false;
        }
        match (self.parent(a), self.parent(b)) {
            (None, None) => true,
            (Some(pa), Some(pb)) => self.nodes_equal(pa, pb),
            _ => false,
        }
    }

    // ── Relations ────────────────────────────────────────────────────

    /// Add a relation, idempotent on (target, attached, role).
    ///
    /// A matching detached relation is revived rather than duplicated.
    pub fn add_relation(&mut self, from: NodeId, relation: Relation) {
        let relations = &mut self.nodes[from.0].relations;
        if relations.contains(&relation) {
            return;
        }
        let detached_twin = Relation {
            status: RelationStatus::Detached,
            ..relation
        };
        if let Some(existing) = relations.iter_mut().find(|r| **r == detached_twin) {
            existing.status = RelationStatus::Attached;
            return;
        }
        relations.push(relation);
    }

    /// Flip an attached relation to detached. No-op if absent.
    pub fn detach_relation(&mut self, from: NodeId, target: NodeId, role: Option<RelationRole>) {
        for relation in &mut self.nodes[from.0].relations {
            if relation.target == target
                && relation.role == role
                && relation.status == RelationStatus::Attached
            {
                relation.status = RelationStatus::Detached;
            }
        }
    }

    /// Detach every attached relation to a target of the given kind.
    pub fn detach_all_of_kind(&mut self, from: NodeId, kind: Kind, role: Option<RelationRole>) {
        let targets: Vec<NodeId> = self.attached_targets_with_role(from, kind, role);
        for target in targets {
            self.detach_relation(from, target, role);
        }
    }

    pub fn relations(&self, id: NodeId) -> &[Relation] {
        &self.nodes[id.0].relations
    }

    pub fn has_relation(&self, from: NodeId, target: NodeId, role: Option<RelationRole>) -> bool {
        self.nodes[from.0]
            .relations
            .iter()
            .any(|r| r.target == target && r.role == role && r.is_attached())
    }

    /// Attached relation targets of one kind, any role.
    pub fn attached_targets(&self, from: NodeId, kind: Kind) -> Vec<NodeId> {
        self.nodes[from.0]
            .relations
            .iter()
            .filter(|r| r.is_attached() && self.kind(r.target) == kind)
            .map(|r| r.target)
            .collect()
    }

    /// Attached relation targets of one kind with an exact role.
    pub fn attached_targets_with_role(
        &self,
        from: NodeId,
        kind: Kind,
        role: Option<RelationRole>,
    ) -> Vec<NodeId> {
        self.nodes[from.0]
            .relations
            .iter()
            .filter(|r| r.is_attached() && r.role == role && self.kind(r.target) == kind)
            .map(|r| r.target)
            .collect()
    }

    /// Detached relation targets of one kind.
    pub fn detached_targets(&self, from: NodeId, kind: Kind) -> Vec<NodeId> {
        self.nodes[from.0]
            .relations
            .iter()
            .filter(|r| !r.is_attached() && self.kind(r.target) == kind)
            .map(|r| r.target)
            .collect()
    }

    /// First attached target of one kind, if any.
    pub fn first_attached(&self, from: NodeId, kind: Kind) -> Option<NodeId> {
        self.nodes[from.0]
            .relations
            .iter()
            .find(|r| r.is_attached() && self.kind(r.target) == kind)
            .map(|r| r.target)
    }

    /// Drop detached relations; typically called after a push has
    /// carried the deletions to the controller.
    pub fn prune_detached(&mut self, id: NodeId) {
        self.nodes[id.0].relations.retain(Relation::is_attached);
    }

    // ── Tags ─────────────────────────────────────────────────────────

    pub fn add_tag(&mut self, id: NodeId, name: &str) {
        let tags = &mut self.nodes[id.0].tags;
        if tags.iter().any(|t| t.name == name && !t.deleted) {
            return;
        }
        tags.push(Tag {
            name: name.to_owned(),
            deleted: false,
        });
    }

    /// Tags are deletable, unlike nodes: a removed tag is rendered
    /// once with `status: "deleted"`.
    pub fn remove_tag(&mut self, id: NodeId, name: &str) {
        for tag in &mut self.nodes[id.0].tags {
            if tag.name == name {
                tag.deleted = true;
            }
        }
    }

    pub fn tags(&self, id: NodeId) -> &[Tag] {
        &self.nodes[id.0].tags
    }

    /// All live parentless nodes.
    pub fn roots(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.nodes[id.0].parent.is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(tree: &mut Tree, name: &str) -> NodeId {
        tree.create_root(EntityData::Tenant, name).unwrap()
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut tree = Tree::new();
        assert!(tree.create_root(EntityData::Tenant, "").is_err());
    }

    #[test]
    fn creating_equal_child_replaces_existing() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        let first = tree.create_child(t, EntityData::AppProfile, "app").unwrap();
        let second = tree.create_child(t, EntityData::AppProfile, "app").unwrap();

        assert_ne!(first, second);
        assert_eq!(tree.children(t), &[second]);
        assert!(tree.parent(first).is_none(), "old child is unlinked");
    }

    #[test]
    fn different_names_coexist() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        tree.create_child(t, EntityData::AppProfile, "a").unwrap();
        tree.create_child(t, EntityData::AppProfile, "b").unwrap();
        assert_eq!(tree.children(t).len(), 2);
    }

    #[test]
    fn equality_follows_parent_chain() {
        let mut tree = Tree::new();
        let t1 = tenant(&mut tree, "t1");
        let t2 = tenant(&mut tree, "t2");
        let a1 = tree.create_child(t1, EntityData::AppProfile, "app").unwrap();
        let a2 = tree.create_child(t2, EntityData::AppProfile, "app").unwrap();
        let a1_twin = tree.create_child(t1, EntityData::AppProfile, "app2").unwrap();

        assert!(!tree.nodes_equal(a1, a2), "same name, different tenants");
        assert!(!tree.nodes_equal(a1, a1_twin), "different names");

        let b1 = tree.create_child(t1, EntityData::AppProfile, "x").unwrap();
        let b2 = tree.create_child(t1, EntityData::AppProfile, "x").unwrap();
        // b1 was replaced by b2; both still compare equal structurally
        // except b1 lost its parent.
        assert!(!tree.nodes_equal(b1, b2));
    }

    #[test]
    fn deletion_flag_is_monotone() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        assert!(!tree.is_deleted(t));
        tree.mark_deleted(t);
        assert!(tree.is_deleted(t));
        // No API exists to clear the flag.
    }

    #[test]
    fn relation_add_is_idempotent() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        let u = tenant(&mut tree, "t2");

        tree.add_relation(t, Relation::attached(u));
        tree.add_relation(t, Relation::attached(u));
        assert_eq!(tree.relations(t).len(), 1);
    }

    #[test]
    fn detach_then_reattach_revives_relation() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        let u = tenant(&mut tree, "t2");

        tree.add_relation(t, Relation::attached(u));
        tree.detach_relation(t, u, None);
        assert!(!tree.has_relation(t, u, None));
        assert_eq!(tree.detached_targets(t, Kind::Tenant), vec![u]);

        tree.add_relation(t, Relation::attached(u));
        assert!(tree.has_relation(t, u, None));
        assert_eq!(tree.relations(t).len(), 1, "revived, not duplicated");
    }

    #[test]
    fn roles_are_distinct_relations() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        let u = tenant(&mut tree, "t2");

        tree.add_relation(t, Relation::with_role(u, RelationRole::Provided));
        tree.add_relation(t, Relation::with_role(u, RelationRole::Consumed));
        assert_eq!(tree.relations(t).len(), 2);
        assert!(tree.has_relation(t, u, Some(RelationRole::Provided)));
        assert!(!tree.has_relation(t, u, None));
    }

    #[test]
    fn prune_detached_keeps_attached() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        let u = tenant(&mut tree, "t2");
        let v = tenant(&mut tree, "t3");

        tree.add_relation(t, Relation::attached(u));
        tree.add_relation(t, Relation::attached(v));
        tree.detach_relation(t, u, None);

        tree.prune_detached(t);
        assert_eq!(tree.relations(t).len(), 1);
        assert!(tree.has_relation(t, v, None));
    }

    #[test]
    fn removed_tag_stays_with_deleted_flag() {
        let mut tree = Tree::new();
        let t = tenant(&mut tree, "t1");
        tree.add_tag(t, "prod");
        tree.add_tag(t, "prod");
        assert_eq!(tree.tags(t).len(), 1);

        tree.remove_tag(t, "prod");
        assert_eq!(tree.tags(t).len(), 1);
        assert!(tree.tags(t)[0].deleted);
    }
}
