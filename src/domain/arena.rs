use std::collections::{HashMap, HashSet, VecDeque};

use generational_arena::{Arena, Index};
use itertools::Itertools;
use tracing::instrument;

use crate::domain::entities::HierarchyNode;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::walk::{ChainWalk, WalkError};

/// Arena-based storage for one hierarchy.
///
/// Nodes carry their own parent pointer and display order; the arena keeps an
/// id index for O(1) lookups. Child lists are derived on demand so a parent
/// pointer is the single source of truth for structure.
#[derive(Debug, Clone)]
pub struct NodeArena<N> {
    /// Arena storage for all nodes
    arena: Arena<N>,
    /// Node id -> arena slot
    index: HashMap<String, Index>,
}

impl<N: HierarchyNode> Default for NodeArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: HierarchyNode> NodeArena<N> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&N> {
        self.index.get(id).and_then(|&idx| self.arena.get(idx))
    }

    /// Lookup that fails with `NotFound` for unknown ids.
    pub fn require(&self, id: &str) -> DomainResult<&N> {
        self.get(id).ok_or_else(|| DomainError::NotFound {
            kind: N::KIND,
            id: id.to_string(),
        })
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut N> {
        let idx = *self.index.get(id)?;
        self.arena.get_mut(idx)
    }

    #[instrument(level = "trace", skip(self, node), fields(id = node.id()))]
    pub(crate) fn insert(&mut self, node: N) -> DomainResult<()> {
        if self.contains(node.id()) {
            return Err(DomainError::DuplicateId {
                kind: N::KIND,
                id: node.id().to_string(),
            });
        }
        let id = node.id().to_string();
        let idx = self.arena.insert(node);
        self.index.insert(id, idx);
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    pub(crate) fn remove(&mut self, id: &str) -> Option<N> {
        let idx = self.index.remove(id)?;
        self.arena.remove(idx)
    }

    /// All nodes, ordered by id for deterministic output.
    pub fn iter(&self) -> impl Iterator<Item = &N> {
        self.arena
            .iter()
            .map(|(_, n)| n)
            .sorted_by(|a, b| a.id().cmp(b.id()))
    }

    /// Direct children of `parent`, in display order.
    ///
    /// For `parent = None` the roots are returned; `partition` then restricts
    /// them to one sibling group (e.g. one company's directorates).
    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, parent: Option<&str>, partition: Option<&str>) -> Vec<&N> {
        self.arena
            .iter()
            .map(|(_, n)| n)
            .filter(|n| n.parent_id() == parent)
            .filter(|n| parent.is_some() || partition.is_none() || n.partition() == partition)
            .sorted_by(|a, b| {
                a.display_order()
                    .cmp(&b.display_order())
                    .then_with(|| a.id().cmp(b.id()))
            })
            .collect()
    }

    /// The sibling group `node` belongs to, itself included.
    pub fn sibling_group(&self, node: &N) -> Vec<&N> {
        self.children(node.parent_id(), node.partition())
    }

    /// Upper bound for parent-chain walks: no chain can be longer than the store.
    pub fn max_chain(&self) -> usize {
        self.len()
    }

    /// Chain walker following parent pointers from `id`, nearest ancestor first.
    pub fn parent_walk(
        &self,
        id: &str,
        max_depth: usize,
    ) -> ChainWalk<impl FnMut(&str) -> Option<String> + '_> {
        ChainWalk::new(id, max_depth, move |current| {
            self.get(current)
                .and_then(|n| n.parent_id())
                .filter(|p| self.contains(p))
                .map(str::to_string)
        })
    }

    /// Ancestor ids of `id`, nearest first.
    #[instrument(level = "trace", skip(self))]
    pub fn ancestors(&self, id: &str, max_depth: usize) -> Result<Vec<String>, WalkError> {
        self.parent_walk(id, max_depth).collect()
    }

    /// Whether `candidate` lies strictly below `ancestor`.
    ///
    /// A broken (cyclic) parent chain counts as "not a descendant".
    pub fn is_descendant_of(&self, candidate: &str, ancestor: &str) -> bool {
        self.parent_walk(candidate, self.max_chain())
            .map_while(Result::ok)
            .any(|id| id == ancestor)
    }

    /// All nodes below `id`, breadth-first, each level in display order.
    #[instrument(level = "trace", skip(self))]
    pub fn descendants(&self, id: &str) -> Vec<&N> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(id.to_string());
        seen.insert(id.to_string());

        while let Some(current) = queue.pop_front() {
            for child in self.children(Some(&current), None) {
                if seen.insert(child.id().to_string()) {
                    queue.push_back(child.id().to_string());
                    result.push(child);
                }
            }
        }
        result
    }

    /// Rewrite the display orders of one sibling group to a dense `0..n-1`
    /// sequence following `ordered_ids`. Ids not in the group are ignored.
    pub(crate) fn apply_order(&mut self, ordered_ids: &[String]) {
        for (position, id) in ordered_ids.iter().enumerate() {
            if let Some(node) = self.get_mut(id) {
                node.set_display_order(position as u32);
            }
        }
    }

    /// Make every sibling group dense, keeping the current relative order.
    pub(crate) fn renumber_all(&mut self) {
        let mut groups: Vec<(Option<String>, Option<String>)> = self
            .arena
            .iter()
            .map(|(_, n)| {
                let parent = n.parent_id().map(str::to_string);
                let partition = if parent.is_none() {
                    n.partition().map(str::to_string)
                } else {
                    None
                };
                (parent, partition)
            })
            .collect();
        groups.sort();
        groups.dedup();

        for (parent, partition) in groups {
            let ordered: Vec<String> = self
                .children(parent.as_deref(), partition.as_deref())
                .iter()
                .map(|n| n.id().to_string())
                .collect();
            self.apply_order(&ordered);
        }
    }

    /// Pre-order traversal (roots in display order, children before next sibling).
    pub fn preorder(&self, partition: Option<&str>) -> PreOrderIterator<'_, N> {
        PreOrderIterator::new(self, partition)
    }
}

pub struct PreOrderIterator<'a, N> {
    arena: &'a NodeArena<N>,
    stack: Vec<(usize, &'a N)>,
}

impl<'a, N: HierarchyNode> PreOrderIterator<'a, N> {
    fn new(arena: &'a NodeArena<N>, partition: Option<&str>) -> Self {
        let stack = arena
            .children(None, partition)
            .into_iter()
            .rev()
            .map(|n| (0, n))
            .collect();
        Self { arena, stack }
    }
}

impl<'a, N: HierarchyNode> Iterator for PreOrderIterator<'a, N> {
    /// (depth, node)
    type Item = (usize, &'a N);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        // Push children in reverse order for left-to-right traversal
        for child in self.arena.children(Some(node.id()), None).into_iter().rev() {
            self.stack.push((depth + 1, child));
        }
        Some((depth, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CorporateEntity;
    use crate::domain::taxonomy::EntityType;

    fn entity(id: &str, entity_type: EntityType, parent: Option<&str>, order: u32) -> CorporateEntity {
        CorporateEntity {
            id: id.into(),
            name: id.into(),
            code: id.into(),
            entity_type,
            parent_entity_id: parent.map(String::from),
            display_order: order,
            has_bsc: false,
            bsc_scope: Default::default(),
            is_active: true,
        }
    }

    fn arena() -> NodeArena<CorporateEntity> {
        let mut arena = NodeArena::new();
        arena.insert(entity("corp", EntityType::Corporation, None, 0)).unwrap();
        arena.insert(entity("h2", EntityType::Holding, Some("corp"), 1)).unwrap();
        arena.insert(entity("h1", EntityType::Holding, Some("corp"), 0)).unwrap();
        arena.insert(entity("co", EntityType::Company, Some("h1"), 0)).unwrap();
        arena
    }

    #[test]
    fn given_unordered_inserts_when_listing_children_then_sorted_by_display_order() {
        let arena = arena();
        let ids: Vec<_> = arena.children(Some("corp"), None).iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["h1", "h2"]);
    }

    #[test]
    fn given_duplicate_id_when_inserting_then_fails() {
        let mut arena = arena();
        let result = arena.insert(entity("co", EntityType::Company, Some("h2"), 0));
        assert!(matches!(result, Err(DomainError::DuplicateId { .. })));
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn given_nested_node_when_walking_ancestors_then_nearest_first() {
        let arena = arena();
        assert_eq!(arena.ancestors("co", 10).unwrap(), vec!["h1", "corp"]);
        assert!(arena.is_descendant_of("co", "corp"));
        assert!(!arena.is_descendant_of("corp", "co"));
        assert!(!arena.is_descendant_of("co", "co"));
    }

    #[test]
    fn given_tree_when_iterating_preorder_then_visits_depth_first() {
        let arena = arena();
        let visited: Vec<_> = arena.preorder(None).map(|(d, n)| (d, n.id.clone())).collect();
        assert_eq!(
            visited,
            vec![(0, "corp".to_string()), (1, "h1".into()), (2, "co".into()), (1, "h2".into())]
        );
    }

    #[test]
    fn given_removed_node_when_looking_up_then_gone() {
        let mut arena = arena();
        assert!(arena.remove("h2").is_some());
        assert!(arena.get("h2").is_none());
        assert!(arena.remove("h2").is_none());
    }
}
