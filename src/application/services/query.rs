//! Query facade: read-only views over both hierarchies.

use termtree::Tree;

use crate::domain::{
    CorporateEntity, DomainError, DomainResult, EntityType, HierarchyNode, NodeArena, OrgLevel,
    OrgUnit, TreeStore,
};

/// Structural queries over one hierarchy.
pub struct NodeQuery<'a, N> {
    arena: &'a NodeArena<N>,
}

impl<'a, N: HierarchyNode> NodeQuery<'a, N> {
    pub fn new(arena: &'a NodeArena<N>) -> Self {
        Self { arena }
    }

    /// Direct children in display order.
    pub fn children_of(&self, id: &str) -> DomainResult<Vec<&'a N>> {
        self.arena.require(id)?;
        Ok(self.arena.children(Some(id), None))
    }

    /// Ancestors from the root down to the parent.
    pub fn ancestors_of(&self, id: &str) -> DomainResult<Vec<&'a N>> {
        self.arena.require(id)?;
        let ids = self
            .arena
            .ancestors(id, self.arena.max_chain())
            .map_err(|e| DomainError::CycleDetected {
                node: id.to_string(),
                target: e.node().to_string(),
            })?;
        Ok(ids.iter().rev().filter_map(|a| self.arena.get(a)).collect())
    }

    /// All nodes below `id`, breadth-first.
    pub fn descendants_of(&self, id: &str) -> DomainResult<Vec<&'a N>> {
        self.arena.require(id)?;
        Ok(self.arena.descendants(id))
    }

    /// Other members of the node's sibling group, in display order.
    pub fn siblings_of(&self, id: &str) -> DomainResult<Vec<&'a N>> {
        let node = self.arena.require(id)?;
        Ok(self
            .arena
            .sibling_group(node)
            .into_iter()
            .filter(|n| n.id() != id)
            .collect())
    }

    /// Text tree of the nodes reachable from `roots`.
    fn render(&self, roots: Vec<&'a N>, label: &dyn Fn(&N) -> String) -> Vec<Tree<String>> {
        roots
            .into_iter()
            .map(|root| self.subtree(root, label))
            .collect()
    }

    fn subtree(&self, node: &'a N, label: &dyn Fn(&N) -> String) -> Tree<String> {
        let leaves: Vec<_> = self
            .arena
            .children(Some(node.id()), None)
            .into_iter()
            .map(|child| self.subtree(child, label))
            .collect();
        Tree::new(label(node)).with_leaves(leaves)
    }
}

/// Read-only entry point used by the CLI and embedding hosts.
pub struct QueryFacade<'a> {
    store: &'a TreeStore,
}

impl<'a> QueryFacade<'a> {
    pub fn new(store: &'a TreeStore) -> Self {
        Self { store }
    }

    pub fn entities(&self) -> NodeQuery<'a, CorporateEntity> {
        NodeQuery::new(self.store.entities())
    }

    pub fn units(&self) -> NodeQuery<'a, OrgUnit> {
        NodeQuery::new(self.store.units())
    }

    pub fn all_companies(&self) -> Vec<&'a CorporateEntity> {
        self.store.companies()
    }

    /// Root corporations in display order.
    pub fn roots(&self) -> Vec<&'a CorporateEntity> {
        self.store.root_corporations()
    }

    /// Units of one level in tree order, optionally restricted to one company.
    pub fn units_at_level(&self, level: OrgLevel, company: Option<&str>) -> Vec<&'a OrgUnit> {
        let companies: Vec<&str> = match company {
            Some(c) => vec![c],
            None => self
                .all_companies()
                .into_iter()
                .map(|c| c.id.as_str())
                .collect(),
        };
        companies
            .into_iter()
            .flat_map(|c| self.store.units().preorder(Some(c)).map(|(_, u)| u))
            .filter(|u| u.level == level)
            .collect()
    }

    /// Every unit of a company, in tree order.
    pub fn units_of_company(&self, company_id: &str) -> DomainResult<Vec<&'a OrgUnit>> {
        let company = self.store.entities().require(company_id)?;
        if company.entity_type != EntityType::Company {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .units()
            .preorder(Some(company_id))
            .map(|(_, u)| u)
            .collect())
    }

    /// Display name of a level, honouring the hierarchy configuration.
    pub fn level_name(&self, level: OrgLevel) -> String {
        self.store.config().level_name(level)
    }

    /// The corporate tree as text, one tree per root corporation.
    pub fn render_corporate_tree(&self) -> Vec<Tree<String>> {
        self.entities().render(self.roots(), &|e: &CorporateEntity| {
            let bsc = if e.has_bsc { " [BSC]" } else { "" };
            format!("{} ({}){}", e.name, e.entity_type, bsc)
        })
    }

    /// The org tree of one company as text.
    pub fn render_org_tree(&self, company_id: &str) -> DomainResult<Tree<String>> {
        let company = self.store.entities().require(company_id)?;
        let config = self.store.config();
        let roots = self.store.units().children(None, Some(company_id));
        let leaves = self.units().render(roots, &|u: &OrgUnit| {
            let bsc = if u.has_bsc { " [BSC]" } else { "" };
            format!("{} ({}){}", u.name, config.level_name(u.level), bsc)
        });
        Ok(Tree::new(company.name.clone()).with_leaves(leaves))
    }
}
