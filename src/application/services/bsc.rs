//! BSC inheritance resolver
//!
//! Answers "which unit's BSC applies here". The walk follows the explicit
//! `inheritBSCFromId` override, else the parent, until it meets a unit that owns
//! a BSC. Nothing is cached: every call reads the store as it is.

use std::fmt;

use tracing::{debug, instrument};

use crate::domain::{
    ChainWalk, CorporateEntity, DomainError, DomainResult, OrgLevel, OrgUnit, TreeStore,
    WalkError,
};

/// How the owner of a resolution was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerBasis {
    /// The unit owns a BSC itself
    Direct,
    /// Reached by following the inheritance chain
    Inherited,
    /// Chain ended without an owner; first BSC directorate of the company
    Fallback,
    /// No owner anywhere
    Unresolved,
}

impl fmt::Display for OwnerBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OwnerBasis::Direct => "direct",
            OwnerBasis::Inherited => "inherited",
            OwnerBasis::Fallback => "company fallback",
            OwnerBasis::Unresolved => "unresolved",
        })
    }
}

/// Owner plus the path that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BscResolution<'a> {
    pub owner: Option<&'a OrgUnit>,
    /// Visited unit ids, starting unit first
    pub chain: Vec<String>,
    pub basis: OwnerBasis,
}

pub struct BscResolver<'a> {
    store: &'a TreeStore,
}

impl<'a> BscResolver<'a> {
    pub fn new(store: &'a TreeStore) -> Self {
        Self { store }
    }

    /// The unit whose BSC applies to `unit_id`, if any.
    pub fn resolve_bsc_owner(&self, unit_id: &str) -> DomainResult<Option<&'a OrgUnit>> {
        Ok(self.explain_bsc_owner(unit_id)?.owner)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn explain_bsc_owner(&self, unit_id: &str) -> DomainResult<BscResolution<'a>> {
        let units = self.store.units();
        let start = units.require(unit_id)?;
        let mut chain = vec![start.id.clone()];

        if start.has_bsc {
            return Ok(BscResolution {
                owner: Some(start),
                chain,
                basis: OwnerBasis::Direct,
            });
        }

        // Dangling links end the chain like a missing one.
        let walk = ChainWalk::new(unit_id, units.max_chain(), |current| {
            units
                .get(current)
                .and_then(|u| u.bsc_link())
                .filter(|next| units.contains(next))
                .map(str::to_string)
        });
        for step in walk {
            let id = step.map_err(|e| match e {
                WalkError::Cycle(id) => DomainError::InheritanceCycle(id),
                WalkError::TooDeep { start, .. } => DomainError::InheritanceCycle(start),
            })?;
            chain.push(id.clone());
            if let Some(unit) = units.get(&id).filter(|u| u.has_bsc) {
                debug!("BSC of {} inherited from {}", unit_id, unit.id);
                return Ok(BscResolution {
                    owner: Some(unit),
                    chain,
                    basis: OwnerBasis::Inherited,
                });
            }
        }

        match self.company_fallback(&start.company_id) {
            Some(directorate) => {
                debug!(
                    "BSC chain of {} ended without owner, falling back to {}",
                    unit_id, directorate.id
                );
                Ok(BscResolution {
                    owner: Some(directorate),
                    chain,
                    basis: OwnerBasis::Fallback,
                })
            }
            None => Ok(BscResolution {
                owner: None,
                chain,
                basis: OwnerBasis::Unresolved,
            }),
        }
    }

    /// Nearest corporate entity at or above `entity_id` that owns a BSC.
    pub fn resolve_entity_bsc_owner(
        &self,
        entity_id: &str,
    ) -> DomainResult<Option<&'a CorporateEntity>> {
        let entities = self.store.entities();
        let start = entities.require(entity_id)?;
        if start.has_bsc {
            return Ok(Some(start));
        }

        let owner = entities
            .parent_walk(entity_id, entities.max_chain())
            .map_while(Result::ok)
            .filter_map(|id| entities.get(&id))
            .find(|e| e.has_bsc);
        Ok(owner)
    }

    /// First directorate of the company, in display order, that owns a BSC.
    fn company_fallback(&self, company_id: &str) -> Option<&'a OrgUnit> {
        self.store
            .units()
            .children(None, Some(company_id))
            .into_iter()
            .find(|u| u.level == OrgLevel::Directorate && u.has_bsc)
    }
}
