//! Bounded chain traversal with a visited-set.
//!
//! Shared by the reparent cycle check, ancestor queries, the authority
//! resolver and the BSC inheritance walk. A walk never loops: a revisited id
//! or a chain longer than `max_depth` ends it with an error.

use std::collections::HashSet;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    #[error("chain revisits node: {0}")]
    Cycle(String),

    #[error("chain from {start} exceeds {max_depth} steps")]
    TooDeep { start: String, max_depth: usize },
}

impl WalkError {
    /// Node at which the walk stopped.
    pub fn node(&self) -> &str {
        match self {
            WalkError::Cycle(id) => id,
            WalkError::TooDeep { start, .. } => start,
        }
    }
}

/// Iterator over the ids reachable from `start` by repeatedly applying `step`.
///
/// Yields successors only (not `start` itself). After the first error the
/// iterator is exhausted.
pub struct ChainWalk<F> {
    step: F,
    start: String,
    current: Option<String>,
    visited: HashSet<String>,
    max_depth: usize,
    steps: usize,
}

impl<F> ChainWalk<F>
where
    F: FnMut(&str) -> Option<String>,
{
    pub fn new(start: impl Into<String>, max_depth: usize, step: F) -> Self {
        let start = start.into();
        let mut visited = HashSet::new();
        visited.insert(start.clone());
        Self {
            step,
            current: Some(start.clone()),
            start,
            visited,
            max_depth,
            steps: 0,
        }
    }
}

impl<F> Iterator for ChainWalk<F>
where
    F: FnMut(&str) -> Option<String>,
{
    type Item = Result<String, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let next = (self.step)(&current)?;

        if !self.visited.insert(next.clone()) {
            return Some(Err(WalkError::Cycle(next)));
        }
        self.steps += 1;
        if self.steps > self.max_depth {
            return Some(Err(WalkError::TooDeep {
                start: self.start.clone(),
                max_depth: self.max_depth,
            }));
        }

        self.current = Some(next.clone());
        Some(Ok(next))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn walk_chain<F>(start: &str, max_depth: usize, step: F) -> Result<Vec<String>, WalkError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        ChainWalk::new(start, max_depth, step).collect()
    }

    fn links(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn given_linear_chain_when_walking_then_yields_nearest_first() {
        let parents = links(&[("c", "b"), ("b", "a")]);
        let chain = walk_chain("c", 10, |id| parents.get(id).cloned()).unwrap();
        assert_eq!(chain, vec!["b", "a"]);
    }

    #[test]
    fn given_cycle_when_walking_then_reports_revisited_node() {
        let parents = links(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let result = walk_chain("a", 10, |id| parents.get(id).cloned());
        assert_eq!(result, Err(WalkError::Cycle("a".into())));
    }

    #[test]
    fn given_self_loop_when_walking_then_reports_cycle() {
        let parents = links(&[("a", "a")]);
        let result = walk_chain("a", 10, |id| parents.get(id).cloned());
        assert_eq!(result, Err(WalkError::Cycle("a".into())));
    }

    #[test]
    fn given_chain_longer_than_bound_when_walking_then_too_deep() {
        let parents = links(&[("d", "c"), ("c", "b"), ("b", "a")]);
        let result = walk_chain("d", 2, |id| parents.get(id).cloned());
        assert!(matches!(result, Err(WalkError::TooDeep { max_depth: 2, .. })));
    }

    #[test]
    fn given_early_match_when_iterating_then_stops_without_walking_rest() {
        let parents = links(&[("d", "c"), ("c", "b"), ("b", "a")]);
        let mut calls = 0;
        let found = ChainWalk::new("d", 10, |id| {
            calls += 1;
            parents.get(id).cloned()
        })
        .find(|r| matches!(r, Ok(id) if id == "c"));
        assert_eq!(found, Some(Ok("c".to_string())));
        assert_eq!(calls, 1);
    }
}
