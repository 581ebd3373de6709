//! Static dependency graph of a schema.
//!
//! Built once when a schema is frozen. Nodes are declarations, edges point
//! from an upstream attribute to the derived attribute that reads it.
//!
//! # Invariants
//!
//! 1. `order` is a topological order of all nodes; ties are broken by
//!    declaration index, so the order is deterministic and equals declaration
//!    order whenever declarations were already written dependency-first.
//! 2. Only source nodes carry a dependent list. It holds every derived node
//!    reachable from the source, each exactly once, sorted by topological
//!    rank: a derived node comes after every derived node it reads.
//! 3. Building fails on any cycle, including self-dependencies.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::attr::AttrId;

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    upstream: Vec<Vec<AttrId>>,
    downstream: Vec<Vec<AttrId>>,
    order: Vec<AttrId>,
    rank: Vec<usize>,
    dependents: Vec<Vec<AttrId>>,
}

/// Nodes forming a cycle, in dependency direction, first node repeated last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CycleFound(pub Vec<AttrId>);

impl DependencyGraph {
    /// Build from each node's ordered upstream list.
    ///
    /// `is_source[i]` marks nodes that own a dependent list.
    pub(crate) fn build(
        upstream: Vec<Vec<AttrId>>,
        is_source: &[bool],
    ) -> Result<Self, CycleFound> {
        let n = upstream.len();
        let mut downstream = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];
        for (node, ups) in upstream.iter().enumerate() {
            for up in ups {
                downstream[up.index()].push(AttrId::from_index(node));
                indegree[node] += 1;
            }
        }

        // Kahn's algorithm; the min-heap keeps ties in declaration order.
        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(AttrId::from_index(node));
            for down in &downstream[node] {
                let d = &mut indegree[down.index()];
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(down.index()));
                }
            }
        }

        if order.len() < n {
            return Err(CycleFound(find_cycle(&upstream, &indegree)));
        }

        let mut rank = vec![0usize; n];
        for (pos, id) in order.iter().enumerate() {
            rank[id.index()] = pos;
        }

        let dependents = (0..n)
            .map(|node| {
                if is_source.get(node).copied().unwrap_or(false) {
                    reachable_by_rank(node, &downstream, &rank)
                } else {
                    Vec::new()
                }
            })
            .collect();

        Ok(Self {
            upstream,
            downstream,
            order,
            rank,
            dependents,
        })
    }

    /// Attributes `id` reads, in declared order.
    #[must_use]
    pub fn upstream(&self, id: AttrId) -> &[AttrId] {
        self.upstream.get(id.index()).map(Vec::as_slice).unwrap_or_default()
    }

    /// Attributes that read `id` directly.
    #[must_use]
    pub fn downstream(&self, id: AttrId) -> &[AttrId] {
        self.downstream.get(id.index()).map(Vec::as_slice).unwrap_or_default()
    }

    /// Derived attributes to recompute when source `id` changes.
    ///
    /// Empty for derived attributes.
    #[must_use]
    pub fn dependents(&self, id: AttrId) -> &[AttrId] {
        self.dependents.get(id.index()).map(Vec::as_slice).unwrap_or_default()
    }

    /// All attributes in topological order.
    #[must_use]
    pub fn order(&self) -> &[AttrId] {
        &self.order
    }

    /// Position of `id` in [`order`](Self::order).
    #[must_use]
    pub fn rank(&self, id: AttrId) -> Option<usize> {
        self.rank.get(id.index()).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }
}

fn reachable_by_rank(start: usize, downstream: &[Vec<AttrId>], rank: &[usize]) -> Vec<AttrId> {
    let mut seen = vec![false; downstream.len()];
    let mut stack = vec![start];
    let mut found = Vec::new();
    while let Some(node) = stack.pop() {
        for down in &downstream[node] {
            let i = down.index();
            if !seen[i] {
                seen[i] = true;
                found.push(*down);
                stack.push(i);
            }
        }
    }
    found.sort_by_key(|id| rank[id.index()]);
    found
}

/// Walk upstream edges among the nodes Kahn's algorithm could not order.
///
/// Every such node has at least one upstream that is also unordered, so the
/// walk must revisit a node.
fn find_cycle(upstream: &[Vec<AttrId>], indegree: &[usize]) -> Vec<AttrId> {
    let stuck = |i: usize| indegree[i] > 0;
    let Some(start) = (0..upstream.len()).find(|&i| stuck(i)) else {
        return Vec::new();
    };

    let mut position = vec![None; upstream.len()];
    let mut path = Vec::new();
    let mut node = start;
    loop {
        if let Some(pos) = position[node] {
            let mut cycle: Vec<AttrId> = path[pos..].to_vec();
            // The walk followed reads; report in dependency direction.
            cycle.reverse();
            cycle.push(cycle[0]);
            return cycle;
        }
        position[node] = Some(path.len());
        path.push(AttrId::from_index(node));
        match upstream[node].iter().map(|u| u.index()).find(|&u| stuck(u)) {
            Some(next) => node = next,
            None => return path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<AttrId> {
        raw.iter().copied().map(AttrId::from_index).collect()
    }

    /// a=0, b=1 sources; c=2 reads a,b; d=3 reads c.
    fn chain() -> DependencyGraph {
        DependencyGraph::build(
            vec![vec![], vec![], ids(&[0, 1]), ids(&[2])],
            &[true, true, false, false],
        )
        .expect("acyclic")
    }

    #[test]
    fn sources_hold_flattened_dependents() {
        let g = chain();
        assert_eq!(g.dependents(AttrId::from_index(0)), ids(&[2, 3]).as_slice());
        assert_eq!(g.dependents(AttrId::from_index(1)), ids(&[2, 3]).as_slice());
        assert!(g.dependents(AttrId::from_index(2)).is_empty());
        assert!(g.dependents(AttrId::from_index(3)).is_empty());
    }

    #[test]
    fn order_matches_declaration_when_already_sorted() {
        let g = chain();
        assert_eq!(g.order(), ids(&[0, 1, 2, 3]).as_slice());
        assert_eq!(g.rank(AttrId::from_index(3)), Some(3));
    }

    #[test]
    fn misordered_declarations_are_sorted() {
        // 0: d reads 1; 1: c reads 2,3; 2: a; 3: b.
        let g = DependencyGraph::build(
            vec![ids(&[1]), ids(&[2, 3]), vec![], vec![]],
            &[false, false, true, true],
        )
        .expect("acyclic");
        assert_eq!(g.order(), ids(&[2, 3, 1, 0]).as_slice());
        assert_eq!(g.dependents(AttrId::from_index(2)), ids(&[1, 0]).as_slice());
    }

    #[test]
    fn diamond_lists_each_dependent_once() {
        // 0: s; 1: l reads s; 2: r reads s; 3: j reads l, r, s.
        let g = DependencyGraph::build(
            vec![vec![], ids(&[0]), ids(&[0]), ids(&[1, 2, 0])],
            &[true, false, false, false],
        )
        .expect("acyclic");
        assert_eq!(g.dependents(AttrId::from_index(0)), ids(&[1, 2, 3]).as_slice());
        assert_eq!(g.downstream(AttrId::from_index(0)), ids(&[1, 2, 3]).as_slice());
    }

    #[test]
    fn duplicate_upstream_edges_are_tolerated() {
        let g = DependencyGraph::build(vec![vec![], ids(&[0, 0])], &[true, false])
            .expect("acyclic");
        assert_eq!(g.dependents(AttrId::from_index(0)), ids(&[1]).as_slice());
    }

    #[test]
    fn cycle_is_reported_with_path() {
        // 0: s; 1 reads 2; 2 reads 1.
        let err = DependencyGraph::build(
            vec![vec![], ids(&[0, 2]), ids(&[1])],
            &[true, false, false],
        )
        .expect_err("cycle");
        assert_eq!(err.0.first(), err.0.last());
        assert_eq!(err.0.len(), 3);
        assert!(err.0.contains(&AttrId::from_index(1)));
        assert!(err.0.contains(&AttrId::from_index(2)));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = DependencyGraph::build(vec![ids(&[0])], &[false]).expect_err("cycle");
        assert_eq!(err.0, ids(&[0, 0]));
    }

    #[test]
    fn node_downstream_of_cycle_is_not_blamed() {
        // 0 <-> 1 cycle, 2 reads 0.
        let err = DependencyGraph::build(vec![ids(&[1]), ids(&[0]), ids(&[0])], &[false; 3])
            .expect_err("cycle");
        assert!(!err.0.contains(&AttrId::from_index(2)));
    }
}
