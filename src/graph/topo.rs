//! Cycle-detecting depth-first graph walks.
//!
//! Both walks keep an explicit work stack instead of recursing, so deep
//! dependency chains cannot exhaust the call stack.

use std::collections::HashSet;

use crate::graph::identifiable::Identifiable;

/// Failure of a generic graph walk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("unexpected cycle in graph")]
    UnexpectedCycle,
}

struct Frame<T, I> {
    node: T,
    successors: I,
}

/// Every node reachable from `nodes`, each after all of its predecessors.
///
/// The result is the reverse post-order of a depth-first walk. Reaching a
/// node that is on the current path fails with
/// [`GraphError::UnexpectedCycle`].
pub fn topological_sort<T, I, F>(
    nodes: impl IntoIterator<Item = T>,
    mut successors: F,
) -> Result<Vec<T>, GraphError>
where
    T: Identifiable,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> I,
{
    let mut visited: HashSet<T::Id> = HashSet::new();
    let mut on_path: HashSet<T::Id> = HashSet::new();
    let mut result: Vec<T> = Vec::new();

    for root in nodes {
        if visited.contains(&root.id()) {
            continue;
        }
        on_path.insert(root.id());
        let succ = successors(&root).into_iter();
        let mut work = vec![Frame {
            node: root,
            successors: succ,
        }];

        while let Some(frame) = work.last_mut() {
            match frame.successors.next() {
                Some(next) => {
                    let id = next.id();
                    if visited.contains(&id) {
                        continue;
                    }
                    if !on_path.insert(id) {
                        return Err(GraphError::UnexpectedCycle);
                    }
                    let succ = successors(&next).into_iter();
                    work.push(Frame {
                        node: next,
                        successors: succ,
                    });
                }
                None => {
                    if let Some(done) = work.pop() {
                        let id = done.node.id();
                        on_path.remove(&id);
                        visited.insert(id);
                        result.push(done.node);
                    }
                }
            }
        }
    }

    result.reverse();
    Ok(result)
}

/// A cycle found by [`find_cycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle<T> {
    /// Nodes walked from an input before entering the cycle.
    pub path: Vec<T>,
    /// The cycle itself; its last node leads back to the first.
    pub cycle: Vec<T>,
}

/// First cycle reachable from `nodes`, if any.
pub fn find_cycle<T, I, F>(nodes: impl IntoIterator<Item = T>, mut successors: F) -> Option<Cycle<T>>
where
    T: Identifiable + Clone,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> I,
{
    let mut visited: HashSet<T::Id> = HashSet::new();

    for root in nodes {
        if visited.contains(&root.id()) {
            continue;
        }
        let succ = successors(&root).into_iter();
        let mut work = vec![Frame {
            node: root,
            successors: succ,
        }];

        while let Some(frame) = work.last_mut() {
            match frame.successors.next() {
                Some(next) => {
                    let id = next.id();
                    if visited.contains(&id) {
                        continue;
                    }
                    if let Some(start) = work.iter().position(|f| f.node.id() == id) {
                        let mut nodes: Vec<T> = work.into_iter().map(|f| f.node).collect();
                        let cycle = nodes.split_off(start);
                        return Some(Cycle { path: nodes, cycle });
                    }
                    let succ = successors(&next).into_iter();
                    work.push(Frame {
                        node: next,
                        successors: succ,
                    });
                }
                None => {
                    if let Some(done) = work.pop() {
                        visited.insert(done.node.id());
                    }
                }
            }
        }
    }

    None
}
