//! Circular dependency detection for formula cells.
//!
//! A formula must not (transitively) read its own result: A1 reads B1,
//! B1 reads C1, C1 reads A1. This module walks edges depth-first with a
//! recursion stack and reports the first cycle it closes as a path.
//!
//! The walk is iterative so long reference chains cannot overflow the stack.

use std::collections::HashSet;

use super::CellCoordinate;

/// Detect a cycle reachable from any of `roots`.
///
/// `neighbors` yields the outgoing edges of a node. Returns the path from the
/// first occurrence of the repeated node through the repeat (inclusive),
/// e.g. `[A1, B1, A1]`, or None if no cycle is reachable.
pub fn detect_cycle<'a, I, F>(roots: I, neighbors: F) -> Option<Vec<CellCoordinate>>
where
    I: IntoIterator<Item = &'a CellCoordinate>,
    F: Fn(&CellCoordinate) -> Vec<CellCoordinate>,
{
    let mut visited = HashSet::new();
    for root in roots {
        if visited.contains(root) {
            continue;
        }
        if let Some(cycle) = detect_cycle_dfs(root, &neighbors, &mut visited) {
            return Some(cycle);
        }
    }
    None
}

fn detect_cycle_dfs<F>(
    root: &CellCoordinate,
    neighbors: &F,
    visited: &mut HashSet<CellCoordinate>,
) -> Option<Vec<CellCoordinate>>
where
    F: Fn(&CellCoordinate) -> Vec<CellCoordinate>,
{
    visited.insert(root.clone());
    let mut path = vec![root.clone()];
    let mut on_path: HashSet<CellCoordinate> = HashSet::from([root.clone()]);
    // One frame per node on `path`: its outgoing edges and the next one to try.
    let mut frames: Vec<(Vec<CellCoordinate>, usize)> = vec![(neighbors(root), 0)];

    loop {
        let Some(frame) = frames.last_mut() else {
            return None;
        };
        let next = frame.0.get(frame.1).cloned();
        frame.1 += 1;

        let Some(neighbor) = next else {
            frames.pop();
            if let Some(done) = path.pop() {
                on_path.remove(&done);
            }
            continue;
        };

        if on_path.contains(&neighbor) {
            let start = path.iter().position(|c| *c == neighbor).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(neighbor);
            return Some(cycle);
        }

        if visited.insert(neighbor.clone()) {
            frames.push((neighbors(&neighbor), 0));
            path.push(neighbor.clone());
            on_path.insert(neighbor);
        }
    }
}
