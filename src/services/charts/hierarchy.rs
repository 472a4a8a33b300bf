use std::collections::{HashMap, HashSet, VecDeque};

use super::source::HierarchyEdge;
use super::ChartError;

/// Computes the descendant closure of `root` (inclusive) from a stored edge
/// enumeration, replacing the recursive CTE the schema was written for.
///
/// Breadth-first expansion over parent→child edges with a visited guard:
/// a node reached twice means the stored parent references contain a cycle
/// or a duplicated node row, which is surfaced as a data integrity failure
/// instead of looping. A root absent from the enumeration is `NodeNotFound`.
pub fn resolve_subtree(root: i32, edges: &[HierarchyEdge]) -> Result<Vec<i32>, ChartError> {
    let known: HashSet<i32> = edges.iter().map(|edge| edge.id).collect();
    if !known.contains(&root) {
        return Err(ChartError::NodeNotFound(root));
    }

    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for edge in edges {
        if let Some(parent) = edge.parent_id {
            children.entry(parent).or_default().push(edge.id);
        }
    }

    let mut visited: HashSet<i32> = HashSet::from([root]);
    let mut queue: VecDeque<i32> = VecDeque::from([root]);
    let mut subtree = vec![root];
    while let Some(node) = queue.pop_front() {
        for &child in children.get(&node).into_iter().flatten() {
            if !visited.insert(child) {
                return Err(ChartError::DataIntegrity(format!(
                    "hierarchy node {child} reached twice while expanding subtree of {root}; \
                     parent references form a cycle or a duplicated row"
                )));
            }
            subtree.push(child);
            queue.push_back(child);
        }
    }

    subtree.sort_unstable();
    Ok(subtree)
}
