use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::error::{RenderGraphError, Result};
use crate::graph_resource::{ResourceHandle, ResourceNode};
use crate::pass::PassNode;

/// `(from, to)` pass indices mapped to the resource ids carrying the dependency.
pub(crate) type DependencyEdges = BTreeMap<(usize, usize), Vec<u32>>;

/// Every handle a pass declared must name a resource of this graph at a version that exists.
pub(crate) fn validate_handles(passes: &[PassNode], resources: &[ResourceNode]) -> Result<()> {
    let is_known = |handle: &ResourceHandle| {
        handle.is_valid()
            && resources
                .get(handle.id as usize)
                .map_or(false, |node| handle.version <= node.version)
    };

    for pass in passes {
        let declared = pass
            .inputs
            .iter()
            .chain(pass.outputs.iter())
            .map(|access| &access.handle)
            .chain(pass.destroys.iter());

        for handle in declared {
            if !is_known(handle) {
                return Err(RenderGraphError::DanglingHandle {
                    pass: pass.name.clone(),
                    handle: *handle,
                });
            }
        }
    }

    Ok(())
}

/// Run Kahn's algorithm over every declared pass, culled or not, and report the
/// first cycle found among the passes it could not order.
pub(crate) fn check_cycles(
    passes: &[PassNode],
    resources: &[ResourceNode],
    edges: &DependencyEdges,
) -> Result<()> {
    let pass_count = passes.len();
    let mut in_degree = vec![0u32; pass_count];
    let mut successors = vec![Vec::new(); pass_count];
    let mut predecessors = vec![Vec::new(); pass_count];

    for &(from, to) in edges.keys() {
        successors[from].push(to);
        predecessors[to].push(from);
        in_degree[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..pass_count)
        .filter(|&p| in_degree[p] == 0)
        .map(Reverse)
        .collect();
    let mut visited = vec![false; pass_count];

    while let Some(Reverse(pass)) = ready.pop() {
        visited[pass] = true;
        for &next in &successors[pass] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    let start = match visited.iter().position(|v| !v) {
        Some(start) => start,
        None => return Ok(()),
    };

    // every unvisited pass keeps at least one unvisited predecessor, walking them must loop
    let mut walk = vec![start];
    let mut on_walk = vec![None; pass_count];
    on_walk[start] = Some(0);

    let loop_start = loop {
        let current = walk[walk.len() - 1];
        let prev = predecessors[current]
            .iter()
            .copied()
            .find(|&p| !visited[p])
            .unwrap_or(current);

        if let Some(idx) = on_walk[prev] {
            break idx;
        }
        on_walk[prev] = Some(walk.len());
        walk.push(prev);
    };

    let mut cycle: Vec<usize> = walk[loop_start..].iter().rev().copied().collect();
    let min_pos = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, pass)| *pass)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    cycle.rotate_left(min_pos);

    let resource_names = (0..cycle.len())
        .map(|i| {
            let key = (cycle[i], cycle[(i + 1) % cycle.len()]);
            edges
                .get(&key)
                .map(|ids| ids.iter().map(|&id| resources[id as usize].name.clone()).collect())
                .unwrap_or_default()
        })
        .collect();

    let pass_names: Vec<String> = cycle.iter().map(|&p| passes[p].name.clone()).collect();
    glog::error!("Render graph cycle detected between passes {:?}", pass_names);

    Err(RenderGraphError::GraphCycle {
        passes: pass_names,
        resources: resource_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_resource::ResourceRegistry;
    use crate::resource::{Format, ResourceDesc};

    fn named_passes(names: &[&str]) -> Vec<PassNode> {
        names.iter().map(|n| PassNode::new(n.to_string())).collect()
    }

    #[test]
    fn acyclic_edges_pass() {
        let passes = named_passes(&["A", "B", "C"]);
        let mut edges = DependencyEdges::new();
        edges.insert((0, 1), vec![]);
        edges.insert((1, 2), vec![]);

        assert!(check_cycles(&passes, &[], &edges).is_ok());
    }

    #[test]
    fn cycle_is_reported_from_its_lowest_pass() {
        let mut registry = ResourceRegistry::new();
        let desc = ResourceDesc::texture_2d(4, 4, Format::Rgba8Unorm);
        for name in ["X", "Y", "Z"] {
            registry.create_transient(desc, name);
        }

        // 0 feeds the loop 1 -> 2 -> 3 -> 1
        let passes = named_passes(&["Root", "P1", "P2", "P3"]);
        let mut edges = DependencyEdges::new();
        edges.insert((0, 1), vec![]);
        edges.insert((1, 2), vec![0]);
        edges.insert((2, 3), vec![1]);
        edges.insert((3, 1), vec![2]);

        match check_cycles(&passes, registry.nodes(), &edges) {
            Err(RenderGraphError::GraphCycle { passes, resources }) => {
                assert_eq!(passes, vec!["P1", "P2", "P3"]);
                assert_eq!(resources, vec![vec!["X"], vec!["Y"], vec!["Z"]]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }
}
