use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::barrier::{Barrier, ResourceState};
use crate::compiled_graph::{AliasSlot, CompiledGraph, ResourceLifetime};
use crate::error::Result;
use crate::graph_resource::{ResourceNode, ResourceOrigin};
use crate::pass::{PassHandle, PassNode};
use crate::validation::{self, DependencyEdges};

/// `(resource id, version)`
type VersionKey = (u32, u32);

struct Dependencies {
    edges: DependencyEdges,
    /// Distinct passes consuming a version: its readers and the writer of the next version.
    consumers: HashMap<VersionKey, Vec<usize>>,
}

/// Turns the declared passes and resources into a `CompiledGraph`.
///
/// Reads the declarations only, all results land in the returned plan.
pub(crate) struct GraphCompiler<'a> {
    passes: &'a [PassNode],
    resources: &'a [ResourceNode],
}

impl<'a> GraphCompiler<'a> {
    pub(crate) fn new(passes: &'a [PassNode], resources: &'a [ResourceNode]) -> Self {
        Self { passes, resources }
    }

    pub(crate) fn compile(&self) -> Result<CompiledGraph> {
        glog::debug!(
            "Compiling render graph with {} passes and {} resources",
            self.passes.len(),
            self.resources.len()
        );

        validation::validate_handles(self.passes, self.resources)?;

        let deps = self.build_dependencies();
        validation::check_cycles(self.passes, self.resources, &deps.edges)?;

        let mut pass_ref_counts = self.compute_ref_counts(&deps);
        let culled = self.cull_passes(&mut pass_ref_counts);

        let execution_order = self.sort_passes(&deps.edges, &culled);
        let culled_passes: Vec<PassHandle> = (0..self.passes.len())
            .filter(|&p| culled[p])
            .map(|p| PassHandle(p as u32))
            .collect();

        let lifetimes = self.compute_lifetimes(&execution_order);
        let culled_resources: Vec<u32> = self
            .resources
            .iter()
            .enumerate()
            .filter(|(id, node)| lifetimes[*id].is_none() && !node.externally_visible)
            .map(|(id, _)| id as u32)
            .collect();

        let (alias_slots, resource_slots) = self.assign_alias_slots(&lifetimes);
        let (barriers, final_barriers) =
            self.plan_barriers(&execution_order, &resource_slots, alias_slots.len());

        glog::debug!(
            "Render graph compiled: {} passes ordered, {} culled, {} alias slots",
            execution_order.len(),
            culled_passes.len(),
            alias_slots.len()
        );

        Ok(CompiledGraph {
            execution_order,
            culled_passes,
            pass_ref_counts,
            culled_resources,
            lifetimes,
            alias_slots,
            resource_slots,
            barriers,
            final_barriers,
        })
    }

    fn build_dependencies(&self) -> Dependencies {
        let mut edges = DependencyEdges::new();
        let mut readers: HashMap<VersionKey, Vec<usize>> = HashMap::new();
        let mut consumers: HashMap<VersionKey, Vec<usize>> = HashMap::new();

        let mut add_edge = |from: usize, to: usize, resource: u32| {
            if from == to {
                return;
            }
            let carried = edges.entry((from, to)).or_insert_with(Vec::new);
            if !carried.contains(&resource) {
                carried.push(resource);
            }
        };

        fn push_distinct(list: &mut Vec<usize>, pass: usize) {
            if list.last() != Some(&pass) {
                list.push(pass);
            }
        }

        for (p, pass) in self.passes.iter().enumerate() {
            for input in &pass.inputs {
                let key = (input.handle.id, input.handle.version);
                push_distinct(readers.entry(key).or_default(), p);
                push_distinct(consumers.entry(key).or_default(), p);

                // read after write
                if let Some(producer) = self.resources[input.handle.id as usize].producer_of(input.handle.version) {
                    add_edge(producer.index(), p, input.handle.id);
                }
            }

            for output in &pass.outputs {
                if output.handle.version <= 1 {
                    continue;
                }

                // a write consumes the version it replaces
                let key = (output.handle.id, output.handle.version - 1);
                push_distinct(consumers.entry(key).or_default(), p);

                if let Some(producer) = self.resources[output.handle.id as usize].producer_of(key.1) {
                    add_edge(producer.index(), p, output.handle.id);
                }
            }
        }

        // write after read: the writer of `v + 1` waits for every reader of `v`,
        // and a pass destroying `v` waits for its producer and readers
        for (p, pass) in self.passes.iter().enumerate() {
            let replaced = pass
                .outputs
                .iter()
                .filter(|output| output.handle.version > 1)
                .map(|output| (output.handle.id, output.handle.version - 1));
            let destroyed = pass.destroys.iter().map(|handle| (handle.id, handle.version));

            for key in replaced.chain(destroyed) {
                if let Some(list) = readers.get(&key) {
                    for &reader in list {
                        add_edge(reader, p, key.0);
                    }
                }
            }

            for handle in &pass.destroys {
                if let Some(producer) = self.resources[handle.id as usize].producer_of(handle.version) {
                    add_edge(producer.index(), p, handle.id);
                }
            }
        }

        glog::trace!("Render graph dependency edges: {:?}", edges);

        Dependencies { edges, consumers }
    }

    /// Versions a pass depends on, each listed once.
    fn consumed_versions(&self, pass: usize) -> Vec<VersionKey> {
        let node = &self.passes[pass];
        let mut versions: Vec<VersionKey> = node
            .inputs
            .iter()
            .map(|input| (input.handle.id, input.handle.version))
            .chain(
                node.outputs
                    .iter()
                    .filter(|output| output.handle.version > 1)
                    .map(|output| (output.handle.id, output.handle.version - 1)),
            )
            .collect();

        versions.sort_unstable();
        versions.dedup();
        versions
    }

    fn compute_ref_counts(&self, deps: &Dependencies) -> Vec<u32> {
        self.passes
            .iter()
            .enumerate()
            .map(|(p, pass)| {
                let produced: u32 = pass
                    .outputs
                    .iter()
                    .map(|output| {
                        let key = (output.handle.id, output.handle.version);
                        let readers = deps
                            .consumers
                            .get(&key)
                            .map_or(0, |list| list.iter().filter(|&&c| c != p).count() as u32);

                        let node = &self.resources[key.0 as usize];
                        let visible = (node.externally_visible && node.version == key.1) as u32;

                        readers + visible
                    })
                    .sum();

                produced + pass.has_side_effect as u32
            })
            .collect()
    }

    /// Iterative mark and sweep, culling a pass releases what it consumed.
    fn cull_passes(&self, ref_counts: &mut [u32]) -> Vec<bool> {
        let mut culled = vec![false; self.passes.len()];
        let mut worklist: Vec<usize> = (0..self.passes.len()).filter(|&p| ref_counts[p] == 0).collect();
        for &p in &worklist {
            culled[p] = true;
        }

        while let Some(p) = worklist.pop() {
            glog::debug!("Culling pass '{}'", self.passes[p].name);

            for (id, version) in self.consumed_versions(p) {
                let producer = match self.resources[id as usize].producer_of(version) {
                    Some(producer) => producer.index(),
                    None => continue,
                };

                if producer == p || culled[producer] {
                    continue;
                }

                ref_counts[producer] = ref_counts[producer].saturating_sub(1);
                if ref_counts[producer] == 0 {
                    culled[producer] = true;
                    worklist.push(producer);
                }
            }
        }

        culled
    }

    /// Kahn's algorithm over the surviving passes, lowest declaration index first among ready ones.
    fn sort_passes(&self, edges: &DependencyEdges, culled: &[bool]) -> Vec<PassHandle> {
        let pass_count = self.passes.len();
        let mut in_degree = vec![0u32; pass_count];
        let mut successors = vec![Vec::new(); pass_count];

        for &(from, to) in edges.keys() {
            if culled[from] || culled[to] {
                continue;
            }
            successors[from].push(to);
            in_degree[to] += 1;
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..pass_count)
            .filter(|&p| !culled[p] && in_degree[p] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(pass_count);
        while let Some(Reverse(pass)) = ready.pop() {
            order.push(PassHandle(pass as u32));
            for &next in &successors[pass] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        order
    }

    fn compute_lifetimes(&self, order: &[PassHandle]) -> Vec<Option<ResourceLifetime>> {
        #[derive(Clone, Copy)]
        struct Span {
            first_access: usize,
            first_read: Option<usize>,
            last_access: usize,
        }

        fn touch(span: &mut Option<Span>, pos: usize, is_read: bool) {
            let span = span.get_or_insert(Span {
                first_access: pos,
                first_read: None,
                last_access: pos,
            });
            span.last_access = span.last_access.max(pos);
            if is_read && span.first_read.is_none() {
                span.first_read = Some(pos);
            }
        }

        let mut spans: Vec<Option<Span>> = vec![None; self.resources.len()];

        for (pos, pass) in order.iter().enumerate() {
            let node = &self.passes[pass.index()];
            for input in &node.inputs {
                touch(&mut spans[input.handle.id as usize], pos, true);
            }
            for output in &node.outputs {
                touch(&mut spans[output.handle.id as usize], pos, false);
            }
            for destroyed in &node.destroys {
                touch(&mut spans[destroyed.id as usize], pos, false);
            }
        }

        let last_position = order.len().saturating_sub(1);

        spans
            .into_iter()
            .zip(self.resources.iter())
            .map(|(span, node)| {
                span.map(|span| {
                    let mut last_consumer = span.last_access;
                    // exported transients stay alive until the graph finishes
                    if node.externally_visible && node.origin == ResourceOrigin::Transient {
                        last_consumer = last_position;
                    }

                    // a transient read before its first write is live from that read
                    ResourceLifetime {
                        producer: span.first_access,
                        first_consumer: span.first_read,
                        last_consumer,
                    }
                })
            })
            .collect()
    }

    /// Greedy interval coloring of the surviving transients.
    fn assign_alias_slots(&self, lifetimes: &[Option<ResourceLifetime>]) -> (Vec<AliasSlot>, Vec<Option<usize>>) {
        let mut candidates: Vec<(ResourceLifetime, u32)> = self
            .resources
            .iter()
            .enumerate()
            .filter(|(_, node)| node.origin == ResourceOrigin::Transient)
            .filter_map(|(id, _)| lifetimes[id].map(|lifetime| (lifetime, id as u32)))
            .collect();
        candidates.sort_by_key(|(lifetime, id)| (lifetime.producer, *id));

        let mut slots: Vec<AliasSlot> = Vec::new();
        let mut resource_slots = vec![None; self.resources.len()];

        for (lifetime, id) in candidates {
            let desc = self.resources[id as usize].desc;

            let reusable = slots
                .iter()
                .position(|slot| slot.last_use < lifetime.producer && slot.desc.is_alias_compatible(&desc));

            let slot_idx = match reusable {
                Some(idx) => {
                    let slot = &mut slots[idx];
                    glog::trace!(
                        "'{}' reuses alias slot {} after #{:?}",
                        self.resources[id as usize].name,
                        idx,
                        slot.resources.last()
                    );
                    slot.desc.usage |= desc.usage;
                    slot.last_use = lifetime.last_consumer;
                    slot.resources.push(id);
                    idx
                }
                None => {
                    slots.push(AliasSlot {
                        desc,
                        first_use: lifetime.producer,
                        last_use: lifetime.last_consumer,
                        resources: vec![id],
                    });
                    slots.len() - 1
                }
            };

            resource_slots[id as usize] = Some(slot_idx);
        }

        (slots, resource_slots)
    }

    fn plan_barriers(
        &self,
        order: &[PassHandle],
        resource_slots: &[Option<usize>],
        slot_count: usize,
    ) -> (Vec<Vec<Barrier>>, Vec<Barrier>) {
        let mut current_state: Vec<ResourceState> = self.resources.iter().map(|node| node.initial_state()).collect();
        let mut touched = vec![false; self.resources.len()];
        let mut slot_owner: Vec<Option<u32>> = vec![None; slot_count];

        let mut barriers = Vec::with_capacity(order.len());

        for pass in order {
            let node = &self.passes[pass.index()];

            // one state per resource, writes win over reads
            let mut accesses: Vec<(u32, ResourceState)> = Vec::new();
            for input in &node.inputs {
                if !accesses.iter().any(|(id, _)| *id == input.handle.id) {
                    accesses.push((input.handle.id, input.state));
                }
            }
            for output in &node.outputs {
                match accesses.iter_mut().find(|(id, _)| *id == output.handle.id) {
                    Some(access) => access.1 = output.state,
                    None => accesses.push((output.handle.id, output.state)),
                }
            }

            let mut pass_barriers = Vec::new();
            for (id, state) in accesses {
                let res = id as usize;

                if let Some(slot) = resource_slots[res] {
                    if slot_owner[slot] != Some(id) {
                        if let Some(previous) = slot_owner[slot] {
                            pass_barriers.push(Barrier::aliasing(id, previous));
                        }
                        slot_owner[slot] = Some(id);
                    }
                }

                let before = current_state[res];
                if before != state {
                    pass_barriers.push(Barrier::transition(id, before, state));
                } else if state == ResourceState::UnorderedAccess && touched[res] {
                    pass_barriers.push(Barrier::unordered_access(id));
                }

                current_state[res] = state;
                touched[res] = true;
            }

            barriers.push(pass_barriers);
        }

        let final_barriers = self
            .resources
            .iter()
            .enumerate()
            .filter(|(id, node)| node.present && current_state[*id] != ResourceState::Present)
            .map(|(id, _)| Barrier::transition(id as u32, current_state[id], ResourceState::Present))
            .collect();

        (barriers, final_barriers)
    }
}
