use crate::barrier::Barrier;
use crate::pass::PassHandle;
use crate::resource::ResourceDesc;

/// Live range of a resource in execution-order positions, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLifetime {
    /// First surviving access, usually the write that produces the resource.
    pub producer: usize,
    /// First surviving reader, `None` if nothing reads it.
    pub first_consumer: Option<usize>,
    /// Last surviving access of any kind, the producer itself when never read.
    pub last_consumer: usize,
}

impl ResourceLifetime {
    #[inline]
    pub fn overlaps(&self, other: &ResourceLifetime) -> bool {
        self.producer <= other.last_consumer && other.producer <= self.last_consumer
    }
}

/// One backing allocation shared by transients with disjoint live ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasSlot {
    /// Allocation desc, usage is the union over every resource in the slot.
    pub desc: ResourceDesc,
    pub first_use: usize,
    pub last_use: usize,
    /// Resource ids in the order they take the slot over.
    pub resources: Vec<u32>,
}

/// Execution plan produced by `RenderGraph::compile()`.
///
/// Pure data. Compiling the same declarations twice yields equal plans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledGraph {
    pub(crate) execution_order: Vec<PassHandle>,
    pub(crate) culled_passes: Vec<PassHandle>,
    /// Indexed by pass, what is left after culling.
    pub(crate) pass_ref_counts: Vec<u32>,
    pub(crate) culled_resources: Vec<u32>,
    /// Indexed by resource id.
    pub(crate) lifetimes: Vec<Option<ResourceLifetime>>,
    pub(crate) alias_slots: Vec<AliasSlot>,
    /// Indexed by resource id, `None` for imported or culled resources.
    pub(crate) resource_slots: Vec<Option<usize>>,
    /// `barriers[i]` is issued right before `execution_order[i]`.
    pub(crate) barriers: Vec<Vec<Barrier>>,
    pub(crate) final_barriers: Vec<Barrier>,
}

impl CompiledGraph {
    pub fn execution_order(&self) -> &[PassHandle] {
        &self.execution_order
    }

    pub fn culled_passes(&self) -> &[PassHandle] {
        &self.culled_passes
    }

    pub fn culled_resources(&self) -> &[u32] {
        &self.culled_resources
    }

    pub fn pass_ref_count(&self, pass: PassHandle) -> Option<u32> {
        self.pass_ref_counts.get(pass.index()).copied()
    }

    pub fn lifetime(&self, resource_id: u32) -> Option<ResourceLifetime> {
        self.lifetimes.get(resource_id as usize).copied().flatten()
    }

    pub fn alias_slots(&self) -> &[AliasSlot] {
        &self.alias_slots
    }

    pub fn slot_of(&self, resource_id: u32) -> Option<usize> {
        self.resource_slots.get(resource_id as usize).copied().flatten()
    }

    /// Execution-order position of a pass, `None` when culled.
    pub fn position_of(&self, pass: PassHandle) -> Option<usize> {
        self.execution_order.iter().position(|&p| p == pass)
    }

    pub fn barriers(&self, position: usize) -> &[Barrier] {
        self.barriers.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn final_barriers(&self) -> &[Barrier] {
        &self.final_barriers
    }

    pub fn barrier_count(&self) -> usize {
        self.barriers.iter().map(Vec::len).sum::<usize>() + self.final_barriers.len()
    }
}
