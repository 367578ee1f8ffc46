use std::collections::HashMap;
use std::fmt;

use crate::barrier::ResourceState;
use crate::compiled_graph::ResourceLifetime;
use crate::device::NativeHandle;
use crate::error::{RenderGraphError, Result};
use crate::pass::PassHandle;
use crate::resource::ResourceDesc;

/// Render graph resource handle to the inner resources of the render graph.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct ResourceHandle {
    /// Slot id of the resource in the render graph.
    pub(crate) id: u32,
    /// Bumped on every write, starts at 1.
    pub(crate) version: u32,
}

impl ResourceHandle {
    pub const INVALID: ResourceHandle = ResourceHandle {
        id: u32::MAX,
        version: 0,
    };

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id != u32::MAX && self.version != 0
    }

    #[inline]
    pub(crate) fn next_version(self) -> Self {
        Self {
            id: self.id,
            version: self.version + 1,
        }
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.id, self.version)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResourceOrigin {
    /// Allocated and released by the executor.
    Transient,
    /// Lives outside the graph, never allocated nor freed by it.
    Imported {
        native: NativeHandle,
        initial_state: ResourceState,
    },
}

/// One logical resource of the graph, transient or imported.
pub struct ResourceNode {
    pub(crate) desc: ResourceDesc,
    pub(crate) name: String,
    pub(crate) origin: ResourceOrigin,
    /// Latest version handed out.
    pub(crate) version: u32,
    /// `version_producers[v - 1]` is the pass that produced version `v`.
    pub(crate) version_producers: Vec<Option<PassHandle>>,
    pub(crate) externally_visible: bool,
    pub(crate) present: bool,

    pub(crate) lifetime: Option<ResourceLifetime>,
    pub(crate) is_culled: bool,
    pub(crate) alias_slot: Option<usize>,
    pub(crate) native_handle: Option<NativeHandle>,
}

impl ResourceNode {
    fn new(desc: ResourceDesc, name: String, origin: ResourceOrigin) -> Self {
        let native_handle = match origin {
            ResourceOrigin::Imported { native, .. } => Some(native),
            ResourceOrigin::Transient => None,
        };

        Self {
            desc,
            name,
            origin,
            version: 1,
            version_producers: vec![None],
            externally_visible: false,
            present: false,
            lifetime: None,
            is_culled: false,
            alias_slot: None,
            native_handle,
        }
    }

    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_version(&self) -> u32 {
        self.version
    }

    pub fn is_imported(&self) -> bool {
        matches!(self.origin, ResourceOrigin::Imported { .. })
    }

    pub fn is_externally_visible(&self) -> bool {
        self.externally_visible
    }

    /// No surviving pass touches the resource and it is not externally visible.
    ///
    /// A resource written by a surviving side-effect pass but never read is not culled,
    /// it still needs backing memory for that write.
    pub fn is_culled(&self) -> bool {
        self.is_culled
    }

    /// Positions in the compiled execution order, `None` before compilation or when culled.
    pub fn producer_pass_index(&self) -> Option<usize> {
        self.lifetime.map(|l| l.producer)
    }

    pub fn first_consumer_pass_index(&self) -> Option<usize> {
        self.lifetime.and_then(|l| l.first_consumer)
    }

    pub fn last_consumer_pass_index(&self) -> Option<usize> {
        self.lifetime.map(|l| l.last_consumer)
    }

    pub fn lifetime(&self) -> Option<ResourceLifetime> {
        self.lifetime
    }

    pub fn alias_slot(&self) -> Option<usize> {
        self.alias_slot
    }

    /// Native resource backing this node while the graph is executing.
    /// Imported resources always have one.
    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.native_handle
    }

    pub(crate) fn initial_state(&self) -> ResourceState {
        match self.origin {
            ResourceOrigin::Imported { initial_state, .. } => initial_state,
            ResourceOrigin::Transient => ResourceState::Undefined,
        }
    }

    pub(crate) fn producer_of(&self, version: u32) -> Option<PassHandle> {
        version
            .checked_sub(1)
            .and_then(|idx| self.version_producers.get(idx as usize))
            .copied()
            .flatten()
    }

    pub(crate) fn reset_compiled_state(&mut self) {
        self.lifetime = None;
        self.is_culled = false;
        self.alias_slot = None;
        if self.origin == ResourceOrigin::Transient {
            self.native_handle = None;
        }
    }
}

/// Owns resource metadata and hands out versioned handles.
///
/// Nothing in here touches native GPU state.
#[derive(Default)]
pub(crate) struct ResourceRegistry {
    nodes: Vec<ResourceNode>,
    name_to_index: HashMap<String, u32>,
}

impl ResourceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create_transient(&mut self, desc: ResourceDesc, name: &str) -> ResourceHandle {
        self.push(desc, name, ResourceOrigin::Transient)
    }

    pub(crate) fn import_external(
        &mut self,
        native: NativeHandle,
        desc: ResourceDesc,
        name: &str,
        initial_state: ResourceState,
    ) -> ResourceHandle {
        self.push(desc, name, ResourceOrigin::Imported { native, initial_state })
    }

    fn push(&mut self, desc: ResourceDesc, name: &str, origin: ResourceOrigin) -> ResourceHandle {
        let id = self.nodes.len();
        assert!(id < u32::MAX as usize, "Render graph resource id space exhausted!");
        let id = id as u32;

        let name = if name.is_empty() {
            format!("resource_{}", id)
        } else {
            name.to_owned()
        };

        if self.name_to_index.contains_key(&name) {
            glog::warn!("Duplicated render graph resource name '{}', lookups keep the first one", name);
        } else {
            self.name_to_index.insert(name.clone(), id);
        }

        self.nodes.push(ResourceNode::new(desc, name, origin));

        ResourceHandle { id, version: 1 }
    }

    /// Bump the version of a resource and record `producer` as the writer of the new one.
    pub(crate) fn write(&mut self, handle: ResourceHandle, producer: PassHandle) -> Result<ResourceHandle> {
        self.check_version(handle)?;

        let node = &mut self.nodes[handle.id as usize];
        node.version += 1;
        node.version_producers.push(Some(producer));

        Ok(handle.next_version())
    }

    pub(crate) fn set_producer(&mut self, handle: ResourceHandle, producer: PassHandle) {
        if let Some(slot) = self
            .nodes
            .get_mut(handle.id as usize)
            .and_then(|node| node.version_producers.get_mut(handle.version as usize - 1))
        {
            *slot = Some(producer);
        }
    }

    /// The handle must name a live resource at its latest version.
    pub(crate) fn check_version(&self, handle: ResourceHandle) -> Result<()> {
        let node = match self.get(handle) {
            Some(node) => node,
            None => {
                return Err(RenderGraphError::DanglingHandle {
                    pass: String::new(),
                    handle,
                })
            }
        };

        if node.version != handle.version {
            return Err(RenderGraphError::StaleVersion {
                resource: node.name.clone(),
                expected: node.version,
                got: handle.version,
            });
        }

        Ok(())
    }

    #[inline]
    pub(crate) fn contains(&self, handle: ResourceHandle) -> bool {
        handle.is_valid() && (handle.id as usize) < self.nodes.len()
    }

    #[inline]
    pub(crate) fn get(&self, handle: ResourceHandle) -> Option<&ResourceNode> {
        if self.contains(handle) {
            self.nodes.get(handle.id as usize)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut ResourceNode> {
        if self.contains(handle) {
            self.nodes.get_mut(handle.id as usize)
        } else {
            None
        }
    }

    pub(crate) fn find(&self, name: &str) -> Option<ResourceHandle> {
        self.name_to_index.get(name).map(|&id| ResourceHandle {
            id,
            version: self.nodes[id as usize].version,
        })
    }

    #[inline]
    pub(crate) fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn nodes_mut(&mut self) -> &mut [ResourceNode] {
        &mut self.nodes
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.name_to_index.clear();
    }
}
