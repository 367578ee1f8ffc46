use crate::barrier::ResourceState;
use crate::error::{RenderGraphError, Result};
use crate::graph::RenderGraph;
use crate::graph_resource::ResourceHandle;
use crate::pass_context::PassContext;
use crate::resource::ResourceDesc;

pub type RenderFunc = dyn FnOnce(&mut PassContext<'_>) -> anyhow::Result<()> + Send + 'static;

/// Index of a pass in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Resource handle of the resource in the render graph and the state the pass needs it in.
///
/// For outputs `handle` is the version the pass produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassResourceAccess {
    pub handle: ResourceHandle,
    pub state: ResourceState,
}

/// Render Pass in the render graph.
/// Each Pass instructs how GPU should do rendering at a given region of time.
pub struct PassNode {
    pub(crate) name: String,
    pub(crate) render_func: Option<Box<RenderFunc>>,
    pub(crate) inputs: Vec<PassResourceAccess>,
    pub(crate) outputs: Vec<PassResourceAccess>,
    pub(crate) creates: Vec<ResourceHandle>,
    pub(crate) destroys: Vec<ResourceHandle>,
    pub(crate) has_side_effect: bool,

    pub(crate) is_culled: bool,
    pub(crate) ref_count: u32,
}

impl PassNode {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            render_func: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            creates: Vec::new(),
            destroys: Vec::new(),
            has_side_effect: false,
            is_culled: false,
            ref_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[PassResourceAccess] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PassResourceAccess] {
        &self.outputs
    }

    pub fn creates(&self) -> &[ResourceHandle] {
        &self.creates
    }

    pub fn destroys(&self) -> &[ResourceHandle] {
        &self.destroys
    }

    pub fn has_side_effect(&self) -> bool {
        self.has_side_effect
    }

    pub fn has_render_func(&self) -> bool {
        self.render_func.is_some()
    }

    pub fn is_culled(&self) -> bool {
        self.is_culled
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Helper struct to declare what a pass reads, writes and creates.
///
/// Every call is O(1) amortized, validation against the whole graph waits for `compile()`.
pub struct RenderPassBuilder<'rg> {
    pub(crate) graph: &'rg mut RenderGraph,
    pub(crate) pass: PassHandle,
}

impl<'rg> RenderPassBuilder<'rg> {
    pub fn handle(&self) -> PassHandle {
        self.pass
    }

    pub fn name(&self) -> &str {
        &self.node().name
    }

    /// Read a resource in the state its descriptor implies.
    pub fn read(&mut self, handle: ResourceHandle) -> Result<&mut Self> {
        let state = self
            .graph
            .resources
            .get(handle)
            .map(|node| node.desc.default_read_state())
            .unwrap_or(ResourceState::Common);

        self.read_as(handle, state)
    }

    /// Read a resource in an explicit state.
    ///
    /// Handles this graph never created are recorded and reported by `compile()`.
    pub fn read_as(&mut self, handle: ResourceHandle, state: ResourceState) -> Result<&mut Self> {
        if self.graph.resources.contains(handle) {
            self.graph.resources.check_version(handle)?;
        } else {
            glog::warn!("Pass '{}' reads unknown resource {:?}", self.node().name, handle);
        }

        self.graph.invalidate();
        self.node_mut().inputs.push(PassResourceAccess { handle, state });
        Ok(self)
    }

    /// Write a resource in the state its descriptor implies, returns the new version.
    pub fn write(&mut self, handle: ResourceHandle) -> Result<ResourceHandle> {
        let state = self
            .graph
            .resources
            .get(handle)
            .map(|node| node.desc.default_write_state())
            .unwrap_or(ResourceState::Common);

        self.write_as(handle, state)
    }

    /// Write a resource in an explicit state, returns the new version.
    pub fn write_as(&mut self, handle: ResourceHandle, state: ResourceState) -> Result<ResourceHandle> {
        self.ensure_known(handle)?;

        let new_handle = self.graph.resources.write(handle, self.pass)?;

        self.graph.invalidate();
        self.node_mut().outputs.push(PassResourceAccess {
            handle: new_handle,
            state,
        });
        Ok(new_handle)
    }

    /// Create a transient resource produced by this pass.
    pub fn create_texture(&mut self, desc: ResourceDesc, name: &str) -> ResourceHandle {
        let handle = self.graph.resources.create_transient(desc, name);
        self.graph.resources.set_producer(handle, self.pass);

        self.graph.invalidate();
        let node = self.node_mut();
        node.outputs.push(PassResourceAccess {
            handle,
            state: desc.default_write_state(),
        });
        node.creates.push(handle);
        handle
    }

    /// Declare this pass as the last user of a resource.
    pub fn destroy(&mut self, handle: ResourceHandle) -> Result<&mut Self> {
        self.ensure_known(handle)?;
        self.graph.resources.check_version(handle)?;

        self.graph.invalidate();
        self.node_mut().destroys.push(handle);
        Ok(self)
    }

    /// The pass is never culled, e.g. it writes to a readback buffer or uploads data.
    pub fn side_effect(&mut self) -> &mut Self {
        self.graph.invalidate();
        self.node_mut().has_side_effect = true;
        self
    }

    /// Add render function to this pass.
    pub fn set_execute<F>(&mut self, func: F) -> &mut Self
    where
        F: FnOnce(&mut PassContext<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        let node = self.node_mut();
        if node.render_func.replace(Box::new(func)).is_some() {
            glog::warn!("Render function of pass '{}' replaced", node.name);
        }
        self
    }

    fn ensure_known(&self, handle: ResourceHandle) -> Result<()> {
        if self.graph.resources.contains(handle) {
            Ok(())
        } else {
            Err(RenderGraphError::DanglingHandle {
                pass: self.node().name.clone(),
                handle,
            })
        }
    }

    #[inline]
    fn node(&self) -> &PassNode {
        &self.graph.passes[self.pass.index()]
    }

    #[inline]
    fn node_mut(&mut self) -> &mut PassNode {
        &mut self.graph.passes[self.pass.index()]
    }
}
