use std::collections::HashMap;

use crate::barrier::ResourceState;
use crate::compiled_graph::CompiledGraph;
use crate::compiler::GraphCompiler;
use crate::device::NativeHandle;
use crate::error::{RenderGraphError, Result};
use crate::graph_resource::{ResourceHandle, ResourceNode, ResourceRegistry};
use crate::pass::{PassHandle, PassNode, RenderFunc, RenderPassBuilder};
use crate::resource::ResourceDesc;

/// Render graph.
///
/// Populated during setup, compiled once, executed once, then reset and reused next frame.
pub struct RenderGraph {
    pub(crate) passes: Vec<PassNode>,
    pub(crate) resources: ResourceRegistry,
    pass_name_to_index: HashMap<String, PassHandle>,
    backbuffer: Option<u32>,
    compiled: Option<CompiledGraph>,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            resources: ResourceRegistry::new(),
            pass_name_to_index: HashMap::new(),
            backbuffer: None,
            compiled: None,
        }
    }

    /// Add a new render pass to the render graph.
    pub fn add_pass<'rg>(&'rg mut self, name: &str) -> RenderPassBuilder<'rg> {
        let pass = PassHandle(self.passes.len() as u32);

        if self.pass_name_to_index.contains_key(name) {
            glog::warn!("Duplicated render pass name '{}', lookups keep the first one", name);
        } else {
            self.pass_name_to_index.insert(name.to_owned(), pass);
        }

        self.passes.push(PassNode::new(name.to_owned()));
        self.invalidate();

        RenderPassBuilder { graph: self, pass }
    }

    /// Reopen the builder of an already added pass.
    pub fn modify_pass<'rg>(&'rg mut self, pass: PassHandle) -> Result<RenderPassBuilder<'rg>> {
        if pass.index() >= self.passes.len() {
            return Err(RenderGraphError::InvalidPass(pass));
        }

        Ok(RenderPassBuilder { graph: self, pass })
    }

    /// Create a transient resource no pass produces, its first user sees undefined contents.
    pub fn create_texture(&mut self, desc: ResourceDesc, name: &str) -> ResourceHandle {
        self.invalidate();
        self.resources.create_transient(desc, name)
    }

    pub fn import_texture(&mut self, native: NativeHandle, desc: ResourceDesc, name: &str) -> ResourceHandle {
        self.import_texture_with_state(native, desc, name, ResourceState::Common)
    }

    /// Import a live resource currently in `state`.
    pub fn import_texture_with_state(
        &mut self,
        native: NativeHandle,
        desc: ResourceDesc,
        name: &str,
        state: ResourceState,
    ) -> ResourceHandle {
        self.invalidate();
        self.resources.import_external(native, desc, name, state)
    }

    /// Import the swapchain image, it is presented once the graph finishes.
    pub fn import_backbuffer(&mut self, native: NativeHandle, desc: ResourceDesc, name: &str) -> ResourceHandle {
        if self.backbuffer.is_some() {
            glog::warn!("Render graph backbuffer replaced by '{}'", name);
        }

        let handle = self.import_texture_with_state(native, desc, name, ResourceState::Present);
        if let Some(node) = self.resources.get_mut(handle) {
            node.externally_visible = true;
            node.present = true;
        }
        self.backbuffer = Some(handle.id);
        handle
    }

    /// Latest version of the backbuffer.
    pub fn backbuffer(&self) -> Option<ResourceHandle> {
        self.backbuffer.map(|id| ResourceHandle {
            id,
            version: self.resources.nodes()[id as usize].version,
        })
    }

    /// Keep a resource alive and transition it to `Present` at the end of the graph.
    pub fn present(&mut self, handle: ResourceHandle) -> Result<()> {
        let node = self.visible_node(handle)?;
        node.present = true;
        Ok(())
    }

    /// Keep a resource alive past the graph without any final transition.
    pub fn export(&mut self, handle: ResourceHandle) -> Result<()> {
        self.visible_node(handle)?;
        Ok(())
    }

    fn visible_node(&mut self, handle: ResourceHandle) -> Result<&mut ResourceNode> {
        self.invalidate();
        match self.resources.get_mut(handle) {
            Some(node) => {
                node.externally_visible = true;
                Ok(node)
            }
            None => Err(RenderGraphError::DanglingHandle {
                pass: String::from("<graph>"),
                handle,
            }),
        }
    }

    pub fn resource_desc(&self, handle: ResourceHandle) -> Option<&ResourceDesc> {
        self.resources.get(handle).map(|node| &node.desc)
    }

    pub fn resource_name(&self, handle: ResourceHandle) -> Option<&str> {
        self.resources.get(handle).map(|node| node.name.as_str())
    }

    /// Latest version of the resource registered under `name`.
    pub fn find_resource(&self, name: &str) -> Option<ResourceHandle> {
        self.resources.find(name)
    }

    pub fn find_pass(&self, name: &str) -> Option<PassHandle> {
        self.pass_name_to_index.get(name).copied()
    }

    pub fn pass(&self, pass: PassHandle) -> Option<&PassNode> {
        self.passes.get(pass.index())
    }

    pub fn resource(&self, handle: ResourceHandle) -> Option<&ResourceNode> {
        self.resources.get(handle)
    }

    pub fn passes(&self) -> impl Iterator<Item = (PassHandle, &PassNode)> {
        self.passes
            .iter()
            .enumerate()
            .map(|(idx, pass)| (PassHandle(idx as u32), pass))
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceNode> {
        self.resources.nodes().iter()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Compile the declared passes into an execution plan.
    ///
    /// Compiling an unchanged graph again returns the same plan. On failure nothing is kept.
    pub fn compile(&mut self) -> Result<&CompiledGraph> {
        if self.compiled.is_none() {
            let compiled = GraphCompiler::new(&self.passes, self.resources.nodes()).compile()?;
            self.apply_compiled(&compiled);
            self.compiled = Some(compiled);
        }

        self.compiled.as_ref().ok_or(RenderGraphError::NotCompiled)
    }

    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Drop every pass and resource, keeping the allocations for the next frame.
    pub fn reset(&mut self) {
        self.passes.clear();
        self.resources.clear();
        self.pass_name_to_index.clear();
        self.backbuffer = None;
        self.compiled = None;
    }

    /// Any change to the declarations throws the compiled plan away.
    pub(crate) fn invalidate(&mut self) {
        if self.compiled.take().is_some() {
            for pass in &mut self.passes {
                pass.is_culled = false;
                pass.ref_count = 0;
            }
            for node in self.resources.nodes_mut() {
                node.reset_compiled_state();
            }
        }
    }

    fn apply_compiled(&mut self, compiled: &CompiledGraph) {
        for (idx, pass) in self.passes.iter_mut().enumerate() {
            pass.ref_count = compiled.pass_ref_counts[idx];
            pass.is_culled = false;
        }
        for &pass in &compiled.culled_passes {
            self.passes[pass.index()].is_culled = true;
        }

        for (id, node) in self.resources.nodes_mut().iter_mut().enumerate() {
            node.lifetime = compiled.lifetimes[id];
            node.alias_slot = compiled.resource_slots[id];
            node.is_culled = false;
        }
        for &id in &compiled.culled_resources {
            self.resources.nodes_mut()[id as usize].is_culled = true;
        }
    }

    pub(crate) fn take_render_func(&mut self, pass: PassHandle) -> Option<Box<RenderFunc>> {
        self.passes.get_mut(pass.index()).and_then(|p| p.render_func.take())
    }

    pub(crate) fn set_native_handle(&mut self, id: u32, native: Option<NativeHandle>) {
        if let Some(node) = self.resources.nodes_mut().get_mut(id as usize) {
            node.native_handle = native;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Format;

    #[test]
    fn lookups_by_name_return_latest_versions() {
        let mut rg = RenderGraph::new();
        let color = rg.create_texture(ResourceDesc::render_target(8, 8, Format::Rgba8Unorm), "Color");
        let written = rg.add_pass("Clear").write(color).unwrap();

        assert_eq!(rg.find_resource("Color"), Some(written));
        assert_eq!(rg.resource_name(color), Some("Color"));
        assert_eq!(rg.find_pass("Clear"), Some(PassHandle(0)));
        assert_eq!(rg.find_pass("Missing"), None);
    }

    #[test]
    fn mutation_invalidates_the_compiled_plan() {
        let mut rg = RenderGraph::new();
        let color = rg.add_pass("A").side_effect().create_texture(
            ResourceDesc::render_target(8, 8, Format::Rgba8Unorm),
            "Color",
        );
        rg.compile().unwrap();
        assert!(rg.is_compiled());
        assert!(rg.resource(color).unwrap().lifetime().is_some());

        rg.add_pass("B").read(color).unwrap();
        assert!(!rg.is_compiled());
        assert!(rg.resource(color).unwrap().lifetime().is_none());
    }

    #[test]
    fn modify_pass_rejects_unknown_handles() {
        let mut rg = RenderGraph::new();
        assert!(matches!(
            rg.modify_pass(PassHandle(3)),
            Err(RenderGraphError::InvalidPass(PassHandle(3)))
        ));
    }

    #[test]
    fn reset_forgets_everything() {
        let mut rg = RenderGraph::new();
        rg.import_backbuffer(
            NativeHandle(7),
            ResourceDesc::render_target(8, 8, Format::Rgba8Unorm),
            "Backbuffer",
        );
        rg.add_pass("A").side_effect();
        rg.compile().unwrap();

        rg.reset();
        assert_eq!((rg.pass_count(), rg.resource_count()), (0, 0));
        assert!(rg.backbuffer().is_none());
        assert!(rg.compiled().is_none());
    }
}
