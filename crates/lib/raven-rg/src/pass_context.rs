use crate::device::{CommandRecorder, NativeHandle};
use crate::error::{RenderGraphError, Result};
use crate::graph_resource::ResourceHandle;
use crate::resource::ResourceDesc;

/// A resource a pass declared, resolved to its native resource for this frame.
#[derive(Clone, Debug)]
pub(crate) struct PassResourceBinding {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) native: NativeHandle,
    pub(crate) desc: ResourceDesc,
}

/// Native resources visible to one pass. Owned, so it can travel to a worker thread.
#[derive(Clone, Debug, Default)]
pub(crate) struct PassResources {
    pub(crate) bindings: Vec<PassResourceBinding>,
}

impl PassResources {
    pub(crate) fn insert(&mut self, binding: PassResourceBinding) {
        if !self.bindings.iter().any(|b| b.id == binding.id) {
            self.bindings.push(binding);
        }
    }

    #[inline]
    fn get(&self, id: u32) -> Option<&PassResourceBinding> {
        self.bindings.iter().find(|b| b.id == id)
    }
}

/// Render pass context handed to a pass callback.
///
/// Lookups are limited to the resources the pass declared, any version of them resolves
/// to the same native resource.
pub struct PassContext<'a> {
    pub(crate) pass_name: &'a str,
    pub(crate) resources: &'a PassResources,
    pub(crate) recorder: &'a mut dyn CommandRecorder,
}

impl<'a> PassContext<'a> {
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    pub fn native_resource(&self, handle: ResourceHandle) -> Result<NativeHandle> {
        self.binding(handle).map(|b| b.native)
    }

    pub fn desc(&self, handle: ResourceHandle) -> Result<&ResourceDesc> {
        self.binding(handle).map(|b| &b.desc)
    }

    pub fn resource_name(&self, handle: ResourceHandle) -> Result<&str> {
        self.binding(handle).map(|b| b.name.as_str())
    }

    /// Command recorder this pass records into.
    pub fn recorder(&mut self) -> &mut dyn CommandRecorder {
        &mut *self.recorder
    }

    fn binding(&self, handle: ResourceHandle) -> Result<&PassResourceBinding> {
        self.resources
            .get(handle.id)
            .ok_or_else(|| RenderGraphError::UndeclaredResource {
                pass: self.pass_name.to_owned(),
                resource: handle.to_string(),
            })
    }
}
