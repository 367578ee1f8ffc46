use crate::device::NativeHandle;
use crate::resource::ResourceDesc;
use crate::transient_resource_cache::TransientResourceCache;

/// Native resources the executing graph is done with.
///
/// They stay out of the cache until the frame finishes, aliasing already covers reuse
/// inside one frame.
#[derive(Default)]
pub(crate) struct RetiredRenderGraph {
    pub(crate) retired_resources: Vec<(ResourceDesc, NativeHandle)>,
}

impl RetiredRenderGraph {
    pub(crate) fn retire(&mut self, desc: ResourceDesc, native: NativeHandle) {
        self.retired_resources.push((desc, native));
    }

    /// Release all the resources that is created by the render graph.
    /// These resources might be used in next frame, use cache to avoid frequently create and destroy resources.
    pub(crate) fn release_owned_resources(self, cache: &mut TransientResourceCache, frame: u64) {
        for (desc, native) in self.retired_resources {
            cache.store(desc, native, frame);
        }
    }
}
