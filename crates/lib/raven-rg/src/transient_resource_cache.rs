use std::collections::HashMap;

use crate::device::{NativeHandle, RenderDevice};
use crate::resource::ResourceDesc;

struct CachedResource {
    native: NativeHandle,
    /// Frame the resource was returned to the cache.
    released_frame: u64,
}

/// Transient resource cache to keep native resources created by the render graph across frames.
///
/// # Note
///
/// Resources are keyed by the full descriptor, usage flags included, so a cached resource
/// always satisfies an aliasing slot with the same descriptor.
#[derive(Default)]
pub struct TransientResourceCache {
    resources: HashMap<ResourceDesc, Vec<CachedResource>>,
}

impl TransientResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, desc: &ResourceDesc) -> Option<NativeHandle> {
        self.resources
            .get_mut(desc)
            .and_then(|vec| vec.pop())
            .map(|cached| cached.native)
    }

    pub fn store(&mut self, desc: ResourceDesc, native: NativeHandle, frame: u64) {
        self.resources.entry(desc).or_default().push(CachedResource {
            native,
            released_frame: frame,
        });
    }

    pub fn len(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release resources nobody took for more than `max_unused_frames` frames.
    pub fn trim(&mut self, device: &mut dyn RenderDevice, current_frame: u64, max_unused_frames: u64) -> usize {
        let mut released = 0;

        for vec in self.resources.values_mut() {
            vec.retain(|cached| {
                let keep = current_frame.saturating_sub(cached.released_frame) <= max_unused_frames;
                if !keep {
                    device.release_resource(cached.native);
                    released += 1;
                }
                keep
            });
        }
        self.resources.retain(|_, vec| !vec.is_empty());

        if released > 0 {
            glog::debug!("Transient resource cache released {} stale resources", released);
        }
        released
    }

    pub fn clean(self, device: &mut dyn RenderDevice) {
        for (_, resources) in self.resources {
            for cached in resources {
                device.release_resource(cached.native);
            }
        }
    }
}
