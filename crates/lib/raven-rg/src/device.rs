use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::barrier::BarrierKind;
use crate::resource::ResourceDesc;

/// Opaque handle to a native GPU resource owned by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Out of device memory while allocating {desc:?}")]
    OutOfMemory { desc: ResourceDesc },

    #[error("Resource description is not supported by the device: {0}")]
    Unsupported(String),

    #[error("Device lost")]
    DeviceLost,
}

/// Barrier of the compiled plan resolved against native resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeBarrier {
    pub resource: NativeHandle,
    pub kind: BarrierKind,
}

/// Records commands for later submission.
///
/// Pass callbacks reach their backend recorder through `as_any_mut`, the graph itself
/// only issues barriers and debug markers.
pub trait CommandRecorder: Send {
    fn resource_barriers(&mut self, barriers: &[NativeBarrier]);

    fn push_debug_marker(&mut self, _name: &str) {}

    fn pop_debug_marker(&mut self) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Device capability consumed by the graph executor.
pub trait RenderDevice {
    fn create_command_recorder(&mut self) -> Box<dyn CommandRecorder>;

    fn submit(&mut self, recorder: Box<dyn CommandRecorder>) -> Result<(), DeviceError>;

    /// May block on driver-side allocation.
    fn allocate_resource(&mut self, desc: &ResourceDesc) -> Result<NativeHandle, DeviceError>;

    fn release_resource(&mut self, handle: NativeHandle);
}
