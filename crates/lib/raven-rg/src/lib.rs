mod graph;
mod compiler;
mod compiled_graph;
mod validation;
mod debug;

mod resource;
mod graph_resource;
mod barrier;

mod pass;
mod pass_context;

mod device;
mod error;

mod graph_executor;
mod executing_graph;
mod retired_graph;
mod transient_resource_cache;

pub use graph::RenderGraph;
pub use compiled_graph::{AliasSlot, CompiledGraph, ResourceLifetime};
pub use resource::{Format, ResourceDesc, ResourceKind, ResourceUsage};
pub use graph_resource::{ResourceHandle, ResourceNode};
pub use barrier::{Barrier, BarrierKind, ResourceState};
pub use pass::{PassHandle, PassNode, PassResourceAccess, RenderFunc, RenderPassBuilder};
pub use pass_context::PassContext;
pub use device::{CommandRecorder, DeviceError, NativeBarrier, NativeHandle, RenderDevice};
pub use error::{RenderGraphError, Result};
pub use graph_executor::{ExecutorConfig, FrameStats, GraphExecutor, RecordingMode};
pub use transient_resource_cache::TransientResourceCache;

extern crate log as glog;
