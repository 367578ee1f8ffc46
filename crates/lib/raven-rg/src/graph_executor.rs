use anyhow::Context;

use raven_thread::ThreadPool;

use crate::device::RenderDevice;
use crate::error::Result;
use crate::executing_graph::ExecutingRenderGraph;
use crate::graph::RenderGraph;
use crate::transient_resource_cache::TransientResourceCache;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingMode {
    /// Every pass records into one recorder on the calling thread.
    Serial,
    /// One recorder per pass, pass callbacks run on `workers` threads.
    Parallel { workers: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub recording: RecordingMode,
    /// Cached native resources unused for longer than this are released.
    pub max_unused_frames: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            recording: RecordingMode::Serial,
            max_unused_frames: 2,
        }
    }
}

/// What one `execute` call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub executed_passes: usize,
    pub culled_passes: usize,
    pub barriers: usize,
    /// Alias slots bound to a native resource this frame, cache hits included.
    pub allocated_slots: usize,
    pub reused_from_cache: usize,
}

/// Render graph executor, runs compiled graphs against a device and keeps
/// transient resources alive between frames.
pub struct GraphExecutor {
    config: ExecutorConfig,
    transient_resource_cache: TransientResourceCache,
    thread_pool: Option<ThreadPool>,
    frame_index: u64,
}

impl GraphExecutor {
    pub fn new(config: ExecutorConfig) -> anyhow::Result<Self> {
        let thread_pool = match config.recording {
            RecordingMode::Serial => None,
            RecordingMode::Parallel { workers } => {
                let mut pool = ThreadPool::new(workers);
                pool.spawn_workers()
                    .context("Failed to spawn render graph recording workers")?;
                glog::debug!("Render graph records in parallel on {} workers", pool.num_workers());
                Some(pool)
            }
        };

        Ok(Self {
            config,
            transient_resource_cache: TransientResourceCache::new(),
            thread_pool,
            frame_index: 0,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Number of native resources parked in the transient cache.
    pub fn cached_resources(&self) -> usize {
        self.transient_resource_cache.len()
    }

    /// Compile the graph if needed, allocate, record and submit one frame.
    ///
    /// The graph is reset afterwards whether the frame succeeded or not. On failure nothing
    /// is submitted and every native resource already bound goes back to the cache.
    pub fn execute(&mut self, graph: &mut RenderGraph, device: &mut dyn RenderDevice) -> Result<FrameStats> {
        let result = self.execute_frame(graph, device);

        graph.reset();
        self.transient_resource_cache
            .trim(device, self.frame_index, self.config.max_unused_frames);
        self.frame_index += 1;

        result
    }

    fn execute_frame(&mut self, graph: &mut RenderGraph, device: &mut dyn RenderDevice) -> Result<FrameStats> {
        let mut executing = ExecutingRenderGraph::new(graph, &mut self.transient_resource_cache)?;

        let recorded = match (self.config.recording, self.thread_pool.as_ref()) {
            (RecordingMode::Parallel { .. }, Some(pool)) => executing.record_parallel(device, pool),
            _ => executing.record_serial(device),
        };

        let stats = executing.retire(self.frame_index);

        match recorded {
            Ok(()) => {
                glog::trace!("Frame {} executed: {:?}", self.frame_index, stats);
                Ok(stats)
            }
            Err(err) => {
                glog::warn!("Frame {} aborted: {}", self.frame_index, err);
                Err(err)
            }
        }
    }

    /// Release every cached native resource and join the recording workers.
    pub fn shutdown(mut self, device: &mut dyn RenderDevice) {
        std::mem::take(&mut self.transient_resource_cache).clean(device);

        if let Some(mut pool) = self.thread_pool.take() {
            pool.terminate_block();
        }
    }
}
