use std::sync::Arc;

use arrayvec::ArrayVec;
use parking_lot::Mutex;

use raven_thread::{JobHandle, JobStatus, ThreadPool};

use crate::barrier::Barrier;
use crate::compiled_graph::CompiledGraph;
use crate::device::{CommandRecorder, NativeBarrier, NativeHandle, RenderDevice};
use crate::error::{RenderGraphError, Result};
use crate::graph::RenderGraph;
use crate::graph_executor::FrameStats;
use crate::graph_resource::ResourceOrigin;
use crate::pass::{PassHandle, RenderFunc};
use crate::pass_context::{PassContext, PassResourceBinding, PassResources};
use crate::retired_graph::RetiredRenderGraph;
use crate::transient_resource_cache::TransientResourceCache;

const MAX_BARRIERS_PER_BATCH: usize = 64;

type RecordedPass = Arc<Mutex<Option<(Box<dyn CommandRecorder>, anyhow::Result<()>)>>>;

/// Everything a pass needs to be recorded away from the graph.
struct PreparedPass {
    name: String,
    recorder: Box<dyn CommandRecorder>,
    resources: PassResources,
    render_func: Option<Box<RenderFunc>>,
}

/// A compiled graph walking through one frame.
pub(crate) struct ExecutingRenderGraph<'exec> {
    graph: &'exec mut RenderGraph,
    cache: &'exec mut TransientResourceCache,
    compiled: CompiledGraph,

    /// Native resource bound to each alias slot while it is live.
    slot_natives: Vec<Option<NativeHandle>>,
    retired: RetiredRenderGraph,
    stats: FrameStats,
}

impl<'exec> ExecutingRenderGraph<'exec> {
    pub(crate) fn new(graph: &'exec mut RenderGraph, cache: &'exec mut TransientResourceCache) -> Result<Self> {
        let compiled = graph.compile()?.clone();

        let stats = FrameStats {
            culled_passes: compiled.culled_passes().len(),
            barriers: compiled.barrier_count(),
            ..Default::default()
        };

        Ok(Self {
            graph,
            cache,
            slot_natives: vec![None; compiled.alias_slots().len()],
            compiled,
            retired: RetiredRenderGraph::default(),
            stats,
        })
    }

    /// Record every pass into one recorder and submit it.
    pub(crate) fn record_serial(&mut self, device: &mut dyn RenderDevice) -> Result<()> {
        let mut recorder = device.create_command_recorder();

        for position in 0..self.compiled.execution_order.len() {
            let pass = self.compiled.execution_order[position];
            self.allocate_resources(position, device)?;

            self.record_barriers(recorder.as_mut(), &self.compiled.barriers[position]);
            let resources = self.pass_resources(pass);
            let name = self.graph.passes[pass.index()].name.clone();

            if let Some(render_func) = self.graph.take_render_func(pass) {
                record_pass(&name, render_func, &resources, recorder.as_mut()).map_err(|err| {
                    RenderGraphError::PassExecution {
                        pass: name.clone(),
                        source: err.into(),
                    }
                })?;
            }

            self.stats.executed_passes += 1;
            self.deallocate_resources(position);
        }

        self.record_barriers(recorder.as_mut(), &self.compiled.final_barriers);
        device.submit(recorder).map_err(RenderGraphError::Submission)
    }

    /// Record passes on the thread pool, one recorder each, and submit them in compiled order.
    ///
    /// Allocation and barriers are done up front on this thread, so a failed allocation
    /// aborts before any pass runs.
    pub(crate) fn record_parallel(&mut self, device: &mut dyn RenderDevice, pool: &ThreadPool) -> Result<()> {
        let mut prepared = Vec::with_capacity(self.compiled.execution_order.len());

        for position in 0..self.compiled.execution_order.len() {
            let pass = self.compiled.execution_order[position];
            self.allocate_resources(position, device)?;

            let mut recorder = device.create_command_recorder();
            self.record_barriers(recorder.as_mut(), &self.compiled.barriers[position]);

            prepared.push(PreparedPass {
                name: self.graph.passes[pass.index()].name.clone(),
                recorder,
                resources: self.pass_resources(pass),
                render_func: self.graph.take_render_func(pass),
            });

            self.deallocate_resources(position);
        }

        // fan out
        let jobs: Vec<(String, RecordedPass, Option<JobHandle>)> = prepared
            .into_iter()
            .map(|pass| {
                let slot: RecordedPass = Arc::new(Mutex::new(None));
                let name = pass.name.clone();

                let job = match pass.render_func {
                    Some(render_func) => {
                        let slot = slot.clone();
                        let PreparedPass {
                            name,
                            mut recorder,
                            resources,
                            ..
                        } = pass;

                        Some(pool.add_job(move || {
                            let result = record_pass(&name, render_func, &resources, recorder.as_mut());
                            *slot.lock() = Some((recorder, result));
                        }))
                    }
                    None => {
                        *slot.lock() = Some((pass.recorder, Ok(())));
                        None
                    }
                };

                (name, slot, job)
            })
            .collect();

        // fan in, every job is waited on before anything is reported
        let mut recorders = Vec::with_capacity(jobs.len());
        let mut first_error = None;

        for (name, slot, job) in jobs {
            if let Some(job) = job {
                if pool.wait(&job) == JobStatus::Panicked {
                    glog::error!("Recording job of pass '{}' panicked", name);
                }
            }

            match slot.lock().take() {
                Some((recorder, Ok(()))) => recorders.push(recorder),
                Some((_, Err(err))) => {
                    if first_error.is_none() {
                        first_error = Some(RenderGraphError::PassExecution {
                            pass: name,
                            source: err.into(),
                        });
                    }
                }
                None => {
                    if first_error.is_none() {
                        first_error = Some(RenderGraphError::PassExecution {
                            pass: name,
                            source: "recording job panicked".into(),
                        });
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        self.stats.executed_passes += recorders.len();

        for recorder in recorders {
            device.submit(recorder).map_err(RenderGraphError::Submission)?;
        }

        if !self.compiled.final_barriers.is_empty() {
            let mut recorder = device.create_command_recorder();
            self.record_barriers(recorder.as_mut(), &self.compiled.final_barriers);
            device.submit(recorder).map_err(RenderGraphError::Submission)?;
        }

        Ok(())
    }

    /// Hand every native resource still held back to the cache and report the frame.
    pub(crate) fn retire(mut self, frame: u64) -> FrameStats {
        for (slot, native) in self.slot_natives.iter_mut().enumerate() {
            if let Some(native) = native.take() {
                self.retired.retire(self.compiled.alias_slots[slot].desc, native);
            }
        }

        self.retired.release_owned_resources(self.cache, frame);
        self.stats
    }

    fn allocate_resources(&mut self, position: usize, device: &mut dyn RenderDevice) -> Result<()> {
        for (idx, slot) in self.compiled.alias_slots.iter().enumerate() {
            if slot.first_use != position || self.slot_natives[idx].is_some() {
                continue;
            }

            let native = match self.cache.get(&slot.desc) {
                Some(native) => {
                    self.stats.reused_from_cache += 1;
                    native
                }
                None => device.allocate_resource(&slot.desc).map_err(|source| {
                    let resource = slot
                        .resources
                        .first()
                        .map(|&id| self.graph.resources.nodes()[id as usize].name.clone())
                        .unwrap_or_default();
                    glog::error!("Failed to allocate alias slot {} for '{}': {}", idx, resource, source);

                    RenderGraphError::AllocationFailure {
                        slot: idx,
                        resource,
                        desc: slot.desc,
                        source,
                    }
                })?,
            };

            glog::trace!("Alias slot {} bound to {}", idx, native);
            self.slot_natives[idx] = Some(native);
            self.stats.allocated_slots += 1;
        }

        Ok(())
    }

    fn deallocate_resources(&mut self, position: usize) {
        // slots live until the last pass still back the final barriers, `retire` hands them back
        if position + 1 == self.compiled.execution_order.len() {
            return;
        }

        for (idx, slot) in self.compiled.alias_slots.iter().enumerate() {
            if slot.last_use != position {
                continue;
            }
            if let Some(native) = self.slot_natives[idx].take() {
                self.retired.retire(slot.desc, native);
            }
        }
    }

    fn resolve_native(&self, id: u32) -> Option<NativeHandle> {
        let node = self.graph.resources.nodes().get(id as usize)?;
        match node.origin {
            ResourceOrigin::Imported { native, .. } => Some(native),
            ResourceOrigin::Transient => self.compiled.slot_of(id).and_then(|slot| self.slot_natives[slot]),
        }
    }

    fn record_barriers(&self, recorder: &mut dyn CommandRecorder, barriers: &[Barrier]) {
        let mut batch: ArrayVec<NativeBarrier, MAX_BARRIERS_PER_BATCH> = ArrayVec::new();

        for barrier in barriers {
            let native = match self.resolve_native(barrier.resource) {
                Some(native) => native,
                None => {
                    glog::warn!("Skipping barrier on unbound resource #{}", barrier.resource);
                    continue;
                }
            };

            if batch.is_full() {
                recorder.resource_barriers(&batch);
                batch.clear();
            }
            batch.push(NativeBarrier {
                resource: native,
                kind: barrier.kind,
            });
        }

        if !batch.is_empty() {
            recorder.resource_barriers(&batch);
        }
    }

    fn pass_resources(&mut self, pass: PassHandle) -> PassResources {
        let node = &self.graph.passes[pass.index()];
        let declared: Vec<u32> = node
            .inputs
            .iter()
            .chain(node.outputs.iter())
            .map(|access| access.handle.id)
            .chain(node.destroys.iter().map(|handle| handle.id))
            .collect();

        let mut resources = PassResources::default();
        for id in declared {
            if let Some(native) = self.resolve_native(id) {
                let res = &self.graph.resources.nodes()[id as usize];
                resources.insert(PassResourceBinding {
                    id,
                    name: res.name.clone(),
                    native,
                    desc: res.desc,
                });
            }
        }

        for binding in &resources.bindings {
            self.graph.set_native_handle(binding.id, Some(binding.native));
        }

        resources
    }
}

fn record_pass(
    name: &str,
    render_func: Box<RenderFunc>,
    resources: &PassResources,
    recorder: &mut dyn CommandRecorder,
) -> anyhow::Result<()> {
    recorder.push_debug_marker(name);

    let result = {
        let mut context = PassContext {
            pass_name: name,
            resources,
            recorder: &mut *recorder,
        };
        render_func(&mut context)
    };

    recorder.pop_debug_marker();
    result
}
