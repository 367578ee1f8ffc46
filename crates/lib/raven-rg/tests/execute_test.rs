mod common;

use raven_rg::{
    BarrierKind, ExecutorConfig, Format, GraphExecutor, NativeBarrier, RecordingMode, RenderGraph,
    RenderGraphError, ResourceDesc, ResourceState,
};

use common::{build_deferred, record, MockDevice, BACKBUFFER_NATIVE};

const DEFERRED_PASSES: [&str; 4] = ["Shadow", "GBuffer", "Lighting", "Tonemap"];

fn serial() -> GraphExecutor {
    GraphExecutor::new(ExecutorConfig::default()).unwrap()
}

fn parallel() -> GraphExecutor {
    GraphExecutor::new(ExecutorConfig {
        recording: RecordingMode::Parallel { workers: 4 },
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_serial_execution_records_in_order() {
    let mut device = MockDevice::new();
    let mut executor = serial();
    let mut rg = RenderGraph::new();
    build_deferred(&mut rg, true);

    let stats = executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(stats.executed_passes, 4);
    assert_eq!(stats.culled_passes, 1);
    assert_eq!(stats.allocated_slots, 5);
    assert_eq!(stats.reused_from_cache, 0);

    assert_eq!(device.submissions.len(), 1);
    let submission = &device.submissions[0];
    assert_eq!(submission.commands, DEFERRED_PASSES);
    assert_eq!(submission.markers, DEFERRED_PASSES);
    assert_eq!(submission.barriers.len(), stats.barriers);
    assert_eq!(
        submission.barriers.last(),
        Some(&NativeBarrier {
            resource: BACKBUFFER_NATIVE,
            kind: BarrierKind::Transition {
                before: ResourceState::RenderTarget,
                after: ResourceState::Present,
            },
        })
    );

    // the graph is ready for the next frame, natives wait in the cache
    assert_eq!(rg.pass_count(), 0);
    assert_eq!(executor.cached_resources(), 5);
    assert_eq!(device.live.len(), 5);

    executor.shutdown(&mut device);
    assert!(device.live.is_empty());
}

#[test]
fn test_cache_is_reused_and_trimmed() {
    let mut device = MockDevice::new();
    let mut executor = GraphExecutor::new(ExecutorConfig {
        max_unused_frames: 1,
        ..Default::default()
    })
    .unwrap();

    let mut rg = RenderGraph::new();
    build_deferred(&mut rg, false);
    executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(device.allocations, 5);

    build_deferred(&mut rg, false);
    let stats = executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(stats.reused_from_cache, 5);
    assert_eq!(device.allocations, 5);

    // empty frames age the cache out
    executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(executor.cached_resources(), 5);
    executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(executor.cached_resources(), 0);
    assert!(device.live.is_empty());
}

#[test]
fn test_allocation_failure_aborts_frame() {
    let mut device = MockDevice::new();
    device.fail_allocation_at = Some(2);
    let mut executor = serial();
    let mut rg = RenderGraph::new();
    build_deferred(&mut rg, false);

    match executor.execute(&mut rg, &mut device) {
        Err(RenderGraphError::AllocationFailure { slot, resource, .. }) => {
            assert_eq!(slot, 2);
            assert_eq!(resource, "Normal");
        }
        other => panic!("expected an allocation failure, got {:?}", other),
    }

    assert!(device.submissions.is_empty());
    assert_eq!(rg.pass_count(), 0);
    assert_eq!(executor.cached_resources(), 2);

    // retry next frame
    device.fail_allocation_at = None;
    build_deferred(&mut rg, false);
    let stats = executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(stats.reused_from_cache, 2);
    assert_eq!(device.submissions.len(), 1);
}

#[test]
fn test_pass_failure_skips_submission() {
    let mut device = MockDevice::new();
    let mut executor = serial();
    let mut rg = RenderGraph::new();

    let target = rg.add_pass("Broken").side_effect().create_texture(
        ResourceDesc::render_target(64, 64, Format::Rgba8Unorm),
        "Target",
    );
    rg.modify_pass(rg.find_pass("Broken").unwrap())
        .unwrap()
        .set_execute(|_| Err(anyhow::anyhow!("shader missing")));
    rg.add_pass("After").side_effect().read(target).unwrap().set_execute(|ctx| {
        record(ctx, "After");
        Ok(())
    });

    match executor.execute(&mut rg, &mut device) {
        Err(RenderGraphError::PassExecution { pass, source }) => {
            assert_eq!(pass, "Broken");
            assert_eq!(source.to_string(), "shader missing");
        }
        other => panic!("expected a pass failure, got {:?}", other),
    }
    assert!(device.submissions.is_empty());
    assert_eq!(executor.cached_resources(), 1);
}

#[test]
fn test_undeclared_lookup_fails_the_pass() {
    let mut device = MockDevice::new();
    let mut executor = serial();
    let mut rg = RenderGraph::new();

    let hidden = rg.create_texture(ResourceDesc::texture_2d(8, 8, Format::R32Float), "Hidden");
    rg.add_pass("Snoop").side_effect().set_execute(move |ctx| {
        ctx.native_resource(hidden)?;
        Ok(())
    });

    match executor.execute(&mut rg, &mut device) {
        Err(RenderGraphError::PassExecution { pass, source }) => {
            assert_eq!(pass, "Snoop");
            assert!(source.to_string().contains("without declaring"));
        }
        other => panic!("expected a pass failure, got {:?}", other),
    }
}

#[test]
fn test_compile_failure_allocates_nothing() {
    let mut device = MockDevice::new();
    let mut executor = serial();
    let mut rg = RenderGraph::new();

    let a = rg.add_pass("A").handle();
    let a_tex = rg.modify_pass(a).unwrap().create_texture(
        ResourceDesc::render_target(8, 8, Format::Rgba8Unorm),
        "ATex",
    );
    let b_tex = {
        let mut pass = rg.add_pass("B");
        pass.read(a_tex).unwrap();
        pass.create_texture(ResourceDesc::render_target(8, 8, Format::Rgba8Unorm), "BTex")
    };
    rg.modify_pass(a).unwrap().read(b_tex).unwrap();

    assert!(matches!(
        executor.execute(&mut rg, &mut device),
        Err(RenderGraphError::GraphCycle { .. })
    ));
    assert_eq!(device.allocations, 0);
    assert!(device.submissions.is_empty());
    assert_eq!(rg.pass_count(), 0);
}

#[test]
fn test_parallel_submission_follows_compiled_order() {
    let mut device = MockDevice::new();
    let mut executor = parallel();

    for _ in 0..3 {
        let mut rg = RenderGraph::new();
        build_deferred(&mut rg, true);
        let stats = executor.execute(&mut rg, &mut device).unwrap();
        assert_eq!(stats.executed_passes, 4);
    }

    // 4 pass recorders and one for the final present transition, per frame
    assert_eq!(device.submissions.len(), 15);
    for frame in device.submissions.chunks(5) {
        for (submission, name) in frame.iter().zip(DEFERRED_PASSES) {
            assert_eq!(submission.markers, [name]);
            assert_eq!(submission.commands, [name]);
        }
        assert!(frame[4].commands.is_empty());
        assert_eq!(frame[4].barriers.len(), 1);
    }

    executor.shutdown(&mut device);
    assert!(device.live.is_empty());
}

#[test]
fn test_parallel_failure_skips_submission() {
    let mut device = MockDevice::new();
    let mut executor = parallel();
    let mut rg = RenderGraph::new();
    let deferred = build_deferred(&mut rg, false);

    rg.modify_pass(deferred.lighting)
        .unwrap()
        .set_execute(|_| Err(anyhow::anyhow!("lighting exploded")));

    match executor.execute(&mut rg, &mut device) {
        Err(RenderGraphError::PassExecution { pass, .. }) => assert_eq!(pass, "Lighting"),
        other => panic!("expected a pass failure, got {:?}", other),
    }
    assert!(device.submissions.is_empty());
    assert_eq!(executor.cached_resources(), 5);
}

#[test]
fn test_early_reader_sees_distinct_natives() {
    let mut device = MockDevice::new();
    let mut executor = serial();
    let mut rg = RenderGraph::new();
    let desc = ResourceDesc::render_target(64, 64, Format::Rgba8Unorm);

    let accum = rg.create_texture(desc, "Accum");
    let tmp = rg.add_pass("Scatter").create_texture(desc, "Tmp");
    {
        let mut pass = rg.add_pass("Gather");
        pass.read(tmp).unwrap();
        pass.read(accum).unwrap();
        pass.side_effect();
        pass.set_execute(move |ctx| {
            let natives = [ctx.native_resource(tmp)?, ctx.native_resource(accum)?];
            for native in natives {
                record(ctx, &native.to_string());
            }
            Ok(())
        });
    }
    let accumulated = rg.add_pass("Accumulate").write(accum).unwrap();
    rg.export(accumulated).unwrap();

    let stats = executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(stats.allocated_slots, 2);

    let commands = &device.submissions[0].commands;
    assert_eq!(commands.len(), 2);
    assert_ne!(commands[0], commands[1]);
}

#[test]
fn test_presented_transient_is_bound_for_the_final_transition() {
    let mut device = MockDevice::new();
    let mut executor = serial();
    let mut rg = RenderGraph::new();

    let preview = {
        let mut pass = rg.add_pass("Preview");
        let preview = pass.create_texture(ResourceDesc::render_target(128, 128, Format::Rgba8Unorm), "Preview");
        pass.set_execute(move |ctx| {
            let native = ctx.native_resource(preview)?;
            record(ctx, &native.to_string());
            Ok(())
        });
        preview
    };
    rg.present(preview).unwrap();

    executor.execute(&mut rg, &mut device).unwrap();
    assert_eq!(device.live.len(), 1);
    let native = device.live[0];

    let submission = &device.submissions[0];
    assert_eq!(submission.commands, [native.to_string()]);
    assert_eq!(
        submission.barriers.last(),
        Some(&NativeBarrier {
            resource: native,
            kind: BarrierKind::Transition {
                before: ResourceState::RenderTarget,
                after: ResourceState::Present,
            },
        })
    );
    assert_eq!(executor.cached_resources(), 1);
}
