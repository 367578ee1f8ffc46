// use log macros.
#[macro_use]
extern crate log as _log;

mod console;

use std::any::Any;

use anyhow::Context;

use raven_rg::{
    CommandRecorder, DeviceError, Format, GraphExecutor, NativeBarrier, NativeHandle, PassContext, RenderDevice,
    RenderGraph, ResourceDesc,
};

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;
const SWAPCHAIN_IMAGE: NativeHandle = NativeHandle(u64::MAX);

#[derive(Default)]
struct NullRecorder {
    barriers: usize,
    commands: Vec<String>,
}

impl NullRecorder {
    fn draw(ctx: &mut PassContext, what: &str) {
        if let Some(recorder) = ctx.recorder().as_any_mut().downcast_mut::<NullRecorder>() {
            recorder.commands.push(what.to_owned());
        }
    }
}

impl CommandRecorder for NullRecorder {
    fn resource_barriers(&mut self, barriers: &[NativeBarrier]) {
        for barrier in barriers {
            trace!("barrier {} {}", barrier.resource, barrier.kind);
        }
        self.barriers += barriers.len();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Hands out fake native handles, nothing touches a GPU.
#[derive(Default)]
struct NullDevice {
    next_native: u64,
    live: usize,
}

impl RenderDevice for NullDevice {
    fn create_command_recorder(&mut self) -> Box<dyn CommandRecorder> {
        Box::new(NullRecorder::default())
    }

    fn submit(&mut self, mut recorder: Box<dyn CommandRecorder>) -> Result<(), DeviceError> {
        if let Some(recorder) = recorder.as_any_mut().downcast_mut::<NullRecorder>() {
            debug!(
                "submit {} barriers, commands: [{}]",
                recorder.barriers,
                recorder.commands.join(", ")
            );
        }
        Ok(())
    }

    fn allocate_resource(&mut self, desc: &ResourceDesc) -> Result<NativeHandle, DeviceError> {
        self.next_native += 1;
        self.live += 1;
        trace!("allocate native#{} for {:?}", self.next_native, desc);
        Ok(NativeHandle(self.next_native))
    }

    fn release_resource(&mut self, handle: NativeHandle) {
        self.live -= 1;
        trace!("release {}", handle);
    }
}

fn build_deferred(rg: &mut RenderGraph, debug_vis: bool) -> anyhow::Result<()> {
    let backbuffer = rg.import_backbuffer(
        SWAPCHAIN_IMAGE,
        ResourceDesc::render_target(WIDTH, HEIGHT, Format::Rgba8Unorm),
        "Backbuffer",
    );

    let shadow_map = {
        let mut pass = rg.add_pass("Shadow");
        let shadow_map = pass.create_texture(ResourceDesc::depth_stencil(2048, 2048, Format::D32Float), "ShadowMap");
        pass.set_execute(|ctx| {
            NullRecorder::draw(ctx, "draw shadow casters");
            Ok(())
        });
        shadow_map
    };

    let (albedo, normal, depth) = {
        let mut pass = rg.add_pass("GBuffer");
        let albedo = pass.create_texture(ResourceDesc::render_target(WIDTH, HEIGHT, Format::Rgba8Unorm), "Albedo");
        let normal = pass.create_texture(ResourceDesc::render_target(WIDTH, HEIGHT, Format::Rg16Snorm), "Normal");
        let depth = pass.create_texture(ResourceDesc::depth_stencil(WIDTH, HEIGHT, Format::D32Float), "Depth");
        pass.set_execute(|ctx| {
            NullRecorder::draw(ctx, "draw opaque meshes");
            Ok(())
        });
        (albedo, normal, depth)
    };

    if debug_vis {
        let mut pass = rg.add_pass("DebugVis");
        pass.read(normal)?;
        pass.create_texture(ResourceDesc::render_target(WIDTH, HEIGHT, Format::Rgba8Unorm), "DebugTexture");
        pass.set_execute(|ctx| {
            NullRecorder::draw(ctx, "visualize normals");
            Ok(())
        });
    }

    let hdr_color = {
        let mut pass = rg.add_pass("Lighting");
        for input in [shadow_map, albedo, normal, depth] {
            pass.read(input)?;
        }
        let hdr_color = pass.create_texture(ResourceDesc::render_target(WIDTH, HEIGHT, Format::Rgba16Float), "HDRColor");
        pass.set_execute(move |ctx| {
            let target = ctx.native_resource(hdr_color)?;
            NullRecorder::draw(ctx, &format!("resolve lighting into {}", target));
            Ok(())
        });
        hdr_color
    };

    let mut pass = rg.add_pass("Tonemap");
    pass.read(hdr_color)?;
    pass.write(backbuffer)?;
    pass.set_execute(|ctx| {
        NullRecorder::draw(ctx, "tonemap");
        Ok(())
    });

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let console_vars = console::from_args()?;

    raven_log::init_log(raven_log::LogConfig {
        level: console_vars.level,
        file: console_vars.log_file.clone(),
    })?;

    let mut device = NullDevice::default();
    let mut executor = GraphExecutor::new(console_vars.executor)?;
    let mut rg = RenderGraph::new();

    for frame in 0..console_vars.frames {
        build_deferred(&mut rg, console_vars.debug_vis).context("Failed to build the render graph")?;
        rg.compile().context("Failed to compile the render graph")?;

        if frame == 0 {
            info!("{}", rg.dump_execution_order()?);
            if let Some(path) = &console_vars.dot {
                rg.visualize_graph(path)?;
            }
        }

        match executor.execute(&mut rg, &mut device) {
            Ok(stats) => info!("frame {}: {:?}", frame, stats),
            Err(err) => warn!("frame {} dropped: {:?}", frame, anyhow::Error::new(err)),
        }
    }

    executor.shutdown(&mut device);
    info!("{} native resources still alive", device.live);

    Ok(())
}
