#![allow(dead_code)]

use std::any::Any;

use raven_rg::{
    CommandRecorder, DeviceError, Format, NativeBarrier, NativeHandle, PassContext, PassHandle, RenderDevice,
    RenderGraph, ResourceDesc, ResourceHandle,
};

pub const BACKBUFFER_NATIVE: NativeHandle = NativeHandle(1000);

/// What a recorder held when it was submitted.
#[derive(Debug, Default)]
pub struct Submission {
    pub markers: Vec<String>,
    pub barriers: Vec<NativeBarrier>,
    pub commands: Vec<String>,
}

#[derive(Default)]
pub struct MockRecorder {
    markers: Vec<String>,
    barriers: Vec<NativeBarrier>,
    commands: Vec<String>,
    depth: usize,
}

impl MockRecorder {
    pub fn record(&mut self, command: &str) {
        self.commands.push(command.to_owned());
    }
}

impl CommandRecorder for MockRecorder {
    fn resource_barriers(&mut self, barriers: &[NativeBarrier]) {
        self.barriers.extend_from_slice(barriers);
    }

    fn push_debug_marker(&mut self, name: &str) {
        self.depth += 1;
        self.markers.push(name.to_owned());
    }

    fn pop_debug_marker(&mut self) {
        assert!(self.depth > 0, "unbalanced debug marker");
        self.depth -= 1;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Device that hands out increasing native handles and remembers everything it was asked.
#[derive(Default)]
pub struct MockDevice {
    next_native: u64,
    /// Fail the n-th allocate call, counting from zero.
    pub fail_allocation_at: Option<usize>,
    pub allocations: usize,
    pub live: Vec<NativeHandle>,
    pub submissions: Vec<Submission>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderDevice for MockDevice {
    fn create_command_recorder(&mut self) -> Box<dyn CommandRecorder> {
        Box::new(MockRecorder::default())
    }

    fn submit(&mut self, mut recorder: Box<dyn CommandRecorder>) -> Result<(), DeviceError> {
        let recorder = recorder
            .as_any_mut()
            .downcast_mut::<MockRecorder>()
            .ok_or_else(|| DeviceError::Unsupported("foreign recorder".into()))?;

        self.submissions.push(Submission {
            markers: std::mem::take(&mut recorder.markers),
            barriers: std::mem::take(&mut recorder.barriers),
            commands: std::mem::take(&mut recorder.commands),
        });
        Ok(())
    }

    fn allocate_resource(&mut self, desc: &ResourceDesc) -> Result<NativeHandle, DeviceError> {
        let call = self.allocations;
        if self.fail_allocation_at == Some(call) {
            return Err(DeviceError::OutOfMemory { desc: *desc });
        }

        self.allocations += 1;
        self.next_native += 1;
        let native = NativeHandle(self.next_native);
        self.live.push(native);
        Ok(native)
    }

    fn release_resource(&mut self, handle: NativeHandle) {
        let idx = self
            .live
            .iter()
            .position(|&live| live == handle)
            .expect("released a resource that is not live");
        self.live.swap_remove(idx);
    }
}

/// Record a command into the mock recorder behind a pass context.
pub fn record(ctx: &mut PassContext, command: &str) {
    ctx.recorder()
        .as_any_mut()
        .downcast_mut::<MockRecorder>()
        .expect("pass recorded into a foreign recorder")
        .record(command);
}

pub struct Deferred {
    pub shadow: PassHandle,
    pub gbuffer: PassHandle,
    pub lighting: PassHandle,
    pub tonemap: PassHandle,
    pub debug_vis: Option<PassHandle>,

    pub shadow_map: ResourceHandle,
    pub albedo: ResourceHandle,
    pub normal: ResourceHandle,
    pub depth: ResourceHandle,
    pub hdr_color: ResourceHandle,
    pub backbuffer: ResourceHandle,
    pub debug_texture: Option<ResourceHandle>,
}

/// Shadow, GBuffer, Lighting and Tonemap, optionally with a DebugVis pass nobody reads from.
/// Every pass records its own name.
pub fn build_deferred(rg: &mut RenderGraph, debug_vis: bool) -> Deferred {
    let backbuffer = rg.import_backbuffer(
        BACKBUFFER_NATIVE,
        ResourceDesc::render_target(1920, 1080, Format::Rgba8Unorm),
        "Backbuffer",
    );

    let (shadow, shadow_map) = {
        let mut pass = rg.add_pass("Shadow");
        let shadow_map = pass.create_texture(ResourceDesc::depth_stencil(2048, 2048, Format::D32Float), "ShadowMap");
        pass.set_execute(|ctx| {
            record(ctx, "Shadow");
            Ok(())
        });
        (pass.handle(), shadow_map)
    };

    let (gbuffer, albedo, normal, depth) = {
        let mut pass = rg.add_pass("GBuffer");
        let albedo = pass.create_texture(ResourceDesc::render_target(1920, 1080, Format::Rgba8Unorm), "Albedo");
        let normal = pass.create_texture(ResourceDesc::render_target(1920, 1080, Format::Rg16Snorm), "Normal");
        let depth = pass.create_texture(ResourceDesc::depth_stencil(1920, 1080, Format::D32Float), "Depth");
        pass.set_execute(|ctx| {
            record(ctx, "GBuffer");
            Ok(())
        });
        (pass.handle(), albedo, normal, depth)
    };

    let (debug_vis, debug_texture) = if debug_vis {
        let mut pass = rg.add_pass("DebugVis");
        pass.read(normal).unwrap();
        let debug_texture = pass.create_texture(ResourceDesc::render_target(1920, 1080, Format::Rgba8Unorm), "DebugTexture");
        pass.set_execute(|ctx| {
            record(ctx, "DebugVis");
            Ok(())
        });
        (Some(pass.handle()), Some(debug_texture))
    } else {
        (None, None)
    };

    let (lighting, hdr_color) = {
        let mut pass = rg.add_pass("Lighting");
        for input in [shadow_map, albedo, normal, depth] {
            pass.read(input).unwrap();
        }
        let hdr_color = pass.create_texture(ResourceDesc::render_target(1920, 1080, Format::Rgba16Float), "HDRColor");
        pass.set_execute(move |ctx| {
            ctx.native_resource(shadow_map)?;
            ctx.native_resource(hdr_color)?;
            record(ctx, "Lighting");
            Ok(())
        });
        (pass.handle(), hdr_color)
    };

    let (tonemap, backbuffer) = {
        let mut pass = rg.add_pass("Tonemap");
        pass.read(hdr_color).unwrap();
        let backbuffer = pass.write(backbuffer).unwrap();
        pass.set_execute(move |ctx| {
            assert_eq!(ctx.native_resource(backbuffer)?, BACKBUFFER_NATIVE);
            record(ctx, "Tonemap");
            Ok(())
        });
        (pass.handle(), backbuffer)
    };

    Deferred {
        shadow,
        gbuffer,
        lighting,
        tonemap,
        debug_vis,
        shadow_map,
        albedo,
        normal,
        depth,
        hdr_color,
        backbuffer,
        debug_texture,
    }
}
