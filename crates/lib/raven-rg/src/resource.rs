use bitflags::bitflags;

use crate::barrier::ResourceState;

/// What kind of GPU object a resource describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture2D,
    TextureCube,
    Buffer,
    RenderTarget,
    DepthStencil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Unknown,
    Rgba8Unorm,
    Rgba16Float,
    Rg16Snorm,
    R32Float,
    D32Float,
}

impl Format {
    #[inline]
    pub fn is_depth(self) -> bool {
        matches!(self, Format::D32Float)
    }
}

bitflags! {
    /// How a resource may be bound over its lifetime.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ResourceUsage: u32 {
        const SHADER_RESOURCE  = 1 << 0;
        const RENDER_TARGET    = 1 << 1;
        const UNORDERED_ACCESS = 1 << 2;
        const DEPTH_STENCIL    = 1 << 3;
    }
}

/// Description of a resource, transient or imported.
///
/// Buffers store their byte size in `width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    pub kind: ResourceKind,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub mip_levels: u32,
    pub format: Format,
    pub usage: ResourceUsage,
}

impl ResourceDesc {
    fn new(kind: ResourceKind, width: u32, height: u32, format: Format, usage: ResourceUsage) -> Self {
        Self {
            kind,
            width,
            height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            format,
            usage,
        }
    }

    pub fn texture_2d(width: u32, height: u32, format: Format) -> Self {
        Self::new(ResourceKind::Texture2D, width, height, format, ResourceUsage::SHADER_RESOURCE)
    }

    pub fn texture_cube(size: u32, format: Format) -> Self {
        let mut desc = Self::new(ResourceKind::TextureCube, size, size, format, ResourceUsage::SHADER_RESOURCE);
        desc.array_size = 6;
        desc
    }

    pub fn render_target(width: u32, height: u32, format: Format) -> Self {
        Self::new(
            ResourceKind::RenderTarget,
            width,
            height,
            format,
            ResourceUsage::RENDER_TARGET | ResourceUsage::SHADER_RESOURCE,
        )
    }

    pub fn depth_stencil(width: u32, height: u32, format: Format) -> Self {
        Self::new(
            ResourceKind::DepthStencil,
            width,
            height,
            format,
            ResourceUsage::DEPTH_STENCIL | ResourceUsage::SHADER_RESOURCE,
        )
    }

    pub fn buffer(size: u32) -> Self {
        Self::new(
            ResourceKind::Buffer,
            size,
            1,
            Format::Unknown,
            ResourceUsage::UNORDERED_ACCESS | ResourceUsage::SHADER_RESOURCE,
        )
    }

    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size.max(1);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth.max(1);
        self
    }

    #[inline]
    pub fn is_depth(&self) -> bool {
        self.kind == ResourceKind::DepthStencil || self.format.is_depth()
    }

    /// Two resources can share one backing allocation when everything but the usage matches.
    /// The shared allocation is created with the union of both usages.
    pub fn is_alias_compatible(&self, other: &ResourceDesc) -> bool {
        self.kind == other.kind
            && self.format == other.format
            && self.width == other.width
            && self.height == other.height
            && self.depth == other.depth
            && self.array_size == other.array_size
            && self.mip_levels == other.mip_levels
    }

    /// State a plain `read()` puts the resource in.
    pub fn default_read_state(&self) -> ResourceState {
        if self.is_depth() {
            ResourceState::DepthRead
        } else {
            ResourceState::ShaderResource
        }
    }

    /// State a plain `write()` or `create_texture()` puts the resource in.
    pub fn default_write_state(&self) -> ResourceState {
        if self.is_depth() {
            ResourceState::DepthWrite
        } else if self.kind == ResourceKind::Buffer {
            ResourceState::UnorderedAccess
        } else if self.usage.contains(ResourceUsage::UNORDERED_ACCESS)
            && !self.usage.contains(ResourceUsage::RENDER_TARGET)
        {
            ResourceState::UnorderedAccess
        } else {
            ResourceState::RenderTarget
        }
    }
}
