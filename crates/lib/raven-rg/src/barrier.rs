use std::fmt;

/// Usage state a resource must be in before a pass touches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Contents are undefined, e.g. a transient before its first write.
    Undefined,
    Common,
    ShaderResource,
    RenderTarget,
    DepthWrite,
    DepthRead,
    UnorderedAccess,
    Present,
}

impl ResourceState {
    #[inline]
    pub fn is_write(self) -> bool {
        matches!(
            self,
            ResourceState::RenderTarget | ResourceState::DepthWrite | ResourceState::UnorderedAccess
        )
    }
}

/// Synchronization directive, independent of any native API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BarrierKind {
    Transition {
        before: ResourceState,
        after: ResourceState,
    },
    /// The backing allocation held `previous` until now, its contents are discarded.
    Aliasing {
        previous: u32,
    },
    /// Write after write on the same resource in unordered access state.
    UnorderedAccess,
}

/// Barrier of the compiled plan, issued right before the pass it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Barrier {
    /// Logical resource id.
    pub resource: u32,
    pub kind: BarrierKind,
}

impl Barrier {
    pub(crate) fn transition(resource: u32, before: ResourceState, after: ResourceState) -> Self {
        Self {
            resource,
            kind: BarrierKind::Transition { before, after },
        }
    }

    pub(crate) fn aliasing(resource: u32, previous: u32) -> Self {
        Self {
            resource,
            kind: BarrierKind::Aliasing { previous },
        }
    }

    pub(crate) fn unordered_access(resource: u32) -> Self {
        Self {
            resource,
            kind: BarrierKind::UnorderedAccess,
        }
    }
}

impl fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierKind::Transition { before, after } => write!(f, "{:?} -> {:?}", before, after),
            BarrierKind::Aliasing { previous } => write!(f, "alias (was #{})", previous),
            BarrierKind::UnorderedAccess => write!(f, "uav"),
        }
    }
}
