use std::path::PathBuf;

use thiserror::Error;

use crate::device::DeviceError;
use crate::graph_resource::ResourceHandle;
use crate::pass::PassHandle;
use crate::resource::ResourceDesc;

pub type Result<T, E = RenderGraphError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RenderGraphError {
    /// Passes are listed in dependency order, `resources[i]` carries the dependency
    /// from `passes[i]` to `passes[(i + 1) % passes.len()]`.
    #[error("Render graph contains a cycle: {}", describe_cycle(.passes, .resources))]
    GraphCycle {
        passes: Vec<String>,
        resources: Vec<Vec<String>>,
    },

    #[error("Pass '{pass}' references {handle:?} which was never created in this graph")]
    DanglingHandle { pass: String, handle: ResourceHandle },

    #[error("Stale handle to '{resource}': expected version {expected}, got {got}")]
    StaleVersion {
        resource: String,
        expected: u32,
        got: u32,
    },

    #[error("Failed to allocate slot {slot} (first used by '{resource}')")]
    AllocationFailure {
        slot: usize,
        resource: String,
        desc: ResourceDesc,
        #[source]
        source: DeviceError,
    },

    #[error("Pass '{pass}' failed")]
    PassExecution {
        pass: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Failed to submit recorded commands")]
    Submission(#[source] DeviceError),

    #[error("Render graph has not been compiled")]
    NotCompiled,

    #[error("Pass '{pass}' accessed '{resource}' without declaring it")]
    UndeclaredResource { pass: String, resource: String },

    #[error("Invalid pass handle {0:?}")]
    InvalidPass(PassHandle),

    #[error("Failed to write graph dump to {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_cycle(passes: &[String], resources: &[Vec<String>]) -> String {
    let mut out = String::new();
    for (idx, pass) in passes.iter().enumerate() {
        out.push_str(pass);
        let via = resources.get(idx).map(|r| r.join(", ")).unwrap_or_default();
        out.push_str(&format!(" -[{}]-> ", via));
    }
    if let Some(first) = passes.first() {
        out.push_str(first);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_names_the_chain() {
        let err = RenderGraphError::GraphCycle {
            passes: vec!["A".into(), "B".into()],
            resources: vec![vec!["ATex".into()], vec!["BTex".into()]],
        };

        assert_eq!(
            err.to_string(),
            "Render graph contains a cycle: A -[ATex]-> B -[BTex]-> A"
        );
    }
}
