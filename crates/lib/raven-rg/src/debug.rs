use std::fmt::Write as _;
use std::path::Path;

use crate::error::{RenderGraphError, Result};
use crate::graph::RenderGraph;
use crate::graph_resource::ResourceHandle;

impl RenderGraph {
    /// Human readable execution plan. Culled passes and resources are left out.
    pub fn dump_execution_order(&self) -> Result<String> {
        let compiled = self.compiled().ok_or(RenderGraphError::NotCompiled)?;
        let resource_name = |handle: &ResourceHandle| {
            self.resource_name(*handle)
                .map(|name| format!("{}@v{}", name, handle.version()))
                .unwrap_or_else(|| handle.to_string())
        };

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Execution order ({} passes, {} culled):",
            compiled.execution_order().len(),
            compiled.culled_passes().len()
        );

        for (position, &pass) in compiled.execution_order().iter().enumerate() {
            let node = match self.pass(pass) {
                Some(node) => node,
                None => continue,
            };
            let _ = writeln!(out, "  {}: {}", position, node.name());

            let reads: Vec<String> = node.inputs().iter().map(|a| resource_name(&a.handle)).collect();
            let writes: Vec<String> = node
                .outputs()
                .iter()
                .filter(|a| !node.creates().contains(&a.handle))
                .map(|a| resource_name(&a.handle))
                .collect();
            let creates: Vec<String> = node.creates().iter().map(|h| resource_name(h)).collect();
            let destroys: Vec<String> = node.destroys().iter().map(|h| resource_name(h)).collect();

            for (label, list) in [("creates", creates), ("reads", reads), ("writes", writes), ("destroys", destroys)] {
                if !list.is_empty() {
                    let _ = writeln!(out, "      {}: {}", label, list.join(", "));
                }
            }

            for barrier in compiled.barriers(position) {
                let name = self
                    .resources
                    .nodes()
                    .get(barrier.resource as usize)
                    .map(|node| node.name())
                    .unwrap_or("?");
                let _ = writeln!(out, "      barrier: {} {}", name, barrier.kind);
            }
        }

        if !compiled.alias_slots().is_empty() {
            let _ = writeln!(out, "Alias slots:");
            for (idx, slot) in compiled.alias_slots().iter().enumerate() {
                let names: Vec<&str> = slot
                    .resources
                    .iter()
                    .filter_map(|&id| self.resources.nodes().get(id as usize).map(|node| node.name()))
                    .collect();
                let _ = writeln!(
                    out,
                    "  {}: [{}, {}] {:?} {}x{} <- {}",
                    idx,
                    slot.first_use,
                    slot.last_use,
                    slot.desc.kind,
                    slot.desc.width,
                    slot.desc.height,
                    names.join(", ")
                );
            }
        }

        glog::debug!("{}", out);
        Ok(out)
    }

    /// Graphviz description of the declared graph, culled nodes are drawn dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph RenderGraph {\n    rankdir=LR;\n");

        for (handle, pass) in self.passes() {
            let style = if pass.is_culled() { ", style=dashed" } else { "" };
            let _ = writeln!(
                out,
                "    p{} [label=\"{}\", shape=box{}];",
                handle.index(),
                escape(pass.name()),
                style
            );
        }

        for (id, node) in self.resources().enumerate() {
            let shape = if node.is_imported() { "doubleoctagon" } else { "ellipse" };
            let style = if node.is_culled() { ", style=dashed" } else { "" };
            let _ = writeln!(
                out,
                "    r{} [label=\"{}\", shape={}{}];",
                id,
                escape(node.name()),
                shape,
                style
            );
        }

        for (handle, pass) in self.passes() {
            for input in pass.inputs() {
                let _ = writeln!(
                    out,
                    "    r{} -> p{} [label=\"v{}\"];",
                    input.handle.id(),
                    handle.index(),
                    input.handle.version()
                );
            }
            for output in pass.outputs() {
                let _ = writeln!(
                    out,
                    "    p{} -> r{} [label=\"v{}\"];",
                    handle.index(),
                    output.handle.id(),
                    output.handle.version()
                );
            }
        }

        out.push_str("}\n");
        out
    }

    /// Write `to_dot()` to `path`.
    pub fn visualize_graph(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_dot()).map_err(|source| RenderGraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        glog::info!("Render graph written to {:?}", path);
        Ok(())
    }
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}
