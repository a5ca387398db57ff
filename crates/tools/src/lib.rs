//! Built-in tools and the tool registry for Pincer.
//!
//! Tools give the agent the ability to act in the world: run shell
//! commands, read and write workspace files, search the web, keep notes
//! about the user. User-defined tools are picked up from TOML manifests in
//! `workspace/tools/` and reloaded whenever a manifest changes.

pub mod file_ops;
pub mod manifest;
pub mod memory;
pub mod registry;
pub mod shell;
pub mod utils;
pub mod web_search;

use std::sync::Arc;

use pincer_core::tool::ToolContext;

pub use manifest::{CommandTool, ManifestSource};
pub use registry::{Fingerprint, ToolRegistry, ToolSource, truncate_output};

/// Create a registry with every built-in tool plus the manifest source
/// watching `workspace/tools/`.
pub fn standard_registry(context: ToolContext, max_output_chars: usize) -> ToolRegistry {
    let manifest_dir = context.workspace.join("tools");
    let mut registry = ToolRegistry::new(context, max_output_chars);
    registry.register(Arc::new(shell::ShellTool));
    registry.register(Arc::new(file_ops::ReadFileTool));
    registry.register(Arc::new(file_ops::WriteFileTool));
    registry.register(Arc::new(file_ops::ListFilesTool));
    registry.register(Arc::new(file_ops::DeleteFileTool));
    registry.register(Arc::new(web_search::WebSearchTool::new()));
    registry.register(Arc::new(utils::CurrentTimeTool));
    registry.register(Arc::new(utils::SendMessageTool));
    registry.register(Arc::new(memory::ReadUserMemoryTool));
    registry.register(Arc::new(memory::UpdateUserMemoryTool));
    registry.add_source(Box::new(ManifestSource::new(manifest_dir)));
    registry
}
