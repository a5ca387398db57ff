//! Tool registry — dispatch, dynamic reload, truncation, observers.
//!
//! The registry is the only path between the agent loop and tool code. It
//! refreshes dynamic tool sources before every schema listing and every
//! call, truncates oversized results, and converts every failure into a
//! string the model can read. `call` never returns an error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use pincer_core::tool::{Tool, ToolContext, ToolSchema};
use tracing::{debug, info, warn};

/// Change-detection snapshot for a tool source: sorted (path, mtime, len).
pub type Fingerprint = Vec<(PathBuf, SystemTime, u64)>;

/// A provider of dynamically loaded tools.
///
/// Sources are polled before every schema listing and call; an unchanged
/// fingerprint skips the reload entirely, so the steady-state cost is a
/// directory stat.
pub trait ToolSource: Send + Sync {
    fn name(&self) -> &str;
    fn fingerprint(&self) -> Fingerprint;
    fn load(&self) -> Vec<Arc<dyn Tool>>;
}

/// Fires before a tool is dispatched, with the tool name and arguments.
pub type StartObserver = dyn Fn(&str, &serde_json::Value) + Send + Sync;

/// Fires after a call completes, with the tool name and truncated result.
pub type DoneObserver = dyn Fn(&str, &str) + Send + Sync;

struct SourceState {
    fingerprint: Fingerprint,
    tool_names: Vec<String>,
}

/// Shared-mutable tool table. The lock is only ever held for table
/// bookkeeping, never across a tool's await.
#[derive(Default)]
struct Table {
    tools: HashMap<String, Arc<dyn Tool>>,
    sources: Vec<SourceState>,
}

pub struct ToolRegistry {
    table: Mutex<Table>,
    sources: Vec<Box<dyn ToolSource>>,
    context: ToolContext,
    max_output_chars: usize,
    on_start: Option<Arc<StartObserver>>,
    on_done: Option<Arc<DoneObserver>>,
}

impl ToolRegistry {
    pub fn new(context: ToolContext, max_output_chars: usize) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            sources: Vec::new(),
            context,
            max_output_chars,
            on_start: None,
            on_done: None,
        }
    }

    /// Register a built-in tool. Last registration wins on a name collision.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.tools.insert(tool.name().to_string(), tool);
    }

    /// Attach a dynamic tool source, polled on every schema()/call().
    pub fn add_source(&mut self, source: Box<dyn ToolSource>) {
        self.sources.push(source);
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.sources.push(SourceState {
            fingerprint: Fingerprint::new(),
            tool_names: Vec::new(),
        });
    }

    pub fn set_on_start(&mut self, observer: Arc<StartObserver>) {
        self.on_start = Some(observer);
    }

    pub fn set_on_done(&mut self, observer: Arc<DoneObserver>) {
        self.on_done = Some(observer);
    }

    /// Re-sync dynamic sources whose fingerprints changed.
    fn refresh(&self) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        for (i, source) in self.sources.iter().enumerate() {
            let fingerprint = source.fingerprint();
            if table.sources[i].fingerprint == fingerprint {
                continue;
            }

            let stale: Vec<String> = std::mem::take(&mut table.sources[i].tool_names);
            for name in stale {
                table.tools.remove(&name);
            }

            let loaded = source.load();
            info!(source = source.name(), tools = loaded.len(), "Reloaded tool source");
            for tool in loaded {
                let name = tool.name().to_string();
                table.sources[i].tool_names.push(name.clone());
                table.tools.insert(name, tool);
            }
            table.sources[i].fingerprint = fingerprint;
        }
    }

    /// Current tool schemas, name-ordered. Refreshes dynamic sources first.
    pub fn schema(&self) -> Vec<ToolSchema> {
        self.refresh();
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let mut schemas: Vec<ToolSchema> = table.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.refresh();
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = table.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch one tool call. Always returns a string the model can see:
    /// the (truncated) result, or a descriptive error line.
    pub async fn call(&self, name: &str, arguments: serde_json::Value) -> String {
        self.refresh();

        if let Some(observer) = &self.on_start {
            observer(name, &arguments);
        }

        let tool = {
            let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.tools.get(name).cloned()
        };

        let result = match tool {
            None => {
                let mut names: Vec<String> = {
                    let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
                    table.tools.keys().cloned().collect()
                };
                names.sort();
                warn!(tool = name, "Unknown tool requested");
                format!(
                    "[tool error] unknown tool '{name}'. Registered tools: {}",
                    names.join(", ")
                )
            }
            Some(tool) => {
                debug!(tool = name, "Dispatching tool call");
                match tool.execute(arguments, &self.context).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(tool = name, error = %e, "Tool call failed");
                        format!("[tool error] {e}")
                    }
                }
            }
        };

        let truncated = truncate_output(&result, self.max_output_chars);
        if let Some(observer) = &self.on_done {
            observer(name, &truncated);
        }
        truncated
    }
}

/// Head/tail truncation for oversized tool output.
///
/// Keeps the first 75% and last 25% of the budget (max minus the omission
/// marker) joined by a marker stating how many characters were dropped. The
/// result is never longer than `max` characters.
pub fn truncate_output(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        return s.to_string();
    }

    // Size the budget against the widest possible marker (omitted <= total)
    // so the final length stays under max even after the real count is in.
    let marker_len = marker(total).chars().count();
    if max <= marker_len {
        // No room for the marker at all; keep a plain head.
        return s.chars().take(max).collect();
    }
    let budget = max - marker_len;
    let head = budget * 3 / 4;
    let tail = budget - head;
    let omitted = total - head - tail;

    let head_str: String = s.chars().take(head).collect();
    let tail_str: String = s.chars().skip(total - tail).collect();
    format!("{head_str}{}{tail_str}", marker(omitted))
}

fn marker(omitted: usize) -> String {
    format!("\n... [{omitted} characters omitted] ...\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pincer_core::error::ToolError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticTool {
        name: &'static str,
        reply: String,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            Ok(self.reply.clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "deliberate failure".into(),
            })
        }
    }

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        fingerprint: Mutex<Fingerprint>,
    }

    impl ToolSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }
        fn fingerprint(&self) -> Fingerprint {
            self.fingerprint.lock().unwrap().clone()
        }
        fn load(&self) -> Vec<Arc<dyn Tool>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            vec![Arc::new(StaticTool {
                name: "dynamic",
                reply: "from source".into(),
            })]
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(ToolContext::rooted("/tmp"), 8000)
    }

    #[tokio::test]
    async fn dispatches_registered_tool() {
        let mut r = registry();
        r.register(Arc::new(StaticTool {
            name: "greet",
            reply: "hello".into(),
        }));
        assert_eq!(r.call("greet", serde_json::json!({})).await, "hello");
    }

    #[tokio::test]
    async fn unknown_tool_enumerates_names() {
        let mut r = registry();
        r.register(Arc::new(StaticTool {
            name: "alpha",
            reply: String::new(),
        }));
        r.register(Arc::new(StaticTool {
            name: "beta",
            reply: String::new(),
        }));
        let out = r.call("missing", serde_json::json!({})).await;
        assert!(out.starts_with("[tool error]"));
        assert!(out.contains("alpha, beta"));
    }

    #[tokio::test]
    async fn execution_failure_becomes_string() {
        let mut r = registry();
        r.register(Arc::new(FailingTool));
        let out = r.call("broken", serde_json::json!({})).await;
        assert!(out.starts_with("[tool error]"));
        assert!(out.contains("deliberate failure"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut r = registry();
        r.register(Arc::new(StaticTool {
            name: "dup",
            reply: "first".into(),
        }));
        r.register(Arc::new(StaticTool {
            name: "dup",
            reply: "second".into(),
        }));
        assert_eq!(r.call("dup", serde_json::json!({})).await, "second");
        assert_eq!(r.schema().len(), 1);
    }

    #[tokio::test]
    async fn unchanged_fingerprint_skips_reload() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut r = registry();
        r.add_source(Box::new(CountingSource {
            loads: loads.clone(),
            fingerprint: Mutex::new(vec![(
                PathBuf::from("a.toml"),
                SystemTime::UNIX_EPOCH,
                10,
            )]),
        }));

        r.schema();
        r.call("dynamic", serde_json::json!({})).await;
        r.schema();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_fingerprint_reloads() {
        let loads = Arc::new(AtomicUsize::new(0));
        let fingerprint = Mutex::new(vec![(
            PathBuf::from("a.toml"),
            SystemTime::UNIX_EPOCH,
            10,
        )]);
        let source = Arc::new(CountingSource {
            loads: loads.clone(),
            fingerprint,
        });

        struct Fwd(Arc<CountingSource>);
        impl ToolSource for Fwd {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn fingerprint(&self) -> Fingerprint {
                self.0.fingerprint()
            }
            fn load(&self) -> Vec<Arc<dyn Tool>> {
                self.0.load()
            }
        }

        let mut r = registry();
        r.add_source(Box::new(Fwd(source.clone())));
        r.schema();
        *source.fingerprint.lock().unwrap() =
            vec![(PathBuf::from("a.toml"), SystemTime::UNIX_EPOCH, 20)];
        r.schema();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn observers_fire_once_on_every_path() {
        let starts = Arc::new(AtomicUsize::new(0));
        let dones = Arc::new(AtomicUsize::new(0));

        let mut r = registry();
        r.register(Arc::new(FailingTool));
        let s = starts.clone();
        r.set_on_start(Arc::new(move |_, _| {
            s.fetch_add(1, Ordering::SeqCst);
        }));
        let d = dones.clone();
        r.set_on_done(Arc::new(move |_, _| {
            d.fetch_add(1, Ordering::SeqCst);
        }));

        r.call("broken", serde_json::json!({})).await;
        r.call("does-not-exist", serde_json::json!({})).await;
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(dones.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn truncation_short_output_untouched() {
        assert_eq!(truncate_output("short", 8000), "short");
    }

    #[test]
    fn truncation_keeps_head_and_tail_under_max() {
        let long = "a".repeat(500) + &"z".repeat(500);
        let out = truncate_output(&long, 100);
        assert!(out.chars().count() <= 100);
        assert!(out.starts_with('a'));
        assert!(out.ends_with('z'));
        assert!(out.contains("characters omitted"));
    }

    #[test]
    fn truncation_holds_when_max_is_smaller_than_the_marker() {
        let long = "x".repeat(100);
        let out = truncate_output(&long, 10);
        assert_eq!(out, "x".repeat(10));

        // The bound holds for every small max, marker-sized or not
        for max in 0..60 {
            let out = truncate_output(&long, max);
            assert!(
                out.chars().count() <= max,
                "length {} exceeds max {max}",
                out.chars().count()
            );
        }
    }

    #[test]
    fn truncation_omitted_count_is_consistent() {
        let long = "x".repeat(10_000);
        let out = truncate_output(&long, 1000);
        let kept = out.chars().filter(|&c| c == 'x').count();
        let marker_line = out
            .lines()
            .find(|l| l.contains("characters omitted"))
            .unwrap();
        let omitted: usize = marker_line
            .split('[')
            .nth(1)
            .unwrap()
            .split_whitespace()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(kept + omitted, 10_000);
    }

    #[test]
    fn truncation_head_is_three_quarters() {
        let long: String = "a".repeat(4000) + &"z".repeat(4000);
        let out = truncate_output(&long, 1000);
        let heads = out.chars().take_while(|&c| c == 'a').count();
        let tails = out.chars().rev().take_while(|&c| c == 'z').count();
        assert!(heads > tails);
        assert!(heads >= tails * 2);
    }
}
