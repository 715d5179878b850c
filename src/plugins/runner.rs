//! Sandboxed plugin execution
//!
//! Untrusted plugin scripts run in a hardened Rhai engine. The sandbox
//! exposes exactly one capability object: a read-only context getter plus the
//! `recommend`/`actions` result setters. No filesystem, network, process or
//! module access exists inside the engine, and a wall-clock deadline
//! terminates runaway scripts from within the evaluator. A plugin can only
//! *propose* actions; all actual mutation happens later through the applier.

use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

use super::{PluginManifest, PluginRegistry};

/// Result shape returned for a plugin run
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum PluginRunResult {
    Completed {
        recommendations: Value,
        actions: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Error {
        error: String,
        detail: String,
    },
}

/// A finished run: the manifest plus what the plugin produced
#[derive(Debug, Clone, serde::Serialize)]
pub struct PluginRun {
    pub manifest: PluginManifest,
    pub result: PluginRunResult,
}

/// What the setters and an exported `run` function may fill in
#[derive(Debug, Clone)]
struct SandboxOutcome {
    recommendations: Value,
    actions: Value,
    output: Option<String>,
}

/// Executes plugin entry scripts under a hard timeout
pub struct PluginRunner {
    timeout: Duration,
}

impl PluginRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a plugin by name. Returns None for an unknown plugin; every other
    /// failure mode is folded into the result shape.
    pub async fn run(
        &self,
        registry: &PluginRegistry,
        name: &str,
        context: Value,
    ) -> Option<PluginRun> {
        let manifest = registry.find(name)?;

        let entry = registry.entry_path(&manifest.name);
        if !entry.exists() {
            // Declarative plugin: the manifest is the whole result.
            let result = PluginRunResult::Completed {
                recommendations: Value::Array(manifest.recommendations.clone()),
                actions: Value::Array(manifest.actions.clone()),
                output: None,
            };
            return Some(PluginRun { manifest, result });
        }

        let code = match tokio::fs::read_to_string(&entry).await {
            Ok(code) => code,
            Err(err) => {
                let result = PluginRunResult::Error {
                    error: "plugin entry unreadable".to_string(),
                    detail: err.to_string(),
                };
                return Some(PluginRun { manifest, result });
            }
        };

        let defaults = SandboxOutcome {
            recommendations: Value::Array(manifest.recommendations.clone()),
            actions: Value::Array(manifest.actions.clone()),
            output: None,
        };

        let timeout = self.timeout;
        let worker =
            tokio::task::spawn_blocking(move || execute_sandboxed(&code, context, defaults, timeout));

        // The in-engine deadline terminates runaway scripts; the outer
        // timeout is a second containment layer around the blocking task.
        let result = match tokio::time::timeout(timeout * 2, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => PluginRunResult::Error {
                error: "plugin sandbox panicked".to_string(),
                detail: join_err.to_string(),
            },
            Err(_) => PluginRunResult::Error {
                error: "plugin timed out".to_string(),
                detail: format!("exceeded {}ms", timeout.as_millis() * 2),
            },
        };

        Some(PluginRun { manifest, result })
    }
}

fn execute_sandboxed(
    code: &str,
    context: Value,
    defaults: SandboxOutcome,
    timeout: Duration,
) -> PluginRunResult {
    let outcome = Arc::new(Mutex::new(defaults));

    let mut engine = Engine::new();
    engine.set_max_expr_depths(100, 100);
    engine.set_max_string_size(1_000_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);
    engine.disable_symbol("eval");
    engine.disable_symbol("import");
    engine.disable_symbol("export");

    let context_dynamic = match rhai::serde::to_dynamic(&context) {
        Ok(dynamic) => dynamic,
        Err(err) => {
            return PluginRunResult::Error {
                error: "plugin context conversion failed".to_string(),
                detail: err.to_string(),
            }
        }
    };

    // The capability object: context getter + result setters, nothing else.
    let ctx_for_getter = context_dynamic.clone();
    engine.register_fn("get_context", move || ctx_for_getter.clone());

    let recommend_outcome = outcome.clone();
    engine.register_fn("recommend", move |items: Dynamic| {
        if let Ok(value) = rhai::serde::from_dynamic::<Value>(&items) {
            if !value.is_null() {
                recommend_outcome.lock().expect("sandbox outcome poisoned").recommendations = value;
            }
        }
    });

    let actions_outcome = outcome.clone();
    engine.register_fn("actions", move |items: Dynamic| {
        if let Ok(value) = rhai::serde::from_dynamic::<Value>(&items) {
            if !value.is_null() {
                actions_outcome.lock().expect("sandbox outcome poisoned").actions = value;
            }
        }
    });

    engine.register_fn("log", |message: &str| {
        trace!("[plugin] {message}");
    });

    let deadline = Instant::now() + timeout;
    engine.on_progress(move |_| {
        if Instant::now() > deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });

    let ast = match engine.compile(code) {
        Ok(ast) => ast,
        Err(err) => {
            return PluginRunResult::Error {
                error: "plugin compile error".to_string(),
                detail: err.to_string(),
            }
        }
    };

    let mut scope = Scope::new();
    if let Err(err) = engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast) {
        return sandbox_error(*err);
    }

    // An exported `run(ctx)` overrides whatever the setters populated.
    let has_run = ast.iter_functions().any(|f| f.name == "run");
    if has_run {
        match engine.call_fn::<Dynamic>(&mut scope, &ast, "run", (context_dynamic,)) {
            Ok(returned) => {
                if let Ok(Value::Object(map)) = rhai::serde::from_dynamic::<Value>(&returned) {
                    let mut outcome = outcome.lock().expect("sandbox outcome poisoned");
                    if let Some(recommendations) = map.get("recommendations") {
                        if !recommendations.is_null() {
                            outcome.recommendations = recommendations.clone();
                        }
                    }
                    if let Some(actions) = map.get("actions") {
                        if !actions.is_null() {
                            outcome.actions = actions.clone();
                        }
                    }
                    if let Some(Value::String(output)) = map.get("output") {
                        outcome.output = Some(output.clone());
                    }
                }
            }
            Err(err) => return sandbox_error(*err),
        }
    }

    let outcome = outcome.lock().expect("sandbox outcome poisoned").clone();
    PluginRunResult::Completed {
        recommendations: outcome.recommendations,
        actions: outcome.actions,
        output: outcome.output,
    }
}

fn sandbox_error(err: rhai::EvalAltResult) -> PluginRunResult {
    match err {
        rhai::EvalAltResult::ErrorTerminated(..) => PluginRunResult::Error {
            error: "plugin timed out".to_string(),
            detail: "wall-clock limit exceeded".to_string(),
        },
        other => PluginRunResult::Error {
            error: "plugin sandbox error".to_string(),
            detail: other.to_string(),
        },
    }
}
