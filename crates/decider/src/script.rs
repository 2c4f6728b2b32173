//! User-scripted decisions, written in Rhai.
//!
//! The script must define `fn decide(inputs)`. `inputs` is an array of
//! `#{ LogName, OutputHash }` maps; the function returns
//! `#{ OutputHash: "...", LogNames: [...] }`.

use std::sync::Arc;

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};

use crate::{DeciderError, DeciderInput, DeciderOutput, Result};

const ENTRY_POINT: &str = "decide";
const MAX_OPERATIONS: u64 = 100_000;
const MAX_CALL_LEVELS: usize = 32;
const MAX_STRING_SIZE: usize = 64 * 1024;
const MAX_COLLECTION_SIZE: usize = 10_000;

/// Scripted engines cannot judge their own certainty.
pub const SCRIPT_CONFIDENCE: u32 = 1;

#[derive(Clone)]
pub struct ScriptDecider {
    ast: Arc<AST>,
}

impl std::fmt::Debug for ScriptDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptDecider").finish_non_exhaustive()
    }
}

/// A fresh, resource-limited engine. Nothing is shared between calls.
fn sandbox() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_call_levels(MAX_CALL_LEVELS);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_COLLECTION_SIZE);
    engine.set_max_map_size(MAX_COLLECTION_SIZE);
    engine.disable_symbol("eval");
    engine.set_module_resolver(DummyModuleResolver::new());
    engine
}

impl ScriptDecider {
    pub fn new(source: &str) -> Result<Self> {
        let ast = sandbox()
            .compile(source)
            .map_err(|e| DeciderError::Script(e.to_string()))?;
        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == 1);
        if !has_entry {
            return Err(DeciderError::Script(format!("script must define fn {ENTRY_POINT}(inputs)")));
        }
        Ok(Self { ast: Arc::new(ast) })
    }

    pub fn decide(&self, inputs: &[DeciderInput]) -> Result<DeciderOutput> {
        if inputs.is_empty() {
            return Err(DeciderError::NoInputs);
        }

        let args: Array = inputs
            .iter()
            .map(|input| {
                let mut m = Map::new();
                m.insert("LogName".into(), Dynamic::from(input.log_name.clone()));
                m.insert("OutputHash".into(), Dynamic::from(input.output_hash.clone()));
                Dynamic::from_map(m)
            })
            .collect();

        let engine = sandbox();
        let mut scope = Scope::new();
        let ret: Dynamic = engine
            .call_fn(&mut scope, &self.ast, ENTRY_POINT, (args,))
            .map_err(|e| DeciderError::Script(e.to_string()))?;

        parse_return(ret)
    }
}

fn parse_return(ret: Dynamic) -> Result<DeciderOutput> {
    let shape = |msg: &str| DeciderError::Script(msg.to_string());

    let map = ret
        .try_cast::<Map>()
        .ok_or_else(|| shape("return value is not a map"))?;

    let output_hash = map
        .get("OutputHash")
        .cloned()
        .ok_or_else(|| shape("OutputHash missing"))?
        .into_string()
        .map_err(|_| shape("OutputHash is not a string"))?;

    let names = map
        .get("LogNames")
        .cloned()
        .ok_or_else(|| shape("LogNames missing"))?
        .try_cast::<Array>()
        .ok_or_else(|| shape("LogNames is not an array"))?;

    let log_names = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            name.into_string()
                .map_err(|_| DeciderError::Script(format!("LogNames[{i}] is not a string")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DeciderOutput { output_hash, confidence: SCRIPT_CONFIDENCE, log_names })
}
