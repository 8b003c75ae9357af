pub mod context;
pub mod engine;
pub mod expression;
pub mod loader;
pub mod script;
pub mod service;
pub mod template;

pub use context::ExecutionContext;
pub use engine::PlaybookEngine;
pub use expression::{evaluate_condition, Expression};
pub use loader::PlaybookLoader;
pub use script::{DisabledScriptEvaluator, RhaiScriptEvaluator, ScriptEvaluator};
pub use service::{LoadedFile, PlaybookService};
