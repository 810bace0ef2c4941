//! prwarden-core: policy rule engine for pull requests
//!
//! Rules are declared in a YAML document in the repository. Each rule has
//! boolean conditions over pull request variables, a set of triggers and an
//! ordered list of actions. The engine runs matching rules when a trigger
//! fires and mirrors every rule's state onto an external check.
//!
//! ## Key Components
//!
//! - `expression`: condition language (lexer, parser, AST, operators)
//! - `registry`: variables, trigger types and action types
//! - `compiler`: rule document → `RuleRecord`s, with per-rule warnings
//! - `engine`: refresh, preview, trigger-driven execution
//! - `executor`: fail-fast action execution
//! - `reconciler`: idempotent check sync
//! - `ancestry`: commit ingestion and the `behind` computation
//! - `events`: repository events mapped onto the engine
//! - `scm`: provider contract plus a dry-run client

pub mod ancestry;
pub mod compiler;
pub mod config;
pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod executor;
pub mod expression;
pub mod metrics;
pub mod obs;
pub mod reconciler;
pub mod registry;
pub mod scm;
pub mod telemetry;

pub use compiler::{check_key, compile_rules, CompileWarning, CompiledRules};
pub use config::EngineConfig;
pub use context::{
    AncestryFacts, CommitState, CommitStatus, EvaluationContext, PullRequest, ReviewState,
    Reviewer,
};
pub use engine::RuleEngine;
pub use error::{CompileError, EngineError, EvaluationError, ExpressionError, Result};
pub use evaluation::{
    rollup, ActionOutcome, ConditionOutcome, ConditionResult, EvaluatedRule,
};
pub use events::{EventHandler, RepositoryEvent};
pub use expression::{ParsedExpression, TriState, Value, ValueType};
pub use metrics::METRICS;
pub use reconciler::{render_check, CheckReconciler, SyncOutcome};
pub use registry::{build_registry, Registry};
pub use scm::{
    CheckDetails, DryRunScmClient, MergeMethod, MergeRequest, ScmClient, ScmError, ScmResult,
};
