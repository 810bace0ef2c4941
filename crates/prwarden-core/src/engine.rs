//! Rule engine: refresh, preview, trigger-driven execution and check sync.
//!
//! ```text
//! refresh_rules ─▶ compile ─▶ RuleStore::replace_rules
//!
//! execute(trigger, ctx)
//!   └─ for rule in rules_for_trigger (by ordinal)
//!        ├─ evaluate conditions
//!        ├─ all true? ─▶ execute_actions (fail-fast, results upserted)
//!        └─ CheckReconciler::reconcile
//! ```
//!
//! A failing rule is logged and does not stop the rules after it.

use std::sync::Arc;

use prwarden_state::{RepositoryId, RuleRecord, Store};
use tracing::{debug, info, instrument, warn};

use crate::ancestry;
use crate::compiler::{compile_rules, CompiledRules};
use crate::config::EngineConfig;
use crate::context::EvaluationContext;
use crate::error::{EngineError, Result};
use crate::evaluation::{evaluate_conditions, EvaluatedRule};
use crate::executor::execute_actions;
use crate::metrics::METRICS;
use crate::obs;
use crate::reconciler::CheckReconciler;
use crate::registry::Registry;
use crate::scm::ScmClient;

pub struct RuleEngine {
    store: Arc<dyn Store>,
    scm: Arc<dyn ScmClient>,
    registry: Arc<Registry>,
    config: EngineConfig,
    reconciler: CheckReconciler,
}

impl RuleEngine {
    pub fn new(
        store: Arc<dyn Store>,
        scm: Arc<dyn ScmClient>,
        registry: Arc<Registry>,
        config: EngineConfig,
    ) -> Self {
        let reconciler = CheckReconciler::new(store.clone(), scm.clone(), config.clone());
        Self {
            store,
            scm,
            registry,
            config,
            reconciler,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn scm(&self) -> &Arc<dyn ScmClient> {
        &self.scm
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch the rule document from the repository and replace its rules.
    #[instrument(skip(self), fields(repository = %repository))]
    pub async fn refresh_rules(&self, repository: &RepositoryId) -> Result<CompiledRules> {
        let path = &self.config.rules_path;
        let source = self
            .scm
            .get_content(repository, path)
            .await?
            .ok_or_else(|| EngineError::RulesFileMissing { path: path.clone() })?;
        self.apply_rules(repository, &source).await
    }

    /// Compile `source` and replace the repository's rules with the result.
    /// A document that does not compile leaves the stored rules untouched.
    pub async fn apply_rules(
        &self,
        repository: &RepositoryId,
        source: &str,
    ) -> Result<CompiledRules> {
        let compiled = compile_rules(source, repository, &self.registry)?;
        self.store
            .replace_rules(repository, compiled.rules.clone())
            .await?;
        obs::emit_rules_refreshed(
            repository.as_str(),
            compiled.rules.len(),
            compiled.warnings.len(),
        );
        Ok(compiled)
    }

    /// Attach ancestry facts to `ctx` unless it already carries them. A
    /// store failure leaves `behind` unknown.
    pub async fn load_ancestry(&self, ctx: &EvaluationContext) -> EvaluationContext {
        if ctx.ancestry.is_some() {
            return ctx.clone();
        }
        match ancestry::load_facts(
            self.store.as_ref(),
            &ctx.repository,
            &ctx.pull_request,
            self.config.ancestry_depth,
        )
        .await
        {
            Ok(facts) => ctx.clone().with_ancestry(facts),
            Err(e) => {
                warn!(
                    repository = %ctx.repository,
                    pull_request = ctx.pull_request.number,
                    error = %e,
                    "ancestry unavailable"
                );
                ctx.clone()
            }
        }
    }

    async fn evaluate_rule(
        &self,
        rule: &RuleRecord,
        ctx: &EvaluationContext,
    ) -> Result<EvaluatedRule> {
        let (conditions, variables) = evaluate_conditions(&self.registry, rule, ctx);
        let results = self
            .store
            .action_results_for(&rule.action_ids(), ctx.head_sha())
            .await?;
        Ok(EvaluatedRule::new(rule.clone(), conditions, variables, results))
    }

    /// Evaluate every rule of the repository without side effects.
    pub async fn preview(&self, ctx: &EvaluationContext) -> Result<Vec<EvaluatedRule>> {
        let ctx = self.load_ancestry(ctx).await;
        let rules = self.store.list_rules(&ctx.repository).await?;
        let mut out = Vec::with_capacity(rules.len());
        for rule in &rules {
            out.push(self.evaluate_rule(rule, &ctx).await?);
        }
        Ok(out)
    }

    /// Preview every rule and sync its check.
    #[instrument(skip(self, ctx), fields(repository = %ctx.repository, pull_request = ctx.pull_request.number))]
    pub async fn refresh_checks(&self, ctx: &EvaluationContext) -> Result<Vec<EvaluatedRule>> {
        let evaluated = self.preview(ctx).await?;
        for rule in &evaluated {
            if let Err(e) = self.reconciler.reconcile(ctx, rule).await {
                obs::emit_rule_error(&rule.rule.title, &e);
            }
        }
        Ok(evaluated)
    }

    /// Run every rule listening to `trigger`. Returns the rules that were
    /// evaluated successfully, in ordinal order.
    #[instrument(skip(self, ctx), fields(repository = %ctx.repository, pull_request = ctx.pull_request.number))]
    pub async fn execute(
        &self,
        trigger: &str,
        ctx: &EvaluationContext,
    ) -> Result<Vec<EvaluatedRule>> {
        let ctx = self.load_ancestry(ctx).await;
        let rules = self
            .store
            .rules_for_trigger(&ctx.repository, trigger)
            .await?;
        debug!(trigger, rules = rules.len(), "rules selected");

        let mut out = Vec::with_capacity(rules.len());
        for rule in &rules {
            match self.run_rule(rule, &ctx).await {
                Ok(evaluated) => out.push(evaluated),
                Err(e) => obs::emit_rule_error(&rule.title, &e),
            }
        }
        info!(trigger, evaluated = out.len(), "trigger handled");
        Ok(out)
    }

    async fn run_rule(
        &self,
        rule: &RuleRecord,
        ctx: &EvaluationContext,
    ) -> Result<EvaluatedRule> {
        let (conditions, variables) = evaluate_conditions(&self.registry, rule, ctx);
        METRICS.inc_rules_evaluated();

        let matched = conditions.iter().all(|c| c.result.is_true());
        if matched {
            execute_actions(
                self.store.as_ref(),
                &self.registry,
                rule,
                ctx,
                self.scm.as_ref(),
            )
            .await?;
        }

        let results = self
            .store
            .action_results_for(&rule.action_ids(), ctx.head_sha())
            .await?;
        let evaluated = EvaluatedRule::new(rule.clone(), conditions, variables, results);
        obs::emit_rule_evaluated(
            &rule.title,
            ctx.pull_request.number,
            matched,
            evaluated.status.as_str(),
        );

        self.reconciler.reconcile(ctx, &evaluated).await?;
        Ok(evaluated)
    }
}
