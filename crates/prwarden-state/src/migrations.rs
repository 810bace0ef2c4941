//! SurrealDB schema migrations and initialization
//!
//! Defines every prwarden table with its indexes. Composite keys are encoded
//! in record ids (`type::thing(table, [..])`) so upserts stay idempotent.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all prwarden tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing prwarden SurrealDB schema");

    init_rules_table(db).await?;
    init_action_results_table(db).await?;
    init_check_runs_table(db).await?;
    init_commit_tables(db).await?;
    init_branches_table(db).await?;

    info!("prwarden schema initialization complete");
    Ok(())
}

/// Initialize `rules` table
///
/// Schema:
/// ```text
/// TABLE rules {
///   rule_id:      STRING (unique)
///   repository:   STRING (indexed)
///   title:        STRING
///   check_key:    STRING (unique per repository)
///   description:  STRING?
///   ordinal:      INT    (unique per repository)
///   conditions:   ARRAY<OBJECT>
///   triggers:     ARRAY<OBJECT>
///   trigger_keys: ARRAY<STRING>
///   actions:      ARRAY<OBJECT>
///   created_at:   DATETIME
/// }
/// ```
async fn init_rules_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing rules table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS rules SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_rule_id ON TABLE rules COLUMNS rule_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_rule_repository ON TABLE rules COLUMNS repository;
        DEFINE INDEX IF NOT EXISTS idx_rule_order ON TABLE rules COLUMNS repository, ordinal UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_rule_check_key ON TABLE rules COLUMNS repository, check_key UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ rules table initialized");
    Ok(())
}

/// Initialize `action_results` table
///
/// Record id: `[action_id, sha]`
async fn init_action_results_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing action_results table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS action_results SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_action_result ON TABLE action_results COLUMNS action_id, sha UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ action_results table initialized");
    Ok(())
}

/// Initialize `check_runs` table
///
/// Record id: `[repository, pull_request, check_key]`
async fn init_check_runs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing check_runs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS check_runs SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_check_run ON TABLE check_runs COLUMNS repository, pull_request, check_key UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ check_runs table initialized");
    Ok(())
}

/// Initialize `commits` and `commit_parents` tables
///
/// Record ids: `[repository, sha]` and `[repository, child, parent]`
async fn init_commit_tables(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing commit graph tables");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS commits SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_commit_sha ON TABLE commits COLUMNS repository, sha UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_commit_pr ON TABLE commits COLUMNS repository, pull_request;

        DEFINE TABLE IF NOT EXISTS commit_parents SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_commit_edge ON TABLE commit_parents COLUMNS repository, child, parent UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_commit_edge_child ON TABLE commit_parents COLUMNS repository, child;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ commit graph tables initialized");
    Ok(())
}

/// Initialize `branches` table
///
/// Record id: `[repository, name]`
async fn init_branches_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing branches table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS branches SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_branch ON TABLE branches COLUMNS repository, name UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ branches table initialized");
    Ok(())
}
