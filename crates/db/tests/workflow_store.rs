//! Integration tests for the workflow store.
//!
//! Exercises templates, instances, history and escalations against a real
//! database:
//! - Template graph creation with index-to-id transition mapping
//! - Schema-level rejection of cross-template transitions
//! - Instance lifecycle: start, decision, advance, completion
//! - Optimistic version guards under stale writers
//! - Overdue detection and escalation idempotency

use chrono::{Duration, SubsecRound, Utc};
use sqlx::PgPool;

use mdc_core::types::{DbId, Timestamp};
use mdc_core::workflow::{ConditionKind, StageKind, StageOutcome};
use mdc_db::models::transaction::CreateTransaction;
use mdc_db::models::workflow::{
    CreateWorkflowStage, CreateWorkflowTemplate, CreateWorkflowTransition, TemplateDetail,
    INSTANCE_ACTIVE, INSTANCE_COMPLETED,
};
use mdc_db::repositories::{
    EscalationRepo, TransactionRepo, WorkflowInstanceRepo, WorkflowTemplateRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn template(name: &str) -> CreateWorkflowTemplate {
    CreateWorkflowTemplate {
        name: name.to_string(),
        version: 1,
        category: "general".to_string(),
        allow_parallel: false,
        auto_assign: false,
        created_by: None,
    }
}

fn stage(name: &str, order: i32, kind: StageKind) -> CreateWorkflowStage {
    CreateWorkflowStage {
        name: name.to_string(),
        stage_order: order,
        stage_kind: kind,
        assigned_role: "editor".to_string(),
        duration_days: 0,
        requires_attachment: false,
        requires_comment: false,
        auto_complete: false,
    }
}

fn edge(from: usize, to: usize, condition: ConditionKind) -> CreateWorkflowTransition {
    CreateWorkflowTransition {
        from_index: from,
        to_index: to,
        condition_kind: condition,
        condition_data: None,
    }
}

/// start -> approval -> end, with a rejection loop back to start.
async fn seed_review_template(pool: &PgPool, name: &str) -> TemplateDetail {
    WorkflowTemplateRepo::create(
        pool,
        &template(name),
        &[
            stage("Submitted", 1, StageKind::Start),
            stage("Manager review", 2, StageKind::Approval),
            stage("Archived", 3, StageKind::End),
        ],
        &[
            edge(0, 1, ConditionKind::Always),
            edge(1, 2, ConditionKind::Approval),
            edge(1, 0, ConditionKind::Rejection),
        ],
    )
    .await
    .unwrap()
}

async fn seed_transaction(pool: &PgPool, reference: &str) -> DbId {
    TransactionRepo::create(
        pool,
        &CreateTransaction {
            reference: reference.to_string(),
            title: format!("Transaction {reference}"),
            description: None,
            created_by: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// Shift an instance's stage entry into the past to make it overdue.
async fn backdate_stage_entry(pool: &PgPool, instance_id: DbId, entered_at: Timestamp) {
    sqlx::query("UPDATE workflow_instances SET stage_entered_at = $2 WHERE id = $1")
        .bind(instance_id)
        .bind(entered_at)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: template creation maps transition indexes onto stage ids
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_template_graph(pool: PgPool) {
    let detail = seed_review_template(&pool, "Purchase approval").await;

    assert_eq!(detail.template.name, "Purchase approval");
    assert_eq!(detail.template.version, 1);
    assert!(!detail.template.is_active, "templates start inactive");

    assert_eq!(detail.stages.len(), 3);
    assert_eq!(detail.stages[0].stage_kind, "start");
    assert_eq!(detail.stages[1].stage_kind, "approval");
    assert_eq!(detail.stages[2].stage_kind, "end");

    assert_eq!(detail.transitions.len(), 3);
    assert_eq!(detail.transitions[0].from_stage_id, detail.stages[0].id);
    assert_eq!(detail.transitions[0].to_stage_id, detail.stages[1].id);
    assert_eq!(detail.transitions[1].from_stage_id, detail.stages[1].id);
    assert_eq!(detail.transitions[1].to_stage_id, detail.stages[2].id);
    assert_eq!(detail.transitions[2].to_stage_id, detail.stages[0].id);
    assert_eq!(detail.transitions[1].condition_kind, "approval");

    // detail() reloads the same graph.
    let reloaded = WorkflowTemplateRepo::detail(&pool, detail.template.id)
        .await
        .unwrap()
        .expect("template should exist");
    assert_eq!(reloaded.stages.len(), 3);
    assert_eq!(reloaded.transitions.len(), 3);

    let start = WorkflowTemplateRepo::start_stage(&pool, detail.template.id)
        .await
        .unwrap()
        .expect("start stage exists");
    assert_eq!(start.id, detail.stages[0].id);
}

// ---------------------------------------------------------------------------
// Test: a transition cannot connect stages of different templates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cross_template_transition_rejected(pool: PgPool) {
    let a = seed_review_template(&pool, "Template A").await;
    let b = seed_review_template(&pool, "Template B").await;

    let result = sqlx::query(
        "INSERT INTO workflow_transitions (template_id, from_stage_id, to_stage_id, condition_kind)
         VALUES ($1, $2, $3, 'always')",
    )
    .bind(a.template.id)
    .bind(a.stages[0].id)
    .bind(b.stages[2].id)
    .execute(&pool)
    .await;

    assert!(
        result.is_err(),
        "composite foreign key should reject a transition into another template"
    );
}

// ---------------------------------------------------------------------------
// Test: duplicate (name, version) pairs are rejected
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_template_version_rejected(pool: PgPool) {
    seed_review_template(&pool, "Versioned").await;
    let result = WorkflowTemplateRepo::create(
        &pool,
        &template("Versioned"),
        &[
            stage("Submitted", 1, StageKind::Start),
            stage("Archived", 2, StageKind::End),
        ],
        &[edge(0, 1, ConditionKind::Always)],
    )
    .await;
    assert!(result.is_err(), "same name and version should collide");
}

// ---------------------------------------------------------------------------
// Test: starting an instance opens its history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_start_instance_opens_history(pool: PgPool) {
    let detail = seed_review_template(&pool, "History test").await;
    let transaction_id = seed_transaction(&pool, "TX-1001").await;

    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[0].id,
    )
    .await
    .unwrap();

    assert_eq!(instance.status, INSTANCE_ACTIVE);
    assert_eq!(instance.version, 1);
    assert_eq!(instance.current_stage_id, detail.stages[0].id);
    assert!(instance.stage_outcome.is_none());
    assert!(instance.completed_at.is_none());

    let history = WorkflowInstanceRepo::history(&pool, instance.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stage_id, detail.stages[0].id);
    assert_eq!(history[0].stage_name, "Submitted");
    assert_eq!(history[0].entered_at, instance.stage_entered_at);
    assert!(history[0].left_at.is_none(), "current stage row stays open");

    let with_stage = WorkflowInstanceRepo::find_with_stage(&pool, instance.id)
        .await
        .unwrap()
        .expect("joined lookup should find the instance");
    assert_eq!(with_stage.stage_name, "Submitted");
    assert_eq!(with_stage.stage_kind, "start");
}

// ---------------------------------------------------------------------------
// Test: decision recording with version guard
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_record_decision_version_guard(pool: PgPool) {
    let detail = seed_review_template(&pool, "Decision test").await;
    let transaction_id = seed_transaction(&pool, "TX-1002").await;
    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[1].id,
    )
    .await
    .unwrap();

    let updated = WorkflowInstanceRepo::record_decision(
        &pool,
        instance.id,
        instance.version,
        StageOutcome::Approved,
    )
    .await
    .unwrap()
    .expect("decision with fresh version succeeds");
    assert_eq!(updated.stage_outcome.as_deref(), Some("approved"));
    assert_eq!(updated.version, instance.version + 1);

    // A second writer still holding the old version loses.
    let stale = WorkflowInstanceRepo::record_decision(
        &pool,
        instance.id,
        instance.version,
        StageOutcome::Rejected,
    )
    .await
    .unwrap();
    assert!(stale.is_none(), "stale version must not overwrite the decision");

    let current = WorkflowInstanceRepo::find_by_id(&pool, instance.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.stage_outcome.as_deref(), Some("approved"));
}

// ---------------------------------------------------------------------------
// Test: advancing moves the stage, resets the outcome, extends history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_advance_resets_outcome(pool: PgPool) {
    let detail = seed_review_template(&pool, "Advance test").await;
    let transaction_id = seed_transaction(&pool, "TX-1003").await;
    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[1].id,
    )
    .await
    .unwrap();

    let decided = WorkflowInstanceRepo::record_decision(
        &pool,
        instance.id,
        instance.version,
        StageOutcome::Rejected,
    )
    .await
    .unwrap()
    .unwrap();

    // Rejection loops back to the start stage without completing.
    // Truncated to microseconds so equality survives the TIMESTAMPTZ round trip.
    let now = Utc::now().trunc_subsecs(6);
    let mut tx = pool.begin().await.unwrap();
    let advanced = WorkflowInstanceRepo::advance_in_tx(
        &mut tx,
        instance.id,
        decided.version,
        detail.stages[0].id,
        now,
        false,
    )
    .await
    .unwrap()
    .expect("advance with fresh version succeeds");
    WorkflowInstanceRepo::close_history_in_tx(&mut tx, instance.id, now)
        .await
        .unwrap();
    WorkflowInstanceRepo::append_history_in_tx(&mut tx, instance.id, detail.stages[0].id, now)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(advanced.current_stage_id, detail.stages[0].id);
    assert!(advanced.stage_outcome.is_none(), "outcome resets on stage entry");
    assert_eq!(advanced.status, INSTANCE_ACTIVE);
    assert_eq!(advanced.version, decided.version + 1);
    assert_eq!(advanced.stage_entered_at, now);

    let history = WorkflowInstanceRepo::history(&pool, instance.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].left_at, Some(now), "previous stage row is closed");
    assert!(history[1].left_at.is_none());
    assert_eq!(history[1].stage_id, detail.stages[0].id);
}

// ---------------------------------------------------------------------------
// Test: advancing onto an end stage completes the instance
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_advance_to_end_completes(pool: PgPool) {
    let detail = seed_review_template(&pool, "Completion test").await;
    let transaction_id = seed_transaction(&pool, "TX-1004").await;
    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[1].id,
    )
    .await
    .unwrap();

    let now = Utc::now().trunc_subsecs(6);
    let mut tx = pool.begin().await.unwrap();
    let advanced = WorkflowInstanceRepo::advance_in_tx(
        &mut tx,
        instance.id,
        instance.version,
        detail.stages[2].id,
        now,
        true,
    )
    .await
    .unwrap()
    .unwrap();
    WorkflowInstanceRepo::close_history_in_tx(&mut tx, instance.id, now)
        .await
        .unwrap();
    WorkflowInstanceRepo::append_history_in_tx(&mut tx, instance.id, detail.stages[2].id, now)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(advanced.status, INSTANCE_COMPLETED);
    assert_eq!(advanced.completed_at, Some(now));

    // Completed instances accept no further writes.
    let decision = WorkflowInstanceRepo::record_decision(
        &pool,
        instance.id,
        advanced.version,
        StageOutcome::Approved,
    )
    .await
    .unwrap();
    assert!(decision.is_none());

    let active = WorkflowInstanceRepo::list_active(&pool, 100).await.unwrap();
    assert!(active.iter().all(|i| i.id != instance.id));
}

// ---------------------------------------------------------------------------
// Test: a failed version guard leaves the instance untouched
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_advance_rolls_back(pool: PgPool) {
    let detail = seed_review_template(&pool, "Rollback test").await;
    let transaction_id = seed_transaction(&pool, "TX-1005").await;
    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[1].id,
    )
    .await
    .unwrap();

    let now = Utc::now();
    let mut tx = pool.begin().await.unwrap();
    let advanced = WorkflowInstanceRepo::advance_in_tx(
        &mut tx,
        instance.id,
        instance.version + 7,
        detail.stages[2].id,
        now,
        true,
    )
    .await
    .unwrap();
    assert!(advanced.is_none(), "wrong version must not advance");
    tx.rollback().await.unwrap();

    let current = WorkflowInstanceRepo::find_by_id(&pool, instance.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.current_stage_id, detail.stages[1].id);
    assert_eq!(current.version, instance.version);
    assert_eq!(current.status, INSTANCE_ACTIVE);
}

// ---------------------------------------------------------------------------
// Test: overdue detection and escalation idempotency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overdue_detection_is_idempotent(pool: PgPool) {
    let detail = WorkflowTemplateRepo::create(
        &pool,
        &template("Escalation test"),
        &[
            stage("Submitted", 1, StageKind::Start),
            CreateWorkflowStage {
                duration_days: 3,
                ..stage("Slow review", 2, StageKind::Approval)
            },
            stage("Archived", 3, StageKind::End),
        ],
        &[
            edge(0, 1, ConditionKind::Always),
            edge(1, 2, ConditionKind::Approval),
        ],
    )
    .await
    .unwrap();
    let transaction_id = seed_transaction(&pool, "TX-2001").await;
    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[1].id,
    )
    .await
    .unwrap();

    let now = Utc::now();

    // Not yet overdue: entered just now with a 3-day budget.
    let overdue = EscalationRepo::list_overdue(&pool, now, 100).await.unwrap();
    assert!(overdue.is_empty());

    // Five days in a 3-day stage makes it two days overdue.
    let entered = now - Duration::days(5);
    backdate_stage_entry(&pool, instance.id, entered).await;

    let overdue = EscalationRepo::list_overdue(&pool, now, 100).await.unwrap();
    assert_eq!(overdue.len(), 1);
    let candidate = &overdue[0];
    assert_eq!(candidate.instance_id, instance.id);
    assert_eq!(candidate.stage_name, "Slow review");
    assert_eq!(candidate.transaction_reference, "TX-2001");
    assert_eq!(candidate.overdue_days(now), 2);

    // First recording wins, the retry is a no-op.
    let mut tx = pool.begin().await.unwrap();
    assert!(EscalationRepo::record_in_tx(&mut tx, candidate, 2, now).await.unwrap());
    assert!(!EscalationRepo::record_in_tx(&mut tx, candidate, 2, now).await.unwrap());
    tx.commit().await.unwrap();

    // Recorded occurrences stop coming back as candidates.
    let overdue = EscalationRepo::list_overdue(&pool, now, 100).await.unwrap();
    assert!(overdue.is_empty(), "anti-join hides already-escalated occurrences");

    let recorded = EscalationRepo::list_for_instance(&pool, instance.id).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].overdue_days, 2);

    // Re-entering the same stage later is a fresh occurrence.
    backdate_stage_entry(&pool, instance.id, now - Duration::days(9)).await;
    let overdue = EscalationRepo::list_overdue(&pool, now, 100).await.unwrap();
    assert_eq!(overdue.len(), 1, "new stage entry timestamp escalates again");
}

// ---------------------------------------------------------------------------
// Test: stages without a duration budget never escalate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_zero_duration_stage_never_overdue(pool: PgPool) {
    let detail = seed_review_template(&pool, "No deadline").await;
    let transaction_id = seed_transaction(&pool, "TX-2002").await;
    let instance = WorkflowInstanceRepo::start(
        &pool,
        transaction_id,
        detail.template.id,
        detail.stages[1].id,
    )
    .await
    .unwrap();

    backdate_stage_entry(&pool, instance.id, Utc::now() - Duration::days(400)).await;

    let overdue = EscalationRepo::list_overdue(&pool, Utc::now(), 100).await.unwrap();
    assert!(
        overdue.iter().all(|o| o.instance_id != instance.id),
        "duration_days = 0 means no deadline"
    );
}
