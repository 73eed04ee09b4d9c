//! Workflow state-machine rules.
//!
//! Pure logic only: stage and condition vocabularies, transition guard
//! evaluation, the completion rule, and template graph validation.
//! Persistence and transactional advancement live in `mdc-db` and
//! `mdc-jobs`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vocabularies
// ---------------------------------------------------------------------------

/// Stage types of a workflow template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Start,
    Task,
    Review,
    Approval,
    End,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Start,
        StageKind::Task,
        StageKind::Review,
        StageKind::Approval,
        StageKind::End,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Start => "start",
            StageKind::Task => "task",
            StageKind::Review => "review",
            StageKind::Approval => "approval",
            StageKind::End => "end",
        }
    }

    pub fn parse(value: &str) -> Option<StageKind> {
        StageKind::ALL.iter().copied().find(|k| k.as_str() == value)
    }

    /// Only review and approval stages accept an approve/reject decision.
    pub fn accepts_decision(self) -> bool {
        matches!(self, StageKind::Review | StageKind::Approval)
    }
}

/// Guard condition on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Always,
    Approval,
    Rejection,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 3] = [
        ConditionKind::Always,
        ConditionKind::Approval,
        ConditionKind::Rejection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Always => "always",
            ConditionKind::Approval => "approval",
            ConditionKind::Rejection => "rejection",
        }
    }

    pub fn parse(value: &str) -> Option<ConditionKind> {
        ConditionKind::ALL.iter().copied().find(|k| k.as_str() == value)
    }

    /// Evaluation priority when several guards are satisfied at once.
    /// Narrower conditions fire before `always`; ties break on transition id.
    pub fn priority(self) -> u8 {
        match self {
            ConditionKind::Approval | ConditionKind::Rejection => 0,
            ConditionKind::Always => 1,
        }
    }
}

/// Decision recorded against an instance's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Approved,
    Rejected,
}

impl StageOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StageOutcome::Approved => "approved",
            StageOutcome::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<StageOutcome> {
        match value {
            "approved" => Some(StageOutcome::Approved),
            "rejected" => Some(StageOutcome::Rejected),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Guard evaluation
// ---------------------------------------------------------------------------

/// Whether a transition guard is satisfied by the outcome recorded for the
/// instance's current stage.
pub fn guard_satisfied(condition: ConditionKind, outcome: Option<StageOutcome>) -> bool {
    match condition {
        ConditionKind::Always => true,
        ConditionKind::Approval => outcome == Some(StageOutcome::Approved),
        ConditionKind::Rejection => outcome == Some(StageOutcome::Rejected),
    }
}

/// Whether landing on a stage of `kind` finishes the instance.
///
/// End stages always terminate; `auto_complete` extends the same behavior
/// to intermediate stages.
pub fn completes_instance(kind: StageKind, auto_complete: bool) -> bool {
    kind == StageKind::End || auto_complete
}

// ---------------------------------------------------------------------------
// Template graph validation
// ---------------------------------------------------------------------------

/// A stage as seen by graph validation.
#[derive(Debug, Clone, Copy)]
pub struct StageDef {
    pub kind: StageKind,
    pub order: i32,
}

/// A transition as seen by graph validation; `from`/`to` index the stage
/// list being validated.
#[derive(Debug, Clone, Copy)]
pub struct TransitionDef {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("template has no start stage")]
    NoStartStage,

    #[error("template has more than one start stage")]
    MultipleStartStages,

    #[error("template has no end stage")]
    NoEndStage,

    #[error("no end stage is reachable from the start stage")]
    EndUnreachable,

    #[error("transition references unknown stage index {0}")]
    UnknownStage(usize),

    #[error("duplicate stage order {0}")]
    DuplicateOrder(i32),
}

/// Validate a template graph before it is persisted or activated.
///
/// Checks: unique stage ordering, exactly one start stage, at least one end
/// stage, transitions only between known stages, and at least one end stage
/// reachable from the start by following transitions.
pub fn validate_graph(stages: &[StageDef], transitions: &[TransitionDef]) -> Result<(), GraphError> {
    let mut seen_orders = Vec::with_capacity(stages.len());
    for stage in stages {
        if seen_orders.contains(&stage.order) {
            return Err(GraphError::DuplicateOrder(stage.order));
        }
        seen_orders.push(stage.order);
    }

    let starts: Vec<usize> = stages
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == StageKind::Start)
        .map(|(i, _)| i)
        .collect();
    let start = match starts.as_slice() {
        [] => return Err(GraphError::NoStartStage),
        [only] => *only,
        _ => return Err(GraphError::MultipleStartStages),
    };

    if !stages.iter().any(|s| s.kind == StageKind::End) {
        return Err(GraphError::NoEndStage);
    }

    for t in transitions {
        if t.from >= stages.len() {
            return Err(GraphError::UnknownStage(t.from));
        }
        if t.to >= stages.len() {
            return Err(GraphError::UnknownStage(t.to));
        }
    }

    // Breadth-first walk from the start stage.
    let mut reachable = vec![false; stages.len()];
    let mut queue = vec![start];
    reachable[start] = true;
    while let Some(current) = queue.pop() {
        for t in transitions.iter().filter(|t| t.from == current) {
            if !reachable[t.to] {
                reachable[t.to] = true;
                queue.push(t.to);
            }
        }
    }
    let end_reached = stages
        .iter()
        .enumerate()
        .any(|(i, s)| s.kind == StageKind::End && reachable[i]);
    if !end_reached {
        return Err(GraphError::EndUnreachable);
    }

    Ok(())
}
