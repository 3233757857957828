//! Workflow execution engine.
//!
//! A workflow is a validated, acyclic topology of [`Stage`]s over one state
//! value. Each stage names its successor with a [`Transition`]; at most one
//! stage may branch by inspecting the state. Stage failures never abort a
//! run: they are handed to [`WorkflowState::record_failure`] and execution
//! follows the failed stage's transition.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::Instrument;

use docsight_types::{DocsightError, Result};

use crate::events::{EventEmitter, WorkflowEvent};

// ---------------------------------------------------------------------------
// Core traits
// ---------------------------------------------------------------------------

/// One unit of work over the workflow state.
#[async_trait]
pub trait Stage<S>: Send + Sync {
    fn id(&self) -> &str;
    async fn execute(&self, state: &mut S) -> Result<()>;
}

/// State threaded through a workflow.
pub trait WorkflowState: Send {
    /// Absorb a stage failure, typically by substituting a fallback value.
    fn record_failure(&mut self, stage_id: &str, error: &DocsightError);
}

/// Picks a route label from the state at a branch point.
pub type Router<S> = fn(&S) -> &'static str;

pub enum Transition<S> {
    Next(String),
    Branch {
        router: Router<S>,
        /// (route label, target stage id)
        routes: Vec<(String, String)>,
    },
    End,
}

impl<S> Transition<S> {
    fn targets(&self) -> Vec<&str> {
        match self {
            Transition::Next(to) => vec![to.as_str()],
            Transition::Branch { routes, .. } => routes.iter().map(|(_, to)| to.as_str()).collect(),
            Transition::End => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder and validation
// ---------------------------------------------------------------------------

pub struct WorkflowBuilder<S> {
    name: String,
    entry: Option<String>,
    stages: Vec<Box<dyn Stage<S>>>,
    transitions: Vec<(String, Transition<S>)>,
}

impl<S: WorkflowState + 'static> WorkflowBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            stages: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: impl Stage<S> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn entry(mut self, id: &str) -> Self {
        self.entry = Some(id.to_string());
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.transitions
            .push((from.to_string(), Transition::Next(to.to_string())));
        self
    }

    pub fn branch(mut self, from: &str, router: Router<S>, routes: &[(&str, &str)]) -> Self {
        let routes = routes
            .iter()
            .map(|(label, to)| (label.to_string(), to.to_string()))
            .collect();
        self.transitions
            .push((from.to_string(), Transition::Branch { router, routes }));
        self
    }

    pub fn end(mut self, from: &str) -> Self {
        self.transitions.push((from.to_string(), Transition::End));
        self
    }

    /// Validate the topology and produce a runnable workflow.
    pub fn build(self) -> Result<Workflow<S>> {
        let invalid = |message: String| DocsightError::InvalidWorkflow {
            workflow: self.name.clone(),
            message,
        };

        let mut stage_order = Vec::new();
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id().to_string()) {
                return Err(invalid(format!("duplicate stage id '{}'", stage.id())));
            }
            stage_order.push(stage.id().to_string());
        }

        let entry = self
            .entry
            .clone()
            .ok_or_else(|| invalid("no entry stage".into()))?;
        if !seen.contains(&entry) {
            return Err(invalid(format!("entry stage '{entry}' does not exist")));
        }

        let mut transitions: HashMap<String, Transition<S>> = HashMap::new();
        let mut branch_count = 0;
        for (from, transition) in self.transitions {
            if !seen.contains(&from) {
                return Err(invalid(format!("transition from unknown stage '{from}'")));
            }
            if let Transition::Branch { routes, .. } = &transition {
                branch_count += 1;
                if routes.is_empty() {
                    return Err(invalid(format!("branch at '{from}' has no routes")));
                }
            }
            if let Some(target) = transition.targets().into_iter().find(|t| !seen.contains(*t)) {
                return Err(invalid(format!(
                    "transition from '{from}' targets unknown stage '{target}'"
                )));
            }
            if transitions.insert(from.clone(), transition).is_some() {
                return Err(invalid(format!("stage '{from}' has more than one transition")));
            }
        }
        if branch_count > 1 {
            return Err(invalid(format!(
                "at most one branch point is allowed, found {branch_count}"
            )));
        }
        if let Some(id) = stage_order.iter().find(|id| !transitions.contains_key(*id)) {
            return Err(invalid(format!("stage '{id}' has no transition")));
        }

        let reached = check_acyclic(&entry, &transitions).map_err(|at| {
            invalid(format!("cycle detected through stage '{at}'"))
        })?;
        if let Some(id) = stage_order.iter().find(|id| !reached.contains(*id)) {
            return Err(invalid(format!("stage '{id}' is unreachable from '{entry}'")));
        }

        let stages = self
            .stages
            .into_iter()
            .map(|s| (s.id().to_string(), s))
            .collect();

        Ok(Workflow {
            name: self.name,
            entry,
            stages,
            transitions,
            emitter: None,
        })
    }
}

/// Depth-first walk from `entry`. Returns the reachable set, or the id of a
/// stage found on a cycle.
fn check_acyclic<S>(
    entry: &str,
    transitions: &HashMap<String, Transition<S>>,
) -> std::result::Result<HashSet<String>, String> {
    fn visit<S>(
        id: &str,
        transitions: &HashMap<String, Transition<S>>,
        on_path: &mut HashSet<String>,
        done: &mut HashSet<String>,
    ) -> std::result::Result<(), String> {
        if done.contains(id) {
            return Ok(());
        }
        if !on_path.insert(id.to_string()) {
            return Err(id.to_string());
        }
        if let Some(t) = transitions.get(id) {
            for next in t.targets() {
                visit(next, transitions, on_path, done)?;
            }
        }
        on_path.remove(id);
        done.insert(id.to_string());
        Ok(())
    }

    let mut on_path = HashSet::new();
    let mut done = HashSet::new();
    visit(entry, transitions, &mut on_path, &mut done)?;
    Ok(done)
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

pub struct Workflow<S> {
    name: String,
    entry: String,
    stages: HashMap<String, Box<dyn Stage<S>>>,
    transitions: HashMap<String, Transition<S>>,
    emitter: Option<EventEmitter>,
}

/// Final state of a run plus the path it took.
#[derive(Debug)]
pub struct ExecutionResult<S> {
    pub run_id: String,
    pub state: S,
    pub completed_stages: Vec<String>,
    pub failed_stages: Vec<String>,
    pub duration_ms: u64,
}

impl<S: WorkflowState + 'static> Workflow<S> {
    pub fn set_emitter(&mut self, emitter: EventEmitter) {
        self.emitter = Some(emitter);
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event);
        }
    }

    /// Execute from the entry stage until a terminal transition. Never fails.
    pub async fn run(&self, state: S) -> ExecutionResult<S> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("workflow", workflow = %self.name, run_id = %run_id);
        self.execute(state, run_id).instrument(span).await
    }

    async fn execute(&self, mut state: S, run_id: String) -> ExecutionResult<S> {
        let started = Instant::now();
        self.emit(WorkflowEvent::WorkflowStarted {
            workflow: self.name.clone(),
            run_id: run_id.clone(),
            stage_count: self.stages.len(),
        });
        tracing::info!(stages = self.stages.len(), "Workflow started");

        let mut completed_stages = Vec::new();
        let mut failed_stages = Vec::new();
        let mut current = Some(self.entry.clone());

        while let Some(id) = current {
            let Some(stage) = self.stages.get(&id) else {
                tracing::error!(stage = %id, "Stage vanished from validated workflow");
                break;
            };

            self.emit(WorkflowEvent::StageStarted {
                workflow: self.name.clone(),
                stage_id: id.clone(),
            });
            let stage_started = Instant::now();
            match stage.execute(&mut state).await {
                Ok(()) => {
                    let duration_ms = stage_started.elapsed().as_millis() as u64;
                    tracing::debug!(stage = %id, duration_ms, "Stage completed");
                    self.emit(WorkflowEvent::StageCompleted {
                        stage_id: id.clone(),
                        duration_ms,
                    });
                    completed_stages.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(stage = %id, error = %e, "Stage failed, continuing with fallback");
                    state.record_failure(&id, &e);
                    self.emit(WorkflowEvent::StageFailed {
                        stage_id: id.clone(),
                        error: e.to_string(),
                    });
                    failed_stages.push(id.clone());
                }
            }

            current = self.next_stage(&id, &state);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            completed = completed_stages.len(),
            failed = failed_stages.len(),
            duration_ms,
            "Workflow finished"
        );
        self.emit(WorkflowEvent::WorkflowCompleted {
            workflow: self.name.clone(),
            run_id: run_id.clone(),
            completed_stages: completed_stages.clone(),
            failed_stages: failed_stages.clone(),
            duration_ms,
        });

        ExecutionResult {
            run_id,
            state,
            completed_stages,
            failed_stages,
            duration_ms,
        }
    }

    fn next_stage(&self, from: &str, state: &S) -> Option<String> {
        match self.transitions.get(from)? {
            Transition::Next(to) => Some(to.clone()),
            Transition::End => None,
            Transition::Branch { router, routes } => {
                let label = router(state);
                match routes.iter().find(|(l, _)| l == label) {
                    Some((_, to)) => {
                        tracing::info!(from = %from, route = %label, to = %to, "Route selected");
                        self.emit(WorkflowEvent::RouteSelected {
                            from_stage: from.to_string(),
                            route: label.to_string(),
                            to_stage: to.clone(),
                        });
                        Some(to.clone())
                    }
                    None => {
                        tracing::error!(from = %from, route = %label, "Router returned unknown route");
                        None
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Trace {
        visited: Vec<String>,
        failures: Vec<String>,
        flag: bool,
    }

    impl WorkflowState for Trace {
        fn record_failure(&mut self, stage_id: &str, error: &DocsightError) {
            self.failures.push(format!("{stage_id}: {error}"));
        }
    }

    struct Step {
        id: &'static str,
        fail: bool,
        set_flag: bool,
    }

    fn step(id: &'static str) -> Step {
        Step {
            id,
            fail: false,
            set_flag: false,
        }
    }

    #[async_trait]
    impl Stage<Trace> for Step {
        fn id(&self) -> &str {
            self.id
        }

        async fn execute(&self, state: &mut Trace) -> Result<()> {
            state.visited.push(self.id.to_string());
            if self.set_flag {
                state.flag = true;
            }
            if self.fail {
                return Err(DocsightError::Other(format!("{} broke", self.id)));
            }
            Ok(())
        }
    }

    fn route_on_flag(state: &Trace) -> &'static str {
        if state.flag {
            "flagged"
        } else {
            "clear"
        }
    }

    fn branching(set_flag: bool) -> Workflow<Trace> {
        WorkflowBuilder::new("branching")
            .stage(Step {
                id: "a",
                fail: false,
                set_flag,
            })
            .stage(step("b"))
            .stage(step("c"))
            .entry("a")
            .branch("a", route_on_flag, &[("clear", "b"), ("flagged", "c")])
            .edge("b", "c")
            .end("c")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn linear_workflow_runs_in_order() {
        let wf = WorkflowBuilder::new("linear")
            .stage(step("one"))
            .stage(step("two"))
            .entry("one")
            .edge("one", "two")
            .end("two")
            .build()
            .unwrap();
        let result = wf.run(Trace::default()).await;
        assert_eq!(result.state.visited, vec!["one", "two"]);
        assert_eq!(result.completed_stages, vec!["one", "two"]);
        assert!(result.failed_stages.is_empty());
        assert!(!result.run_id.is_empty());
    }

    #[tokio::test]
    async fn branch_follows_router() {
        let clear = branching(false).run(Trace::default()).await;
        assert_eq!(clear.state.visited, vec!["a", "b", "c"]);

        let flagged = branching(true).run(Trace::default()).await;
        assert_eq!(flagged.state.visited, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_run_continues() {
        let wf = WorkflowBuilder::new("failing")
            .stage(Step {
                id: "bad",
                fail: true,
                set_flag: false,
            })
            .stage(step("after"))
            .entry("bad")
            .edge("bad", "after")
            .end("after")
            .build()
            .unwrap();
        let result = wf.run(Trace::default()).await;
        assert_eq!(result.failed_stages, vec!["bad"]);
        assert_eq!(result.completed_stages, vec!["after"]);
        assert_eq!(result.state.failures, vec!["bad: bad broke"]);
    }

    #[tokio::test]
    async fn events_are_emitted_for_route_and_failure() {
        let mut wf = branching(true);
        let emitter = EventEmitter::new(64);
        let mut rx = emitter.subscribe();
        wf.set_emitter(emitter);
        wf.run(Trace::default()).await;

        let mut saw_route = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                WorkflowEvent::RouteSelected { route, to_stage, .. } => {
                    assert_eq!(route, "flagged");
                    assert_eq!(to_stage, "c");
                    saw_route = true;
                }
                WorkflowEvent::WorkflowCompleted {
                    completed_stages, ..
                } => {
                    assert_eq!(completed_stages, vec!["a", "c"]);
                    saw_completed = true;
                }
                _ => {}
            }
        }
        assert!(saw_route && saw_completed);
    }

    fn build_err(builder: WorkflowBuilder<Trace>) -> String {
        match builder.build() {
            Ok(_) => panic!("expected invalid workflow"),
            Err(e) => {
                assert!(e.is_terminal());
                e.to_string()
            }
        }
    }

    #[test]
    fn rejects_missing_entry() {
        let msg = build_err(WorkflowBuilder::new("w").stage(step("a")).end("a"));
        assert!(msg.contains("no entry stage"));
    }

    #[test]
    fn rejects_unknown_target() {
        let msg = build_err(
            WorkflowBuilder::new("w")
                .stage(step("a"))
                .entry("a")
                .edge("a", "ghost"),
        );
        assert!(msg.contains("unknown stage 'ghost'"));
    }

    #[test]
    fn rejects_cycle() {
        let msg = build_err(
            WorkflowBuilder::new("w")
                .stage(step("a"))
                .stage(step("b"))
                .entry("a")
                .edge("a", "b")
                .edge("b", "a"),
        );
        assert!(msg.contains("cycle"));
    }

    #[test]
    fn rejects_unreachable_stage() {
        let msg = build_err(
            WorkflowBuilder::new("w")
                .stage(step("a"))
                .stage(step("island"))
                .entry("a")
                .end("a")
                .end("island"),
        );
        assert!(msg.contains("'island' is unreachable"));
    }

    #[test]
    fn rejects_second_branch() {
        let msg = build_err(
            WorkflowBuilder::new("w")
                .stage(step("a"))
                .stage(step("b"))
                .stage(step("c"))
                .entry("a")
                .branch("a", route_on_flag, &[("clear", "b"), ("flagged", "c")])
                .branch("b", route_on_flag, &[("clear", "c")])
                .end("c"),
        );
        assert!(msg.contains("at most one branch"));
    }

    #[test]
    fn rejects_stage_without_transition() {
        let msg = build_err(
            WorkflowBuilder::new("w")
                .stage(step("a"))
                .stage(step("b"))
                .entry("a")
                .edge("a", "b"),
        );
        assert!(msg.contains("'b' has no transition"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let msg = build_err(
            WorkflowBuilder::new("w")
                .stage(step("a"))
                .stage(step("a"))
                .entry("a")
                .end("a"),
        );
        assert!(msg.contains("duplicate stage id"));
    }
}
