//! The layered solver chain (C7).
//!
//! `SolverImpl` is the core interface every backend (and every wrapper)
//! implements - `computeTruth`/`computeValidity`/`computeValue`/
//! `computeInitialValues`/`check`/`computeValidityCore`, plus `setLimits`
//! and `notifyStateTermination`. The (excluded) STP/Z3/Bitwuzla/MetaSMT
//! backends plug in at the bottom; this workspace ships one concrete
//! implementation, `DummySolver`, that always reports the weakest possible
//! answer - standing in for them per §4.7 ("Core backend ... or a dummy").
//! The four wrappers above it compose leaf-first, each holding its inner
//! `SolverImpl` by exclusive ownership (Design Note "Polymorphic solver
//! chain" - a trait object, no virtual-destructor machinery needed beyond
//! `Box<dyn SolverImpl>`'s ordinary drop).
//!
//! Grounded on KLEE's `Solver.cpp`/`Solver.h` chain
//! (`ValidatingSolver`, `CachingSolver`, `FastCexSolver`,
//! `IncompleteSolver`) and `STPBuilder`'s query-logging comment format.

use crate::config::RewriteEqualities;
use crate::constraints::{Assignment, ConstraintSet};
use crate::error::SolverError;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use symex_expr::array::ArrayId;
use symex_expr::expr::{constant, ConstantValue, Expr, ExprId, ExprKind};
use symex_expr::update_list::UpdateList;
use symex_expr::visitor::{rewrite, Action, Visitor};

/// The wire-format query: a constraint set, a goal boolean, and an optional
/// list of arrays the caller specifically wants bound in the result (§6,
/// "Query wire format").
#[derive(Debug, Clone)]
pub struct Query {
    pub constraints: ConstraintSet,
    pub goal: ExprId,
    pub arrays_of_interest: Option<Vec<ArrayId>>,
}

impl Query {
    pub fn new(constraints: ConstraintSet, goal: ExprId) -> Self {
        Self { constraints, goal, arrays_of_interest: None }
    }

    fn all_exprs(&self) -> Vec<ExprId> {
        let mut exprs: Vec<ExprId> = self.constraints.constraints().to_vec();
        exprs.push(self.goal);
        exprs
    }
}

/// Answer to `computeTruth`: does the query's goal hold under every model
/// consistent with the constraints, or might some model falsify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    MustBeTrue,
    MayBeFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Valid,
    Invalid(Assignment),
}

/// The core solver interface (§4.7). No backend name leaks into this trait;
/// `DummySolver` and every wrapper below implement it uniformly.
pub trait SolverImpl {
    fn compute_truth(&mut self, query: &Query) -> Result<Truth, SolverError>;
    fn compute_validity(&mut self, query: &Query) -> Result<Validity, SolverError>;
    fn compute_value(&mut self, query: &Query) -> Result<ExprId, SolverError>;
    fn compute_initial_values(&mut self, query: &Query, objects: &[ArrayId]) -> Result<(Assignment, bool), SolverError>;
    fn check(&mut self, query: &Query) -> Result<CheckResult, SolverError>;
    fn compute_validity_core(&mut self, query: &Query) -> Result<(Vec<ExprId>, bool), SolverError>;
    fn set_limits(&mut self, time_ms: Option<u64>, memory_mb: Option<u64>);
    fn notify_state_termination(&mut self, state_id: u64);
}

/// Stands in for the excluded STP/Z3/Bitwuzla/MetaSMT backends. Always
/// reports the weakest answer its return type allows, or a `BackendFailure`
/// where no "don't know" value exists - enough to exercise every wrapper's
/// error-handling path without a real SMT dependency.
#[derive(Debug, Default)]
pub struct DummySolver {
    time_limit_ms: Option<u64>,
    memory_limit_mb: Option<u64>,
    terminated: Vec<u64>,
}

impl DummySolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_limit_ms(&self) -> Option<u64> {
        self.time_limit_ms
    }
}

impl SolverImpl for DummySolver {
    fn compute_truth(&mut self, _query: &Query) -> Result<Truth, SolverError> {
        Ok(Truth::MayBeFalse)
    }

    fn compute_validity(&mut self, _query: &Query) -> Result<Validity, SolverError> {
        Ok(Validity::Unknown)
    }

    fn compute_value(&mut self, _query: &Query) -> Result<ExprId, SolverError> {
        Err(SolverError::BackendFailure)
    }

    fn compute_initial_values(&mut self, _query: &Query, _objects: &[ArrayId]) -> Result<(Assignment, bool), SolverError> {
        Ok((Assignment::new(), false))
    }

    fn check(&mut self, _query: &Query) -> Result<CheckResult, SolverError> {
        Err(SolverError::BackendFailure)
    }

    fn compute_validity_core(&mut self, _query: &Query) -> Result<(Vec<ExprId>, bool), SolverError> {
        Err(SolverError::BackendFailure)
    }

    fn set_limits(&mut self, time_ms: Option<u64>, memory_mb: Option<u64>) {
        self.time_limit_ms = time_ms;
        self.memory_limit_mb = memory_mb;
    }

    fn notify_state_termination(&mut self, state_id: u64) {
        self.terminated.push(state_id);
    }
}

/// Substitutes every `Read` whose root array has a binding in `assignment`
/// with the concrete byte it names, then lets the ordinary canonical
/// builders (driven by `rewrite`'s `DoChildren` rebuild) fold the rest -
/// this is the one evaluator the assignment-validating wrapper and the
/// concretization manager both need, and it reuses the constant-folding
/// already built into every `Expr` constructor rather than duplicating it.
struct AssignVisitor<'a> {
    assignment: &'a Assignment,
}

impl<'a> Visitor for AssignVisitor<'a> {
    fn visit(&mut self, id: ExprId) -> Action {
        if let ExprKind::Read { updates, index } = Expr::get(id).kind {
            let root = UpdateList::root_array(updates);
            if let (Some(bytes), Some(idx)) = (self.assignment.get(&root), Expr::get(index).as_constant()) {
                if let Some(&byte) = bytes.get(idx.value as usize) {
                    let width = Expr::get(id).width;
                    return Action::ChangeTo(constant(ConstantValue::new(width, byte as u128)));
                }
            }
        }
        Action::DoChildren
    }
}

fn eval_under_assignment(expr: ExprId, assignment: &Assignment) -> Option<ConstantValue> {
    let substituted = rewrite(&mut AssignVisitor { assignment }, expr);
    Expr::get(substituted).as_constant()
}

/// Wraps an inner solver and, on every `Invalid` counterexample it returns,
/// re-evaluates the query's constraints and goal under that counterexample
/// (§4.7 wrapper 2). A backend that hands back a model under which some
/// constraint isn't true, or the goal isn't false, has a bug - that's not a
/// recoverable `SolverError`, it's the backend lying, so this aborts rather
/// than propagating a `Result`.
pub struct AssignmentValidatingSolver<S: SolverImpl> {
    inner: S,
}

impl<S: SolverImpl> AssignmentValidatingSolver<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn validate(&self, query: &Query, assignment: &Assignment) {
        for &c in query.constraints.constraints() {
            match eval_under_assignment(c, assignment) {
                Some(v) if v.is_true() => {}
                other => panic!("assignment-validating wrapper: constraint did not evaluate true under the counterexample (got {other:?})"),
            }
        }
        match eval_under_assignment(query.goal, assignment) {
            Some(v) if v.is_false() => {}
            other => panic!("assignment-validating wrapper: goal did not evaluate false under the counterexample (got {other:?})"),
        }
    }
}

impl<S: SolverImpl> SolverImpl for AssignmentValidatingSolver<S> {
    fn compute_truth(&mut self, query: &Query) -> Result<Truth, SolverError> {
        self.inner.compute_truth(query)
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity, SolverError> {
        self.inner.compute_validity(query)
    }

    fn compute_value(&mut self, query: &Query) -> Result<ExprId, SolverError> {
        self.inner.compute_value(query)
    }

    fn compute_initial_values(&mut self, query: &Query, objects: &[ArrayId]) -> Result<(Assignment, bool), SolverError> {
        self.inner.compute_initial_values(query, objects)
    }

    fn check(&mut self, query: &Query) -> Result<CheckResult, SolverError> {
        let result = self.inner.check(query)?;
        if let CheckResult::Invalid(assignment) = &result {
            self.validate(query, assignment);
        }
        Ok(result)
    }

    fn compute_validity_core(&mut self, query: &Query) -> Result<(Vec<ExprId>, bool), SolverError> {
        self.inner.compute_validity_core(query)
    }

    fn set_limits(&mut self, time_ms: Option<u64>, memory_mb: Option<u64>) {
        self.inner.set_limits(time_ms, memory_mb);
    }

    fn notify_state_termination(&mut self, state_id: u64) {
        self.inner.notify_state_termination(state_id);
    }
}

/// Formats a query for the query log. One concrete implementation ships
/// here (a human-readable dump); the SMT-LIB v2 textual encoder belongs to
/// the excluded query-logger proper (§6) and is reached only through this
/// trait boundary.
pub trait QueryLogger {
    fn format(&self, query: &Query, elapsed: Duration) -> String;
}

pub struct HumanReadableLogger;

impl QueryLogger for HumanReadableLogger {
    fn format(&self, query: &Query, elapsed: Duration) -> String {
        format!(
            "; query took {}ms, {} constraint(s), goal={:?}, arrays_of_interest={:?}",
            elapsed.as_millis(),
            query.constraints.constraints().len(),
            query.goal,
            query.arrays_of_interest,
        )
    }
}

/// Wraps an inner solver, recording a formatted entry for every query whose
/// wall time meets `min_wall_time`. Only `check` and `compute_validity` are
/// timed here - the two call sites a real driver actually cares about
/// profiling - mirroring KLEE's query log, which times the Core-solver call
/// that dominates total runtime.
pub struct QueryLoggingSolver<S: SolverImpl, L: QueryLogger = HumanReadableLogger> {
    inner: S,
    logger: L,
    min_wall_time: Duration,
    log: Vec<String>,
}

impl<S: SolverImpl> QueryLoggingSolver<S, HumanReadableLogger> {
    pub fn new(inner: S, min_wall_time: Duration) -> Self {
        Self { inner, logger: HumanReadableLogger, min_wall_time, log: Vec::new() }
    }
}

impl<S: SolverImpl, L: QueryLogger> QueryLoggingSolver<S, L> {
    pub fn with_logger(inner: S, logger: L, min_wall_time: Duration) -> Self {
        Self { inner, logger, min_wall_time, log: Vec::new() }
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    fn time<T>(&mut self, query: &Query, f: impl FnOnce(&mut S) -> T) -> T {
        let start = Instant::now();
        let result = f(&mut self.inner);
        let elapsed = start.elapsed();
        if elapsed >= self.min_wall_time {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, constraints = query.constraints.constraints().len(), "slow solver query");
            self.log.push(self.logger.format(query, elapsed));
        }
        result
    }
}

impl<S: SolverImpl, L: QueryLogger> SolverImpl for QueryLoggingSolver<S, L> {
    fn compute_truth(&mut self, query: &Query) -> Result<Truth, SolverError> {
        self.time(query, |inner| inner.compute_truth(query))
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity, SolverError> {
        self.time(query, |inner| inner.compute_validity(query))
    }

    fn compute_value(&mut self, query: &Query) -> Result<ExprId, SolverError> {
        self.inner.compute_value(query)
    }

    fn compute_initial_values(&mut self, query: &Query, objects: &[ArrayId]) -> Result<(Assignment, bool), SolverError> {
        self.inner.compute_initial_values(query, objects)
    }

    fn check(&mut self, query: &Query) -> Result<CheckResult, SolverError> {
        self.time(query, |inner| inner.check(query))
    }

    fn compute_validity_core(&mut self, query: &Query) -> Result<(Vec<ExprId>, bool), SolverError> {
        self.inner.compute_validity_core(query)
    }

    fn set_limits(&mut self, time_ms: Option<u64>, memory_mb: Option<u64>) {
        self.inner.set_limits(time_ms, memory_mb);
    }

    fn notify_state_termination(&mut self, state_id: u64) {
        self.inner.notify_state_termination(state_id);
    }
}

/// Debug-only double-checking wrapper: every `compute_truth`/
/// `compute_validity` call also asks a second, independent `oracle` solver
/// and asserts agreement whenever the oracle gives a decisive (non-Unknown)
/// answer. Disagreement means one of the two backends is unsound - fatal,
/// per §7's "any broken invariant is fatal" - so this panics rather than
/// returning an error the caller might paper over.
pub struct DoubleCheckingSolver<S: SolverImpl, O: SolverImpl> {
    inner: S,
    oracle: O,
}

impl<S: SolverImpl, O: SolverImpl> DoubleCheckingSolver<S, O> {
    pub fn new(inner: S, oracle: O) -> Self {
        Self { inner, oracle }
    }
}

impl<S: SolverImpl, O: SolverImpl> SolverImpl for DoubleCheckingSolver<S, O> {
    fn compute_truth(&mut self, query: &Query) -> Result<Truth, SolverError> {
        let primary = self.inner.compute_truth(query)?;
        if let Ok(oracle) = self.oracle.compute_truth(query) {
            debug_assert_eq!(primary, oracle, "validating wrapper: solvers disagree on computeTruth");
        }
        Ok(primary)
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity, SolverError> {
        let primary = self.inner.compute_validity(query)?;
        if let Ok(oracle) = self.oracle.compute_validity(query) {
            if primary != Validity::Unknown && oracle != Validity::Unknown {
                debug_assert_eq!(primary, oracle, "validating wrapper: solvers disagree on computeValidity");
            }
        }
        Ok(primary)
    }

    fn compute_value(&mut self, query: &Query) -> Result<ExprId, SolverError> {
        self.inner.compute_value(query)
    }

    fn compute_initial_values(&mut self, query: &Query, objects: &[ArrayId]) -> Result<(Assignment, bool), SolverError> {
        self.inner.compute_initial_values(query, objects)
    }

    fn check(&mut self, query: &Query) -> Result<CheckResult, SolverError> {
        self.inner.check(query)
    }

    fn compute_validity_core(&mut self, query: &Query) -> Result<(Vec<ExprId>, bool), SolverError> {
        self.inner.compute_validity_core(query)
    }

    fn set_limits(&mut self, time_ms: Option<u64>, memory_mb: Option<u64>) {
        self.inner.set_limits(time_ms, memory_mb);
        self.oracle.set_limits(time_ms, memory_mb);
    }

    fn notify_state_termination(&mut self, state_id: u64) {
        self.inner.notify_state_termination(state_id);
        self.oracle.notify_state_termination(state_id);
    }
}

/// Alpha-renamed fingerprint of a query's relevant constraints plus its
/// goal - isomorphic queries (same shape, different concrete array
/// identities) collapse to the same key (§4.2, §4.7's "per-query
/// fingerprinting").
fn fingerprint(query: &Query) -> Vec<ExprId> {
    symex_expr::alpha::alpha_rename_set(&query.all_exprs())
}

/// Caches `computeInitialValues` results keyed by the alpha-renamed
/// independent constraint set a query's goal actually depends on, queried
/// before the inner (real) solver call (§4.7 wrapper 5). A cache hit means
/// a factor with the same shape was already solved for this run.
pub struct ConcretizingSolver<S: SolverImpl> {
    inner: S,
    cache: HashMap<Vec<ExprId>, (Assignment, bool)>,
}

impl<S: SolverImpl> ConcretizingSolver<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, cache: HashMap::new() }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

impl<S: SolverImpl> SolverImpl for ConcretizingSolver<S> {
    fn compute_truth(&mut self, query: &Query) -> Result<Truth, SolverError> {
        self.inner.compute_truth(query)
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity, SolverError> {
        self.inner.compute_validity(query)
    }

    fn compute_value(&mut self, query: &Query) -> Result<ExprId, SolverError> {
        self.inner.compute_value(query)
    }

    fn compute_initial_values(&mut self, query: &Query, objects: &[ArrayId]) -> Result<(Assignment, bool), SolverError> {
        let key = fingerprint(query);
        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!(cache_size = self.cache.len(), "concretization cache hit");
            return Ok(cached.clone());
        }
        let result = self.inner.compute_initial_values(query, objects)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    fn check(&mut self, query: &Query) -> Result<CheckResult, SolverError> {
        self.inner.check(query)
    }

    fn compute_validity_core(&mut self, query: &Query) -> Result<(Vec<ExprId>, bool), SolverError> {
        self.inner.compute_validity_core(query)
    }

    fn set_limits(&mut self, time_ms: Option<u64>, memory_mb: Option<u64>) {
        self.inner.set_limits(time_ms, memory_mb);
    }

    fn notify_state_termination(&mut self, state_id: u64) {
        self.inner.notify_state_termination(state_id);
    }
}

/// Builds the default chain this workspace ships: concretization cache on
/// the outside, assignment validation in the middle, `DummySolver` at the
/// core - the composition a real driver would extend with a query logger
/// and a double-checking oracle when `RewriteEqualities`/debug settings ask
/// for them.
pub fn default_chain() -> impl SolverImpl {
    ConcretizingSolver::new(AssignmentValidatingSolver::new(DummySolver::new()))
}

/// Picks the concretization-manager cache entry (if present) for `query`'s
/// dependent constraint set before falling through to a full solve -
/// matches §4.7's "queried before the core when a matching factor is
/// present" without requiring the caller to know which wrapper layer owns
/// the cache.
pub fn dependent_query(query: &Query, goal_arrays: &std::collections::HashSet<ArrayId>) -> Query {
    let relevant = query.constraints.dependent_constraint_set(goal_arrays);
    let mut cs = ConstraintSet::new();
    for c in relevant {
        cs.add_constraint(c, RewriteEqualities::None);
    }
    Query { constraints: cs, goal: query.goal, arrays_of_interest: query.arrays_of_interest.clone() }
}

/// One persisted byte binding in a `.ktest`-style counterexample dump, keyed
/// by the array's bare interned index rather than the `ArrayId` type itself
/// (which carries no stable identity across process runs).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PersistedBinding {
    array: u32,
    bytes: Vec<u8>,
}

/// Serializes a `computeInitialValues` result as the JSON counterexample
/// dump a driver would write alongside a discovered SARIF finding.
pub fn persist_assignment(assignment: &Assignment) -> Result<String, serde_json::Error> {
    let mut bindings: Vec<PersistedBinding> =
        assignment.iter().map(|(array, bytes)| PersistedBinding { array: array.index(), bytes: bytes.clone() }).collect();
    bindings.sort_by_key(|b| b.array);
    serde_json::to_string(&bindings)
}

#[cfg(test)]
mod persist_tests {
    use super::*;
    use symex_expr::array::{Array, ArraySource};
    use symex_expr::expr::constant_u64;

    #[test]
    #[serial_test::serial]
    fn assignment_round_trips_through_json() {
        symex_expr::expr::reset_arena();
        symex_expr::array::reset_arena();
        let size = constant_u64(32, 16);
        let array = Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: "x".into(), version: 0 });
        let mut assignment = Assignment::new();
        assignment.insert(array, vec![1, 2, 3]);
        let json = persist_assignment(&assignment).unwrap();
        assert!(json.contains("\"bytes\":[1,2,3]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteEqualities;
    use symex_expr::array::{Array, ArraySource};
    use symex_expr::expr::{cmp, constant_u64, RequestedCmpOp};
    use symex_expr::update_list::{self, UpdateList};

    fn setup() {
        symex_expr::expr::reset_arena();
        symex_expr::array::reset_arena();
        symex_expr::update_list::reset_arena();
    }

    fn sym_array(name: &str) -> ArrayId {
        let size = constant_u64(32, 16);
        Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: name.into(), version: 0 })
    }

    #[test]
    #[serial_test::serial]
    fn dummy_solver_reports_unknown_not_a_wrong_answer() {
        setup();
        let mut solver = DummySolver::new();
        let query = Query::new(ConstraintSet::new(), symex_expr::expr::true_());
        assert_eq!(solver.compute_truth(&query).unwrap(), Truth::MayBeFalse);
        assert_eq!(solver.compute_validity(&query).unwrap(), Validity::Unknown);
        assert!(solver.check(&query).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn set_limits_is_recorded() {
        setup();
        let mut solver = DummySolver::new();
        solver.set_limits(Some(5000), None);
        assert_eq!(solver.time_limit_ms(), Some(5000));
    }

    #[test]
    #[serial_test::serial]
    fn eval_under_assignment_resolves_a_bound_array() {
        setup();
        let array = sym_array("buf");
        let root = UpdateList::root(array);
        let byte = update_list::read(root, constant_u64(32, 2), 8);
        let eq = cmp(RequestedCmpOp::Eq, constant_u64(8, 9), byte).unwrap();

        let mut assignment = Assignment::new();
        assignment.insert(array, vec![0, 0, 9, 0]);
        let result = eval_under_assignment(eq, &assignment).unwrap();
        assert!(result.is_true());
    }

    #[test]
    #[serial_test::serial]
    fn concretizing_solver_caches_isomorphic_queries() {
        setup();
        let x = sym_array("x");
        let rx = UpdateList::root(x);
        let val = update_list::read(rx, constant_u64(32, 0), 8);
        let goal = cmp(RequestedCmpOp::Eq, constant_u64(8, 1), val).unwrap();
        let mut cs = ConstraintSet::new();
        cs.add_constraint(goal, RewriteEqualities::None);
        let query = Query::new(cs, symex_expr::expr::true_());

        let mut solver = ConcretizingSolver::new(DummySolver::new());
        solver.compute_initial_values(&query, &[]).unwrap();
        assert_eq!(solver.cached_entries(), 1);
        solver.compute_initial_values(&query, &[]).unwrap();
        assert_eq!(solver.cached_entries(), 1, "repeated identical query should hit the cache, not grow it");
    }

    #[test]
    #[serial_test::serial]
    #[should_panic(expected = "assignment-validating wrapper")]
    fn assignment_validating_wrapper_panics_on_inconsistent_model() {
        setup();
        struct LyingSolver;
        impl SolverImpl for LyingSolver {
            fn compute_truth(&mut self, _q: &Query) -> Result<Truth, SolverError> {
                Ok(Truth::MayBeFalse)
            }
            fn compute_validity(&mut self, _q: &Query) -> Result<Validity, SolverError> {
                Ok(Validity::Unknown)
            }
            fn compute_value(&mut self, _q: &Query) -> Result<ExprId, SolverError> {
                Err(SolverError::BackendFailure)
            }
            fn compute_initial_values(&mut self, _q: &Query, _o: &[ArrayId]) -> Result<(Assignment, bool), SolverError> {
                Ok((Assignment::new(), false))
            }
            fn check(&mut self, _q: &Query) -> Result<CheckResult, SolverError> {
                // Claims the constraint is satisfied by an assignment under
                // which it actually evaluates false - a backend bug.
                let mut bogus = Assignment::new();
                let x = sym_array("x");
                bogus.insert(x, vec![0]);
                Ok(CheckResult::Invalid(bogus))
            }
            fn compute_validity_core(&mut self, _q: &Query) -> Result<(Vec<ExprId>, bool), SolverError> {
                Err(SolverError::BackendFailure)
            }
            fn set_limits(&mut self, _t: Option<u64>, _m: Option<u64>) {}
            fn notify_state_termination(&mut self, _s: u64) {}
        }

        let x = sym_array("x");
        let rx = UpdateList::root(x);
        let val = update_list::read(rx, constant_u64(32, 0), 8);
        let must_be_one = cmp(RequestedCmpOp::Eq, constant_u64(8, 1), val).unwrap();
        let mut cs = ConstraintSet::new();
        cs.add_constraint(must_be_one, RewriteEqualities::None);
        let query = Query::new(cs, symex_expr::expr::false_());

        let mut wrapped = AssignmentValidatingSolver::new(LyingSolver);
        let _ = wrapped.check(&query);
    }
}
