//! `EngineConfig` - the CLI-consumed config record of spec.md §6.
//!
//! The core only reads this record; parsing it from a CLI/file belongs to
//! the excluded driver. Grounded on `seq-compiler::config::CompilerConfig`'s
//! shape: a plain struct, a builder, and a `Default` impl with the same
//! defaults the teacher ships (opt-in strictness off, conservative limits
//! on).

/// What to do with calls to functions the engine has no definition for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockPolicy {
    #[default]
    None,
    Failed,
    All,
}

/// How a mocked external call's return value is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockStrategy {
    #[default]
    Naive,
    Deterministic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMutableGlobals {
    #[default]
    None,
    All,
}

/// Simplificator policy (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteEqualities {
    #[default]
    None,
    Simple,
    Full,
}

/// Which `SolverImpl` backend the (excluded) solver chain wires in as its
/// innermost layer. The core only stores the selection; `DummySolver` is
/// the only backend this workspace ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreSolverKind {
    #[default]
    Dummy,
    Stp,
    Z3,
    Bitwuzla,
    MetaSmt,
}

/// Selects which `Searcher` the scheduler installs as its top-level
/// strategy (§4.11). `Guided` is the default once targets are present;
/// plain exploration defaults to `RandomPath`, matching KLEE's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchHeuristic {
    Dfs,
    Bfs,
    Random,
    WeightedRandom,
    #[default]
    RandomPath,
    Targeted,
    Guided,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub entry_point: String,
    pub main_module_name: String,
    pub mock_policy: MockPolicy,
    pub mock_strategy: MockStrategy,
    pub mock_mutable_globals: MockMutableGlobals,
    pub check_div_zero: bool,
    pub check_overshift: bool,
    pub optimize: bool,
    pub simplify: bool,
    pub use_type_based_alias_analysis: bool,
    pub rewrite_equalities: RewriteEqualities,
    pub search_heuristic: SearchHeuristic,
    pub max_forks: Option<u64>,
    pub max_memory: Option<u64>,
    pub max_core_solver_time_ms: Option<u64>,
    pub core_solver_kind: CoreSolverKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            main_module_name: String::new(),
            mock_policy: MockPolicy::default(),
            mock_strategy: MockStrategy::default(),
            mock_mutable_globals: MockMutableGlobals::default(),
            check_div_zero: true,
            check_overshift: true,
            optimize: true,
            simplify: true,
            use_type_based_alias_analysis: false,
            rewrite_equalities: RewriteEqualities::default(),
            search_heuristic: SearchHeuristic::default(),
            max_forks: None,
            max_memory: None,
            max_core_solver_time_ms: Some(10_000),
            core_solver_kind: CoreSolverKind::default(),
        }
    }
}

/// Builder mirroring `CompilerConfig::builder()` - every field defaults
/// from `EngineConfig::default()` and is overridden piecemeal.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self { config: EngineConfig::default() }
    }

    pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.config.entry_point = entry_point.into();
        self
    }

    pub fn main_module_name(mut self, name: impl Into<String>) -> Self {
        self.config.main_module_name = name.into();
        self
    }

    pub fn mock_policy(mut self, policy: MockPolicy) -> Self {
        self.config.mock_policy = policy;
        self
    }

    pub fn mock_strategy(mut self, strategy: MockStrategy) -> Self {
        self.config.mock_strategy = strategy;
        self
    }

    pub fn rewrite_equalities(mut self, policy: RewriteEqualities) -> Self {
        self.config.rewrite_equalities = policy;
        self
    }

    pub fn search_heuristic(mut self, heuristic: SearchHeuristic) -> Self {
        self.config.search_heuristic = heuristic;
        self
    }

    pub fn max_forks(mut self, max: u64) -> Self {
        self.config.max_forks = Some(max);
        self
    }

    pub fn max_memory(mut self, max: u64) -> Self {
        self.config.max_memory = Some(max);
        self
    }

    pub fn core_solver_kind(mut self, kind: CoreSolverKind) -> Self {
        self.config.core_solver_kind = kind;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_checks_div_zero_and_overshift() {
        let cfg = EngineConfig::default();
        assert!(cfg.check_div_zero);
        assert!(cfg.check_overshift);
        assert_eq!(cfg.core_solver_kind, CoreSolverKind::Dummy);
    }

    #[test]
    fn builder_overrides_only_the_fields_touched() {
        let cfg = EngineConfig::builder()
            .entry_point("klee_entry")
            .max_forks(64)
            .build();
        assert_eq!(cfg.entry_point, "klee_entry");
        assert_eq!(cfg.max_forks, Some(64));
        assert!(cfg.check_div_zero, "untouched fields keep their default");
    }
}
