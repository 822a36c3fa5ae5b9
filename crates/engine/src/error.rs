//! Error taxonomy for the engine (§7).
//!
//! Three leaf kinds - `ProgramError`, `ExecutionError`, `SolverError` - are
//! composed into `EngineError` with `From` impls, in the manner of
//! `seq-compiler`'s `CodeGenError`: plain enums, manual `Display`, no
//! `thiserror`. Program and execution errors are state-terminal; solver
//! errors are not (the executor decides whether to retry, downgrade, or
//! terminate the state as `EarlyUser`); resource and invariant failures get
//! their own `EngineError` variants.

use std::fmt;

/// Terminal program-level failure discovered while stepping a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    OutOfBoundsPointer,
    MisalignedAccess,
    NullDereference,
    DivisionByZero,
    AssertionFailure,
    UncaughtException,
    UserReported(String),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::OutOfBoundsPointer => write!(f, "out-of-bounds pointer access"),
            ProgramError::MisalignedAccess => write!(f, "misaligned memory access"),
            ProgramError::NullDereference => write!(f, "null pointer dereference"),
            ProgramError::DivisionByZero => write!(f, "division by zero"),
            ProgramError::AssertionFailure => write!(f, "assertion failure"),
            ProgramError::UncaughtException => write!(f, "uncaught exception"),
            ProgramError::UserReported(msg) => write!(f, "user-reported error: {msg}"),
        }
    }
}

impl std::error::Error for ProgramError {}

/// Terminal failure in the interpreter itself, not in the target program's
/// logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    UninitializedRegister,
    UnresolvedSymbolicJump,
    UnsupportedInstruction(String),
    ExternalCallRefused(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::UninitializedRegister => write!(f, "use of uninitialized register"),
            ExecutionError::UnresolvedSymbolicJump => write!(f, "symbolic jump to unresolved target"),
            ExecutionError::UnsupportedInstruction(name) => write!(f, "unsupported instruction: {name}"),
            ExecutionError::ExternalCallRefused(name) => write!(f, "external call refused: {name}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// A solver response that is not itself state-terminal; the caller (the
/// solver chain wrapper, or ultimately the executor) decides what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    Timeout,
    OutOfMemory,
    BackendFailure,
    WaitpidOrForkFailure,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Timeout => write!(f, "solver query timed out"),
            SolverError::OutOfMemory => write!(f, "solver exceeded its memory limit"),
            SolverError::BackendFailure => write!(f, "solver backend failure"),
            SolverError::WaitpidOrForkFailure => write!(f, "failed to fork/wait for the solver process"),
        }
    }
}

impl std::error::Error for SolverError {}

/// Resource pressure that is handled by the caller rather than by killing
/// the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Memory,
    Forks,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Memory => write!(f, "memory"),
            ResourceKind::Forks => write!(f, "fork quota"),
        }
    }
}

/// Top-level error type threaded through the engine's public API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Program(ProgramError),
    Execution(ExecutionError),
    Solver(SolverError),
    /// Overall resource cap exceeded; §7's remedy (terminate earliest-reached
    /// states, or prune the least-promising fork side) is the caller's call,
    /// not this error's.
    ResourceExhausted(ResourceKind),
    /// A §3 invariant broke. These are bugs, not recoverable conditions -
    /// `debug_assert!` is used at the call site instead of returning this
    /// variant in release builds; it exists so tests can assert on it.
    InvariantViolated(&'static str),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Program(e) => write!(f, "{e}"),
            EngineError::Execution(e) => write!(f, "{e}"),
            EngineError::Solver(e) => write!(f, "{e}"),
            EngineError::ResourceExhausted(kind) => write!(f, "{kind} cap exceeded"),
            EngineError::InvariantViolated(what) => write!(f, "invariant violated: {what}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ProgramError> for EngineError {
    fn from(e: ProgramError) -> Self {
        EngineError::Program(e)
    }
}

impl From<ExecutionError> for EngineError {
    fn from(e: ExecutionError) -> Self {
        EngineError::Execution(e)
    }
}

impl From<SolverError> for EngineError {
    fn from(e: SolverError) -> Self {
        EngineError::Solver(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_non_empty() {
        assert!(!EngineError::from(ProgramError::DivisionByZero).to_string().is_empty());
        assert!(!EngineError::from(ExecutionError::UninitializedRegister).to_string().is_empty());
        assert!(!EngineError::from(SolverError::Timeout).to_string().is_empty());
    }

    #[test]
    fn resource_exhausted_names_the_kind() {
        let e = EngineError::ResourceExhausted(ResourceKind::Memory);
        assert!(e.to_string().contains("memory"));
    }
}
