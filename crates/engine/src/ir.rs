//! The program-IR boundary (§6, "Program IR (input)").
//!
//! The LLVM-IR front-end is an excluded collaborator; this module defines
//! only the capabilities the core needs from it - successors/predecessors
//! per block, call-site identification, per-function argument counts, and
//! instruction source locations - as traits over opaque handles. C8/C10/C12
//! are written against these traits and tested against a small hand-built
//! in-memory mock module, never against a real LLVM loader.

use symex_expr::array::CallSiteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId {
    pub block: BlockId,
    pub index: u32,
}

/// `physicalLocation` fields from §6's SARIF schema, reused here as the
/// per-instruction debug location the IR is required to expose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// A basic block: successors, predecessors, and whether it ends in a call.
pub trait Block {
    fn id(&self) -> BlockId;
    fn function(&self) -> FunctionId;
    fn successors(&self) -> &[BlockId];
    fn predecessors(&self) -> &[BlockId];
    fn instruction_count(&self) -> u32;
    /// `Some(call_site)` if this block's terminator (or its one and only
    /// instruction, for a call block) is a call.
    fn call_site(&self) -> Option<CallSiteId>;
}

pub trait Function {
    fn id(&self) -> FunctionId;
    fn name(&self) -> &str;
    fn argument_count(&self) -> u32;
    fn entry_block(&self) -> BlockId;
    fn blocks(&self) -> &[BlockId];
}

/// The lifted module: functions, globals, basic blocks, and the call
/// graph, queried by block/function id.
pub trait Module {
    fn function(&self, id: FunctionId) -> &dyn Function;
    fn block(&self, id: BlockId) -> &dyn Block;
    fn function_named(&self, name: &str) -> Option<FunctionId>;
    fn source_location(&self, instr: InstructionId) -> Option<SourceLocation>;
    /// Every function whose body contains a call to `callee`, used by C10's
    /// call-graph distances.
    fn callers_of(&self, callee: FunctionId) -> &[FunctionId];
}

/// An in-memory mock module sufficient for unit/scenario tests of the core
/// against the `Module` trait, without an LLVM loader.
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    pub struct MockBlock {
        pub id: BlockId,
        pub function: FunctionId,
        pub successors: Vec<BlockId>,
        pub predecessors: Vec<BlockId>,
        pub instruction_count: u32,
        pub call_site: Option<CallSiteId>,
    }

    impl Block for MockBlock {
        fn id(&self) -> BlockId {
            self.id
        }
        fn function(&self) -> FunctionId {
            self.function
        }
        fn successors(&self) -> &[BlockId] {
            &self.successors
        }
        fn predecessors(&self) -> &[BlockId] {
            &self.predecessors
        }
        fn instruction_count(&self) -> u32 {
            self.instruction_count
        }
        fn call_site(&self) -> Option<CallSiteId> {
            self.call_site
        }
    }

    pub struct MockFunction {
        pub id: FunctionId,
        pub name: String,
        pub argument_count: u32,
        pub entry_block: BlockId,
        pub blocks: Vec<BlockId>,
    }

    impl Function for MockFunction {
        fn id(&self) -> FunctionId {
            self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn argument_count(&self) -> u32 {
            self.argument_count
        }
        fn entry_block(&self) -> BlockId {
            self.entry_block
        }
        fn blocks(&self) -> &[BlockId] {
            &self.blocks
        }
    }

    #[derive(Default)]
    pub struct MockModule {
        pub functions: HashMap<FunctionId, MockFunction>,
        pub blocks: HashMap<BlockId, MockBlock>,
        pub names: HashMap<String, FunctionId>,
        pub locations: HashMap<InstructionId, SourceLocation>,
        pub callers: HashMap<FunctionId, Vec<FunctionId>>,
        empty_callers: Vec<FunctionId>,
    }

    impl MockModule {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_function(&mut self, f: MockFunction) {
            self.names.insert(f.name.clone(), f.id);
            self.functions.insert(f.id, f);
        }

        pub fn add_block(&mut self, b: MockBlock) {
            self.blocks.insert(b.id, b);
        }
    }

    impl Module for MockModule {
        fn function(&self, id: FunctionId) -> &dyn Function {
            self.functions.get(&id).expect("unknown function id")
        }
        fn block(&self, id: BlockId) -> &dyn Block {
            self.blocks.get(&id).expect("unknown block id")
        }
        fn function_named(&self, name: &str) -> Option<FunctionId> {
            self.names.get(name).copied()
        }
        fn source_location(&self, instr: InstructionId) -> Option<SourceLocation> {
            self.locations.get(&instr).cloned()
        }
        fn callers_of(&self, callee: FunctionId) -> &[FunctionId] {
            self.callers.get(&callee).unwrap_or(&self.empty_callers)
        }
    }
}
