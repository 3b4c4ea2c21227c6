#![allow(dead_code)]

/// Intermediate representation for a parsed JVM class.
#[derive(Clone, Debug)]
pub(crate) struct Class {
    /// Internal (slash-delimited) class name, e.g. `com/example/App`.
    pub(crate) name: String,
    pub(crate) methods: Vec<Method>,
    /// Index of the class file in the SARIF artifact table.
    pub(crate) artifact_index: i64,
}

/// Intermediate representation for a method and its bytecode.
#[derive(Clone, Debug)]
pub(crate) struct Method {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    /// Decoded instructions in bytecode order; empty for abstract and native methods.
    pub(crate) instructions: Vec<Instruction>,
}

/// Bytecode instruction captured for analysis.
#[derive(Clone, Debug)]
pub(crate) struct Instruction {
    pub(crate) offset: u32,
    pub(crate) kind: InstructionKind,
}

/// Instruction kinds the rules care about.
#[derive(Clone, Debug)]
pub(crate) enum InstructionKind {
    Invoke(CallSite),
    Other(u8),
}

/// Call site extracted from bytecode.
#[derive(Clone, Debug)]
pub(crate) struct CallSite {
    /// Internal name of the class owning the called method.
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) kind: CallKind,
}

/// Call opcode classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
}
