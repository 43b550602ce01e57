pub mod error;
pub mod instruction;
pub mod labels;
pub mod machine;
pub mod program;
pub mod registers;
pub mod translator;

pub use error::{ExecutionLimits, Result, SmlError};
pub use instruction::{Directive, Instruction, Opcode, Operation};
pub use labels::Labels;
pub use machine::{Machine, Snapshot};
pub use program::Program;
pub use registers::{Register, Registers};
pub use translator::Translator;
