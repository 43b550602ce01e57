use crate::error::Result;
use crate::instruction::Instruction;
use crate::labels::Labels;
use std::fmt;

/// A loaded program: ordered instructions plus the labels bound to them.
///
/// Labels are registered as labelled instructions are pushed, so a
/// duplicate name fails while the program is being built, before it can
/// ever run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: Labels,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `instr` and binds its label (if any) to its address.
    pub fn push(&mut self, instr: Instruction) -> Result<usize> {
        let address = self.instructions.len();
        if let Some(label) = instr.label() {
            self.labels.add_label(label, address)?;
        }
        self.instructions.push(instr);
        Ok(address)
    }

    pub fn from_instructions<I>(instructions: I) -> Result<Self>
    where
        I: IntoIterator<Item = Instruction>,
    {
        let mut program = Self::new();
        for instr in instructions {
            program.push(instr)?;
        }
        Ok(program)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn into_parts(self) -> (Labels, Vec<Instruction>) {
        (self.labels, self.instructions)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (address, instr) in self.instructions.iter().enumerate() {
            writeln!(f, "{:>4}  {}", address, instr)?;
        }
        Ok(())
    }
}
