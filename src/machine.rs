//! The SML machine: fetch, execute, apply the returned directive.

use crate::error::{ExecutionLimits, Result, SmlError};
use crate::instruction::{Directive, Instruction};
use crate::labels::Labels;
use crate::program::Program;
use crate::registers::Registers;
use metrics::counter;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Final (or current) observable state of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub registers: Registers,
    pub program_counter: usize,
    pub steps: u64,
    pub output: Vec<i32>,
}

pub struct Machine {
    labels: Labels,
    program: Rc<[Instruction]>,
    registers: Registers,
    program_counter: usize,
    steps: u64,
    output: Vec<i32>,
    echo: Option<Box<dyn Write>>,
    limits: Option<ExecutionLimits>,
}

impl Machine {
    pub fn new(program: Program) -> Self {
        let (labels, instructions) = program.into_parts();
        Self::from_parts(labels, instructions)
    }

    /// Builds a machine from an already populated label table and program.
    pub fn from_parts(labels: Labels, instructions: Vec<Instruction>) -> Self {
        Self {
            labels,
            program: instructions.into(),
            registers: Registers::new(),
            program_counter: 0,
            steps: 0,
            output: Vec::new(),
            echo: None,
            limits: None,
        }
    }

    /// Bounds every run by `limits.max_steps`.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Writes each `out` value as a line to `sink`, in addition to the
    /// transcript kept in [`Machine::output`].
    pub fn with_echo(mut self, sink: Box<dyn Write>) -> Self {
        self.echo = Some(sink);
        self
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Values written by `out`, in order.
    pub fn output(&self) -> &[i32] {
        &self.output
    }

    pub fn is_halted(&self) -> bool {
        self.program_counter >= self.program.len()
    }

    pub(crate) fn emit(&mut self, value: i32) -> Result<()> {
        self.output.push(value);
        if let Some(sink) = self.echo.as_mut() {
            writeln!(sink, "{}", value)?;
        }
        Ok(())
    }

    /// Clears registers, output, program counter and step count.
    pub fn reset(&mut self) {
        self.registers.clear();
        self.output.clear();
        self.program_counter = 0;
        self.steps = 0;
    }

    /// Executes the instruction at the program counter.
    ///
    /// Returns `Ok(false)` once the machine has halted.
    pub fn step(&mut self) -> Result<bool> {
        let length = self.program.len();
        let address = self.program_counter;
        if address >= length {
            return Ok(false);
        }

        if let Some(limits) = &self.limits {
            limits
                .check_steps(self.steps + 1)
                .map_err(|cause| fault(address, cause))?;
        }

        let program = Rc::clone(&self.program);
        let instruction = &program[address];
        let directive = instruction
            .execute(self)
            .map_err(|cause| fault(address, cause))?;
        self.steps += 1;
        counter!("sml_instructions_executed_total", 1, "opcode" => instruction.opcode().as_str());

        self.program_counter = match directive {
            Directive::Next => address + 1,
            Directive::Jump(target) if target <= length => {
                counter!("sml_jumps_taken_total", 1);
                target
            }
            Directive::Jump(target) => {
                return Err(fault(
                    address,
                    SmlError::InvalidProgramCounter { target, length },
                ));
            }
        };
        trace!(address, instruction = %instruction, next = self.program_counter, "step");

        Ok(self.program_counter < length)
    }

    /// Runs the program from address 0 until it halts or fails.
    ///
    /// Registers are left as they are, so callers can preset inputs.
    pub fn execute(&mut self) -> Result<()> {
        self.program_counter = 0;
        self.steps = 0;
        self.output.clear();
        debug!(
            instructions = self.program.len(),
            labels = self.labels.len(),
            "starting run"
        );

        loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    counter!("sml_runs_total", 1, "outcome" => "failed");
                    warn!(steps = self.steps, "run failed: {}", e);
                    return Err(e);
                }
            }
        }

        counter!("sml_runs_total", 1, "outcome" => "halted");
        debug!(steps = self.steps, registers = %self.registers, "halted");
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.registers.clone(),
            program_counter: self.program_counter,
            steps: self.steps,
            output: self.output.clone(),
        }
    }
}

fn fault(address: usize, cause: SmlError) -> SmlError {
    SmlError::ExecutionError {
        address,
        cause: Box::new(cause),
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("labels", &self.labels)
            .field("program", &self.program)
            .field("registers", &self.registers)
            .field("program_counter", &self.program_counter)
            .field("steps", &self.steps)
            .field("output", &self.output)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program:")?;
        for (address, instr) in self.program.iter().enumerate() {
            writeln!(f, "{:>4}  {}", address, instr)?;
        }
        writeln!(f, "labels: {}", self.labels)?;
        write!(f, "registers: {}", self.registers)
    }
}
