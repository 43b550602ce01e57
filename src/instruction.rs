//! SML instructions.
//!
//! An [`Instruction`] is an optional label plus an [`Operation`]. Execution
//! is an exhaustive match over the operation, so adding a variant forces
//! every consumer (execution, rendering, the translator) to handle it.

use crate::error::{Result, SmlError};
use crate::machine::Machine;
use crate::registers::Register;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// add result source (result += source)
    Add,
    /// sub result source (result -= source)
    Sub,
    /// mul result source (result *= source)
    Mul,
    /// div result source (result /= source, truncating)
    Div,
    /// cmp result source (result = -1, 0 or 1)
    Cmp,
    /// mov result literal
    Mov,
    /// out source
    Out,
    /// Unconditional jump
    Jmp,
    /// Jump if Not Zero
    Jnz,
    /// Jump if Zero
    Jz,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Cmp,
        Opcode::Mov,
        Opcode::Out,
        Opcode::Jmp,
        Opcode::Jnz,
        Opcode::Jz,
    ];

    /// Mnemonic as written in SML source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Cmp => "cmp",
            Opcode::Mov => "mov",
            Opcode::Out => "out",
            Opcode::Jmp => "jmp",
            Opcode::Jnz => "jnz",
            Opcode::Jz => "jz",
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jnz | Opcode::Jz)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Opcode {
    type Err = SmlError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| SmlError::ParseError(format!("Unknown opcode '{}'", s)))
    }
}

/// Operation payload of an instruction.
///
/// Arithmetic wraps on overflow (32-bit two's complement).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Add { result: Register, source: Register },
    Sub { result: Register, source: Register },
    Mul { result: Register, source: Register },
    Div { result: Register, source: Register },
    Cmp { result: Register, source: Register },
    Mov { result: Register, value: i32 },
    Out { source: Register },
    Jmp { target: String },
    Jnz { source: Register, target: String },
    Jz { source: Register, target: String },
}

impl Operation {
    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::Add { .. } => Opcode::Add,
            Operation::Sub { .. } => Opcode::Sub,
            Operation::Mul { .. } => Opcode::Mul,
            Operation::Div { .. } => Opcode::Div,
            Operation::Cmp { .. } => Opcode::Cmp,
            Operation::Mov { .. } => Opcode::Mov,
            Operation::Out { .. } => Opcode::Out,
            Operation::Jmp { .. } => Opcode::Jmp,
            Operation::Jnz { .. } => Opcode::Jnz,
            Operation::Jz { .. } => Opcode::Jz,
        }
    }

    /// Label this operation may jump to, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Operation::Jmp { target }
            | Operation::Jnz { target, .. }
            | Operation::Jz { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// What the machine does with its program counter after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Continue with the next sequential address
    Next,
    /// Continue at this address
    Jump(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub label: Option<String>,
    pub operation: Operation,
}

impl Instruction {
    pub fn new(label: Option<&str>, operation: Operation) -> Self {
        Self {
            label: label.map(str::to_string),
            operation,
        }
    }

    pub fn add(label: Option<&str>, result: Register, source: Register) -> Self {
        Self::new(label, Operation::Add { result, source })
    }

    pub fn sub(label: Option<&str>, result: Register, source: Register) -> Self {
        Self::new(label, Operation::Sub { result, source })
    }

    pub fn mul(label: Option<&str>, result: Register, source: Register) -> Self {
        Self::new(label, Operation::Mul { result, source })
    }

    pub fn div(label: Option<&str>, result: Register, source: Register) -> Self {
        Self::new(label, Operation::Div { result, source })
    }

    pub fn cmp(label: Option<&str>, result: Register, source: Register) -> Self {
        Self::new(label, Operation::Cmp { result, source })
    }

    pub fn mov(label: Option<&str>, result: Register, value: i32) -> Self {
        Self::new(label, Operation::Mov { result, value })
    }

    pub fn out(label: Option<&str>, source: Register) -> Self {
        Self::new(label, Operation::Out { source })
    }

    pub fn jmp(label: Option<&str>, target: &str) -> Self {
        Self::new(
            label,
            Operation::Jmp {
                target: target.to_string(),
            },
        )
    }

    pub fn jnz(label: Option<&str>, source: Register, target: &str) -> Self {
        Self::new(
            label,
            Operation::Jnz {
                source,
                target: target.to_string(),
            },
        )
    }

    pub fn jz(label: Option<&str>, source: Register, target: &str) -> Self {
        Self::new(
            label,
            Operation::Jz {
                source,
                target: target.to_string(),
            },
        )
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn opcode(&self) -> Opcode {
        self.operation.opcode()
    }

    /// Runs this instruction against `machine`.
    ///
    /// Jump targets are looked up in the machine's labels on every call, so
    /// an unbound target surfaces as [`SmlError::UnknownLabel`].
    pub fn execute(&self, machine: &mut Machine) -> Result<Directive> {
        match &self.operation {
            Operation::Add { result, source } => {
                binary(machine, *result, *source, |a, b| Ok(a.wrapping_add(b)))
            }
            Operation::Sub { result, source } => {
                binary(machine, *result, *source, |a, b| Ok(a.wrapping_sub(b)))
            }
            Operation::Mul { result, source } => {
                binary(machine, *result, *source, |a, b| Ok(a.wrapping_mul(b)))
            }
            Operation::Div { result, source } => binary(machine, *result, *source, |a, b| {
                if b == 0 {
                    return Err(SmlError::DivisionByZero { register: *source });
                }
                Ok(a.wrapping_div(b))
            }),
            Operation::Cmp { result, source } => {
                binary(machine, *result, *source, |a, b| {
                    Ok(match a.cmp(&b) {
                        Ordering::Less => -1,
                        Ordering::Equal => 0,
                        Ordering::Greater => 1,
                    })
                })
            }
            Operation::Mov { result, value } => {
                machine.registers_mut().set(*result, *value);
                Ok(Directive::Next)
            }
            Operation::Out { source } => {
                let value = machine.registers().get(*source);
                machine.emit(value)?;
                Ok(Directive::Next)
            }
            Operation::Jmp { target } => jump(machine, target),
            Operation::Jnz { source, target } => {
                if machine.registers().get(*source) != 0 {
                    jump(machine, target)
                } else {
                    Ok(Directive::Next)
                }
            }
            Operation::Jz { source, target } => {
                if machine.registers().get(*source) == 0 {
                    jump(machine, target)
                } else {
                    Ok(Directive::Next)
                }
            }
        }
    }
}

fn binary<F>(machine: &mut Machine, result: Register, source: Register, op: F) -> Result<Directive>
where
    F: FnOnce(i32, i32) -> Result<i32>,
{
    let registers = machine.registers_mut();
    let value = op(registers.get(result), registers.get(source))?;
    registers.set(result, value);
    Ok(Directive::Next)
}

fn jump(machine: &Machine, target: &str) -> Result<Directive> {
    machine.labels().get_address(target).map(Directive::Jump)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{}: ", label)?;
        }
        write!(f, "{}", self.opcode())?;
        match &self.operation {
            Operation::Add { result, source }
            | Operation::Sub { result, source }
            | Operation::Mul { result, source }
            | Operation::Div { result, source }
            | Operation::Cmp { result, source } => write!(f, " {} {}", result, source),
            Operation::Mov { result, value } => write!(f, " {} {}", result, value),
            Operation::Out { source } => write!(f, " {}", source),
            Operation::Jmp { target } => write!(f, " {}", target),
            Operation::Jnz { source, target } | Operation::Jz { source, target } => {
                write!(f, " {} {}", source, target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Labels;
    use crate::registers::Register::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn machine_with(labels: Labels) -> Machine {
        Machine::from_parts(labels, Vec::new())
    }

    fn machine() -> Machine {
        machine_with(Labels::new())
    }

    #[test]
    fn test_mul_valid() {
        let mut m = machine();
        m.registers_mut().set(EAX, 5);
        m.registers_mut().set(EBX, 6);
        let directive = Instruction::mul(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(directive, Directive::Next);
        assert_eq!(m.registers().get(EAX), 30);
        assert_eq!(m.registers().get(EBX), 6);
    }

    #[test]
    fn test_mul_negative() {
        let mut m = machine();
        m.registers_mut().set(EAX, -5);
        m.registers_mut().set(EBX, 6);
        Instruction::mul(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), -30);
    }

    #[test]
    fn test_mul_wraps_on_overflow() {
        let mut m = machine();
        m.registers_mut().set(EAX, i32::MAX);
        m.registers_mut().set(EBX, 2);
        Instruction::mul(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), -2);

        m.registers_mut().set(ECX, 65536);
        m.registers_mut().set(EDX, 65536);
        Instruction::mul(None, ECX, EDX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(ECX), 0);
    }

    #[test]
    fn test_sub_valid() {
        let mut m = machine();
        m.registers_mut().set(EAX, -5);
        m.registers_mut().set(EBX, 6);
        let directive = Instruction::sub(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(directive, Directive::Next);
        assert_eq!(m.registers().get(EAX), -11);
        assert_eq!(m.registers().get(EBX), 6);
    }

    #[test]
    fn test_sub_wraps_on_overflow() {
        let mut m = machine();
        m.registers_mut().set(EAX, i32::MIN);
        m.registers_mut().set(EBX, 1);
        Instruction::sub(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), i32::MAX);
    }

    #[test]
    fn test_mul_and_sub_are_pure_in_operands() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let a: i32 = rng.gen();
            let b: i32 = rng.gen();

            let mut m = machine();
            m.registers_mut().set(ESI, a);
            m.registers_mut().set(EDI, b);
            let d = Instruction::mul(None, ESI, EDI).execute(&mut m).unwrap();
            assert_eq!(d, Directive::Next);
            assert_eq!(m.registers().get(ESI), a.wrapping_mul(b));
            assert_eq!(m.registers().get(EDI), b);

            let mut m = machine();
            m.registers_mut().set(ESI, a);
            m.registers_mut().set(EDI, b);
            let d = Instruction::sub(None, ESI, EDI).execute(&mut m).unwrap();
            assert_eq!(d, Directive::Next);
            assert_eq!(m.registers().get(ESI), a.wrapping_sub(b));
            assert_eq!(m.registers().get(EDI), b);
        }
    }

    #[test]
    fn test_same_register_operands() {
        let mut m = machine();
        m.registers_mut().set(EAX, 7);
        Instruction::mul(None, EAX, EAX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), 49);
        Instruction::sub(None, EAX, EAX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), 0);
    }

    #[test]
    fn test_add_and_mov() {
        let mut m = machine();
        Instruction::mov(None, EAX, 40).execute(&mut m).unwrap();
        Instruction::mov(None, EBX, 2).execute(&mut m).unwrap();
        Instruction::add(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), 42);

        Instruction::mov(None, ECX, i32::MAX).execute(&mut m).unwrap();
        Instruction::mov(None, EDX, 1).execute(&mut m).unwrap();
        Instruction::add(None, ECX, EDX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(ECX), i32::MIN);
    }

    #[test]
    fn test_div() {
        let mut m = machine();
        m.registers_mut().set(EAX, -7);
        m.registers_mut().set(EBX, 2);
        Instruction::div(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), -3);

        m.registers_mut().set(EAX, i32::MIN);
        m.registers_mut().set(EBX, -1);
        Instruction::div(None, EAX, EBX).execute(&mut m).unwrap();
        assert_eq!(m.registers().get(EAX), i32::MIN);
    }

    #[test]
    fn test_div_by_zero() {
        let mut m = machine();
        m.registers_mut().set(EAX, 10);
        let err = Instruction::div(None, EAX, ECX).execute(&mut m).unwrap_err();
        assert_eq!(err, SmlError::DivisionByZero { register: ECX });
        assert_eq!(m.registers().get(EAX), 10);
    }

    #[test]
    fn test_cmp() {
        let mut m = machine();
        for (a, b, expected) in [(1, 2, -1), (2, 2, 0), (3, 2, 1), (i32::MIN, i32::MAX, -1)] {
            m.registers_mut().set(EAX, a);
            m.registers_mut().set(EBX, b);
            Instruction::cmp(None, EAX, EBX).execute(&mut m).unwrap();
            assert_eq!(m.registers().get(EAX), expected);
            assert_eq!(m.registers().get(EBX), b);
        }
    }

    #[test]
    fn test_out_records_value() {
        let mut m = machine();
        m.registers_mut().set(EDX, 99);
        let d = Instruction::out(None, EDX).execute(&mut m).unwrap();
        assert_eq!(d, Directive::Next);
        assert_eq!(m.output(), &[99]);
    }

    #[test]
    fn test_jumps_resolve_labels() {
        let mut labels = Labels::new();
        labels.add_label("loop", 3).unwrap();
        let mut m = machine_with(labels);

        assert_eq!(
            Instruction::jmp(None, "loop").execute(&mut m).unwrap(),
            Directive::Jump(3)
        );

        m.registers_mut().set(EAX, 0);
        assert_eq!(
            Instruction::jnz(None, EAX, "loop").execute(&mut m).unwrap(),
            Directive::Next
        );
        assert_eq!(
            Instruction::jz(None, EAX, "loop").execute(&mut m).unwrap(),
            Directive::Jump(3)
        );

        m.registers_mut().set(EAX, -1);
        assert_eq!(
            Instruction::jnz(None, EAX, "loop").execute(&mut m).unwrap(),
            Directive::Jump(3)
        );
        assert_eq!(
            Instruction::jz(None, EAX, "loop").execute(&mut m).unwrap(),
            Directive::Next
        );
    }

    #[test]
    fn test_jump_to_unknown_label() {
        let mut m = machine();
        let err = Instruction::jmp(None, "loop").execute(&mut m).unwrap_err();
        assert_eq!(
            err,
            SmlError::UnknownLabel {
                label: "loop".to_string()
            }
        );
    }

    #[test]
    fn test_untaken_jump_does_not_resolve() {
        let mut m = machine();
        m.registers_mut().set(EAX, 0);
        let d = Instruction::jnz(None, EAX, "nowhere").execute(&mut m).unwrap();
        assert_eq!(d, Directive::Next);
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            Instruction::mul(Some("f1"), EAX, EBX),
            Instruction::mul(Some("f1"), EAX, EBX)
        );
        assert_ne!(
            Instruction::mul(Some("f1"), EAX, EBX),
            Instruction::mul(None, EAX, EBX)
        );
        assert_ne!(
            Instruction::mul(None, EAX, EBX),
            Instruction::mul(None, EBX, EAX)
        );
        // Same fields, different kind
        assert_ne!(
            Instruction::mul(None, EAX, EBX),
            Instruction::sub(None, EAX, EBX)
        );
    }

    #[test]
    fn test_accessors() {
        let instr = Instruction::sub(Some("f2"), ECX, EDX);
        assert_eq!(instr.label(), Some("f2"));
        assert_eq!(instr.opcode(), Opcode::Sub);
        assert!(!instr.opcode().is_jump());
        assert_eq!(Instruction::jz(None, EAX, "x").operation.target(), Some("x"));
        assert_eq!(instr.operation.target(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::mul(None, EAX, EBX).to_string(), "mul EAX EBX");
        assert_eq!(
            Instruction::sub(Some("f1"), ECX, EDX).to_string(),
            "f1: sub ECX EDX"
        );
        assert_eq!(Instruction::mov(None, ESI, -3).to_string(), "mov ESI -3");
        assert_eq!(Instruction::out(Some("o"), EDI).to_string(), "o: out EDI");
        assert_eq!(Instruction::jmp(None, "loop").to_string(), "jmp loop");
        assert_eq!(
            Instruction::jnz(None, EBX, "loop").to_string(),
            "jnz EBX loop"
        );
    }

    #[test]
    fn test_opcode_from_str() {
        for op in Opcode::ALL {
            assert_eq!(op.as_str().parse::<Opcode>().unwrap(), op);
        }
        assert!("nop".parse::<Opcode>().is_err());
    }
}
