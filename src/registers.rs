use crate::error::SmlError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

/// One of the eight integer registers.
///
/// Declaration order is the rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    EAX,
    EBX,
    ECX,
    EDX,
    ESP,
    EBP,
    ESI,
    EDI,
}

impl Register {
    pub const COUNT: usize = 8;

    pub const ALL: [Register; Register::COUNT] = [
        Register::EAX,
        Register::EBX,
        Register::ECX,
        Register::EDX,
        Register::ESP,
        Register::EBP,
        Register::ESI,
        Register::EDI,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Register::EAX => "EAX",
            Register::EBX => "EBX",
            Register::ECX => "ECX",
            Register::EDX => "EDX",
            Register::ESP => "ESP",
            Register::EBP => "EBP",
            Register::ESI => "ESI",
            Register::EDI => "EDI",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Register {
    type Err = SmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SmlError::ParseError(format!("Unknown register '{}'", s)))
    }
}

/// The register file: a value for every [`Register`], all zero on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Registers {
    values: [i32; Register::COUNT],
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every register to 0.
    pub fn clear(&mut self) {
        self.values = [0; Register::COUNT];
    }

    pub fn get(&self, register: Register) -> i32 {
        self.values[register.slot()]
    }

    pub fn set(&mut self, register: Register, value: i32) {
        self.values[register.slot()] = value;
    }

    /// Registers and their values, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, i32)> + '_ {
        Register::ALL.into_iter().map(move |r| (r, self.get(r)))
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (register, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", register, value)?;
        }
        f.write_str("]")
    }
}

impl Serialize for Registers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Register::COUNT))?;
        for (register, value) in self.iter() {
            map.serialize_entry(register.as_str(), &value)?;
        }
        map.end()
    }
}
