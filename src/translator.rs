//! Translator from SML source text to a [`Program`].
//!
//! One instruction per line: `[label:] opcode operand*`. `#` starts a
//! comment that runs to the end of the line.

use crate::error::{ExecutionLimits, Result, SmlError};
use crate::instruction::{Instruction, Opcode, Operation};
use crate::program::Program;
use crate::registers::Register;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Token {
    pub content: String,
    pub line: usize,
    pub col: usize,
}

pub struct Translator {
    tokens: Vec<Token>,
    pos: usize,
    limits: ExecutionLimits,
}

impl Translator {
    pub fn new() -> Self {
        Self::with_limits(ExecutionLimits::default())
    }

    pub fn with_limits(limits: ExecutionLimits) -> Self {
        Self {
            tokens: Vec::new(),
            pos: 0,
            limits,
        }
    }

    /// Splits one source line into tokens; `:` is a token of its own.
    fn tokenize(line_text: &str, line: usize) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut start = 1;

        let flush = |current: &mut String, start: usize, tokens: &mut Vec<Token>| {
            if !current.is_empty() {
                tokens.push(Token {
                    content: std::mem::take(current),
                    line,
                    col: start,
                });
            }
        };

        for (i, c) in line_text.chars().enumerate() {
            let col = i + 1;
            if c == '#' {
                break;
            }
            if c.is_whitespace() {
                flush(&mut current, start, &mut tokens);
            } else if c == ':' {
                flush(&mut current, start, &mut tokens);
                tokens.push(Token {
                    content: c.to_string(),
                    line,
                    col,
                });
            } else {
                if current.is_empty() {
                    start = col;
                }
                current.push(c);
            }
        }
        flush(&mut current, start, &mut tokens);
        tokens
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        if self.pos < self.tokens.len() {
            let t = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(t)
        } else {
            None
        }
    }

    fn expect_operand(&mut self, what: &str, line: usize) -> Result<Token> {
        self.consume().ok_or_else(|| {
            SmlError::ParseError(format!("Expected {} at line {}", what, line))
        })
    }

    fn parse_register(&mut self, line: usize) -> Result<Register> {
        let t = self.expect_operand("register", line)?;
        t.content.parse::<Register>().map_err(|_| {
            SmlError::ParseError(format!(
                "Unknown register '{}' at line {}:{}",
                t.content, t.line, t.col
            ))
        })
    }

    fn parse_literal(&mut self, line: usize) -> Result<i32> {
        let t = self.expect_operand("integer literal", line)?;
        t.content.parse::<i32>().map_err(|_| {
            SmlError::ParseError(format!(
                "Invalid integer literal '{}' at line {}:{}",
                t.content, t.line, t.col
            ))
        })
    }

    fn parse_target(&mut self, line: usize) -> Result<String> {
        let t = self.expect_operand("label", line)?;
        if !is_label_name(&t.content) {
            return Err(SmlError::ParseError(format!(
                "Invalid label '{}' at line {}:{}",
                t.content, t.line, t.col
            )));
        }
        Ok(t.content)
    }

    /// Translates `source` into a program.
    ///
    /// Duplicate labels fail here with [`SmlError::DuplicateLabel`].
    pub fn translate(&mut self, source: &str) -> Result<Program> {
        self.limits.check_source_size(source.len())?;
        let mut program = Program::new();

        for (i, text) in source.lines().enumerate() {
            self.tokens = Self::tokenize(text, i + 1);
            self.pos = 0;
            if self.tokens.is_empty() {
                continue;
            }
            let instr = self.parse_line(i + 1)?;
            program.push(instr)?;
            self.limits.check_instruction_count(program.len())?;
        }

        debug!(
            instructions = program.len(),
            labels = program.labels().len(),
            "translated program"
        );
        Ok(program)
    }

    pub fn translate_file(&mut self, path: impl AsRef<Path>) -> Result<Program> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SmlError::IoError(format!("{}: {}", path.display(), e)))?;
        self.translate(&source)
    }

    fn parse_line(&mut self, line: usize) -> Result<Instruction> {
        // Label: `name:`
        let mut label = None;
        if self.tokens.get(1).map(|t| t.content.as_str()) == Some(":") {
            let name = self.consume().ok_or_else(|| {
                SmlError::ParseError(format!("Expected label at line {}", line))
            })?;
            if !is_label_name(&name.content) {
                return Err(SmlError::ParseError(format!(
                    "Invalid label '{}' at line {}:{}",
                    name.content, name.line, name.col
                )));
            }
            self.consume(); // :
            label = Some(name.content);
        }

        let op_token = self.expect_operand("opcode", line)?;
        let opcode = op_token.content.parse::<Opcode>().map_err(|_| {
            SmlError::ParseError(format!(
                "Unknown opcode '{}' at line {}:{}",
                op_token.content, op_token.line, op_token.col
            ))
        })?;

        let operation = match opcode {
            Opcode::Add => Operation::Add {
                result: self.parse_register(line)?,
                source: self.parse_register(line)?,
            },
            Opcode::Sub => Operation::Sub {
                result: self.parse_register(line)?,
                source: self.parse_register(line)?,
            },
            Opcode::Mul => Operation::Mul {
                result: self.parse_register(line)?,
                source: self.parse_register(line)?,
            },
            Opcode::Div => Operation::Div {
                result: self.parse_register(line)?,
                source: self.parse_register(line)?,
            },
            Opcode::Cmp => Operation::Cmp {
                result: self.parse_register(line)?,
                source: self.parse_register(line)?,
            },
            Opcode::Mov => Operation::Mov {
                result: self.parse_register(line)?,
                value: self.parse_literal(line)?,
            },
            Opcode::Out => Operation::Out {
                source: self.parse_register(line)?,
            },
            Opcode::Jmp => Operation::Jmp {
                target: self.parse_target(line)?,
            },
            Opcode::Jnz => Operation::Jnz {
                source: self.parse_register(line)?,
                target: self.parse_target(line)?,
            },
            Opcode::Jz => Operation::Jz {
                source: self.parse_register(line)?,
                target: self.parse_target(line)?,
            },
        };

        if let Some(extra) = self.peek() {
            return Err(SmlError::ParseError(format!(
                "Unexpected token '{}' at line {}:{}",
                extra.content, extra.line, extra.col
            )));
        }

        Ok(Instruction { label, operation })
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_label_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
