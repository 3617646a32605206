//! Shared parser for the canonical address syntax
//!
//! ```text
//! address := (step ".")* [resource]
//! step    := "module" "." ident [key]
//! resource:= ident "." ident [key]
//! key     := "[" (integer | quoted-string) "]"
//! ```

use crate::error::AddressError;
use crate::module::{ModuleInstance, ModuleInstanceStep};
use crate::resource::{InstanceKey, Resource};

/// Result of parsing an absolute address
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedAddress {
    pub(crate) module: ModuleInstance,
    pub(crate) resource: Option<(Resource, Option<InstanceKey>)>,
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn unexpected(&self) -> AddressError {
        match self.peek() {
            Some(found) => AddressError::UnexpectedChar {
                input: self.input.to_string(),
                offset: self.pos,
                found,
            },
            None => AddressError::UnexpectedEnd(self.input.to_string()),
        }
    }

    fn expect(&mut self, want: char) -> Result<(), AddressError> {
        if self.peek() == Some(want) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn ident(&mut self) -> Result<&'a str, AddressError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(&self.input[start..self.pos])
    }

    fn key(&mut self) -> Result<Option<InstanceKey>, AddressError> {
        if self.peek() != Some('[') {
            return Ok(None);
        }
        self.bump();
        let key = match self.peek() {
            Some('"') => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some(c) => out.push(c),
                            None => return Err(self.unexpected()),
                        },
                        Some(c) => out.push(c),
                        None => return Err(self.unexpected()),
                    }
                }
                InstanceKey::Str(out)
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let start = self.pos;
                self.bump();
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
                let digits = &self.input[start..self.pos];
                let n = digits
                    .parse::<i64>()
                    .map_err(|_| AddressError::InvalidKey(digits.to_string()))?;
                InstanceKey::Int(n)
            }
            _ => return Err(self.unexpected()),
        };
        self.expect(']')?;
        Ok(Some(key))
    }
}

/// Parse an absolute address: a module instance optionally followed by a
/// resource and instance key.
pub(crate) fn parse_address(input: &str) -> Result<ParsedAddress, AddressError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AddressError::Empty);
    }

    let mut cur = Cursor::new(input);
    let mut steps = Vec::new();

    loop {
        let first = cur.ident()?;
        cur.expect('.')?;
        let second = cur.ident()?;
        let key = cur.key()?;

        if first == "module" {
            steps.push(ModuleInstanceStep::new(second, key.unwrap_or(InstanceKey::NoKey)));
            if cur.at_end() {
                return Ok(ParsedAddress {
                    module: ModuleInstance::new(steps),
                    resource: None,
                });
            }
            cur.expect('.')?;
            continue;
        }

        if !cur.at_end() {
            return Err(cur.unexpected());
        }
        return Ok(ParsedAddress {
            module: ModuleInstance::new(steps),
            resource: Some((Resource::new(first, second), key)),
        });
    }
}

/// Parse a module-relative resource reference (`kind.name` or `kind.name[key]`).
pub(crate) fn parse_relative(input: &str) -> Result<(Resource, Option<InstanceKey>), AddressError> {
    let parsed = parse_address(input)?;
    if !parsed.module.is_root() {
        return Err(AddressError::UnexpectedChar {
            input: input.to_string(),
            offset: 0,
            found: 'm',
        });
    }
    parsed
        .resource
        .ok_or_else(|| AddressError::MissingResource(input.to_string()))
}
