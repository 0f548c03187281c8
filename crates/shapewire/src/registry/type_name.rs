//! Stable type names.
//!
//! Grammar:
//!
//! ```text
//! type   := ident ('<' type (',' type)* '>')? suffix*
//! suffix := '[' ','* ']'     array; comma count = rank - 1
//!         | '?'              nullable value type
//! ident  := [A-Za-z_][A-Za-z0-9_.]*
//! ```
//!
//! Built-ins use short mnemonics (`i` for a 32-bit integer, `s` for text) and
//! generic containers use a mnemonic with arguments (`di<i,s>` for a
//! dictionary of 32-bit integers to text). Formatting and parsing are exact
//! inverses.

use std::fmt;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::error::TypeNameError;
use crate::limits::{MAX_ARRAY_RANK, MAX_TUPLE_ARITY, MAX_TYPE_NAME_DEPTH, MAX_TYPE_NAME_LEN};
use crate::model::{GenericKind, Primitive, TypeName, TypeRef};

/// Mnemonic of the extendable root type.
pub const ANY_MNEMONIC: &str = "o";

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Any,
    Primitive(Primitive),
    Generic(GenericKind),
}

lazy_static! {
    static ref BUILTINS: FxHashMap<&'static str, Builtin> = {
        let mut map = FxHashMap::default();
        map.insert(ANY_MNEMONIC, Builtin::Any);
        for p in Primitive::ALL {
            map.insert(p.mnemonic(), Builtin::Primitive(p));
        }
        for g in GenericKind::ALL {
            map.insert(g.mnemonic(), Builtin::Generic(g));
        }
        map
    };
}

/// Returns true if `name` is a built-in mnemonic and cannot be registered.
pub fn is_reserved(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

/// Returns true if `name` is a well-formed identifier.
pub fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(is_ident_char)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Formats a type as its stable name.
pub fn format_type(ty: &TypeRef) -> String {
    let mut out = String::new();
    write_type(&mut out, ty);
    out
}

fn write_type(out: &mut String, ty: &TypeRef) {
    match ty {
        TypeRef::Any => out.push_str(ANY_MNEMONIC),
        TypeRef::Primitive(p) => out.push_str(p.mnemonic()),
        TypeRef::Named(name) => out.push_str(name),
        TypeRef::Nullable(inner) => {
            write_type(out, inner);
            out.push('?');
        }
        TypeRef::Array { element, rank } => {
            write_type(out, element);
            out.push('[');
            for _ in 1..*rank {
                out.push(',');
            }
            out.push(']');
        }
        TypeRef::Generic { kind, args } => {
            out.push_str(kind.mnemonic());
            out.push('<');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_type(out, arg);
            }
            out.push('>');
        }
    }
}

/// Rejects a type node that has no stable name: a nullable of a nullable,
/// an array rank outside `1..=MAX_ARRAY_RANK`, or a generic with the wrong
/// number of arguments. Only `ty` itself is checked, not its children.
pub(crate) fn check_node(ty: &TypeRef) -> Result<(), TypeNameError> {
    let reason = match ty {
        TypeRef::Nullable(inner) if matches!(**inner, TypeRef::Nullable(_)) => {
            Some("nullable of nullable")
        }
        TypeRef::Array { rank: 0, .. } => Some("array rank must be at least 1"),
        TypeRef::Array { rank, .. } if *rank > MAX_ARRAY_RANK => Some("array rank too large"),
        TypeRef::Generic { kind, args } => {
            let arity_ok = match kind.arity() {
                Some(n) => args.len() == n,
                None => args.len() <= MAX_TUPLE_ARITY,
            };
            (!arity_ok).then_some("wrong number of generic arguments")
        }
        _ => None,
    };
    match reason {
        Some(reason) => Err(error(&format_type(ty), 0, reason)),
        None => Ok(()),
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_type(self))
    }
}

/// Parses a stable name back into a type.
///
/// Named components are returned as written; checking that they are
/// registered is the registry's job.
pub fn parse_type(name: &str) -> Result<TypeRef, TypeNameError> {
    if name.len() > MAX_TYPE_NAME_LEN {
        return Err(error(name, 0, "name exceeds maximum length"));
    }
    let mut parser = Parser {
        src: name,
        pos: 0,
        depth: 0,
    };
    let ty = parser.parse_type()?;
    if parser.pos != name.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(ty)
}

fn error(name: &str, offset: usize, reason: &'static str) -> TypeNameError {
    TypeNameError {
        name: name.to_string(),
        offset,
        reason,
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &'static str) -> TypeNameError {
        error(self.src, self.pos, reason)
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<&'a str, TypeNameError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_ident_char(b as char) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let ident = &self.src[start..self.pos];
        if !is_valid_ident(ident) {
            return Err(error(self.src, start, "expected identifier"));
        }
        Ok(ident)
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeNameError> {
        self.depth += 1;
        if self.depth > MAX_TYPE_NAME_DEPTH {
            return Err(self.error("generic nesting too deep"));
        }
        let start = self.pos;
        let ident = self.ident()?;
        let args = if self.eat(b'<') {
            let mut args = vec![self.parse_type()?];
            while self.eat(b',') {
                args.push(self.parse_type()?);
            }
            if !self.eat(b'>') {
                return Err(self.error("expected '>'"));
            }
            Some(args)
        } else {
            None
        };

        let mut ty = match (BUILTINS.get(ident).copied(), args) {
            (Some(Builtin::Generic(kind)), Some(args)) => {
                let arity_ok = match kind.arity() {
                    Some(n) => args.len() == n,
                    None => args.len() <= MAX_TUPLE_ARITY,
                };
                if !arity_ok {
                    return Err(error(self.src, start, "wrong number of generic arguments"));
                }
                TypeRef::Generic { kind, args }
            }
            (Some(Builtin::Generic(_)), None) => {
                return Err(error(self.src, start, "open generic requires arguments"));
            }
            (_, Some(_)) => {
                return Err(error(self.src, start, "type does not take generic arguments"));
            }
            (Some(Builtin::Any), None) => TypeRef::Any,
            (Some(Builtin::Primitive(p)), None) => TypeRef::Primitive(p),
            (None, None) => TypeRef::Named(TypeName::from(ident)),
        };

        loop {
            if self.eat(b'[') {
                let mut rank: u8 = 1;
                while self.eat(b',') {
                    rank = rank.saturating_add(1);
                }
                if !self.eat(b']') {
                    return Err(self.error("expected ']'"));
                }
                if rank > MAX_ARRAY_RANK {
                    return Err(self.error("array rank too large"));
                }
                ty = TypeRef::array_of_rank(ty, rank);
            } else if self.eat(b'?') {
                if matches!(ty, TypeRef::Nullable(_)) {
                    return Err(self.error("nullable of nullable"));
                }
                ty = TypeRef::Nullable(Box::new(ty));
            } else {
                break;
            }
        }
        self.depth -= 1;
        Ok(ty)
    }
}
