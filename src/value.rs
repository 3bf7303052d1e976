/*
 * Created on Mon Jul 27 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # The value model
//!
//! A [`Value`] is a typed, named node that may carry ordered children when
//! its kind is [`ValueKind::Container`]. This module owns the type tag
//! registry, the whitespace-escape scheme applied to the wire payload, and
//! the plain owned tree that callers build before handing it to a
//! [`crate::container::Container`].

use std::borrow::Cow;

/// The 16 type tags carried on the wire. Each has a single-character tag
/// used in the `[name,kind,payload];` grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ValueKind {
    Null,
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bytes,
    Container,
    String,
}

impl ValueKind {
    /// Decode a single-character wire tag. Unknown tags fall back to
    /// `Null`, mirroring the source's `ValueType.from_string`.
    pub fn from_tag(tag: char) -> Self {
        match tag {
            '0' => Self::Null,
            '1' => Self::Bool,
            '2' => Self::Char,
            '3' => Self::Int8,
            '4' => Self::UInt8,
            '5' => Self::Int16,
            '6' => Self::UInt16,
            '7' => Self::Int32,
            '8' => Self::UInt32,
            '9' => Self::Int64,
            'a' => Self::UInt64,
            'b' => Self::Float,
            'c' => Self::Double,
            'd' => Self::Bytes,
            'e' => Self::Container,
            'f' => Self::String,
            _ => Self::Null,
        }
    }
    /// The single-character wire tag for this kind.
    pub const fn tag(self) -> char {
        match self {
            Self::Null => '0',
            Self::Bool => '1',
            Self::Char => '2',
            Self::Int8 => '3',
            Self::UInt8 => '4',
            Self::Int16 => '5',
            Self::UInt16 => '6',
            Self::Int32 => '7',
            Self::UInt32 => '8',
            Self::Int64 => '9',
            Self::UInt64 => 'a',
            Self::Float => 'b',
            Self::Double => 'c',
            Self::Bytes => 'd',
            Self::Container => 'e',
            Self::String => 'f',
        }
    }
    /// `CHAR..DOUBLE` are numeric: `get_value` parses them as an integer
    /// or float rather than returning the raw text.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
        )
    }
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Container)
    }
    /// `FLOAT`/`DOUBLE` parse through `f64::from_str`; every other numeric
    /// kind parses through `i64`/`u64`.
    const fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// Escape the four whitespace/control bytes that would otherwise collide
/// with the `[ , , ];` delimiter grammar.
pub fn escape(raw: &str) -> String {
    if !raw.contains(['\r', '\n', ' ', '\t']) {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\r' => out.push_str("</0x0A;>"),
            '\n' => out.push_str("</0x0B;>"),
            ' ' => out.push_str("</0x0C;>"),
            '\t' => out.push_str("</0x0D;>"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`]. Order matters: none of the four sentinels are
/// prefixes of one another, so a single left-to-right pass is safe.
pub fn unescape(encoded: &str) -> Cow<'_, str> {
    if !encoded.contains("</0x0") {
        return Cow::Borrowed(encoded);
    }
    let out = encoded
        .replace("</0x0A;>", "\r")
        .replace("</0x0B;>", "\n")
        .replace("</0x0C;>", " ")
        .replace("</0x0D;>", "\t");
    Cow::Owned(out)
}

/// The result of a typed read through [`Value::get_value`] or
/// `Container::get_value`: the `raw` payload converted per its
/// [`ValueKind`], or the caller-supplied default on parse failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

/// Convert `raw` according to `kind`, the rule used uniformly by
/// [`Value::get_value`] and `ValueHandle::get_value`.
pub(crate) fn convert(kind: ValueKind, raw: &str) -> Option<ScalarValue> {
    match kind {
        ValueKind::Null => Some(ScalarValue::Null),
        ValueKind::Bool => Some(ScalarValue::Bool(raw.eq_ignore_ascii_case("true"))),
        k if k.is_numeric() => {
            if k.is_floating() {
                raw.parse::<f64>().ok().map(ScalarValue::Float)
            } else if matches!(k, ValueKind::UInt8 | ValueKind::UInt16 | ValueKind::UInt32 | ValueKind::UInt64) {
                raw.parse::<u64>().ok().map(ScalarValue::UInt)
            } else {
                raw.parse::<i64>().ok().map(ScalarValue::Int)
            }
        }
        _ => Some(ScalarValue::Text(raw.to_string())),
    }
}

/// A named, typed, pre-insertion tree node. Build these explicitly and
/// hand them to [`crate::container::Container::append`]; once inserted,
/// traversal happens through `ValueHandle`, not through this type, since a
/// handle can express the parent back-reference that an owned tree cannot
/// without reference counting.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub(crate) name: String,
    pub(crate) kind: ValueKind,
    pub(crate) raw: String,
    pub(crate) children: Vec<Value>,
}

impl Value {
    /// Create a leaf value. `name` should match `\w+`; this is not
    /// enforced here (callers that parse untrusted names are expected to
    /// validate separately), matching the source's lack of a name
    /// validator on direct construction.
    pub fn new(name: impl Into<String>, kind: ValueKind, raw: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            raw: raw.into(),
            children: Vec::new(),
        }
    }
    /// Create an (initially empty) `CONTAINER` value. Its `raw` child
    /// count is recomputed at serialization time, so any value given here
    /// is cosmetic for a freshly-built tree.
    pub fn container(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Container, "0")
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
    pub fn raw(&self) -> &str {
        &self.raw
    }
    pub fn children(&self) -> &[Value] {
        &self.children
    }
    /// Append a child. Parent tracking for an owned pre-insertion tree is
    /// implicit in ownership; the back-reference is materialized only
    /// once the tree is flattened into a `Container`'s arena.
    pub fn append(&mut self, child: Value) {
        self.children.push(child);
    }
    /// Remove all direct children with the given name.
    pub fn remove(&mut self, name: &str) {
        self.children.retain(|c| c.name != name);
    }
    /// Direct children with the given name.
    pub fn get(&self, name: &str) -> Vec<&Value> {
        self.children.iter().filter(|c| c.name == name).collect()
    }
    pub fn get_value(&self) -> Option<ScalarValue> {
        convert(self.kind, &self.raw)
    }
    /// `[name,kind,encoded_raw];` followed by each child's serialization,
    /// in insertion order. For a `CONTAINER` value, `raw` is **not**
    /// trusted here — the emitted count is always the live child count,
    /// matching spec invariant 2.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.serialize_into(&mut out);
        out
    }
    pub(crate) fn serialize_into(&self, out: &mut String) {
        let raw = if self.kind.is_container() {
            Cow::Owned(self.children.len().to_string())
        } else {
            Cow::Owned(escape(&self.raw))
        };
        out.push('[');
        out.push_str(&self.name);
        out.push(',');
        out.push(self.kind.tag());
        out.push(',');
        out.push_str(&raw);
        out.push_str("];");
        for child in &self.children {
            child.serialize_into(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trip() {
        for s in ["plain", "a b\tc\r\nd", " \t\r\n", ""] {
            assert_eq!(unescape(&escape(s)), s);
        }
    }

    #[test]
    fn escape_sentinels_survive_delimiter_grammar() {
        let s = "contains ] and , and ;";
        let encoded = escape(s);
        assert!(!encoded.contains(' '));
        assert_eq!(unescape(&encoded), s);
    }

    #[test]
    fn bool_parse_never_fails() {
        assert_eq!(
            convert(ValueKind::Bool, "TrUe"),
            Some(ScalarValue::Bool(true))
        );
        assert_eq!(
            convert(ValueKind::Bool, "nope"),
            Some(ScalarValue::Bool(false))
        );
    }

    #[test]
    fn numeric_parse_failure_is_none() {
        assert_eq!(convert(ValueKind::Int32, "not a number"), None);
        assert_eq!(convert(ValueKind::Double, "3.14").unwrap(), ScalarValue::Float(3.14));
    }

    #[test]
    fn serialize_emits_live_child_count_not_stale_raw() {
        let mut root = Value::new("profile", ValueKind::Container, "999");
        root.append(Value::new("name", ValueKind::String, "Alice"));
        root.append(Value::new("email", ValueKind::String, "a@x"));
        let s = root.serialize();
        assert!(s.starts_with("[profile,e,2];"));
    }
}
