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

//! # Container
//!
//! A [`Container`] carries a six-slot header and an ordered forest of
//! [`crate::value::Value`]s. The forest is stored in an arena addressed by
//! [`NodeId`] handles rather than as an owned recursive tree, so that a
//! [`ValueHandle`] can expose the parent back-reference spec.md calls for
//! without reaching for `Rc<RefCell<_>>` cycles.

use crate::value::{self, ScalarValue, Value, ValueKind};

/// An opaque handle into a [`Container`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: ValueKind,
    raw: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    fn alloc(&mut self, name: String, kind: ValueKind, raw: String) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name,
            kind,
            raw,
            children: Vec::new(),
            parent: None,
        });
        id
    }
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }
    /// Link `child` under `parent`, setting the back-reference. This is
    /// the only place a parent pointer is written, keeping invariant 3
    /// ("a Value has at most one parent") trivially true: a freshly
    /// allocated node starts parentless and is linked at most once.
    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
    }
}

/// A borrowed, `Copy` view into a [`Container`]'s value forest at a given
/// node. This is the public traversal type returned by
/// [`Container::get`]/[`Container::roots`]; it is what exposes the parent
/// back-reference that an owned [`Value`] tree cannot.
#[derive(Clone, Copy)]
pub struct ValueHandle<'a> {
    container: &'a Container,
    id: NodeId,
}

impl<'a> ValueHandle<'a> {
    pub fn name(&self) -> &'a str {
        &self.container.arena.node(self.id).name
    }
    pub fn kind(&self) -> ValueKind {
        self.container.arena.node(self.id).kind
    }
    pub fn raw(&self) -> &'a str {
        &self.container.arena.node(self.id).raw
    }
    pub fn children(&self) -> Vec<ValueHandle<'a>> {
        self.container
            .arena
            .node(self.id)
            .children
            .iter()
            .map(|&id| ValueHandle {
                container: self.container,
                id,
            })
            .collect()
    }
    /// Direct children with the given name.
    pub fn get(&self, name: &str) -> Vec<ValueHandle<'a>> {
        self.children().into_iter().filter(|c| c.name() == name).collect()
    }
    pub fn parent(&self) -> Option<ValueHandle<'a>> {
        self.container
            .arena
            .node(self.id)
            .parent
            .map(|id| ValueHandle {
                container: self.container,
                id,
            })
    }
    /// Convert `raw` per `kind`; `None` on parse failure.
    pub fn get_value(&self) -> Option<ScalarValue> {
        value::convert(self.kind(), self.raw())
    }
}

const HEADER_VERSION_DEFAULT: &str = "1.0.0.0";

fn header_index(key: char) -> Option<usize> {
    match key {
        '1'..='6' => Some(key as usize - '1' as usize),
        _ => None,
    }
}

/// A message: a six-slot header plus an ordered value forest.
///
/// Data parsing is lazy: [`Container::parse`] only captures the raw
/// `@data={...};` span; the forest is built on first read (`get`,
/// `get_value`, `roots`, `serialize`). A container built with
/// [`Container::new`]/[`Container::create`]/[`Container::append`] has an
/// authoritative forest from the start.
#[derive(Debug, Clone)]
pub struct Container {
    headers: [String; 6],
    arena: Arena,
    roots: Vec<NodeId>,
    data_string: Option<String>,
    /// `true` once `arena`/`roots` are authoritative (either because the
    /// data block has been parsed, or because the caller built the forest
    /// directly). `serialize` regenerates `data_string` from the forest
    /// exactly when this is `true`, then clears it, mirroring the
    /// source's `_deserialized` cache-invalidation flag.
    deserialized: bool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// An empty container with default headers (`version = "1.0.0.0"`,
    /// everything else blank) and no values.
    pub fn new() -> Self {
        Self {
            headers: [
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                HEADER_VERSION_DEFAULT.to_string(),
            ],
            arena: Arena::default(),
            roots: Vec::new(),
            data_string: None,
            deserialized: true,
        }
    }

    pub fn create(
        target_id: impl Into<String>,
        target_sub_id: impl Into<String>,
        source_id: impl Into<String>,
        source_sub_id: impl Into<String>,
        message_type: impl Into<String>,
        values: Vec<Value>,
    ) -> Self {
        let mut c = Self::new();
        c.headers[0] = target_id.into();
        c.headers[1] = target_sub_id.into();
        c.headers[2] = source_id.into();
        c.headers[3] = source_sub_id.into();
        c.headers[4] = message_type.into();
        for v in values {
            c.append(v);
        }
        c
    }

    /// Parse a serialized message. Missing `@header=`/`@data=` blocks are
    /// treated as empty rather than as an error, per spec.md's failure
    /// semantics.
    pub fn parse(message: &str) -> Self {
        let cleaned: String = message.chars().filter(|&c| c != '\r' && c != '\n').collect();
        let mut headers = [
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            HEADER_VERSION_DEFAULT.to_string(),
        ];
        if let Some(span) = extract_block(&cleaned, "@header={") {
            parse_header_entries(span, &mut headers);
        }
        let data_string = extract_block(&cleaned, "@data={").map(|s| s.to_string());
        let deserialized = data_string.is_none();
        Self {
            headers,
            arena: Arena::default(),
            roots: Vec::new(),
            data_string,
            deserialized,
        }
    }

    fn ensure_parsed(&mut self) {
        if self.deserialized {
            return;
        }
        let data_string = self.data_string.take().unwrap_or_default();
        let entries = scan_data_entries(&data_string);
        let (arena, roots) = build_tree(entries);
        self.arena = arena;
        self.roots = roots;
        self.deserialized = true;
    }

    /// Append a top-level value. A `NULL`-kind value is dropped silently,
    /// matching the source's `Container.append`.
    pub fn append(&mut self, value: Value) {
        if matches!(value.kind(), ValueKind::Null) {
            return;
        }
        self.ensure_parsed();
        let id = flatten(&mut self.arena, value, None);
        self.roots.push(id);
        self.deserialized = true;
    }

    /// All top-level values with the given name.
    pub fn get(&mut self, name: &str) -> Vec<ValueHandle<'_>> {
        self.ensure_parsed();
        let ids: Vec<NodeId> = self.roots.clone();
        ids.into_iter()
            .filter(|&id| self.arena.node(id).name == name)
            .map(|id| ValueHandle { container: self, id })
            .collect()
    }

    /// Every top-level value, in insertion order.
    pub fn roots(&mut self) -> Vec<ValueHandle<'_>> {
        self.ensure_parsed();
        self.roots
            .iter()
            .map(|&id| ValueHandle { container: self, id })
            .collect()
    }

    /// Typed read: the first top-level value named `name`, converted per
    /// its kind; `default` on a miss or a parse failure.
    pub fn get_value(&mut self, name: &str, default: ScalarValue) -> ScalarValue {
        let matches = self.get(name);
        match matches.first() {
            Some(h) if h.kind() != ValueKind::Null => h.get_value().unwrap_or(default),
            _ => default,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.headers[0]
    }
    pub fn set_target_id(&mut self, v: impl Into<String>) {
        self.headers[0] = v.into();
    }
    pub fn target_sub_id(&self) -> &str {
        &self.headers[1]
    }
    pub fn set_target_sub_id(&mut self, v: impl Into<String>) {
        self.headers[1] = v.into();
    }
    pub fn source_id(&self) -> &str {
        &self.headers[2]
    }
    pub fn set_source_id(&mut self, v: impl Into<String>) {
        self.headers[2] = v.into();
    }
    pub fn source_sub_id(&self) -> &str {
        &self.headers[3]
    }
    pub fn set_source_sub_id(&mut self, v: impl Into<String>) {
        self.headers[3] = v.into();
    }
    pub fn message_type(&self) -> &str {
        &self.headers[4]
    }
    pub fn set_message_type(&mut self, v: impl Into<String>) {
        self.headers[4] = v.into();
    }
    pub fn version(&self) -> &str {
        &self.headers[5]
    }

    fn serialize_headers(&self) -> String {
        let mut out = String::new();
        for (i, value) in self.headers.iter().enumerate() {
            out.push('[');
            out.push((b'1' + i as u8) as char);
            out.push(',');
            out.push_str(value);
            out.push_str("];");
        }
        out
    }

    fn make_data_string(&self) -> String {
        let mut out = String::from("@data={");
        for &root in &self.roots {
            serialize_node(&self.arena, root, &mut out);
        }
        out.push_str("};");
        out
    }

    /// Serialize to the `@header={...};@data={...};` wire grammar. If the
    /// forest is authoritative, the data block is regenerated from it
    /// (each `CONTAINER` node's emitted count is its live child count,
    /// never a stale cached one).
    pub fn serialize(&mut self) -> String {
        if self.deserialized {
            self.data_string = Some(self.make_data_string());
            self.deserialized = false;
        }
        format!(
            "@header={{{}}};{}",
            self.serialize_headers(),
            self.data_string.as_deref().unwrap_or("")
        )
    }
}

fn serialize_node(arena: &Arena, id: NodeId, out: &mut String) {
    let node = arena.node(id);
    out.push('[');
    out.push_str(&node.name);
    out.push(',');
    out.push(node.kind.tag());
    out.push(',');
    if node.kind.is_container() {
        out.push_str(&node.children.len().to_string());
    } else {
        out.push_str(&value::escape(&node.raw));
    }
    out.push_str("];");
    for &child in &node.children {
        serialize_node(arena, child, out);
    }
}

fn flatten(arena: &mut Arena, value: Value, parent: Option<NodeId>) -> NodeId {
    let Value {
        name,
        kind,
        raw,
        children,
    } = value;
    let id = arena.alloc(name, kind, raw);
    if let Some(p) = parent {
        arena.link(p, id);
    }
    for child in children {
        flatten(arena, child, Some(id));
    }
    id
}

/// Locate the span from `prefix` (e.g. `"@header={"`) up to and including
/// the next literal `"};"`. Entries inside never contain a bare `}` (they
/// are delimited by `[`/`]`/`;`), so the first `"};"` after the prefix is
/// always the block's own closing brace.
fn extract_block<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let start = s.find(prefix)?;
    let rest = &s[start..];
    let end = rest.find("};")?;
    Some(&rest[..end + 2])
}

/// Scan `[key,value];` entries anywhere in `span`, ignoring anything that
/// doesn't match (e.g. the `@header={` prefix itself, or a malformed
/// entry) rather than aborting.
fn parse_header_entries(span: &str, headers: &mut [String; 6]) {
    let mut pos = 0;
    while let Some(rel_open) = span[pos..].find('[') {
        let open = pos + rel_open;
        let after_open = open + 1;
        let Some(rel_comma) = span[after_open..].find(',') else {
            break;
        };
        let comma = after_open + rel_comma;
        let key = &span[after_open..comma];
        let after_comma = comma + 1;
        let Some(rel_end) = span[after_comma..].find("];") else {
            break;
        };
        let end = after_comma + rel_end;
        let val = &span[after_comma..end];
        if let Some(idx) = key.chars().next().filter(|_| key.len() == 1).and_then(header_index) {
            headers[idx] = val.to_string();
        }
        pos = end + 2;
    }
}

/// Scan `[name,kind,payload];` entries. On a malformed entry (no trailing
/// comma, no closing `];`), skip past the opening bracket and keep
/// scanning rather than stopping — malformed entries are never fatal.
fn scan_data_entries(span: &str) -> Vec<(String, char, String)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(rel_open) = span[pos..].find('[') {
        let open = pos + rel_open;
        let after_open = open + 1;
        let Some(rel_c1) = span[after_open..].find(',') else {
            pos = open + 1;
            continue;
        };
        let c1 = after_open + rel_c1;
        let name = &span[after_open..c1];
        let after_c1 = c1 + 1;
        let Some(rel_c2) = span[after_c1..].find(',') else {
            pos = open + 1;
            continue;
        };
        let c2 = after_c1 + rel_c2;
        let kind_str = &span[after_c1..c2];
        let after_c2 = c2 + 1;
        let Some(rel_end) = span[after_c2..].find("];") else {
            pos = open + 1;
            continue;
        };
        let end = after_c2 + rel_end;
        let raw = &span[after_c2..end];
        if !name.is_empty() {
            let kind_char = kind_str.chars().next().unwrap_or('0');
            out.push((name.to_string(), kind_char, value::unescape(raw).into_owned()));
        }
        pos = end + 2;
    }
    out
}

/// Re-nest a flat, in-order entry stream into an arena + top-level root
/// list, per spec.md §4.2: a single open-container cursor, descending
/// whenever a `CONTAINER` entry is appended, and — after *every* append —
/// cascading the ascend as many levels as are simultaneously satisfied.
fn build_tree(entries: Vec<(String, char, String)>) -> (Arena, Vec<NodeId>) {
    let mut arena = Arena::default();
    let mut roots = Vec::new();
    let mut cursor: Option<NodeId> = None;
    for (name, tag, raw) in entries {
        let kind = ValueKind::from_tag(tag);
        if matches!(kind, ValueKind::Null) {
            // NULL entries never materialize as nodes, matching the
            // source's parse-time skip.
            continue;
        }
        let id = arena.alloc(name, kind, raw);
        match cursor {
            None => {
                roots.push(id);
                if kind.is_container() {
                    cursor = Some(id);
                }
            }
            Some(cur) => {
                arena.link(cur, id);
                if kind.is_container() {
                    cursor = Some(id);
                }
            }
        }
        // cascade: keep ascending while the current cursor's declared
        // child count equals its actual count
        while let Some(c) = cursor {
            let node = arena.node(c);
            let expected = node.raw.trim().parse::<usize>().ok();
            if expected == Some(node.children.len()) {
                cursor = node.parent;
            } else {
                break;
            }
        }
    }
    (arena, roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn header_round_trip() {
        let mut c = Container::create("cli", "1", "srv", "", "request_connection", vec![]);
        let wire = c.serialize();
        let mut parsed = Container::parse(&wire);
        assert_eq!(parsed.target_id(), "cli");
        assert_eq!(parsed.target_sub_id(), "1");
        assert_eq!(parsed.source_id(), "srv");
        assert_eq!(parsed.message_type(), "request_connection");
        assert_eq!(parsed.version(), "1.0.0.0");
    }

    #[test]
    fn nested_tree_round_trip() {
        let mut settings = Value::container("settings");
        settings.append(Value::new("theme", ValueKind::String, "dark"));
        settings.append(Value::new("notifications", ValueKind::Bool, "true"));
        let mut profile = Value::container("profile");
        profile.append(Value::new("name", ValueKind::String, "Alice"));
        profile.append(Value::new("email", ValueKind::String, "a@x"));
        profile.append(settings);

        let mut c = Container::create("t", "", "s", "", "m", vec![profile]);
        let wire = c.serialize();

        let mut parsed = Container::parse(&wire);
        let profiles = parsed.get("profile");
        assert_eq!(profiles.len(), 1);
        let children = profiles[0].children();
        assert_eq!(children.len(), 3);
        let settings = profiles[0].get("settings");
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].children().len(), 2);
        let theme = settings[0].get("theme");
        assert_eq!(theme[0].raw(), "dark");
    }

    #[test]
    fn unknown_header_keys_are_ignored() {
        let msg = "@header={[1,a];[9,bogus];[6,2.0.0.0];};@data={};";
        let parsed = Container::parse(msg);
        assert_eq!(parsed.target_id(), "a");
        assert_eq!(parsed.version(), "2.0.0.0");
    }

    #[test]
    fn missing_blocks_parse_as_empty() {
        let mut parsed = Container::parse("garbage with no blocks at all");
        assert_eq!(parsed.target_id(), "");
        assert!(parsed.get("anything").is_empty());
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        // the first bracket is missing its closing "];" -- it must be
        // skipped, and the well-formed entry after it must still parse
        let msg = "@header={};@data={[broken,f,no end here [ok,f,value];};";
        let mut parsed = Container::parse(msg);
        let ok = parsed.get("ok");
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].raw(), "value");
    }

    #[test]
    fn container_value_count_normalizes_on_serialize() {
        // a CONTAINER value built with a deliberately wrong initial raw
        // count must still serialize with the live count
        let mut c = Container::new();
        let mut root = Value::new("box", ValueKind::Container, "999");
        root.append(Value::new("a", ValueKind::String, "1"));
        root.append(Value::new("b", ValueKind::String, "2"));
        c.append(root);
        let wire = c.serialize();
        assert!(wire.contains("[box,e,2];"));
    }

    #[test]
    fn escape_survives_embedded_delimiters_in_round_trip() {
        let mut c = Container::create(
            "t",
            "",
            "s",
            "",
            "m",
            vec![Value::new("msg", ValueKind::String, "a b\tc\r\nd")],
        );
        let wire = c.serialize();
        let mut parsed = Container::parse(&wire);
        let v = parsed.get("msg");
        assert_eq!(v[0].raw(), "a b\tc\r\nd");
    }

    #[test]
    fn get_value_typed_conversions() {
        let mut c = Container::create(
            "t",
            "",
            "s",
            "",
            "m",
            vec![
                Value::new("n", ValueKind::Int32, "42"),
                Value::new("f", ValueKind::Double, "2.5"),
                Value::new("b", ValueKind::Bool, "true"),
            ],
        );
        assert_eq!(c.get_value("n", ScalarValue::Null), ScalarValue::Int(42));
        assert_eq!(c.get_value("f", ScalarValue::Null), ScalarValue::Float(2.5));
        assert_eq!(c.get_value("b", ScalarValue::Null), ScalarValue::Bool(true));
        assert_eq!(
            c.get_value("missing", ScalarValue::Text("d".into())),
            ScalarValue::Text("d".into())
        );
    }
}
