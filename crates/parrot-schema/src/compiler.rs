//! The schema compiler: schema text → descriptors.
//!
//! The accepted language is a small proto2 subset:
//!
//! ```text
//! enum TypingType {
//!   TYPING_TYPE_STARTED = 1;
//!   TYPING_TYPE_PAUSED = 2;
//! }
//!
//! message SetTypingNotification {
//!   optional ConversationId conversation_id = 1;
//!   optional TypingType type = 4;
//! }
//! ```
//!
//! Comments are stripped first. Blocks are found by scanning for the
//! `enum` / `message` keywords and matching braces, so anything between
//! blocks (`syntax`, `package`, `import` lines) is skipped. Every block is
//! parsed on its own: a bad block lands in [`CompileOutput::errors`] and
//! scanning carries on with the next one.

use std::collections::HashSet;

use crate::{
    EnumDescriptor, FieldDescriptor, FieldLabel, FieldType, MessageDescriptor,
    SchemaError,
};

/// Everything the compiler produced for one schema file.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Enums in source order.
    pub enums: Vec<EnumDescriptor>,
    /// Messages in source order.
    pub messages: Vec<MessageDescriptor>,
    /// One entry per block that failed to parse.
    pub errors: Vec<SchemaError>,
}

impl CompileOutput {
    /// `true` if every block compiled.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compiles schema text into descriptors.
pub fn compile(source: &str) -> CompileOutput {
    let text = strip_comments(source);
    let bytes = text.as_bytes();
    let mut out = CompileOutput::default();
    let mut pos = 0;

    while pos < bytes.len() {
        if !is_ident_start(bytes[pos]) {
            pos += 1;
            continue;
        }

        let word_start = pos;
        while pos < bytes.len() && is_ident_char(bytes[pos]) {
            pos += 1;
        }
        let keyword = &text[word_start..pos];
        if keyword != "message" && keyword != "enum" {
            continue;
        }

        let Some(open_rel) = text[pos..].find('{') else {
            report(
                &mut out,
                SchemaError::Parse {
                    block: text[pos..].trim().to_string(),
                    reason: format!("`{keyword}` without a body"),
                },
            );
            break;
        };
        let open = pos + open_rel;
        let header = text[pos..open].trim();

        if !is_identifier(header) {
            report(
                &mut out,
                SchemaError::Parse {
                    block: header.to_string(),
                    reason: format!("invalid {keyword} name"),
                },
            );
            // A header that runs into another keyword has no body of its
            // own; the brace belongs to the next block.
            let runs_into_block = header
                .split_whitespace()
                .any(|word| word == "message" || word == "enum");
            if let Some(close) = matching_brace(bytes, open).filter(|_| !runs_into_block) {
                pos = close + 1;
            }
            continue;
        }

        let Some(close) = matching_brace(bytes, open) else {
            report(
                &mut out,
                SchemaError::Parse {
                    block: header.to_string(),
                    reason: "unbalanced braces".into(),
                },
            );
            break;
        };

        let body = &text[open + 1..close];
        let parsed = if keyword == "message" {
            parse_message(header, body).map(|m| out.messages.push(m))
        } else {
            parse_enum(header, body).map(|e| out.enums.push(e))
        };
        if let Err(e) = parsed {
            report(&mut out, e);
        }

        pos = close + 1;
    }

    tracing::debug!(
        enums = out.enums.len(),
        messages = out.messages.len(),
        errors = out.errors.len(),
        "schema compiled"
    );
    out
}

fn report(out: &mut CompileOutput, err: SchemaError) {
    tracing::warn!(error = %err, "skipping schema block");
    out.errors.push(err);
}

/// Removes `/* ... */` and `// ...` comments. Line comments keep their
/// newline so statements on the next line stay separated.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '/' {
            match chars.peek() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }

    out
}

// ---------------------------------------------------------------------------
// Block parsers
// ---------------------------------------------------------------------------

fn parse_message(name: &str, body: &str) -> Result<MessageDescriptor, SchemaError> {
    let fail = |reason: String| SchemaError::Parse {
        block: name.to_string(),
        reason,
    };

    let mut fields = Vec::new();
    let mut ids = HashSet::new();
    let mut names: HashSet<String> = HashSet::new();

    for statement in statements(body) {
        if statement.contains('{') || statement.contains('}') {
            return Err(fail(format!("nested blocks are not supported: `{statement}`")));
        }

        // `[default = 0]` and friends carry nothing we use.
        let statement = match statement.find('[') {
            Some(idx) => &statement[..idx],
            None => statement,
        };
        let spaced = statement.replace('=', " ");
        let tokens: Vec<&str> = spaced.split_whitespace().collect();
        let [label, ty, field_name, id] = tokens[..] else {
            return Err(fail(format!("expected `label type name = id`, got `{statement}`")));
        };

        let label = FieldLabel::parse(label)
            .ok_or_else(|| fail(format!("unknown label `{label}`")))?;
        if !is_identifier(ty) {
            return Err(fail(format!("invalid type `{ty}`")));
        }
        if !is_identifier(field_name) {
            return Err(fail(format!("invalid field name `{field_name}`")));
        }
        let id: u32 = id
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| fail(format!("invalid field id `{id}`")))?;

        if !ids.insert(id) {
            return Err(fail(format!("duplicate field id {id}")));
        }
        if !names.insert(field_name.to_string()) {
            return Err(fail(format!("duplicate field name `{field_name}`")));
        }

        fields.push(FieldDescriptor {
            id,
            name: field_name.to_string(),
            field_type: FieldType::parse(ty),
            label,
        });
    }

    Ok(MessageDescriptor::new(name, fields))
}

fn parse_enum(name: &str, body: &str) -> Result<EnumDescriptor, SchemaError> {
    let fail = |reason: String| SchemaError::Parse {
        block: name.to_string(),
        reason,
    };

    let mut values = Vec::new();
    let mut symbols: HashSet<String> = HashSet::new();

    for statement in statements(body) {
        let spaced = statement.replace('=', " ");
        let tokens: Vec<&str> = spaced.split_whitespace().collect();
        let [symbol, number] = tokens[..] else {
            return Err(fail(format!("expected `NAME = N`, got `{statement}`")));
        };
        if !is_identifier(symbol) {
            return Err(fail(format!("invalid enum value name `{symbol}`")));
        }
        let number: i32 = number
            .parse()
            .map_err(|_| fail(format!("invalid enum value `{number}`")))?;
        if !symbols.insert(symbol.to_string()) {
            return Err(fail(format!("duplicate enum value `{symbol}`")));
        }
        values.push((number, symbol.to_string()));
    }

    Ok(EnumDescriptor::new(name, values))
}

/// Splits a block body on `;`, dropping empty statements.
fn statements(body: &str) -> impl Iterator<Item = &str> {
    body.split(';').map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_identifier(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && is_ident_start(bytes[0])
        && bytes.iter().all(|b| is_ident_char(*b))
}

/// Index of the `}` closing the `{` at `open`, if any.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_removes_line_and_block_comments() {
        let src = "a // gone\nb /* also\ngone */ c";
        let stripped = strip_comments(src);
        assert!(!stripped.contains("gone"));
        assert!(stripped.contains('a'));
        assert!(stripped.contains('b'));
        assert!(stripped.contains('c'));
    }

    #[test]
    fn test_strip_comments_block_comments_are_not_greedy() {
        let src = "/* one */ message A { optional string x = 1; } /* two */";
        let out = compile(src);
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn test_compile_message_fields() {
        let out = compile(
            "message Entity {\n  optional ParticipantId id = 9;\n  repeated string email = 5;\n  required int32 kind = 1;\n}",
        );
        assert!(out.is_clean(), "{:?}", out.errors);
        let msg = &out.messages[0];
        assert_eq!(msg.name, "Entity");
        let ids: Vec<u32> = msg.fields.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 5, 9]);
        assert_eq!(msg.field(9).unwrap().field_type, FieldType::Message("ParticipantId".into()));
        assert_eq!(msg.field(5).unwrap().label, FieldLabel::Repeated);
        assert_eq!(msg.field(1).unwrap().label, FieldLabel::Required);
    }

    #[test]
    fn test_compile_accepts_compact_assignment_and_options() {
        let out = compile("message A { optional int32 x=1 [default = 3]; }");
        assert!(out.is_clean(), "{:?}", out.errors);
        assert_eq!(out.messages[0].fields[0].name, "x");
    }

    #[test]
    fn test_compile_enum_sorted_by_number() {
        let out = compile("enum FocusType { FOCUS_TYPE_UNFOCUSED = 2; FOCUS_TYPE_FOCUSED = 1; }");
        assert!(out.is_clean());
        assert_eq!(
            out.enums[0].values,
            vec![(1, "FOCUS_TYPE_FOCUSED".to_string()), (2, "FOCUS_TYPE_UNFOCUSED".to_string())]
        );
    }

    #[test]
    fn test_compile_bad_block_does_not_abort_file() {
        let src = "message Good1 { optional string a = 1; }\n\
                   message Bad { optional string b = zero; }\n\
                   enum AlsoBad { X = ; }\n\
                   message Good2 { repeated Good1 items = 1; }";
        let out = compile(src);
        let names: Vec<&str> = out.messages.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Good1", "Good2"]);
        assert_eq!(out.errors.len(), 2);
        assert!(matches!(&out.errors[0], SchemaError::Parse { block, .. } if block == "Bad"));
    }

    #[test]
    fn test_compile_rejects_duplicate_ids() {
        let out = compile("message Dup { optional string a = 1; optional string b = 1; }");
        assert!(out.messages.is_empty());
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_compile_rejects_unknown_label_and_nested_blocks() {
        let out = compile(
            "message M { map<string, int32> m = 1; }\n\
             message N { message Inner { optional int32 x = 1; } }\n\
             message Ok { optional bool flag = 1; }",
        );
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].name, "Ok");
        assert_eq!(out.errors.len(), 2);
    }

    #[test]
    fn test_compile_skips_preamble_lines() {
        let out = compile("syntax = \"proto2\";\npackage chat;\nmessage A { optional string a = 1; }");
        assert!(out.is_clean());
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn test_compile_invalid_name_keeps_scanning() {
        let out = compile("message 9lives { optional string a = 1; }\nmessage B { optional string b = 1; }");
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].name, "B");
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_compile_invalid_name_skips_its_body() {
        let out = compile(
            "message 9lives { optional string message = 1; optional Foo enum = 2; }\n\
             message B { optional string b = 1; }",
        );
        assert_eq!(out.errors.len(), 1, "{:?}", out.errors);
        assert!(matches!(&out.errors[0], SchemaError::Parse { block, .. } if block == "9lives"));
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].name, "B");
    }

    #[test]
    fn test_compile_nameless_block_keeps_next_block() {
        let out = compile("message\nmessage B { optional string b = 1; }");
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].name, "B");
    }

    #[test]
    fn test_compile_unbalanced_braces_reports_error() {
        let out = compile("message A { optional string a = 1;");
        assert!(out.messages.is_empty());
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_compile_field_named_like_keyword_is_not_a_block() {
        let out = compile("message Wrapper { optional string message = 1; optional int32 enum_value = 2; }");
        assert!(out.is_clean(), "{:?}", out.errors);
        assert_eq!(out.messages[0].fields.len(), 2);
    }
}
