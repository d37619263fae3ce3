//! Owned schema model and schema text parser
//!
//! Schema text is a sequence of message blocks with an optional syntax line:
//!
//! ```text
//! syntax = "proto3";
//!
//! // Header written once per file
//! message PlaybackHeader {
//!     int32 magic = 1;
//!     float testfloat = 2;
//!     double testdouble = 3;
//! }
//! ```
//!
//! Field types are `int32`, `float`, `double`, `bytes`, `string`, or the name
//! of another message in the same schema. Message references may point
//! forwards but may not form a cycle.

use crate::wire::{WireType, MAX_TAG};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { line: usize, ch: char },

    #[error("line {line}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of schema, expected {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("line {line}: unsupported syntax \"{syntax}\"")]
    UnsupportedSyntax { line: usize, syntax: String },

    #[error("message '{message}' field '{field}': tag {tag} outside 1..={max}", max = MAX_TAG)]
    InvalidTag {
        message: String,
        field: String,
        tag: u64,
    },

    #[error("duplicate message '{0}'")]
    DuplicateMessage(String),

    #[error("message '{message}': tag {tag} used more than once")]
    DuplicateTag { message: String, tag: u32 },

    #[error("message '{message}': field '{field}' declared more than once")]
    DuplicateField { message: String, field: String },

    #[error("message '{message}' field '{field}': unknown type '{type_name}'")]
    UnresolvedType {
        message: String,
        field: String,
        type_name: String,
    },

    #[error("message '{0}' contains itself")]
    RecursiveMessage(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Declared type of a schema field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int32,
    Float,
    Double,
    Bytes,
    /// Same wire form as `Bytes`; dynamic decoding requires UTF-8 and keeps
    /// the value as text
    String,
    /// Reference to another message by name
    Message(String),
}

impl FieldType {
    fn from_name(name: &str) -> Self {
        match name {
            "int32" => FieldType::Int32,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "bytes" => FieldType::Bytes,
            "string" => FieldType::String,
            other => FieldType::Message(other.to_string()),
        }
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            FieldType::Int32 | FieldType::Float => WireType::Fixed32,
            FieldType::Double => WireType::Fixed64,
            FieldType::Bytes | FieldType::String | FieldType::Message(_) => {
                WireType::LengthDelimited
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Int32 => "int32",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Bytes => "bytes",
            FieldType::String => "string",
            FieldType::Message(name) => name,
        }
    }

    /// True when both types decode the same payload the same way
    pub fn same_encoding(&self, other: &FieldType) -> bool {
        match (self, other) {
            (
                FieldType::Bytes | FieldType::String,
                FieldType::Bytes | FieldType::String,
            ) => true,
            _ => self == other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub tag: u32,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSchema {
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<FieldSchema>,
}

impl MessageSchema {
    pub fn field(&self, tag: u32) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.tag == tag)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A validated set of message definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    messages: Vec<MessageSchema>,
}

impl Schema {
    /// Validate and wrap a list of message definitions
    pub fn new(messages: Vec<MessageSchema>) -> SchemaResult<Self> {
        validate(&messages)?;
        Ok(Self { messages })
    }

    /// Wrap messages that already satisfy every schema rule
    pub(crate) fn from_validated(messages: Vec<MessageSchema>) -> Self {
        debug_assert!(validate(&messages).is_ok());
        Self { messages }
    }

    /// Messages in declaration order
    pub fn messages(&self) -> &[MessageSchema] {
        &self.messages
    }

    pub fn message(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.iter().find(|message| message.name == name)
    }
}

/// Renders the schema back as schema text
impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "message {} {{", message.name)?;
            for field in &message.fields {
                writeln!(f, "    {} {} = {};", field.field_type, field.name, field.tag)?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

fn validate(messages: &[MessageSchema]) -> SchemaResult<()> {
    let mut by_name: HashMap<&str, &MessageSchema> = HashMap::with_capacity(messages.len());
    for message in messages {
        if by_name.insert(message.name.as_str(), message).is_some() {
            return Err(SchemaError::DuplicateMessage(message.name.clone()));
        }
    }

    for message in messages {
        let mut tags = HashSet::new();
        let mut names = HashSet::new();
        for field in &message.fields {
            if field.tag == 0 || field.tag > MAX_TAG {
                return Err(SchemaError::InvalidTag {
                    message: message.name.clone(),
                    field: field.name.clone(),
                    tag: u64::from(field.tag),
                });
            }
            if !tags.insert(field.tag) {
                return Err(SchemaError::DuplicateTag {
                    message: message.name.clone(),
                    tag: field.tag,
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    message: message.name.clone(),
                    field: field.name.clone(),
                });
            }
            if let FieldType::Message(target) = &field.field_type {
                if !by_name.contains_key(target.as_str()) {
                    return Err(SchemaError::UnresolvedType {
                        message: message.name.clone(),
                        field: field.name.clone(),
                        type_name: target.clone(),
                    });
                }
            }
        }
    }

    // Depth-first walk; reaching a message already on the path is a cycle
    let mut done: HashSet<&str> = HashSet::new();
    for message in messages {
        let mut path = Vec::new();
        check_acyclic(message, &by_name, &mut path, &mut done)?;
    }
    Ok(())
}

fn check_acyclic<'a>(
    message: &'a MessageSchema,
    by_name: &HashMap<&'a str, &'a MessageSchema>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> SchemaResult<()> {
    let name = message.name.as_str();
    if done.contains(name) {
        return Ok(());
    }
    if path.contains(&name) {
        return Err(SchemaError::RecursiveMessage(name.to_string()));
    }
    path.push(name);
    for field in &message.fields {
        if let FieldType::Message(target) = &field.field_type {
            if let Some(nested) = by_name.get(target.as_str()) {
                check_acyclic(nested, by_name, path, done)?;
            }
        }
    }
    path.pop();
    done.insert(name);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    LBrace,
    RBrace,
    Equals,
    Semicolon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::Number(s) => f.write_str(s),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Equals => f.write_str("="),
            Token::Semicolon => f.write_str(";"),
        }
    }
}

fn tokenize(text: &str) -> SchemaResult<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&ch) = chars.peek() {
        match ch {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() != Some(&'/') {
                    return Err(SchemaError::UnexpectedChar { line, ch: '/' });
                }
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '{' | '}' | '=' | ';' => {
                chars.next();
                let token = match ch {
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '=' => Token::Equals,
                    _ => Token::Semicolon,
                };
                tokens.push((token, line));
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\n') | None => {
                            return Err(SchemaError::UnexpectedEof {
                                expected: "closing quote",
                            })
                        }
                        Some(c) => value.push(c),
                    }
                }
                tokens.push((Token::Str(value), line));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if !c.is_ascii_alphanumeric() {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                tokens.push((Token::Number(digits), line));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                tokens.push((Token::Ident(ident), line));
            }
            other => return Err(SchemaError::UnexpectedChar { line, ch: other }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: std::vec::IntoIter<(Token, usize)>,
}

impl Parser {
    fn next(&mut self, expected: &'static str) -> SchemaResult<(Token, usize)> {
        self.tokens
            .next()
            .ok_or(SchemaError::UnexpectedEof { expected })
    }

    fn expect(&mut self, want: Token, expected: &'static str) -> SchemaResult<()> {
        let (token, line) = self.next(expected)?;
        if token != want {
            return Err(SchemaError::UnexpectedToken {
                line,
                expected,
                found: token.to_string(),
            });
        }
        Ok(())
    }

    fn ident(&mut self, expected: &'static str) -> SchemaResult<String> {
        match self.next(expected)? {
            (Token::Ident(name), _) => Ok(name),
            (other, line) => Err(SchemaError::UnexpectedToken {
                line,
                expected,
                found: other.to_string(),
            }),
        }
    }

    fn syntax(&mut self) -> SchemaResult<()> {
        self.expect(Token::Equals, "'='")?;
        match self.next("syntax string")? {
            (Token::Str(syntax), line) if syntax != "proto3" => {
                Err(SchemaError::UnsupportedSyntax { line, syntax })
            }
            (Token::Str(_), _) => self.expect(Token::Semicolon, "';'"),
            (other, line) => Err(SchemaError::UnexpectedToken {
                line,
                expected: "syntax string",
                found: other.to_string(),
            }),
        }
    }

    fn message(&mut self) -> SchemaResult<MessageSchema> {
        let name = self.ident("message name")?;
        self.expect(Token::LBrace, "'{'")?;

        let mut fields = Vec::new();
        loop {
            let field_type = match self.next("field type or '}'")? {
                (Token::RBrace, _) => break,
                (Token::Ident(type_name), _) => FieldType::from_name(&type_name),
                (other, line) => {
                    return Err(SchemaError::UnexpectedToken {
                        line,
                        expected: "field type or '}'",
                        found: other.to_string(),
                    })
                }
            };
            let field_name = self.ident("field name")?;
            self.expect(Token::Equals, "'='")?;
            let tag = match self.next("field tag")? {
                (Token::Number(digits), line) => {
                    let tag: u64 = digits.parse().map_err(|_| SchemaError::UnexpectedToken {
                        line,
                        expected: "field tag",
                        found: digits.clone(),
                    })?;
                    if tag == 0 || tag > u64::from(MAX_TAG) {
                        return Err(SchemaError::InvalidTag {
                            message: name.clone(),
                            field: field_name,
                            tag,
                        });
                    }
                    tag as u32
                }
                (other, line) => {
                    return Err(SchemaError::UnexpectedToken {
                        line,
                        expected: "field tag",
                        found: other.to_string(),
                    })
                }
            };
            self.expect(Token::Semicolon, "';'")?;

            fields.push(FieldSchema {
                name: field_name,
                tag,
                field_type,
            });
        }

        Ok(MessageSchema { name, fields })
    }
}

/// Parse and validate schema text
pub fn parse_schema(text: &str) -> SchemaResult<Schema> {
    Schema::new(parse_messages(text)?)
}

/// Parse schema text without cross-checking the messages.
///
/// Lets several files be parsed separately, keeping their line numbers, and
/// validated together with [`Schema::new`].
pub fn parse_messages(text: &str) -> SchemaResult<Vec<MessageSchema>> {
    let mut parser = Parser {
        tokens: tokenize(text)?.into_iter(),
    };

    let mut messages = Vec::new();
    while let Some((token, line)) = parser.tokens.next() {
        match token {
            Token::Ident(keyword) if keyword == "message" => messages.push(parser.message()?),
            Token::Ident(keyword) if keyword == "syntax" => parser.syntax()?,
            other => {
                return Err(SchemaError::UnexpectedToken {
                    line,
                    expected: "'message' or 'syntax'",
                    found: other.to_string(),
                })
            }
        }
    }

    tracing::debug!(messages = messages.len(), "parsed schema text");
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"
syntax = "proto3";

// Playback file layout
message PlaybackHeader {
    int32 magic = 1;
    float testfloat = 2;
    double testdouble = 3;
}

message PlaybackFile {
    PlaybackHeader header = 1; // written first
    bytes body = 2;
}
"#;

    #[test]
    fn test_parse_nested_schema() {
        let schema = parse_schema(NESTED).unwrap();
        assert_eq!(schema.messages().len(), 2);

        let header = schema.message("PlaybackHeader").unwrap();
        assert_eq!(
            header.fields,
            vec![
                FieldSchema {
                    name: "magic".to_string(),
                    tag: 1,
                    field_type: FieldType::Int32,
                },
                FieldSchema {
                    name: "testfloat".to_string(),
                    tag: 2,
                    field_type: FieldType::Float,
                },
                FieldSchema {
                    name: "testdouble".to_string(),
                    tag: 3,
                    field_type: FieldType::Double,
                },
            ]
        );

        let file = schema.message("PlaybackFile").unwrap();
        assert_eq!(
            file.field(1).unwrap().field_type,
            FieldType::Message("PlaybackHeader".to_string())
        );
        assert_eq!(file.field_by_name("body").unwrap().tag, 2);
    }

    #[test]
    fn test_forward_reference_allowed() {
        let schema = parse_schema(
            "message Outer { Inner inner = 1; }\nmessage Inner { string note = 1; }",
        )
        .unwrap();
        assert_eq!(schema.messages()[0].name, "Outer");
    }

    #[test]
    fn test_display_reparses_to_same_schema() {
        let schema = parse_schema(NESTED).unwrap();
        assert_eq!(parse_schema(&schema.to_string()).unwrap(), schema);
    }

    #[test]
    fn test_syntax_errors_carry_line() {
        let err = parse_schema("message A {\n  int32 x = 1\n}").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnexpectedToken {
                line: 3,
                expected: "';'",
                found: "}".to_string(),
            }
        );

        let err = parse_schema("message A {\n  int32 x = 1;\n  # nope\n}").unwrap_err();
        assert_eq!(err, SchemaError::UnexpectedChar { line: 3, ch: '#' });
    }

    #[test]
    fn test_unexpected_eof() {
        let err = parse_schema("message A { int32 x").unwrap_err();
        assert_eq!(err, SchemaError::UnexpectedEof { expected: "'='" });
    }

    #[test]
    fn test_unsupported_syntax() {
        let err = parse_schema("syntax = \"proto2\";").unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedSyntax { line: 1, .. }));
    }

    #[test]
    fn test_invalid_tags() {
        let err = parse_schema("message A { int32 x = 0; }").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidTag { tag: 0, .. }));

        let err = parse_schema("message A { int32 x = 536870912; }").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidTag { tag: 536_870_912, .. }));
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = parse_schema("message A { int32 x = 1; float y = 1; }").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateTag {
                message: "A".to_string(),
                tag: 1,
            }
        );

        let err = parse_schema("message A { int32 x = 1; float x = 2; }").unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));

        let err = parse_schema("message A { }\nmessage A { }").unwrap_err();
        assert_eq!(err, SchemaError::DuplicateMessage("A".to_string()));
    }

    #[test]
    fn test_unresolved_type() {
        let err = parse_schema("message A { uint64 big = 1; }").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedType {
                message: "A".to_string(),
                field: "big".to_string(),
                type_name: "uint64".to_string(),
            }
        );
    }

    #[test]
    fn test_recursive_messages_rejected() {
        let err = parse_schema("message A { A next = 1; }").unwrap_err();
        assert_eq!(err, SchemaError::RecursiveMessage("A".to_string()));

        let err = parse_schema("message A { B b = 1; }\nmessage B { A a = 1; }").unwrap_err();
        assert!(matches!(err, SchemaError::RecursiveMessage(_)));
    }

    #[test]
    fn test_shared_nested_message_is_not_a_cycle() {
        let schema = parse_schema(
            "message Leaf { int32 v = 1; }\nmessage Root { Leaf a = 1; Leaf b = 2; }",
        )
        .unwrap();
        assert_eq!(schema.messages().len(), 2);
    }

    #[test]
    fn test_parse_messages_defers_validation() {
        let messages = parse_messages("message A { B b = 1; }").unwrap();
        assert_eq!(messages.len(), 1);
        assert!(Schema::new(messages.clone()).is_err());

        let mut all = messages;
        all.extend(parse_messages("message B { int32 v = 1; }").unwrap());
        assert_eq!(Schema::new(all).unwrap().messages().len(), 2);
    }

    #[test]
    fn test_same_encoding() {
        assert!(FieldType::Bytes.same_encoding(&FieldType::String));
        assert!(!FieldType::Int32.same_encoding(&FieldType::Float));
        assert!(FieldType::Message("A".into()).same_encoding(&FieldType::Message("A".into())));
        assert_eq!(FieldType::Double.wire_type(), WireType::Fixed64);
    }
}
