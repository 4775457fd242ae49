//! Key templates: brace format strings rendered against call arguments.
//!
//! Supported syntax:
//!
//! | Placeholder        | Meaning                                          |
//! |--------------------|--------------------------------------------------|
//! | `{0}`, `{1}`       | positional argument (receiver is `{0}` for methods) |
//! | `{}`               | next positional argument (automatic numbering)   |
//! | `{name}`           | named argument                                   |
//! | `{0.field}`        | field of a struct/map argument                   |
//! | `{0[2]}`, `{0[k]}` | array element or map entry                       |
//! | `{{`, `}}`         | literal braces                                   |
//!
//! Format specs (`{0:>4}`) and conversions (`{0!r}`) are rejected.
//!
//! # Stringification
//!
//! Strings render without quotes, numbers and booleans via their JSON text,
//! `null` for `None`/unit, and arrays/objects as compact JSON with object
//! keys sorted, so the same argument always yields the same fragment.

use crate::args::ArgList;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgRef {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Accessor {
    Field(String),
    Item(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    arg: ArgRef,
    path: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// A parsed, immutable key template.
///
/// # Example
///
/// ```
/// use cached_result::args::ArgList;
/// use cached_result::template::KeyTemplate;
///
/// let template = KeyTemplate::parse("bar_{1}").unwrap();
/// let args = ArgList::with_receiver(&"foo", &(4u32,)).unwrap();
/// assert_eq!(template.render(&args).unwrap(), "bar_4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Numbering {
    Unset,
    Automatic,
    Manual,
}

impl KeyTemplate {
    /// Parse a template.
    ///
    /// # Errors
    /// Returns `Error::KeyFormatError` for unmatched braces, format specs,
    /// conversions, empty field paths, or mixed automatic/manual numbering.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut numbering = Numbering::Unset;
        let mut next_auto = 0usize;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(format_error(source, "nested '{' in placeholder"))
                            }
                            _ => field.push(c),
                        }
                    }
                    if !closed {
                        return Err(format_error(source, "unmatched '{'"));
                    }

                    let (arg, path) = parse_placeholder(source, &field)?;
                    let arg = match (arg, numbering) {
                        (None, Numbering::Manual) => {
                            return Err(format_error(
                                source,
                                "cannot switch from manual to automatic field numbering",
                            ))
                        }
                        (None, _) => {
                            numbering = Numbering::Automatic;
                            next_auto += 1;
                            ArgRef::Index(next_auto - 1)
                        }
                        (Some(ArgRef::Index(_)), Numbering::Automatic) => {
                            return Err(format_error(
                                source,
                                "cannot switch from automatic to manual field numbering",
                            ))
                        }
                        (Some(arg @ ArgRef::Index(_)), _) => {
                            numbering = Numbering::Manual;
                            arg
                        }
                        (Some(arg), _) => arg,
                    };

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(Placeholder { arg, path }));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(format_error(source, "single '}' encountered")),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(KeyTemplate {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as supplied.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Highest positional index referenced, if any.
    pub fn max_positional_index(&self) -> Option<usize> {
        self.placeholders()
            .filter_map(|p| match p.arg {
                ArgRef::Index(i) => Some(i),
                ArgRef::Name(_) => None,
            })
            .max()
    }

    /// Names of all named arguments referenced.
    pub fn named_references(&self) -> Vec<&str> {
        self.placeholders()
            .filter_map(|p| match &p.arg {
                ArgRef::Name(name) => Some(name.as_str()),
                ArgRef::Index(_) => None,
            })
            .collect()
    }

    /// Render the template against `args`.
    ///
    /// # Errors
    /// - `Error::KeyFormatError` if a referenced argument or field is absent
    /// - `Error::UnsupportedArgumentTypeError` if a referenced argument
    ///   could not be captured
    pub fn render(&self, args: &ArgList) -> Result<String> {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(placeholder) => {
                    let value = self.resolve(placeholder, args)?;
                    out.push_str(&key_fragment(value));
                }
            }
        }
        Ok(out)
    }

    fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    fn resolve<'a>(&self, placeholder: &Placeholder, args: &'a ArgList) -> Result<&'a Value> {
        let mut value = match &placeholder.arg {
            ArgRef::Index(i) => args.positional(*i),
            ArgRef::Name(name) => args.named(name),
        }
        .map_err(|e| match e {
            Error::KeyFormatError(msg) => {
                Error::KeyFormatError(format!("template '{}': {}", self.source, msg))
            }
            other => other,
        })?;

        for accessor in &placeholder.path {
            value = match (accessor, value) {
                (Accessor::Field(name), Value::Object(map)) => map.get(name),
                (Accessor::Item(key), Value::Object(map)) => map.get(key),
                (Accessor::Item(index), Value::Array(items)) => {
                    index.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                _ => None,
            }
            .ok_or_else(|| {
                Error::KeyFormatError(format!(
                    "template '{}': cannot resolve {} on {}",
                    self.source,
                    accessor,
                    kind_of(value)
                ))
            })?;
        }

        Ok(value)
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Field(name) => write!(f, ".{}", name),
            Accessor::Item(key) => write!(f, "[{}]", key),
        }
    }
}

fn format_error(source: &str, reason: &str) -> Error {
    Error::KeyFormatError(format!("template '{}': {}", source, reason))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse the text between `{` and `}`. An empty head (automatic numbering)
/// yields `None` and is resolved by the caller.
fn parse_placeholder(source: &str, field: &str) -> Result<(Option<ArgRef>, Vec<Accessor>)> {
    if field.contains(':') || field.contains('!') {
        return Err(format_error(
            source,
            "format specs and conversions are not supported in cache keys",
        ));
    }

    let head_end = field.find(['.', '[']).unwrap_or(field.len());
    let (head, mut rest) = field.split_at(head_end);

    let arg = if head.is_empty() {
        None
    } else if head.chars().all(|c| c.is_ascii_digit()) {
        let index = head
            .parse::<usize>()
            .map_err(|_| format_error(source, "positional index out of range"))?;
        Some(ArgRef::Index(index))
    } else {
        Some(ArgRef::Name(head.to_string()))
    };

    let mut path = Vec::new();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(format_error(source, "empty field name after '.'"));
            }
            path.push(Accessor::Field(after[..end].to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| format_error(source, "missing ']' in placeholder"))?;
            if end == 0 {
                return Err(format_error(source, "empty index '[]'"));
            }
            path.push(Accessor::Item(after[..end].to_string()));
            rest = &after[end + 1..];
        } else {
            return Err(format_error(
                source,
                "expected '.' or '[' after index in placeholder",
            ));
        }
    }

    Ok((arg, path))
}

/// Render one argument value as a key fragment.
pub fn key_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => canonicalize(value).to_string(),
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Named;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Person {
        name: String,
        tags: Vec<String>,
    }

    fn render(template: &str, args: &ArgList) -> Result<String> {
        KeyTemplate::parse(template)?.render(args)
    }

    #[test]
    fn test_positional_substitution() {
        let args = ArgList::collect(&("foo", 4u32)).expect("collect");
        assert_eq!(render("bar_{1}", &args).expect("render"), "bar_4");
        assert_eq!(render("{0}:{1}:{0}", &args).expect("render"), "foo:4:foo");
    }

    #[test]
    fn test_automatic_numbering() {
        let args = ArgList::collect(&("a", "b")).expect("collect");
        assert_eq!(render("{}-{}", &args).expect("render"), "a-b");
    }

    #[test]
    fn test_mixed_numbering_rejected() {
        assert!(matches!(
            KeyTemplate::parse("{}-{1}"),
            Err(Error::KeyFormatError(_))
        ));
        assert!(matches!(
            KeyTemplate::parse("{0}-{}"),
            Err(Error::KeyFormatError(_))
        ));
    }

    #[test]
    fn test_escaped_braces() {
        let args = ArgList::collect(&(7u8,)).expect("collect");
        assert_eq!(render("{{lit}}-{0}", &args).expect("render"), "{lit}-7");
    }

    #[test]
    fn test_malformed_templates() {
        for bad in ["key_{0", "key_0}", "{0:>4}", "{0!r}", "{0.}", "{0[]}", "{0[1}", "{{0}"] {
            assert!(
                matches!(KeyTemplate::parse(bad), Err(Error::KeyFormatError(_))),
                "expected KeyFormatError for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_missing_argument() {
        let args = ArgList::collect(&(1u8,)).expect("collect");
        let err = render("x_{2}", &args).expect_err("should fail");
        assert!(matches!(err, Error::KeyFormatError(_)));
        assert!(err.to_string().contains("x_{2}"));
    }

    #[test]
    fn test_field_and_item_access() {
        let person = Person {
            name: "Wade".to_string(),
            tags: vec!["admin".to_string(), "ops".to_string()],
        };
        let args = ArgList::collect(&(person,)).expect("collect");

        assert_eq!(
            render("test-key-{0.name}", &args).expect("render"),
            "test-key-Wade"
        );
        assert_eq!(render("{0.tags[1]}", &args).expect("render"), "ops");
        assert_eq!(render("{0[name]}", &args).expect("render"), "Wade");
        assert!(matches!(
            render("{0.age}", &args),
            Err(Error::KeyFormatError(_))
        ));
        assert!(matches!(
            render("{0.name.first}", &args),
            Err(Error::KeyFormatError(_))
        ));
    }

    #[test]
    fn test_named_substitution() {
        let mut named = HashMap::new();
        named.insert("page", 3u32);
        let args = ArgList::collect(&Named::new(("users",), named)).expect("collect");

        assert_eq!(
            render("{0}:page={page}", &args).expect("render"),
            "users:page=3"
        );
        assert!(matches!(
            render("{limit}", &args),
            Err(Error::KeyFormatError(_))
        ));
    }

    #[test]
    fn test_stringification_rules() {
        let mut map = HashMap::new();
        map.insert("b", 2);
        map.insert("a", 1);

        let args = ArgList::collect(&(
            Option::<u32>::None,
            true,
            1.5f64,
            vec![1, 2, 3],
            map,
            "plain",
        ))
        .expect("collect");

        assert_eq!(
            render("{0}|{1}|{2}|{3}|{4}|{5}", &args).expect("render"),
            r#"null|true|1.5|[1,2,3]|{"a":1,"b":2}|plain"#
        );
    }

    #[test]
    fn test_unsupported_argument() {
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1u8);
        let args = ArgList::collect(&(bad, 2u8)).expect("collect");

        assert_eq!(render("ok_{1}", &args).expect("render"), "ok_2");
        assert!(matches!(
            render("bad_{0}", &args),
            Err(Error::UnsupportedArgumentTypeError(_))
        ));
    }

    #[test]
    fn test_reference_introspection() {
        let template = KeyTemplate::parse("{0.id}-{2}-{page}").expect("parse");
        assert_eq!(template.max_positional_index(), Some(2));
        assert_eq!(template.named_references(), vec!["page"]);
        assert_eq!(template.to_string(), "{0.id}-{2}-{page}");

        let literal = KeyTemplate::parse("constant").expect("parse");
        assert_eq!(literal.max_positional_index(), None);
    }
}
