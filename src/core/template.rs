//! Mapping templates.
//!
//! A small subset of the managed gateway's mapping-template language, enough to
//! express the response templates attached to direct compute routes:
//!
//! * `$input.json('<path>')` selected value serialized as JSON (`null` if missing)
//! * `$input.path('<path>')` selected value, strings emitted raw
//! * `$input.body` the raw payload
//! * `$util.escapeJavaScript(<expr>)` / `$util.urlEncode(<expr>)`
//!
//! Lines starting with `#set` or `##` are dropped. Templates are parsed once
//! when the gateway is built and rendered many times afterwards.
use std::{borrow::Cow, path::Path};

use serde_json::Value;
use thiserror::Error;

/// Error type for template loading and parsing
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("Unknown template expression '{expr}' at offset {offset}")]
    UnknownExpression { expr: String, offset: usize },

    #[error("Malformed template expression at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("Invalid JSON path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Escape `raw` so it can be interpolated inside a JSON string literal.
pub fn escape_json_string(raw: &str) -> String {
    let quoted = Value::String(raw.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Percent-encode `raw` for use as a form or query-string value.
pub fn url_encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A JSONPath restricted to child keys and array indices (`$.a.b[0]`, `$['a b']`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> TemplateResult<Self> {
        let invalid = |reason: &str| TemplateError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = raw
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| invalid("must start with '$'"))?;
        let mut segments = Vec::new();

        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot.find(['.', '[', ']']).unwrap_or(after_dot.len());
                let key = &after_dot[..end];
                if key.is_empty() {
                    return Err(invalid("empty key after '.'"));
                }
                segments.push(PathSegment::Key(key.to_string()));
                rest = &after_dot[end..];
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let quote = after_bracket
                    .chars()
                    .next()
                    .filter(|c| *c == '\'' || *c == '"');
                if let Some(quote) = quote {
                    let quoted = &after_bracket[1..];
                    let close = quoted
                        .find(quote)
                        .ok_or_else(|| invalid("unterminated quoted key"))?;
                    segments.push(PathSegment::Key(quoted[..close].to_string()));
                    rest = quoted[close + 1..]
                        .strip_prefix(']')
                        .ok_or_else(|| invalid("expected ']' after quoted key"))?;
                } else {
                    let close = after_bracket
                        .find(']')
                        .ok_or_else(|| invalid("unclosed '['"))?;
                    let index = after_bracket[..close]
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| invalid("array index must be a non-negative integer"))?;
                    segments.push(PathSegment::Index(index));
                    rest = &after_bracket[close + 1..];
                }
            } else {
                return Err(invalid("expected '.' or '['"));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn select<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match segment {
                PathSegment::Key(key) => current.get(key.as_str()),
                PathSegment::Index(index) => current.get(*index),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    InputJson(JsonPath),
    InputPath(JsonPath),
    InputBody,
    EscapeJavaScript(Box<Expr>),
    UrlEncode(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Expr(Expr),
}

/// A parsed mapping template, ready to render against backend payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTemplate {
    segments: Vec<Segment>,
}

const INPUT_JSON: &str = "$input.json(";
const INPUT_PATH: &str = "$input.path(";
const INPUT_BODY: &str = "$input.body";
const ESCAPE_JAVASCRIPT: &str = "$util.escapeJavaScript(";
const URL_ENCODE: &str = "$util.urlEncode(";

impl MappingTemplate {
    pub fn parse(source: &str) -> TemplateResult<Self> {
        let source: String = source
            .split_inclusive('\n')
            .filter(|line| {
                let line = line.trim_start();
                !(line.starts_with("#set") || line.starts_with("##"))
            })
            .collect();

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        while pos < source.len() {
            let rest = &source[pos..];
            if is_expression_start(rest) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let (expr, end) = parse_expr(&source, pos)?;
                segments.push(Segment::Expr(expr));
                pos = end;
            } else {
                let first_len = rest.chars().next().map_or(1, char::len_utf8);
                let next = rest[first_len..]
                    .find('$')
                    .map_or(source.len(), |i| pos + first_len + i);
                literal.push_str(&source[pos..next]);
                pos = next;
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Read and parse a template file.
    pub fn load(path: impl AsRef<Path>) -> TemplateResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    pub fn render(&self, body: &[u8]) -> String {
        let context = RenderContext::new(body);
        let mut out = String::with_capacity(body.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&context.eval(expr)),
            }
        }
        out
    }
}

fn is_expression_start(rest: &str) -> bool {
    rest.starts_with("$input.") || rest.starts_with("$util.")
}

fn skip_whitespace(source: &str, pos: usize) -> usize {
    let rest = &source[pos..];
    pos + rest.len() - rest.trim_start().len()
}

fn expect_close(source: &str, pos: usize) -> TemplateResult<usize> {
    let pos = skip_whitespace(source, pos);
    if source[pos..].starts_with(')') {
        Ok(pos + 1)
    } else {
        Err(TemplateError::Malformed {
            offset: pos,
            reason: "expected ')'".to_string(),
        })
    }
}

/// Parse the expression starting at `start`; returns it with the end offset.
fn parse_expr(source: &str, start: usize) -> TemplateResult<(Expr, usize)> {
    let rest = &source[start..];

    if rest.starts_with(INPUT_JSON) {
        let (path, end) = parse_path_argument(source, start + INPUT_JSON.len())?;
        return Ok((Expr::InputJson(path), end));
    }
    if rest.starts_with(INPUT_PATH) {
        let (path, end) = parse_path_argument(source, start + INPUT_PATH.len())?;
        return Ok((Expr::InputPath(path), end));
    }
    if rest.starts_with(ESCAPE_JAVASCRIPT) {
        let (inner, end) = parse_wrapped(source, start + ESCAPE_JAVASCRIPT.len())?;
        return Ok((Expr::EscapeJavaScript(Box::new(inner)), end));
    }
    if rest.starts_with(URL_ENCODE) {
        let (inner, end) = parse_wrapped(source, start + URL_ENCODE.len())?;
        return Ok((Expr::UrlEncode(Box::new(inner)), end));
    }
    if rest.starts_with(INPUT_BODY)
        && !rest[INPUT_BODY.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
    {
        return Ok((Expr::InputBody, start + INPUT_BODY.len()));
    }

    let name_len = rest[1..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
        .map_or(rest.len(), |i| i + 1);
    Err(TemplateError::UnknownExpression {
        expr: rest[..name_len].to_string(),
        offset: start,
    })
}

fn parse_path_argument(source: &str, pos: usize) -> TemplateResult<(JsonPath, usize)> {
    let pos = skip_whitespace(source, pos);
    let quote = source[pos..]
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| TemplateError::Malformed {
            offset: pos,
            reason: "expected a quoted JSON path".to_string(),
        })?;
    let inner_start = pos + 1;
    let close = source[inner_start..]
        .find(quote)
        .ok_or_else(|| TemplateError::Malformed {
            offset: pos,
            reason: "unterminated JSON path".to_string(),
        })?;
    let path = JsonPath::parse(&source[inner_start..inner_start + close])?;
    let end = expect_close(source, inner_start + close + 1)?;
    Ok((path, end))
}

fn parse_wrapped(source: &str, pos: usize) -> TemplateResult<(Expr, usize)> {
    let pos = skip_whitespace(source, pos);
    if !is_expression_start(&source[pos..]) {
        return Err(TemplateError::Malformed {
            offset: pos,
            reason: "expected an $input or $util expression".to_string(),
        });
    }
    let (inner, end) = parse_expr(source, pos)?;
    let end = expect_close(source, end)?;
    Ok((inner, end))
}

struct RenderContext<'a> {
    raw: Cow<'a, str>,
    root: Option<Value>,
}

impl<'a> RenderContext<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self {
            raw: String::from_utf8_lossy(body),
            root: serde_json::from_slice(body).ok(),
        }
    }

    fn select(&self, path: &JsonPath) -> Option<&Value> {
        self.root.as_ref().and_then(|root| path.select(root))
    }

    fn eval(&self, expr: &Expr) -> String {
        match expr {
            Expr::InputJson(path) => self
                .select(path)
                .map_or_else(|| "null".to_string(), Value::to_string),
            Expr::InputPath(path) => match self.select(path) {
                Some(Value::String(text)) => text.clone(),
                Some(value) => value.to_string(),
                None => String::new(),
            },
            Expr::InputBody => self.raw.to_string(),
            Expr::EscapeJavaScript(inner) => escape_json_string(&self.eval(inner)),
            Expr::UrlEncode(inner) => url_encode(&self.eval(inner)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    const FUNCTION_OUTPUT: &str = r#"{"statusCode":200,"headers":{"Access-Control-Allow-Origin":"*"},"body":{"id":"42","name":"haimtran","message":"hello lambda api"}}"#;

    #[test]
    fn test_json_path_parsing() {
        let path = JsonPath::parse("$.body.items[2]['odd key']").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("body".into()),
                PathSegment::Key("items".into()),
                PathSegment::Index(2),
                PathSegment::Key("odd key".into()),
            ]
        );
        assert!(JsonPath::parse("$").unwrap().segments().is_empty());
    }

    #[test]
    fn test_json_path_rejects_malformed_input() {
        for raw in ["body", "$.", "$[x]", "$['a'", "$.a]"] {
            assert!(
                matches!(JsonPath::parse(raw), Err(TemplateError::InvalidPath { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_json_path_select() {
        let value = json!({"a": {"b": [10, 20]}});
        let path = JsonPath::parse("$.a.b[1]").unwrap();
        assert_eq!(path.select(&value), Some(&json!(20)));
        assert_eq!(JsonPath::parse("$.a.c").unwrap().select(&value), None);
    }

    #[test]
    fn test_render_selects_function_body() {
        let template = MappingTemplate::parse("$input.json('$.body')").unwrap();
        let rendered: Value =
            serde_json::from_str(&template.render(FUNCTION_OUTPUT.as_bytes())).unwrap();
        assert_eq!(
            rendered,
            json!({"id": "42", "name": "haimtran", "message": "hello lambda api"})
        );
    }

    #[test]
    fn test_render_path_emits_raw_strings() {
        let template = MappingTemplate::parse(
            r#"{"greeting": "$input.path('$.body.message')", "code": $input.path('$.statusCode')}"#,
        )
        .unwrap();
        assert_eq!(
            template.render(FUNCTION_OUTPUT.as_bytes()),
            r#"{"greeting": "hello lambda api", "code": 200}"#
        );
    }

    #[test]
    fn test_render_missing_values() {
        let template =
            MappingTemplate::parse("[$input.json('$.nope'), \"$input.path('$.nope')\"]").unwrap();
        assert_eq!(template.render(b"{}"), "[null, \"\"]");
        assert_eq!(template.render(b"not json"), "[null, \"\"]");
    }

    #[test]
    fn test_render_escape_and_url_encode() {
        let template = MappingTemplate::parse(
            "\"$util.escapeJavaScript($input.json('$'))\"|$util.urlEncode( $input.body )",
        )
        .unwrap();
        let rendered = template.render(br#"{"book":"CDK"}"#);
        assert_eq!(
            rendered,
            r#""{\"book\":\"CDK\"}"|%7B%22book%22%3A%22CDK%22%7D"#
        );
    }

    #[test]
    fn test_directives_and_literal_dollars() {
        let template = MappingTemplate::parse(
            "#set($inputRoot = $input.path('$'))\n## comment\nprice: $5 $input.path('$.name')\n",
        )
        .unwrap();
        assert_eq!(template.render(br#"{"name":"cdk"}"#), "price: $5 cdk\n");
    }

    #[test]
    fn test_unknown_and_malformed_expressions() {
        assert!(matches!(
            MappingTemplate::parse("x $input.params('id')"),
            Err(TemplateError::UnknownExpression { offset: 2, .. })
        ));
        assert!(matches!(
            MappingTemplate::parse("$input.json('$.a'"),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            MappingTemplate::parse("$util.urlEncode(plain)"),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn test_escape_json_string() {
        assert_eq!(escape_json_string("a\"b\\c\nd"), r#"a\"b\\c\nd"#);
        assert_eq!(escape_json_string(""), "");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "$input.json('$.body')").unwrap();
        let template = MappingTemplate::load(file.path()).unwrap();
        assert_eq!(template.render(br#"{"body":[1]}"#), "[1]");

        assert!(matches!(
            MappingTemplate::load("/definitely/not/here"),
            Err(TemplateError::Io { .. })
        ));
    }
}
