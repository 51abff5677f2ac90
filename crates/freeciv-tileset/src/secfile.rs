//! Section file parser.
//!
//! The format used by `.tilespec` and `.spec` files:
//!
//! ```text
//! ; comment
//! [section]
//! key     = 12
//! flag    = TRUE
//! name    = _("Translated")
//! list    = "a", "b",
//!           "c"
//! tiles   = { "row", "column", "tag"
//!   0, 0, "t.l0.grassland1"
//! }
//! *include "other.spec"
//! ```
//!
//! Sections that appear twice are merged; a key that appears twice keeps
//! the last value.

use crate::source::TilesetSource;
use thiserror::Error;

/// How deep `*include` may nest.
pub const MAX_INCLUDE_DEPTH: usize = 8;

/// Errors produced while reading a section file.
#[derive(Debug, Error)]
pub enum SecfileError {
    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    #[error("cannot read \"{file}\": {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: entry \"{section}.{key}\" not found")]
    MissingEntry {
        file: String,
        section: String,
        key: String,
    },

    #[error("{file}: entry \"{section}.{key}\" is not {expected}")]
    WrongType {
        file: String,
        section: String,
        key: String,
        expected: &'static str,
    },

    #[error("{file}: includes nested deeper than {MAX_INCLUDE_DEPTH}")]
    IncludeDepth { file: String },
}

/// A parsed entry value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Table(Table),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// A single string or a list of strings.
    pub fn as_str_vec(&self) -> Option<Vec<&str>> {
        match self {
            Value::Str(s) => Some(vec![s.as_str()]),
            Value::List(items) => items.iter().map(Value::as_str).collect(),
            _ => None,
        }
    }
}

/// A `{ ... }` table. Rows may hold more values than there are columns;
/// the extras continue the last column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The value of `column` in `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column(column)?;
        self.rows.get(row)?.get(col)
    }

    /// The value of `column` and every value after it in `row`.
    pub fn get_from(&self, row: usize, column: &str) -> &[Value] {
        match (self.column(column), self.rows.get(row)) {
            (Some(col), Some(values)) if col < values.len() => &values[col..],
            _ => &[],
        }
    }
}

/// A named group of entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    entries: Vec<(String, Value)>,
}

impl Section {
    fn new(name: String) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// A parsed section file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionFile {
    /// File name, for error messages.
    pub name: String,
    sections: Vec<Section>,
}

impl SectionFile {
    /// Parse text that does not use `*include`.
    pub fn parse(name: &str, text: &str) -> Result<Self, SecfileError> {
        let mut out = Self::empty(name);
        let mut no_includes = |path: &str| -> std::io::Result<String> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("cannot include \"{path}\" here"),
            ))
        };
        parse_text(&mut out, &mut None, name, text, &mut no_includes, 0)?;
        Ok(out)
    }

    /// Read and parse `path`, resolving includes through `source`.
    pub fn load(source: &dyn TilesetSource, path: &str) -> Result<Self, SecfileError> {
        let text = source.read_to_string(path).map_err(|e| SecfileError::Io {
            file: path.to_string(),
            source: e,
        })?;
        let mut out = Self::empty(path);
        let mut include = |p: &str| source.read_to_string(p);
        parse_text(&mut out, &mut None, path, &text, &mut include, 0)?;
        Ok(out)
    }

    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Sections whose name starts with `prefix`, in file order.
    pub fn sections_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections
            .iter()
            .filter(move |s| s.name.starts_with(prefix))
    }

    pub fn lookup(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section)?.get(key)
    }

    fn missing(&self, section: &str, key: &str) -> SecfileError {
        SecfileError::MissingEntry {
            file: self.name.clone(),
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    fn wrong_type(&self, section: &str, key: &str, expected: &'static str) -> SecfileError {
        SecfileError::WrongType {
            file: self.name.clone(),
            section: section.to_string(),
            key: key.to_string(),
            expected,
        }
    }

    fn typed<'a, T>(
        &'a self,
        section: &str,
        key: &str,
        expected: &'static str,
        convert: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<Option<T>, SecfileError> {
        match self.lookup(section, key) {
            None => Ok(None),
            Some(value) => convert(value)
                .map(Some)
                .ok_or_else(|| self.wrong_type(section, key, expected)),
        }
    }

    pub fn lookup_int(&self, section: &str, key: &str) -> Result<i64, SecfileError> {
        self.typed(section, key, "an integer", Value::as_int)?
            .ok_or_else(|| self.missing(section, key))
    }

    pub fn lookup_int_default(
        &self,
        default: i64,
        section: &str,
        key: &str,
    ) -> Result<i64, SecfileError> {
        Ok(self
            .typed(section, key, "an integer", Value::as_int)?
            .unwrap_or(default))
    }

    pub fn lookup_bool(&self, section: &str, key: &str) -> Result<bool, SecfileError> {
        self.typed(section, key, "a boolean", Value::as_bool)?
            .ok_or_else(|| self.missing(section, key))
    }

    pub fn lookup_bool_default(
        &self,
        default: bool,
        section: &str,
        key: &str,
    ) -> Result<bool, SecfileError> {
        Ok(self
            .typed(section, key, "a boolean", Value::as_bool)?
            .unwrap_or(default))
    }

    pub fn lookup_str(&self, section: &str, key: &str) -> Result<&str, SecfileError> {
        self.typed(section, key, "a string", Value::as_str)?
            .ok_or_else(|| self.missing(section, key))
    }

    pub fn lookup_str_default<'a>(
        &'a self,
        default: &'a str,
        section: &str,
        key: &str,
    ) -> Result<&'a str, SecfileError> {
        Ok(self
            .typed(section, key, "a string", Value::as_str)?
            .unwrap_or(default))
    }

    /// A string list; empty when the entry is absent.
    pub fn lookup_str_vec(&self, section: &str, key: &str) -> Result<Vec<&str>, SecfileError> {
        Ok(self
            .typed(section, key, "a string list", Value::as_str_vec)?
            .unwrap_or_default())
    }

    pub fn lookup_table(&self, section: &str, key: &str) -> Result<&Table, SecfileError> {
        match self.lookup(section, key) {
            None => Err(self.missing(section, key)),
            Some(Value::Table(table)) => Ok(table),
            Some(_) => Err(self.wrong_type(section, key, "a table")),
        }
    }

    fn section_index(&mut self, name: String) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Section(String),
    Ident(String),
    Int(i64),
    Str(String),
    Eq,
    Comma,
    LBrace,
    RBrace,
    Newline,
}

fn syntax(file: &str, line: usize, message: impl Into<String>) -> SecfileError {
    SecfileError::Syntax {
        file: file.to_string(),
        line,
        message: message.into(),
    }
}

fn tokenize(file: &str, text: &str) -> Result<Vec<(Token, usize)>, SecfileError> {
    let mut out = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                out.push((Token::Newline, line));
                line += 1;
            }
            c if c.is_whitespace() => {}
            ';' | '#' => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            '=' => out.push((Token::Eq, line)),
            ',' => out.push((Token::Comma, line)),
            '{' => out.push((Token::LBrace, line)),
            '}' => out.push((Token::RBrace, line)),
            '[' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('\n') | None => {
                            return Err(syntax(file, line, "unterminated section header"))
                        }
                        Some(c) => name.push(c),
                    }
                }
                out.push((Token::Section(name.trim().to_string()), line));
            }
            '"' => {
                let start = line;
                let s = read_string(file, &mut chars, &mut line)?;
                out.push((Token::Str(s), start));
            }
            '_' if chars.peek() == Some(&'(') => {
                // _("text") marks a translatable string.
                chars.next();
                while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                    chars.next();
                }
                if chars.next() != Some('"') {
                    return Err(syntax(file, line, "expected a string after \"_(\""));
                }
                let start = line;
                let s = read_string(file, &mut chars, &mut line)?;
                while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                    chars.next();
                }
                if chars.next() != Some(')') {
                    return Err(syntax(file, line, "unterminated \"_(\""));
                }
                out.push((Token::Str(s), start));
            }
            '-' | '0'..='9' => {
                let mut digits = String::from(c);
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| syntax(file, line, format!("bad number \"{digits}\"")))?;
                out.push((Token::Int(value), line));
            }
            c if c.is_alphabetic() || c == '_' || c == '*' => {
                let mut ident = String::from(c);
                while let Some(&d) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_' || d == '.' || d == '-') {
                        break;
                    }
                    ident.push(d);
                    chars.next();
                }
                out.push((Token::Ident(ident), line));
            }
            other => {
                return Err(syntax(file, line, format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(out)
}

fn read_string(
    file: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line: &mut usize,
) -> Result<String, SecfileError> {
    let start = *line;
    let mut s = String::new();
    loop {
        match chars.next() {
            None => return Err(syntax(file, start, "unterminated string")),
            Some('"') => return Ok(s),
            Some('\\') => match chars.next() {
                Some('n') => s.push('\n'),
                Some('"') => s.push('"'),
                Some('\\') => s.push('\\'),
                Some(other) => {
                    s.push('\\');
                    s.push(other);
                }
                None => return Err(syntax(file, start, "unterminated string")),
            },
            Some(c) => {
                if c == '\n' {
                    *line += 1;
                }
                s.push(c);
            }
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    file: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, l)| *l)
    }

    fn error(&self, message: impl Into<String>) -> SecfileError {
        syntax(self.file, self.line(), message)
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.pos += 1;
        }
    }

    fn expect_line_end(&mut self) -> Result<(), SecfileError> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Newline) => {
                self.pos += 1;
                Ok(())
            }
            Some(other) => Err(self.error(format!("expected end of line, found {other:?}"))),
        }
    }

    fn scalar(&mut self) -> Result<Value, SecfileError> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Value::Int(i)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(id)) => match id.as_str() {
                "TRUE" => Ok(Value::Bool(true)),
                "FALSE" => Ok(Value::Bool(false)),
                _ => Err(self.error(format!("unexpected identifier \"{id}\""))),
            },
            other => Err(self.error(format!("expected a value, found {other:?}"))),
        }
    }

    fn value(&mut self) -> Result<Value, SecfileError> {
        self.skip_newlines();
        if self.peek() == Some(&Token::LBrace) {
            self.pos += 1;
            let table = self.table()?;
            self.expect_line_end()?;
            return Ok(Value::Table(table));
        }
        let mut values = vec![self.scalar()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            self.skip_newlines();
            values.push(self.scalar()?);
        }
        self.expect_line_end()?;
        if values.len() == 1 {
            Ok(values.remove(0))
        } else {
            Ok(Value::List(values))
        }
    }

    fn table(&mut self) -> Result<Table, SecfileError> {
        self.skip_newlines();
        let mut columns = Vec::new();
        loop {
            match self.next() {
                Some(Token::Str(name)) => columns.push(name),
                _ => return Err(self.error("table header must be a list of strings")),
            }
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::Newline) => break,
                _ => return Err(self.error("table header must end with a newline")),
            }
        }

        let mut rows = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(Table { columns, rows });
                }
                None => return Err(self.error("unterminated table")),
                _ => {}
            }
            let mut row = vec![self.scalar()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                self.skip_newlines();
                row.push(self.scalar()?);
            }
            match self.peek() {
                Some(Token::Newline) | Some(Token::RBrace) => rows.push(row),
                _ => return Err(self.error("table row must end with a newline")),
            }
        }
    }
}

fn parse_text(
    out: &mut SectionFile,
    current: &mut Option<usize>,
    file: &str,
    text: &str,
    include: &mut dyn FnMut(&str) -> std::io::Result<String>,
    depth: usize,
) -> Result<(), SecfileError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(SecfileError::IncludeDepth {
            file: file.to_string(),
        });
    }
    let mut p = Parser {
        file,
        tokens: tokenize(file, text)?,
        pos: 0,
    };

    loop {
        p.skip_newlines();
        let Some(token) = p.next() else {
            return Ok(());
        };
        match token {
            Token::Section(name) => {
                *current = Some(out.section_index(name));
                p.expect_line_end()?;
            }
            Token::Ident(id) if id == "*include" => {
                let path = match p.next() {
                    Some(Token::Str(path)) => path,
                    _ => return Err(p.error("*include needs a file name")),
                };
                p.expect_line_end()?;
                tracing::trace!(file, include = %path, "including section file");
                let text = include(&path).map_err(|e| SecfileError::Io {
                    file: path.clone(),
                    source: e,
                })?;
                parse_text(out, current, &path, &text, include, depth + 1)?;
            }
            Token::Ident(key) => {
                let Some(index) = *current else {
                    return Err(p.error(format!("entry \"{key}\" outside of any section")));
                };
                if p.next() != Some(Token::Eq) {
                    return Err(p.error(format!("expected '=' after \"{key}\"")));
                }
                let value = p.value()?;
                out.sections[index].insert(key, value);
            }
            other => return Err(p.error(format!("unexpected {other:?}"))),
        }
    }
}
