//! Parser for object-builder calls such as
//! `TimeDimension('metric_time', 'month').date_part('year')`.
//!
//! The same grammar is used inside `{{ ... }}` blocks of where-filter
//! templates and for group-by inputs written in the object-builder style.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    pub message: String,
    pub position: usize,
}

impl TemplateError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.position)
    }
}

impl std::error::Error for TemplateError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Str(String),
    List(Vec<String>),
    Bool(bool),
}

impl TemplateValue {
    fn kind(&self) -> &'static str {
        match self {
            TemplateValue::Str(_) => "string",
            TemplateValue::List(_) => "list",
            TemplateValue::Bool(_) => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedCall {
    pub method: String,
    pub args: Vec<TemplateValue>,
}

/// One parsed builder expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderCall {
    pub function: String,
    pub positional: Vec<TemplateValue>,
    pub keywords: Vec<(String, TemplateValue)>,
    pub chained: Vec<ChainedCall>,
}

impl BuilderCall {
    pub fn positional_str(&self, index: usize) -> Result<Option<&str>, TemplateError> {
        match self.positional.get(index) {
            None => Ok(None),
            Some(TemplateValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(TemplateError::new(
                format!(
                    "{}() argument {} must be a string, got a {}",
                    self.function,
                    index + 1,
                    other.kind()
                ),
                0,
            )),
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&TemplateValue> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn keyword_str(&self, name: &str) -> Result<Option<&str>, TemplateError> {
        match self.keyword(name) {
            None => Ok(None),
            Some(TemplateValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(TemplateError::new(
                format!("{name} must be a string, got a {}", other.kind()),
                0,
            )),
        }
    }

    pub fn keyword_list(&self, name: &str) -> Result<Vec<String>, TemplateError> {
        match self.keyword(name) {
            None => Ok(Vec::new()),
            Some(TemplateValue::List(items)) => Ok(items.clone()),
            Some(TemplateValue::Str(s)) => Ok(vec![s.clone()]),
            Some(other) => Err(TemplateError::new(
                format!("{name} must be a list, got a {}", other.kind()),
                0,
            )),
        }
    }

    /// Reject keywords outside `allowed` so typos surface as parse errors.
    pub fn check_keywords(&self, allowed: &[&str]) -> Result<(), TemplateError> {
        for (key, _) in &self.keywords {
            if !allowed.contains(&key.as_str()) {
                return Err(TemplateError::new(
                    format!("{}() got an unexpected keyword argument '{key}'", self.function),
                    0,
                ));
            }
        }
        Ok(())
    }
}

/// Parse a complete builder expression; trailing input is an error.
pub fn parse_builder_call(input: &str) -> Result<BuilderCall, TemplateError> {
    let mut parser = Parser::new(input);
    let call = parser.call()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(TemplateError::new(
            format!("unexpected trailing input '{}'", parser.rest()),
            parser.pos,
        ));
    }
    Ok(call)
}

/// Cheap check used to pick a naming scheme before full parsing.
pub fn looks_like_builder_call(input: &str) -> bool {
    let trimmed = input.trim();
    let Some(open) = trimmed.find('(') else {
        return false;
    };
    let head = &trimmed[..open];
    !head.is_empty()
        && head.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && head.starts_with(|c: char| c.is_ascii_uppercase())
        && trimmed.ends_with(')')
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TemplateError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(TemplateError::new(
                format!("expected '{expected}', found '{c}'"),
                self.pos - c.len_utf8(),
            )),
            None => Err(TemplateError::new(
                format!("expected '{expected}', found end of input"),
                self.pos,
            )),
        }
    }

    fn ident(&mut self) -> Result<String, TemplateError> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .map(|c| c.is_ascii_alphanumeric() || c == '_')
            .unwrap_or(false)
        {
            self.bump();
        }
        if start == self.pos {
            return Err(TemplateError::new("expected an identifier", start));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn string(&mut self) -> Result<String, TemplateError> {
        self.skip_ws();
        let start = self.pos;
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(TemplateError::new("expected a quoted string", start)),
        };
        let body_start = self.pos;
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    return Ok(self.input[body_start..self.pos - 1].to_string());
                }
                Some(_) => {}
                None => return Err(TemplateError::new("unterminated string", start)),
            }
        }
    }

    fn value(&mut self) -> Result<TemplateValue, TemplateError> {
        self.skip_ws();
        match self.peek() {
            Some('\'' | '"') => Ok(TemplateValue::Str(self.string()?)),
            Some('[') => {
                self.bump();
                let mut items = Vec::new();
                self.skip_ws();
                if self.peek() == Some(']') {
                    self.bump();
                    return Ok(TemplateValue::List(items));
                }
                loop {
                    items.push(self.string()?);
                    self.skip_ws();
                    match self.bump() {
                        Some(',') => continue,
                        Some(']') => return Ok(TemplateValue::List(items)),
                        _ => {
                            return Err(TemplateError::new(
                                "expected ',' or ']' in list",
                                self.pos,
                            ))
                        }
                    }
                }
            }
            _ => {
                let start = self.pos;
                match self.ident()?.as_str() {
                    "True" | "true" => Ok(TemplateValue::Bool(true)),
                    "False" | "false" => Ok(TemplateValue::Bool(false)),
                    other => Err(TemplateError::new(
                        format!("unexpected bare word '{other}'"),
                        start,
                    )),
                }
            }
        }
    }

    /// Parses `(...)` after a function or method name.
    fn args(
        &mut self,
    ) -> Result<(Vec<TemplateValue>, Vec<(String, TemplateValue)>), TemplateError> {
        self.expect('(')?;
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok((positional, keywords));
        }
        loop {
            self.skip_ws();
            let checkpoint = self.pos;
            let keyword = if self
                .peek()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false)
            {
                let name = self.ident()?;
                self.skip_ws();
                if self.peek() == Some('=') {
                    self.bump();
                    Some(name)
                } else {
                    self.pos = checkpoint;
                    None
                }
            } else {
                None
            };
            let value = self.value()?;
            match keyword {
                Some(name) => keywords.push((name, value)),
                None if !keywords.is_empty() => {
                    return Err(TemplateError::new(
                        "positional argument follows keyword argument",
                        checkpoint,
                    ))
                }
                None => positional.push(value),
            }
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok((positional, keywords)),
                _ => return Err(TemplateError::new("expected ',' or ')'", self.pos)),
            }
        }
    }

    fn call(&mut self) -> Result<BuilderCall, TemplateError> {
        let function = self.ident()?;
        let (positional, keywords) = self.args()?;
        let mut chained = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('.') {
                break;
            }
            self.bump();
            let method = self.ident()?;
            let (args, method_keywords) = self.args()?;
            if !method_keywords.is_empty() {
                return Err(TemplateError::new(
                    format!(".{method}() does not take keyword arguments"),
                    self.pos,
                ));
            }
            chained.push(ChainedCall { method, args });
        }
        Ok(BuilderCall {
            function,
            positional,
            keywords,
            chained,
        })
    }
}
