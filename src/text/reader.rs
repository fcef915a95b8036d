//! Text-form parsing.
//!
//! Recursive descent over the grammar: a `<!-- kv3 … -->` header, then one
//! value.  `//` and `/* */` comments count as whitespace everywhere
//! whitespace is allowed.  Strings take backslash escapes; triple-quoted
//! multiline strings take none and carry the `multilinestring` transport
//! flag in memory.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::header::{
    Encoding, Format, Kv3Header, ENCODING_BINARY_BLOCK_COMPRESSED, ENCODING_BINARY_BLOCK_LZ4,
    ENCODING_BINARY_UNCOMPRESSED, ENCODING_TEXT,
};
use crate::value::{Flag, Object, Value};

/// Parse a complete text document: header plus a single root value.
pub fn parse(text: &str) -> Result<(Kv3Header, Value)> {
    let mut parser = Parser { src: text, pos: 0 };
    parser.skip_ws()?;
    let header = parser.parse_header()?;
    parser.skip_ws()?;
    let value = parser.parse_value()?;
    parser.skip_ws()?;
    if !parser.at_end() {
        return Err(parser.error("expected end of document"));
    }
    Ok((header, value))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {token:?}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let consumed = &self.src[..self.pos];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rfind('\n')
            .map_or(self.pos, |nl| self.pos - nl - 1)
            + 1;
        Error::text(line, column, message)
    }

    /// Whitespace, `//` line comments, `/* */` block comments.
    fn skip_ws(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.rest().starts_with("//") => {
                    match self.rest().find('\n') {
                        Some(nl) => self.pos += nl + 1,
                        None => self.pos = self.src.len(),
                    }
                }
                Some('/') if self.rest().starts_with("/*") => {
                    match self.rest()[2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => return Err(self.error("unterminated block comment")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn require_ws(&mut self) -> Result<()> {
        let before = self.pos;
        self.skip_ws()?;
        if self.pos == before {
            return Err(self.error("expected whitespace"));
        }
        Ok(())
    }

    // ── Header ──────────────────────────────────────────────────────────────

    fn parse_header(&mut self) -> Result<Kv3Header> {
        self.expect("<!--")?;
        self.require_ws()?;
        self.expect("kv3")?;
        self.require_ws()?;
        self.expect("encoding:")?;
        let encoding_name = self.parse_identifier()?;
        self.expect(":version")?;
        let encoding_uuid = self.parse_guid()?;
        self.require_ws()?;
        self.expect("format:")?;
        let format_name = self.parse_identifier()?;
        self.expect(":version")?;
        let format_uuid = self.parse_guid()?;
        self.require_ws()?;
        self.expect("-->")?;

        let encoding = resolve_encoding(encoding_uuid)
            .ok_or(Error::UnsupportedEncoding(encoding_uuid))?;
        let format = Format::new(format_name, format_uuid)?;
        Ok(Kv3Header { encoding, format })
    }

    fn parse_identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.src[start..self.pos].to_owned())
    }

    fn parse_guid(&mut self) -> Result<Uuid> {
        self.expect("{")?;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != '}') {
            self.bump();
        }
        let body = &self.src[start..self.pos];
        self.expect("}")?;
        Uuid::parse_str(body).map_err(|e| self.error(format!("bad version uuid: {e}")))
    }

    // ── Values ──────────────────────────────────────────────────────────────

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek() {
            None => Err(self.error("expected a value")),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"') => self.parse_string_like(),
            Some('#') => self.parse_blob(),
            Some(c) if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => {
                self.parse_number()
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_word(),
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
        }
    }

    /// Bare words: `null`/`true`/`false`, `nan`/`inf`, or a flag prefix
    /// (`resource|subclass:value`).
    fn parse_word(&mut self) -> Result<Value> {
        let word = self.parse_identifier()?;
        if matches!(self.peek(), Some('|') | Some(':')) {
            let mut flags = self.flag_named(&word)?;
            while self.eat("|") {
                let name = self.parse_identifier()?;
                flags |= self.flag_named(&name)?;
            }
            self.expect(":")?;
            let inner = self.parse_value()?;
            return Ok(Value::flagged(inner, flags));
        }
        match word.to_ascii_lowercase().as_str() {
            "null" => Ok(Value::Null),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "nan" => Ok(Value::Double(f64::NAN)),
            "inf" => Ok(Value::Double(f64::INFINITY)),
            _ => Err(self.error(format!("unexpected identifier {word:?}"))),
        }
    }

    fn flag_named(&self, name: &str) -> Result<Flag> {
        Flag::from_text_name(name).ok_or_else(|| self.error(format!("invalid flag {name:?}")))
    }

    fn parse_object(&mut self) -> Result<Value> {
        self.expect("{")?;
        let mut map = Object::new();
        loop {
            self.skip_ws()?;
            if self.eat("}") {
                return Ok(Value::Object(map));
            }
            let key = match self.peek() {
                Some('"') => self.parse_quoted_string()?,
                _ => self.parse_identifier()?,
            };
            self.skip_ws()?;
            self.expect("=")?;
            self.skip_ws()?;
            let value = self.parse_value()?;
            map.insert(key, value);
        }
    }

    fn parse_array(&mut self) -> Result<Value> {
        self.expect("[")?;
        let mut items = Vec::new();
        loop {
            self.skip_ws()?;
            if self.eat("]") {
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws()?;
            if !self.eat(",") && !self.rest().starts_with(']') {
                return Err(self.error("expected ',' or ']' in array"));
            }
        }
    }

    fn parse_string_like(&mut self) -> Result<Value> {
        // `"""` followed by a newline opens a multiline string; a lone `"""`
        // is an empty string followed by the next token's opening quote.
        if self.rest().starts_with("\"\"\"\n") || self.rest().starts_with("\"\"\"\r\n") {
            self.pos += 3;
            self.eat("\r");
            self.eat("\n");
            match self.rest().find("\"\"\"") {
                Some(end) => {
                    let body = &self.rest()[..end];
                    let value = Value::String(body.to_owned());
                    self.pos += end + 3;
                    Ok(Value::flagged(value, Flag::MULTILINE_STRING))
                }
                None => Err(self.error("unterminated multiline string")),
            }
        } else {
            Ok(Value::String(self.parse_quoted_string()?))
        }
    }

    fn parse_quoted_string(&mut self) -> Result<String> {
        self.expect("\"")?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => return Err(self.error(format!("unknown escape \\{c}"))),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_blob(&mut self) -> Result<Value> {
        self.expect("#[")?;
        let mut bytes = Vec::new();
        loop {
            self.skip_ws()?;
            if self.eat("]") {
                return Ok(Value::Blob(bytes));
            }
            let hi = self.hex_digit()?;
            let lo = self.hex_digit()?;
            bytes.push(hi << 4 | lo);
        }
    }

    fn hex_digit(&mut self) -> Result<u8> {
        match self.peek().and_then(|c| c.to_digit(16)) {
            Some(d) => {
                self.bump();
                Ok(d as u8)
            }
            None => Err(self.error("expected hex digit in binary blob")),
        }
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            }
            Some('+') => {
                self.bump();
                false
            }
            _ => false,
        };

        // Signed nan / inf come through the number path.
        if self.rest().len() >= 3 && self.rest()[..3].eq_ignore_ascii_case("nan") {
            self.pos += 3;
            return Ok(Value::Double(f64::NAN));
        }
        if self.rest().len() >= 3 && self.rest()[..3].eq_ignore_ascii_case("inf") {
            self.pos += 3;
            return Ok(Value::Double(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }));
        }

        let mut integral = true;
        let mut digits = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    digits += 1;
                    self.bump();
                }
                '.' if integral => {
                    integral = false;
                    self.bump();
                }
                'e' | 'E' if digits > 0 => {
                    integral = false;
                    self.bump();
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        if digits == 0 {
            return Err(self.error("malformed number"));
        }
        let token = &self.src[start..self.pos];

        if integral {
            if let Ok(v) = token.parse::<i64>() {
                return Ok(Value::Int64(v));
            }
            if let Ok(v) = token.parse::<u64>() {
                return Ok(Value::UInt64(v));
            }
            return Err(self.error(format!("integer {token} out of range")));
        }
        token
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| self.error(format!("malformed number {token:?}")))
    }
}

fn resolve_encoding(uuid: Uuid) -> Option<Encoding> {
    [
        ENCODING_TEXT,
        ENCODING_BINARY_UNCOMPRESSED,
        ENCODING_BINARY_BLOCK_COMPRESSED,
        ENCODING_BINARY_BLOCK_LZ4,
    ]
    .into_iter()
    .find(|e| e.uuid == uuid)
}
