//! Lenient Turtle reader.
//!
//! Reads the subset of Turtle that LDP servers emit for container
//! descriptions and turns it into a flat list of triples.
//!
//! # Design Decisions
//! - A statement that cannot be parsed is skipped up to the next `.`; the
//!   rest of the document is still read
//! - A triple whose terms cannot be resolved (unknown prefix, bad IRI) is
//!   dropped without aborting its statement
//! - Collections and nested blank nodes are read for structure only; their
//!   members are not expanded into `rdf:first`/`rdf:rest` triples

use std::collections::HashMap;

use url::Url;

use crate::rdf::vocab;

/// An RDF term. IRIs are stored absolute, after resolution against the base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal(String),
}

impl Term {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Term::Literal(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

/// Result of reading a Turtle document.
#[derive(Debug, Default)]
pub struct Document {
    pub triples: Vec<Triple>,
    /// Number of statements abandoned because they were malformed.
    pub skipped: usize,
}

/// Read `text` as Turtle, resolving relative IRIs against `base`.
pub fn read(text: &str, base: &Url) -> Document {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let tokens = Lexer::new(text).tokenize();
    let mut parser = Parser {
        tokens,
        pos: 0,
        base: base.clone(),
        prefixes: HashMap::new(),
        triples: Vec::new(),
        blank_nodes: 0,
    };

    let mut skipped = 0;
    while parser.peek().is_some() {
        if let Err(reason) = parser.statement() {
            tracing::trace!(%reason, "Skipping malformed Turtle statement");
            skipped += 1;
            parser.recover();
        }
    }

    Document {
        triples: parser.triples,
        skipped,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Iri(String),
    Prefixed { prefix: String, local: String },
    BlankNode(String),
    Literal(String),
    A,
    PrefixDirective,
    BaseDirective,
    DatatypeMarker,
    Dot,
    Semicolon,
    Comma,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Invalid(String),
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '<' | '>' | '"' | '\'' | '{' | '}' | '|' | '^' | '`' | ';' | ',' | '(' | ')' | '['
                | ']' | '#' | '.'
        )
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_trivia();
        let c = self.peek()?;
        let token = match c {
            '<' => self.iri(),
            '"' | '\'' => self.literal(c),
            '@' => self.at_keyword(),
            '^' if self.peek_at(1) == Some('^') => {
                self.pos += 2;
                Token::DatatypeMarker
            }
            '_' if self.peek_at(1) == Some(':') => {
                self.pos += 2;
                Token::BlankNode(self.scan_name())
            }
            '.' if !self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.single(Token::Dot),
            ';' => self.single(Token::Semicolon),
            ',' => self.single(Token::Comma),
            '[' => self.single(Token::OpenBracket),
            ']' => self.single(Token::CloseBracket),
            '(' => self.single(Token::OpenParen),
            ')' => self.single(Token::CloseParen),
            c if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => self.number(),
            _ => self.word(),
        };
        Some(token)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn iri(&mut self) -> Token {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                '>' => {
                    let iri: String = self.chars[start..self.pos].iter().collect();
                    self.pos += 1;
                    return Token::Iri(iri);
                }
                c if c.is_whitespace() || c == '<' || c == '"' => break,
                _ => self.pos += 1,
            }
        }
        Token::Invalid("unterminated IRI".to_string())
    }

    fn literal(&mut self, quote: char) -> Token {
        let long = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if long { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Token::Invalid("unterminated literal".to_string());
            };
            if c == quote {
                if !long {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\\' {
                self.pos += 1;
                let escaped = match self.peek() {
                    Some('n') => Some('\n'),
                    Some('t') => Some('\t'),
                    Some('r') => Some('\r'),
                    Some('b') => Some('\u{8}'),
                    Some('f') => Some('\u{c}'),
                    Some('u') => self.unicode_escape(4),
                    Some('U') => self.unicode_escape(8),
                    other => other,
                };
                match escaped {
                    Some(ch) => value.push(ch),
                    None => return Token::Invalid("bad escape in literal".to_string()),
                }
                self.pos += 1;
                continue;
            }
            if !long && (c == '\n' || c == '\r') {
                return Token::Invalid("line break in short literal".to_string());
            }
            value.push(c);
            self.pos += 1;
        }

        // Language tags carry nothing the proxy needs.
        if self.peek() == Some('@') {
            self.pos += 1;
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                self.pos += 1;
            }
        }
        Token::Literal(value)
    }

    /// Decode `\uXXXX` / `\UXXXXXXXX`, leaving `pos` on the last hex digit.
    fn unicode_escape(&mut self, len: usize) -> Option<char> {
        let digits: String = self.chars.get(self.pos + 1..self.pos + 1 + len)?.iter().collect();
        let code = u32::from_str_radix(&digits, 16).ok()?;
        self.pos += len;
        char::from_u32(code)
    }

    fn at_keyword(&mut self) -> Token {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let keyword: String = self.chars[start..self.pos].iter().collect();
        match keyword.as_str() {
            "prefix" => Token::PrefixDirective,
            "base" => Token::BaseDirective,
            _ => Token::Invalid(format!("unknown directive @{keyword}")),
        }
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            let after_exponent = matches!(self.chars[self.pos - 1], 'e' | 'E');
            let continues = c.is_ascii_digit()
                || matches!(c, 'e' | 'E')
                || (matches!(c, '+' | '-') && after_exponent)
                || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()));
            if !continues {
                break;
            }
            self.pos += 1;
        }
        Token::Literal(self.chars[start..self.pos].iter().collect())
    }

    fn scan_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' {
                // A dot inside a name is fine; a trailing one ends the statement.
                if self.peek_at(1).is_some_and(is_name_char) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
            if !is_name_char(c) {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn word(&mut self) -> Token {
        let word = self.scan_name();
        if word.is_empty() {
            let c = self.peek().unwrap_or_default();
            self.pos += 1;
            return Token::Invalid(format!("unexpected character '{c}'"));
        }
        if let Some((prefix, local)) = word.split_once(':') {
            return Token::Prefixed {
                prefix: prefix.to_string(),
                local: local.to_string(),
            };
        }
        match word.as_str() {
            "a" => Token::A,
            "true" | "false" => Token::Literal(word),
            w if w.eq_ignore_ascii_case("prefix") => Token::PrefixDirective,
            w if w.eq_ignore_ascii_case("base") => Token::BaseDirective,
            _ => Token::Invalid(format!("unexpected word '{word}'")),
        }
    }
}

type Step<T> = Result<T, String>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    base: Url,
    prefixes: HashMap<String, String>,
    triples: Vec<Triple>,
    blank_nodes: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Step<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", expected, self.peek()))
        }
    }

    /// Skip past the next `.`; always consumes at least one token.
    fn recover(&mut self) {
        while let Some(token) = self.bump() {
            if token == Token::Dot {
                return;
            }
        }
    }

    fn statement(&mut self) -> Step<()> {
        match self.peek() {
            Some(Token::PrefixDirective) => self.prefix_directive(),
            Some(Token::BaseDirective) => self.base_directive(),
            _ => self.triples_statement(),
        }
    }

    fn prefix_directive(&mut self) -> Step<()> {
        self.bump();
        let name = match self.peek() {
            Some(Token::Prefixed { prefix, local }) if local.is_empty() => prefix.clone(),
            other => return Err(format!("expected prefix name, found {other:?}")),
        };
        self.bump();
        let namespace = match self.peek() {
            Some(Token::Iri(raw)) => self.resolve_iri(raw),
            other => return Err(format!("expected namespace IRI, found {other:?}")),
        };
        self.bump();
        let namespace = namespace.ok_or_else(|| format!("unresolvable namespace for prefix '{name}'"))?;
        self.prefixes.insert(name, namespace);
        // `@prefix` ends with a dot, SPARQL-style `PREFIX` does not.
        self.eat(&Token::Dot);
        Ok(())
    }

    fn base_directive(&mut self) -> Step<()> {
        self.bump();
        let base = match self.peek() {
            Some(Token::Iri(raw)) => self.base.join(raw).map_err(|e| e.to_string())?,
            other => return Err(format!("expected base IRI, found {other:?}")),
        };
        self.bump();
        self.base = base;
        self.eat(&Token::Dot);
        Ok(())
    }

    fn triples_statement(&mut self) -> Step<()> {
        let subject = match self.peek() {
            Some(Token::OpenBracket) => {
                self.bump();
                let node = self.blank_node_property_list()?;
                // `[ ... ] .` is a complete statement on its own.
                if self.eat(&Token::Dot) {
                    return Ok(());
                }
                Some(node)
            }
            Some(Token::OpenParen) => {
                self.bump();
                Some(self.collection()?)
            }
            Some(Token::Iri(_)) | Some(Token::Prefixed { .. }) | Some(Token::BlankNode(_)) => {
                let token = self.bump();
                token.and_then(|t| self.term_from(&t))
            }
            other => return Err(format!("expected subject, found {other:?}")),
        };
        self.predicate_object_list(&subject)?;
        self.expect(Token::Dot)
    }

    fn predicate_object_list(&mut self, subject: &Option<Term>) -> Step<()> {
        loop {
            let predicate = self.verb()?;
            loop {
                let object = self.object()?;
                if let (Some(s), Some(p), Some(o)) = (subject, &predicate, object) {
                    self.triples.push(Triple {
                        subject: s.clone(),
                        predicate: p.clone(),
                        object: o,
                    });
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            if self.peek() != Some(&Token::Semicolon) {
                return Ok(());
            }
            while self.eat(&Token::Semicolon) {}
            if matches!(self.peek(), Some(Token::Dot) | Some(Token::CloseBracket) | None) {
                return Ok(());
            }
        }
    }

    fn verb(&mut self) -> Step<Option<String>> {
        match self.peek() {
            Some(Token::A) => {
                self.bump();
                Ok(Some(vocab::RDF_TYPE.to_string()))
            }
            Some(Token::Iri(_)) | Some(Token::Prefixed { .. }) => {
                let token = self.bump();
                Ok(token
                    .and_then(|t| self.term_from(&t))
                    .and_then(|t| t.as_iri().map(str::to_string)))
            }
            other => Err(format!("expected predicate, found {other:?}")),
        }
    }

    fn object(&mut self) -> Step<Option<Term>> {
        match self.peek().cloned() {
            Some(Token::Iri(_)) | Some(Token::Prefixed { .. }) | Some(Token::BlankNode(_)) => {
                let token = self.bump();
                Ok(token.and_then(|t| self.term_from(&t)))
            }
            Some(Token::Literal(value)) => {
                self.bump();
                if self.eat(&Token::DatatypeMarker) {
                    match self.peek() {
                        Some(Token::Iri(_)) | Some(Token::Prefixed { .. }) => {
                            self.bump();
                        }
                        other => return Err(format!("expected datatype, found {other:?}")),
                    }
                }
                Ok(Some(Term::Literal(value)))
            }
            Some(Token::OpenBracket) => {
                self.bump();
                Ok(Some(self.blank_node_property_list()?))
            }
            Some(Token::OpenParen) => {
                self.bump();
                Ok(Some(self.collection()?))
            }
            other => Err(format!("expected object, found {other:?}")),
        }
    }

    /// Called after `[`; consumes up to and including `]`.
    fn blank_node_property_list(&mut self) -> Step<Term> {
        let node = self.fresh_blank_node();
        if !self.eat(&Token::CloseBracket) {
            self.predicate_object_list(&Some(node.clone()))?;
            self.expect(Token::CloseBracket)?;
        }
        Ok(node)
    }

    /// Called after `(`; consumes up to and including `)`.
    fn collection(&mut self) -> Step<Term> {
        while !self.eat(&Token::CloseParen) {
            if self.peek().is_none() {
                return Err("unterminated collection".to_string());
            }
            self.object()?;
        }
        Ok(self.fresh_blank_node())
    }

    fn fresh_blank_node(&mut self) -> Term {
        self.blank_nodes += 1;
        Term::BlankNode(format!("genid{}", self.blank_nodes))
    }

    fn term_from(&self, token: &Token) -> Option<Term> {
        match token {
            Token::Iri(raw) => self.resolve_iri(raw).map(Term::Iri),
            Token::Prefixed { prefix, local } => self.resolve_prefixed(prefix, local).map(Term::Iri),
            Token::BlankNode(label) => Some(Term::BlankNode(label.clone())),
            _ => None,
        }
    }

    fn resolve_iri(&self, raw: &str) -> Option<String> {
        self.base.join(raw).ok().map(String::from)
    }

    fn resolve_prefixed(&self, prefix: &str, local: &str) -> Option<String> {
        let namespace = self
            .prefixes
            .get(prefix)
            .map(String::as_str)
            .or_else(|| vocab::well_known_prefix(prefix))?;
        Some(format!("{namespace}{local}"))
    }
}
