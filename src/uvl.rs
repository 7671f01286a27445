//! Reader for the Boolean subset of UVL.
//!
//! The input is processed line by line: comments are stripped, indentation is
//! measured (a tab counts as four spaces) and each top-level keyword opens a
//! block made of the indented lines that follow it. Inside `features`,
//! feature declarations and group keywords alternate by nesting depth.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::model::{FeatureModel, FeatureModelBuilder};

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
}

/// Loads a UVL model from a file.
pub fn load_model(path: impl AsRef<Path>) -> Result<FeatureModel> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    let model = parse_uvl(&text)?;
    info!(
        "Loaded feature model '{}' with {} features from {}",
        model.name(model.root()),
        model.num_features(),
        path.display()
    );
    Ok(model)
}

/// Parses UVL text into a feature model.
pub fn parse_uvl(text: &str) -> Result<FeatureModel> {
    let lines = split_lines(text);
    let mut features: Option<FeatureModelBuilder> = None;
    let mut constraints = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.indent > 0 {
            return Err(Error::parse(line.number, "unexpected indentation outside of a block"));
        }
        let end = (i + 1..lines.len()).find(|&j| lines[j].indent == 0).unwrap_or(lines.len());
        let body = &lines[i + 1..end];
        let keyword = line.text.split_whitespace().next().unwrap_or_default();

        match keyword {
            "namespace" => debug!("Ignoring namespace declaration '{}'", line.text),
            "include" | "imports" => {
                warn!("Skipping unsupported '{}' block at line {}", keyword, line.number)
            }
            "features" if line.text == "features" => {
                if features.is_some() {
                    return Err(Error::parse(line.number, "duplicate 'features' block"));
                }
                features = Some(parse_features(body, line.number)?);
            }
            "constraints" if line.text == "constraints" => {
                for line in body {
                    constraints.push(parse_constraint(line)?);
                }
            }
            _ => {
                return Err(Error::parse(
                    line.number,
                    format!("unexpected '{}' at top level", line.text),
                ))
            }
        }
        i = end;
    }

    let last_line = lines.last().map_or(1, |l| l.number);
    let mut builder = features.ok_or_else(|| Error::parse(last_line, "missing 'features' block"))?;
    for expr in constraints {
        builder.add_constraint(expr);
    }
    builder.build()
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let raw = strip_comment(raw);
            let text = raw.trim();
            if text.is_empty() {
                return None;
            }
            let indent = raw
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum();
            Some(Line {
                number: i + 1,
                indent,
                text,
            })
        })
        .collect()
}

fn strip_comment(raw: &str) -> &str {
    let mut quoted = false;
    let bytes = raw.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => quoted = !quoted,
            b'/' if !quoted && bytes.get(i + 1) == Some(&b'/') => return &raw[..i],
            _ => {}
        }
    }
    raw
}

#[derive(Debug, Clone, Copy)]
enum GroupKind {
    Mandatory,
    Optional,
    Or,
    Alternative,
    /// `[a..b]`; `None` stands for `*`.
    Cardinality(usize, Option<usize>),
}

#[derive(Debug)]
struct Group {
    parent: String,
    kind: GroupKind,
    children: Vec<String>,
    line: usize,
}

#[derive(Debug)]
struct FeatureDecl {
    name: String,
    is_abstract: bool,
    attributes: Vec<(String, String)>,
}

enum Frame {
    Feature { indent: usize, name: String },
    Group { indent: usize, group: usize },
}

impl Frame {
    fn indent(&self) -> usize {
        match self {
            Frame::Feature { indent, .. } | Frame::Group { indent, .. } => *indent,
        }
    }
}

fn parse_features(body: &[Line<'_>], header: usize) -> Result<FeatureModelBuilder> {
    let mut root: Option<String> = None;
    let mut decls = Vec::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for line in body {
        while stack.last().is_some_and(|f| f.indent() >= line.indent) {
            stack.pop();
        }
        match stack.last() {
            None => {
                if root.is_some() {
                    return Err(Error::parse(line.number, "a feature model has a single root feature"));
                }
                let decl = parse_feature_decl(line)?;
                root = Some(decl.name.clone());
                stack.push(Frame::Feature {
                    indent: line.indent,
                    name: decl.name.clone(),
                });
                decls.push(decl);
            }
            Some(Frame::Feature { name, .. }) => {
                let parent = name.clone();
                groups.push(Group {
                    parent,
                    kind: parse_group_keyword(line)?,
                    children: Vec::new(),
                    line: line.number,
                });
                stack.push(Frame::Group {
                    indent: line.indent,
                    group: groups.len() - 1,
                });
            }
            Some(Frame::Group { group, .. }) => {
                let group = *group;
                let decl = parse_feature_decl(line)?;
                groups[group].children.push(decl.name.clone());
                stack.push(Frame::Feature {
                    indent: line.indent,
                    name: decl.name.clone(),
                });
                decls.push(decl);
            }
        }
    }

    let root = root.ok_or_else(|| Error::parse(header, "the 'features' block declares no root feature"))?;
    let mut builder = FeatureModelBuilder::new(root);

    for group in &groups {
        let n = group.children.len();
        if n == 0 {
            return Err(Error::parse(group.line, "group without children"));
        }
        match group.kind {
            GroupKind::Mandatory => {
                for child in &group.children {
                    builder.mandatory(&group.parent, child);
                }
            }
            GroupKind::Optional => {
                for child in &group.children {
                    builder.optional(&group.parent, child);
                }
            }
            GroupKind::Or => {
                builder.add_relation(&group.parent, group.children.iter().cloned(), 1, n);
            }
            GroupKind::Alternative => {
                builder.add_relation(&group.parent, group.children.iter().cloned(), 1, 1);
            }
            GroupKind::Cardinality(min, max) => {
                builder.add_relation(&group.parent, group.children.iter().cloned(), min, max.unwrap_or(n));
            }
        }
    }
    for decl in decls {
        if decl.is_abstract {
            builder.set_abstract(&decl.name, true);
        }
        for (key, value) in decl.attributes {
            builder.add_attribute(&decl.name, key, value);
        }
    }
    Ok(builder)
}

fn parse_group_keyword(line: &Line<'_>) -> Result<GroupKind> {
    let kind = match line.text {
        "mandatory" => GroupKind::Mandatory,
        "optional" => GroupKind::Optional,
        "or" => GroupKind::Or,
        "alternative" => GroupKind::Alternative,
        text => {
            let inner = text
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .ok_or_else(|| Error::parse(line.number, format!("expected a group keyword, found '{}'", text)))?;
            let number = |s: &str| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|_| Error::parse(line.number, format!("invalid group cardinality '{}'", text)))
            };
            match inner.split_once("..") {
                Some((min, "*")) => GroupKind::Cardinality(number(min)?, None),
                Some((min, max)) => GroupKind::Cardinality(number(min)?, Some(number(max)?)),
                None => {
                    let n = number(inner)?;
                    GroupKind::Cardinality(n, Some(n))
                }
            }
        }
    };
    Ok(kind)
}

/// Strips a leading keyword followed by whitespace and more text.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn parse_feature_decl(line: &Line<'_>) -> Result<FeatureDecl> {
    let mut rest = line.text;
    if let Some(r) = strip_keyword(rest, "Boolean") {
        rest = r;
    }
    for ty in ["Integer", "Real", "String"] {
        if strip_keyword(rest, ty).is_some() {
            return Err(Error::parse(
                line.number,
                format!("feature type '{}' is not supported", ty),
            ));
        }
    }

    let (name, r) = if let Some(quoted) = rest.strip_prefix('"') {
        let close = quoted
            .find('"')
            .ok_or_else(|| Error::parse(line.number, "unterminated quoted name"))?;
        (&quoted[..close], &quoted[close + 1..])
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '{')
            .unwrap_or(rest.len());
        rest.split_at(end)
    };
    if name.is_empty() {
        return Err(Error::parse(line.number, "missing feature name"));
    }
    rest = r.trim_start();

    if strip_keyword(rest, "cardinality").is_some() {
        return Err(Error::parse(
            line.number,
            format!("feature cardinality on '{}' is not supported", name),
        ));
    }

    let mut decl = FeatureDecl {
        name: name.to_string(),
        is_abstract: false,
        attributes: Vec::new(),
    };
    if let Some(body) = rest.strip_prefix('{') {
        let close = body
            .rfind('}')
            .ok_or_else(|| Error::parse(line.number, "unterminated attribute list"))?;
        for attribute in split_top_level(&body[..close]) {
            let attribute = attribute.trim();
            if attribute.is_empty() {
                continue;
            }
            let (key, value) = match attribute.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (attribute, ""),
            };
            if key == "abstract" {
                decl.is_abstract = value != "false";
            } else {
                decl.attributes.push((key.to_string(), value.to_string()));
            }
        }
        rest = body[close + 1..].trim();
    }
    if !rest.is_empty() {
        return Err(Error::parse(
            line.number,
            format!("unexpected '{}' after feature '{}'", rest, decl.name),
        ));
    }
    Ok(decl)
}

/// Splits on commas that are not nested inside quotes, braces or brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' | '\'' => quoted = !quoted,
            '{' | '[' if !quoted => depth += 1,
            '}' | ']' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Not,
    And,
    Or,
    Implies,
    Equiv,
    LParen,
    RParen,
    Name(String),
}

fn tokenize(line: &Line<'_>) -> Result<Vec<Token>> {
    let arithmetic = || Error::parse(line.number, "arithmetic constraints are not supported");
    let mut tokens = Vec::new();
    let mut chars = line.text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '!' => Token::Not,
            '&' => Token::And,
            '|' => Token::Or,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '=' => match chars.next() {
                Some((_, '>')) => Token::Implies,
                _ => return Err(arithmetic()),
            },
            '<' => match (chars.next(), chars.next()) {
                (Some((_, '=')), Some((_, '>'))) => Token::Equiv,
                _ => return Err(arithmetic()),
            },
            '"' => {
                let rest = &line.text[i + 1..];
                let close = rest
                    .find('"')
                    .ok_or_else(|| Error::parse(line.number, "unterminated quoted name"))?;
                for _ in rest[..=close].chars() {
                    chars.next();
                }
                Token::Name(rest[..close].to_string())
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        end = j + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Name(line.text[i..end].to_string())
            }
            c if c.is_ascii_digit() || "+-*/>".contains(c) => return Err(arithmetic()),
            c => {
                return Err(Error::parse(
                    line.number,
                    format!("unexpected character '{}' in constraint", c),
                ))
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

struct ConstraintParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    line: &'a Line<'a>,
}

impl ConstraintParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::parse(self.line.number, format!("{} in constraint '{}'", message, self.line.text))
    }

    fn equiv(&mut self) -> Result<Expr> {
        let mut lhs = self.implies()?;
        while self.eat(&Token::Equiv) {
            lhs = Expr::equiv(lhs, self.implies()?);
        }
        Ok(lhs)
    }

    fn implies(&mut self) -> Result<Expr> {
        let mut lhs = self.or()?;
        while self.eat(&Token::Implies) {
            lhs = Expr::implies(lhs, self.or()?);
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            lhs = Expr::or(lhs, self.and()?);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            lhs = Expr::and(lhs, self.unary()?);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::not(self.unary()?));
        }
        match self.tokens.get(self.pos).cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.equiv()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("missing ')'"));
                }
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                Ok(Expr::var(name))
            }
            Some(_) => Err(self.error("unexpected operator")),
            None => Err(self.error("unexpected end")),
        }
    }
}

fn parse_constraint(line: &Line<'_>) -> Result<Expr> {
    let mut parser = ConstraintParser {
        tokens: tokenize(line)?,
        pos: 0,
        line,
    };
    let expr = parser.equiv()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing tokens"));
    }
    Ok(expr)
}
