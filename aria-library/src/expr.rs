// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `expr` module parses and evaluates filter expressions over track
//! metadata.
//!
//! Grammar: `!`, `&`, `|`, parentheses, and typed comparisons. String keys
//! use `key=value` (case-insensitive glob with `*` and `?`) and
//! `key~regex`; integer keys use `=`, `<`, `>`, `<=`, `>=`; boolean keys
//! stand alone. `filename` matches the whole path, `duration` and the
//! other numeric keys read -1 when missing, `stream` is true for URLs and
//! `tag` for tracks with any of artist/album/title.

use std::fmt;

use regex_lite::Regex;

use crate::short_expr;
use crate::track_info::TrackInfo;

const INT_KEYS: &[&str] = &["duration", "date", "tracknumber", "discnumber", "play_count"];
const BOOL_KEYS: &[&str] = &["stream", "tag"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl fmt::Display for IntOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntOp::Eq => "=",
            IntOp::Lt => "<",
            IntOp::Gt => ">",
            IntOp::Le => "<=",
            IntOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// A parsed filter expression.
#[derive(Debug)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Case-insensitive glob over a string key.
    Str { key: String, pattern: String },
    /// Case-insensitive regular expression over a string key.
    Re { key: String, re: Regex },
    Int { key: String, op: IntOp, value: i64 },
    Bool { key: String },
}

impl Expr {
    /// Parse a filter. Short-form filters (`~a"word"`, `~d<120`) are
    /// expanded to the long syntax first.
    pub fn parse(input: &str) -> Result<Expr, String> {
        if short_expr::is_short(input) {
            let expanded = short_expr::expand(input)?;
            Parser::new(&expanded).parse()
        }
        else {
            Parser::new(input).parse()
        }
    }

    /// Evaluate against one track.
    pub fn eval(&self, ti: &TrackInfo) -> bool {
        match self {
            Expr::And(a, b) => a.eval(ti) && b.eval(ti),
            Expr::Or(a, b) => a.eval(ti) || b.eval(ti),
            Expr::Not(inner) => !inner.eval(ti),
            Expr::Str { key, pattern } => match str_value(ti, key) {
                Some(value) => glob_match(&pattern.to_lowercase(), &value.to_lowercase()),
                None => false,
            },
            Expr::Re { key, re } => match str_value(ti, key) {
                Some(value) => re.is_match(value),
                None => false,
            },
            Expr::Int { key, op, value } => {
                let actual = int_value(ti, key);
                match op {
                    IntOp::Eq => actual == *value,
                    IntOp::Lt => actual < *value,
                    IntOp::Gt => actual > *value,
                    IntOp::Le => actual <= *value,
                    IntOp::Ge => actual >= *value,
                }
            }
            Expr::Bool { key } => match key.as_str() {
                "stream" => ti.is_url(),
                "tag" => ti.has_tag(),
                _ => false,
            },
        }
    }
}

fn str_value<'a>(ti: &'a TrackInfo, key: &str) -> Option<&'a str> {
    if key == "filename" {
        Some(&ti.filename)
    }
    else {
        ti.comments.get(key)
    }
}

fn int_value(ti: &TrackInfo, key: &str) -> i64 {
    if key == "duration" {
        ti.duration
    }
    else {
        ti.comments.get_int(key)
    }
}

/// Glob match with `*` and `?`, both sides already lowercased.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_at(&pattern, &text)
}

fn glob_match_at(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            for skip in 0..=text.len() {
                if glob_match_at(&pattern[1..], &text[skip..]) {
                    return true;
                }
            }
            false
        }
        Some('?') => !text.is_empty() && glob_match_at(&pattern[1..], &text[1..]),
        Some(&c) => text.first() == Some(&c) && glob_match_at(&pattern[1..], &text[1..]),
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser { chars: input.chars().collect(), pos: 0, input }
    }

    fn parse(mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        self.skip_spaces();
        if self.pos != self.chars.len() {
            return Err(format!("unexpected '{}' in filter '{}'", self.peek().unwrap(), self.input));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_and()?;
        loop {
            self.skip_spaces();
            if self.peek() == Some('|') {
                self.bump();
                let rhs = self.parse_and()?;
                expr = Expr::Or(Box::new(expr), Box::new(rhs));
            }
            else {
                return Ok(expr);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_unary()?;
        loop {
            self.skip_spaces();
            if self.peek() == Some('&') {
                self.bump();
                let rhs = self.parse_unary()?;
                expr = Expr::And(Box::new(expr), Box::new(rhs));
            }
            else {
                return Ok(expr);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        self.skip_spaces();
        match self.peek() {
            Some('!') => {
                self.bump();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some('(') => {
                self.bump();
                let expr = self.parse_or()?;
                self.skip_spaces();
                if self.bump() != Some(')') {
                    return Err("')' expected".to_string());
                }
                Ok(expr)
            }
            Some(c) if c.is_alphanumeric() || c == '_' => self.parse_comparison(),
            Some(c) => Err(format!("unexpected '{}'", c)),
            None => Err("expression expected".to_string()),
        }
    }

    fn parse_key(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let key = self.parse_key().to_lowercase();
        self.skip_spaces();

        let is_int = INT_KEYS.contains(&key.as_str());
        let is_bool = BOOL_KEYS.contains(&key.as_str());

        match self.peek() {
            Some('=') => {
                self.bump();
                if is_bool {
                    return Err(format!("'{}' is a boolean key", key));
                }
                if is_int {
                    Ok(Expr::Int { key, op: IntOp::Eq, value: self.parse_int()? })
                }
                else {
                    Ok(Expr::Str { key, pattern: self.parse_string()? })
                }
            }
            Some('~') => {
                self.bump();
                if is_int || is_bool {
                    return Err(format!("'{}' is not a string key", key));
                }
                let pattern = self.parse_string()?;
                let re = Regex::new(&format!("(?i){}", pattern))
                    .map_err(|err| format!("bad regex '{}': {}", pattern, err))?;
                Ok(Expr::Re { key, re })
            }
            Some(c @ ('<' | '>')) => {
                self.bump();
                if !is_int {
                    return Err(format!("'{}' is not an integer key", key));
                }
                let eq = self.peek() == Some('=');
                if eq {
                    self.bump();
                }
                let op = match (c, eq) {
                    ('<', false) => IntOp::Lt,
                    ('<', true) => IntOp::Le,
                    ('>', false) => IntOp::Gt,
                    ('>', true) => IntOp::Ge,
                    _ => unreachable!(),
                };
                Ok(Expr::Int { key, op, value: self.parse_int()? })
            }
            _ => {
                if is_bool {
                    Ok(Expr::Bool { key })
                }
                else {
                    Err(format!("operator expected after '{}'", key))
                }
            }
        }
    }

    fn parse_int(&mut self) -> Result<i64, String> {
        self.skip_spaces();
        let negative = self.peek() == Some('-');
        if negative {
            self.bump();
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err("integer expected".to_string());
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let value: i64 = digits.parse().map_err(|_| "integer out of range".to_string())?;
        Ok(if negative { -value } else { value })
    }

    /// A quoted string with backslash escapes, or a bare word terminated by
    /// an operator, space, or parenthesis.
    fn parse_string(&mut self) -> Result<String, String> {
        self.skip_spaces();
        if self.peek() == Some('"') {
            self.bump();
            let mut out = String::new();
            loop {
                match self.bump() {
                    Some('\\') => match self.bump() {
                        Some(c) => out.push(c),
                        None => return Err("unterminated string".to_string()),
                    },
                    Some('"') => return Ok(out),
                    Some(c) => out.push(c),
                    None => return Err("unterminated string".to_string()),
                }
            }
        }
        else {
            let start = self.pos;
            while matches!(self.peek(), Some(c) if !" &|()!".contains(c)) {
                self.pos += 1;
            }
            if self.pos == start {
                return Err("value expected".to_string());
            }
            Ok(self.chars[start..self.pos].iter().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::comment::Comments;

    fn track(artist: &str, duration: i64) -> TrackInfo {
        TrackInfo {
            filename: "/m/a.wav".to_string(),
            comments: Comments::from_pairs(vec![
                ("artist", artist),
                ("title", "A Longer Name"),
                ("date", "1997"),
            ]),
            duration,
            mtime: 0,
        }
    }

    #[test]
    fn glob_is_case_insensitive_and_anchored() {
        let e = Expr::parse("artist=\"ester*\"").unwrap();
        assert!(e.eval(&track("Ester Quartet", 10)));
        assert!(!e.eval(&track("The Ester Quartet", 10)));

        let e = Expr::parse("artist=\"*quartet\"").unwrap();
        assert!(e.eval(&track("Ester Quartet", 10)));
    }

    #[test]
    fn integer_comparisons() {
        let e = Expr::parse("duration<60").unwrap();
        assert!(e.eval(&track("x", 59)));
        assert!(!e.eval(&track("x", 60)));
        // Unknown duration reads as -1.
        assert!(e.eval(&track("x", -1)));

        let e = Expr::parse("date>=1990&date<2000").unwrap();
        assert!(e.eval(&track("x", 10)));
    }

    #[test]
    fn boolean_keys_and_not() {
        let e = Expr::parse("!stream").unwrap();
        assert!(e.eval(&track("x", 10)));

        let e = Expr::parse("tag").unwrap();
        assert!(e.eval(&track("x", 10)));
        let untagged =
            TrackInfo { filename: "/m/u.wav".to_string(), comments: Comments::new(), duration: 5, mtime: 0 };
        assert!(!e.eval(&untagged));
    }

    #[test]
    fn or_and_parens() {
        let e = Expr::parse("(artist=\"nobody\"|duration<60)&tag").unwrap();
        assert!(e.eval(&track("somebody", 30)));
        assert!(!e.eval(&track("somebody", 300)));
    }

    #[test]
    fn regex_operator() {
        let e = Expr::parse("title~\"^a long\"").unwrap();
        assert!(e.eval(&track("x", 10)));
        let e = Expr::parse("title~\"name$\"").unwrap();
        assert!(e.eval(&track("x", 10)));
        let e = Expr::parse("title~\"^name\"").unwrap();
        assert!(!e.eval(&track("x", 10)));
    }

    #[test]
    fn filename_key() {
        let e = Expr::parse("filename=\"*.wav\"").unwrap();
        assert!(e.eval(&track("x", 10)));
    }

    #[test]
    fn missing_string_key_never_matches() {
        let e = Expr::parse("genre=\"*\"").unwrap();
        assert!(!e.eval(&track("x", 10)));
    }

    #[test]
    fn parse_errors() {
        assert!(Expr::parse("duration=\"abc\"").is_err());
        assert!(Expr::parse("artist<5").is_err());
        assert!(Expr::parse("artist").is_err());
        assert!(Expr::parse("(artist=\"x\"").is_err());
        assert!(Expr::parse("artist=\"x\" garbage=").is_err());
    }

    #[test]
    fn short_form_is_expanded() {
        // Plain short string arguments mean "contains".
        let e = Expr::parse("~aester").unwrap();
        assert!(e.eval(&track("The Ester Quartet", 10)));
        // Quoted short string arguments stay anchored.
        let e = Expr::parse("~a\"ester\"").unwrap();
        assert!(!e.eval(&track("The Ester Quartet", 10)));
        assert!(e.eval(&track("Ester", 10)));

        let e = Expr::parse("~d<60").unwrap();
        assert!(e.eval(&track("x", 30)));
        assert!(!e.eval(&track("x", 90)));
    }
}
