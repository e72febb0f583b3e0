// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `short_expr` module expands filter shorthand into the long syntax:
//! `~aword` becomes `artist="*word*"`, `~d<120` becomes `(duration<120)`,
//! `~y90-99` becomes `(date>=90&date<=99)`. Terms separated by spaces are
//! joined with `&`; `|`, `!`, and parentheses pass through.

use log::debug;

enum KeyType {
    Str,
    Int,
    Bool,
}

fn lookup(short: char) -> Option<(&'static str, KeyType)> {
    let key = match short {
        'A' => ("albumartist", KeyType::Str),
        'a' => ("artist", KeyType::Str),
        'c' => ("comment", KeyType::Str),
        'D' => ("discnumber", KeyType::Int),
        'd' => ("duration", KeyType::Int),
        'f' => ("filename", KeyType::Str),
        'g' => ("genre", KeyType::Str),
        'l' => ("album", KeyType::Str),
        'n' => ("tracknumber", KeyType::Int),
        's' => ("stream", KeyType::Bool),
        'T' => ("tag", KeyType::Bool),
        't' => ("title", KeyType::Str),
        'X' => ("play_count", KeyType::Int),
        'y' => ("date", KeyType::Int),
        _ => return None,
    };
    Some(key)
}

/// True when `s` uses the shorthand syntax: a `~` before anything other
/// than `!`, `(`, `)`, and spaces.
pub fn is_short(s: &str) -> bool {
    for c in s.chars() {
        if c == '~' {
            return true;
        }
        if c != '!' && c != '(' && c != ' ' && c != ')' {
            return false;
        }
    }
    false
}

struct Expander<'a> {
    chars: Vec<char>,
    pos: usize,
    out: String,
    key: &'a str,
}

/// Expand shorthand `input` to the long filter syntax.
pub fn expand(input: &str) -> Result<String, String> {
    let mut expander = Expander { chars: input.chars().collect(), pos: 0, out: String::new(), key: "" };
    expander.parse_longest()?;
    expander.skip_spaces();
    if expander.pos != expander.chars.len() {
        return Err(format!("unexpected '{}'", expander.peek().unwrap()));
    }
    debug!("expanded \"{}\" to \"{}\"", input, expander.out);
    Ok(expander.out)
}

impl Expander<'_> {
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

    fn starts_expr(c: Option<char>) -> bool {
        matches!(c, Some('~') | Some('(') | Some('!'))
    }

    fn parse_longest(&mut self) -> Result<(), String> {
        let mut connector: Option<char> = None;
        loop {
            self.skip_spaces();
            if !Self::starts_expr(self.peek()) {
                break;
            }
            if let Some(c) = connector {
                self.out.push(c);
            }
            self.parse_one()?;
            self.skip_spaces();
            if self.peek() == Some('|') {
                self.bump();
                connector = Some('|');
            }
            else {
                connector = Some('&');
            }
        }
        // A `|` with nothing after it has nothing to connect.
        if connector == Some('|') {
            return Err("expected '~'".to_string());
        }
        Ok(())
    }

    fn parse_one(&mut self) -> Result<(), String> {
        self.skip_spaces();
        match self.peek() {
            Some('~') => self.parse_key(),
            Some('(') => self.parse_paren(),
            Some('!') => self.parse_not(),
            Some(c) => Err(format!("unexpected '{}'", c)),
            None => Ok(()),
        }
    }

    fn parse_paren(&mut self) -> Result<(), String> {
        self.out.push('(');
        self.bump();
        self.parse_longest()?;
        if self.peek() == Some(')') {
            self.bump();
        }
        else {
            return Err("')' expected".to_string());
        }
        self.out.push(')');
        Ok(())
    }

    fn parse_not(&mut self) -> Result<(), String> {
        self.out.push('!');
        self.out.push('(');
        self.bump();
        self.parse_one()?;
        self.out.push(')');
        Ok(())
    }

    fn parse_key(&mut self) -> Result<(), String> {
        self.bump(); // ~
        let short = self.peek().ok_or("key expected after '~'".to_string())?;
        let (key, key_type) = lookup(short).ok_or(format!("unknown short key {}", short))?;
        self.key = key;
        self.bump();

        match key_type {
            KeyType::Int => self.int_arg(),
            KeyType::Str => self.str_arg(),
            KeyType::Bool => {
                self.out.push_str(self.key);
                Ok(())
            }
        }
    }

    fn int_arg(&mut self) -> Result<(), String> {
        self.out.push('(');
        self.skip_spaces();
        match self.peek() {
            Some('<') | Some('>') => {
                self.out.push_str(self.key);
                let op = self.bump().unwrap();
                self.out.push(op);
                self.int()?;
            }
            Some('-') => {
                // -N means "up to N".
                self.out.push_str(self.key);
                self.out.push_str("<=");
                self.bump();
                self.int()?;
            }
            Some(c) if c.is_ascii_digit() => self.plain_int_arg()?,
            _ => return Err("integer expected".to_string()),
        }
        self.out.push(')');
        Ok(())
    }

    fn int(&mut self) -> Result<(), String> {
        self.skip_spaces();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err("integer expected".to_string());
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        self.out.push_str(&digits);
        Ok(())
    }

    fn plain_int_arg(&mut self) -> Result<(), String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let first: String = self.chars[start..self.pos].iter().collect();
        self.skip_spaces();

        if self.peek() == Some('-') {
            // N- or N-M: a range.
            self.bump();
            self.out.push_str(self.key);
            self.out.push_str(">=");
            self.out.push_str(&first);
            self.skip_spaces();
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.out.push('&');
                self.out.push_str(self.key);
                self.out.push_str("<=");
                self.int()?;
            }
            Ok(())
        }
        else {
            self.out.push_str(self.key);
            self.out.push('=');
            self.out.push_str(&first);
            Ok(())
        }
    }

    fn str_arg(&mut self) -> Result<(), String> {
        self.out.push_str(self.key);
        self.out.push('=');
        self.skip_spaces();
        if self.peek() == Some('"') {
            self.quoted_str_arg()
        }
        else {
            self.plain_str_arg()
        }
    }

    fn quoted_str_arg(&mut self) -> Result<(), String> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut escaped = false;
        loop {
            match self.peek() {
                Some('"') if !escaped => break,
                Some('\\') if !escaped => {
                    escaped = true;
                    self.bump();
                }
                Some(_) => {
                    escaped = false;
                    self.bump();
                }
                None => break,
            }
        }
        let body: String = self.chars[start..self.pos].iter().collect();
        if self.peek() == Some('"') {
            self.bump();
        }
        // The opening quote rode along in `body`; close the string.
        self.out.push_str(&body);
        self.out.push('"');
        Ok(())
    }

    fn plain_str_arg(&mut self) -> Result<(), String> {
        let start = self.pos;
        while !matches!(self.peek(), Some('~') | Some('!') | Some('|') | Some('(') | Some(')') | None) {
            self.pos += 1;
        }
        let mut end = self.pos;
        while end > start && self.chars[end - 1] == ' ' {
            end -= 1;
        }
        let word: String = self.chars[start..end].iter().collect();
        self.out.push_str("\"*");
        self.out.push_str(&word);
        self.out.push_str("*\"");
        Ok(())
    }
}
