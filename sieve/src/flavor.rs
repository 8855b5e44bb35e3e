//! Regex flavor translation.
//!
//! Users pick a POSIX-style regex type by name (`emacs`, `posix-extended`,
//! `sed`, ...). Each name falls into one of two syntax classes which are
//! rewritten into the `regex` crate dialect before compilation.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::{Error, Result};

/// Flavor used when none is configured.
pub const DEFAULT_FLAVOR: &str = "emacs";

const EXTENDED_NAMES: [&str; 7] = [
    "emacs",
    "awk",
    "gnu-awk",
    "egrep",
    "posix-awk",
    "posix-egrep",
    "posix-extended",
];

const BASIC_NAMES: [&str; 4] = ["ed", "grep", "sed", "posix-minimal-basic"];

/// Regex syntax class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flavor {
    /// POSIX basic syntax: `\(`, `\|`, `\+` are operators, `(`, `|`, `+` literals.
    Basic,
    /// POSIX extended syntax.
    #[default]
    Extended,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Basic => f.write_str("basic"),
            Flavor::Extended => f.write_str("extended"),
        }
    }
}

/// Map a regex type name to its syntax class.
pub fn translate_flavor(name: &str) -> Result<Flavor> {
    if EXTENDED_NAMES.contains(&name) {
        Ok(Flavor::Extended)
    } else if BASIC_NAMES.contains(&name) {
        Ok(Flavor::Basic)
    } else {
        Err(Error::RegexFlavor(name.to_string()))
    }
}

/// All supported regex type names.
pub fn flavor_names() -> impl Iterator<Item = &'static str> {
    EXTENDED_NAMES.iter().chain(BASIC_NAMES.iter()).copied()
}

impl Flavor {
    /// Rewrite `pattern` into `regex` crate syntax (unanchored).
    ///
    /// Backreferences have no `regex` equivalent and are rejected.
    pub fn translate(self, pattern: &str) -> Result<String> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut out = String::with_capacity(pattern.len() + 8);
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\\' => {
                    i += 1;
                    match chars.get(i) {
                        Some(&next @ '1'..='9') => {
                            return Err(Error::RegexCompile {
                                pattern: pattern.to_string(),
                                message: format!("backreference \\{} is not supported", next),
                            });
                        }
                        Some(&next) => self.push_escape(&mut out, next),
                        None => out.push_str(r"\\"),
                    }
                }
                '[' => {
                    i = copy_bracket(&chars, i, &mut out);
                    continue;
                }
                '(' | ')' | '|' | '+' | '?' | '{' | '}' if self == Flavor::Basic => {
                    push_literal(&mut out, c);
                }
                '*' if self == Flavor::Basic && at_expression_start(&out) => {
                    push_literal(&mut out, c);
                }
                '^' if self == Flavor::Basic && !at_expression_start(&out) => {
                    push_literal(&mut out, c);
                }
                '$' if self == Flavor::Basic && !at_expression_end(&chars, i) => {
                    push_literal(&mut out, c);
                }
                _ => out.push(c),
            }
            i += 1;
        }

        Ok(out)
    }

    fn push_escape(self, out: &mut String, c: char) {
        match c {
            '(' | ')' | '|' | '+' | '?' | '{' | '}' if self == Flavor::Basic => out.push(c),
            '<' | '>' => out.push_str(r"\b"),
            '`' => out.push_str(r"\A"),
            '\'' => out.push_str(r"\z"),
            'w' | 'W' | 's' | 'S' | 'b' | 'B' => {
                out.push('\\');
                out.push(c);
            }
            'n' => out.push_str(r"\n"),
            't' => out.push_str(r"\t"),
            _ => push_literal(out, c),
        }
    }

    /// Compile `pattern` so that it must match a whole path.
    pub fn compile(self, pattern: &str, case_insensitive: bool) -> Result<Regex> {
        let anchored = format!("^(?:{})$", self.translate(pattern)?);
        RegexBuilder::new(&anchored)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| Error::RegexCompile {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }
}

fn push_literal(out: &mut String, c: char) {
    if c.is_ascii_alphanumeric() || !c.is_ascii() {
        out.push(c);
    } else {
        out.push_str(&regex::escape(&c.to_string()));
    }
}

/// True when nothing has been emitted yet in the current group.
fn at_expression_start(out: &str) -> bool {
    out.is_empty() || out.ends_with('(') && !out.ends_with(r"\(") || out == "^"
}

fn at_expression_end(chars: &[char], i: usize) -> bool {
    i + 1 == chars.len() || (chars.get(i + 1) == Some(&'\\') && chars.get(i + 2) == Some(&')'))
}

/// Copy a POSIX bracket expression starting at `chars[start] == '['`,
/// returning the index after its closing `]`. Backslashes are literal in
/// POSIX brackets and get escaped; an unterminated bracket is emitted as
/// a literal `[`.
fn copy_bracket(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut i = start + 1;
    let mut body = String::from("[");

    if chars.get(i) == Some(&'^') {
        body.push('^');
        i += 1;
    }
    // a leading ']' is a member, not the terminator
    if chars.get(i) == Some(&']') {
        body.push_str(r"\]");
        i += 1;
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            ']' => {
                body.push(']');
                out.push_str(&body);
                return i + 1;
            }
            '[' if chars.get(i + 1) == Some(&':') => {
                let rest: String = chars[i..].iter().collect();
                match rest.find(":]") {
                    Some(end) => {
                        body.push_str(&rest[..end + 2]);
                        i += rest[..end + 2].chars().count();
                        continue;
                    }
                    None => body.push_str(r"\["),
                }
            }
            '\\' | '[' | '&' | '~' => {
                body.push('\\');
                body.push(c);
            }
            _ => body.push(c),
        }
        i += 1;
    }

    out.push_str(r"\[");
    start + 1
}
