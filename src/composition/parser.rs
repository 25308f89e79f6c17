//! Recursive-descent parser for chemical formulas
//!
//! Accepts element symbols with optional integer or decimal counts, nested
//! `(...)` / `[...]` groups with multipliers, and whitespace-separated forms
//! such as `"Y Ba2 Cu3 O6.5"`.

use std::collections::BTreeMap;

use super::Element;
use crate::{Error, Result};

pub(crate) fn parse_formula(input: &str) -> Result<BTreeMap<Element, f64>> {
    let mut parser = Parser {
        input,
        chars: input.chars().collect(),
        pos: 0,
    };
    let amounts = parser.group(None)?;
    if amounts.values().all(|&n| n <= 0.0) {
        return Err(parser.error("formula contains no atoms"));
    }
    Ok(amounts)
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidFormula {
            formula: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn group(&mut self, closing: Option<char>) -> Result<BTreeMap<Element, f64>> {
        let mut amounts = BTreeMap::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    if let Some(c) = closing {
                        return Err(self.error(format!("missing closing '{c}'")));
                    }
                    return Ok(amounts);
                }
                Some(c) if Some(c) == closing => {
                    self.pos += 1;
                    return Ok(amounts);
                }
                Some(open @ ('(' | '[')) => {
                    self.pos += 1;
                    let close = if open == '(' { ')' } else { ']' };
                    let inner = self.group(Some(close))?;
                    let multiplier = self.number()?.unwrap_or(1.0);
                    for (element, n) in inner {
                        *amounts.entry(element).or_insert(0.0) += n * multiplier;
                    }
                }
                Some(c) if c.is_ascii_uppercase() => {
                    let element = self.symbol()?;
                    let count = self.number()?.unwrap_or(1.0);
                    *amounts.entry(element).or_insert(0.0) += count;
                }
                Some(c) => return Err(self.error(format!("unexpected character '{c}'"))),
            }
        }
    }

    fn symbol(&mut self) -> Result<Element> {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
            self.pos += 1;
        }
        let symbol: String = self.chars[start..self.pos].iter().collect();
        Element::from_symbol(&symbol).ok_or_else(|| self.error(format!("unknown element '{symbol}'")))
    }

    fn number(&mut self) -> Result<Option<f64>> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Some)
            .map_err(|_| self.error(format!("invalid count '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(map: &BTreeMap<Element, f64>, symbol: &str) -> f64 {
        map.get(&Element::from_symbol(symbol).unwrap())
            .copied()
            .unwrap_or(0.0)
    }

    #[test]
    fn test_parse_simple() {
        let map = parse_formula("BaCO3").unwrap();
        assert_eq!(count(&map, "Ba"), 1.0);
        assert_eq!(count(&map, "C"), 1.0);
        assert_eq!(count(&map, "O"), 3.0);
    }

    #[test]
    fn test_parse_groups_and_spaces() {
        let map = parse_formula("Y2(CO3)3").unwrap();
        assert_eq!(count(&map, "Y"), 2.0);
        assert_eq!(count(&map, "C"), 3.0);
        assert_eq!(count(&map, "O"), 9.0);

        let map = parse_formula("Y Ba2 Cu3 O6.5").unwrap();
        assert_eq!(count(&map, "O"), 6.5);
        assert_eq!(count(&map, "Ba"), 2.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_formula("").is_err());
        assert!(parse_formula("Xq2").is_err());
        assert!(parse_formula("Ba(CO3").is_err());
        assert!(parse_formula("ba").is_err());
        assert!(parse_formula("Cu1.2.3").is_err());
    }
}
