//! Unit expressions.
//!
//! Unit formulas such as `code_density*code_velocity**2` or `km**2/s**2`
//! are parsed into a small expression tree and evaluated against a symbol
//! table. The same grammar covers the numeric `UNIT_*` defines found in
//! `definitions.h` (e.g. `(1.e3*CONST_pc)` or `sqrt(CONST_G*CONST_Msun/CONST_au)`).
//!
//! ```text
//! expr    := factor (('*' | '/') factor)*
//! factor  := atom (('**' | '^') integer)?
//! atom    := number | symbol | 'sqrt' '(' expr ')' | '(' expr ')'
//! ```

use super::Unit;
use crate::error::{PlutoError, Result};

/// Parsed unit expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitExpr {
    /// Empty expression: dimensionless, scale 1.
    One,
    Number(f64),
    Symbol(String),
    Product(Box<UnitExpr>, Box<UnitExpr>),
    Power(Box<UnitExpr>, i32),
    Sqrt(Box<UnitExpr>),
}

impl UnitExpr {
    /// Parse an expression string.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Ok(Self::One);
        }

        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(PlutoError::unit_syntax(
                source,
                format!("unexpected token {:?}", parser.tokens[parser.pos]),
            ));
        }
        Ok(expr)
    }

    /// Evaluate against a symbol table.
    ///
    /// `source` is only used for error messages.
    pub fn evaluate<F>(&self, lookup: &F, source: &str) -> Result<Unit>
    where
        F: Fn(&str) -> Option<Unit>,
    {
        match self {
            Self::One => Ok(Unit::dimensionless()),
            Self::Number(v) => Ok(Unit::scalar(*v)),
            Self::Symbol(name) => {
                lookup(name).ok_or_else(|| PlutoError::unknown_symbol(name.as_str(), source))
            }
            Self::Product(a, b) => Ok(a.evaluate(lookup, source)?.mul(&b.evaluate(lookup, source)?)),
            Self::Power(base, n) => Ok(base.evaluate(lookup, source)?.powi(*n)),
            Self::Sqrt(inner) => inner.evaluate(lookup, source)?.sqrt(),
        }
    }

    /// Collect every symbol referenced by the expression.
    pub fn symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Symbol(name) => out.push(name),
            Self::Product(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
            Self::Power(inner, _) | Self::Sqrt(inner) => inner.collect_symbols(out),
            Self::One | Self::Number(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
    Minus,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent part: 1.e3, 2e-5, 6.0E+23
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| {
                    PlutoError::unit_syntax(source, format!("invalid number '{}'", text))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(PlutoError::unit_syntax(
                    source,
                    format!("unexpected character '{}'", other),
                ))
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error(&self, message: impl Into<String>) -> PlutoError {
        PlutoError::unit_syntax(self.source, message)
    }

    fn expr(&mut self) -> Result<UnitExpr> {
        let mut lhs = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    lhs = UnitExpr::Product(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    lhs = UnitExpr::Product(Box::new(lhs), Box::new(UnitExpr::Power(Box::new(rhs), -1)));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn factor(&mut self) -> Result<UnitExpr> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::Pow) {
            return Ok(base);
        }
        self.pos += 1;

        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        let exponent = match self.next() {
            Some(Token::Number(v)) if v.fract() == 0.0 => v as i32,
            Some(Token::LParen) => {
                // allow `**(-3)`
                let inner = self.factor_exponent()?;
                match self.next() {
                    Some(Token::RParen) => inner,
                    _ => return Err(self.error("expected ')' after exponent")),
                }
            }
            other => return Err(self.error(format!("expected integer exponent, found {:?}", other))),
        };

        Ok(UnitExpr::Power(
            Box::new(base),
            if negative { -exponent } else { exponent },
        ))
    }

    fn factor_exponent(&mut self) -> Result<i32> {
        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.next() {
            Some(Token::Number(v)) if v.fract() == 0.0 => {
                Ok(if negative { -(v as i32) } else { v as i32 })
            }
            other => Err(self.error(format!("expected integer exponent, found {:?}", other))),
        }
    }

    fn atom(&mut self) -> Result<UnitExpr> {
        match self.next() {
            Some(Token::Number(v)) => Ok(UnitExpr::Number(v)),
            Some(Token::Ident(name)) if name == "sqrt" => {
                if self.next() != Some(Token::LParen) {
                    return Err(self.error("expected '(' after sqrt"));
                }
                let inner = self.expr()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(UnitExpr::Sqrt(Box::new(inner)))
            }
            Some(Token::Ident(name)) => Ok(UnitExpr::Symbol(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::constants::physical_unit;
    use crate::units::Dimension;

    #[test]
    fn test_parse_product_and_power() {
        let expr = UnitExpr::parse("code_density*code_velocity**2").unwrap();
        assert_eq!(expr.symbols(), vec!["code_density", "code_velocity"]);
        match expr {
            UnitExpr::Product(_, rhs) => assert!(matches!(*rhs, UnitExpr::Power(_, 2))),
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_is_one() {
        assert_eq!(UnitExpr::parse("").unwrap(), UnitExpr::One);
        assert_eq!(UnitExpr::parse("   ").unwrap(), UnitExpr::One);
    }

    #[test]
    fn test_evaluate_physical() {
        let expr = UnitExpr::parse("km**2/s**2").unwrap();
        let unit = expr.evaluate(&physical_unit, "km**2/s**2").unwrap();
        assert!((unit.scale() - 1.0e10).abs() < 1e-3);
        assert_eq!(
            unit.dimension(),
            Dimension::LENGTH.powi(2).mul(Dimension::TIME.powi(-2))
        );
    }

    #[test]
    fn test_negative_exponents() {
        let a = UnitExpr::parse("g*cm**-3").unwrap();
        let b = UnitExpr::parse("g/cm**3").unwrap();
        let b2 = UnitExpr::parse("g*cm^(-3)").unwrap();
        let ua = a.evaluate(&physical_unit, "").unwrap();
        let ub = b.evaluate(&physical_unit, "").unwrap();
        let ub2 = b2.evaluate(&physical_unit, "").unwrap();
        assert_eq!(ua, ub);
        assert_eq!(ub, ub2);
    }

    #[test]
    fn test_numeric_define() {
        let lookup = |name: &str| match name {
            "CONST_pc" => Some(Unit::scalar(3.0856775807e18)),
            _ => None,
        };
        let expr = UnitExpr::parse("(1.e3*CONST_pc)").unwrap();
        let unit = expr.evaluate(&lookup, "").unwrap();
        assert!((unit.scale() / 3.0856775807e21 - 1.0).abs() < 1e-12);
        assert!(unit.dimension().is_dimensionless());
    }

    #[test]
    fn test_sqrt() {
        let lookup = |_: &str| None;
        let unit = UnitExpr::parse("sqrt(16.0)").unwrap().evaluate(&lookup, "").unwrap();
        assert!((unit.scale() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_symbol() {
        let expr = UnitExpr::parse("code_mass/code_length**3").unwrap();
        let err = expr.evaluate(&physical_unit, "code_mass/code_length**3").unwrap_err();
        assert!(matches!(err, PlutoError::UnknownUnitSymbol { ref symbol, .. } if symbol == "code_mass"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(UnitExpr::parse("g/"), Err(PlutoError::UnitSyntax { .. })));
        assert!(matches!(UnitExpr::parse("g**1.5"), Err(PlutoError::UnitSyntax { .. })));
        assert!(matches!(UnitExpr::parse("(g"), Err(PlutoError::UnitSyntax { .. })));
        assert!(matches!(UnitExpr::parse("g + cm"), Err(PlutoError::UnitSyntax { .. })));
    }
}
