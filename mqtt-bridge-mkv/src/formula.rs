//! Scaling formulas applied to decoded register values.
//!
//! Two spellings are accepted:
//!
//! - `value`, `value / 10`, `value * 1000`, `value / rawOf(3007.01) * 100`
//! - `HiU16`, `HiU16/10`, `UInt32*1000`, `UInt32/UInt32of3007.01*100`
//!
//! Keywords are case-insensitive and whitespace is ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use hubbridge_common::ReadingValue;

use crate::catalog::normalize_id;

/// Error parsing a formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("Empty formula")]
    Empty,

    #[error("Invalid formula '{0}'")]
    Syntax(String),

    #[error("Invalid literal '{literal}' in formula '{formula}': must be a positive number")]
    Literal { formula: String, literal: String },

    #[error("Invalid register reference '{reference}' in formula '{formula}'")]
    Reference { formula: String, reference: String },
}

/// How a register's extracted value becomes a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Formula {
    /// The extracted value itself, kept as an integer.
    Identity,
    /// `value / N`
    Divide(f64),
    /// `value * N`
    Multiply(f64),
    /// `value / rawOf(register) * factor`, where `rawOf` is the full raw
    /// field of an earlier register in the same answer.
    Ratio { register: String, factor: f64 },
}

impl Formula {
    /// Build a cross-register ratio. `register` must already be canonical.
    pub fn ratio(register: impl Into<String>, factor: f64) -> Self {
        Formula::Ratio {
            register: register.into(),
            factor,
        }
    }

    /// Register whose raw value this formula needs, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Formula::Ratio { register, .. } => Some(register),
            _ => None,
        }
    }

    /// Evaluate the formula.
    ///
    /// `reference` is the raw value of [`reference()`](Self::reference).
    /// A zero or missing divisor yields `0.0`.
    pub fn apply(&self, value: u64, reference: Option<u64>) -> ReadingValue {
        match self {
            Formula::Identity => ReadingValue::Integer(value),
            Formula::Divide(divisor) => ReadingValue::Scaled(value as f64 / divisor),
            Formula::Multiply(factor) => ReadingValue::Scaled(value as f64 * factor),
            Formula::Ratio { register, factor } => match reference {
                Some(raw) if raw != 0 => ReadingValue::Scaled(value as f64 / raw as f64 * factor),
                _ => {
                    tracing::debug!(register = %register, "Zero divisor in ratio, reporting 0");
                    ReadingValue::Scaled(0.0)
                }
            },
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Identity => write!(f, "value"),
            Formula::Divide(n) => write!(f, "value / {}", n),
            Formula::Multiply(n) => write!(f, "value * {}", n),
            Formula::Ratio { register, factor } => {
                write!(f, "value / rawOf({}) * {}", register, factor)
            }
        }
    }
}

const VALUE_TOKENS: [&str; 4] = ["value", "uint32", "hiu16", "lou16"];

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(FormulaError::Empty);
        }
        let lower = compact.to_ascii_lowercase();

        let rest = VALUE_TOKENS
            .iter()
            .find_map(|token| lower.strip_prefix(token))
            .ok_or_else(|| FormulaError::Syntax(s.to_string()))?;

        if rest.is_empty() {
            return Ok(Formula::Identity);
        }

        if let Some(call) = rest.strip_prefix("/rawof(") {
            let (id, tail) = call
                .split_once(')')
                .ok_or_else(|| FormulaError::Syntax(s.to_string()))?;
            let id = id.trim_matches(|c| c == '"' || c == '\'');
            return parse_ratio(s, id, tail);
        }

        if let Some(call) = rest.strip_prefix("/uint32of") {
            let (id, tail) = match call.find('*') {
                Some(pos) => call.split_at(pos),
                None => (call, ""),
            };
            return parse_ratio(s, id, tail);
        }

        if let Some(n) = rest.strip_prefix('/') {
            return Ok(Formula::Divide(parse_literal(s, n)?));
        }
        if let Some(n) = rest.strip_prefix('*') {
            return Ok(Formula::Multiply(parse_literal(s, n)?));
        }

        Err(FormulaError::Syntax(s.to_string()))
    }
}

fn parse_ratio(formula: &str, id: &str, tail: &str) -> Result<Formula, FormulaError> {
    let register = normalize_id(id).map_err(|_| FormulaError::Reference {
        formula: formula.to_string(),
        reference: id.to_string(),
    })?;

    let factor = match tail {
        "" => 1.0,
        _ => match tail.strip_prefix('*') {
            Some(n) => parse_literal(formula, n)?,
            None => return Err(FormulaError::Syntax(formula.to_string())),
        },
    };

    Ok(Formula::Ratio { register, factor })
}

fn parse_literal(formula: &str, literal: &str) -> Result<f64, FormulaError> {
    match literal.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(FormulaError::Literal {
            formula: formula.to_string(),
            literal: literal.to_string(),
        }),
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_grammar() {
        assert_eq!("value".parse::<Formula>().unwrap(), Formula::Identity);
        assert_eq!("value / 1000".parse::<Formula>().unwrap(), Formula::Divide(1000.0));
        assert_eq!("Value*1000".parse::<Formula>().unwrap(), Formula::Multiply(1000.0));
        assert_eq!(
            "value / rawOf(\"3007.01\") * 100".parse::<Formula>().unwrap(),
            Formula::ratio("3007.01", 100.0)
        );
        assert_eq!(
            "value / rawOf(30070b)".parse::<Formula>().unwrap(),
            Formula::ratio("3007.0B", 1.0)
        );
    }

    #[test]
    fn test_parse_legacy_grammar() {
        assert_eq!("HiU16".parse::<Formula>().unwrap(), Formula::Identity);
        assert_eq!("HiU16/10".parse::<Formula>().unwrap(), Formula::Divide(10.0));
        assert_eq!("UInt32/3600".parse::<Formula>().unwrap(), Formula::Divide(3600.0));
        assert_eq!("UInt32*1000".parse::<Formula>().unwrap(), Formula::Multiply(1000.0));
        assert_eq!(
            "UInt32/UInt32of3007.01*100".parse::<Formula>().unwrap(),
            Formula::ratio("3007.01", 100.0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Formula>(), Err(FormulaError::Empty));
        assert!(matches!("x / 10".parse::<Formula>(), Err(FormulaError::Syntax(_))));
        assert!(matches!("value + 1".parse::<Formula>(), Err(FormulaError::Syntax(_))));
        assert!(matches!("value / 0".parse::<Formula>(), Err(FormulaError::Literal { .. })));
        assert!(matches!("value * -2".parse::<Formula>(), Err(FormulaError::Literal { .. })));
        assert!(matches!(
            "value / rawOf(30) * 100".parse::<Formula>(),
            Err(FormulaError::Reference { .. })
        ));
        assert!(matches!(
            "value / rawOf(3007.01".parse::<Formula>(),
            Err(FormulaError::Syntax(_))
        ));
    }

    #[test]
    fn test_display_parses_back() {
        let formula = Formula::ratio("3007.01", 100.0);
        assert_eq!(formula.to_string(), "value / rawOf(3007.01) * 100");
        assert_eq!(formula.to_string().parse::<Formula>().unwrap(), formula);
    }

    #[test]
    fn test_apply() {
        assert_eq!(Formula::Identity.apply(42, None), ReadingValue::Integer(42));
        assert_eq!(Formula::Divide(10.0).apply(215, None), ReadingValue::Scaled(21.5));
        assert_eq!(Formula::Multiply(1000.0).apply(3, None), ReadingValue::Scaled(3000.0));

        let ratio = Formula::ratio("3007.01", 100.0);
        assert_eq!(ratio.apply(50, Some(200)), ReadingValue::Scaled(25.0));
        assert_eq!(ratio.apply(50, Some(0)), ReadingValue::Scaled(0.0));
    }

    #[test]
    fn test_serde_uses_text() {
        let formula: Formula = serde_json::from_str("\"HiU16/1000\"").unwrap();
        assert_eq!(formula, Formula::Divide(1000.0));
        assert_eq!(serde_json::to_string(&formula).unwrap(), "\"value / 1000\"");
        assert!(serde_json::from_str::<Formula>("\"bogus\"").is_err());
    }
}
