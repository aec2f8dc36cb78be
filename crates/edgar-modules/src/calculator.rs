//! Two-operand arithmetic from words or symbols.
//!
//! Understands "plus", "minus", "times", "multiplied by", "divided by",
//! "over" and the symbols `+ - * x /`. An utterance with no recognisable
//! expression is declined so the rule's static response is used.

use std::sync::LazyLock;

use edgar_chat::{ModuleError, ModuleHandler, ModuleRequest};
use regex::Regex;
use tracing::debug;

pub const KEY: &str = "calculator";

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(-?\d+(?:\.\d+)?)\s*(plus|\+|minus|-|times|multiplied\s+by|x|\*|divided\s+by|over|/)\s*(-?\d+(?:\.\d+)?)",
    )
    .expect("Invalid calculator regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn parse(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        let word = word.split_whitespace().next().unwrap_or_default();
        match word {
            "plus" | "+" => Some(Operator::Add),
            "minus" | "-" => Some(Operator::Subtract),
            "times" | "multiplied" | "x" | "*" => Some(Operator::Multiply),
            "divided" | "over" | "/" => Some(Operator::Divide),
            _ => None,
        }
    }

    fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '×',
            Operator::Divide => '÷',
        }
    }
}

/// A parsed `lhs op rhs` expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expression {
    pub lhs: f64,
    pub op: Operator,
    pub rhs: f64,
}

impl Expression {
    /// First expression found in `text`.
    pub fn find(text: &str) -> Option<Self> {
        let caps = EXPRESSION.captures(text)?;
        Some(Self {
            lhs: caps[1].parse().ok()?,
            op: Operator::parse(&caps[2])?,
            rhs: caps[3].parse().ok()?,
        })
    }

    /// `None` on division by zero.
    pub fn evaluate(&self) -> Option<f64> {
        match self.op {
            Operator::Add => Some(self.lhs + self.rhs),
            Operator::Subtract => Some(self.lhs - self.rhs),
            Operator::Multiply => Some(self.lhs * self.rhs),
            Operator::Divide if self.rhs == 0.0 => None,
            Operator::Divide => Some(self.lhs / self.rhs),
        }
    }
}

pub struct CalculatorModule;

impl ModuleHandler for CalculatorModule {
    fn key(&self) -> &str {
        KEY
    }

    fn handle(&self, request: &ModuleRequest<'_>) -> Result<Option<String>, ModuleError> {
        let Some(expr) = Expression::find(request.utterance) else {
            debug!(utterance = request.utterance, "No arithmetic expression found");
            return Ok(None);
        };
        let Some(result) = expr.evaluate() else {
            return Ok(Some("I can't divide by zero!".to_string()));
        };
        if !result.is_finite() {
            return Err(ModuleError::Failed {
                key: KEY.to_string(),
                reason: format!("result of {:?} is not finite", expr),
            });
        }
        Ok(Some(format!(
            "{} {} {} = {}",
            format_number(expr.lhs),
            expr.op.symbol(),
            format_number(expr.rhs),
            format_number(result)
        )))
    }
}

/// Whole numbers without a fraction, everything else to two places.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.2}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgar_chat::RuleId;

    fn calc(utterance: &str) -> Option<String> {
        let id = RuleId::from("calculate");
        let request = ModuleRequest {
            rule_id: &id,
            utterance,
            slots: &[],
        };
        CalculatorModule.handle(&request).unwrap()
    }

    // ---- Parsing ----

    #[test]
    fn test_find_word_operators() {
        let expr = Expression::find("what is 7 times 6").unwrap();
        assert_eq!(expr.op, Operator::Multiply);
        assert_eq!(expr.lhs, 7.0);
        assert_eq!(expr.rhs, 6.0);
        assert_eq!(
            Expression::find("10 Divided By 4").unwrap().op,
            Operator::Divide
        );
        assert_eq!(
            Expression::find("3 multiplied by 3").unwrap().op,
            Operator::Multiply
        );
    }

    #[test]
    fn test_find_symbols_and_negatives() {
        let expr = Expression::find("-4 + 2.5").unwrap();
        assert_eq!(expr.lhs, -4.0);
        assert_eq!(expr.op, Operator::Add);
        assert_eq!(expr.rhs, 2.5);
        assert_eq!(Expression::find("9x3").unwrap().op, Operator::Multiply);
        assert_eq!(Expression::find("9 - 3").unwrap().op, Operator::Subtract);
    }

    #[test]
    fn test_find_nothing() {
        assert!(Expression::find("calculate").is_none());
        assert!(Expression::find("what is two plus two").is_none());
    }

    // ---- Handler ----

    #[test]
    fn test_answers() {
        assert_eq!(calc("what is 7 times 6").as_deref(), Some("7 × 6 = 42"));
        assert_eq!(calc("what is 2 plus 2").as_deref(), Some("2 + 2 = 4"));
        assert_eq!(calc("10 minus 15").as_deref(), Some("10 - 15 = -5"));
        assert_eq!(calc("10 divided by 4").as_deref(), Some("10 ÷ 4 = 2.5"));
        assert_eq!(calc("1 / 3").as_deref(), Some("1 ÷ 3 = 0.33"));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(calc("5 divided by 0").as_deref(), Some("I can't divide by zero!"));
    }

    #[test]
    fn test_declines_without_expression() {
        assert_eq!(calc("calculate"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-5.0), "-5");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.3333), "0.33");
    }
}
