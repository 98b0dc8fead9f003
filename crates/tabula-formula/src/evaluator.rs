//! Expression evaluator
//!
//! Evaluates expression ASTs against one row's reference bindings.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use tabula_core::Scalar;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Value types during evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    #[default]
    Empty,
}

impl Value {
    /// Create a text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    /// Numeric view for arithmetic: booleans count as 1/0, empty as 0
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(true) => Some(1.0),
            Value::Boolean(false) => Some(0.0),
            Value::Empty => Some(0.0),
            Value::Text(_) => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number().ok_or_else(|| {
            FormulaError::Evaluation(format!("Expected number, got {}", self.type_name()))
        })
    }

    /// Truthiness: non-zero numbers, non-empty text, `True`
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Empty => false,
        }
    }

    /// Check if the value is text
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Empty => "empty",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Empty => Ok(()),
        }
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Empty => Value::Empty,
            Scalar::Number(n) => Value::Number(n),
            Scalar::Text(s) => Value::Text(s),
        }
    }
}

impl From<&Scalar> for Value {
    fn from(value: &Scalar) -> Self {
        value.clone().into()
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Empty => Scalar::Empty,
            Value::Number(n) => Scalar::Number(n),
            Value::Text(s) => Scalar::Text(s),
            Value::Boolean(b) => Scalar::Text(Value::Boolean(b).to_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

/// Context for expression evaluation
///
/// Holds the value bound to each reference slot for the row being
/// evaluated. `None` marks a reference that could not be resolved for this
/// row; reading it fails the row.
pub struct EvaluationContext<'a> {
    bindings: &'a [Option<Value>],
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(bindings: &'a [Option<Value>]) -> Self {
        Self { bindings }
    }

    /// Create a context with no bindings (for constant expressions)
    pub fn simple() -> Self {
        Self { bindings: &[] }
    }

    /// Value bound to a slot
    pub fn slot(&self, index: usize) -> FormulaResult<Value> {
        self.bindings
            .get(index)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| FormulaError::UnresolvedReference(format!("slot {}", index)))
    }
}

/// Evaluate an expression
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> FormulaResult<Value> {
    match expr {
        // === Literals ===
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),

        // === References ===
        Expr::Slot(index) => ctx.slot(*index),

        // === Operators ===
        Expr::Binary { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        Expr::Unary { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        Expr::Call { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    ctx: &EvaluationContext,
) -> FormulaResult<Value> {
    // Boolean operators short-circuit and yield the deciding operand
    match op {
        BinaryOperator::And => {
            let l = evaluate(left, ctx)?;
            if !l.is_truthy() {
                return Ok(l);
            }
            return evaluate(right, ctx);
        }
        BinaryOperator::Or => {
            let l = evaluate(left, ctx)?;
            if l.is_truthy() {
                return Ok(l);
            }
            return evaluate(right, ctx);
        }
        _ => {}
    }

    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    if op.is_comparison() {
        return compare(op, &left_val, &right_val).map(Value::Boolean);
    }

    // Text concatenation
    if op == BinaryOperator::Add && (left_val.is_text() || right_val.is_text()) {
        return match (&left_val, &right_val) {
            (Value::Text(l), Value::Text(r)) => Ok(Value::Text(format!("{}{}", l, r))),
            (Value::Text(l), Value::Empty) | (Value::Empty, Value::Text(l)) => {
                Ok(Value::Text(l.clone()))
            }
            _ => Err(type_mismatch("+", &left_val, &right_val)),
        };
    }

    let (l, r) = match (left_val.as_number(), right_val.as_number()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(type_mismatch(symbol(op), &left_val, &right_val)),
    };

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            l / r
        }
        BinaryOperator::Modulo => {
            if r == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            // Floored modulo: the result takes the sign of the divisor
            l - r * (l / r).floor()
        }
        BinaryOperator::Power => {
            if l == 0.0 && r < 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            let result = l.powf(r);
            if result.is_nan() {
                return Err(FormulaError::Evaluation(format!(
                    "{} ** {} is not a real number",
                    l, r
                )));
            }
            result
        }
        _ => unreachable!("comparison and boolean operators handled above"),
    };

    Ok(Value::Number(result))
}

fn symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Subtract => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Modulo => "%",
        BinaryOperator::Power => "**",
        BinaryOperator::Equal => "==",
        BinaryOperator::NotEqual => "!=",
        BinaryOperator::LessThan => "<",
        BinaryOperator::LessEqual => "<=",
        BinaryOperator::GreaterThan => ">",
        BinaryOperator::GreaterEqual => ">=",
        BinaryOperator::And => "and",
        BinaryOperator::Or => "or",
    }
}

fn type_mismatch(op: &str, left: &Value, right: &Value) -> FormulaError {
    FormulaError::Evaluation(format!(
        "Unsupported operand types for {}: {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

/// Comparable form of a value: empty cells compare as the empty string
enum Comparable<'a> {
    Number(f64),
    Text(&'a str),
}

fn comparable(value: &Value) -> Comparable<'_> {
    match value {
        Value::Text(s) => Comparable::Text(s),
        Value::Empty => Comparable::Text(""),
        Value::Number(n) => Comparable::Number(*n),
        Value::Boolean(b) => Comparable::Number(if *b { 1.0 } else { 0.0 }),
    }
}

/// Compare two values
///
/// Equality across number and text is simply `false`; ordering across them
/// is a type error.
fn compare(op: BinaryOperator, left: &Value, right: &Value) -> FormulaResult<bool> {
    let ordering = match (comparable(left), comparable(right)) {
        (Comparable::Number(l), Comparable::Number(r)) => l.partial_cmp(&r),
        (Comparable::Text(l), Comparable::Text(r)) => Some(l.cmp(r)),
        _ => match op {
            BinaryOperator::Equal => return Ok(false),
            BinaryOperator::NotEqual => return Ok(true),
            _ => return Err(type_mismatch(symbol(op), left, right)),
        },
    };

    // NaN compares unequal to everything
    let Some(ordering) = ordering else {
        return Ok(op == BinaryOperator::NotEqual);
    };

    Ok(match op {
        BinaryOperator::Equal => ordering == Ordering::Equal,
        BinaryOperator::NotEqual => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    })
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &Expr,
    ctx: &EvaluationContext,
) -> FormulaResult<Value> {
    let val = evaluate(operand, ctx)?;

    match op {
        UnaryOperator::Negate => Ok(Value::Number(-val.to_number()?)),
        UnaryOperator::Plus => Ok(Value::Number(val.to_number()?)),
        UnaryOperator::Not => Ok(Value::Boolean(!val.is_truthy())),
    }
}

/// Evaluate a function call
fn evaluate_function(name: &str, args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    // IF only evaluates the selected branch
    if name == "IF" {
        if args.len() != 3 {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: "3".into(),
                actual: args.len(),
            });
        }
        let branch = if evaluate(&args[0], ctx)?.is_truthy() {
            &args[1]
        } else {
            &args[2]
        };
        return evaluate(branch, ctx);
    }

    let registry = get_function_registry();

    let func = registry
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    // Check argument count
    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }
    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, ctx))
        .collect::<FormulaResult<Vec<_>>>()?;

    (func.implementation)(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn eval(text: &str) -> FormulaResult<Value> {
        let ast = parse_expression(text)?;
        let ctx = EvaluationContext::simple();
        evaluate(&ast, &ctx)
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Number(9.0));
        assert_eq!(eval("2 ** 3 ** 2").unwrap(), Value::Number(512.0));
        assert_eq!(eval("-2 ** 2").unwrap(), Value::Number(-4.0));
        assert_eq!(eval("7 % 3").unwrap(), Value::Number(1.0));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Number(2.0));
        assert_eq!(eval("True + True").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(eval("1 / 0"), Err(FormulaError::DivisionByZero));
        assert_eq!(eval("1 % 0"), Err(FormulaError::DivisionByZero));
        assert_eq!(eval("0 ** -1"), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn test_evaluate_text() {
        assert_eq!(eval("\"ab\" + 'cd'").unwrap(), Value::text("abcd"));
        assert!(matches!(
            eval("\"ab\" + 1"),
            Err(FormulaError::Evaluation(_))
        ));
        assert!(eval("\"ab\" * 2").is_err());
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("1 < 2").unwrap(), Value::Boolean(true));
        assert_eq!(eval("2 = 2.0").unwrap(), Value::Boolean(true));
        assert_eq!(eval("\"a\" <> \"b\"").unwrap(), Value::Boolean(true));
        assert_eq!(eval("\"b\" > \"a\"").unwrap(), Value::Boolean(true));
        assert_eq!(eval("1 == \"1\"").unwrap(), Value::Boolean(false));
        assert_eq!(eval("True == 1").unwrap(), Value::Boolean(true));
        assert!(eval("1 < \"2\"").is_err());
        assert_eq!(eval("1 < 5 < 3").unwrap(), Value::Boolean(false));
        assert_eq!(eval("1 < 2 < 3").unwrap(), Value::Boolean(true));
        assert_eq!(eval("3 > 2 == 2").unwrap(), Value::Boolean(true));
        // The middle operand is only compared when the first link holds
        assert_eq!(eval("2 < 1 < 1 / 0").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_evaluate_boolean_operators() {
        assert_eq!(eval("1 < 2 and 2 < 3").unwrap(), Value::Boolean(true));
        assert_eq!(eval("False or 0").unwrap(), Value::Number(0.0));
        assert_eq!(eval("0 or 5").unwrap(), Value::Number(5.0));
        assert_eq!(eval("2 and 3").unwrap(), Value::Number(3.0));
        assert_eq!(eval("\"\" and 1 / 0").unwrap(), Value::text(""));
        assert_eq!(eval("not \"\"").unwrap(), Value::Boolean(true));
        // Right side is never evaluated
        assert_eq!(eval("False and 1 / 0").unwrap(), Value::Boolean(false));
        assert_eq!(eval("True or 1 / 0").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_evaluate_if_is_lazy() {
        assert_eq!(eval("IF(1 > 0, 10, 1 / 0)").unwrap(), Value::Number(10.0));
        assert_eq!(eval("if(0, 1 / 0, \"no\")").unwrap(), Value::text("no"));
        assert!(matches!(
            eval("IF(1, 2)"),
            Err(FormulaError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_evaluate_functions() {
        assert_eq!(eval("MAX(1, 5, 3)").unwrap(), Value::Number(5.0));
        assert_eq!(eval("min(4, -2)").unwrap(), Value::Number(-2.0));
        assert_eq!(eval("ABS(-3)").unwrap(), Value::Number(3.0));
        assert_eq!(eval("ROUND(2.5)").unwrap(), Value::Number(2.0));
        assert_eq!(eval("ROUND(3.5)").unwrap(), Value::Number(4.0));
        assert_eq!(eval("ROUND(0.5)").unwrap(), Value::Number(0.0));
        assert_eq!(eval("ROUND(-2.5)").unwrap(), Value::Number(-2.0));
        assert_eq!(eval("ROUND(1.2345, 2)").unwrap(), Value::Number(1.23));
        assert!(matches!(
            eval("SUM(1, 2)"),
            Err(FormulaError::UnknownFunction(_))
        ));
        assert!(matches!(
            eval("ABS()"),
            Err(FormulaError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_evaluate_slots() {
        let ast = parse_expression("1").unwrap();
        let bindings = vec![Some(Value::Number(4.0)), None];
        let ctx = EvaluationContext::new(&bindings);
        assert_eq!(evaluate(&ast, &ctx).unwrap(), Value::Number(1.0));
        assert_eq!(evaluate(&Expr::Slot(0), &ctx).unwrap(), Value::Number(4.0));
        assert!(matches!(
            evaluate(&Expr::Slot(1), &ctx),
            Err(FormulaError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(50.0).to_string(), "50");
        assert_eq!(Value::Boolean(false).to_string(), "False");
        assert_eq!(Scalar::from(Value::Boolean(true)), Scalar::text("True"));
    }
}
