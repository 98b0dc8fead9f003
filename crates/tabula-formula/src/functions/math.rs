//! Math functions

use std::cmp::Ordering;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Value;

/// MAX(value, ...)
pub fn fn_max(args: &[Value]) -> FormulaResult<Value> {
    extreme("MAX", args, Ordering::Greater)
}

/// MIN(value, ...)
pub fn fn_min(args: &[Value]) -> FormulaResult<Value> {
    extreme("MIN", args, Ordering::Less)
}

/// Largest/smallest argument
///
/// All-text arguments compare lexically; otherwise every argument must be
/// numeric (booleans count as 1/0).
fn extreme(name: &str, args: &[Value], keep: Ordering) -> FormulaResult<Value> {
    if !args.is_empty() && args.iter().all(Value::is_text) {
        let mut best: Option<&Value> = None;
        for arg in args {
            if let (Value::Text(s), Some(Value::Text(b))) = (arg, best) {
                if s.as_str().cmp(b.as_str()) != keep {
                    continue;
                }
            }
            best = Some(arg);
        }
        return Ok(best.cloned().unwrap_or_default());
    }

    let mut best: Option<f64> = None;
    for arg in args {
        let n = arg.as_number().ok_or_else(|| {
            FormulaError::Argument(format!("{} cannot compare text with numbers", name))
        })?;
        best = Some(match best {
            Some(b) if b.partial_cmp(&n) == Some(keep) => b,
            _ => n,
        });
    }

    best.map(Value::Number)
        .ok_or_else(|| FormulaError::Argument(format!("{} requires at least one value", name)))
}

/// ABS(number)
pub fn fn_abs(args: &[Value]) -> FormulaResult<Value> {
    let n = number_arg("ABS", args, 0)?;
    Ok(Value::Number(n.abs()))
}

/// ROUND(number, [num_digits]) - rounds half away from zero
pub fn fn_round(args: &[Value]) -> FormulaResult<Value> {
    let number = number_arg("ROUND", args, 0)?;

    let num_digits = match args.get(1) {
        Some(_) => {
            let digits = number_arg("ROUND", args, 1)?;
            if digits.fract() != 0.0 {
                return Err(FormulaError::Argument(
                    "ROUND digits must be an integer".into(),
                ));
            }
            digits as i32
        }
        None => 0,
    };

    let multiplier = 10_f64.powi(num_digits);
    Ok(Value::Number(round_half_even(number * multiplier) / multiplier))
}

/// Round to the nearest integer, ties to the even neighbour
fn round_half_even(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        x.round()
    }
}

fn number_arg(name: &str, args: &[Value], index: usize) -> FormulaResult<f64> {
    let value = args.get(index).ok_or_else(|| {
        FormulaError::Argument(format!("{} is missing argument {}", name, index + 1))
    })?;
    value.as_number().ok_or_else(|| {
        FormulaError::Argument(format!(
            "{} expects a number, got {}",
            name,
            value.type_name()
        ))
    })
}
