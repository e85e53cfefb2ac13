//! Logical functions

use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{ArgumentEvaluator, FormulaValue};

use super::scalar_arg;

/// IF(condition, value_if_true, [value_if_false])
///
/// Only the selected branch is evaluated.
pub fn fn_if(
    args: &[FormulaExpr],
    eval: &mut dyn ArgumentEvaluator,
) -> FormulaResult<FormulaValue> {
    let condition = eval.evaluate_scalar(&args[0]);
    if condition.is_error() {
        return Ok(condition);
    }

    if condition.to_bool()? {
        Ok(eval.evaluate(&args[1]))
    } else {
        match args.get(2) {
            Some(if_false) => Ok(eval.evaluate(if_false)),
            None => Ok(FormulaValue::Boolean(false)),
        }
    }
}

/// IFERROR(value, value_if_error)
///
/// `value_if_error` is only evaluated when `value` is an error.
pub fn fn_iferror(
    args: &[FormulaExpr],
    eval: &mut dyn ArgumentEvaluator,
) -> FormulaResult<FormulaValue> {
    let value = eval.evaluate(&args[0]);
    if value.first_error().is_some() {
        Ok(eval.evaluate(&args[1]))
    } else {
        Ok(value)
    }
}

/// Booleans and numbers among the members; text and blanks are skipped
fn logical_members(args: &[FormulaValue]) -> impl Iterator<Item = bool> + '_ {
    args.iter()
        .flat_map(FormulaValue::members)
        .filter_map(|value| match value {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            _ => None,
        })
}

fn no_logical_values(name: &str) -> FormulaError {
    FormulaError::Argument(format!("{} has no logical values to test", name))
}

/// AND function
pub fn fn_and(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let mut seen = false;
    for value in logical_members(args) {
        if !value {
            return Ok(FormulaValue::Boolean(false));
        }
        seen = true;
    }

    if seen {
        Ok(FormulaValue::Boolean(true))
    } else {
        Err(no_logical_values("AND"))
    }
}

/// OR function
pub fn fn_or(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let mut seen = false;
    for value in logical_members(args) {
        if value {
            return Ok(FormulaValue::Boolean(true));
        }
        seen = true;
    }

    if seen {
        Ok(FormulaValue::Boolean(false))
    } else {
        Err(no_logical_values("OR"))
    }
}

/// NOT function
pub fn fn_not(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let value = scalar_arg(args, 0);
    if value.is_error() {
        return Ok(value);
    }
    Ok(FormulaValue::Boolean(!value.to_bool()?))
}
