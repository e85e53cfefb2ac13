//! Math and aggregate functions
//!
//! Aggregates walk every member of every argument, so a range and a list of
//! separate arguments behave the same.

use crate::error::FormulaResult;
use crate::evaluator::FormulaValue;
use sheetlink_core::CellError;

use super::number_arg;

fn numbers(args: &[FormulaValue]) -> impl Iterator<Item = f64> + '_ {
    args.iter()
        .flat_map(FormulaValue::members)
        .filter_map(|value| match value {
            FormulaValue::Number(n) => Some(*n),
            _ => None,
        })
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(numbers(args).sum()))
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let mut sum = 0.0;
    let mut count = 0;

    for n in numbers(args) {
        sum += n;
        count += 1;
    }

    if count == 0 {
        Ok(FormulaValue::Error(CellError::div0()))
    } else {
        Ok(FormulaValue::Number(sum / count as f64))
    }
}

/// COUNT function: numeric members
pub fn fn_count(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(numbers(args).count() as f64))
}

/// COUNTA function: non-blank members
pub fn fn_counta(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(FormulaValue::members)
        .filter(|value| !matches!(value, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// MIN function
pub fn fn_min(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let min = numbers(args).fold(None, |min: Option<f64>, n| Some(min.map_or(n, |m| m.min(n))));
    Ok(FormulaValue::Number(min.unwrap_or(0.0)))
}

/// MAX function
pub fn fn_max(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let max = numbers(args).fold(None, |max: Option<f64>, n| Some(max.map_or(n, |m| m.max(n))));
    Ok(FormulaValue::Number(max.unwrap_or(0.0)))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(number_arg(args, 0)?.abs()))
}

/// ROUND(number, [num_digits]), rounding half away from zero
pub fn fn_round(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let number = number_arg(args, 0)?;
    let num_digits = number_arg(args, 1)?.trunc() as i32;

    // Negative digits round to the left of the decimal point
    let multiplier = 10_f64.powi(num_digits);

    let result = if number >= 0.0 {
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        (number * multiplier - 0.5).ceil() / multiplier
    };

    Ok(FormulaValue::Number(result))
}
