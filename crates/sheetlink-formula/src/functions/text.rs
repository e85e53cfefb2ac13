//! Text functions

use crate::error::FormulaResult;
use crate::evaluator::FormulaValue;

use super::scalar_arg;

/// CONCAT(text1, [text2], ...)
pub fn fn_concat(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let out: String = args
        .iter()
        .flat_map(FormulaValue::members)
        .map(FormulaValue::as_string)
        .collect();
    Ok(FormulaValue::String(out))
}

/// Text of a single-valued argument, or the error that prevents it
fn text_arg(args: &[FormulaValue]) -> Result<String, FormulaValue> {
    let value = scalar_arg(args, 0);
    if value.is_error() {
        return Err(value);
    }
    Ok(value.as_string())
}

/// LEN(text): number of characters
pub fn fn_len(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(match text_arg(args) {
        Ok(s) => FormulaValue::Number(s.chars().count() as f64),
        Err(e) => e,
    })
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(text_arg(args).map_or_else(|e| e, |s| FormulaValue::String(s.to_uppercase())))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(text_arg(args).map_or_else(|e| e, |s| FormulaValue::String(s.to_lowercase())))
}

/// TRIM(text): strips leading and trailing whitespace and collapses inner runs
pub fn fn_trim(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(text_arg(args).map_or_else(
        |e| e,
        |s| FormulaValue::String(s.split_whitespace().collect::<Vec<_>>().join(" ")),
    ))
}
