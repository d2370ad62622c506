//! Operator evaluation.
//!
//! Turns `(column, operator, value)` into a predicate. Values are coerced to
//! the column's type and always bound as parameters. A `None` result means
//! the item contributes nothing (e.g. `isAnyOf` with an empty list).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::catalog::ColumnType;
use crate::compile::CompileError;
use crate::sql::{param, Expr, ExprExt, Value};

/// Escape character used in every LIKE pattern the evaluator emits.
pub const ESCAPE_CHAR: char = '\\';

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Filter operators understood by the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    IsEmpty,
    IsNotEmpty,
    IsAnyOf,
    IsNotOf,
    Gt,
    Lt,
    Gte,
    Lte,
    After,
    Before,
    OnOrAfter,
    OnOrBefore,
    StartsWith,
    EndsWith,
    Contains,
    DoesNotContain,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "=" | "==" | "equals" | "is" => Operator::Equals,
            "!=" | "<>" | "doesNotEqual" | "not" => Operator::NotEquals,
            "isEmpty" => Operator::IsEmpty,
            "isNotEmpty" => Operator::IsNotEmpty,
            "isAnyOf" => Operator::IsAnyOf,
            "isNotOf" => Operator::IsNotOf,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "after" => Operator::After,
            "before" => Operator::Before,
            "onOrAfter" => Operator::OnOrAfter,
            "onOrBefore" => Operator::OnOrBefore,
            "startsWith" => Operator::StartsWith,
            "endsWith" => Operator::EndsWith,
            "contains" => Operator::Contains,
            "doesNotContain" => Operator::DoesNotContain,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "doesNotEqual",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::IsAnyOf => "isAnyOf",
            Operator::IsNotOf => "isNotOf",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::After => "after",
            Operator::Before => "before",
            Operator::OnOrAfter => "onOrAfter",
            Operator::OnOrBefore => "onOrBefore",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesNotContain",
        }
    }

    /// Whether this operator is valid against a column of type `ty`.
    pub fn supports(&self, ty: ColumnType) -> bool {
        use Operator::*;
        match self {
            IsEmpty | IsNotEmpty => true,
            _ if matches!(ty, ColumnType::Json) => false,
            Equals | NotEquals | IsAnyOf | IsNotOf => true,
            Gt | Lt | Gte | Lte => matches!(
                ty,
                ColumnType::Int | ColumnType::Float | ColumnType::Timestamp
            ),
            After | Before | OnOrAfter | OnOrBefore => matches!(ty, ColumnType::Timestamp),
            StartsWith | EndsWith | Contains | DoesNotContain => matches!(ty, ColumnType::Text),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escape `%`, `_` and `\` so a value matches literally inside LIKE.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push(ESCAPE_CHAR);
        }
        out.push(ch);
    }
    out
}

/// Parse a date-time, falling back to a date at midnight.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// A membership test against a related table.
///
/// `inner` restricts the related rows; `None` means any row of the relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub inner: Option<Expr>,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorEvaluator {
    escape_does_not_contain: bool,
}

impl OperatorEvaluator {
    pub fn new(escape_does_not_contain: bool) -> Self {
        Self {
            escape_does_not_contain,
        }
    }

    /// Build the predicate for one filter item against `column`.
    ///
    /// `percent` marks columns stored as fractions but entered as percentages.
    pub fn evaluate(
        &self,
        field: &str,
        column: Expr,
        ty: ColumnType,
        op: Operator,
        value: &JsonValue,
        percent: bool,
    ) -> Result<Option<Expr>, CompileError> {
        if !op.supports(ty) {
            return Err(CompileError::unsupported_operator(field, op.as_str(), ty));
        }

        let predicate = match op {
            Operator::IsEmpty => column.is_null(),
            Operator::IsNotEmpty => column.is_not_null(),
            Operator::Equals if value.is_null() => column.is_null(),
            Operator::NotEquals if value.is_null() => column.is_not_null(),
            Operator::Equals => column.eq(param(coerce(field, ty, value, percent)?)),
            Operator::NotEquals => column.ne(param(coerce(field, ty, value, percent)?)),
            Operator::IsAnyOf | Operator::IsNotOf => {
                let values = list_values(value);
                if values.is_empty() {
                    return Ok(None);
                }
                let params = values
                    .into_iter()
                    .map(|v| coerce(field, ty, v, percent).map(param))
                    .collect::<Result<Vec<_>, _>>()?;
                if op == Operator::IsAnyOf {
                    column.in_list(params)
                } else {
                    column.not_in_list(params)
                }
            }
            _ if is_blank(value) => return Ok(None),
            Operator::Gt | Operator::After => column.gt(param(coerce(field, ty, value, percent)?)),
            Operator::Lt | Operator::Before => column.lt(param(coerce(field, ty, value, percent)?)),
            Operator::Gte | Operator::OnOrAfter => {
                column.gte(param(coerce(field, ty, value, percent)?))
            }
            Operator::Lte | Operator::OnOrBefore => {
                column.lte(param(coerce(field, ty, value, percent)?))
            }
            Operator::StartsWith => {
                let text = text_value(field, value)?;
                column.ilike_escape(param(format!("{}%", escape_like(&text))), ESCAPE_CHAR)
            }
            Operator::EndsWith => {
                let text = text_value(field, value)?;
                column.ilike_escape(param(format!("%{}", escape_like(&text))), ESCAPE_CHAR)
            }
            Operator::Contains => {
                let text = text_value(field, value)?;
                column.ilike_escape(param(format!("%{}%", escape_like(&text))), ESCAPE_CHAR)
            }
            Operator::DoesNotContain => {
                let text = text_value(field, value)?;
                if self.escape_does_not_contain {
                    column.not_ilike_escape(
                        param(format!("%{}%", escape_like(&text))),
                        ESCAPE_CHAR,
                    )
                } else {
                    column.not_ilike(param(format!("%{}%", text)))
                }
            }
        };

        Ok(Some(predicate))
    }

    /// Build a membership test for a one-to-many text relation (tags, users).
    ///
    /// Negative operators become the negation of the positive membership so
    /// artists without any related row still match `doesNotContain`.
    pub fn membership(
        &self,
        field: &str,
        column: Expr,
        op: Operator,
        value: &JsonValue,
    ) -> Result<Option<Membership>, CompileError> {
        let (positive, negated) = match op {
            Operator::IsEmpty => {
                return Ok(Some(Membership {
                    inner: None,
                    negated: true,
                }))
            }
            Operator::IsNotEmpty => {
                return Ok(Some(Membership {
                    inner: None,
                    negated: false,
                }))
            }
            Operator::NotEquals => (Operator::Equals, true),
            Operator::IsNotOf => (Operator::IsAnyOf, true),
            Operator::DoesNotContain => (Operator::Contains, true),
            Operator::Equals
            | Operator::IsAnyOf
            | Operator::StartsWith
            | Operator::EndsWith
            | Operator::Contains => (op, false),
            _ => {
                return Err(CompileError::unsupported_operator(
                    field,
                    op.as_str(),
                    ColumnType::Text,
                ))
            }
        };

        if is_blank(value) {
            return Ok(None);
        }

        let inner = if op == Operator::DoesNotContain && !self.escape_does_not_contain {
            let text = text_value(field, value)?;
            Some(column.ilike(param(format!("%{}%", text))))
        } else {
            self.evaluate(field, column, ColumnType::Text, positive, value, false)?
        };

        Ok(inner.map(|inner| Membership {
            inner: Some(inner),
            negated,
        }))
    }
}

/// The `organization.attribution_type` flag: `"true"` means the artist came
/// from a playlist, `"false"` that it was added by hand. A null value is an
/// unselected dropdown and adds no predicate, like any other blank filter.
pub fn attribution_operator(field: &str, value: &JsonValue) -> Result<Option<Operator>, CompileError> {
    match value {
        // unselected
        JsonValue::Null => Ok(None),
        JsonValue::Bool(true) => Ok(Some(Operator::IsNotEmpty)),
        JsonValue::Bool(false) => Ok(Some(Operator::IsEmpty)),
        JsonValue::String(s) if s == "true" => Ok(Some(Operator::IsNotEmpty)),
        JsonValue::String(s) if s == "false" => Ok(Some(Operator::IsEmpty)),
        other => Err(CompileError::invalid_value(
            field,
            other,
            "expected \"true\" or \"false\"",
        )),
    }
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn list_values(value: &JsonValue) -> Vec<&JsonValue> {
    match value {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        scalar => vec![scalar],
    }
}

fn text_value(field: &str, value: &JsonValue) -> Result<String, CompileError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => Err(CompileError::invalid_value(field, other, "expected text")),
    }
}

fn number_value(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn integer_value(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Coerce a JSON value to the bound value for a column of type `ty`.
fn coerce(field: &str, ty: ColumnType, value: &JsonValue, percent: bool) -> Result<Value, CompileError> {
    let invalid = |reason: &str| CompileError::invalid_value(field, value, reason);

    match ty {
        ColumnType::Text => text_value(field, value).map(Value::Text),
        ColumnType::Int => integer_value(value)
            .map(Value::Int)
            .ok_or_else(|| invalid("expected an integer")),
        ColumnType::Float => {
            let n = number_value(value).ok_or_else(|| invalid("expected a number"))?;
            Ok(Value::Float(if percent { n / 100.0 } else { n }))
        }
        ColumnType::Bool => match value {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(Value::Bool(true)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") || s == "0" => {
                Ok(Value::Bool(false))
            }
            JsonValue::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
            JsonValue::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
            _ => Err(invalid("expected a boolean")),
        },
        ColumnType::Timestamp => match value {
            JsonValue::String(s) => parse_date(s)
                .map(Value::Timestamp)
                .ok_or_else(|| CompileError::invalid_date(field, s)),
            other => Err(CompileError::invalid_date(field, &other.to_string())),
        },
        ColumnType::Uuid => match value {
            JsonValue::String(s) => uuid::Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|_| invalid("expected a UUID")),
            _ => Err(invalid("expected a UUID")),
        },
        ColumnType::Choice(_) => {
            let code = match value {
                JsonValue::String(s) => ty
                    .choice_code(s.trim())
                    .or_else(|| s.trim().parse::<i64>().ok()),
                other => integer_value(other),
            };
            code.filter(|c| ty.choice_label(*c).is_some())
                .map(Value::Int)
                .ok_or_else(|| invalid("unknown choice"))
        }
        ColumnType::Json => Err(invalid("documents cannot be compared")),
    }
}
