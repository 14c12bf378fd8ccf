//! Record-level semantics of the five transformation types.
//!
//! Everything here is synchronous; a `join` against a data source gets its
//! reference records fetched by the executor beforehand.

use crate::custom::CustomFunctions;
use catalog::{
    AggregateFunction, Aggregation, FilterOp, JoinReference, MapOperation, Predicate,
    TransformationConfig,
};
use common::error::diagnostics::DiagnosticMessage;
use common::types::Record;
use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid transformation config: {context}")]
    InvalidConfig { context: DiagnosticMessage },
    #[error("missing reference data: {context}")]
    MissingReference { context: DiagnosticMessage },
    #[error("custom function failed: {context}")]
    Custom { context: DiagnosticMessage },
}

impl TransformError {
    #[track_caller]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn missing_reference(message: impl Into<String>) -> Self {
        Self::MissingReference {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TransformError::InvalidConfig { context }
            | TransformError::MissingReference { context }
            | TransformError::Custom { context } => context.message(),
        }
    }
}

/// Apply one transformation to a dataset.
///
/// `reference` carries the records of a `join` whose reference is a data
/// source; it is ignored for every other type.
pub fn apply(
    config: &TransformationConfig,
    records: Vec<Record>,
    reference: Option<&[Record]>,
    custom: &CustomFunctions,
) -> Result<Vec<Record>, TransformError> {
    match config {
        TransformationConfig::Filter { predicate } => filter(predicate, records),
        TransformationConfig::Map { operations } => Ok(map(operations, records)),
        TransformationConfig::Aggregate {
            group_by,
            aggregations,
        } => aggregate(group_by, aggregations, &records),
        TransformationConfig::Join {
            reference: join_ref,
            left_key,
            right_key,
            prefix,
        } => {
            let right = match join_ref {
                JoinReference::Inline { records } => records.as_slice(),
                JoinReference::DataSource { id } => reference.ok_or_else(|| {
                    TransformError::missing_reference(format!(
                        "records of data source '{id}' were not provided"
                    ))
                })?,
            };
            Ok(join(records, right, left_key, right_key, prefix.as_deref()))
        }
        TransformationConfig::Custom { function, args } => {
            let f = custom.get(function).ok_or_else(|| {
                TransformError::invalid_config(format!(
                    "custom function '{function}' is not registered"
                ))
            })?;
            f(records, args).map_err(TransformError::custom)
        }
    }
}

/* ---------------- filter ---------------- */

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match compare(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn filter(predicate: &Predicate, records: Vec<Record>) -> Result<Vec<Record>, TransformError> {
    let needs_value = !matches!(predicate.op, FilterOp::Exists | FilterOp::NotExists);
    let expected = match (&predicate.value, needs_value) {
        (Some(v), _) => v.clone(),
        (None, false) => Value::Null,
        (None, true) => {
            return Err(TransformError::invalid_config(format!(
                "filter on '{}' needs a value for {:?}",
                predicate.field, predicate.op
            )))
        }
    };
    let pattern = match predicate.op {
        FilterOp::Matches => Some(Regex::new(&text(&expected)).map_err(|e| {
            TransformError::invalid_config(format!("invalid pattern for '{}': {e}", predicate.field))
        })?),
        _ => None,
    };

    let holds = |record: &Record| -> bool {
        let actual = record.get(&predicate.field).unwrap_or(&Value::Null);
        match predicate.op {
            FilterOp::Eq => loosely_equal(actual, &expected),
            FilterOp::Ne => !loosely_equal(actual, &expected),
            FilterOp::Gt => compare(actual, &expected) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare(actual, &expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare(actual, &expected) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare(actual, &expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Contains => match actual {
                Value::String(s) => s.contains(&text(&expected)),
                Value::Array(items) => items.iter().any(|i| loosely_equal(i, &expected)),
                _ => false,
            },
            FilterOp::Matches => match (actual, &pattern) {
                (Value::Null, _) | (_, None) => false,
                (value, Some(re)) => re.is_match(&text(value)),
            },
            FilterOp::Exists => !actual.is_null(),
            FilterOp::NotExists => actual.is_null(),
        }
    };

    Ok(records.into_iter().filter(|r| holds(r)).collect())
}

/* ---------------- map ---------------- */

fn map(operations: &[MapOperation], mut records: Vec<Record>) -> Vec<Record> {
    for record in records.iter_mut() {
        for op in operations {
            match op {
                MapOperation::Set { field, value } => {
                    record.insert(field.clone(), value.clone());
                }
                MapOperation::Copy { from, to } => {
                    if let Some(value) = record.get(from).cloned() {
                        record.insert(to.clone(), value);
                    }
                }
                MapOperation::Rename { from, to } => {
                    if let Some(value) = record.remove(from) {
                        record.insert(to.clone(), value);
                    }
                }
                MapOperation::Remove { field } => {
                    record.remove(field);
                }
                MapOperation::Uppercase { field } => {
                    if let Some(Value::String(s)) = record.get_mut(field) {
                        *s = s.to_uppercase();
                    }
                }
                MapOperation::Lowercase { field } => {
                    if let Some(Value::String(s)) = record.get_mut(field) {
                        *s = s.to_lowercase();
                    }
                }
            }
        }
    }
    records
}

/* ---------------- aggregate ---------------- */

// integral results stay integers so `sum` of ints looks like ints
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn numeric_values<'a>(rows: &'a [&'a Record], field: &'a str) -> impl Iterator<Item = f64> + 'a {
    rows.iter()
        .filter_map(move |r| r.get(field).and_then(Value::as_f64))
}

fn summarize(function: AggregateFunction, values: impl Iterator<Item = f64>) -> Value {
    match function {
        AggregateFunction::Count => Value::from(values.count()),
        AggregateFunction::Sum => number(values.sum()),
        AggregateFunction::Avg => {
            let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                Value::Null
            } else {
                number(sum / n as f64)
            }
        }
        AggregateFunction::Min => values.reduce(f64::min).map(number).unwrap_or(Value::Null),
        AggregateFunction::Max => values.reduce(f64::max).map(number).unwrap_or(Value::Null),
    }
}

fn evaluate(aggregation: &Aggregation, rows: &[&Record]) -> Result<Value, TransformError> {
    match (aggregation.function, aggregation.field.as_deref()) {
        (AggregateFunction::Count, None) => Ok(Value::from(rows.len())),
        (AggregateFunction::Count, Some(field)) => Ok(Value::from(
            rows.iter()
                .filter(|r| r.get(field).is_some_and(|v| !v.is_null()))
                .count(),
        )),
        (function, Some(field)) => Ok(summarize(function, numeric_values(rows, field))),
        (function, None) => Err(TransformError::invalid_config(format!(
            "aggregation '{}' uses {function:?} without a field",
            aggregation.alias
        ))),
    }
}

fn aggregate(
    group_by: &[String],
    aggregations: &[Aggregation],
    records: &[Record],
) -> Result<Vec<Record>, TransformError> {
    // groups in first-seen order
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<String, Vec<&Record>> = HashMap::new();
    for record in records {
        let key: Vec<Value> = group_by
            .iter()
            .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
            .collect();
        let hash = Value::Array(key.clone()).to_string();
        groups
            .entry(hash)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }
    if group_by.is_empty() && order.is_empty() {
        // no input still yields one summary row
        order.push(Vec::new());
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let hash = Value::Array(key.clone()).to_string();
        let rows = groups.remove(&hash).unwrap_or_default();
        let mut row = Record::new();
        for (field, value) in group_by.iter().zip(key) {
            row.insert(field.clone(), value);
        }
        for aggregation in aggregations {
            row.insert(aggregation.alias.clone(), evaluate(aggregation, &rows)?);
        }
        out.push(row);
    }
    Ok(out)
}

/* ---------------- join ---------------- */

fn join(
    mut records: Vec<Record>,
    reference: &[Record],
    left_key: &str,
    right_key: &str,
    prefix: Option<&str>,
) -> Vec<Record> {
    let mut index: HashMap<String, &Record> = HashMap::new();
    for right in reference {
        if let Some(key) = right.get(right_key).filter(|v| !v.is_null()) {
            index.entry(text(key)).or_insert(right);
        }
    }

    for record in records.iter_mut() {
        let Some(key) = record.get(left_key).filter(|v| !v.is_null()).map(text) else {
            continue;
        };
        let Some(matched) = index.get(&key) else {
            continue;
        };
        for (field, value) in matched.iter() {
            let name = match prefix {
                Some(p) => format!("{p}{field}"),
                None => field.clone(),
            };
            record.entry(name).or_insert_with(|| value.clone());
        }
    }
    records
}
