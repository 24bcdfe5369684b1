//! URL query string building from typed request records.
//!
//! Any `Serialize` record maps onto query parameters: each scalar field with
//! a non-null, non-empty value becomes one `name=value` pair.

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{CommonError, CommonResult};

/// Build a percent-encoded query string from a request record.
///
/// Null fields and fields whose string form is empty are omitted. Parameters
/// appear in field-name order, so the output is stable for a given input.
/// A record with no usable fields yields an empty string.
///
/// # Errors
///
/// Returns [`CommonError::InvalidArgument`] if the request is not a flat
/// record (nested objects, arrays, or a bare scalar).
///
/// # Examples
///
/// ```
/// use microservices_common::query::build_query;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Search<'a> {
///     a: &'a str,
///     b: &'a str,
///     c: Option<u32>,
/// }
///
/// let query = build_query(&Search { a: "1", b: "", c: None }).unwrap();
/// assert_eq!(query, "a=1");
/// ```
pub fn build_query<T: Serialize + ?Sized>(request: &T) -> CommonResult<String> {
    let value = serde_json::to_value(request)
        .map_err(|e| CommonError::invalid_argument(format!("request is not serializable: {e}")))?;

    let fields = match value {
        Value::Null => return Ok(String::new()),
        Value::Object(fields) => fields,
        other => {
            return Err(CommonError::invalid_argument(format!(
                "query request must be a record, got {}",
                kind_of(&other)
            )));
        }
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in &fields {
        if let Some(rendered) = render_scalar(name, value)? {
            serializer.append_pair(name, &rendered);
        }
    }
    Ok(serializer.finish())
}

/// Append a query string to a URL, leaving it untouched if the query is empty.
#[must_use]
pub fn with_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{query}")
    }
}

fn render_scalar(name: &str, value: &Value) -> CommonResult<Option<String>> {
    let rendered = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err(CommonError::invalid_argument(format!(
                "query field `{name}` must be a scalar, got {}",
                kind_of(value)
            )));
        }
    };
    Ok((!rendered.is_empty()).then_some(rendered))
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
