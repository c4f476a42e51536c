//! Escaping and serialization filters

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use super::{check_arity, int_arg};
use crate::escape::html_escape;
use crate::filters::{FilterError, FilterResult};
use crate::value::display;

/// `escape` / `e`: HTML-escape the display form of the value
pub fn escape(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "escape")?;
    Ok(Value::String(html_escape(&display(value))))
}

/// Marks a value as already safe for HTML output; only available to trusted templates
pub fn safe(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "safe")?;
    Ok(value.clone())
}

/// `tojson(indent=none)`
///
/// The markup-significant characters are written as `\u` escapes so the
/// result can be embedded in HTML or a `<script>` block.
pub fn tojson(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 1, "tojson")?;
    let json = match int_arg(args, 0, "tojson")? {
        Some(width) => {
            let indent = " ".repeat(width.clamp(0, 16) as usize);
            let mut buf = Vec::new();
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
            value
                .serialize(&mut ser)
                .map_err(|e| FilterError::type_mismatch(e.to_string()))?;
            String::from_utf8(buf).map_err(|e| FilterError::type_mismatch(e.to_string()))?
        }
        None => serde_json::to_string(value).map_err(|e| FilterError::type_mismatch(e.to_string()))?,
    };

    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            c => out.push(c),
        }
    }
    Ok(Value::String(out))
}
