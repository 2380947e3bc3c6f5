#![forbid(unsafe_code)]

//! Built-in helpers.

use crate::helper::Helper;
use crate::value::Value;

/// `concat`: the text form of every positional argument, joined with no
/// separator. Undefined and null render as empty strings.
#[must_use]
pub fn concat() -> Helper {
    Helper::simple("concat", |positional, _named| {
        let joined: String = positional.iter().map(ToString::to_string).collect();
        Ok(Value::str(joined))
    })
}
