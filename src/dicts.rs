//! Layered merging of calculator parameters.
//!
//! Every recipe starts from a set of defaults and lets the caller swap
//! individual keys out. Layers are combined left to right, so later layers
//! take precedence. A `null` value in a layer is a removal marker: it deletes
//! the key from everything merged so far instead of storing a literal null,
//! unless removal is turned off for that merge.

use serde_json::{Map, Value};
use thiserror::Error;

/// An ordered mapping from option name to option value
pub type Params = Map<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    /// a layer was present but was not a mapping
    #[error("layer {index} is a {kind}, expected a mapping or nothing")]
    InvalidArgument { index: usize, kind: &'static str },

    /// two mutually exclusive options were both set
    #[error("`{first}` and `{second}` cannot be used together")]
    ConflictingOptions { first: String, second: String },
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// merge `layers` in order of increasing precedence. `None` layers are
/// skipped, and any other non-object layer is rejected before anything is
/// merged. With `remove_nulls`, a null value removes the key from the result
/// accumulated so far; otherwise it is stored like any other value. Values are
/// replaced wholesale, nested objects are not merged recursively.
pub fn merge_layers<'a, I>(
    layers: I,
    remove_nulls: bool,
) -> Result<Params, MergeError>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let mut maps = Vec::new();
    for (index, layer) in layers.into_iter().enumerate() {
        match layer {
            Some(Value::Object(map)) => maps.push(Some(map)),
            Some(v) => {
                return Err(MergeError::InvalidArgument {
                    index,
                    kind: kind(v),
                })
            }
            None => maps.push(None),
        }
    }
    Ok(merge_with(maps, remove_nulls))
}

/// the same as [merge_layers] for layers that are already known to be
/// mappings
pub fn merge_with<'a, I>(layers: I, remove_nulls: bool) -> Params
where
    I: IntoIterator<Item = Option<&'a Params>>,
{
    let mut ret = Params::new();
    for layer in layers.into_iter().flatten() {
        for (k, v) in layer {
            if remove_nulls && v.is_null() {
                ret.shift_remove(k);
            } else {
                ret.insert(k.clone(), v.clone());
            }
        }
    }
    ret
}

/// merge `overrides` on top of `defaults`, removing keys set to null
pub fn merge(defaults: &Params, overrides: Option<&Params>) -> Params {
    merge_with([Some(defaults), overrides], true)
}

/// check that at most one of `keys` is present in `params`. the first two
/// offenders are reported in the order they appear in `keys`
pub fn check_exclusive(
    params: &Params,
    keys: &[&str],
) -> Result<(), MergeError> {
    let mut found = keys.iter().filter(|k| params.contains_key(**k));
    if let (Some(first), Some(second)) = (found.next(), found.next()) {
        return Err(MergeError::ConflictingOptions {
            first: first.to_string(),
            second: second.to_string(),
        });
    }
    Ok(())
}

/// build a [Params] from a `serde_json::json!` object literal. panics if the
/// literal is not an object, so this is only meant for constant defaults
#[macro_export]
macro_rules! params {
    ($($tt:tt)*) => {
        match ::serde_json::json!({ $($tt)* }) {
            ::serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    };
}
