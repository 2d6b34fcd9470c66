use super::{MaterializeOptions, ResultPayload, collect_sequence};
use crate::core::models::records::ColourRule;
use crate::core::native::{NativeError, Owned};
use serde_json::Value;

pub(super) fn status(result: Owned, _: &MaterializeOptions) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Plain(result.to_plain_value()?))
}

pub(super) fn void(result: Owned, _: &MaterializeOptions) -> Result<ResultPayload, NativeError> {
    result.release();
    Ok(ResultPayload::Plain(Value::Null))
}

pub(super) fn int_array(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Ints(collect_sequence(&result, Owned::as_int)?))
}

pub(super) fn float_array(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Floats(collect_sequence(&result, Owned::as_float)?))
}

pub(super) fn string_array(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Strings(collect_sequence(&result, Owned::as_string)?))
}

pub(super) fn colour_rules(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let rules = collect_sequence(&result, |rule| {
        let selection = rule.first()?.as_string()?;
        let colour = rule.second()?.as_string()?;
        Ok(ColourRule { selection, colour })
    })?;
    Ok(ResultPayload::ColourRules(rules))
}
