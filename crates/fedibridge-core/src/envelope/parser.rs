//! Envelope parser for runtime messages.

use serde_json::Value;

use super::types::*;
use crate::error::{Error, Result};
use crate::permissions::ModuleMethod;

/// Parse a raw JSON message string.
pub fn parse_message(raw: &str) -> Result<Option<Envelope>> {
    let value: Value = serde_json::from_str(raw)?;
    parse_envelope(&value)
}

/// Parse a JSON value into a canonical envelope.
///
/// Returns `Ok(None)` for traffic not tagged with [`NAMESPACE`]. Errors are
/// either [`Error::MalformedEnvelope`] or, for a well-formed `methodCall`
/// naming an unknown module/method, [`Error::UnknownPermission`].
pub fn parse_envelope(raw: &Value) -> Result<Option<Envelope>> {
    if raw.get("ext").and_then(Value::as_str) != Some(NAMESPACE) {
        return Ok(None);
    }

    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedEnvelope("Missing 'type' field".into()))?;

    let envelope = match kind {
        "methodCall" => Envelope::MethodCall(parse_method_call(raw)?),
        "internalCall" => Envelope::InternalCall(parse_internal_call(raw)?),
        "prompt" => Envelope::Prompt(parse_prompt(raw)),
        "balance" => Envelope::Balance(parse_balance(raw)?),
        "balanceRequest" => Envelope::BalanceRequest,
        _ => Envelope::Unknown {
            kind: kind.to_string(),
            payload: raw.clone(),
        },
    };

    Ok(Some(envelope))
}

fn required_str<'a>(raw: &'a Value, field: &str) -> Result<&'a str> {
    raw.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedEnvelope(format!("Missing '{field}' field")))
}

fn parse_method_call(raw: &Value) -> Result<ModuleMethodCall> {
    let module = required_str(raw, "module")?;
    let method = required_str(raw, "method")?;
    let method = ModuleMethod::parse(module, method)?;

    let params = raw.get("params").cloned().unwrap_or(Value::Null);
    let window = parse_window(raw.get("window"))?;

    Ok(ModuleMethodCall::new(method, params, window))
}

fn parse_window(raw: Option<&Value>) -> Result<WindowPosition> {
    let Some(raw) = raw else {
        return Ok(WindowPosition::default());
    };

    let coords = raw
        .as_array()
        .filter(|a| a.len() == 2)
        .and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?)))
        .ok_or_else(|| Error::MalformedEnvelope("'window' must be [x, y]".into()))?;

    Ok(WindowPosition::new(coords.0, coords.1))
}

fn parse_internal_call(raw: &Value) -> Result<InternalCall> {
    let method = required_str(raw, "method")?.to_string();
    let params = raw.get("params").cloned().unwrap_or(Value::Null);
    Ok(InternalCall { method, params })
}

fn parse_prompt(raw: &Value) -> PromptDecision {
    let accept = raw.get("accept").and_then(Value::as_bool).unwrap_or(true);
    let params = raw.get("params").filter(|v| !v.is_null()).cloned();
    PromptDecision { accept, params }
}

fn parse_balance(raw: &Value) -> Result<BalanceUpdate> {
    let balance = raw
        .get("balance")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::MalformedEnvelope("Missing 'balance' field".into()))?;
    Ok(BalanceUpdate { balance })
}
