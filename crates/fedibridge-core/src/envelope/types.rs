//! Envelope and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::permissions::ModuleMethod;

/// Namespace tag carried in the `ext` field of every envelope.
pub const NAMESPACE: &str = "fedimint-web";

/// Canonical envelope kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    MethodCall(ModuleMethodCall),
    InternalCall(InternalCall),
    Prompt(PromptDecision),
    Balance(BalanceUpdate),
    BalanceRequest,
    Unknown { kind: String, payload: Value },
}

impl Envelope {
    /// Wire name of the envelope kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::MethodCall(_) => "methodCall",
            Self::InternalCall(_) => "internalCall",
            Self::Prompt(_) => "prompt",
            Self::Balance(_) => "balance",
            Self::BalanceRequest => "balanceRequest",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

/// Viewport position of the requesting content, used to place the popup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowPosition {
    pub x: f64,
    pub y: f64,
}

impl WindowPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Integer `(left, top)` coordinates for the popup's top-left corner.
    #[allow(clippy::cast_possible_truncation)]
    pub fn top_left(self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// A privileged call issued by a web page.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMethodCall {
    pub method: ModuleMethod,
    pub params: Value,
    pub window: WindowPosition,
}

impl ModuleMethodCall {
    pub const fn new(method: ModuleMethod, params: Value, window: WindowPosition) -> Self {
        Self {
            method,
            params,
            window,
        }
    }
}

/// A call into the extension's own internal API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalCall {
    pub method: String,
    pub params: Value,
}

/// The popup's answer to a consent prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDecision {
    pub accept: bool,
    /// Parameters edited in the popup, replacing the requested ones.
    pub params: Option<Value>,
}

impl PromptDecision {
    pub const fn accept(params: Option<Value>) -> Self {
        Self {
            accept: true,
            params,
        }
    }

    pub const fn reject() -> Self {
        Self {
            accept: false,
            params: None,
        }
    }
}

/// Balance notification pushed to extension pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    /// Balance in millisatoshis.
    pub balance: u64,
}

impl BalanceUpdate {
    /// Serialize as a `balance` envelope.
    pub fn to_envelope(self) -> Value {
        json!({
            "ext": NAMESPACE,
            "type": "balance",
            "balance": self.balance,
        })
    }
}

/// Uniform reply to `methodCall`/`internalCall` senders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn from_result<E: std::fmt::Display>(result: std::result::Result<Value, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}
