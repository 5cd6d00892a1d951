//! Module/method surface and the static permission table.
//!
//! Every privileged call names a module and a method. The pair is parsed into
//! a [`ModuleMethod`] so that the table below is an exhaustive `match`: adding
//! a method without deciding its permission level does not compile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a call may proceed silently or needs user consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Auto-approve without prompting.
    None,
    /// Ask the user through the consent popup for each invocation.
    Prompt,
}

impl PermissionLevel {
    pub const fn requires_prompt(self) -> bool {
        matches!(self, Self::Prompt)
    }
}

/// Privileged capability groups exposed to web pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Fedimint,
    Nostr,
    Webln,
}

impl ModuleKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fedimint => "fedimint",
            Self::Nostr => "nostr",
            Self::Webln => "webln",
        }
    }
}

impl FromStr for ModuleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fedimint" => Ok(Self::Fedimint),
            "nostr" => Ok(Self::Nostr),
            "webln" => Ok(Self::Webln),
            _ => Err(Error::unknown_permission(s, "*")),
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Federated e-cash wallet methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FedimintMethod {
    GetActiveFederation,
    GetBalance,
    ParseEcash,
    SpendEcash,
    RedeemEcash,
}

impl FedimintMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetActiveFederation => "getActiveFederation",
            Self::GetBalance => "getBalance",
            Self::ParseEcash => "parseEcash",
            Self::SpendEcash => "spendEcash",
            Self::RedeemEcash => "redeemEcash",
        }
    }

    fn parse(method: &str) -> Option<Self> {
        Some(match method {
            "getActiveFederation" => Self::GetActiveFederation,
            "getBalance" => Self::GetBalance,
            "parseEcash" => Self::ParseEcash,
            "spendEcash" => Self::SpendEcash,
            "redeemEcash" => Self::RedeemEcash,
            _ => return None,
        })
    }
}

/// NIP-07 signer methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NostrMethod {
    GetPublicKey,
    GetRelays,
    SignEvent,
    Nip04Encrypt,
    Nip04Decrypt,
    Nip44Encrypt,
    Nip44Decrypt,
}

impl NostrMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetPublicKey => "getPublicKey",
            Self::GetRelays => "getRelays",
            Self::SignEvent => "signEvent",
            Self::Nip04Encrypt => "nip04Encrypt",
            Self::Nip04Decrypt => "nip04Decrypt",
            Self::Nip44Encrypt => "nip44Encrypt",
            Self::Nip44Decrypt => "nip44Decrypt",
        }
    }

    fn parse(method: &str) -> Option<Self> {
        Some(match method {
            "getPublicKey" => Self::GetPublicKey,
            "getRelays" => Self::GetRelays,
            "signEvent" => Self::SignEvent,
            "nip04Encrypt" => Self::Nip04Encrypt,
            "nip04Decrypt" => Self::Nip04Decrypt,
            "nip44Encrypt" => Self::Nip44Encrypt,
            "nip44Decrypt" => Self::Nip44Decrypt,
            _ => return None,
        })
    }
}

/// WebLN provider methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeblnMethod {
    Enable,
    GetInfo,
    SendPayment,
    Keysend,
    MakeInvoice,
    SignMessage,
    VerifyMessage,
}

impl WeblnMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::GetInfo => "getInfo",
            Self::SendPayment => "sendPayment",
            Self::Keysend => "keysend",
            Self::MakeInvoice => "makeInvoice",
            Self::SignMessage => "signMessage",
            Self::VerifyMessage => "verifyMessage",
        }
    }

    fn parse(method: &str) -> Option<Self> {
        Some(match method {
            "enable" => Self::Enable,
            "getInfo" => Self::GetInfo,
            "sendPayment" => Self::SendPayment,
            "keysend" => Self::Keysend,
            "makeInvoice" => Self::MakeInvoice,
            "signMessage" => Self::SignMessage,
            "verifyMessage" => Self::VerifyMessage,
            _ => return None,
        })
    }
}

/// A method on one of the known modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleMethod {
    Fedimint(FedimintMethod),
    Nostr(NostrMethod),
    Webln(WeblnMethod),
}

impl ModuleMethod {
    /// Parse the wire `(module, method)` pair.
    ///
    /// Pairs outside the known surface are a configuration error and are
    /// never auto-approved.
    pub fn parse(module: &str, method: &str) -> Result<Self> {
        let kind: ModuleKind = module
            .parse()
            .map_err(|_| Error::unknown_permission(module, method))?;

        let parsed = match kind {
            ModuleKind::Fedimint => FedimintMethod::parse(method).map(Self::Fedimint),
            ModuleKind::Nostr => NostrMethod::parse(method).map(Self::Nostr),
            ModuleKind::Webln => WeblnMethod::parse(method).map(Self::Webln),
        };

        parsed.ok_or_else(|| Error::unknown_permission(module, method))
    }

    pub const fn module(self) -> ModuleKind {
        match self {
            Self::Fedimint(_) => ModuleKind::Fedimint,
            Self::Nostr(_) => ModuleKind::Nostr,
            Self::Webln(_) => ModuleKind::Webln,
        }
    }

    /// Wire name of the method, without the module prefix.
    pub const fn method_name(self) -> &'static str {
        match self {
            Self::Fedimint(m) => m.as_str(),
            Self::Nostr(m) => m.as_str(),
            Self::Webln(m) => m.as_str(),
        }
    }
}

impl fmt::Display for ModuleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module(), self.method_name())
    }
}

/// Static `(module, method) -> PermissionLevel` mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionTable;

impl PermissionTable {
    /// Permission level for a parsed call.
    // TODO: split payment and signature methods into a stricter tier once the
    // prompt page can render amount confirmations.
    pub const fn level(call: ModuleMethod) -> PermissionLevel {
        match call {
            ModuleMethod::Fedimint(m) => match m {
                FedimintMethod::GetActiveFederation
                | FedimintMethod::GetBalance
                | FedimintMethod::ParseEcash => PermissionLevel::None,
                FedimintMethod::SpendEcash | FedimintMethod::RedeemEcash => PermissionLevel::Prompt,
            },
            ModuleMethod::Nostr(m) => match m {
                NostrMethod::GetRelays => PermissionLevel::None,
                NostrMethod::GetPublicKey
                | NostrMethod::SignEvent
                | NostrMethod::Nip04Encrypt
                | NostrMethod::Nip04Decrypt
                | NostrMethod::Nip44Encrypt
                | NostrMethod::Nip44Decrypt => PermissionLevel::Prompt,
            },
            ModuleMethod::Webln(m) => match m {
                WeblnMethod::GetInfo | WeblnMethod::VerifyMessage => PermissionLevel::None,
                WeblnMethod::Enable
                | WeblnMethod::SendPayment
                | WeblnMethod::Keysend
                | WeblnMethod::MakeInvoice
                | WeblnMethod::SignMessage => PermissionLevel::Prompt,
            },
        }
    }

    /// Look up the level for a wire `(module, method)` pair.
    pub fn lookup(module: &str, method: &str) -> Result<PermissionLevel> {
        ModuleMethod::parse(module, method).map(Self::level)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn balance_is_auto_approved() {
        assert_eq!(
            PermissionTable::lookup("fedimint", "getBalance").unwrap(),
            PermissionLevel::None
        );
    }

    #[test]
    fn sign_event_requires_prompt() {
        assert_eq!(
            PermissionTable::lookup("nostr", "signEvent").unwrap(),
            PermissionLevel::Prompt
        );
    }

    #[test]
    fn payments_require_prompt() {
        assert!(
            PermissionTable::lookup("webln", "sendPayment")
                .unwrap()
                .requires_prompt()
        );
        assert!(
            PermissionTable::lookup("fedimint", "spendEcash")
                .unwrap()
                .requires_prompt()
        );
    }

    #[test]
    fn unknown_method_fails_fast() {
        let err = PermissionTable::lookup("nostr", "exportSecretKey").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPermission { ref module, ref method }
                if module == "nostr" && method == "exportSecretKey"
        ));
    }

    #[test]
    fn unknown_module_fails_fast() {
        let err = ModuleMethod::parse("ethereum", "getBalance").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No permission configured for ethereum.getBalance"
        );
    }

    #[test]
    fn method_names_match_wire_format() {
        let call = ModuleMethod::parse("webln", "makeInvoice").unwrap();
        assert_eq!(call, ModuleMethod::Webln(WeblnMethod::MakeInvoice));
        assert_eq!(call.module(), ModuleKind::Webln);
        assert_eq!(call.method_name(), "makeInvoice");
        assert_eq!(call.to_string(), "webln.makeInvoice");
    }
}
