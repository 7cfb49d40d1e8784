use std::{convert::Infallible, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored verification secret bound to a channel and recipient address.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VerificationAsset {
    pub id: i64,
    pub channel_id: i64,
    pub address: String,
    pub name: String,
    pub value: String,
    /// `None` means the asset never expires.
    pub expires: Option<DateTime<Utc>>,
}

impl VerificationAsset {
    /// The secret kind this asset was stored under.
    pub fn kind(&self) -> AssetName {
        AssetName::from(self.name.as_str())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// A validated asset ready to be inserted. Only the store builds these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub channel_id: i64,
    pub address: String,
    pub name: String,
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
}

/// Secret kinds used by the verification flows.
///
/// Unknown kinds are still accepted through [`AssetName::Other`], so new flows
/// can store secrets without a change here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetName {
    SignupConfirmationHash,
    SignupConfirmationCode,
    OnetimePassword,
    PasswordRecoveryHash,
    PasswordRecoveryCode,
    Other(String),
}

impl AssetName {
    pub fn as_str(&self) -> &str {
        match self {
            AssetName::SignupConfirmationHash => "signup_confirmation_hash",
            AssetName::SignupConfirmationCode => "signup_confirmation_code",
            AssetName::OnetimePassword => "onetime_password",
            AssetName::PasswordRecoveryHash => "password_recovery_hash",
            AssetName::PasswordRecoveryCode => "password_recovery_code",
            AssetName::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AssetName::Other(_))
    }
}

impl From<&str> for AssetName {
    fn from(name: &str) -> Self {
        match name {
            "signup_confirmation_hash" => AssetName::SignupConfirmationHash,
            "signup_confirmation_code" => AssetName::SignupConfirmationCode,
            "onetime_password" => AssetName::OnetimePassword,
            "password_recovery_hash" => AssetName::PasswordRecoveryHash,
            "password_recovery_code" => AssetName::PasswordRecoveryCode,
            other => AssetName::Other(other.to_string()),
        }
    }
}

impl FromStr for AssetName {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AssetName::from(s))
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key accepted by `get_asset`: either the surrogate id or the full
/// `(channel_id, address, name)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKey {
    Id(i64),
    Composite {
        channel_id: i64,
        address: String,
        name: AssetName,
    },
}

impl AssetKey {
    pub fn composite(channel_id: i64, address: impl Into<String>, name: AssetName) -> Self {
        AssetKey::Composite {
            channel_id,
            address: address.into(),
            name,
        }
    }
}
