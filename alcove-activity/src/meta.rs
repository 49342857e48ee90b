// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A native-unit amount, carried on the wire as a 0x-prefixed hex quantity.
///
/// Plain non-negative integers are accepted on input for leniency toward
/// older background snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 0x-prefixed hex quantity or a non-negative integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
                    Some(hex) => u128::from_str_radix(hex, 16),
                    None => v.parse::<u128>(),
                };
                parsed
                    .map(Amount)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(u128::from(v)))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Lifecycle state of a transaction as reported by the background process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Unapproved,
    Submitted,
    Confirmed,
    Failed,
    Cancelled,
    Dropped,
    Rejected,
}

impl TransactionStatus {
    /// Statuses that permanently end a transaction without an on-chain effect.
    pub fn is_terminal_failure(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Cancelled | Self::Dropped | Self::Rejected
        )
    }
}

/// Role of a record inside a same-nonce replacement chain.
///
/// `RegularSpeedingUp` / `RegularCancelling` mark an original that is being
/// replaced; `SpeedUp` / `Cancel` mark the replacement record itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaType {
    #[default]
    Regular,
    RegularSpeedingUp,
    RegularCancelling,
    SpeedUp,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    Incoming,
    Outgoing,
    ContractInteraction,
    ContractDeployment,
    TokenTransfer,
}

/// On-chain parameters of a transaction. All fields are optional: unapproved
/// records have no hash yet and incoming records carry no gas data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionParams {
    pub value: Option<Amount>,
    pub hash: Option<String>,
    pub nonce: Option<u64>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Display information for the asset a transaction moves. Absent for plain
/// native-currency sends; the reconciliation pass backfills it from the
/// active network's native currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferType {
    pub amount: Amount,
    pub currency: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// One transaction record as delivered by the activity-list subscription.
///
/// `replaced_by` is an id reference only; the record it names may or may not
/// be present in the same snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub meta_type: MetaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<String>,
    #[serde(default)]
    pub transaction_params: TransactionParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_type: Option<TransferType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_category: Option<TransactionCategory>,
}

/// The active network's native currency, used to backfill transfer display
/// data for plain sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCurrency {
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// Raw activity snapshot: the background delivers pending and confirmed
/// sequences as a total replacement of the previous snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityList {
    #[serde(default)]
    pub pending: Vec<TransactionMeta>,
    #[serde(default)]
    pub confirmed: Vec<TransactionMeta>,
}

/// A reconciled, display-ready feed entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub meta: TransactionMeta,
    /// Both the original and its cancel attempt dead-ended; the entry carries
    /// no live on-chain reference and the UI may hide it outright.
    #[serde(default)]
    pub force_drop: bool,
    /// The entry cannot mine until an earlier nonce on the same account
    /// confirms; present as "queued" rather than "pending".
    #[serde(default)]
    pub queued: bool,
}

impl ActivityEntry {
    pub fn hash(&self) -> Option<&str> {
        self.meta.transaction_params.hash.as_deref()
    }
}
