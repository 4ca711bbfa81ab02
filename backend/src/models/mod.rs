//! Domain models for the wallet card pipeline.
//!
//! - [`WalletRecord`] - one normalized wallet row
//! - [`RecordSet`] - normalized rows plus the optional columns the upload carried
//! - [`Field`] - a selectable dimension for filtering and grouping
//! - [`RecordGroup`] - a partition of records sharing a group key

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Wallet Record
// =============================================================================

/// One wallet, normalized.
///
/// Optional columns that were absent or blank are empty strings. The derived
/// ordering compares `name` first, so sorting members is a name sort with
/// the remaining fields as deterministic tie-breakers.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub name: String,
    pub address: String,
    pub wallet_type: String,
    /// Lowercased.
    pub coin_name: String,
    /// Uppercased.
    pub coin_symbol: String,
    pub logo_ref: String,
}

impl WalletRecord {
    /// Value of the given dimension.
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::WalletType => &self.wallet_type,
            Field::WalletName => &self.name,
            Field::CoinName => &self.coin_name,
            Field::CoinSymbol => &self.coin_symbol,
        }
    }

    /// Identifier used for logo lookup: the coin name, else the lowercased symbol.
    pub fn coin_id(&self) -> Option<String> {
        if !self.coin_name.is_empty() {
            Some(self.coin_name.clone())
        } else if !self.coin_symbol.is_empty() {
            Some(self.coin_symbol.to_lowercase())
        } else {
            None
        }
    }

    /// Explicit logo URL from the upload, if it is one.
    pub fn logo_url(&self) -> Option<&str> {
        let logo = self.logo_ref.as_str();
        (logo.starts_with("http://") || logo.starts_with("https://")).then_some(logo)
    }
}

// =============================================================================
// Record Set
// =============================================================================

/// Optional columns found in the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentColumns {
    pub wallet_type: bool,
    pub coin_name: bool,
    pub coin_symbol: bool,
    pub logo: bool,
}

/// Normalized records in input row order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    pub records: Vec<WalletRecord>,
    pub columns: PresentColumns,
}

impl RecordSet {
    /// Whether the upload carried a column for this dimension.
    pub fn has_column(&self, field: Field) -> bool {
        match field {
            Field::WalletName => true,
            Field::WalletType => self.columns.wallet_type,
            Field::CoinName => self.columns.coin_name,
            Field::CoinSymbol => self.columns.coin_symbol,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// =============================================================================
// Selectable Dimensions
// =============================================================================

/// A record dimension usable for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    WalletType,
    WalletName,
    CoinName,
    CoinSymbol,
}

impl Field {
    /// Header of the column backing this dimension.
    pub fn column(&self) -> &'static str {
        match self {
            Field::WalletType => "Wallet Type",
            Field::WalletName => "Wallet Name",
            Field::CoinName => "Coin Name",
            Field::CoinSymbol => "Coin Symbol",
        }
    }

    /// Bring a user-supplied value into the same shape as normalized records.
    pub fn normalize_value(&self, value: &str) -> String {
        let value = value.trim();
        match self {
            Field::CoinName => value.to_lowercase(),
            Field::CoinSymbol => value.to_uppercase(),
            Field::WalletType | Field::WalletName => value.to_string(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::WalletType => "wallet-type",
            Field::WalletName => "wallet-name",
            Field::CoinName => "coin-name",
            Field::CoinSymbol => "coin-symbol",
        };
        f.write_str(name)
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "type" | "wallettype" => Ok(Field::WalletType),
            "name" | "walletname" => Ok(Field::WalletName),
            "coin" | "coinname" => Ok(Field::CoinName),
            "symbol" | "coinsymbol" => Ok(Field::CoinSymbol),
            _ => Err(format!(
                "unknown field '{}' (expected wallet-type, wallet-name, coin-name or coin-symbol)",
                s
            )),
        }
    }
}

// =============================================================================
// Groups
// =============================================================================

/// Records sharing one value of the grouping dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordGroup {
    /// Group key; empty for the implicit single group.
    pub key: String,
    /// Sorted by name ascending.
    pub members: Vec<WalletRecord>,
}
