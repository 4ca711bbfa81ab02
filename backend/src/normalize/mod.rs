//! Record normalization: raw table rows to [`WalletRecord`]s.
//!
//! Headers are matched after trimming, collapsing inner whitespace and
//! ignoring case, so `" wallet  NAME"` resolves to `Wallet Name`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::logs::log_warning;
use crate::error::SchemaError;
use crate::models::{PresentColumns, RecordSet, WalletRecord};
use crate::parser::ParsedTable;

pub const WALLET_NAME: &str = "Wallet Name";
pub const WALLET_ADDRESS: &str = "Wallet Address";
pub const WALLET_TYPE: &str = "Wallet Type";
pub const COIN_NAME: &str = "Coin Name";
pub const COIN_SYMBOL: &str = "Coin Symbol";
/// Accepted headers for the logo column, first match wins.
pub const LOGO_COLUMNS: [&str; 2] = ["Logo URL", "Coin Logo"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Canonical comparison key for a header.
fn header_key(header: &str) -> String {
    WHITESPACE
        .replace_all(header.trim(), " ")
        .to_lowercase()
}

/// Column positions of the known headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub address: usize,
    pub wallet_type: Option<usize>,
    pub coin_name: Option<usize>,
    pub coin_symbol: Option<usize>,
    pub logo: Option<usize>,
}

impl ColumnMap {
    /// Locate the known columns, failing on the first missing required one.
    pub fn resolve(headers: &[String]) -> Result<Self, SchemaError> {
        let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
        let find = |column: &str| -> Option<usize> {
            let wanted = header_key(column);
            keys.iter().position(|k| *k == wanted)
        };
        let require = |column: &str| -> Result<usize, SchemaError> {
            find(column).ok_or_else(|| SchemaError::MissingColumn(column.to_string()))
        };

        Ok(Self {
            name: require(WALLET_NAME)?,
            address: require(WALLET_ADDRESS)?,
            wallet_type: find(WALLET_TYPE),
            coin_name: find(COIN_NAME),
            coin_symbol: find(COIN_SYMBOL),
            logo: LOGO_COLUMNS.iter().find_map(|c| find(c)),
        })
    }

    fn present(&self) -> PresentColumns {
        PresentColumns {
            wallet_type: self.wallet_type.is_some(),
            coin_name: self.coin_name.is_some(),
            coin_symbol: self.coin_symbol.is_some(),
            logo: self.logo.is_some(),
        }
    }
}

/// Normalize a parsed table into a record set, preserving row order.
///
/// Rows where every cell is blank are dropped, as are rows without a wallet
/// name. Rows with a blank address are kept and render without a code.
pub fn normalize(table: &ParsedTable) -> Result<RecordSet, SchemaError> {
    let columns = ColumnMap::resolve(&table.headers)?;

    let cell = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut records = Vec::with_capacity(table.rows.len());
    let mut blank_addresses = 0;
    let mut nameless = 0;

    for row in &table.rows {
        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let record = WalletRecord {
            name: cell(row, Some(columns.name)),
            address: cell(row, Some(columns.address)),
            wallet_type: cell(row, columns.wallet_type),
            coin_name: cell(row, columns.coin_name).to_lowercase(),
            coin_symbol: cell(row, columns.coin_symbol).to_uppercase(),
            logo_ref: cell(row, columns.logo),
        };

        if record.name.is_empty() {
            nameless += 1;
            continue;
        }
        if record.address.is_empty() {
            blank_addresses += 1;
        }
        records.push(record);
    }

    if nameless > 0 {
        log_warning(format!("Skipped {} row(s) with no wallet name", nameless));
    }

    if blank_addresses > 0 {
        log_warning(format!(
            "{} wallet(s) have no address and will render without a QR code",
            blank_addresses
        ));
    }

    Ok(RecordSet {
        records,
        columns: columns.present(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    fn table(csv: &str) -> ParsedTable {
        parse_str(csv, ',', "utf-8").unwrap()
    }

    #[test]
    fn test_trims_and_cases_fields() {
        let set = normalize(&table(
            "Wallet Name,Wallet Address,Coin Name,Coin Symbol\n  Cold A , 0xAAA ,  BitCoin , btc ",
        ))
        .unwrap();

        let r = &set.records[0];
        assert_eq!(r.name, "Cold A");
        assert_eq!(r.address, "0xAAA");
        assert_eq!(r.coin_name, "bitcoin");
        assert_eq!(r.coin_symbol, "BTC");
        assert_eq!(r.wallet_type, "");
    }

    #[test]
    fn test_header_matching_is_loose() {
        let set = normalize(&table(" wallet  NAME ,WALLET ADDRESS, wallet type\nA,0x1,Hardware")).unwrap();

        assert_eq!(set.records[0].name, "A");
        assert_eq!(set.records[0].wallet_type, "Hardware");
        assert!(set.columns.wallet_type);
        assert!(!set.columns.coin_name);
    }

    #[test]
    fn test_missing_address_column() {
        let err = normalize(&table("Wallet Name,Wallet Type\nA,Hardware")).unwrap_err();
        assert_eq!(err, SchemaError::MissingColumn("Wallet Address".into()));
    }

    #[test]
    fn test_missing_name_column() {
        let err = normalize(&table("Wallet Address\n0x1")).unwrap_err();
        assert_eq!(err, SchemaError::MissingColumn("Wallet Name".into()));
    }

    #[test]
    fn test_blank_address_row_retained() {
        let set = normalize(&table("Wallet Name,Wallet Address\nA,\nB,0x2")).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.records[0].address, "");
    }

    #[test]
    fn test_nameless_rows_dropped() {
        let set = normalize(&table("Wallet Name,Wallet Address\n   ,0xAAA\nB,0x2\n,0x3")).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.records[0].name, "B");
        assert!(set.records.iter().all(|r| !r.name.is_empty()));
    }

    #[test]
    fn test_fully_blank_rows_dropped() {
        let set = normalize(&table("Wallet Name,Wallet Address\n , \nB,0x2\n,")).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.records[0].name, "B");
    }

    #[test]
    fn test_row_order_preserved() {
        let set = normalize(&table("Wallet Name,Wallet Address\nZ,0x1\nA,0x2\nM,0x3")).unwrap();
        let names: Vec<&str> = set.records.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_logo_column_aliases() {
        let set = normalize(&table("Wallet Name,Wallet Address,Coin Logo\nA,0x1,https://x/a.png")).unwrap();

        assert!(set.columns.logo);
        assert_eq!(set.records[0].logo_ref, "https://x/a.png");
    }
}
