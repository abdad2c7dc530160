//! Source-format date (de)serializers for the ledger file.
//!
//! Bank statement dates round-trip as `%d-%b-%y` (`05-Mar-24`), Beacon
//! export dates as `%d/%m/%Y` (`05/03/2024`).

pub const BANK_DATE_FORMAT: &str = "%d-%b-%y";
pub const BEACON_DATE_FORMAT: &str = "%d/%m/%Y";

macro_rules! date_format_module {
    ($name:ident, $fmt:expr) => {
        pub mod $name {
            use chrono::NaiveDate;
            use serde::{Deserialize, Deserializer, Serializer};

            pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(&date.format($fmt))
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
                let raw = String::deserialize(d)?;
                NaiveDate::parse_from_str(raw.trim(), $fmt).map_err(|e| {
                    serde::de::Error::custom(format!("bad date '{raw}' (expected {}): {e}", $fmt))
                })
            }
        }
    };
}

date_format_module!(bank_date, super::BANK_DATE_FORMAT);
date_format_module!(beacon_date, super::BEACON_DATE_FORMAT);
