//! CSV reconciliation report: one row per match, up to two Beacon entries.

use std::io::Write;

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{BeaconEntry, MatchSuggestion};
use crate::serde_fmt::{BANK_DATE_FORMAT, BEACON_DATE_FORMAT};

#[derive(Debug, Serialize)]
struct ReportRow {
    #[serde(rename = "Bank_ID")]
    bank_id: String,
    #[serde(rename = "Bank_Date")]
    bank_date: String,
    #[serde(rename = "Bank_Description")]
    bank_description: String,
    #[serde(rename = "Bank_Amount")]
    bank_amount: String,
    #[serde(rename = "Match_Type")]
    match_type: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Confidence")]
    confidence: String,
    #[serde(rename = "Beacon_1_ID")]
    beacon_1_id: String,
    #[serde(rename = "Beacon_1_Date")]
    beacon_1_date: String,
    #[serde(rename = "Beacon_1_Payee")]
    beacon_1_payee: String,
    #[serde(rename = "Beacon_1_Amount")]
    beacon_1_amount: String,
    #[serde(rename = "Beacon_2_ID")]
    beacon_2_id: String,
    #[serde(rename = "Beacon_2_Date")]
    beacon_2_date: String,
    #[serde(rename = "Beacon_2_Payee")]
    beacon_2_payee: String,
    #[serde(rename = "Beacon_2_Amount")]
    beacon_2_amount: String,
}

fn beacon_cells(e: Option<&BeaconEntry>) -> [String; 4] {
    match e {
        Some(e) => [
            e.id.clone(),
            e.date.format(BEACON_DATE_FORMAT).to_string(),
            e.payee.clone(),
            e.amount.to_string(),
        ],
        None => Default::default(),
    }
}

impl From<&MatchSuggestion> for ReportRow {
    fn from(m: &MatchSuggestion) -> Self {
        let bank = &m.bank_transaction;
        let entries = m.beacon_entries();
        let [beacon_1_id, beacon_1_date, beacon_1_payee, beacon_1_amount] = beacon_cells(entries.first());
        let [beacon_2_id, beacon_2_date, beacon_2_payee, beacon_2_amount] = beacon_cells(entries.get(1));
        ReportRow {
            bank_id: bank.id.clone(),
            bank_date: bank.date.format(BANK_DATE_FORMAT).to_string(),
            bank_description: bank.description.clone(),
            bank_amount: bank.amount.to_string(),
            match_type: m.match_type().to_string(),
            status: m.status.to_string(),
            confidence: format!("{:.2}", m.confidence()),
            beacon_1_id,
            beacon_1_date,
            beacon_1_payee,
            beacon_1_amount,
            beacon_2_id,
            beacon_2_date,
            beacon_2_payee,
            beacon_2_amount,
        }
    }
}

pub const REPORT_HEADER: [&str; 15] = [
    "Bank_ID",
    "Bank_Date",
    "Bank_Description",
    "Bank_Amount",
    "Match_Type",
    "Status",
    "Confidence",
    "Beacon_1_ID",
    "Beacon_1_Date",
    "Beacon_1_Payee",
    "Beacon_1_Amount",
    "Beacon_2_ID",
    "Beacon_2_Date",
    "Beacon_2_Payee",
    "Beacon_2_Amount",
];

/// Write the report. Entries beyond the second (large manual matches) are
/// not itemised. Returns the number of rows written.
pub fn write_report<'a, W: Write>(
    matches: impl IntoIterator<Item = &'a MatchSuggestion>,
    out: W,
) -> Result<usize, ReconError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    let csv_err = |e: csv::Error| ReconError::Io(format!("CSV write error: {e}"));

    // Always write the header, even with zero rows.
    writer.write_record(REPORT_HEADER).map_err(csv_err)?;

    let mut rows = 0;
    for m in matches {
        writer.serialize(ReportRow::from(m)).map_err(csv_err)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}
