//! CSV ingestion for the two source ledgers.
//!
//! Bank statements: `Date,Type,Description,Amount` with `05-Mar-24` dates.
//! Beacon exports: `date,trans_no,payee,amount[,detail]` with `04/03/2024`
//! dates. Ids are assigned by row position (`BANK_0000`, `BEACON_0000`), so
//! they are stable as long as the export is not re-sorted.
//!
//! Any bad row fails the whole load.

use std::path::Path;
use std::str::FromStr;

use beacon_recon::serde_fmt::{BANK_DATE_FORMAT, BEACON_DATE_FORMAT};
use beacon_recon::{BankTransaction, BeaconEntry, ReconError};
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub fn load_bank(path: &Path) -> Result<Vec<BankTransaction>, ReconError> {
    let data = read_source(path)?;
    let rows = parse_bank(&data)?;
    log::debug!("ingested {} bank transactions from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn load_beacon(path: &Path) -> Result<Vec<BeaconEntry>, ReconError> {
    let data = read_source(path)?;
    let rows = parse_beacon(&data)?;
    log::debug!("ingested {} Beacon entries from {}", rows.len(), path.display());
    Ok(rows)
}

fn read_source(path: &Path) -> Result<String, ReconError> {
    std::fs::read_to_string(path).map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub fn parse_bank(data: &str) -> Result<Vec<BankTransaction>, ReconError> {
    let mut sheet = Sheet::new(data, "bank")?;
    let date = sheet.column("Date")?;
    let kind = sheet.column("Type")?;
    let description = sheet.column("Description")?;
    let amount = sheet.column("Amount")?;

    let mut rows = Vec::new();
    for (idx, record) in sheet.records() {
        let record = record?;
        let id = format!("BANK_{idx:04}");
        rows.push(BankTransaction {
            date: parse_date(&id, record.get(date), BANK_DATE_FORMAT)?,
            kind: cell(record.get(kind)),
            description: cell(record.get(description)),
            amount: parse_amount(&id, record.get(amount))?,
            id,
        });
    }
    Ok(rows)
}

pub fn parse_beacon(data: &str) -> Result<Vec<BeaconEntry>, ReconError> {
    let mut sheet = Sheet::new(data, "Beacon")?;
    let date = sheet.column("date")?;
    let trans_no = sheet.column("trans_no")?;
    let payee = sheet.column("payee")?;
    let amount = sheet.column("amount")?;
    let detail = sheet.optional_column("detail");

    let mut rows = Vec::new();
    for (idx, record) in sheet.records() {
        let record = record?;
        let id = format!("BEACON_{idx:04}");
        let trans_no = cell(record.get(trans_no));
        if trans_no.is_empty() {
            return Err(invalid(&id, "empty trans_no"));
        }
        rows.push(BeaconEntry {
            date: parse_date(&id, record.get(date), BEACON_DATE_FORMAT)?,
            trans_no,
            payee: cell(record.get(payee)),
            amount: parse_amount(&id, record.get(amount))?,
            detail: detail.map(|i| cell(record.get(i))).unwrap_or_default(),
            matched: false,
            id,
        });
    }
    Ok(rows)
}

/// A header-indexed CSV reader.
struct Sheet<'a> {
    source: &'static str,
    headers: Vec<String>,
    reader: csv::Reader<&'a [u8]>,
}

impl<'a> Sheet<'a> {
    fn new(data: &'a str, source: &'static str) -> Result<Self, ReconError> {
        let data = data.strip_prefix('\u{feff}').unwrap_or(data);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| invalid(&format!("{source} header"), &e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self { source, headers, reader })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn column(&self, name: &str) -> Result<usize, ReconError> {
        self.optional_column(name)
            .ok_or_else(|| invalid(&format!("{} header", self.source), &format!("missing column '{name}'")))
    }

    fn records(&mut self) -> impl Iterator<Item = (usize, Result<csv::StringRecord, ReconError>)> + '_ + use<'_, 'a> {
        let source = self.source;
        self.reader.records().enumerate().map(move |(idx, r)| {
            (idx, r.map_err(|e| invalid(&format!("{source} row {idx}"), &e.to_string())))
        })
    }
}

fn cell(value: Option<&str>) -> String {
    value.unwrap_or("").trim().to_string()
}

fn parse_date(id: &str, value: Option<&str>, format: &str) -> Result<NaiveDate, ReconError> {
    let value = value.unwrap_or("").trim();
    NaiveDate::parse_from_str(value, format)
        .map_err(|e| invalid(id, &format!("bad date '{value}' (expected {format}): {e}")))
}

/// Exact decimal; thousands separators are tolerated.
fn parse_amount(id: &str, value: Option<&str>) -> Result<Decimal, ReconError> {
    let value = value.unwrap_or("").trim();
    Decimal::from_str(&value.replace(',', "")).map_err(|e| invalid(id, &format!("bad amount '{value}': {e}")))
}

fn invalid(record: &str, message: &str) -> ReconError {
    ReconError::Validation { record: record.to_string(), message: message.to_string() }
}
