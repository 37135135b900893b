use calamine::{open_workbook_auto_from_rs, open_workbook_from_rs, Data, Range, Reader, Xls, Xlsx};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::Cursor;

pub const COL_NAME: &str = "Name";
pub const COL_SURNAME: &str = "Surname";
pub const COL_ENROLLMENT_CODE: &str = "EnrollmentCode";
pub const COL_EMAIL: &str = "Email";
pub const COL_PHONE: &str = "Phone";
pub const COL_SCHOOL: &str = "School";
pub const COL_INTENDED_MAJOR: &str = "IntendedMajor";
pub const COL_MUNICIPALITY: &str = "Municipality";
pub const COL_ACCEPTED: &str = "Accepted";
pub const COL_NOTES: &str = "Notes";

pub const REQUIRED_COLUMNS: [&str; 3] = [COL_NAME, COL_SURNAME, COL_EMAIL];

const KNOWN_COLUMNS: [&str; 10] = [
    COL_NAME,
    COL_SURNAME,
    COL_ENROLLMENT_CODE,
    COL_EMAIL,
    COL_PHONE,
    COL_SCHOOL,
    COL_INTENDED_MAJOR,
    COL_MUNICIPALITY,
    COL_ACCEPTED,
    COL_NOTES,
];

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("could not read spreadsheet: {0}")]
    Parse(String),
    #[error("spreadsheet has no data rows")]
    EmptyDataset,
    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RawValue {
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Int(i) => i.to_string(),
            // Phone numbers and enrollment codes typed as numbers come back as floats.
            RawValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Bool(b) => b.to_string(),
        }
    }
}

/// One spreadsheet data row, keyed by canonical column name.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    /// 1-based sheet row, header row included.
    pub row_number: usize,
    values: HashMap<String, RawValue>,
}

impl ImportRow {
    pub fn new(row_number: usize, values: HashMap<String, RawValue>) -> Self {
        Self { row_number, values }
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.values.get(column)
    }

    /// Trimmed text for `column`, `None` when absent or blank.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column)
            .map(RawValue::as_text)
            .filter(|s| !s.is_empty())
    }
}

/// Workbook container chosen from the uploaded file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xls,
}

impl WorkbookFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Some(WorkbookFormat::Xlsx),
            "xls" => Some(WorkbookFormat::Xls),
            _ => None,
        }
    }
}

/// Detects the container from the bytes.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<ImportRow>, TabularError> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(parse_err)?;
    rows_from_range(&first_sheet(workbook)?)
}

/// Reads the bytes strictly as `format`; any other container is a parse error.
pub fn parse_rows_as(bytes: &[u8], format: WorkbookFormat) -> Result<Vec<ImportRow>, TabularError> {
    let range = match format {
        WorkbookFormat::Xlsx => {
            first_sheet(open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(bytes)).map_err(parse_err)?)?
        }
        WorkbookFormat::Xls => {
            first_sheet(open_workbook_from_rs::<Xls<_>, _>(Cursor::new(bytes)).map_err(parse_err)?)?
        }
    };
    rows_from_range(&range)
}

fn parse_err(e: impl Display) -> TabularError {
    TabularError::Parse(e.to_string())
}

fn first_sheet<'a, R>(mut workbook: R) -> Result<Range<Data>, TabularError>
where
    R: Reader<Cursor<&'a [u8]>>,
    R::Error: Display,
{
    match workbook.worksheet_range_at(0) {
        Some(Ok(r)) => Ok(r),
        Some(Err(e)) => Err(parse_err(e)),
        None => Err(TabularError::Parse("workbook has no worksheets".to_string())),
    }
}

fn rows_from_range(range: &Range<Data>) -> Result<Vec<ImportRow>, TabularError> {
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut rows = range
        .rows()
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| raw_value(c).is_some()));

    let Some((_, header_cells)) = rows.next() else {
        return Err(TabularError::EmptyDataset);
    };
    let headers: Vec<Option<String>> = header_cells
        .iter()
        .map(|c| raw_value(c).map(|v| canonical_header(&v.as_text())))
        .collect();

    let mut out = Vec::new();
    for (offset, cells) in rows {
        let mut values = HashMap::new();
        for (col, cell) in cells.iter().enumerate() {
            let Some(Some(header)) = headers.get(col) else {
                continue;
            };
            if let Some(v) = raw_value(cell) {
                values.insert(header.clone(), v);
            }
        }
        out.push(ImportRow::new(first_row + offset + 1, values));
    }

    if out.is_empty() {
        return Err(TabularError::EmptyDataset);
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|req| !headers.iter().flatten().any(|h| h == *req))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(TabularError::MissingColumns { missing });
    }

    Ok(out)
}

fn raw_value(cell: &Data) -> Option<RawValue> {
    match cell {
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(RawValue::Text(s.clone())),
        Data::Int(i) => Some(RawValue::Int(*i)),
        Data::Float(f) => Some(RawValue::Float(*f)),
        Data::Bool(b) => Some(RawValue::Bool(*b)),
        Data::DateTime(d) => Some(RawValue::Float(d.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(RawValue::Text(s.clone())),
        _ => None,
    }
}

// "Enrollment code", "enrollment_code" and "EnrollmentCode" all land on the same column.
fn canonical_header(raw: &str) -> String {
    let key = squash(raw);
    KNOWN_COLUMNS
        .iter()
        .find(|c| squash(c) == key)
        .map(|c| c.to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
