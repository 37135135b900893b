use crate::ingest::history;
use crate::ingest::resolver::ReferenceResolver;
use crate::ingest::tabular::{self, ImportRow, RawValue, TabularError, WorkbookFormat};
use crate::store::{opt_text, QueryExecutor, StoreError};
use rusqlite::types::Value;
use serde::Serialize;

pub const MAX_ERROR_DETAILS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub inserted_count: usize,
    #[serde(rename = "errorCount")]
    pub failed_count: usize,
    pub error_details: Vec<String>,
}

impl ImportReport {
    fn record_failure(&mut self, row_number: usize, error: &StoreError) {
        self.failed_count += 1;
        if self.error_details.len() < MAX_ERROR_DETAILS {
            self.error_details.push(format!("Row {}: {}", row_number, error));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub import_id: Option<String>,
    pub previous_import_id: Option<String>,
    #[serde(flatten)]
    pub report: ImportReport,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Tabular(#[from] TabularError),
    #[error("failed to load reference schools: {0}")]
    References(#[source] StoreError),
}

const INSERT_STUDENT_SQL: &str = "INSERT INTO students(
    name, surname, enrollment_code, email, phone, school_id,
    intended_major, municipality, accepted, notes
) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// True only for boolean `true` or the literal tokens `SI` / `SÍ`.
pub fn is_accepted(raw: Option<&RawValue>) -> bool {
    match raw {
        Some(RawValue::Bool(b)) => *b,
        Some(RawValue::Text(s)) => matches!(s.trim().to_uppercase().as_str(), "SI" | "SÍ"),
        _ => false,
    }
}

fn insert_student(
    exec: &impl QueryExecutor,
    row: &ImportRow,
    school_id: Option<i64>,
) -> Result<i64, StoreError> {
    let params = [
        opt_text(row.text(tabular::COL_NAME)),
        opt_text(row.text(tabular::COL_SURNAME)),
        opt_text(row.text(tabular::COL_ENROLLMENT_CODE)),
        opt_text(row.text(tabular::COL_EMAIL)),
        opt_text(row.text(tabular::COL_PHONE)),
        school_id.map(Value::Integer).unwrap_or(Value::Null),
        opt_text(row.text(tabular::COL_INTENDED_MAJOR)),
        opt_text(row.text(tabular::COL_MUNICIPALITY)),
        Value::Integer(is_accepted(row.get(tabular::COL_ACCEPTED)) as i64),
        opt_text(row.text(tabular::COL_NOTES)),
    ];
    Ok(exec.execute(INSERT_STUDENT_SQL, &params)?.last_insert_id)
}

/// Inserts each row independently; a failed row is counted and never stops the rest.
pub fn run_import(
    exec: &impl QueryExecutor,
    rows: &[ImportRow],
    schools: &ReferenceResolver,
) -> ImportReport {
    let mut report = ImportReport::default();
    for row in rows {
        let school_id = row
            .text(tabular::COL_SCHOOL)
            .and_then(|name| schools.resolve(&name));
        match insert_student(exec, row, school_id) {
            Ok(_) => report.inserted_count += 1,
            Err(e) => {
                log::debug!("import row {} rejected: {}", row.row_number, e);
                report.record_failure(row.row_number, &e);
            }
        }
    }
    report
}

/// `format` pins the container; `None` detects it from the bytes.
pub fn import_students(
    exec: &impl QueryExecutor,
    bytes: &[u8],
    format: Option<WorkbookFormat>,
) -> Result<ImportReport, ImportError> {
    let rows = match format {
        Some(f) => tabular::parse_rows_as(bytes, f)?,
        None => tabular::parse_rows(bytes)?,
    };
    let schools = ReferenceResolver::load_schools(exec).map_err(ImportError::References)?;
    if schools.is_empty() {
        log::debug!("no schools registered; every school reference will be left empty");
    }
    log::info!(
        "importing {} spreadsheet rows ({} schools in reference set)",
        rows.len(),
        schools.len()
    );
    Ok(run_import(exec, &rows, &schools))
}

/// Runs an import and records it in the import history.
pub fn import_workbook(
    exec: &impl QueryExecutor,
    file_name: Option<&str>,
    bytes: &[u8],
    format: Option<WorkbookFormat>,
) -> Result<ImportOutcome, ImportError> {
    let digest = history::file_digest(bytes);
    let previous_import_id = match history::previous_import(exec, &digest) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("could not look up import history: {}", e);
            None
        }
    };
    if let Some(prev) = &previous_import_id {
        log::warn!("file {} was already imported as {}", digest, prev);
    }

    let report = import_students(exec, bytes, format)?;
    log::info!(
        "import finished: {} inserted, {} failed",
        report.inserted_count,
        report.failed_count
    );

    // Rows are already committed at this point, so a history failure must not fail the call.
    let import_id = match history::record_import(exec, file_name, &digest, &report) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("could not record import batch: {}", e);
            None
        }
    };

    Ok(ImportOutcome {
        import_id,
        previous_import_id,
        report,
    })
}
