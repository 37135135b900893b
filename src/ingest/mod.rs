//! Bulk ingestion: spreadsheet student import and batch attendance upsert.

pub mod attendance;
pub mod history;
pub mod import;
pub mod resolver;
pub mod tabular;

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    pub fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        crate::db::init_schema(&conn).expect("init schema");
        conn
    }

    /// Writes string cells into a single-sheet xlsx; empty strings are left unwritten.
    pub fn xlsx_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                sheet
                    .write_string(r as u32, c as u16, *value)
                    .expect("write cell");
            }
        }
        workbook.save_to_buffer().expect("save workbook")
    }

    pub fn add_school(conn: &Connection, name: &str) -> i64 {
        conn.execute("INSERT INTO schools(name) VALUES(?)", [name])
            .expect("insert school");
        conn.last_insert_rowid()
    }
}
