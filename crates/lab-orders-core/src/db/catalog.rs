//! Lab test catalog database operations.

use rusqlite::{params, params_from_iter, OptionalExtension};

use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::{LabTest, Money, NewLabTest};

const LAB_TEST_COLUMNS: &str = "id, code, name, price_cents, turnaround_hours, created_at";

impl Database {
    /// Insert a new lab test. Duplicate codes violate a unique constraint.
    pub fn insert_lab_test(&self, test: &NewLabTest) -> DbResult<LabTest> {
        let ts = format_timestamp(&chrono::Utc::now());
        let created_at = parse_timestamp(&ts)?;

        self.conn.execute(
            r#"
            INSERT INTO lab_tests (
                code, name, price_cents, turnaround_hours, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![
                test.code,
                test.name,
                test.price.cents(),
                test.turnaround_hours,
                ts,
            ],
        )?;

        Ok(LabTest {
            id: self.conn.last_insert_rowid(),
            code: test.code.clone(),
            name: test.name.clone(),
            price: test.price,
            turnaround_hours: test.turnaround_hours,
            created_at,
        })
    }

    /// Update a lab test. Existing orders keep the totals they were written
    /// with; only later order writes see the new price.
    pub fn update_lab_test(&self, id: i64, test: &NewLabTest) -> DbResult<Option<LabTest>> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE lab_tests SET
                code = ?2,
                name = ?3,
                price_cents = ?4,
                turnaround_hours = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                id,
                test.code,
                test.name,
                test.price.cents(),
                test.turnaround_hours,
                format_timestamp(&chrono::Utc::now()),
            ],
        )?;

        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_lab_test(id)
    }

    /// Get a lab test by ID.
    pub fn get_lab_test(&self, id: i64) -> DbResult<Option<LabTest>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM lab_tests WHERE id = ?", LAB_TEST_COLUMNS),
                [id],
                LabTestRow::from_row,
            )
            .optional()?
            .map(LabTest::try_from)
            .transpose()
    }

    /// Get lab tests by ID. Unknown ids are skipped; output is ordered by id.
    pub fn get_lab_tests(&self, ids: &[i64]) -> DbResult<Vec<LabTest>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lab_tests WHERE id IN ({}) ORDER BY id",
            LAB_TEST_COLUMNS, placeholders
        ))?;

        let rows = stmt.query_map(params_from_iter(ids.iter()), LabTestRow::from_row)?;

        let mut tests = Vec::new();
        for row in rows {
            tests.push(row?.try_into()?);
        }
        Ok(tests)
    }

    /// List the catalog, newest first.
    pub fn list_lab_tests(&self) -> DbResult<Vec<LabTest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lab_tests ORDER BY created_at DESC, id DESC",
            LAB_TEST_COLUMNS
        ))?;

        let rows = stmt.query_map([], LabTestRow::from_row)?;

        let mut tests = Vec::new();
        for row in rows {
            tests.push(row?.try_into()?);
        }
        Ok(tests)
    }

    /// Delete a lab test.
    ///
    /// Refused with [`DbError::Referenced`] while any order lists the test.
    pub fn delete_lab_test(&self, id: i64) -> DbResult<bool> {
        let referencing: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM orders, json_each(orders.test_ids)
            WHERE json_each.value = ?
            "#,
            [id],
            |row| row.get(0),
        )?;

        if referencing > 0 {
            tracing::warn!(lab_test_id = id, referencing, "refusing to delete referenced lab test");
            return Err(DbError::Referenced(format!(
                "lab test {} is used by {} order(s)",
                id, referencing
            )));
        }

        let rows_affected = self
            .conn
            .execute("DELETE FROM lab_tests WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct LabTestRow {
    id: i64,
    code: String,
    name: String,
    price_cents: i64,
    turnaround_hours: u32,
    created_at: String,
}

impl LabTestRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            price_cents: row.get(3)?,
            turnaround_hours: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl TryFrom<LabTestRow> for LabTest {
    type Error = DbError;

    fn try_from(row: LabTestRow) -> Result<Self, Self::Error> {
        Ok(LabTest {
            id: row.id,
            code: row.code,
            name: row.name,
            price: Money::from_cents(row.price_cents),
            turnaround_hours: row.turnaround_hours,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
