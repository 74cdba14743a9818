//! Order database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::patients::PatientRow;
use super::{format_timestamp, parse_date, parse_timestamp, Database, DbError, DbResult};
use crate::models::{LabTest, Money, Order, OrderStatus, OrderWithPatient, Patient};
use crate::orders::{OrderQuery, OrderRepository, StatusFilter, ValidatedOrder};

const ORDER_COLUMNS: &str = "o.id, o.patient_id, o.test_ids, o.total_cost_cents, \
     o.estimated_ready_date, o.status, o.created_at";

const PATIENT_COLUMNS_PREFIXED: &str = "p.id, p.first_name, p.last_name, p.date_of_birth, \
     p.email, p.phone, p.address, p.created_at";

impl OrderRepository for Database {
    fn patient_exists(&self, patient_id: i64) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn find_lab_tests(&self, ids: &[i64]) -> DbResult<Vec<LabTest>> {
        self.get_lab_tests(ids)
    }

    fn insert_order(&self, order: &ValidatedOrder, created_at: DateTime<Utc>) -> DbResult<Order> {
        let test_ids_json = serde_json::to_string(&order.test_ids)?;
        let ts = format_timestamp(&created_at);

        self.conn.execute(
            r#"
            INSERT INTO orders (
                patient_id, test_ids, total_cost_cents, estimated_ready_date,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                order.patient_id,
                test_ids_json,
                order.total_cost.cents(),
                order.estimated_ready_date.format("%Y-%m-%d").to_string(),
                order.status.as_str(),
                ts,
            ],
        )?;

        Ok(Order {
            id: self.conn.last_insert_rowid(),
            patient_id: order.patient_id,
            test_ids: order.test_ids.clone(),
            total_cost: order.total_cost,
            estimated_ready_date: order.estimated_ready_date,
            status: order.status,
            created_at: parse_timestamp(&ts)?,
        })
    }

    fn update_order(&self, id: i64, order: &ValidatedOrder) -> DbResult<Option<Order>> {
        let test_ids_json = serde_json::to_string(&order.test_ids)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE orders SET
                patient_id = ?2,
                test_ids = ?3,
                total_cost_cents = ?4,
                estimated_ready_date = ?5,
                status = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                id,
                order.patient_id,
                test_ids_json,
                order.total_cost.cents(),
                order.estimated_ready_date.format("%Y-%m-%d").to_string(),
                order.status.as_str(),
                format_timestamp(&Utc::now()),
            ],
        )?;

        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_order(id)
    }

    fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM orders o WHERE o.id = ?", ORDER_COLUMNS),
                [id],
                OrderRow::from_row,
            )
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    fn list_orders(&self, query: &OrderQuery) -> DbResult<Vec<OrderWithPatient>> {
        let status = match query.status() {
            StatusFilter::Any => None,
            StatusFilter::Is(status) => Some(status.as_str()),
            StatusFilter::Unknown(_) => return Ok(Vec::new()),
        };

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}, {}
            FROM orders o
            JOIN patients p ON p.id = o.patient_id
            WHERE (?1 IS NULL OR o.status = ?1)
            ORDER BY o.created_at DESC, o.id DESC
            "#,
            ORDER_COLUMNS, PATIENT_COLUMNS_PREFIXED
        ))?;

        let rows = stmt.query_map([status], |row| {
            Ok((OrderRow::from_row(row)?, PatientRow::from_row_at(row, 7)?))
        })?;

        let mut orders = Vec::new();
        for row in rows {
            let (order_row, patient_row) = row?;
            let patient = Patient::try_from(patient_row)?;
            // Unicode case folding, not SQL LIKE
            if !query.matches_patient(&patient) {
                continue;
            }
            orders.push(OrderWithPatient {
                order: order_row.try_into()?,
                patient,
            });
        }
        Ok(orders)
    }
}

/// Intermediate row struct for database mapping.
struct OrderRow {
    id: i64,
    patient_id: i64,
    test_ids: String,
    total_cost_cents: i64,
    estimated_ready_date: String,
    status: String,
    created_at: String,
}

impl OrderRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            test_ids: row.get(2)?,
            total_cost_cents: row.get(3)?,
            estimated_ready_date: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let test_ids: Vec<i64> = serde_json::from_str(&row.test_ids)?;
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown order status: {}", row.status)))?;

        Ok(Order {
            id: row.id,
            patient_id: row.patient_id,
            test_ids,
            total_cost: Money::from_cents(row.total_cost_cents),
            estimated_ready_date: parse_date(&row.estimated_ready_date)?,
            status,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreFailure;
    use crate::models::{NewLabTest, NewPatient};
    use crate::orders::{build_order_query, OrderFilter};
    use chrono::{Duration, NaiveDate, TimeZone};

    struct Fixture {
        db: Database,
        john: i64,
        anna: i64,
        cbc: i64,
        lipid: i64,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let dob = NaiveDate::from_ymd_opt(1985, 2, 3).unwrap();
        let john = db
            .insert_patient(&NewPatient::new("John", "Doe", dob, "john@example.com"))
            .unwrap()
            .id;
        let anna = db
            .insert_patient(&NewPatient::new("Anna", "Lee", dob, "anna@example.com"))
            .unwrap()
            .id;
        let cbc = db
            .insert_lab_test(&NewLabTest::new("CBC", "Complete Blood Count", Money::from_cents(2500), 24))
            .unwrap()
            .id;
        let lipid = db
            .insert_lab_test(&NewLabTest::new("LIPID", "Lipid Panel", Money::from_cents(3500), 48))
            .unwrap()
            .id;
        Fixture { db, john, anna, cbc, lipid }
    }

    fn validated(patient_id: i64, test_ids: Vec<i64>, status: OrderStatus) -> ValidatedOrder {
        ValidatedOrder {
            patient_id,
            test_ids,
            total_cost: Money::from_cents(6000),
            estimated_ready_date: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            status,
        }
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_insert_and_get() {
        let f = setup();
        let order = validated(f.john, vec![f.cbc, f.lipid], OrderStatus::Pending);

        let inserted = f.db.insert_order(&order, at(0)).unwrap();
        let retrieved = f.db.get_order(inserted.id).unwrap().unwrap();

        assert_eq!(retrieved, inserted);
        assert_eq!(retrieved.test_ids, vec![f.cbc, f.lipid]);
        assert_eq!(retrieved.total_cost, Money::from_cents(6000));
        assert_eq!(retrieved.created_at, at(0));
    }

    #[test]
    fn test_insert_with_missing_patient_is_referential_failure() {
        let f = setup();
        let order = validated(999, vec![f.cbc], OrderStatus::Pending);

        let err = f.db.insert_order(&order, at(0)).unwrap_err();
        assert_eq!(err.classify(), StoreFailure::ForeignKey);

        let count: i64 = f
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_update_keeps_created_at() {
        let f = setup();
        let inserted = f
            .db
            .insert_order(&validated(f.john, vec![f.cbc], OrderStatus::Pending), at(0))
            .unwrap();

        let updated = f
            .db
            .update_order(inserted.id, &validated(f.anna, vec![f.lipid], OrderStatus::Processing))
            .unwrap()
            .unwrap();
        assert_eq!(updated.patient_id, f.anna);
        assert_eq!(updated.test_ids, vec![f.lipid]);
        assert_eq!(updated.status, OrderStatus::Processing);
        assert_eq!(updated.created_at, at(0));

        assert!(f
            .db
            .update_order(404, &validated(f.anna, vec![f.lipid], OrderStatus::Processing))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_filters_and_orders_newest_first() {
        let f = setup();
        let first = f
            .db
            .insert_order(&validated(f.john, vec![f.cbc], OrderStatus::Completed), at(0))
            .unwrap();
        let second = f
            .db
            .insert_order(&validated(f.anna, vec![f.cbc], OrderStatus::Pending), at(5))
            .unwrap();
        let third = f
            .db
            .insert_order(&validated(f.john, vec![f.lipid], OrderStatus::Pending), at(10))
            .unwrap();

        let all = f.db.list_orders(&OrderQuery::all()).unwrap();
        let ids: Vec<i64> = all.iter().map(|o| o.order.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
        assert_eq!(all[0].patient.first_name, "John");

        let query = build_order_query(&OrderFilter {
            patient_name: Some("JO".into()),
            status: Some("pending".into()),
        });
        let ids: Vec<i64> = f
            .db
            .list_orders(&query)
            .unwrap()
            .iter()
            .map(|o| o.order.id)
            .collect();
        assert_eq!(ids, vec![third.id]);

        let query = build_order_query(&OrderFilter {
            patient_name: None,
            status: Some("completed".into()),
        });
        let ids: Vec<i64> = f
            .db
            .list_orders(&query)
            .unwrap()
            .iter()
            .map(|o| o.order.id)
            .collect();
        assert_eq!(ids, vec![first.id]);
    }

    #[test]
    fn test_list_breaks_created_at_ties_by_id() {
        let f = setup();
        let ids: Vec<i64> = [f.john, f.anna, f.john]
            .iter()
            .map(|&patient| {
                f.db
                    .insert_order(&validated(patient, vec![f.cbc], OrderStatus::Pending), at(0))
                    .unwrap()
                    .id
            })
            .collect();
        let later = f
            .db
            .insert_order(&validated(f.anna, vec![f.lipid], OrderStatus::Pending), at(1))
            .unwrap();

        let listed: Vec<i64> = f
            .db
            .list_orders(&OrderQuery::all())
            .unwrap()
            .iter()
            .map(|o| o.order.id)
            .collect();
        assert_eq!(listed, vec![later.id, ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_referenced_lab_test_cannot_be_deleted() {
        let f = setup();
        f.db.insert_order(&validated(f.john, vec![f.lipid], OrderStatus::Pending), at(0))
            .unwrap();

        let err = f.db.delete_lab_test(f.lipid).unwrap_err();
        assert!(matches!(err, DbError::Referenced(_)));
        assert_eq!(err.classify(), StoreFailure::ForeignKey);

        // Unreferenced tests are still deletable
        assert!(f.db.delete_lab_test(f.cbc).unwrap());
    }

    #[test]
    fn test_patient_with_orders_cannot_be_deleted() {
        let f = setup();
        f.db.insert_order(&validated(f.john, vec![f.cbc], OrderStatus::Pending), at(0))
            .unwrap();

        let err = f.db.delete_patient(f.john).unwrap_err();
        assert_eq!(err.classify(), StoreFailure::ForeignKey);
        assert!(f.db.delete_patient(f.anna).unwrap());
    }
}
