//! Order list filtering.

use serde::{Deserialize, Serialize};

use crate::models::{OrderStatus, Patient};

/// Filters as submitted by a list view (`?patientName=&status=`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub patient_name: Option<String>,
    pub status: Option<String>,
}

/// Status part of an [`OrderQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    Any,
    Is(OrderStatus),
    /// A status string that names no status; matches nothing.
    Unknown(String),
}

/// A composed order predicate. Both parts must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Lowercased needle, `None` when no name filter applies
    name_needle: Option<String>,
    status: StatusFilter,
}

/// Build a query from optional filters. Blank values mean "no filter".
pub fn build_order_query(filter: &OrderFilter) -> OrderQuery {
    let name_needle = filter
        .patient_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let status = match filter.status.as_deref().filter(|s| !s.is_empty()) {
        None => StatusFilter::Any,
        Some(s) => match OrderStatus::parse(s) {
            Some(status) => StatusFilter::Is(status),
            None => StatusFilter::Unknown(s.to_string()),
        },
    };

    OrderQuery {
        name_needle,
        status,
    }
}

impl OrderQuery {
    /// A query that matches every order.
    pub fn all() -> Self {
        Self {
            name_needle: None,
            status: StatusFilter::Any,
        }
    }

    pub fn status(&self) -> &StatusFilter {
        &self.status
    }

    /// True when no order can match, so the store need not be queried.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self.status, StatusFilter::Unknown(_))
    }

    /// Case-insensitive substring match on first OR last name.
    pub fn matches_patient(&self, patient: &Patient) -> bool {
        match &self.name_needle {
            None => true,
            Some(needle) => {
                patient.first_name.to_lowercase().contains(needle.as_str())
                    || patient.last_name.to_lowercase().contains(needle.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn patient(id: i64, first: &str, last: &str) -> Patient {
        Patient {
            id,
            first_name: first.into(),
            last_name: last.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            email: format!("{}@example.com", id),
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }

    fn query(name: Option<&str>, status: Option<&str>) -> OrderQuery {
        build_order_query(&OrderFilter {
            patient_name: name.map(String::from),
            status: status.map(String::from),
        })
    }

    #[test]
    fn test_name_substring_case_insensitive() {
        let q = query(Some("jo"), Some(""));
        assert!(q.matches_patient(&patient(1, "John", "Doe")));
        assert!(q.matches_patient(&patient(2, "Bojo", "Smith")));
        assert!(!q.matches_patient(&patient(3, "Anna", "Lee")));

        let q = query(Some("  DOE "), None);
        assert!(q.matches_patient(&patient(1, "John", "Doe")));
    }

    #[test]
    fn test_name_matches_last_name() {
        let q = query(Some("lee"), None);
        assert!(q.matches_patient(&patient(3, "Anna", "Lee")));
        assert!(!q.matches_patient(&patient(1, "John", "Doe")));
    }

    #[test]
    fn test_blank_filters_match_everything() {
        let q = query(Some("   "), Some(""));
        assert_eq!(q, OrderQuery::all());
        assert_eq!(q.status(), &StatusFilter::Any);
        assert!(q.matches_patient(&patient(3, "Anna", "Lee")));
    }

    #[test]
    fn test_status_exact_match() {
        for status in OrderStatus::ALL {
            let q = query(None, Some(status.as_str()));
            assert_eq!(q.status(), &StatusFilter::Is(status));
            assert!(!q.is_unsatisfiable());
        }
    }

    #[test]
    fn test_unknown_status_matches_nothing() {
        let q = query(None, Some("Completed"));
        assert!(q.is_unsatisfiable());
        assert_eq!(q.status(), &StatusFilter::Unknown("Completed".into()));
    }

    #[test]
    fn test_filters_compose() {
        let q = query(Some("JO"), Some("pending"));
        assert_eq!(q.status(), &StatusFilter::Is(OrderStatus::Pending));
        assert!(q.matches_patient(&patient(1, "John", "Doe")));
        assert!(q.matches_patient(&patient(2, "Bojo", "Smith")));
        assert!(!q.matches_patient(&patient(3, "Anna", "Lee")));

        let q = query(Some("anna"), Some("shipped"));
        assert!(q.is_unsatisfiable());
    }
}
