use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wayfare_core::{DomainError, DomainResult, Entity, ExpenseId, TripId, UserId};

/// Closed set of expense categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Food,
    Transport,
    Accommodation,
    Ticket,
    Shopping,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::Food,
        ExpenseCategory::Transport,
        ExpenseCategory::Accommodation,
        ExpenseCategory::Ticket,
        ExpenseCategory::Shopping,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Food => "food",
            ExpenseCategory::Transport => "transport",
            ExpenseCategory::Accommodation => "accommodation",
            ExpenseCategory::Ticket => "ticket",
            ExpenseCategory::Shopping => "shopping",
            ExpenseCategory::Other => "other",
        }
    }
}

impl core::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ExpenseCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                DomainError::validation(
                    "category must be one of: food, transport, accommodation, ticket, shopping, other",
                )
            })
    }
}

/// A stored expense row.
///
/// `amount` is in minor units (e.g. cents) and is always positive once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub trip_id: TripId,
    pub title: String,
    pub amount: i64,
    pub category: ExpenseCategory,
    pub payer_id: UserId,
    pub expense_date: NaiveDate,
    pub created_by: UserId,
    #[serde(default)]
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for creating an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub trip_id: TripId,
    pub title: String,
    pub amount: i64,
    pub category: ExpenseCategory,
    pub payer_id: UserId,
    pub expense_date: NaiveDate,
    pub created_by: UserId,
}

impl NewExpense {
    pub fn validate(&self) -> DomainResult<()> {
        if self.trip_id.is_nil() {
            return Err(DomainError::invalid_id("trip_id is required"));
        }
        if self.payer_id.is_nil() {
            return Err(DomainError::invalid_id("payer_id is required"));
        }
        if self.created_by.is_nil() {
            return Err(DomainError::invalid_id("created_by is required"));
        }
        validate_title(&self.title)?;
        validate_amount(self.amount)
    }

    /// Materialize the row that will be inserted.
    pub fn into_expense(self, id: ExpenseId, now: DateTime<Utc>) -> Expense {
        Expense {
            id,
            trip_id: self.trip_id,
            title: self.title.trim().to_string(),
            amount: self.amount,
            category: self.category,
            payer_id: self.payer_id,
            expense_date: self.expense_date,
            created_by: self.created_by,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an expense. `None` fields are left untouched.
///
/// Serializes to exactly the columns being changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ExpenseCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_date: Option<NaiveDate>,
}

impl ExpensePatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        if self.payer_id.is_some_and(|p| p.is_nil()) {
            return Err(DomainError::invalid_id("payer_id is required"));
        }
        Ok(())
    }

    pub fn changes_amount(&self) -> bool {
        self.amount.is_some()
    }

    /// Trimmed copy, ready to be written.
    pub fn normalized(mut self) -> Self {
        if let Some(title) = self.title.as_mut() {
            *title = title.trim().to_string();
        }
        self
    }
}

fn validate_title(title: &str) -> DomainResult<()> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    Ok(())
}

fn validate_amount(amount: i64) -> DomainResult<()> {
    if amount <= 0 {
        return Err(DomainError::validation("amount must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dinner() -> NewExpense {
        NewExpense {
            trip_id: TripId::new(),
            title: "  Dinner ".to_string(),
            amount: 300,
            category: ExpenseCategory::Food,
            payer_id: UserId::new(),
            expense_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            created_by: UserId::new(),
        }
    }

    #[test]
    fn valid_expense_materializes_trimmed_row() {
        let input = dinner();
        input.validate().unwrap();

        let now = Utc::now();
        let id = ExpenseId::new();
        let row = input.clone().into_expense(id, now);
        assert_eq!(row.id, id);
        assert_eq!(row.title, "Dinner");
        assert_eq!(row.updated_by, None);
        assert_eq!(row.created_at, now);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        for amount in [0, -1] {
            let input = NewExpense { amount, ..dinner() };
            assert_eq!(
                input.validate(),
                Err(DomainError::validation("amount must be positive"))
            );
        }
    }

    #[test]
    fn blank_title_and_nil_ids_are_rejected() {
        let blank = NewExpense {
            title: "   ".to_string(),
            ..dinner()
        };
        assert!(matches!(blank.validate(), Err(DomainError::Validation(_))));

        let no_trip = NewExpense {
            trip_id: TripId::from_uuid(uuid::Uuid::nil()),
            ..dinner()
        };
        assert!(matches!(no_trip.validate(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn category_round_trips_lowercase() {
        for c in ExpenseCategory::ALL {
            assert_eq!(c.as_str().parse::<ExpenseCategory>().unwrap(), c);
            assert_eq!(
                serde_json::to_value(c).unwrap(),
                serde_json::Value::String(c.as_str().to_string())
            );
        }
        assert!("souvenirs".parse::<ExpenseCategory>().is_err());
        assert_eq!(" Food ".parse::<ExpenseCategory>().unwrap(), ExpenseCategory::Food);
    }

    #[test]
    fn patch_serializes_only_changed_columns() {
        let patch = ExpensePatch {
            title: Some("Lunch".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Lunch" }));
        assert!(!patch.changes_amount());

        let bad = ExpensePatch {
            amount: Some(0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
