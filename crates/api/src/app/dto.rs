use serde::Deserialize;

use wayfare_infra::ExpenseDraft;
use wayfare_invites::InviteKind;
use wayfare_ledger::{ExpensePatch, NewSplit};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    #[serde(flatten)]
    pub expense: ExpenseDraft,
    pub splits: Vec<NewSplit>,
}

/// Patch fields at the top level, plus an optional replacement split set.
#[derive(Debug, Deserialize)]
pub struct UpdateExpenseRequest {
    #[serde(flatten)]
    pub patch: ExpensePatch,
    #[serde(default)]
    pub splits: Option<Vec<NewSplit>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    #[serde(default = "default_invite_kind")]
    pub invite_type: InviteKind,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub max_uses: Option<u32>,
}

fn default_invite_kind() -> InviteKind {
    InviteKind::Member
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfare_core::UserId;

    #[test]
    fn update_request_splits_patch_from_splits() {
        let user = UserId::new();
        let req: UpdateExpenseRequest = serde_json::from_value(json!({
            "title": "Taxi",
            "amount": 40,
            "splits": [{ "user_id": user, "amount": 40 }],
        }))
        .unwrap();

        assert_eq!(req.patch.title.as_deref(), Some("Taxi"));
        assert_eq!(req.patch.amount, Some(40));
        assert_eq!(req.splits, Some(vec![NewSplit::new(user, 40)]));

        let req: UpdateExpenseRequest = serde_json::from_value(json!({ "category": "ticket" })).unwrap();
        assert!(req.splits.is_none());
        assert!(!req.patch.changes_amount());
    }

    #[test]
    fn invite_kind_defaults_to_member() {
        let req: CreateInviteRequest = serde_json::from_value(json!({ "max_uses": 1 })).unwrap();
        assert_eq!(req.invite_type, InviteKind::Member);
        assert_eq!(req.max_uses, Some(1));
        assert_eq!(req.expires_in_days, None);
    }
}
