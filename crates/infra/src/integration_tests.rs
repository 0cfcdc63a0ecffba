//! Integration tests for the collaboration facade over the in-memory backend.
//!
//! Tests: Facade → Manager → RowStore → row policies / cascades / procedures
//!
//! Verifies:
//! - Expenses and their splits are created, fetched and deleted together
//! - Writes the row policy rejects surface as `NoRowsAffected`, data unchanged
//! - Invite redemption is atomic under concurrency
//! - Expired and deactivated tokens never verify

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, Utc};

    use wayfare_auth::StaticIdentity;
    use wayfare_core::{InviteTokenId, TripId, UserId};
    use wayfare_invites::{InvalidReason, InviteKind, InviteToken, generate_token};
    use wayfare_ledger::{ExpenseCategory, ExpensePatch, NewSplit, split_evenly};

    use crate::collaboration::{ExpenseDraft, TripCollaboration};
    use crate::error::CollabError;
    use crate::schema::{self, EXPENSE_SPLITS, EXPENSES, INVITE_TOKENS};
    use crate::store::{Filter, InMemoryBackend, InMemorySession, RowStore, StoreError, StoreOp, to_row};

    type Facade = TripCollaboration<InMemorySession, StaticIdentity>;

    fn setup() -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::arc();
        schema::provision(&backend);
        backend
    }

    fn facade(backend: &Arc<InMemoryBackend>, user: UserId) -> Facade {
        TripCollaboration::new(backend.as_user(user), StaticIdentity::user(user))
    }

    fn dinner(payer: UserId, amount: i64) -> ExpenseDraft {
        ExpenseDraft {
            title: "Dinner".to_string(),
            amount,
            category: ExpenseCategory::Food,
            payer_id: payer,
            expense_date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
        }
    }

    async fn count(backend: &Arc<InMemoryBackend>, table: &str) -> usize {
        backend.service().select(table, &Filter::new()).await.unwrap().len()
    }

    #[tokio::test]
    async fn dinner_for_two_is_one_expense_with_two_balanced_splits() {
        let backend = setup();
        let (alice, bob) = (UserId::new(), UserId::new());
        let trip = TripId::new();
        let collab = facade(&backend, alice);

        let created = collab
            .create_expense(
                trip,
                dinner(alice, 300),
                vec![NewSplit::new(alice, 150), NewSplit::new(bob, 150)],
            )
            .await
            .unwrap();

        assert_eq!(created.expense.created_by, alice);
        assert_eq!(created.splits.len(), 2);
        assert_eq!(created.split_total(), 300);

        let fetched = collab.fetch_expenses(trip).await.unwrap();
        assert_eq!(fetched.expenses, vec![created.expense.clone()]);
        let mut fetched_splits = fetched.splits.clone();
        let mut created_splits = created.splits.clone();
        fetched_splits.sort_by_key(|s| s.id);
        created_splits.sort_by_key(|s| s.id);
        assert_eq!(fetched_splits, created_splits);
    }

    #[tokio::test]
    async fn creating_without_identity_is_refused() {
        let backend = setup();
        let collab = TripCollaboration::new(backend.service(), StaticIdentity::anonymous());
        let payer = UserId::new();

        let err = collab
            .create_expense(TripId::new(), dinner(payer, 100), split_evenly(100, &[payer]))
            .await
            .unwrap_err();
        assert_eq!(err, CollabError::Unauthenticated);
        assert_eq!(count(&backend, EXPENSES).await, 0);
    }

    #[tokio::test]
    async fn failed_split_insert_leaves_no_expense_visible() {
        let backend = setup();
        let alice = UserId::new();
        let trip = TripId::new();
        let collab = facade(&backend, alice);

        backend.fail_next(StoreOp::Insert, EXPENSE_SPLITS, StoreError::Transport("reset".into()));
        let err = collab
            .create_expense(trip, dinner(alice, 300), vec![NewSplit::new(alice, 300)])
            .await
            .unwrap_err();

        assert!(matches!(err, CollabError::SplitInsertFailed { .. }));
        assert!(collab.fetch_expenses(trip).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_is_reported_as_an_orphan() {
        let backend = setup();
        let alice = UserId::new();
        let collab = facade(&backend, alice);

        backend.fail_next(StoreOp::Insert, EXPENSE_SPLITS, StoreError::Transport("reset".into()));
        backend.fail_next(StoreOp::Delete, EXPENSES, StoreError::Transport("reset".into()));
        let err = collab
            .create_expense(TripId::new(), dinner(alice, 300), vec![NewSplit::new(alice, 300)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "orphaned_expense");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn foreign_update_affects_nothing() {
        let backend = setup();
        let (alice, mallory) = (UserId::new(), UserId::new());
        let created = facade(&backend, alice)
            .create_expense(TripId::new(), dinner(alice, 300), vec![NewSplit::new(alice, 300)])
            .await
            .unwrap();

        let patch = ExpensePatch {
            title: Some("Stolen".to_string()),
            ..ExpensePatch::default()
        };
        let err = facade(&backend, mallory)
            .update_expense(created.expense.id, patch, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CollabError::NoRowsAffected { .. }));

        let stored = backend
            .service()
            .select(EXPENSES, &Filter::by_id(created.expense.id))
            .await
            .unwrap();
        assert_eq!(stored, vec![to_row(&created.expense).unwrap()]);
    }

    #[tokio::test]
    async fn owner_update_without_splits_keeps_the_current_set() {
        let backend = setup();
        let (alice, bob) = (UserId::new(), UserId::new());
        let collab = facade(&backend, alice);
        let created = collab
            .create_expense(
                TripId::new(),
                dinner(alice, 300),
                vec![NewSplit::new(alice, 100), NewSplit::new(bob, 200)],
            )
            .await
            .unwrap();

        let patch = ExpensePatch {
            title: Some("  Late dinner ".to_string()),
            category: Some(ExpenseCategory::Other),
            ..ExpensePatch::default()
        };
        let updated = collab.update_expense(created.expense.id, patch, None).await.unwrap();

        assert_eq!(updated.expense.title, "Late dinner");
        assert_eq!(updated.expense.category, ExpenseCategory::Other);
        assert_eq!(updated.expense.updated_by, Some(alice));
        assert_eq!(updated.splits.len(), 2);
        assert!(updated.is_balanced());
    }

    #[tokio::test]
    async fn split_delete_failure_keeps_splits_intact() {
        let backend = setup();
        let alice = UserId::new();
        let collab = facade(&backend, alice);
        let trip = TripId::new();
        let created = collab
            .create_expense(trip, dinner(alice, 300), vec![NewSplit::new(alice, 300)])
            .await
            .unwrap();

        let patch = ExpensePatch {
            amount: Some(400),
            ..ExpensePatch::default()
        };
        let splits = split_evenly(400, &[alice, UserId::new()]);

        backend.fail_next(StoreOp::Delete, EXPENSE_SPLITS, StoreError::Transport("reset".into()));
        let err = collab
            .update_expense(created.expense.id, patch.clone(), Some(splits.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, CollabError::SplitDeleteFailed { .. }));
        assert!(err.is_retryable());

        // Old splits survive while the patch has already landed.
        let stored = collab.fetch_expenses(trip).await.unwrap();
        assert_eq!(stored.expenses[0].amount, 400);
        assert_eq!(stored.splits.len(), 1);
        assert_eq!(stored.splits[0].amount, 300);

        // Repeating the whole update converges.
        let repaired = collab
            .update_expense(created.expense.id, patch, Some(splits))
            .await
            .unwrap();
        assert_eq!(repaired.expense.amount, 400);
        assert_eq!(repaired.splits.iter().map(|s| s.amount).sum::<i64>(), 400);
    }

    #[tokio::test]
    async fn split_insert_failure_during_update_is_named() {
        let backend = setup();
        let alice = UserId::new();
        let collab = facade(&backend, alice);
        let created = collab
            .create_expense(TripId::new(), dinner(alice, 300), vec![NewSplit::new(alice, 300)])
            .await
            .unwrap();

        backend.fail_next(StoreOp::Insert, EXPENSE_SPLITS, StoreError::Transport("reset".into()));
        let err = collab
            .update_expense(
                created.expense.id,
                ExpensePatch {
                    amount: Some(500),
                    ..ExpensePatch::default()
                },
                Some(vec![NewSplit::new(alice, 500)]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CollabError::SplitInsertFailed { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn delete_removes_expense_and_splits_once() {
        let backend = setup();
        let (alice, mallory) = (UserId::new(), UserId::new());
        let collab = facade(&backend, alice);
        let created = collab
            .create_expense(
                TripId::new(),
                dinner(alice, 300),
                vec![NewSplit::new(alice, 150), NewSplit::new(mallory, 150)],
            )
            .await
            .unwrap();

        let err = facade(&backend, mallory)
            .delete_expense(created.expense.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CollabError::NoRowsAffected { .. }));
        assert_eq!(count(&backend, EXPENSES).await, 1);

        collab.delete_expense(created.expense.id).await.unwrap();
        assert_eq!(count(&backend, EXPENSES).await, 0);
        assert_eq!(count(&backend, EXPENSE_SPLITS).await, 0);

        let err = collab.delete_expense(created.expense.id).await.unwrap_err();
        assert!(matches!(err, CollabError::NoRowsAffected { .. }));
    }

    #[tokio::test]
    async fn issued_token_verifies_with_matching_trip_and_kind() {
        let backend = setup();
        let owner = UserId::new();
        let trip = TripId::new();
        let collab = facade(&backend, owner);

        let invite = collab
            .create_invite_token(trip, InviteKind::Member, Some(3), None)
            .await
            .unwrap();
        let verification = facade(&backend, UserId::new())
            .verify_invite_token(&invite.token)
            .await
            .unwrap();

        assert!(verification.is_valid);
        assert_eq!(verification.trip_id, Some(trip));
        assert_eq!(verification.invite_type, Some(InviteKind::Member));
        assert_eq!(collab.get_invite_tokens(trip).await.unwrap(), vec![invite]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_use_token_is_redeemed_exactly_once_under_concurrency() {
        let backend = setup();
        let owner = facade(&backend, UserId::new());

        for _ in 0..20 {
            let invite = owner
                .create_invite_token(TripId::new(), InviteKind::Member, None, Some(1))
                .await
                .unwrap();

            let first = Arc::new(facade(&backend, UserId::new()));
            let second = Arc::new(facade(&backend, UserId::new()));
            let (token_a, token_b) = (invite.token.clone(), invite.token.clone());

            let a = tokio::spawn(async move { first.use_invite_token(&token_a).await });
            let b = tokio::spawn(async move { second.use_invite_token(&token_b).await });
            let (a, b) = tokio::join!(a, b);

            let outcomes = [a.unwrap().unwrap(), b.unwrap().unwrap()];
            assert_eq!(outcomes.iter().filter(|redeemed| **redeemed).count(), 1);

            let verification = owner.verify_invite_token(&invite.token).await.unwrap();
            assert_eq!(verification.reason(), Some(InvalidReason::MaxUsesReached));
        }
    }

    #[tokio::test]
    async fn expired_token_never_verifies() {
        let backend = setup();
        let owner = UserId::new();
        let now = Utc::now();
        let expired = InviteToken {
            id: InviteTokenId::new(),
            trip_id: TripId::new(),
            token: generate_token(),
            invite_type: InviteKind::Companion,
            created_by: owner,
            expires_at: Some(now - Duration::minutes(1)),
            max_uses: None,
            use_count: 0,
            is_active: true,
            created_at: now - Duration::days(8),
        };
        backend
            .service()
            .insert(INVITE_TOKENS, vec![to_row(&expired).unwrap()])
            .await
            .unwrap();

        let collab = facade(&backend, UserId::new());
        let verification = collab.verify_invite_token(&expired.token).await.unwrap();
        assert!(!verification.is_valid);
        assert_eq!(verification.reason(), Some(InvalidReason::Expired));
        assert!(!collab.use_invite_token(&expired.token).await.unwrap());
    }

    #[tokio::test]
    async fn deactivated_token_verifies_inactive() {
        let backend = setup();
        let owner = facade(&backend, UserId::new());
        let invite = owner
            .create_invite_token(TripId::new(), InviteKind::Member, None, None)
            .await
            .unwrap();

        owner.deactivate_invite_token(invite.id).await.unwrap();

        let verification = owner.verify_invite_token(&invite.token).await.unwrap();
        assert!(!verification.is_valid);
        assert_eq!(verification.reason(), Some(InvalidReason::Inactive));

        let err = owner.deactivate_invite_token(InviteTokenId::new()).await.unwrap_err();
        assert_eq!(err.kind(), "no_rows_affected");
    }

    #[tokio::test]
    async fn unprovisioned_invite_table_reads_as_schema_missing() {
        let backend = InMemoryBackend::arc();
        schema::provision_expenses(&backend);
        let collab = facade(&backend, UserId::new());

        let err = collab
            .create_invite_token(TripId::new(), InviteKind::Member, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CollabError::SchemaMissing(_)));

        let err = collab.get_invite_tokens(TripId::new()).await.unwrap_err();
        assert_eq!(err.kind(), "schema_missing");
    }
}
