//! Invite token manager.
//!
//! Issues capability tokens and hands verification and redemption to the two
//! store procedures. The usability check and the `use_count` increment happen
//! inside `use_invite_token` in one atomic step; this side never evaluates the
//! predicate itself, so two concurrent redemptions of a single-use token cannot
//! both succeed.

use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info, instrument, warn};

use wayfare_auth::IdentityResolver;
use wayfare_core::{InviteTokenId, TripId};
use wayfare_invites::{
    InviteKind, InviteToken, NewInviteToken, TokenVerification, generate_token, is_well_formed,
};

use crate::error::{CollabError, CollabResult};
use crate::schema::{INVITE_TOKENS, TOKEN_ARG, USE_INVITE_TOKEN, VERIFY_INVITE_TOKEN};
use crate::store::{Direction, Filter, Row, RowStore, StoreError, from_row, from_rows, single_value, to_row};

const ENTITY: &str = "invite token";

pub struct InviteTokens<S, I> {
    store: S,
    identity: I,
}

impl<S, I> InviteTokens<S, I>
where
    S: RowStore,
    I: IdentityResolver,
{
    pub fn new(store: S, identity: I) -> Self {
        Self { store, identity }
    }

    /// Issue a new token for a trip. The returned row's `token` is the
    /// capability string to hand out.
    #[instrument(skip(self), fields(trip_id = %trip_id), err)]
    pub async fn create_invite_token(
        &self,
        trip_id: TripId,
        kind: InviteKind,
        expires_in_days: Option<u32>,
        max_uses: Option<u32>,
    ) -> CollabResult<InviteToken> {
        let created_by = self.identity.current().ok_or(CollabError::Unauthenticated)?;

        let request = NewInviteToken {
            trip_id,
            invite_type: kind,
            created_by,
            expires_in_days,
            max_uses,
        };
        request.validate()?;

        let invite = request.issue(generate_token(), Utc::now())?;
        let inserted = self
            .store
            .insert(INVITE_TOKENS, vec![to_row(&invite)?])
            .await?;

        let invite = match inserted.rows.into_iter().next() {
            Some(row) => from_row(row)?,
            None => invite,
        };
        info!(token_id = %invite.id, "invite token issued");
        Ok(invite)
    }

    /// Check a token without consuming it.
    #[instrument(skip(self, token), err)]
    pub async fn verify_invite_token(&self, token: &str) -> CollabResult<TokenVerification> {
        if !is_well_formed(token) {
            debug!("malformed token; not consulting the store");
            return Ok(TokenVerification::evaluate(None, Utc::now()));
        }

        let value = self
            .store
            .call_procedure(VERIFY_INVITE_TOKEN, token_args(token))
            .await?;
        let verification = serde_json::from_value(single_value(value)?)
            .map_err(|e| StoreError::Decode(format!("{VERIFY_INVITE_TOKEN} result: {e}")))?;
        Ok(verification)
    }

    /// Redeem a token once. `false` means it was unknown or no longer usable.
    #[instrument(skip(self, token), err)]
    pub async fn use_invite_token(&self, token: &str) -> CollabResult<bool> {
        if !is_well_formed(token) {
            debug!("malformed token; not consulting the store");
            return Ok(false);
        }

        let value = self
            .store
            .call_procedure(USE_INVITE_TOKEN, token_args(token))
            .await?;
        let redeemed = match single_value(value)? {
            JsonValue::Bool(b) => b,
            other => {
                return Err(StoreError::Decode(format!(
                    "{USE_INVITE_TOKEN} returned {other}, expected a boolean"
                ))
                .into());
            }
        };
        if !redeemed {
            debug!("token not redeemable");
        }
        Ok(redeemed)
    }

    /// Tokens of a trip, newest first.
    #[instrument(skip(self), fields(trip_id = %trip_id), err)]
    pub async fn get_invite_tokens(&self, trip_id: TripId) -> CollabResult<Vec<InviteToken>> {
        let rows = self
            .store
            .select(
                INVITE_TOKENS,
                &Filter::new()
                    .eq("trip_id", trip_id)
                    .order_by("created_at", Direction::Desc),
            )
            .await?;
        Ok(from_rows(rows)?)
    }

    /// Stop a token from being verified or redeemed again.
    ///
    /// Redemptions that already passed the atomic check are not revoked.
    #[instrument(skip(self), fields(token_id = %token_id), err)]
    pub async fn deactivate_invite_token(&self, token_id: InviteTokenId) -> CollabResult<()> {
        let mut patch = Row::new();
        patch.insert("is_active".to_string(), json!(false));

        let outcome = self
            .store
            .update(INVITE_TOKENS, patch, &Filter::by_id(token_id))
            .await?;
        if outcome.affected == 0 {
            warn!(token_id = %token_id, "invite token deactivation matched no rows");
            return Err(CollabError::no_rows(ENTITY, token_id));
        }
        Ok(())
    }
}

fn token_args(token: &str) -> JsonValue {
    let mut args = serde_json::Map::new();
    args.insert(TOKEN_ARG.to_string(), JsonValue::String(token.to_string()));
    JsonValue::Object(args)
}
