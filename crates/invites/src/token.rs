use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use wayfare_core::{DomainError, DomainResult, Entity, InviteTokenId, TripId, UserId};

/// What redeeming the token makes the redeemer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteKind {
    Member,
    Companion,
}

impl InviteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteKind::Member => "member",
            InviteKind::Companion => "companion",
        }
    }
}

impl core::str::FromStr for InviteKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "member" => Ok(InviteKind::Member),
            "companion" => Ok(InviteKind::Companion),
            _ => Err(DomainError::validation("invite kind must be one of: member, companion")),
        }
    }
}

/// Why a token cannot be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    Inactive,
    Expired,
    MaxUsesReached,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::NotFound => "not_found",
            InvalidReason::Inactive => "inactive",
            InvalidReason::Expired => "expired",
            InvalidReason::MaxUsesReached => "max_uses_reached",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            InvalidReason::NotFound,
            InvalidReason::Inactive,
            InvalidReason::Expired,
            InvalidReason::MaxUsesReached,
        ]
        .into_iter()
        .find(|r| r.as_str() == s)
    }
}

impl core::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored invite token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteToken {
    pub id: InviteTokenId,
    pub trip_id: TripId,
    pub token: String,
    pub invite_type: InviteKind,
    pub created_by: UserId,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: Option<i32>,
    pub use_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for InviteToken {
    type Id = InviteTokenId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl InviteToken {
    /// The usability predicate: active, not expired, under the use limit.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), InvalidReason> {
        if !self.is_active {
            return Err(InvalidReason::Inactive);
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(InvalidReason::Expired);
        }
        if self.max_uses.is_some_and(|max| self.use_count >= max) {
            return Err(InvalidReason::MaxUsesReached);
        }
        Ok(())
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.check_usable(now).is_ok()
    }

    /// Check and increment in one step.
    ///
    /// Only meaningful when the caller holds exclusive access to the row for
    /// the duration of the call (i.e. inside the store's atomic procedure).
    pub fn redeem(&mut self, now: DateTime<Utc>) -> Result<(), InvalidReason> {
        self.check_usable(now)?;
        self.use_count += 1;
        Ok(())
    }
}

/// Longest expiry a token can be issued with.
pub const MAX_EXPIRES_IN_DAYS: u32 = 3650;

/// Input for issuing a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInviteToken {
    pub trip_id: TripId,
    pub invite_type: InviteKind,
    pub created_by: UserId,
    pub expires_in_days: Option<u32>,
    pub max_uses: Option<u32>,
}

impl NewInviteToken {
    pub fn validate(&self) -> DomainResult<()> {
        if self.trip_id.is_nil() {
            return Err(DomainError::invalid_id("trip_id is required"));
        }
        match self.expires_in_days {
            Some(0) => return Err(DomainError::validation("expires_in_days must be at least 1")),
            Some(days) if days > MAX_EXPIRES_IN_DAYS => {
                return Err(DomainError::validation(format!(
                    "expires_in_days must be at most {MAX_EXPIRES_IN_DAYS}"
                )));
            }
            _ => {}
        }
        match self.max_uses {
            Some(0) => Err(DomainError::validation("max_uses must be at least 1")),
            Some(n) if i32::try_from(n).is_err() => {
                Err(DomainError::validation("max_uses is out of range"))
            }
            _ => Ok(()),
        }
    }

    /// Materialize the row for a freshly generated capability string.
    pub fn issue(self, token: String, now: DateTime<Utc>) -> DomainResult<InviteToken> {
        let expires_at = match self.expires_in_days {
            Some(days) => Some(
                Duration::try_days(i64::from(days))
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .ok_or_else(|| DomainError::validation("expires_in_days is out of range"))?,
            ),
            None => None,
        };

        Ok(InviteToken {
            id: InviteTokenId::new(),
            trip_id: self.trip_id,
            token,
            invite_type: self.invite_type,
            created_by: self.created_by,
            expires_at,
            max_uses: self.max_uses.and_then(|n| i32::try_from(n).ok()),
            use_count: 0,
            is_active: true,
            created_at: now,
        })
    }
}

/// Result of the store-side verification procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenVerification {
    #[serde(default)]
    pub trip_id: Option<TripId>,
    #[serde(default)]
    pub invite_type: Option<InviteKind>,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenVerification {
    /// Evaluate a (possibly missing) row at `now`.
    pub fn evaluate(row: Option<&InviteToken>, now: DateTime<Utc>) -> Self {
        match row {
            None => Self {
                trip_id: None,
                invite_type: None,
                is_valid: false,
                error: Some(InvalidReason::NotFound.to_string()),
            },
            Some(token) => {
                let outcome = token.check_usable(now);
                Self {
                    trip_id: Some(token.trip_id),
                    invite_type: Some(token.invite_type),
                    is_valid: outcome.is_ok(),
                    error: outcome.err().map(|r| r.to_string()),
                }
            }
        }
    }

    pub fn reason(&self) -> Option<InvalidReason> {
        self.error.as_deref().and_then(InvalidReason::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn issue(expires_in_days: Option<u32>, max_uses: Option<u32>, now: DateTime<Utc>) -> InviteToken {
        NewInviteToken {
            trip_id: TripId::new(),
            invite_type: InviteKind::Member,
            created_by: UserId::new(),
            expires_in_days,
            max_uses,
        }
        .issue("ABCDEFGHJKLMNPQRSTUVWXYZ23456789".to_string(), now)
        .unwrap()
    }

    #[test]
    fn issued_token_starts_active_and_unused() {
        let now = Utc::now();
        let token = issue(Some(7), Some(3), now);
        assert!(token.is_active);
        assert_eq!(token.use_count, 0);
        assert_eq!(token.max_uses, Some(3));
        assert_eq!(token.expires_at, Some(now + Duration::days(7)));
        assert!(token.is_usable(now));
    }

    #[test]
    fn expired_token_is_unusable_regardless_of_remaining_uses() {
        let now = Utc::now();
        let token = issue(Some(1), None, now);
        assert_eq!(
            token.check_usable(now + Duration::days(2)),
            Err(InvalidReason::Expired)
        );
    }

    #[test]
    fn inactive_wins_over_other_reasons() {
        let now = Utc::now();
        let mut token = issue(Some(1), Some(1), now);
        token.use_count = 1;
        token.is_active = false;
        assert_eq!(
            token.check_usable(now + Duration::days(2)),
            Err(InvalidReason::Inactive)
        );
    }

    #[test]
    fn zero_limits_are_rejected() {
        let base = NewInviteToken {
            trip_id: TripId::new(),
            invite_type: InviteKind::Companion,
            created_by: UserId::new(),
            expires_in_days: None,
            max_uses: None,
        };
        assert!(base.validate().is_ok());
        assert!(NewInviteToken { max_uses: Some(0), ..base.clone() }.validate().is_err());
        assert!(NewInviteToken { expires_in_days: Some(0), ..base }.validate().is_err());
    }

    #[test]
    fn expiry_beyond_the_limit_is_a_validation_error() {
        let base = NewInviteToken {
            trip_id: TripId::new(),
            invite_type: InviteKind::Member,
            created_by: UserId::new(),
            expires_in_days: Some(MAX_EXPIRES_IN_DAYS),
            max_uses: None,
        };
        assert!(base.validate().is_ok());

        let huge = NewInviteToken { expires_in_days: Some(u32::MAX), ..base };
        assert!(matches!(huge.validate(), Err(DomainError::Validation(_))));

        // Issuing without validating first must still not overflow.
        let near_max = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        assert!(matches!(
            huge.issue("ABCDEFGHJKLMNPQRSTUVWXYZ23456789".to_string(), near_max),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn verification_reports_reason_and_context() {
        let now = Utc::now();
        let missing = TokenVerification::evaluate(None, now);
        assert!(!missing.is_valid);
        assert_eq!(missing.reason(), Some(InvalidReason::NotFound));
        assert_eq!(missing.trip_id, None);

        let token = issue(None, None, now);
        let ok = TokenVerification::evaluate(Some(&token), now);
        assert!(ok.is_valid);
        assert_eq!(ok.trip_id, Some(token.trip_id));
        assert_eq!(ok.invite_type, Some(InviteKind::Member));
        assert_eq!(ok.error, None);
    }

    #[test]
    fn verification_wire_shape() {
        let v: TokenVerification = serde_json::from_value(serde_json::json!({
            "trip_id": null,
            "invite_type": null,
            "is_valid": false,
            "error": "expired"
        }))
        .unwrap();
        assert_eq!(v.reason(), Some(InvalidReason::Expired));
    }

    proptest! {
        /// Property: a token with `max_uses = n` can be redeemed exactly `n` times.
        #[test]
        fn redeem_succeeds_exactly_max_uses_times(max_uses in 1u32..50, attempts in 0usize..80) {
            let now = Utc::now();
            let mut token = issue(None, Some(max_uses), now);

            let successes = (0..attempts).filter(|_| token.redeem(now).is_ok()).count();

            prop_assert_eq!(successes, attempts.min(max_uses as usize));
            prop_assert!(token.use_count <= max_uses as i32);
        }
    }
}
