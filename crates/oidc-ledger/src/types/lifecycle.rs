//! Grant lifecycle transitions used by the endpoint handlers.
//!
//! The ledger stores whatever grant it is given; these helpers keep the
//! in-place mutations of code redemption, refresh and device approval
//! consistent so handlers don't have to reimplement them.

use std::collections::BTreeSet;

use time::OffsetDateTime;

use super::artifact::{AccessToken, IdToken, REFRESHED_METADATA, TokenArtifact};
use super::grant::{AuthorizationGrant, TokenKind};
use crate::codec::MetaValue;
use crate::error::LedgerError;
use crate::LedgerResult;

/// Conceptual state of a grant, derived from its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantPhase {
    /// Authorization approved, code issued.
    Requested,
    /// Device flow waiting for the user to enter the user code.
    UserCodePending,
    /// User approved the device, waiting for the device to poll.
    DeviceApproved,
    /// Code (or device code) exchanged for tokens.
    CodeRedeemed,
    /// Tokens reissued with a refresh token.
    Refreshed,
    /// Access or refresh token revoked.
    Revoked,
    /// Every artifact has expired.
    Expired,
}

/// What happens to the authorization code once it is redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeRedemption {
    /// Drop the code value from the grant.
    Clear,
    /// Keep the code but mark it invalidated, so a replay can be detected.
    #[default]
    Invalidate,
}

impl AuthorizationGrant {
    /// Derives the grant's lifecycle phase at `now`.
    #[must_use]
    pub fn phase(&self, now: OffsetDateTime) -> GrantPhase {
        let revoked = self
            .access_token
            .as_ref()
            .is_some_and(|t| t.artifact.is_invalidated())
            || self
                .refresh_token
                .as_ref()
                .is_some_and(TokenArtifact::is_invalidated);
        if revoked {
            return GrantPhase::Revoked;
        }

        let artifacts: Vec<&TokenArtifact> = TokenKind::ARTIFACTS
            .into_iter()
            .filter_map(|kind| self.artifact(kind))
            .collect();
        if !artifacts.is_empty() && artifacts.iter().all(|a| a.is_expired_at(now)) {
            return GrantPhase::Expired;
        }

        if let Some(access) = &self.access_token {
            return if access.is_refreshed() {
                GrantPhase::Refreshed
            } else {
                GrantPhase::CodeRedeemed
            };
        }

        match &self.user_code {
            Some(user_code) if user_code.is_invalidated() => GrantPhase::DeviceApproved,
            Some(_) => GrantPhase::UserCodePending,
            None => GrantPhase::Requested,
        }
    }

    /// Exchanges the authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidGrant` if the grant holds no code or the
    /// code was already redeemed.
    pub fn redeem_code(
        &mut self,
        access_token: AccessToken,
        refresh_token: Option<TokenArtifact>,
        id_token: Option<IdToken>,
        redemption: CodeRedemption,
    ) -> LedgerResult<()> {
        let code = self
            .code
            .as_mut()
            .ok_or_else(|| LedgerError::invalid_grant("grant holds no authorization code"))?;
        if code.is_invalidated() {
            return Err(LedgerError::invalid_grant(
                "authorization code was already redeemed",
            ));
        }

        match redemption {
            CodeRedemption::Clear => self.code = None,
            CodeRedemption::Invalidate => code.invalidate(),
        }

        self.access_token = Some(access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        if id_token.is_some() {
            self.id_token = id_token;
        }
        Ok(())
    }

    /// Reissues tokens with the grant's refresh token.
    ///
    /// `Some` refresh token rotates the current one; `None` retains it, as
    /// for clients with `reuse_refresh_tokens`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidGrant` if the grant holds no refresh token
    /// or it was invalidated.
    pub fn refresh(
        &mut self,
        mut access_token: AccessToken,
        rotated_refresh_token: Option<TokenArtifact>,
        id_token: Option<IdToken>,
    ) -> LedgerResult<()> {
        let refresh = self
            .refresh_token
            .as_ref()
            .ok_or_else(|| LedgerError::invalid_grant("grant holds no refresh token"))?;
        if refresh.is_invalidated() {
            return Err(LedgerError::invalid_grant("refresh token was invalidated"));
        }

        access_token
            .artifact
            .metadata
            .insert(REFRESHED_METADATA.to_string(), MetaValue::Bool(true));
        self.access_token = Some(access_token);

        if let Some(rotated) = rotated_refresh_token {
            self.refresh_token = Some(rotated);
        }
        if id_token.is_some() {
            self.id_token = id_token;
        }
        Ok(())
    }

    /// Records that the user entered the user code and approved the device.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidGrant` if the grant holds no user code or
    /// it was already used.
    pub fn approve_device(
        &mut self,
        principal_name: impl Into<String>,
        authorized_scopes: BTreeSet<String>,
    ) -> LedgerResult<()> {
        let user_code = self
            .user_code
            .as_mut()
            .ok_or_else(|| LedgerError::invalid_grant("grant holds no user code"))?;
        if user_code.is_invalidated() {
            return Err(LedgerError::invalid_grant("user code was already used"));
        }

        user_code.invalidate();
        self.principal_name = principal_name.into();
        self.authorized_scopes = authorized_scopes;
        Ok(())
    }

    /// Exchanges an approved device code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidGrant` if the device was not approved yet
    /// or the device code was already exchanged.
    pub fn redeem_device_code(
        &mut self,
        access_token: AccessToken,
        refresh_token: Option<TokenArtifact>,
    ) -> LedgerResult<()> {
        let approved = self
            .user_code
            .as_ref()
            .is_some_and(TokenArtifact::is_invalidated);
        if !approved {
            return Err(LedgerError::invalid_grant("device authorization is pending"));
        }

        let device_code = self
            .device_code
            .as_mut()
            .ok_or_else(|| LedgerError::invalid_grant("grant holds no device code"))?;
        if device_code.is_invalidated() {
            return Err(LedgerError::invalid_grant("device code was already redeemed"));
        }

        device_code.invalidate();
        self.access_token = Some(access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        Ok(())
    }

    /// Invalidates the artifact in the given slot.
    ///
    /// Invalidating the refresh token also invalidates the access token and
    /// the authorization code. Returns `false` if the slot was empty.
    pub fn invalidate(&mut self, kind: TokenKind) -> bool {
        let Some(artifact) = self.artifact_mut(kind) else {
            return false;
        };
        artifact.invalidate();

        if kind == TokenKind::RefreshToken {
            for dependent in [TokenKind::AccessToken, TokenKind::Code] {
                if let Some(artifact) = self.artifact_mut(dependent) {
                    artifact.invalidate();
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2026-01-01 10:00 UTC);

    fn requested() -> AuthorizationGrant {
        AuthorizationGrant::new("g1", "c1", "alice", GrantType::AuthorizationCode)
            .with_state("xyz")
            .with_code(TokenArtifact::new("abc123", T0).with_ttl(time::Duration::minutes(5)))
    }

    fn access(value: &str) -> AccessToken {
        AccessToken::bearer(TokenArtifact::new(value, T0).with_ttl(time::Duration::minutes(5)))
    }

    fn refresh(value: &str) -> TokenArtifact {
        TokenArtifact::new(value, T0).with_ttl(time::Duration::hours(1))
    }

    #[test]
    fn test_authorization_code_flow() {
        let mut grant = requested();
        assert_eq!(grant.phase(T0), GrantPhase::Requested);

        grant
            .redeem_code(access("tok1"), Some(refresh("r1")), None, CodeRedemption::Invalidate)
            .unwrap();
        assert_eq!(grant.phase(T0), GrantPhase::CodeRedeemed);
        assert!(grant.code.as_ref().unwrap().is_invalidated());

        let err = grant
            .redeem_code(access("tok2"), None, None, CodeRedemption::Invalidate)
            .unwrap_err();
        assert!(err.to_string().contains("already redeemed"));
    }

    #[test]
    fn test_redeem_clears_code() {
        let mut grant = requested();
        grant
            .redeem_code(access("tok1"), None, None, CodeRedemption::Clear)
            .unwrap();
        assert!(grant.code.is_none());
        assert_eq!(grant.access_token.as_ref().unwrap().value(), "tok1");
    }

    #[test]
    fn test_refresh_rotate_and_retain() {
        let mut grant = requested();
        grant
            .redeem_code(access("tok1"), Some(refresh("r1")), None, CodeRedemption::Clear)
            .unwrap();

        grant.refresh(access("tok2"), None, None).unwrap();
        assert_eq!(grant.phase(T0), GrantPhase::Refreshed);
        assert_eq!(grant.refresh_token.as_ref().unwrap().value, "r1");

        grant.refresh(access("tok3"), Some(refresh("r2")), None).unwrap();
        assert_eq!(grant.refresh_token.as_ref().unwrap().value, "r2");
        assert_eq!(grant.access_token.as_ref().unwrap().value(), "tok3");
    }

    #[test]
    fn test_refresh_without_refresh_token() {
        let mut grant = requested();
        assert!(grant.refresh(access("tok1"), None, None).is_err());
    }

    #[test]
    fn test_revocation_cascades() {
        let mut grant = requested();
        grant
            .redeem_code(access("tok1"), Some(refresh("r1")), None, CodeRedemption::Invalidate)
            .unwrap();

        assert!(grant.invalidate(TokenKind::RefreshToken));
        assert!(grant.access_token.as_ref().unwrap().artifact.is_invalidated());
        assert_eq!(grant.phase(T0), GrantPhase::Revoked);
        assert!(grant.refresh(access("tok2"), None, None).is_err());
    }

    #[test]
    fn test_invalidate_empty_slot() {
        let mut grant = requested();
        assert!(!grant.invalidate(TokenKind::IdToken));
        assert!(!grant.invalidate(TokenKind::State));
    }

    #[test]
    fn test_expired_phase() {
        let grant = requested();
        assert_eq!(
            grant.phase(datetime!(2026-01-01 10:06 UTC)),
            GrantPhase::Expired
        );
    }

    #[test]
    fn test_device_flow() {
        let mut grant = AuthorizationGrant::new("g2", "c1", "c1", GrantType::DeviceCode)
            .with_user_code(TokenArtifact::new("WDJB-MJHT", T0).with_ttl(time::Duration::minutes(5)))
            .with_device_code(TokenArtifact::new("dev-1", T0).with_ttl(time::Duration::minutes(5)));
        assert_eq!(grant.phase(T0), GrantPhase::UserCodePending);

        assert!(grant.redeem_device_code(access("tok1"), None).is_err());

        grant
            .approve_device("alice", ["openid".to_string()].into_iter().collect())
            .unwrap();
        assert_eq!(grant.phase(T0), GrantPhase::DeviceApproved);
        assert_eq!(grant.principal_name, "alice");
        assert!(grant.approve_device("bob", BTreeSet::new()).is_err());

        grant.redeem_device_code(access("tok1"), Some(refresh("r1"))).unwrap();
        assert_eq!(grant.phase(T0), GrantPhase::CodeRedeemed);
        assert!(grant.redeem_device_code(access("tok2"), None).is_err());
    }
}
