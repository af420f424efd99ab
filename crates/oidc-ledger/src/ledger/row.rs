//! Conversion between grants and their flattened rows.

use crate::LedgerResult;
use crate::codec::{DecodeError, Metadata, TokenCodec};
use crate::storage::{ArtifactRow, GrantRow, join_csv, split_csv};
use crate::types::{
    AccessToken, AccessTokenType, AuthorizationGrant, GrantType, IdToken, TokenArtifact,
};

/// Encodes a grant into its stored row.
pub(crate) fn encode_grant(codec: &TokenCodec, grant: &AuthorizationGrant) -> LedgerResult<GrantRow> {
    let access = grant.access_token.as_ref();
    let id_token = grant.id_token.as_ref();

    Ok(GrantRow {
        id: grant.id.clone(),
        client_id: grant.client_id.clone(),
        principal_name: grant.principal_name.clone(),
        grant_type: grant.grant_type.as_str().to_string(),
        scopes: join_csv(&grant.authorized_scopes),
        attributes: encode_map(codec, &grant.attributes)?,
        state: grant.state().map(str::to_string),
        code: encode_artifact(codec, grant.code.as_ref())?,
        access_token: encode_artifact(codec, access.map(|t| &t.artifact))?,
        access_token_type: access.map(|t| t.token_type.as_str().to_string()),
        access_token_scopes: access.map(|t| join_csv(&t.scopes)),
        refresh_token: encode_artifact(codec, grant.refresh_token.as_ref())?,
        id_token: encode_artifact(codec, id_token.map(|t| &t.artifact))?,
        id_token_claims: match id_token {
            Some(token) => encode_map(codec, &token.claims)?,
            None => None,
        },
        user_code: encode_artifact(codec, grant.user_code.as_ref())?,
        device_code: encode_artifact(codec, grant.device_code.as_ref())?,
    })
}

/// Rebuilds a grant from its stored row.
pub(crate) fn decode_grant(codec: &TokenCodec, row: GrantRow) -> LedgerResult<AuthorizationGrant> {
    let attributes = decode_map(codec, row.attributes.as_deref())?;

    let access_token = decode_artifact(codec, row.access_token)?.map(|artifact| AccessToken {
        artifact,
        token_type: row
            .access_token_type
            .as_deref()
            .map_or(AccessTokenType::Bearer, AccessTokenType::parse),
        scopes: row
            .access_token_scopes
            .as_deref()
            .map(|s| split_csv(s).collect())
            .unwrap_or_default(),
    });

    let id_token = match decode_artifact(codec, row.id_token)? {
        Some(artifact) => Some(IdToken {
            artifact,
            claims: decode_map(codec, row.id_token_claims.as_deref())?,
        }),
        None => None,
    };

    let mut grant = AuthorizationGrant {
        id: row.id,
        client_id: row.client_id,
        principal_name: row.principal_name,
        grant_type: GrantType::from(row.grant_type),
        authorized_scopes: split_csv(&row.scopes).collect(),
        attributes,
        code: decode_artifact(codec, row.code)?,
        access_token,
        refresh_token: decode_artifact(codec, row.refresh_token)?,
        id_token,
        user_code: decode_artifact(codec, row.user_code)?,
        device_code: decode_artifact(codec, row.device_code)?,
    };

    // The column wins if the attribute map was written without it.
    if grant.state().is_none()
        && let Some(state) = row.state
    {
        grant.set_state(Some(state));
    }

    Ok(grant)
}

fn encode_map(codec: &TokenCodec, map: &Metadata) -> LedgerResult<Option<String>> {
    if map.is_empty() {
        return Ok(None);
    }
    Ok(Some(codec.encode(map)?))
}

fn decode_map(codec: &TokenCodec, payload: Option<&str>) -> Result<Metadata, DecodeError> {
    match payload {
        Some(payload) => codec.decode(payload),
        None => Ok(Metadata::new()),
    }
}

fn encode_artifact(
    codec: &TokenCodec,
    artifact: Option<&TokenArtifact>,
) -> LedgerResult<Option<ArtifactRow>> {
    let Some(artifact) = artifact else {
        return Ok(None);
    };
    Ok(Some(ArtifactRow {
        value: artifact.value.clone(),
        issued_at: artifact.issued_at,
        expires_at: artifact.expires_at,
        metadata: encode_map(codec, &artifact.metadata)?,
    }))
}

fn decode_artifact(
    codec: &TokenCodec,
    row: Option<ArtifactRow>,
) -> Result<Option<TokenArtifact>, DecodeError> {
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(TokenArtifact {
        metadata: decode_map(codec, row.metadata.as_deref())?,
        value: row.value,
        issued_at: row.issued_at,
        expires_at: row.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MetaValue;
    use time::macros::datetime;

    fn full_grant() -> AuthorizationGrant {
        let t0 = datetime!(2026-01-01 10:00 UTC);
        let mut claims = Metadata::new();
        claims.insert("sub".to_string(), MetaValue::from("alice"));
        claims.insert("auth_time".to_string(), MetaValue::from(t0));

        AuthorizationGrant::new("g1", "c1", "alice", GrantType::AuthorizationCode)
            .with_scopes(["openid", "profile"])
            .with_state("xyz")
            .with_attribute("nonce", "n-1")
            .with_code(
                TokenArtifact::new("abc123", t0)
                    .with_ttl(time::Duration::minutes(5))
                    .with_metadata("metadata.token.invalidated", true),
            )
            .with_access_token(
                AccessToken::new(
                    TokenArtifact::new("tok1", t0).with_ttl(time::Duration::minutes(5)),
                    AccessTokenType::DPoP,
                )
                .with_scopes(["openid"]),
            )
            .with_refresh_token(TokenArtifact::new("r1", t0))
            .with_id_token(IdToken::new(
                TokenArtifact::new("eyJ.id", t0).with_ttl(time::Duration::minutes(30)),
                claims,
            ))
    }

    #[test]
    fn test_round_trip() {
        let codec = TokenCodec::new();
        let grant = full_grant();

        let row = encode_grant(&codec, &grant).unwrap();
        assert_eq!(row.scopes, "openid,profile");
        assert_eq!(row.state.as_deref(), Some("xyz"));
        assert_eq!(row.access_token_type.as_deref(), Some("DPoP"));
        assert!(row.user_code.is_none());

        let decoded = decode_grant(&codec, row).unwrap();
        assert_eq!(decoded, grant);
    }

    #[test]
    fn test_empty_maps_are_stored_as_null() {
        let codec = TokenCodec::new();
        let grant = AuthorizationGrant::new("g1", "c1", "alice", GrantType::ClientCredentials)
            .with_refresh_token(TokenArtifact::new("r1", datetime!(2026-01-01 10:00 UTC)));

        let row = encode_grant(&codec, &grant).unwrap();
        assert!(row.attributes.is_none());
        assert!(row.refresh_token.as_ref().unwrap().metadata.is_none());
        assert_eq!(decode_grant(&codec, row).unwrap(), grant);
    }

    #[test]
    fn test_disallowed_metadata_fails_decode() {
        let codec = TokenCodec::new();
        let mut row = encode_grant(&codec, &full_grant()).unwrap();
        row.attributes = Some(r#"{"x":{"@type":"java.net.URL","value":"http://evil"}}"#.to_string());

        let err = decode_grant(&codec, row).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_custom_grant_type_passthrough() {
        let codec = TokenCodec::new();
        let grant = AuthorizationGrant::new("g1", "c1", "alice", GrantType::from("urn:custom:foo"));

        let row = encode_grant(&codec, &grant).unwrap();
        assert_eq!(row.grant_type, "urn:custom:foo");
        assert_eq!(
            decode_grant(&codec, row).unwrap().grant_type,
            GrantType::Custom("urn:custom:foo".to_string())
        );
    }
}
