//! Behaviour tests of the authorization ledger over the in-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use oidc_ledger::codec::{AuthorizationRequestSnapshot, PrincipalSnapshot};
use oidc_ledger::storage::ClientDirectory;
use oidc_ledger::{
    AccessToken, AccessTokenType, AuthorizationGrant, AuthorizationLedger, ClientAuthMethod,
    CodeRedemption, ConsentRecord, GrantType, IdToken, LedgerConfig, LedgerError, MetaValue,
    Metadata, RegisteredClient, TokenArtifact, TokenKind, TypedValue,
};
use oidc_ledger_memory::InMemoryLedgerStorage;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::EnvFilter;

const T0: OffsetDateTime = datetime!(2026-01-01 10:00 UTC);

/// Routes ledger logs to the test output; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup() -> (InMemoryLedgerStorage, AuthorizationLedger) {
    init_tracing();
    let storage = InMemoryLedgerStorage::new();
    let client = RegisteredClient::new("c1", "web-app", T0)
        .with_secret("$2b$12$hash")
        .with_authentication_method(ClientAuthMethod::ClientSecretBasic)
        .with_grant_type(GrantType::AuthorizationCode)
        .with_grant_type(GrantType::RefreshToken)
        .with_redirect_uri("https://app.example.com/cb")
        .with_scope("openid")
        .with_scope("profile");
    assert_ok!(storage.clients().save(&client).await);

    let ledger = assert_ok!(storage.authorization_ledger(&LedgerConfig::default()));
    (storage, ledger)
}

fn requested_grant() -> AuthorizationGrant {
    let mut request = AuthorizationRequestSnapshot::new(
        "https://idp.example.com/oauth2/authorize",
        "code",
        "web-app",
    );
    request.redirect_uri = Some("https://app.example.com/cb".to_string());
    request.state = Some("xyz".to_string());
    request.scopes.insert("openid".to_string());

    let mut principal = PrincipalSnapshot::authenticated("alice");
    principal.authentication_method = Some("pwd".to_string());

    AuthorizationGrant::new("g1", "c1", "alice", GrantType::AuthorizationCode)
        .with_scopes(["openid", "profile"])
        .with_state("xyz")
        .with_attribute(
            "authorization_request",
            TypedValue::AuthorizationRequest(request),
        )
        .with_attribute("principal", TypedValue::Principal(principal))
        .with_code(TokenArtifact::new("abc123", T0).with_ttl(Duration::minutes(5)))
}

fn access(value: &str) -> AccessToken {
    AccessToken::bearer(TokenArtifact::new(value, T0).with_ttl(Duration::minutes(5)))
        .with_scopes(["openid"])
}

#[tokio::test]
async fn test_authorization_code_scenario() {
    let (_, ledger) = setup().await;

    let mut grant = requested_grant();
    assert_ok!(ledger.save(&grant).await);

    let by_code = assert_ok!(ledger.find_by_token("abc123", Some(TokenKind::Code)).await)
        .expect("grant by code");
    assert_eq!(by_code, grant);

    grant
        .redeem_code(
            access("tok1"),
            Some(TokenArtifact::new("r1", T0).with_ttl(Duration::hours(1))),
            None,
            CodeRedemption::Invalidate,
        )
        .unwrap();
    assert_ok!(ledger.save(&grant).await);

    let by_access = assert_ok!(ledger.find_by_token("tok1", None).await).expect("grant by token");
    assert_eq!(by_access.id, "g1");
    assert_eq!(by_access.principal_name, "alice");
    assert!(by_access.code.as_ref().unwrap().is_invalidated());
    assert_eq!(by_access.access_token.as_ref().unwrap().value(), "tok1");

    let by_state = assert_ok!(ledger.find_by_state("xyz").await).expect("grant by state");
    assert_eq!(by_state.id, "g1");
}

#[tokio::test]
async fn test_full_round_trip() {
    let (_, ledger) = setup().await;

    let mut claims = Metadata::new();
    claims.insert("sub".to_string(), MetaValue::from("alice"));
    claims.insert("auth_time".to_string(), MetaValue::from(T0));
    claims.insert(
        "amr".to_string(),
        MetaValue::List(vec![MetaValue::from("pwd"), MetaValue::from("otp")]),
    );

    let mut nested = BTreeMap::new();
    nested.insert("depth".to_string(), MetaValue::Map(Metadata::new()));

    let grant = requested_grant()
        .with_attribute("nested", MetaValue::Map(nested))
        .with_attribute("ratio", 0.5)
        .with_attribute("nothing", MetaValue::Null)
        .with_access_token(
            AccessToken::new(
                TokenArtifact::new("tok1", T0)
                    .with_ttl(Duration::minutes(5))
                    .with_claims(claims.clone()),
                AccessTokenType::DPoP,
            )
            .with_scopes(["openid"]),
        )
        .with_refresh_token(TokenArtifact::new("r1", T0))
        .with_id_token(IdToken::new(
            TokenArtifact::new("eyJ.id.sig", T0).with_ttl(Duration::minutes(30)),
            claims,
        ))
        .with_user_code(TokenArtifact::new("WDJB-MJHT", T0))
        .with_device_code(TokenArtifact::new("dev-1", T0).with_metadata("interval", 5_i64));

    assert_ok!(ledger.save(&grant).await);
    let loaded = assert_ok!(ledger.find_by_id("g1").await).expect("grant by id");
    assert_eq!(loaded, grant);
}

#[tokio::test]
async fn test_token_uniqueness_across_grants() {
    let (_, ledger) = setup().await;

    let a = AuthorizationGrant::new("gA", "c1", "alice", GrantType::AuthorizationCode)
        .with_access_token(access("T"));
    assert_ok!(ledger.save(&a).await);

    let b = AuthorizationGrant::new("gB", "c1", "bob", GrantType::AuthorizationCode)
        .with_access_token(access("T"));
    let err = assert_err!(ledger.save(&b).await);
    assert!(err.is_duplicate_token());

    let owner = assert_ok!(ledger.find_by_token("T", None).await).unwrap();
    assert_eq!(owner.id, "gA");
    assert!(assert_ok!(ledger.find_by_id("gB").await).is_none());
}

#[tokio::test]
async fn test_state_is_unique_across_grants() {
    let (_, ledger) = setup().await;
    assert_ok!(ledger.save(&requested_grant()).await);

    let other = AuthorizationGrant::new("g2", "c1", "bob", GrantType::AuthorizationCode)
        .with_state("abc123");
    let err = assert_err!(ledger.save(&other).await);
    assert!(err.is_duplicate_token());
}

#[tokio::test]
async fn test_slot_independence() {
    let (_, ledger) = setup().await;

    let mut grant = AuthorizationGrant::new("g1", "c1", "alice", GrantType::AuthorizationCode)
        .with_code(TokenArtifact::new("v-code", T0))
        .with_access_token(access("v-access"))
        .with_refresh_token(TokenArtifact::new("v-refresh", T0))
        .with_id_token(IdToken::new(TokenArtifact::new("v-id", T0), Metadata::new()))
        .with_user_code(TokenArtifact::new("v-user", T0))
        .with_device_code(TokenArtifact::new("v-device", T0));
    assert_ok!(ledger.save(&grant).await);

    grant.clear(TokenKind::RefreshToken);
    assert_ok!(ledger.save(&grant).await);

    assert!(assert_ok!(ledger.find_by_token("v-refresh", None).await).is_none());
    for (kind, value) in [
        (TokenKind::Code, "v-code"),
        (TokenKind::AccessToken, "v-access"),
        (TokenKind::IdToken, "v-id"),
        (TokenKind::UserCode, "v-user"),
        (TokenKind::DeviceCode, "v-device"),
    ] {
        let found = assert_ok!(ledger.find_by_token(value, Some(kind)).await);
        assert_eq!(found.map(|g| g.id).as_deref(), Some("g1"), "{kind}");
        let untyped = assert_ok!(ledger.find_by_token(value, None).await);
        assert!(untyped.is_some(), "{kind}");
    }
}

#[tokio::test]
async fn test_expired_artifacts_are_returned() {
    let (_, ledger) = setup().await;

    let grant = AuthorizationGrant::new("g1", "c1", "alice", GrantType::RefreshToken)
        .with_refresh_token(
            TokenArtifact::new("r-old", datetime!(2020-01-01 0:00 UTC))
                .with_ttl(Duration::hours(1)),
        );
    assert_ok!(ledger.save(&grant).await);

    let found = assert_ok!(ledger.find_by_token("r-old", Some(TokenKind::RefreshToken)).await)
        .expect("expired grant is still visible");
    assert!(
        found
            .refresh_token
            .unwrap()
            .is_expired_at(OffsetDateTime::now_utc())
    );
}

#[tokio::test]
async fn test_custom_grant_type_passthrough() {
    let (_, ledger) = setup().await;

    let grant = AuthorizationGrant::new("g1", "c1", "alice", GrantType::from("urn:custom:foo"))
        .with_access_token(access("tok1"));
    assert_ok!(ledger.save(&grant).await);

    let loaded = assert_ok!(ledger.find_by_id("g1").await).unwrap();
    assert_eq!(loaded.grant_type.as_str(), "urn:custom:foo");
    assert_eq!(loaded.grant_type, GrantType::Custom("urn:custom:foo".to_string()));
}

#[tokio::test]
async fn test_remove_frees_all_values() {
    let (_, ledger) = setup().await;
    let grant = requested_grant().with_access_token(access("tok1"));
    assert_ok!(ledger.save(&grant).await);

    assert!(assert_ok!(ledger.remove(&grant).await));
    for value in ["abc123", "tok1", "xyz"] {
        assert!(assert_ok!(ledger.find_by_token(value, None).await).is_none());
    }

    // Values can be reused by a new grant once freed.
    let reuse = AuthorizationGrant::new("g2", "c1", "bob", GrantType::AuthorizationCode)
        .with_access_token(access("tok1"));
    assert_ok!(ledger.save(&reuse).await);
}

#[tokio::test]
async fn test_remove_expired() {
    let (storage, ledger) = setup().await;

    let expired = AuthorizationGrant::new("g-old", "c1", "alice", GrantType::AuthorizationCode)
        .with_code(
            TokenArtifact::new("old-code", datetime!(2020-01-01 0:00 UTC))
                .with_ttl(Duration::minutes(5)),
        );
    let live = AuthorizationGrant::new("g-live", "c1", "alice", GrantType::RefreshToken)
        .with_refresh_token(TokenArtifact::new("forever", datetime!(2020-01-01 0:00 UTC)));
    assert_ok!(ledger.save(&expired).await);
    assert_ok!(ledger.save(&live).await);

    assert_eq!(assert_ok!(ledger.remove_expired(T0).await), 1);
    assert_eq!(storage.grants().len().await, 1);
    assert!(assert_ok!(ledger.find_by_id("g-live").await).is_some());
}

#[tokio::test]
async fn test_concurrent_saves_of_distinct_grants() {
    let (_, ledger) = setup().await;
    let ledger = Arc::new(ledger);

    let mut handles = Vec::new();
    for i in 0..32 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let grant = AuthorizationGrant::new(
                format!("g{i}"),
                "c1",
                "alice",
                GrantType::AuthorizationCode,
            )
            .with_access_token(access(&format!("tok{i}")));
            ledger.save(&grant).await
        }));
    }
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    for i in 0..32 {
        let found = assert_ok!(ledger.find_by_token(&format!("tok{i}"), None).await).unwrap();
        assert_eq!(found.id, format!("g{i}"));
    }
}

#[tokio::test]
async fn test_concurrent_conflicting_saves_have_one_winner() {
    let (_, ledger) = setup().await;
    let ledger = Arc::new(ledger);

    let mut handles = Vec::new();
    for i in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let grant = AuthorizationGrant::new(
                format!("g{i}"),
                "c1",
                "alice",
                GrantType::AuthorizationCode,
            )
            .with_access_token(access("shared"));
            ledger.save(&grant).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => assert!(e.is_duplicate_token()),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_invalid_config_is_a_configuration_error() {
    let storage = InMemoryLedgerStorage::new();
    let mut config = LedgerConfig::default();
    config.client_cache.ttl = Some(std::time::Duration::ZERO);

    let err = storage.authorization_ledger(&config).err().unwrap();
    assert!(matches!(err, LedgerError::Configuration { .. }));
    assert!(err.is_server_error());
}

#[tokio::test]
async fn test_unknown_client_is_rejected() {
    let (_, ledger) = setup().await;
    let grant = AuthorizationGrant::new("g1", "missing", "alice", GrantType::AuthorizationCode);
    let err = assert_err!(ledger.save(&grant).await);
    assert!(err.is_registered_client_missing());
}

#[tokio::test]
async fn test_consent_ledger() {
    let (storage, _) = setup().await;
    let consents = storage.consent_ledger();

    let record = ConsentRecord::new("c1", "alice")
        .with_scope("openid")
        .with_scope("profile");
    assert_ok!(consents.save(&record).await);

    let stored = assert_ok!(consents.find_by_id("c1", "alice").await).unwrap();
    assert!(stored.covers(["openid"]));
    assert!(!stored.covers(["email"]));

    assert!(assert_ok!(consents.remove("c1", "alice").await));
    assert!(assert_ok!(consents.find_by_id("c1", "alice").await).is_none());
}
