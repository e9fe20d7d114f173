use chrono::{Duration, Utc};
use rampart::security::{
    issue_token, validate_token, IssueError, TokenError, TokenService, RESERVED_CLAIMS,
};
use serde_json::json;

fn extra(value: serde_json::Value) -> Option<serde_json::Map<String, serde_json::Value>> {
    value.as_object().cloned()
}

#[test]
fn test_issue_then_validate_round_trip() {
    let token = issue_token("bob", Duration::hours(1), "s3cr3t", extra(json!({ "role": "admin" })))
        .unwrap();
    let claims = validate_token(&token, "s3cr3t").unwrap();

    assert_eq!(claims.subject, "bob");
    assert_eq!(claims.get("role"), Some(&json!("admin")));

    let remaining = claims.expires_at - Utc::now();
    assert!(remaining > Duration::minutes(59));
    assert!(remaining <= Duration::hours(1));

    let issued_at = claims.issued_at.unwrap();
    assert!((Utc::now() - issued_at) < Duration::minutes(1));
}

#[test]
fn test_negative_ttl_is_expired() {
    let token = issue_token("bob", Duration::hours(-1), "s3cr3t", None).unwrap();
    assert_eq!(validate_token(&token, "s3cr3t"), Err(TokenError::Expired));
}

#[test]
fn test_wrong_secret_is_invalid() {
    let token = issue_token("bob", Duration::hours(1), "s3cr3t", None).unwrap();
    assert_eq!(validate_token(&token, "other"), Err(TokenError::Invalid));
}

#[test]
fn test_wrong_secret_on_expired_token_is_invalid() {
    let token = issue_token("bob", Duration::hours(-1), "s3cr3t", None).unwrap();
    assert_eq!(validate_token(&token, "other"), Err(TokenError::Invalid));
}

#[test]
fn test_garbage_and_tampered_tokens_are_invalid() {
    assert_eq!(validate_token("", "s"), Err(TokenError::Invalid));
    assert_eq!(validate_token("not.a.jwt", "s"), Err(TokenError::Invalid));

    let token = issue_token("bob", Duration::hours(1), "s", None).unwrap();
    let mut parts: Vec<&str> = token.split('.').collect();
    let forged_payload = issue_token("mallory", Duration::hours(1), "x", None).unwrap();
    let forged_body = forged_payload.split('.').nth(1).unwrap().to_string();
    parts[1] = &forged_body;
    assert_eq!(validate_token(&parts.join("."), "s"), Err(TokenError::Invalid));
}

#[test]
fn test_scopes_are_typed() {
    let token = issue_token(
        "svc",
        Duration::minutes(5),
        "s",
        extra(json!({ "scopes": ["read", "write"], "tenant": "acme" })),
    )
    .unwrap();
    let claims = validate_token(&token, "s").unwrap();
    assert!(claims.has_scope("write"));
    assert!(!claims.has_scope("admin"));
    assert_eq!(claims.get_str("tenant"), Some("acme"));

    let token = issue_token("svc", Duration::minutes(5), "s", extra(json!({ "scopes": [1, "read"] })))
        .unwrap();
    let claims = validate_token(&token, "s").unwrap();
    assert_eq!(claims.scopes, Some(vec!["read".to_string()]));
}

#[test]
fn test_scalar_scopes_claim_does_not_reject_token() {
    let token = issue_token("svc", Duration::minutes(5), "s", extra(json!({ "scopes": "read" })))
        .unwrap();
    let claims = validate_token(&token, "s").unwrap();
    assert_eq!(claims.subject, "svc");
    assert_eq!(claims.scopes, None);
    assert!(claims.extra.is_empty());
}

#[test]
fn test_reserved_claims_are_rejected() {
    for name in RESERVED_CLAIMS {
        let mut claims = serde_json::Map::new();
        claims.insert(name.to_string(), json!(1));
        assert_eq!(
            issue_token("bob", Duration::hours(1), "s", Some(claims)),
            Err(IssueError::ReservedClaim(name.to_string()))
        );
    }
}

#[test]
fn test_token_service_lifetimes() {
    let service = TokenService::new("s3cr3t", Duration::minutes(15));
    assert_eq!(service.access_ttl(), Duration::minutes(15));
    assert_eq!(service.refresh_ttl(), Duration::days(7));

    let access = service.validate(&service.issue("bob", None).unwrap()).unwrap();
    let refresh = service
        .validate(&service.issue_refresh("bob").unwrap())
        .unwrap();
    assert!(refresh.expires_at - access.expires_at > Duration::days(6));

    let short = service.with_refresh_ttl(Duration::hours(1));
    assert_eq!(short.refresh_ttl(), Duration::hours(1));
}

#[test]
fn test_token_service_debug_hides_secret() {
    let service = TokenService::new("hunter2", Duration::minutes(1));
    assert!(!format!("{service:?}").contains("hunter2"));
}
