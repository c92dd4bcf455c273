//! Compiled-in fallback payloads for critical endpoints.
//!
//! When the device is offline and nothing is cached, each critical
//! endpoint category still resolves to a well-formed body so framework
//! startup reads never fail. User identity is recovered, best effort,
//! from OAuth token artifacts already in local storage (consumed
//! read-only; this module never writes them).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use url::Url;

use crate::storage::KeyValueStorage;

/// Storage keys written by the OAuth flow.
const ACCESS_TOKEN_KEY: &str = "access_token";
const ID_TOKEN_KEY: &str = "id_token";
const EXPIRES_AT_KEY: &str = "expires_at";

/// Claims extracted from a locally stored id token.
struct TokenUserInfo {
  sub: Option<String>,
  name: Option<String>,
  email: Option<String>,
}

/// The static fallback body for a critical URL, or `None` when the URL has
/// no fallback category.
pub fn default_fallback(url: &str, storage: &dyn KeyValueStorage) -> Option<Value> {
  if url.contains("/.well-known/openid-configuration") && !url.contains("/jwks") {
    return Some(openid_configuration(url));
  }

  if url.contains("/jwks") {
    // Empty key set; tokens validated earlier keep working offline
    return Some(json!({ "keys": [] }));
  }

  if url.contains("/connect/userinfo") {
    return Some(userinfo(storage));
  }

  if url.contains("/api/abp/multi-tenancy/tenants") {
    return Some(json!({ "tenants": [] }));
  }

  if url.contains("/api/abp/application-configuration") {
    return Some(application_configuration(storage));
  }

  if url.contains("/api/abp/application-localization") {
    return Some(json!({ "resources": {} }));
  }

  None
}

/// Issuer metadata derived from the request origin.
fn openid_configuration(url: &str) -> Value {
  let origin = Url::parse(url)
    .map(|u| u.origin().ascii_serialization())
    .unwrap_or_default();

  json!({
    "issuer": origin,
    "authorization_endpoint": format!("{origin}/connect/authorize"),
    "token_endpoint": format!("{origin}/connect/token"),
    "userinfo_endpoint": format!("{origin}/connect/userinfo"),
    "end_session_endpoint": format!("{origin}/connect/endsession"),
    "jwks_uri": format!("{origin}/.well-known/jwks"),
    "scopes_supported": ["openid", "profile", "email", "offline_access"],
    "response_types_supported": ["code", "token", "id_token", "code token", "code id_token"],
    "grant_types_supported": ["authorization_code", "client_credentials", "refresh_token"],
    "subject_types_supported": ["public"],
    "id_token_signing_alg_values_supported": ["RS256"],
    "code_challenge_methods_supported": ["plain", "S256"],
  })
}

fn userinfo(storage: &dyn KeyValueStorage) -> Value {
  match user_info_from_token(storage) {
    Some(info) => json!({
      "sub": info.sub,
      "name": info.name,
      "email": info.email,
    }),
    None => json!({}),
  }
}

/// A fully shaped anonymous configuration document. `currentUser` reflects
/// the locally stored token when one is still valid.
fn application_configuration(storage: &dyn KeyValueStorage) -> Value {
  let authenticated = has_valid_local_token(storage);
  let info = if authenticated {
    user_info_from_token(storage)
  } else {
    None
  };
  let info = info.unwrap_or(TokenUserInfo {
    sub: None,
    name: None,
    email: None,
  });

  json!({
    "localization": {
      "currentCulture": {
        "cultureName": "en",
        "displayName": "English",
        "name": "en",
      },
      "languages": [{ "cultureName": "en", "displayName": "English", "uiCultureName": "en" }],
      "values": {},
    },
    "auth": {
      "policies": {},
      "grantedPolicies": {},
    },
    "setting": {
      "values": {},
    },
    "currentUser": {
      "isAuthenticated": authenticated,
      "id": info.sub,
      "tenantId": null,
      "userName": info.name,
      "name": info.name,
      "surName": null,
      "email": info.email,
      "emailVerified": false,
      "phoneNumber": null,
      "phoneNumberVerified": false,
      "roles": [],
    },
    "features": {
      "values": {},
    },
    "globalFeatures": {
      "enabledFeatures": [],
    },
    "multiTenancy": {
      "isEnabled": false,
    },
    "currentTenant": {
      "id": null,
      "name": null,
      "isAvailable": false,
    },
    "timing": {
      "timeZone": {
        "iana": { "timeZoneName": "UTC" },
        "windows": { "timeZoneId": "UTC" },
      },
    },
    "clock": {
      "kind": "Utc",
    },
    "objectExtensions": {
      "modules": {},
      "enums": {},
    },
    "extraProperties": {},
  })
}

/// Whether a non-expired access token is stored locally.
fn has_valid_local_token(storage: &dyn KeyValueStorage) -> bool {
  let token = storage.get_item(ACCESS_TOKEN_KEY).ok().flatten();
  if token.is_none() {
    return false;
  }

  if let Some(expires_at) = storage.get_item(EXPIRES_AT_KEY).ok().flatten() {
    if let Ok(expiry_ms) = expires_at.parse::<i64>() {
      if expiry_ms < Utc::now().timestamp_millis() {
        return false;
      }
    }
  }

  true
}

/// Decode the payload of the stored id token. No signature check; the
/// token was validated when it was issued and only names the user here.
fn user_info_from_token(storage: &dyn KeyValueStorage) -> Option<TokenUserInfo> {
  let id_token = storage.get_item(ID_TOKEN_KEY).ok().flatten()?;

  let mut parts = id_token.split('.');
  let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
  if parts.next().is_some() {
    return None;
  }

  let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
  let claims: Value = serde_json::from_slice(&decoded).ok()?;

  let string_claim = |name: &str| claims.get(name).and_then(Value::as_str).map(String::from);

  Some(TokenUserInfo {
    sub: string_claim("sub"),
    name: string_claim("name").or_else(|| string_claim("preferred_username")),
    email: string_claim("email"),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;

  fn encode_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.sig")
  }

  #[test]
  fn test_openid_configuration_uses_origin() {
    let storage = MemoryStorage::new();
    let body = default_fallback(
      "https://api.example.com/.well-known/openid-configuration",
      &storage,
    )
    .unwrap();

    assert_eq!(body["issuer"], "https://api.example.com");
    assert_eq!(
      body["token_endpoint"],
      "https://api.example.com/connect/token"
    );
  }

  #[test]
  fn test_jwks_is_empty_key_set() {
    let storage = MemoryStorage::new();
    let body = default_fallback("https://api.example.com/.well-known/jwks", &storage).unwrap();
    assert_eq!(body, json!({ "keys": [] }));
  }

  #[test]
  fn test_app_configuration_anonymous_without_token() {
    let storage = MemoryStorage::new();
    let body = default_fallback(
      "https://api.example.com/api/abp/application-configuration",
      &storage,
    )
    .unwrap();

    assert_eq!(body["currentUser"]["isAuthenticated"], false);
    assert_eq!(body["currentUser"]["id"], Value::Null);
  }

  #[test]
  fn test_app_configuration_reflects_valid_token() {
    let storage = MemoryStorage::new();
    storage.set_item("access_token", "opaque").unwrap();
    let claims = json!({ "sub": "u-1", "name": "Sam", "email": "sam@example.com" });
    storage.set_item("id_token", &encode_token(&claims)).unwrap();

    let body = default_fallback(
      "https://api.example.com/api/abp/application-configuration",
      &storage,
    )
    .unwrap();

    assert_eq!(body["currentUser"]["isAuthenticated"], true);
    assert_eq!(body["currentUser"]["id"], "u-1");
    assert_eq!(body["currentUser"]["email"], "sam@example.com");
  }

  #[test]
  fn test_expired_token_is_anonymous() {
    let storage = MemoryStorage::new();
    storage.set_item("access_token", "opaque").unwrap();
    storage.set_item("expires_at", "1000").unwrap();

    let body = default_fallback(
      "https://api.example.com/api/abp/application-configuration",
      &storage,
    )
    .unwrap();

    assert_eq!(body["currentUser"]["isAuthenticated"], false);
  }

  #[test]
  fn test_userinfo_from_token() {
    let storage = MemoryStorage::new();
    let claims = json!({ "sub": "u-2", "preferred_username": "pat" });
    storage.set_item("id_token", &encode_token(&claims)).unwrap();

    let body = default_fallback("https://api.example.com/connect/userinfo", &storage).unwrap();
    assert_eq!(body["sub"], "u-2");
    assert_eq!(body["name"], "pat");
  }

  #[test]
  fn test_unknown_url_has_no_fallback() {
    let storage = MemoryStorage::new();
    assert!(default_fallback("https://api.example.com/api/app/plant-request", &storage).is_none());
  }
}
