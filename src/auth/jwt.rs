use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{config::JwtConfig, state::AppState};

/// Token payload: identity plus the role list the gate checks against.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub roles: Vec<String>,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, email: &str, full_name: &str, roles: &[String]) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            email: email.to_string(),
            full_name: full_name.to_string(),
            roles: roles.to_vec(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(email = %email, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        debug!(email = %data.claims.email, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let roles = vec!["user".to_string(), "admin".to_string()];
        let token = keys
            .sign("ann@example.com", "Ann Example", &roles)
            .expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(claims.full_name, "Ann Example");
        assert_eq!(claims.roles, roles);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let token = keys
            .sign("ann@example.com", "Ann", &["user".to_string()])
            .expect("sign");
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(keys.verify(&tampered).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let two_hours_ago = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            email: "ann@example.com".into(),
            full_name: "Ann".into(),
            roles: vec!["user".into()],
            iat: (two_hours_ago - TimeDuration::minutes(30)).unix_timestamp() as usize,
            exp: two_hours_ago.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn payload_uses_camel_case_full_name() {
        let claims = Claims {
            email: "a@x.com".into(),
            full_name: "Ann".into(),
            roles: vec!["user".into()],
            iat: 0,
            exp: 0,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"fullName\""));
    }
}
