use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, session::Session, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both token kinds; `sub` and `email` name the session.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn session(&self) -> Session {
        Session {
            user_id: self.sub,
            email: self.email.clone(),
        }
    }
}

/// The pair handed out whenever a session starts or is renewed.
#[derive(Debug)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.ttl_minutes.max(1) as u64 * 60),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_minutes.max(1) as u64 * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    pub fn token(&self, session: &Session, kind: TokenKind) -> anyhow::Result<String> {
        let issued = OffsetDateTime::now_utc();
        let expires = issued + TimeDuration::seconds(self.ttl(kind).as_secs() as i64);
        let claims = Claims {
            sub: session.user_id,
            email: session.email.clone(),
            kind,
            iat: issued.unix_timestamp() as usize,
            exp: expires.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding).context("encode session token")
    }

    pub fn issue(&self, session: &Session) -> anyhow::Result<SessionTokens> {
        let tokens = SessionTokens {
            access: self.token(session, TokenKind::Access)?,
            refresh: self.token(session, TokenKind::Refresh)?,
        };
        debug!(user_id = %session.user_id, "session tokens issued");
        Ok(tokens)
    }

    /// Decodes a token and insists on its kind; an access token never renews
    /// a session and a refresh token never authorizes a request.
    pub fn check(&self, token: &str, expected: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        anyhow::ensure!(
            claims.kind == expected,
            "expected a {expected:?} token, got {:?}",
            claims.kind
        );
        Ok(claims)
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: "lifebalance".into(),
            audience: "lifebalance-users".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn sam() -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "sam@example.com".into(),
        }
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let k = keys("s3cret");
        let session = sam();
        let tokens = k.issue(&session).unwrap();

        let access = k.check(&tokens.access, TokenKind::Access).unwrap();
        assert_eq!(access.session(), session);
        assert_eq!(k.check(&tokens.refresh, TokenKind::Refresh).unwrap().sub, session.user_id);
        assert!(k.check(&tokens.access, TokenKind::Refresh).is_err());
        assert!(k.check(&tokens.refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = keys("one").token(&sam(), TokenKind::Access).unwrap();
        assert!(keys("two").check(&token, TokenKind::Access).is_err());
    }
}
