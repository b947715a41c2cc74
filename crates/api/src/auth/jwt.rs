//! Session token issuance and verification
//!
//! Two principal kinds share one signing secret and are told apart by the
//! subject prefix: `user:<id>` for staff, `consumer:<id>` for consumers.
//! Only consumers get refresh tokens.

use std::fmt;
use std::str::FromStr;

use chatdesk_shared::{Scope, User};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Staff access tokens live for 12 hours
pub const STAFF_ACCESS_TTL: Duration = Duration::hours(12);
/// Consumer access tokens live for 1 minute
pub const CONSUMER_ACCESS_TTL: Duration = Duration::minutes(1);
/// Consumer refresh tokens live for 1 day
pub const CONSUMER_REFRESH_TTL: Duration = Duration::days(1);

/// JWT claims carried by every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// `user:<id>` or `consumer:<id>`
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Empty for consumers
    #[serde(default)]
    pub scopes: Vec<String>,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token subject, serialized as `<kind>:<id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    User(Uuid),
    Consumer(Uuid),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User(id) => write!(f, "user:{id}"),
            Subject::Consumer(id) => write!(f, "consumer:{id}"),
        }
    }
}

impl FromStr for Subject {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or(AuthError::MalformedSubject)?;
        let id = Uuid::parse_str(id).map_err(|_| AuthError::MalformedSubject)?;
        match kind {
            "user" => Ok(Subject::User(id)),
            "consumer" => Ok(Subject::Consumer(id)),
            _ => Err(AuthError::MalformedSubject),
        }
    }
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Staff { id: Uuid, scopes: Vec<Scope> },
    Consumer { id: Uuid },
}

impl Principal {
    /// Staff principal with scopes resolved from the user's profile
    pub fn staff(user: &User) -> Self {
        Principal::Staff {
            id: user.id,
            scopes: user.profile.scopes().to_vec(),
        }
    }

    pub fn consumer(id: Uuid) -> Self {
        Principal::Consumer { id }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Principal::Staff { id, .. } | Principal::Consumer { id } => *id,
        }
    }

    pub fn subject(&self) -> Subject {
        match self {
            Principal::Staff { id, .. } => Subject::User(*id),
            Principal::Consumer { id } => Subject::Consumer(*id),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Principal::Staff { .. })
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        match self {
            Principal::Staff { scopes, .. } => scopes.contains(&scope),
            Principal::Consumer { .. } => false,
        }
    }

    pub fn scopes(&self) -> &[Scope] {
        match self {
            Principal::Staff { scopes, .. } => scopes,
            Principal::Consumer { .. } => &[],
        }
    }
}

/// Issues and verifies session tokens (HS256)
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    app_name: String,
}

impl TokenService {
    /// `app_name` is both issuer and audience
    pub fn new(secret: &str, app_name: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            app_name: app_name.to_string(),
        }
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_access_token_at(principal, OffsetDateTime::now_utc())
    }

    pub fn issue_access_token_at(
        &self,
        principal: &Principal,
        now: OffsetDateTime,
    ) -> Result<String, AuthError> {
        let ttl = match principal {
            Principal::Staff { .. } => STAFF_ACCESS_TTL,
            Principal::Consumer { .. } => CONSUMER_ACCESS_TTL,
        };
        let scopes = principal
            .scopes()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        self.sign(principal.subject(), scopes, TokenType::Access, now, ttl)
    }

    /// Refresh tokens exist for consumers only
    pub fn issue_refresh_token(&self, consumer_id: Uuid) -> Result<String, AuthError> {
        self.issue_refresh_token_at(consumer_id, OffsetDateTime::now_utc())
    }

    pub fn issue_refresh_token_at(
        &self,
        consumer_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<String, AuthError> {
        self.sign(
            Subject::Consumer(consumer_id),
            Vec::new(),
            TokenType::Refresh,
            now,
            CONSUMER_REFRESH_TTL,
        )
    }

    fn sign(
        &self,
        subject: Subject,
        scopes: Vec<String>,
        token_type: TokenType,
        now: OffsetDateTime,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.app_name.clone(),
            aud: self.app_name.clone(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            scopes,
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Verify a token of either purpose
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.verify_at(token, OffsetDateTime::now_utc())
            .map(|verified| verified.principal)
    }

    /// Verify a token that must be an access token (bearer credentials)
    pub fn verify_access(&self, token: &str) -> Result<Principal, AuthError> {
        let verified = self.verify_at(token, OffsetDateTime::now_utc())?;
        if verified.token_type != TokenType::Access {
            return Err(AuthError::WrongTokenType);
        }
        Ok(verified.principal)
    }

    /// Verify against an explicit clock. A token is still valid at exactly `exp`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<VerifiedToken, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against `now`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_audience(&[&self.app_name]);
        validation.set_issuer(&[&self.app_name]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAudience => AuthError::WrongAudience,
                ErrorKind::InvalidIssuer => AuthError::WrongIssuer,
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => {
                    AuthError::WrongAudience
                }
                ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => {
                    AuthError::WrongIssuer
                }
                _ => AuthError::MalformedToken(e.to_string()),
            })?;

        if now.unix_timestamp() > claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        let principal = match claims.sub.parse::<Subject>()? {
            Subject::User(id) => Principal::Staff {
                id,
                // Unknown scope strings are dropped rather than failing the token
                scopes: claims
                    .scopes
                    .iter()
                    .filter_map(|s| s.parse::<Scope>().ok())
                    .collect(),
            },
            Subject::Consumer(id) => Principal::Consumer { id },
        };

        Ok(VerifiedToken {
            principal,
            token_type: claims.token_type,
            expires_at: claims.exp,
        })
    }

    /// Exchange a consumer refresh token for a new access token.
    /// The refresh token is not rotated and stays valid until its own expiry.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.refresh_at(refresh_token, OffsetDateTime::now_utc())
    }

    pub fn refresh_at(&self, refresh_token: &str, now: OffsetDateTime) -> Result<String, AuthError> {
        let verified = self.verify_at(refresh_token, now).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            AuthError::InvalidRefreshToken
        })?;

        let consumer_id = match verified.principal {
            Principal::Consumer { id } if verified.token_type == TokenType::Refresh => id,
            _ => return Err(AuthError::InvalidRefreshToken),
        };

        self.issue_access_token_at(&Principal::consumer(consumer_id), now)
    }
}

/// Outcome of a successful verification
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub principal: Principal,
    pub token_type: TokenType,
    /// Unix seconds
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token audience does not match")]
    WrongAudience,
    #[error("Token issuer does not match")]
    WrongIssuer,
    #[error("Token subject is malformed")]
    MalformedSubject,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Wrong token type")]
    WrongTokenType,
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}
