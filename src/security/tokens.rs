//! Signed identity tokens carried in the session cookie.

use std::{fs, path::Path};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::domain::user::User;

use super::error::TokenError;

/// Issuer claim stamped on and required of every token.
pub const ISSUER: &str = "verso";

/// Lifetime of an issued token.
pub const TOKEN_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    name: String,
    roles: Vec<String>,
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// RS256 signer and verifier. Keys are loaded once and never rotated.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, TokenError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem).map_err(TokenError::Key)?;
        let decoding = DecodingKey::from_rsa_pem(public_pem).map_err(TokenError::Key)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Ok(Self {
            encoding,
            decoding,
            validation,
        })
    }

    pub fn from_pem_files(private_key: &Path, public_key: &Path) -> Result<Self, TokenError> {
        let read = |path: &Path| {
            fs::read(path).map_err(|source| TokenError::KeyFile {
                path: path.to_path_buf(),
                source,
            })
        };
        Self::from_pem(&read(private_key)?, &read(public_key)?)
    }

    pub fn user_to_token(&self, user: &User) -> Result<String, TokenError> {
        self.user_to_token_at(user, OffsetDateTime::now_utc())
    }

    pub(crate) fn user_to_token_at(
        &self,
        user: &User,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            name: user.name.clone(),
            roles: user.roles.clone(),
            iss: ISSUER.to_string(),
            sub: user.name.clone(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + TOKEN_TTL).unix_timestamp(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Verify `token` and recover the user it was issued for.
    ///
    /// Tampered, expired, foreign-issuer and wrongly-signed tokens are all rejected.
    pub fn token_to_user(&self, token: &str) -> Result<User, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(TokenError::Rejected)?;
        Ok(User::new(data.claims.name, data.claims.roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::ROLE_ADMIN;

    const PRIVATE: &[u8] = include_bytes!("../../tests/fixtures/keys/private.pem");
    const PUBLIC: &[u8] = include_bytes!("../../tests/fixtures/keys/public.pem");
    const OTHER_PRIVATE: &[u8] = include_bytes!("../../tests/fixtures/keys/other_private.pem");

    fn service() -> TokenService {
        TokenService::from_pem(PRIVATE, PUBLIC).expect("fixture keys")
    }

    fn admin() -> User {
        User::new("admin", vec![ROLE_ADMIN.to_string()])
    }

    #[test]
    fn round_trips_user() {
        let service = service();
        let token = service.user_to_token(&admin()).expect("sign");
        assert_eq!(service.token_to_user(&token).expect("verify"), admin());
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = service();
        let issued_at = OffsetDateTime::now_utc() - TOKEN_TTL - Duration::seconds(1);
        let token = service.user_to_token_at(&admin(), issued_at).expect("sign");

        assert!(matches!(
            service.token_to_user(&token),
            Err(TokenError::Rejected(_))
        ));
    }

    #[test]
    fn token_signed_with_another_key_is_rejected() {
        let forger = TokenService::from_pem(OTHER_PRIVATE, PUBLIC).expect("keys");
        let token = forger.user_to_token(&admin()).expect("sign");
        assert!(service().token_to_user(&token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = service();
        let token = service.user_to_token(&admin()).expect("sign");
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = base64_url(br#"{"name":"admin","roles":["Admin","Write"],"iss":"verso","sub":"admin","iat":0,"exp":99999999999}"#);
        parts[1] = &forged_payload;
        assert!(service.token_to_user(&parts.join(".")).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(service().token_to_user("not-a-token").is_err());
    }

    fn base64_url(bytes: &[u8]) -> String {
        use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
