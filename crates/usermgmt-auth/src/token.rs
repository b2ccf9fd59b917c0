//! Bearer token issuance and validation (RS256).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use usermgmt_core::config::KeyPaths;
use usermgmt_core::{Error, Result};

/// Lifetime of an issued token, in seconds.
pub const TOKEN_LIFETIME_SECS: i64 = 10 * 60;

/// Claims carried by a token.
///
/// Tokens carry no subject; a token only attests that an administrator bind succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry (seconds since the epoch).
    pub exp: i64,
    /// Issued at (seconds since the epoch).
    pub iat: i64,
}

/// Signs and verifies tokens with a process-wide RSA key pair.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Builds the service from PEM encoded keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if either key is not a valid RSA PEM.
    pub fn from_pem(private_key_pem: &[u8], public_key_pem: &[u8]) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|err| Error::ConfigError(format!("invalid token signing key: {err}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|err| Error::ConfigError(format!("invalid token verification key: {err}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = vec![Algorithm::RS256];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Loads the key pair from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a key file is unreadable or invalid.
    pub fn from_files(keys: &KeyPaths) -> Result<Self> {
        let private_key = read_key(&keys.private_key)?;
        let public_key = read_key(&keys.public_key)?;
        Self::from_pem(&private_key, &public_key)
    }

    /// Issues a token valid for [`TOKEN_LIFETIME_SECS`] from now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalError`] if signing fails.
    pub fn issue_token(&self) -> Result<String> {
        self.issue_token_at(Utc::now())
    }

    fn issue_token_at(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = TokenClaims {
            exp: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|err| Error::InternalError(format!("failed to sign token: {err}")))
    }

    /// Verifies signature, algorithm and expiry of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenInvalid`] on any failure.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| Error::TokenInvalid(err.to_string()))
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| {
        Error::ConfigError(format!("couldn't read key file {}: {err}", path.display()))
    })
}
