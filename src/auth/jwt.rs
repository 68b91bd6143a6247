/// JWT Token Generation and Validation
///
/// Access tokens are compact HS256 JWTs (`header.claims.signature`). The codec
/// is a pure function of the secret: nothing is stored server side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;

use crate::auth::claims::{Claims, Role};
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Header as sent, before `alg` is narrowed to the algorithms jsonwebtoken knows
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Refuse any `alg` other than the signing algorithm, including `none` and
/// names jsonwebtoken cannot parse.
fn check_algorithm(token: &str) -> Result<(), TokenError> {
    let encoded = token.split('.').next().unwrap_or_default();
    let decoded = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| TokenError::Malformed(format!("could not base64 decode header: {}", e)))?;
    let header: RawHeader = serde_json::from_slice(&decoded)
        .map_err(|e| TokenError::Malformed(format!("could not JSON decode header: {}", e)))?;

    match header.alg.parse::<Algorithm>() {
        Ok(alg) if alg == SIGNING_ALGORITHM => Ok(()),
        _ => Err(TokenError::InvalidSignature),
    }
}

/// Signs and verifies access tokens with a symmetric secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_expiry: i64,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = config.leeway;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_token_expiry: config.access_token_expiry,
        }
    }

    /// Lifetime of freshly minted access tokens, in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    /// Mint an access token for a user
    pub fn generate_access_token(&self, user_id: i64, role: Role) -> Result<String, AppError> {
        self.sign(&Claims::new(user_id, role, self.access_token_expiry))
    }

    /// Encode and sign claims
    ///
    /// # Errors
    /// Only internal failures: claims whose expiry is not after `iat`, or an
    /// encoding error inside the JWT library.
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        if claims.exp <= claims.iat {
            return Err(AppError::Internal(
                "token expiry must be after issued-at".to_string(),
            ));
        }

        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate a token and extract its claims
    ///
    /// The signature is checked before any claim, so a token that is both
    /// forged and expired reports [`TokenError::InvalidSignature`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed(
                "token contains an invalid number of segments".to_string(),
            ));
        }
        check_algorithm(token)?;

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::InvalidSignature
                    }
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed(e.to_string()),
                };
                tracing::debug!(error = %e, kind = %err, "JWT validation error");
                err
            })
    }
}
