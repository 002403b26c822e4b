//! Bearer-token authentication with a development bypass mode (spec.md §4.8).

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Settings;
use crate::error::{AppError, AppResult};

const BYPASS_PRINCIPAL: &str = "dev_user_001";

pub struct Authenticator<'a> {
    settings: &'a Settings,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    user_id: Option<String>,
    uid: Option<String>,
    #[serde(rename = "userId")]
    user_id_camel: Option<String>,
}

impl<'a> Authenticator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Resolves `user_id` from an optional bearer token, per bypass or
    /// enforced mode (spec.md §4.8).
    pub fn authenticate(&self, bearer_token: Option<&str>) -> AppResult<String> {
        if self.settings.enable_auth_bypass {
            return Ok(match bearer_token {
                None => BYPASS_PRINCIPAL.to_string(),
                Some(token) if token.is_empty() => BYPASS_PRINCIPAL.to_string(),
                Some(token) => format!("bypass:{}", &token[..token.len().min(12)]),
            });
        }

        let token = bearer_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

        let claims = self.verify(token)?;
        claims
            .sub
            .or(claims.user_id)
            .or(claims.uid)
            .or(claims.user_id_camel)
            .ok_or_else(|| {
                AppError::Unauthenticated(
                    "token carried no recognizable user id claim".to_string(),
                )
            })
    }

    fn verify(&self, token: &str) -> AppResult<Claims> {
        let header = jsonwebtoken::decode_header(token)?;

        let decoding_key = match header.alg {
            Algorithm::RS256 => {
                let pem = self.settings.jwt_public_key.as_ref().ok_or_else(|| {
                    AppError::Unauthenticated("no JWT public key configured".to_string())
                })?;
                DecodingKey::from_rsa_pem(pem.as_bytes())?
            }
            Algorithm::HS256 => {
                DecodingKey::from_secret(self.settings.secret_key.as_bytes())
            }
            other => {
                return Err(AppError::Unauthenticated(format!(
                    "unsupported JWT algorithm: {other:?}"
                )))
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        if let Some(aud) = &self.settings.jwt_audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }
        if let Some(iss) = &self.settings.jwt_issuer {
            validation.set_issuer(&[iss]);
        }

        let data = decode::<Value>(token, &decoding_key, &validation)?;
        let claims: Claims = serde_json::from_value(data.claims)?;
        Ok(claims)
    }
}
