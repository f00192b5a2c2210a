use super::super::IssueTrackerError;
use crate::config::GithubAppConfig;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

// https://docs.github.com/en/apps/creating-github-apps/authenticating-with-a-github-app/generating-a-json-web-token-jwt-for-a-github-app

/// Issued slightly in the past to allow for clock drift
const ISSUED_AT_LEEWAY_SECS: i64 = 10;
/// GitHub rejects app tokens valid for longer than 10 minutes
const EXPIRES_IN_SECS: i64 = 600;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl AppClaims {
    pub fn new(app_id: &str, now_secs: i64) -> Self {
        Self {
            iat: now_secs - ISSUED_AT_LEEWAY_SECS,
            exp: now_secs + EXPIRES_IN_SECS,
            iss: app_id.to_string(),
        }
    }
}

/// Signs the JWT that authenticates as the GitHub App itself
pub fn create_app_jwt(app: &GithubAppConfig, now_secs: i64) -> Result<String, IssueTrackerError> {
    let key = EncodingKey::from_rsa_pem(app.private_key.as_bytes()).map_err(|e| {
        IssueTrackerError::NotConfigured(format!("Invalid GitHub App private key: {}", e))
    })?;
    let claims = AppClaims::new(&app.app_id, now_secs);

    encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
        IssueTrackerError::NotConfigured(format!("Unable to sign GitHub App token: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_cover_the_allowed_window() {
        let claims = AppClaims::new("1234", 1_700_000_000);
        assert_eq!(
            claims,
            AppClaims {
                iat: 1_699_999_990,
                exp: 1_700_000_600,
                iss: "1234".into()
            }
        );
    }

    #[test]
    fn rejects_invalid_private_key() {
        let app = GithubAppConfig {
            app_id: "1234".into(),
            private_key: "not a pem".into(),
        };
        assert!(matches!(
            create_app_jwt(&app, 1_700_000_000),
            Err(IssueTrackerError::NotConfigured(_))
        ));
    }
}
