//! Authentication handling

use inquest_core::{AuthConfig, AuthMode, Error, Result};

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Clone, Debug)]
pub struct ResolvedAuth {
    pub mode: AuthMode,
    pub token: Option<String>,
}

impl ResolvedAuth {
    /// A token from config beats one from the environment.
    pub fn from_config(config: &AuthConfig, env_token: Option<String>) -> Self {
        let token = config.token.clone().or(env_token);
        Self {
            mode: config.mode.clone(),
            token,
        }
    }

    pub fn verify_token(&self, provided: Option<&str>) -> Result<()> {
        match self.mode {
            AuthMode::None => Ok(()),
            AuthMode::Token => {
                let expected = self
                    .token
                    .as_deref()
                    .ok_or_else(|| Error::auth_failed("no token configured"))?;
                let provided = provided.ok_or_else(|| Error::auth_failed("token required"))?;
                if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
                    return Err(Error::auth_failed("invalid token"));
                }
                Ok(())
            }
        }
    }

    /// Whether connections start out authenticated.
    pub fn open_by_default(&self) -> bool {
        self.mode == AuthMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_auth_accepts_exact_match_only() {
        let auth = ResolvedAuth {
            mode: AuthMode::Token,
            token: Some("secret-token-123".into()),
        };
        assert!(auth.verify_token(Some("secret-token-123")).is_ok());
        assert!(auth.verify_token(Some("wrong-token")).is_err());
        assert!(auth.verify_token(None).is_err());
        assert!(!auth.open_by_default());
    }

    #[test]
    fn no_auth_accepts_anything() {
        let auth = ResolvedAuth {
            mode: AuthMode::None,
            token: None,
        };
        assert!(auth.verify_token(None).is_ok());
        assert!(auth.verify_token(Some("anything")).is_ok());
        assert!(auth.open_by_default());
    }

    #[test]
    fn config_token_beats_env_token() {
        let config = AuthConfig {
            mode: AuthMode::Token,
            token: Some("from-config".into()),
        };
        let auth = ResolvedAuth::from_config(&config, Some("from-env".into()));
        assert_eq!(auth.token.as_deref(), Some("from-config"));
    }
}
