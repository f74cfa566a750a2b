use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::ApiError;

/// Credentials for the `Authorization` header. Never persisted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: Option<String>,
    pub secret: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl BasicAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            user: None,
            secret: secret.into(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Value for the `Authorization` header: `Basic base64(user:secret)`, or
    /// `Basic base64(secret)` when no user is set.
    pub fn header_value(&self) -> Result<String, ApiError> {
        if self.secret.is_empty() {
            return Err(ApiError::EmptySecret);
        }
        let raw = match self.user.as_deref() {
            None | Some("") => self.secret.clone(),
            Some(user) => format!("{user}:{}", self.secret),
        };
        Ok(format!("Basic {}", STANDARD.encode(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(header: &str) -> String {
        let encoded = header.strip_prefix("Basic ").expect("Basic prefix");
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn secret_only() {
        let header = BasicAuth::new("x").header_value().unwrap();
        assert_eq!(header, "Basic eA==");
        assert_eq!(decode(&header), "x");
    }

    #[test]
    fn user_and_secret() {
        let header = BasicAuth::new("p").with_user("u").header_value().unwrap();
        assert_eq!(decode(&header), "u:p");
    }

    #[test]
    fn empty_user_is_ignored() {
        let header = BasicAuth::new("secret").with_user("").header_value().unwrap();
        assert_eq!(decode(&header), "secret");
    }

    #[test]
    fn empty_secret_fails_regardless_of_user() {
        assert!(matches!(
            BasicAuth::new("").header_value(),
            Err(ApiError::EmptySecret)
        ));
        assert!(matches!(
            BasicAuth::new("").with_user("u").header_value(),
            Err(ApiError::EmptySecret)
        ));
    }

    #[test]
    fn debug_hides_secret() {
        let shown = format!("{:?}", BasicAuth::new("hunter2").with_user("me"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("me"));
    }
}
