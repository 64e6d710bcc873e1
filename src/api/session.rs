use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Bearer tokens of the signed-in user, shared by every request of a client
#[derive(Debug, Default)]
pub struct Session {
    tokens: RwLock<Tokens>,
}

impl Session {
    pub fn new(access: Option<String>, refresh: Option<String>) -> Self {
        Self {
            tokens: RwLock::new(Tokens { access, refresh }),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).refresh.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).access.is_some()
    }

    /// Stores a freshly issued access token. The refresh token is only
    /// replaced when the backend rotated it.
    pub fn update(&self, access: String, refresh: Option<String>) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = Some(access);
        if refresh.is_some() {
            tokens.refresh = refresh;
        }
    }

    pub fn clear(&self) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Tokens::default();
    }
}
