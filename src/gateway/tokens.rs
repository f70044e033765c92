use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;

use super::{GatewayError, Uid};

// -----------------------------------------------------------------------------
// ----- SessionToken ----------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub uid: Uid,
    pub token: String,
}

// The token is a bearer credential; keep it out of logs.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("uid", &self.uid)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// 128 random bits from the thread-local CSPRNG, as 32 lowercase hex chars.
pub fn generate_token() -> String {
    let bits: u128 = rand::rng().random();
    format!("{bits:032x}")
}

// -----------------------------------------------------------------------------
// ----- TokenStore ------------------------------------------------------------

/// One active token per uid. Tokens never expire; a new one replaces the old.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: Mutex<HashMap<Uid, String>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `token` for `uid`. Returns true when it replaced an older token.
    pub fn bind(&self, uid: Uid, token: String) -> bool {
        self.tokens.lock().insert(uid, token).is_some()
    }

    pub fn validate(&self, uid: Uid, token: &str) -> Result<SessionToken, GatewayError> {
        let tokens = self.tokens.lock();

        let Some(stored) = tokens.get(&uid) else {
            return Err(GatewayError::UnknownUser { uid });
        };

        if stored != token {
            return Err(GatewayError::TokenMismatch { uid });
        }

        Ok(SessionToken {
            uid,
            token: stored.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
