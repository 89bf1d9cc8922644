use serde::{Deserialize, Serialize};

/// Optional basic-auth companion to a [`Subscription`], stored separately
/// and looked up by subscription id.
///
/// [`Subscription`]: crate::models::Subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub subscription_id: i64,
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new<U: Into<String>, P: Into<String>>(
        subscription_id: i64,
        username: U,
        password: P,
    ) -> Self {
        Self {
            subscription_id,
            username: username.into(),
            password: password.into(),
        }
    }
}
