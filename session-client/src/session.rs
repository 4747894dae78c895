// session-client/src/session.rs
use common::UserData;
use serde::Serialize;

/// Client-side authentication session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_data: Option<UserData>,
    pub is_loading: bool,
}

impl Session {
    pub fn authenticated(token: String, user_data: UserData) -> Self {
        Self {
            token: Some(token),
            user_data: Some(user_data),
            is_loading: false,
        }
    }
}

/// What consumers render from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthView {
    pub token: Option<String>,
    pub user_data: Option<UserData>,
    pub is_loading: bool,
    pub is_authenticated: bool,
}
