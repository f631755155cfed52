//! The application's action set, grouped by feature area.

use std::collections::BTreeMap;

use context_action::define_action;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateProfilePayload {
    pub user_id: String,
    pub data: ProfileChanges,
}

define_action!(pub UserLogin => "user/login", LoginPayload);
define_action!(pub UserLogout => "user/logout", ());
define_action!(pub UserUpdateProfile => "user/update-profile", UpdateProfilePayload);

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone)]
pub struct ToastPayload {
    pub kind: ToastKind,
    pub message: String,
    pub duration_ms: Option<u64>,
}

impl ToastPayload {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

define_action!(pub UiShowToast => "ui/show-toast", ToastPayload);
define_action!(pub UiToggleSidebar => "ui/toggle-sidebar", ());
define_action!(pub UiSetTheme => "ui/set-theme", Theme);

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, Default)]
pub struct FetchPayload {
    pub endpoint: String,
    pub method: Method,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

define_action!(pub DataFetch => "data/fetch", FetchPayload);
