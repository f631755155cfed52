//! UI actions: toasts, sidebar, theme.

use std::future::ready;

use chrono::Utc;
use context_action::{ActionRegister, HandlerConfig, Registration};
use tracing::{info, warn};

use crate::actions::{Theme, ToastKind, ToastPayload, UiSetTheme, UiShowToast, UiToggleSidebar};
use crate::state::{AppState, Toast, SIDEBAR_OPEN, THEME, TOAST};

pub fn register(pipeline: &ActionRegister, state: &AppState) -> Vec<Registration> {
    let mut registrations = Vec::new();

    let p = pipeline.downgrade();
    registrations.push(pipeline.register::<UiShowToast, _>(
        move |toast: ToastPayload, _| {
            match toast.kind {
                ToastKind::Error | ToastKind::Warning => {
                    warn!(message = toast.message.as_str(), "Toast");
                }
                ToastKind::Success | ToastKind::Info => {
                    info!(message = toast.message.as_str(), "Toast");
                }
            }
            ready(
                p.set_atom(
                    TOAST,
                    Toast {
                        kind: toast.kind,
                        message: toast.message,
                        shown_at: Utc::now(),
                    },
                )
                .map_err(anyhow::Error::from),
            )
        },
        HandlerConfig::new().id("ui/toast"),
    ));

    let p = pipeline.downgrade();
    let sidebar = state.sidebar_open.clone();
    registrations.push(pipeline.register::<UiToggleSidebar, _>(
        move |_, _| {
            let open = !sidebar.get();
            info!(open, "Sidebar toggled");
            ready(p.set_atom(SIDEBAR_OPEN, open).map_err(anyhow::Error::from))
        },
        HandlerConfig::new().id("ui/toggle-sidebar"),
    ));

    let p = pipeline.downgrade();
    registrations.push(pipeline.register::<UiSetTheme, _>(
        move |theme: Theme, _| {
            info!(?theme, "Theme changed");
            ready(p.set_atom(THEME, theme).map_err(anyhow::Error::from))
        },
        HandlerConfig::new().id("ui/set-theme").blocking(true),
    ));

    registrations
}
