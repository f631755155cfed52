use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use context_action::{ActionRegister, PipelineConfig};

mod actions;
mod data_module;
mod state;
mod ui_module;
mod user_module;

use actions::{
    DataFetch, FetchPayload, LoginPayload, Method, ProfileChanges, Theme, UiSetTheme,
    UiToggleSidebar, UpdateProfilePayload, UserLogin, UserLogout, UserUpdateProfile,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("context_action=debug".parse()?)
                .add_directive("action_demo=info".parse()?),
        )
        .init();

    let config = PipelineConfig::from_env()?;
    info!(
        warn_on_unhandled = config.warn_on_unhandled,
        id_prefix = config.auto_id_prefix.as_str(),
        "Action demo starting"
    );

    let pipeline = ActionRegister::with_config(config);
    let state = AppState::new();
    state.bind_atoms(&pipeline);

    let mut registrations = user_module::register(&pipeline, &state);
    registrations.extend(ui_module::register(&pipeline, &state));
    registrations.extend(data_module::register(&pipeline));
    info!(
        handlers = registrations.len(),
        actions = ?pipeline.action_names(),
        atoms = ?pipeline.atom_setter_keys(),
        "Modules registered"
    );

    // Missing email: the validator aborts before the logger runs
    let report = pipeline
        .dispatch_report::<UserLogin>(LoginPayload {
            email: String::new(),
            password: "hunter2".to_string(),
            remember_me: false,
        })
        .await?;
    info!(
        aborted = report.aborted,
        reason = ?report.abort_reason,
        visited = report.visited,
        "Login attempt finished"
    );

    let report = pipeline
        .dispatch_report::<UserLogin>(LoginPayload {
            email: "  A@B.com ".to_string(),
            password: "hunter2".to_string(),
            remember_me: true,
        })
        .await?;
    info!(
        aborted = report.aborted,
        email = report.payload.email.as_str(),
        visited = report.visited,
        "Login attempt finished"
    );

    pipeline.dispatch::<UiToggleSidebar>(()).await?;
    pipeline.dispatch::<UiSetTheme>(Theme::Dark).await?;

    pipeline
        .dispatch::<UserUpdateProfile>(UpdateProfilePayload {
            user_id: "user-1".to_string(),
            data: ProfileChanges {
                name: Some("Jane Doe".to_string()),
                bio: Some("Writes handlers".to_string()),
                ..ProfileChanges::default()
            },
        })
        .await?;

    let report = pipeline
        .dispatch_report::<DataFetch>(FetchPayload {
            endpoint: "/api/users".to_string(),
            method: Method::Get,
            params: BTreeMap::from([("page".to_string(), "1".to_string())]),
            ..FetchPayload::default()
        })
        .await?;
    info!(headers = ?report.payload.headers, "Fetch dispatched");

    if let Err(e) = pipeline
        .dispatch::<DataFetch>(FetchPayload {
            endpoint: "api/users".to_string(),
            ..FetchPayload::default()
        })
        .await
    {
        warn!(error = %e, "Fetch rejected");
    }

    pipeline.dispatch::<UserLogout>(()).await?;

    let profile = state.profile.get();
    info!(
        theme = ?state.theme.get(),
        sidebar_open = state.sidebar_open.get(),
        signed_in = state.session.get().is_some(),
        profile = profile.name.as_str(),
        toasts = state.toasts.get().len(),
        "Final state"
    );
    for toast in state.toasts.get() {
        println!("[{}] {:?}: {}", toast.shown_at.format("%H:%M:%S"), toast.kind, toast.message);
    }

    for registration in registrations {
        registration.unregister();
    }
    info!(remaining = ?pipeline.action_names(), "Handlers unregistered");

    Ok(())
}
