//! User actions: login, logout, profile updates.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use context_action::{
    ActionRegister, HandlerConfig, PipelineController, Registration, WeakActionRegister,
};
use tracing::info;
use uuid::Uuid;

use crate::actions::{
    LoginPayload, ToastKind, ToastPayload, UiShowToast, UpdateProfilePayload, UserLogin,
    UserLogout, UserUpdateProfile,
};
use crate::state::{AppState, Profile, Session, PROFILE, SESSION};

/// Simulated round trip to the auth backend.
const AUTH_LATENCY: Duration = Duration::from_millis(150);

pub fn register(pipeline: &ActionRegister, state: &AppState) -> Vec<Registration> {
    let mut registrations = Vec::new();

    let p = pipeline.downgrade();
    registrations.push(pipeline.register::<UserLogin, _>(
        move |payload, controller| validate_and_login(p.clone(), payload, controller),
        HandlerConfig::new()
            .id("user/login-validator")
            .priority(10)
            .blocking(true),
    ));

    registrations.push(pipeline.register::<UserLogin, _>(
        |payload: LoginPayload, _| async move {
            info!(email = payload.email.as_str(), remember_me = payload.remember_me, "Login succeeded");
            Ok(())
        },
        HandlerConfig::new().id("user/login-logger"),
    ));

    let p = pipeline.downgrade();
    registrations.push(pipeline.register::<UserLogout, _>(
        move |_, _| {
            let p = p.clone();
            async move {
                p.set_atom::<Option<Session>>(SESSION, None)?;
                p.dispatch::<UiShowToast>(ToastPayload::new(ToastKind::Info, "Signed out"))
                    .await?;
                Ok(())
            }
        },
        HandlerConfig::new().id("user/logout").blocking(true),
    ));

    let p = pipeline.downgrade();
    let profile = state.profile.clone();
    registrations.push(pipeline.register::<UserUpdateProfile, _>(
        move |payload, _| std::future::ready(update_profile(&p, profile.get(), payload)),
        HandlerConfig::new().id("user/update-profile").blocking(true),
    ));

    registrations
}

async fn validate_and_login(
    pipeline: WeakActionRegister,
    payload: LoginPayload,
    controller: PipelineController<LoginPayload>,
) -> Result<()> {
    if payload.email.trim().is_empty() {
        controller.abort_with("missing email");
        pipeline
            .dispatch::<UiShowToast>(ToastPayload::new(ToastKind::Error, "Email is required"))
            .await?;
        return Ok(());
    }
    if payload.password.is_empty() {
        controller.abort_with("missing password");
        return Ok(());
    }

    tokio::time::sleep(AUTH_LATENCY).await;

    // Later handlers see the canonical address
    controller.modify_payload(|p| LoginPayload {
        email: p.email.trim().to_lowercase(),
        ..p
    });
    let email = controller.payload().email;

    pipeline.set_atom(
        SESSION,
        Some(Session {
            email: email.clone(),
            token: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }),
    )?;
    pipeline
        .dispatch::<UiShowToast>(ToastPayload {
            duration_ms: Some(3000),
            ..ToastPayload::new(ToastKind::Success, format!("Logged in: {email}"))
        })
        .await?;
    Ok(())
}

fn update_profile(
    pipeline: &WeakActionRegister,
    mut profile: Profile,
    payload: UpdateProfilePayload,
) -> Result<()> {
    let changes = payload.data;
    if let Some(email) = &changes.email {
        if !email.contains('@') {
            bail!("invalid email for user {}: {email}", payload.user_id);
        }
    }

    if let Some(name) = changes.name {
        profile.name = name;
    }
    if let Some(email) = changes.email {
        profile.email = email;
    }
    if changes.avatar.is_some() {
        profile.avatar = changes.avatar;
    }
    if changes.bio.is_some() {
        profile.bio = changes.bio;
    }

    pipeline.set_atom(PROFILE, profile)?;
    info!(user_id = payload.user_id.as_str(), "Profile updated");
    Ok(())
}
