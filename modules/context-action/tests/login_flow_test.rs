//! End-to-end login flow: a blocking validator that aborts on bad input,
//! followed by a fire-and-forget success logger.

use std::future::ready;
use std::sync::{Arc, Mutex};

use context_action::{define_action, ActionRegister, HandlerConfig, PipelineController};

#[derive(Debug, Clone)]
struct LoginPayload {
    email: String,
    password: String,
}

define_action!(UserLogin => "user/login", LoginPayload);

fn login(email: &str) -> LoginPayload {
    LoginPayload {
        email: email.to_string(),
        password: "x".to_string(),
    }
}

fn login_pipeline(calls: &Arc<Mutex<Vec<String>>>) -> ActionRegister {
    let pipeline = ActionRegister::new();

    let c = calls.clone();
    pipeline.register::<UserLogin, _>(
        move |payload: LoginPayload, controller: PipelineController<LoginPayload>| {
            let c = c.clone();
            async move {
                c.lock().unwrap().push(format!("validate:{}", payload.email));
                if payload.email.is_empty() {
                    controller.abort_with("missing email");
                }
                Ok(())
            }
        },
        HandlerConfig::new().id("validator").priority(10).blocking(true),
    );

    let c = calls.clone();
    pipeline.register::<UserLogin, _>(
        move |payload: LoginPayload, _| {
            c.lock().unwrap().push(format!("success:{}", payload.email));
            ready(Ok(()))
        },
        HandlerConfig::new().id("success-logger"),
    );

    pipeline
}

#[tokio::test]
async fn empty_email_aborts_without_error() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = login_pipeline(&calls);

    let report = pipeline.dispatch_report::<UserLogin>(login("")).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["validate:"]);
    assert!(report.aborted);
    assert_eq!(report.abort_reason.as_deref(), Some("missing email"));
    assert_eq!(report.payload.password, "x");
}

#[tokio::test]
async fn valid_email_runs_both_handlers_in_priority_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = login_pipeline(&calls);

    pipeline.dispatch::<UserLogin>(login("")).await.unwrap();
    calls.lock().unwrap().clear();

    pipeline.dispatch::<UserLogin>(login("a@b.com")).await.unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["validate:a@b.com", "success:a@b.com"]
    );
}

#[tokio::test]
async fn validator_can_normalize_before_logger_sees_payload() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = login_pipeline(&calls);

    pipeline.register::<UserLogin, _>(
        |_, controller: PipelineController<LoginPayload>| {
            controller.modify_payload(|p| LoginPayload {
                email: p.email.trim().to_lowercase(),
                ..p
            });
            ready(Ok(()))
        },
        HandlerConfig::new().id("normalizer").priority(20),
    );

    pipeline.dispatch::<UserLogin>(login("  A@B.com ")).await.unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["validate:a@b.com", "success:a@b.com"]
    );
    assert_eq!(
        pipeline.handler_ids::<UserLogin>(),
        vec!["normalizer", "validator", "success-logger"]
    );
}
