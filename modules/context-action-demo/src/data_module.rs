//! Data actions. Requests are validated and tagged, not sent anywhere.

use std::future::ready;

use anyhow::bail;
use context_action::{ActionRegister, HandlerConfig, PipelineController, Registration};
use tracing::info;

use crate::actions::{DataFetch, FetchPayload};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn register(pipeline: &ActionRegister) -> Vec<Registration> {
    vec![
        pipeline.register::<DataFetch, _>(
            |request: FetchPayload, controller: PipelineController<FetchPayload>| {
                let result = if request.endpoint.starts_with('/') {
                    controller.modify_payload(|mut p| {
                        p.headers
                            .entry(REQUEST_ID_HEADER.to_string())
                            .or_insert_with(|| uuid::Uuid::new_v4().to_string());
                        p
                    });
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "endpoint must be an absolute path: {}",
                        request.endpoint
                    ))
                };
                ready(result)
            },
            HandlerConfig::new()
                .id("data/fetch-validator")
                .priority(100)
                .blocking(true),
        ),
        pipeline.register::<DataFetch, _>(
            |request: FetchPayload, _| async move {
                if request.headers.get(REQUEST_ID_HEADER).is_none() {
                    bail!("request reached the client without a request id");
                }
                info!(
                    endpoint = request.endpoint.as_str(),
                    method = ?request.method,
                    params = request.params.len(),
                    "Fetch issued"
                );
                Ok(())
            },
            HandlerConfig::new().id("data/fetch-client"),
        ),
    ]
}
