//! Helpers shared by the integration tests.

#![allow(dead_code)]

use routeweave::dispatcher::{DispatchContext, HandlerResult};
use routeweave::server::{MemoryRequest, RecordedResponse};

/// Answers with the matched captures as a JSON object.
pub fn params_handler(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok(ctx.params().to_json().into())
}

/// Answers with the route label.
pub fn label_handler(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok(ctx.route().label().to_string().into())
}

pub fn noop(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok("ok".into())
}

/// The single response a dispatch must produce.
pub fn only_response(req: &MemoryRequest) -> &RecordedResponse {
    assert_eq!(req.responses().len(), 1, "expected exactly one response");
    &req.responses()[0]
}
