//! Tests for the dispatch pipeline
//!
//! # Test Coverage
//!
//! - Resolution failures: 404 for unmatched paths, 405 for unknown methods
//! - Before callbacks short-circuit the handler
//! - After callbacks run in reverse registration order and may replace the value
//! - Status error handlers run at or above the threshold instead of after callbacks,
//!   including a `500` returned without an error
//! - Handler errors: typed matchers (anywhere in the source chain), then `500`
//! - Return value normalization and content types
//! - Bounded incremental body reads
//! - Method views and transport installation

mod common;

use std::sync::{Arc, Mutex};

use serde_json::json;
use thiserror::Error;

use common::{noop, only_response, params_handler};
use routeweave::dispatcher::{
    as_view, DispatchContext, ErrorCause, ErrorMatcher, HandlerResult, MethodView, ReturnValue, Stage,
};
use routeweave::error::DispatchError;
use routeweave::router::RouteSpec;
use routeweave::runtime_config::RuntimeConfig;
use routeweave::server::{MemoryRequest, Registration};
use routeweave::App;

#[derive(Debug, Error)]
#[error("record {0} is missing")]
struct MissingRecord(i64);

#[derive(Debug, Error)]
#[error("store offline")]
struct StoreOffline;

fn missing(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    let id = ctx.params().get_int("id").unwrap_or_default();
    Err(anyhow::Error::new(MissingRecord(id)).context("loading record"))
}

fn offline(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Err(StoreOffline.into())
}

fn app() -> App {
    let mut app = App::new("test");
    app.add_route(RouteSpec::new("/", noop).name("index")).unwrap();
    app.add_route(RouteSpec::new("/a/<x:int>/<y:float>", params_handler).name("natives"))
        .unwrap();
    app.add_route(RouteSpec::new("/record/<id:int>", missing).name("record")).unwrap();
    app.add_route(RouteSpec::new("/offline", offline).name("offline")).unwrap();
    app
}

#[test]
fn test_not_found_and_unknown_method() {
    let dispatcher = app().finalize().unwrap();

    let mut req = MemoryRequest::get("/nope");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::NotFound);
    let res = only_response(&req);
    assert_eq!(res.status, 404);
    assert_eq!(res.text(), "Not Found");
    assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));

    let mut req = MemoryRequest::new("BREW", "/");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::MethodNotAllowed);
    assert_eq!(only_response(&req).status, 405);
}

#[test]
fn test_native_params_reach_handler() {
    let dispatcher = app().finalize().unwrap();
    let mut req = MemoryRequest::get("/a/3/4.5");
    dispatcher.dispatch(&mut req).unwrap();

    let res = only_response(&req);
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.json().unwrap(), json!({ "x": 3, "y": 4.5 }));
}

#[test]
fn test_before_short_circuits_handler() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new("");
    let seen = Arc::clone(&calls);
    app.add_route(RouteSpec::new("/", move |_ctx: &mut DispatchContext<'_>| {
        seen.lock().unwrap().push("handler");
        Ok("handled".into())
    }))
    .unwrap();
    let seen = Arc::clone(&calls);
    app.before_handler(move |_ctx| {
        seen.lock().unwrap().push("first");
        None
    })
    .unwrap();
    let seen = Arc::clone(&calls);
    app.before_handler(move |ctx| {
        seen.lock().unwrap().push("second");
        (ctx.header("x-block").is_some()).then(|| ReturnValue::with_status(403, "blocked"))
    })
    .unwrap();
    app.before_handler(|_ctx| panic!("never reached once a value was returned")).unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/").with_header("X-Block", "1");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::ShortCircuited);
    assert_eq!(only_response(&req).status, 403);
    assert_eq!(only_response(&req).text(), "blocked");
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_after_runs_in_reverse_and_overrides() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut app = app();
    let seen = Arc::clone(&order);
    app.after_handler(move |ctx| {
        seen.lock().unwrap().push(1);
        assert_eq!(ctx.response_status, Some(200));
        Some(ReturnValue::with_status(202, "replaced"))
    })
    .unwrap();
    let seen = Arc::clone(&order);
    app.after_handler(move |ctx| {
        seen.lock().unwrap().push(2);
        assert_eq!(ctx.response_body.as_deref(), Some(&b"ok"[..]));
        None
    })
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::Handled);
    assert_eq!(*order.lock().unwrap(), vec![2, 1]);
    assert_eq!(only_response(&req).status, 202);
    assert_eq!(only_response(&req).text(), "replaced");
}

#[test]
fn test_error_status_skips_after_callbacks() {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/gone", |_ctx: &mut DispatchContext<'_>| {
        Ok(ReturnValue::with_status(404, json!({ "message": "missing" })))
    }))
    .unwrap();
    app.after_handler(|_ctx| panic!("after callbacks don't run for error statuses")).unwrap();
    app.error_handler(500u16, |_ctx, _cause| panic!("wrong status")).unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/gone");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::Handled);
    let res = only_response(&req);
    assert_eq!(res.status, 404);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.json().unwrap(), json!({ "message": "missing" }));
}

#[test]
fn test_status_error_handler_replaces_value() {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/gone", |_ctx: &mut DispatchContext<'_>| {
        Ok(ReturnValue::with_status(404, "raw"))
    }))
    .unwrap();
    app.error_handler(404u16, |ctx, cause| {
        assert_eq!(cause.status, 404);
        assert!(cause.error.is_none());
        assert_eq!(ctx.response_body.as_deref(), Some(&b"raw"[..]));
        None
    })
    .unwrap();
    app.error_handler(ErrorMatcher::status(404), |_ctx, _cause| {
        Some(ReturnValue::with_status(404, "friendly"))
    })
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/gone");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::ErrorHandled);
    assert_eq!(only_response(&req).text(), "friendly");
}

#[test]
fn test_returned_500_reaches_status_handler() {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/broken", |_ctx: &mut DispatchContext<'_>| {
        Ok(ReturnValue::with_status(500, json!({ "detail": "db down" })))
    }))
    .unwrap();
    app.after_handler(|_ctx| panic!("after callbacks don't run for error statuses")).unwrap();
    app.error_handler(ErrorMatcher::of::<StoreOffline>(), |_ctx, _cause| panic!("no error was raised"))
        .unwrap();
    app.error_handler(500u16, |ctx, cause| {
        assert!(cause.error.is_none());
        assert_eq!(ctx.response_status, Some(500));
        Some(ReturnValue::with_status(503, "try again later"))
    })
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/broken");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::ErrorHandled);
    assert_eq!(only_response(&req).status, 503);
    assert_eq!(only_response(&req).text(), "try again later");
}

#[test]
fn test_after_overwrite_refreshes_response_fields() {
    let mut app = app();
    app.after_handler(|ctx| {
        assert_eq!(ctx.response_status, Some(201));
        assert_eq!(ctx.response_body.as_deref(), Some(&b"created"[..]));
        None
    })
    .unwrap();
    app.after_handler(|_ctx| Some(ReturnValue::with_status(201, "created"))).unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 201);
}

#[test]
fn test_threshold_is_configurable() {
    let config = RuntimeConfig {
        error_status_threshold: 500,
        ..RuntimeConfig::default()
    };
    let mut app = App::with_config(config);
    app.add_route(RouteSpec::new("/", |_ctx: &mut DispatchContext<'_>| {
        Ok(ReturnValue::with_status(404, "x"))
    }))
    .unwrap();
    let hits = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&hits);
    app.after_handler(move |_ctx| {
        *seen.lock().unwrap() += 1;
        None
    })
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    dispatcher.dispatch(&mut MemoryRequest::get("/")).unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn test_typed_error_matched_through_chain() {
    let mut app = app();
    app.error_handler(500u16, |_ctx, _cause| Some("status handler".into())).unwrap();
    app.error_handler(ErrorMatcher::of::<MissingRecord>(), |_ctx, cause: &ErrorCause<'_>| {
        let record = cause.error.and_then(|e| e.chain().find_map(|c| c.downcast_ref::<MissingRecord>()))?;
        Some(ReturnValue::with_status(404, json!({ "missing": record.0 })))
    })
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/record/12");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.stage, Stage::ErrorHandled);
    let res = only_response(&req);
    assert_eq!(res.status, 404);
    assert_eq!(res.json().unwrap(), json!({ "missing": 12 }));

    // an unrelated error type falls through to the 500 handler
    let mut req = MemoryRequest::get("/offline");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 200);
    assert_eq!(only_response(&req).text(), "status handler");
}

#[test]
fn test_unhandled_error_propagates_without_response() {
    let mut app = app();
    app.error_handler(ErrorMatcher::of::<MissingRecord>(), |_ctx, _cause| None).unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/offline");
    let err = dispatcher.dispatch(&mut req).unwrap_err();
    match err {
        DispatchError::Handler(inner) => assert!(inner.is::<StoreOffline>()),
        other => panic!("expected handler error, got {other:?}"),
    }
    assert!(req.responses().is_empty());
}

#[test]
fn test_return_value_kinds() {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/bytes", |_ctx: &mut DispatchContext<'_>| {
        Ok(vec![0u8, 159, 146, 150].into())
    }))
    .unwrap();
    app.add_route(RouteSpec::new("/triple", |_ctx: &mut DispatchContext<'_>| {
        Ok(ReturnValue::Tuple(vec![
            ReturnValue::from(json!(201)),
            ReturnValue::from("a"),
            ReturnValue::from("b"),
        ]))
    }))
    .unwrap();
    app.add_route(RouteSpec::new("/typed", |ctx: &mut DispatchContext<'_>| {
        ctx.set_header("Content-Type", "text/csv");
        Ok("a,b\n1,2".into())
    }))
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/bytes");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).body, vec![0u8, 159, 146, 150]);
    assert_eq!(only_response(&req).header("content-type"), Some("application/octet-stream"));

    // only a pair carries a status; longer tuples are plain arrays
    let mut req = MemoryRequest::get("/triple");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 200);
    assert_eq!(only_response(&req).json().unwrap(), json!([201, "a", "b"]));

    let mut req = MemoryRequest::get("/typed");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).header("content-type"), Some("text/csv"));
}

#[test]
fn test_null_return_value_is_unparsable() {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/", |_ctx: &mut DispatchContext<'_>| {
        Ok(serde_json::Value::Null.into())
    }))
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/");
    let err = dispatcher.dispatch(&mut req).unwrap_err();
    assert!(matches!(err, DispatchError::UnparsableReturnValue { type_name: "null", .. }));
    assert!(req.responses().is_empty());
}

#[test]
fn test_body_read_is_bounded() {
    let mut app = App::new("");
    app.add_route(
        RouteSpec::new("/upload", |ctx: &mut DispatchContext<'_>| {
            let too_big = matches!(
                ctx.body_read(1025),
                Err(DispatchError::BodyReadTooLarge { requested: 1025, limit: 1024 })
            );
            let head = ctx.body_read(4)?;
            let rest = ctx.body_read(1024)?;
            Ok(json!({
                "too_big": too_big,
                "head": String::from_utf8_lossy(&head),
                "rest": String::from_utf8_lossy(&rest),
            })
            .into())
        })
        .methods(["post"]),
    )
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::post("/upload").with_body("hello world");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(
        only_response(&req).json().unwrap(),
        json!({ "too_big": true, "head": "hell", "rest": "o world" })
    );
}

#[test]
fn test_request_id_reused_from_header() {
    let dispatcher = app().finalize().unwrap();
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let mut req = MemoryRequest::get("/").with_header("X-Request-Id", id);
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.request_id.to_string(), id);
    assert_eq!(outcome.route.as_deref(), Some("index"));
}

#[test]
fn test_redirect_and_url_for_from_context() {
    let mut app = app();
    app.add_route(RouteSpec::new("/old/<id:int>", |ctx: &mut DispatchContext<'_>| {
        let id = ctx.params().get_int("id").unwrap_or_default();
        let target = ctx.url_for("natives", [("x", id.to_string()), ("y", "1.5".to_string())])?;
        Ok(ctx.redirect(&target))
    }))
    .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/old/8");
    dispatcher.dispatch(&mut req).unwrap();
    let res = only_response(&req);
    assert_eq!(res.status, 302);
    assert_eq!(res.header("location"), Some("/a/8/1.5"));
}

#[derive(Default)]
struct Counter {
    seen_before: bool,
}

impl MethodView for Counter {
    fn before_handler(&mut self, _ctx: &mut DispatchContext<'_>) {
        self.seen_before = true;
    }

    fn get(&mut self, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(json!({ "before": self.seen_before }).into())
    }
}

#[test]
fn test_method_view() {
    let mut app = App::new("");
    app.add_route(RouteSpec::endpoint("/count", as_view("counter", Counter::default)).methods(["get", "post"]))
        .unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/count");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).json().unwrap(), json!({ "before": true }));

    let mut req = MemoryRequest::post("/count");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 405);
    assert_eq!(only_response(&req).text(), "Method not allowed");
}

#[test]
fn test_install_hands_out_bound_handlers() {
    let mut app = app();
    app.finalize().unwrap();

    let mut registrations: Vec<Registration> = Vec::new();
    app.install(&mut registrations).unwrap();
    assert_eq!(registrations.len(), 4);
    assert_eq!(registrations[1].pattern, "/a/([0-9]+)/([0-9]+\\.[0-9]+)");

    let natives = &registrations[1].handler;
    let mut req = MemoryRequest::get("/a/1/2.0");
    natives.call(&mut req).unwrap();
    assert_eq!(only_response(&req).json().unwrap(), json!({ "x": 1, "y": 2.0 }));

    let mut req = MemoryRequest::get("/elsewhere");
    natives.call(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 404);
}

#[test]
fn test_install_requires_finalize() {
    let app = app();
    let mut registrations: Vec<Registration> = Vec::new();
    assert!(app.install(&mut registrations).is_err());
}
