//! Tests for the application lifecycle
//!
//! # Test Coverage
//!
//! - Every registration method is rejected once the app is finalized
//! - On-ready hooks run once, at the end of finalize
//! - A failed finalize leaves the app open for fixes
//! - Default domain and custom converters apply at build time
//! - Requests without a host resolve against the default domain

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{noop, only_response, params_handler};
use routeweave::error::RouterError;
use routeweave::pattern::{Converter, ConverterRegistry, PathValue};
use routeweave::router::{RouteSpec, Router};
use routeweave::runtime_config::RuntimeConfig;
use routeweave::security::AuthBinding;
use routeweave::server::{MemoryRequest, TransportRequest};
use routeweave::App;

#[test]
fn test_registration_after_finalize_rejected() {
    let mut app = App::new("site");
    app.add_route(RouteSpec::new("/", noop)).unwrap();
    app.finalize().unwrap();
    assert!(app.is_finalized());

    assert_eq!(
        app.add_route(RouteSpec::new("/late", noop)).unwrap_err(),
        RouterError::AlreadyFinalized("add_route")
    );
    assert_eq!(
        app.mount("/x", Router::new("x")).unwrap_err(),
        RouterError::AlreadyFinalized("mount")
    );
    assert_eq!(
        app.before_handler(|_ctx| None).unwrap_err(),
        RouterError::AlreadyFinalized("before_handler")
    );
    assert_eq!(
        app.after_handler(|_ctx| None).unwrap_err(),
        RouterError::AlreadyFinalized("after_handler")
    );
    assert_eq!(
        app.error_handler(404u16, |_ctx, _cause| None).unwrap_err(),
        RouterError::AlreadyFinalized("error_handler")
    );
    assert_eq!(
        app.auth("a", AuthBinding::header("x", |_r: &dyn TransportRequest, _v: &str| true))
            .unwrap_err(),
        RouterError::AlreadyFinalized("auth")
    );
    assert_eq!(
        app.set_converters(ConverterRegistry::builtin()).unwrap_err(),
        RouterError::AlreadyFinalized("set_converters")
    );
    assert_eq!(
        app.on_ready(|_d| {}).unwrap_err(),
        RouterError::AlreadyFinalized("on_ready")
    );
    assert_eq!(app.finalize().unwrap_err(), RouterError::AlreadyFinalized("finalize"));
}

#[test]
fn test_on_ready_runs_once_after_build() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/", noop)).unwrap();
    let seen = Arc::clone(&calls);
    app.on_ready(move |dispatcher| {
        assert_eq!(dispatcher.routes().len(), 1);
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    app.finalize().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_finalize_keeps_app_open() {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/", noop)).unwrap();
    let mut child = Router::new("child");
    child.add_route(RouteSpec::new("/", noop)).unwrap();
    child.add_route(RouteSpec::new("/<x:nope>", noop)).unwrap();
    app.mount("/c", child).unwrap();

    assert!(matches!(app.finalize(), Err(RouterError::UnknownConverter { .. })));
    assert!(!app.is_finalized());

    let mut fixed = Router::new("child");
    fixed.add_route(RouteSpec::new("/<x:int>", noop).name("x")).unwrap();
    app.mount("c", fixed).unwrap();
    app.finalize().unwrap();
    assert_eq!(app.url_for("child:x", [("x", 3)]).unwrap(), "/c/3");
}

#[test]
fn test_default_domain_applies_to_unscoped_routes() {
    let config = RuntimeConfig {
        default_domain: Some("site.local".into()),
        ..RuntimeConfig::default()
    };
    let mut app = App::with_config(config);
    app.add_route(RouteSpec::new("/", noop).name("home")).unwrap();
    app.add_route(RouteSpec::new("/", noop).name("api").domain("api.local")).unwrap();
    let dispatcher = app.finalize().unwrap();

    let domains: Vec<_> = app.listing().into_iter().map(|l| l.domain).collect();
    assert_eq!(domains, vec![Some("site.local".into()), Some("api.local".into())]);

    let mut req = MemoryRequest::get("/").with_host("api.local:8080");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(outcome.route.as_deref(), Some("api"));

    let mut req = MemoryRequest::get("/").with_host("elsewhere");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 404);
}

#[test]
fn test_default_domain_serves_requests_without_host() {
    let config = RuntimeConfig {
        default_domain: Some("site.local".into()),
        ..RuntimeConfig::default()
    };
    let mut app = App::with_config(config);
    app.add_route(RouteSpec::new("/", noop).name("home")).unwrap();
    app.add_route(RouteSpec::new("/api", noop).name("api").domain("api.local")).unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/");
    let outcome = dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 200);
    assert_eq!(outcome.route.as_deref(), Some("home"));

    let mut req = MemoryRequest::get("/api");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).status, 404);
}

#[test]
fn test_custom_converters() {
    let registry = ConverterRegistry::builtin()
        .with(Converter::new("bool", "true|false", |s| Some(PathValue::Str(s.to_string()))))
        .unwrap();
    let mut app = App::new("");
    app.set_converters(registry).unwrap();
    app.add_route(RouteSpec::new("/flag/<on:bool>", params_handler).name("flag")).unwrap();
    let dispatcher = app.finalize().unwrap();

    let mut req = MemoryRequest::get("/flag/true");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(only_response(&req).text(), r#"{"on":"true"}"#);
    assert_eq!(
        app.url_for("flag", [("on", "maybe")]).unwrap_err(),
        RouterError::PathArgumentMismatch {
            name: "on".into(),
            value: "maybe".into(),
            expression: "true|false".into(),
        }
    );
}

#[test]
fn test_url_for_root_named_app() {
    let mut app = App::new("root");
    let blog = Router::new("blog")
        .route(RouteSpec::new("/<year:int>/<slug>", noop).name("post"))
        .unwrap();
    app.mount("blog", blog).unwrap();
    app.finalize().unwrap();

    assert_eq!(
        app.url_for("blog:post", [("year", "2024"), ("slug", "hello")]).unwrap(),
        "/blog/2024/hello"
    );
    assert!(matches!(app.url_for("root:blog:post", [("year", 1)]), Err(RouterError::NotFound(_))));
}
