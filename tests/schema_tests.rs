//! Tests for request arguments and schemas
//!
//! # Test Coverage
//!
//! - Schema fields become the route's param rules
//! - `populate_get` / `populate_post` keep only arguments the rules accept
//! - `populate_from_request` converts kept arguments and applies defaults
//! - Param rules reach the transport registration

mod common;

use serde::Deserialize;
use serde_json::{json, Value};

use common::only_response;
use routeweave::dispatcher::{DispatchContext, HandlerResult, ReturnValue};
use routeweave::router::{ParamRules, RouteSpec};
use routeweave::schema::{populate_from_request, Field, Schema};
use routeweave::server::{MemoryRequest, Registration};
use routeweave::App;

fn search_schema() -> Schema {
    Schema::new()
        .field(Field::string("q").length(Some(1), Some(20)).required())
        .and_then(|s| s.field(Field::int("page").default("1")))
        .and_then(|s| s.field(Field::one_of("sort", ["asc", "desc"]).default("asc")))
        .unwrap()
}

fn search(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    ctx.populate_get();
    let values = populate_from_request(ctx, &search_schema())?;
    Ok(Value::Object(values).into())
}

fn arguments(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    let kept = ctx.populate_post();
    let mut names: Vec<_> = ctx.arguments().keys().cloned().collect();
    names.sort();
    Ok(json!({ "kept": kept, "names": names }).into())
}

#[derive(Debug, Deserialize)]
struct Signup {
    email: String,
    age: i64,
}

fn signup_schema() -> Schema {
    Schema::new()
        .field(Field::email("email").required())
        .and_then(|s| s.field(Field::int("age").required()))
        .unwrap()
}

fn signup(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    ctx.populate_post();
    let data = ["email", "age"].map(|name| (name, ctx.argument(name)));
    match signup_schema().load::<Signup, _>(data) {
        Ok(user) => Ok(ReturnValue::with_status(201, json!({ "email": user.email, "age": user.age }))),
        Err(err) => Ok(ReturnValue::with_status(422, json!({ "errors": err.errors() }))),
    }
}

fn app() -> App {
    let mut app = App::new("");
    app.add_route(RouteSpec::new("/search", search).name("search").params(search_schema().as_params()))
        .unwrap();
    app.add_route(
        RouteSpec::new("/form", arguments)
            .methods(["post"])
            .params(search_schema().as_params()),
    )
    .unwrap();
    app.add_route(
        RouteSpec::new("/signup", signup)
            .methods(["post"])
            .params(signup_schema().as_params()),
    )
    .unwrap();
    app
}

#[test]
fn test_query_arguments_converted_with_defaults() {
    let dispatcher = app().finalize().unwrap();
    let mut req = MemoryRequest::get("/search?q=rust&sort=desc");
    dispatcher.dispatch(&mut req).unwrap();
    let res = only_response(&req);
    assert_eq!(res.status, 200);
    assert_eq!(res.json().unwrap(), json!({ "q": "rust", "page": 1, "sort": "desc" }));
}

#[test]
fn test_rejected_query_arguments_are_dropped() {
    let dispatcher = app().finalize().unwrap();
    let mut req = MemoryRequest::get("/search?q=rust&page=two&sort=sideways");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(
        only_response(&req).json().unwrap(),
        json!({ "q": "rust", "page": 1, "sort": "asc" })
    );
}

#[test]
fn test_form_body_filtered_by_rules() {
    let dispatcher = app().finalize().unwrap();
    let mut req = MemoryRequest::post("/form").with_body("q=a+b&page=3&debug=1&sort=up");
    dispatcher.dispatch(&mut req).unwrap();
    assert_eq!(
        only_response(&req).json().unwrap(),
        json!({ "kept": 1, "names": ["page"] })
    );
}

#[test]
fn test_form_loaded_into_struct() {
    let dispatcher = app().finalize().unwrap();
    let mut req = MemoryRequest::post("/signup").with_body("email=dev%40example.com&age=31");
    dispatcher.dispatch(&mut req).unwrap();
    let res = only_response(&req);
    assert_eq!(res.status, 201);
    assert_eq!(res.json().unwrap(), json!({ "email": "dev@example.com", "age": 31 }));

    let mut req = MemoryRequest::post("/signup").with_body("email=dev%40example.com&age=old");
    dispatcher.dispatch(&mut req).unwrap();
    let res = only_response(&req);
    assert_eq!(res.status, 422);
    assert_eq!(
        res.json().unwrap(),
        json!({ "errors": { "age": "field `age` is required" } })
    );
}

#[test]
fn test_param_rules_reach_registration() {
    let mut app = app();
    app.finalize().unwrap();
    let mut seen: Vec<Registration> = Vec::new();
    app.install(&mut seen).unwrap();
    let search = seen.iter().find(|r| r.pattern == "/search").unwrap();
    assert_eq!(search.params, search_schema().as_params());
    assert_eq!(search.params.get("page"), Some("^([+-]?[0-9]+)$"));
}

#[test]
fn test_hand_written_rules_are_unanchored() {
    let rules = ParamRules::new().rule("id", "[0-9]+").unwrap();
    assert!(rules.accepts("id", "abc123"));
    assert!(!rules.accepts("id", "abc"));
}
