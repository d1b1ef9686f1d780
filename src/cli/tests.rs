//! Unit tests for CLI commands

use clap::Parser;

use crate::cli::{run_cli, Cli, Commands};
use crate::dispatcher::{DispatchContext, HandlerResult};
use crate::router::RouteSpec;
use crate::runtime_config::RuntimeConfig;
use crate::App;

fn user(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok(ctx.params().to_json().into())
}

fn build(config: RuntimeConfig) -> anyhow::Result<App> {
    let mut app = App::with_config(config);
    app.add_route(RouteSpec::new("/user/<id:int>", user).name("user"))?;
    Ok(app)
}

fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(args)?;
    let mut out = Vec::new();
    run_cli(cli, RuntimeConfig::default(), build, &mut out)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn test_dispatch_command_flags() {
    let cli = Cli::try_parse_from([
        "routeweave",
        "dispatch",
        "/x?y=1",
        "-X",
        "post",
        "-H",
        "X-Key: 1",
        "--cookie",
        "sid=2",
        "-d",
        "body",
    ])
    .unwrap();

    match cli.command {
        Commands::Dispatch {
            target,
            method,
            headers,
            cookies,
            data,
            json,
        } => {
            assert_eq!(target, "/x?y=1");
            assert_eq!(method, "post");
            assert_eq!(headers, vec!["X-Key: 1"]);
            assert_eq!(cookies, vec!["sid=2"]);
            assert_eq!(data.as_deref(), Some("body"));
            assert!(!json);
        }
        other => panic!("Expected Dispatch command, got {other:?}"),
    }
}

#[test]
fn test_routes_listing() {
    let out = run(&["routeweave", "routes"]).unwrap();
    assert!(out.contains("/user/<id:int>"), "{out}");
    assert!(out.starts_with("user "), "{out}");
}

#[test]
fn test_dispatch_prints_response() {
    let out = run(&["routeweave", "dispatch", "/user/7"]).unwrap();
    assert!(out.starts_with("HTTP 200 OK"), "{out}");
    assert!(out.contains(r#"{"id":7}"#), "{out}");

    let out = run(&["routeweave", "dispatch", "/nope"]).unwrap();
    assert!(out.starts_with("HTTP 404 Not Found"), "{out}");
}

#[test]
fn test_url_for() {
    let out = run(&["routeweave", "url-for", "user", "id=12"]).unwrap();
    assert_eq!(out.trim(), "/user/12");
    assert!(run(&["routeweave", "url-for", "user", "id"]).is_err());
}

#[test]
fn test_check() {
    let out = run(&["routeweave", "check"]).unwrap();
    assert_eq!(out.trim(), "ok: 1 routes, error status threshold 400");
}
