use std::io;

use clap::Parser;
use serde_json::json;
use tracing::info;

use routeweave::cli::{run_cli, Cli};
use routeweave::dispatcher::{DispatchContext, HandlerResult, ReturnValue};
use routeweave::ids::REQUEST_ID_HEADER;
use routeweave::otel::init_logging;
use routeweave::router::{RouteSpec, Router};
use routeweave::runtime_config::RuntimeConfig;
use routeweave::schema::{populate_from_request, Field, Schema};
use routeweave::security::AuthBinding;
use routeweave::server::TransportRequest;
use routeweave::App;

fn index(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok("routeweave demo".into())
}

fn show_user(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    let id = ctx.params().get_int("id").unwrap_or_default();
    let link = ctx.url_for("blog:post", [("slug", "welcome")])?;
    Ok(json!({ "id": id, "blog": link }).into())
}

fn blog_post(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    let slug = ctx.params().get_str("slug").unwrap_or_default().to_string();
    Ok(json!({ "slug": slug }).into())
}

fn admin(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok("admin area".into())
}

fn echo(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    let body = ctx.body().to_vec();
    Ok(ReturnValue::with_status(201, body))
}

fn search_schema() -> Result<Schema, routeweave::schema::SchemaError> {
    Schema::new()
        .field(Field::string("q").length(Some(1), Some(64)))?
        .field(Field::int("page").default("1"))
}

fn search(ctx: &mut DispatchContext<'_>) -> HandlerResult {
    ctx.populate_get();
    let query = populate_from_request(ctx, &search_schema()?)?;
    Ok(serde_json::Value::Object(query).into())
}

fn session_ok(_req: &dyn TransportRequest, token: &str) -> bool {
    token == "letmein"
}

fn build_demo(config: RuntimeConfig) -> anyhow::Result<App> {
    let mut app = App::with_config(config);

    app.auth("session", AuthBinding::cookie("session", session_ok).with_redirect("/login"))?;

    app.add_route(RouteSpec::new("/", index).name("index"))?;
    app.add_route(RouteSpec::new("/user/<id:int>", show_user).name("user"))?;
    app.add_route(RouteSpec::new("/echo", echo).name("echo").methods(["post"]))?;
    app.add_route(RouteSpec::new("/search", search).name("search").params(search_schema()?.as_params()))?;
    app.add_route(RouteSpec::new("/admin", admin).name("admin").auth_name("session"))?;

    let blog = Router::new("blog").route(RouteSpec::new("/<slug>", blog_post).name("post"))?;
    app.mount("/blog", blog)?;

    app.before_handler(|ctx| {
        let id = ctx.request_id().to_string();
        ctx.set_header(REQUEST_ID_HEADER, &id);
        None
    })?;
    app.error_handler(404u16, |_ctx, _cause| {
        Some(ReturnValue::with_status(404, json!({ "message": "not here" })))
    })?;
    app.on_ready(|dispatcher| {
        info!(routes = dispatcher.routes().len(), "Demo application ready");
    })?;

    Ok(app)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RuntimeConfig::load(cli.config.as_deref(), &[])?;
    init_logging(&config.log)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_cli(cli, config, build_demo, &mut out)
}
