use super::core::{join_name, join_path};
use super::{Method, RouteSpec, Router};
use crate::dispatcher::{DispatchContext, HandlerResult};
use crate::error::RouterError;

fn noop(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
    Ok("".into())
}

#[test]
fn test_join_root_path() {
    assert_eq!(join_path(&[], "/"), "/");
    assert_eq!(join_path(&[], "/index"), "/index");
    assert_eq!(join_path(&["first"], "/first_index"), "/first/first_index");
}

#[test]
fn test_join_keeps_inner_slashes() {
    assert_eq!(join_path(&["first"], "first_about/"), "/first/first_about/");
    assert_eq!(join_path(&["first"], "//first_privacy/"), "/first//first_privacy/");
    assert_eq!(join_path(&["first", "second"], "/x"), "/first/second/x");
}

#[test]
fn test_join_name_skips_empty() {
    assert_eq!(join_name(&["first", "second"], "leaf"), "first:second:leaf");
    assert_eq!(join_name(&["", "second"], "leaf"), "second:leaf");
    assert_eq!(join_name(&[], "leaf"), "leaf");
}

#[test]
fn test_root_name_not_prefixed() {
    let mut root = Router::new("root");
    root.add_route(RouteSpec::new("/", noop).name("index")).unwrap();
    root.build().unwrap();
    assert!(root.find_by_name("index").is_some());
    assert!(root.find_by_name("root:index").is_none());
}

#[test]
fn test_remount_replaces_child() {
    let mut a = Router::new("a");
    a.add_route(RouteSpec::new("/x", noop)).unwrap();
    let mut b = Router::new("b");
    b.add_route(RouteSpec::new("/y", noop)).unwrap();

    let mut root = Router::new("");
    root.mount("/p", a);
    root.mount("p/", b);
    root.build().unwrap();
    assert_eq!(root.routes().len(), 1);
    assert_eq!(root.routes()[0].raw_path(), "/p/y");
}

#[test]
fn test_child_collision_detected_on_build() {
    let mut child = Router::new("c");
    child.add_route(RouteSpec::new("/x", noop)).unwrap();
    let mut root = Router::new("");
    root.add_route(RouteSpec::new("/c/x", noop)).unwrap();
    root.mount("c", child);
    let err = root.build().unwrap_err();
    assert!(matches!(err, RouterError::DuplicateRoute { method: Method::Get, .. }));
    assert!(root.routes().is_empty());
}
