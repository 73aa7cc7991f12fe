use payloadscope::routes::{expand, normalize, RouteComputer, RouteOptions};

const CONTROLLER_ACTION: &str = "#^/(?:(?P<controller>[^/]+))/(?:(?P<action>[^/]+))[/]*$#";

#[test]
fn test_controller_action_route_keeps_only_known_pairs() {
    let options = RouteOptions::new()
        .with_values("controller", &["Users"])
        .with_actions(&[("Users", &["login"])]);
    let computer = RouteComputer::new(options);

    assert_eq!(computer.parse_all(&[CONTROLLER_ACTION]), vec!["/Users/login/".to_string()]);
}

#[test]
fn test_patterns_are_merged_and_deduplicated() {
    let options = RouteOptions::new()
        .with_values("controller", &["Users", "Posts"])
        .with_actions(&[("Users", &["login", "logout"]), ("Posts", &["index", "view"])]);
    let computer = RouteComputer::new(options);

    let paths = computer.parse_all(&[CONTROLLER_ACTION, CONTROLLER_ACTION, "#^/events[/]*$#"]);
    assert_eq!(paths, vec!["/Posts/index/", "/Posts/view/", "/Users/login/", "/Users/logout/"]);
}

#[test]
fn test_literal_route_outside_controller_map_is_pruned() {
    let options = RouteOptions::new()
        .with_values("controller", &["Users"])
        .with_actions(&[("Users", &["login"])]);
    let computer = RouteComputer::new(options);

    assert!(computer.parse_all(&["#^/events[/]*$#"]).is_empty());
    assert_eq!(computer.parse_all(&["#^/Users/login[/]*$#"]), vec!["/Users/login/"]);
}

#[test]
fn test_normalize_then_expand_without_options() {
    assert_eq!(expand(&normalize("#^/*$#"), &RouteOptions::new()), vec!["/".to_string()]);
    assert!(expand(&normalize("#^/(?:(?P<controller>[^/]+))[/]*$#"), &RouteOptions::new()).is_empty());
}
