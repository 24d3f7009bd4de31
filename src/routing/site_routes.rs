//! The site's path template table.
//!
//! Builds the [`PathRouter`] used for title interpolation from the `[paths]`
//! config section. Registration order, and so match priority:
//!
//! 1. `article_path_with_action` (`$title` → `$1`, `$action` → `$2`)
//! 2. `article_path`
//! 3. `action_paths`, one template per action
//! 4. `extra_router_paths`, in config order
//! 5. `variant_article_path`

use crate::config::schema::PathsConfig;
use crate::error::RouteError;
use crate::routing::matcher::{validate_route, PathRouter};
use crate::routing::template::Constraint;

/// Compile the site's routes. Any invalid template fails the whole build.
pub fn build_site_router(paths: &PathsConfig) -> Result<PathRouter, RouteError> {
    let mut router = PathRouter::new();

    if let Some(route) = paths.article_path_with_action.as_deref().filter(|r| !r.is_empty()) {
        let route = route.replace("$title", "$1").replace("$action", "$2");
        router.add(
            &route,
            [("title", "$1"), ("action", "$2")],
            [("$2", Constraint::one_of(paths.valid_actions.iter().cloned()))],
        )?;
    }

    if !paths.article_path.is_empty() {
        validate_route(&paths.article_path, "article_path")?;
        router.add(&paths.article_path, no_params(), no_constraints())?;
    }

    if !paths.action_paths.is_empty() {
        router.add_keyed(
            paths.action_paths.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            &[("action", "$key")],
        )?;
    }

    for extra in &paths.extra_router_paths {
        let mut constraints: Vec<(String, Constraint)> = extra
            .one_of
            .iter()
            .map(|(name, values)| (name.clone(), Constraint::one_of(values.iter().cloned())))
            .collect();
        for (name, expr) in &extra.patterns {
            constraints.push((name.clone(), Constraint::pattern(name, expr)?));
        }
        router.add(&extra.template, extra.params.clone(), constraints)?;
    }

    if let Some(route) = paths.variant_article_path.as_deref().filter(|r| !r.is_empty()) {
        validate_route(route, "variant_article_path")?;
        router.add(
            route,
            [("variant", "$2")],
            [("$2", Constraint::one_of(paths.variants.iter().cloned()))],
        )?;
    }

    tracing::debug!(templates = router.len(), "Site routes compiled");
    Ok(router)
}

fn no_params() -> Vec<(String, String)> {
    Vec::new()
}

fn no_constraints() -> Vec<(String, Constraint)> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ExtraRouteConfig;
    use crate::routing::matcher::RouteMatch;

    fn paths() -> PathsConfig {
        let mut paths = PathsConfig {
            article_path_with_action: Some("/wiki/$action/$title".into()),
            variant_article_path: Some("/$2/$1".into()),
            variants: vec!["zh-hans".into(), "zh-hant".into()],
            ..PathsConfig::default()
        };
        paths.action_paths.insert("edit".into(), "/edit/$1".into());
        paths.extra_router_paths.push(ExtraRouteConfig {
            template: "/rev/$id".into(),
            params: [("oldid".to_string(), "$id".to_string())].into_iter().collect(),
            patterns: [("id".to_string(), "[0-9]+".to_string())].into_iter().collect(),
            ..ExtraRouteConfig::default()
        });
        paths
    }

    #[test]
    fn test_default_layout() {
        let router = build_site_router(&PathsConfig::default()).unwrap();
        assert_eq!(router.len(), 1);
        assert_eq!(router.parse("/wiki/Main_Page").get("title"), Some("Main_Page"));
        assert_eq!(router.parse("/"), RouteMatch::Empty);
    }

    #[test]
    fn test_article_path_with_action() {
        let router = build_site_router(&paths()).unwrap();
        let m = router.parse("/wiki/history/Foo");
        assert_eq!(m.get("title"), Some("Foo"));
        assert_eq!(m.get("action"), Some("history"));

        // Unknown action falls through to the plain article path.
        let m = router.parse("/wiki/bogus/Foo");
        assert_eq!(m.get("title"), Some("bogus/Foo"));
        assert_eq!(m.get("action"), None);
    }

    #[test]
    fn test_action_and_extra_routes() {
        let router = build_site_router(&paths()).unwrap();
        let m = router.parse("/edit/Foo_Bar");
        assert_eq!(m.get("action"), Some("edit"));
        assert_eq!(m.get("title"), Some("Foo_Bar"));

        assert_eq!(router.parse("/rev/123").get("oldid"), Some("123"));
        assert_eq!(router.parse("/rev/abc").get("oldid"), None);
    }

    #[test]
    fn test_variant_path() {
        let router = build_site_router(&paths()).unwrap();
        let m = router.parse("/zh-hant/Foo");
        assert_eq!(m.get("variant"), Some("zh-hant"));
        assert_eq!(m.get("title"), Some("Foo"));
        assert_eq!(router.parse("/en/Foo"), RouteMatch::NoMatch);
    }

    #[test]
    fn test_invalid_article_path() {
        let paths = PathsConfig {
            article_path: "/wiki/".into(),
            ..PathsConfig::default()
        };
        assert!(matches!(
            build_site_router(&paths),
            Err(RouteError::MissingTitlePlaceholder { .. })
        ));
    }
}
