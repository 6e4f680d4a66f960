//! Property-based tests using `proptest` for user predicates and route
//! patterns.

use better_auth_bridge::core::path_matches;
use better_auth_bridge::{
    AccessDecision, AuthUser, Redirects, RouteAuth, RouteRules, UserMatch, matches_user,
};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn record() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,6}", scalar(), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,6}"
}

// ---------------------------------------------------------------------------
// User predicates
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn empty_predicate_always_matches(user in record()) {
        prop_assert!(matches_user(&user, &UserMatch::new()));
    }

    #[test]
    fn missing_field_never_matches(user in record(), value in scalar()) {
        // Keys of `record()` never contain digits.
        let predicate = UserMatch::new().field("field9", value);
        prop_assert!(!matches_user(&user, &predicate));
    }

    #[test]
    fn scalar_match_is_equality(user in record(), key in "[a-z]{1,6}", value in scalar()) {
        let predicate = UserMatch::new().field(key.clone(), value.clone());
        let expected = user.get(&key) == Some(&value);
        prop_assert_eq!(matches_user(&user, &predicate), expected);
    }

    #[test]
    fn set_match_is_membership(
        user in record(),
        key in "[a-z]{1,6}",
        values in prop::collection::vec(scalar(), 0..4),
    ) {
        let predicate = UserMatch::new().any_of(key.clone(), values.clone());
        let expected = user.get(&key).is_some_and(|actual| values.contains(actual));
        prop_assert_eq!(matches_user(&user, &predicate), expected);
    }

    #[test]
    fn fields_are_conjunctive(
        user in record(),
        first in ("[a-z]{1,6}", scalar()),
        second in ("[a-z]{1,6}", scalar()),
    ) {
        prop_assume!(first.0 != second.0);
        let both = UserMatch::new()
            .field(first.0.clone(), first.1.clone())
            .field(second.0.clone(), second.1.clone());
        let each = matches_user(&user, &UserMatch::new().field(first.0, first.1))
            && matches_user(&user, &UserMatch::new().field(second.0, second.1));
        prop_assert_eq!(matches_user(&user, &both), each);
    }

    #[test]
    fn own_fields_always_match(user in record()) {
        let predicate = user
            .iter()
            .fold(UserMatch::new(), |p, (k, v)| p.field(k.clone(), v.clone()));
        prop_assert!(matches_user(&user, &predicate));
    }

    #[test]
    fn auth_user_matches_like_its_fields(id in "[a-z0-9]{1,8}", fields in record(), key in "[a-z]{1,6}", value in scalar()) {
        prop_assume!(!fields.contains_key("id") && key != "id");
        let mut user = AuthUser::new(id.clone());
        user.merge(fields.clone());
        let predicate = UserMatch::new().field(key.clone(), value.clone());
        prop_assert_eq!(predicate.matches(&user), matches_user(&fields, &predicate));
        prop_assert!(UserMatch::new().field("id", id).matches(&user));
    }
}

// ---------------------------------------------------------------------------
// Route patterns
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn exact_pattern_matches_itself(segments in prop::collection::vec(segment(), 0..5)) {
        let path = format!("/{}", segments.join("/"));
        prop_assert!(path_matches(&path, &path));
    }

    #[test]
    fn double_star_covers_every_suffix(
        prefix in prop::collection::vec(segment(), 1..3),
        suffix in prop::collection::vec(segment(), 0..4),
    ) {
        let base = format!("/{}", prefix.join("/"));
        let path = if suffix.is_empty() {
            base.clone()
        } else {
            format!("{base}/{}", suffix.join("/"))
        };
        let pattern = format!("{base}/**");
        prop_assert!(path_matches(&pattern, &path));
    }

    #[test]
    fn query_string_is_ignored(segments in prop::collection::vec(segment(), 1..4), query in "[a-z]{1,5}=[a-z0-9]{0,5}") {
        let path = format!("/{}", segments.join("/"));
        let with_query = format!("{path}?{query}");
        prop_assert!(path_matches(&path, &with_query));
    }

    #[test]
    fn anonymous_page_visits_to_user_routes_redirect_to_login(segments in prop::collection::vec(segment(), 1..4)) {
        prop_assume!(segments[0] != "api");
        let path = format!("/{}", segments.join("/"));
        let rules = RouteRules::new().rule("/**", RouteAuth::User);
        match rules.check(&path, None, &Redirects::default()) {
            AccessDecision::Redirect(location) => {
                prop_assert!(location.starts_with("/login?redirect="));
            }
            other => prop_assert!(false, "unexpected decision {:?}", other),
        }
    }
}
