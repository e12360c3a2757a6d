//! Static route table mapping inbound path prefixes to destination services.
//!
//! Rules are fixed at startup and matched by longest prefix, so the
//! special-cased item sub-resources (`/api/items/search`,
//! `/api/items/categories`) win over the generic `/api/items` rule.

use thiserror::Error;

/// Errors raised while building the route table. A malformed table is a
/// startup failure, never a per-request one.
#[derive(Error, Debug)]
pub enum RouteTableError {
    #[error("route rule has an empty path prefix")]
    EmptyPrefix,
    #[error("duplicate route prefix: {0}")]
    DuplicatePrefix(String),
}

/// A single routing rule: requests whose path starts with `prefix` are
/// relayed to `service`, with the prefix replaced by `local_prefix`.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub prefix: String,
    pub service: String,
    pub local_prefix: String,
}

impl RouteRule {
    pub fn new(
        prefix: impl Into<String>,
        service: impl Into<String>,
        local_prefix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
            local_prefix: local_prefix.into(),
        }
    }

    /// Rewrite an inbound path to the destination's local path. The caller
    /// is responsible for carrying the query string over.
    pub fn rewrite(&self, path: &str) -> String {
        let remainder = path.strip_prefix(&self.prefix).unwrap_or("");
        format!("{}{}", self.local_prefix, remainder)
    }
}

/// Read-only route table, built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RouteTableError> {
        for (i, rule) in rules.iter().enumerate() {
            if rule.prefix.is_empty() {
                return Err(RouteTableError::EmptyPrefix);
            }
            if rules[..i].iter().any(|other| other.prefix == rule.prefix) {
                return Err(RouteTableError::DuplicatePrefix(rule.prefix.clone()));
            }
        }
        Ok(Self { rules })
    }

    /// The table used by the gateway: the pantry services behind `/api/*`.
    pub fn standard() -> Self {
        let rules = vec![
            RouteRule::new("/api/items/search", "item-service", "/search"),
            RouteRule::new("/api/items/categories", "item-service", "/categories"),
            RouteRule::new("/api/items", "item-service", "/items"),
            RouteRule::new("/api/auth", "user-service", "/auth"),
            RouteRule::new("/api/users", "user-service", "/users"),
            RouteRule::new("/api/lists", "list-service", "/lists"),
        ];
        Self::new(rules).expect("standard route table is well formed")
    }

    /// Longest-prefix match to find the rule for an incoming path. A
    /// prefix only matches at a segment boundary, so `/api/itemsXYZ` does
    /// not hit the `/api/items` rule.
    pub fn resolve(&self, path: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|rule| {
                path.strip_prefix(&rule.prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .max_by_key(|rule| rule.prefix.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_generic_item_paths() {
        let table = RouteTable::standard();
        let rule = table.resolve("/api/items/42").unwrap();
        assert_eq!(rule.service, "item-service");
        assert_eq!(rule.rewrite("/api/items/42"), "/items/42");
    }

    #[test]
    fn item_sub_resources_win_over_generic_rule() {
        let table = RouteTable::standard();

        let rule = table.resolve("/api/items/search").unwrap();
        assert_eq!(rule.service, "item-service");
        assert_eq!(rule.rewrite("/api/items/search"), "/search");

        let rule = table.resolve("/api/items/categories").unwrap();
        assert_eq!(rule.rewrite("/api/items/categories"), "/categories");
    }

    #[test]
    fn auth_and_users_route_to_user_service() {
        let table = RouteTable::standard();

        let rule = table.resolve("/api/auth/login").unwrap();
        assert_eq!(rule.service, "user-service");
        assert_eq!(rule.rewrite("/api/auth/login"), "/auth/login");

        let rule = table.resolve("/api/users/7").unwrap();
        assert_eq!(rule.service, "user-service");
        assert_eq!(rule.rewrite("/api/users/7"), "/users/7");
    }

    #[test]
    fn lists_route_to_list_service() {
        let table = RouteTable::standard();
        let rule = table.resolve("/api/lists/3/items").unwrap();
        assert_eq!(rule.service, "list-service");
        assert_eq!(rule.rewrite("/api/lists/3/items"), "/lists/3/items");
    }

    #[test]
    fn unmatched_paths_resolve_to_none() {
        let table = RouteTable::standard();
        assert!(table.resolve("/api/unknown").is_none());
        assert!(table.resolve("/health").is_none());
    }

    #[test]
    fn prefix_match_stops_at_segment_boundaries() {
        let table = RouteTable::standard();

        assert!(table.resolve("/api/itemsXYZ").is_none());
        assert!(table.resolve("/api/listsfoo").is_none());

        // Exact prefix and boundary-separated remainders still match.
        assert_eq!(table.resolve("/api/items").unwrap().service, "item-service");
        assert_eq!(
            table.resolve("/api/items/42").unwrap().service,
            "item-service"
        );
        // A bare word after the search prefix falls back to the generic
        // item rule rather than the search rule.
        let rule = table.resolve("/api/items/searchXYZ").unwrap();
        assert_eq!(rule.rewrite("/api/items/searchXYZ"), "/items/searchXYZ");
    }

    #[test]
    fn rejects_duplicate_prefixes() {
        let rules = vec![
            RouteRule::new("/api/items", "item-service", "/items"),
            RouteRule::new("/api/items", "item-service", "/items"),
        ];
        assert!(matches!(
            RouteTable::new(rules),
            Err(RouteTableError::DuplicatePrefix(_))
        ));
    }

    #[test]
    fn rejects_empty_prefix() {
        let rules = vec![RouteRule::new("", "item-service", "/items")];
        assert!(matches!(
            RouteTable::new(rules),
            Err(RouteTableError::EmptyPrefix)
        ));
    }
}
