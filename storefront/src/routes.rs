use serde::Deserialize;
use url::Url;

/// Relative endpoint paths of the cart API. Storefronts occasionally remap
/// these, so they are configurable, with the stock paths as defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutePaths {
    pub cart: String,
    pub add: String,
    pub change: String,
    pub update: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        RoutePaths {
            cart: "/cart".to_string(),
            add: "/cart/add.js".to_string(),
            change: "/cart/change.js".to_string(),
            update: "/cart/update.js".to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RouteError {
    #[error("invalid endpoint path {path:?}: {source}")]
    InvalidPath {
        path: String,
        source: url::ParseError,
    },
}

/// Cart API endpoints resolved against the storefront origin.
#[derive(Clone, Debug)]
pub struct Routes {
    cart: Url,
    add: Url,
    change: Url,
    update: Url,
}

impl Routes {
    pub fn resolve(base: &Url, paths: &RoutePaths) -> Result<Self, RouteError> {
        Ok(Routes {
            cart: join(base, &paths.cart)?,
            add: join(base, &paths.add)?,
            change: join(base, &paths.change)?,
            update: join(base, &paths.update)?,
        })
    }

    /// Cart page URL, also the endpoint serving section fragments.
    pub fn cart(&self) -> &Url {
        &self.cart
    }

    pub fn add(&self) -> &Url {
        &self.add
    }

    pub fn change(&self) -> &Url {
        &self.change
    }

    pub fn update(&self) -> &Url {
        &self.update
    }
}

fn join(base: &Url, path: &str) -> Result<Url, RouteError> {
    base.join(path).map_err(|source| RouteError::InvalidPath {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_resolve_against_origin() {
        let base = Url::parse("https://shop.example.com").unwrap();
        let routes = Routes::resolve(&base, &RoutePaths::default()).unwrap();
        assert_eq!(routes.cart().as_str(), "https://shop.example.com/cart");
        assert_eq!(routes.add().as_str(), "https://shop.example.com/cart/add.js");
        assert_eq!(
            routes.change().as_str(),
            "https://shop.example.com/cart/change.js"
        );
        assert_eq!(
            routes.update().as_str(),
            "https://shop.example.com/cart/update.js"
        );
    }

    #[test]
    fn test_root_relative_paths_ignore_base_path() {
        let base = Url::parse("https://shop.example.com/en-gb/").unwrap();
        let paths = RoutePaths {
            cart: "/panier".to_string(),
            ..RoutePaths::default()
        };
        let routes = Routes::resolve(&base, &paths).unwrap();
        assert_eq!(routes.cart().as_str(), "https://shop.example.com/panier");
    }
}
