//! Route table and the authentication guard in front of it.

use std::fmt;

use tracing::debug;

use crate::session::Session;

/// Receives every navigation decided by the client.
pub trait Navigator: fmt::Debug {
    fn push(&mut self, path: &str);
    fn current(&self) -> Option<&str>;
}

/// In-memory navigation history.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl Navigator for History {
    fn push(&mut self, path: &str) {
        self.entries.push(path.to_string());
    }

    fn current(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub path: &'static str,
    pub requires_auth: bool,
}

impl Route {
    pub const fn new(name: &'static str, path: &'static str, requires_auth: bool) -> Self {
        Self {
            name,
            path,
            requires_auth,
        }
    }
}

/// Views of the back-office and the shop.
pub const ROUTES: &[Route] = &[
    Route::new("Home", "/", false),
    Route::new("Login", "/login", false),
    Route::new("Profile", "/profile", true),
    Route::new("Dashboard", "/dashboard", true),
    Route::new("Basket", "/basket", true),
    Route::new("RecipeManagement", "/recipe-management", true),
    Route::new("IngredientManagement", "/ingredient-management", true),
    Route::new("CocktailManagement", "/cocktail-management", true),
    Route::new("CategoryManagement", "/category-management", true),
    Route::new("OrderManagement", "/order-management", true),
];

/// Result of a guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The target was entered.
    Entered(Route),
    /// The target needs a session; the user was sent to the login view and the
    /// target was recorded as the return path.
    RedirectedToLogin { requested: String },
    /// No route matches the path.
    NotFound,
}

#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Finds the route for a path. Query strings and fragments are ignored.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        self.routes.iter().find(|r| r.path == path)
    }

    pub fn by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Enters `path` if the session allows it.
    pub fn navigate(&self, session: &mut Session, path: &str) -> Navigation {
        let Some(route) = self.resolve(path).cloned() else {
            debug!(path, "no route");
            return Navigation::NotFound;
        };

        if route.requires_auth && !session.is_authenticated() {
            debug!(path, "guarded route, redirecting to login");
            session.set_return_url(path);
            let login = session.login_path().to_string();
            session.navigate(&login);
            return Navigation::RedirectedToLogin {
                requested: path.to_string(),
            };
        }

        session.navigate(path);
        Navigation::Entered(route)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(ROUTES.to_vec())
    }
}
