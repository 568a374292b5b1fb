//! Seed data a test configures before its first request

use std::path::Path;

use serde::{Deserialize, Serialize};

use pizzasim_common::{Error, Franchise, MenuItem, Order, Result, Role, RoleAssignment, User};

/// A deliberate one-shot failure armed for a single matching call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureScript {
    /// HTTP method the failure applies to, e.g. "POST"
    pub method: String,
    /// Path fragment the failure applies to, e.g. "/api/order"
    pub path: String,
    pub status: u16,
    pub message: String,
}

impl FailureScript {
    pub fn new(method: &str, path: &str, status: u16, message: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            status,
            message: message.to_string(),
        }
    }

    /// The failure the payment tests script most often.
    pub fn order_failure() -> Self {
        Self::new("POST", "/api/order", 500, "order failed")
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && path.contains(&self.path)
    }
}

/// Initial state for one simulator instance.
///
/// Every field has a sensible default so a test only declares its deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedState {
    /// The identity `GET .../user/me` reports. Defaults to the
    /// distinguished admin identity when absent.
    #[serde(default)]
    pub session_user: Option<User>,
    /// Accounts visible to the admin user listing.
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub franchises: Vec<Franchise>,
    #[serde(default = "SeedState::default_menu")]
    pub menu: Vec<MenuItem>,
    /// Orders already on record when the test starts.
    #[serde(default)]
    pub orders: Vec<Order>,
    /// Slice size for paged listings.
    #[serde(default = "SeedState::default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub failure: Option<FailureScript>,
}

impl Default for SeedState {
    fn default() -> Self {
        Self {
            session_user: None,
            users: Vec::new(),
            franchises: Vec::new(),
            menu: Self::default_menu(),
            orders: Vec::new(),
            page_size: Self::default_page_size(),
            failure: None,
        }
    }
}

impl SeedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity used when no per-test session user is seeded.
    pub fn default_admin() -> User {
        User::new(
            1,
            "admin",
            "a@jwt.com",
            "admin",
            vec![RoleAssignment::new(Role::Admin)],
        )
    }

    fn default_page_size() -> usize {
        10
    }

    fn default_menu() -> Vec<MenuItem> {
        vec![
            MenuItem {
                id: "1".into(),
                title: "Veggie".to_string(),
                image: "pizza1.png".to_string(),
                price: 0.05,
                description: "A garden of delight".to_string(),
            },
            MenuItem {
                id: "2".into(),
                title: "Pepperoni".to_string(),
                image: "pizza2.png".to_string(),
                price: 0.07,
                description: "Spicy treat".to_string(),
            },
        ]
    }

    pub fn with_session_user(mut self, user: User) -> Self {
        self.session_user = Some(user);
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    pub fn with_franchises(mut self, franchises: Vec<Franchise>) -> Self {
        self.franchises = franchises;
        self
    }

    pub fn with_menu(mut self, menu: Vec<MenuItem>) -> Self {
        self.menu = menu;
        self
    }

    pub fn with_orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_failure(mut self, failure: FailureScript) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Load seed data from a JSON file, for standalone simulator runs.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let seed: SeedState = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidSeed(format!("{}: {}", path.as_ref().display(), e)))?;
        if seed.page_size == 0 {
            return Err(Error::InvalidSeed("page_size must be at least 1".to_string()));
        }
        Ok(seed)
    }
}
