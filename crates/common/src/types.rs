//! Core wire types for the simulated pizza service API

use serde::{Deserialize, Serialize};

/// Identifier that may arrive as a JSON string or number.
///
/// The real service is loose about this: user ids are numbers, franchise
/// and store ids are strings, and clients sometimes send either. Echoing
/// back exactly what came in keeps responses faithful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Str(String),
}

impl Id {
    /// Compare against a path segment, ignoring the JSON representation.
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Id::Num(n) => segment.parse::<i64>().map(|v| v == *n).unwrap_or(false),
            Id::Str(s) => s == segment,
        }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Num(n) => write!(f, "{}", n),
            Id::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Num(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Str(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::Str(s)
    }
}

/// Role held by a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Diner,
    Franchisee,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Self::Diner
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Diner => write!(f, "diner"),
            Role::Franchisee => write!(f, "franchisee"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// A role assignment, optionally scoped to an object such as a franchise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(
        rename = "objectId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub object_id: Option<Id>,
}

impl RoleAssignment {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            object_id: None,
        }
    }

    pub fn scoped(role: Role, object_id: impl Into<Id>) -> Self {
        Self {
            role,
            object_id: Some(object_id.into()),
        }
    }
}

/// A user account.
///
/// The password is accepted on login and registration bodies but is never
/// serialized back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
}

impl User {
    pub fn new(id: i64, name: &str, email: &str, password: &str, roles: Vec<RoleAssignment>) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            roles,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.role == Role::Admin)
    }
}

/// Reference to a user who administers a franchise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FranchiseAdmin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

/// A store belonging to a franchise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: Id,
    pub name: String,
    #[serde(
        rename = "totalRevenue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_revenue: Option<f64>,
}

/// A franchise with its stores and administrators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Franchise {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<FranchiseAdmin>,
    #[serde(default)]
    pub stores: Vec<Store>,
}

/// An item on the pizza menu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Id,
    pub title: String,
    pub image: String,
    pub price: f64,
    pub description: String,
}

/// One line of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "menuId")]
    pub menu_id: Id,
    pub description: String,
    pub price: f64,
}

/// A submitted order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "franchiseId")]
    pub franchise_id: Id,
    #[serde(rename = "storeId")]
    pub store_id: Id,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<chrono::DateTime<chrono::Utc>>,
}
