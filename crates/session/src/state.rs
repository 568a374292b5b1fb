//! Per-test mutable session store

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use pizzasim_common::{Franchise, FranchiseAdmin, Id, MenuItem, Order, Store, User};

use crate::seed::{FailureScript, SeedState};

/// Mutable state for one simulator instance.
///
/// One instance per test. The lock exists because the HTTP surface needs
/// `Send + Sync` handlers; the test's own sequential script is the only
/// writer, so it is never contended.
pub struct SessionState {
    inner: RwLock<Inner>,
}

struct Inner {
    session_user: User,
    users: Vec<User>,
    franchises: Vec<Franchise>,
    menu: Vec<MenuItem>,
    orders: Vec<Order>,
    deliveries: Vec<(String, Id)>,
    token: String,
    page_size: usize,
    failure: Option<FailureScript>,
    next_user_id: i64,
    next_object_id: i64,
}

fn numeric_id(id: &Id) -> Option<i64> {
    match id {
        Id::Num(n) => Some(*n),
        Id::Str(s) => s.parse().ok(),
    }
}

fn fresh_token() -> String {
    Uuid::new_v4().to_string()
}

// JWT-shaped so UIs render it the way they render the real service's token.
fn delivery_token() -> String {
    format!("eyJ{}", Uuid::new_v4().simple())
}

impl SessionState {
    /// Build the per-test state from seed data and mint the initial token.
    pub fn install(seed: SeedState) -> Self {
        let session_user = seed.session_user.unwrap_or_else(SeedState::default_admin);

        let next_user_id = seed
            .users
            .iter()
            .map(|u| u.id)
            .chain(std::iter::once(session_user.id))
            .max()
            .unwrap_or(0)
            + 1;

        let next_object_id = seed
            .franchises
            .iter()
            .flat_map(|f| {
                std::iter::once(numeric_id(&f.id))
                    .chain(f.stores.iter().map(|s| numeric_id(&s.id)))
            })
            .chain(seed.orders.iter().map(|o| o.id.as_ref().and_then(numeric_id)))
            .flatten()
            .max()
            .unwrap_or(0)
            + 1;

        let token = fresh_token();
        debug!(page_size = seed.page_size, "installed session state");

        Self {
            inner: RwLock::new(Inner {
                session_user,
                users: seed.users,
                franchises: seed.franchises,
                menu: seed.menu,
                orders: seed.orders,
                deliveries: Vec::new(),
                token,
                page_size: seed.page_size.max(1),
                failure: seed.failure,
                next_user_id,
                next_object_id,
            }),
        }
    }

    // ===== Session identity =====

    pub fn session_user(&self) -> User {
        self.inner.read().session_user.clone()
    }

    pub fn token(&self) -> String {
        self.inner.read().token.clone()
    }

    pub fn page_size(&self) -> usize {
        self.inner.read().page_size
    }

    /// Validate credentials against the session user. A match rotates the
    /// token; a mismatch leaves it untouched.
    pub fn login(&self, email: &str, password: &str) -> Option<(User, String)> {
        let mut inner = self.inner.write();
        if inner.session_user.email == email && inner.session_user.password == password {
            inner.token = fresh_token();
            debug!(email, "login accepted");
            Some((inner.session_user.clone(), inner.token.clone()))
        } else {
            debug!(email, "login rejected");
            None
        }
    }

    /// Fabricate a new diner account, append it to the users list, and make
    /// it the session owner.
    pub fn register(&self, name: &str, email: &str, password: &str) -> (User, String) {
        let mut inner = self.inner.write();
        let id = inner.next_user_id;
        inner.next_user_id += 1;

        let user = User::new(
            id,
            name,
            email,
            password,
            vec![pizzasim_common::RoleAssignment::new(pizzasim_common::Role::Diner)],
        );
        inner.users.push(user.clone());
        inner.session_user = user.clone();
        inner.token = fresh_token();
        debug!(id, email, "registered user");
        (user, inner.token.clone())
    }

    /// Merge a partial profile update into the session user. Roles are
    /// never touched; email and password changes stick for later logins.
    pub fn update_profile(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> (User, String) {
        let mut inner = self.inner.write();
        if let Some(name) = name {
            inner.session_user.name = name.to_string();
        }
        if let Some(email) = email {
            inner.session_user.email = email.to_string();
        }
        if let Some(password) = password {
            inner.session_user.password = password.to_string();
        }

        let updated = inner.session_user.clone();
        if let Some(listed) = inner.users.iter_mut().find(|u| u.id == updated.id) {
            *listed = updated.clone();
        }
        inner.token = fresh_token();
        debug!(id = updated.id, "updated profile");
        (updated, inner.token.clone())
    }

    // ===== Users =====

    /// Case-sensitive substring filter on display name, then page slicing.
    pub fn list_users(&self, filter: Option<&str>, page: usize) -> (Vec<User>, bool) {
        let inner = self.inner.read();
        let filtered: Vec<User> = match filter {
            Some(fragment) if !fragment.is_empty() => inner
                .users
                .iter()
                .filter(|u| u.name.contains(fragment))
                .cloned()
                .collect(),
            _ => inner.users.clone(),
        };
        slice_page(&filtered, page, inner.page_size)
    }

    /// Remove by id. Unknown ids are a no-op.
    pub fn delete_user(&self, id_segment: &str) {
        let Ok(id) = id_segment.parse::<i64>() else {
            return;
        };
        let mut inner = self.inner.write();
        inner.users.retain(|u| u.id != id);
        debug!(id, "deleted user");
    }

    // ===== Franchises and stores =====

    pub fn list_franchises(&self, page: usize) -> (Vec<Franchise>, bool) {
        let inner = self.inner.read();
        slice_page(&inner.franchises, page, inner.page_size)
    }

    /// Franchises administered by the given user, for the franchisee view.
    pub fn franchises_for_user(&self, id_segment: &str) -> Vec<Franchise> {
        let inner = self.inner.read();
        let uid: Option<i64> = id_segment.parse().ok();
        let email = uid.and_then(|id| {
            if inner.session_user.id == id {
                Some(inner.session_user.email.clone())
            } else {
                inner.users.iter().find(|u| u.id == id).map(|u| u.email.clone())
            }
        });

        inner
            .franchises
            .iter()
            .filter(|f| {
                f.admins.iter().any(|a| {
                    (a.id.is_some() && a.id == uid)
                        || email.as_deref() == Some(a.email.as_str())
                })
            })
            .cloned()
            .collect()
    }

    /// New franchises go to the front of the list, so the very next listing
    /// shows them on page one.
    pub fn create_franchise(&self, name: &str, admins: Vec<FranchiseAdmin>) -> Franchise {
        let mut inner = self.inner.write();
        let id = inner.next_object_id;
        inner.next_object_id += 1;

        let franchise = Franchise {
            id: Id::Str(id.to_string()),
            name: name.to_string(),
            admins,
            stores: Vec::new(),
        };
        inner.franchises.insert(0, franchise.clone());
        debug!(id, name, "created franchise");
        franchise
    }

    pub fn delete_franchise(&self, id_segment: &str) {
        let mut inner = self.inner.write();
        inner.franchises.retain(|f| !f.id.matches(id_segment));
        debug!(id = id_segment, "deleted franchise");
    }

    /// Append a store to the owning franchise. A missing franchise still
    /// yields a deterministic store record, just not one on file.
    pub fn create_store(&self, franchise_segment: &str, name: &str) -> Store {
        let mut inner = self.inner.write();
        let id = inner.next_object_id;
        inner.next_object_id += 1;

        let store = Store {
            id: Id::Str(id.to_string()),
            name: name.to_string(),
            total_revenue: None,
        };
        if let Some(franchise) = inner
            .franchises
            .iter_mut()
            .find(|f| f.id.matches(franchise_segment))
        {
            franchise.stores.push(store.clone());
        }
        debug!(franchise = franchise_segment, name, "created store");
        store
    }

    pub fn delete_store(&self, franchise_segment: &str, store_segment: &str) {
        let mut inner = self.inner.write();
        if let Some(franchise) = inner
            .franchises
            .iter_mut()
            .find(|f| f.id.matches(franchise_segment))
        {
            franchise.stores.retain(|s| !s.id.matches(store_segment));
        }
        debug!(
            franchise = franchise_segment,
            store = store_segment,
            "deleted store"
        );
    }

    // ===== Menu and orders =====

    pub fn menu(&self) -> Vec<MenuItem> {
        self.inner.read().menu.clone()
    }

    /// Every order on record, oldest first.
    pub fn orders(&self) -> Vec<Order> {
        self.inner.read().orders.clone()
    }

    /// Stamp id and timestamp onto a submitted order, record it, and mint a
    /// delivery-tracking token for later verification.
    pub fn submit_order(&self, mut order: Order) -> (Order, String) {
        let mut inner = self.inner.write();
        let id = inner.next_object_id;
        inner.next_object_id += 1;

        order.id = Some(Id::Str(id.to_string()));
        order.date = Some(chrono::Utc::now());

        let jwt = delivery_token();
        inner.orders.push(order.clone());
        if let Some(order_id) = &order.id {
            inner.deliveries.push((jwt.clone(), order_id.clone()));
        }
        debug!(id, "recorded order");
        (order, jwt)
    }

    /// Resolve a delivery token back to its order id. Falls back to the
    /// most recent order so hand-written tokens still verify.
    pub fn lookup_delivery(&self, jwt: &str) -> Option<Id> {
        let inner = self.inner.read();
        inner
            .deliveries
            .iter()
            .find(|(t, _)| t == jwt)
            .map(|(_, id)| id.clone())
            .or_else(|| inner.orders.last().and_then(|o| o.id.clone()))
    }

    // ===== Failure injection =====

    /// Consume the armed failure if it matches this call. At most one call
    /// per test ever sees it.
    pub fn take_failure(&self, method: &str, path: &str) -> Option<FailureScript> {
        let mut inner = self.inner.write();
        let armed = match &inner.failure {
            Some(f) => f.matches(method, path),
            None => false,
        };
        if armed {
            inner.failure.take()
        } else {
            None
        }
    }
}

/// 1-based page slicing. `more` reports whether a further slice exists.
fn slice_page<T: Clone>(items: &[T], page: usize, page_size: usize) -> (Vec<T>, bool) {
    let page = page.max(1);
    let start = (page - 1) * page_size;
    if start >= items.len() {
        return (Vec::new(), false);
    }
    let end = (start + page_size).min(items.len());
    (items[start..end].to_vec(), end < items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pizzasim_common::{Role, RoleAssignment};

    fn diner(id: i64, name: &str) -> User {
        User::new(
            id,
            name,
            &format!("{}@jwt.com", name.to_lowercase().replace(' ', ".")),
            "diner",
            vec![RoleAssignment::new(Role::Diner)],
        )
    }

    #[test]
    fn install_defaults_to_admin_identity() {
        let state = SessionState::install(SeedState::default());
        let user = state.session_user();
        assert_eq!(user.id, 1);
        assert!(user.is_admin());
        assert!(!state.token().is_empty());
    }

    #[test]
    fn every_mint_rotates_the_token() {
        let seed = SeedState::new().with_session_user(diner(5, "Pizza Diner"));
        let state = SessionState::install(seed);
        let t0 = state.token();

        let (_, t1) = state.login("pizza.diner@jwt.com", "diner").unwrap();
        assert_ne!(t0, t1);

        let (_, t2) = state.update_profile(Some("Pizza Eater"), None, None);
        assert_ne!(t1, t2);

        let (_, t3) = state.register("New User", "new@jwt.com", "pw");
        assert_ne!(t2, t3);
    }

    #[test]
    fn failed_login_leaves_the_token_alone() {
        let seed = SeedState::new().with_session_user(diner(5, "Pizza Diner"));
        let state = SessionState::install(seed);
        let before = state.token();
        assert!(state.login("pizza.diner@jwt.com", "wrong").is_none());
        assert_eq!(state.token(), before);
    }

    #[test]
    fn credential_changes_persist_across_logout_login() {
        let seed = SeedState::new().with_session_user(diner(5, "Pizza Diner"));
        let state = SessionState::install(seed);

        state.update_profile(None, Some("renamed@jwt.com"), Some("changed"));
        assert!(state.login("pizza.diner@jwt.com", "diner").is_none());
        assert!(state.login("renamed@jwt.com", "changed").is_some());
    }

    #[test]
    fn profile_update_preserves_role_assignments() {
        let mut user = diner(2, "Pizza Franchisee");
        user.roles = vec![RoleAssignment::scoped(Role::Franchisee, "2")];
        let state = SessionState::install(SeedState::new().with_session_user(user));

        let (updated, _) = state.update_profile(Some("Renamed"), None, None);
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.roles.len(), 1);
        assert_eq!(updated.roles[0].object_id, Some(Id::from("2")));
    }

    #[test]
    fn register_allocates_the_next_free_id() {
        let seed = SeedState::new().with_users(vec![diner(10, "Diner One"), diner(11, "Diner Two")]);
        let state = SessionState::install(seed);
        let (user, _) = state.register("New User", "new@jwt.com", "pw");
        assert_eq!(user.id, 12);

        let (users, _) = state.list_users(None, 1);
        assert!(users.iter().any(|u| u.id == 12));
        assert_eq!(state.session_user().id, 12);
    }

    #[test]
    fn user_filter_is_case_sensitive_containment() {
        let seed = SeedState::new().with_users(vec![diner(10, "Diner One"), diner(11, "Diner Two")]);
        let state = SessionState::install(seed);

        let (hit, _) = state.list_users(Some("Two"), 1);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "Diner Two");

        let (miss, _) = state.list_users(Some("two"), 1);
        assert!(miss.is_empty());

        let (all, _) = state.list_users(Some(""), 1);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn page_slicing_reports_more_correctly() {
        let users: Vec<User> = (1..=5).map(|i| diner(i, &format!("Diner {}", i))).collect();
        let state = SessionState::install(SeedState::new().with_users(users).with_page_size(2));

        let (page1, more1) = state.list_users(None, 1);
        assert_eq!(page1.len(), 2);
        assert!(more1);

        let (page3, more3) = state.list_users(None, 3);
        assert_eq!(page3.len(), 1);
        assert!(!more3);

        let (page4, more4) = state.list_users(None, 4);
        assert!(page4.is_empty());
        assert!(!more4);
    }

    #[test]
    fn deletes_are_idempotent() {
        let seed = SeedState::new().with_users(vec![diner(10, "Diner One")]);
        let state = SessionState::install(seed);

        state.delete_user("10");
        state.delete_user("10");
        state.delete_user("not-a-number");
        let (users, _) = state.list_users(None, 1);
        assert!(users.is_empty());
    }

    #[test]
    fn created_franchise_leads_the_list() {
        let state = SessionState::install(SeedState::default());
        state.create_franchise("pizzaPocket", vec![]);
        let second = state.create_franchise("pizzaPlanet", vec![]);

        let (franchises, _) = state.list_franchises(1);
        assert_eq!(franchises[0].name, "pizzaPlanet");
        assert_eq!(franchises[0].id, second.id);
    }

    #[test]
    fn store_lifecycle_within_a_franchise() {
        let state = SessionState::install(SeedState::default());
        let franchise = state.create_franchise("pizzaPocket", vec![]);
        let fid = franchise.id.to_string();

        let store = state.create_store(&fid, "SLC");
        let (franchises, _) = state.list_franchises(1);
        assert_eq!(franchises[0].stores.len(), 1);
        assert_eq!(franchises[0].stores[0].name, "SLC");

        state.delete_store(&fid, &store.id.to_string());
        let (franchises, _) = state.list_franchises(1);
        assert!(franchises[0].stores.is_empty());

        // Unknown franchise still answers deterministically.
        let orphan = state.create_store("999", "Nowhere");
        assert_eq!(orphan.name, "Nowhere");
    }

    #[test]
    fn franchisee_view_matches_by_admin_id_and_email() {
        let mut franchisee = diner(2, "Pizza Franchisee");
        franchisee.roles = vec![RoleAssignment::scoped(Role::Franchisee, "7")];
        let seed = SeedState::new()
            .with_session_user(franchisee)
            .with_franchises(vec![Franchise {
                id: "7".into(),
                name: "pizzaPocket".to_string(),
                admins: vec![FranchiseAdmin {
                    id: Some(2),
                    name: Some("Pizza Franchisee".to_string()),
                    email: "pizza.franchisee@jwt.com".to_string(),
                }],
                stores: Vec::new(),
            }]);
        let state = SessionState::install(seed);

        let mine = state.franchises_for_user("2");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "pizzaPocket");
        assert!(state.franchises_for_user("3").is_empty());
    }

    #[test]
    fn submitted_orders_accumulate_in_history() {
        let state = SessionState::install(SeedState::default());
        assert!(state.orders().is_empty());

        let order = Order {
            id: None,
            franchise_id: "1".into(),
            store_id: "1".into(),
            items: vec![pizzasim_common::LineItem {
                menu_id: "1".into(),
                description: "Veggie".to_string(),
                price: 0.05,
            }],
            date: None,
        };
        let (recorded, jwt) = state.submit_order(order);
        let id = recorded.id.clone().unwrap();
        assert!(recorded.date.is_some());
        assert!(!jwt.is_empty());

        let history = state.orders();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, Some(id.clone()));
        assert_eq!(state.lookup_delivery(&jwt), Some(id));
    }

    #[test]
    fn armed_failure_fires_exactly_once() {
        let seed = SeedState::new().with_failure(FailureScript::order_failure());
        let state = SessionState::install(seed);

        assert!(state.take_failure("GET", "/api/order").is_none());
        let fired = state.take_failure("POST", "/api/order").unwrap();
        assert_eq!(fired.status, 500);
        assert_eq!(fired.message, "order failed");
        assert!(state.take_failure("POST", "/api/order").is_none());
    }
}
