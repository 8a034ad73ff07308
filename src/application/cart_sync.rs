//! Keeps the in-memory cart and its durable record in step across identity
//! changes.
//!
//! ```text
//! ANONYMOUS --sign-in--> MERGING --> AUTHENTICATED --sign-out--> ANONYMOUS
//! ```
//!
//! Reads fail open (an unreadable record counts as empty) and writes are
//! queued on the [`CartWriter`]. The in-memory cart is never rolled back
//! because persistence failed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use moka::sync::Cache;
use serde::Serialize;
use utoipa::ToSchema;

use super::cart_store::CartStore;
use super::cart_writer::CartWriter;
use crate::domain::cart::{Cart, CartIdentity, CartItemUpdate, LineKey, MAX_LINE_QUANTITY};
use crate::domain::catalog::Product;
use crate::domain::errors::ValidationError;
use crate::domain::ports::{CartRepository, StoredCart};
use crate::domain::pricing::PromoTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Anonymous,
    Merging,
    Authenticated,
}

/// Sign-in merge of the pre-sign-in cart into the account's stored cart.
///
/// Personalized entries from `local` are always appended, even when an
/// identical entry exists remotely: each brief is a separate request. Plain
/// entries are folded into a remote plain entry with the same product and
/// size, or appended.
pub fn merge_carts(local: &Cart, remote: &Cart) -> Cart {
    let mut merged = remote.items.clone();
    for item in &local.items {
        if item.is_personalized() {
            merged.push(item.clone());
            continue;
        }
        match merged.iter_mut().find(|m| {
            m.product_id == item.product_id && m.size == item.size && m.description.is_none()
        }) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .saturating_add(item.quantity)
                    .min(MAX_LINE_QUANTITY);
            }
            None => merged.push(item.clone()),
        }
    }
    Cart {
        items: merged,
        promo_code: local.promo_code.clone(),
    }
}

pub struct CartSyncBridge<R> {
    device_token: String,
    account_id: Option<String>,
    state: SyncState,
    store: CartStore,
    repo: R,
    writer: Arc<CartWriter>,
    version: i64,
}

impl<R: CartRepository> CartSyncBridge<R> {
    /// Opens an anonymous session, resuming the device's stored cart when it
    /// can be read.
    pub fn open(device_token: &str, repo: R, writer: Arc<CartWriter>) -> Self {
        let identity = CartIdentity::Device(device_token.to_string());
        let stored = load_or_empty(&repo, &identity);
        Self {
            device_token: device_token.to_string(),
            account_id: None,
            state: SyncState::Anonymous,
            store: CartStore::new(Cart::from_items(stored.items)),
            repo,
            writer,
            version: stored.version,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn identity(&self) -> CartIdentity {
        match &self.account_id {
            Some(account) => CartIdentity::Account(account.clone()),
            None => CartIdentity::Device(self.device_token.clone()),
        }
    }

    pub fn cart(&self) -> Arc<Cart> {
        self.store.snapshot()
    }

    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        size: Option<&str>,
        description: Option<&str>,
    ) -> Result<Arc<Cart>, ValidationError> {
        let cart = self.store.add(product, quantity, size, description)?;
        self.persist();
        Ok(cart)
    }

    pub fn update_quantity(&mut self, key: &LineKey, quantity: u32) -> Arc<Cart> {
        let before = self.store.snapshot();
        let cart = self.store.update_quantity(key, quantity);
        if !Arc::ptr_eq(&before, &cart) {
            self.persist();
        }
        cart
    }

    pub fn remove(&mut self, key: &LineKey) -> Arc<Cart> {
        let cart = self.store.remove(key);
        self.persist();
        cart
    }

    pub fn update_fields(
        &mut self,
        key: &LineKey,
        update: &CartItemUpdate,
    ) -> Result<Arc<Cart>, ValidationError> {
        let cart = self.store.update_fields(key, update)?;
        self.persist();
        Ok(cart)
    }

    pub fn clear(&mut self) -> Arc<Cart> {
        let cart = self.store.clear();
        self.persist();
        cart
    }

    /// Promo codes live with the session only; the durable record holds
    /// line items.
    pub fn apply_promo(&mut self, code: &str, promos: &PromoTable) -> Result<Arc<Cart>, ValidationError> {
        self.store.apply_promo(code, promos)
    }

    pub fn remove_promo(&mut self) -> Arc<Cart> {
        self.store.remove_promo()
    }

    pub fn sign_in(&mut self, account_id: &str) -> Arc<Cart> {
        if self.account_id.as_deref() == Some(account_id) {
            return self.cart();
        }
        if self.account_id.is_some() {
            self.sign_out();
        }

        self.state = SyncState::Merging;
        let account = CartIdentity::Account(account_id.to_string());
        let remote = load_or_empty(&self.repo, &account);
        self.version = self.version.max(remote.version);

        let merged = merge_carts(&self.store.snapshot(), &Cart::from_items(remote.items));
        let cart = self.store.replace(merged);

        self.account_id = Some(account_id.to_string());
        self.state = SyncState::Authenticated;
        log::info!(
            "Merged device cart {} into account {account_id} ({} lines)",
            self.device_token,
            cart.items.len()
        );

        let version = self.next_version();
        self.writer.enqueue(account, version, Arc::clone(&cart));
        // The device record was consumed by the merge.
        self.writer.enqueue(
            CartIdentity::Device(self.device_token.clone()),
            version,
            Arc::new(Cart::empty()),
        );
        cart
    }

    /// Clears the cart. Nothing is merged back into the device record.
    pub fn sign_out(&mut self) -> Arc<Cart> {
        if let Some(account) = self.account_id.take() {
            log::info!("Account {account} signed out of device {}", self.device_token);
        }
        self.state = SyncState::Anonymous;
        let cart = self.store.clear();
        self.persist();
        cart
    }

    fn persist(&mut self) {
        let version = self.next_version();
        self.writer
            .enqueue(self.identity(), version, self.store.snapshot());
    }

    /// Microsecond clock, forced strictly increasing per bridge so versions
    /// survive restarts without going backwards.
    fn next_version(&mut self) -> i64 {
        self.version = (self.version + 1).max(Utc::now().timestamp_micros());
        self.version
    }
}

fn load_or_empty<R: CartRepository>(repo: &R, identity: &CartIdentity) -> StoredCart {
    match repo.load(identity) {
        Ok(Some(stored)) => stored,
        Ok(None) => StoredCart {
            items: Vec::new(),
            version: 0,
        },
        Err(e) => {
            log::warn!(
                "Could not read cart for {}: {e}; continuing with an empty record",
                identity.storage_key()
            );
            StoredCart {
                items: Vec::new(),
                version: 0,
            }
        }
    }
}

/// Bridges not touched for this long are dropped; the next request for the
/// device reopens from the durable record.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
const MAX_SESSIONS: u64 = 100_000;

/// One [`CartSyncBridge`] per device token, each behind its own lock.
pub struct CartSessions<R> {
    repo: R,
    writer: Arc<CartWriter>,
    bridges: Cache<String, Arc<Mutex<CartSyncBridge<R>>>>,
}

impl<R: CartRepository + Clone> CartSessions<R> {
    pub fn new(repo: R, writer: Arc<CartWriter>) -> Self {
        Self::with_idle_ttl(repo, writer, SESSION_IDLE_TTL)
    }

    pub fn with_idle_ttl(repo: R, writer: Arc<CartWriter>, idle_ttl: Duration) -> Self {
        Self {
            repo,
            writer,
            bridges: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(idle_ttl)
                .build(),
        }
    }

    pub fn writer(&self) -> &CartWriter {
        &self.writer
    }

    /// Open bridges, after pending evictions have run.
    pub fn active_sessions(&self) -> u64 {
        self.bridges.run_pending_tasks();
        self.bridges.entry_count()
    }

    /// Runs `f` against the device's bridge, opening it on first use.
    ///
    /// Only this device's lock is held while `f` runs, so a slow durable read
    /// during one shopper's sign-in does not stall other devices.
    pub fn with_bridge<T>(
        &self,
        device_token: &str,
        f: impl FnOnce(&mut CartSyncBridge<R>) -> T,
    ) -> T {
        let bridge = self.bridges.get_with(device_token.to_string(), || {
            Arc::new(Mutex::new(CartSyncBridge::open(
                device_token,
                self.repo.clone(),
                Arc::clone(&self.writer),
            )))
        });
        let mut bridge = bridge.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut bridge)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::domain::cart::CartLineItem;
    use crate::domain::catalog::Catalog;
    use crate::domain::errors::DomainError;
    use crate::domain::ports::CartWrite;
    use crate::infrastructure::memory::InMemoryCartRepository;

    fn line(product: &str, size: &str, description: Option<&str>, qty: u32) -> CartLineItem {
        CartLineItem {
            product_id: product.to_string(),
            size: Some(size.to_string()),
            description: description.map(str::to_string),
            quantity: qty,
            unit_price_minor: 2599,
        }
    }

    #[test]
    fn personalized_items_never_dedup_on_merge() {
        let local = Cart::from_items(vec![line("a", "S", Some("hi"), 1)]);
        let remote = Cart::from_items(vec![line("a", "S", Some("hi"), 1)]);
        let merged = merge_carts(&local, &remote);
        assert_eq!(merged.items.len(), 2);
        assert!(merged.items.iter().all(|i| i.quantity == 1));
    }

    #[test]
    fn plain_items_sum_into_remote_entry() {
        let local = Cart::from_items(vec![line("b", "M", None, 2)]);
        let remote = Cart::from_items(vec![line("b", "M", None, 3)]);
        let merged = merge_carts(&local, &remote);
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].quantity, 5);
    }

    #[test]
    fn merging_near_limit_lines_clamps() {
        let local = Cart::from_items(vec![line("b", "M", None, MAX_LINE_QUANTITY - 1)]);
        let remote = Cart::from_items(vec![line("b", "M", None, MAX_LINE_QUANTITY)]);
        let merged = merge_carts(&local, &remote);
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn plain_local_item_does_not_fold_into_personalized_remote() {
        let local = Cart::from_items(vec![line("a", "S", None, 1)]);
        let remote = Cart::from_items(vec![line("a", "S", Some("brief"), 1)]);
        let merged = merge_carts(&local, &remote);
        assert_eq!(merged.items.len(), 2);
    }

    #[test]
    fn merge_with_empty_local_keeps_remote() {
        let remote = Cart::from_items(vec![line("b", "M", None, 3)]);
        assert_eq!(merge_carts(&Cart::empty(), &remote).items, remote.items);
    }

    fn bridge(repo: &Arc<InMemoryCartRepository>) -> (CartSyncBridge<Arc<InMemoryCartRepository>>, Arc<CartWriter>) {
        let writer = Arc::new(CartWriter::spawn(Arc::clone(repo)).expect("spawn writer"));
        (
            CartSyncBridge::open("device-1", Arc::clone(repo), Arc::clone(&writer)),
            writer,
        )
    }

    fn product() -> Product {
        Catalog::default().get("random").cloned().expect("random exists")
    }

    #[test]
    fn sign_in_merges_and_persists_to_account() {
        let repo = Arc::new(InMemoryCartRepository::default());
        let account = CartIdentity::Account("acct-1".to_string());
        repo.save(&account, 1, &[line("random", "M", None, 3)])
            .expect("seed remote cart");

        let (mut bridge, writer) = bridge(&repo);
        bridge.add(&product(), 2, Some("M"), None).expect("add succeeds");
        let cart = bridge.sign_in("acct-1");
        assert_eq!(bridge.state(), SyncState::Authenticated);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);

        assert_eq!(writer.flush(), 0);
        let stored = repo.load(&account).expect("load").expect("account cart");
        assert_eq!(stored.items[0].quantity, 5);
        let device = repo
            .load(&CartIdentity::Device("device-1".to_string()))
            .expect("load")
            .expect("device record");
        assert!(device.items.is_empty());
    }

    #[test]
    fn sign_out_clears_without_touching_account_record() {
        let repo = Arc::new(InMemoryCartRepository::default());
        let (mut bridge, writer) = bridge(&repo);
        bridge.sign_in("acct-2");
        bridge.add(&product(), 1, None, None).expect("add succeeds");
        let cart = bridge.sign_out();
        assert!(cart.is_empty());
        assert_eq!(bridge.state(), SyncState::Anonymous);
        assert_eq!(bridge.identity(), CartIdentity::Device("device-1".to_string()));

        writer.flush();
        let stored = repo
            .load(&CartIdentity::Account("acct-2".to_string()))
            .expect("load")
            .expect("account record");
        assert_eq!(stored.items.len(), 1);
    }

    struct UnreadableRepo;

    impl CartRepository for UnreadableRepo {
        fn load(&self, _identity: &CartIdentity) -> Result<Option<StoredCart>, DomainError> {
            Err(DomainError::Persistence("connection refused".to_string()))
        }

        fn save(
            &self,
            _identity: &CartIdentity,
            _version: i64,
            _items: &[CartLineItem],
        ) -> Result<CartWrite, DomainError> {
            Err(DomainError::Persistence("connection refused".to_string()))
        }
    }

    #[test]
    fn unreadable_and_unwritable_store_never_blocks_the_cart() {
        let repo = Arc::new(UnreadableRepo);
        let writer = Arc::new(CartWriter::spawn(Arc::clone(&repo)).expect("spawn writer"));
        let mut bridge = CartSyncBridge::open("device-9", Arc::clone(&repo), Arc::clone(&writer));

        bridge.add(&product(), 1, None, None).expect("add succeeds");
        let cart = bridge.sign_in("acct-9");
        assert_eq!(cart.items.len(), 1);
        assert_eq!(bridge.state(), SyncState::Authenticated);
        assert!(writer.flush() > 0);
        assert_eq!(bridge.cart().items.len(), 1);
    }

    #[test]
    fn sessions_reuse_the_bridge_per_device() {
        let repo = Arc::new(InMemoryCartRepository::default());
        let writer = Arc::new(CartWriter::spawn(Arc::clone(&repo)).expect("spawn writer"));
        let sessions = CartSessions::new(Arc::clone(&repo), writer);
        sessions
            .with_bridge("d", |b| b.add(&product(), 1, None, None))
            .expect("add succeeds");
        let qty = sessions.with_bridge("d", |b| b.cart().total_quantity());
        assert_eq!(qty, 1);
        let other = sessions.with_bridge("e", |b| b.cart().total_quantity());
        assert_eq!(other, 0);
    }

    /// Account reads park until the test releases them.
    struct GatedRepo {
        inner: InMemoryCartRepository,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl CartRepository for GatedRepo {
        fn load(&self, identity: &CartIdentity) -> Result<Option<StoredCart>, DomainError> {
            if matches!(identity, CartIdentity::Account(_)) {
                let _ = self.entered.lock().expect("lock").send(());
                let _ = self.release.lock().expect("lock").recv();
            }
            self.inner.load(identity)
        }

        fn save(
            &self,
            identity: &CartIdentity,
            version: i64,
            items: &[CartLineItem],
        ) -> Result<CartWrite, DomainError> {
            self.inner.save(identity, version, items)
        }
    }

    #[test]
    fn slow_sign_in_does_not_stall_other_devices() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let repo = Arc::new(GatedRepo {
            inner: InMemoryCartRepository::default(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let writer = Arc::new(CartWriter::spawn(Arc::clone(&repo)).expect("spawn writer"));
        let sessions = Arc::new(CartSessions::new(Arc::clone(&repo), writer));

        let signing_in = {
            let sessions = Arc::clone(&sessions);
            thread::spawn(move || sessions.with_bridge("a", |b| b.sign_in("acct-a").items.len()))
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("sign-in reached the account read");

        let (done_tx, done_rx) = mpsc::channel();
        let other = {
            let sessions = Arc::clone(&sessions);
            thread::spawn(move || {
                let qty = sessions.with_bridge("b", |b| {
                    b.add(&product(), 1, None, None).map(|c| c.total_quantity())
                });
                let _ = done_tx.send(qty);
            })
        };
        let qty = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("device b finished while device a was still reading");
        assert_eq!(qty, Ok(1));

        release_tx.send(()).expect("release");
        signing_in.join().expect("sign-in thread");
        other.join().expect("device b thread");
    }

    #[test]
    fn idle_bridges_are_evicted_and_reopen_from_the_store() {
        let repo = Arc::new(InMemoryCartRepository::default());
        let writer = Arc::new(CartWriter::spawn(Arc::clone(&repo)).expect("spawn writer"));
        let sessions = CartSessions::with_idle_ttl(
            Arc::clone(&repo),
            Arc::clone(&writer),
            Duration::from_millis(50),
        );
        sessions
            .with_bridge("d", |b| b.add(&product(), 2, None, None))
            .expect("add succeeds");
        assert_eq!(writer.flush(), 0);
        assert_eq!(sessions.active_sessions(), 1);

        thread::sleep(Duration::from_millis(200));
        assert_eq!(sessions.active_sessions(), 0);

        let qty = sessions.with_bridge("d", |b| b.cart().total_quantity());
        assert_eq!(qty, 2);
    }
}
