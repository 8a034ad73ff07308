use std::io;
use std::sync::Arc;

use crate::application::cart_sync::{CartSessions, CartSyncBridge};
use crate::application::cart_writer::CartWriter;
use crate::application::checkout::{CheckoutService, CheckoutUrls, Storefront};
use crate::application::contact::ContactService;
use crate::application::reconciler::OrderReconciler;
use crate::application::webhook::WebhookVerifier;
use crate::domain::ports::{CartRepository, Notifier, OrderStore, PaymentGateway};

pub type Bridge = CartSyncBridge<Arc<dyn CartRepository>>;

/// Shared application services, handed to every worker as `web::Data`.
pub struct AppState {
    pub sessions: CartSessions<Arc<dyn CartRepository>>,
    pub checkout: CheckoutService<Arc<dyn OrderStore>, Arc<dyn PaymentGateway>>,
    pub reconciler: OrderReconciler<Arc<dyn OrderStore>, Arc<dyn Notifier>>,
    pub contact: ContactService<Arc<dyn Notifier>>,
}

pub struct Adapters {
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Spawns the cart writer thread.
    pub fn new(
        adapters: Adapters,
        storefront: Storefront,
        urls: CheckoutUrls,
        verifier: WebhookVerifier,
        contact_inbox: String,
    ) -> io::Result<Self> {
        let writer = Arc::new(CartWriter::spawn(Arc::clone(&adapters.carts))?);
        Ok(Self {
            sessions: CartSessions::new(adapters.carts, writer),
            checkout: CheckoutService::new(
                Arc::clone(&adapters.orders),
                adapters.gateway,
                storefront,
                urls,
            ),
            contact: ContactService::new(Arc::clone(&adapters.notifier), contact_inbox),
            reconciler: OrderReconciler::new(adapters.orders, adapters.notifier, verifier),
        })
    }

    pub fn storefront(&self) -> &Storefront {
        self.checkout.storefront()
    }
}
