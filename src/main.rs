use std::error::Error;
use std::sync::Arc;

use actix_web::web;
use case_storefront::application::checkout::CheckoutUrls;
use case_storefront::application::webhook::WebhookVerifier;
use case_storefront::config::AppConfig;
use case_storefront::domain::ports::Notifier;
use case_storefront::infrastructure::cart_repo::DieselCartRepository;
use case_storefront::infrastructure::mailer::{LogNotifier, SmtpNotifier};
use case_storefront::infrastructure::order_store::DieselOrderStore;
use case_storefront::infrastructure::payment::StripePaymentGateway;
use case_storefront::state::Adapters;
use case_storefront::{build_server, create_pool, run_migrations, AppState};
use secrecy::ExposeSecret;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    let storefront = config.store.build()?;

    let pool = create_pool(config.database_url.expose_secret())?;
    run_migrations(&pool)?;

    // The blocking HTTP client must be built before the async runtime starts.
    let gateway = StripePaymentGateway::new(&config.payment_api_base, config.payment_secret_key.clone())?;
    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
        None => {
            log::warn!("SMTP is not configured; emails will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let state = AppState::new(
        Adapters {
            carts: Arc::new(DieselCartRepository::new(pool.clone())),
            orders: Arc::new(DieselOrderStore::new(pool)),
            gateway: Arc::new(gateway),
            notifier,
        },
        storefront,
        CheckoutUrls {
            base_url: config.public_base_url.clone(),
        },
        WebhookVerifier::new(config.payment_webhook_secret.clone()),
        config.contact_inbox.clone(),
    )?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    // Held here so the blocking payment client is dropped outside the runtime.
    let state = web::Data::new(state);
    let server_state = state.clone();
    actix_web::rt::System::new().block_on(async move {
        build_server(server_state, &config.host, config.port)?.await
    })?;
    drop(state);
    Ok(())
}
