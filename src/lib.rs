pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;
pub mod state;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use db::{create_pool, DbPool};
pub use state::AppState;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    log::info!("Applied {} pending migration(s)", applied.len());
    Ok(())
}

/// Route table, shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    use handlers::{carts, checkout, contact, orders, products, webhooks};

    cfg.route("/products", web::get().to(products::list_products))
        .service(
            web::scope("/carts/{token}")
                .route("", web::get().to(carts::get_cart))
                .route("", web::delete().to(carts::clear_cart))
                .route("/items", web::post().to(carts::add_item))
                .route("/items", web::patch().to(carts::update_quantity))
                .route("/items", web::put().to(carts::update_fields))
                .route("/items", web::delete().to(carts::remove_item))
                .route("/promo", web::post().to(carts::apply_promo))
                .route("/promo", web::delete().to(carts::remove_promo))
                .route("/sign-in", web::post().to(carts::sign_in))
                .route("/sign-out", web::post().to(carts::sign_out))
                .route("/shipping", web::get().to(carts::shipping_options))
                .route("/quote", web::get().to(carts::quote))
                .route("/checkout", web::post().to(checkout::submit_checkout)),
        )
        .route("/webhooks/payment", web::post().to(webhooks::payment_webhook))
        .route("/orders/{session_id}", web::get().to(orders::get_order))
        .route("/contact", web::post().to(contact::send_message));
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or spawning) the returned
/// server.
pub fn build_server(
    state: web::Data<AppState>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = handlers::ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
