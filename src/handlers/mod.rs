pub mod carts;
pub mod checkout;
pub mod contact;
pub mod orders;
pub mod products;
pub mod webhooks;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        products::list_products,
        carts::get_cart,
        carts::add_item,
        carts::update_quantity,
        carts::update_fields,
        carts::remove_item,
        carts::clear_cart,
        carts::apply_promo,
        carts::remove_promo,
        carts::sign_in,
        carts::sign_out,
        carts::shipping_options,
        carts::quote,
        checkout::submit_checkout,
        webhooks::payment_webhook,
        orders::get_order,
        contact::send_message,
    ),
    tags(
        (name = "catalog", description = "Products and display prices"),
        (name = "carts", description = "Cart contents and identity"),
        (name = "checkout", description = "Shipping, totals and payment hand-off"),
        (name = "webhooks", description = "Payment processor notifications"),
        (name = "orders", description = "Finalized orders"),
        (name = "contact", description = "Messages to the store"),
    )
)]
pub struct ApiDoc;
