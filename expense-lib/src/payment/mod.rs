use actix_web::{web, Scope};

mod handlers;

pub fn payment_service() -> Scope {
    web::scope("/payments")
        .service(handlers::get_payments)
        .service(handlers::create_payment)
        .service(handlers::get_payment_analytics)
        .service(handlers::get_payment)
        .service(handlers::update_payment)
        .service(handlers::delete_payment)
        .service(handlers::upload_invoice)
        .service(handlers::download_invoice)
}
