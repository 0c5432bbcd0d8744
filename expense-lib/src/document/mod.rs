use actix_web::{web, Scope};

mod handlers;

pub fn document_service() -> Scope {
    web::scope("/documents")
        .service(handlers::get_documents)
        .service(handlers::create_document)
        .service(handlers::get_document)
        .service(handlers::update_document)
        .service(handlers::delete_document)
        .service(handlers::download_document)
}
