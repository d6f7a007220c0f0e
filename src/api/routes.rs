// API route configuration

use crate::api::{handlers, middleware, state::AppState};
use actix_web::web;

/// Register shared state and every route. Used by the server and by tests.
pub fn configure_app(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(state.db)
            .app_data(state.assets)
            .app_data(middleware::json_config(state.limits.max_bytes))
            .app_data(state.limits)
            .configure(configure_routes);
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/pokemons")
                .route("", web::get().to(handlers::list_pokemons))
                // Fixed segments must precede the `{name}` catch-all.
                .route("/search", web::get().to(handlers::search_pokemons))
                .route("/update", web::put().to(handlers::upsert_pokemon))
                .route("/delete", web::delete().to(handlers::delete_pokemon))
                .route("/{name}", web::get().to(handlers::get_pokemon)),
        )
        .service(
            web::scope("/assets")
                .route(
                    "/pokemons/{id}",
                    web::get().to(handlers::get_creature_asset),
                )
                .route(
                    "/types/{type_name}",
                    web::get().to(handlers::get_type_asset),
                ),
        );
}
