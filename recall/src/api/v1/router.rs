use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::v1_request_context_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let memories = Router::new()
        .route("/", get(handlers::memories::list_memories).post(handlers::memories::create_memory))
        .route(
            "/{memoryId}",
            get(handlers::memories::get_memory)
                .patch(handlers::memories::update_memory)
                .delete(handlers::memories::delete_memory),
        )
        .route("/{memoryId}/corrections", post(handlers::memories::add_correction))
        .route(
            "/{memoryId}/attachments",
            get(handlers::memories::list_attachments).post(handlers::memories::add_attachment),
        )
        .route("/{memoryId}/attachments:fromUrl", post(handlers::memories::add_attachment_from_url))
        .route("/{memoryId}/versions", get(handlers::versions::get_history))
        .route("/{memoryId}/versions:compare", get(handlers::versions::compare_versions))
        .route("/{memoryId}/versions/{versionNumber}", get(handlers::versions::get_version))
        .route(
            "/{memoryId}/versions/{versionNumber}:rollback",
            post(handlers::versions::rollback),
        );

    let search = Router::new().route("/", post(handlers::search::search));

    let graph = Router::new()
        .route("/entities", get(handlers::graph::search_entities))
        .route("/entities/{name}/neighborhood", get(handlers::graph::get_neighborhood));

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .merge(super::openapi::redoc_router());

    let protected_routes = Router::new()
        .nest("/memories", memories)
        .nest("/search", search)
        .nest("/graph", graph)
        .route_layer(middleware::from_fn_with_state(state, v1_request_context_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
