mod api;
mod completion;
mod extractor;
mod persona;
mod responder;
mod runtime;
mod session;
mod store;

use std::env;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use dotenv::dotenv;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use completion::CompletionClient;
use extractor::{FetchMode, PageFetcher};
use responder::{Responder, ResponseTables};
use runtime::Runtime;
use store::JsonStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::navigate,
        api::get_session,
        api::send_chat,
        api::test_chat,
        api::get_persona,
        api::put_persona,
        api::reset_persona,
        api::put_credential,
        api::get_history,
        api::clear_history
    ),
    components(
        schemas(
            api::NavigateRequest,
            api::SessionInfo,
            api::ChatSendRequest,
            api::ChatSendResponse,
            api::ChatTestResponse,
            api::CredentialRequest,
            api::StatusResponse,
            crate::extractor::ProfileRecord,
            crate::persona::PersonaConfig,
            crate::persona::ResponseStyle,
            crate::persona::TopicResponses,
            crate::persona::CustomResponse,
            crate::session::ChatMessage,
            crate::session::Sender
        )
    ),
    tags(
        (name = "session", description = "Profile session lifecycle"),
        (name = "chat", description = "Chat exchange and history"),
        (name = "persona", description = "Persona customization")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let store_path = env::var("STORE_PATH").unwrap_or_else(|_| "persona_store.json".to_string());
    let endpoint = env::var("COMPLETION_ENDPOINT")
        .unwrap_or_else(|_| completion::DEFAULT_ENDPOINT.to_string());
    let model =
        env::var("COMPLETION_MODEL").unwrap_or_else(|_| completion::DEFAULT_MODEL.to_string());
    let fetch_mode = FetchMode::parse_str(&env::var("FETCH_MODE").unwrap_or_default());
    let tables_path = env::var("RESPONSE_TABLES").ok();

    let store = Arc::new(JsonStore::new(&store_path));
    let fetcher = PageFetcher::new(fetch_mode)?;
    let responder = Responder::new(
        ResponseTables::load(tables_path.as_deref()),
        CompletionClient::new(endpoint, model),
    );
    let state = Arc::new(api::AppState { runtime: Runtime::new(store, fetcher, responder) });

    let app = Router::new()
        .merge(SwaggerUi::new("/persona-chat-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/session/navigate", post(api::navigate))
        .route("/session", get(api::get_session))
        .route("/chat/send", post(api::send_chat))
        .route("/chat/test", post(api::test_chat))
        .route("/persona", get(api::get_persona).put(api::put_persona))
        .route("/persona/reset", post(api::reset_persona))
        .route("/credential", put(api::put_credential))
        .route("/history", get(api::get_history).delete(api::clear_history))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
