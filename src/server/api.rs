use crate::assistant::Assistant;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Json,
    Router,
    extract::State,
    response::IntoResponse,
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Deserialize)]
pub struct AskRequest {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

#[derive(Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub message: String,
    pub details: Option<Vec<String>>,
}

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/suggestions", get(suggestions_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/reload-knowledge", get(reload_knowledge_handler))
        .layer(cors)
        .with_state(AppState { assistant })
}

pub async fn start_http_server(
    http_port: u16,
    assistant: Arc<Assistant>,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(assistant);

    match (args.enable_tls, args.tls_cert_path.as_ref(), args.tls_key_path.as_ref()) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            tokio::spawn(async move {
                let result = axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });

            info!("HTTPS server started with TLS enabled");
        }
        _ => {
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                            error!("HTTP server error: {}", e);
                        }
                    },
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    }
                }
            });

            info!("HTTP server started");
        }
    }

    Ok(())
}

async fn suggestions_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(SuggestionsResponse {
        suggestions: state.assistant.suggestions().await,
    })
}

async fn ask_handler(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    Json(AskResponse {
        response: state.assistant.ask(&req.message).await,
    })
}

async fn reload_knowledge_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (code, success, detail) = match state.assistant.reload_knowledge_if_changed().await {
        Ok(true) => (StatusCode::OK, true, "Knowledge reloaded".to_string()),
        Ok(false) => (StatusCode::OK, true, "Knowledge unchanged".to_string()),
        Err(e) => (StatusCode::BAD_REQUEST, false, format!("Knowledge error: {}", e)),
    };

    (code, Json(ReloadResponse {
        success,
        message: if success { "Reload complete".into() } else { "Reload errors".into() },
        details: Some(vec![detail]),
    })).into_response()
}
