use mock_server::{AppState, Backend};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mock_server=info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let mut state = AppState::new(Backend::default());
    if let Ok(token) = std::env::var("MOCK_TOKEN") {
        state = state.with_token(&token);
    }

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening; API under /api");
    mock_server::serve(listener, state).await
}
