use mock_server::MockConfig;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let mut config = MockConfig {
        public_url: format!("http://{addr}"),
        ..MockConfig::default()
    };
    if let Ok(username) = std::env::var("MOCK_USERNAME") {
        config.username = username;
    }
    if let Ok(password) = std::env::var("MOCK_PASSWORD") {
        config.password = password;
    }

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, username = %config.username, "listening");
    mock_server::run_with(listener, config).await
}
