//! Serves the in-memory Challonge stand-in over HTTP for manual poking with
//! curl or a locally configured client (point `base_url` at it and use the
//! credentials exported by the library crate).

use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!(
        "challonge stand-in listening on {addr} (user {:?}, key {:?})",
        mock_server::API_USER,
        mock_server::API_KEY
    );
    mock_server::run(listener).await
}
