use std::sync::{Arc, Mutex};

use tracing::info;

use pubrelay::broker::Broker;
use pubrelay::config::load_config;
use pubrelay::transport::server::Server;
use pubrelay::utils::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = load_config().expect("Failed to load configuration");
    logging::init(&config.log.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = Arc::new(Mutex::new(Broker::new()));
    let server = Arc::new(
        Server::bind(&addr, broker)
            .await
            .expect("Failed to bind listening socket"),
    );

    tokio::select! {
        _ = Arc::clone(&server).serve() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("keyboard interrupt");
        }
    }
    server.shutdown().await;
}
