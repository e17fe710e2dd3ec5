mod api;
mod fleet;

use chrono::Utc;
use fleet::Fleet;
use std::env;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let http_addr = env::var("SIM_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());
    let num_devices: usize = env::var("DEVICES")
        .unwrap_or_else(|_| "25".to_string())
        .parse()
        .unwrap_or(25);

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting IoT upstream simulator");
    info!("HTTP server: {}, Devices: {}", http_addr, num_devices);

    let fleet = Fleet::generate(&mut rand::thread_rng(), num_devices, Utc::now());
    info!(
        "Generated {} devices, {} things, {} alarms",
        fleet.devices.len(),
        fleet.things.len(),
        fleet.alarms().len()
    );

    let app = api::create_router(fleet);

    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", http_addr, e);
            std::process::exit(1);
        });

    info!("Serving upstream api under http://{}/api/v0", http_addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}
