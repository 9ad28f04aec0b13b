use chrono::{DateTime, Local, Utc};
use humansize::{format_size, BINARY};

/// human readable byte count, e.g. `1.5 KiB`
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// human readable transfer rate, e.g. `1.5 KiB/s`
pub fn format_speed(bytes_per_second: f64) -> String {
    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", format_size(bytes_per_second.round() as u64, BINARY))
}

/// modification time in the local timezone
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// resolves on ctrl-c
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::debug!("Shutdown signal received");
}
