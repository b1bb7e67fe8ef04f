//! Default gateway event handlers
//!
//! Log-only observers for the gateway's standard events; forwarding
//! them to an upstream surface is the caller's concern.

use hermes_client::{GatewayClient, handler};

/// Register logging handlers for the gateway's standard events.
pub fn register_event_logging(client: &GatewayClient) {
    client.register_event_handler(
        "qr",
        handler(|_payload| async move {
            log::info!("received QR code for gateway pairing");
            Ok(())
        }),
    );

    client.register_event_handler(
        "ready",
        handler(|_payload| async move {
            log::info!("gateway is ready");
            Ok(())
        }),
    );

    client.register_event_handler(
        "message",
        handler(|payload| async move {
            let id = payload["message"]["id"].as_str().unwrap_or("<unknown>");
            log::debug!("received message {id}");
            Ok(())
        }),
    );

    client.register_event_handler(
        "disconnected",
        handler(|payload| async move {
            let reason = payload["reason"].as_str().unwrap_or("unknown reason");
            log::warn!("gateway session disconnected: {reason}");
            Ok(())
        }),
    );
}
