//! Run the listener and print every received message.

use anyhow::{Context, Result};
use nearlink_client::{Adapter, Radio};
use nearlink_listener::{ListenerConfig, Server, ServerHandle};
use nearlink_types::{MessageReceived, PaymentPayload};
use std::sync::atomic::Ordering;

/// Start the server on `adapter`.
pub async fn start<R: Radio>(
    adapter: &Adapter<R>,
    config: ListenerConfig,
) -> Result<ServerHandle> {
    let server = Server::new(adapter.clone(), config);
    let handle = server.start().await.context("Failed to start listener")?;
    println!("Listening on {} (Ctrl-C to stop)", config.service);
    Ok(handle)
}

/// Print messages from `handle` until Ctrl-C, then stop it.
pub async fn serve(mut handle: ServerHandle) -> Result<()> {
    loop {
        tokio::select! {
            message = handle.next_message() => match message {
                Some(message) => print_message(&message),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    handle.stop().await;
    let metrics = handle.metrics();
    println!();
    println!("Listener stopped");
    println!(
        "  Connections: {}",
        metrics.connections_accepted.load(Ordering::Relaxed)
    );
    println!(
        "  Messages:    {}",
        metrics.messages_received.load(Ordering::Relaxed)
    );
    println!(
        "  Errors:      {}",
        metrics.accept_errors.load(Ordering::Relaxed)
            + metrics.handler_errors.load(Ordering::Relaxed)
    );
    Ok(())
}

/// Run the listen command.
pub async fn run<R: Radio>(adapter: &Adapter<R>, config: ListenerConfig) -> Result<()> {
    let handle = start(adapter, config).await?;
    serve(handle).await
}

fn print_message(message: &MessageReceived) {
    if let Ok(payment) = PaymentPayload::from_bytes(&message.payload) {
        println!(
            "  [{}] payment {} amount={} status={}",
            message.sender, payment.id, payment.amount, payment.status
        );
    } else if let Some(text) = message.payload_str() {
        println!("  [{}] {}", message.sender, text);
    } else {
        println!(
            "  [{}] {} bytes (binary)",
            message.sender,
            message.payload.len()
        );
    }
}
