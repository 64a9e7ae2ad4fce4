//! Simple chat client example
//!
//! Connects anonymously over a secure WebSocket, joins a channel, and
//! prints chat messages as they arrive.
//!
//! Run with: `cargo run --example simple_client -- <channel>`

use anyhow::Result;

use twirc::{Client, ClientConfig, Event};

#[tokio::main]
async fn main() -> Result<()> {
    let channel = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "twitchpresents".to_string());

    let mut client = Client::new(ClientConfig::anonymous());

    client.connect().await?;
    println!("✓ Registered as {}", client.nick());

    let mut events = client.subscribe();

    if client.join(&channel).await? {
        println!("✓ Joined #{channel}");
    } else {
        println!("? No join confirmation for #{channel}, listening anyway");
    }

    loop {
        match events.recv().await {
            Ok(Event::Message(msg)) => {
                if msg.is_action {
                    println!("[#{}] * {} {}", msg.channel, msg.user, msg.message);
                } else {
                    println!("[#{}] {}: {}", msg.channel, msg.user, msg.message);
                }
            }
            Ok(Event::Notice(notice)) => {
                println!("[#{}] -server- {}", notice.channel, notice.message);
            }
            Ok(Event::Disconnect(ev)) => {
                println!("Disconnected: {}", ev.reason.as_deref().unwrap_or("requested"));
            }
            Ok(Event::Register) => {
                // Reconnected: membership is restored automatically.
                println!("✓ Re-registered as {}", client.nick());
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("event stream ended: {e}");
                break;
            }
        }
    }

    Ok(())
}
