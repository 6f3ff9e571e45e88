//! Terminal presentation surface: prints the current QR string once per tick.
//!
//! Pipe stdout into a QR renderer, or read the log on stderr.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence::client::http::HttpSessionKeyApi;
use presence::config::PresenterConfig;
use presence::rotation::controller::{RotationController, RotationEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let config = PresenterConfig::from_env()?;
    let api = HttpSessionKeyApi::new(config.api_url.clone(), config.rotation.request_timeout)?;

    let (mut controller, mut events) = RotationController::new(Arc::new(api), config.rotation.clone());
    controller
        .start(config.teacher_token.as_str(), config.lesson_id)
        .await;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.stop().await;
                break Ok(());
            }
            event = events.recv() => match event {
                Some(RotationEvent::Loading) => tracing::info!("⏳ Fetching session key..."),
                Some(RotationEvent::Token(qr)) => println!("{}", qr),
                Some(RotationEvent::Failed(error)) => {
                    tracing::error!("❌ {} ({})", error.kind().user_message(), error);
                    break Err(anyhow::anyhow!(error));
                }
                Some(RotationEvent::Stopped) | None => break Ok(()),
            },
        }
    };

    drop(controller);
    outcome
}
