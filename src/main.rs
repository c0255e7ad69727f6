use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use vesta::{Config, Controller, EffectSender, SignalBus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vesta::init()?;

    info!("VESTA v{} starting", vesta::VERSION);

    let config_path = std::env::args().nth(1).unwrap_or_else(|| {
        error!(
            "Usage: {} <config.yaml>",
            std::env::args().next().unwrap_or_else(|| "vesta".to_string())
        );
        std::process::exit(1);
    });

    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;
    info!(
        "Loaded controller '{}' with {} zones",
        config.controller.designation,
        config.zones.len()
    );

    let bus = SignalBus::new();
    let (effects, mut events) = EffectSender::channel();
    let mut controller = Controller::new(config, bus, effects)?;

    // Consume side-effect events as JSON lines
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => info!("effect: {}", line),
                Err(e) => error!("Failed to encode effect event: {}", e),
            }
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        res = controller.run() => {
            if let Err(e) = res {
                error!("Controller error: {}", e);
                std::process::exit(1);
            }
        }
    }

    info!("Controller stopped normally");
    Ok(())
}
