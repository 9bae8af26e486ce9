use biosignal_gateway::{
    cli::{Cli, Commands},
    create_router, GatewayConfig, GatewayState, SensorRegistry,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biosignal_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env()?;

    match cli.command {
        Some(Commands::Sensors) => {
            print_sensor_table(&SensorRegistry::from_config(&config));
            return Ok(());
        }
        Some(Commands::Serve) | None => {}
    }

    info!("🚀 Starting Biosignal Gateway v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Relay backend: {}", config.relay_base_url);
    info!("   Relay timeout: {:?}", config.relay_timeout);
    match &config.allowed_users {
        Some(users) => info!("   Allowed users: {}", users.len()),
        None => info!("   Allowed users: any"),
    }

    let addr: SocketAddr = config.bind_address().parse()?;
    let state = Arc::new(GatewayState::from_config(config)?);

    for profile in state.registry.profiles() {
        info!(
            "   {} -> {} (capacity {})",
            profile.sensor_type, profile.relay_endpoint, profile.buffer_capacity
        );
    }

    let app = create_router(state);

    info!("🌐 Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Gateway stopped");
    Ok(())
}

fn print_sensor_table(registry: &SensorRegistry) {
    println!(
        "{:<10} {:<8} {:<8} {:<10} {}",
        "Sensor", "Command", "Length", "Capacity", "Relay endpoint"
    );
    println!("{}", "-".repeat(80));

    for profile in registry.profiles() {
        println!(
            "{:<10} 0x{:02X}     0x{:02X}     {:<10} {}",
            profile.sensor_type.as_str(),
            profile.command_code,
            profile.payload_length,
            profile.buffer_capacity,
            profile.relay_endpoint
        );
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
