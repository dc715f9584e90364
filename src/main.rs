use clap::Parser;
use openshock_gateway::utils::{logger, validation::Validate};
use openshock_gateway::{Gateway, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.json_logs);

    tracing::info!("Starting {} v{}", config.server_name, config.server_version);
    if config.verbose {
        tracing::debug!("Gateway config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    tracing::info!("OpenShock API URL: {}", config.openshock_api_url);
    tracing::info!("OpenShock API token configured: yes");
    tracing::info!("MCP auth token configured: yes");
    match config.max_shock_intensity {
        0 => tracing::info!("Shock intensity limit: unrestricted"),
        limit => tracing::info!("Shock intensity limit: {}", limit),
    }

    // 建立共用的下游連線池與閘道
    let downstream = config.downstream_settings()?;
    let gateway = Gateway::new(config.gateway_settings(), &downstream)?;

    if let Err(e) = gateway.serve(config.listen_addr()).await {
        tracing::error!("❌ Gateway failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
