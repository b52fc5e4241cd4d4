use anyhow::Result;
use ivr_api::{serve, GatewayConfig};
use ivr_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("ivr_gateway");

    serve(GatewayConfig::from_env()).await
}
