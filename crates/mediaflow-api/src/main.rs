use mediaflow_core::ApiConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = ApiConfig::from_env()?;

    let (_state, router) = mediaflow_api::setup::initialize_app(config.clone()).await?;

    mediaflow_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
