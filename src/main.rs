use std::error::Error;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use waverec::{Server, ServerConfig, UploadHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ServerConfig::default();
    info!(address = %config.socket_addr(), output = %config.output_path.display(), "starting upload server");

    let server = Server::builder()
        .address(config.socket_addr())?
        .handler(UploadHandler::new(config.output_path))
        .build()?;

    server.run().await?;
    Ok(())
}
