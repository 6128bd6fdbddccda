//! CRYPTEX read API server binary - standalone process serving The Interface.

use the_coordinator::TheCharter;
use the_interface::TheInterface;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let charter = TheCharter::the_charter_loading(None)?;
    charter.validate().map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;

    the_collective::the_chronicler_awakening(&charter.logging)?;

    tracing::info!("Starting The Interface");
    tracing::info!("Binding to: {}:{}", charter.commune.host, charter.commune.port);

    let interface = TheInterface::the_awakening(charter).await?;
    interface.the_manifestation().await?;

    Ok(())
}
