mod app;
mod client;
mod config;
mod error;
mod logging;
mod session;
mod ui;

use crate::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = config::load()?;
    logging::init(&config.log_file, &config.log_level)?;

    let session = session::Session::load(&config.session_path)?;
    session.apply_to(&mut config);

    let mut app = app::App::new(config, session)?;
    app.run().await?;
    Ok(())
}
