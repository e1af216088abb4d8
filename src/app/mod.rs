pub mod args;
pub mod config;
mod setup;
mod tail;

pub use args::AppArgs;

use anyhow::Result;

pub async fn launch() -> Result<()> {
    launch_with_args(AppArgs::from_cli()).await
}

pub async fn launch_with_args(args: AppArgs) -> Result<()> {
    let setup::PreparedApp {
        settings,
        translator,
    } = setup::prepare(args).await?;

    tail::run(settings, translator).await
}
