mod providers;
mod send;
mod serve;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::output::OutputFormat;

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	match cli.command {
		Commands::Serve(args) => serve::execute(args).await,
		Commands::Providers(args) => providers::execute(args, format),
		Commands::Send(args) => send::execute(args, format).await,
	}
}
