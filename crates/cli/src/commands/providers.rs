use promptcast_protocol::ProviderDescriptor;

use crate::cli::ProvidersArgs;
use crate::config::load_providers;
use crate::error::Result;
use crate::output::{self, OutputFormat, ResultBuilder};

pub fn execute(args: ProvidersArgs, format: OutputFormat) -> Result<()> {
	let (providers, source) = load_providers(args.providers.as_deref())?;

	let result = ResultBuilder::<Vec<ProviderDescriptor>>::new("providers")
		.data(providers.all().to_vec())
		.build();
	output::print_result(&result, format, |data| {
		format!("{}({} providers from {source}; * = enabled)\n", output::render_providers(data), data.len())
	});
	Ok(())
}
