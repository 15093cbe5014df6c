use std::sync::Arc;

use promptcast::DispatchCoordinator;
use tracing::info;

use crate::cli::ServeArgs;
use crate::config::load_providers;
use crate::error::{CliError, Result};
use crate::relay::{self, AppState, RelayHub};

pub async fn execute(args: ServeArgs) -> Result<()> {
	let (providers, source) = load_providers(args.providers.as_deref())?;
	let options = args.timing.options();
	info!(
		target = "promptcast.relay",
		%source,
		providers = providers.len(),
		enabled = providers.enabled().count(),
		ready_timeout_ms = options.ready_timeout.as_millis() as u64,
		"provider set loaded"
	);

	// Host calls share the send bound; a hung extension round trip is treated like a hung send.
	let hub = Arc::new(RelayHub::new(options.send_timeout));
	let coordinator = Arc::new(DispatchCoordinator::new(providers, hub.clone(), options));
	let monitor = coordinator.monitor().spawn(hub.subscribe_closed());

	let result = relay::run_relay_server(&args.addr.host, args.addr.port, AppState::new(hub, coordinator)).await;
	monitor.abort();
	result.map_err(CliError::Anyhow)
}
