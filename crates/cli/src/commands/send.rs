use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use promptcast_protocol::{DispatchOutcome, InboundRequest, InboundResponse, RequestContext};
use tracing::debug;

use crate::cli::SendArgs;
use crate::error::{CliError, Result};
use crate::output::{self, ErrorCode, OutputFormat, ResultBuilder};

/// Upper bound for one relay round trip; the relay applies its own readiness and send bounds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn execute(args: SendArgs, format: OutputFormat) -> Result<()> {
	let request = build_request(&args)?;
	let url = format!("{}/dispatch", args.addr.http_base());
	debug!(target = "promptcast.dispatch", %url, action = request.action(), "sending to relay");

	let client = reqwest::Client::builder()
		.timeout(REQUEST_TIMEOUT)
		.build()
		.map_err(|e| CliError::InvalidInput(format!("Failed to create HTTP client: {e}")))?;
	let response = client
		.post(&url)
		.json(&request)
		.send()
		.await
		.map_err(|source| CliError::RelayUnreachable { url: url.clone(), source })?;
	let response: InboundResponse = response.error_for_status()?.json().await?;

	match response {
		InboundResponse::Delivery(result) => report(DispatchOutcome { results: vec![result] }, format),
		InboundResponse::Outcome(outcome) => report(outcome, format),
		InboundResponse::Error { code, message } => Err(CliError::Rejected { code, message }),
		InboundResponse::Providers { .. } => Err(anyhow!("relay answered a dispatch with a provider list").into()),
	}
}

fn build_request(args: &SendArgs) -> Result<InboundRequest> {
	let mut context = RequestContext::new(args.prompt_text()).with_timestamp(now_ms());
	if !context.has_prompt() {
		return Err(CliError::InvalidInput("prompt must not be empty".to_string()));
	}
	context.url = args.url.clone();
	context.title = args.title.clone();
	context.selected_text = args.selection.clone();

	Ok(match &args.provider {
		Some(provider) => InboundRequest::SendPrompt {
			provider: provider.as_str().into(),
			context,
		},
		None => InboundRequest::SendToAll { context },
	})
}

fn report(outcome: DispatchOutcome, format: OutputFormat) -> Result<()> {
	let failed = outcome.failures().count();
	let total = outcome.results.len();

	let mut builder = ResultBuilder::new("send").data(outcome);
	if failed > 0 {
		builder = builder.error(ErrorCode::DeliveryFailed, format!("{failed} of {total} providers failed"));
	}
	output::print_result(&builder.build(), format, output::render_outcome);

	if failed > 0 { Err(CliError::OutputAlreadyPrinted) } else { Ok(()) }
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}
