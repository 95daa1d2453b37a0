//! Demonstrates a gateway transparently refreshing an expired session cookie and retrying the
//! original request once, using the default reqwest transport against a local mock backend.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use auth_gateway::{config::GatewayConfig, gateway::ReqwestGateway, url::Url};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/bookings").header("cookie", "session=expired");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).header("set-cookie", "session=renewed; Path=/");
		})
		.await;
	let renewed = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/bookings").header("cookie", "session=renewed");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"court":3,"slot":"18:00"}]"#);
		})
		.await;
	let config = GatewayConfig::builder().parse_base_url(&server.base_url())?.build()?;
	let gateway = ReqwestGateway::new(config)?;

	gateway
		.http_client
		.cookies()
		.add_cookie_str("session=expired; Path=/", &Url::parse(&server.base_url())?);

	let response = gateway.get("api/bookings").await?;

	expired.assert_async().await;
	refresh.assert_async().await;
	renewed.assert_async().await;

	println!("status: {}", response.status());
	println!("bookings: {}", response.text());
	println!(
		"refreshes: {}, retries: {}",
		gateway.metrics().refresh_successes(),
		gateway.metrics().retries()
	);

	Ok(())
}
