use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = ofr_api::Args::parse();

	ofr_api::run(args).await
}
