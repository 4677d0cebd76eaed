use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	compass_worker::run(compass_worker::Args::parse()).await
}
