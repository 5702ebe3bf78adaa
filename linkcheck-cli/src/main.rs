mod http_client;

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use linkcheck_core::source::FileLinkSource;
use linkcheck_core::stream::{LinkStream, ValidationErrorStream};

use http_client::ReqwestHttpClient;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(version, about = "Validates a pre-discovered list of documentation-site links")]
struct Cli {
    /// File with one resolved link URI per line (blank lines and `#` comments ignored)
    links: PathBuf,

    /// TOML configuration file; defaults are used if omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

fn print_text(errors: &ValidationErrorStream) {
    for result in errors.iter() {
        eprintln!("{}", errors.format_line(result));
    }
}

fn print_json(errors: &ValidationErrorStream) {
    for result in errors.iter() {
        let line = serde_json::json!({
            "resolvedUri": result.link().resolved_uri(),
            "statusCode": result.status_code(),
            "message": result.message(),
        });
        println!("{line}");
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    log::info!("validating links from {}", cli.links.display());
    let config = match &cli.config {
        Some(path) => linkcheck_config::load_config(path)?,
        None => linkcheck_config::parse_toml_config("")?,
    };

    let source = FileLinkSource::read(&cli.links)
        .with_context(|| format!("can't read links file {}", cli.links.display()))?;
    let http_client = Arc::new(ReqwestHttpClient::new()?);

    let stream = LinkStream::new(Box::new(source)).with_http_client(http_client);
    let stream = linkcheck_config::build_stream(&config, stream)?;

    let errors = stream.validate().await?;
    match cli.format {
        Format::Text => print_text(&errors),
        Format::Json => print_json(&errors),
    }

    Ok(!errors.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let has_errors = run(cli).await?;
    exit(if has_errors { 1 } else { 0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_values_are_distinct() {
        assert_ne!(Format::Text, Format::Json);
    }
}
