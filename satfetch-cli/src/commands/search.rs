//! `search` command: list catalog products matching the filters.

use clap::Args;
use satfetch::config::ConfigFile;
use satfetch::ProductDescriptor;
use tracing::info;

use super::common::{http_client, network_config, provider_chain, FilterArgs};
use crate::error::CliError;

/// Arguments for `satfetch search`.
#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Connect/read timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print only product names, one per line
    #[arg(long)]
    pub names_only: bool,
}

/// Run the search and print one line per product.
pub fn run(args: SearchArgs) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let query = args.filters.query()?;

    let client = http_client(&network_config(&config, args.timeout))?;
    let chain = provider_chain(&args.filters, &config, client);

    let products = if chain.secondary().is_some() {
        chain.search_all(&query)?
    } else {
        chain.search(&query)?
    };
    info!(provider = chain.primary().name(), count = products.len(), "Search finished");

    for product in &products {
        if args.names_only {
            println!("{}", product.name());
        } else {
            println!("{}", product_line(product));
        }
    }

    if !args.names_only {
        println!();
        println!("{} product(s) found", products.len());
    }
    Ok(())
}

/// `name  date  clouds  id`, with `-` for missing fields.
fn product_line(product: &ProductDescriptor) -> String {
    let date = product
        .sensing_date()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let clouds = product
        .clouds_percentage()
        .map(|c| format!("{:5.1}%", c))
        .unwrap_or_else(|| "    -".to_string());
    format!(
        "{}  {}  {}  {}",
        product.name(),
        date,
        clouds,
        product.id().unwrap_or("-")
    )
}
