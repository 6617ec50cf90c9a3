use clap::{Parser, Subcommand};

use proxy_route_controller::admin::{AdminClient, CallContext};
use proxy_route_controller::resource::types::DEFAULT_SERVER_NAME;
use proxy_route_controller::routing::route_id;

#[derive(Parser)]
#[command(name = "routectl")]
#[command(about = "Inspect and manage routes through the Caddy admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:2019")]
    endpoint: String,

    #[arg(short, long, default_value = DEFAULT_SERVER_NAME)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes with their index and identity
    List,
    /// Show the route with the given identity
    Get { id: String },
    /// Delete the route with the given identity
    Delete { id: String },
    /// Show proxy-wide upstream health
    Upstreams,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = AdminClient::new(&cli.endpoint, reqwest::Client::new());
    let ctx = CallContext::background();

    match cli.command {
        Commands::List => {
            let routes = client.list_routes(&ctx, &cli.server).await?;
            for (index, route) in routes.iter().enumerate() {
                println!("{index}\t{}\t{}", route_id(route), serde_json::to_string(route)?);
            }
        }
        Commands::Get { id } => {
            let route = client.get_route(&ctx, &cli.server, &id).await?;
            println!("{}", serde_json::to_string_pretty(&route)?);
        }
        Commands::Delete { id } => {
            client.delete_route(&ctx, &cli.server, &id).await?;
            println!("deleted {id}");
        }
        Commands::Upstreams => {
            let upstreams = client.upstream_health(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&upstreams)?);
        }
    }

    Ok(())
}
