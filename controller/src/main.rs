use clap::{Parser, Subcommand};

use common::telemetry::init_telemetry;

use controller::command::serve::{ServeArgs, serve};
use controller::command::sim::{SimArgs, sim};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "HA pair controller")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Monitor both node agents and serve the read model
    Serve(ServeArgs),
    /// Run both node agents and the controller in one process
    Sim(SimArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("controller");

    let args = Args::parse();

    match args.cmd {
        Cmd::Serve(serve_args) => {
            serve(serve_args).await?;
        }
        Cmd::Sim(sim_args) => {
            sim(sim_args).await?;
        }
    }

    Ok(())
}
