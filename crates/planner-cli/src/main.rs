use clap::{CommandFactory, Parser};
use clap_complete::generate;
use planner_algo::ObjectiveWeights;
use planner_cli::cli::{Cli, Commands};
use planner_cli::commands::{feasibility, plan, validate};
use std::io;
use tracing_subscriber::FmtSubscriber;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    match cli.command {
        Commands::Plan {
            input,
            out,
            weight_earliness,
            weight_runs,
            weight_capacity,
            format,
        } => plan::run(
            &input,
            out.as_deref(),
            ObjectiveWeights {
                earliness: weight_earliness,
                activated_runs: weight_runs,
                capacity_used: weight_capacity,
            },
            format,
        ),
        Commands::Feasibility { input, format } => feasibility::run(&input, format),
        Commands::Validate { input } => validate::run(&input),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
