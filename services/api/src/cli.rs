use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use seat_counselling::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Seat Counselling",
    about = "Run the seat counselling service or walk through a demo round",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Seed a sample round, run the allocation and print the results
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_accepts_repeated_decline_flags() {
        let cli = Cli::try_parse_from([
            "seat-counselling",
            "demo",
            "--decline",
            "stu-002",
            "--decline",
            "stu-005",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Demo(args)) => assert_eq!(args.decline, vec!["stu-002", "stu-005"]),
            other => panic!("expected demo command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["seat-counselling"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
