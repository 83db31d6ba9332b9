use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use college_lms::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "College LMS",
    about = "Run the college learning-management service from the command line",
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
    /// Create the relational schema in the configured database
    Migrate(MigrateArgs),
    /// Walk a student from registration to certificate against an in-memory store
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
    /// Override DATABASE_URL (e.g. sqlite:college.db)
    #[arg(long)]
    pub(crate) database_url: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct MigrateArgs {
    /// Override DATABASE_URL (e.g. sqlite:college.db)
    #[arg(long)]
    pub(crate) database_url: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Migrate(args) => server::migrate(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
