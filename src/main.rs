use clap::{Parser, Subcommand};
use hotdesk::config::Config;
use hotdesk::model::DeskState;
use hotdesk::output::Format;

#[derive(Parser)]
#[command(
    name = "hotdesk",
    version,
    about = "Coordinate desks on a shared account: tmux sessions, process tracking, a message board"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look at the board and reserve a desk name (no session yet)
    Prepare {
        /// Desk name
        name: String,
    },
    /// Check in: activate the desk and enter its tmux session
    Start {
        /// Desk name
        name: String,
    },
    /// Re-attach to a desk's running tmux session
    Resume {
        /// Desk name
        name: String,
    },
    /// Show the board: every desk, its state and current activity
    Status {
        /// Only show desks in this state
        #[arg(long, value_enum)]
        state: Option<DeskState>,
    },
    /// Snapshot a desk's processes, with an optional note
    Save {
        /// Desk name
        name: String,
    },
    /// Check out: auto-save, kill the session, stop tracked processes
    Stop {
        /// Desk name
        name: String,
    },
    /// Post a message to the shared board
    Msg {
        /// Posting desk name
        desk: String,
        /// Message text (read from stdin or prompted when omitted)
        text: Option<String>,
    },
    /// Reply to a board message
    Reply {
        /// Posting desk name
        desk: String,
        /// Id of the message being answered
        id: String,
        /// Reply text (read from stdin or prompted when omitted)
        text: Option<String>,
    },
    /// Show the shared message board
    Messages {
        /// Number of messages to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
    /// Check cgroup availability and print the one-time admin setup
    SetupCgroup,
}

fn run(cli: Cli, format: Format) -> hotdesk::error::Result<()> {
    let config = Config::from_env();

    match cli.command {
        Commands::Prepare { name } => hotdesk::commands::prepare::run(&config, &name, format),
        Commands::Start { name } => hotdesk::commands::start::run(&config, &name),
        Commands::Resume { name } => hotdesk::commands::resume::run(&config, &name),
        Commands::Status { state } => hotdesk::commands::status::run(&config, state, format),
        Commands::Save { name } => hotdesk::commands::save::run(&config, &name, format),
        Commands::Stop { name } => hotdesk::commands::stop::run(&config, &name, format),
        Commands::Msg { desk, text } => hotdesk::commands::board::msg(&config, &desk, text, format),
        Commands::Reply { desk, id, text } => {
            hotdesk::commands::board::reply(&config, &desk, &id, text, format)
        }
        Commands::Messages { limit } => hotdesk::commands::board::messages(&config, limit, format),
        Commands::SetupCgroup => hotdesk::commands::setup_cgroup::run(&config, format),
    }
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
