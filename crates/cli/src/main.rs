mod cmd;
mod discover;
mod logging;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use codemap_core::config::Config;

#[derive(Debug, Parser)]
#[command(name = "cmap", version, about = "Atomic code-anchored notes with backlinks")]
struct Cli {
    /// Config file path (default: ~/.config/codemap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project file path (default: discovered by walking parent dirs)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Emit JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an empty project file in the current directory
    Init(InitArgs),

    /// List notes, optionally restricted to one source file
    List(ListArgs),

    /// Show one note by id or display path
    Show { target: String },

    /// Search note content for a query string
    Search(SearchArgs),

    /// Show notes linking to the given note
    Backlinks { id: String },

    /// Show notes with no backlinks and no parent
    Orphans,

    /// Show the most-referenced notes
    Popular {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Traverse the link graph around a note
    Related(RelatedArgs),

    /// Dump the whole link graph as JSON
    Graph,

    /// Add a note
    Add(AddArgs),

    /// Replace a note's content
    Update { id: String, content: String },

    /// Delete a note and its descendants
    Delete { id: String },

    /// Move a note to another file/line
    Move(MoveArgs),

    /// Rewrite the project file in the canonical dialect
    Migrate,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Project name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only notes attached to this source file
    #[arg(long)]
    pub in_file: Option<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct RelatedArgs {
    pub id: String,

    #[arg(long, default_value_t = 2)]
    pub depth: usize,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Source file the note is attached to
    #[arg(long)]
    pub to: String,

    /// Source line within the file
    #[arg(long)]
    pub line: Option<u32>,

    /// Parent note id
    #[arg(long)]
    pub parent: Option<String>,

    /// Note author: human or ai
    #[arg(long, default_value = "human")]
    pub author: String,

    /// Note type: note or memory
    #[arg(long = "type", default_value = "note")]
    pub note_type: String,

    /// Note content (lines split on \n)
    pub content: String,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    pub id: String,

    /// New source file
    #[arg(long)]
    pub to: String,

    /// New source line
    #[arg(long)]
    pub line: Option<u32>,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&config.logging);

    match cli.command {
        Commands::Init(args) => cmd::init::run(&config, args),
        Commands::List(args) => {
            cmd::query::list(&config, cli.file.as_deref(), cli.json, args)
        }
        Commands::Show { target } => {
            cmd::query::show(&config, cli.file.as_deref(), cli.json, &target)
        }
        Commands::Search(args) => {
            cmd::query::search(&config, cli.file.as_deref(), cli.json, args)
        }
        Commands::Backlinks { id } => {
            cmd::query::backlinks(&config, cli.file.as_deref(), cli.json, &id)
        }
        Commands::Orphans => cmd::query::orphans(&config, cli.file.as_deref(), cli.json),
        Commands::Popular { limit } => {
            cmd::query::popular(&config, cli.file.as_deref(), cli.json, limit)
        }
        Commands::Related(args) => {
            cmd::query::related(&config, cli.file.as_deref(), cli.json, args)
        }
        Commands::Graph => cmd::query::graph(&config, cli.file.as_deref()),
        Commands::Add(args) => cmd::edit::add(&config, cli.file.as_deref(), args),
        Commands::Update { id, content } => {
            cmd::edit::update(&config, cli.file.as_deref(), &id, &content)
        }
        Commands::Delete { id } => cmd::edit::delete(&config, cli.file.as_deref(), &id),
        Commands::Move(args) => cmd::edit::move_note(&config, cli.file.as_deref(), args),
        Commands::Migrate => cmd::edit::migrate(&config, cli.file.as_deref()),
    }
}
