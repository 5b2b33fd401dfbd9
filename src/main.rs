use clap::{Parser, Subcommand};
use release_radar_lib::{
    bracket::{BracketSnapshot, Slot, VoteChange},
    config::data_dir,
    export_calendar, ingest, init_tracing, load_app_config, open_catalog, open_user_state, serve,
    types::AppConfig,
    write_calendar, write_sitemap,
};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "release-radar")]
#[command(about = "Track upcoming game releases and rank them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull releases from IGDB and RAWG into the catalog
    Ingest {
        /// Release year (defaults to targetYear from config)
        #[arg(long)]
        year: Option<i32>,

        /// Directory for games.json and meta.json
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Search IGDB for a cover image
    Cover {
        title: String,
    },

    /// Write sitemap.xml
    Sitemap {
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Export release dates as iCalendar
    Calendar {
        /// Only games on the watchlist
        #[arg(long, default_value = "false")]
        watchlisted: bool,

        /// A single game
        #[arg(long)]
        slug: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Inspect or vote in the most-anticipated bracket
    Bracket {
        #[command(subcommand)]
        action: BracketAction,
    },

    /// Run the preview server
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Subcommand)]
enum BracketAction {
    Show,
    /// Pick (or un-pick) the winner of a match
    Vote {
        round: usize,
        r#match: usize,
        game_id: String,
    },
    Reset,
}

fn slot_label(slot: &Slot) -> String {
    match slot {
        Slot::Entrant(entrant) => format!("#{} {} ({})", entrant.seed, entrant.title, entrant.id),
        Slot::Pending => "TBD".to_string(),
        Slot::Vacant => "BYE".to_string(),
    }
}

fn print_bracket(snapshot: &BracketSnapshot) {
    for round in snapshot.rounds.iter().take(snapshot.rounds.len().saturating_sub(1)) {
        println!("{}", round.label);
        for (index, pair) in round.slots.chunks(2).enumerate() {
            let picked = snapshot.votes.get(round.index, index).unwrap_or("-");
            let right = pair.get(1).map(slot_label).unwrap_or_default();
            println!("  [{}-{}] {} vs {}  -> {}", round.index, index, slot_label(&pair[0]), right, picked);
        }
    }
    match snapshot.champion.as_ref() {
        Some(champion) => println!("Champion: {}", champion.title),
        None => println!(
            "Champion: undecided ({}/{} matches decided)",
            snapshot.decided_matches, snapshot.total_matches
        ),
    }
}

fn run_bracket(config: &AppConfig, action: BracketAction) -> Result<(), String> {
    let catalog = open_catalog(config)?;
    let mut user_state = open_user_state(config)?;
    match action {
        BracketAction::Show => {
            let bracket = user_state.bracket(&catalog, config.bracket_size)?;
            print_bracket(&bracket.snapshot());
        }
        BracketAction::Vote { round, r#match, game_id } => {
            let (change, bracket) =
                user_state.bracket_vote(&catalog, config.bracket_size, round, r#match, &game_id)?;
            match change {
                VoteChange::Recorded => println!("Recorded {game_id} for match {round}-{}", r#match),
                VoteChange::Cleared => println!("Cleared vote for match {round}-{}", r#match),
            }
            print_bracket(&bracket.snapshot());
        }
        BracketAction::Reset => {
            user_state.reset_bracket()?;
            println!("Bracket votes cleared");
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    let config = load_app_config()?;

    match cli.command {
        Commands::Ingest { year, out_dir } => {
            let year = year.unwrap_or(config.target_year);
            let out_dir = out_dir.unwrap_or_else(|| data_dir(&config));
            let report = ingest::run_ingest(&config, year, &out_dir)?;
            println!(
                "Wrote {} games ({} IGDB, {} RAWG) to {}",
                report.written,
                report.igdb_count,
                report.rawg_count,
                report.catalog_path.display()
            );
        }
        Commands::Cover { title } => {
            let hits = ingest::lookup_cover(&config, &title)?;
            if hits.is_empty() {
                println!("No IGDB match for {title:?}");
            }
            for hit in hits {
                println!("{}: {}", hit.title, hit.cover_url.as_deref().unwrap_or("(no cover)"));
            }
        }
        Commands::Sitemap { out } => {
            let path = write_sitemap(&config, out)?;
            println!("Wrote {}", path.display());
        }
        Commands::Calendar { watchlisted, slug, out } => {
            let ics = export_calendar(&config, watchlisted, slug.as_deref())?;
            match out {
                Some(path) => {
                    write_calendar(&path, &ics)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{ics}"),
            }
        }
        Commands::Bracket { action } => run_bracket(&config, action)?,
        Commands::Serve { addr } => serve(config, addr)?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let guard = init_tracing();
    if let Err(e) = run(cli) {
        error!("{e}");
        drop(guard);
        std::process::exit(1);
    }
}
