use clap::Parser;
use env_logger::Env;
use log::warn;
use nuguessr::{
    catalog::{Catalog, GameLink, DEFAULT_CATALOG},
    config::{Config, ConfigStore, FileConfigStore},
    geo::Coordinate,
    history::{HistoryDb, LeaderboardSort, PlayerTotals, ReportSink, SessionRecord},
    play::{play_session, PlayOutcome},
    round::RoundTarget,
    runtime::{FixedTicker, Runner, StdinEventSource},
    session::SessionEngine,
};
use std::{
    error::Error,
    fs::File,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};
use unicode_width::UnicodeWidthStr;

const TICK_RATE_MS: u64 = 100;
const HISTORY_LIMIT: usize = 10;
/// Ticks between reloads of the places file while a round is blocked.
const RELOAD_EVERY_TICKS: u32 = 10;

/// guess where a campus photo was taken, one pin per round
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A location guessing game: each round shows a photo of a place, you answer with lat,lon before the countdown runs out and score up to 5000 points for getting close."
)]
pub struct Cli {
    /// number of rounds to play
    #[clap(short = 'r', long)]
    rounds: Option<usize>,

    /// seconds allowed per round
    #[clap(short = 's', long)]
    secs: Option<u64>,

    /// replay a game link such as 3-7-1-12-5
    #[clap(short = 'l', long)]
    link: Option<String>,

    /// JSON places file to use instead of the bundled campus catalog
    #[clap(short = 'p', long)]
    places: Option<PathBuf>,

    /// name recorded with the session
    #[clap(short = 'n', long)]
    player: Option<String>,

    /// persist the given options as the new defaults
    #[clap(long)]
    save_config: bool,

    /// list recently played sessions and exit
    #[clap(long)]
    history: bool,

    /// show the player leaderboard and exit
    #[clap(long)]
    leaderboard: bool,

    /// leaderboard ordering
    #[clap(long, value_enum, default_value_t = LeaderboardSort::TotalScore)]
    sort: LeaderboardSort,

    /// only list players whose name contains this text
    #[clap(long)]
    filter: Option<String>,

    /// write every recorded round to a CSV file and exit
    #[clap(long)]
    export: Option<PathBuf>,

    /// show totals and recent games for the player and exit
    #[clap(long)]
    profile: bool,

    /// delete all recorded games and exit
    #[clap(long)]
    clear_history: bool,
}

impl Cli {
    /// Command line values take precedence over the stored config
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(secs) = self.secs {
            config.round_secs = secs;
        }
        if let Some(player) = &self.player {
            config.player = player.clone();
        }
        if let Some(places) = &self.places {
            config.places_file = Some(places.display().to_string());
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());

    if cli.save_config {
        store.save(&config)?;
        println!("Saved settings to {}", store.path().display());
    }

    if cli.history || cli.leaderboard || cli.profile || cli.clear_history || cli.export.is_some() {
        let db = HistoryDb::new()?;
        let mut stdout = io::stdout();
        if cli.clear_history {
            db.clear_all()?;
            println!("History cleared");
        }
        if let Some(path) = &cli.export {
            let rows = db.export_csv(File::create(path)?)?;
            println!("Exported {rows} rounds to {}", path.display());
        }
        if cli.history {
            print_history(&mut stdout, &db.recent_sessions(None, HISTORY_LIMIT)?)?;
        }
        if cli.leaderboard {
            print_leaderboard(&mut stdout, &db.leaderboard(cli.sort, cli.filter.as_deref())?)?;
        }
        if cli.profile {
            let totals = db.player_totals(&config.player)?;
            let recent = db.recent_sessions(Some(&config.player), HISTORY_LIMIT)?;
            print_profile(&mut stdout, &config.player, totals.as_ref(), &recent)?;
        }
        return Ok(());
    }

    play(&cli, &config)
}

fn load_catalog(config: &Config) -> Result<Catalog, Box<dyn Error>> {
    Ok(match &config.places_file {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::bundled(DEFAULT_CATALOG)?,
    })
}

fn play(cli: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let catalog = load_catalog(config)?;
    let link = match &cli.link {
        Some(link) => link.parse::<GameLink>()?,
        None => catalog.random_link(config.rounds, &mut rand::thread_rng())?,
    };
    let targets = catalog.targets_for(&link)?;
    let engine = SessionEngine::start(targets, config.scoring)?;

    let runner = Runner::new(
        StdinEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    let mut stdout = io::stdout();
    writeln!(stdout, "Playing {} rounds. Type lat,lon to guess or q to quit.", link.len())?;

    let mut polls = 0;
    let locate = |target: &RoundTarget| -> Option<Coordinate> {
        polls += 1;
        if polls % RELOAD_EVERY_TICKS != 0 {
            return None;
        }
        let path = config.places_file.as_ref()?;
        let place = Catalog::from_file(path).ok()?.get(target.id)?.to_target().ok()?;
        place.location
    };

    match play_session(engine, &runner, config.round_secs, &mut stdout, locate)? {
        PlayOutcome::Finished(summary) => {
            writeln!(stdout, "Replay this game with --link {}", link.path())?;
            match HistoryDb::new() {
                Ok(mut db) => {
                    db.record(&config.player, &summary)?;
                    let games = db.games_played(&config.player)?;
                    writeln!(stdout, "{} has played {games} games", config.player)?;
                }
                Err(e) => warn!("history unavailable, session not saved: {e}"),
            }
        }
        PlayOutcome::Quit { completed_rounds } => {
            writeln!(stdout, "Stopped after {completed_rounds} rounds, nothing saved")?;
        }
    }
    Ok(())
}

fn print_history<W: Write>(out: &mut W, sessions: &[SessionRecord]) -> io::Result<()> {
    if sessions.is_empty() {
        return writeln!(out, "No games played yet");
    }
    let width = name_width(sessions.iter().map(|s| s.player.as_str()));
    for s in sessions {
        writeln!(
            out,
            "{} {:>6}/{:<6} {:<16} {}",
            pad(&s.player, width),
            s.total_points,
            s.max_points,
            s.link,
            s.played_ago()
        )?;
    }
    Ok(())
}

fn print_profile<W: Write>(
    out: &mut W,
    player: &str,
    totals: Option<&PlayerTotals>,
    recent: &[SessionRecord],
) -> io::Result<()> {
    let Some(t) = totals else {
        return writeln!(out, "{player} has not played yet");
    };
    writeln!(out, "{player}")?;
    writeln!(out, "  games played: {}", t.games_played)?;
    writeln!(out, "  total score:  {}", t.total_score)?;
    writeln!(out, "  best game:    {}", t.best_score)?;
    writeln!(out, "  average:      {:.0}", t.avg_score)?;
    writeln!(out)?;
    print_history(out, recent)
}

fn print_leaderboard<W: Write>(out: &mut W, rows: &[PlayerTotals]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "No players found");
    }
    let width = name_width(rows.iter().map(|r| r.player.as_str()));
    writeln!(
        out,
        "{:>3} {} {:>6} {:>9} {:>8} {:>6}",
        "#",
        pad("player", width),
        "games",
        "total",
        "avg",
        "best"
    )?;
    for (rank, r) in rows.iter().enumerate() {
        writeln!(
            out,
            "{:>3} {} {:>6} {:>9} {:>8.0} {:>6}",
            rank + 1,
            pad(&r.player, width),
            r.games_played,
            r.total_score,
            r.avg_score,
            r.best_score
        )?;
    }
    Ok(())
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(UnicodeWidthStr::width).max().unwrap_or(0).max("player".len())
}

/// Left-aligns by display width so wide characters keep columns straight
fn pad(name: &str, width: usize) -> String {
    let fill = width.saturating_sub(name.width());
    format!("{name}{}", " ".repeat(fill))
}
