use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::Source;

#[derive(Parser)]
#[command(
    name = "flat-bot",
    version,
    about = "Watch Berlin housing companies for new flats and apply automatically"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one cycle for every configured source
    Run {
        /// Only run these sources (repeatable, e.g. --source degewo)
        #[arg(long = "source")]
        sources: Vec<Source>,
    },
    /// Run cycles on an interval until interrupted
    Watch {
        /// Minutes between rounds [default: RUN_INTERVAL_MINUTES or 5]
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_minutes: Option<u64>,
    },
    /// Insert or update applicant profiles from a JSON array
    SeedProfiles {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// List recently seen offers
    Offers {
        /// Only offers seen within this many hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_sources() {
        let cli = Cli::parse_from(["flat-bot", "-v", "run", "--source", "wbm", "--source", "Howoge"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run { sources } => assert_eq!(sources, vec![Source::Wbm, Source::Howoge]),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["flat-bot", "watch", "--interval-minutes", "0"]).is_err());

        let cli = Cli::try_parse_from(["flat-bot", "watch", "--interval-minutes", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval_minutes: Some(10) }));
    }

    #[test]
    fn test_offers_defaults_to_one_day() {
        let cli = Cli::parse_from(["flat-bot", "offers"]);
        assert!(matches!(cli.command, Command::Offers { hours: 24 }));
    }
}
