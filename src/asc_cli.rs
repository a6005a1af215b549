use clap::Parser;
use std::path::PathBuf;

use crate::asc_app::MIN_MINES;
use crate::asc_assets::Language;
use crate::asc_config::PlatformChoice;

/// Minesweeper on an asteroid field, for the Raspberry Pi framebuffer and the terminal
#[derive(Parser, Debug)]
#[command(name = "asteroidscanner")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Interface language
    #[arg(value_enum, ignore_case = true)]
    pub language: Language,

    /// Number of asteroids on the field
    #[arg(value_name = "MINECOUNT", value_parser = parse_mine_count)]
    pub mine_count: usize,

    /// Same as --ai-debug
    #[arg(value_parser = ["ai", "debug"], ignore_case = true)]
    pub mode: Option<String>,

    /// Show board generation and the solver at work before playing
    #[arg(long = "ai-debug", visible_alias = "ai")]
    pub ai_debug: bool,

    /// Input/output backend (overrides the config file)
    #[arg(long, value_enum)]
    pub platform: Option<PlatformChoice>,

    /// Read this config file instead of the per-user one
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for reproducible boards
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    pub fn debug_enabled(&self) -> bool {
        self.ai_debug || self.mode.is_some()
    }
}

pub fn parse_mine_count(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a whole number"))?;
    if n < MIN_MINES {
        return Err(format!("must be at least {MIN_MINES}"));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("asteroidscanner").chain(args.iter().copied()))
    }

    #[test]
    fn minimal_arguments() {
        let cli = parse(&["EN", "10"]).expect("valid");
        assert_eq!(cli.language, Language::En);
        assert_eq!(cli.mine_count, 10);
        assert!(!cli.debug_enabled());
        assert_eq!(cli.platform, None);
        assert_eq!(cli.seed, None);
    }

    #[test]
    fn language_is_case_insensitive() {
        assert_eq!(parse(&["de", "12"]).expect("valid").language, Language::De);
        assert_eq!(parse(&["En", "12"]).expect("valid").language, Language::En);
        assert!(parse(&["FR", "12"]).is_err());
    }

    #[test]
    fn mine_count_is_validated() {
        assert!(parse(&["EN", "9"]).is_err());
        assert!(parse(&["EN", "ten"]).is_err());
        assert!(parse(&["EN", "-3"]).is_err());
        assert!(parse(&["EN"]).is_err());
        assert_eq!(parse_mine_count("25"), Ok(25));
    }

    #[test]
    fn every_debug_spelling_enables_debugger() {
        for args in [
            &["EN", "10", "ai"][..],
            &["EN", "10", "debug"],
            &["EN", "10", "--ai-debug"],
            &["EN", "10", "--ai"],
        ] {
            assert!(parse(args).expect("valid").debug_enabled(), "{args:?}");
        }
        assert!(parse(&["EN", "10", "verbose"]).is_err());
    }

    #[test]
    fn options_parse() {
        let cli = parse(&["DE", "20", "--platform", "pi", "--seed", "7", "--config", "/tmp/a.toml"])
            .expect("valid");
        assert_eq!(cli.platform, Some(PlatformChoice::Pi));
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));
        assert!(parse(&["EN", "10", "--platform", "window"]).is_err());
    }
}
