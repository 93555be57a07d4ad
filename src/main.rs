//! Puyotui: Puyo-style falling-pair chain puzzle game in the terminal.

mod app;
mod board;
mod game;
mod input;
mod piece;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Timing options for the simulation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Autonomous descent interval.
    pub drop_interval_ms: u64,
    /// How long cells about to clear are shown before removal.
    pub clear_hold_ms: u64,
    /// Pause after each clear pass before the next scan.
    pub settle_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            drop_interval_ms: 700,
            clear_hold_ms: 300,
            settle_ms: 200,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("drop interval must be at least 1 ms")]
    ZeroDropInterval,
    #[error("{name} of {value} ms is too long (max {max} ms)")]
    TooLong {
        name: &'static str,
        value: u64,
        max: u64,
    },
}

/// Upper bound for any single delay; longer values make the game unplayable.
const MAX_DELAY_MS: u64 = 60_000;

impl TryFrom<&Args> for GameConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        if args.drop_interval_ms == 0 {
            return Err(ConfigError::ZeroDropInterval);
        }
        for (name, value) in [
            ("drop interval", args.drop_interval_ms),
            ("clear hold", args.clear_hold_ms),
            ("settle delay", args.settle_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::TooLong {
                    name,
                    value,
                    max: MAX_DELAY_MS,
                });
            }
        }
        Ok(Self {
            drop_interval_ms: args.drop_interval_ms,
            clear_hold_ms: args.clear_hold_ms,
            settle_ms: args.settle_ms,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        init_logging(path)?;
    }
    let config = GameConfig::try_from(&args)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, ?config, "starting");
    let mut app = App::new(&args, config, theme, StdRng::seed_from_u64(seed));
    app.run()?;
    Ok(())
}

/// Route tracing output to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    Ok(())
}

/// Puyo-style chain puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "puyotui",
    version,
    about = "Puyo-style falling-pair puzzle in the terminal. Connect four or more of one colour to clear them and chain reactions.",
    long_about = "Puyotui is a terminal falling-pair puzzle.\n\n\
        Pairs of coloured blobs fall into a 6x12 well. Four or more of one colour touching \
        horizontally or vertically clear; blobs above fall and may set off a chain. Each \
        pass of a chain scores cells x 10 x pass number.\n\n\
        CONTROLS:\n  Left / a    Move left     Right / d   Move right\n  q           Rotate CW     e           Rotate CCW\n  \
        Down / s    Soft drop     Up / w / Space  Hard drop\n  r           Restart       Esc / Ctrl-C    Quit"
)]
pub struct Args {
    /// Autonomous descent interval in milliseconds.
    #[arg(long, default_value = "700", value_name = "MS")]
    pub drop_interval_ms: u64,

    /// How long cells about to clear flash before they are removed.
    #[arg(long, default_value = "300", value_name = "MS")]
    pub clear_hold_ms: u64,

    /// Delay after each clear pass before looking for the next one.
    #[arg(long = "settle-ms", default_value = "200", value_name = "MS")]
    pub settle_ms: u64,

    /// Seed for colour generation (random if not set).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses the built-in palette if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable the fade effect on clearing cells (they still flash).
    #[arg(long)]
    pub no_animation: bool,

    /// Write debug logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("puyotui").chain(extra.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_game_config() {
        let args = parse(&[]);
        assert_eq!(GameConfig::try_from(&args), Ok(GameConfig::default()));
        assert_eq!(args.palette, Palette::Normal);
        assert!(args.seed.is_none());
    }

    #[test]
    fn test_custom_timings() {
        let args = parse(&["--drop-interval-ms", "350", "--clear-hold-ms", "0", "--settle-ms", "50"]);
        let config = GameConfig::try_from(&args).unwrap();
        assert_eq!(config.drop_interval_ms, 350);
        assert_eq!(config.clear_hold_ms, 0);
        assert_eq!(config.settle_ms, 50);
    }

    #[test]
    fn test_zero_drop_interval_rejected() {
        let args = parse(&["--drop-interval-ms", "0"]);
        assert_eq!(GameConfig::try_from(&args), Err(ConfigError::ZeroDropInterval));
    }

    #[test]
    fn test_overlong_delay_rejected() {
        let args = parse(&["--clear-hold-ms", "600000"]);
        assert!(matches!(
            GameConfig::try_from(&args),
            Err(ConfigError::TooLong { name: "clear hold", .. })
        ));
    }

    #[test]
    fn test_palette_alias() {
        assert_eq!(parse(&["--palette", "colourblind"]).palette, Palette::Colorblind);
    }
}
