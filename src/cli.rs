use clap::{ArgAction, Parser, Subcommand};
use revive_config::Config;
use std::path::PathBuf;

/// Recover a torrent client's lost or corrupted state.
///
/// Nothing in the client's data directory or in any backup is modified:
/// everything is written to the recovery directory, to be reviewed and
/// copied over by hand with the client stopped.
#[derive(Parser, Debug)]
#[command(name = "revive", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Configuration file (TOML, YAML or JSON) to use instead of the user's.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// The client's data directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    /// Where recovered files are written.
    #[arg(long, global = true, value_name = "DIR")]
    pub recovery_dir: Option<PathBuf>,
    /// Directory holding dated backup snapshots. Repeat for several.
    #[arg(long = "backup-dir", global = true, value_name = "DIR")]
    pub backup_dirs: Vec<PathBuf>,
    /// Number of concurrent workers (file name search and index scans).
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,
    /// More logging. Repeat for more.
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Less logging. Repeat for less.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Repair corrupted state files in the client's active directory.
    FixActive,
    /// Recover missing torrents from backups by file name.
    Simple,
    /// Recover missing torrents from backups by info-hash (builds the
    /// content index first).
    Advanced,
    /// Rebuild missing torrents from the client's live state files.
    Active,
    /// Build or extend the content index and print its statistics.
    Index,
}

impl Cli {
    /// Flags take precedence over every configuration source.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.recovery_dir {
            config.recovery_dir = Some(dir.clone());
        }
        if !self.backup_dirs.is_empty() {
            config.backup_directories = self.backup_dirs.clone();
        }
        if let Some(workers) = self.workers {
            config.simple_workers = workers;
            config.index_concurrency = workers;
        }
    }

    /// Net verbosity relative to the configured level.
    pub fn verbosity(&self) -> i8 {
        i8::try_from(self.verbose).unwrap_or(i8::MAX).saturating_sub(i8::try_from(self.quiet).unwrap_or(i8::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["revive", "fix-active"], Command::FixActive)]
    #[case(&["revive", "simple"], Command::Simple)]
    #[case(&["revive", "advanced"], Command::Advanced)]
    #[case(&["revive", "active"], Command::Active)]
    #[case(&["revive", "index"], Command::Index)]
    fn test_subcommands(#[case] args: &[&str], #[case] expected: Command) {
        assert_eq!(Cli::try_parse_from(args).unwrap().command, expected);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "revive",
            "simple",
            "--data-dir",
            "/data",
            "--backup-dir",
            "/b1",
            "--backup-dir",
            "/b2",
            "--workers",
            "3",
            "-vv",
        ])
        .unwrap();
        let mut config = Config {
            backup_directories: vec![PathBuf::from("/configured")],
            ..Config::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.recovery_dir, None);
        assert_eq!(config.backup_directories, vec![PathBuf::from("/b1"), PathBuf::from("/b2")]);
        assert_eq!((config.simple_workers, config.index_concurrency), (3, 3));
        assert_eq!(cli.verbosity(), 2);
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let cli = Cli::try_parse_from(["revive", "index", "-q"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
        assert_eq!(cli.verbosity(), -1);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["revive", "index", "-v", "-q"]).is_err());
    }
}
