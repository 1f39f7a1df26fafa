use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use simplefs_rs::Geometry;
use simplefs_rs::layout::constants::{
    BLOCK_SIZE, DEFAULT_IMAGE_NAME, DISK_SIZE, MAX_NAME_LEN, METADATA_SIZE,
};

#[derive(Parser)]
#[command(name = "simplefs", author, version, about = "Operate on a simplefs disk image")]
pub struct Cli {
    #[command(flatten)]
    pub image: ImageArgs,

    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create and format the image if it does not exist yet.
    Init,
    /// Reset the image to an empty filesystem.
    Format,
    Create {
        name: String,
    },
    Delete {
        name: String,
    },
    /// Replace a file's content.
    Write {
        name: String,
        #[command(flatten)]
        input: InputArgs,
    },
    Read {
        name: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Bytes to read; defaults to the rest of the file.
        #[arg(long)]
        size: Option<usize>,
    },
    Cat {
        name: String,
    },
    Ls,
    Stat {
        name: String,
    },
    Rename {
        old: String,
        new: String,
    },
    Mv {
        old: String,
        new: String,
    },
    /// Exit with status 0 if the file exists, 1 otherwise.
    Exists {
        name: String,
    },
    Size {
        name: String,
    },
    Append {
        name: String,
        #[command(flatten)]
        input: InputArgs,
    },
    Truncate {
        name: String,
        size: u64,
    },
    Cp {
        src: String,
        dst: String,
    },
    /// Exit with status 0 if both files are identical, 1 otherwise.
    Diff {
        a: String,
        b: String,
    },
    Defrag,
    /// Verify that the superblock, file table and bitmap agree.
    Check,
    Backup {
        path: PathBuf,
    },
    Restore {
        path: PathBuf,
    },
    /// Show block and file table usage.
    Df,
}

#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    #[arg(long, env = "SIMPLEFS_IMAGE", default_value = DEFAULT_IMAGE_NAME)]
    pub image: PathBuf,

    #[arg(long, env = "SIMPLEFS_BLOCK_SIZE", default_value_t = BLOCK_SIZE)]
    pub block_size: usize,

    #[arg(long, env = "SIMPLEFS_DISK_SIZE", default_value_t = DISK_SIZE)]
    pub disk_size: u64,

    #[arg(long, env = "SIMPLEFS_METADATA_SIZE", default_value_t = METADATA_SIZE)]
    pub metadata_size: usize,

    #[arg(long, env = "SIMPLEFS_MAX_NAME_LEN", default_value_t = MAX_NAME_LEN)]
    pub max_name_len: usize,
}

impl ImageArgs {
    /// `geometry` builds the validated image layout from the size flags.
    ///
    /// # Errors
    /// Returns an error if the sizes do not describe a usable image.
    pub fn geometry(&self) -> anyhow::Result<Geometry> {
        Geometry::new(
            self.block_size,
            self.disk_size,
            self.metadata_size,
            self.max_name_len,
        )
        .context("invalid image geometry")
    }
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Append-only operation log.
    #[arg(long, env = "SIMPLEFS_LOG_FILE", default_value = "simplefs.log")]
    pub log_file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Literal content.
    #[arg(long, conflicts_with = "from", required_unless_present = "from")]
    pub data: Option<String>,

    /// Read content from a host file.
    #[arg(long)]
    pub from: Option<PathBuf>,
}

impl InputArgs {
    /// # Errors
    /// Returns an error if the host file cannot be read.
    pub fn load(&self) -> anyhow::Result<Vec<u8>> {
        match (&self.data, &self.from) {
            (Some(data), _) => Ok(data.clone().into_bytes()),
            (None, Some(path)) => {
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))
            }
            (None, None) => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_reference_layout() {
        let cli = Cli::try_parse_from(["simplefs", "ls"]).expect("parse");
        assert!(matches!(cli.command, Command::Ls));
        let geometry = cli.image.geometry().expect("geometry");
        assert_eq!(geometry, Geometry::default());
    }

    #[test]
    fn write_requires_exactly_one_input() {
        assert!(Cli::try_parse_from(["simplefs", "write", "f"]).is_err());
        assert!(
            Cli::try_parse_from(["simplefs", "write", "f", "--data", "x", "--from", "p"]).is_err()
        );

        let cli = Cli::try_parse_from(["simplefs", "write", "f", "--data", "hello"]).expect("parse");
        match cli.command {
            Command::Write { name, input } => {
                assert_eq!(name, "f");
                assert_eq!(input.load().expect("load"), b"hello");
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn input_from_host_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let host = dir.path().join("payload.bin");
        std::fs::write(&host, [0u8, 1, 2, 255]).expect("seed");

        let cli = Cli::try_parse_from([
            "simplefs".as_ref(),
            "append".as_ref(),
            "f".as_ref(),
            "--from".as_ref(),
            host.as_os_str(),
        ])
        .expect("parse");
        match cli.command {
            Command::Append { input, .. } => {
                assert_eq!(input.load().expect("load"), [0u8, 1, 2, 255]);
            }
            _ => panic!("expected append"),
        }

        let missing = InputArgs {
            data: None,
            from: Some(dir.path().join("absent")),
        };
        assert!(missing.load().is_err());
    }

    #[test]
    fn read_window_flags() {
        let cli = Cli::try_parse_from([
            "simplefs", "--image", "x.sim", "read", "f", "--offset", "502", "--size", "20",
        ])
        .expect("parse");
        assert_eq!(cli.image.image, PathBuf::from("x.sim"));
        match cli.command {
            Command::Read { name, offset, size } => {
                assert_eq!(name, "f");
                assert_eq!(offset, 502);
                assert_eq!(size, Some(20));
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn bad_geometry_is_reported() {
        let cli = Cli::try_parse_from(["simplefs", "--block-size", "0", "ls"]).expect("parse");
        let err = cli.image.geometry().unwrap_err();
        assert!(format!("{err:#}").contains("block size"));
    }
}
