use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shroud",
    about = "Shroud: end-to-end encrypted file storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Client configuration file
    #[arg(long, global = true, env = "SHROUD_CONFIG", default_value = "shroud.toml")]
    pub config: PathBuf,

    /// Hex-encoded account seed, overriding the configuration file
    #[arg(long, global = true, env = "SHROUD_ACCOUNT_SEED", hide_env_values = true)]
    pub seed: Option<String>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a folder and any missing parent
    Mkdir(MkdirArgs),
    /// List the folders and files inside a folder
    Ls(LsArgs),
    /// Encrypt and upload a local file into a folder
    Upload(UploadArgs),
    /// Download and decrypt a file by handle
    Download(DownloadArgs),
    /// Delete a file from storage and from the account
    RmFile(RmFileArgs),
    /// Print the metadata document stored at a logical path
    MetaGet(MetaGetArgs),
    /// List every metadata key this account has written
    Keys,
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub path: String,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Args)]
pub struct UploadArgs {
    /// Local file to upload
    pub file: PathBuf,
    /// Destination folder
    #[arg(default_value = "/")]
    pub dir: String,
    /// MIME type recorded with the file
    #[arg(long, default_value = "application/octet-stream")]
    pub mime: String,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Hex file handle printed by `upload`
    pub handle: String,
    /// Output file
    pub out: PathBuf,
}

#[derive(Args)]
pub struct RmFileArgs {
    pub handle: String,
}

#[derive(Args)]
pub struct MetaGetArgs {
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mkdir() {
        let cli = Cli::try_parse_from(["shroud", "mkdir", "/a/b"]).unwrap();
        if let Command::Mkdir(args) = cli.command {
            assert_eq!(args.path, "/a/b");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["shroud", "ls"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.path, "/");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_upload_with_mime() {
        let cli =
            Cli::try_parse_from(["shroud", "upload", "notes.txt", "/docs", "--mime", "text/plain"])
                .unwrap();
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("notes.txt"));
            assert_eq!(args.dir, "/docs");
            assert_eq!(args.mime, "text/plain");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shroud", "keys", "-vv", "--format", "json", "--config", "/etc/shroud.toml",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Keys));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("/etc/shroud.toml"));
    }

    #[test]
    fn parse_rm_file_kebab_case() {
        let cli = Cli::try_parse_from(["shroud", "rm-file", "abcd"]).unwrap();
        assert!(matches!(cli.command, Command::RmFile(_)));
        let cli = Cli::try_parse_from(["shroud", "meta-get", "/x"]).unwrap();
        assert!(matches!(cli.command, Command::MetaGet(_)));
    }

    #[test]
    fn download_needs_output() {
        assert!(Cli::try_parse_from(["shroud", "download", "abcd"]).is_err());
    }
}
