//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Shortest accepted image name
const MIN_NAME_LENGTH: usize = 3;
/// Longest accepted image name
const MAX_NAME_LENGTH: usize = 128;

/// ShipAMI - manage AWS machine images and their Marketplace sharing
#[derive(Parser, Debug)]
#[command(name = "shipami")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Home region (overrides AWS_REGION / AWS_DEFAULT_REGION)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// AWS named profile
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Path to a config file (default: ~/.shipami/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List images owned in the home region
    List(ListArgs),

    /// Show tags, shares and lineage of images
    Show(ShowArgs),

    /// Copy an image into the home region
    Copy(CopyArgs),

    /// Copy an image as a labelled release
    Release(ReleaseArgs),

    /// Grant or revoke launch access to an image and its snapshots
    Share(ShareArgs),

    /// Deregister images and delete their snapshots
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only managed images
    #[arg(long, conflicts_with = "unmanaged")]
    pub managed: bool,

    /// Only unmanaged images
    #[arg(long)]
    pub unmanaged: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Image IDs
    #[arg(required = true)]
    pub image_ids: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Options shared by `copy` and `release`
#[derive(Args, Debug)]
pub struct CopyFlags {
    /// Name of the new image (default: the source name)
    #[arg(long, value_parser = parse_image_name)]
    pub name: Option<String>,

    /// Description of the new image (default: the source description)
    #[arg(long)]
    pub description: Option<String>,

    /// Region of the source image (default: the home region)
    #[arg(long)]
    pub source_region: Option<String>,

    /// Copy the source tags (default)
    #[arg(long, overrides_with = "no_copy_tags")]
    pub copy_tags: bool,

    /// Do not copy the source tags
    #[arg(long)]
    pub no_copy_tags: bool,

    /// Also write the source tags onto the new snapshots
    #[arg(long)]
    pub copy_tags_to_snapshots: bool,

    /// Copy launch and create-volume permissions
    #[arg(long)]
    pub copy_permissions: bool,

    /// Wait until the new image is available
    #[arg(long)]
    pub wait: bool,

    /// Keep disallowed characters in the name instead of replacing them
    #[arg(long)]
    pub no_clean: bool,
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source image ID
    pub image_id: String,

    #[command(flatten)]
    pub flags: CopyFlags,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Source image ID
    pub image_id: String,

    /// Release label, appended to the name
    pub release: String,

    #[command(flatten)]
    pub flags: CopyFlags,
}

#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Image ID
    pub image_id: String,

    /// Account to share with (default: AWS Marketplace)
    #[arg(long)]
    pub account_id: Option<String>,

    /// Revoke instead of grant
    #[arg(long)]
    pub remove: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Image IDs
    #[arg(required = true)]
    pub image_ids: Vec<String>,

    /// Also delete unmanaged images and releases
    #[arg(short, long)]
    pub force: bool,
}

fn parse_image_name(value: &str) -> Result<String, String> {
    let length = value.chars().count();
    if (MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "name must be between {} and {} characters",
            MIN_NAME_LENGTH, MAX_NAME_LENGTH
        ))
    }
}
