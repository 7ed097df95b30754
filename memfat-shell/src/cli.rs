use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Output directory of the disk images
    #[arg(long, short = 'O', default_value = ".")]
    pub out_dir: PathBuf,

    /// Volume label written when formatting
    #[arg(long, short, default_value = "CS3026 Operating Systems Assessment")]
    pub label: String,

    /// Print the tree of an existing disk image instead of running the demo
    #[arg(long)]
    pub load: Option<PathBuf>,
}
