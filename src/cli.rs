use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::export::{ExportFormat, ExportRange, ExportSettings, Sampling};

// Build version with codec info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"),
    "\n",
    "Codecs: gif, png (image 0.25), zip (deflate)\n",
    "Target: ",
    std::env::consts::ARCH,
    "-",
    std::env::consts::OS
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Animated GIF
    Gif,
    /// Tiled PNG sprite sheet
    Sheet,
    /// ZIP with one PNG per frame plus manifest.json
    Zip,
    /// Project JSON only
    Manifest,
}

impl From<FormatArg> for ExportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Gif => ExportFormat::Gif,
            FormatArg::Sheet => ExportFormat::SpriteSheet,
            FormatArg::Zip => ExportFormat::Archive,
            FormatArg::Manifest => ExportFormat::Manifest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RangeArg {
    Full,
    Content,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SamplingArg {
    Nearest,
    Bilinear,
}

/// Sprite animation timeline: inspect, play and export Loom projects
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Project JSON to load
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Export format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<FormatArg>,

    /// Output file (default: project name with the format's extension)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Canvas width in pixels (default: project canvas, then settings)
    #[arg(long = "width", value_name = "W")]
    pub width: Option<u32>,

    /// Canvas height in pixels
    #[arg(long = "height", value_name = "H")]
    pub height: Option<u32>,

    /// Sprite sheet columns (default: square-ish grid)
    #[arg(long = "columns", value_name = "N")]
    pub columns: Option<u32>,

    /// Frames to export
    #[arg(long = "range", value_enum)]
    pub range: Option<RangeArg>,

    /// Pixel sampling for scaled/rotated sprites
    #[arg(long = "sampling", value_enum)]
    pub sampling: Option<SamplingArg>,

    /// Directory relative image paths resolve against (default: project dir)
    #[arg(short = 'a', long = "assets", value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Print the composite render list for a frame (fractional allowed) as JSON
    #[arg(short = 'i', long = "inspect", value_name = "FRAME")]
    pub inspect: Option<f32>,

    /// Run headless playback, logging each frame
    #[arg(short = 'p', long = "play")]
    pub play: bool,

    /// Stop headless playback after N ticks (default: until it pauses, or one loop)
    #[arg(long = "ticks", value_name = "N", requires = "play")]
    pub ticks: Option<u32>,

    /// Enable debug logging to file (default: loom.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Apply CLI overrides on top of `base` export settings.
    pub fn export_settings(&self, mut base: ExportSettings) -> ExportSettings {
        if let Some(w) = self.width {
            base.width = w;
        }
        if let Some(h) = self.height {
            base.height = h;
        }
        if let Some(c) = self.columns {
            base.sheet_columns = Some(c);
        }
        if let Some(r) = self.range {
            base.range = match r {
                RangeArg::Full => ExportRange::Full,
                RangeArg::Content => ExportRange::Content,
            };
        }
        if let Some(s) = self.sampling {
            base.sampling = match s {
                SamplingArg::Nearest => Sampling::Nearest,
                SamplingArg::Bilinear => Sampling::Bilinear,
            };
        }
        base
    }

    /// Output path for `extension`: `-o` as given, else next to the project.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        match &self.output {
            Some(p) => p.clone(),
            None => self.project.with_extension(extension),
        }
    }
}
