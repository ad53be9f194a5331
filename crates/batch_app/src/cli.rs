use std::path::PathBuf;

use batch_core::{
    ConvertParams, CropBox, CropParams, Dimensions, FilterParams, Fit, Gravity, OutputFormat,
    Position, ResizeParams, ToolParams, WatermarkParams, WatermarkPlacement,
};
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{AppConfig, DEFAULT_CONFIG_FILENAME};

pub const DEFAULT_WATERMARK_TEXT: &str = "The Tool Guru";

#[derive(Debug, Parser)]
#[command(
    name = "image-batch",
    version,
    about = "Send up to three images through an image processing endpoint and bundle the results"
)]
pub struct Cli {
    /// Settings file (RON).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Processing endpoint, overrides the settings file.
    #[arg(long, global = true, env = "IMAGE_BATCH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Directory for the bundle or the individual outputs.
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    /// Save each processed image on its own instead of one zip.
    #[arg(long, global = true)]
    pub separate: bool,

    /// More log output; repeat for trace.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub tool: ToolCommand,
}

impl Cli {
    /// Command-line values take precedence over the settings file.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(out_dir) = &self.out_dir {
            config.output_dir = out_dir.clone();
        }
        if self.verbose > 0 {
            config.log_level = batch_logging::level_for_verbosity(self.verbose).to_string();
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ToolCommand {
    /// Resize to a width and/or height.
    Resize(ResizeArgs),
    /// Re-encode in another format.
    Convert(ConvertArgs),
    /// Cut out a rectangle.
    Crop(CropArgs),
    /// Colour, blur and orientation adjustments.
    Filters(FilterArgs),
    /// Draw a text watermark.
    Watermark(WatermarkArgs),
    /// Write the effective settings to the settings file and exit.
    InitConfig,
}

/// Inputs and encoding options shared by every tool.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Image files; only the first three images are used.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output format: original, jpeg, png, webp, avif.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,
}

#[derive(Debug, Args)]
pub struct ResizeArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long, default_value = "cover", value_parser = parse_fit)]
    pub fit: Fit,
    #[arg(long, default_value = "center", value_parser = parse_position)]
    pub position: Position,
    /// Keep metadata instead of stripping it.
    #[arg(long)]
    pub keep_metadata: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
    #[arg(long)]
    pub keep_metadata: bool,
}

#[derive(Debug, Args)]
pub struct CropArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
    #[arg(long, default_value_t = 0)]
    pub left: u32,
    #[arg(long, default_value_t = 0)]
    pub top: u32,
    #[arg(long, default_value_t = 512)]
    pub width: u32,
    #[arg(long, default_value_t = 512)]
    pub height: u32,
    #[command(flatten)]
    pub preview: PreviewArgs,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
    #[arg(long)]
    pub grayscale: bool,
    #[arg(long)]
    pub negate: bool,
    #[arg(long, default_value_t = 0)]
    pub blur: u32,
    #[arg(long, default_value_t = 0)]
    pub sharpen: u32,
    #[arg(long, default_value_t = 1.0)]
    pub brightness: f32,
    #[arg(long, default_value_t = 1.0)]
    pub saturation: f32,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub hue: i32,
    /// Hex colour, with or without the leading `#`.
    #[arg(long)]
    pub tint: Option<String>,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub rotate: i32,
    #[arg(long)]
    pub flip: bool,
    #[arg(long)]
    pub flop: bool,
}

#[derive(Debug, Args)]
pub struct WatermarkArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
    #[arg(long, default_value = DEFAULT_WATERMARK_TEXT)]
    pub text: String,
    #[arg(long, default_value_t = 36)]
    pub size: u32,
    #[arg(long, default_value = "#ffffff")]
    pub color: String,
    #[arg(long, default_value_t = 0.4)]
    pub opacity: f32,
    #[arg(long, default_value = "southeast", value_parser = parse_gravity, conflicts_with = "x")]
    pub gravity: Gravity,
    /// Custom placement; needs `--y` as well.
    #[arg(long, requires = "y")]
    pub x: Option<u32>,
    #[arg(long, requires = "x")]
    pub y: Option<u32>,
    #[command(flatten)]
    pub preview: PreviewArgs,
    #[arg(long)]
    pub keep_metadata: bool,
}

/// Size of the preview the coordinates were picked on, if not the image itself.
#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[arg(long, requires = "display_height")]
    pub display_width: Option<u32>,
    #[arg(long, requires = "display_width")]
    pub display_height: Option<u32>,
}

impl PreviewArgs {
    fn display(&self) -> Option<Dimensions> {
        Some(Dimensions::new(self.display_width?, self.display_height?))
    }
}

impl ToolCommand {
    pub fn batch(&self) -> Option<&BatchArgs> {
        match self {
            ToolCommand::Resize(args) => Some(&args.batch),
            ToolCommand::Convert(args) => Some(&args.batch),
            ToolCommand::Crop(args) => Some(&args.batch),
            ToolCommand::Filters(args) => Some(&args.batch),
            ToolCommand::Watermark(args) => Some(&args.batch),
            ToolCommand::InitConfig => None,
        }
    }

    /// Tool settings. Coordinates picked on a preview are mapped onto `natural`.
    pub fn params(&self, natural: Option<Dimensions>) -> Option<ToolParams> {
        let scale = |preview: &PreviewArgs| match (natural, preview.display()) {
            (Some(natural), Some(display)) => Some((natural, display)),
            _ => None,
        };

        let params = match self {
            ToolCommand::Resize(args) => ToolParams::Resize(ResizeParams {
                width: args.width,
                height: args.height,
                fit: args.fit,
                position: args.position,
                format: args.batch.format.clone().unwrap_or_default(),
                quality: args.batch.quality,
                strip: !args.keep_metadata,
            }),
            ToolCommand::Convert(args) => ToolParams::Convert(ConvertParams {
                format: args.batch.format.clone().unwrap_or(OutputFormat::Webp),
                quality: args.batch.quality,
                strip: !args.keep_metadata,
            }),
            ToolCommand::Crop(args) => {
                let crop = CropBox {
                    left: args.left,
                    top: args.top,
                    width: args.width,
                    height: args.height,
                };
                ToolParams::Crop(CropParams {
                    crop: match scale(&args.preview) {
                        Some((natural, display)) => crop.scaled(natural, display),
                        None => crop,
                    },
                    format: args.batch.format.clone().unwrap_or_default(),
                    quality: args.batch.quality,
                })
            }
            ToolCommand::Filters(args) => ToolParams::Filters(FilterParams {
                grayscale: args.grayscale,
                negate: args.negate,
                blur: args.blur,
                sharpen: args.sharpen,
                brightness: args.brightness,
                saturation: args.saturation,
                hue: args.hue,
                tint: args.tint.clone(),
                rotate: args.rotate,
                flip: args.flip,
                flop: args.flop,
                format: args.batch.format.clone().unwrap_or_default(),
                quality: args.batch.quality,
            }),
            ToolCommand::Watermark(args) => {
                let placement = match (args.x, args.y) {
                    (Some(x), Some(y)) => WatermarkPlacement::Offset { x, y },
                    _ => WatermarkPlacement::Gravity(args.gravity),
                };
                ToolParams::Watermark(WatermarkParams {
                    text: args.text.clone(),
                    size: args.size,
                    color: args.color.clone(),
                    opacity: args.opacity,
                    placement: match scale(&args.preview) {
                        Some((natural, display)) => placement.scaled(natural, display),
                        None => placement,
                    },
                    format: args.batch.format.clone().unwrap_or_default(),
                    quality: args.batch.quality,
                    strip: !args.keep_metadata,
                })
            }
            ToolCommand::InitConfig => return None,
        };
        Some(params)
    }
}

fn parse_choice<T: Copy>(
    value: &str,
    choices: &[T],
    name: fn(T) -> &'static str,
) -> Result<T, String> {
    let wanted = value.trim().to_ascii_lowercase();
    choices
        .iter()
        .copied()
        .find(|choice| name(*choice) == wanted)
        .ok_or_else(|| {
            let names: Vec<_> = choices.iter().map(|choice| name(*choice)).collect();
            format!("expected one of: {}", names.join(", "))
        })
}

fn parse_fit(value: &str) -> Result<Fit, String> {
    parse_choice(
        value,
        &[Fit::Cover, Fit::Contain, Fit::Inside, Fit::Outside, Fit::Fill],
        Fit::as_str,
    )
}

fn parse_position(value: &str) -> Result<Position, String> {
    parse_choice(
        value,
        &[
            Position::Center,
            Position::Top,
            Position::Right,
            Position::Left,
            Position::Bottom,
            Position::Entropy,
            Position::Attention,
        ],
        Position::as_str,
    )
}

fn parse_gravity(value: &str) -> Result<Gravity, String> {
    parse_choice(
        value,
        &[
            Gravity::North,
            Gravity::NorthEast,
            Gravity::East,
            Gravity::SouthEast,
            Gravity::South,
            Gravity::SouthWest,
            Gravity::West,
            Gravity::NorthWest,
            Gravity::Center,
        ],
        Gravity::as_str,
    )
}
