//! Tool parameters and their multipart encoding.
//!
//! Every tool posts the same `file` part; these types produce the text
//! fields that follow it, in the order the processing endpoint documents.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// One text field of the multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

impl FormField {
    fn new(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn into_pair(self) -> (String, String) {
        (self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Keep whatever format the source image has.
    #[default]
    Original,
    Jpeg,
    Png,
    Webp,
    Avif,
    Other(String),
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "original" => OutputFormat::Original,
            "jpeg" | "jpg" => OutputFormat::Jpeg,
            "png" => OutputFormat::Png,
            "webp" => OutputFormat::Webp,
            "avif" => OutputFormat::Avif,
            _ => OutputFormat::Other(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Original => "original",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Other(value) => value,
        }
    }

    /// File extension (without the dot) for an output made from `source_name`.
    pub fn extension_for(&self, source_name: &str) -> String {
        match self {
            OutputFormat::Jpeg => "jpg".to_string(),
            OutputFormat::Original => match source_name.rsplit_once('.') {
                Some((_, ext)) if !ext.is_empty() => ext.to_string(),
                _ => "webp".to_string(),
            },
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    #[default]
    Cover,
    Contain,
    Inside,
    Outside,
    Fill,
}

impl Fit {
    pub fn as_str(self) -> &'static str {
        match self {
            Fit::Cover => "cover",
            Fit::Contain => "contain",
            Fit::Inside => "inside",
            Fit::Outside => "outside",
            Fit::Fill => "fill",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    Top,
    Right,
    Left,
    Bottom,
    Entropy,
    Attention,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Center => "center",
            Position::Top => "top",
            Position::Right => "right",
            Position::Left => "left",
            Position::Bottom => "bottom",
            Position::Entropy => "entropy",
            Position::Attention => "attention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    North,
    NorthEast,
    East,
    #[default]
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Center,
}

impl Gravity {
    pub fn as_str(self) -> &'static str {
        match self {
            Gravity::North => "north",
            Gravity::NorthEast => "northeast",
            Gravity::East => "east",
            Gravity::SouthEast => "southeast",
            Gravity::South => "south",
            Gravity::SouthWest => "southwest",
            Gravity::West => "west",
            Gravity::NorthWest => "northwest",
            Gravity::Center => "center",
        }
    }
}

/// Pixel size of an image, either as decoded or as shown on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Ratio from on-screen coordinates to natural pixels, `1.0` when unknown.
fn scale_factors(natural: Dimensions, display: Dimensions) -> (f64, f64) {
    let factor = |n: u32, d: u32| {
        if n > 0 && d > 0 {
            f64::from(n) / f64::from(d)
        } else {
            1.0
        }
    };
    (
        factor(natural.width, display.width),
        factor(natural.height, display.height),
    )
}

fn scale(value: u32, factor: f64) -> u32 {
    (f64::from(value) * factor).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropBox {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 512,
            height: 512,
        }
    }
}

impl CropBox {
    /// Maps a box drawn over a scaled preview back to natural image pixels.
    pub fn scaled(self, natural: Dimensions, display: Dimensions) -> Self {
        let (sx, sy) = scale_factors(natural, display);
        Self {
            left: scale(self.left, sx),
            top: scale(self.top, sy),
            width: scale(self.width, sx).max(1),
            height: scale(self.height, sy).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub position: Position,
    pub format: OutputFormat,
    pub quality: u8,
    pub strip: bool,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fit: Fit::default(),
            position: Position::default(),
            format: OutputFormat::Original,
            quality: 80,
            strip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub format: OutputFormat,
    pub quality: u8,
    pub strip: bool,
}

impl Default for ConvertParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::Webp,
            quality: 80,
            strip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub crop: CropBox,
    pub format: OutputFormat,
    pub quality: u8,
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            crop: CropBox::default(),
            format: OutputFormat::Original,
            quality: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub grayscale: bool,
    pub negate: bool,
    pub blur: u32,
    pub sharpen: u32,
    pub brightness: f32,
    pub saturation: f32,
    pub hue: i32,
    /// Hex colour such as `#ff8800`; empty means no tint.
    pub tint: Option<String>,
    pub rotate: i32,
    pub flip: bool,
    pub flop: bool,
    pub format: OutputFormat,
    pub quality: u8,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            grayscale: false,
            negate: false,
            blur: 0,
            sharpen: 0,
            brightness: 1.0,
            saturation: 1.0,
            hue: 0,
            tint: None,
            rotate: 0,
            flip: false,
            flop: false,
            format: OutputFormat::Original,
            quality: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkPlacement {
    Gravity(Gravity),
    /// Top-left corner of the text box in natural image pixels.
    Offset { x: u32, y: u32 },
}

impl WatermarkPlacement {
    /// Maps an offset picked on a scaled preview back to natural pixels.
    pub fn scaled(self, natural: Dimensions, display: Dimensions) -> Self {
        match self {
            WatermarkPlacement::Offset { x, y } => {
                let (sx, sy) = scale_factors(natural, display);
                WatermarkPlacement::Offset {
                    x: scale(x, sx),
                    y: scale(y, sy),
                }
            }
            gravity => gravity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkParams {
    pub text: String,
    pub size: u32,
    pub color: String,
    pub opacity: f32,
    pub placement: WatermarkPlacement,
    pub format: OutputFormat,
    pub quality: u8,
    pub strip: bool,
}

impl Default for WatermarkParams {
    fn default() -> Self {
        Self {
            text: String::new(),
            size: 36,
            color: "#ffffff".to_string(),
            opacity: 0.4,
            placement: WatermarkPlacement::Gravity(Gravity::default()),
            format: OutputFormat::Original,
            quality: 80,
            strip: true,
        }
    }
}

/// Settings of whichever tool is driving the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolParams {
    Resize(ResizeParams),
    Convert(ConvertParams),
    Crop(CropParams),
    Filters(FilterParams),
    Watermark(WatermarkParams),
}

impl Default for ToolParams {
    fn default() -> Self {
        ToolParams::Resize(ResizeParams::default())
    }
}

impl ToolParams {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolParams::Resize(_) => "resize",
            ToolParams::Convert(_) => "convert",
            ToolParams::Crop(_) => "crop",
            ToolParams::Filters(_) => "filters",
            ToolParams::Watermark(_) => "watermark",
        }
    }

    pub fn format(&self) -> &OutputFormat {
        match self {
            ToolParams::Resize(p) => &p.format,
            ToolParams::Convert(p) => &p.format,
            ToolParams::Crop(p) => &p.format,
            ToolParams::Filters(p) => &p.format,
            ToolParams::Watermark(p) => &p.format,
        }
    }

    pub fn form_fields(&self) -> Vec<FormField> {
        let mut fields = Vec::new();
        match self {
            ToolParams::Resize(p) => {
                if let Some(width) = p.width.filter(|w| *w > 0) {
                    fields.push(FormField::new("width", width));
                }
                if let Some(height) = p.height.filter(|h| *h > 0) {
                    fields.push(FormField::new("height", height));
                }
                fields.push(FormField::new("fit", p.fit.as_str()));
                fields.push(FormField::new("position", p.position.as_str()));
                fields.push(FormField::new("format", &p.format));
                fields.push(FormField::new("quality", p.quality));
                fields.push(FormField::new("strip", p.strip));
            }
            ToolParams::Convert(p) => {
                fields.push(FormField::new("format", &p.format));
                fields.push(FormField::new("quality", p.quality));
                fields.push(FormField::new("strip", p.strip));
            }
            ToolParams::Crop(p) => {
                fields.push(FormField::new("cropLeft", p.crop.left));
                fields.push(FormField::new("cropTop", p.crop.top));
                fields.push(FormField::new("cropWidth", p.crop.width.max(1)));
                fields.push(FormField::new("cropHeight", p.crop.height.max(1)));
                fields.push(FormField::new("format", &p.format));
                fields.push(FormField::new("quality", p.quality));
            }
            ToolParams::Filters(p) => {
                fields.push(FormField::new("grayscale", p.grayscale));
                fields.push(FormField::new("negate", p.negate));
                fields.push(FormField::new("blur", p.blur));
                fields.push(FormField::new("sharpen", p.sharpen));
                fields.push(FormField::new("brightness", p.brightness));
                fields.push(FormField::new("saturation", p.saturation));
                fields.push(FormField::new("hue", p.hue));
                if let Some(tint) = p.tint.as_deref().map(|t| t.trim_start_matches('#')) {
                    if !tint.is_empty() {
                        fields.push(FormField::new("tint", tint));
                    }
                }
                fields.push(FormField::new("rotate", p.rotate));
                fields.push(FormField::new("flip", p.flip));
                fields.push(FormField::new("flop", p.flop));
                fields.push(FormField::new("format", &p.format));
                fields.push(FormField::new("quality", p.quality));
            }
            ToolParams::Watermark(p) => {
                fields.push(FormField::new("watermarkText", &p.text));
                fields.push(FormField::new("watermarkSize", p.size));
                fields.push(FormField::new("watermarkColor", &p.color));
                fields.push(FormField::new("watermarkOpacity", p.opacity.clamp(0.0, 1.0)));
                match p.placement {
                    WatermarkPlacement::Offset { x, y } => {
                        fields.push(FormField::new("watermarkX", x));
                        fields.push(FormField::new("watermarkY", y));
                    }
                    WatermarkPlacement::Gravity(gravity) => {
                        fields.push(FormField::new("watermarkPosition", gravity.as_str()));
                    }
                }
                fields.push(FormField::new("format", &p.format));
                fields.push(FormField::new("quality", p.quality));
                fields.push(FormField::new("strip", p.strip));
            }
        }
        fields
    }
}
