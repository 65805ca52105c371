//! Heatmap rendering for embedding vectors.
//!
//! A pure mapping from a vector and its observed value range to a grid of
//! colored cells. A sign-preserving power-law stretch pushes values away
//! from the midpoint so mid-range contrast survives the color lookup.
//! SVG and ANSI serializers sit on top of the cell grid.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::types::Embedding;

/// Default number of grid columns.
pub const DEFAULT_COLUMNS: usize = 48;

/// Default rendered cell size in pixels (SVG output).
pub const DEFAULT_CELL_SIZE: u32 = 12;

/// Default stretch exponent.
pub const DEFAULT_EXPONENT: f32 = 0.65;

/// Color mode for cell rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Full spectrum: hue and lightness from the stretched value.
    #[default]
    Spectrum,
    /// Red primary channel only.
    Red,
    /// Green primary channel only.
    Green,
    /// Blue primary channel only.
    Blue,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spectrum" => Ok(ColorMode::Spectrum),
            "red" => Ok(ColorMode::Red),
            "green" => Ok(ColorMode::Green),
            "blue" => Ok(ColorMode::Blue),
            other => Err(format!(
                "unknown color mode '{}', expected spectrum, red, green, or blue",
                other
            )),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorMode::Spectrum => "spectrum",
            ColorMode::Red => "red",
            ColorMode::Green => "green",
            ColorMode::Blue => "blue",
        };
        write!(f, "{}", name)
    }
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Hex form, `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A single rendered cell.
#[derive(Debug, Clone)]
pub struct HeatmapCell {
    /// Grid row, index / columns.
    pub row: usize,
    /// Grid column, index % columns.
    pub col: usize,
    /// The underlying vector element.
    pub value: f32,
    /// Mapped color.
    pub color: Rgb,
}

/// Rendering options.
#[derive(Debug, Clone)]
pub struct HeatmapOptions {
    /// Number of grid columns.
    pub columns: usize,
    /// Cell size in pixels for SVG output.
    pub cell_size: u32,
    /// Power-law stretch exponent, in (0, 1].
    pub exponent: f32,
    /// Color mode.
    pub mode: ColorMode,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            cell_size: DEFAULT_CELL_SIZE,
            exponent: DEFAULT_EXPONENT,
            mode: ColorMode::Spectrum,
        }
    }
}

impl HeatmapOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the column count.
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    /// Set the color mode.
    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the stretch exponent.
    pub fn with_exponent(mut self, exponent: f32) -> Self {
        self.exponent = exponent;
        self
    }
}

/// A rendered heatmap grid.
#[derive(Debug, Clone)]
pub struct Heatmap {
    cells: Vec<HeatmapCell>,
    columns: usize,
    rows: usize,
    cell_size: u32,
}

impl Heatmap {
    /// Render a vector into a grid of colored cells.
    ///
    /// Returns None for the empty sentinel: an empty vector is "no
    /// embedding available" and must not be plotted as data. Exactly one
    /// cell per element is produced, never padding.
    pub fn render(embedding: &Embedding, options: &HeatmapOptions) -> Option<Self> {
        let (min, max) = embedding.range()?;
        let columns = options.columns.max(1);

        let cells: Vec<HeatmapCell> = embedding
            .values()
            .iter()
            .enumerate()
            .map(|(index, &value)| HeatmapCell {
                row: index / columns,
                col: index % columns,
                value,
                color: cell_color(value, min, max, options.exponent, options.mode),
            })
            .collect();

        let rows = cells.last().map(|c| c.row + 1).unwrap_or(0);

        Some(Self {
            cells,
            columns,
            rows,
            cell_size: options.cell_size,
        })
    }

    /// The rendered cells, row-major.
    pub fn cells(&self) -> &[HeatmapCell] {
        &self.cells
    }

    /// Number of grid columns.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of occupied rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Serialize as an SVG document.
    ///
    /// Each cell carries a `<title>` child with its value, which browsers
    /// surface as a hover tooltip.
    pub fn to_svg(&self) -> String {
        let cell = self.cell_size;
        let width = self.columns as u32 * cell;
        let height = self.rows as u32 * cell;

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\">\n"
        );
        for c in &self.cells {
            let x = c.col as u32 * cell;
            let y = c.row as u32 * cell;
            let _ = writeln!(
                svg,
                "  <rect x=\"{x}\" y=\"{y}\" width=\"{cell}\" height=\"{cell}\" fill=\"{}\"><title>{:.4}</title></rect>",
                c.color.to_hex(),
                c.value
            );
        }
        svg.push_str("</svg>\n");
        svg
    }

    /// Serialize as truecolor ANSI cells for terminal display.
    pub fn to_ansi(&self) -> String {
        let mut out = String::new();
        let mut current_row = 0;
        for c in &self.cells {
            if c.row != current_row {
                out.push_str("\x1b[0m\n");
                current_row = c.row;
            }
            let _ = write!(out, "\x1b[48;2;{};{};{}m  ", c.color.r, c.color.g, c.color.b);
        }
        if !self.cells.is_empty() {
            out.push_str("\x1b[0m\n");
        }
        out
    }
}

/// Normalize a value into [0, 1] over the observed range.
///
/// A degenerate range (min == max) maps everything to the midpoint, so no
/// division can produce a non-finite result.
fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Sign-preserving power-law stretch around the midpoint.
///
/// Maps [0, 1] onto [0, 1] with 0, 0.5, and 1 fixed; an exponent below 1
/// pushes mid-range values outward.
pub fn stretch(normalized: f32, exponent: f32) -> f32 {
    let centered = normalized - 0.5;
    centered.signum() * (centered.abs() * 2.0).powf(exponent) / 2.0 + 0.5
}

/// Color for one value within [min, max].
pub fn cell_color(value: f32, min: f32, max: f32, exponent: f32, mode: ColorMode) -> Rgb {
    let t = stretch(normalize(value, min, max), exponent);
    let channel = (t * 255.0).round() as u8;
    match mode {
        ColorMode::Spectrum => {
            let hue = t * 360.0;
            let lightness = 50.0 + (t - 0.5) * 40.0;
            hsl_to_rgb(hue, 100.0, lightness)
        }
        ColorMode::Red => Rgb { r: channel, g: 0, b: 0 },
        ColorMode::Green => Rgb { r: 0, g: channel, b: 0 },
        ColorMode::Blue => Rgb { r: 0, g: 0, b: channel },
    }
}

/// Convert HSL (hue in degrees, saturation and lightness in percent) to RGB.
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Rgb {
    let s = s / 100.0;
    let l = l / 100.0;

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;

    Rgb {
        r: ((r1 + m) * 255.0).round() as u8,
        g: ((g1 + m) * 255.0).round() as u8,
        b: ((b1 + m) * 255.0).round() as u8,
    }
}
