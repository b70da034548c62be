//! Cell formats and the deduplicating style table.
//!
//! Every cell refers to an entry of the workbook's `cellXfs` list by index
//! ([`StyleId`]). Entries are immutable once created: changing the style of a
//! cell resolves the *new* attribute set to an id, reusing an existing entry
//! when one matches structurally. Resolving the same attributes twice never
//! grows the table.
//!
//! Entries loaded from a file keep their positions, so every `s="n"` in a
//! worksheet part that is copied through untouched still points at the same
//! format after save.

mod parse;
mod patch;
mod write;

pub use patch::{Side, StylePatch};
pub(crate) use parse::DEFAULT_STYLESHEET;

use crate::error::{ExcelError, Result};
use crate::xml::XmlTemplate;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// First id available for custom number formats
pub const FIRST_CUSTOM_NUM_FMT: u32 = 164;

/// Index into the workbook's cell format list. `StyleId(0)` is the default format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleId(pub u32);

impl StyleId {
    pub const DEFAULT: StyleId = StyleId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Color reference used by fonts, fills and borders
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Color {
    /// `AARRGGBB`, upper-case hex
    Rgb(String),
    /// Theme color index with optional tint (-1.0 to 1.0)
    Theme { theme: u32, tint: Option<f64> },
    /// Legacy palette index
    Indexed(u32),
    /// System automatic color
    Auto,
}

impl Color {
    /// Parse `RRGGBB` or `AARRGGBB` (a leading `#` is allowed). Six digits get an opaque alpha.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ExcelError::InvalidStyle(format!("invalid color '{hex}'")));
        }
        match digits.len() {
            6 => Ok(Color::Rgb(format!("FF{}", digits.to_ascii_uppercase()))),
            8 => Ok(Color::Rgb(digits.to_ascii_uppercase())),
            _ => Err(ExcelError::InvalidStyle(format!(
                "invalid color '{hex}': expected RRGGBB or AARRGGBB"
            ))),
        }
    }

    pub fn theme(theme: u32) -> Self {
        Color::Theme { theme, tint: None }
    }

    /// `RRGGBB` part of an RGB color
    pub fn rgb_hex(&self) -> Option<&str> {
        match self {
            Color::Rgb(argb) if argb.len() == 8 => Some(&argb[2..]),
            Color::Rgb(other) => Some(other),
            _ => None,
        }
    }
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Color::Rgb(s) => s.hash(state),
            Color::Theme { theme, tint } => {
                theme.hash(state);
                tint.map(f64::to_bits).hash(state);
            }
            Color::Indexed(i) => i.hash(state),
            Color::Auto => {}
        }
    }
}

impl FromStr for Color {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        Color::from_hex(s)
    }
}

/// Underline variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Underline {
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

impl Underline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Underline::Single => "single",
            Underline::Double => "double",
            Underline::SingleAccounting => "singleAccounting",
            Underline::DoubleAccounting => "doubleAccounting",
        }
    }
}

impl FromStr for Underline {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "single" => Underline::Single,
            "double" => Underline::Double,
            "singleAccounting" => Underline::SingleAccounting,
            "doubleAccounting" => Underline::DoubleAccounting,
            _ => return Err(ExcelError::InvalidStyle(format!("unknown underline '{s}'"))),
        })
    }
}

/// Font record
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Font {
    pub bold: bool,
    pub italic: bool,
    pub underline: Option<Underline>,
    pub strikethrough: bool,
    /// Size in points
    pub size: Option<f64>,
    pub color: Option<Color>,
    /// Font family name, e.g. `Calibri`
    pub name: Option<String>,
    /// Font family class (`2` = swiss)
    pub family: Option<u32>,
    /// `minor` / `major` theme font scheme
    pub scheme: Option<String>,
    /// Children we do not model (`vertAlign`, `charset`, `outline`, ...), kept as raw XML
    pub(crate) extra: Vec<String>,
}

impl Eq for Font {}

impl Hash for Font {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bold.hash(state);
        self.italic.hash(state);
        self.underline.hash(state);
        self.strikethrough.hash(state);
        self.size.map(f64::to_bits).hash(state);
        self.color.hash(state);
        self.name.hash(state);
        self.family.hash(state);
        self.scheme.hash(state);
        self.extra.hash(state);
    }
}

/// Cell background
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fill {
    Pattern {
        /// `none`, `solid`, `gray125`, `darkGrid`, ...
        pattern: String,
        fg: Option<Color>,
        bg: Option<Color>,
    },
    /// Gradient fill kept as the raw `<fill>` element
    Gradient(String),
}

impl Fill {
    /// Solid background in the given color
    pub fn solid(color: Color) -> Self {
        Fill::Pattern {
            pattern: "solid".to_string(),
            fg: Some(color),
            bg: None,
        }
    }

    pub fn none() -> Self {
        Fill::Pattern {
            pattern: "none".to_string(),
            fg: None,
            bg: None,
        }
    }

    pub(crate) fn gray125() -> Self {
        Fill::Pattern {
            pattern: "gray125".to_string(),
            fg: None,
            bg: None,
        }
    }

    /// Foreground color of a pattern fill
    pub fn color(&self) -> Option<&Color> {
        match self {
            Fill::Pattern { fg, .. } => fg.as_ref(),
            Fill::Gradient(_) => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Fill::Pattern { pattern, .. } if pattern == "none")
    }
}

impl Default for Fill {
    fn default() -> Self {
        Fill::none()
    }
}

/// Line style of one border edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderStyle::Thin => "thin",
            BorderStyle::Medium => "medium",
            BorderStyle::Thick => "thick",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Dotted => "dotted",
            BorderStyle::Double => "double",
            BorderStyle::Hair => "hair",
            BorderStyle::MediumDashed => "mediumDashed",
            BorderStyle::DashDot => "dashDot",
            BorderStyle::MediumDashDot => "mediumDashDot",
            BorderStyle::DashDotDot => "dashDotDot",
            BorderStyle::MediumDashDotDot => "mediumDashDotDot",
            BorderStyle::SlantDashDot => "slantDashDot",
        }
    }
}

impl FromStr for BorderStyle {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "thin" => BorderStyle::Thin,
            "medium" => BorderStyle::Medium,
            "thick" => BorderStyle::Thick,
            "dashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            "double" => BorderStyle::Double,
            "hair" => BorderStyle::Hair,
            "mediumDashed" => BorderStyle::MediumDashed,
            "dashDot" => BorderStyle::DashDot,
            "mediumDashDot" => BorderStyle::MediumDashDot,
            "dashDotDot" => BorderStyle::DashDotDot,
            "mediumDashDotDot" => BorderStyle::MediumDashDotDot,
            "slantDashDot" => BorderStyle::SlantDashDot,
            _ => return Err(ExcelError::InvalidStyle(format!("unknown border style '{s}'"))),
        })
    }
}

/// One side of a border
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BorderEdge {
    pub style: Option<BorderStyle>,
    pub color: Option<Color>,
}

impl BorderEdge {
    pub fn new(style: BorderStyle) -> Self {
        BorderEdge {
            style: Some(style),
            color: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.style.is_none() && self.color.is_none()
    }
}

/// Border record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Border {
    pub left: BorderEdge,
    pub right: BorderEdge,
    pub top: BorderEdge,
    pub bottom: BorderEdge,
    pub diagonal: BorderEdge,
    pub diagonal_up: bool,
    pub diagonal_down: bool,
    pub(crate) vertical: Option<BorderEdge>,
    pub(crate) horizontal: Option<BorderEdge>,
    /// Other attributes of `<border>` (e.g. `outline`)
    pub(crate) extra_attrs: Vec<(String, String)>,
}

impl Border {
    /// Same edge on all four sides
    pub fn all(edge: BorderEdge) -> Self {
        Border {
            left: edge.clone(),
            right: edge.clone(),
            top: edge.clone(),
            bottom: edge,
            ..Border::default()
        }
    }

    pub(crate) fn sides_mut(&mut self) -> [&mut BorderEdge; 4] {
        [
            &mut self.left,
            &mut self.right,
            &mut self.top,
            &mut self.bottom,
        ]
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HorizontalAlignment {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

impl HorizontalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlignment::General => "general",
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
            HorizontalAlignment::Fill => "fill",
            HorizontalAlignment::Justify => "justify",
            HorizontalAlignment::CenterContinuous => "centerContinuous",
            HorizontalAlignment::Distributed => "distributed",
        }
    }
}

impl FromStr for HorizontalAlignment {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "general" => HorizontalAlignment::General,
            "left" => HorizontalAlignment::Left,
            "center" => HorizontalAlignment::Center,
            "right" => HorizontalAlignment::Right,
            "fill" => HorizontalAlignment::Fill,
            "justify" => HorizontalAlignment::Justify,
            "centerContinuous" => HorizontalAlignment::CenterContinuous,
            "distributed" => HorizontalAlignment::Distributed,
            _ => {
                return Err(ExcelError::InvalidStyle(format!(
                    "unknown horizontal alignment '{s}'"
                )))
            }
        })
    }
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

impl VerticalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Bottom => "bottom",
            VerticalAlignment::Justify => "justify",
            VerticalAlignment::Distributed => "distributed",
        }
    }
}

impl FromStr for VerticalAlignment {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "top" => VerticalAlignment::Top,
            "center" => VerticalAlignment::Center,
            "bottom" => VerticalAlignment::Bottom,
            "justify" => VerticalAlignment::Justify,
            "distributed" => VerticalAlignment::Distributed,
            _ => {
                return Err(ExcelError::InvalidStyle(format!(
                    "unknown vertical alignment '{s}'"
                )))
            }
        })
    }
}

/// Text alignment within the cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    pub horizontal: Option<HorizontalAlignment>,
    pub vertical: Option<VerticalAlignment>,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    pub indent: Option<u32>,
    /// 0-180 degrees, or 255 for stacked text
    pub text_rotation: Option<u32>,
    pub(crate) extra_attrs: Vec<(String, String)>,
}

impl Alignment {
    pub fn is_default(&self) -> bool {
        *self == Alignment::default()
    }
}

/// Number format: a built-in id or a custom format code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumberFormat {
    Builtin(u32),
    Custom(String),
}

const BUILTIN_FORMATS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

impl NumberFormat {
    /// Map a format code to a built-in id when one exists, otherwise keep it custom
    pub fn from_code(code: &str) -> Self {
        BUILTIN_FORMATS
            .iter()
            .find(|(_, c)| c.eq_ignore_ascii_case(code))
            .map(|(id, _)| NumberFormat::Builtin(*id))
            .unwrap_or_else(|| NumberFormat::Custom(code.to_string()))
    }

    /// Format code, if known. Locale-dependent built-ins (5-8, 23-36, 41-44) have none.
    pub fn code(&self) -> Option<&str> {
        match self {
            NumberFormat::Builtin(id) => BUILTIN_FORMATS
                .iter()
                .find(|(i, _)| i == id)
                .map(|(_, c)| *c),
            NumberFormat::Custom(code) => Some(code),
        }
    }

    /// True for formats that render serial numbers as dates or times
    pub fn is_date(&self) -> bool {
        match self {
            NumberFormat::Builtin(id) => matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58),
            NumberFormat::Custom(code) => is_date_code(code),
        }
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::Builtin(0)
    }
}

/// A custom code is a date format if it has date/time tokens outside quotes and brackets.
fn is_date_code(code: &str) -> bool {
    let mut in_quote = false;
    let mut in_bracket = false;
    let mut escaped = false;
    for ch in code.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_quote = !in_quote,
            '[' if !in_quote => in_bracket = true,
            ']' if !in_quote => in_bracket = false,
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S'
                if !in_quote && !in_bracket =>
            {
                return true
            }
            _ => {}
        }
    }
    false
}

/// Cell protection flags
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Protection {
    pub locked: Option<bool>,
    pub hidden: Option<bool>,
}

/// Full cell format. Compared structurally: two styles with equal fields are the same style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Style {
    pub font: Font,
    pub fill: Fill,
    pub border: Border,
    pub alignment: Alignment,
    pub number_format: NumberFormat,
    pub protection: Option<Protection>,
    /// Named cell style this format derives from (`xfId`)
    pub(crate) parent: u32,
    pub(crate) quote_prefix: bool,
    /// Other `<xf>` attributes (`pivotButton`, ...)
    pub(crate) extra_attrs: Vec<(String, String)>,
}

impl Style {
    pub fn is_bold(&self) -> bool {
        self.font.bold
    }

    pub fn is_italic(&self) -> bool {
        self.font.italic
    }
}

/// Insertion-ordered pool with structural lookup; keeps duplicates loaded from a file
/// at their original positions.
#[derive(Debug, Clone)]
pub(crate) struct Pool<T: Eq + Hash + Clone> {
    items: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> Default for Pool<T> {
    fn default() -> Self {
        Pool {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> Pool<T> {
    /// Append without deduplication (loading)
    pub fn push_loaded(&mut self, item: T) {
        let id = self.items.len() as u32;
        self.index.entry(item.clone()).or_insert(id);
        self.items.push(item);
    }

    /// Id of an equal item, appending it if absent
    pub fn intern(&mut self, item: &T) -> u32 {
        if let Some(&id) = self.index.get(item) {
            return id;
        }
        let id = self.items.len() as u32;
        self.items.push(item.clone());
        self.index.insert(item.clone(), id);
        id
    }

    pub fn lookup(&self, item: &T) -> Option<u32> {
        self.index.get(item).copied()
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.items.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Keep only the items `keep` selects, in order, rebuilding the index
    pub fn retain_indices(&mut self, keep: &[bool]) {
        let items = std::mem::take(&mut self.items);
        self.index.clear();
        for (item, _) in items
            .into_iter()
            .zip(keep.iter().copied().chain(std::iter::repeat(true)))
            .filter(|(_, k)| *k)
        {
            self.push_loaded(item);
        }
    }
}

/// The workbook's deduplicated cell format table (`cellXfs`) plus the font, fill,
/// border and number format lists its entries reference.
#[derive(Debug, Clone)]
pub struct StyleTable {
    styles: Pool<Style>,
    pub(crate) fonts: Pool<Font>,
    pub(crate) fills: Pool<Fill>,
    pub(crate) borders: Pool<Border>,
    /// Custom number format code -> declared id
    pub(crate) num_fmts: IndexMap<String, u32>,
    template: XmlTemplate,
    loaded_len: usize,
    dirty: bool,
}

impl StyleTable {
    /// Look up or add a style, returning its id. Idempotent.
    pub fn resolve(&mut self, style: &Style) -> StyleId {
        if let Some(id) = self.styles.lookup(style) {
            return StyleId(id);
        }
        self.fonts.intern(&style.font);
        self.fills.intern(&style.fill);
        self.borders.intern(&style.border);
        if let NumberFormat::Custom(code) = &style.number_format {
            self.intern_num_fmt(code);
        }
        self.dirty = true;
        let id = StyleId(self.styles.intern(style));
        log::debug!("style table: added format {id}");
        id
    }

    /// Merge `patch` over the style `base` and resolve the result
    pub fn resolve_patch(&mut self, base: StyleId, patch: &StylePatch) -> Result<StyleId> {
        let base_style = self.get(base).cloned().unwrap_or_default();
        let style = patch.apply(&base_style)?;
        if style == base_style {
            return Ok(base);
        }
        Ok(self.resolve(&style))
    }

    /// Read back a style
    pub fn get(&self, id: StyleId) -> Option<&Style> {
        self.styles.get(id.0)
    }

    /// The default format (id 0)
    pub fn default_style(&self) -> &Style {
        static FALLBACK: std::sync::OnceLock<Style> = std::sync::OnceLock::new();
        self.styles
            .get(0)
            .unwrap_or_else(|| FALLBACK.get_or_init(Style::default))
    }

    /// Number of cell formats
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.len() == 0
    }

    /// All formats in id order
    pub fn iter(&self) -> impl Iterator<Item = (StyleId, &Style)> {
        self.styles
            .items()
            .iter()
            .enumerate()
            .map(|(i, s)| (StyleId(i as u32), s))
    }

    /// Whether formats were added since load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
        self.loaded_len = self.styles.len();
    }

    /// Formats that existed when the workbook was opened
    pub fn loaded_len(&self) -> usize {
        self.loaded_len
    }

    pub(crate) fn is_valid(&self, id: StyleId) -> bool {
        id.index() < self.styles.len()
    }

    fn intern_num_fmt(&mut self, code: &str) -> u32 {
        if let Some(&id) = self.num_fmts.get(code) {
            return id;
        }
        let next = self
            .num_fmts
            .values()
            .copied()
            .filter(|&id| id >= FIRST_CUSTOM_NUM_FMT)
            .max()
            .map(|id| id + 1)
            .unwrap_or(FIRST_CUSTOM_NUM_FMT);
        self.num_fmts.insert(code.to_string(), next);
        next
    }

    pub(crate) fn num_fmt_id(&self, format: &NumberFormat) -> u32 {
        match format {
            NumberFormat::Builtin(id) => *id,
            NumberFormat::Custom(code) => self.num_fmts.get(code).copied().unwrap_or(0),
        }
    }

    /// Drop formats that `used` does not mark, keeping id 0. Returns the old-to-new
    /// id map (`None` for removed entries).
    pub(crate) fn compact(&mut self, used: &[bool]) -> Vec<Option<u32>> {
        let mut keep: Vec<bool> = (0..self.styles.len())
            .map(|i| used.get(i).copied().unwrap_or(false))
            .collect();
        if let Some(first) = keep.first_mut() {
            *first = true;
        }
        let mut map = Vec::with_capacity(keep.len());
        let mut next = 0u32;
        for &k in &keep {
            if k {
                map.push(Some(next));
                next += 1;
            } else {
                map.push(None);
            }
        }
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            self.styles.retain_indices(&keep);
            self.dirty = true;
            log::info!("style table: compacted {removed} unused formats");
        }
        map
    }
}
