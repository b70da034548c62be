use super::{
    Alignment, Border, BorderEdge, BorderStyle, Color, Fill, HorizontalAlignment, NumberFormat,
    Protection, Style, Underline, VerticalAlignment,
};
use crate::error::{ExcelError, Result};

/// A partial set of style attributes, merged over a cell's current style.
///
/// Only the attributes that were set are changed; everything else keeps the
/// value of the base style.
///
/// ```
/// use xlsxedit::{Color, StylePatch};
/// # fn main() -> xlsxedit::Result<()> {
/// let header = StylePatch::new()
///     .bold(true)
///     .font_color(Color::from_hex("FFFFFF")?)
///     .fill(Color::from_hex("4472C4")?)
///     .horizontal_alignment(xlsxedit::HorizontalAlignment::Center);
/// # let _ = header;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    bold: Option<bool>,
    italic: Option<bool>,
    underline: Option<Option<Underline>>,
    strikethrough: Option<bool>,
    font_size: Option<f64>,
    font_family: Option<String>,
    font_color: Option<Color>,
    fill: Option<Fill>,
    border: Option<bool>,
    border_style: Option<BorderStyle>,
    border_color: Option<Color>,
    border_sides: Vec<(Side, BorderEdge)>,
    horizontal: Option<HorizontalAlignment>,
    vertical: Option<VerticalAlignment>,
    wrap_text: Option<bool>,
    shrink_to_fit: Option<bool>,
    indent: Option<u32>,
    text_rotation: Option<u32>,
    number_format: Option<NumberFormat>,
    locked: Option<bool>,
    hidden: Option<bool>,
}

/// Border side addressed by [`StylePatch::border_side`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl StylePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no attribute is set
    pub fn is_empty(&self) -> bool {
        *self == StylePatch::default()
    }

    pub fn bold(mut self, on: bool) -> Self {
        self.bold = Some(on);
        self
    }

    pub fn italic(mut self, on: bool) -> Self {
        self.italic = Some(on);
        self
    }

    /// Single underline on or off
    pub fn underline(mut self, on: bool) -> Self {
        self.underline = Some(on.then_some(Underline::Single));
        self
    }

    pub fn underline_style(mut self, style: Underline) -> Self {
        self.underline = Some(Some(style));
        self
    }

    pub fn strikethrough(mut self, on: bool) -> Self {
        self.strikethrough = Some(on);
        self
    }

    /// Font size in points (1-409)
    pub fn font_size(mut self, points: f64) -> Self {
        self.font_size = Some(points);
        self
    }

    /// Font name, e.g. `"Arial"`
    pub fn font_family(mut self, name: impl Into<String>) -> Self {
        self.font_family = Some(name.into());
        self
    }

    pub fn font_color(mut self, color: Color) -> Self {
        self.font_color = Some(color);
        self
    }

    /// Solid background color
    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(Fill::solid(color));
        self
    }

    /// Any fill, including patterns or `Fill::none()` to clear
    pub fn fill_pattern(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Thin border on all four sides (`true`) or no border (`false`)
    pub fn border(mut self, on: bool) -> Self {
        self.border = Some(on);
        self
    }

    /// Line style for all four sides
    pub fn border_style(mut self, style: BorderStyle) -> Self {
        self.border_style = Some(style);
        self
    }

    /// Line color for all four sides
    pub fn border_color(mut self, color: Color) -> Self {
        self.border_color = Some(color);
        self
    }

    /// Set one side explicitly
    pub fn border_side(mut self, side: Side, edge: BorderEdge) -> Self {
        self.border_sides.retain(|(s, _)| *s != side);
        self.border_sides.push((side, edge));
        self
    }

    pub fn horizontal_alignment(mut self, align: HorizontalAlignment) -> Self {
        self.horizontal = Some(align);
        self
    }

    pub fn vertical_alignment(mut self, align: VerticalAlignment) -> Self {
        self.vertical = Some(align);
        self
    }

    pub fn wrap_text(mut self, on: bool) -> Self {
        self.wrap_text = Some(on);
        self
    }

    pub fn shrink_to_fit(mut self, on: bool) -> Self {
        self.shrink_to_fit = Some(on);
        self
    }

    /// Indent level (0-250)
    pub fn indent(mut self, level: u32) -> Self {
        self.indent = Some(level);
        self
    }

    /// Rotation in degrees (0-180, or 255 for vertical text)
    pub fn text_rotation(mut self, degrees: u32) -> Self {
        self.text_rotation = Some(degrees);
        self
    }

    /// Number format code such as `"0.00"` or `"yyyy-mm-dd"`
    pub fn number_format(mut self, code: &str) -> Self {
        self.number_format = Some(NumberFormat::from_code(code));
        self
    }

    pub fn number_format_id(mut self, format: NumberFormat) -> Self {
        self.number_format = Some(format);
        self
    }

    pub fn locked(mut self, on: bool) -> Self {
        self.locked = Some(on);
        self
    }

    pub fn hidden(mut self, on: bool) -> Self {
        self.hidden = Some(on);
        self
    }

    /// Merge the set attributes over `base`, validating numeric ranges.
    pub fn apply(&self, base: &Style) -> Result<Style> {
        let mut style = base.clone();

        if let Some(size) = self.font_size {
            if !(1.0..=409.0).contains(&size) {
                return Err(ExcelError::InvalidStyle(format!(
                    "font size {size} outside 1-409"
                )));
            }
            style.font.size = Some(size);
        }
        if let Some(indent) = self.indent {
            if indent > 250 {
                return Err(ExcelError::InvalidStyle(format!(
                    "indent {indent} outside 0-250"
                )));
            }
            style.alignment.indent = (indent > 0).then_some(indent);
        }
        if let Some(rotation) = self.text_rotation {
            if rotation > 180 && rotation != 255 {
                return Err(ExcelError::InvalidStyle(format!(
                    "text rotation {rotation} outside 0-180 (or 255)"
                )));
            }
            style.alignment.text_rotation = (rotation > 0).then_some(rotation);
        }
        if let Some(NumberFormat::Custom(code)) = &self.number_format {
            if code.is_empty() {
                return Err(ExcelError::InvalidStyle("empty number format".to_string()));
            }
        }

        if let Some(v) = self.bold {
            style.font.bold = v;
        }
        if let Some(v) = self.italic {
            style.font.italic = v;
        }
        if let Some(v) = self.underline {
            style.font.underline = v;
        }
        if let Some(v) = self.strikethrough {
            style.font.strikethrough = v;
        }
        if let Some(name) = &self.font_family {
            style.font.name = Some(name.clone());
            // A named font no longer follows the theme's font scheme
            style.font.scheme = None;
        }
        if let Some(color) = &self.font_color {
            style.font.color = Some(color.clone());
        }
        if let Some(fill) = &self.fill {
            style.fill = fill.clone();
        }

        apply_border(&mut style.border, self);

        apply_alignment(&mut style.alignment, self);

        if let Some(format) = &self.number_format {
            style.number_format = format.clone();
        }
        if self.locked.is_some() || self.hidden.is_some() {
            let protection = style.protection.get_or_insert_with(Protection::default);
            if let Some(v) = self.locked {
                protection.locked = Some(v);
            }
            if let Some(v) = self.hidden {
                protection.hidden = Some(v);
            }
        }

        Ok(style)
    }
}

fn apply_border(border: &mut Border, patch: &StylePatch) {
    match patch.border {
        Some(true) => {
            for edge in border.sides_mut() {
                if edge.style.is_none() {
                    edge.style = Some(BorderStyle::Thin);
                }
            }
        }
        Some(false) => {
            for edge in border.sides_mut() {
                *edge = BorderEdge::default();
            }
        }
        None => {}
    }
    if let Some(style) = patch.border_style {
        for edge in border.sides_mut() {
            edge.style = Some(style);
        }
    }
    if let Some(color) = &patch.border_color {
        for edge in border.sides_mut() {
            if edge.style.is_none() {
                edge.style = Some(BorderStyle::Thin);
            }
            edge.color = Some(color.clone());
        }
    }
    for (side, edge) in &patch.border_sides {
        let slot = match side {
            Side::Left => &mut border.left,
            Side::Right => &mut border.right,
            Side::Top => &mut border.top,
            Side::Bottom => &mut border.bottom,
        };
        *slot = edge.clone();
    }
}

fn apply_alignment(alignment: &mut Alignment, patch: &StylePatch) {
    if let Some(h) = patch.horizontal {
        alignment.horizontal = Some(h);
    }
    if let Some(v) = patch.vertical {
        alignment.vertical = Some(v);
    }
    if let Some(v) = patch.wrap_text {
        alignment.wrap_text = v;
    }
    if let Some(v) = patch.shrink_to_fit {
        alignment.shrink_to_fit = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut base = Style::default();
        base.font.italic = true;
        base.font.size = Some(11.0);
        let out = StylePatch::new().bold(true).apply(&base).unwrap();
        assert!(out.font.bold);
        assert!(out.font.italic);
        assert_eq!(out.font.size, Some(11.0));
    }

    #[test]
    fn test_border_shortcuts() {
        let red = Color::from_hex("FF0000").unwrap();
        let out = StylePatch::new()
            .border(true)
            .border_color(red.clone())
            .apply(&Style::default())
            .unwrap();
        assert_eq!(out.border.left.style, Some(BorderStyle::Thin));
        assert_eq!(out.border.bottom.color, Some(red));
        assert!(out.border.diagonal.is_empty());

        let cleared = StylePatch::new().border(false).apply(&out).unwrap();
        assert!(cleared.border.top.is_empty());
    }

    #[test]
    fn test_validation() {
        let base = Style::default();
        assert!(StylePatch::new().font_size(0.0).apply(&base).is_err());
        assert!(StylePatch::new().text_rotation(200).apply(&base).is_err());
        assert!(StylePatch::new().text_rotation(255).apply(&base).is_ok());
        assert!(StylePatch::new().indent(251).apply(&base).is_err());
    }

    #[test]
    fn test_number_format_maps_builtins() {
        let out = StylePatch::new()
            .number_format("#,##0.00")
            .apply(&Style::default())
            .unwrap();
        assert_eq!(out.number_format, NumberFormat::Builtin(4));
    }
}
