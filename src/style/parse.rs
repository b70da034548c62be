use super::{
    Alignment, Border, BorderEdge, Color, Fill, Font, NumberFormat, Pool, Protection, Style,
    StyleTable,
};
use crate::error::Result;
use crate::xml::{element_attrs, XmlTemplate};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Minimal stylesheet used for blank workbooks and packages that lack one
pub(crate) const DEFAULT_STYLESHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles><dxfs count="0"/><tableStyles count="0" defaultTableStyle="TableStyleMedium2" defaultPivotStyle="PivotStyleLight16"/></styleSheet>"#;

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key || k.rsplit(':').next() == Some(key))
        .map(|(_, v)| v.as_str())
}

fn flag(attrs: &[(String, String)], key: &str) -> Option<bool> {
    attr(attrs, key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn number<T: std::str::FromStr>(attrs: &[(String, String)], key: &str) -> Option<T> {
    attr(attrs, key).and_then(|v| v.trim().parse().ok())
}

/// `<b/>` means on; `<b val="0"/>` means off
fn toggle(xml: &str) -> Result<bool> {
    let attrs = element_attrs(xml)?;
    Ok(flag(&attrs, "val").unwrap_or(true))
}

pub(crate) fn parse_color(xml: &str) -> Result<Option<Color>> {
    let attrs = element_attrs(xml)?;
    Ok(color_from_attrs(&attrs))
}

fn color_from_attrs(attrs: &[(String, String)]) -> Option<Color> {
    if let Some(rgb) = attr(attrs, "rgb") {
        return Some(Color::Rgb(rgb.to_ascii_uppercase()));
    }
    if let Some(theme) = number::<u32>(attrs, "theme") {
        return Some(Color::Theme {
            theme,
            tint: number::<f64>(attrs, "tint"),
        });
    }
    if let Some(indexed) = number::<u32>(attrs, "indexed") {
        return Some(Color::Indexed(indexed));
    }
    if flag(attrs, "auto") == Some(true) {
        return Some(Color::Auto);
    }
    None
}

fn parse_font(xml: &str) -> Result<Font> {
    let element = XmlTemplate::parse(xml)?;
    let mut font = Font::default();
    for seg in element.segments() {
        let attrs = || element_attrs(&seg.xml);
        match seg.local.as_str() {
            "b" => font.bold = toggle(&seg.xml)?,
            "i" => font.italic = toggle(&seg.xml)?,
            "strike" => font.strikethrough = toggle(&seg.xml)?,
            "u" => {
                let a = attrs()?;
                font.underline = match attr(&a, "val") {
                    None => Some(super::Underline::Single),
                    Some("none") => None,
                    Some(v) => v.parse().ok(),
                };
            }
            "sz" => font.size = number(&attrs()?, "val"),
            "color" => font.color = parse_color(&seg.xml)?,
            "name" | "rFont" => font.name = attr(&attrs()?, "val").map(str::to_string),
            "family" => font.family = number(&attrs()?, "val"),
            "scheme" => font.scheme = attr(&attrs()?, "val").map(str::to_string),
            _ => font.extra.push(seg.xml.clone()),
        }
    }
    Ok(font)
}

fn parse_fill(xml: &str) -> Result<Fill> {
    let element = XmlTemplate::parse(xml)?;
    let Some(pattern) = element.segment("patternFill") else {
        if element.segment("gradientFill").is_some() {
            return Ok(Fill::Gradient(xml.to_string()));
        }
        return Ok(Fill::none());
    };
    let attrs = element_attrs(&pattern.xml)?;
    let kind = attr(&attrs, "patternType").unwrap_or("none").to_string();
    let inner = XmlTemplate::parse(&pattern.xml)?;
    let fg = match inner.segment("fgColor") {
        Some(seg) => parse_color(&seg.xml)?,
        None => None,
    };
    let bg = match inner.segment("bgColor") {
        Some(seg) => parse_color(&seg.xml)?,
        None => None,
    };
    Ok(Fill::Pattern {
        pattern: kind,
        fg,
        bg,
    })
}

fn parse_edge(xml: &str) -> Result<BorderEdge> {
    let attrs = element_attrs(xml)?;
    let style = match attr(&attrs, "style") {
        Some("none") | None => None,
        Some(s) => match s.parse() {
            Ok(style) => Some(style),
            Err(_) => {
                log::warn!("styles: unknown border style '{s}' treated as none");
                None
            }
        },
    };
    let element = XmlTemplate::parse(xml)?;
    let color = match element.segment("color") {
        Some(seg) => parse_color(&seg.xml)?,
        None => None,
    };
    Ok(BorderEdge { style, color })
}

fn parse_border(xml: &str) -> Result<Border> {
    let attrs = element_attrs(xml)?;
    let mut border = Border {
        diagonal_up: flag(&attrs, "diagonalUp").unwrap_or(false),
        diagonal_down: flag(&attrs, "diagonalDown").unwrap_or(false),
        extra_attrs: attrs
            .iter()
            .filter(|(k, _)| k != "diagonalUp" && k != "diagonalDown")
            .cloned()
            .collect(),
        ..Border::default()
    };
    let element = XmlTemplate::parse(xml)?;
    for seg in element.segments() {
        match seg.local.as_str() {
            "left" | "start" => border.left = parse_edge(&seg.xml)?,
            "right" | "end" => border.right = parse_edge(&seg.xml)?,
            "top" => border.top = parse_edge(&seg.xml)?,
            "bottom" => border.bottom = parse_edge(&seg.xml)?,
            "diagonal" => border.diagonal = parse_edge(&seg.xml)?,
            "vertical" => border.vertical = Some(parse_edge(&seg.xml)?),
            "horizontal" => border.horizontal = Some(parse_edge(&seg.xml)?),
            _ => {}
        }
    }
    Ok(border)
}

fn parse_alignment(xml: &str) -> Result<Alignment> {
    let attrs = element_attrs(xml)?;
    let mut alignment = Alignment::default();
    for (key, value) in &attrs {
        match key.as_str() {
            "horizontal" => alignment.horizontal = value.parse().ok(),
            "vertical" => alignment.vertical = value.parse().ok(),
            "wrapText" => alignment.wrap_text = value == "1" || value == "true",
            "shrinkToFit" => alignment.shrink_to_fit = value == "1" || value == "true",
            "indent" => alignment.indent = value.parse().ok().filter(|v| *v > 0),
            "textRotation" => alignment.text_rotation = value.parse().ok().filter(|v| *v > 0),
            _ => alignment.extra_attrs.push((key.clone(), value.clone())),
        }
    }
    Ok(alignment)
}

fn parse_protection(xml: &str) -> Result<Protection> {
    let attrs = element_attrs(xml)?;
    Ok(Protection {
        locked: flag(&attrs, "locked"),
        hidden: flag(&attrs, "hidden"),
    })
}

const XF_KNOWN: &[&str] = &[
    "numFmtId",
    "fontId",
    "fillId",
    "borderId",
    "xfId",
    "quotePrefix",
    "applyNumberFormat",
    "applyFont",
    "applyFill",
    "applyBorder",
    "applyAlignment",
    "applyProtection",
];

impl StyleTable {
    /// Parse `xl/styles.xml`
    pub(crate) fn load(xml: &str) -> Result<Self> {
        let template = XmlTemplate::parse(xml)?;

        let mut custom_codes: HashMap<u32, String> = HashMap::new();
        let mut num_fmts = IndexMap::new();
        let mut fonts = Pool::default();
        let mut fills = Pool::default();
        let mut borders = Pool::default();
        let mut xfs: Vec<String> = Vec::new();

        for seg in template.segments() {
            let children = || XmlTemplate::parse(&seg.xml);
            match seg.local.as_str() {
                "numFmts" => {
                    for child in children()?.segments() {
                        let attrs = element_attrs(&child.xml)?;
                        if let (Some(id), Some(code)) =
                            (number::<u32>(&attrs, "numFmtId"), attr(&attrs, "formatCode"))
                        {
                            custom_codes.insert(id, code.to_string());
                            num_fmts.entry(code.to_string()).or_insert(id);
                        }
                    }
                }
                "fonts" => {
                    for child in children()?.segments() {
                        fonts.push_loaded(parse_font(&child.xml)?);
                    }
                }
                "fills" => {
                    for child in children()?.segments() {
                        fills.push_loaded(parse_fill(&child.xml)?);
                    }
                }
                "borders" => {
                    for child in children()?.segments() {
                        borders.push_loaded(parse_border(&child.xml)?);
                    }
                }
                "cellXfs" => {
                    xfs = children()?
                        .segments()
                        .iter()
                        .filter(|s| s.local == "xf")
                        .map(|s| s.xml.clone())
                        .collect();
                }
                _ => {}
            }
        }

        if fonts.len() == 0 {
            fonts.push_loaded(default_font());
        }
        if fills.len() == 0 {
            fills.push_loaded(Fill::none());
            fills.push_loaded(Fill::gray125());
        }
        if borders.len() == 0 {
            borders.push_loaded(Border::default());
        }

        let mut styles = Pool::default();
        for xf in &xfs {
            styles.push_loaded(parse_xf(xf, &fonts, &fills, &borders, &custom_codes)?);
        }
        if styles.len() == 0 {
            styles.push_loaded(Style {
                font: fonts.get(0).cloned().unwrap_or_default(),
                ..Style::default()
            });
        }

        log::debug!(
            "styles: {} formats, {} fonts, {} fills, {} borders, {} custom number formats",
            styles.len(),
            fonts.len(),
            fills.len(),
            borders.len(),
            num_fmts.len()
        );

        let loaded_len = styles.len();
        Ok(StyleTable {
            styles,
            fonts,
            fills,
            borders,
            num_fmts,
            template,
            loaded_len,
            dirty: false,
        })
    }

    /// Style table of a new workbook: one default format
    pub(crate) fn blank() -> Result<Self> {
        StyleTable::load(DEFAULT_STYLESHEET)
    }
}

fn default_font() -> Font {
    Font {
        size: Some(11.0),
        name: Some("Calibri".to_string()),
        family: Some(2),
        ..Font::default()
    }
}

fn parse_xf(
    xml: &str,
    fonts: &Pool<Font>,
    fills: &Pool<Fill>,
    borders: &Pool<Border>,
    custom_codes: &HashMap<u32, String>,
) -> Result<Style> {
    let attrs = element_attrs(xml)?;
    let id = |key: &str| number::<u32>(&attrs, key).unwrap_or(0);

    let num_fmt_id = id("numFmtId");
    let number_format = match custom_codes.get(&num_fmt_id) {
        Some(code) => NumberFormat::Custom(code.clone()),
        None => NumberFormat::Builtin(num_fmt_id),
    };

    let mut style = Style {
        font: fonts.get(id("fontId")).cloned().unwrap_or_default(),
        fill: fills.get(id("fillId")).cloned().unwrap_or_default(),
        border: borders.get(id("borderId")).cloned().unwrap_or_default(),
        number_format,
        parent: id("xfId"),
        quote_prefix: flag(&attrs, "quotePrefix").unwrap_or(false),
        extra_attrs: attrs
            .iter()
            .filter(|(k, _)| !XF_KNOWN.contains(&k.as_str()))
            .cloned()
            .collect(),
        ..Style::default()
    };

    let element = XmlTemplate::parse(xml)?;
    for seg in element.segments() {
        match seg.local.as_str() {
            "alignment" => style.alignment = parse_alignment(&seg.xml)?,
            "protection" => style.protection = Some(parse_protection(&seg.xml)?),
            _ => {}
        }
    }
    Ok(style)
}

impl StyleTable {
    pub(crate) fn template(&self) -> &XmlTemplate {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{BorderStyle, StyleId};

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts><fonts count="2"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font><font><b/><sz val="14"/><color rgb="FFFF0000"/><name val="Arial"/><vertAlign val="superscript"/></font></fonts><fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"><color auto="1"/></left><right style="thin"/><top/><bottom style="double"/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="4"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0" applyNumberFormat="1" applyFont="1"><alignment horizontal="center" wrapText="1"/></xf><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" quotePrefix="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

    #[test]
    fn test_load_styles() {
        let t = StyleTable::load(STYLES).unwrap();
        assert_eq!(t.len(), 4);
        let s = t.get(StyleId(1)).unwrap();
        assert!(s.font.bold);
        assert_eq!(s.font.size, Some(14.0));
        assert_eq!(s.font.color, Some(Color::Rgb("FFFF0000".into())));
        assert_eq!(s.font.extra.len(), 1);
        assert_eq!(s.fill.color(), Some(&Color::Rgb("FFFFFF00".into())));
        assert_eq!(s.border.left.style, Some(BorderStyle::Thin));
        assert_eq!(s.border.left.color, Some(Color::Auto));
        assert_eq!(s.border.bottom.style, Some(BorderStyle::Double));
        assert_eq!(s.number_format, NumberFormat::Custom("yyyy\\-mm\\-dd".into()));
        assert!(s.alignment.wrap_text);
        assert!(t.get(StyleId(3)).unwrap().quote_prefix);
        assert_eq!(
            t.default_style().font.color,
            Some(Color::Theme { theme: 1, tint: None })
        );
    }

    #[test]
    fn test_loaded_duplicates_keep_positions() {
        let mut t = StyleTable::load(STYLES).unwrap();
        assert_eq!(t.len(), 4);
        // entries 0 and 2 are identical; lookup lands on the first
        let dup = t.get(StyleId(2)).unwrap().clone();
        assert_eq!(t.resolve(&dup), StyleId(0));
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_blank_table() {
        let t = StyleTable::blank().unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.fills.len(), 2);
        assert_eq!(t.default_style().font.name.as_deref(), Some("Calibri"));
    }
}
