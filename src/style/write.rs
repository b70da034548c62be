use super::{Alignment, Border, BorderEdge, Color, Fill, Font, Style, StyleTable};
use crate::error::Result;
use crate::xml::{XmlTemplate, STYLESHEET_ORDER};
use crate::xml_writer::XmlWriter;

type Out = XmlWriter<Vec<u8>>;

fn write_color(w: &mut Out, tag: &str, color: &Color) -> Result<()> {
    w.start_element(tag)?;
    match color {
        Color::Rgb(argb) => w.attribute("rgb", argb)?,
        Color::Theme { theme, tint } => {
            w.attribute_int("theme", *theme as i64)?;
            if let Some(tint) = tint {
                w.attribute("tint", &tint.to_string())?;
            }
        }
        Color::Indexed(i) => w.attribute_int("indexed", *i as i64)?,
        Color::Auto => w.attribute("auto", "1")?,
    }
    w.close_empty()
}

fn val_element(w: &mut Out, tag: &str, value: &str) -> Result<()> {
    w.start_element(tag)?;
    w.attribute("val", value)?;
    w.close_empty()
}

fn write_font(w: &mut Out, t: &XmlTemplate, font: &Font) -> Result<()> {
    let q = |local: &str| t.qname(local);
    w.start_element(&q("font"))?;
    w.close_start_tag()?;
    if font.bold {
        w.start_element(&q("b"))?;
        w.close_empty()?;
    }
    if font.italic {
        w.start_element(&q("i"))?;
        w.close_empty()?;
    }
    if font.strikethrough {
        w.start_element(&q("strike"))?;
        w.close_empty()?;
    }
    for raw in &font.extra {
        w.write_str(raw)?;
    }
    match font.underline {
        Some(super::Underline::Single) => {
            w.start_element(&q("u"))?;
            w.close_empty()?;
        }
        Some(other) => val_element(w, &q("u"), other.as_str())?,
        None => {}
    }
    if let Some(size) = font.size {
        w.start_element(&q("sz"))?;
        w.attribute_num("val", size)?;
        w.close_empty()?;
    }
    if let Some(color) = &font.color {
        write_color(w, &q("color"), color)?;
    }
    if let Some(name) = &font.name {
        val_element(w, &q("name"), name)?;
    }
    if let Some(family) = font.family {
        w.start_element(&q("family"))?;
        w.attribute_int("val", family as i64)?;
        w.close_empty()?;
    }
    if let Some(scheme) = &font.scheme {
        val_element(w, &q("scheme"), scheme)?;
    }
    w.end_element(&q("font"))
}

fn write_fill(w: &mut Out, t: &XmlTemplate, fill: &Fill) -> Result<()> {
    let q = |local: &str| t.qname(local);
    match fill {
        Fill::Gradient(raw) => w.write_str(raw),
        Fill::Pattern { pattern, fg, bg } => {
            w.start_element(&q("fill"))?;
            w.close_start_tag()?;
            w.start_element(&q("patternFill"))?;
            w.attribute("patternType", pattern)?;
            if fg.is_none() && bg.is_none() {
                w.close_empty()?;
            } else {
                w.close_start_tag()?;
                if let Some(fg) = fg {
                    write_color(w, &q("fgColor"), fg)?;
                }
                if let Some(bg) = bg {
                    write_color(w, &q("bgColor"), bg)?;
                }
                w.end_element(&q("patternFill"))?;
            }
            w.end_element(&q("fill"))
        }
    }
}

fn write_edge(w: &mut Out, tag: &str, color_tag: &str, edge: &BorderEdge) -> Result<()> {
    w.start_element(tag)?;
    if let Some(style) = edge.style {
        w.attribute("style", style.as_str())?;
    }
    match &edge.color {
        Some(color) => {
            w.close_start_tag()?;
            write_color(w, color_tag, color)?;
            w.end_element(tag)
        }
        None => w.close_empty(),
    }
}

fn write_border(w: &mut Out, t: &XmlTemplate, border: &Border) -> Result<()> {
    let q = |local: &str| t.qname(local);
    let color = q("color");
    w.start_element(&q("border"))?;
    if border.diagonal_up {
        w.attribute("diagonalUp", "1")?;
    }
    if border.diagonal_down {
        w.attribute("diagonalDown", "1")?;
    }
    for (k, v) in &border.extra_attrs {
        w.attribute(k, v)?;
    }
    w.close_start_tag()?;
    write_edge(w, &q("left"), &color, &border.left)?;
    write_edge(w, &q("right"), &color, &border.right)?;
    write_edge(w, &q("top"), &color, &border.top)?;
    write_edge(w, &q("bottom"), &color, &border.bottom)?;
    write_edge(w, &q("diagonal"), &color, &border.diagonal)?;
    if let Some(edge) = &border.vertical {
        write_edge(w, &q("vertical"), &color, edge)?;
    }
    if let Some(edge) = &border.horizontal {
        write_edge(w, &q("horizontal"), &color, edge)?;
    }
    w.end_element(&q("border"))
}

fn write_alignment(w: &mut Out, tag: &str, a: &Alignment) -> Result<()> {
    w.start_element(tag)?;
    if let Some(h) = a.horizontal {
        w.attribute("horizontal", h.as_str())?;
    }
    if let Some(v) = a.vertical {
        w.attribute("vertical", v.as_str())?;
    }
    if let Some(r) = a.text_rotation {
        w.attribute_int("textRotation", r as i64)?;
    }
    if a.wrap_text {
        w.attribute("wrapText", "1")?;
    }
    if let Some(i) = a.indent {
        w.attribute_int("indent", i as i64)?;
    }
    if a.shrink_to_fit {
        w.attribute("shrinkToFit", "1")?;
    }
    for (k, v) in &a.extra_attrs {
        w.attribute(k, v)?;
    }
    w.close_empty()
}

impl StyleTable {
    fn write_xf(&self, w: &mut Out, style: &Style) -> Result<()> {
        let t = self.template();
        let num_fmt_id = self.num_fmt_id(&style.number_format);
        let font_id = self.fonts.lookup(&style.font).unwrap_or(0);
        let fill_id = self.fills.lookup(&style.fill).unwrap_or(0);
        let border_id = self.borders.lookup(&style.border).unwrap_or(0);

        w.start_element(&t.qname("xf"))?;
        w.attribute_int("numFmtId", num_fmt_id as i64)?;
        w.attribute_int("fontId", font_id as i64)?;
        w.attribute_int("fillId", fill_id as i64)?;
        w.attribute_int("borderId", border_id as i64)?;
        w.attribute_int("xfId", style.parent as i64)?;
        if style.quote_prefix {
            w.attribute("quotePrefix", "1")?;
        }
        if num_fmt_id != 0 {
            w.attribute("applyNumberFormat", "1")?;
        }
        if font_id != 0 {
            w.attribute("applyFont", "1")?;
        }
        if fill_id != 0 {
            w.attribute("applyFill", "1")?;
        }
        if border_id != 0 {
            w.attribute("applyBorder", "1")?;
        }
        if !style.alignment.is_default() {
            w.attribute("applyAlignment", "1")?;
        }
        if style.protection.is_some() {
            w.attribute("applyProtection", "1")?;
        }
        for (k, v) in &style.extra_attrs {
            w.attribute(k, v)?;
        }

        if style.alignment.is_default() && style.protection.is_none() {
            return w.close_empty();
        }
        w.close_start_tag()?;
        if !style.alignment.is_default() {
            write_alignment(w, &t.qname("alignment"), &style.alignment)?;
        }
        if let Some(p) = &style.protection {
            w.start_element(&t.qname("protection"))?;
            if let Some(locked) = p.locked {
                w.attribute("locked", if locked { "1" } else { "0" })?;
            }
            if let Some(hidden) = p.hidden {
                w.attribute("hidden", if hidden { "1" } else { "0" })?;
            }
            w.close_empty()?;
        }
        w.end_element(&t.qname("xf"))
    }

    /// Regenerate `styles.xml`: number formats, fonts, fills, borders and cell
    /// formats are rebuilt; every other section is copied from the loaded part.
    pub(crate) fn to_xml(&self) -> Result<String> {
        let t = self.template();

        let num_fmts = if self.num_fmts.is_empty() {
            None
        } else {
            let mut w = XmlWriter::in_memory();
            w.start_element(&t.qname("numFmts"))?;
            w.attribute_int("count", self.num_fmts.len() as i64)?;
            w.close_start_tag()?;
            for (code, id) in &self.num_fmts {
                w.start_element(&t.qname("numFmt"))?;
                w.attribute_int("numFmtId", *id as i64)?;
                w.attribute("formatCode", code)?;
                w.close_empty()?;
            }
            w.end_element(&t.qname("numFmts"))?;
            Some(w.into_string()?)
        };

        let mut fonts = XmlWriter::in_memory();
        fonts.start_element(&t.qname("fonts"))?;
        fonts.attribute_int("count", self.fonts.len() as i64)?;
        fonts.close_start_tag()?;
        for font in self.fonts.items() {
            write_font(&mut fonts, t, font)?;
        }
        fonts.end_element(&t.qname("fonts"))?;

        let mut fills = XmlWriter::in_memory();
        fills.start_element(&t.qname("fills"))?;
        fills.attribute_int("count", self.fills.len() as i64)?;
        fills.close_start_tag()?;
        for fill in self.fills.items() {
            write_fill(&mut fills, t, fill)?;
        }
        fills.end_element(&t.qname("fills"))?;

        let mut borders = XmlWriter::in_memory();
        borders.start_element(&t.qname("borders"))?;
        borders.attribute_int("count", self.borders.len() as i64)?;
        borders.close_start_tag()?;
        for border in self.borders.items() {
            write_border(&mut borders, t, border)?;
        }
        borders.end_element(&t.qname("borders"))?;

        let mut xfs = XmlWriter::in_memory();
        xfs.start_element(&t.qname("cellXfs"))?;
        xfs.attribute_int("count", self.len() as i64)?;
        xfs.close_start_tag()?;
        for (_, style) in self.iter() {
            self.write_xf(&mut xfs, style)?;
        }
        xfs.end_element(&t.qname("cellXfs"))?;

        Ok(t.render(
            STYLESHEET_ORDER,
            &[
                ("numFmts", num_fmts),
                ("fonts", Some(fonts.into_string()?)),
                ("fills", Some(fills.into_string()?)),
                ("borders", Some(borders.into_string()?)),
                ("cellXfs", Some(xfs.into_string()?)),
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleId, StylePatch};

    #[test]
    fn test_unchanged_table_round_trips_semantically() {
        let t = StyleTable::blank().unwrap();
        let xml = t.to_xml().unwrap();
        let again = StyleTable::load(&xml).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again.default_style(), t.default_style());
        assert!(xml.contains("<cellStyles count=\"1\"><cellStyle name=\"Normal\""));
    }

    #[test]
    fn test_new_style_survives_write_and_reload() {
        let mut t = StyleTable::blank().unwrap();
        let patch = StylePatch::new()
            .bold(true)
            .fill(Color::from_hex("FFFF00").unwrap())
            .border(true)
            .number_format("yyyy-mm-dd")
            .wrap_text(true);
        let id = t.resolve_patch(StyleId::DEFAULT, &patch).unwrap();
        let xml = t.to_xml().unwrap();
        assert!(xml.contains("<numFmt numFmtId=\"164\" formatCode=\"yyyy-mm-dd\"/>"));

        let reloaded = StyleTable::load(&xml).unwrap();
        assert_eq!(reloaded.get(id), t.get(id));
        assert!(reloaded.get(id).unwrap().is_bold());
    }
}
