//! Small XML writer with minimal allocations, used for every part we regenerate

use crate::error::Result;
use std::io::Write;

/// Buffered XML writer that writes straight to its output
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
}

impl XmlWriter<Vec<u8>> {
    /// Writer collecting into memory
    pub fn in_memory() -> Self {
        XmlWriter::new(Vec::with_capacity(8192))
    }

    /// Flush and return what was written as a string
    pub fn into_string(mut self) -> Result<String> {
        self.flush()?;
        Ok(String::from_utf8(self.writer)?)
    }
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(8192), // 8KB buffer
        }
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > 4096 {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Write string data
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Write XML element start tag (left open for attributes)
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_str(name)
    }

    /// Write XML element end tag
    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"</")?;
        self.write_str(name)?;
        self.write_raw(b">")
    }

    /// Close an open start tag as self-closing
    #[inline]
    pub fn close_empty(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    /// Write attribute
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    /// Write attribute with integer value
    #[inline]
    pub fn attribute_int(&mut self, name: &str, value: i64) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_str(buf.format(value))?;
        self.write_raw(b"\"")
    }

    /// Write attribute with a float value, without a trailing `.0` for whole numbers
    #[inline]
    pub fn attribute_num(&mut self, name: &str, value: f64) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_number(value)?;
        self.write_raw(b"\"")
    }

    /// Write a number the way cell values are stored: whole numbers without a fraction
    pub fn write_number(&mut self, value: f64) -> Result<()> {
        self.write_str(&number_text(value))
    }

    /// Close start tag
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// `<name>text</name>` with escaping
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start_element(name)?;
        self.close_start_tag()?;
        self.write_escaped(text)?;
        self.end_element(name)
    }

    /// Write text content with XML escaping
    #[inline]
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        for byte in text.bytes() {
            match byte {
                b'&' => self.buffer.extend_from_slice(b"&amp;"),
                b'<' => self.buffer.extend_from_slice(b"&lt;"),
                b'>' => self.buffer.extend_from_slice(b"&gt;"),
                b'"' => self.buffer.extend_from_slice(b"&quot;"),
                b'\'' => self.buffer.extend_from_slice(b"&apos;"),
                _ => self.buffer.push(byte),
            }
        }
        if self.buffer.len() > 4096 {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush buffer to underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Text of a number as it is stored in a cell: whole numbers without a fraction.
pub(crate) fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        let mut buf = itoa::Buffer::new();
        buf.format(value as i64).to_string()
    } else {
        value.to_string()
    }
}
