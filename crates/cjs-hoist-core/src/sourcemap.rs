//! V3 source map writer.

use crate::error::TransformError;
use serde::Serialize;

/// VLQ-encode a signed integer and append to output string.
fn vlq_encode(value: i64, out: &mut String) {
    const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20; // continuation bit
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

/// Maps byte offsets of a text to zero-based (line, UTF-16 column) pairs.
#[derive(Debug)]
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    pub(crate) fn line_col(&self, offset: usize) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let col = self.text[self.line_starts[line]..offset]
            .encode_utf16()
            .count();
        (line as u32, col as u32)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap<'a> {
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    sources: [Option<&'a str>; 1],
    sources_content: [&'a str; 1],
    names: [&'a str; 0],
    mappings: String,
}

/// Collects segments for a single-source map and renders the JSON.
pub(crate) struct SourceMapBuilder<'a> {
    file: Option<&'a str>,
    source_content: &'a str,
    /// Segments: (generated_line, generated_col, source_line, source_col).
    mappings: Vec<(u32, u32, u32, u32)>,
}

impl<'a> SourceMapBuilder<'a> {
    pub(crate) fn new(file: Option<&'a str>, source_content: &'a str) -> Self {
        Self {
            file,
            source_content,
            mappings: Vec::new(),
        }
    }

    pub(crate) fn add_mapping(&mut self, gen_line: u32, gen_col: u32, src_line: u32, src_col: u32) {
        self.mappings.push((gen_line, gen_col, src_line, src_col));
    }

    fn encode_mappings(&self) -> String {
        let mut out = String::new();
        let mut sorted = self.mappings.clone();
        sorted.sort_by_key(|m| (m.0, m.1));

        let mut prev_line = 0u32;
        let mut prev_gen_col = 0i64;
        let mut prev_src_line = 0i64;
        let mut prev_src_col = 0i64;
        let mut first_on_line = true;

        for &(gen_line, gen_col, src_line, src_col) in &sorted {
            while prev_line < gen_line {
                out.push(';');
                prev_line += 1;
                prev_gen_col = 0;
                first_on_line = true;
            }
            if !first_on_line {
                out.push(',');
            }
            first_on_line = false;

            vlq_encode(i64::from(gen_col) - prev_gen_col, &mut out);
            // Single source: index delta is always zero.
            vlq_encode(0, &mut out);
            vlq_encode(i64::from(src_line) - prev_src_line, &mut out);
            vlq_encode(i64::from(src_col) - prev_src_col, &mut out);

            prev_gen_col = i64::from(gen_col);
            prev_src_line = i64::from(src_line);
            prev_src_col = i64::from(src_col);
        }

        out
    }

    pub(crate) fn generate(&self) -> Result<String, TransformError> {
        let raw = RawSourceMap {
            version: 3,
            file: self.file,
            sources: [self.file],
            sources_content: [self.source_content],
            names: [],
            mappings: self.encode_mappings(),
        };
        Ok(serde_json::to_string(&raw)?)
    }
}
