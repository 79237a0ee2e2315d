use std::collections::BTreeMap;
use std::io::{self, Write};

use fixed::types::I32F32;

use crate::canvas::{Command, Document, Page};
use crate::font::DEFAULT_FONT;
use crate::types::{Color, Pt};

const BASE14_FONTS: [&str; 14] = [
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Symbol",
    "ZapfDingbats",
];

/// Serializes a recorded document as PDF.
///
/// Text is set in the standard 14 fonts; a font name outside that set is
/// drawn in Helvetica. Recorded coordinates have a top-left origin with y
/// growing down, so each page starts by flipping the PDF user space.
pub fn document_to_pdf(document: &Document) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    write_document(document, &mut out)?;
    Ok(out)
}

pub fn write_document<W: Write>(document: &Document, writer: &mut W) -> io::Result<()> {
    let font_map = build_font_map(document);
    let page_count = document.pages.len();

    // 1 catalog, 2 pages, 3 info, then fonts, then a page and content pair
    // per page.
    let catalog_id = 1;
    let pages_id = 2;
    let info_id = 3;
    let first_font_id = 4;
    let first_page_id = first_font_id + font_map.len();
    let total_objects = first_page_id + page_count * 2 - 1;

    let mut offsets = vec![0usize; total_objects + 1];
    let mut offset = 0usize;
    write_bytes(writer, b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n", &mut offset)?;

    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        catalog_id,
        &format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id),
    )?;

    let kids: Vec<String> = (0..page_count)
        .map(|index| format!("{} 0 R", first_page_id + index * 2))
        .collect();
    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        pages_id,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 {} {}] >>",
            kids.join(" "),
            page_count,
            fmt_pt(document.page_size.width),
            fmt_pt(document.page_size.height)
        ),
    )?;
    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        info_id,
        "<< /Producer (lightetch) >>",
    )?;

    let mut font_resources = Vec::with_capacity(font_map.len());
    for (index, (base_font, resource)) in font_map.iter().enumerate() {
        let font_id = first_font_id + index;
        write_pdf_object(writer, &mut offset, &mut offsets, font_id, &font_object(base_font))?;
        font_resources.push(format!("/{} {} 0 R", resource, font_id));
    }
    let resources = format!("<< /Font << {} >> >>", font_resources.join(" "));

    for (index, page) in document.pages.iter().enumerate() {
        let page_id = first_page_id + index * 2;
        let content_id = page_id + 1;
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            page_id,
            &format!(
                "<< /Type /Page /Parent {} 0 R /Resources {} /Contents {} 0 R >>",
                pages_id, resources, content_id
            ),
        )?;
        let content = render_page(page, document.page_size.height, &font_map);
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            content_id,
            &stream_object(&content),
        )?;
    }

    let xref_start = offset;
    write_str(writer, &format!("xref\n0 {}\n", total_objects + 1), &mut offset)?;
    write_str(writer, "0000000000 65535 f \n", &mut offset)?;
    for slot in offsets.iter().skip(1) {
        write_str(writer, &format!("{:010} 00000 n \n", slot), &mut offset)?;
    }
    write_str(
        writer,
        &format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            total_objects + 1,
            catalog_id,
            info_id,
            xref_start
        ),
        &mut offset,
    )?;
    writer.flush()
}

/// Base font name to resource name (`F1`, `F2`, ...). Helvetica is always
/// present since it is the initial text state.
fn build_font_map(document: &Document) -> BTreeMap<&'static str, String> {
    let mut used: Vec<&'static str> = vec![base14_name(DEFAULT_FONT)];
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetFontName(name) = cmd {
                let base = base14_name(name);
                if !used.contains(&base) {
                    used.push(base);
                }
            }
        }
    }
    used.sort_unstable();
    used.into_iter()
        .enumerate()
        .map(|(index, name)| (name, format!("F{}", index + 1)))
        .collect()
}

fn base14_name(name: &str) -> &'static str {
    let wanted = name.trim().trim_matches('"').trim_matches('\'');
    match BASE14_FONTS
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(wanted))
    {
        Some(found) => found,
        None => {
            log::debug!("font {wanted:?} is not a standard PDF font; using {DEFAULT_FONT}");
            "Helvetica"
        }
    }
}

fn font_object(base_font: &str) -> String {
    let encoding = if base_font == "Symbol" || base_font == "ZapfDingbats" {
        String::new()
    } else {
        " /Encoding /WinAnsiEncoding".to_string()
    };
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{}{} >>",
        base_font, encoding
    )
}

fn render_page(page: &Page, page_height: Pt, font_map: &BTreeMap<&'static str, String>) -> String {
    let mut out = String::new();
    out.push_str(&format!("1 0 0 -1 0 {} cm\n", fmt_pt(page_height)));

    let mut font_stack: Vec<(&'static str, Pt)> = Vec::new();
    let mut current_font = base14_name(DEFAULT_FONT);
    let mut current_size = Pt::from_f32(12.0);

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                font_stack.push((current_font, current_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((font, size)) = font_stack.pop() {
                    current_font = font;
                    current_size = size;
                }
                out.push_str("Q\n");
            }
            Command::Translate(x, y) => {
                out.push_str(&format!("1 0 0 1 {} {} cm\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::Scale(x, y) => {
                out.push_str(&format!("{} 0 0 {} 0 0 cm\n", fmt(*x), fmt(*y)));
            }
            Command::Rotate(degrees) => {
                let radians = degrees.to_radians();
                let sin = libm::sinf(radians);
                let cos = libm::cosf(radians);
                out.push_str(&format!(
                    "{} {} {} {} 0 0 cm\n",
                    fmt(cos),
                    fmt(sin),
                    fmt(-sin),
                    fmt(cos)
                ));
            }
            Command::Shear(sx, sy) => {
                out.push_str(&format!("1 {} {} 1 0 0 cm\n", fmt(*sy), fmt(*sx)));
            }
            Command::SetFillColor(color) => out.push_str(&color_to_pdf(*color, "rg")),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf(*color, "RG")),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => current_font = base14_name(name),
            Command::SetFontSize(size) => current_size = *size,
            Command::DrawLine { x0, y0, x1, y1 } => {
                out.push_str(&format!(
                    "{} {} m {} {} l S\n",
                    fmt_pt(*x0),
                    fmt_pt(*y0),
                    fmt_pt(*x1),
                    fmt_pt(*y1)
                ));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re f\n",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(current_font)
                    .map(String::as_str)
                    .unwrap_or("F1");
                // Text space is flipped back so glyphs stand upright.
                out.push_str(&format!(
                    "BT /{} {} Tf 1 0 0 -1 {} {} Tm ({}) Tj ET\n",
                    resource,
                    fmt_pt(current_size),
                    fmt_pt(*x),
                    fmt_pt(*y),
                    encode_winansi(text)
                ));
            }
        }
    }
    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{} 0 obj\n", obj_id), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

/// Encodes `input` as a WinAnsi literal string body. Characters outside the
/// encoding become `?`.
fn encode_winansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => b'?',
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

fn color_to_pdf(color: Color, operator: &str) -> String {
    format!(
        "{} {} {} {}\n",
        fmt(color.r.clamp(0.0, 1.0)),
        fmt(color.g.clamp(0.0, 1.0)),
        fmt(color.b.clamp(0.0, 1.0)),
        operator
    )
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::saturating_from_num(value);
    let scaled = (fixed.saturating_mul(I32F32::from_num(1000))).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}
