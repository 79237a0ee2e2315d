use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};

use crate::canvas::{Paint, TextMeasurer};
use crate::error::EtchError;
use crate::types::RectF;

/// Name every unresolved font falls back to.
pub const DEFAULT_FONT: &str = "Helvetica";

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: Option<usize>,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, f32>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<f32> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: f32) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Fonts available for measuring and painting text.
///
/// Helvetica metrics are built in so text can be sized without any font
/// files; registered TrueType/OpenType fonts are looked up by their
/// PostScript, full, family or file-stem name, case-insensitively.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    text_width_cache: Mutex<TextWidthCache>,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
}

/// Metrics in 1/1000 em units.
#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) missing_width: u16,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    /// Registers every `.ttf`/`.otf` file in `path`, returning how many were
    /// added. Files that fail to parse are skipped.
    pub fn register_dir(&mut self, path: impl AsRef<Path>) -> Result<usize, EtchError> {
        let mut count = 0;
        for entry in fs::read_dir(path.as_ref())?.flatten() {
            let path = entry.path();
            if !path.is_file() || !has_font_extension(&path) {
                continue;
            }
            match self.register_file(&path) {
                Ok(_) => count += 1,
                Err(err) => log::warn!("skipping font {}: {}", path.display(), err),
            }
        }
        Ok(count)
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String, EtchError> {
        let path = path.as_ref();
        if !has_font_extension(path) {
            return Err(EtchError::Font(format!(
                "{} is not a .ttf or .otf file",
                path.display()
            )));
        }
        let data = fs::read(path)?;
        let source = path.to_string_lossy();
        self.register_bytes(data, Some(&source))
    }

    /// Registers a font program held in memory and returns its primary name.
    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, EtchError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let (name, aliases, metrics) = {
            let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
                return Err(EtchError::Font(format!("invalid font data for {source}")));
            };
            let (name, aliases) = font_names(&face, Path::new(source));
            (name, aliases, FontMetrics::from_face(&face))
        };

        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
        });

        let mut all_aliases = Vec::new();
        all_aliases.push(name.clone());
        all_aliases.extend(aliases);
        for alias in all_aliases {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        log::debug!("registered font {name} from {source}");
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.fonts.get(*index))
    }

    fn metrics_for(&self, name: &str) -> (Option<usize>, &FontMetrics) {
        let key = normalize_name(name);
        match self.lookup.get(&key) {
            Some(&index) => match self.fonts.get(index) {
                Some(font) => (Some(index), &font.metrics),
                None => (None, helvetica()),
            },
            None => (None, helvetica()),
        }
    }

    /// Advance width of `text` set at `font_size`.
    pub fn measure_text_width(&self, name: &str, font_size: f32, text: &str) -> f32 {
        if text.is_empty() || !(font_size > 0.0) {
            return 0.0;
        }
        let (index, metrics) = self.metrics_for(name);
        let cache_key = TextWidthKey {
            font_index: index,
            size_milli: (font_size as f64 * 1000.0).round() as i64,
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let shaped = match index.and_then(|i| self.fonts.get(i)) {
            Some(font) if !metrics.is_within_range(text) => {
                measure_text_width_full(font, font_size, text)
            }
            _ => None,
        };
        let value = shaped.unwrap_or_else(|| metrics.measure_text_width(font_size, text));
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }

    /// Ascent above and descent below the baseline, both non-negative.
    pub fn vertical_extents(&self, name: &str, font_size: f32) -> (f32, f32) {
        let (_, metrics) = self.metrics_for(name);
        let ascent = metrics.ascent.max(0) as f32 * font_size / 1000.0;
        let descent = (metrics.descent as i32).abs() as f32 * font_size / 1000.0;
        (ascent, descent)
    }

    #[cfg(test)]
    fn cached_widths(&self) -> usize {
        self.text_width_cache
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

impl TextMeasurer for FontRegistry {
    fn measure_text(&self, text: &str, paint: &Paint) -> RectF {
        let width = self
            .measure_text_width(&paint.font_name, paint.text_size, text)
            .max(0.0);
        let (ascent, descent) = self.vertical_extents(&paint.font_name, paint.text_size.max(0.0));
        RectF::new(0.0, -ascent, width, descent).unwrap_or_default()
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let symbol_subtable = select_symbol_subtable(face);
        let widths = build_widths(face, scale, first_char, last_char, symbol_subtable);
        let missing_width = widths
            .get((b' ' - first_char) as usize)
            .copied()
            .unwrap_or(0);
        Self {
            first_char,
            last_char,
            widths,
            ascent: scale_i16(face.ascender(), scale),
            descent: scale_i16(face.descender(), scale),
            missing_width,
        }
    }

    fn advance_for_char(&self, ch: char) -> u16 {
        let code = ch as u32;
        let first = self.first_char as u32;
        let last = self.last_char as u32;
        if code < first || code > last {
            return self.missing_width;
        }
        let idx = (code - first) as usize;
        self.widths.get(idx).copied().unwrap_or(self.missing_width)
    }

    fn measure_text_width(&self, font_size: f32, text: &str) -> f32 {
        let total_units: u32 = text
            .chars()
            .map(|ch| self.advance_for_char(ch) as u32)
            .fold(0u32, |acc, adv| acc.saturating_add(adv));
        total_units as f32 * font_size / 1000.0
    }

    fn is_within_range(&self, text: &str) -> bool {
        let first = self.first_char as u32;
        let last = self.last_char as u32;
        text.chars().all(|ch| {
            let code = ch as u32;
            code >= first && code <= last
        })
    }
}

// Standard Helvetica advance widths for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

fn helvetica() -> &'static FontMetrics {
    static METRICS: std::sync::OnceLock<FontMetrics> = std::sync::OnceLock::new();
    METRICS.get_or_init(|| FontMetrics {
        first_char: b' ',
        last_char: b'~',
        widths: HELVETICA_WIDTHS.to_vec(),
        ascent: 931,
        descent: -225,
        missing_width: 556,
    })
}

fn has_font_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ext == "ttf" || ext == "otf"
        })
        .unwrap_or(false)
}

fn select_symbol_subtable<'a>(
    face: &'a ttf_parser::Face<'a>,
) -> Option<ttf_parser::cmap::Subtable<'a>> {
    let cmap = face.tables().cmap?;
    let mut first = None;
    let mut symbol = None;
    for subtable in cmap.subtables {
        if subtable.is_unicode() {
            return None;
        }
        if first.is_none() {
            first = Some(subtable);
        }
        if subtable.platform_id == ttf_parser::name::PlatformId::Windows
            && subtable.encoding_id == 0
        {
            symbol = Some(subtable);
        }
    }
    symbol.or(first)
}

pub(crate) fn glyph_index_for_char(face: &ttf_parser::Face<'_>, ch: char) -> Option<ttf_parser::GlyphId> {
    glyph_index_for_codepoint(face, ch as u32, select_symbol_subtable(face))
}

fn glyph_index_for_codepoint<'a>(
    face: &'a ttf_parser::Face<'a>,
    codepoint: u32,
    fallback: Option<ttf_parser::cmap::Subtable<'a>>,
) -> Option<ttf_parser::GlyphId> {
    if let Some(ch) = char::from_u32(codepoint) {
        if let Some(id) = face.glyph_index(ch) {
            return Some(id);
        }
    }
    let subtable = fallback?;
    if let Some(id) = subtable.glyph_index(codepoint) {
        return Some(id);
    }
    subtable.glyph_index(codepoint + 0xF000)
}

fn build_widths(
    face: &ttf_parser::Face<'_>,
    scale: f32,
    first: u8,
    last: u8,
    fallback: Option<ttf_parser::cmap::Subtable<'_>>,
) -> Vec<u16> {
    let mut widths = Vec::with_capacity((last - first) as usize + 1);
    for code in first..=last {
        let width = glyph_index_for_codepoint(face, code as u32, fallback)
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(0);
        let scaled = (width as f32 * scale).round() as i32;
        widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
    }
    widths
}

fn measure_text_width_full(font: &RegisteredFont, font_size: f32, text: &str) -> Option<f32> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let units_per_em = face.units_per_em().max(1) as f32;

    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let positions = output.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let total_units: i64 = positions.iter().map(|pos| pos.x_advance as i64).sum();
    Some((total_units.max(0) as f32) * font_size / units_per_em)
}

pub(crate) fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let code = ch as u32;
        let rtl = matches!(
            code,
            0x0590..=0x08FF
                | 0xFB1D..=0xFDFF
                | 0xFE70..=0xFEFF
                | 0x1EE00..=0x1EEFF
        );
        if rtl {
            return HbDirection::RightToLeft;
        }
    }
    HbDirection::LeftToRight
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    let mut aliases = Vec::new();
    for candidate in [family, full, post, stem].into_iter().flatten() {
        if candidate != primary {
            aliases.push(candidate);
        }
    }

    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_cover_printable_ascii() {
        let registry = FontRegistry::new();
        // "Hi" = H(722) + i(222) at 10pt.
        let width = registry.measure_text_width("Helvetica", 10.0, "Hi");
        assert!((width - 9.44).abs() < 1e-4, "width {width}");
        assert_eq!(registry.measure_text_width("Helvetica", 10.0, "1234"), 22.24);
    }

    #[test]
    fn unknown_font_falls_back_to_helvetica() {
        let registry = FontRegistry::new();
        assert_eq!(
            registry.measure_text_width("NoSuchFont", 12.0, "abc"),
            registry.measure_text_width(DEFAULT_FONT, 12.0, "abc")
        );
        assert!(registry.resolve("NoSuchFont").is_none());
    }

    #[test]
    fn characters_outside_the_table_use_missing_width() {
        let registry = FontRegistry::new();
        assert_eq!(registry.measure_text_width("Helvetica", 1000.0, "\u{e9}"), 556.0);
    }

    #[test]
    fn empty_text_and_zero_size_measure_nothing() {
        let registry = FontRegistry::new();
        assert_eq!(registry.measure_text_width("Helvetica", 12.0, ""), 0.0);
        assert_eq!(registry.measure_text_width("Helvetica", 0.0, "abc"), 0.0);
    }

    #[test]
    fn measure_text_is_baseline_relative() {
        let registry = FontRegistry::new();
        let paint = Paint {
            text_size: 10.0,
            ..Paint::default()
        };
        let rect = registry.measure_text("Hi", &paint);
        assert_eq!(rect.left(), 0.0);
        assert!((rect.top() + 9.31).abs() < 1e-4);
        assert!((rect.bottom() - 2.25).abs() < 1e-4);
        assert!((rect.height() - 11.56).abs() < 1e-4);
    }

    #[test]
    fn widths_are_cached() {
        let registry = FontRegistry::new();
        registry.measure_text_width("Helvetica", 12.0, "cached");
        registry.measure_text_width("Helvetica", 12.0, "cached");
        assert_eq!(registry.cached_widths(), 1);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_bytes(b"not a font".to_vec(), Some("broken.ttf"))
            .unwrap_err();
        assert!(matches!(err, EtchError::Font(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn non_font_files_are_rejected_by_extension() {
        let mut registry = FontRegistry::new();
        let err = registry.register_file("notes.txt").unwrap_err();
        assert!(err.to_string().contains("not a .ttf or .otf"));
    }
}
