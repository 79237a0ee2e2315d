use fixed::types::I32F32;

use crate::error::EtchError;

/// Surface unit used by recorded drawing commands.
///
/// Values are quantized to 1/1000 of a unit on construction so that two
/// recordings of the same tree compare equal bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let denom = 1i128 << 32;
        let milli = milli as i128;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_add(rhs.to_milli_i64()))
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_sub(rhs.to_milli_i64()))
    }
}

/// Extent of a drawing surface, in surface units (points for print
/// surfaces, pixels for raster surfaces rendered at 72 DPI).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self::new(612.0, 792.0)
    }

    pub fn from_inches(width_in: f32, height_in: f32) -> Self {
        Self::new(width_in * 72.0, height_in * 72.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn argb8(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Parses `#RRGGBB`, `#AARRGGBB` or one of a few color names.
    pub fn parse(input: &str) -> Option<Color> {
        let v = input.trim();
        if let Some(hex) = v.strip_prefix('#') {
            if !hex.is_ascii() {
                return None;
            }
            let byte = |idx: usize| u8::from_str_radix(hex.get(idx..idx + 2)?, 16).ok();
            return match hex.len() {
                6 => Some(Color::argb8(0xff, byte(0)?, byte(2)?, byte(4)?)),
                8 => Some(Color::argb8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
                _ => None,
            };
        }
        match v.to_ascii_lowercase().as_str() {
            "black" => Some(Color::BLACK),
            "white" => Some(Color::WHITE),
            "red" => Some(Color::rgb(1.0, 0.0, 0.0)),
            "green" => Some(Color::rgb(0.0, 0.5, 0.0)),
            "blue" => Some(Color::rgb(0.0, 0.0, 1.0)),
            "gray" | "grey" => Some(Color::rgb(0.5, 0.5, 0.5)),
            "yellow" => Some(Color::rgb(1.0, 1.0, 0.0)),
            "cyan" => Some(Color::rgb(0.0, 1.0, 1.0)),
            "magenta" => Some(Color::rgb(1.0, 0.0, 1.0)),
            "transparent" => Some(Color::TRANSPARENT),
            _ => None,
        }
    }
}

/// Axis-aligned rectangle whose width and height can never be negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl RectF {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Result<Self, EtchError> {
        let mut rect = RectF::default();
        rect.set(left, top, right, bottom)?;
        Ok(rect)
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(width: f32, height: f32) -> Result<Self, EtchError> {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn left(&self) -> f32 {
        self.left
    }

    pub fn top(&self) -> f32 {
        self.top
    }

    pub fn right(&self) -> f32 {
        self.right
    }

    pub fn bottom(&self) -> f32 {
        self.bottom
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Replaces all four edges. On failure the rectangle is left unchanged.
    pub fn set(&mut self, left: f32, top: f32, right: f32, bottom: f32) -> Result<(), EtchError> {
        // Written as negated >= so NaN edges are rejected too.
        if !(right >= left) || !(bottom >= top) {
            return Err(EtchError::Geometry {
                left,
                top,
                right,
                bottom,
            });
        }
        self.left = left;
        self.top = top;
        self.right = right;
        self.bottom = bottom;
        Ok(())
    }

    pub fn offset(&mut self, dx: f32, dy: f32) {
        self.left += dx;
        self.right += dx;
        self.top += dy;
        self.bottom += dy;
    }

    pub fn set_width(&mut self, width: f32) -> Result<(), EtchError> {
        self.set(self.left, self.top, self.left + width, self.bottom)
    }

    pub fn set_height(&mut self, height: f32) -> Result<(), EtchError> {
        self.set(self.left, self.top, self.right, self.top + height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rect_rejects_negative_extent() {
        let err = RectF::new(10.0, 0.0, 5.0, 4.0).unwrap_err();
        assert!(matches!(err, EtchError::Geometry { .. }));
        assert!(err.to_string().contains("negative width"));

        let err = RectF::new(0.0, 10.0, 5.0, 4.0).unwrap_err();
        assert!(err.to_string().contains("negative height"));
    }

    #[test]
    fn rect_rejects_nan_edges() {
        assert!(RectF::new(0.0, 0.0, f32::NAN, 1.0).is_err());
    }

    #[test]
    fn rect_resize_is_anchored_at_left_top() {
        let mut rect = RectF::new(2.0, 3.0, 4.0, 5.0).unwrap();
        rect.set_width(10.0).unwrap();
        rect.set_height(1.0).unwrap();
        assert_eq!(rect, RectF::new(2.0, 3.0, 12.0, 4.0).unwrap());

        assert!(rect.set_width(-1.0).is_err());
        assert_eq!(rect.width(), 10.0, "failed resize must not mutate");
    }

    #[test]
    fn rect_offset_translates_all_edges() {
        let mut rect = RectF::from_size(4.0, 2.0).unwrap();
        rect.offset(3.0, -1.0);
        assert_eq!(rect.left(), 3.0);
        assert_eq!(rect.top(), -1.0);
        assert_eq!(rect.width(), 4.0);
        assert_eq!(rect.height(), 2.0);
    }

    #[test]
    fn color_parse_accepts_hex_and_names() {
        assert_eq!(Color::parse("#ff0000"), Some(Color::rgb(1.0, 0.0, 0.0)));
        let c = Color::parse("#80000000").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(Color::parse("Blue"), Some(Color::rgb(0.0, 0.0, 1.0)));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn pt_quantizes_to_milli_units() {
        assert_eq!(Pt::from_f32(1.0004), Pt::from_f32(1.0));
        assert_eq!(Pt::from_i32(3).to_milli_i64(), 3000);
        assert_eq!((Pt::from_i32(3) - Pt::from_f32(0.5)).to_f32(), 2.5);
    }

    proptest! {
        #[test]
        fn valid_rects_have_non_negative_extent(
            left in -1.0e4f32..1.0e4,
            top in -1.0e4f32..1.0e4,
            w in 0.0f32..1.0e4,
            h in 0.0f32..1.0e4,
        ) {
            let rect = RectF::new(left, top, left + w, top + h).unwrap();
            prop_assert!(rect.width() >= 0.0);
            prop_assert!(rect.height() >= 0.0);
        }

        #[test]
        fn inverted_rects_always_fail(
            left in -1.0e4f32..1.0e4,
            top in -1.0e4f32..1.0e4,
            shrink in 0.5f32..1.0e3,
        ) {
            let is_geometry = |r: Result<RectF, EtchError>| matches!(r, Err(EtchError::Geometry { .. }));
            prop_assert!(is_geometry(RectF::new(left, top, left - shrink, top)));
            prop_assert!(is_geometry(RectF::new(left, top, left, top - shrink)));
        }
    }
}
