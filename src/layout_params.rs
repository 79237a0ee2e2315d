use crate::error::EtchError;

/// One axis of a sizing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    /// Take all the space the parent offers.
    FillParent,
    /// Take only what the content needs.
    #[default]
    WrapContent,
    Px(u32),
}

impl Dimension {
    pub const FILL_PARENT_RAW: i32 = -1;
    pub const WRAP_CONTENT_RAW: i32 = -2;

    /// Integer form: -1 for fill, -2 for wrap, otherwise the pixel value.
    pub fn raw(self) -> i32 {
        match self {
            Dimension::FillParent => Self::FILL_PARENT_RAW,
            Dimension::WrapContent => Self::WRAP_CONTENT_RAW,
            Dimension::Px(px) => px.min(i32::MAX as u32) as i32,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Dimension> {
        match raw {
            Self::FILL_PARENT_RAW => Some(Dimension::FillParent),
            Self::WRAP_CONTENT_RAW => Some(Dimension::WrapContent),
            px if px >= 0 => Some(Dimension::Px(px as u32)),
            _ => None,
        }
    }

    /// Accepts `fill_parent`/`match_parent`/`fill`, `wrap_content`/`wrap`,
    /// or a non-negative integer with an optional `px` suffix.
    pub fn parse(value: &str) -> Option<Dimension> {
        let v = value.trim();
        match v {
            "fill_parent" | "match_parent" | "fill" => Some(Dimension::FillParent),
            "wrap_content" | "wrap" => Some(Dimension::WrapContent),
            _ => parse_px(v).map(Dimension::Px),
        }
    }
}

fn parse_px(value: &str) -> Option<u32> {
    value.trim().trim_end_matches("px").trim().parse::<u32>().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Margins {
    pub fn uniform(value: u32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }

    pub fn horizontal(&self) -> i32 {
        (self.left as i64 + self.right as i64).min(i32::MAX as i64) as i32
    }

    pub fn vertical(&self) -> i32 {
        (self.top as i64 + self.bottom as i64).min(i32::MAX as i64) as i32
    }
}

/// Cross-axis alignment request for stack children. Carried for markup
/// compatibility; placement ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Left,
    Right,
    Center,
}

impl Gravity {
    pub fn parse(value: &str) -> Option<Gravity> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Gravity::Left),
            "right" => Some(Gravity::Right),
            "center" => Some(Gravity::Center),
            _ => None,
        }
    }
}

/// Which [`LayoutParams`] variant a parent requires of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutParamsKind {
    Plain,
    Margin,
    Stack,
}

impl LayoutParamsKind {
    pub fn name(self) -> &'static str {
        match self {
            LayoutParamsKind::Plain => "plain",
            LayoutParamsKind::Margin => "margin",
            LayoutParamsKind::Stack => "stack",
        }
    }

    /// Whether params of this kind can be used where `required` is expected.
    /// Each variant extends the one before it.
    pub fn satisfies(self, required: LayoutParamsKind) -> bool {
        match required {
            LayoutParamsKind::Plain => true,
            LayoutParamsKind::Margin => {
                matches!(self, LayoutParamsKind::Margin | LayoutParamsKind::Stack)
            }
            LayoutParamsKind::Stack => self == LayoutParamsKind::Stack,
        }
    }
}

/// Per-child sizing request, interpreted by the child's parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutParams {
    Plain {
        width: Dimension,
        height: Dimension,
    },
    Margin {
        width: Dimension,
        height: Dimension,
        margins: Margins,
    },
    Stack {
        width: Dimension,
        height: Dimension,
        margins: Margins,
        weight: u32,
        gravity: Gravity,
    },
}

impl Default for LayoutParams {
    fn default() -> Self {
        LayoutParams::Plain {
            width: Dimension::WrapContent,
            height: Dimension::WrapContent,
        }
    }
}

impl LayoutParams {
    pub fn plain(width: Dimension, height: Dimension) -> Self {
        LayoutParams::Plain { width, height }
    }

    pub fn margin(width: Dimension, height: Dimension, margins: Margins) -> Self {
        LayoutParams::Margin {
            width,
            height,
            margins,
        }
    }

    pub fn stack(width: Dimension, height: Dimension, weight: u32) -> Self {
        LayoutParams::Stack {
            width,
            height,
            margins: Margins::default(),
            weight,
            gravity: Gravity::default(),
        }
    }

    pub fn for_kind(kind: LayoutParamsKind) -> Self {
        LayoutParams::default().convert_to(kind)
    }

    pub fn kind(&self) -> LayoutParamsKind {
        match self {
            LayoutParams::Plain { .. } => LayoutParamsKind::Plain,
            LayoutParams::Margin { .. } => LayoutParamsKind::Margin,
            LayoutParams::Stack { .. } => LayoutParamsKind::Stack,
        }
    }

    pub fn width(&self) -> Dimension {
        match *self {
            LayoutParams::Plain { width, .. }
            | LayoutParams::Margin { width, .. }
            | LayoutParams::Stack { width, .. } => width,
        }
    }

    pub fn height(&self) -> Dimension {
        match *self {
            LayoutParams::Plain { height, .. }
            | LayoutParams::Margin { height, .. }
            | LayoutParams::Stack { height, .. } => height,
        }
    }

    pub fn set_width(&mut self, value: Dimension) {
        match self {
            LayoutParams::Plain { width, .. }
            | LayoutParams::Margin { width, .. }
            | LayoutParams::Stack { width, .. } => *width = value,
        }
    }

    pub fn set_height(&mut self, value: Dimension) {
        match self {
            LayoutParams::Plain { height, .. }
            | LayoutParams::Margin { height, .. }
            | LayoutParams::Stack { height, .. } => *height = value,
        }
    }

    /// Margins, or all zero for the plain variant.
    pub fn margins(&self) -> Margins {
        match *self {
            LayoutParams::Plain { .. } => Margins::default(),
            LayoutParams::Margin { margins, .. } | LayoutParams::Stack { margins, .. } => margins,
        }
    }

    pub fn margins_mut(&mut self) -> Option<&mut Margins> {
        match self {
            LayoutParams::Plain { .. } => None,
            LayoutParams::Margin { margins, .. } | LayoutParams::Stack { margins, .. } => {
                Some(margins)
            }
        }
    }

    pub fn weight(&self) -> u32 {
        match *self {
            LayoutParams::Stack { weight, .. } => weight,
            _ => 0,
        }
    }

    pub fn gravity(&self) -> Option<Gravity> {
        match *self {
            LayoutParams::Stack { gravity, .. } => Some(gravity),
            _ => None,
        }
    }

    /// Rebuilds these params as `kind`, keeping every field both variants
    /// share and defaulting the rest.
    pub fn convert_to(&self, kind: LayoutParamsKind) -> LayoutParams {
        let width = self.width();
        let height = self.height();
        let margins = self.margins();
        match kind {
            LayoutParamsKind::Plain => LayoutParams::Plain { width, height },
            LayoutParamsKind::Margin => LayoutParams::Margin {
                width,
                height,
                margins,
            },
            LayoutParamsKind::Stack => LayoutParams::Stack {
                width,
                height,
                margins,
                weight: self.weight(),
                gravity: self.gravity().unwrap_or_default(),
            },
        }
    }

    /// Applies one markup attribute. Returns `Ok(false)` when the attribute
    /// does not belong to this variant so the caller can report it.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<bool, EtchError> {
        match key {
            "width" | "layout_width" => {
                self.set_width(parse_dimension(key, value)?);
                Ok(true)
            }
            "height" | "layout_height" => {
                self.set_height(parse_dimension(key, value)?);
                Ok(true)
            }
            "margin" | "marginTop" | "marginBottom" | "marginLeft" | "marginRight" => {
                let Some(margins) = self.margins_mut() else {
                    return Ok(false);
                };
                let px = parse_px(value).ok_or_else(|| bad_value(key, value))?;
                match key {
                    "margin" => *margins = Margins::uniform(px),
                    "marginTop" => margins.top = px,
                    "marginBottom" => margins.bottom = px,
                    "marginLeft" => margins.left = px,
                    _ => margins.right = px,
                }
                Ok(true)
            }
            "weight" => match self {
                LayoutParams::Stack { weight, .. } => {
                    *weight = value
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| bad_value(key, value))?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            "gravity" => match self {
                LayoutParams::Stack { gravity, .. } => {
                    *gravity = Gravity::parse(value).ok_or_else(|| bad_value(key, value))?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }
}

fn parse_dimension(key: &str, value: &str) -> Result<Dimension, EtchError> {
    Dimension::parse(value).ok_or_else(|| bad_value(key, value))
}

fn bad_value(key: &str, value: &str) -> EtchError {
    EtchError::Markup(format!("invalid value {value:?} for attribute {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_raw_values() {
        assert_eq!(Dimension::FillParent.raw(), -1);
        assert_eq!(Dimension::WrapContent.raw(), -2);
        assert_eq!(Dimension::Px(12).raw(), 12);
        assert_eq!(Dimension::from_raw(-1), Some(Dimension::FillParent));
        assert_eq!(Dimension::from_raw(-3), None);
    }

    #[test]
    fn dimension_parse_accepts_keywords_and_pixels() {
        assert_eq!(Dimension::parse("fill_parent"), Some(Dimension::FillParent));
        assert_eq!(Dimension::parse("wrap"), Some(Dimension::WrapContent));
        assert_eq!(Dimension::parse("40px"), Some(Dimension::Px(40)));
        assert_eq!(Dimension::parse("-4"), None);
    }

    #[test]
    fn kind_compatibility_follows_extension_chain() {
        use LayoutParamsKind::*;
        assert!(Stack.satisfies(Margin));
        assert!(Stack.satisfies(Plain));
        assert!(Margin.satisfies(Plain));
        assert!(!Margin.satisfies(Stack));
        assert!(!Plain.satisfies(Margin));
    }

    #[test]
    fn convert_keeps_shared_fields() {
        let mut params = LayoutParams::stack(Dimension::Px(10), Dimension::FillParent, 3);
        params.margins_mut().unwrap().left = 4;
        let margin = params.convert_to(LayoutParamsKind::Margin);
        assert_eq!(margin.width(), Dimension::Px(10));
        assert_eq!(margin.margins().left, 4);
        assert_eq!(margin.weight(), 0);

        let back = margin.convert_to(LayoutParamsKind::Stack);
        assert_eq!(back.weight(), 0);
        assert_eq!(back.gravity(), Some(Gravity::Left));
    }

    #[test]
    fn attributes_bind_per_variant() {
        let mut params = LayoutParams::for_kind(LayoutParamsKind::Stack);
        assert!(params.set_attribute("width", "fill_parent").unwrap());
        assert!(params.set_attribute("margin", "2").unwrap());
        assert!(params.set_attribute("marginTop", "6").unwrap());
        assert!(params.set_attribute("weight", "2").unwrap());
        assert!(params.set_attribute("gravity", "center").unwrap());
        assert_eq!(params.width(), Dimension::FillParent);
        assert_eq!(
            params.margins(),
            Margins {
                top: 6,
                bottom: 2,
                left: 2,
                right: 2
            }
        );
        assert_eq!(params.weight(), 2);
        assert_eq!(params.gravity(), Some(Gravity::Center));

        let mut plain = LayoutParams::default();
        assert!(!plain.set_attribute("marginTop", "6").unwrap());
        assert!(!plain.set_attribute("weight", "1").unwrap());
        assert!(!plain.set_attribute("color", "red").unwrap());
    }

    #[test]
    fn malformed_attribute_is_a_markup_error() {
        let mut params = LayoutParams::for_kind(LayoutParamsKind::Stack);
        let err = params.set_attribute("weight", "-1").unwrap_err();
        assert!(matches!(err, EtchError::Markup(_)));
        assert!(params.set_attribute("height", "tall").is_err());
    }
}
