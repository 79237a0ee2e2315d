use std::fmt;

use crate::layout_params::LayoutParamsKind;

#[derive(Debug)]
pub enum EtchError {
    /// A rectangle was built or resized with `right < left` or `bottom < top`.
    Geometry {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
    /// A view's sizing logic finished without recording a measured dimension.
    ContractViolation(String),
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    UnsupportedLayoutParams {
        expected: LayoutParamsKind,
        found: LayoutParamsKind,
    },
    Markup(String),
    Font(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for EtchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtchError::Geometry {
                left,
                top,
                right,
                bottom,
            } => {
                if right < left {
                    write!(f, "cannot have negative width: left={left} right={right}")
                } else {
                    write!(f, "cannot have negative height: top={top} bottom={bottom}")
                }
            }
            EtchError::ContractViolation(message) => {
                write!(f, "measure contract violated: {}", message)
            }
            EtchError::IndexOutOfRange { index, len } => {
                write!(f, "child index {} out of range for {} children", index, len)
            }
            EtchError::UnsupportedLayoutParams { expected, found } => write!(
                f,
                "unsupported layout params: parent requires {} params, child carries {}",
                expected.name(),
                found.name()
            ),
            EtchError::Markup(message) => write!(f, "markup error: {}", message),
            EtchError::Font(message) => write!(f, "font error: {}", message),
            EtchError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            EtchError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for EtchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EtchError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EtchError {
    fn from(value: std::io::Error) -> Self {
        EtchError::Io(value)
    }
}
