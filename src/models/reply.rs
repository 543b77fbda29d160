//! Outbound reply and rendered results

use serde::{Deserialize, Serialize};

use crate::handlers::keyboard::Keyboard;

/// Chart or other image produced with a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What a tool or query produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderedResult {
    pub text: String,
    pub image: Option<ChartImage>,
}

impl RenderedResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ChartImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Everything sent back for one update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub text: Option<String>,
    pub keyboard: Option<Keyboard>,
    pub image: Option<ChartImage>,
}

impl Reply {
    /// Text with no keyboard
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            keyboard: None,
            image: None,
        }
    }

    /// Text with a keyboard; an empty keyboard is dropped
    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: Some(text.into()),
            keyboard: (!keyboard.is_empty()).then_some(keyboard),
            image: None,
        }
    }

    /// A rendered result with its controls
    pub fn result(result: RenderedResult, keyboard: Keyboard) -> Self {
        let text = (!result.text.is_empty()).then_some(result.text);
        Self {
            text,
            keyboard: (!keyboard.is_empty()).then_some(keyboard),
            image: result.image,
        }
    }
}
