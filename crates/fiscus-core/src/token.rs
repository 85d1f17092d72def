//! Positioned text tokens extracted from a report page.
//!
//! Coordinates live in PDF space with the origin at the top-left corner, so
//! `top < bottom` for any visible token. Providers normalize text on ingest:
//! non-breaking spaces become regular spaces and surrounding whitespace is
//! trimmed; a token with no remaining text is never emitted.

use crate::error::{FiscusError, FiscusResult};

/// A single positioned word (or merged phrase) on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    x0: f64,
    x1: f64,
    top: f64,
    bottom: f64,
    text: String,
}

impl Token {
    /// Build a token, normalizing its text and checking the bounding box.
    pub fn new(
        x0: f64,
        x1: f64,
        top: f64,
        bottom: f64,
        text: impl AsRef<str>,
    ) -> FiscusResult<Self> {
        if x0 > x1 {
            return Err(FiscusError::parse(format!(
                "token has x0 {x0} > x1 {x1}"
            )));
        }
        if top > bottom {
            return Err(FiscusError::parse(format!(
                "token has top {top} > bottom {bottom}"
            )));
        }
        let text = normalize_text(text.as_ref());
        if text.is_empty() {
            return Err(FiscusError::parse("token text is empty after trimming"));
        }
        Ok(Self {
            x0,
            x1,
            top,
            bottom,
            text,
        })
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn x1(&self) -> f64 {
        self.x1
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Alias for `x0`.
    pub fn x(&self) -> f64 {
        self.x0
    }

    /// Alias for `top`.
    pub fn y(&self) -> f64 {
        self.top
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Absorb a token sitting to the right of this one: the merged token
    /// keeps this token's left edge, inherits the right edge of `other`, and
    /// joins the texts with a single space.
    pub(crate) fn absorb_right(&mut self, other: &Token) {
        self.text.push(' ');
        self.text.push_str(&other.text);
        self.x1 = other.x1;
    }
}

/// Replace non-breaking spaces and trim surrounding whitespace.
pub fn normalize_text(raw: &str) -> String {
    raw.replace('\u{a0}', " ").trim().to_string()
}

/// Sort tokens top to bottom, then left to right.
pub fn sort_reading_order(tokens: &mut [Token]) {
    tokens.sort_by(|a, b| {
        a.top
            .total_cmp(&b.top)
            .then_with(|| a.x0.total_cmp(&b.x0))
    });
}
