//! Trace preview rendering
//!
//! Draws the centered trace as a single black polyline on a white canvas,
//! equal aspect ratio, no axes. The SVG document is base64-encoded for
//! embedding in the report. Without the `preview` feature no image is
//! produced.

use crate::config::PreviewConfig;
use crate::error::ScoringError;
use crate::types::ProcessedTrace;

/// Renderer for report previews
pub struct PreviewRenderer;

impl PreviewRenderer {
    /// Render the trace and base64-encode the SVG document
    #[cfg(feature = "preview")]
    pub fn render_base64(
        trace: &ProcessedTrace,
        config: &PreviewConfig,
    ) -> Result<Option<String>, ScoringError> {
        use base64::Engine;

        let svg = Self::render_svg(trace, config)?;
        Ok(Some(base64::engine::general_purpose::STANDARD.encode(svg.as_bytes())))
    }

    #[cfg(not(feature = "preview"))]
    pub fn render_base64(
        _trace: &ProcessedTrace,
        _config: &PreviewConfig,
    ) -> Result<Option<String>, ScoringError> {
        tracing::debug!("preview feature disabled, skipping image");
        Ok(None)
    }

    /// Render the trace to an SVG document
    #[cfg(feature = "preview")]
    pub fn render_svg(trace: &ProcessedTrace, config: &PreviewConfig) -> Result<String, ScoringError> {
        use plotters::prelude::*;

        let canvas = CanvasMapping::fit(trace, config);
        let points: Vec<(i32, i32)> = trace
            .samples
            .iter()
            .filter(|s| s.x.is_finite() && s.y.is_finite())
            .map(|s| canvas.to_pixel(s.x, s.y))
            .collect();

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (config.width, config.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(preview_error)?;
            root.draw(&PathElement::new(points, BLACK.stroke_width(config.stroke_width)))
                .map_err(preview_error)?;
            root.present().map_err(preview_error)?;
        }

        tracing::debug!(bytes = svg.len(), "rendered trace preview");
        Ok(svg)
    }
}

#[cfg(feature = "preview")]
fn preview_error(err: impl std::fmt::Display) -> ScoringError {
    ScoringError::Preview(err.to_string())
}

/// Data-to-pixel transform with equal scale on both axes
#[cfg_attr(not(feature = "preview"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq)]
struct CanvasMapping {
    min_x: f64,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl CanvasMapping {
    fn fit(trace: &ProcessedTrace, config: &PreviewConfig) -> Self {
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for s in trace.samples.iter().filter(|s| s.x.is_finite() && s.y.is_finite()) {
            min_x = min_x.min(s.x);
            max_x = max_x.max(s.x);
            min_y = min_y.min(s.y);
            max_y = max_y.max(s.y);
        }
        if min_x > max_x {
            (min_x, max_x, min_y, max_y) = (0.0, 0.0, 0.0, 0.0);
        }

        let padding = f64::from(config.padding);
        let usable_w = f64::from(config.width) - 2.0 * padding;
        let usable_h = f64::from(config.height) - 2.0 * padding;
        let span_x = max_x - min_x;
        let span_y = max_y - min_y;

        let scale = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (usable_w / span_x).min(usable_h / span_y),
            (true, false) => usable_w / span_x,
            (false, true) => usable_h / span_y,
            (false, false) => 1.0,
        };

        Self {
            min_x,
            max_y,
            scale,
            offset_x: padding + 0.5 * (usable_w - span_x * scale),
            offset_y: padding + 0.5 * (usable_h - span_y * scale),
        }
    }

    /// Screen y grows downwards, so y is flipped
    fn to_pixel(&self, x: f64, y: f64) -> (i32, i32) {
        let px = self.offset_x + (x - self.min_x) * self.scale;
        let py = self.offset_y + (self.max_y - y) * self.scale;
        (px.round() as i32, py.round() as i32)
    }
}
