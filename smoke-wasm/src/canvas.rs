use smoke::capture::{CaptureError, Frame};

use wasm_bindgen::{JsCast, JsValue};

use crate::download::describe;

/// Copies the rendered canvas into a 2D canvas to read its pixels.
///
/// Must run in the same task that presented the frame, before the browser
/// composites and clears the drawing buffer.
pub struct CanvasGrabber {
    canvas: web_sys::HtmlCanvasElement,
    context: web_sys::CanvasRenderingContext2d,
}

impl CanvasGrabber {
    pub fn new(document: &web_sys::Document) -> Result<Self, JsValue> {
        let canvas = document
            .create_element("canvas")?
            .dyn_into::<web_sys::HtmlCanvasElement>()?;
        let context = canvas
            .get_context("2d")?
            .ok_or("the browser doesn't support 2D canvases")?
            .dyn_into::<web_sys::CanvasRenderingContext2d>()?;

        Ok(Self { canvas, context })
    }

    pub fn grab(&self, source: &web_sys::HtmlCanvasElement) -> Result<Frame, CaptureError> {
        let (width, height) = (source.width(), source.height());
        let to_error = |err: JsValue| CaptureError::Readback(describe(&err));

        if self.canvas.width() != width || self.canvas.height() != height {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }

        self.context
            .draw_image_with_html_canvas_element(source, 0.0, 0.0)
            .map_err(to_error)?;
        let image_data = self
            .context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .map_err(to_error)?;

        Frame::from_raw(width, height, image_data.data().0)
            .ok_or_else(|| CaptureError::Readback("pixel buffer has the wrong size".to_string()))
    }
}

/// The canvas resolution for a CSS size, with the device pixel ratio capped
/// at `max_pixel_ratio`.
pub fn physical_from_logical_size(
    logical_width: u32,
    logical_height: u32,
    device_pixel_ratio: f64,
    max_pixel_ratio: f64,
) -> (u32, u32) {
    let pixel_ratio = device_pixel_ratio.min(max_pixel_ratio).max(0.0);
    (
        (pixel_ratio * f64::from(logical_width)) as u32,
        (pixel_ratio * f64::from(logical_height)) as u32,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pixel_ratio_is_capped() {
        assert_eq!(physical_from_logical_size(640, 480, 1.0, 2.0), (640, 480));
        assert_eq!(physical_from_logical_size(640, 480, 1.5, 2.0), (960, 720));
        assert_eq!(physical_from_logical_size(640, 480, 3.0, 2.0), (1280, 960));
    }
}
