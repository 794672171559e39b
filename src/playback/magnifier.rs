//! Press-and-hold magnifier over the rendered page.
//!
//! Touch points arrive in container pixels and are mapped back to page units
//! through the inverse of the current [`PageFit`]. The lens shows a square of
//! the page snapshot centered on that point, enlarged by the zoom factor
//! relative to what is on screen.

use super::layout::PageFit;
use crate::geometry::{Point, Rect, Size};
use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Supplies a rendered image of a page, for example from the platform's
/// document renderer. The image may have any resolution; it is assumed to
/// cover the whole page.
pub trait PageSnapshot: Send {
    fn capture(&mut self, page_index: u32, page: Size) -> Option<RgbaImage>;
}

/// Page-unit position under `touch`, or `None` when the touch is outside
/// the page area.
pub fn to_page_point(touch: Point, fit: &PageFit) -> Option<Point> {
    let point = fit.to_page(touch);
    fit.contains_page_point(point).then_some(point)
}

/// Region of the page, in page units, that the lens displays for a touch at
/// `center`. Shifted to stay inside the page where possible.
pub fn lens_source_rect(center: Point, fit: &PageFit, zoom: f32, lens_px: u32) -> Rect {
    let side = lens_px as f32 / (fit.scale * zoom.max(1.0));
    let page = fit.page;
    let half_w = (side / 2.0).min(page.width / 2.0);
    let half_h = (side / 2.0).min(page.height / 2.0);
    let cx = center.x.clamp(half_w, page.width - half_w);
    let cy = center.y.clamp(half_h, page.height - half_h);
    Rect::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

/// Crops `source` out of `snapshot` and scales it to a `lens_px` square.
pub fn render_lens(snapshot: &RgbaImage, page: Size, source: Rect, lens_px: u32) -> Option<RgbaImage> {
    if page.is_empty() || lens_px == 0 || snapshot.width() == 0 || snapshot.height() == 0 {
        return None;
    }
    let sx = snapshot.width() as f32 / page.width;
    let sy = snapshot.height() as f32 / page.height;
    let x = (source.x0 * sx).floor().max(0.0) as u32;
    let y = (source.y0 * sy).floor().max(0.0) as u32;
    let x = x.min(snapshot.width() - 1);
    let y = y.min(snapshot.height() - 1);
    let width = ((source.width() * sx).ceil() as u32).clamp(1, snapshot.width() - x);
    let height = ((source.height() * sy).ceil() as u32).clamp(1, snapshot.height() - y);

    let crop = imageops::crop_imm(snapshot, x, y, width, height).to_image();
    Some(imageops::resize(&crop, lens_px, lens_px, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn fit() -> PageFit {
        // 200x400 page shown at scale 2 in a 400x1000 container, 100px top gap.
        PageFit::compute(Size::new(400.0, 1000.0), Size::new(200.0, 400.0)).expect("fit")
    }

    #[test]
    fn touches_outside_the_page_are_ignored() {
        let fit = fit();
        assert_eq!(
            to_page_point(Point::new(200.0, 500.0), &fit),
            Some(Point::new(100.0, 200.0))
        );
        assert_eq!(to_page_point(Point::new(200.0, 50.0), &fit), None);
    }

    #[test]
    fn lens_region_shrinks_with_zoom_and_stays_on_page() {
        let fit = fit();
        let centered = lens_source_rect(Point::new(100.0, 200.0), &fit, 2.0, 160);
        assert_eq!(centered, Rect::new(80.0, 180.0, 120.0, 220.0));

        let corner = lens_source_rect(Point::new(0.0, 0.0), &fit, 2.0, 160);
        assert_eq!(corner, Rect::new(0.0, 0.0, 40.0, 40.0));
    }

    #[test]
    fn lens_crops_the_touched_area() {
        let mut snapshot = RgbaImage::from_pixel(100, 200, Rgba([255, 255, 255, 255]));
        for y in 0..20 {
            for x in 0..20 {
                snapshot.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let page = Size::new(200.0, 400.0);
        let lens = render_lens(&snapshot, page, Rect::new(0.0, 0.0, 40.0, 40.0), 64)
            .expect("lens");
        assert_eq!(lens.dimensions(), (64, 64));
        assert_eq!(lens.get_pixel(32, 32), &Rgba([0, 0, 0, 255]));

        let far = render_lens(&snapshot, page, Rect::new(150.0, 350.0, 190.0, 390.0), 64)
            .expect("lens");
        assert_eq!(far.get_pixel(32, 32), &Rgba([255, 255, 255, 255]));
    }
}
