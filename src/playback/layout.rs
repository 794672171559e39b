use crate::geometry::{Point, Rect, Size};
use serde::Serialize;
use ts_rs::TS;

/// Uniform page-to-container transform: the page is scaled to fit entirely
/// inside the container and centered on the free axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PageFit {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub page: Size,
}

impl PageFit {
    /// `None` until both sizes are known and non-empty.
    pub fn compute(container: Size, page: Size) -> Option<Self> {
        if container.is_empty() || page.is_empty() {
            return None;
        }
        let mut scale = (container.width / page.width).min(container.height / page.height);
        // The division may round up; step down until the scaled page fits.
        while scale > 0.0
            && (page.width * scale > container.width || page.height * scale > container.height)
        {
            scale = step_down(scale);
        }
        Some(Self {
            scale,
            offset_x: (container.width - page.width * scale) / 2.0,
            offset_y: (container.height - page.height * scale) / 2.0,
            page,
        })
    }

    pub fn scaled_page(&self) -> Size {
        Size::new(self.page.width * self.scale, self.page.height * self.scale)
    }

    pub fn to_container(&self, point: Point) -> Point {
        Point::new(
            self.offset_x + point.x * self.scale,
            self.offset_y + point.y * self.scale,
        )
    }

    pub fn to_container_rect(&self, rect: Rect) -> Rect {
        let a = self.to_container(Point::new(rect.x0, rect.y0));
        let b = self.to_container(Point::new(rect.x1, rect.y1));
        Rect::new(a.x, a.y, b.x, b.y)
    }

    /// Inverse of [`PageFit::to_container`].
    pub fn to_page(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.offset_x) / self.scale,
            (point.y - self.offset_y) / self.scale,
        )
    }

    pub fn contains_page_point(&self, point: Point) -> bool {
        (0.0..=self.page.width).contains(&point.x) && (0.0..=self.page.height).contains(&point.y)
    }
}

/// Next representable value below a positive finite `value`.
fn step_down(value: f32) -> f32 {
    f32::from_bits(value.to_bits() - 1)
}
