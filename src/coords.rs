/// Coordinate mapping between the on-screen editor surface and the
/// natural pixel space of the working image.
///
/// Mask geometry is always stored in natural image pixels. The rendered
/// image is scaled (and possibly letterboxed) inside the editor surface,
/// so every pointer event has to be translated before it can reach the
/// segmentation service, and every stored mask has to be translated back
/// before it can be drawn.

use iced::{Point, Rectangle, Size};

/// On-screen rectangle occupied by the rendered image, in the same
/// coordinate space as incoming pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayBounds {
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.y >= self.top
            && point.x < self.left + self.width
            && point.y < self.top + self.height
    }
}

/// A point in natural image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    /// Clamp into `[0, width) x [0, height)` so that clicks landing on the
    /// very edge of the rendered image stay addressable.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        Self {
            x: self.x.clamp(0, width.saturating_sub(1) as i32),
            y: self.y.clamp(0, height.saturating_sub(1) as i32),
        }
    }
}

/// An axis-aligned box in natural image pixel space, corners ordered so
/// that `(x1, y1)` is top-left and `(x2, y2)` is bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Map a pointer position on the rendered image into natural pixel
/// coordinates.
///
/// Returns `None` when the image has not been laid out yet (degenerate
/// bounds) or its natural dimensions are unknown. Callers that tolerate
/// border clicks should follow up with [`PixelPoint::clamped`].
pub fn map_display_point(
    point: Point,
    bounds: &DisplayBounds,
    natural_width: u32,
    natural_height: u32,
) -> Option<PixelPoint> {
    if bounds.width <= 0.0 || bounds.height <= 0.0 || natural_width == 0 || natural_height == 0 {
        return None;
    }

    let scale_x = natural_width as f32 / bounds.width;
    let scale_y = natural_height as f32 / bounds.height;

    Some(PixelPoint {
        x: ((point.x - bounds.left) * scale_x).round() as i32,
        y: ((point.y - bounds.top) * scale_y).round() as i32,
    })
}

/// Map a dragged box (any corner order) into a normalized pixel rect,
/// clamped to the image.
pub fn map_display_rect(
    a: Point,
    b: Point,
    bounds: &DisplayBounds,
    natural_width: u32,
    natural_height: u32,
) -> Option<PixelRect> {
    let pa = map_display_point(a, bounds, natural_width, natural_height)?
        .clamped(natural_width, natural_height);
    let pb = map_display_point(b, bounds, natural_width, natural_height)?
        .clamped(natural_width, natural_height);

    Some(PixelRect {
        x1: pa.x.min(pb.x),
        y1: pa.y.min(pb.y),
        x2: pa.x.max(pb.x),
        y2: pa.y.max(pb.y),
    })
}

/// Compute the rectangle the image actually occupies inside the editor
/// surface when scaled to fit with preserved aspect ratio (the same math
/// the image widget applies, so pointer mapping and overlay drawing agree
/// with what is on screen).
pub fn fitted_bounds(
    surface: Rectangle,
    natural_width: u32,
    natural_height: u32,
) -> Option<DisplayBounds> {
    if surface.width <= 0.0 || surface.height <= 0.0 || natural_width == 0 || natural_height == 0 {
        return None;
    }

    let scale = (surface.width / natural_width as f32)
        .min(surface.height / natural_height as f32);
    let width = natural_width as f32 * scale;
    let height = natural_height as f32 * scale;

    Some(DisplayBounds {
        left: surface.x + (surface.width - width) / 2.0,
        top: surface.y + (surface.height - height) / 2.0,
        width,
        height,
    })
}

/// Inverse mapping: where a natural pixel lands on screen.
pub fn display_point_of_pixel(
    pixel: PixelPoint,
    bounds: &DisplayBounds,
    natural_width: u32,
    natural_height: u32,
) -> Point {
    let scale_x = bounds.width / natural_width.max(1) as f32;
    let scale_y = bounds.height / natural_height.max(1) as f32;

    Point::new(
        bounds.left + pixel.x as f32 * scale_x,
        bounds.top + pixel.y as f32 * scale_y,
    )
}

/// Inverse mapping for a stored bounding box `[x1, y1, x2, y2]`.
pub fn display_rect_of_box(
    bounding_box: [f32; 4],
    bounds: &DisplayBounds,
    natural_width: u32,
    natural_height: u32,
) -> Rectangle {
    let scale_x = bounds.width / natural_width.max(1) as f32;
    let scale_y = bounds.height / natural_height.max(1) as f32;

    Rectangle::new(
        Point::new(
            bounds.left + bounding_box[0] * scale_x,
            bounds.top + bounding_box[1] * scale_y,
        ),
        Size::new(
            (bounding_box[2] - bounding_box[0]) * scale_x,
            (bounding_box[3] - bounding_box[1]) * scale_y,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_center_click_to_image_pixel() {
        // 200x200 on-screen element backed by a 400x400 image
        let bounds = DisplayBounds {
            left: 0.0,
            top: 0.0,
            width: 200.0,
            height: 200.0,
        };

        let pixel = map_display_point(Point::new(100.0, 100.0), &bounds, 400, 400).unwrap();

        assert_eq!(pixel, PixelPoint { x: 200, y: 200 });
    }

    #[test]
    fn accounts_for_element_offset() {
        let bounds = DisplayBounds {
            left: 50.0,
            top: 30.0,
            width: 200.0,
            height: 100.0,
        };

        let pixel = map_display_point(Point::new(150.0, 80.0), &bounds, 400, 200).unwrap();

        assert_eq!(pixel, PixelPoint { x: 200, y: 100 });
    }

    #[test]
    fn inside_points_stay_inside_the_image() {
        let bounds = DisplayBounds {
            left: 13.0,
            top: 7.0,
            width: 320.0,
            height: 180.0,
        };
        let (nw, nh) = (1280, 720);

        // Sample the whole displayed area on a grid
        for ix in 0..32 {
            for iy in 0..18 {
                let point = Point::new(
                    bounds.left + ix as f32 * 10.0 + 0.5,
                    bounds.top + iy as f32 * 10.0 + 0.5,
                );
                assert!(bounds.contains(point));

                let pixel = map_display_point(point, &bounds, nw, nh)
                    .unwrap()
                    .clamped(nw, nh);
                assert!(pixel.x >= 0 && (pixel.x as u32) < nw, "x out of range: {pixel:?}");
                assert!(pixel.y >= 0 && (pixel.y as u32) < nh, "y out of range: {pixel:?}");
            }
        }
    }

    #[test]
    fn mapping_is_scale_invariant() {
        let bounds = DisplayBounds {
            left: 10.0,
            top: 20.0,
            width: 150.0,
            height: 90.0,
        };
        let doubled = DisplayBounds {
            left: 10.0,
            top: 20.0,
            width: 300.0,
            height: 180.0,
        };

        // Same relative position in both layouts
        let point = Point::new(10.0 + 45.0, 20.0 + 27.0);
        let point_doubled = Point::new(10.0 + 90.0, 20.0 + 54.0);

        let a = map_display_point(point, &bounds, 600, 360).unwrap();
        let b = map_display_point(point_doubled, &doubled, 1200, 720).unwrap();

        assert_eq!(a.x * 2, b.x);
        assert_eq!(a.y * 2, b.y);
    }

    #[test]
    fn degenerate_bounds_are_rejected() {
        let flat = DisplayBounds {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 100.0,
        };
        assert!(map_display_point(Point::new(10.0, 10.0), &flat, 400, 400).is_none());

        let unloaded = DisplayBounds {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        };
        assert!(map_display_point(Point::new(10.0, 10.0), &unloaded, 0, 400).is_none());
    }

    #[test]
    fn drag_corners_are_normalized() {
        let bounds = DisplayBounds {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        };

        // Drag from bottom-right to top-left
        let rect = map_display_rect(
            Point::new(80.0, 90.0),
            Point::new(20.0, 10.0),
            &bounds,
            100,
            100,
        )
        .unwrap();

        assert!(rect.x1 <= rect.x2 && rect.y1 <= rect.y2);
        assert_eq!((rect.x1, rect.y1, rect.x2, rect.y2), (20, 10, 80, 90));
    }

    #[test]
    fn fitted_bounds_letterboxes_wide_images() {
        // 2:1 image in a square surface -> centered vertically
        let surface = Rectangle::new(Point::ORIGIN, Size::new(400.0, 400.0));
        let fitted = fitted_bounds(surface, 800, 400).unwrap();

        assert_eq!(fitted.width, 400.0);
        assert_eq!(fitted.height, 200.0);
        assert_eq!(fitted.left, 0.0);
        assert_eq!(fitted.top, 100.0);
    }

    #[test]
    fn round_trips_through_the_inverse_mapping() {
        let bounds = DisplayBounds {
            left: 25.0,
            top: 50.0,
            width: 500.0,
            height: 250.0,
        };

        let pixel = PixelPoint { x: 640, y: 160 };
        let display = display_point_of_pixel(pixel, &bounds, 1000, 500);
        let back = map_display_point(display, &bounds, 1000, 500).unwrap();

        assert_eq!(back, pixel);
    }
}
