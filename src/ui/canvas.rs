use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Theme};

use crate::coords;
use crate::editor::session::{EditorSession, ToolMode};
use crate::state::masks::Provenance;
use crate::Message;

/// Accent used for mask overlays (matches the studio theme).
const ACCENT: Color = Color::from_rgb(0.576, 0.2, 0.918);

/// Interactive overlay stacked on top of the rendered working image.
///
/// Draws mask bounding boxes, click origins and the live box-drag rubber
/// band, and turns pointer gestures into editor messages carrying the
/// surface bounds the coordinate mapper needs.
pub struct EditorSurface<'a> {
    pub editor: &'a EditorSession,
}

impl<'a> Program<Message> for EditorSurface<'a> {
    type State = DragState;

    fn draw(
        &self,
        state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let Some(image) = self.editor.image() else {
            return vec![frame.into_geometry()];
        };

        // Frame-local rect; pointer handling below works in window
        // coordinates, drawing works relative to the widget origin.
        let local = Rectangle::new(Point::ORIGIN, bounds.size());
        let Some(fitted) = coords::fitted_bounds(local, image.width, image.height) else {
            return vec![frame.into_geometry()];
        };

        // Outline of the rendered image area
        frame.stroke(
            &Path::rectangle(
                Point::new(fitted.left, fitted.top),
                iced::Size::new(fitted.width, fitted.height),
            ),
            Stroke::default()
                .with_width(1.0)
                .with_color(Color::from_rgba(1.0, 1.0, 1.0, 0.15)),
        );

        let active = self.editor.masks().active();
        for record in self.editor.masks().iter() {
            let rect = coords::display_rect_of_box(
                record.bounding_box,
                &fitted,
                image.width,
                image.height,
            );
            let path = Path::rectangle(rect.position(), rect.size());
            let is_active = active == Some(record.id);

            frame.fill(
                &path,
                Color {
                    a: if is_active { 0.30 } else { 0.12 },
                    ..ACCENT
                },
            );
            frame.stroke(
                &path,
                Stroke::default()
                    .with_width(if is_active { 2.5 } else { 1.0 })
                    .with_color(Color {
                        a: if is_active { 0.9 } else { 0.5 },
                        ..ACCENT
                    }),
            );

            // Click origin marker for point-made masks
            if let Provenance::Point { origin } = record.provenance {
                let center =
                    coords::display_point_of_pixel(origin, &fitted, image.width, image.height);
                frame.fill(&Path::circle(center, 5.0), ACCENT);
                frame.stroke(
                    &Path::circle(center, 5.0),
                    Stroke::default().with_width(2.0).with_color(Color::WHITE),
                );
            }
        }

        // Rubber band for an in-progress box drag
        if let (Some(start), Some(current)) = (state.drag_start, state.last_position) {
            let a = Point::new(start.x - bounds.x, start.y - bounds.y);
            let b = Point::new(current.x - bounds.x, current.y - bounds.y);
            let top_left = Point::new(a.x.min(b.x), a.y.min(b.y));
            let size = iced::Size::new((a.x - b.x).abs(), (a.y - b.y).abs());

            frame.stroke(
                &Path::rectangle(top_left, size),
                Stroke::default().with_width(1.5).with_color(Color::WHITE),
            );
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(position) = cursor.position() {
                    if !bounds.contains(position) {
                        return (canvas::event::Status::Ignored, None);
                    }
                    match self.editor.tool() {
                        ToolMode::Point => {
                            return (
                                canvas::event::Status::Captured,
                                Some(Message::CanvasClicked {
                                    position,
                                    surface: bounds,
                                }),
                            );
                        }
                        ToolMode::Box => {
                            state.drag_start = Some(position);
                            state.last_position = Some(position);
                            return (canvas::event::Status::Captured, None);
                        }
                        ToolMode::Text => {}
                    }
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if let Some(start) = state.drag_start.take() {
                    let end = cursor.position().or(state.last_position);
                    state.last_position = None;
                    if let Some(end) = end {
                        return (
                            canvas::event::Status::Captured,
                            Some(Message::BoxDrawn {
                                start,
                                end,
                                surface: bounds,
                            }),
                        );
                    }
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if state.drag_start.is_some() {
                    if let Some(position) = cursor.position() {
                        state.last_position = Some(position);
                        return (canvas::event::Status::Captured, None);
                    }
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        let over_surface = cursor.position().is_some_and(|p| bounds.contains(p));
        if over_surface && self.editor.image().is_some() && self.editor.tool() != ToolMode::Text {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }
}

/// State for box-drag interactions.
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub drag_start: Option<Point>,
    pub last_position: Option<Point>,
}
