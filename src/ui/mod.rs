/// Widgets for the editor surface.

pub mod canvas;
