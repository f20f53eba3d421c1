/// State management module
///
/// This module handles all editor-owned state, including:
/// - The working image session and staleness tokens (session.rs)
/// - Mask records and the active selection (masks.rs)
/// - Static item/style catalogs (catalog.rs)
/// - The edit history database (history.rs)

pub mod catalog;
pub mod history;
pub mod masks;
pub mod session;
