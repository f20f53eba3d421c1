/// The segmentation editor state machine.
///
/// `EditorSession` owns the working image session, the mask store, the
/// active tool and the two in-flight flags. Transitions are synchronous
/// and perform no I/O: `begin_*` methods validate a user intent and
/// describe the remote call to make (or refuse it), `apply_*` methods
/// reconcile a completed call back into the state. The shell layer turns
/// descriptions into actual requests.
///
/// Each orchestrator allows at most one outstanding request: a `begin_*`
/// while the matching flag is set returns `None`, so double clicks and
/// repeated submits never produce overlapping remote calls. The flag is
/// cleared on every completion path.

use iced::{Point, Rectangle};

use crate::api::types::SegmentData;
use crate::coords::{self, PixelPoint, PixelRect};
use crate::state::catalog::{CatalogItem, ReplaceKind, STYLES};
use crate::state::masks::{MaskId, MaskStore, NewMask, Provenance};
use crate::state::session::{ImageSession, SessionToken, WorkingImage};

/// How the next pointer/keyboard action is interpreted. Exactly one tool
/// is active at a time; switching tools never clears existing masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Point,
    Text,
    Box,
}

impl ToolMode {
    pub const ALL: [ToolMode; 3] = [ToolMode::Point, ToolMode::Text, ToolMode::Box];

    pub fn label(&self) -> &'static str {
        match self {
            ToolMode::Point => "Click select",
            ToolMode::Text => "Text select",
            ToolMode::Box => "Box select",
        }
    }
}

/// The segmentation query a `begin_*` transition produced, already in
/// natural pixel coordinates.
#[derive(Debug, Clone)]
pub enum SegmentQuery {
    Point(PixelPoint),
    Text { text: String },
    Box(PixelRect),
}

/// A validated, ready-to-dispatch segmentation call.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub token: SessionToken,
    pub image: WorkingImage,
    pub query: SegmentQuery,
}

impl SegmentRequest {
    /// Provenance information to hand back with the completion message.
    pub fn trigger(&self) -> SegmentTrigger {
        match &self.query {
            SegmentQuery::Point(origin) => SegmentTrigger::Point { origin: *origin },
            SegmentQuery::Text { text } => SegmentTrigger::Text { label: text.clone() },
            SegmentQuery::Box(_) => SegmentTrigger::Box,
        }
    }
}

/// What kind of user action produced an in-flight segmentation call.
#[derive(Debug, Clone)]
pub enum SegmentTrigger {
    Point { origin: PixelPoint },
    Text { label: String },
    Box,
}

/// A validated, ready-to-dispatch replacement call.
#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub token: SessionToken,
    pub image: WorkingImage,
    pub mask_base64: String,
    pub kind: ReplaceKind,
    pub item_id: String,
    pub style_id: String,
}

/// Outcome of reconciling a segmentation response.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentReport {
    /// Response belongs to an abandoned session; state untouched.
    Stale,
    /// Remote call succeeded but detected nothing; state untouched.
    Nothing,
    /// Records were added (point/box also activate their record).
    Added {
        count: usize,
        activated: Option<MaskId>,
    },
    /// Transport or remote failure; prior masks remain intact.
    Failed(String),
}

/// Outcome of reconciling a replacement response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceReport {
    Stale,
    /// Working image swapped and mask collection reset, in one step.
    Committed { width: u32, height: u32 },
    /// Image and masks unchanged.
    Failed(String),
}

pub struct EditorSession {
    session: Option<ImageSession>,
    masks: MaskStore,
    tool: ToolMode,
    replace_kind: ReplaceKind,
    selected_item: Option<&'static CatalogItem>,
    style: CatalogItem,
    segment_in_flight: bool,
    replace_in_flight: bool,
    token_counter: u64,
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            session: None,
            masks: MaskStore::new(),
            tool: ToolMode::Point,
            replace_kind: ReplaceKind::Furniture,
            selected_item: None,
            style: STYLES[0].clone(),
            segment_in_flight: false,
            replace_in_flight: false,
            token_counter: 0,
        }
    }

    fn next_token(&mut self) -> SessionToken {
        self.token_counter += 1;
        SessionToken::new(self.token_counter)
    }

    // ----- image session -----

    /// Start a new session from an uploaded image. All masks are
    /// destroyed with the old image, and any request still in flight is
    /// abandoned: its completion will carry the old token and be
    /// discarded.
    pub fn load_image(&mut self, working: WorkingImage) -> SessionToken {
        let token = self.next_token();
        self.session = Some(ImageSession::new(working, token));
        self.masks.remove_all();
        self.segment_in_flight = false;
        self.replace_in_flight = false;
        token
    }

    pub fn image(&self) -> Option<&WorkingImage> {
        self.session.as_ref().map(|s| s.working())
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|s| s.token())
    }

    // ----- masks and selections -----

    pub fn masks(&self) -> &MaskStore {
        &self.masks
    }

    pub fn select_mask(&mut self, id: MaskId) {
        self.masks.set_active(id);
    }

    pub fn remove_mask(&mut self, id: MaskId) {
        self.masks.remove(id);
    }

    pub fn clear_masks(&mut self) {
        self.masks.remove_all();
    }

    // ----- tool and catalog selection -----

    pub fn tool(&self) -> ToolMode {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolMode) {
        self.tool = tool;
    }

    pub fn replace_kind(&self) -> ReplaceKind {
        self.replace_kind
    }

    /// Switch catalog tab. The previously chosen item belongs to the
    /// other catalog, so it is dropped.
    pub fn set_replace_kind(&mut self, kind: ReplaceKind) {
        if self.replace_kind != kind {
            self.replace_kind = kind;
            self.selected_item = None;
        }
    }

    pub fn selected_item(&self) -> Option<&'static CatalogItem> {
        self.selected_item
    }

    pub fn select_item(&mut self, item: &'static CatalogItem) {
        self.selected_item = Some(item);
    }

    pub fn style(&self) -> &CatalogItem {
        &self.style
    }

    pub fn set_style(&mut self, style: CatalogItem) {
        self.style = style;
    }

    pub fn segment_busy(&self) -> bool {
        self.segment_in_flight
    }

    pub fn replace_busy(&self) -> bool {
        self.replace_in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.segment_in_flight || self.replace_in_flight
    }

    // ----- segmentation orchestration -----

    /// A click on the editor surface with the point tool. Maps the click
    /// into natural pixels and takes the in-flight flag. Clicks outside
    /// the rendered image (letterbox bars) are ignored.
    pub fn begin_point_segment(
        &mut self,
        point: Point,
        surface: Rectangle,
    ) -> Option<SegmentRequest> {
        if self.tool != ToolMode::Point || self.segment_in_flight {
            return None;
        }
        let session = self.session.as_ref()?;
        let image = session.working();

        let fitted = coords::fitted_bounds(surface, image.width, image.height)?;
        if !fitted.contains(point) {
            return None;
        }
        let pixel = coords::map_display_point(point, &fitted, image.width, image.height)?
            .clamped(image.width, image.height);

        let request = SegmentRequest {
            token: session.token(),
            image: image.clone(),
            query: SegmentQuery::Point(pixel),
        };
        self.segment_in_flight = true;
        Some(request)
    }

    /// A submitted text query. Empty or whitespace-only queries are
    /// rejected before the in-flight flag is taken, so a validation miss
    /// never blocks the next attempt.
    pub fn begin_text_segment(&mut self, query: &str) -> Option<SegmentRequest> {
        if self.segment_in_flight {
            return None;
        }
        let text = query.trim();
        if text.is_empty() {
            return None;
        }
        let session = self.session.as_ref()?;

        let request = SegmentRequest {
            token: session.token(),
            image: session.working().clone(),
            query: SegmentQuery::Text {
                text: text.to_string(),
            },
        };
        self.segment_in_flight = true;
        Some(request)
    }

    /// A completed box drag with the box tool.
    pub fn begin_box_segment(
        &mut self,
        start: Point,
        end: Point,
        surface: Rectangle,
    ) -> Option<SegmentRequest> {
        if self.tool != ToolMode::Box || self.segment_in_flight {
            return None;
        }
        let session = self.session.as_ref()?;
        let image = session.working();

        let fitted = coords::fitted_bounds(surface, image.width, image.height)?;
        if !fitted.contains(start) {
            return None;
        }
        let rect = coords::map_display_rect(start, end, &fitted, image.width, image.height)?;
        if rect.x1 == rect.x2 || rect.y1 == rect.y2 {
            return None;
        }

        let request = SegmentRequest {
            token: session.token(),
            image: image.clone(),
            query: SegmentQuery::Box(rect),
        };
        self.segment_in_flight = true;
        Some(request)
    }

    /// Reconcile a finished segmentation call.
    ///
    /// Point and box triggers admit only the first-ranked candidate and
    /// activate it; a text trigger admits every candidate under the
    /// shared label and activates none of them.
    pub fn apply_segment_outcome(
        &mut self,
        token: SessionToken,
        trigger: SegmentTrigger,
        outcome: Result<SegmentData, String>,
    ) -> SegmentReport {
        if self.token() != Some(token) {
            return SegmentReport::Stale;
        }
        self.segment_in_flight = false;

        let data = match outcome {
            Ok(data) => data,
            Err(message) => return SegmentReport::Failed(message),
        };

        let mut candidates = data.into_candidates();
        if candidates.is_empty() {
            return SegmentReport::Nothing;
        }

        match trigger {
            SegmentTrigger::Point { origin } => {
                let best = candidates.remove(0);
                let ids = self.masks.add_masks(vec![NewMask {
                    mask_base64: best.mask_base64,
                    bounding_box: best.bounding_box,
                    score: best.score,
                    provenance: Provenance::Point { origin },
                }]);
                self.masks.set_active(ids[0]);
                SegmentReport::Added {
                    count: 1,
                    activated: Some(ids[0]),
                }
            }
            SegmentTrigger::Box => {
                let best = candidates.remove(0);
                let ids = self.masks.add_masks(vec![NewMask {
                    mask_base64: best.mask_base64,
                    bounding_box: best.bounding_box,
                    score: best.score,
                    provenance: Provenance::Box,
                }]);
                self.masks.set_active(ids[0]);
                SegmentReport::Added {
                    count: 1,
                    activated: Some(ids[0]),
                }
            }
            SegmentTrigger::Text { label } => {
                let count = candidates.len();
                let records = candidates
                    .into_iter()
                    .map(|c| NewMask {
                        mask_base64: c.mask_base64,
                        bounding_box: c.bounding_box,
                        score: c.score,
                        provenance: Provenance::Text {
                            label: label.clone(),
                        },
                    })
                    .collect();
                self.masks.add_masks(records);
                SegmentReport::Added {
                    count,
                    activated: None,
                }
            }
        }
    }

    // ----- replacement orchestration -----

    /// Ask for an AI replacement of the active mask. Requires an active
    /// mask, a chosen catalog item and an idle replacement orchestrator;
    /// otherwise a no-op.
    pub fn begin_replacement(&mut self) -> Option<ReplaceRequest> {
        if self.replace_in_flight {
            return None;
        }
        let item = self.selected_item?;
        let session = self.session.as_ref()?;
        let record = self.masks.active_record()?;

        let request = ReplaceRequest {
            token: session.token(),
            image: session.working().clone(),
            mask_base64: record.mask_base64.clone(),
            kind: self.replace_kind,
            item_id: item.id.to_string(),
            style_id: self.style.id.to_string(),
        };
        self.replace_in_flight = true;
        Some(request)
    }

    /// Reconcile a finished replacement call. On success the working
    /// image is swapped and the mask collection reset in the same
    /// transition; a later render can never observe one without the
    /// other. On failure nothing changes.
    pub fn apply_replace_outcome(
        &mut self,
        token: SessionToken,
        outcome: Result<WorkingImage, String>,
    ) -> ReplaceReport {
        if self.token() != Some(token) {
            return ReplaceReport::Stale;
        }
        self.replace_in_flight = false;

        match outcome {
            Err(message) => ReplaceReport::Failed(message),
            Ok(working) => {
                let (width, height) = (working.width, working.height);
                let fresh = self.next_token();
                if let Some(session) = self.session.as_mut() {
                    session.replace_image(working, fresh);
                }
                self.masks.remove_all();
                // An outstanding segmentation, if any, targeted the old
                // image; its completion is now stale by token.
                self.segment_in_flight = false;
                ReplaceReport::Committed { width, height }
            }
        }
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::SegmentData;
    use crate::state::catalog::FURNITURE;

    fn test_image(width: u32, height: u32) -> WorkingImage {
        WorkingImage {
            bytes: vec![0xAB; 16],
            file_name: "room.png".to_string(),
            width,
            height,
        }
    }

    fn loaded_editor() -> (EditorSession, SessionToken) {
        let mut editor = EditorSession::new();
        let token = editor.load_image(test_image(400, 400));
        (editor, token)
    }

    fn surface_200() -> Rectangle {
        Rectangle::new(Point::ORIGIN, iced::Size::new(200.0, 200.0))
    }

    fn one_candidate(score: f32) -> SegmentData {
        SegmentData {
            masks: vec!["bWFzaw==".to_string()],
            boxes: vec![[50.0, 60.0, 150.0, 160.0]],
            scores: vec![score],
        }
    }

    #[test]
    fn one_outstanding_segmentation_per_trigger() {
        let (mut editor, _) = loaded_editor();

        let first = editor.begin_point_segment(Point::new(100.0, 100.0), surface_200());
        assert!(first.is_some());

        // Double click while the first call is in flight
        let second = editor.begin_point_segment(Point::new(100.0, 100.0), surface_200());
        assert!(second.is_none());

        // Same guard across trigger kinds of the same orchestrator
        assert!(editor.begin_text_segment("沙发").is_none());
    }

    #[test]
    fn point_click_maps_and_admits_the_best_candidate() {
        let (mut editor, token) = loaded_editor();

        // 200x200 surface over a 400x400 image: click (100,100) -> pixel (200,200)
        let request = editor
            .begin_point_segment(Point::new(100.0, 100.0), surface_200())
            .unwrap();
        let origin = match &request.query {
            SegmentQuery::Point(p) => *p,
            other => panic!("unexpected query: {other:?}"),
        };
        assert_eq!(origin, PixelPoint { x: 200, y: 200 });

        let report =
            editor.apply_segment_outcome(token, request.trigger(), Ok(one_candidate(0.91)));

        let activated = match report {
            SegmentReport::Added {
                count: 1,
                activated: Some(id),
            } => id,
            other => panic!("unexpected report: {other:?}"),
        };
        assert_eq!(editor.masks().len(), 1);
        assert_eq!(editor.masks().active(), Some(activated));
        assert_eq!(editor.masks().score_of(activated), Some(0.91));
        assert_eq!(
            editor.masks().provenance_of(activated),
            Some(&Provenance::Point {
                origin: PixelPoint { x: 200, y: 200 }
            })
        );
        assert!(!editor.segment_busy());
    }

    #[test]
    fn text_query_admits_all_candidates_without_activation() {
        let (mut editor, token) = loaded_editor();

        let request = editor.begin_text_segment("椅子").unwrap();
        let data = SegmentData {
            masks: vec!["YQ==".into(), "Yg==".into(), "Yw==".into()],
            boxes: vec![[0.0; 4], [1.0; 4], [2.0; 4]],
            scores: vec![0.9, 0.8, 0.7],
        };

        let report = editor.apply_segment_outcome(token, request.trigger(), Ok(data));

        assert_eq!(
            report,
            SegmentReport::Added {
                count: 3,
                activated: None
            }
        );
        assert_eq!(editor.masks().len(), 3);
        assert_eq!(editor.masks().active(), None);
        for record in editor.masks().iter() {
            assert_eq!(
                record.provenance,
                Provenance::Text {
                    label: "椅子".to_string()
                }
            );
        }
    }

    #[test]
    fn blank_text_queries_never_take_the_flag() {
        let (mut editor, _) = loaded_editor();

        assert!(editor.begin_text_segment("").is_none());
        assert!(editor.begin_text_segment("   \t ").is_none());
        assert!(!editor.segment_busy());

        // A real query still goes through afterwards
        assert!(editor.begin_text_segment("灯").is_some());
    }

    #[test]
    fn empty_results_add_nothing_and_allow_retry() {
        let (mut editor, token) = loaded_editor();

        let request = editor
            .begin_point_segment(Point::new(50.0, 50.0), surface_200())
            .unwrap();
        let report =
            editor.apply_segment_outcome(token, request.trigger(), Ok(SegmentData::default()));

        assert_eq!(report, SegmentReport::Nothing);
        assert!(editor.masks().is_empty());
        assert!(editor
            .begin_point_segment(Point::new(50.0, 50.0), surface_200())
            .is_some());
    }

    #[test]
    fn failures_keep_prior_masks_intact() {
        let (mut editor, token) = loaded_editor();

        // Seed one successful mask
        let request = editor
            .begin_point_segment(Point::new(100.0, 100.0), surface_200())
            .unwrap();
        editor.apply_segment_outcome(token, request.trigger(), Ok(one_candidate(0.8)));
        assert_eq!(editor.masks().len(), 1);

        // Then a failing call
        let request = editor.begin_text_segment("桌子").unwrap();
        let report = editor.apply_segment_outcome(
            token,
            request.trigger(),
            Err("分割失败: timeout".to_string()),
        );

        assert!(matches!(report, SegmentReport::Failed(ref m) if m.contains("timeout")));
        assert_eq!(editor.masks().len(), 1);
        assert!(!editor.segment_busy());
    }

    #[test]
    fn stale_segmentation_responses_are_discarded() {
        let (mut editor, old_token) = loaded_editor();

        let request = editor
            .begin_point_segment(Point::new(100.0, 100.0), surface_200())
            .unwrap();
        let trigger = request.trigger();

        // User uploads a different photo before the response lands
        editor.load_image(test_image(800, 600));

        let report = editor.apply_segment_outcome(old_token, trigger, Ok(one_candidate(0.95)));

        assert_eq!(report, SegmentReport::Stale);
        assert!(editor.masks().is_empty());
        // The new session is not blocked by the abandoned call
        assert!(editor.begin_text_segment("床").is_some());
    }

    #[test]
    fn clicks_outside_the_letterboxed_image_are_ignored() {
        let mut editor = EditorSession::new();
        editor.load_image(test_image(800, 400));

        // 2:1 image in a 200x200 surface occupies y in [50, 150)
        let surface = surface_200();
        assert!(editor
            .begin_point_segment(Point::new(100.0, 10.0), surface)
            .is_none());
        assert!(editor
            .begin_point_segment(Point::new(100.0, 100.0), surface)
            .is_some());
    }

    #[test]
    fn box_drag_produces_a_normalized_request() {
        let (mut editor, token) = loaded_editor();
        editor.set_tool(ToolMode::Box);

        let request = editor
            .begin_box_segment(
                Point::new(150.0, 160.0),
                Point::new(50.0, 40.0),
                surface_200(),
            )
            .unwrap();
        let rect = match &request.query {
            SegmentQuery::Box(r) => *r,
            other => panic!("unexpected query: {other:?}"),
        };
        assert_eq!((rect.x1, rect.y1, rect.x2, rect.y2), (100, 80, 300, 320));

        let report =
            editor.apply_segment_outcome(token, request.trigger(), Ok(one_candidate(0.88)));
        assert!(matches!(
            report,
            SegmentReport::Added {
                count: 1,
                activated: Some(_)
            }
        ));
        assert_eq!(
            editor.masks().iter().next().unwrap().provenance,
            Provenance::Box
        );
    }

    fn editor_with_active_mask() -> (EditorSession, SessionToken, MaskId) {
        let (mut editor, token) = loaded_editor();
        let request = editor
            .begin_point_segment(Point::new(100.0, 100.0), surface_200())
            .unwrap();
        let report =
            editor.apply_segment_outcome(token, request.trigger(), Ok(one_candidate(0.91)));
        let id = match report {
            SegmentReport::Added {
                activated: Some(id),
                ..
            } => id,
            other => panic!("unexpected report: {other:?}"),
        };
        editor.select_item(&FURNITURE[0]); // sofa
        (editor, token, id)
    }

    #[test]
    fn replacement_requires_active_mask_and_item() {
        let (mut editor, token) = loaded_editor();

        // No mask, no item
        assert!(editor.begin_replacement().is_none());

        // Mask but no item
        let request = editor
            .begin_point_segment(Point::new(100.0, 100.0), surface_200())
            .unwrap();
        editor.apply_segment_outcome(token, request.trigger(), Ok(one_candidate(0.9)));
        assert!(editor.begin_replacement().is_none());

        // Both present
        editor.select_item(&FURNITURE[0]);
        assert!(editor.begin_replacement().is_some());

        // In flight: second submit refused
        assert!(editor.begin_replacement().is_none());
    }

    #[test]
    fn replacement_success_swaps_image_and_resets_masks() {
        let (mut editor, token, _) = editor_with_active_mask();

        let request = editor.begin_replacement().unwrap();
        assert_eq!(request.item_id, "sofa");
        assert_eq!(request.kind, ReplaceKind::Furniture);

        let result = WorkingImage {
            bytes: b"X".to_vec(),
            file_name: "edited.png".to_string(),
            width: 400,
            height: 400,
        };
        let report = editor.apply_replace_outcome(token, Ok(result));

        assert_eq!(
            report,
            ReplaceReport::Committed {
                width: 400,
                height: 400
            }
        );
        assert_eq!(editor.image().unwrap().bytes, b"X".to_vec());
        assert_eq!(editor.masks().len(), 0);
        assert_eq!(editor.masks().active(), None);
        assert!(!editor.replace_busy());
        // A fresh token was issued for the new working image
        assert_ne!(editor.token(), Some(token));
    }

    #[test]
    fn replacement_failure_leaves_everything_unchanged() {
        let (mut editor, token, id) = editor_with_active_mask();
        let original_bytes = editor.image().unwrap().bytes.clone();

        editor.begin_replacement().unwrap();
        let report =
            editor.apply_replace_outcome(token, Err("替换失败: model overloaded".to_string()));

        assert!(matches!(report, ReplaceReport::Failed(_)));
        assert_eq!(editor.image().unwrap().bytes, original_bytes);
        assert_eq!(editor.masks().len(), 1);
        assert_eq!(editor.masks().active(), Some(id));
        assert_eq!(editor.token(), Some(token));
        // Retry is possible immediately
        assert!(editor.begin_replacement().is_some());
    }

    #[test]
    fn stale_replacement_responses_are_discarded() {
        let (mut editor, old_token, _) = editor_with_active_mask();
        editor.begin_replacement().unwrap();

        // New upload abandons the in-flight replacement
        editor.load_image(test_image(1024, 768));
        let late = WorkingImage {
            bytes: b"stale".to_vec(),
            file_name: "late.png".to_string(),
            width: 400,
            height: 400,
        };

        let report = editor.apply_replace_outcome(old_token, Ok(late));

        assert_eq!(report, ReplaceReport::Stale);
        assert_eq!(editor.image().unwrap().width, 1024);
    }

    #[test]
    fn switching_tools_preserves_masks() {
        let (mut editor, token, _) = editor_with_active_mask();

        editor.set_tool(ToolMode::Text);
        editor.set_tool(ToolMode::Box);

        assert_eq!(editor.masks().len(), 1);
        assert_eq!(editor.token(), Some(token));
    }

    #[test]
    fn switching_catalog_tabs_drops_the_foreign_item() {
        let mut editor = EditorSession::new();
        editor.select_item(&FURNITURE[1]);

        editor.set_replace_kind(ReplaceKind::Decoration);
        assert!(editor.selected_item().is_none());

        // Re-selecting the same tab keeps the chosen item
        editor.select_item(&crate::state::catalog::DECORATIONS[0]);
        editor.set_replace_kind(ReplaceKind::Decoration);
        assert!(editor.selected_item().is_some());
    }
}
