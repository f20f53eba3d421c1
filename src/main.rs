use iced::widget::{
    button, canvas, column, container, image as image_widget, pick_list, row, scrollable, stack,
    text, text_input, Column, Row,
};
use iced::{Alignment, Element, Length, Point, Rectangle, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;

mod api;
mod coords;
mod editor;
mod state;
mod ui;

use api::types::SegmentData;
use api::StudioApi;
use editor::session::{
    EditorSession, ReplaceReport, SegmentReport, SegmentRequest, SegmentTrigger, ToolMode,
};
use state::catalog::{self, CatalogItem, ReplaceKind};
use state::history::{self, History};
use state::masks::{MaskId, Provenance};
use state::session::{SessionToken, WorkingImage};

/// Main application state
struct Studio {
    /// The segmentation editor core (image session, masks, tools, flags)
    editor: EditorSession,
    /// Client for the segmentation/inpainting service
    api: StudioApi,
    /// Edit history catalog; None if the database could not be opened
    history: Option<History>,
    edit_count: i64,
    /// Current content of the text-select prompt field
    prompt: String,
    /// Status message to display to the user
    status: String,
    /// Decoded handle for the working image, rebuilt on every swap
    preview: Option<image_widget::Handle>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// User clicked "Open photo"
    OpenImage,
    /// Upload read + decoded (or failed) in the background
    ImageLoaded(Result<WorkingImage, String>),
    ToolSelected(ToolMode),
    /// Point-tool click on the editor surface
    CanvasClicked { position: Point, surface: Rectangle },
    /// Completed box-tool drag on the editor surface
    BoxDrawn {
        start: Point,
        end: Point,
        surface: Rectangle,
    },
    PromptChanged(String),
    SubmitPrompt,
    /// A segmentation call completed for the session named by `token`
    SegmentFinished {
        token: SessionToken,
        trigger: SegmentTrigger,
        result: Result<SegmentData, String>,
    },
    MaskSelected(MaskId),
    MaskRemoved(MaskId),
    ClearMasks,
    KindSelected(ReplaceKind),
    ItemSelected(&'static CatalogItem),
    StyleSelected(CatalogItem),
    SubmitReplacement,
    /// A replacement call completed for the session named by `token`
    ReplaceFinished {
        token: SessionToken,
        item_id: String,
        item_kind: String,
        result: Result<WorkingImage, String>,
    },
    /// Committed result written to the results directory
    ResultSaved {
        item_id: String,
        item_kind: String,
        result: Result<PathBuf, String>,
    },
    /// User clicked "Download image"
    SaveImage,
    ImageSaved(Result<PathBuf, String>),
}

impl Studio {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let history = match History::new() {
            Ok(history) => Some(history),
            Err(e) => {
                eprintln!("⚠️  Edit history unavailable: {:?}", e);
                None
            }
        };
        let edit_count = history
            .as_ref()
            .and_then(|h| h.edit_count().ok())
            .unwrap_or(0);

        let api = StudioApi::from_env();
        println!(
            "🏠 Room Studio initialized ({} past edits, service at {})",
            edit_count,
            api.base_url()
        );
        if let Some(last) = history
            .as_ref()
            .and_then(|h| h.recent(1).ok())
            .and_then(|mut records| records.pop())
        {
            println!("🕘 Last edit: {} ({})", last.item_id, last.item_kind);
        }

        let status = format!(
            "Ready. Open a room photo to start editing. {} edits in history.",
            edit_count
        );

        (
            Studio {
                editor: EditorSession::new(),
                api,
                history,
                edit_count,
                prompt: String::new(),
                status,
                preview: None,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenImage => {
                let file = FileDialog::new()
                    .set_title("Select a room photo")
                    .add_filter("Images", &["png", "jpg", "jpeg", "webp"])
                    .pick_file();

                if let Some(path) = file {
                    self.status = format!("Loading {}...", path.display());
                    return Task::perform(load_image_async(path), Message::ImageLoaded);
                }

                Task::none()
            }

            Message::ImageLoaded(Ok(working)) => {
                self.preview = Some(image_widget::Handle::from_bytes(working.bytes.clone()));
                let (width, height) = (working.width, working.height);
                self.editor.load_image(working);

                println!("🖼  Loaded photo ({}x{})", width, height);
                self.status = format!(
                    "Photo loaded ({}x{}). Click an object, or switch tools to select by text or box.",
                    width, height
                );
                Task::none()
            }

            Message::ImageLoaded(Err(message)) => {
                self.status = format!("❌ {}", message);
                Task::none()
            }

            Message::ToolSelected(tool) => {
                self.editor.set_tool(tool);
                Task::none()
            }

            Message::CanvasClicked { position, surface } => {
                if self.editor.is_busy() {
                    return Task::none();
                }
                if let Some(request) = self.editor.begin_point_segment(position, surface) {
                    self.status = "🔎 Segmenting at the clicked point...".to_string();
                    return self.dispatch_segment(request);
                }
                Task::none()
            }

            Message::BoxDrawn {
                start,
                end,
                surface,
            } => {
                if self.editor.is_busy() {
                    return Task::none();
                }
                if let Some(request) = self.editor.begin_box_segment(start, end, surface) {
                    self.status = "🔎 Segmenting inside the drawn box...".to_string();
                    return self.dispatch_segment(request);
                }
                Task::none()
            }

            Message::PromptChanged(prompt) => {
                self.prompt = prompt;
                Task::none()
            }

            Message::SubmitPrompt => {
                if self.editor.is_busy() {
                    return Task::none();
                }
                if let Some(request) = self.editor.begin_text_segment(&self.prompt) {
                    self.status = format!("🔎 Looking for \"{}\"...", self.prompt.trim());
                    return self.dispatch_segment(request);
                }
                Task::none()
            }

            Message::SegmentFinished {
                token,
                trigger,
                result,
            } => {
                match self.editor.apply_segment_outcome(token, trigger, result) {
                    SegmentReport::Stale => {
                        println!("🗑  Discarded a segmentation response from an abandoned session");
                    }
                    SegmentReport::Nothing => {
                        self.status =
                            "Nothing detected there. Try another spot or query.".to_string();
                    }
                    SegmentReport::Added { count, .. } => {
                        self.status = format!(
                            "✅ Added {} selection(s). Pick one and choose a replacement.",
                            count
                        );
                    }
                    SegmentReport::Failed(message) => {
                        eprintln!("⚠️  Segmentation failed: {}", message);
                        self.status = format!("❌ Segmentation failed: {}", message);
                    }
                }
                Task::none()
            }

            Message::MaskSelected(id) => {
                self.editor.select_mask(id);
                Task::none()
            }

            Message::MaskRemoved(id) => {
                self.editor.remove_mask(id);
                Task::none()
            }

            Message::ClearMasks => {
                self.editor.clear_masks();
                self.status = "Selections cleared.".to_string();
                Task::none()
            }

            Message::KindSelected(kind) => {
                self.editor.set_replace_kind(kind);
                Task::none()
            }

            Message::ItemSelected(item) => {
                self.editor.select_item(item);
                Task::none()
            }

            Message::StyleSelected(style) => {
                self.editor.set_style(style);
                Task::none()
            }

            Message::SubmitReplacement => {
                if let Some(request) = self.editor.begin_replacement() {
                    self.status = format!("✨ Replacing the selection with {}...", request.item_id);

                    let api = self.api.clone();
                    let token = request.token;
                    let item_id = request.item_id.clone();
                    let item_kind = request.kind.label().to_string();

                    return Task::perform(
                        async move { api.replace(request).await.map_err(|e| e.to_string()) },
                        move |result| Message::ReplaceFinished {
                            token,
                            item_id: item_id.clone(),
                            item_kind: item_kind.clone(),
                            result,
                        },
                    );
                }

                self.status = "Select a region and a replacement item first.".to_string();
                Task::none()
            }

            Message::ReplaceFinished {
                token,
                item_id,
                item_kind,
                result,
            } => {
                match self.editor.apply_replace_outcome(token, result) {
                    ReplaceReport::Stale => {
                        println!("🗑  Discarded a replacement response from an abandoned session");
                    }
                    ReplaceReport::Failed(message) => {
                        eprintln!("⚠️  Replacement failed: {}", message);
                        self.status = format!("❌ Replacement failed: {}", message);
                    }
                    ReplaceReport::Committed { width, height } => {
                        if let Some(image) = self.editor.image() {
                            self.preview =
                                Some(image_widget::Handle::from_bytes(image.bytes.clone()));

                            println!("✅ Replacement committed ({}x{})", width, height);
                            self.status =
                                "✅ Replacement applied. Keep editing or download the result."
                                    .to_string();

                            let bytes = image.bytes.clone();
                            return Task::perform(save_result_async(bytes), move |result| {
                                Message::ResultSaved {
                                    item_id: item_id.clone(),
                                    item_kind: item_kind.clone(),
                                    result,
                                }
                            });
                        }
                    }
                }
                Task::none()
            }

            Message::ResultSaved {
                item_id,
                item_kind,
                result,
            } => {
                match result {
                    Ok(path) => {
                        if let Some(history) = &self.history {
                            match history.record_edit(
                                &item_id,
                                &item_kind,
                                &path.to_string_lossy(),
                            ) {
                                Ok(_) => {
                                    self.edit_count += 1;
                                    println!("💾 Result saved to {}", path.display());
                                }
                                Err(e) => eprintln!("⚠️  Could not record edit history: {:?}", e),
                            }
                        }
                    }
                    Err(message) => eprintln!("⚠️  Could not save result: {}", message),
                }
                Task::none()
            }

            Message::SaveImage => {
                if let Some(image) = self.editor.image() {
                    let default_name = format!(
                        "room-{}.png",
                        chrono::Local::now().format("%Y%m%d-%H%M%S")
                    );
                    let file = FileDialog::new()
                        .set_title("Save edited photo")
                        .set_file_name(default_name)
                        .save_file();

                    if let Some(path) = file {
                        let bytes = image.bytes.clone();
                        return Task::perform(
                            async move {
                                tokio::fs::write(&path, bytes)
                                    .await
                                    .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
                                    .map(|_| path)
                            },
                            Message::ImageSaved,
                        );
                    }
                }
                Task::none()
            }

            Message::ImageSaved(Ok(path)) => {
                self.status = format!("💾 Saved to {}", path.display());
                Task::none()
            }

            Message::ImageSaved(Err(message)) => {
                self.status = format!("❌ {}", message);
                Task::none()
            }
        }
    }

    /// Launch a segmentation request as a background task.
    fn dispatch_segment(&self, request: SegmentRequest) -> Task<Message> {
        let api = self.api.clone();
        let token = request.token;
        let trigger = request.trigger();

        Task::perform(
            async move { api.segment(request).await.map_err(|e| e.to_string()) },
            move |result| Message::SegmentFinished {
                token,
                trigger: trigger.clone(),
                result,
            },
        )
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let body = row![
            self.view_toolbar(),
            self.view_workspace(),
            self.view_panel(),
        ]
        .spacing(16)
        .height(Length::Fill);

        let content = column![body, text(&self.status).size(14)]
            .spacing(12)
            .padding(16);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_toolbar(&self) -> Element<Message> {
        let mut tools = Column::new().spacing(8).width(Length::Fixed(140.0));

        tools = tools.push(
            button(text("Open photo").size(14))
                .on_press(Message::OpenImage)
                .width(Length::Fill)
                .padding(10),
        );

        for tool in ToolMode::ALL {
            let style = if tool == self.editor.tool() {
                button::primary
            } else {
                button::secondary
            };
            tools = tools.push(
                button(text(tool.label()).size(14))
                    .style(style)
                    .on_press(Message::ToolSelected(tool))
                    .width(Length::Fill)
                    .padding(10),
            );
        }

        tools = tools.push(
            button(text("Clear selections").size(14))
                .style(button::secondary)
                .on_press(Message::ClearMasks)
                .width(Length::Fill)
                .padding(10),
        );

        tools.into()
    }

    fn view_workspace(&self) -> Element<Message> {
        let surface: Element<Message> = if let Some(handle) = &self.preview {
            let photo = image_widget(handle.clone())
                .width(Length::Fill)
                .height(Length::Fill);
            let overlay = canvas(ui::canvas::EditorSurface {
                editor: &self.editor,
            })
            .width(Length::Fill)
            .height(Length::Fill);

            stack![photo, overlay]
                .width(Length::Fill)
                .height(Length::Fill)
                .into()
        } else {
            container(
                column![
                    text("Open a photo of your room to start").size(18),
                    button(text("Open photo").size(14))
                        .on_press(Message::OpenImage)
                        .padding(10),
                ]
                .spacing(12)
                .align_x(Alignment::Center),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
        };

        let mut workspace = Column::new()
            .spacing(12)
            .width(Length::Fill)
            .push(container(surface).width(Length::Fill).height(Length::Fill));

        if self.editor.tool() == ToolMode::Text && self.editor.image().is_some() {
            workspace = workspace.push(
                row![
                    text_input("Name what to select, e.g. 沙发 / 椅子 / 灯...", &self.prompt)
                        .on_input(Message::PromptChanged)
                        .on_submit(Message::SubmitPrompt)
                        .padding(10),
                    button(text("Detect").size(14))
                        .on_press_maybe(
                            (!self.editor.is_busy()).then_some(Message::SubmitPrompt)
                        )
                        .padding(10),
                ]
                .spacing(8),
            );
        }

        workspace.into()
    }

    fn view_panel(&self) -> Element<Message> {
        let mut panel = Column::new().spacing(16).width(Length::Fixed(280.0));

        panel = panel.push(self.view_selections());

        if self.editor.masks().active().is_some() {
            panel = panel.push(self.view_replacement());
        }

        if self.editor.image().is_some() {
            panel = panel.push(
                button(text("Download image").size(14))
                    .style(button::secondary)
                    .on_press(Message::SaveImage)
                    .width(Length::Fill)
                    .padding(10),
            );
        }

        panel = panel.push(text(format!("{} edits in history", self.edit_count)).size(12));

        scrollable(panel).into()
    }

    fn view_selections(&self) -> Element<Message> {
        let mut section = Column::new()
            .spacing(8)
            .push(text("Selections").size(16));

        if self.editor.masks().is_empty() {
            let hint = match self.editor.tool() {
                ToolMode::Point => "Click an object in the photo to select it.",
                ToolMode::Text => "Type an object name below the photo.",
                ToolMode::Box => "Drag a box around an object.",
            };
            return section.push(text(hint).size(13)).into();
        }

        let active = self.editor.masks().active();
        for (index, record) in self.editor.masks().iter().enumerate() {
            let label = match &record.provenance {
                Provenance::Text { label } => label.clone(),
                Provenance::Point { .. } | Provenance::Box => format!("Selection {}", index + 1),
            };
            let style = if active == Some(record.id) {
                button::primary
            } else {
                button::secondary
            };

            let entry = Row::new()
                .spacing(6)
                .push(
                    button(
                        text(format!("{}  {:.0}%", label, record.score * 100.0)).size(13),
                    )
                    .style(style)
                    .on_press(Message::MaskSelected(record.id))
                    .width(Length::Fill),
                )
                .push(
                    button(text("✕").size(13))
                        .style(button::secondary)
                        .on_press(Message::MaskRemoved(record.id)),
                );

            section = section.push(entry);
        }

        section.into()
    }

    fn view_replacement(&self) -> Element<Message> {
        let mut section = Column::new()
            .spacing(10)
            .push(text("Replace with").size(16));

        // Catalog tabs
        let mut tabs = Row::new().spacing(6);
        for kind in [ReplaceKind::Furniture, ReplaceKind::Decoration] {
            let style = if kind == self.editor.replace_kind() {
                button::primary
            } else {
                button::secondary
            };
            let label = match kind {
                ReplaceKind::Furniture => "家具",
                ReplaceKind::Decoration => "装饰",
            };
            tabs = tabs.push(
                button(text(label).size(13))
                    .style(style)
                    .on_press(Message::KindSelected(kind))
                    .width(Length::Fill),
            );
        }
        section = section.push(tabs);

        // Item grid
        let selected = self.editor.selected_item();
        let items: Vec<Element<Message>> = self
            .editor
            .replace_kind()
            .items()
            .iter()
            .map(|item| {
                let style = if selected.map(|s| s.id) == Some(item.id) {
                    button::primary
                } else {
                    button::secondary
                };
                button(text(format!("{} {}", item.emoji, item.name)).size(13))
                    .style(style)
                    .on_press(Message::ItemSelected(item))
                    .into()
            })
            .collect();
        section = section.push(
            iced_aw::Wrap::with_elements(items)
                .spacing(6.0)
                .line_spacing(6.0),
        );

        // Style choice (furniture replacements only; decorations keep context)
        if self.editor.replace_kind() == ReplaceKind::Furniture {
            section = section.push(
                pick_list(
                    catalog::STYLES,
                    Some(self.editor.style().clone()),
                    Message::StyleSelected,
                )
                .width(Length::Fill)
                .text_size(13),
            );
        }

        let ready = selected.is_some() && !self.editor.is_busy();
        section = section.push(
            button(text("✨ AI Replace").size(14))
                .on_press_maybe(ready.then_some(Message::SubmitReplacement))
                .width(Length::Fill)
                .padding(10),
        );

        section.into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    iced::application("Room Studio", Studio::update, Studio::view)
        .theme(Studio::theme)
        .centered()
        .run_with(Studio::new)
}

/// Read an uploaded photo and probe its dimensions in the background.
async fn load_image_async(path: PathBuf) -> Result<WorkingImage, String> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.png".to_string());

    WorkingImage::decode(bytes, file_name).await
}

/// Write a committed result image into the results directory.
async fn save_result_async(bytes: Vec<u8>) -> Result<PathBuf, String> {
    let dir = history::results_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;

    // Millisecond stamp keeps two quick commits from colliding
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let path = dir.join(format!("edit-{}.png", stamp));

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

    Ok(path)
}
