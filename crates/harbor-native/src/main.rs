use harbor_agent::{
    AgentBackend, AgentError, ChatRequest, GenerateDraftRequest, HttpBackend, ProcessTask,
    RefreshTask, SyncService, SyncSettings,
};
use harbor_config::{AppConfig, ConfigManager};
use harbor_core::{sanitize, ChatMessage, ChatRole, Draft, Email, EmailCategory, Prompt};

use anyhow::Context;
use chrono::Utc;
use eframe::egui;
use std::collections::HashMap;
use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut options = eframe::NativeOptions::default();
    options.viewport = egui::ViewportBuilder::default()
        .with_title("Harbor Mail")
        .with_inner_size([1240.0, 820.0]);
    eframe::run_native(
        "Harbor Mail",
        options,
        Box::new(|cc| {
            apply_harbor_theme(&cc.egui_ctx);
            Ok(Box::new(NativeApp::initialize().expect("native init")))
        }),
    )
    .map_err(|err| anyhow::anyhow!(err.to_string()))
}

fn apply_harbor_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);
    style.spacing.window_margin = egui::Margin::same(12);

    let mut visuals = egui::Visuals::dark();
    visuals.window_fill = egui::Color32::from_rgb(0x13, 0x22, 0x33);
    visuals.panel_fill = egui::Color32::from_rgb(0x0c, 0x16, 0x22);

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(0x18, 0x2c, 0x41);
    visuals.widgets.noninteractive.bg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0x28, 0x41, 0x5c));
    visuals.widgets.noninteractive.fg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0xdd, 0xea, 0xf6));

    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(0x13, 0x22, 0x33);
    visuals.widgets.inactive.bg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0x28, 0x41, 0x5c));
    visuals.widgets.inactive.fg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0x9d, 0xb7, 0xd0));

    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(0x1a, 0x31, 0x48);
    visuals.widgets.hovered.bg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0x3c, 0xb8, 0xa9));
    visuals.widgets.hovered.fg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0xdd, 0xea, 0xf6));

    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(0x2e, 0x9c, 0x8d);
    visuals.widgets.active.bg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0x3c, 0xb8, 0xa9));
    visuals.widgets.active.fg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0xec, 0xfb, 0xf7));

    visuals.selection.bg_fill = egui::Color32::from_rgb(0x2e, 0x9c, 0x8d);
    visuals.selection.stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(0xec, 0xfb, 0xf7));

    visuals.window_corner_radius = egui::CornerRadius::same(10);

    visuals.window_shadow = egui::epaint::Shadow {
        offset: [0, 12],
        blur: 14,
        spread: 0,
        color: egui::Color32::from_black_alpha(160),
    };
    visuals.popup_shadow = egui::epaint::Shadow {
        offset: [0, 6],
        blur: 8,
        spread: 0,
        color: egui::Color32::from_black_alpha(120),
    };

    style.visuals = visuals;
    ctx.set_style(style);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum View {
    Inbox,
    Prompts,
    Drafts,
}

/// Results of backend calls dispatched from the UI thread. Tasks post one of
/// these back over the channel; `update` drains the channel every frame.
enum UiEvent {
    ChatReplied(Result<String, AgentError>),
    DraftGenerated(Result<String, AgentError>),
    DraftSaved(Result<(), AgentError>),
    DraftDeleted {
        id: String,
        result: Result<(), AgentError>,
    },
    PromptSaved {
        id: String,
        result: Result<(), AgentError>,
    },
    EmailReprocessed(Result<(), AgentError>),
    InboxReloaded(Result<(), AgentError>),
}

struct NativeApp {
    runtime: tokio::runtime::Runtime,
    config: AppConfig,
    backend: Arc<HttpBackend>,
    sync: SyncService,
    // Held for its drop guard; dropping it cancels the background poll.
    _refresh_task: RefreshTask,
    process_task: Option<ProcessTask>,
    events_tx: mpsc::Sender<UiEvent>,
    events_rx: mpsc::Receiver<UiEvent>,

    view: View,
    selected_email: Option<String>,
    chat_input: String,
    chat_history: Vec<ChatMessage>,
    chat_pending: bool,

    draft_editor: Option<Draft>,
    draft_instructions: String,
    generating: bool,
    pending_delete: Option<String>,
    prompt_buffers: HashMap<String, String>,

    status: String,
}

impl NativeApp {
    fn initialize() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("build tokio runtime")?;

        let config_manager = ConfigManager::new().context("initialize config manager")?;
        let config = config_manager.load().context("load app config")?;

        let base_url = Url::parse(&config.backend.base_url).context("parse backend base url")?;
        let backend = Arc::new(
            HttpBackend::new(
                base_url,
                Duration::from_secs(config.backend.request_timeout_secs),
            )
            .context("build http backend")?,
        );

        let settings = SyncSettings {
            refresh_interval: Duration::from_secs(config.sync.email_poll_interval_secs),
            process_poll_interval: Duration::from_secs(config.sync.process_poll_interval_secs),
            process_poll_window: Duration::from_secs(config.sync.process_poll_window_secs),
        };
        let sync = SyncService::new(backend.clone(), settings);

        let refresh_task = {
            let _guard = runtime.enter();
            sync.start_background_refresh()
        };

        let view = match config.ui.default_view.as_str() {
            "prompts" => View::Prompts,
            "drafts" => View::Drafts,
            _ => View::Inbox,
        };

        let (events_tx, events_rx) = mpsc::channel();

        tracing::info!(
            config = %config_manager.config_path().display(),
            backend = %config.backend.base_url,
            "harbor mail starting"
        );

        Ok(Self {
            runtime,
            config,
            backend,
            sync,
            _refresh_task: refresh_task,
            process_task: None,
            events_tx,
            events_rx,
            view,
            selected_email: None,
            chat_input: String::new(),
            chat_history: Vec::new(),
            chat_pending: false,
            draft_editor: None,
            draft_instructions: String::new(),
            generating: false,
            pending_delete: None,
            prompt_buffers: HashMap::new(),
            status: String::new(),
        })
    }

    fn spawn_task<F>(&self, ctx: &egui::Context, work: F)
    where
        F: Future<Output = UiEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let event = work.await;
            if tx.send(event).is_ok() {
                ctx.request_repaint();
            }
        });
    }

    // Failed calls log and drop the transient status note. The chat
    // transcript's error line is the only failure text the UI shows.
    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::ChatReplied(result) => {
                self.chat_pending = false;
                match result {
                    Ok(response) => self.chat_history.push(ChatMessage::agent(response)),
                    Err(err) => {
                        tracing::warn!("chat request failed: {err}");
                        self.chat_history
                            .push(ChatMessage::agent("Error processing request."));
                    }
                }
            }
            UiEvent::DraftGenerated(result) => {
                self.generating = false;
                match result {
                    Ok(body) => {
                        if let Some(draft) = &mut self.draft_editor {
                            draft.body = body;
                        }
                        self.status = "Draft generated.".to_string();
                    }
                    Err(err) => {
                        tracing::warn!("draft generation failed: {err}");
                    }
                }
            }
            UiEvent::DraftSaved(result) => match result {
                Ok(()) => {
                    self.draft_editor = None;
                    self.draft_instructions.clear();
                    self.status = "Draft saved.".to_string();
                }
                Err(err) => {
                    tracing::warn!("draft save failed: {err}");
                    self.status.clear();
                }
            },
            UiEvent::DraftDeleted { id, result } => match result {
                Ok(()) => {
                    if self
                        .draft_editor
                        .as_ref()
                        .is_some_and(|draft| draft.id == id)
                    {
                        self.draft_editor = None;
                        self.draft_instructions.clear();
                    }
                    self.status = "Draft deleted.".to_string();
                }
                Err(err) => {
                    tracing::warn!("draft delete failed: {err}");
                    self.status.clear();
                }
            },
            UiEvent::PromptSaved { id, result } => match result {
                Ok(()) => self.status = format!("Prompt '{id}' saved."),
                Err(err) => {
                    tracing::warn!("prompt save failed: {err}");
                    self.status.clear();
                }
            },
            UiEvent::EmailReprocessed(result) => match result {
                Ok(()) => self.status = "Email reprocessed.".to_string(),
                Err(err) => {
                    tracing::warn!("email reprocess failed: {err}");
                    self.status.clear();
                }
            },
            UiEvent::InboxReloaded(result) => match result {
                Ok(()) => {
                    self.clear_selection();
                    self.status = "Sample inbox loaded.".to_string();
                }
                Err(err) => {
                    tracing::warn!("inbox reload failed: {err}");
                    self.status.clear();
                }
            },
        }
    }

    fn select_email(&mut self, id: String) {
        if self.selected_email.as_deref() == Some(id.as_str()) {
            return;
        }
        self.selected_email = Some(id);
        self.reset_chat();
    }

    fn clear_selection(&mut self) {
        self.selected_email = None;
        self.reset_chat();
    }

    // The transcript belongs to one conversation scope; switching scope
    // discards it. A reply already in flight lands in the new transcript.
    fn reset_chat(&mut self) {
        self.chat_history.clear();
        self.chat_input.clear();
    }

    fn send_chat(&mut self, ctx: &egui::Context) {
        let query = self.chat_input.trim().to_string();
        if query.is_empty() || self.chat_pending {
            return;
        }
        self.chat_input.clear();
        self.chat_history.push(ChatMessage::user(query.clone()));
        self.chat_pending = true;

        let request = ChatRequest {
            query,
            email_id: self.selected_email.clone(),
        };
        let backend = self.backend.clone();
        self.spawn_task(ctx, async move {
            UiEvent::ChatReplied(backend.chat(&request).await.map(|reply| reply.response))
        });
    }

    fn generate_draft_body(&mut self, ctx: &egui::Context) {
        if self.generating {
            return;
        }
        let Some(draft) = &self.draft_editor else {
            return;
        };
        let Some(email_id) = draft.email_id.clone() else {
            return;
        };

        let instructions = self.draft_instructions.trim();
        let instructions = if instructions.is_empty() {
            None
        } else {
            Some(instructions.to_string())
        };

        self.generating = true;
        let request = GenerateDraftRequest {
            email_id,
            instructions,
        };
        let backend = self.backend.clone();
        self.spawn_task(ctx, async move {
            UiEvent::DraftGenerated(
                backend
                    .generate_draft(&request)
                    .await
                    .map(|reply| reply.draft_body),
            )
        });
    }

    fn save_current_draft(&mut self, ctx: &egui::Context) {
        let Some(draft) = &self.draft_editor else {
            return;
        };
        let mut draft = draft.clone();
        draft.saved_at = Utc::now();

        let sync = self.sync.clone();
        self.spawn_task(ctx, async move {
            let result = sync.save_draft(&draft).await;
            UiEvent::DraftSaved(result)
        });
        self.status = "Saving draft...".to_string();
    }

    fn request_draft_delete(&mut self, ctx: &egui::Context, id: String) {
        if self.config.ui.confirm_draft_delete {
            self.pending_delete = Some(id);
        } else {
            self.delete_draft(ctx, id);
        }
    }

    fn delete_draft(&mut self, ctx: &egui::Context, id: String) {
        let sync = self.sync.clone();
        self.spawn_task(ctx, async move {
            let result = sync.delete_draft(&id).await;
            UiEvent::DraftDeleted { id, result }
        });
        self.status = "Deleting draft...".to_string();
    }

    fn save_prompt(&mut self, ctx: &egui::Context, prompt: Prompt) {
        self.status = format!("Saving prompt '{}'...", prompt.id);
        let sync = self.sync.clone();
        let id = prompt.id.clone();
        self.spawn_task(ctx, async move {
            let result = sync.save_prompt(&prompt).await;
            UiEvent::PromptSaved { id, result }
        });
    }

    fn start_processing(&mut self) {
        if self.sync.is_processing() {
            return;
        }
        let task = {
            let _guard = self.runtime.enter();
            self.sync.trigger_process_and_poll()
        };
        self.process_task = Some(task);
    }

    fn reprocess_email(&mut self, ctx: &egui::Context, id: String) {
        let sync = self.sync.clone();
        self.spawn_task(ctx, async move {
            UiEvent::EmailReprocessed(sync.process_email(&id).await)
        });
        self.status = "Reprocessing email...".to_string();
    }

    fn reload_inbox(&mut self, ctx: &egui::Context) {
        let sync = self.sync.clone();
        self.spawn_task(ctx, async move { UiEvent::InboxReloaded(sync.reload_inbox().await) });
        self.status = "Loading sample inbox...".to_string();
    }

    fn show_inbox(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let emails = self.sync.emails();
        let unread = emails.iter().filter(|email| !email.read).count();
        let available_height = ui.available_height();

        let mut next_email = None;
        egui::SidePanel::left("email_list")
            .resizable(true)
            .default_width(340.0)
            .width_range(260.0..=540.0)
            .frame(egui::Frame::default().inner_margin(8.0))
            .show_inside(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(egui::RichText::new("Inbox").strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            egui::RichText::new(format!("{unread} unread / {}", emails.len()))
                                .size(12.0)
                                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                        );
                    });
                });
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(
                            !self.sync.is_processing(),
                            egui::Button::new("Process Inbox"),
                        )
                        .clicked()
                    {
                        self.start_processing();
                    }
                    if ui.button("Load Sample").clicked() {
                        self.reload_inbox(ctx);
                    }
                });
                ui.add_space(4.0);

                egui::ScrollArea::vertical()
                    .max_height(available_height - 20.0)
                    .show(ui, |ui| {
                        if emails.is_empty() {
                            ui.label(
                                egui::RichText::new("No emails yet. Is the backend running?")
                                    .size(12.0)
                                    .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                            );
                        }
                        for email in &emails {
                            let is_selected =
                                self.selected_email.as_deref() == Some(email.id.as_str());

                            let mut frame = egui::Frame::window(&ctx.style())
                                .inner_margin(12.0)
                                .corner_radius(8.0);
                            if is_selected {
                                frame = frame.fill(ui.visuals().selection.bg_fill);
                            }

                            ui.add_space(4.0);
                            let response = frame
                                .show(ui, |ui| {
                                    ui.set_width(ui.available_width());
                                    let text_color = if is_selected {
                                        ui.visuals().selection.stroke.color
                                    } else {
                                        ui.visuals().text_color()
                                    };
                                    let title_color = if is_selected {
                                        text_color
                                    } else {
                                        ui.visuals().strong_text_color()
                                    };

                                    ui.horizontal(|ui| {
                                        ui.label(
                                            egui::RichText::new(&email.sender)
                                                .strong()
                                                .color(title_color)
                                                .size(14.0),
                                        );
                                        ui.with_layout(
                                            egui::Layout::right_to_left(egui::Align::Center),
                                            |ui| {
                                                ui.label(
                                                    egui::RichText::new(
                                                        email.timestamp.format("%b %d").to_string(),
                                                    )
                                                    .size(12.0)
                                                    .color(text_color),
                                                );
                                            },
                                        );
                                    });
                                    ui.label(
                                        egui::RichText::new(sanitize::clean(&email.subject))
                                            .color(text_color)
                                            .size(13.0),
                                    );
                                    ui.horizontal(|ui| {
                                        if let Some(category) = &email.category {
                                            category_badge(ui, category);
                                        }
                                        let tasks = email.action_item_count();
                                        if tasks > 0 {
                                            let label = if tasks == 1 {
                                                "1 task".to_string()
                                            } else {
                                                format!("{tasks} tasks")
                                            };
                                            ui.label(
                                                egui::RichText::new(label)
                                                    .size(11.0)
                                                    .color(text_color),
                                            );
                                        }
                                        if !email.read {
                                            ui.label(
                                                egui::RichText::new("new").size(11.0).strong().color(
                                                    egui::Color32::from_rgb(0x3c, 0xb8, 0xa9),
                                                ),
                                            );
                                        }
                                    });
                                })
                                .response;

                            if response.interact(egui::Sense::click()).clicked() {
                                next_email = Some(email.id.clone());
                            }
                        }
                    });
            });

        if let Some(id) = next_email {
            self.select_email(id);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::default().inner_margin(16.0))
            .show_inside(ui, |ui| {
                match self
                    .selected_email
                    .clone()
                    .and_then(|id| self.sync.email(&id))
                {
                    Some(email) => self.show_email_detail(ctx, ui, &email),
                    None => {
                        // A refresh can drop the selected email; fall back to
                        // inbox scope rather than chat about a ghost.
                        if self.selected_email.is_some() {
                            self.clear_selection();
                        }
                        self.show_inbox_chat(ctx, ui);
                    }
                }
            });
    }

    fn show_email_detail(&mut self, ctx: &egui::Context, ui: &mut egui::Ui, email: &Email) {
        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new(sanitize::clean(&email.subject)).strong());
            if let Some(category) = &email.category {
                category_badge(ui, category);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Close").clicked() {
                    self.clear_selection();
                }
                if ui.small_button("Reprocess").clicked() {
                    self.reprocess_email(ctx, email.id.clone());
                }
                if ui.small_button("Draft Reply").clicked() {
                    self.draft_editor = Some(Draft::reply_to(email));
                    self.draft_instructions.clear();
                    self.view = View::Drafts;
                }
            });
        });
        ui.label(
            egui::RichText::new(format!(
                "From {} on {}",
                email.sender,
                email.timestamp.format("%b %d, %H:%M")
            ))
            .size(12.0)
            .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
        );
        ui.add_space(6.0);

        if let Some(summary) = &email.summary {
            ui.group(|ui| {
                ui.set_width(ui.available_width());
                ui.label(egui::RichText::new("Summary").strong().size(12.0));
                ui.label(sanitize::clean(summary));
            });
            ui.add_space(4.0);
        }

        let available_height = ui.available_height();
        egui::ScrollArea::vertical()
            .id_salt("email_body")
            .auto_shrink([false, true])
            .max_height(available_height * 0.4)
            .show(ui, |ui| {
                ui.label(sanitize::clean(&email.body));
            });

        if let Some(items) = &email.action_items {
            if !items.is_empty() {
                ui.add_space(6.0);
                ui.label(egui::RichText::new("Action Items").strong().size(14.0));
                ui.group(|ui| {
                    ui.set_width(ui.available_width());
                    for item in items {
                        ui.horizontal(|ui| {
                            ui.label(&item.task);
                            if let Some(deadline) = &item.deadline {
                                ui.label(
                                    egui::RichText::new(format!("due {deadline}"))
                                        .size(12.0)
                                        .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                                );
                            }
                        });
                    }
                });
            }
        }

        ui.add_space(8.0);
        ui.separator();
        self.show_chat(ctx, ui, "Ask about this email");
    }

    fn show_inbox_chat(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.heading(egui::RichText::new("Inbox Assistant").strong());
        ui.label(
            egui::RichText::new("Select an email for details, or ask about the whole inbox.")
                .size(13.0)
                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
        );
        ui.add_space(8.0);
        self.show_chat(ctx, ui, "Ask about your inbox");
    }

    fn show_chat(&mut self, ctx: &egui::Context, ui: &mut egui::Ui, hint: &str) {
        ui.label(egui::RichText::new("Agent Chat").strong().size(14.0));
        ui.add_space(4.0);

        let transcript_height = (ui.available_height() - 60.0).max(80.0);
        egui::ScrollArea::vertical()
            .id_salt("chat_transcript")
            .auto_shrink([false, false])
            .max_height(transcript_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in &self.chat_history {
                    match message.role {
                        ChatRole::User => {
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                                egui::Frame::default()
                                    .fill(ui.visuals().selection.bg_fill)
                                    .inner_margin(egui::Margin::symmetric(12, 8))
                                    .corner_radius(12.0)
                                    .show(ui, |ui| {
                                        ui.label(
                                            egui::RichText::new(sanitize::clean(&message.content))
                                                .color(ui.visuals().selection.stroke.color)
                                                .size(14.0),
                                        );
                                    });
                            });
                        }
                        ChatRole::Agent => {
                            ui.with_layout(egui::Layout::left_to_right(egui::Align::TOP), |ui| {
                                egui::Frame::window(&ctx.style())
                                    .inner_margin(egui::Margin::symmetric(12, 8))
                                    .corner_radius(12.0)
                                    .show(ui, |ui| {
                                        ui.label(
                                            egui::RichText::new(sanitize::clean(&message.content))
                                                .size(14.0),
                                        );
                                    });
                            });
                        }
                    }
                    ui.add_space(8.0);
                }
                if self.chat_pending {
                    ui.label(
                        egui::RichText::new("Thinking...")
                            .italics()
                            .size(13.0)
                            .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                    );
                }
            });

        ui.separator();
        ui.horizontal(|ui| {
            let input = ui.add(
                egui::TextEdit::singleline(&mut self.chat_input)
                    .desired_width(ui.available_width() - 80.0)
                    .hint_text(hint),
            );
            let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let send = ui
                .add_enabled(
                    !self.chat_pending,
                    egui::Button::new(egui::RichText::new("Send").strong()),
                )
                .clicked();
            if submitted || send {
                self.send_chat(ctx);
            }
        });
    }

    fn show_prompts(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let prompts = self.sync.prompts();

        ui.heading(egui::RichText::new("Prompt Studio").strong());
        ui.label(
            egui::RichText::new(
                "Templates the agent uses to categorize mail, extract action items and write drafts.",
            )
            .size(13.0)
            .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
        );
        ui.add_space(8.0);

        if prompts.is_empty() {
            ui.label("No prompts loaded yet. Is the backend running?");
            return;
        }

        let mut save_request: Option<Prompt> = None;
        let mut revert_request: Option<String> = None;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for prompt in &prompts {
                    ui.add_space(4.0);
                    egui::Frame::window(&ctx.style())
                        .inner_margin(12.0)
                        .corner_radius(8.0)
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            ui.horizontal(|ui| {
                                ui.label(egui::RichText::new(&prompt.name).strong().size(15.0));
                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        ui.label(
                                            egui::RichText::new(&prompt.id)
                                                .monospace()
                                                .size(11.0)
                                                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                                        );
                                    },
                                );
                            });
                            ui.label(
                                egui::RichText::new(&prompt.description)
                                    .size(12.0)
                                    .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                            );
                            ui.add_space(4.0);

                            let buffer = self
                                .prompt_buffers
                                .entry(prompt.id.clone())
                                .or_insert_with(|| prompt.template.clone());
                            ui.add(
                                egui::TextEdit::multiline(buffer)
                                    .font(egui::TextStyle::Monospace)
                                    .desired_rows(6)
                                    .desired_width(f32::INFINITY),
                            );
                            let dirty = *buffer != prompt.template;

                            ui.horizontal(|ui| {
                                if ui.add_enabled(dirty, egui::Button::new("Save")).clicked() {
                                    let mut updated = prompt.clone();
                                    updated.template = buffer.clone();
                                    save_request = Some(updated);
                                }
                                if dirty {
                                    if ui.small_button("Revert").clicked() {
                                        revert_request = Some(prompt.id.clone());
                                    }
                                    ui.label(
                                        egui::RichText::new("unsaved changes")
                                            .size(11.0)
                                            .italics()
                                            .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                                    );
                                }
                            });
                        });
                }
            });

        if let Some(prompt) = save_request {
            self.save_prompt(ctx, prompt);
        }
        if let Some(id) = revert_request {
            if let Some(prompt) = prompts.iter().find(|prompt| prompt.id == id) {
                self.prompt_buffers.insert(id, prompt.template.clone());
            }
        }
    }

    fn show_drafts(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let drafts = self.sync.drafts();
        let available_height = ui.available_height();

        let mut open_request: Option<Draft> = None;
        egui::SidePanel::left("draft_list")
            .resizable(true)
            .default_width(300.0)
            .width_range(240.0..=480.0)
            .frame(egui::Frame::default().inner_margin(8.0))
            .show_inside(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(egui::RichText::new("Drafts").strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("New Draft").clicked() {
                            open_request = Some(Draft::blank());
                        }
                    });
                });
                ui.add_space(4.0);

                egui::ScrollArea::vertical()
                    .max_height(available_height - 20.0)
                    .show(ui, |ui| {
                        if drafts.is_empty() {
                            ui.label(
                                egui::RichText::new("Nothing saved yet.")
                                    .size(12.0)
                                    .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                            );
                        }
                        for draft in &drafts {
                            let is_selected = self
                                .draft_editor
                                .as_ref()
                                .is_some_and(|editing| editing.id == draft.id);

                            let mut frame = egui::Frame::window(&ctx.style())
                                .inner_margin(12.0)
                                .corner_radius(8.0);
                            if is_selected {
                                frame = frame.fill(ui.visuals().selection.bg_fill);
                            }

                            ui.add_space(4.0);
                            let response = frame
                                .show(ui, |ui| {
                                    ui.set_width(ui.available_width());
                                    let text_color = if is_selected {
                                        ui.visuals().selection.stroke.color
                                    } else {
                                        ui.visuals().text_color()
                                    };
                                    let title_color = if is_selected {
                                        text_color
                                    } else {
                                        ui.visuals().strong_text_color()
                                    };

                                    let subject = if draft.subject.trim().is_empty() {
                                        "(no subject)"
                                    } else {
                                        draft.subject.as_str()
                                    };
                                    ui.label(
                                        egui::RichText::new(subject)
                                            .strong()
                                            .color(title_color)
                                            .size(14.0),
                                    );
                                    let recipient = if draft.to.trim().is_empty() {
                                        "(no recipient)".to_string()
                                    } else {
                                        format!("To: {}", draft.to)
                                    };
                                    ui.label(
                                        egui::RichText::new(recipient).color(text_color).size(12.0),
                                    );
                                    ui.horizontal(|ui| {
                                        ui.label(
                                            egui::RichText::new(
                                                draft
                                                    .saved_at
                                                    .format("%b %d, %H:%M")
                                                    .to_string(),
                                            )
                                            .size(11.0)
                                            .color(text_color),
                                        );
                                        if draft.email_id.is_some() {
                                            ui.label(
                                                egui::RichText::new("reply")
                                                    .size(11.0)
                                                    .italics()
                                                    .color(text_color),
                                            );
                                        }
                                    });
                                })
                                .response;

                            if response.interact(egui::Sense::click()).clicked() {
                                open_request = Some(draft.clone());
                            }
                        }
                    });
            });

        if let Some(draft) = open_request {
            self.draft_instructions.clear();
            self.draft_editor = Some(draft);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::default().inner_margin(16.0))
            .show_inside(ui, |ui| {
                let mut save_clicked = false;
                let mut cancel_clicked = false;
                let mut delete_clicked = false;
                let mut generate_clicked = false;

                match &mut self.draft_editor {
                    Some(draft) => {
                        ui.heading(egui::RichText::new("Draft Editor").strong());
                        ui.add_space(6.0);

                        ui.label(
                            egui::RichText::new("To")
                                .size(12.0)
                                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                        );
                        ui.add(
                            egui::TextEdit::singleline(&mut draft.to).desired_width(f32::INFINITY),
                        );
                        ui.label(
                            egui::RichText::new("Subject")
                                .size(12.0)
                                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                        );
                        ui.add(
                            egui::TextEdit::singleline(&mut draft.subject)
                                .desired_width(f32::INFINITY),
                        );
                        ui.label(
                            egui::RichText::new("Body")
                                .size(12.0)
                                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                        );
                        ui.add(
                            egui::TextEdit::multiline(&mut draft.body)
                                .desired_rows(12)
                                .desired_width(f32::INFINITY),
                        );

                        if draft.email_id.is_some() {
                            ui.add_space(8.0);
                            ui.group(|ui| {
                                ui.set_width(ui.available_width());
                                ui.label(egui::RichText::new("Agent Writer").strong().size(13.0));
                                ui.horizontal(|ui| {
                                    ui.add(
                                        egui::TextEdit::singleline(&mut self.draft_instructions)
                                            .desired_width(ui.available_width() - 140.0)
                                            .hint_text("Optional instructions for the draft"),
                                    );
                                    if self.generating {
                                        ui.add(egui::Spinner::new().size(14.0));
                                        ui.label(egui::RichText::new("Generating...").size(12.0));
                                    } else if ui.button("Generate Draft").clicked() {
                                        generate_clicked = true;
                                    }
                                });
                            });
                        }

                        ui.add_space(10.0);
                        let saved = drafts.iter().any(|existing| existing.id == draft.id);
                        ui.horizontal(|ui| {
                            if ui
                                .button(egui::RichText::new("Save Draft").strong())
                                .clicked()
                            {
                                save_clicked = true;
                            }
                            if ui.button("Cancel").clicked() {
                                cancel_clicked = true;
                            }
                            if saved {
                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        if ui.button("Delete").clicked() {
                                            delete_clicked = true;
                                        }
                                    },
                                );
                            }
                        });
                    }
                    None => {
                        ui.label(
                            egui::RichText::new("Select a draft on the left or start a new one.")
                                .size(13.0)
                                .color(egui::Color32::from_rgb(0x93, 0xad, 0xc8)),
                        );
                    }
                }

                if generate_clicked {
                    self.generate_draft_body(ctx);
                }
                if save_clicked {
                    self.save_current_draft(ctx);
                }
                if cancel_clicked {
                    self.draft_editor = None;
                    self.draft_instructions.clear();
                }
                if delete_clicked {
                    if let Some(id) = self.draft_editor.as_ref().map(|draft| draft.id.clone()) {
                        self.request_draft_delete(ctx, id);
                    }
                }
            });
    }

    fn show_delete_confirm(&mut self, ctx: &egui::Context) {
        let Some(id) = self.pending_delete.clone() else {
            return;
        };

        let mut close = false;
        egui::Window::new("Delete Draft")
            .collapsible(false)
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.label("Delete this draft? It will be removed from the backend.");
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui
                        .button(egui::RichText::new("Delete").strong())
                        .clicked()
                    {
                        self.delete_draft(ctx, id.clone());
                        close = true;
                    }
                    if ui.button("Cancel").clicked() {
                        close = true;
                    }
                });
            });

        if close {
            self.pending_delete = None;
        }
    }
}

impl eframe::App for NativeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }

        if self
            .process_task
            .as_ref()
            .is_some_and(|task| task.is_finished())
        {
            self.process_task = None;
        }

        // Background polls rewrite the collections between frames.
        ctx.request_repaint_after(std::time::Duration::from_millis(500));

        egui::TopBottomPanel::top("top")
            .frame(
                egui::Frame::default()
                    .fill(ctx.style().visuals.panel_fill)
                    .inner_margin(egui::Margin::symmetric(12, 10)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new("Harbor Mail")
                            .strong()
                            .size(16.0)
                            .color(egui::Color32::from_rgb(0x3c, 0xb8, 0xa9)),
                    );
                    ui.separator();
                    for (view, label) in [
                        (View::Inbox, "Inbox"),
                        (View::Prompts, "Prompt Studio"),
                        (View::Drafts, "Drafts"),
                    ] {
                        if ui.selectable_label(self.view == view, label).clicked() {
                            self.view = view;
                        }
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(egui::RichText::new(&self.status).size(12.0));
                        if self.sync.is_processing() {
                            ui.add(egui::Spinner::new().size(14.0));
                            ui.label(egui::RichText::new("processing").size(12.0));
                        }
                    });
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| match self.view {
            View::Inbox => self.show_inbox(ctx, ui),
            View::Prompts => self.show_prompts(ctx, ui),
            View::Drafts => self.show_drafts(ctx, ui),
        });

        self.show_delete_confirm(ctx);
    }
}

fn category_badge(ui: &mut egui::Ui, label: &str) {
    let color = match EmailCategory::from_label(label) {
        EmailCategory::Todo => egui::Color32::from_rgb(0x3b, 0x82, 0xf6),
        EmailCategory::Newsletter => egui::Color32::from_rgb(0xa8, 0x55, 0xf7),
        EmailCategory::Spam => egui::Color32::from_rgb(0xf9, 0x73, 0x16),
        EmailCategory::Important => egui::Color32::from_rgb(0xef, 0x44, 0x44),
        EmailCategory::Other => egui::Color32::from_rgb(0x64, 0x74, 0x8b),
    };
    ui.label(egui::RichText::new(label).size(11.0).strong().color(color));
}
