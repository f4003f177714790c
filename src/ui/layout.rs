// Main application layout
// Connection sidebar, conversation panel and question input

use crate::state::AppState;
use crate::ui::components::{conversation_entry, error_label, notification_banner};
use chatsql_backend::db::DatabaseKind;
use eframe::egui;

/// Something the user asked the application to do this frame
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    /// Connect with the form values
    Connect,
    /// Close the connection
    Disconnect,
    /// Ask the given question
    Ask(String),
}

/// Render the main application layout
/// Returns the actions triggered by this frame's input
pub fn render_app_layout(ctx: &egui::Context, state: &mut AppState) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::SidePanel::left("connection_sidebar")
        .resizable(true)
        .default_width(280.0)
        .min_width(220.0)
        .show(ctx, |ui| render_sidebar(ui, state, &mut actions));

    egui::TopBottomPanel::bottom("question_panel").show(ctx, |ui| {
        render_question_input(ui, state, &mut actions);
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.add_space(8.0);
        ui.heading("ChatSQL");
        ui.separator();
        render_conversation(ui, state);
    });

    actions
}

/// Render the connection form
fn render_sidebar(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    ui.add_space(8.0);
    ui.heading("MySQL Database Connection");
    ui.add_space(4.0);
    ui.separator();
    ui.add_space(4.0);

    let form = &mut state.form;
    egui::ComboBox::from_label("Backend")
        .selected_text(match form.kind {
            DatabaseKind::MySql => "MySQL",
            DatabaseKind::Sqlite => "SQLite file",
        })
        .show_ui(ui, |ui| {
            ui.selectable_value(&mut form.kind, DatabaseKind::MySql, "MySQL");
            ui.selectable_value(&mut form.kind, DatabaseKind::Sqlite, "SQLite file");
        });

    egui::Grid::new("connection_form")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui| {
            if form.kind == DatabaseKind::MySql {
                ui.label("Host");
                ui.text_edit_singleline(&mut form.host);
                ui.end_row();

                ui.label("Port");
                ui.text_edit_singleline(&mut form.port);
                ui.end_row();
            }

            ui.label(match form.kind {
                DatabaseKind::MySql => "Database name",
                DatabaseKind::Sqlite => "Database file",
            });
            ui.text_edit_singleline(&mut form.database);
            ui.end_row();

            if form.kind == DatabaseKind::MySql {
                ui.label("User");
                ui.text_edit_singleline(&mut form.user);
                ui.end_row();

                ui.label("Password");
                ui.add(egui::TextEdit::singleline(&mut form.password).password(true));
                ui.end_row();
            }
        });

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        let idle = !state.connecting;
        if ui.add_enabled(idle, egui::Button::new("Connect")).clicked() {
            actions.push(UiAction::Connect);
        }
        if ui
            .add_enabled(idle && state.connected, egui::Button::new("Disconnect"))
            .clicked()
        {
            actions.push(UiAction::Disconnect);
        }
        if state.connecting {
            ui.spinner();
        }
    });

    ui.add_space(8.0);
    if let Some(notification) = &state.notification {
        notification_banner(ui, notification);
    }
}

/// Render the conversation, oldest first
fn render_conversation(ui: &mut egui::Ui, state: &AppState) {
    egui::ScrollArea::vertical()
        .id_source("conversation_scroll")
        .auto_shrink([false; 2])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if state.entries.is_empty() {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    let hint = if state.connected {
                        "Ask a question about your data"
                    } else {
                        "Connect to a database to start"
                    };
                    ui.label(egui::RichText::new(hint).italics().weak());
                });
            }

            for entry in &state.entries {
                ui.add_space(8.0);
                conversation_entry(ui, entry);
                ui.add_space(8.0);
                ui.separator();
            }

            if let Some(error) = &state.last_error {
                ui.add_space(8.0);
                error_label(ui, error);
            }
        });
}

/// Render the question input and progress indicator
fn render_question_input(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    ui.add_space(6.0);
    ui.label("Describe a graph or Enter your question:");
    ui.horizontal(|ui| {
        let width = (ui.available_width() - 80.0).max(120.0);
        let input = ui.add(egui::TextEdit::singleline(&mut state.question).desired_width(width));
        let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        let clicked = ui
            .add_enabled(!state.processing, egui::Button::new("Ask"))
            .clicked();

        if submitted || clicked {
            if let Some(question) = state.begin_question() {
                actions.push(UiAction::Ask(question));
            }
            input.request_focus();
        }
    });

    if state.processing {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("In progress...");
        });
    }
    ui.add_space(6.0);
}
