// ChatSQL GUI - Main Entry Point
// Native desktop client: connect to a database and ask questions about it

mod state;
mod ui;
mod worker;

use chatsql_backend::config::Config;
use eframe::egui;
use state::AppState;
use tracing::info;
use ui::{render_app_layout, UiAction};
use worker::Worker;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load();
    info!("Configuration loaded: {:?}", config);

    let state = AppState::new(&config.database);
    let worker = Worker::new(&config)?;

    // Configure window options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ChatSQL")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ChatSQL",
        options,
        Box::new(move |_cc| Box::new(ChatSqlApp::new(state, worker))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))
}

/// Main application struct
/// Owns the UI state and the background worker
struct ChatSqlApp {
    state: AppState,
    worker: Worker,
}

impl ChatSqlApp {
    fn new(state: AppState, worker: Worker) -> Self {
        Self { state, worker }
    }

    /// Hand a UI action to the worker
    fn dispatch(&mut self, action: UiAction, ctx: &egui::Context) {
        let repaint = {
            let ctx = ctx.clone();
            move || ctx.request_repaint()
        };

        match action {
            UiAction::Connect => {
                if self.state.begin_connection_change() {
                    self.worker.connect(self.state.form.to_config(), repaint);
                }
            }
            UiAction::Disconnect => {
                if self.state.begin_connection_change() {
                    self.worker.disconnect(repaint);
                }
            }
            UiAction::Ask(question) => self.worker.ask(question, repaint),
        }
    }
}

impl eframe::App for ChatSqlApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        for event in self.worker.poll() {
            self.state.apply(event);
        }

        for action in render_app_layout(ctx, &mut self.state) {
            self.dispatch(action, ctx);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.worker.shutdown();
    }
}
