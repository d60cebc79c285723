use eframe::egui;

use crate::network::ClientHandle;

use super::components::{input_bar, message_list, status_bar};
use super::state::AppState;

/// Root container: owns the draft and receives its data client explicitly.
pub struct ChatApp {
    state: AppState,
    client: ClientHandle,
}

impl ChatApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, client: ClientHandle) -> Self {
        Self {
            state: AppState::new(),
            client,
        }
    }

    fn handle_network_events(&mut self) {
        while let Some(event) = self.client.try_next_event() {
            self.state.apply_event(event);
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_network_events();

        egui::TopBottomPanel::top("status_bar").show(ctx, |ui| {
            if status_bar::render(ui, &self.state) {
                self.state.dismiss_error();
            }
        });

        egui::TopBottomPanel::bottom("composer").show(ctx, |ui| {
            ui.add_space(8.0);
            let actions = input_bar::render(ui, &self.state.draft);
            if let Some(user) = actions.user {
                self.state.edit_user(user);
            }
            if let Some(content) = actions.content {
                self.state.edit_content(content);
            }
            if actions.send {
                self.state.send(&self.client);
            }
            ui.add_space(8.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let bubbles = message_list::layout_bubbles(
                self.state.messages.as_deref(),
                &self.state.draft.user,
            );
            message_list::render(ui, &bubbles);
        });

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
