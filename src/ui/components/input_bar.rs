use eframe::egui;

use crate::common::Draft;

/// What the operator did in the composer this frame.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ComposerActions {
    pub user: Option<String>,
    pub content: Option<String>,
    pub send: bool,
}

pub fn render(ui: &mut egui::Ui, draft: &Draft) -> ComposerActions {
    let mut actions = ComposerActions::default();
    let mut user = draft.user.clone();
    let mut content = draft.content.clone();

    ui.horizontal(|ui| {
        let name = ui.add(
            egui::TextEdit::singleline(&mut user)
                .hint_text("Name")
                .desired_width(120.0),
        );
        if name.changed() {
            actions.user = Some(user.clone());
        }

        let send_width = 60.0;
        let text = ui.add(
            egui::TextEdit::singleline(&mut content)
                .hint_text("Type something")
                .desired_width((ui.available_width() - send_width).max(80.0)),
        );
        if text.changed() {
            actions.content = Some(content.clone());
        }

        if ui.button("Send").clicked() {
            actions.send = true;
        }

        if text.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            actions.send = true;
            text.request_focus();
        }
    });

    actions
}
