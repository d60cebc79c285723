use eframe::egui;

use crate::ui::state::AppState;
use crate::ui::theme;

/// Connection indicator plus the last failed post, if any.
/// Returns `true` when the operator dismissed the error.
pub fn render(ui: &mut egui::Ui, state: &AppState) -> bool {
    let mut dismissed = false;

    ui.horizontal(|ui| {
        ui.colored_label(theme::connection_color(&state.connection), "●");
        ui.label(state.connection.to_string());
    });

    if let Some(error) = &state.post_error {
        ui.horizontal(|ui| {
            ui.colored_label(
                theme::ERROR_COLOR,
                format!(
                    "[{}] Message not sent: {}",
                    error.at.format("%H:%M:%S"),
                    error.reason
                ),
            );
            if ui.small_button("Dismiss").clicked() {
                dismissed = true;
            }
        });
    }

    dismissed
}
