use eframe::egui;

use crate::common::Message;
use crate::ui::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

/// Visual description of one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub id: i64,
    pub alignment: Alignment,
    pub highlighted: bool,
    /// `"{user}:"` for other people's messages, hidden for our own.
    pub header: Option<String>,
    pub body: String,
}

/// Map the live message list to bubbles, in the order received.
///
/// Absent data means the subscription has not delivered yet and yields nothing.
pub fn layout_bubbles(messages: Option<&[Message]>, current_user: &str) -> Vec<Bubble> {
    let Some(messages) = messages else {
        return Vec::new();
    };

    messages
        .iter()
        .map(|message| {
            let own = message.user == current_user;
            Bubble {
                id: message.id,
                alignment: if own { Alignment::Right } else { Alignment::Left },
                highlighted: own,
                header: (!own).then(|| format!("{}:", message.user)),
                body: message.content.clone(),
            }
        })
        .collect()
}

pub fn render(ui: &mut egui::Ui, bubbles: &[Bubble]) {
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for bubble in bubbles {
                let align = match bubble.alignment {
                    Alignment::Left => egui::Align::Min,
                    Alignment::Right => egui::Align::Max,
                };
                ui.push_id(bubble.id, |ui| {
                    ui.with_layout(egui::Layout::top_down(align), |ui| {
                        render_bubble(ui, bubble);
                    });
                });
                ui.add_space(theme::BUBBLE_SPACING);
            }
        });
}

fn render_bubble(ui: &mut egui::Ui, bubble: &Bubble) {
    let fill = if bubble.highlighted {
        theme::SELF_BUBBLE_FILL
    } else {
        ui.visuals().widgets.noninteractive.bg_fill
    };

    egui::Frame::new()
        .fill(fill)
        .corner_radius(theme::BUBBLE_CORNER_RADIUS)
        .inner_margin(theme::BUBBLE_MARGIN)
        .show(ui, |ui| {
            ui.set_max_width(theme::BUBBLE_MAX_WIDTH);
            if let Some(header) = &bubble.header {
                ui.label(egui::RichText::new(header).strong());
            }
            let body = egui::RichText::new(&bubble.body);
            if bubble.highlighted {
                ui.label(body.color(theme::SELF_BUBBLE_TEXT));
            } else {
                ui.label(body);
            }
        });
}
