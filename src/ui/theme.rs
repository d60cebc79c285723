use eframe::egui::{Color32, Margin};

use crate::common::ConnectionState;

/// Background of the local user's own bubbles.
pub const SELF_BUBBLE_FILL: Color32 = Color32::from_rgb(0x7B, 0xB3, 0x2E);
pub const SELF_BUBBLE_TEXT: Color32 = Color32::WHITE;

pub const BUBBLE_CORNER_RADIUS: u8 = 8;
pub const BUBBLE_MARGIN: Margin = Margin {
    left: 10,
    right: 10,
    top: 6,
    bottom: 6,
};
pub const BUBBLE_MAX_WIDTH: f32 = 320.0;
pub const BUBBLE_SPACING: f32 = 6.0;

pub const ERROR_COLOR: Color32 = Color32::from_rgb(0xD9, 0x53, 0x4F);

pub fn connection_color(state: &ConnectionState) -> Color32 {
    match state {
        ConnectionState::Connected => Color32::GREEN,
        ConnectionState::Connecting | ConnectionState::Reconnecting { .. } => Color32::YELLOW,
        ConnectionState::Failed { .. } => ERROR_COLOR,
    }
}
