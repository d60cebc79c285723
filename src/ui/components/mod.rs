pub mod input_bar;
pub mod message_list;
pub mod status_bar;
