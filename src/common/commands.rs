/// Commands the UI sends down to the network worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Run the post-message mutation. Completion is reported back as an event.
    PostMessage { user: String, content: String },
}
