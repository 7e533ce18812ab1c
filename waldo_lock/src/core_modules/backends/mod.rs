pub mod replay;
pub mod scripted;
pub mod template_tracker;
