pub mod compose;

pub use compose::{ComposeArgs, handle_compose};
