mod dispatcher;
mod parser;

pub use dispatcher::{create_shared_book, DispatchOutcome, SharedBook, UpdateDispatcher};
pub use parser::{level_from_raw, levels_from_raw, parse_message, ParsedMessage};
