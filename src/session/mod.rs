//! Interactive session: state machine, pagination and history

mod history;
mod pagination;
mod state;

pub use history::{History, HistoryEntry};
pub use pagination::PaginationController;
pub use state::{execute, DispatchKind, DispatchTicket, SessionState, Status, View};
