pub mod form;
pub mod list;
pub mod view;

pub use form::{RecordForm, SubmitOutcome};
pub use list::RecordListController;
pub use view::RecordView;

/// Which surface is on screen. Exactly one is active at a time; form and view
/// states always return to the list, never to each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Display {
    List,
    Create,
    Edit,
    View,
}
