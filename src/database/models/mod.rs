pub mod folder;
pub mod form;
pub mod response;
pub mod team;
pub mod user;

pub use folder::{Folder, FolderChanges, FolderDetails};
pub use form::{
    DisabledOnDate, ElementField, ElementId, Form, FormChanges, FormDetails, FormDraft, FormElement,
    FormListItem, FormListPage, FormMember, GridSize, Placement, PublicForm,
};
pub use response::{
    Answer, ElementAnswer, ElementLabel, LabelledAnswer, LabelledElementAnswer, LabelledResponse,
    NewResponse, Response, ResponsePage,
};
pub use team::{Team, TeamChanges, TeamDetails};
pub use user::{normalize_email, User, UserChanges, UserSummary};
