//! Domain entities shared by every crate in the workspace.
//!
//! These are plain data types.  Validation that needs to look at more than
//! one entity (a response against its question, a question against its
//! material) lives in the server's application layer; the rules that only
//! need the entity itself live here as methods.

pub mod device;
pub mod feedback;
pub mod material;
pub mod question;
pub mod response;
pub mod session;

pub use device::{DeviceStatus, DeviceStatusReport, PairedDevice};
pub use feedback::Feedback;
pub use material::{Material, MaterialType};
pub use question::{Question, QuestionError, QuestionKind, QuestionVariant};
pub use response::{Response, ResponseAnswer};
pub use session::{Session, SessionStatus};
