/*
[INPUT]:  Tokens issued by the auth endpoints
[OUTPUT]: Shared session state with durable persistence
[POS]:    Session layer - token store used by the request client
[UPDATE]: When session fields or storage backends change
*/

pub mod storage;
pub mod store;

pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{SAFETY_MARGIN_SECONDS, Session, SessionStore};
