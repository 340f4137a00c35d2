/*
[INPUT]:  Backend JSON schema and serde requirements
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - type definitions for REST and WebSocket payloads
[UPDATE]: When the backend schema changes or new types are added
*/

pub mod enums;
pub mod models;
pub mod requests;
pub mod responses;

pub use enums::*;
pub use models::*;
pub use requests::*;
pub use responses::*;
