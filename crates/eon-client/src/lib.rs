//! Client-side state of one device: who is signed in, which sparks are
//! picked and what the community board shows.

pub mod auth;
pub mod board;
pub mod error;
pub mod handoff;
pub mod notice;
pub mod selection;
pub mod session;

pub use auth::{AuthGateway, AuthHandle, AuthState};
pub use board::CommunityBoard;
pub use error::{BoardError, ContentError, HandoffError, SelectionError, SignInError, SignUpError};
pub use handoff::SelectionHandoff;
pub use selection::SelectionStore;
pub use session::DeviceSession;
