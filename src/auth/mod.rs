pub mod github;
pub mod session;
pub mod token;

pub use github::{GitHubClient, GitHubUser};
pub use session::{
    clear_session, set_oauth_state, set_session_token_id, set_session_username, take_oauth_state,
    SessionIdentity,
};
pub use token::{generate_token_id, is_valid_token_id};
