//! Authentication strategies for SSH connections.
//!
//! Exactly one strategy is attempted per connection, chosen from the resolved
//! [`AuthParams`](crate::resolver::AuthParams) variant. There is no chain and
//! no agent fallback: a host whose configured method fails is not reached by
//! any other means.
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Private key authentication, from a file or from key
//!   material held in memory

mod key;
mod password;
mod traits;

pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::{AuthFailure, AuthStrategy};

use crate::resolver::AuthParams;

/// Build the single strategy matching the resolved credentials.
pub(crate) fn strategy_for(params: AuthParams) -> (String, Box<dyn AuthStrategy>) {
    match params {
        AuthParams::Key { username, key_path } => (username, Box::new(KeyAuth::from_file(key_path))),
        AuthParams::KeyMaterial { username, key } => (username, Box::new(KeyAuth::from_pem(key))),
        AuthParams::Password { username, password } => {
            (username, Box::new(PasswordAuth::new(password)))
        }
    }
}
