//! CLI command implementations.
//!
//! | Module      | Commands handled                                  |
//! |-------------|---------------------------------------------------|
//! | `lifecycle` | `Plan`, `Create`, `Read`, `Update`, `Delete`, `Data` |
//! | `config`    | `Config`                                          |
//! | `state`     | state file helpers shared by `lifecycle`          |

pub mod config;
pub mod lifecycle;
pub mod state;

pub use config::cmd_config;
pub use lifecycle::{cmd_data, cmd_lifecycle};
