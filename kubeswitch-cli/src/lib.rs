//! KubeSwitch client library
//!
//! Access control and credential custody for the KubeSwitch console and the
//! `ks` command-line tool. `Console` is the entry point; it composes the
//! session manager, the access gate and the stores that talk to the server
//! through a `Backend`.

pub mod api;
pub mod audit;
pub mod backend;
pub mod config;
pub mod console;
pub mod credentials;
pub mod gate;
pub mod grants;
pub mod logging;
pub mod output;
pub mod session;
pub mod token_store;
pub mod validation;
pub mod view;

#[cfg(test)]
mod testing;

pub use console::Console;
pub use gate::{AccessGate, Decision, Navigation, NavigationGuard, Route};
