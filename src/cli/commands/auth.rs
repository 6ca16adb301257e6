//! `beacon login` / `beacon logout`.
//!
//! The full OAuth device/browser flow is explicitly out of scope; what
//! the core needs is just somewhere to put credentials and a logout path
//! that demonstrably clears them, and the cached region directory
//! alongside them. `login --token` accepts a manual
//! access token (no refresh token, so a 401 later can't be recovered
//! automatically — the same "manual token" case the transport's retry
//! logic already accounts for).

use crate::cli::Cli;
use crate::config;
use crate::error::{Error, Result};
use crate::store::sqlite::Store;

pub fn login(cli: &Cli, token: Option<&str>) -> Result<()> {
    let Some(token) = token else {
        return Err(Error::Validation(
            "interactive browser login is not available in this build; pass `--token <access-token>`".into(),
        ));
    };

    let path = config::resolve_store_path(cli.config_dir.as_deref());
    let mut store = Store::open(&path)?;
    store.set_auth(&[("access_token", token)])?;

    if !cli.quiet {
        println!("Logged in.");
    }
    Ok(())
}

pub fn logout(cli: &Cli) -> Result<()> {
    let path = config::resolve_store_path(cli.config_dir.as_deref());
    let mut store = Store::open(&path)?;
    // Clears org_regions in the same transaction as credentials.
    store.clear_auth()?;

    if !cli.quiet {
        println!("Logged out.");
    }
    Ok(())
}
