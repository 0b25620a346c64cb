use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "rs_mail_fetch";

/// Save the IMAP password into the OS keyring for the given login name
pub fn save_password(user: &str, password: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, user);
    entry?
        .set_password(password)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the IMAP password for the given login name, if one was saved
pub fn load_password(user: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, user);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}
