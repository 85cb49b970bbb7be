use cryptar_core::error::Result;
use cryptar_core::keys::PasswordPrompter;
use zeroize::Zeroizing;

/// Interactive prompter over the controlling terminal.
pub struct TerminalPrompter;

impl PasswordPrompter for TerminalPrompter {
    fn prompt_new(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        loop {
            let first = Zeroizing::new(rpassword::prompt_password("Password: ")?);
            let second = Zeroizing::new(rpassword::prompt_password("Again   : ")?);
            if !first.is_empty() && *first == *second {
                return Ok(Zeroizing::new(first.as_bytes().to_vec()));
            }
            eprintln!("Passwords do not match or are empty.");
        }
    }

    fn prompt_existing(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let password = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        Ok(Zeroizing::new(password.as_bytes().to_vec()))
    }
}
