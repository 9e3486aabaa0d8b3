//! CLI walkthrough of the user store.
//!
//! # Responsibility
//! - Resolve configuration from `USERBOOK_*` variables and an optional
//!   connection-string argument.
//! - Run one add/update/remove/delete lifecycle and print each state.
//!
//! Usage: `userbook_cli [connection_string]`

use std::error::Error;
use std::process::ExitCode;
use userbook_core::{init_from_config, StoreConfig, User, UserStore};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("userbook_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut config = StoreConfig::from_env()?;
    if let Some(url) = std::env::args().nth(1) {
        config = config.with_database_url(url);
    }
    init_from_config(&config)?;

    println!("userbook_core version={}", userbook_core::core_version());
    let mut store = UserStore::from_config(&config)?;

    let mut user = User::new("spongebob", Some("Spongebob Squarepants".to_string()));
    store.add_user(&mut user)?;
    println!("added {user}");

    let loaded = store.get_user_by_name("spongebob")?;
    println!("loaded {loaded}");

    store.add_address_to_user(&mut user, "spongebob@sqlalchemy.org")?;
    store.add_address_to_user(&mut user, "spongebob@squarepants.com")?;
    print_addresses(&user);

    store.update_address(&mut user, "spongebob@sqlalchemy.org", "spongebob2@sqlalchemy.org")?;
    print_addresses(&user);

    store.remove_address_from_user(&mut user, "spongebob@squarepants.com")?;
    print_addresses(&user);

    store.delete_user(&mut user)?;
    println!("deleted; remaining users={}", store.list_users()?.len());

    store.close()?;
    Ok(())
}

fn print_addresses(user: &User) {
    for address in &user.addresses {
        println!("  {address}");
    }
}
