//! Password hashing utility for Chatdesk
//!
//! Prints an Argon2id hash for seeding staff accounts by hand.
//!
//! Usage:
//!   cargo run --bin hash-password
//!   cargo run --bin hash-password "MySecurePassword123!"

use chatdesk_api::auth::{validate_password, Argon2HashProvider, HashProvider};
use std::env;
use std::io::{self, Write};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let password = if let Some(pwd) = env::args().nth(1) {
        pwd
    } else {
        // Read from stdin so the password stays out of the process list
        print!("Enter password to hash: ");
        io::stdout().flush()?;

        let mut password = String::new();
        io::stdin().read_line(&mut password)?;
        password.trim().to_string()
    };

    if let Err(e) = validate_password(&password) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let password_hash = Argon2HashProvider.generate_hash(&password)?;

    println!("\n===========================================");
    println!("Password Hash (Argon2id):");
    println!("===========================================");
    println!("{}", password_hash);
    println!("===========================================\n");

    println!("Example SQL:");
    println!(
        "INSERT INTO users (id, username, email, profile, password_hash) \
         VALUES (gen_random_uuid(), 'admin', 'admin@example.com', 'sudo', '{}');",
        password_hash
    );

    Ok(())
}
