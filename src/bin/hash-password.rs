//! Prints a bcrypt hash for ADMIN_HASH_PASSWORD or a seeded user row.

use consultancy_backend::routes::auth::{hash_password_sync, MIN_PASSWORD_LEN};
use std::env;

fn main() {
    let password = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin hash-password <PASSWORD>");
        std::process::exit(1);
    });

    if password.chars().count() < MIN_PASSWORD_LEN {
        eprintln!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        );
        std::process::exit(1);
    }

    match hash_password_sync(&password) {
        Ok(hashed) => {
            println!("\nHash : {}\n", hashed);
            println!("# Paste this into your .env:");
            println!("ADMIN_HASH_PASSWORD={}", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
