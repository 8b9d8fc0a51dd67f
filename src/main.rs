//! Consultancy Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = consultancy_backend::run().await {
        eprintln!("consultancy-backend failed to start: {}", e);
        std::process::exit(1);
    }
}
