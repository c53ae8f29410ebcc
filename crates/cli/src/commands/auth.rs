//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! shopfront register -n "Ana" -e ana@example.com -p hunter2
//! shopfront login -e ana@example.com -p hunter2
//! shopfront logout
//! ```

use secrecy::SecretString;
use shopfront_client::Shopfront;

use super::CliError;

/// Log in and reconcile the cart.
#[allow(clippy::print_stdout)]
pub async fn login(shop: &Shopfront, email: &str, password: String) -> Result<(), CliError> {
    let password = SecretString::from(password);
    let user = shop.login(email, &password).await?;

    match user {
        Some(user) => println!(
            "Logged in as {} ({})",
            user.name.as_deref().unwrap_or(email),
            user.id
        ),
        None => println!("Logged in as {email}"),
    }
    println!("Cart: {} item(s)", shop.cart().item_count());
    Ok(())
}

/// Create an account.
#[allow(clippy::print_stdout)]
pub async fn register(
    shop: &Shopfront,
    name: &str,
    email: &str,
    password: String,
) -> Result<(), CliError> {
    let password = SecretString::from(password);
    let user = shop.register(name, email, &password).await?;

    if shop.api().session().is_authenticated() {
        println!("Registered and logged in as {email}");
    } else {
        println!("Registered {email}; log in to continue");
    }
    if let Some(user) = user {
        println!("Account id: {}", user.id);
    }
    Ok(())
}

/// Log out; the account's cart stays saved for the next login.
#[allow(clippy::print_stdout)]
pub async fn logout(shop: &Shopfront) {
    shop.logout().await;
    println!("Logged out");
}
