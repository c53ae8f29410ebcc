//! Raw API calls through the dispatcher.
//!
//! The access token is attached and refreshed exactly as for any other
//! call, so this is handy for poking at protected endpoints.

use reqwest::Method;
use serde_json::Value;
use shopfront_client::Shopfront;

use super::CliError;

/// Send `method path` with an optional JSON body and print the response.
#[allow(clippy::print_stdout)]
pub async fn send(
    shop: &Shopfront,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<(), CliError> {
    let method = parse_method(method)?;
    let body = body.map(serde_json::from_str::<Value>).transpose()?;

    let response = shop.dispatch(path, method, body.as_ref()).await?;

    match response {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("(no content)"),
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method, CliError> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(CliError::InvalidArgument(format!(
            "unsupported method '{other}'"
        ))),
    }
}
