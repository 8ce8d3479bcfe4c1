//! Print the generated OpenAPI document as JSON.

use anyhow::Result;

fn main() -> Result<()> {
    let spec = pordisto::api::openapi();
    println!("{}", spec.to_pretty_json()?);
    Ok(())
}
