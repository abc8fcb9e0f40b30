// Map an e-commerce event into a destination payload
// Usage: cargo run --example order_completed

use mapkit_core::{Mapping, ResolveOptions, Resolver};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mapping = Mapping::compile(&json!({
        "event_name": {"@path": "$.event"},
        "user": {
            "id": {"@path": "$.userId"},
            "email": {"@if": {"exists": {"@path": "$.context.traits.email"}, "then": {"@path": "$.context.traits.email"}, "else": "unknown"}}
        },
        "value": {"@liquid": "{{ properties.revenue | times: 100 | round }}"},
        "items": {"@arrayPath": ["$.properties.products", {
            "sku": {"@path": "$.product_id"},
            "label": {"@template": "{{name}} x{{quantity}}"}
        }]}
    }))?;

    let event = json!({
        "event": "Order Completed",
        "userId": "user-42",
        "context": {"traits": {"email": "ada@example.com"}},
        "properties": {
            "revenue": 19.99,
            "products": [
                {"product_id": "p-1", "name": "Tea & Biscuits", "quantity": 2},
                {"product_id": "p-2", "name": "Mug", "quantity": 1}
            ]
        }
    });

    let resolver = Resolver::new().with_options(ResolveOptions {
        escape_templates: false,
        ..ResolveOptions::default()
    });
    let payload = mapping.resolve_with(&event, &resolver)?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
