//! Prompt text sent to the model
//!
//! The planning prompt carries the decision grammar the parser expects. The
//! summary prompts turn tool rows into copy for the customer.

use serde_json::{Map, Value};

use crate::tools::Product;

/// Planning instructions: role, tools, scope, safety and output grammar
pub fn system_prompt(brand: &str, tool_catalogue: &str) -> String {
    format!(
        "You are the planning step of the {brand} assistant. Decide what to do with the customer's message.

AVAILABLE TOOLS:
{tool_catalogue}

ABOUT {brand}:
- {brand} has outlets across Malaysia, often named after malls or areas such as \"IOI City Mall\" or \"Sunway Pyramid\".
- A mall, area or outlet name in the message (Subang Jaya, Petaling Jaya, ...) refers to {brand} outlets. Use outlet_query for those.

SAFETY:
- Never plan destructive, irreversible or system-level actions such as dropping databases, deleting files or shutting systems down.
- Refuse such requests politely with ACTION: answer. Do not confirm or attempt them.
- You may not modify external systems, data or configuration.

SCOPE:
- Your focus is {brand}: merchandise products, outlets and general questions about the shop.
- Use any available tool that fits the request, including the calculator for discounts, percentages or tips.
- For unrelated topics with no matching tool (weather, news, politics, other brands) answer with a short, polite redirect.

DATA LIMITS:
- You only have data about outlets (addresses, hours, phone numbers) and drinkware merchandise (mugs, tumblers, bottles).
- You have no data about drinks, food, menu prices, promotions or online ordering. Say so instead of guessing.
- Never invent information.

Vary your wording between replies. Listing search results in a consistent format is fine.

Reply in exactly this format:

INTENT: the customer's intent
MISSING: information you still need, or none
ACTION: exactly one of use_tool, ask_user, answer
TOOL: a tool name from AVAILABLE TOOLS when ACTION is use_tool, otherwise none
PARAMS: a JSON object of tool parameters such as {{\"query\": \"mugs\"}}, or {{}}
QUESTION: your question when ACTION is ask_user, otherwise none
ANSWER: your reply when ACTION is answer, otherwise none
REASONING: one short sentence

Rules:
- Start with INTENT: on the first line and include all eight lines.
- Write nothing outside these lines.
- ACTION must be use_tool, ask_user or answer. Put tool names in TOOL, never in ACTION.
- When ACTION is answer, ANSWER must hold a complete reply."
    )
}

/// Extra system message sent when the customer's text looks like an override attempt
pub fn injection_reminder(reminder: &str) -> String {
    format!("SECURITY NOTICE: {}", reminder)
}

/// Numbered product block, at most `limit` entries
pub fn product_listing(products: &[Product], limit: usize) -> String {
    let mut listing = String::new();

    for (i, product) in products.iter().take(limit).enumerate() {
        let category = non_empty(&product.category).unwrap_or("Uncategorized");
        let price = non_empty(&product.price).unwrap_or("N/A");
        listing.push_str(&format!(
            "{}. {} ({})\n   Price: {}\n",
            i + 1,
            product.name,
            category,
            price
        ));
        if let Some(description) = non_empty(&product.description) {
            listing.push_str(&format!("   Description: {}\n", description));
        }
        listing.push('\n');
    }

    listing
}

pub fn product_summary(brand: &str, listing: &str) -> String {
    format!(
        "You are writing for {brand} customers.

These products matched the customer's search:
{listing}
Write a short, friendly summary of two to four sentences:
1. Say what kind of products were found and the overall feel of the selection.
2. Mention they can be picked up at our stores or ordered online.
3. Then list each product as:
   1. product name and price
      description
4. Keep the warm tone of {brand} marketing copy and stay concise."
    )
}

/// One outlet entry; nearest entries include the distance line
pub fn outlet_entry(row: &Map<String, Value>, nearest: bool) -> String {
    let name = field(row, "name").unwrap_or_else(|| "Unknown Outlet".to_string());
    let address = field(row, "address").unwrap_or_else(|| "Address unavailable".to_string());
    let phone = field(row, "phone").unwrap_or_else(|| "Phone unavailable".to_string());
    let hours = field(row, "operating_hours")
        .unwrap_or_else(|| "Operating hours unavailable".to_string());

    if nearest {
        let distance =
            field(row, "distance_km").unwrap_or_else(|| "Distance unavailable".to_string());
        format!(
            "Name: {}\nDistance: {} km away\nAddress: {}\nPhone: {}\nOperating Hours: {}\n",
            name, distance, address, phone, hours
        )
    } else {
        format!(
            "Name: {}\nAddress: {}\nPhone: {}\nOperating Hours: {}\n",
            name, address, phone, hours
        )
    }
}

pub fn nearest_outlet_summary(brand: &str, entries: &str) -> String {
    format!(
        "You are answering a {brand} customer who asked for the closest outlets.

Results, nearest first:
{entries}

Write three to five friendly sentences speaking as {brand} (\"we\").
Make clear these are the closest locations, then list each as:
1. **Branch Name**
   Distance km away
   Address
   Operating hours
Finish with a warm line such as \"We look forward to serving you!\""
    )
}

pub fn outlet_summary(brand: &str, entries: &str) -> String {
    format!(
        "You are summarising {brand} outlet data for a customer.

Outlet data:
{entries}

Write three to five sentences speaking as {brand} (\"we\").
List each as:
1. **Branch Name**
   Address
   Operating hours
Point out shared patterns such as common opening hours or a contact number.
Vary \"outlet\" with \"branch\", \"location\" or \"store\". Leave out coordinates. Keep it concise."
    )
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn field(row: &Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => non_empty(s).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
