//! Integration tests for the HTTP tool adapters
//!
//! Each adapter must turn timeouts, refused connections and HTTP errors into
//! distinct failures with their own apology, never an error value.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use barista_engine::config::ToolsConfig;
use barista_engine::location::LocationClassifier;
use barista_engine::session::SessionContext;
use barista_engine::tools::{ToolPayload, ToolRegistry};
use sdk::{ToolFailure, ToolInput};

fn registry(base_url: &str) -> ToolRegistry {
    let config = ToolsConfig {
        base_url: base_url.to_string(),
        calculator_timeout_secs: 1,
        product_timeout_secs: 1,
        outlet_timeout_secs: 1,
        ..Default::default()
    };
    let classifier = Arc::new(LocationClassifier::new().unwrap());
    ToolRegistry::with_http_tools(&config, classifier).unwrap()
}

#[tokio::test]
async fn test_calculator_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calculator/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "result": 2}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let input = ToolInput::new("calculator").with_param("expression", json!("1 + 1"));
    let result = tools
        .dispatch(&input, &mut SessionContext::default())
        .await
        .unwrap();

    assert_eq!(result.failure(), Some(&ToolFailure::Timeout));
    assert!(result.message().contains("timed out"));
}

#[tokio::test]
async fn test_calculator_rejected_expression() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calculator/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "result": null,
            "message": "division by zero at position 3"
        })))
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let input = ToolInput::new("calculator").with_param("expression", json!("1 / 0"));
    let result = tools
        .dispatch(&input, &mut SessionContext::default())
        .await
        .unwrap();

    assert_eq!(result.failure(), Some(&ToolFailure::Backend));
    assert!(!result.message().contains("position 3"));
}

#[tokio::test]
async fn test_calculator_http_error_and_garbled_body_apologise_differently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calculator/"))
        .and(body_json(json!({"expression": "2 + 2"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calculator/"))
        .and(body_json(json!({"expression": "3 + 3"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let mut context = SessionContext::default();

    let input = ToolInput::new("calculator").with_param("expression", json!("2 + 2"));
    let http = tools.dispatch(&input, &mut context).await.unwrap();
    assert_eq!(http.failure(), Some(&ToolFailure::Http { status: 500 }));

    let input = ToolInput::new("calculator").with_param("expression", json!("3 + 3"));
    let garbled = tools.dispatch(&input, &mut context).await.unwrap();
    assert!(matches!(
        garbled.failure(),
        Some(ToolFailure::Unexpected { .. })
    ));

    assert_ne!(http.message(), garbled.message());
}

#[tokio::test]
async fn test_product_search_success_and_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("query", "tumbler cold"))
        .and(query_param("top_k", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [
                {"name": "All Day Cup", "category": "Tumbler", "price": "RM 79.00"},
                {"name": "Frozee Cold Cup", "category": "Tumbler", "price": "RM 55.00"}
            ],
            "count": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("query", "mug"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let mut context = SessionContext::default();

    let input = ToolInput::new("product_search")
        .with_param("query", json!("tumbler"))
        .with_param("product_type", json!("cold"))
        .with_param("top_k", json!("2"));
    let result = tools.dispatch(&input, &mut context).await.unwrap();
    match result.payload() {
        Some(ToolPayload::Products { products, count }) => {
            assert_eq!(*count, 2);
            assert_eq!(products[0].name, "All Day Cup");
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    let input = ToolInput::new("product_search").with_param("query", json!("mug"));
    let result = tools.dispatch(&input, &mut context).await.unwrap();
    assert_eq!(result.failure(), Some(&ToolFailure::Http { status: 500 }));
    assert!(result.message().contains("try again later"));
    assert!(context.is_empty());
}

#[tokio::test]
async fn test_product_search_connection_refused() {
    let tools = registry("http://127.0.0.1:1");
    let result = tools
        .dispatch(&ToolInput::new("product_search"), &mut SessionContext::default())
        .await
        .unwrap();

    assert_eq!(result.failure(), Some(&ToolFailure::Connection));
    assert!(result.message().contains("temporarily unavailable"));
}

#[tokio::test]
async fn test_outlet_search_expands_short_forms_and_remembers_first_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/outlets/"))
        .and(query_param("query", "outlets in petaling jaya"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [
                {"name": "ZUS Coffee SS 2", "city": "Petaling Jaya"},
                {"name": "ZUS Coffee Damansara Uptown", "city": "Petaling Jaya"}
            ],
            "count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let mut context = SessionContext::default();
    let input = ToolInput::new("outlet_query").with_param("query", json!("outlets in PJ"));
    let result = tools.dispatch(&input, &mut context).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.message(), "Found 2 outlet(s)");
    assert_eq!(
        context.current_outlet().and_then(|o| o.get("name")),
        Some(&json!("ZUS Coffee SS 2"))
    );
}

#[tokio::test]
async fn test_outlet_backend_failure_hides_error_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/outlets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "results": [],
            "count": 0,
            "error": "Generated query failed validation: SELECT * FROM secrets"
        })))
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let input = ToolInput::new("outlet_query").with_param("query", json!("outlets in Klang"));
    let result = tools
        .dispatch(&input, &mut SessionContext::default())
        .await
        .unwrap();

    assert_eq!(result.failure(), Some(&ToolFailure::Backend));
    assert!(!result.message().contains("SELECT"));
    assert!(result.message().contains("more specific"));
}

#[tokio::test]
async fn test_coordinates_only_route_to_nearest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/outlets/nearest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [],
            "count": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let input = ToolInput::new("outlet_query")
        .with_param("latitude", json!(3.139))
        .with_param("longitude", json!("101.6869"));
    let result = tools
        .dispatch(&input, &mut SessionContext::default())
        .await
        .unwrap();

    assert_eq!(result.message(), "No outlets found nearby.");
    assert!(matches!(
        result.payload(),
        Some(ToolPayload::Outlets { nearest: true, .. })
    ));
}

#[tokio::test]
async fn test_nearest_flag_overrides_plain_query_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/outlets/nearest"))
        .and(body_json(json!({"latitude": 3.139, "longitude": 101.6869, "limit": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [{"name": "ZUS Coffee Mid Valley", "distance_km": 1.2}],
            "count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/outlets/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tools = registry(&server.uri());
    let input = ToolInput::new("outlet_query")
        .with_param("query", json!("zus coffee outlets"))
        .with_param("latitude", json!(3.139))
        .with_param("longitude", json!(101.6869))
        .with_param("nearest", json!(true));
    let result = tools
        .dispatch(&input, &mut SessionContext::default())
        .await
        .unwrap();

    assert_eq!(result.message(), "Found 1 nearest outlet(s)");
}
