use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use codecolors_api::build_app;
use serde_json::{json, Value};
use tower::ServiceExt;

fn locales_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../locales")
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// A Dialogflow request as an Actions on Google client sends it.
fn webhook(intent: &str, parameters: Value, payload: Value) -> Value {
    json!({
        "responseId": "response-1",
        "session": "projects/code-colors/agent/sessions/session-1",
        "queryResult": {
            "queryText": "hello",
            "parameters": parameters,
            "languageCode": "en",
            "intent": {
                "name": "projects/code-colors/agent/intents/1",
                "displayName": intent
            }
        },
        "originalDetectIntentRequest": {
            "source": "google",
            "version": "2",
            "payload": payload
        }
    })
}

fn screen_surface() -> Value {
    json!({
        "capabilities": [
            { "name": "actions.capability.SCREEN_OUTPUT" },
            { "name": "actions.capability.AUDIO_OUTPUT" }
        ]
    })
}

fn speaker_surface() -> Value {
    json!({ "capabilities": [{ "name": "actions.capability.AUDIO_OUTPUT" }] })
}

#[tokio::test]
async fn health_reports_locales_and_store() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], json!("ok"));
    assert_eq!(parsed["default_locale"], json!("en"));
    assert_eq!(parsed["locales"], json!(["en", "es"]));
    assert_eq!(parsed["store_backend"], json!("memory"));
}

#[tokio::test]
async fn welcome_without_stored_name_asks_for_name_permission() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (status, body) = post(
        app,
        "/fulfillment",
        webhook(
            "Default Welcome Intent",
            json!({}),
            json!({ "user": { "locale": "en-US" }, "surface": speaker_surface() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let google = &body["payload"]["google"];
    assert_eq!(google["expectUserResponse"], json!(true));
    assert_eq!(google["systemIntent"]["intent"], json!("actions.intent.PERMISSION"));
    assert_eq!(
        google["systemIntent"]["data"]["optContext"],
        json!("To address you by name")
    );
    assert_eq!(google["systemIntent"]["data"]["permissions"], json!(["NAME"]));
}

#[tokio::test]
async fn granted_permission_writes_user_storage() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (status, body) = post(
        app,
        "/fulfillment",
        webhook(
            "actions_intent_PERMISSION",
            json!({}),
            json!({
                "user": {
                    "locale": "en-US",
                    "profile": { "displayName": "Ada Lovelace", "givenName": "Ada" }
                },
                "inputs": [{
                    "intent": "actions.intent.PERMISSION",
                    "arguments": [{ "name": "PERMISSION", "boolValue": true, "textValue": "true" }]
                }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let google = &body["payload"]["google"];
    assert_eq!(
        google["userStorage"],
        json!("{\"data\":{\"userName\":\"Ada Lovelace\"}}")
    );
    assert_eq!(
        google["richResponse"]["items"][0]["simpleResponse"]["textToSpeech"],
        json!("Thanks, Ada Lovelace. What's your favorite color?")
    );
}

#[tokio::test]
async fn returning_user_is_greeted_in_regional_spanish() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (_, body) = post(
        app,
        "/fulfillment",
        webhook(
            "Default Welcome Intent",
            json!({}),
            json!({
                "user": {
                    "locale": "es-419",
                    "userStorage": "{\"data\":{\"userName\":\"Grace Hopper\"}}"
                }
            }),
        ),
    )
    .await;

    let google = &body["payload"]["google"];
    assert_eq!(
        google["richResponse"]["items"][0]["simpleResponse"]["textToSpeech"],
        json!("Hola de nuevo, Grace. ¿Cuál es tu color favorito?")
    );
    assert_eq!(
        google["userStorage"],
        json!("{\"data\":{\"userName\":\"Grace Hopper\"}}")
    );
    assert!(google.get("systemIntent").is_none());
}

#[tokio::test]
async fn favorite_color_speaks_lucky_number() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (_, body) = post(
        app,
        "/fulfillment",
        webhook("favorite color", json!({ "color": "blue" }), json!({})),
    )
    .await;

    let simple = &body["payload"]["google"]["richResponse"]["items"][0]["simpleResponse"];
    let ssml = simple["textToSpeech"].as_str().unwrap();
    assert!(ssml.starts_with("<speak>Your lucky number is 4."));
    assert!(ssml.contains("clang_and_wobble.ogg"));
    assert_eq!(
        simple["displayText"],
        json!("Your lucky number is 4. Would you like to hear some fake colors?")
    );
}

#[tokio::test]
async fn stored_name_with_markup_characters_is_escaped_in_speech() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (_, body) = post(
        app,
        "/fulfillment",
        webhook(
            "favorite color",
            json!({ "color": "blue" }),
            json!({
                "user": {
                    "locale": "en-US",
                    "userStorage": "{\"data\":{\"userName\":\"Tom & Jerry <3\"}}"
                }
            }),
        ),
    )
    .await;

    let simple = &body["payload"]["google"]["richResponse"]["items"][0]["simpleResponse"];
    let ssml = simple["textToSpeech"].as_str().unwrap();
    assert!(ssml.starts_with("<speak>Tom &amp; Jerry &lt;3, your lucky number is 4."));
    assert_eq!(
        simple["displayText"],
        json!("Tom & Jerry <3, your lucky number is 4. Would you like to hear some fake colors?")
    );
}

#[tokio::test]
async fn fake_color_offer_adds_carousel_on_screens() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (_, body) = post(
        app.clone(),
        "/fulfillment",
        webhook(
            "favorite color - yes",
            json!({}),
            json!({ "surface": screen_surface() }),
        ),
    )
    .await;
    let google = &body["payload"]["google"];
    assert_eq!(google["systemIntent"]["intent"], json!("actions.intent.OPTION"));
    let items = google["systemIntent"]["data"]["carouselSelect"]["items"]
        .as_array()
        .unwrap();
    assert_eq!(items.len(), 3);

    let (_, body) = post(
        app,
        "/fulfillment",
        webhook(
            "favorite color - yes",
            json!({}),
            json!({ "surface": speaker_surface() }),
        ),
    )
    .await;
    assert!(body["payload"]["google"].get("systemIntent").is_none());
}

#[tokio::test]
async fn fake_color_renders_card_only_with_a_screen() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (_, with_screen) = post(
        app.clone(),
        "/fulfillment",
        webhook(
            "favorite fake color",
            json!({ "fakeColor": "indigo taco" }),
            json!({
                "surface": screen_surface(),
                "inputs": [{
                    "intent": "actions.intent.OPTION",
                    "arguments": [{ "name": "OPTION", "textValue": "pink unicorn" }]
                }]
            }),
        ),
    )
    .await;
    let google = &with_screen["payload"]["google"];
    let card = &google["richResponse"]["items"][1]["basicCard"];
    assert_eq!(card["title"], json!("Pink Unicorn"));
    assert_eq!(card["image"]["accessibilityText"], json!("Pink Unicorn Color"));
    assert_eq!(google["expectUserResponse"], json!(true));
    assert_eq!(
        google["richResponse"]["suggestions"],
        json!([{ "title": "Indigo Taco" }, { "title": "Blue Grey Coffee" }])
    );

    let (_, without_screen) = post(
        app,
        "/fulfillment",
        webhook(
            "favorite fake color",
            json!({ "fakeColor": "Blue Grey Coffee" }),
            json!({ "surface": speaker_surface() }),
        ),
    )
    .await;
    let items = without_screen["payload"]["google"]["richResponse"]["items"]
        .as_array()
        .unwrap();
    assert!(items.iter().all(|item| item.get("basicCard").is_none()));
    assert!(items[0]["simpleResponse"]["textToSpeech"]
        .as_str()
        .unwrap()
        .contains("Blue Grey Coffee brings to mind"));
}

#[tokio::test]
async fn unknown_fake_color_asks_again() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (status, body) = post(
        app,
        "/fulfillment",
        webhook("favorite fake color", json!({ "fakeColor": "plaid" }), json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let google = &body["payload"]["google"];
    assert_eq!(google["expectUserResponse"], json!(true));
    assert_eq!(
        google["richResponse"]["items"][0]["simpleResponse"]["textToSpeech"],
        json!("Sorry, I didn't get that. Which color was it?")
    );
}

#[tokio::test]
async fn reprompts_escalate_then_close() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let reprompt = |count: &str, is_final: bool| {
        webhook(
            "actions_intent_NO_INPUT",
            json!({}),
            json!({
                "inputs": [{
                    "intent": "actions.intent.NO_INPUT",
                    "arguments": [
                        { "name": "REPROMPT_COUNT", "intValue": count },
                        { "name": "IS_FINAL_REPROMPT", "boolValue": is_final }
                    ]
                }]
            }),
        )
    };

    let (_, first) = post(app.clone(), "/fulfillment", reprompt("0", false)).await;
    assert_eq!(
        first["payload"]["google"]["richResponse"]["items"][0]["simpleResponse"]["textToSpeech"],
        json!("Sorry, what was that?")
    );
    assert_eq!(first["payload"]["google"]["expectUserResponse"], json!(true));

    let (_, second) = post(app.clone(), "/fulfillment", reprompt("1", false)).await;
    assert_eq!(second["payload"]["google"]["expectUserResponse"], json!(true));

    let (_, last) = post(app, "/fulfillment", reprompt("2", true)).await;
    assert_eq!(last["payload"]["google"]["expectUserResponse"], json!(false));
    assert_eq!(
        last["payload"]["google"]["richResponse"]["items"][0]["simpleResponse"]["textToSpeech"],
        json!("We can stop here. See you soon.")
    );
}

#[tokio::test]
async fn unhandled_intent_returns_empty_body() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (status, body) = post(
        app,
        "/fulfillment",
        webhook("book a flight", json!({}), json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn native_route_keeps_state_per_user() {
    let app = build_app(locales_dir()).await.expect("app should build");

    let (_, grant) = post(
        app.clone(),
        "/v1/route",
        json!({
            "user_id": "user-42",
            "intent_name": "actions_intent_PERMISSION",
            "arguments": { "permission_granted": true, "profile_display_name": "Ada Lovelace" }
        }),
    )
    .await;
    assert_eq!(grant["handled"], json!(true));
    assert_eq!(
        grant["directive"]["updated_state"]["user_display_name"],
        json!("Ada Lovelace")
    );

    let (_, color) = post(
        app.clone(),
        "/v1/route",
        json!({
            "user_id": "user-42",
            "intent_name": "favorite color",
            "parameters": { "color": "green" }
        }),
    )
    .await;
    let prompt = &color["directive"]["prompts"][0];
    assert_eq!(prompt["type"], json!("speech"));
    assert!(prompt["display_text"]
        .as_str()
        .unwrap()
        .starts_with("Ada Lovelace, your lucky number is 5."));

    let (_, stranger) = post(
        app,
        "/v1/route",
        json!({
            "user_id": "user-7",
            "intent_name": "favorite color",
            "parameters": { "color": "green" }
        }),
    )
    .await;
    assert!(stranger["directive"]["prompts"][0]["display_text"]
        .as_str()
        .unwrap()
        .starts_with("Your lucky number is 5."));
}
