// Full request path: router -> handler -> hyper client -> mock backend.
use std::{io::Write, sync::Arc};

use arc_swap::ArcSwap;
use axum::{Router, body::Body};
use http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use switchyard::{
    GatewayService, HttpClient, HttpClientAdapter, HttpHandler, build_router,
    config::{PassthroughBehavior, RouteConfig, ServerConfig},
};
use tempfile::NamedTempFile;
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header as header_matcher, method, path},
};

const ARN: &str = "arn:aws:states:us-east-1:123456789012:stateMachine:StateMachine";
const QUEUE_PATH: &str = "/123456789012/ApiSqsQueue";
const INVOKE_PATH: &str = "/2015-03-31/functions/LambdaBackend/invocations";

struct Harness {
    app: Router,
    gateway: Arc<ArcSwap<GatewayService>>,
    template: NamedTempFile,
}

fn config_for(endpoint: &str, template: &NamedTempFile, stage: &str) -> ServerConfig {
    ServerConfig::builder()
        .listen_addr("127.0.0.1:0")
        .stage(stage)
        .route("/sqs", RouteConfig::queue(endpoint, "123456789012/ApiSqsQueue"))
        .route("/eventbridge", RouteConfig::event_bus(endpoint))
        .route("/stepfunctions", RouteConfig::workflow(endpoint, ARN))
        .route(
            "/",
            RouteConfig::DirectCompute {
                endpoint: endpoint.to_string(),
                function_name: "LambdaBackend".to_string(),
                method: "GET".to_string(),
                response_template: Some(template.path().display().to_string()),
                passthrough: PassthroughBehavior::WhenNoTemplates,
            },
        )
        .backend_timeout("5s")
        .build()
        .unwrap()
}

fn harness(endpoint: &str) -> Harness {
    let mut template = NamedTempFile::new().unwrap();
    write!(template, "$input.json('$.body')").unwrap();

    let gateway = GatewayService::new(Arc::new(config_for(endpoint, &template, "dev"))).unwrap();
    let gateway = Arc::new(ArcSwap::from_pointee(gateway));
    let client: Arc<dyn HttpClient> = Arc::new(HttpClientAdapter::new().unwrap());
    let handler = Arc::new(HttpHandler::new(gateway.clone(), client));

    Harness {
        app: build_router(handler, gateway.clone()),
        gateway,
        template,
    }
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn queue_round_trip_echoes_the_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .and(header_matcher(
            "content-type",
            "application/x-www-form-urlencoded",
        ))
        .and(body_string(
            "Action=SendMessage&MessageBody=%7B%22book%22%3A%22CDK%22%7D",
        ))
        .respond_with(|req: &wiremock::Request| {
            // A queue that answers with the message it just received.
            let message = url::form_urlencoded::parse(&req.body)
                .find(|(key, _)| key == "MessageBody")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            ResponseTemplate::new(200).set_body_string(message)
        })
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness(&server.uri());
    let response = harness
        .app
        .oneshot(post_json("/dev/sqs", r#"{"book":"CDK"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(read_json(response).await, json!({"book": "CDK"}));
}

#[tokio::test]
async fn event_bus_publishes_put_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header_matcher("x-amz-target", "AWSEvents.PutEvents"))
        .and(header_matcher(
            "content-type",
            "application/x-amz-json-1.1",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"Entries":[{"EventId":"e-1"}],"FailedEntryCount":0}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness(&server.uri());
    let response = harness
        .app
        .oneshot(post_json("/dev/eventbridge", r#"{"order":7}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["FailedEntryCount"], 0);

    let received = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["Entries"][0]["Detail"], r#"{"order":7}"#);
}

#[tokio::test]
async fn workflow_failure_is_forwarded_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_matcher(
            "x-amz-target",
            "AWSStepFunctions.StartExecution",
        ))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_raw(
                    r#"{"__type":"StateMachineDoesNotExist"}"#,
                    "application/x-amz-json-1.0",
                ),
        )
        .mount(&server)
        .await;

    let harness = harness(&server.uri());
    let response = harness
        .app
        .oneshot(post_json("/dev/stepfunctions", r#"{"order":7}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-amz-json-1.0"
    );
    assert_eq!(
        read_json(response).await,
        json!({"__type": "StateMachineDoesNotExist"})
    );
}

#[tokio::test]
async fn direct_compute_renders_response_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"statusCode":200,"body":{"message":"hello lambda api"}}"#,
        ))
        .mount(&server)
        .await;

    let harness = harness(&server.uri());
    let response = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/dev")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({"message": "hello lambda api"})
    );
}

#[tokio::test]
async fn function_error_skips_the_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-amz-function-error", "Unhandled")
                .set_body_string(r#"{"errorMessage":"boom"}"#),
        )
        .mount(&server)
        .await;

    let harness = harness(&server.uri());
    let response = harness
        .app
        .oneshot(Request::builder().uri("/dev/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(read_json(response).await, json!({"errorMessage": "boom"}));
}

#[tokio::test]
async fn unreachable_backend_is_an_internal_error() {
    let harness = harness("http://127.0.0.1:9");
    let response = harness
        .app
        .oneshot(post_json("/dev/sqs", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({"message": "Internal server error"})
    );
}

#[tokio::test]
async fn reloaded_gateway_serves_new_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = harness(&server.uri());
    let reloaded = config_for(&server.uri(), &harness.template, "prod");
    harness
        .gateway
        .store(Arc::new(GatewayService::new(Arc::new(reloaded)).unwrap()));

    let response = harness
        .app
        .clone()
        .oneshot(post_json("/dev/sqs", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = harness
        .app
        .oneshot(post_json("/prod/sqs", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({}));
}

#[tokio::test]
async fn health_reports_route_count() {
    let harness = harness("http://127.0.0.1:9");
    let response = harness
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({"status": "ok", "routes": 4, "stage": "dev"})
    );
}
