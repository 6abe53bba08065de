use std::time::Duration;

use studio_ox_common::{
    CommonRequestError,
    request_builder::{
        AuthMethod, Endpoint, HttpMethod, MultipartForm, RequestBuilder, RequestConfig,
        build_query_string, is_success_status,
    },
};

#[test]
fn test_endpoint_creation() {
    let endpoint = Endpoint::new("llm/chat", HttpMethod::Post);
    assert_eq!(endpoint.path, "llm/chat");
    assert_eq!(endpoint.method, HttpMethod::Post);
    assert!(endpoint.extra_headers.is_none());
    assert!(endpoint.query_params.is_empty());
    assert!(endpoint.timeout.is_none());
}

#[test]
fn test_endpoint_builders() {
    let endpoint = Endpoint::post("resume/optimize")
        .with_timeout(Duration::from_secs(180))
        .with_header("x-trace", "abc")
        .with_query_param("top_k", Some(5))
        .with_query_param("conversation_id", None::<String>);

    assert_eq!(endpoint.timeout, Some(Duration::from_secs(180)));
    assert_eq!(endpoint.extra_headers.unwrap().get("x-trace").map(String::as_str), Some("abc"));
    assert_eq!(
        endpoint.query_params,
        vec![
            ("top_k".to_string(), Some("5".to_string())),
            ("conversation_id".to_string(), None),
        ]
    );
}

#[test]
fn test_query_string_skips_missing_values_and_encodes() {
    let query = build_query_string([
        ("q", Some("senior rust engineer")),
        ("page", None),
        ("lang", Some("zh&en")),
    ]);
    assert_eq!(query, "q=senior+rust+engineer&lang=zh%26en");
    assert_eq!(build_query_string(Vec::<(&str, Option<&str>)>::new()), "");
}

#[test]
fn test_success_status_range() {
    assert!(is_success_status(200));
    assert!(is_success_status(204));
    assert!(is_success_status(299));
    assert!(!is_success_status(199));
    assert!(!is_success_status(300));
    assert!(!is_success_status(500));
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new("http://localhost:8000/api/v1")
        .with_auth(AuthMethod::Bearer("token123".to_string()))
        .with_header("accept", "application/json")
        .with_user_agent("studio-ox/0.1")
        .with_timeout(Duration::from_secs(30));

    assert_eq!(config.base_url, "http://localhost:8000/api/v1");
    assert!(matches!(config.auth, Some(AuthMethod::Bearer(ref t)) if t == "token123"));
    assert_eq!(config.default_headers.len(), 1);
    assert_eq!(config.user_agent.as_deref(), Some("studio-ox/0.1"));
    assert_eq!(config.timeout, Some(Duration::from_secs(30)));
}

#[test]
fn test_http_method_conversion() {
    use reqwest::Method;

    assert_eq!(Method::from(HttpMethod::Get), Method::GET);
    assert_eq!(Method::from(HttpMethod::Post), Method::POST);
    assert_eq!(Method::from(HttpMethod::Put), Method::PUT);
    assert_eq!(Method::from(HttpMethod::Delete), Method::DELETE);
    assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
}

#[test]
fn test_url_joins_base_and_path() {
    let builder = RequestBuilder::new(
        reqwest::Client::new(),
        RequestConfig::new("http://localhost:8000/api/v1/"),
    );
    assert_eq!(builder.url("/health"), "http://localhost:8000/api/v1/health");
    assert_eq!(builder.url("llm/models"), "http://localhost:8000/api/v1/llm/models");
}

#[test]
fn test_built_request_carries_query_and_headers() {
    let builder = RequestBuilder::new(
        reqwest::Client::new(),
        RequestConfig::new("http://localhost:8000/api/v1")
            .with_auth(AuthMethod::Header {
                name: "x-api-key".to_string(),
                value: "key123".to_string(),
            }),
    );
    let endpoint = Endpoint::post("agent/memory/search").with_query_param("top_k", Some(3));

    let request = builder.build_request(&endpoint).unwrap().build().unwrap();

    assert_eq!(
        request.url().as_str(),
        "http://localhost:8000/api/v1/agent/memory/search?top_k=3"
    );
    assert_eq!(request.headers()["x-api-key"], "key123");
    assert_eq!(request.headers()["content-type"], "application/json");
}

#[test]
fn test_empty_base_url_is_rejected() {
    let builder = RequestBuilder::new(reqwest::Client::new(), RequestConfig::new(" "));
    let result = builder.build_request(&Endpoint::get("health"));
    assert!(matches!(result, Err(CommonRequestError::RequestBuilder(_))));
}

#[test]
fn test_multipart_form_builder() {
    let form = MultipartForm::new()
        .text("purpose", "resume")
        .file_from_bytes("file", "cv.pdf", b"%PDF-1.7".to_vec());
    let _form: reqwest::multipart::Form = form.build();

    let with_mime = MultipartForm::default().file_from_bytes_with_mime(
        "file",
        "cv.docx",
        vec![1, 2, 3],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    );
    assert!(with_mime.is_ok());

    let bad_mime = MultipartForm::default().file_from_bytes_with_mime("file", "x", vec![], "not a mime");
    assert!(bad_mime.is_err());
}
