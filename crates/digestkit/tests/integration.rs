//! Integration tests for DigestKit backends and batch jobs using wiremock

use digestkit::{
    jobs, AnthropicBackend, BackendError, BatchDriver, OpenAiBackend, PipelineError,
    StagedConverter,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn anthropic_message(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn"
    })
}

fn openai_converter(server: &MockServer) -> StagedConverter {
    StagedConverter::new(Box::new(
        OpenAiBackend::new("sk-test", &server.uri()).unwrap(),
    ))
}

#[tokio::test]
async fn test_openai_summary_uses_json_mode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("sk-test"))
        .and(body_partial_json(json!({
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(
            r##"{"fileNamePrefix":"com-recomendacao","result":"# TAEE11\nCompra"}"##,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let converter = openai_converter(&mock_server);
    let summary = converter
        .summarize_report("relatorio.html", "<p>Compra TAEE11</p>")
        .await
        .unwrap();

    assert_eq!(summary.classification().as_str(), "com-recomendacao");
    assert_eq!(summary.result, "# TAEE11\nCompra");
}

#[tokio::test]
async fn test_openai_spreadsheet_strips_fence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("```csv\nAtivo;Qtd\nTAEE11;10\n```")),
        )
        .mount(&mock_server)
        .await;

    let converter = openai_converter(&mock_server);
    let csv = converter
        .convert_spreadsheet("carteira.htm", "<table></table>")
        .await
        .unwrap();

    assert_eq!(csv, "Ativo;Qtd\nTAEE11;10");
}

#[tokio::test]
async fn test_anthropic_recovers_json_from_chatty_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_message(
            "Claro! Segue o resumo:\n{\"fileNamePrefix\":\"sem-recomendacao\",\"result\":\"Sem mudanças\"}\nAbraços",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let converter = StagedConverter::new(Box::new(
        AnthropicBackend::new("sk-ant", &mock_server.uri()).unwrap(),
    ));
    let summary = converter
        .summarize_report("relatorio.html", "<p>...</p>")
        .await
        .unwrap();

    assert_eq!(summary.classification().as_str(), "sem-recomendacao");
    assert_eq!(summary.result, "Sem mudanças");
}

#[tokio::test]
async fn test_summary_without_json_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion("Não consegui resumir.")),
        )
        .mount(&mock_server)
        .await;

    let converter = openai_converter(&mock_server);
    let err = converter
        .summarize_report("relatorio.html", "<p></p>")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MalformedResponse(_)));
    assert!(err.to_string().contains("Não consegui resumir."));
}

#[tokio::test]
async fn test_rate_limit_is_http_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&mock_server)
        .await;

    let converter = openai_converter(&mock_server);
    let err = converter
        .extract_tables("carteira.html", "<table></table>")
        .await
        .unwrap_err();

    match err {
        PipelineError::Backend(BackendError::HttpStatus { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_process_reports_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(
            r##"{"fileNamePrefix":"com-recomendacao","result":"# Novo relatório"}"##,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tmp = TempDir::new().unwrap();
    let html_dir = tmp.path().join("relatorios");
    let md_dir = tmp.path().join("resumos");
    std::fs::create_dir_all(&html_dir).unwrap();
    std::fs::create_dir_all(&md_dir).unwrap();
    std::fs::write(html_dir.join("fii-antigo.html"), "<p>antigo</p>").unwrap();
    std::fs::write(html_dir.join("fii-novo.html"), "<p>novo</p>").unwrap();
    std::fs::write(md_dir.join("sem-recomendacao-fii-antigo.md"), "# Antigo").unwrap();

    let converter = openai_converter(&mock_server);
    let report = jobs::process_reports(&BatchDriver::new(), &converter, &html_dir, &md_dir)
        .await
        .unwrap();

    assert_eq!(report.processed(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);

    let mut names: Vec<String> = std::fs::read_dir(&md_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["com-recomendacao-fii-novo.md", "sem-recomendacao-fii-antigo.md"]
    );
    assert_eq!(
        std::fs::read_to_string(md_dir.join("com-recomendacao-fii-novo.md")).unwrap(),
        "# Novo relatório"
    );
}

#[tokio::test]
async fn test_process_reports_isolates_backend_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("a.html"), "a").unwrap();
    std::fs::write(tmp.path().join("b.html"), "b").unwrap();
    let md_dir = tmp.path().join("resumos");

    let converter = openai_converter(&mock_server);
    let report = jobs::process_reports(&BatchDriver::new(), &converter, tmp.path(), &md_dir)
        .await
        .unwrap();

    assert_eq!(report.failed(), 2);
    assert_eq!(report.processed(), 0);
}
