//! `HttpQuizApi` and `AuthService` against a local canned-response server.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};

use quiz_core::model::{
    FinalResult, Question, QuestionId, SessionHandle, SessionId, SessionStatus,
};
use quiz_core::time::fixed_now;
use services::{
    ApiError, AuthError, AuthService, ClientConfig, ErrorSeverity, HttpQuizApi, QuizApi, QuizKind,
    QuizSession, SessionError, StartConfig,
};
use storage::repository::Storage;

// ─── Mock server ───────────────────────────────────────────────────────────

#[derive(Clone)]
struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    body: String,
    delay: Duration,
}

fn route(method: &'static str, path: &'static str, status: u16, body: &str) -> Route {
    Route {
        method,
        path,
        status,
        body: body.to_owned(),
        delay: Duration::ZERO,
    }
}

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    authorization: Option<String>,
    body: String,
}

struct MockHub {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockHub {
    async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(accept_loop(
            listener,
            Arc::new(routes),
            Arc::clone(&requests),
            shutdown_rx,
        ));
        Self {
            url,
            requests,
            shutdown_tx,
            handle,
        }
    }

    fn config(&self, kind: QuizKind) -> ClientConfig {
        ClientConfig::new(&self.url, kind).unwrap()
    }

    async fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().await.clone()
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    routes: Arc<Vec<Route>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                if let Ok((stream, _)) = accepted {
                    let routes = Arc::clone(&routes);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        let _ = handle_connection(stream, routes, requests).await;
                    });
                }
            }
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<Recorded>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_owned();
    let target = request_line.next().unwrap_or_default().to_owned();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_owned()),
                _ => {}
            }
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Ok(Some(Recorded {
        method,
        target,
        authorization,
        body,
    }))
}

async fn handle_connection(
    mut stream: TcpStream,
    routes: Arc<Vec<Route>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    let path = request.target.split('?').next().unwrap_or_default().to_owned();
    let matched = routes
        .iter()
        .find(|r| r.method == request.method && r.path == path)
        .cloned();
    requests.lock().await.push(request);

    let (status, body) = match matched {
        Some(route) => {
            if !route.delay.is_zero() {
                tokio::time::sleep(route.delay).await;
            }
            (route.status, route.body)
        }
        None => (404, r#"{"detail":"Not Found"}"#.to_owned()),
    };
    let response = format!(
        "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

// ─── Fixtures ──────────────────────────────────────────────────────────────

const SESSION_JSON: &str = r#"{"id":7,"user_id":1,"started_at":"2024-03-01T10:00:00","is_completed":false}"#;

fn session() -> SessionHandle {
    SessionHandle::started(SessionId::new(7), fixed_now())
}

fn api(hub: &MockHub, kind: QuizKind) -> HttpQuizApi {
    HttpQuizApi::new(hub.config(kind))
        .unwrap()
        .with_token(Some("secret-token".into()))
}

// ─── Quiz client ───────────────────────────────────────────────────────────

#[tokio::test]
async fn start_without_token_never_hits_the_network() {
    let hub = MockHub::start(vec![route("POST", "/api/quiz/start", 200, SESSION_JSON)]).await;
    let client = HttpQuizApi::new(hub.config(QuizKind::MultipleChoice)).unwrap();

    let err = client.start(&StartConfig::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Authentication));
    assert!(hub.requests().await.is_empty());
    hub.stop().await;
}

#[tokio::test]
async fn start_sends_bearer_token_and_force_new() {
    let hub = MockHub::start(vec![route("POST", "/api/quiz/start", 200, SESSION_JSON)]).await;
    let client = api(&hub, QuizKind::MultipleChoice);

    let handle = client
        .start(&StartConfig::default().with_force_new(true))
        .await
        .unwrap();
    assert_eq!(handle.id(), SessionId::new(7));
    assert_eq!(handle.created_at().to_rfc3339(), "2024-03-01T10:00:00+00:00");

    let requests = hub.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "/api/quiz/start?force_new=true");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer secret-token")
    );
    hub.stop().await;
}

#[tokio::test]
async fn unauthorized_maps_to_authentication() {
    let hub = MockHub::start(vec![route(
        "POST",
        "/api/quiz/start",
        401,
        r#"{"detail":"Could not validate credentials"}"#,
    )])
    .await;
    let err = api(&hub, QuizKind::MultipleChoice)
        .start(&StartConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication));
    hub.stop().await;
}

#[tokio::test]
async fn server_error_surfaces_detail() {
    let hub = MockHub::start(vec![route(
        "GET",
        "/api/quiz/questions",
        500,
        r#"{"detail":"database unavailable"}"#,
    )])
    .await;
    let err = api(&hub, QuizKind::MultipleChoice)
        .fetch_questions(&session(), 5)
        .await
        .unwrap_err();
    match err {
        ApiError::Server { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "database unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    hub.stop().await;
}

#[tokio::test]
async fn multiple_choice_questions_are_fetched_with_limit() {
    let body = r#"[
        {"id":1,"question_text":"What does len([1,2]) return?","option_a":"1","option_b":"2",
         "option_c":"3","option_d":"error","explanation":null,"difficulty":"easy","category":"python"},
        {"id":2,"question_text":"Which is immutable?","option_a":"list","option_b":"dict",
         "option_c":"tuple","option_d":"set","explanation":"Tuples cannot change.","difficulty":"easy","category":"python"}
    ]"#;
    let hub = MockHub::start(vec![route("GET", "/api/quiz/questions", 200, body)]).await;
    let questions = api(&hub, QuizKind::MultipleChoice)
        .fetch_questions(&session(), 3)
        .await
        .unwrap();

    assert_eq!(questions.len(), 2);
    assert_eq!(questions[1].match_choice("C"), Some("c"));
    assert_eq!(hub.requests().await[0].target, "/api/quiz/questions?limit=3");
    hub.stop().await;
}

#[tokio::test]
async fn open_ended_questions_are_truncated_locally() {
    let body = r#"[
        {"question_id":1,"question_text":"Explain a closure.","expected_answer":"A function capturing its scope.",
         "technical_terms":["scope"],"explanation":"","difficulty":"medium","category":"python","max_score":100},
        {"question_id":2,"question_text":"Explain the GIL.","expected_answer":"A global lock.",
         "technical_terms":["lock","thread"],"explanation":"","difficulty":"hard","category":"python","max_score":100},
        {"question_id":3,"question_text":"Explain a generator.","expected_answer":"Lazy iterator.",
         "technical_terms":["yield"],"explanation":"","difficulty":"medium","category":"python","max_score":100}
    ]"#;
    let hub = MockHub::start(vec![route("GET", "/api/ai-quiz/ai-questions", 200, body)]).await;
    let questions = api(&hub, QuizKind::OpenEnded)
        .fetch_questions(&session(), 2)
        .await
        .unwrap();

    assert_eq!(questions.len(), 2);
    assert!(!questions[0].is_multiple_choice());
    hub.stop().await;
}

#[tokio::test]
async fn submit_posts_trimmed_answer_and_maps_verdict() {
    let hub = MockHub::start(vec![route(
        "POST",
        "/api/quiz/submit-answer",
        200,
        r#"{"is_correct":false,"correct_answer":"c","explanation":"Tuples are immutable."}"#,
    )])
    .await;
    let question = Question::multiple_choice(
        QuestionId::new(2),
        "Which is immutable?",
        vec![
            quiz_core::model::Choice::new("a", "list"),
            quiz_core::model::Choice::new("c", "tuple"),
        ],
        1,
    )
    .unwrap();

    let result = api(&hub, QuizKind::MultipleChoice)
        .submit_answer(&session(), &question, "  a ")
        .await
        .unwrap();
    assert_eq!(result.is_correct(), Some(false));
    assert_eq!(result.score(), 0.0);
    assert_eq!(result.explanation(), Some("Tuples are immutable."));

    let requests = hub.requests().await;
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"session_id": 7, "question_id": 2, "user_answer": "a"})
    );
    hub.stop().await;
}

#[tokio::test]
async fn complete_twice_is_already_completed() {
    let hub = MockHub::start(vec![route(
        "POST",
        "/api/quiz/complete/7",
        404,
        r#"{"detail":"Session not found or already completed"}"#,
    )])
    .await;
    let result = api(&hub, QuizKind::MultipleChoice)
        .complete(&session())
        .await
        .unwrap();
    assert_eq!(result, FinalResult::AlreadyCompleted);
    hub.stop().await;
}

#[tokio::test]
async fn open_ended_complete_uses_query_parameter() {
    let hub = MockHub::start(vec![route(
        "POST",
        "/api/ai-quiz/complete",
        200,
        r#"{"session_id":7,"total_score":150.0,"total_questions":2,"average_percentage":75.0,"answers":[]}"#,
    )])
    .await;
    let result = api(&hub, QuizKind::OpenEnded)
        .complete(&session())
        .await
        .unwrap();
    let summary = result.summary().unwrap();
    assert_eq!(summary.total_questions, 2);
    assert!((summary.percentage - 75.0).abs() < f64::EPSILON);
    assert_eq!(
        hub.requests().await[0].target,
        "/api/ai-quiz/complete?session_id=7"
    );
    hub.stop().await;
}

#[tokio::test]
async fn missing_active_session_is_none() {
    let hub = MockHub::start(vec![route(
        "GET",
        "/api/quiz/sessions/active",
        404,
        r#"{"detail":"No active quiz session found"}"#,
    )])
    .await;
    let active = api(&hub, QuizKind::MultipleChoice)
        .active_session()
        .await
        .unwrap();
    assert!(active.is_none());
    hub.stop().await;
}

#[tokio::test]
async fn unfinished_session_is_reported_as_active() {
    let hub = MockHub::start(vec![route(
        "GET",
        "/api/quiz/sessions/active",
        200,
        SESSION_JSON,
    )])
    .await;
    let active = api(&hub, QuizKind::MultipleChoice)
        .active_session()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id(), SessionId::new(7));
    assert_eq!(active.status(), SessionStatus::InProgress);
    hub.stop().await;
}

#[tokio::test]
async fn answer_already_on_record_is_rejected_and_a_fresh_start_recovers() {
    let questions = r#"[
        {"id":1,"question_text":"Which is immutable?","option_a":"list","option_b":"dict",
         "option_c":"tuple","option_d":"set","explanation":null,"difficulty":"easy","category":"python"}
    ]"#;
    let hub = MockHub::start(vec![
        route("POST", "/api/quiz/start", 200, SESSION_JSON),
        route("GET", "/api/quiz/questions", 200, questions),
        route(
            "POST",
            "/api/quiz/submit-answer",
            400,
            r#"{"detail":"Answer already submitted for this question"}"#,
        ),
    ])
    .await;
    let mut session = QuizSession::new(Arc::new(api(&hub, QuizKind::MultipleChoice)));
    session.start(&StartConfig::default()).await.unwrap();

    let err = session.submit_answer("c").await.unwrap_err();
    assert!(matches!(
        &err,
        SessionError::Api(ApiError::Server { status: 400, detail })
            if detail == "Answer already submitted for this question"
    ));
    assert_eq!(err.severity(), ErrorSeverity::Rejected);
    assert_eq!(session.status(), SessionStatus::InProgress);
    assert!(session.results().is_empty());
    assert!(!session.is_submitting());

    session.abandon().unwrap();
    session
        .start(&StartConfig::default().with_force_new(true))
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::InProgress);

    let starts: Vec<String> = hub
        .requests()
        .await
        .into_iter()
        .filter(|r| r.target.starts_with("/api/quiz/start"))
        .map(|r| r.target)
        .collect();
    assert_eq!(starts, ["/api/quiz/start", "/api/quiz/start?force_new=true"]);
    hub.stop().await;
}

#[tokio::test]
async fn slow_server_times_out_as_network_error() {
    let mut slow = route("POST", "/api/quiz/start", 200, SESSION_JSON);
    slow.delay = Duration::from_millis(800);
    let hub = MockHub::start(vec![slow]).await;
    let client = HttpQuizApi::new(
        hub.config(QuizKind::MultipleChoice)
            .with_timeout(Duration::from_millis(100)),
    )
    .unwrap()
    .with_token(Some("secret-token".into()));

    let err = client.start(&StartConfig::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    hub.stop().await;
}

// ─── Auth ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_stores_token_for_quiz_client() {
    let hub = MockHub::start(vec![route(
        "POST",
        "/api/auth/token",
        200,
        r#"{"access_token":"fresh-token","token_type":"bearer"}"#,
    )])
    .await;
    let storage = Storage::in_memory();
    let auth = AuthService::new(
        hub.config(QuizKind::MultipleChoice),
        Arc::clone(&storage.credentials),
    )
    .unwrap();

    let token = auth.login("ada", "hunter2").await.unwrap();
    assert_eq!(token, "fresh-token");
    assert_eq!(
        storage.credentials.load_token().await.unwrap().as_deref(),
        Some("fresh-token")
    );
    assert!(auth.quiz_client().await.unwrap().has_token());

    let requests = hub.requests().await;
    assert_eq!(requests[0].body, "username=ada&password=hunter2");

    auth.logout().await.unwrap();
    assert!(auth.stored_token().await.unwrap().is_none());
    hub.stop().await;
}

#[tokio::test]
async fn rejected_login_is_invalid_credentials() {
    let hub = MockHub::start(vec![route(
        "POST",
        "/api/auth/token",
        401,
        r#"{"detail":"Incorrect username or password"}"#,
    )])
    .await;
    let storage = Storage::in_memory();
    let auth = AuthService::new(
        hub.config(QuizKind::MultipleChoice),
        Arc::clone(&storage.credentials),
    )
    .unwrap();

    assert!(matches!(
        auth.login("ada", "wrong").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        auth.login("  ", "pw").await,
        Err(AuthError::Validation(_))
    ));
    assert_eq!(hub.requests().await.len(), 1);
    assert!(storage.credentials.load_token().await.unwrap().is_none());
    hub.stop().await;
}
