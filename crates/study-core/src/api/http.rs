use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::StudyApi;
use crate::error::{message_from_body, text_or, ApiError, Result};
use crate::model::{Commentary, Note, NotePayload, NoteQuery, StudyAnswer, StudyQuestion, Verse};

/// reqwest-backed client for the study API.
#[derive(Clone)]
pub struct HttpStudyApi {
    client: Client,
    base_url: String,
}

impl HttpStudyApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        failure: &str,
    ) -> Result<Vec<T>> {
        debug!(path, ?query, "GET");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        let response = ensure_success(response, |_| failure.to_string()).await?;
        let value: serde_json::Value = response.json().await?;
        list_or_empty(value)
    }
}

/// Turn a non-2xx response into `ApiError::Status`, reading the body for the message.
async fn ensure_success(
    response: Response,
    message: impl FnOnce(&str) -> String,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: message(&body),
    })
}

/// A list endpoint that answers with anything but an array yields no rows.
fn list_or_empty<T: DeserializeOwned>(value: serde_json::Value) -> Result<Vec<T>> {
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        _ => Ok(Vec::new()),
    }
}

#[async_trait]
impl StudyApi for HttpStudyApi {
    async fn books(&self) -> Result<Vec<String>> {
        self.get_list("/metadata/books", &[], "Failed to fetch books").await
    }

    async fn chapters(&self, book: &str) -> Result<Vec<u32>> {
        self.get_list(
            "/metadata/chapters",
            &[("book", book.to_string())],
            "Failed to fetch chapters",
        )
        .await
    }

    async fn verse_numbers(&self, book: &str, chapter: u32) -> Result<Vec<u32>> {
        self.get_list(
            "/metadata/verses",
            &[("book", book.to_string()), ("chapter", chapter.to_string())],
            "Failed to fetch verses",
        )
        .await
    }

    async fn verses(&self, book: &str, chapter: u32, verse: Option<u32>) -> Result<Vec<Verse>> {
        let mut query = vec![("book", book.to_string()), ("chapter", chapter.to_string())];
        if let Some(verse) = verse.filter(|v| *v > 0) {
            query.push(("verse", verse.to_string()));
        }
        self.get_list("/verses/", &query, "Failed to fetch verses").await
    }

    async fn commentary(&self, book: &str, chapter: u32) -> Result<Commentary> {
        debug!(book, chapter, "GET /commentary/");
        let response = self
            .client
            .get(self.url("/commentary/"))
            .query(&[("book", book.to_string()), ("chapter", chapter.to_string())])
            .send()
            .await?;
        let response = ensure_success(response, |_| "Failed to fetch commentary".to_string()).await?;
        let value: serde_json::Value = response.json().await?;
        Ok(Commentary::from_value(value))
    }

    async fn ask(&self, question: &StudyQuestion) -> Result<String> {
        debug!(book = %question.book, chapter = question.chapter, verse = ?question.verse, "POST /ai/study");
        let response = self
            .client
            .post(self.url("/ai/study"))
            .json(question)
            .send()
            .await?;
        let response = ensure_success(response, |body| message_from_body(body, "AI request failed")).await?;
        let answer: StudyAnswer = response.json().await?;
        Ok(answer.answer)
    }

    async fn notes(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        self.get_list("/notes/", &query.to_params(), "Failed to fetch notes").await
    }

    async fn create_note(&self, payload: &NotePayload) -> Result<Note> {
        debug!(title = %payload.title, "POST /notes/");
        let response = self
            .client
            .post(self.url("/notes/"))
            .json(payload)
            .send()
            .await?;
        let response = ensure_success(response, |body| text_or(body, "Failed to create note")).await?;
        Ok(response.json().await?)
    }

    async fn update_note(&self, id: i64, payload: &NotePayload) -> Result<Note> {
        debug!(id, "PUT /notes/{{id}}");
        let response = self
            .client
            .put(self.url(&format!("/notes/{}", id)))
            .json(payload)
            .send()
            .await?;
        let response = ensure_success(response, |body| text_or(body, "Failed to update note")).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per connection and record each request head.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_task = seen.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut request = Vec::new();
                loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    request.extend_from_slice(&buf[..n]);
                    if n == 0 || request_complete(&request) {
                        break;
                    }
                }
                seen_task.lock().unwrap().push(String::from_utf8_lossy(&request).to_string());

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), seen)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= head_end + 4 + content_length
    }

    #[tokio::test]
    async fn test_verses_sends_filter_only_when_set() {
        let (base, seen) = serve(vec![
            (200, r#"[{"verse":1,"text":"In the beginning"},{"verse":2,"text":"And the earth"}]"#),
            (200, r#"[{"verse":1,"text":"In the beginning"}]"#),
        ])
        .await;
        let api = HttpStudyApi::new(&base);

        let all = api.verses("Genesis", 1, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let one = api.verses("Genesis", 1, Some(1)).await.unwrap();
        assert_eq!(one, vec![Verse { number: 1, text: "In the beginning".into() }]);

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("GET /verses/?book=Genesis&chapter=1 "));
        assert!(seen[1].starts_with("GET /verses/?book=Genesis&chapter=1&verse=1 "));
    }

    #[tokio::test]
    async fn test_book_names_are_encoded() {
        let (base, seen) = serve(vec![(200, "[1,2,3,4,5]")]).await;
        let api = HttpStudyApi::new(&base);

        let chapters = api.chapters("1 John").await.unwrap();
        assert_eq!(chapters, vec![1, 2, 3, 4, 5]);
        assert!(seen.lock().unwrap()[0].starts_with("GET /metadata/chapters?book=1+John "));
    }

    #[tokio::test]
    async fn test_non_array_list_is_empty() {
        let (base, _) = serve(vec![(200, r#"{"books":[]}"#)]).await;
        let api = HttpStudyApi::new(&base);
        assert!(api.books().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_is_status_error() {
        let (base, _) = serve(vec![(500, "boom")]).await;
        let api = HttpStudyApi::new(&base);
        let err = api.books().await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "Failed to fetch books");
    }

    #[tokio::test]
    async fn test_commentary_shapes() {
        let (base, _) = serve(vec![
            (200, r#"[{"content":"Verse 1. In the beginning"}]"#),
            (200, r#"{"commentary":[{"commentary_id":0,"content":"fallback"}],"confidence":"moderate","mode":"semantic"}"#),
        ])
        .await;
        let api = HttpStudyApi::new(&base);

        let bare = api.commentary("Genesis", 1).await.unwrap();
        assert_eq!(bare.confidence, crate::model::Confidence::High);
        let wrapped = api.commentary("Obadiah", 1).await.unwrap();
        assert_eq!(wrapped.confidence, crate::model::Confidence::Moderate);
        assert_eq!(wrapped.sections[0].content, "fallback");
    }

    #[tokio::test]
    async fn test_ask_posts_question_and_reads_answer() {
        let (base, seen) = serve(vec![(200, r#"{"answer":"God's love for the world.","meta":{}}"#)]).await;
        let api = HttpStudyApi::new(&base);

        let answer = api
            .ask(&StudyQuestion {
                book: "John".into(),
                chapter: 3,
                verse: Some(16),
                question: "What does this mean?".into(),
            })
            .await
            .unwrap();
        assert_eq!(answer, "God's love for the world.");

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("POST /ai/study "));
        assert!(request.contains(r#""question":"What does this mean?""#));
        assert!(request.contains(r#""verse":16"#));
    }

    #[tokio::test]
    async fn test_ask_error_uses_detail() {
        let (base, _) = serve(vec![(503, r#"{"detail":"LLM unavailable: ConnectError"}"#)]).await;
        let api = HttpStudyApi::new(&base);
        let err = api
            .ask(&StudyQuestion {
                book: "John".into(),
                chapter: 3,
                verse: None,
                question: "Why?".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "LLM unavailable: ConnectError");
    }

    #[tokio::test]
    async fn test_ask_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpStudyApi::new(&format!("http://{}", addr));
        let err = api
            .ask(&StudyQuestion {
                book: "John".into(),
                chapter: 3,
                verse: Some(16),
                question: "What does this mean?".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn test_note_create_and_update_paths() {
        let note = r#"{"id":4,"title":"Born again","content":"v3","tags":null,"verse_ref":"John 3:3","created_at":null,"updated_at":null}"#;
        let (base, seen) = serve(vec![(200, note), (200, note), (400, "")]).await;
        let api = HttpStudyApi::new(&base);
        let payload = NotePayload {
            title: "Born again".into(),
            content: "v3".into(),
            tags: None,
            reference: Some("John 3:3".into()),
        };

        let created = api.create_note(&payload).await.unwrap();
        assert_eq!(created.id, Some(4));
        api.update_note(4, &payload).await.unwrap();
        let err = api.update_note(4, &payload).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to update note");

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("POST /notes/ "));
        assert!(seen[1].starts_with("PUT /notes/4 "));
    }

    #[tokio::test]
    async fn test_notes_query_string() {
        let (base, seen) = serve(vec![(200, "[]")]).await;
        let api = HttpStudyApi::new(&format!("{}/", base));
        let notes = api
            .notes(&NoteQuery {
                search: Some("grace".into()),
                reference: Some("John 3:16".into()),
                tag: None,
                limit: Some(200),
            })
            .await
            .unwrap();
        assert!(notes.is_empty());
        assert!(seen.lock().unwrap()[0]
            .starts_with("GET /notes/?search=grace&verse_ref=John+3%3A16&limit=200 "));
    }
}
