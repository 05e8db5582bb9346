//! End-to-end check of a running server over HTTP.
//!
//! Authors a course, enrolls a learner, walks the focused listing both ways
//! and completes every lesson, asserting the observable contract at each
//! step.

use anyhow::{Context, anyhow, bail, ensure};
use api::schema::{
    CourseNode, DeckNode, EnrolledCourseNode, EnrollmentResponse, FocusedLessonNode, LessonNode,
    StateResponse,
};
use async_trait::async_trait;
use course_core::model::{AnswerDraft, CardDraft, CardKind, CourseId, DeckDraft, LearnerId, LessonId};
use course_core::pagination::{Connection, Cursor, CursorScope, PageRequest, Position};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use services::{AnswerOutcome, AnswerSubmission, PageSource, ServiceError, Traversal, Walk};
use tracing::{debug, info};

use crate::cli::ConformanceArgs;

const CARDS_PER_DECK: usize = 4;
const ANSWERS_PER_CARD: usize = 4;

struct Client {
    http: reqwest::Client,
    base_url: String,
    learner: LearnerId,
    learner_header: String,
    admin: Option<(String, String)>,
}

impl Client {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header(self.learner_header.as_str(), self.learner.to_string());
        if let Some((header, secret)) = &self.admin {
            req = req.header(header.as_str(), secret.as_str());
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> anyhow::Result<T> {
        let resp = req.send().await.with_context(|| format!("{what}: request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{what}: {status} {body}");
        }
        debug!(%status, what, "ok");
        resp.json().await.with_context(|| format!("{what}: unexpected body"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.send(self.request(Method::GET, path), path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        self.send(self.request(Method::POST, path).json(body), path).await
    }

    async fn status_of(&self, path: &str) -> anyhow::Result<StatusCode> {
        let resp = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("{path}: request failed"))?;
        Ok(resp.status())
    }

    async fn page<N: DeserializeOwned>(
        &self,
        path: &str,
        request: &PageRequest,
        bodyless: bool,
    ) -> anyhow::Result<Connection<N>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(after) = &request.after {
            query.push(("after", after.clone()));
        }
        if let Some(before) = &request.before {
            query.push(("before", before.clone()));
        }
        if let Some(first) = request.first {
            query.push(("first", first.to_string()));
        }
        if let Some(last) = request.last {
            query.push(("last", last.to_string()));
        }
        if bodyless {
            query.push(("bodyless", "true".to_owned()));
        }
        self.send(self.request(Method::GET, path).query(&query), path)
            .await
    }
}

/// The focused lesson listing of one course, fetched over HTTP.
struct FocusedSource<'a> {
    client: &'a Client,
    course_id: CourseId,
    bodyless: bool,
}

#[async_trait]
impl PageSource for FocusedSource<'_> {
    type Node = FocusedLessonNode;

    async fn fetch(&self, request: PageRequest) -> Result<Connection<Self::Node>, ServiceError> {
        let path = format!("/courses/{}/lessons/focused", self.course_id);
        self.client
            .page(&path, &request, self.bodyless)
            .await
            .map_err(|err| ServiceError::Traversal(format!("{err:#}")))
    }
}

struct EnrolledSource<'a> {
    client: &'a Client,
}

#[async_trait]
impl PageSource for EnrolledSource<'_> {
    type Node = EnrolledCourseNode;

    async fn fetch(&self, request: PageRequest) -> Result<Connection<Self::Node>, ServiceError> {
        self.client
            .page("/courses/enrolled", &request, false)
            .await
            .map_err(|err| ServiceError::Traversal(format!("{err:#}")))
    }
}

fn deck_draft(title: &str) -> DeckDraft {
    DeckDraft {
        title: title.to_owned(),
        description: format!("{title} description"),
        cards: (0..CARDS_PER_DECK)
            .map(|ci| CardDraft {
                title: format!("card-{ci}"),
                explanation: format!("explanation-{ci}"),
                kind: CardKind::SingleChoice,
                possible_answers: (0..ANSWERS_PER_CARD)
                    .map(|ai| AnswerDraft {
                        text: format!("answer-{ci}-{ai}"),
                        is_correct: ai == 0,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn correct_answers(deck: &DeckNode) -> anyhow::Result<Vec<AnswerSubmission>> {
    deck.cards
        .iter()
        .map(|card| {
            card.possible_answers
                .iter()
                .find(|a| a.is_correct)
                .map(|a| AnswerSubmission {
                    card_id: card.id,
                    answer_id: a.id,
                })
                .ok_or_else(|| anyhow!("card {} has no correct answer", card.id))
        })
        .collect()
}

fn current_of(nodes: &[FocusedLessonNode]) -> anyhow::Result<LessonId> {
    let mut current = nodes.iter().filter(|n| n.is_current);
    let first = current.next().ok_or_else(|| anyhow!("no lesson is current"))?;
    ensure!(current.next().is_none(), "more than one lesson is current");
    Ok(first.lesson.id)
}

/// The bodyless walk must page exactly like the full one: same cursors and
/// page info, and nodes that differ only in the missing body.
fn check_bodyless(
    full: &Walk<FocusedLessonNode>,
    trimmed: &Walk<FocusedLessonNode>,
) -> anyhow::Result<()> {
    ensure!(
        full.page_sizes() == trimmed.page_sizes(),
        "bodyless listing changed the page sizes"
    );
    for (i, (with, without)) in full.pages.iter().zip(&trimmed.pages).enumerate() {
        ensure!(
            with.page_info == without.page_info,
            "bodyless page {i} has different page info"
        );
        for (a, b) in with.edges.iter().zip(&without.edges) {
            ensure!(a.cursor == b.cursor, "bodyless cursor differs on page {i}");
            ensure!(a.node.lesson.body.is_some(), "lesson {} has no body", a.node.lesson.id);
            ensure!(b.node.lesson.body.is_none(), "bodyless lesson {} has a body", b.node.lesson.id);
            let mut stripped = a.node.clone();
            stripped.lesson.body = None;
            ensure!(
                stripped == b.node,
                "bodyless lesson {} differs beyond its body",
                a.node.lesson.id
            );
        }
    }
    Ok(())
}

pub async fn run(args: ConformanceArgs) -> anyhow::Result<()> {
    ensure!(args.lessons > 0, "--lessons must be positive");
    let learner = match &args.learner {
        Some(raw) => raw.parse().context("invalid --learner")?,
        None => LearnerId::generate(),
    };
    let admin = match (args.admin_header, args.admin_secret) {
        (Some(h), Some(s)) => Some((h, s)),
        (None, None) => None,
        _ => bail!("--admin-header and --admin-secret must be set together"),
    };
    let client = Client {
        http: reqwest::Client::new(),
        base_url: args.base_url.trim_end_matches('/').to_owned(),
        learner,
        learner_header: args.learner_header,
        admin,
    };
    info!(base_url = %client.base_url, %learner, "starting conformance run");

    // Authoring.
    let course: CourseNode = client
        .post(
            "/courses",
            &json!({ "order": 0, "title": "Conformance", "description": "end-to-end run" }),
        )
        .await?;
    let mut lessons = Vec::new();
    for i in 0..args.lessons {
        let deck: DeckNode = client.post("/decks", &deck_draft(&format!("deck-{i}"))).await?;
        let lesson: LessonNode = client
            .post(
                &format!("/courses/{}/lessons", course.id),
                &json!({
                    "order": i,
                    "title": format!("lesson-{i}"),
                    "description": format!("desc lesson-{i}"),
                    "body": format!("Lesson {i} with deck ![deck]({})", deck.id),
                }),
            )
            .await?;
        ensure!(lesson.deck_ids == vec![deck.id], "lesson {i} lost its deck reference");
        lessons.push(lesson);
    }
    info!(course = %course.id, lessons = lessons.len(), "course authored");

    let enrollment: EnrollmentResponse = client
        .post(&format!("/courses/{}/enroll", course.id), &json!({}))
        .await?;
    ensure!(
        enrollment.current_lesson_id == Some(lessons[0].id),
        "enrollment did not start at the first lesson"
    );

    // Traversal.
    let focused = FocusedSource {
        client: &client,
        course_id: course.id,
        bodyless: false,
    };
    let max_pages = usize::try_from(i64::from(args.lessons) / args.page_size.max(1) + 1)
        .context("--lessons is too large for the page size")?;
    let traversal = Traversal::new(args.page_size).with_max_pages(max_pages);
    let report = traversal.converge(&focused, |n| n.lesson.id).await?;
    let expected: Vec<LessonId> = lessons.iter().map(|l| l.id).collect();
    ensure!(report.keys == expected, "walks disagree with the authored lesson order");
    info!(
        forward = ?report.forward_sizes,
        backward = ?report.backward_sizes,
        "traversal converged"
    );

    // Bodyless projection.
    let full = traversal.forward(&focused).await?;
    let bodyless = FocusedSource {
        bodyless: true,
        ..focused
    };
    check_bodyless(&full, &traversal.forward(&bodyless).await?)?;

    // Progress.
    for (i, lesson) in lessons.iter().enumerate() {
        for deck_id in &lesson.deck_ids {
            let deck: DeckNode = client.get(&format!("/decks/{deck_id}")).await?;
            let outcome: AnswerOutcome = client
                .post(
                    &format!(
                        "/courses/{}/lessons/{}/decks/{deck_id}/answer",
                        course.id, lesson.id
                    ),
                    &correct_answers(&deck)?,
                )
                .await?;
            ensure!(outcome.success, "correct answers for deck {deck_id} were not accepted");
        }

        let state: StateResponse = client
            .get(&format!("/courses/{}/lessons/{}/state", course.id, lesson.id))
            .await?;
        let lesson_state = state
            .lesson_state
            .get(&lesson.id)
            .ok_or_else(|| anyhow!("state of lesson {} is missing", lesson.id))?;
        ensure!(lesson_state.is_completed, "lesson {} is not completed", lesson.id);

        let nodes: Vec<FocusedLessonNode> =
            traversal.forward(&focused).await?.ascending().cloned().collect();
        let expected_current = lessons.get(i + 1).unwrap_or(lesson).id;
        ensure!(
            current_of(&nodes)? == expected_current,
            "current lesson did not advance past lesson {i}"
        );
        ensure!(
            nodes.iter().take(i + 1).all(|n| n.is_completed),
            "a finished lesson is not marked completed"
        );
        debug!(lesson = %lesson.id, "lesson completed");
    }

    let _: serde_json::Value = client
        .post(&format!("/courses/{}/sync", course.id), &json!({}))
        .await?;

    // Enrolled courses.
    let enrolled = Traversal::new(args.page_size)
        .converge(&EnrolledSource { client: &client }, |n| n.course.id)
        .await?;
    ensure!(
        enrolled.keys.contains(&course.id),
        "course {} is missing from the enrolled listing",
        course.id
    );

    // Error contract.
    let missing = client.status_of(&format!("/courses/{}", CourseId::generate())).await?;
    ensure!(missing == StatusCode::NOT_FOUND, "unknown course answered {missing}");
    let bad = client
        .status_of(&format!("/courses/{}/lessons?first=1&last=1", course.id))
        .await?;
    ensure!(bad == StatusCode::BAD_REQUEST, "mixed page arguments answered {bad}");
    let stray = Cursor::encode(
        CursorScope::Lessons(course.id),
        Position::new(0, LessonId::generate().value()),
    );
    let gone = client
        .status_of(&format!("/courses/{}/lessons?after={stray}", course.id))
        .await?;
    ensure!(gone == StatusCode::NOT_FOUND, "cursor for a missing lesson answered {gone}");

    info!(course = %course.id, "conformance run passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drafted_decks_have_one_correct_answer_per_card() {
        let draft = deck_draft("d");
        assert_eq!(draft.cards.len(), CARDS_PER_DECK);
        for card in &draft.cards {
            assert_eq!(card.possible_answers.iter().filter(|a| a.is_correct).count(), 1);
        }
    }

    #[test]
    fn current_lesson_must_be_unique() {
        let node = |current: bool| -> FocusedLessonNode {
            serde_json::from_value(json!({
                "id": LessonId::generate(),
                "course_id": CourseId::generate(),
                "order": 0,
                "title": "t",
                "description": "d",
                "deck_ids": [],
                "created_at": "2024-01-01T00:00:00Z",
                "is_completed": false,
                "is_current": current,
            }))
            .unwrap()
        };
        assert!(current_of(&[node(false), node(false)]).is_err());
        assert!(current_of(&[node(true), node(true)]).is_err());
        assert!(current_of(&[node(false), node(true)]).is_ok());
    }

    #[test]
    fn bodyless_walk_must_match_cursors_and_page_info() {
        use course_core::pagination::{Direction, Edge, PageInfo};

        let course_id = CourseId::generate();
        let lesson = |id: LessonId, body: Option<&str>| -> FocusedLessonNode {
            serde_json::from_value(json!({
                "id": id,
                "course_id": course_id,
                "order": 0,
                "title": "t",
                "description": "d",
                "body": body,
                "deck_ids": [],
                "created_at": "2024-01-01T00:00:00Z",
                "is_completed": false,
                "is_current": true,
            }))
            .unwrap()
        };
        let id = LessonId::generate();
        let cursor = Cursor::encode(CursorScope::Lessons(course_id), Position::new(0, id.value()));
        let walk = |node: FocusedLessonNode, cursor: Cursor, has_next_page: bool| Walk {
            direction: Direction::Forward,
            pages: vec![Connection {
                edges: vec![Edge {
                    cursor: cursor.clone(),
                    node,
                }],
                page_info: PageInfo {
                    has_next_page,
                    has_previous_page: false,
                    start_cursor: Some(cursor.clone()),
                    end_cursor: Some(cursor),
                },
            }],
        };

        let full = walk(lesson(id, Some("body")), cursor.clone(), false);
        assert!(check_bodyless(&full, &walk(lesson(id, None), cursor.clone(), false)).is_ok());
        assert!(check_bodyless(&full, &walk(lesson(id, Some("body")), cursor.clone(), false)).is_err());
        assert!(check_bodyless(&full, &walk(lesson(id, None), cursor.clone(), true)).is_err());

        let elsewhere =
            Cursor::encode(CursorScope::Lessons(course_id), Position::new(1, id.value()));
        assert!(check_bodyless(&full, &walk(lesson(id, None), elsewhere, false)).is_err());
    }
}
