use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use course_core::model::{CourseId, DeckDraft, DeckId, LessonId, LessonProjection};
use course_core::pagination::{Connection, PageRequest};
use services::{AnswerOutcome, AnswerSubmission, LessonDraft};

use crate::error::ApiError;
use crate::extract::Learner;
use crate::schema::{
    CourseNode, CreateCourseRequest, CreateLessonRequest, DeckNode, Empty, EnrolledCourseNode,
    EnrollmentResponse, FocusedLessonNode, LessonNode, ListParams, StateResponse,
};
use crate::state::{AdminAction, AppState};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn page_request(params: &ListParams) -> PageRequest {
    PageRequest {
        after: params.after.clone(),
        before: params.before.clone(),
        first: params.first,
        last: params.last,
    }
}

//
// ─── COURSES ───────────────────────────────────────────────────────────────────
//

pub async fn create_course(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateCourseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CourseNode>), ApiError> {
    state.config.admin.check(AdminAction::CreateCourse, &headers)?;
    let Json(body) = body?;
    let course = state
        .services
        .catalog()
        .create_course(body.order, body.title, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(CourseNode::from(&course))))
}

pub async fn get_course(
    State(state): State<AppState>,
    course_id: Result<Path<CourseId>, PathRejection>,
) -> ApiResult<CourseNode> {
    let Path(course_id) = course_id?;
    let course = state.services.catalog().get_course(course_id).await?;
    Ok(Json(CourseNode::from(&course)))
}

pub async fn enrolled_courses(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Connection<EnrolledCourseNode>> {
    let Query(params) = params?;
    let page = state
        .services
        .enrollment()
        .enrolled_courses(learner_id, &page_request(&params))
        .await?;
    Ok(Json(page.map(EnrolledCourseNode::from)))
}

pub async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Learner(learner_id): Learner,
    course_id: Result<Path<CourseId>, PathRejection>,
) -> ApiResult<EnrollmentResponse> {
    state.config.admin.check(AdminAction::Enroll, &headers)?;
    let Path(course_id) = course_id?;
    let record = state
        .services
        .enrollment()
        .enroll(learner_id, course_id)
        .await?;
    Ok(Json(EnrollmentResponse::from(&record)))
}

pub async fn sync(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    course_id: Result<Path<CourseId>, PathRejection>,
) -> ApiResult<Empty> {
    let Path(course_id) = course_id?;
    state
        .services
        .enrollment()
        .sync(learner_id, course_id)
        .await?;
    Ok(Json(Empty {}))
}

pub async fn course_state(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    course_id: Result<Path<CourseId>, PathRejection>,
) -> ApiResult<StateResponse> {
    let Path(course_id) = course_id?;
    let lessons = state
        .services
        .progress()
        .course_state(learner_id, course_id)
        .await?;
    Ok(Json(StateResponse::from_lessons(
        lessons.iter().map(|(id, lesson)| (*id, lesson)),
    )))
}

//
// ─── LESSONS ───────────────────────────────────────────────────────────────────
//

pub async fn list_lessons(
    State(state): State<AppState>,
    course_id: Result<Path<CourseId>, PathRejection>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Connection<LessonNode>> {
    let Path(course_id) = course_id?;
    let Query(params) = params?;
    let page = state
        .services
        .lessons()
        .list(
            course_id,
            &page_request(&params),
            LessonProjection::from_bodyless(params.bodyless),
        )
        .await?;
    Ok(Json(page.map(LessonNode::from)))
}

pub async fn focused_lessons(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    course_id: Result<Path<CourseId>, PathRejection>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Connection<FocusedLessonNode>> {
    let Path(course_id) = course_id?;
    let Query(params) = params?;
    let page = state
        .services
        .lessons()
        .focused(
            learner_id,
            course_id,
            &page_request(&params),
            LessonProjection::from_bodyless(params.bodyless),
        )
        .await?;
    Ok(Json(page.map(FocusedLessonNode::from)))
}

pub async fn create_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    course_id: Result<Path<CourseId>, PathRejection>,
    body: Result<Json<CreateLessonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LessonNode>), ApiError> {
    state.config.admin.check(AdminAction::CreateLesson, &headers)?;
    let Path(course_id) = course_id?;
    let Json(body) = body?;
    let lesson = state
        .services
        .catalog()
        .create_lesson(
            course_id,
            LessonDraft {
                order: body.order,
                title: body.title,
                description: body.description,
                body: body.body,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(LessonNode::from(lesson))))
}

pub async fn lesson_state(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    ids: Result<Path<(CourseId, LessonId)>, PathRejection>,
) -> ApiResult<StateResponse> {
    let Path((course_id, lesson_id)) = ids?;
    let lesson = state
        .services
        .progress()
        .lesson_state(learner_id, course_id, lesson_id)
        .await?;
    Ok(Json(StateResponse::from_lessons([(lesson_id, &lesson)])))
}

pub async fn answer(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    ids: Result<Path<(CourseId, LessonId, DeckId)>, PathRejection>,
    body: Result<Json<Vec<AnswerSubmission>>, JsonRejection>,
) -> ApiResult<AnswerOutcome> {
    let Path((course_id, lesson_id, deck_id)) = ids?;
    let Json(submissions) = body?;
    let outcome = state
        .services
        .progress()
        .record_answers(learner_id, course_id, lesson_id, deck_id, &submissions)
        .await?;
    Ok(Json(outcome))
}

//
// ─── DECKS ─────────────────────────────────────────────────────────────────────
//

pub async fn create_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DeckDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<DeckNode>), ApiError> {
    state.config.admin.check(AdminAction::CreateDeck, &headers)?;
    let Json(draft) = body?;
    let deck = state.services.catalog().create_deck(draft).await?;
    Ok((StatusCode::CREATED, Json(DeckNode::from(&deck))))
}

pub async fn get_deck(
    State(state): State<AppState>,
    deck_id: Result<Path<DeckId>, PathRejection>,
) -> ApiResult<DeckNode> {
    let Path(deck_id) = deck_id?;
    let deck = state.services.catalog().get_deck(deck_id).await?;
    Ok(Json(DeckNode::from(&deck)))
}
