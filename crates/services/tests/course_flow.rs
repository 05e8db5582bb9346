use async_trait::async_trait;
use course_core::model::{
    AnswerDraft, CardDraft, CardKind, Course, Deck, DeckDraft, LearnerId, Lesson, LessonId,
    LessonProjection,
};
use course_core::pagination::{
    Connection, Cursor, CursorError, CursorScope, PageRequest, PagingConfig, Position,
};
use course_core::time::fixed_clock;
use services::{
    AnswerSubmission, AppServices, ErrorKind, FocusedLesson, LessonDraft, PageSource,
    ServiceError, Traversal,
};

struct Fixture {
    services: AppServices,
    course: Course,
    decks: Vec<Deck>,
    lessons: Vec<Lesson>,
}

fn deck_draft(title: &str, cards: usize) -> DeckDraft {
    DeckDraft {
        title: title.to_owned(),
        description: String::new(),
        cards: (0..cards)
            .map(|i| CardDraft {
                title: format!("{title} question {i}"),
                explanation: String::new(),
                kind: CardKind::SingleChoice,
                possible_answers: vec![
                    AnswerDraft {
                        text: "yes".into(),
                        is_correct: true,
                    },
                    AnswerDraft {
                        text: "no".into(),
                        is_correct: false,
                    },
                ],
            })
            .collect(),
    }
}

fn lesson_draft(order: i64, deck: &Deck) -> LessonDraft {
    LessonDraft {
        order,
        title: format!("Lesson {order}"),
        description: format!("Lesson {order} description"),
        body: format!("Read this first.\n\n![deck]({})\n", deck.id()),
    }
}

async fn add_lesson(fx: &mut Fixture, order: i64) {
    let catalog = fx.services.catalog();
    let deck = catalog
        .create_deck(deck_draft(&format!("Deck {order}"), 2))
        .await
        .unwrap();
    let lesson = catalog
        .create_lesson(fx.course.id(), lesson_draft(order, &deck))
        .await
        .unwrap();
    fx.decks.push(deck);
    fx.lessons.push(lesson);
}

async fn fixture(lessons: i64) -> Fixture {
    let services = AppServices::in_memory(fixed_clock(), PagingConfig::default());
    let course = services
        .catalog()
        .create_course(1, "Rust".into(), "Ownership and borrowing".into())
        .await
        .unwrap();
    let mut fx = Fixture {
        services,
        course,
        decks: Vec::new(),
        lessons: Vec::new(),
    };
    for order in 1..=lessons {
        add_lesson(&mut fx, order).await;
    }
    fx
}

fn answers(deck: &Deck, correct: bool) -> Vec<AnswerSubmission> {
    deck.cards()
        .iter()
        .map(|card| AnswerSubmission {
            card_id: card.id,
            answer_id: card
                .possible_answers
                .iter()
                .find(|a| a.is_correct == correct)
                .map(|a| a.id)
                .unwrap(),
        })
        .collect()
}

struct FocusedSource<'a> {
    fx: &'a Fixture,
    learner: LearnerId,
    projection: LessonProjection,
}

#[async_trait]
impl PageSource for FocusedSource<'_> {
    type Node = FocusedLesson;

    async fn fetch(&self, request: PageRequest) -> Result<Connection<FocusedLesson>, ServiceError> {
        self.fx
            .services
            .lessons()
            .focused(self.learner, self.fx.course.id(), &request, self.projection)
            .await
    }
}

async fn focused_all(fx: &Fixture, learner: LearnerId) -> Vec<FocusedLesson> {
    let source = FocusedSource {
        fx,
        learner,
        projection: LessonProjection::Bodyless,
    };
    let walk = Traversal::new(2).forward(&source).await.unwrap();
    walk.ascending().cloned().collect()
}

fn current_of(page: &[FocusedLesson]) -> Vec<LessonId> {
    page.iter()
        .filter(|l| l.is_current)
        .map(|l| l.lesson.id())
        .collect()
}

#[tokio::test]
async fn five_lessons_page_two_at_a_time_both_ways() {
    let fx = fixture(5).await;
    let source = FocusedSource {
        fx: &fx,
        learner: LearnerId::generate(),
        projection: LessonProjection::Full,
    };

    let report = Traversal::new(2)
        .converge(&source, |l: &FocusedLesson| l.lesson.id())
        .await
        .unwrap();

    assert_eq!(report.forward_sizes, vec![2, 2, 1]);
    assert_eq!(report.has_next_page, vec![true, true, false]);
    assert_eq!(report.backward_sizes, vec![2, 2, 1]);
    assert_eq!(report.has_previous_page, vec![true, true, false]);
    let expected: Vec<LessonId> = fx.lessons.iter().map(Lesson::id).collect();
    assert_eq!(report.keys, expected);
}

#[tokio::test]
async fn traversal_gives_up_after_max_pages() {
    let fx = fixture(5).await;
    let source = FocusedSource {
        fx: &fx,
        learner: LearnerId::generate(),
        projection: LessonProjection::Bodyless,
    };

    let err = Traversal::new(2)
        .with_max_pages(2)
        .forward(&source)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Traversal(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);

    let walk = Traversal::new(2)
        .with_max_pages(3)
        .backward(&source)
        .await
        .unwrap();
    assert_eq!(walk.page_sizes(), vec![2, 2, 1]);
}

#[tokio::test]
async fn empty_course_yields_an_empty_page() {
    let fx = fixture(0).await;
    let page = fx
        .services
        .lessons()
        .list(fx.course.id(), &PageRequest::default(), LessonProjection::Full)
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(!page.page_info.has_next_page);
    assert!(!page.page_info.has_previous_page);
    assert!(page.page_info.start_cursor.is_none());
    assert!(page.page_info.end_cursor.is_none());
}

#[tokio::test]
async fn paging_arguments_are_validated() {
    let fx = fixture(2).await;
    let lessons = fx.services.lessons();
    let course = fx.course.id();

    let both = PageRequest {
        after: Some("a".into()),
        before: Some("b".into()),
        ..PageRequest::default()
    };
    let err = lessons.list(course, &both, LessonProjection::Full).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let zero = PageRequest::forward(0, None);
    let err = lessons.list(course, &zero, LessonProjection::Full).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let garbage = PageRequest {
        after: Some("not-a-cursor".into()),
        ..PageRequest::default()
    };
    let err = lessons.list(course, &garbage, LessonProjection::Full).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCursor);

    let other = fixture(2).await;
    let foreign = other
        .services
        .lessons()
        .list(other.course.id(), &PageRequest::forward(1, None), LessonProjection::Full)
        .await
        .unwrap()
        .page_info
        .end_cursor;
    let err = lessons
        .list(course, &PageRequest::forward(1, foreign), LessonProjection::Full)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCursor);

    // Well-formed and scoped to this course, but no lesson sits there.
    let stray = Cursor::encode(
        CursorScope::Lessons(course),
        Position::new(1, LessonId::generate().value()),
    );
    for request in [
        PageRequest::forward(1, Some(stray.clone())),
        PageRequest::backward(1, Some(stray)),
    ] {
        let err = lessons.list(course, &request, LessonProjection::Full).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidCursor(CursorError::OutOfRange)
        ));
    }
    let learner = LearnerId::generate();
    let stray = Cursor::encode(
        CursorScope::EnrolledCourses(learner),
        Position::new(1, course.value()),
    );
    let err = fx
        .services
        .enrollment()
        .enrolled_courses(learner, &PageRequest::forward(1, Some(stray)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidCursor(CursorError::OutOfRange)
    ));

    let err = lessons
        .list(
            course_core::model::CourseId::generate(),
            &PageRequest::default(),
            LessonProjection::Full,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn bodyless_page_differs_only_in_the_body() {
    let fx = fixture(3).await;
    let learner = LearnerId::generate();
    let lessons = fx.services.lessons();
    let request = PageRequest::forward(2, None);

    let full = lessons
        .focused(learner, fx.course.id(), &request, LessonProjection::Full)
        .await
        .unwrap();
    let bodyless = lessons
        .focused(learner, fx.course.id(), &request, LessonProjection::Bodyless)
        .await
        .unwrap();

    assert_eq!(full.page_info, bodyless.page_info);
    assert_eq!(full.len(), bodyless.len());
    for (a, b) in full.edges.iter().zip(&bodyless.edges) {
        assert_eq!(a.cursor, b.cursor);
        assert_eq!(a.node.is_completed, b.node.is_completed);
        assert_eq!(a.node.is_current, b.node.is_current);
        assert!(a.node.lesson.body().is_some());
        assert!(b.node.lesson.body().is_none());
        assert_eq!(
            a.node.lesson.clone().project(LessonProjection::Bodyless),
            b.node.lesson
        );
    }
}

#[tokio::test]
async fn queries_work_before_enrollment() {
    let fx = fixture(3).await;
    let learner = LearnerId::generate();

    let lessons = focused_all(&fx, learner).await;
    assert_eq!(current_of(&lessons), vec![fx.lessons[0].id()]);
    assert!(lessons.iter().all(|l| !l.is_completed));

    let state = fx
        .services
        .progress()
        .course_state(learner, fx.course.id())
        .await
        .unwrap();
    assert_eq!(state.len(), 3);
    assert!(state.values().all(|l| !l.is_completed()));
}

#[tokio::test]
async fn answering_every_card_completes_the_lesson_and_moves_current() {
    let fx = fixture(3).await;
    let learner = LearnerId::generate();
    let course = fx.course.id();
    fx.services.enrollment().enroll(learner, course).await.unwrap();

    let outcome = fx
        .services
        .progress()
        .record_answers(
            learner,
            course,
            fx.lessons[0].id(),
            fx.decks[0].id(),
            &answers(&fx.decks[0], true),
        )
        .await
        .unwrap();
    assert!(outcome.success);

    let state = fx
        .services
        .progress()
        .lesson_state(learner, course, fx.lessons[0].id())
        .await
        .unwrap();
    assert!(state.is_completed());
    let deck = &state.decks()[&fx.decks[0].id()];
    assert!(deck.is_completed());
    assert!(deck.cards().values().all(|c| c.is_completed()));

    let lessons = focused_all(&fx, learner).await;
    assert_eq!(current_of(&lessons), vec![fx.lessons[1].id()]);
    assert!(lessons[0].is_completed);
    assert!(!lessons[1].is_completed);
}

#[tokio::test]
async fn completion_is_monotonic() {
    let fx = fixture(1).await;
    let learner = LearnerId::generate();
    let course = fx.course.id();
    let (lesson, deck) = (fx.lessons[0].id(), &fx.decks[0]);
    let progress = fx.services.progress();

    let wrong = progress
        .record_answers(learner, course, lesson, deck.id(), &answers(deck, false))
        .await
        .unwrap();
    assert!(!wrong.success);
    let state = progress.lesson_state(learner, course, lesson).await.unwrap();
    assert!(!state.is_completed());

    progress
        .record_answers(learner, course, lesson, deck.id(), &answers(deck, true))
        .await
        .unwrap();
    progress
        .record_answers(learner, course, lesson, deck.id(), &answers(deck, false))
        .await
        .unwrap();

    let state = progress.lesson_state(learner, course, lesson).await.unwrap();
    assert!(state.is_completed());
    let card = &state.decks()[&deck.id()].cards()[&deck.cards()[0].id];
    assert!(card.is_completed());
    assert_eq!(card.correct_answers(), 1);
    assert_eq!(card.incorrect_answers(), 2);

    let lessons = focused_all(&fx, learner).await;
    assert_eq!(current_of(&lessons), vec![lesson]);
}

#[tokio::test]
async fn mixed_batch_reports_failure_but_keeps_correct_answers() {
    let fx = fixture(1).await;
    let learner = LearnerId::generate();
    let deck = &fx.decks[0];
    let mut batch = answers(deck, true);
    batch[1] = answers(deck, false)[1];

    let outcome = fx
        .services
        .progress()
        .record_answers(learner, fx.course.id(), fx.lessons[0].id(), deck.id(), &batch)
        .await
        .unwrap();
    assert!(!outcome.success);

    let state = fx
        .services
        .progress()
        .lesson_state(learner, fx.course.id(), fx.lessons[0].id())
        .await
        .unwrap();
    let cards = state.decks()[&deck.id()].cards();
    assert!(cards[&deck.cards()[0].id].is_completed());
    assert!(!cards[&deck.cards()[1].id].is_completed());
    assert!(!state.is_completed());
}

#[tokio::test]
async fn answers_are_validated_before_anything_is_written() {
    let fx = fixture(2).await;
    let learner = LearnerId::generate();
    let course = fx.course.id();
    let progress = fx.services.progress();

    let err = progress
        .record_answers(learner, course, fx.lessons[0].id(), fx.decks[0].id(), &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Deck exists but lesson 1 does not reference it.
    let err = progress
        .record_answers(
            learner,
            course,
            fx.lessons[0].id(),
            fx.decks[1].id(),
            &answers(&fx.decks[1], true),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut batch = answers(&fx.decks[0], true);
    batch.push(answers(&fx.decks[1], true)[0]);
    let err = progress
        .record_answers(learner, course, fx.lessons[0].id(), fx.decks[0].id(), &batch)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let other = fixture(1).await;
    let err = progress
        .record_answers(
            learner,
            course,
            other.lessons[0].id(),
            fx.decks[0].id(),
            &answers(&fx.decks[0], true),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let state = progress.course_state(learner, course).await.unwrap();
    assert!(state.values().all(|l| !l.is_completed()));
    let enrolled = fx
        .services
        .enrollment()
        .enrolled_courses(learner, &PageRequest::default())
        .await
        .unwrap();
    assert!(enrolled.is_empty());
}

#[tokio::test]
async fn enroll_is_idempotent_and_rejects_empty_courses() {
    let fx = fixture(2).await;
    let learner = LearnerId::generate();
    let enrollment = fx.services.enrollment();

    let first = enrollment.enroll(learner, fx.course.id()).await.unwrap();
    let again = enrollment.enroll(learner, fx.course.id()).await.unwrap();
    assert_eq!(first, again);
    assert_eq!(first.version, 1);
    assert_eq!(first.current_lesson_id, Some(fx.lessons[0].id()));
    assert_eq!(first.state.lessons().len(), 2);

    let empty = fixture(0).await;
    let err = empty
        .services
        .enrollment()
        .enroll(learner, empty.course.id())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn sync_tracks_new_lessons_and_is_idempotent() {
    let mut fx = fixture(2).await;
    let learner = LearnerId::generate();
    let course = fx.course.id();
    fx.services.enrollment().enroll(learner, course).await.unwrap();
    for (lesson, deck) in fx.lessons.clone().iter().zip(fx.decks.clone().iter()) {
        fx.services
            .progress()
            .record_answers(learner, course, lesson.id(), deck.id(), &answers(deck, true))
            .await
            .unwrap();
    }
    let lessons = focused_all(&fx, learner).await;
    assert_eq!(current_of(&lessons), vec![fx.lessons[1].id()]);
    assert!(lessons.iter().all(|l| l.is_completed));

    add_lesson(&mut fx, 3).await;
    let lessons = focused_all(&fx, learner).await;
    assert_eq!(current_of(&lessons), vec![fx.lessons[2].id()]);
    // The course listing agrees with the focused view before any sync.
    let enrolled = fx
        .services
        .enrollment()
        .enrolled_courses(learner, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(enrolled.edges[0].node.current_lesson_id, Some(fx.lessons[2].id()));

    let report = fx.services.enrollment().sync(learner, course).await.unwrap();
    // One lesson, one deck, two cards.
    assert_eq!(report.added, 4);
    let again = fx.services.enrollment().sync(learner, course).await.unwrap();
    assert!(again.is_noop());

    let enrolled = fx
        .services
        .enrollment()
        .enrolled_courses(learner, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(enrolled.len(), 1);
    let node = &enrolled.edges[0].node;
    assert_eq!(node.course.id(), course);
    assert_eq!(node.current_lesson_id, Some(fx.lessons[2].id()));
}

#[tokio::test]
async fn sync_without_progress_changes_nothing() {
    let fx = fixture(1).await;
    let report = fx
        .services
        .enrollment()
        .sync(LearnerId::generate(), fx.course.id())
        .await
        .unwrap();
    assert!(report.is_noop());
}

#[tokio::test]
async fn lesson_order_is_unique_and_decks_must_exist() {
    let fx = fixture(1).await;
    let catalog = fx.services.catalog();

    let err = catalog
        .create_lesson(fx.course.id(), lesson_draft(1, &fx.decks[0]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let phantom = deck_draft("Never stored", 1).into_deck().unwrap();
    let err = catalog
        .create_lesson(fx.course.id(), lesson_draft(2, &phantom))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn enrolled_courses_page_by_course_order() {
    let services = AppServices::in_memory(fixed_clock(), PagingConfig::default());
    let catalog = services.catalog();
    let learner = LearnerId::generate();
    let deck = catalog.create_deck(deck_draft("Shared", 1)).await.unwrap();

    let mut ids = Vec::new();
    for order in [3, 1, 2] {
        let course = catalog
            .create_course(order, format!("Course {order}"), "d".into())
            .await
            .unwrap();
        catalog
            .create_lesson(course.id(), lesson_draft(1, &deck))
            .await
            .unwrap();
        services.enrollment().enroll(learner, course.id()).await.unwrap();
        ids.push((order, course.id()));
    }
    ids.sort();

    let enrollment = services.enrollment();
    let first = enrollment
        .enrolled_courses(learner, &PageRequest::forward(2, None))
        .await
        .unwrap();
    let firsts: Vec<_> = first.nodes().map(|e| e.course.id()).collect();
    assert_eq!(firsts, vec![ids[0].1, ids[1].1]);
    assert!(first.page_info.has_next_page);

    let last = enrollment
        .enrolled_courses(learner, &PageRequest::backward(2, None))
        .await
        .unwrap();
    let lasts: Vec<_> = last.nodes().map(|e| e.course.id()).collect();
    assert_eq!(lasts, vec![ids[1].1, ids[2].1]);
    assert!(last.page_info.has_previous_page);
    assert!(!last.page_info.has_next_page);
}
