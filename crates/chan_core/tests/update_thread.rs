mod support;

use chan_core::{
    update, Anomaly, Effect, EventKind, Fetched, FileField, Lifecycle, Msg, ObserverEvent,
    ObserverState, PostField, ThreadField,
};
use pretty_assertions::assert_eq;

use support::{
    channels, events, fetched, file, init_logging, post, summary, target, thread, tracked,
};

fn not_found(state: ObserverState, number: u64) -> (ObserverState, Vec<Effect>) {
    update(
        state,
        Msg::ThreadFetched {
            number,
            result: Fetched::NotFound,
        },
    )
}

#[test]
fn vanished_before_first_fetch_reports_not_found() {
    init_logging();
    let (state, _) = update(
        ObserverState::new(target()),
        Msg::CatalogFetched(vec![summary(100, 10, 500)]),
    );

    let (state, effects) = not_found(state, 100);

    assert_eq!(channels(&effects), vec!["thread-not-found"]);
    match events(&effects)[0] {
        ObserverEvent::ThreadNotFound { summary } => assert_eq!(summary.number, 100),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(state.lifecycle(100), Some(Lifecycle::NotFoundBeforeFirstFetch));
}

#[test]
fn tracked_thread_404_is_deleted_without_post_events() {
    init_logging();
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![post(100, vec![file("1.png")]), post(101, Vec::new())]),
    );

    let (state, effects) = not_found(state, 100);

    assert_eq!(channels(&effects), vec!["thread-delete"]);
    match events(&effects)[0] {
        ObserverEvent::ThreadDelete { thread } => assert!(thread.is_deleted),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(state.lifecycle(100), Some(Lifecycle::Deleted));
    let deleted = state.entry(100).and_then(|entry| entry.thread()).expect("thread kept");
    assert!(deleted.is_deleted);
}

#[test]
fn deleted_thread_never_comes_back() {
    init_logging();
    let fresh = thread(100, vec![post(100, Vec::new())]);
    let state = tracked(summary(100, 10, 500), fresh.clone());
    let (state, _) = not_found(state, 100);

    let (state, effects) = fetched(state, fresh);

    assert_eq!(
        effects,
        vec![Effect::Anomaly(Anomaly::UnexpectedFetch {
            number: 100,
            lifecycle: Some(Lifecycle::Deleted),
        })]
    );
    assert_eq!(state.lifecycle(100), Some(Lifecycle::Deleted));
    let (state, effects) = update(state, Msg::CatalogFetched(vec![summary(100, 99, 999)]));
    assert!(effects.is_empty());
    assert_eq!(state.lifecycle(100), Some(Lifecycle::Deleted));
}

#[test]
fn posts_removed_before_added_with_file_cascade() {
    init_logging();
    let op = post(100, Vec::new());
    let state = tracked(
        summary(100, 10, 500),
        thread(
            100,
            vec![op.clone(), post(40, vec![file("40a.png"), file("40b.png")])],
        ),
    );

    let (state, effects) = fetched(
        state,
        thread(100, vec![op, post(55, vec![file("55.png")])]),
    );

    assert_eq!(
        channels(&effects),
        vec![
            "thread-modify",
            "post-delete",
            "file-delete",
            "file-delete",
            "post-create",
            "file-create",
        ]
    );
    let emitted = events(&effects);
    match emitted[0] {
        ObserverEvent::ThreadModify { diff, .. } => {
            assert_eq!(diff.fields, vec![ThreadField::Posts]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    match emitted[1] {
        ObserverEvent::PostDelete { post, .. } => {
            assert_eq!(post.number, 40);
            assert!(post.is_deleted);
            assert!(post.files.iter().all(|file| file.is_deleted));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match emitted[4] {
        ObserverEvent::PostCreate { post, .. } => assert_eq!(post.number, 55),
        other => panic!("unexpected event {other:?}"),
    }
    match emitted[5] {
        ObserverEvent::FileCreate { post, file, .. } => {
            assert_eq!(*post, 55);
            assert_eq!(file.url, support::file("55.png").url);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let thread = state.tracked_thread(100).expect("tracked");
    let numbers: Vec<u64> = thread.posts.iter().map(|post| post.number).collect();
    assert_eq!(numbers, vec![100, 40, 55]);
    let removed = thread.post(40).expect("deleted post kept");
    assert!(removed.is_deleted);
    assert!(removed.files.iter().all(|file| file.is_deleted));
}

#[test]
fn settled_deletions_do_not_repeat() {
    init_logging();
    let op = post(100, Vec::new());
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![op.clone(), post(40, vec![file("40.png")])]),
    );
    let (state, _) = fetched(state, thread(100, vec![op.clone()]));

    let (_, effects) = fetched(state, thread(100, vec![op]));

    assert!(effects.is_empty(), "{effects:?}");
}

#[test]
fn banned_flag_is_applied() {
    init_logging();
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![post(100, Vec::new()), post(101, Vec::new())]),
    );
    let mut banned = post(101, Vec::new());
    banned.is_banned = true;

    let (state, effects) = fetched(state, thread(100, vec![post(100, Vec::new()), banned]));

    assert_eq!(channels(&effects), vec!["thread-modify", "post-modify"]);
    match events(&effects)[1] {
        ObserverEvent::PostModify { post, diff, .. } => {
            assert_eq!(diff.fields, vec![PostField::IsBanned]);
            assert!(post.is_banned);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let post = state
        .tracked_thread(100)
        .and_then(|thread| thread.post(101))
        .expect("post");
    assert!(post.is_banned);
}

#[test]
fn thread_scalar_changes_are_applied_and_catalog_fields_ignored() {
    init_logging();
    let state = tracked(summary(100, 10, 500), thread(100, vec![post(100, Vec::new())]));
    let mut fresh = thread(100, vec![post(100, Vec::new())]);
    fresh.title = "renamed".to_string();
    fresh.posters_count = 7;

    let (state, effects) = fetched(state, fresh);

    assert_eq!(channels(&effects), vec!["thread-modify"]);
    match events(&effects)[0] {
        ObserverEvent::ThreadModify { thread, diff } => {
            assert_eq!(diff.fields, vec![ThreadField::Title, ThreadField::PostersCount]);
            assert_eq!(thread.views_count, 10);
            assert_eq!(thread.last_activity, 500);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let tracked = state.tracked_thread(100).expect("tracked");
    assert_eq!(tracked.title, "renamed");
    assert_eq!(tracked.posters_count, 7);
    assert_eq!(tracked.views_count, 10);
}

#[test]
fn file_changes_follow_post_modify() {
    init_logging();
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![post(100, vec![file("a.png"), file("b.png")])]),
    );
    let mut renamed = file("b.png");
    renamed.upload_name = "better".to_string();
    let fresh = thread(100, vec![post(100, vec![renamed, file("c.png")])]);

    let (state, effects) = fetched(state, fresh);

    assert_eq!(
        channels(&effects),
        vec![
            "thread-modify",
            "post-modify",
            "file-delete",
            "file-create",
            "file-modify",
        ]
    );
    match events(&effects)[4] {
        ObserverEvent::FileModify { diff, file, .. } => {
            assert_eq!(diff.fields, vec![FileField::UploadName]);
            assert_eq!(file.upload_name, "better");
        }
        other => panic!("unexpected event {other:?}"),
    }
    let post = state
        .tracked_thread(100)
        .and_then(|thread| thread.post(100))
        .expect("op");
    let urls: Vec<String> = post.files.iter().map(|file| file.url.clone()).collect();
    let expected: Vec<String> = ["a.png", "b.png", "c.png"]
        .into_iter()
        .map(|name| support::file(name).url)
        .collect();
    assert_eq!(urls, expected);
    assert!(post.files[0].is_deleted);
}

#[test]
fn resurrected_post_is_reported_and_stays_deleted() {
    init_logging();
    let op = post(100, Vec::new());
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![op.clone(), post(40, Vec::new())]),
    );
    let (state, _) = fetched(state, thread(100, vec![op.clone()]));

    let (state, effects) = fetched(state, thread(100, vec![op, post(40, Vec::new())]));

    assert!(effects.contains(&Effect::Anomaly(Anomaly::PostResurrected {
        thread: support::thread(100, Vec::new()).key(),
        post: 40,
    })));
    assert_eq!(channels(&effects), vec!["thread-modify", "post-modify"]);
    let post = state
        .tracked_thread(100)
        .and_then(|thread| thread.post(40))
        .expect("post");
    assert!(post.is_deleted);
}

#[test]
fn resurrection_is_reported_once_per_post() {
    init_logging();
    let op = post(100, Vec::new());
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![op.clone(), post(40, Vec::new())]),
    );
    let (state, _) = fetched(state, thread(100, vec![op.clone()]));
    let (state, _) = fetched(state, thread(100, vec![op.clone(), post(40, Vec::new())]));

    let (state, effects) = fetched(state, thread(100, vec![op.clone(), post(40, Vec::new())]));
    assert!(effects.is_empty());

    let mut edited = post(40, Vec::new());
    edited.comment = "edited".to_string();
    let (state, effects) = fetched(state, thread(100, vec![op, edited]));

    assert_eq!(channels(&effects), vec!["thread-modify", "post-modify"]);
    match events(&effects)[1] {
        ObserverEvent::PostModify { diff, .. } => assert_eq!(diff.fields, vec![PostField::Comment]),
        other => panic!("unexpected event {other:?}"),
    }
    let post = state
        .tracked_thread(100)
        .and_then(|thread| thread.post(40))
        .expect("post");
    assert!(post.is_deleted);
    assert_eq!(post.comment, "edited");
}

#[test]
fn resurrected_file_is_reported_once() {
    init_logging();
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![post(100, vec![file("a.png"), file("b.png")])]),
    );
    let (state, _) = fetched(state, thread(100, vec![post(100, vec![file("a.png")])]));

    let both = thread(100, vec![post(100, vec![file("a.png"), file("b.png")])]);
    let (state, effects) = fetched(state, both.clone());
    assert!(effects.contains(&Effect::Anomaly(Anomaly::FileResurrected {
        thread: both.key(),
        post: 100,
        url: file("b.png").url,
    })));
    assert_eq!(
        channels(&effects),
        vec!["thread-modify", "post-modify", "file-modify"]
    );

    let (state, effects) = fetched(state, both);
    assert!(effects.is_empty());
    let stored = state
        .tracked_thread(100)
        .and_then(|thread| thread.post(100))
        .and_then(|post| post.file(&file("b.png").url))
        .expect("file");
    assert!(stored.is_deleted);
}

#[test]
fn delete_and_not_found_exclude_post_events() {
    init_logging();
    let state = tracked(
        summary(100, 10, 500),
        thread(100, vec![post(100, vec![file("x.png")])]),
    );
    let (_, effects) = not_found(state, 100);
    assert!(events(&effects)
        .iter()
        .all(|event| event.kind().is_thread_level()));

    let (state, _) = update(
        ObserverState::new(target()),
        Msg::CatalogFetched(vec![summary(200, 1, 1)]),
    );
    let (_, effects) = not_found(state, 200);
    assert_eq!(
        events(&effects).iter().map(|e| e.kind()).collect::<Vec<_>>(),
        vec![EventKind::ThreadNotFound]
    );
}

#[test]
fn mismatched_thread_number_is_rejected() {
    init_logging();
    let state = tracked(summary(100, 10, 500), thread(100, vec![post(100, Vec::new())]));

    let (state, effects) = update(
        state,
        Msg::ThreadFetched {
            number: 100,
            result: Fetched::Found(thread(101, vec![post(101, Vec::new())])),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::Anomaly(Anomaly::NumberMismatch {
            requested: 100,
            returned: 101,
        })]
    );
    assert_eq!(state.lifecycle(100), Some(Lifecycle::Tracked));
}

#[test]
fn fetch_for_unknown_thread_is_an_anomaly() {
    init_logging();
    let (state, effects) = not_found(ObserverState::new(target()), 42);

    assert_eq!(
        effects,
        vec![Effect::Anomaly(Anomaly::UnexpectedFetch {
            number: 42,
            lifecycle: None,
        })]
    );
    assert!(state.is_empty());
}
