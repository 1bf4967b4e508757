#![allow(dead_code)]

use std::sync::Once;

use chan_core::{
    update, BoardTarget, CatalogThread, Effect, File, Fetched, ImageBoard, Msg, ObserverEvent,
    ObserverState, Post, Thread, ThreadNumber,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn target() -> BoardTarget {
    BoardTarget::new(ImageBoard::Dvach, "b")
}

pub fn file(url: &str) -> File {
    File {
        url: format!("https://2ch.hk/b/src/{url}"),
        thumbnail_url: format!("https://2ch.hk/b/thumb/{url}"),
        upload_name: "upload".to_string(),
        cdn_name: url.to_string(),
        check_sum: "d41d8cd9".to_string(),
        is_deleted: false,
        list_index: 0,
    }
}

pub fn post(number: u64, files: Vec<File>) -> Post {
    Post {
        number,
        list_index: 0,
        create_timestamp: 1_700_000_000 + number as i64,
        name: "Anon".to_string(),
        comment: format!("post {number}"),
        is_banned: false,
        is_deleted: false,
        is_op: false,
        files,
    }
}

pub fn thread(number: ThreadNumber, posts: Vec<Post>) -> Thread {
    Thread {
        number,
        board: "b".to_string(),
        image_board: ImageBoard::Dvach,
        title: format!("thread {number}"),
        posters_count: 1,
        views_count: 0,
        last_activity: 0,
        create_timestamp: 1_700_000_000,
        is_deleted: false,
        posts,
    }
}

pub fn summary(number: ThreadNumber, views: u64, last_activity: i64) -> CatalogThread {
    CatalogThread {
        number,
        create_timestamp: 1_700_000_000,
        views_count: views,
        posts_count: 1,
        last_activity,
        board: "b".to_string(),
        image_board: ImageBoard::Dvach,
        name: "Anon".to_string(),
        title: format!("thread {number}"),
        comment: String::new(),
    }
}

/// Drives a thread from discovery to tracked and returns the state.
pub fn tracked(summary: CatalogThread, fetched: Thread) -> ObserverState {
    let number = summary.number;
    let (state, _) = update(ObserverState::new(target()), Msg::CatalogFetched(vec![summary]));
    let (state, _) = update(
        state,
        Msg::ThreadFetched {
            number,
            result: Fetched::Found(fetched),
        },
    );
    state
}

pub fn fetched(state: ObserverState, fresh: Thread) -> (ObserverState, Vec<Effect>) {
    let number = fresh.number;
    update(
        state,
        Msg::ThreadFetched {
            number,
            result: Fetched::Found(fresh),
        },
    )
}

pub fn events(effects: &[Effect]) -> Vec<&ObserverEvent> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Emit(event) => Some(event),
            _ => None,
        })
        .collect()
}

pub fn channels(effects: &[Effect]) -> Vec<&'static str> {
    events(effects).into_iter().map(ObserverEvent::channel).collect()
}
