use std::collections::btree_map::Entry;
use std::collections::BTreeSet;

use crate::diff::{
    diff_threads, FileArraysDiff, FileField, PostArraysDiff, PostField, ThreadField, ThreadsDiff,
};
use crate::state::Resurrection;
use crate::{
    Anomaly, CatalogThread, Effect, FetchReason, Fetched, Msg, ObserverEvent, ObserverState, Post,
    Thread, ThreadEntry, ThreadKey, ThreadNumber,
};

/// Pure update function: applies a message to state and returns the effects to run, in order.
pub fn update(mut state: ObserverState, msg: Msg) -> (ObserverState, Vec<Effect>) {
    let effects = match msg {
        Msg::RestoreTracked(threads) => restore(&mut state, threads),
        Msg::CatalogFetched(summaries) => observe_catalog(&mut state, summaries),
        Msg::ThreadFetched { number, result } => observe_thread(&mut state, number, result),
    };
    (state, effects)
}

fn restore(state: &mut ObserverState, threads: Vec<Thread>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for thread in threads {
        if thread.target() != *state.target() {
            effects.push(Effect::Anomaly(Anomaly::ForeignThread {
                thread: thread.key(),
            }));
            continue;
        }
        if !state.is_observed(thread.number) {
            continue;
        }
        let entry = if thread.is_deleted {
            ThreadEntry::Deleted(thread)
        } else {
            ThreadEntry::Tracked(thread)
        };
        state.threads.entry(entry.number()).or_insert(entry);
    }
    effects
}

fn observe_catalog(state: &mut ObserverState, summaries: Vec<CatalogThread>) -> Vec<Effect> {
    let mut effects = Vec::new();
    let mut listed = BTreeSet::new();

    for summary in summaries {
        let number = summary.number;
        if !state.is_observed(number) || !listed.insert(number) {
            continue;
        }
        match state.threads.entry(number) {
            Entry::Vacant(slot) => {
                slot.insert(ThreadEntry::Discovered(summary));
                effects.push(Effect::FetchThread {
                    number,
                    reason: FetchReason::Discovered,
                });
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                ThreadEntry::Discovered(known) => {
                    *known = summary;
                    effects.push(Effect::FetchThread {
                        number,
                        reason: FetchReason::Discovered,
                    });
                }
                ThreadEntry::Tracked(thread) => catalog_activity(thread, &summary, &mut effects),
                ThreadEntry::Deleted(_) | ThreadEntry::NotFoundBeforeFirstFetch(_) => {}
            },
        }
    }

    for (number, entry) in &state.threads {
        if matches!(entry, ThreadEntry::Tracked(_)) && !listed.contains(number) {
            effects.push(Effect::FetchThread {
                number: *number,
                reason: FetchReason::MissingFromCatalog,
            });
        }
    }

    // An unlisted discovery is forgotten and rediscovered later; terminal
    // numbers stay so they are never observed again.
    state.threads.retain(|number, entry| {
        !matches!(entry, ThreadEntry::Discovered(_)) || listed.contains(number)
    });

    effects
}

fn catalog_activity(thread: &mut Thread, summary: &CatalogThread, effects: &mut Vec<Effect>) {
    let mut fields = Vec::new();
    if thread.views_count != summary.views_count {
        fields.push(ThreadField::ViewsCount);
    }
    if thread.last_activity != summary.last_activity {
        fields.push(ThreadField::LastActivity);
    }
    if fields.is_empty() {
        return;
    }

    let old = thread.clone();
    thread.views_count = summary.views_count;
    thread.last_activity = summary.last_activity;
    let refetch = fields.contains(&ThreadField::LastActivity);

    effects.push(Effect::Emit(ObserverEvent::ThreadModify {
        thread: thread.clone(),
        diff: ThreadsDiff {
            old,
            new: thread.clone(),
            fields,
            posts_diff: None,
        },
    }));
    if refetch {
        effects.push(Effect::FetchThread {
            number: thread.number,
            reason: FetchReason::Activity,
        });
    }
}

fn observe_thread(
    state: &mut ObserverState,
    number: ThreadNumber,
    result: Fetched<Thread>,
) -> Vec<Effect> {
    let Some(entry) = state.threads.remove(&number) else {
        return vec![Effect::Anomaly(Anomaly::UnexpectedFetch {
            number,
            lifecycle: None,
        })];
    };

    if let Fetched::Found(fresh) = &result {
        if fresh.number != number {
            state.threads.insert(number, entry);
            return vec![Effect::Anomaly(Anomaly::NumberMismatch {
                requested: number,
                returned: fresh.number,
            })];
        }
    }

    let mut effects = Vec::new();
    let next = match (entry, result) {
        (ThreadEntry::Discovered(summary), Fetched::NotFound) => {
            effects.push(Effect::Emit(ObserverEvent::ThreadNotFound {
                summary: summary.clone(),
            }));
            ThreadEntry::NotFoundBeforeFirstFetch(summary)
        }
        (ThreadEntry::Discovered(summary), Fetched::Found(mut thread)) => {
            // The single-thread endpoints do not report these.
            thread.views_count = summary.views_count;
            thread.last_activity = summary.last_activity;
            effects.push(Effect::Emit(ObserverEvent::ThreadCreate {
                thread: thread.clone(),
            }));
            ThreadEntry::Tracked(thread)
        }
        (ThreadEntry::Tracked(mut thread), Fetched::NotFound) => {
            thread.is_deleted = true;
            effects.push(Effect::Emit(ObserverEvent::ThreadDelete {
                thread: thread.clone(),
            }));
            ThreadEntry::Deleted(thread)
        }
        (ThreadEntry::Tracked(mut thread), Fetched::Found(fresh)) => {
            apply_thread_diff(&mut thread, &fresh, &mut state.resurrections, &mut effects);
            ThreadEntry::Tracked(thread)
        }
        (terminal, _) => {
            effects.push(Effect::Anomaly(Anomaly::UnexpectedFetch {
                number,
                lifecycle: Some(terminal.lifecycle()),
            }));
            terminal
        }
    };
    state.threads.insert(number, next);
    effects
}

fn apply_thread_diff(
    thread: &mut Thread,
    fresh: &Thread,
    reported: &mut BTreeSet<Resurrection>,
    effects: &mut Vec<Effect>,
) {
    let mut diff = diff_threads(thread, fresh, &ThreadField::CATALOG_OWNED);
    settle_deletions(&mut diff, reported);
    if diff.is_empty() {
        return;
    }
    for field in &diff.fields {
        field.apply(thread, fresh);
    }
    let posts_diff = diff.posts_diff.clone();
    effects.push(Effect::Emit(ObserverEvent::ThreadModify {
        thread: thread.clone(),
        diff,
    }));
    if let Some(posts_diff) = posts_diff {
        apply_posts_diff(thread, &posts_diff, reported, effects);
    }
}

/// Deleted posts and files stay in the working set but never come back from
/// upstream, so their absence is not a change. A resurrection already reported
/// is not a change either.
fn settle_deletions(diff: &mut ThreadsDiff, reported: &BTreeSet<Resurrection>) {
    let thread = diff.old.number;
    let Some(posts_diff) = diff.posts_diff.as_mut() else {
        return;
    };
    posts_diff.only_in_old.retain(|post| !post.is_deleted);
    for post_diff in &mut posts_diff.differences {
        let post = post_diff.old.number;
        if reported.contains(&Resurrection::Post { thread, post }) {
            post_diff.fields.retain(|field| *field != PostField::IsDeleted);
        }
        let Some(files_diff) = post_diff.files_diff.as_mut() else {
            continue;
        };
        files_diff.only_in_old.retain(|file| !file.is_deleted);
        files_diff.differences.retain_mut(|file_diff| {
            let seen = Resurrection::File {
                thread,
                post,
                url: file_diff.old.url.clone(),
            };
            if reported.contains(&seen) {
                file_diff.fields.retain(|field| *field != FileField::IsDeleted);
            }
            !file_diff.is_empty()
        });
        if files_diff.is_empty() {
            post_diff.files_diff = None;
            post_diff.fields.retain(|field| *field != PostField::Files);
        }
    }
    posts_diff.differences.retain(|post_diff| !post_diff.is_empty());
    if posts_diff.is_empty() {
        diff.posts_diff = None;
        diff.fields.retain(|field| *field != ThreadField::Posts);
    }
}

fn apply_posts_diff(
    thread: &mut Thread,
    diff: &PostArraysDiff,
    reported: &mut BTreeSet<Resurrection>,
    effects: &mut Vec<Effect>,
) {
    let key = thread.key();

    for removed in &diff.only_in_old {
        let Some(post) = thread.post_mut(removed.number) else {
            continue;
        };
        if post.is_deleted {
            continue;
        }
        post.is_deleted = true;
        let mut cascaded = Vec::new();
        for file in post.files.iter_mut().filter(|file| !file.is_deleted) {
            file.is_deleted = true;
            cascaded.push(file.clone());
        }
        effects.push(Effect::Emit(ObserverEvent::PostDelete {
            thread: key.clone(),
            post: post.clone(),
        }));
        for file in cascaded {
            effects.push(Effect::Emit(ObserverEvent::FileDelete {
                thread: key.clone(),
                post: removed.number,
                file,
            }));
        }
    }

    for added in &diff.only_in_new {
        thread.posts.push(added.clone());
        effects.push(Effect::Emit(ObserverEvent::PostCreate {
            thread: key.clone(),
            post: added.clone(),
        }));
        for file in &added.files {
            effects.push(Effect::Emit(ObserverEvent::FileCreate {
                thread: key.clone(),
                post: added.number,
                file: file.clone(),
            }));
        }
    }

    for changed in &diff.differences {
        let Some(post) = thread.post_mut(changed.old.number) else {
            continue;
        };
        if post.is_deleted {
            reported.insert(Resurrection::Post {
                thread: key.number,
                post: post.number,
            });
            effects.push(Effect::Anomaly(Anomaly::PostResurrected {
                thread: key.clone(),
                post: post.number,
            }));
        }
        for field in &changed.fields {
            field.apply(post, &changed.new);
        }
        effects.push(Effect::Emit(ObserverEvent::PostModify {
            thread: key.clone(),
            post: post.clone(),
            diff: changed.clone(),
        }));
        if let Some(files_diff) = &changed.files_diff {
            apply_files_diff(&key, post, files_diff, reported, effects);
        }
    }
}

fn apply_files_diff(
    key: &ThreadKey,
    post: &mut Post,
    diff: &FileArraysDiff,
    reported: &mut BTreeSet<Resurrection>,
    effects: &mut Vec<Effect>,
) {
    let post_number = post.number;

    for removed in &diff.only_in_old {
        let Some(file) = post.file_mut(&removed.url) else {
            continue;
        };
        if file.is_deleted {
            continue;
        }
        file.is_deleted = true;
        effects.push(Effect::Emit(ObserverEvent::FileDelete {
            thread: key.clone(),
            post: post_number,
            file: file.clone(),
        }));
    }

    for added in &diff.only_in_new {
        post.files.push(added.clone());
        effects.push(Effect::Emit(ObserverEvent::FileCreate {
            thread: key.clone(),
            post: post_number,
            file: added.clone(),
        }));
    }

    for changed in &diff.differences {
        let Some(file) = post.file_mut(&changed.old.url) else {
            continue;
        };
        if file.is_deleted {
            reported.insert(Resurrection::File {
                thread: key.number,
                post: post_number,
                url: file.url.clone(),
            });
            effects.push(Effect::Anomaly(Anomaly::FileResurrected {
                thread: key.clone(),
                post: post_number,
                url: file.url.clone(),
            }));
        }
        for field in &changed.fields {
            field.apply(file, &changed.new);
        }
        effects.push(Effect::Emit(ObserverEvent::FileModify {
            thread: key.clone(),
            post: post_number,
            file: file.clone(),
            diff: changed.clone(),
        }));
    }
}
